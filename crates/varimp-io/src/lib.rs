//! Dataset reading, JSON model files, and result serialization for varimp.

mod domain;
mod error;
mod model;
mod reader;
mod writer;

pub use domain::{Dataset, ExperimentName};
pub use error::IoError;
pub use model::{ClassifierOutput, LinearModel, LogisticModel, ModelFile};
pub use reader::DatasetReader;
pub use writer::ResultWriter;
