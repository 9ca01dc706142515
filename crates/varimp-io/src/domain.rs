//! Domain types for varimp-io.

use varimp_core::{FeatureTable, Target};

use crate::IoError;

/// A validated experiment name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Parse and validate an experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    /// Return the experiment name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A feature table with its target column, as read from one CSV file.
///
/// Produced by [`DatasetReader`](crate::DatasetReader).
#[derive(Debug)]
pub struct Dataset {
    table: FeatureTable,
    target_name: String,
    target: Target,
}

impl Dataset {
    pub(crate) fn new(table: FeatureTable, target_name: String, target: Target) -> Self {
        Self {
            table,
            target_name,
            target,
        }
    }

    /// Return the feature columns.
    #[must_use]
    pub fn table(&self) -> &FeatureTable {
        &self.table
    }

    /// Return the target column's header name.
    #[must_use]
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Return the target values or labels.
    #[must_use]
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Split into the feature table and target.
    #[must_use]
    pub fn into_parts(self) -> (FeatureTable, Target) {
        (self.table, self.target)
    }
}
