//! Chart data for horizontal bar / lollipop rendering of importances.

use std::fmt;

use serde::Serialize;

use crate::result::{FeatureImportance, Importances};

const BAR_WIDTH: usize = 40;

/// Importances laid out for a horizontal chart, first bar at the bottom.
///
/// Rendering is left to the consumer; the [`fmt::Display`] impl draws a
/// plain-text lollipop chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportanceChart {
    /// Loss label, used as the axis title.
    pub loss: String,
    /// Baseline error, drawn as the reference line at importance 1.0.
    pub baseline_error: f64,
    /// Bars in drawing order.
    pub bars: Vec<FeatureImportance>,
}

impl ImportanceChart {
    /// Lay out `importances` for drawing.
    ///
    /// With `sort`, bars are ordered ascending by importance so the most
    /// important feature lands at the far end of the axis; ties keep column
    /// order. Without `sort`, bars follow `order`, the table's feature names.
    #[must_use]
    pub fn new(importances: &Importances, order: &[String], sort: bool) -> Self {
        let mut bars: Vec<FeatureImportance> = order
            .iter()
            .filter_map(|name| importances.get(name).cloned())
            .collect();
        if sort {
            bars.sort_by(|a, b| a.importance.total_cmp(&b.importance));
        }
        Self {
            loss: importances.loss().to_string(),
            baseline_error: importances.baseline_error(),
            bars,
        }
    }
}

impl fmt::Display for ImportanceChart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label_width = self.bars.iter().map(|b| b.feature.chars().count()).max().unwrap_or(0);
        let max_finite = self
            .bars
            .iter()
            .map(|b| b.importance)
            .filter(|v| v.is_finite())
            .fold(0.0f64, f64::max);

        writeln!(f, "importance ({}; baseline {:.6})", self.loss, self.baseline_error)?;
        // Top of the chart is the end of the bar list.
        for bar in self.bars.iter().rev() {
            let len = if bar.importance.is_infinite() {
                BAR_WIDTH
            } else if max_finite > 0.0 {
                ((bar.importance.max(0.0) / max_finite) * BAR_WIDTH as f64).round() as usize
            } else {
                0
            };
            let stick = "-".repeat(len.saturating_sub(1));
            let head = if len > 0 { "o" } else { "" };
            writeln!(
                f,
                "{:>width$} |{stick}{head} {}",
                bar.feature,
                format_ratio(bar.importance),
                width = label_width
            )?;
        }
        Ok(())
    }
}

fn format_ratio(value: f64) -> String {
    if value.is_infinite() {
        "inf".to_string()
    } else {
        format!("{value:.4}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perturb::Method;

    fn importances() -> Importances {
        let record = |feature: &str, importance: f64| FeatureImportance {
            feature: feature.to_string(),
            error: importance,
            importance,
        };
        Importances::new(
            1.0,
            Method::Shuffle,
            "mae".into(),
            vec![record("a", 2.0), record("b", 0.5), record("c", 4.0)],
        )
    }

    fn names() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    #[test]
    fn sorted_chart_is_ascending() {
        let chart = ImportanceChart::new(&importances(), &names(), true);
        let order: Vec<&str> = chart.bars.iter().map(|b| b.feature.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn unsorted_chart_keeps_table_order() {
        let chart = ImportanceChart::new(&importances(), &names(), false);
        let order: Vec<&str> = chart.bars.iter().map(|b| b.feature.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn text_rendering_puts_most_important_first() {
        let chart = ImportanceChart::new(&importances(), &names(), true);
        let text = chart.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("importance (mae"));
        assert!(lines[1].trim_start().starts_with("c |"));
        assert!(lines[1].ends_with("o 4.0000"));
        assert!(lines[3].trim_start().starts_with("b |"));
    }
}
