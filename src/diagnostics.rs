//! Data-Quality Diagnostics
//!
//! Non-fatal, observational warnings reported alongside results: component
//! percents that do not sum to 100, domain case mismatches, horizons with
//! unusable depths. Warnings never abort a run and are never folded into
//! per-map-unit null outcomes — batch callers report the two separately.

use rustc_hash::FxHashSet;
use std::fmt;

/// One observational warning. The engine proceeds using the available
/// data in every case.
#[derive(Debug, Clone, PartialEq)]
pub enum DataQualityWarning {
    /// Σ comppct for a map unit differs from 100. Propagated, not
    /// corrected.
    ComponentPercentSum { mukey: String, total: f64 },
    /// A rating value matched a domain level only case-insensitively.
    DomainCaseMismatch { value: String, level: String },
    /// A horizon with a null depth or top >= bottom was skipped.
    DegenerateHorizonDepths { cokey: String, chkey: String },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityWarning::ComponentPercentSum { mukey, total } => {
                write!(f, "map unit {}: component percents sum to {}", mukey, total)
            }
            DataQualityWarning::DomainCaseMismatch { value, level } => {
                write!(f, "rating '{}' matches domain level '{}' only by case", value, level)
            }
            DataQualityWarning::DegenerateHorizonDepths { cokey, chkey } => {
                write!(f, "component {}: horizon {} has unusable depths", cokey, chkey)
            }
        }
    }
}

/// Per-run warning collection. Case-mismatch warnings are deduplicated on
/// the offending value so one bad spelling does not flood a million-row
/// run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<DataQualityWarning>,
    seen_case_values: FxHashSet<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, warning: DataQualityWarning) {
        if let DataQualityWarning::DomainCaseMismatch { value, .. } = &warning {
            if !self.seen_case_values.insert(value.to_ascii_lowercase()) {
                return;
            }
        }
        tracing::warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn extend<I: IntoIterator<Item = DataQualityWarning>>(&mut self, warnings: I) {
        for warning in warnings {
            self.record(warning);
        }
    }

    pub fn warnings(&self) -> &[DataQualityWarning] {
        &self.warnings
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataQualityWarning> {
        self.warnings.iter()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_mismatch_deduplicated() {
        let mut diagnostics = Diagnostics::new();
        for _ in 0..3 {
            diagnostics.record(DataQualityWarning::DomainCaseMismatch {
                value: "SEVERE".to_string(),
                level: "Severe".to_string(),
            });
        }
        assert_eq!(diagnostics.len(), 1);

        // A different value is its own warning
        diagnostics.record(DataQualityWarning::DomainCaseMismatch {
            value: "moderate".to_string(),
            level: "Moderate".to_string(),
        });
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_percent_sum_warnings_not_deduplicated() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.record(DataQualityWarning::ComponentPercentSum {
            mukey: "100001".to_string(),
            total: 95.0,
        });
        diagnostics.record(DataQualityWarning::ComponentPercentSum {
            mukey: "100002".to_string(),
            total: 110.0,
        });
        assert_eq!(diagnostics.len(), 2);
        assert!(!diagnostics.is_empty());
    }
}
