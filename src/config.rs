//! Run Configuration
//!
//! One immutable `RunConfig` per aggregation run, loaded from JSON and
//! validated eagerly before any record is touched. The config names the
//! attribute column and its semantic kind, the aggregation method,
//! tie-break direction, component-percent cutoff, null policy, optional
//! depth window, optional domain level list, and (for percent present)
//! the target value.
//!
//! Configuration problems abort the run up front (`ConfigError`); missing
//! data inside the tables never does.

use crate::rating::{Rating, RatingDomain};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Fail-fast configuration errors. Raised before aggregation begins;
/// never raised per record.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("attribute column '{0}' not found in horizon table")]
    UnknownColumn(String),

    #[error("attribute column '{column}' has type {found}, expected {expected}")]
    ColumnTypeMismatch {
        column: String,
        expected: &'static str,
        found: String,
    },

    #[error("domain-ordered attribute '{0}' has no domain list configured")]
    MissingDomain(String),

    #[error("domain list is empty")]
    EmptyDomain,

    #[error("percent-present aggregation requires a target value")]
    MissingTarget,

    #[error("percent-present target '{0}' is not numeric but the attribute is")]
    InvalidTarget(String),

    #[error("weighted-average aggregation requires a numeric attribute")]
    NonNumericWeightedAverage,

    #[error("min/max aggregation requires a numeric or domain-ordered attribute")]
    UnorderedMinMax,

    #[error("depth-window selection is not defined for text attributes")]
    WindowOnTextAttribute,

    #[error("depth window [{top}, {bottom}) is empty or inverted")]
    InvalidWindow { top: f64, bottom: f64 },
}

/// Semantic type of the configured attribute column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Numeric,
    Text,
    /// Text whose legal values carry a fixed external rank order.
    DomainOrdered,
}

/// The five map-unit aggregation methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AggregationMethod {
    #[serde(rename = "Dominant Component", alias = "dominant_component")]
    DominantComponent,
    #[serde(rename = "Dominant Condition", alias = "dominant_condition")]
    DominantCondition,
    #[serde(rename = "Weighted Average", alias = "weighted_average")]
    WeightedAverage,
    #[serde(rename = "Minimum or Maximum", alias = "min_max")]
    MinMax,
    #[serde(rename = "Percent Present", alias = "percent_present")]
    PercentPresent,
}

/// Tie-break preference. Also selects the min/max direction
/// (High = maximum, Low = minimum), so the legacy ">"/"<" spellings
/// are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum TieBreak {
    #[default]
    #[serde(rename = "High", alias = "Higher", alias = ">")]
    High,
    #[serde(rename = "Low", alias = "Lower", alias = "<")]
    Low,
}

/// How selected horizons reduce to one component value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentRule {
    /// Intensive properties (K-factor, organic matter): thickness-weighted
    /// mean.
    #[default]
    WeightedAverage,
    /// Extensive properties (available water capacity): thickness-weighted
    /// sum, no division.
    WeightedSum,
}

/// Depth window in centimeters, half-open `[top, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DepthWindow {
    pub top: f64,
    pub bottom: f64,
}

/// Immutable per-run configuration, threaded by reference through every
/// call. No ambient/global state.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Horizon-table column holding the attribute value.
    pub attribute_column: String,
    pub attribute_kind: AttributeKind,
    pub method: AggregationMethod,
    #[serde(default)]
    pub tie_break: TieBreak,
    /// Components below this percent do not qualify.
    #[serde(default)]
    pub cutoff: f64,
    /// Keep null-rated components in percent arithmetic.
    #[serde(default)]
    pub include_nulls: bool,
    /// Restrict to major components (majcompflag).
    #[serde(default)]
    pub major_components_only: bool,
    #[serde(default)]
    pub component_rule: ComponentRule,
    /// When absent, the representative surface horizon is used instead.
    #[serde(default)]
    pub depth_window: Option<DepthWindow>,
    /// Ordered level list for domain-ordered attributes, lowest first.
    #[serde(default)]
    pub domain: Option<Vec<String>>,
    /// Target value for percent present.
    #[serde(default)]
    pub target: Option<String>,
}

impl RunConfig {
    /// Load a run configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read run config: {:?}", path))?;

        let config: RunConfig = serde_json::from_str(&contents)
            .with_context(|| "Failed to parse run config JSON")?;

        config.validate()?;
        Ok(config)
    }

    /// Verify method/kind combinations, the domain list, the window and
    /// the target before any aggregation starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.method {
            AggregationMethod::WeightedAverage => {
                if self.attribute_kind != AttributeKind::Numeric {
                    return Err(ConfigError::NonNumericWeightedAverage);
                }
            }
            AggregationMethod::MinMax => {
                if self.attribute_kind == AttributeKind::Text {
                    return Err(ConfigError::UnorderedMinMax);
                }
            }
            _ => {}
        }

        if let Some(window) = self.depth_window {
            if self.attribute_kind != AttributeKind::Numeric {
                return Err(ConfigError::WindowOnTextAttribute);
            }
            if window.top >= window.bottom {
                return Err(ConfigError::InvalidWindow {
                    top: window.top,
                    bottom: window.bottom,
                });
            }
        }

        let _ = self.build_domain()?;
        let _ = self.target_rating()?;
        Ok(())
    }

    /// Build the immutable rating domain, once. None for non-domain kinds.
    pub fn build_domain(&self) -> Result<Option<RatingDomain>, ConfigError> {
        if self.attribute_kind != AttributeKind::DomainOrdered {
            return Ok(None);
        }
        let levels = self
            .domain
            .as_ref()
            .ok_or_else(|| ConfigError::MissingDomain(self.attribute_column.clone()))?;
        if levels.is_empty() {
            return Err(ConfigError::EmptyDomain);
        }
        Ok(Some(RatingDomain::new(levels.clone())))
    }

    /// The percent-present target as a typed rating. None for other
    /// methods.
    pub fn target_rating(&self) -> Result<Option<Rating>, ConfigError> {
        if self.method != AggregationMethod::PercentPresent {
            return Ok(None);
        }
        let target = self.target.as_ref().ok_or(ConfigError::MissingTarget)?;
        match self.attribute_kind {
            AttributeKind::Numeric => {
                let v: f64 = target
                    .parse()
                    .map_err(|_| ConfigError::InvalidTarget(target.clone()))?;
                Ok(Some(Rating::Numeric(v)))
            }
            _ => Ok(Some(Rating::Text(target.clone()))),
        }
    }
}
