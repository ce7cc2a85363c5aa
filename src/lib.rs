//! Map-Unit Rating Aggregation Engine
//!
//! Aggregates hierarchical soil-survey attribute data — horizons
//! belonging to components, components belonging to map units — into a
//! single representative rating per map unit, following Soil Data Viewer
//! aggregation semantics:
//! - `data`: typed record loading and parent-id indexing with Polars
//! - `horizon`: organic/mineral classification and horizon selection
//! - `component`: thickness-weighted reduction to one component rating
//! - `mapunit`: the five map-unit aggregation methods
//! - `engine`: sequential and Rayon-parallel batch drivers
//!
//! Missing data is a first-class outcome (null, never zero, never an
//! error); only configuration problems abort a run.

pub mod config;
pub mod rating;
pub mod data;
pub mod horizon;
pub mod component;
pub mod mapunit;
pub mod engine;
pub mod diagnostics;

// Re-export commonly used types
pub use config::{
    AggregationMethod, AttributeKind, ComponentRule, ConfigError, DepthWindow, RunConfig, TieBreak,
};
pub use data::{ComponentRecord, HorizonRecord, MapUnitRecord, SurveyData};
pub use diagnostics::{DataQualityWarning, Diagnostics};
pub use engine::{MapUnitResult, RatingEngine, RunOutput};
pub use mapunit::{ComponentRating, MapUnitRating};
pub use rating::{compare_ratings, Rating, RatingDomain, RatingKey};
