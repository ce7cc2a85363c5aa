//! Record Loading and Indexing
//!
//! Loads the three survey tables (map unit, component, horizon) with
//! Polars and builds the once-per-run parent-id indexes the aggregators
//! read through. SSURGO column names are used throughout (mukey, cokey,
//! chkey, comppct_r, hzdept_r, ...).
//!
//! Ordering guarantee realized here: component indexes for a map unit are
//! sorted by descending comppct_r, horizon indexes for a component by
//! ascending hzdept_r. The aggregators assume this order and do not
//! re-check it.
//!
//! Schema validation against the configured attribute column happens at
//! load time (fail fast), never lazily per record.

use crate::config::{AttributeKind, ConfigError, RunConfig};
use crate::rating::Rating;
use anyhow::{Context, Result};
use polars::prelude::*;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

/// One soil layer of one component. Read-only input.
#[derive(Debug, Clone)]
pub struct HorizonRecord {
    pub cokey: String,
    pub chkey: String,
    pub hzdept_r: Option<f64>,
    pub hzdepb_r: Option<f64>,
    pub om_r: Option<f64>,
    pub desgnmaster: Option<String>,
    pub texcl: Option<String>,
    pub lieutex: Option<String>,
    /// The attribute value under aggregation, per the configured column.
    pub value: Option<Rating>,
}

/// One soil type within a map unit. Read-only input.
#[derive(Debug, Clone)]
pub struct ComponentRecord {
    pub mukey: String,
    pub cokey: String,
    pub comppct_r: Option<f64>,
    pub majcompflag: bool,
    pub taxorder: Option<String>,
    pub taxsubgrp: Option<String>,
}

/// The aggregation root. Read-only input; the derived rating lives in
/// `MapUnitResult`, not here.
#[derive(Debug, Clone)]
pub struct MapUnitRecord {
    pub mukey: String,
    pub musym: String,
    pub muname: String,
}

/// Main data holder for a rating run: the three record vectors plus the
/// foreign-key indexes. A horizon is only reachable through its owning
/// component, a component only through its owning map unit.
pub struct SurveyData {
    pub mapunits: Vec<MapUnitRecord>,
    pub components: Vec<ComponentRecord>,
    pub horizons: Vec<HorizonRecord>,

    /// mukey → component indexes, descending comppct_r.
    components_by_mapunit: FxHashMap<String, Vec<usize>>,

    /// cokey → horizon indexes, ascending hzdept_r.
    horizons_by_component: FxHashMap<String, Vec<usize>>,
}

impl SurveyData {
    /// Build from in-memory records. Indexes are built and sorted here;
    /// input order does not matter.
    pub fn from_records(
        mapunits: Vec<MapUnitRecord>,
        components: Vec<ComponentRecord>,
        horizons: Vec<HorizonRecord>,
    ) -> Self {
        let mut components_by_mapunit: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for (idx, component) in components.iter().enumerate() {
            components_by_mapunit
                .entry(component.mukey.clone())
                .or_default()
                .push(idx);
        }
        for indexes in components_by_mapunit.values_mut() {
            indexes.sort_by(|&a, &b| {
                let pa = components[a].comppct_r.unwrap_or(f64::NEG_INFINITY);
                let pb = components[b].comppct_r.unwrap_or(f64::NEG_INFINITY);
                pb.partial_cmp(&pa)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| components[a].cokey.cmp(&components[b].cokey))
            });
        }

        let mut horizons_by_component: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for (idx, horizon) in horizons.iter().enumerate() {
            horizons_by_component
                .entry(horizon.cokey.clone())
                .or_default()
                .push(idx);
        }
        for indexes in horizons_by_component.values_mut() {
            indexes.sort_by(|&a, &b| {
                let ta = horizons[a].hzdept_r.unwrap_or(f64::INFINITY);
                let tb = horizons[b].hzdept_r.unwrap_or(f64::INFINITY);
                ta.partial_cmp(&tb)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| horizons[a].chkey.cmp(&horizons[b].chkey))
            });
        }

        tracing::debug!(
            "Indexed {} map units, {} components, {} horizons",
            mapunits.len(),
            components.len(),
            horizons.len()
        );

        SurveyData {
            mapunits,
            components,
            horizons,
            components_by_mapunit,
            horizons_by_component,
        }
    }

    /// Load all three tables from CSV or Parquet files.
    pub fn load(
        mapunit_path: &str,
        component_path: &str,
        horizon_path: &str,
        config: &RunConfig,
    ) -> Result<Self> {
        let mapunits = Self::load_mapunits(mapunit_path)?;
        let components = Self::load_components(component_path)?;
        let horizons = Self::load_horizons(horizon_path, config)?;

        Ok(Self::from_records(mapunits, components, horizons))
    }

    /// Components of one map unit, descending percent.
    pub fn components_of<'a>(
        &'a self,
        mukey: &str,
    ) -> impl Iterator<Item = &'a ComponentRecord> + 'a {
        self.components_by_mapunit
            .get(mukey)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(move |&idx| &self.components[idx])
    }

    /// Horizons of one component, ascending top depth.
    pub fn horizons_of<'a>(
        &'a self,
        cokey: &str,
    ) -> impl Iterator<Item = &'a HorizonRecord> + 'a {
        self.horizons_by_component
            .get(cokey)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(move |&idx| &self.horizons[idx])
    }

    fn load_mapunits(path: &str) -> Result<Vec<MapUnitRecord>> {
        let df = read_table(path)?
            .lazy()
            .select(&[
                col("mukey").cast(DataType::String),
                col("musym").cast(DataType::String),
                col("muname").cast(DataType::String),
            ])
            .collect()
            .with_context(|| format!("Failed to load map unit table: {}", path))?;

        let mukeys = df.column("mukey")?.str()?;
        let musyms = df.column("musym")?.str()?;
        let munames = df.column("muname")?.str()?;

        let mut records = Vec::with_capacity(df.height());
        for idx in 0..df.height() {
            let Some(mukey) = mukeys.get(idx) else { continue };
            records.push(MapUnitRecord {
                mukey: mukey.to_string(),
                musym: musyms.get(idx).unwrap_or("").to_string(),
                muname: munames.get(idx).unwrap_or("").to_string(),
            });
        }
        Ok(records)
    }

    fn load_components(path: &str) -> Result<Vec<ComponentRecord>> {
        let df = read_table(path)?
            .lazy()
            .select(&[
                col("mukey").cast(DataType::String),
                col("cokey").cast(DataType::String),
                col("comppct_r").cast(DataType::Float64),
                col("majcompflag").cast(DataType::String),
                col("taxorder").cast(DataType::String),
                col("taxsubgrp").cast(DataType::String),
            ])
            .collect()
            .with_context(|| format!("Failed to load component table: {}", path))?;

        let mukeys = df.column("mukey")?.str()?;
        let cokeys = df.column("cokey")?.str()?;
        let percents = df.column("comppct_r")?.f64()?;
        let majflags = df.column("majcompflag")?.str()?;
        let taxorders = df.column("taxorder")?.str()?;
        let taxsubgrps = df.column("taxsubgrp")?.str()?;

        let mut records = Vec::with_capacity(df.height());
        for idx in 0..df.height() {
            let (Some(mukey), Some(cokey)) = (mukeys.get(idx), cokeys.get(idx)) else {
                continue;
            };
            records.push(ComponentRecord {
                mukey: mukey.to_string(),
                cokey: cokey.to_string(),
                comppct_r: percents.get(idx),
                majcompflag: majflags
                    .get(idx)
                    .map_or(false, |flag| flag.trim().eq_ignore_ascii_case("yes")),
                taxorder: taxorders.get(idx).map(str::to_string),
                taxsubgrp: taxsubgrps.get(idx).map(str::to_string),
            });
        }
        Ok(records)
    }

    fn load_horizons(path: &str, config: &RunConfig) -> Result<Vec<HorizonRecord>> {
        let raw = read_table(path)?;
        validate_attribute_column(&raw, config)?;

        let base_columns = [
            "cokey",
            "chkey",
            "hzdept_r",
            "hzdepb_r",
            "om_r",
            "desgnmaster",
            "texcl",
            "lieutex",
        ];

        let mut selection = vec![
            col("cokey").cast(DataType::String),
            col("chkey").cast(DataType::String),
            col("hzdept_r").cast(DataType::Float64),
            col("hzdepb_r").cast(DataType::Float64),
            col("om_r").cast(DataType::Float64),
            col("desgnmaster").cast(DataType::String),
            col("texcl").cast(DataType::String),
            col("lieutex").cast(DataType::String),
        ];

        // The attribute column may itself be one of the base columns
        // (e.g. om_r); select it only once.
        let attribute = config.attribute_column.as_str();
        if !base_columns.contains(&attribute) {
            let cast = match config.attribute_kind {
                AttributeKind::Numeric => DataType::Float64,
                _ => DataType::String,
            };
            selection.push(col(attribute).cast(cast));
        }

        let df = raw
            .lazy()
            .select(&selection)
            .collect()
            .with_context(|| format!("Failed to load horizon table: {}", path))?;

        let cokeys = df.column("cokey")?.str()?;
        let chkeys = df.column("chkey")?.str()?;
        let tops = df.column("hzdept_r")?.f64()?;
        let bottoms = df.column("hzdepb_r")?.f64()?;
        let oms = df.column("om_r")?.f64()?;
        let masters = df.column("desgnmaster")?.str()?;
        let textures = df.column("texcl")?.str()?;
        let lieutexes = df.column("lieutex")?.str()?;
        let numeric_values = match config.attribute_kind {
            AttributeKind::Numeric => Some(df.column(attribute)?.f64()?),
            _ => None,
        };
        let text_values = match config.attribute_kind {
            AttributeKind::Numeric => None,
            _ => Some(df.column(attribute)?.str()?),
        };

        let mut records = Vec::with_capacity(df.height());
        for idx in 0..df.height() {
            let (Some(cokey), Some(chkey)) = (cokeys.get(idx), chkeys.get(idx)) else {
                continue;
            };
            let value = match (numeric_values, text_values) {
                (Some(values), _) => values.get(idx).map(Rating::Numeric),
                (_, Some(values)) => values.get(idx).map(|s| Rating::Text(s.to_string())),
                _ => None,
            };
            records.push(HorizonRecord {
                cokey: cokey.to_string(),
                chkey: chkey.to_string(),
                hzdept_r: tops.get(idx),
                hzdepb_r: bottoms.get(idx),
                om_r: oms.get(idx),
                desgnmaster: masters.get(idx).map(str::to_string),
                texcl: textures.get(idx).map(str::to_string),
                lieutex: lieutexes.get(idx).map(str::to_string),
                value,
            });
        }
        Ok(records)
    }
}

/// Read a table by extension: Parquet for .parquet, CSV otherwise.
fn read_table(path: &str) -> Result<DataFrame> {
    if path.ends_with(".parquet") {
        LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to scan parquet: {}", path))?
            .collect()
            .with_context(|| format!("Failed to read parquet: {}", path))
    } else {
        CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.into()))
            .with_context(|| format!("Failed to create CSV reader: {}", path))?
            .finish()
            .with_context(|| format!("Failed to read CSV: {}", path))
    }
}

/// Fail fast when the configured attribute column is missing or its
/// physical type contradicts the declared semantic kind.
fn validate_attribute_column(df: &DataFrame, config: &RunConfig) -> Result<(), ConfigError> {
    let column = df
        .column(&config.attribute_column)
        .map_err(|_| ConfigError::UnknownColumn(config.attribute_column.clone()))?;

    let dtype = column.dtype();
    let numeric = matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    );

    let ok = match config.attribute_kind {
        AttributeKind::Numeric => numeric,
        // A fully-null CSV column may be inferred as String; accept it.
        AttributeKind::Text | AttributeKind::DomainOrdered => {
            matches!(dtype, DataType::String | DataType::Null)
        }
    };

    if ok {
        Ok(())
    } else {
        Err(ConfigError::ColumnTypeMismatch {
            column: config.attribute_column.clone(),
            expected: match config.attribute_kind {
                AttributeKind::Numeric => "numeric",
                _ => "text",
            },
            found: format!("{:?}", dtype),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapunit(mukey: &str) -> MapUnitRecord {
        MapUnitRecord {
            mukey: mukey.to_string(),
            musym: "XxA".to_string(),
            muname: "Test silt loam".to_string(),
        }
    }

    fn component(mukey: &str, cokey: &str, pct: Option<f64>) -> ComponentRecord {
        ComponentRecord {
            mukey: mukey.to_string(),
            cokey: cokey.to_string(),
            comppct_r: pct,
            majcompflag: true,
            taxorder: None,
            taxsubgrp: None,
        }
    }

    fn horizon(cokey: &str, chkey: &str, top: f64) -> HorizonRecord {
        HorizonRecord {
            cokey: cokey.to_string(),
            chkey: chkey.to_string(),
            hzdept_r: Some(top),
            hzdepb_r: Some(top + 10.0),
            om_r: None,
            desgnmaster: None,
            texcl: None,
            lieutex: None,
            value: None,
        }
    }

    #[test]
    fn test_component_index_sorted_descending_percent() {
        let data = SurveyData::from_records(
            vec![mapunit("M1")],
            vec![
                component("M1", "C-low", Some(15.0)),
                component("M1", "C-high", Some(60.0)),
                component("M1", "C-mid", Some(25.0)),
                component("M1", "C-null", None),
            ],
            vec![],
        );

        let order: Vec<&str> = data.components_of("M1").map(|c| c.cokey.as_str()).collect();
        assert_eq!(order, vec!["C-high", "C-mid", "C-low", "C-null"]);
    }

    #[test]
    fn test_horizon_index_sorted_ascending_depth() {
        let data = SurveyData::from_records(
            vec![mapunit("M1")],
            vec![component("M1", "C1", Some(100.0))],
            vec![
                horizon("C1", "H-deep", 40.0),
                horizon("C1", "H-surface", 0.0),
                horizon("C1", "H-mid", 10.0),
            ],
        );

        let order: Vec<&str> = data.horizons_of("C1").map(|h| h.chkey.as_str()).collect();
        assert_eq!(order, vec!["H-surface", "H-mid", "H-deep"]);
    }

    #[test]
    fn test_percent_tie_sorted_by_cokey() {
        let data = SurveyData::from_records(
            vec![mapunit("M1")],
            vec![
                component("M1", "C2", Some(50.0)),
                component("M1", "C1", Some(50.0)),
            ],
            vec![],
        );
        let order: Vec<&str> = data.components_of("M1").map(|c| c.cokey.as_str()).collect();
        assert_eq!(order, vec!["C1", "C2"]);
    }

    #[test]
    fn test_unknown_parent_yields_empty_iterators() {
        let data = SurveyData::from_records(vec![mapunit("M1")], vec![], vec![]);
        assert_eq!(data.components_of("M1").count(), 0);
        assert_eq!(data.horizons_of("nope").count(), 0);
    }
}
