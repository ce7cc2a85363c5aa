//! Rating Engine - Main coordinator for map-unit rating runs
//!
//! Wires the selector, the component reducer and the map-unit aggregator
//! into a per-map-unit batch loop. Includes both sequential and parallel
//! (Rayon) drivers; the index is read-only, map units share no state, so
//! the parallel driver produces byte-identical output in the same order.
//!
//! Configuration problems abort construction (`ConfigError`); after that
//! nothing in a run raises — per-map-unit "no data" is a null outcome and
//! data-quality findings land in the run diagnostics.

use crate::component;
use crate::config::{ConfigError, RunConfig};
use crate::data::{ComponentRecord, MapUnitRecord, SurveyData};
use crate::diagnostics::{DataQualityWarning, Diagnostics};
use crate::horizon::{self, SelectedHorizon};
use crate::mapunit::{self, ComponentRating};
use crate::rating::{Rating, RatingDomain};
use rayon::prelude::*;
use smallvec::SmallVec;

/// One output row: map-unit identity plus the derived rating and its
/// supporting percent, both nullable.
#[derive(Debug, Clone)]
pub struct MapUnitResult {
    pub mukey: String,
    pub musym: String,
    pub muname: String,
    pub rating: Option<Rating>,
    pub percent: Option<f64>,
}

/// Results in map-unit load order plus the run's diagnostics, reported
/// separately so callers never mistake warnings for failures.
pub struct RunOutput {
    pub results: Vec<MapUnitResult>,
    pub diagnostics: Diagnostics,
}

/// Main rating engine. Owns the indexed survey data and the immutable
/// run configuration; pure computation from there on.
pub struct RatingEngine {
    data: SurveyData,
    config: RunConfig,
    domain: Option<RatingDomain>,
    target: Option<Rating>,
}

impl RatingEngine {
    /// Validate the configuration and build the domain/target once.
    pub fn new(data: SurveyData, config: RunConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let domain = config.build_domain()?;
        let target = config.target_rating()?;

        tracing::debug!(
            "Rating engine ready: {} map units, method {:?}",
            data.mapunits.len(),
            config.method
        );

        Ok(Self {
            data,
            config,
            domain,
            target,
        })
    }

    pub fn data(&self) -> &SurveyData {
        &self.data
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Reduce one component to its rating via horizon selection.
    fn component_rating(
        &self,
        component: &ComponentRecord,
        warnings: &mut Vec<DataQualityWarning>,
    ) -> ComponentRating {
        let horizons: Vec<_> = self.data.horizons_of(&component.cokey).collect();

        for h in &horizons {
            if !horizon::valid_depths(h) {
                warnings.push(DataQualityWarning::DegenerateHorizonDepths {
                    cokey: component.cokey.clone(),
                    chkey: h.chkey.clone(),
                });
            }
        }

        let rating = match self.config.depth_window {
            Some(window) => {
                let selected: SmallVec<[SelectedHorizon<'_>; 8]> =
                    horizon::select_window(horizons.iter().copied(), window.top, window.bottom);
                component::aggregate_window(&selected, self.config.component_rule)
            }
            None => component::surface_value(horizon::select_surface(
                component,
                horizons.iter().copied(),
            )),
        };

        ComponentRating {
            cokey: component.cokey.clone(),
            comppct: component.comppct_r,
            rating,
        }
    }

    /// Rate one map unit. Pure; warnings come back with the result.
    pub fn rate_map_unit(
        &self,
        mapunit: &MapUnitRecord,
    ) -> (MapUnitResult, Vec<DataQualityWarning>) {
        let mut warnings = Vec::new();

        let mut component_ratings = Vec::new();
        let mut pct_total = 0.0;
        let mut any_pct = false;
        for component in self.data.components_of(&mapunit.mukey) {
            if let Some(pct) = component.comppct_r {
                pct_total += pct;
                any_pct = true;
            }
            if self.config.major_components_only && !component.majcompflag {
                continue;
            }
            component_ratings.push(self.component_rating(component, &mut warnings));
        }

        // Expected to sum to 100; reported, never corrected
        if any_pct && (pct_total - 100.0).abs() > 0.5 {
            warnings.push(DataQualityWarning::ComponentPercentSum {
                mukey: mapunit.mukey.clone(),
                total: pct_total,
            });
        }

        let aggregated = mapunit::aggregate(
            &component_ratings,
            &self.config,
            self.domain.as_ref(),
            self.target.as_ref(),
            &mut warnings,
        );

        let result = MapUnitResult {
            mukey: mapunit.mukey.clone(),
            musym: mapunit.musym.clone(),
            muname: mapunit.muname.clone(),
            rating: aggregated.rating,
            percent: aggregated.percent,
        };
        (result, warnings)
    }

    /// Rate every map unit sequentially, in load order.
    pub fn rate_all(&self) -> RunOutput {
        let mut results = Vec::with_capacity(self.data.mapunits.len());
        let mut diagnostics = Diagnostics::new();

        for mapunit in &self.data.mapunits {
            let (result, warnings) = self.rate_map_unit(mapunit);
            diagnostics.extend(warnings);
            results.push(result);
        }

        RunOutput {
            results,
            diagnostics,
        }
    }

    /// Rate every map unit across the Rayon pool. Map units are
    /// independent and the index is read-only, so this is a plain data
    /// parallelism split; output order matches the sequential driver.
    pub fn rate_all_parallel(&self) -> RunOutput {
        let rated: Vec<(MapUnitResult, Vec<DataQualityWarning>)> = self
            .data
            .mapunits
            .par_iter()
            .map(|mapunit| self.rate_map_unit(mapunit))
            .collect();

        let mut results = Vec::with_capacity(rated.len());
        let mut diagnostics = Diagnostics::new();
        for (result, warnings) in rated {
            diagnostics.extend(warnings);
            results.push(result);
        }

        RunOutput {
            results,
            diagnostics,
        }
    }
}
