//! Map-Unit-Level Aggregation
//!
//! Reduces the (component percent, component rating) pairs of one map
//! unit to a single rating plus its supporting percentage, using one of
//! five methods: Dominant Component, Dominant Condition, Weighted
//! Average, Minimum/Maximum, Percent Present.
//!
//! Single pass per map unit, no hidden state. A map unit with zero
//! qualifying components yields (null, null) — never zero, never an
//! error. Percent sums above 100 propagate unclamped so upstream data
//! problems stay visible.

use crate::config::{AggregationMethod, RunConfig, TieBreak};
use crate::diagnostics::DataQualityWarning;
use crate::rating::{compare_ratings, Rating, RatingDomain, RatingKey};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

/// One component's contribution to its map unit.
#[derive(Debug, Clone)]
pub struct ComponentRating {
    pub cokey: String,
    pub comppct: Option<f64>,
    pub rating: Option<Rating>,
}

/// The derived map-unit outcome. Written exactly once per map unit.
#[derive(Debug, Clone, PartialEq)]
pub struct MapUnitRating {
    pub rating: Option<Rating>,
    pub percent: Option<f64>,
}

impl MapUnitRating {
    fn null() -> Self {
        MapUnitRating {
            rating: None,
            percent: None,
        }
    }
}

/// Aggregate one map unit's component ratings.
///
/// `components` need not be pre-sorted. `target` is the percent-present
/// target value (None for the other methods). Warnings accumulate into
/// `warnings`; nothing here aborts.
pub fn aggregate(
    components: &[ComponentRating],
    config: &RunConfig,
    domain: Option<&RatingDomain>,
    target: Option<&Rating>,
    warnings: &mut Vec<DataQualityWarning>,
) -> MapUnitRating {
    let qualifying: Vec<&ComponentRating> = components
        .iter()
        .filter(|c| matches!(c.comppct, Some(pct) if pct >= config.cutoff))
        .filter(|c| config.include_nulls || c.rating.is_some())
        .collect();

    if qualifying.is_empty() {
        return MapUnitRating::null();
    }

    // Observational pass: report domain values that match a level only by
    // case. The domain itself is immutable; lookups already succeed.
    if let Some(domain) = domain {
        for component in &qualifying {
            if let Some(Rating::Text(value)) = &component.rating {
                report_case_mismatch(value, domain, warnings);
            }
        }
    }

    match config.method {
        AggregationMethod::DominantComponent => {
            dominant_component(&qualifying, config.tie_break, domain)
        }
        AggregationMethod::DominantCondition => {
            dominant_condition(&qualifying, config.tie_break, domain)
        }
        AggregationMethod::WeightedAverage => weighted_average(&qualifying),
        AggregationMethod::MinMax => min_max(&qualifying, config.tie_break, domain),
        AggregationMethod::PercentPresent => percent_present(&qualifying, target),
    }
}

fn report_case_mismatch(
    value: &str,
    domain: &RatingDomain,
    warnings: &mut Vec<DataQualityWarning>,
) {
    if !domain.matches_case(value) {
        if let Some(level) = domain.rank_of(value).and_then(|rank| domain.level(rank)) {
            warnings.push(DataQualityWarning::DomainCaseMismatch {
                value: value.to_string(),
                level: level.to_string(),
            });
        }
    }
}

/// The component with the highest percent wins; a percent tie is decided
/// by the tie-break over the tied ratings themselves, falling back to the
/// lowest cokey when no rating order is defined.
fn dominant_component(
    qualifying: &[&ComponentRating],
    tie_break: TieBreak,
    domain: Option<&RatingDomain>,
) -> MapUnitRating {
    let top_pct = qualifying
        .iter()
        .map(|c| c.comppct.unwrap_or(0.0))
        .fold(f64::NEG_INFINITY, f64::max);
    let tied: Vec<&ComponentRating> = qualifying
        .iter()
        .copied()
        .filter(|c| c.comppct.unwrap_or(0.0) == top_pct)
        .collect();

    let winner = if tied.len() == 1 {
        tied[0]
    } else {
        break_component_tie(&tied, tie_break, domain)
    };

    MapUnitRating {
        rating: winner.rating.clone(),
        percent: winner.comppct,
    }
}

fn break_component_tie<'a>(
    tied: &[&'a ComponentRating],
    tie_break: TieBreak,
    domain: Option<&RatingDomain>,
) -> &'a ComponentRating {
    let mut best: Option<(&ComponentRating, &Rating)> = None;
    let mut orderable = true;

    for component in tied {
        let Some(rating) = &component.rating else {
            orderable = false;
            break;
        };
        match best {
            None => best = Some((component, rating)),
            Some((_, best_rating)) => match compare_ratings(rating, best_rating, domain) {
                Some(ordering) => {
                    let better = match tie_break {
                        TieBreak::High => ordering == Ordering::Greater,
                        TieBreak::Low => ordering == Ordering::Less,
                    };
                    if better {
                        best = Some((component, rating));
                    }
                }
                None => {
                    orderable = false;
                    break;
                }
            },
        }
    }

    if orderable {
        if let Some((winner, _)) = best {
            return winner;
        }
    }

    // No ordering defined between the tied ratings: deterministic by id
    tied.iter()
        .copied()
        .min_by(|a, b| a.cokey.cmp(&b.cokey))
        .unwrap_or(tied[0])
}

/// Group components by equal rating value, sum percents per group, and
/// let the largest group win. Null-rated components (when included) form
/// their own group and can win the rollup.
fn dominant_condition(
    qualifying: &[&ComponentRating],
    tie_break: TieBreak,
    domain: Option<&RatingDomain>,
) -> MapUnitRating {
    struct Group {
        rating: Option<Rating>,
        pct: f64,
    }

    let mut groups: FxHashMap<Option<RatingKey>, Group> = FxHashMap::default();
    for component in qualifying {
        let key = component.rating.as_ref().map(RatingKey::of);
        let entry = groups.entry(key).or_insert_with(|| Group {
            rating: component.rating.clone(),
            pct: 0.0,
        });
        entry.pct += component.comppct.unwrap_or(0.0);
    }

    let top_pct = groups
        .values()
        .map(|g| g.pct)
        .fold(f64::NEG_INFINITY, f64::max);
    let mut tied: Vec<Group> = groups
        .into_values()
        .filter(|g| g.pct == top_pct)
        .collect();

    if tied.len() > 1 {
        // Order the competing rating values: null lowest, then domain or
        // numeric order, lexicographic fallback for unordered text.
        tied.sort_by(|a, b| match (&a.rating, &b.rating) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(ra), Some(rb)) => compare_ratings(ra, rb, domain).unwrap_or_else(|| {
                ra.to_string()
                    .to_ascii_lowercase()
                    .cmp(&rb.to_string().to_ascii_lowercase())
            }),
        });
    }

    let winner = match tie_break {
        TieBreak::High => tied.pop(),
        TieBreak::Low => {
            if tied.is_empty() {
                None
            } else {
                Some(tied.swap_remove(0))
            }
        }
    };

    match winner {
        Some(group) => MapUnitRating {
            rating: group.rating,
            percent: Some(group.pct),
        },
        None => MapUnitRating::null(),
    }
}

/// Percent-weighted mean over the numeric ratings; the output percent is
/// the percent sum of every qualifying component, so included nulls stay
/// visible in the support figure without pulling the mean toward zero.
fn weighted_average(qualifying: &[&ComponentRating]) -> MapUnitRating {
    let mut weighted_sum = 0.0;
    let mut rated_pct = 0.0;
    let mut total_pct = 0.0;

    for component in qualifying {
        let pct = component.comppct.unwrap_or(0.0);
        total_pct += pct;
        if let Some(Rating::Numeric(value)) = &component.rating {
            weighted_sum += value * pct;
            rated_pct += pct;
        }
    }

    let rating = if rated_pct > 0.0 {
        Some(Rating::Numeric(weighted_sum / rated_pct))
    } else {
        None
    };

    MapUnitRating {
        rating,
        percent: Some(total_pct),
    }
}

/// Extreme rating across the qualifying components. The tie-break selects
/// the direction (High = maximum, Low = minimum); the first component
/// holding the extreme supplies the percent.
fn min_max(
    qualifying: &[&ComponentRating],
    tie_break: TieBreak,
    domain: Option<&RatingDomain>,
) -> MapUnitRating {
    let mut best: Option<(&ComponentRating, &Rating)> = None;

    for component in qualifying {
        let Some(rating) = &component.rating else {
            continue;
        };
        // Skip values with no defined order (NaN, text outside the domain)
        let orderable = match rating {
            Rating::Numeric(v) => !v.is_nan(),
            Rating::Text(s) => domain.and_then(|d| d.rank_of(s)).is_some(),
        };
        if !orderable {
            continue;
        }

        match best {
            None => best = Some((component, rating)),
            Some((_, best_rating)) => {
                if let Some(ordering) = compare_ratings(rating, best_rating, domain) {
                    let better = match tie_break {
                        TieBreak::High => ordering == Ordering::Greater,
                        TieBreak::Low => ordering == Ordering::Less,
                    };
                    // Strictly better only: the first holder of the
                    // extreme keeps it
                    if better {
                        best = Some((component, rating));
                    }
                }
            }
        }
    }

    match best {
        Some((component, rating)) => MapUnitRating {
            rating: Some(rating.clone()),
            percent: component.comppct,
        },
        None => MapUnitRating::null(),
    }
}

/// Sum of the percents of components whose rating equals the target. The
/// rating is the percentage itself; no categorical rating is produced.
fn percent_present(qualifying: &[&ComponentRating], target: Option<&Rating>) -> MapUnitRating {
    let Some(target) = target else {
        return MapUnitRating::null();
    };

    let mut present = 0.0;
    for component in qualifying {
        if component.rating.as_ref() == Some(target) {
            present += component.comppct.unwrap_or(0.0);
        }
    }

    MapUnitRating {
        rating: Some(Rating::Numeric(present)),
        percent: Some(present),
    }
}
