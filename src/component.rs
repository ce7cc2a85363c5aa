//! Component-Level Aggregation
//!
//! Reduces the selected horizon(s) of one component to a single rating.
//! Pure function of its inputs; missing data propagates as None and is
//! never substituted with zero.
//!
//! Weighted average serves intensive properties (K-factor, organic
//! matter); weighted sum serves extensive ones (available water
//! capacity). The two selection modes reduce differently: the
//! representative surface horizon carries its value unchanged (the only
//! path a text rating can take), while a depth window always runs the
//! weighted arithmetic, so a weighted sum over one overlapping horizon
//! is still value times overlap thickness.

use crate::config::ComponentRule;
use crate::data::HorizonRecord;
use crate::horizon::SelectedHorizon;
use crate::rating::Rating;

/// Rating of the representative surface horizon, unchanged.
pub fn surface_value(selected: Option<&HorizonRecord>) -> Option<Rating> {
    selected.and_then(|h| h.value.clone())
}

/// Reduce the horizons overlapping a depth window to one component
/// rating. None when no overlapping horizon carries a value.
pub fn aggregate_window(selected: &[SelectedHorizon<'_>], rule: ComponentRule) -> Option<Rating> {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    let mut any_value = false;

    for s in selected {
        // Null-valued horizons are excluded from both sums
        let Some(Rating::Numeric(v)) = &s.horizon.value else {
            continue;
        };
        weighted_sum += v * s.weight;
        weight_total += s.weight;
        any_value = true;
    }

    if !any_value {
        return None;
    }

    match rule {
        ComponentRule::WeightedAverage => {
            if weight_total > 0.0 {
                Some(Rating::Numeric(weighted_sum / weight_total))
            } else {
                None
            }
        }
        ComponentRule::WeightedSum => Some(Rating::Numeric(weighted_sum)),
    }
}
