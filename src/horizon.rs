//! Horizon Classification and Selection
//!
//! Decides which horizon(s) of a component participate in a rating.
//!
//! Classification (ordered, first match wins): master designation O or L,
//! organic matter above 19 percent, texture in the fixed organic set,
//! in-lieu texture in the fixed organic set; otherwise mineral.
//!
//! Selection without a depth window takes the first mineral horizon in
//! ascending top-depth order, skipping leading organic surface layers.
//! Components keyed as Histosols without a histic subgroup are organic
//! soils proper — stripping their organic layers would discard the whole
//! profile, so their first valid horizon is representative regardless of
//! class. With a window, every overlapping horizon is selected, weighted
//! by overlap thickness.
//!
//! Horizons with a null depth or top >= bottom never participate.

use crate::data::{ComponentRecord, HorizonRecord};
use smallvec::SmallVec;

/// Soil-texture codes counted as organic material.
const ORGANIC_TEXTURES: [&str; 12] = [
    "CE", "COP-MAT", "DE", "GR-MAT", "HPM", "MPM", "MPT", "MUCK", "PDOM", "PEAT", "SPM", "WOM",
];

/// In-lieu-of-texture terms counted as organic material.
const ORGANIC_LIEU_TEXTURES: [&str; 12] = [
    "Coprogenous earth",
    "Diatomaceous earth",
    "Grassy organic materials",
    "Herbaceous organic materials",
    "Highly decomposed plant material",
    "Moderately decomposed plant material",
    "Mossy organic materials",
    "Muck",
    "Mucky peat",
    "Peat",
    "Slightly decomposed plant material",
    "Woody organic materials",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizonClass {
    Organic,
    Mineral,
}

/// One selected horizon with its thickness weight. Weight is 1.0 on the
/// representative-surface path and the overlap length on the window path.
#[derive(Debug, Clone, Copy)]
pub struct SelectedHorizon<'a> {
    pub horizon: &'a HorizonRecord,
    pub weight: f64,
}

/// True when both depths are present and top < bottom.
pub fn valid_depths(horizon: &HorizonRecord) -> bool {
    match (horizon.hzdept_r, horizon.hzdepb_r) {
        (Some(top), Some(bottom)) => top < bottom,
        _ => false,
    }
}

/// Classify one horizon as organic or mineral. Ordered rules, first match
/// wins.
pub fn classify(horizon: &HorizonRecord) -> HorizonClass {
    if let Some(master) = &horizon.desgnmaster {
        let master = master.trim();
        if master.starts_with('O')
            || master.starts_with('o')
            || master.starts_with('L')
            || master.starts_with('l')
        {
            return HorizonClass::Organic;
        }
    }

    if matches!(horizon.om_r, Some(om) if om > 19.0) {
        return HorizonClass::Organic;
    }

    if let Some(texture) = &horizon.texcl {
        let texture = texture.trim();
        if ORGANIC_TEXTURES.iter().any(|t| t.eq_ignore_ascii_case(texture)) {
            return HorizonClass::Organic;
        }
    }

    if let Some(lieutex) = &horizon.lieutex {
        let lieutex = lieutex.trim();
        if ORGANIC_LIEU_TEXTURES.iter().any(|t| t.eq_ignore_ascii_case(lieutex)) {
            return HorizonClass::Organic;
        }
    }

    HorizonClass::Mineral
}

/// Taxonomy refinement: Histosols without a histic subgroup are organic
/// soils proper, not mineral soils with an organic cap.
pub fn is_organic_soil(component: &ComponentRecord) -> bool {
    let is_histosol = component
        .taxorder
        .as_deref()
        .map_or(false, |order| order.trim().eq_ignore_ascii_case("histosols"));
    if !is_histosol {
        return false;
    }
    !component
        .taxsubgrp
        .as_deref()
        .map_or(false, |subgrp| subgrp.to_ascii_lowercase().contains("histic"))
}

/// Representative surface horizon: the first mineral horizon in ascending
/// top-depth order, skipping leading organic layers. For organic soils
/// proper the first valid horizon wins regardless of class. None when no
/// horizon is eligible.
pub fn select_surface<'a, I>(component: &ComponentRecord, horizons: I) -> Option<&'a HorizonRecord>
where
    I: IntoIterator<Item = &'a HorizonRecord>,
{
    let organic_soil = is_organic_soil(component);
    for horizon in horizons {
        if !valid_depths(horizon) {
            continue;
        }
        if organic_soil || classify(horizon) == HorizonClass::Mineral {
            return Some(horizon);
        }
    }
    None
}

/// Every valid horizon overlapping `[top, bottom)`, weighted by overlap
/// length. Horizons arrive sorted ascending by top depth; the output
/// preserves that order.
pub fn select_window<'a, I>(horizons: I, top: f64, bottom: f64) -> SmallVec<[SelectedHorizon<'a>; 8]>
where
    I: IntoIterator<Item = &'a HorizonRecord>,
{
    let mut selected = SmallVec::new();
    for horizon in horizons {
        if !valid_depths(horizon) {
            continue;
        }
        let hz_top = horizon.hzdept_r.unwrap_or_default();
        let hz_bottom = horizon.hzdepb_r.unwrap_or_default();
        let overlap = hz_bottom.min(bottom) - hz_top.max(top);
        if overlap > 0.0 {
            selected.push(SelectedHorizon {
                horizon,
                weight: overlap,
            });
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::Rating;
    use approx::assert_relative_eq;

    fn horizon(chkey: &str, top: f64, bottom: f64) -> HorizonRecord {
        HorizonRecord {
            cokey: "C1".to_string(),
            chkey: chkey.to_string(),
            hzdept_r: Some(top),
            hzdepb_r: Some(bottom),
            om_r: None,
            desgnmaster: None,
            texcl: None,
            lieutex: None,
            value: None,
        }
    }

    fn component(taxorder: Option<&str>, taxsubgrp: Option<&str>) -> ComponentRecord {
        ComponentRecord {
            mukey: "M1".to_string(),
            cokey: "C1".to_string(),
            comppct_r: Some(100.0),
            majcompflag: true,
            taxorder: taxorder.map(str::to_string),
            taxsubgrp: taxsubgrp.map(str::to_string),
        }
    }

    #[test]
    fn test_classify_master_designation() {
        let mut h = horizon("H1", 0.0, 5.0);
        h.desgnmaster = Some("Oa".to_string());
        assert_eq!(classify(&h), HorizonClass::Organic);
        h.desgnmaster = Some("L".to_string());
        assert_eq!(classify(&h), HorizonClass::Organic);
        h.desgnmaster = Some("A".to_string());
        assert_eq!(classify(&h), HorizonClass::Mineral);
    }

    #[test]
    fn test_classify_organic_matter_threshold() {
        let mut h = horizon("H1", 0.0, 5.0);
        h.om_r = Some(19.0);
        assert_eq!(classify(&h), HorizonClass::Mineral);
        h.om_r = Some(19.5);
        assert_eq!(classify(&h), HorizonClass::Organic);
    }

    #[test]
    fn test_classify_texture_sets() {
        let mut h = horizon("H1", 0.0, 5.0);
        h.texcl = Some("muck".to_string());
        assert_eq!(classify(&h), HorizonClass::Organic);

        let mut h = horizon("H2", 0.0, 5.0);
        h.texcl = Some("SIL".to_string());
        h.lieutex = Some("Mucky peat".to_string());
        assert_eq!(classify(&h), HorizonClass::Organic);

        let mut h = horizon("H3", 0.0, 5.0);
        h.texcl = Some("SIL".to_string());
        assert_eq!(classify(&h), HorizonClass::Mineral);
    }

    #[test]
    fn test_select_surface_skips_leading_organic() {
        let mut organic = horizon("H1", 0.0, 10.0);
        organic.desgnmaster = Some("Oe".to_string());
        let mut mineral = horizon("H2", 10.0, 40.0);
        mineral.value = Some(Rating::Numeric(0.32));
        let deeper = horizon("H3", 40.0, 100.0);

        let component = component(None, None);
        let selected = select_surface(&component, [&organic, &mineral, &deeper]).unwrap();
        assert_eq!(selected.chkey, "H2");
    }

    #[test]
    fn test_select_surface_histosol_keeps_organic_surface() {
        let mut organic = horizon("H1", 0.0, 20.0);
        organic.texcl = Some("PEAT".to_string());
        let mineral = horizon("H2", 20.0, 50.0);

        let histosol = component(Some("Histosols"), Some("Typic Haplosaprists"));
        let selected = select_surface(&histosol, [&organic, &mineral]).unwrap();
        assert_eq!(selected.chkey, "H1");

        // A histic subgroup is a mineral soil with an organic cap: skip it
        let histic = component(Some("Mollisols"), Some("Histic Endoaquolls"));
        let selected = select_surface(&histic, [&organic, &mineral]).unwrap();
        assert_eq!(selected.chkey, "H2");
    }

    #[test]
    fn test_select_surface_discards_degenerate_depths() {
        let mut inverted = horizon("H1", 30.0, 10.0);
        inverted.value = Some(Rating::Numeric(9.9));
        let mut missing = horizon("H2", 0.0, 10.0);
        missing.hzdepb_r = None;
        let good = horizon("H3", 10.0, 40.0);

        let component = component(None, None);
        let selected = select_surface(&component, [&inverted, &missing, &good]).unwrap();
        assert_eq!(selected.chkey, "H3");
    }

    #[test]
    fn test_select_surface_no_eligible_horizon() {
        let mut organic = horizon("H1", 0.0, 10.0);
        organic.desgnmaster = Some("O".to_string());
        let component = component(None, None);
        assert!(select_surface(&component, [&organic]).is_none());
    }

    #[test]
    fn test_select_window_overlap_weights() {
        let h1 = horizon("H1", 0.0, 10.0);
        let h2 = horizon("H2", 10.0, 40.0);
        let h3 = horizon("H3", 40.0, 100.0);

        // Window [5, 50): overlaps 5, 30 and 10 cm
        let selected = select_window([&h1, &h2, &h3], 5.0, 50.0);
        assert_eq!(selected.len(), 3);
        assert_relative_eq!(selected[0].weight, 5.0);
        assert_relative_eq!(selected[1].weight, 30.0);
        assert_relative_eq!(selected[2].weight, 10.0);
    }

    #[test]
    fn test_select_window_excludes_non_overlapping() {
        let shallow = horizon("H1", 0.0, 10.0);
        let deep = horizon("H2", 50.0, 100.0);
        let selected = select_window([&shallow, &deep], 10.0, 50.0);
        assert!(selected.is_empty());
    }
}
