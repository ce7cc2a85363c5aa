//! Rating Value Types
//!
//! The attribute value under aggregation is polymorphic: numeric (totally
//! ordered), plain text (equality only), or domain-ordered categorical
//! (ordered by an externally supplied level list, e.g. a K-factor class
//! list or [Slight, Moderate, Severe]).
//!
//! Text equality is case-insensitive everywhere; domain rank lookups are
//! case-insensitive too, against a rank map built once at configuration
//! load. The domain is never mutated after construction.

use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::fmt;

/// One attribute value, as stored on a horizon or derived for a component.
#[derive(Debug, Clone)]
pub enum Rating {
    Numeric(f64),
    Text(String),
}

impl Rating {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Rating::Numeric(v) => Some(*v),
            Rating::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Rating::Numeric(_) => None,
            Rating::Text(s) => Some(s.as_str()),
        }
    }
}

/// Exact equality for numeric, case-insensitive for text.
/// Numeric never equals text.
impl PartialEq for Rating {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Rating::Numeric(a), Rating::Numeric(b)) => a == b,
            (Rating::Text(a), Rating::Text(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rating::Numeric(v) => write!(f, "{}", v),
            Rating::Text(s) => f.write_str(s),
        }
    }
}

/// Hashable grouping key derived from a rating.
///
/// Used wherever components are grouped by equal rating value (dominant
/// condition). A struct key instead of synthetic `mukey + ":" + rating`
/// string concatenation, which can collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RatingKey {
    /// Bit pattern of the value; -0.0 is normalized to 0.0 so the two
    /// zeros land in one group.
    Numeric(u64),
    /// Lowercased text.
    Text(String),
}

impl RatingKey {
    pub fn of(rating: &Rating) -> Self {
        match rating {
            Rating::Numeric(v) => {
                let v = if *v == 0.0 { 0.0 } else { *v };
                RatingKey::Numeric(v.to_bits())
            }
            Rating::Text(s) => RatingKey::Text(s.to_ascii_lowercase()),
        }
    }
}

/// Immutable domain-ordered level list.
///
/// Levels are stored in rank order (index 0 = lowest). The rank map is
/// keyed by lowercased level so lookups succeed regardless of the case the
/// survey data arrived in; callers that care report a case mismatch via
/// [`RatingDomain::matches_case`].
#[derive(Debug, Clone)]
pub struct RatingDomain {
    levels: Vec<String>,
    rank: FxHashMap<String, usize>,
}

impl RatingDomain {
    pub fn new<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let levels: Vec<String> = levels.into_iter().map(Into::into).collect();
        let rank = levels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.to_ascii_lowercase(), i))
            .collect();
        Self { levels, rank }
    }

    /// Rank of a value, case-insensitive. None if the value is not a level.
    pub fn rank_of(&self, value: &str) -> Option<usize> {
        self.rank.get(&value.to_ascii_lowercase()).copied()
    }

    /// The stored level spelling for a rank.
    pub fn level(&self, rank: usize) -> Option<&str> {
        self.levels.get(rank).map(String::as_str)
    }

    /// True when the value matches a level with identical case (or is not
    /// in the domain at all — only a *found but differently cased* value
    /// counts as a mismatch).
    pub fn matches_case(&self, value: &str) -> bool {
        match self.rank_of(value) {
            Some(rank) => self.levels[rank] == value,
            None => true,
        }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Compare two ratings under an optional domain.
///
/// Numeric pairs use numeric order; text pairs use domain rank when both
/// values are in the domain. Everything else (plain text without a domain,
/// mixed representations, NaN, out-of-domain values) is unordered.
pub fn compare_ratings(
    a: &Rating,
    b: &Rating,
    domain: Option<&RatingDomain>,
) -> Option<Ordering> {
    match (a, b) {
        (Rating::Numeric(x), Rating::Numeric(y)) => x.partial_cmp(y),
        (Rating::Text(x), Rating::Text(y)) => {
            let domain = domain?;
            let rx = domain.rank_of(x)?;
            let ry = domain.rank_of(y)?;
            Some(rx.cmp(&ry))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_equality_ignores_case() {
        let a = Rating::Text("Somewhat limited".to_string());
        let b = Rating::Text("somewhat LIMITED".to_string());
        assert_eq!(a, b);
        assert_eq!(RatingKey::of(&a), RatingKey::of(&b));
    }

    #[test]
    fn test_numeric_key_normalizes_negative_zero() {
        let a = RatingKey::of(&Rating::Numeric(0.0));
        let b = RatingKey::of(&Rating::Numeric(-0.0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_numeric_never_equals_text() {
        assert_ne!(Rating::Numeric(2.0), Rating::Text("2".to_string()));
    }

    #[test]
    fn test_domain_rank_case_insensitive() {
        let domain = RatingDomain::new(["Slight", "Moderate", "Severe"]);
        assert_eq!(domain.rank_of("severe"), Some(2));
        assert_eq!(domain.rank_of("Slight"), Some(0));
        assert_eq!(domain.rank_of("Extreme"), None);
        assert!(domain.matches_case("Severe"));
        assert!(!domain.matches_case("SEVERE"));
        // Out-of-domain values are not case mismatches
        assert!(domain.matches_case("Extreme"));
    }

    #[test]
    fn test_compare_ratings_domain_order() {
        let domain = RatingDomain::new(["Slight", "Moderate", "Severe"]);
        let lo = Rating::Text("Slight".to_string());
        let hi = Rating::Text("severe".to_string());
        assert_eq!(
            compare_ratings(&lo, &hi, Some(&domain)),
            Some(Ordering::Less)
        );
        // Plain text without a domain has no order
        assert_eq!(compare_ratings(&lo, &hi, None), None);
    }

    #[test]
    fn test_compare_ratings_numeric() {
        let a = Rating::Numeric(0.28);
        let b = Rating::Numeric(0.32);
        assert_eq!(compare_ratings(&a, &b, None), Some(Ordering::Less));
        assert_eq!(
            compare_ratings(&a, &Rating::Numeric(f64::NAN), None),
            None
        );
    }
}
