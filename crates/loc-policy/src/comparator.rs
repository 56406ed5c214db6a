use loc_schemas::Reading;

use crate::types::ComparatorConfig;

/// Returns true if `candidate` should replace `current`.
///
/// 1. No candidate never wins; any candidate beats no reading.
/// 2. A candidate newer by more than the freshness threshold wins outright:
///    the held fix may describe a position the device has since left.
/// 3. Otherwise accuracy decides. A candidate without accuracy loses, a
///    current without accuracy loses, else the strictly smaller radius wins.
///
/// Not a total order: two comparably fresh readings without accuracy each
/// return false against the other.
pub fn is_better(
    candidate: Option<&Reading>,
    current: Option<&Reading>,
    cfg: &ComparatorConfig,
) -> bool {
    let Some(candidate) = candidate else {
        return false;
    };
    let Some(current) = current else {
        return true;
    };

    // checked_sub: an older candidate has no positive delta.
    if let Some(delta) = candidate.elapsed.checked_sub(current.elapsed) {
        if delta > cfg.freshness_threshold() {
            return true;
        }
    }

    match (candidate.accuracy_m, current.accuracy_m) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(a), Some(b)) => a < b,
    }
}

/// Fold `readings` left to right, keeping whichever reading
/// [`is_better`] prefers. Iteration order breaks ties, so callers should pass a
/// stable enumeration.
pub fn best_of<I>(readings: I, cfg: &ComparatorConfig) -> Option<Reading>
where
    I: IntoIterator<Item = Reading>,
{
    readings.into_iter().fold(None, |best, r| {
        if is_better(Some(&r), best.as_ref(), cfg) {
            Some(r)
        } else {
            best
        }
    })
}
