use jobset_core::{FormData, TimeOptions};

const MIN_HORIZON_MS: i64 = 60_000;
const FALLBACK_MIN_VIEW_MS: i64 = 1_000;

/// Time options derived from the procedures: the horizon is the total
/// processing time, so every schedule fits.
pub fn compute_auto_time_options(form: &FormData) -> TimeOptions {
    let total = form
        .procedures()
        .map(|procedure| procedure.processing_time_ms.max(0))
        .fold(0i64, i64::saturating_add);
    let max_time_ms = total.max(MIN_HORIZON_MS);
    let shortest = form
        .procedures()
        .map(|procedure| procedure.processing_time_ms)
        .filter(|ms| *ms > 0)
        .min()
        .unwrap_or(FALLBACK_MIN_VIEW_MS);

    TimeOptions {
        max_time_ms,
        view_start_time_ms: 0,
        view_end_time_ms: max_time_ms,
        min_view_duration_ms: shortest.min(max_time_ms),
        max_view_duration_ms: max_time_ms,
    }
}
