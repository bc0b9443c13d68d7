//! Searching for the smallest feasible parameter
use spinrta::Time;

/// Find the first value in `lo..=hi` for which `feasible` returns `true`,
/// assuming `feasible` is monotonic (once `true`, always `true`).
///
/// Returns `None` if not even `hi` is feasible. `feasible` is called
/// `O(log(hi - lo))` times.
pub(crate) fn lower_bound<E>(
    lo: Time,
    hi: Time,
    mut feasible: impl FnMut(Time) -> Result<bool, E>,
) -> Result<Option<Time>, E> {
    if lo > hi || !feasible(hi)? {
        return Ok(None);
    }

    let mut i = lo;
    let mut end = hi;
    while end > i {
        let mid = i + (end - i) / 2;
        log::trace!("lower_bound: trying {mid} ({i}..={end})");
        if feasible(mid)? {
            end = mid;
        } else {
            i = mid + 1;
        }
    }
    Ok(Some(i))
}
