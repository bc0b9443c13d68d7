use spinrta::Time;

/// Division rounding towards positive infinity. `None` if `y == 0`.
#[inline]
pub(crate) fn div_ceil(x: Time, y: Time) -> Option<Time> {
    if y == 0 {
        None
    } else {
        Some(x / y + (x % y != 0) as Time)
    }
}
