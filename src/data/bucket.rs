//! Base-10, two-significant-figure bucketing.
//!
//! Values below 100 are their own bucket. Above that, values are rounded
//! up to the nearest multiple of one order of magnitude below the leading
//! digit pair, which keeps relative error bounded while bucket width grows
//! logarithmically with the value.

/// Rounds `value` up to its bucket representative.
///
/// Exact multiples of the column width are already representatives and are
/// returned unchanged, so `bucket` is idempotent. Values near the top of
/// the `u64` range saturate at `u64::MAX` instead of wrapping.
pub fn bucket(value: u64) -> u64 {
    if value < 100 {
        return value;
    }

    let column = column_width(value);
    let remainder = value % column;
    if remainder == 0 {
        value
    } else {
        value.saturating_add(column - remainder)
    }
}

/// The bucket representative immediately below `value`.
///
/// Computed over `value - 1` and rounded down, so a value sitting exactly
/// on a bucket boundary resolves to the previous bucket. Histograms use
/// this to give their first occupied bucket an explicit lower bound.
pub fn bucket_below(value: u64) -> u64 {
    let value = value.saturating_sub(1);
    if value < 100 {
        return value;
    }

    let column = column_width(value);
    value - value % column
}

/// Plain power-of-two bucketing: the next power of two at or above
/// `value`, saturating at `u64::MAX` for values above `2^63`.
pub fn bucket_base_2(value: u64) -> u64 {
    if value == 0 {
        return 0;
    }

    value.checked_next_power_of_two().unwrap_or(u64::MAX)
}

/// 10^(digits - 2): one order of magnitude below the leading digit pair.
fn column_width(value: u64) -> u64 {
    let mut column = 10;
    let mut v = value / 1000;
    while v > 0 {
        column *= 10;
        v /= 10;
    }
    column
}
