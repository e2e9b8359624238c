use crate::model::Mask;

// ── Interval codec ───────────────────────────────────────────────

/// Segment mask for travel from station `src` to station `dst` (1-based, `src < dst`).
///
/// Keeps every bit at or above `src - 1` and every bit below `dst - 1`, which leaves
/// the contiguous run `src - 1 ..= dst - 2`. Callers validate the pair; an invalid
/// one is not meaningful here.
#[inline]
pub fn interval(src: u32, dst: u32) -> Mask {
    debug_assert!(src >= 1 && src < dst && dst <= Mask::BITS + 1, "bad interval [{src}, {dst})");
    let from = Mask::MAX << (src - 1);
    let below = Mask::MAX >> (Mask::BITS + 1 - dst);
    from & below
}

#[inline]
pub fn overlaps(a: Mask, b: Mask) -> bool {
    a & b != 0
}

/// Number of segments a mask covers.
#[inline]
pub fn segments(mask: Mask) -> u32 {
    mask.count_ones()
}
