//! Alignment arithmetic shared by the block and large paths

/// Boundary for aligned allocations, block starts and large allocations
pub const POOL_ALIGNMENT: usize = 16;

/// Align value upward to next multiple of alignment
///
/// Uses bit manipulation for branch-free execution:
/// - Add (align - 1) to round up
/// - Mask with !(align - 1) to align down
#[inline(always)]
pub const fn align_up(value: usize, align: usize) -> usize {
    (value.wrapping_add(align).wrapping_sub(1)) & !align.wrapping_sub(1)
}

/// Bytes of padding needed to move `addr` up to `align`
#[inline(always)]
pub const fn padding_for(addr: usize, align: usize) -> usize {
    align_up(addr, align).wrapping_sub(addr)
}

#[inline]
pub fn is_aligned(addr: usize, align: usize) -> bool {
    debug_assert!(align.is_power_of_two(), "alignment must be power of 2");
    addr & (align - 1) == 0
}
