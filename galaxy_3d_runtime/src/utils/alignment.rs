/// Size and offset alignment helpers
///
/// # Example
///
/// ```ignore
/// assert_eq!(align_up(300, 256), 512);
/// assert_eq!(align_up(512, 256), 512);
/// ```

/// Alignment of constant buffer sizes and array element strides, in bytes
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Round `value` up to the next multiple of `alignment`
///
/// An alignment of 0 or 1 returns `value` unchanged.
pub fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

/// Whether `value` is a multiple of `alignment`
pub fn is_aligned(value: u64, alignment: u64) -> bool {
    alignment <= 1 || value % alignment == 0
}

#[cfg(test)]
#[path = "alignment_tests.rs"]
mod tests;
