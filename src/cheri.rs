//! CHERI capability-alignment helpers.

/// Minimum alignment (in bytes) for a capability covering `n` bytes, under
/// a compressed-capability format with a 9-bit mantissa (the CHERIoT rule).
///
/// Other CHERI profiles compute this differently; this crate only
/// implements the CHERIoT variant.
pub fn required_alignment(n: u64) -> u64 {
    const MANTISSA_BITS: u32 = 9;
    let msb = if n == 0 { 0 } else { 64 - n.leading_zeros() };
    let mut e = msb.saturating_sub(MANTISSA_BITS);
    let low_mask = (1u64 << (MANTISSA_BITS - 1)) - 1;
    if (n >> (e + 1)) & low_mask == low_mask {
        e += 1;
    }
    1u64 << e
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_needs_no_alignment() {
        assert_eq!(required_alignment(0), 1);
    }

    #[test]
    fn small_sizes_need_no_alignment() {
        assert_eq!(required_alignment(1), 1);
        assert_eq!(required_alignment(255), 1);
    }

    #[test]
    fn large_size_rounds_up_to_a_power_of_two() {
        let n = 1u64 << 20;
        let a = required_alignment(n);
        assert!(a.is_power_of_two());
        assert!(n % a == 0 || a >= (1u64 << (20 - 9)));
    }

    #[test]
    fn monotonic_in_size_class() {
        // doubling n never decreases the required alignment
        let mut prev = required_alignment(1 << 10);
        for shift in 11..24 {
            let cur = required_alignment(1u64 << shift);
            assert!(cur >= prev);
            prev = cur;
        }
    }
}
