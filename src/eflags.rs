//! ELF header flags (`EF_RISCV_*`) merging across input objects.

use crate::error::{incompatible_input, Result};
use crate::reloc::numbers::EFlags;

const FLOAT_ABI_MASK: EFlags = EFlags::FLOAT_ABI_SINGLE
    .union(EFlags::FLOAT_ABI_DOUBLE)
    .union(EFlags::FLOAT_ABI_QUAD);

/// Seeds from the first object, then ORs in `RVC` and requires exact
/// agreement on float ABI, RVE, CHERIABI, and CAP_MODE from every
/// subsequent object. Zero objects yields `eflags = 0`.
pub fn merge_eflags(objects: &[(u32, &str)]) -> Result<u32> {
    let mut iter = objects.iter();
    let Some(&(first, _)) = iter.next() else {
        return Ok(0);
    };
    let mut merged = EFlags::from_bits_truncate(first);
    for &(flags, name) in iter {
        let flags = EFlags::from_bits_truncate(flags);
        merged |= flags & EFlags::RVC;
        require_equal(merged, flags, FLOAT_ABI_MASK, "FLOAT_ABI", name)?;
        require_equal(merged, flags, EFlags::RVE, "RVE", name)?;
        require_equal(merged, flags, EFlags::CHERIABI, "CHERIABI", name)?;
        require_equal(merged, flags, EFlags::CAP_MODE, "CAP_MODE", name)?;
    }
    crate::trace_log!(
        "merged eflags = {:#x} over {} objects",
        merged.bits(),
        objects.len()
    );
    Ok(merged.bits())
}

fn require_equal(merged: EFlags, flags: EFlags, mask: EFlags, field: &str, name: &str) -> Result<()> {
    if merged & mask != flags & mask {
        return Err(incompatible_input(alloc::format!(
            "object {name} disagrees on {field}: {:#x} vs merged {:#x}",
            (flags & mask).bits(),
            (merged & mask).bits()
        )));
    }
    Ok(())
}

/// Re-derives whether the link as a whole is CHERI ABI from merged flags,
/// erroring if the link configuration demanded CHERI ABI but no object
/// asserts it.
pub fn calc_is_cheri_abi(merged_eflags: u32, configured_cheri_abi: bool) -> Result<bool> {
    let asserted = EFlags::from_bits_truncate(merged_eflags).contains(EFlags::CHERIABI);
    if configured_cheri_abi && !asserted {
        return Err(incompatible_input(
            "link configured for CHERI ABI but no input object asserts EF_RISCV_CHERIABI",
        ));
    }
    Ok(asserted)
}
