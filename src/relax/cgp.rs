//! `relax_cgp`: collapsing a CHERIoT `AUICGP` + `{cincoffset, load, store}`
//! pair when the upper (hi) immediate is zero.

use crate::reloc::kind::RelocKind;

/// Register number for `cgp`, the compartment-globals-pointer register.
pub const CGP_REGISTER: u32 = 3;

/// Outcome for the `HI` half of a collapsible pair.
pub struct HiRelax {
    pub remove: u64,
}

/// Outcome for the `LO_I`/`LO_S` half: the source register field (bits
/// 15..19 of the instruction word) is rewritten to `cgp`; the relocation
/// kind is unchanged.
pub struct LoRelax {
    pub rewritten_word: u32,
}

/// True when the CGP offset's upper 20 bits are zero, making the `AUICGP`
/// redundant.
pub fn is_collapsible(biased_cgp_offset_hi: i32) -> bool {
    biased_cgp_offset_hi == 0
}

pub fn relax_hi() -> HiRelax {
    HiRelax { remove: 4 }
}

/// Rewrites `word`'s rs1 field (bits 19..15) to `cgp`, keeping every other
/// bit (opcode, rd, funct3, immediate split) untouched.
pub fn relax_lo(word: u32) -> LoRelax {
    let cleared = word & !(0x1f << 15);
    LoRelax {
        rewritten_word: cleared | (CGP_REGISTER << 15),
    }
}

/// The relocation kind a collapsed `HI` is marked with in `reloc_types`.
pub const HI_COLLAPSED_KIND: RelocKind = RelocKind::Relax;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hi_offset_is_collapsible() {
        assert!(is_collapsible(0));
        assert!(!is_collapsible(1));
    }

    #[test]
    fn relax_lo_only_touches_rs1_field() {
        // auicgp-style word with rs1 = x5 (00101), everything else nonzero
        let word = 0b1111_1111_1111_00101_111_1111_1111_1111u32;
        let out = relax_lo(word);
        let rs1 = (out.rewritten_word >> 15) & 0x1f;
        assert_eq!(rs1, CGP_REGISTER);
        assert_eq!(out.rewritten_word & !(0x1f << 15), word & !(0x1f << 15));
    }
}
