//! `relax_call`: collapsing a `CALL`/`CALL_PLT`/`CHERI_CCALL` macro pair
//! (`auipc` + `jalr`) into a shorter sequence when the target is close.

use crate::encode::fits_signed;
use crate::reloc::kind::RelocKind;

/// Outcome of attempting to relax one call-site pair.
pub struct CallRelax {
    pub new_kind: RelocKind,
    pub bytes_removed: u64,
    /// The replacement instruction word to splice in during finalize, if
    /// any (`None` means the original two words are kept as-is).
    pub write: Option<crate::relax::Write>,
}

fn no_change() -> CallRelax {
    CallRelax {
        new_kind: RelocKind::None,
        bytes_removed: 0,
        write: None,
    }
}

/// `rd`: destination register of the `jalr` half (low 5 bits of bits 7..11
/// of the second instruction word). `dest`/`loc`: absolute target and
/// location addresses. `rvc_enabled`: whether the compressed extension is
/// present (gates the two 16-bit rewrites). `is32`: `c.jal` only exists in
/// the RV32 compressed extension.
pub fn relax_call(rd: u32, dest: u64, loc: u64, rvc_enabled: bool, is32: bool, cheri: bool) -> CallRelax {
    let disp = dest.wrapping_sub(loc) as i64;
    if rvc_enabled && fits_signed(disp, 12) && rd == 0 {
        let jump_kind = if cheri {
            RelocKind::CheriRvcCjump
        } else {
            RelocKind::RvcJump
        };
        return CallRelax {
            new_kind: jump_kind,
            bytes_removed: 6,
            write: Some(crate::relax::Write::Half(0xa001)),
        };
    }
    if rvc_enabled && is32 && fits_signed(disp, 12) && rd == 1 {
        return CallRelax {
            new_kind: RelocKind::RvcJump,
            bytes_removed: 6,
            write: Some(crate::relax::Write::Half(0x2001)),
        };
    }
    if fits_signed(disp, 21) {
        let jal_kind = if cheri { RelocKind::CheriCjal } else { RelocKind::Jal };
        let word = 0x6fu32 | (rd << 7);
        return CallRelax {
            new_kind: jal_kind,
            bytes_removed: 4,
            write: Some(crate::relax::Write::Word(word)),
        };
    }
    no_change()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_forward_call_with_rd_zero_becomes_cj() {
        let r = relax_call(0, 1008, 1000, true, true, false);
        assert_eq!(r.new_kind, RelocKind::RvcJump);
        assert_eq!(r.bytes_removed, 6);
        assert!(matches!(r.write, Some(crate::relax::Write::Half(0xa001))));
    }

    #[test]
    fn short_forward_call_with_rd_ra_becomes_cjal() {
        let r = relax_call(1, 1008, 1000, true, true, false);
        assert_eq!(r.bytes_removed, 6);
        assert!(matches!(r.write, Some(crate::relax::Write::Half(0x2001))));
    }

    #[test]
    fn mid_range_call_becomes_jal() {
        let r = relax_call(5, 1_000_000, 0, false, true, false);
        assert_eq!(r.new_kind, RelocKind::Jal);
        assert_eq!(r.bytes_removed, 4);
    }

    #[test]
    fn out_of_range_call_is_unchanged() {
        let r = relax_call(5, 1i64 as u64, (1i64 << 22) as u64, false, true, false);
        assert_eq!(r.new_kind, RelocKind::None);
        assert_eq!(r.bytes_removed, 0);
    }
}
