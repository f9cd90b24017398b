//! Implicit addend extraction and REL/RELA dynamic-relocation-kind choice.

use crate::context::LinkConfig;
use crate::error::{internal, Result};
use crate::reloc::kind::RelocKind;

/// Reads the implicit addend out of the bytes a REL-form relocation targets.
///
/// A total function over the eight kinds REL-form input may legally carry an
/// implicit addend for, plus the two dynamic-only kinds (`Relative`,
/// `Irelative`) whose own addend width tracks the link's word size rather
/// than the relocation kind. Anything else is an internal error: no other
/// kind is expected to reach this path.
pub fn get_implicit_addend(bytes: &[u8], kind: RelocKind, config: &LinkConfig) -> Result<i64> {
    match kind {
        RelocKind::Abs32 | RelocKind::TlsDtpMod32 | RelocKind::TlsDtpRel32 => {
            Ok(i32::from_le_bytes(bytes[0..4].try_into().unwrap()) as i64)
        }
        RelocKind::Abs64 | RelocKind::TlsDtpMod64 => {
            Ok(i64::from_le_bytes(bytes[0..8].try_into().unwrap()))
        }
        RelocKind::Relative | RelocKind::Irelative => Ok(if config.is64 {
            i64::from_le_bytes(bytes[0..8].try_into().unwrap())
        } else {
            i32::from_le_bytes(bytes[0..4].try_into().unwrap()) as i64
        }),
        RelocKind::None | RelocKind::JumpSlot => Ok(0),
        _ => Err(internal(alloc::format!(
            "{kind:?} has no implicit addend in REL form"
        ))),
    }
}

/// `getDynRel`: the dynamic relocation actually emitted for a symbolic
/// relocation kind, or `R_RISCV_NONE` if this kind has no dynamic-linking
/// counterpart.
pub fn get_dyn_rel(kind: RelocKind, symbolic: RelocKind) -> RelocKind {
    if kind == symbolic {
        kind
    } else {
        RelocKind::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> LinkConfig {
        LinkConfig {
            is64: true,
            is_cheri_abi: false,
            capability_size: 16,
            wordsize: 8,
            relax: false,
            relocatable: false,
            write_addends: false,
            eflags: 0,
        }
    }

    #[test]
    fn abs32_reads_signed_le() {
        let bytes = (-5i32).to_le_bytes();
        assert_eq!(
            get_implicit_addend(&bytes, RelocKind::Abs32, &cfg()).unwrap(),
            -5
        );
    }

    #[test]
    fn abs64_reads_signed_le() {
        let bytes = (-9_000_000_000i64).to_le_bytes();
        assert_eq!(
            get_implicit_addend(&bytes, RelocKind::Abs64, &cfg()).unwrap(),
            -9_000_000_000
        );
    }

    #[test]
    fn unsupported_kind_is_internal_error() {
        let bytes = [0u8; 8];
        assert!(get_implicit_addend(&bytes, RelocKind::Branch, &cfg()).is_err());
    }

    #[test]
    fn none_and_jump_slot_are_zero() {
        let bytes = [0xffu8; 8];
        assert_eq!(
            get_implicit_addend(&bytes, RelocKind::None, &cfg()).unwrap(),
            0
        );
        assert_eq!(
            get_implicit_addend(&bytes, RelocKind::JumpSlot, &cfg()).unwrap(),
            0
        );
    }

    #[test]
    fn tls_dtpmod32_reads_signed_le() {
        let bytes = (-3i32).to_le_bytes();
        assert_eq!(
            get_implicit_addend(&bytes, RelocKind::TlsDtpMod32, &cfg()).unwrap(),
            -3
        );
    }

    #[test]
    fn relative_width_follows_is64() {
        let wide = (-7i64).to_le_bytes();
        assert_eq!(
            get_implicit_addend(&wide, RelocKind::Relative, &cfg()).unwrap(),
            -7
        );
        let narrow_cfg = LinkConfig { is64: false, ..cfg() };
        let narrow = (-7i32).to_le_bytes();
        assert_eq!(
            get_implicit_addend(&narrow, RelocKind::Irelative, &narrow_cfg).unwrap(),
            -7
        );
    }

    #[test]
    fn dyn_rel_matches_only_symbolic() {
        assert_eq!(
            get_dyn_rel(RelocKind::Abs64, RelocKind::Abs64),
            RelocKind::Abs64
        );
        assert_eq!(
            get_dyn_rel(RelocKind::Abs32, RelocKind::Abs64),
            RelocKind::None
        );
    }
}
