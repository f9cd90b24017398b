//! Relocation classifier: a total function from relocation kind to the
//! "expression class" that tells the outer relocation engine what value to
//! compute before handing it to the applier.

use super::kind::{RelocKind, Relocation};
use crate::context::LinkContext;
use crate::error::{internal, lookup_failure, Error, Result};
use crate::symbol::ResolvedSymbol;

/// What value the caller must compute for a relocation before applying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprClass {
    /// Skip entirely.
    None,
    /// `S + A`
    Abs,
    /// `S + A - P`
    Pc,
    /// `PLT(S) + A - P`
    PltPc,
    /// `GOT(S) + A - P`
    GotPc,
    /// Look up the paired hi20 relocation at the location `S` points to and
    /// reuse its already-computed value.
    PcIndirect,
    /// TLS general-dynamic, PC-relative to the GOT/captable TLS block.
    TlsGdPc,
    /// Thread-pointer-relative (TPREL) displacement.
    TpRel,
    /// CHERI capability-table slot, PC-relative.
    CheriCapTabPc,
    /// CHERIoT compartment-globals-pointer relative.
    CheriotCgpRel,
    /// Only meaningful when relaxation is enabled; otherwise behaves as
    /// `None` — `R_RISCV_RELAX` without `config.relax` silently degrades to
    /// a no-op.
    RelaxHint,
}

/// Classifies `rel`, consulting `ctx` for relaxation/CHERI configuration and
/// `symbol` for the `CHERIOT_COMPARTMENT_HI` PC-vs-CGP branch. That branch is
/// why the CHERIoT low-relocation rewrite pre-pass exists: it resolves which
/// case applies before classification runs.
///
/// Unknown kinds are reported as a user error naming the relocation's
/// offset; the caller is expected to have already resolved `rel.symbol` to a
/// name for the error message (passed in as `symbol_name`).
pub fn classify(
    ctx: &mut LinkContext,
    rel: &Relocation,
    symbol: Option<&ResolvedSymbol>,
    symbol_name: Option<&str>,
) -> Result<ExprClass> {
    use RelocKind::{
        Abs32, Abs64, Add8, Add16, Add32, Add64, Align, Branch, Call, CallPlt, CapTabPcrelHi20,
        CheriCapability, CheriCcall, CheriCjal, CheriRvcCjump, CompartmentHi, CompartmentLoI,
        CompartmentLoS, CompartmentSize, GotHi20, Hi20, Irelative, Jal, JumpSlot, Lo12I, Lo12S,
        PcrelHi20, PcrelLo12I, PcrelLo12S, Relax, Relative, RvcBranch, RvcJump, RvcLui, Set6,
        Set8, Set16, Set32, Sub6, Sub8, Sub16, Sub32, Sub64, TlsDtpMod32, TlsDtpMod64,
        TlsDtpRel32, TlsDtpRel64, TlsGdCapTab, TlsGdHi20, TlsGotHi20, TlsIeCapTab, TprelAdd,
        TprelHi20, TprelLo12I, TprelLo12S,
    };
    let class = match rel.kind {
        RelocKind::None => ExprClass::None,
        Align => ExprClass::None,

        Relax => {
            if ctx.config.relax {
                ExprClass::RelaxHint
            } else {
                ExprClass::None
            }
        }

        Abs32 | Abs64 | Add8 | Add16 | Add32 | Add64 | Sub8 | Sub16 | Sub32 | Sub64 | Sub6
        | Set6 | Set8 | Set16 | Set32 | Hi20 | Lo12I | Lo12S => ExprClass::Abs,

        Branch | Jal | RvcBranch | RvcJump | RvcLui | CheriCjal | CheriRvcCjump | Call
        | PcrelHi20 => ExprClass::Pc,

        CallPlt => ExprClass::PltPc,
        CheriCcall => {
            if ctx.config.is_cheri_abi {
                ExprClass::PltPc
            } else {
                ExprClass::Pc
            }
        }

        GotHi20 => ExprClass::GotPc,

        PcrelLo12I | PcrelLo12S => ExprClass::PcIndirect,

        TlsGotHi20 => {
            ctx.mark_static_tls_model();
            ExprClass::GotPc
        }
        TlsGdHi20 => ExprClass::TlsGdPc,
        TprelHi20 | TprelLo12I | TprelLo12S | TprelAdd => ExprClass::TpRel,

        TlsDtpRel32 | TlsDtpRel64 | TlsDtpMod32 | TlsDtpMod64 => ExprClass::Abs,

        Relative | Irelative | JumpSlot => {
            return Err(internal(alloc::format!(
                "{:?} is a dynamic-relocation-only kind and never appears in REL-form object input",
                rel.kind
            )))
        }

        CheriCapability => ExprClass::Abs,
        CapTabPcrelHi20 => ExprClass::CheriCapTabPc,
        TlsIeCapTab => ExprClass::CheriCapTabPc,
        TlsGdCapTab => ExprClass::TlsGdPc,

        CompartmentHi => {
            let sym = symbol.ok_or_else(|| {
                lookup_failure("COMPARTMENT_HI relocation has no resolved symbol")
            })?;
            if sym.pc_capability_relative {
                ExprClass::Pc
            } else {
                ExprClass::CheriotCgpRel
            }
        }
        CompartmentLoI | CompartmentLoS => ExprClass::PcIndirect,
        CompartmentSize => ExprClass::Abs,
    };
    let _ = symbol_name;
    Ok(class)
}

/// Convenience used only by callers that already know a relocation is
/// unrecognized (raw code didn't map to a [`RelocKind`]) and need the
/// standard user-visible error.
pub fn unknown_kind_error(offset: u64, raw: u32, symbol_name: Option<&str>) -> Error {
    crate::error::malformed_relocation(
        offset,
        symbol_name,
        alloc::format!("unrecognized relocation type {raw}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{LinkConfig, LinkContext};

    fn cfg(relax: bool, cheri: bool) -> LinkContext {
        LinkContext::new(LinkConfig {
            is64: true,
            is_cheri_abi: cheri,
            capability_size: 16,
            wordsize: 8,
            relax,
            relocatable: false,
            write_addends: false,
            eflags: 0,
        })
    }

    #[test]
    fn relax_hint_depends_on_config() {
        let rel = Relocation::new(0, RelocKind::Relax, 0, 0);
        let mut on = cfg(true, false);
        assert_eq!(
            classify(&mut on, &rel, None, None).unwrap(),
            ExprClass::RelaxHint
        );
        let mut off = cfg(false, false);
        assert_eq!(classify(&mut off, &rel, None, None).unwrap(), ExprClass::None);
    }

    #[test]
    fn tls_got_hi20_sets_static_tls_flag() {
        let rel = Relocation::new(0, RelocKind::TlsGotHi20, 0, 0);
        let mut ctx = cfg(false, false);
        assert!(!ctx.has_static_tls_model());
        classify(&mut ctx, &rel, None, None).unwrap();
        assert!(ctx.has_static_tls_model());
    }

    #[test]
    fn compartment_hi_branches_on_symbol() {
        let rel = Relocation::new(0, RelocKind::CompartmentHi, 0, 0);
        let mut ctx = cfg(false, true);
        let pc_rel = ResolvedSymbol {
            value: 0,
            pc_capability_relative: true,
            cgp_relative: false,
            absolute: false,
        };
        assert_eq!(
            classify(&mut ctx, &rel, Some(&pc_rel), None).unwrap(),
            ExprClass::Pc
        );
        let cgp_rel = ResolvedSymbol {
            value: 0,
            pc_capability_relative: false,
            cgp_relative: true,
            absolute: false,
        };
        assert_eq!(
            classify(&mut ctx, &rel, Some(&cgp_rel), None).unwrap(),
            ExprClass::CheriotCgpRel
        );
    }

    #[test]
    fn compartment_hi_without_symbol_errors() {
        let rel = Relocation::new(0, RelocKind::CompartmentHi, 0, 0);
        let mut ctx = cfg(false, true);
        assert!(classify(&mut ctx, &rel, None, None).is_err());
    }

    #[test]
    fn dynamic_only_kinds_never_classify() {
        let mut ctx = cfg(false, false);
        for kind in [RelocKind::Relative, RelocKind::Irelative, RelocKind::JumpSlot] {
            let rel = Relocation::new(0, kind, 0, 0);
            assert!(classify(&mut ctx, &rel, None, None).is_err());
        }
    }
}
