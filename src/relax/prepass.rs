//! CHERIoT low-relocation rewrite pre-pass.
//!
//! CHERIoT reuses `COMPARTMENT_LO_I`/`COMPARTMENT_LO_S` for both PC-relative
//! and CGP-relative low halves; a `LO_I` nominally targets the paired `HI`
//! instruction. If that `HI` turns out to be CGP-relative it becomes
//! eligible for deletion by [`super::cgp::relax_hi`], which would strand the
//! `LO_I`'s anchor. Resolving this once, before any section shrinks, avoids
//! having to chase rewrite chains mid-pass (depth 1 only, by design).

use crate::error::{lookup_failure, Result};
use crate::reloc::kind::{Relocation, RelocKind};
use crate::symbol::ResolvedSymbol;

/// Finds the `HI` relocation paired with a `LO_I`/`LO_S` at `symbol_value`
/// within the `HI`'s own section relocation list (sorted by offset, as
/// required before relaxation begins).
pub fn find_paired_hi(hi_section_relocs: &[Relocation], symbol_value: u64) -> Option<&Relocation> {
    hi_section_relocs
        .binary_search_by_key(&symbol_value, |r| r.offset)
        .ok()
        .map(|i| &hi_section_relocs[i])
}

/// Rewrites one `LO_I`/`LO_S` relocation in place if its paired `HI` is
/// CGP-relative; a no-op otherwise. `hi` is the paired instruction's own
/// relocation (already resolved via [`find_paired_hi`]); `hi_symbol` is that
/// relocation's resolved target.
pub fn rewrite_if_cgp_relative(
    lo: &mut Relocation,
    hi: &Relocation,
    hi_symbol: &ResolvedSymbol,
) -> Result<()> {
    if hi_symbol.absolute {
        return Err(lookup_failure(
            "CHERIoT low relocation's paired HI targets an absolute symbol",
        ));
    }
    if hi_symbol.cgp_relative {
        lo.symbol = hi.symbol;
        lo.addend = hi.addend;
    }
    Ok(())
}

/// Runs the pre-pass over one section's relocations, given a resolver for
/// the defining section's relocation list and the resolved symbol for each
/// `HI` candidate. `resolve_symbol` maps a symbol index to its
/// [`ResolvedSymbol`]; `hi_section_of` maps a symbol index to the
/// relocation list of the section it is defined in (`None` if the symbol is
/// absolute or otherwise has no owning section).
pub fn run(
    relocs: &mut [Relocation],
    resolve_symbol: impl Fn(u32) -> ResolvedSymbol,
    hi_section_of: impl Fn(u32) -> Option<alloc::vec::Vec<Relocation>>,
) -> Result<()> {
    for i in 0..relocs.len() {
        let (kind, symbol) = (relocs[i].kind, relocs[i].symbol);
        if !matches!(kind, RelocKind::CompartmentLoI | RelocKind::CompartmentLoS) {
            continue;
        }
        let sym = resolve_symbol(symbol);
        if !sym.pc_capability_relative {
            continue;
        }
        let Some(hi_section) = hi_section_of(symbol) else {
            return Err(lookup_failure(
                "CHERIoT low relocation targets a symbol with no owning section",
            ));
        };
        let Some(hi) = find_paired_hi(&hi_section, sym.value) else {
            return Err(lookup_failure(
                "CHERIoT low relocation has no paired HI at the target symbol's value",
            ));
        };
        let hi_symbol = resolve_symbol(hi.symbol);
        rewrite_if_cgp_relative(&mut relocs[i], hi, &hi_symbol)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(value: u64, pc_cap: bool, cgp: bool, absolute: bool) -> ResolvedSymbol {
        ResolvedSymbol {
            value,
            pc_capability_relative: pc_cap,
            cgp_relative: cgp,
            absolute,
        }
    }

    #[test]
    fn rewrites_lo_when_hi_is_cgp_relative() {
        let hi = Relocation::new(100, RelocKind::CompartmentHi, 9, 3);
        let mut lo = Relocation::new(104, RelocKind::CompartmentLoI, 5, 0);
        let hi_symbol = sym(0, false, true, false);
        rewrite_if_cgp_relative(&mut lo, &hi, &hi_symbol).unwrap();
        assert_eq!(lo.symbol, 9);
        assert_eq!(lo.addend, 3);
    }

    #[test]
    fn leaves_lo_untouched_when_hi_is_pc_relative() {
        let hi = Relocation::new(100, RelocKind::CompartmentHi, 9, 3);
        let mut lo = Relocation::new(104, RelocKind::CompartmentLoI, 5, 0);
        let hi_symbol = sym(0, true, false, false);
        rewrite_if_cgp_relative(&mut lo, &hi, &hi_symbol).unwrap();
        assert_eq!(lo.symbol, 5);
    }

    #[test]
    fn errors_when_hi_targets_absolute_symbol() {
        let hi = Relocation::new(100, RelocKind::CompartmentHi, 9, 3);
        let mut lo = Relocation::new(104, RelocKind::CompartmentLoI, 5, 0);
        let hi_symbol = sym(0, false, false, true);
        assert!(rewrite_if_cgp_relative(&mut lo, &hi, &hi_symbol).is_err());
    }

    #[test]
    fn find_paired_hi_locates_by_offset() {
        let relocs = alloc::vec![
            Relocation::new(0, RelocKind::CompartmentHi, 1, 0),
            Relocation::new(100, RelocKind::CompartmentHi, 2, 0),
        ];
        assert!(find_paired_hi(&relocs, 100).is_some());
        assert!(find_paired_hi(&relocs, 50).is_none());
    }
}
