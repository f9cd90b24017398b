//! Iterative relaxation: shrinking executable sections by collapsing
//! `CALL`/compartment-pointer macro pairs to a fixed point, then finalizing
//! the section into a compacted buffer.
//!
//! The global symbol table and output-section list are owned by the driver;
//! this module only needs read/write access to the handful of values a pass
//! touches, exposed through the small set of callbacks [`relax_once`] takes.

pub mod anchor;
pub mod call;
pub mod cgp;
pub mod finalize;
pub mod prepass;

use alloc::vec;
use alloc::vec::Vec;

use crate::context::LinkConfig;
use crate::reloc::kind::{RelocKind, Relocation};
use crate::reloc::numbers::EF_RISCV_RVC;
use crate::symbol::ResolvedSymbol;

use anchor::{Anchor, AnchorDeltaState};

/// A replacement instruction word queued for [`finalize::finalize`] to
/// splice in at a relocation's offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Write {
    Half(u16),
    Word(u32),
}

/// Passes after which the fixed-point search gives up. Real inputs converge
/// in two or three passes; exhausting this is treated as a bug rather than
/// a property of the input (open question (b): fail loudly, never emit a
/// possibly-stale shrink).
pub const MAX_PASSES: u32 = 64;

/// Per-section bookkeeping threaded across relaxation passes.
#[derive(Debug)]
pub struct RelaxAux {
    pub anchors: Vec<Anchor>,
    anchor_states: Vec<AnchorDeltaState>,
    /// Cumulative bytes removed up to and including relocation `i`, as of
    /// the most recently completed pass.
    pub reloc_deltas: Vec<u64>,
    /// Per-relocation outcome of the most recent pass; `RelocKind::None`
    /// means unchanged.
    pub reloc_types: Vec<RelocKind>,
    /// Replacement word queued by the most recent pass for relocation `i`,
    /// aligned 1:1 with `reloc_types`.
    pub writes: Vec<Option<Write>>,
}

impl RelaxAux {
    pub fn new(anchors: Vec<Anchor>, reloc_count: usize) -> Self {
        let anchor_count = anchors.len();
        Self {
            anchors,
            anchor_states: vec![AnchorDeltaState::default(); anchor_count],
            reloc_deltas: vec![0; reloc_count],
            reloc_types: vec![RelocKind::None; reloc_count],
            writes: vec![None; reloc_count],
        }
    }
}

/// One executable input section's view for relaxation.
pub struct ExecSection {
    pub base_va: u64,
    /// Offsets are in original (pre-shrink) section coordinates for the
    /// whole relaxation loop; finalize is what rebases them.
    pub relocations: Vec<Relocation>,
    pub aux: RelaxAux,
    pub bytes_dropped: u64,
}

impl ExecSection {
    pub fn new(base_va: u64, relocations: Vec<Relocation>, anchors: Vec<Anchor>) -> Self {
        let count = relocations.len();
        Self {
            base_va,
            relocations,
            aux: RelaxAux::new(anchors, count),
            bytes_dropped: 0,
        }
    }
}

/// Read/write access a pass needs into data this module does not own: the
/// symbol table and the section's raw instruction bytes.
pub trait RelaxEnv {
    fn resolve_symbol(&self, symbol: u32) -> ResolvedSymbol;
    /// The symbol's PLT slot VA, if it has one (only consulted for
    /// `CALL_PLT`).
    fn resolve_plt(&self, symbol: u32) -> Option<u64>;
    /// Reads the 32-bit instruction word at an original section offset.
    fn read_word(&self, section_offset: u64) -> u32;
    /// The classifier-computed biased CGP hi-immediate for a
    /// `COMPARTMENT_HI` relocation's target; zero means the pair collapses.
    fn compartment_hi_offset(&self, symbol: u32, addend: i64) -> i32;
    fn symbol_value(&self, symbol: u32) -> u64;
    fn set_symbol_value(&mut self, symbol: u32, value: u64);
    fn set_symbol_size(&mut self, symbol: u32, size: u64);
}

fn align_bytes_to_remove(addend: i64, loc: u64) -> u64 {
    let alignment = (addend as u64) + 2;
    let needed = (alignment - (loc % alignment)) % alignment;
    (addend as u64).saturating_sub(needed)
}

fn paired_relax_hint(relocations: &[Relocation], i: usize) -> bool {
    let r = &relocations[i];
    matches!(relocations.get(i + 1), Some(next) if next.offset == r.offset && next.kind == RelocKind::Relax)
}

/// Runs one relaxation pass over `section`. Returns `true` if any
/// relocation's cumulative delta changed relative to the previous pass.
pub fn relax_once(section: &mut ExecSection, config: &LinkConfig, env: &mut impl RelaxEnv) -> bool {
    let rvc_enabled = config.eflags & EF_RISCV_RVC != 0;

    for t in section.aux.reloc_types.iter_mut() {
        *t = RelocKind::None;
    }
    for w in section.aux.writes.iter_mut() {
        *w = None;
    }

    let mut delta: u64 = 0;
    let mut anchor_cursor = 0usize;
    let mut changed = false;
    let n = section.relocations.len();

    for i in 0..n {
        let r = section.relocations[i].clone();
        // A relocation sharing its offset with the one just processed (a
        // RELAX hint, or a LO following its HI) can see a `loc` behind its
        // own offset; it never reads `loc` in that case, so compute it in
        // i64 space to avoid an underflow panic rather than to produce a
        // meaningful address.
        let loc = (section.base_va as i64 + r.offset as i64 - delta as i64) as u64;
        let mut remove = 0u64;

        if r.kind == RelocKind::Align {
            remove = align_bytes_to_remove(r.addend, loc);
            section.aux.reloc_types[i] = RelocKind::Align;
        } else if r.kind.is_call_macro() && paired_relax_hint(&section.relocations, i) {
            let sym = env.resolve_symbol(r.symbol);
            let plt_va = env.resolve_plt(r.symbol);
            let base = if r.kind == RelocKind::CallPlt {
                plt_va.unwrap_or(sym.value)
            } else {
                sym.value
            };
            let dest = base.wrapping_add(r.addend as u64);
            let second_word = env.read_word(r.offset + 4);
            let rd = (second_word >> 7) & 0x1f;
            let cheri = r.kind == RelocKind::CheriCcall;
            let out = call::relax_call(rd, dest, loc, rvc_enabled, !config.is64, cheri);
            remove = out.bytes_removed;
            section.aux.reloc_types[i] = out.new_kind;
            section.aux.writes[i] = out.write;
        } else if r.kind.is_compartment() && paired_relax_hint(&section.relocations, i) {
            let hi_offset = env.compartment_hi_offset(r.symbol, r.addend);
            if cgp::is_collapsible(hi_offset) {
                match r.kind {
                    RelocKind::CompartmentHi => {
                        let out = cgp::relax_hi();
                        remove = out.remove;
                        section.aux.reloc_types[i] = cgp::HI_COLLAPSED_KIND;
                    }
                    RelocKind::CompartmentLoI | RelocKind::CompartmentLoS => {
                        let word = env.read_word(r.offset);
                        let out = cgp::relax_lo(word);
                        section.aux.reloc_types[i] = r.kind;
                        section.aux.writes[i] = Some(Write::Word(out.rewritten_word));
                    }
                    _ => {}
                }
            }
        }

        // Drain anchors at or before this relocation's original offset,
        // before delta is updated for this relocation's own removal.
        while anchor_cursor < section.aux.anchors.len()
            && section.aux.anchors[anchor_cursor].offset <= r.offset
        {
            let anchor = section.aux.anchors[anchor_cursor];
            if anchor.end {
                let start_value = env.symbol_value(anchor.symbol);
                let size = anchor::drain_end(anchor.offset, delta, start_value);
                env.set_symbol_size(anchor.symbol, size);
            } else {
                let old_value = env.symbol_value(anchor.symbol);
                let state = &mut section.aux.anchor_states[anchor_cursor];
                let new_value = anchor::drain_start(old_value, delta, state);
                env.set_symbol_value(anchor.symbol, new_value);
            }
            anchor_cursor += 1;
        }

        delta += remove;
        if section.aux.reloc_deltas[i] != delta {
            section.aux.reloc_deltas[i] = delta;
            changed = true;
        }
    }

    while anchor_cursor < section.aux.anchors.len() {
        let anchor = section.aux.anchors[anchor_cursor];
        if anchor.end {
            let start_value = env.symbol_value(anchor.symbol);
            let size = anchor::drain_end(anchor.offset, delta, start_value);
            env.set_symbol_size(anchor.symbol, size);
        } else {
            let old_value = env.symbol_value(anchor.symbol);
            let state = &mut section.aux.anchor_states[anchor_cursor];
            let new_value = anchor::drain_start(old_value, delta, state);
            env.set_symbol_value(anchor.symbol, new_value);
        }
        anchor_cursor += 1;
    }

    section.bytes_dropped = delta;
    changed
}

/// Drives [`relax_once`] to a fixed point, bounded by [`MAX_PASSES`].
/// Returns an error if no pass reports convergence within the cap.
pub fn relax(
    sections: &mut [ExecSection],
    config: &LinkConfig,
    env: &mut impl RelaxEnv,
) -> crate::error::Result<()> {
    for pass in 0..MAX_PASSES {
        let mut any_changed = false;
        for section in sections.iter_mut() {
            if relax_once(section, config, env) {
                any_changed = true;
            }
        }
        if !any_changed {
            return Ok(());
        }
        let _ = pass;
    }
    Err(crate::error::internal(
        "relaxation did not converge within the pass cap",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashMap;

    struct TestEnv {
        symbols: HashMap<u32, ResolvedSymbol>,
        values: HashMap<u32, u64>,
        sizes: HashMap<u32, u64>,
        words: HashMap<u64, u32>,
    }

    impl RelaxEnv for TestEnv {
        fn resolve_symbol(&self, symbol: u32) -> ResolvedSymbol {
            self.symbols[&symbol]
        }
        fn resolve_plt(&self, _symbol: u32) -> Option<u64> {
            None
        }
        fn read_word(&self, section_offset: u64) -> u32 {
            *self.words.get(&section_offset).unwrap_or(&0)
        }
        fn compartment_hi_offset(&self, _symbol: u32, _addend: i64) -> i32 {
            0
        }
        fn symbol_value(&self, symbol: u32) -> u64 {
            self.values[&symbol]
        }
        fn set_symbol_value(&mut self, symbol: u32, value: u64) {
            self.values.insert(symbol, value);
        }
        fn set_symbol_size(&mut self, symbol: u32, size: u64) {
            self.sizes.insert(symbol, size);
        }
    }

    fn config() -> LinkConfig {
        LinkConfig {
            is64: true,
            is_cheri_abi: false,
            capability_size: 16,
            wordsize: 8,
            relax: true,
            relocatable: false,
            write_addends: false,
            eflags: EF_RISCV_RVC,
        }
    }

    #[test]
    fn align_pass_removes_reserved_padding_once_address_is_known() {
        // loc (8) is already 8-aligned, so all 6 reserved bytes are spare.
        let relocs = alloc::vec![Relocation::new(8, RelocKind::Align, 0, 6)];
        let mut section = ExecSection::new(0, relocs, Vec::new());
        let mut env = TestEnv {
            symbols: HashMap::new(),
            values: HashMap::new(),
            sizes: HashMap::new(),
            words: HashMap::new(),
        };
        let changed = relax_once(&mut section, &config(), &mut env);
        assert!(changed);
        assert_eq!(section.bytes_dropped, align_bytes_to_remove(6, 8));
        assert_eq!(section.bytes_dropped, 6);
    }

    #[test]
    fn call_pair_with_relax_hint_shrinks_to_compressed_jump() {
        let relocs = alloc::vec![
            Relocation::new(0, RelocKind::Call, 1, 0),
            Relocation::new(0, RelocKind::Relax, 0, 0),
        ];
        let mut section = ExecSection::new(0, relocs, Vec::new());
        let mut symbols = HashMap::new();
        symbols.insert(
            1,
            ResolvedSymbol {
                value: 1000,
                pc_capability_relative: false,
                cgp_relative: false,
                absolute: false,
            },
        );
        let mut words = HashMap::new();
        words.insert(4, 0); // jalr x0, ... -> rd = 0
        let mut env = TestEnv {
            symbols,
            values: HashMap::new(),
            sizes: HashMap::new(),
            words,
        };
        let changed = relax_once(&mut section, &config(), &mut env);
        assert!(changed);
        assert_eq!(section.aux.reloc_types[0], RelocKind::RvcJump);
        assert_eq!(section.bytes_dropped, 6);
    }

    #[test]
    fn converges_reports_no_further_change_on_second_pass() {
        let relocs = alloc::vec![Relocation::new(8, RelocKind::Align, 0, 6)];
        let mut section = ExecSection::new(0, relocs, Vec::new());
        let mut env = TestEnv {
            symbols: HashMap::new(),
            values: HashMap::new(),
            sizes: HashMap::new(),
            words: HashMap::new(),
        };
        assert!(relax_once(&mut section, &config(), &mut env));
        assert!(!relax_once(&mut section, &config(), &mut env));
    }

    #[test]
    fn anchors_drain_start_and_end_around_a_shrinking_relocation() {
        let relocs = alloc::vec![
            Relocation::new(0, RelocKind::Call, 1, 0),
            Relocation::new(0, RelocKind::Relax, 0, 0),
        ];
        let anchors = alloc::vec![Anchor::start(0, 7), Anchor::end(20, 7)];
        let mut section = ExecSection::new(0, relocs, anchors);
        let mut symbols = HashMap::new();
        symbols.insert(
            1,
            ResolvedSymbol {
                value: 1000,
                pc_capability_relative: false,
                cgp_relative: false,
                absolute: false,
            },
        );
        let mut values = HashMap::new();
        values.insert(7, 0u64);
        let mut words = HashMap::new();
        words.insert(4, 0);
        let mut env = TestEnv {
            symbols,
            values,
            sizes: HashMap::new(),
            words,
        };
        relax_once(&mut section, &config(), &mut env);
        // start anchor sits at offset 0, drained before any delta accrues
        assert_eq!(env.values[&7], 0);
        // end anchor drained with the full pass delta (6 bytes removed)
        assert_eq!(env.sizes[&7], 20 - 6 - 0);
    }
}
