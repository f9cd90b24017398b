//! GOT/PLT synthesis: `.got`, `.got.plt`/`.igot.plt` slots, PLT header and
//! per-symbol PLT entries.
//!
//! Slot bookkeeping uses `got_map`/`plt_map` keyed by symbol index with
//! `hashbrown::HashMap::entry`-based allocation rather than a flat `Vec`
//! scanned on every lookup.

use hashbrown::HashMap;

use crate::context::LinkConfig;

/// One allocated GOT or PLT slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEntry {
    /// Slot index into `.got.plt` / `.igot.plt`.
    Got(u32),
    /// Slot index into `.plt`.
    Plt(u32),
}

/// Tracks which symbols have been assigned GOT/PLT slots and the running
/// slot counts.
#[derive(Debug, Default)]
pub struct PltGotTable {
    got_map: HashMap<u32, SlotEntry>,
    plt_map: HashMap<u32, SlotEntry>,
    next_got: u32,
    next_plt: u32,
}

impl PltGotTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing GOT slot for `symbol`, or allocates a fresh one.
    pub fn got_slot(&mut self, symbol: u32) -> u32 {
        match self.got_map.entry(symbol) {
            hashbrown::hash_map::Entry::Occupied(e) => match e.get() {
                SlotEntry::Got(i) => *i,
                SlotEntry::Plt(_) => unreachable!("symbol already has a PLT-only slot"),
            },
            hashbrown::hash_map::Entry::Vacant(e) => {
                let idx = self.next_got;
                self.next_got += 1;
                e.insert(SlotEntry::Got(idx));
                idx
            }
        }
    }

    /// Returns the existing PLT slot for `symbol`, or allocates a fresh one.
    pub fn plt_slot(&mut self, symbol: u32) -> u32 {
        match self.plt_map.entry(symbol) {
            hashbrown::hash_map::Entry::Occupied(e) => match e.get() {
                SlotEntry::Plt(i) => *i,
                SlotEntry::Got(_) => unreachable!("symbol already has a GOT-only slot"),
            },
            hashbrown::hash_map::Entry::Vacant(e) => {
                let idx = self.next_plt;
                self.next_plt += 1;
                e.insert(SlotEntry::Plt(idx));
                idx
            }
        }
    }

    pub fn got_count(&self) -> u32 {
        self.next_got
    }

    pub fn plt_count(&self) -> u32 {
        self.next_plt
    }
}

const PLT_ENTRY_SIZE: u64 = 16;
const PLT_HEADER_SIZE: u64 = 32;

/// `.got[0]`: VA of `_DYNAMIC`.
pub fn got_header(config: &LinkConfig, dynamic_va: u64) -> alloc::vec::Vec<u8> {
    write_word(config, dynamic_va)
}

/// `.got.plt[0..1]`: reserved for `_dl_runtime_resolve`/`link_map`, filled by
/// the dynamic linker at load time; written here as zero placeholders.
pub fn got_plt_reserved(config: &LinkConfig) -> alloc::vec::Vec<u8> {
    let mut v = write_word(config, 0);
    v.extend(write_word(config, 0));
    v
}

/// Per-symbol `.got.plt[i]`: VA of the PLT header (the lazy-binding
/// trampoline target every slot initially resolves to).
pub fn got_plt_slot(config: &LinkConfig, plt_header_va: u64) -> alloc::vec::Vec<u8> {
    write_word(config, plt_header_va)
}

/// Per-symbol `.igot.plt[i]`: VA of the symbol directly when addends are
/// written ahead of time, else zero.
pub fn igot_plt_slot(config: &LinkConfig, symbol_va: u64) -> alloc::vec::Vec<u8> {
    write_word(config, if config.write_addends { symbol_va } else { 0 })
}

fn write_word(config: &LinkConfig, value: u64) -> alloc::vec::Vec<u8> {
    if config.is64 {
        value.to_le_bytes().to_vec()
    } else {
        (value as u32).to_le_bytes().to_vec()
    }
}

// RV32I/RV64I base opcodes used by the trampolines below. `encode_i`/
// `encode_r`/`encode_u` take the opcode with funct3/funct7 already folded
// in, so each constant here bakes in the specific instruction, not just the
// 7-bit opcode field.
const OP_AUIPC: u32 = 0x17;
const OP_ADDI: u32 = 0x13;
const OP_SRLI: u32 = 0x13 | (0b101 << 12);
const OP_SUB: u32 = 0x33 | (0b0100000 << 25);
const OP_JALR: u32 = 0x67;
/// `auipcc`: same major opcode as `auipc`, capability mode distinguishes it.
const OP_AUIPCC: u32 = 0x17;
/// `clc`: capability-sized load, CHERIoT vendor encoding.
const OP_CLC: u32 = 0x5b | (0b011 << 12);
/// `cjalr`: same major opcode as `jalr`, capability mode distinguishes it.
const OP_CJALR: u32 = 0x67;
fn op_load(is64: bool) -> u32 {
    0x03 | (if is64 { 0b011 } else { 0b010 } << 12)
}

fn lo12_u(lo: i32) -> u32 {
    (lo as u32) & 0xFFF
}

/// Emits the PLT header. Under CHERI ABI this is `pltHeaderSize` bytes of
/// trapping padding (lazy CHERI PLT binding is out of scope); otherwise the
/// eight-instruction lazy-binding trampoline, plus a trailing `nop` unless
/// `shift == 0` elides it — so the returned length is `PLT_HEADER_SIZE` or
/// `PLT_HEADER_SIZE + 4`, not a fixed 32 bytes.
pub fn write_plt_header(
    config: &LinkConfig,
    gotplt_to_plt_disp: i64,
) -> Result<alloc::vec::Vec<u8>, crate::error::Error> {
    if config.is_cheri_abi {
        return Ok(alloc::vec![0u8; PLT_HEADER_SIZE as usize]);
    }
    use crate::encode::{encode_i, encode_r, encode_u, hi20, lo12};
    if !crate::encode::fits_signed(gotplt_to_plt_disp.wrapping_add(0x800) >> 12, 20) {
        return Err(crate::error::malformed_relocation(
            0,
            None,
            "PLT header displacement to .got.plt out of range",
        ));
    }
    let hi = hi20(gotplt_to_plt_disp as i32);
    let lo = lo12_u(lo12(gotplt_to_plt_disp as i32));
    let ptr_size = config.ptr_size();
    let shift = (PLT_ENTRY_SIZE / u64::from(ptr_size)).trailing_zeros();
    let load = op_load(config.is64);
    let mut out = alloc::vec::Vec::with_capacity(PLT_HEADER_SIZE as usize + 4);
    out.extend(encode_u(OP_AUIPC, 7, hi as u32).to_le_bytes()); // auipc t2, hi20(gotplt - plt)
    out.extend(encode_r(OP_SUB, 6, 6, 28).to_le_bytes()); // sub t1, t1, t3
    out.extend(encode_i(load, 28, 7, lo).to_le_bytes()); // l{w,d} t3, lo(t2)
    let off = -(PLT_HEADER_SIZE as i32) - 12;
    out.extend(encode_i(OP_ADDI, 6, 6, off as u32 & 0xFFF).to_le_bytes()); // addi t1, t1, off
    out.extend(encode_i(OP_ADDI, 5, 7, lo).to_le_bytes()); // addi t0, t2, lo
    out.extend(encode_i(OP_SRLI, 6, 6, shift).to_le_bytes()); // srli t1, t1, shift
    out.extend(encode_i(load, 5, 5, ptr_size).to_le_bytes()); // l{w,d} t0, ptrSize(t0)
    out.extend(encode_i(OP_JALR, 0, 28, 0).to_le_bytes()); // jalr x0, t3, 0
    if shift != 0 {
        out.extend(OP_ADDI.to_le_bytes()); // addi x0, x0, 0 (nop)
    }
    Ok(out)
}

/// Emits one 16-byte PLT entry for a symbol whose GOT/captable slot
/// displacement (from this entry) is `slot_disp`. Under CHERI ABI, `slot_disp`
/// is the displacement to `captable[S]` and the capability forms
/// (`auipcc`/`clc`/`cjalr`) are emitted instead of the integer ones.
pub fn write_plt_entry(
    config: &LinkConfig,
    slot_disp: i64,
) -> Result<[u8; 16], crate::error::Error> {
    use crate::encode::{encode_i, encode_u, hi20, lo12};
    if !crate::encode::fits_signed(slot_disp.wrapping_add(0x800) >> 12, 20) {
        return Err(crate::error::malformed_relocation(
            0,
            None,
            "PLT entry displacement to GOT/captable slot out of range",
        ));
    }
    let hi = hi20(slot_disp as i32);
    let lo = lo12_u(lo12(slot_disp as i32));
    let mut out = [0u8; 16];
    if config.is_cheri_abi {
        out[0..4].copy_from_slice(&encode_u(OP_AUIPCC, 28, hi as u32).to_le_bytes()); // auipcc ct3, hi
        out[4..8].copy_from_slice(&encode_i(OP_CLC, 28, 28, lo).to_le_bytes()); // clc ct3, lo(ct3)
        out[8..12].copy_from_slice(&encode_i(OP_CJALR, 6, 28, 0).to_le_bytes()); // cjalr ct1, ct3, 0
    } else {
        let load = op_load(config.is64);
        out[0..4].copy_from_slice(&encode_u(OP_AUIPC, 28, hi as u32).to_le_bytes()); // auipc t3, hi
        out[4..8].copy_from_slice(&encode_i(load, 28, 28, lo).to_le_bytes()); // l{w,d} t3, lo(t3)
        out[8..12].copy_from_slice(&encode_i(OP_JALR, 6, 28, 0).to_le_bytes()); // jalr t1, t3, 0
    }
    out[12..16].copy_from_slice(&[0x13, 0, 0, 0]); // addi x0, x0, 0 (nop)
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(is64: bool, cheri: bool) -> LinkConfig {
        LinkConfig {
            is64,
            is_cheri_abi: cheri,
            capability_size: 16,
            wordsize: if is64 { 8 } else { 4 },
            relax: false,
            relocatable: false,
            write_addends: false,
            eflags: 0,
        }
    }

    #[test]
    fn got_header_width_follows_abi() {
        assert_eq!(got_header(&cfg(true, false), 0x1000).len(), 8);
        assert_eq!(got_header(&cfg(false, false), 0x1000).len(), 4);
    }

    #[test]
    fn cheri_plt_header_is_trapping_padding() {
        let header = write_plt_header(&cfg(true, true), 0).unwrap();
        assert_eq!(header.len(), PLT_HEADER_SIZE as usize);
        assert!(header.iter().all(|&b| b == 0));
    }

    #[test]
    fn non_cheri_plt_header_keeps_trailing_nop_when_shift_is_nonzero() {
        // PLT_ENTRY_SIZE (16) / ptr_size (8) == 2, shift == 1: nop is kept.
        let header = write_plt_header(&cfg(true, false), 0x1000).unwrap();
        assert_eq!(header.len(), PLT_HEADER_SIZE as usize + 4);
        assert_eq!(&header[32..36], &OP_ADDI.to_le_bytes());
    }

    #[test]
    fn plt_entry_is_sixteen_bytes() {
        let entry = write_plt_entry(&cfg(true, false), 0x2000).unwrap();
        assert_eq!(entry.len(), 16);
    }

    #[test]
    fn plt_entry_rejects_out_of_range_displacement() {
        assert!(write_plt_entry(&cfg(true, false), 1i64 << 32).is_err());
    }

    #[test]
    fn cheri_plt_entry_uses_capability_instructions() {
        let entry = write_plt_entry(&cfg(true, true), 0x2000).unwrap();
        assert_eq!(u32::from_le_bytes(entry[0..4].try_into().unwrap()) & 0x7f, OP_AUIPCC & 0x7f);
        let clc = u32::from_le_bytes(entry[4..8].try_into().unwrap());
        assert_eq!(clc & 0x7f, OP_CLC & 0x7f);
        assert_eq!((clc >> 12) & 0x7, (OP_CLC >> 12) & 0x7);
    }

    #[test]
    fn slot_allocation_is_stable_per_symbol() {
        let mut table = PltGotTable::new();
        let a = table.got_slot(3);
        let b = table.got_slot(7);
        let a_again = table.got_slot(3);
        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(table.got_count(), 2);
    }
}
