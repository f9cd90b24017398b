//! Relocation applier: patches bytes at a location given a kind, a computed
//! value, and the existing instruction word.

use crate::context::LinkConfig;
use crate::encode::{fits_signed, fits_unsigned, hi20, lo12};
use crate::error::{internal, malformed_relocation, Result};
use crate::reloc::classify::ExprClass;
use crate::reloc::kind::RelocKind;

/// `AUIPCC`'s opcode: the same major opcode as plain `AUIPC`, since the two
/// are only distinguished by the capability-mode ISA bit, not the encoding.
const OPCODE_AUIPCC: u32 = 0x17;
/// `AUICGP`'s opcode: a CHERIoT vendor encoding distinct from `AUIPCC`.
const OPCODE_AUICGP: u32 = 0x7b;

#[inline]
fn read_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}
#[inline]
fn write_u16(b: &mut [u8], v: u16) {
    b[0..2].copy_from_slice(&v.to_le_bytes());
}
#[inline]
fn read_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}
#[inline]
fn write_u32(b: &mut [u8], v: u32) {
    b[0..4].copy_from_slice(&v.to_le_bytes());
}
#[inline]
fn read_u64(b: &[u8]) -> u64 {
    u64::from_le_bytes(b[0..8].try_into().unwrap())
}
#[inline]
fn write_u64(b: &mut [u8], v: u64) {
    b[0..8].copy_from_slice(&v.to_le_bytes());
}

fn err(offset: u64, msg: impl Into<alloc::borrow::Cow<'static, str>>) -> crate::error::Error {
    malformed_relocation(offset, None, msg)
}

/// Scatters a B-type branch immediate into `word`, preserving opcode/rs1/rs2.
fn scatter_b(word: u32, imm: i32) -> u32 {
    let imm = imm as u32;
    let bit12 = (imm >> 12) & 1;
    let bit11 = (imm >> 11) & 1;
    let bits10_5 = (imm >> 5) & 0x3f;
    let bits4_1 = (imm >> 1) & 0xf;
    (word & 0x01FFF07F) | (bit12 << 31) | (bits10_5 << 25) | (bits4_1 << 8) | (bit11 << 7)
}

/// Scatters a J-type jump immediate into `word`, preserving bits11:0.
fn scatter_j(word: u32, imm: i32) -> u32 {
    let imm = imm as u32;
    let bit20 = (imm >> 20) & 1;
    let bits10_1 = (imm >> 1) & 0x3ff;
    let bit11 = (imm >> 11) & 1;
    let bits19_12 = (imm >> 12) & 0xff;
    (word & 0xFFF)
        | (bit20 << 31)
        | (bits10_1 << 21)
        | (bit11 << 20)
        | (bits19_12 << 12)
}

/// Scatters a compressed-branch (CB) immediate, preserving mask 0xE383.
fn scatter_cb(word: u16, imm: i32) -> u16 {
    let imm = imm as u16;
    let bit8 = (imm >> 8) & 1;
    let bit7_6 = (imm >> 6) & 0x3;
    let bit5 = (imm >> 5) & 1;
    let bit4_3 = (imm >> 3) & 0x3;
    let bit2_1 = (imm >> 1) & 0x3;
    (word & 0xE383)
        | (bit8 << 12)
        | (bit4_3 << 10)
        | (bit7_6 << 5)
        | (bit2_1 << 3)
        | (bit5 << 2)
}

/// Scatters a compressed-jump (CJ) immediate, preserving mask 0xE003.
fn scatter_cj(word: u16, imm: i32) -> u16 {
    let imm = imm as u16;
    let bit11 = (imm >> 11) & 1;
    let bit4 = (imm >> 4) & 1;
    let bit9_8 = (imm >> 8) & 0x3;
    let bit10 = (imm >> 10) & 1;
    let bit6 = (imm >> 6) & 1;
    let bit7 = (imm >> 7) & 1;
    let bit3_1 = (imm >> 1) & 0x7;
    let bit5 = (imm >> 5) & 1;
    (word & 0xE003)
        | (bit11 << 12)
        | (bit4 << 11)
        | (bit9_8 << 9)
        | (bit10 << 8)
        | (bit6 << 7)
        | (bit7 << 6)
        | (bit3_1 << 3)
        | (bit5 << 2)
}

/// Applies `kind` to the bytes at `loc` within `bytes`, given the already
/// computed expression value `val` and `offset`, the relocation's own
/// virtual address (needed only for diagnostics; PC has already been folded
/// into `val` by the caller's expression-class computation).
///
/// `config` carries the ABI bit `TLS_DTPREL32/64` branch on. `class` is the
/// [`ExprClass`] the classifier assigned this relocation — only
/// `CHERIOT_COMPARTMENT_HI` reads it, to choose between the `AUIPCC`
/// (`ExprClass::Pc`) and `AUICGP` (`ExprClass::CheriotCgpRel`) opcodes.
///
/// `bytes` is the full mutable slice of the relocation's location onward,
/// sized generously enough to cover the widest form this kind can touch
/// (8 bytes is always enough).
pub fn apply(
    kind: RelocKind,
    bytes: &mut [u8],
    val: i64,
    offset: u64,
    config: &LinkConfig,
    class: ExprClass,
) -> Result<()> {
    use RelocKind::{
        Abs32, Abs64, Add8, Add16, Add32, Add64, Align, Branch, Call, CallPlt, CapTabPcrelHi20,
        CheriCapability, CheriCcall, CheriCjal, CheriRvcCjump, CompartmentHi, CompartmentLoI,
        CompartmentLoS, CompartmentSize, GotHi20, Hi20, Irelative, Jal, JumpSlot, Lo12I, Lo12S,
        PcrelHi20, PcrelLo12I, PcrelLo12S, Relax, Relative, RvcBranch, RvcJump, RvcLui, Set6,
        Set8, Set16, Set32, Sub6, Sub8, Sub16, Sub32, Sub64, TlsDtpMod32, TlsDtpMod64,
        TlsDtpRel32, TlsDtpRel64, TlsGdCapTab, TlsGdHi20, TlsGotHi20, TlsIeCapTab, TprelAdd,
        TprelHi20, TprelLo12I, TprelLo12S,
    };
    match kind {
        RelocKind::None | Align | Relax => Ok(()),

        Abs32 => {
            write_u32(bytes, val as u32);
            Ok(())
        }
        Abs64 => {
            write_u64(bytes, val as u64);
            Ok(())
        }

        Add8 => {
            bytes[0] = bytes[0].wrapping_add(val as u8);
            Ok(())
        }
        Add16 => {
            let cur = read_u16(bytes);
            write_u16(bytes, cur.wrapping_add(val as u16));
            Ok(())
        }
        Add32 => {
            let cur = read_u32(bytes);
            write_u32(bytes, cur.wrapping_add(val as u32));
            Ok(())
        }
        Add64 => {
            let cur = read_u64(bytes);
            write_u64(bytes, cur.wrapping_add(val as u64));
            Ok(())
        }
        Sub8 => {
            bytes[0] = bytes[0].wrapping_sub(val as u8);
            Ok(())
        }
        Sub16 => {
            let cur = read_u16(bytes);
            write_u16(bytes, cur.wrapping_sub(val as u16));
            Ok(())
        }
        Sub32 => {
            let cur = read_u32(bytes);
            write_u32(bytes, cur.wrapping_sub(val as u32));
            Ok(())
        }
        Sub64 => {
            let cur = read_u64(bytes);
            write_u64(bytes, cur.wrapping_sub(val as u64));
            Ok(())
        }
        Sub6 => {
            let hi2 = bytes[0] & 0xc0;
            let lo6 = bytes[0] & 0x3f;
            bytes[0] = hi2 | (lo6.wrapping_sub(val as u8) & 0x3f);
            Ok(())
        }
        Set6 => {
            let hi2 = bytes[0] & 0xc0;
            bytes[0] = hi2 | (val as u8 & 0x3f);
            Ok(())
        }
        Set8 => {
            bytes[0] = val as u8;
            Ok(())
        }
        Set16 => {
            write_u16(bytes, val as u16);
            Ok(())
        }
        Set32 => {
            write_u32(bytes, val as u32);
            Ok(())
        }

        Branch => {
            if val & 1 != 0 {
                return Err(err(offset, "BRANCH target is not 2-byte aligned"));
            }
            if !fits_signed(val >> 1, 12) {
                return Err(err(offset, "BRANCH displacement out of range"));
            }
            let word = read_u32(bytes);
            write_u32(bytes, scatter_b(word, val as i32));
            Ok(())
        }
        Jal | CheriCjal => {
            if val & 1 != 0 {
                return Err(err(offset, "JAL target is not 2-byte aligned"));
            }
            if !fits_signed(val >> 1, 20) {
                return Err(err(offset, "JAL displacement out of range"));
            }
            let word = read_u32(bytes);
            write_u32(bytes, scatter_j(word, val as i32));
            Ok(())
        }
        RvcBranch => {
            if val & 1 != 0 {
                return Err(err(offset, "RVC_BRANCH target is not 2-byte aligned"));
            }
            if !fits_signed(val >> 1, 8) {
                return Err(err(offset, "RVC_BRANCH displacement out of range"));
            }
            let word = read_u16(bytes);
            write_u16(bytes, scatter_cb(word, val as i32));
            Ok(())
        }
        RvcJump | CheriRvcCjump => {
            if val & 1 != 0 {
                return Err(err(offset, "RVC_JUMP target is not 2-byte aligned"));
            }
            if !fits_signed(val >> 1, 11) {
                return Err(err(offset, "RVC_JUMP displacement out of range"));
            }
            let word = read_u16(bytes);
            write_u16(bytes, scatter_cj(word, val as i32));
            Ok(())
        }
        RvcLui => {
            let biased = hi20(val as i32);
            if biased == 0 {
                // c.lui with a zero immediate is an illegal encoding;
                // rewrite to `c.li rd, 0` instead, preserving rd (bits 11:7).
                let word = read_u16(bytes);
                let rd = (word >> 7) & 0x1f;
                write_u16(bytes, 0x4001 | (rd << 7));
            } else {
                if !fits_signed(biased as i64, 6) {
                    return Err(err(offset, "RVC_LUI immediate out of range"));
                }
                let word = read_u16(bytes);
                let imm17 = (biased >> 5) & 1;
                let imm16_12 = (biased as u32) & 0x1f;
                write_u16(bytes, (word & 0xE07F) | ((imm17 as u16) << 12) | ((imm16_12 as u16) << 2));
            }
            Ok(())
        }

        PcrelHi20 | GotHi20 | CapTabPcrelHi20 | TlsGotHi20 | TlsGdHi20 | TlsIeCapTab
        | TlsGdCapTab | Hi20 | TprelHi20 => {
            let biased = hi20(val as i32);
            if !fits_signed(biased as i64, 20) {
                return Err(err(offset, "HI20 displacement out of range"));
            }
            let word = read_u32(bytes);
            write_u32(bytes, (word & 0xFFF) | ((biased as u32) << 12));
            Ok(())
        }

        PcrelLo12I | Lo12I | TprelLo12I => {
            let lo = lo12(val as i32);
            let word = read_u32(bytes);
            write_u32(bytes, (word & 0xFFFFF) | (((lo as u32) & 0xFFF) << 20));
            Ok(())
        }
        CompartmentLoI => {
            // lo is forced to zero when the paired hi20 alone already
            // reaches the target exactly; otherwise sign-extend the low 12
            // bits, bit 11 replicated upward when negative.
            let biased_hi = hi20(val as i32);
            let lo = if biased_hi << 12 == val as i32 {
                0
            } else {
                lo12(val as i32)
            };
            if !fits_signed(lo as i64, 12) {
                return Err(err(offset, "COMPARTMENT_LO_I immediate out of range"));
            }
            let word = read_u32(bytes);
            write_u32(bytes, (word & 0xFFFFF) | (((lo as u32) & 0xFFF) << 20));
            Ok(())
        }
        PcrelLo12S | Lo12S | TprelLo12S | CompartmentLoS => {
            let lo = (lo12(val as i32) as u32) & 0xFFF;
            let word = read_u32(bytes);
            let imm4_0 = lo & 0x1f;
            let imm11_5 = (lo >> 5) & 0x7f;
            write_u32(
                bytes,
                (word & 0x01FFF07F) | (imm11_5 << 25) | (imm4_0 << 7),
            );
            Ok(())
        }

        TprelAdd => Ok(()),

        Call | CallPlt | CheriCcall => {
            // macro relocation: PCREL_HI20 at offset 0, PCREL_LO12_I at +4,
            // same value.
            let biased = hi20(val as i32);
            if !fits_signed(biased as i64, 20) {
                return Err(err(offset, "CALL displacement out of range"));
            }
            let hi_word = read_u32(&bytes[0..4]);
            write_u32(&mut bytes[0..4], (hi_word & 0xFFF) | ((biased as u32) << 12));
            let lo = (lo12(val as i32) as u32) & 0xFFF;
            let lo_word = read_u32(&bytes[4..8]);
            write_u32(&mut bytes[4..8], (lo_word & 0xFFFFF) | (lo << 20));
            Ok(())
        }

        TlsDtpRel32 => {
            let v = if config.is_cheri_abi { val } else { val.wrapping_sub(0x800) };
            write_u32(bytes, v as u32);
            Ok(())
        }
        TlsDtpRel64 => {
            let v = if config.is_cheri_abi { val } else { val.wrapping_sub(0x800) };
            write_u64(bytes, v as u64);
            Ok(())
        }

        CheriCapability => {
            // Capability-sized tagged slot. This only writes the address
            // field; the tag bit and bounds metadata are owned by the
            // output-section writer.
            write_u64(bytes, val as u64);
            Ok(())
        }

        CompartmentHi => {
            let pc_relative = matches!(class, ExprClass::Pc);
            let biased = if pc_relative && val < 0 {
                let rounded = (val + 2047) & !2047i64;
                (rounded >> 11) as i32
            } else {
                hi20(val as i32)
            };
            if !fits_signed(biased as i64, 20) {
                return Err(err(offset, "COMPARTMENT_HI displacement out of range"));
            }
            let word = read_u32(bytes);
            let opcode = if pc_relative { OPCODE_AUIPCC } else { OPCODE_AUICGP };
            let rd = word & 0xF80;
            write_u32(bytes, rd | ((biased as u32) << 12) | opcode);
            Ok(())
        }
        CompartmentSize => {
            if !fits_unsigned(val as u64, 12) {
                return Err(err(offset, "COMPARTMENT_SIZE value out of range"));
            }
            let word = read_u32(bytes);
            write_u32(bytes, (word & 0xFFFFF) | ((val as u32 & 0xFFF) << 20));
            Ok(())
        }

        TlsDtpMod32 => {
            write_u32(bytes, val as u32);
            Ok(())
        }
        TlsDtpMod64 => {
            write_u64(bytes, val as u64);
            Ok(())
        }

        Relative | Irelative | JumpSlot => Err(internal(alloc::format!(
            "{kind:?} is a dynamic-relocation-only kind and is never written through the relocation applier"
        ))),
    }
}
