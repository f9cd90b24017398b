//! The closed relocation-kind enumeration.

use super::numbers::*;

/// Every relocation kind the backend understands. Closed by design: an
/// unrecognized numeric code is a user error reported by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RelocKind {
    // administrative
    None,
    Align,
    Relax,

    // absolute integer widths
    Abs32,
    Abs64,
    Add8,
    Add16,
    Add32,
    Add64,
    Sub8,
    Sub16,
    Sub32,
    Sub64,
    Sub6,
    Set6,
    Set8,
    Set16,
    Set32,

    // PC-relative control transfers
    Branch,
    Jal,
    RvcBranch,
    RvcJump,
    RvcLui,
    CheriCjal,
    CheriRvcCjump,

    // hi20/lo12 pairs
    PcrelHi20,
    PcrelLo12I,
    PcrelLo12S,
    GotHi20,
    TlsGotHi20,
    TlsGdHi20,
    Hi20,
    Lo12I,
    Lo12S,
    TprelHi20,
    TprelLo12I,
    TprelLo12S,
    TprelAdd,

    // macro relocations
    Call,
    CallPlt,
    CheriCcall,

    // TLS data relocations
    TlsDtpRel32,
    TlsDtpRel64,
    TlsDtpMod32,
    TlsDtpMod64,

    // dynamic-linking-only kinds (never produced by a compiler, only by the
    // linker itself when emitting .rel.dyn entries)
    Relative,
    Irelative,
    JumpSlot,

    // capability relocations
    CheriCapability,
    CapTabPcrelHi20,
    TlsIeCapTab,
    TlsGdCapTab,

    // CHERIoT compartment relocations
    CompartmentHi,
    CompartmentLoI,
    CompartmentLoS,
    CompartmentSize,
}

impl RelocKind {
    /// Maps a raw ELF `r_type` field to a [`RelocKind`]. Returns `None` for
    /// codes this backend does not recognize — the caller (the classifier)
    /// turns that into a user-visible error naming the offending relocation.
    pub fn from_u32(raw: u32) -> Option<Self> {
        Some(match raw {
            R_RISCV_NONE => RelocKind::None,
            R_RISCV_ALIGN => RelocKind::Align,
            R_RISCV_RELAX => RelocKind::Relax,

            R_RISCV_32 => RelocKind::Abs32,
            R_RISCV_64 => RelocKind::Abs64,
            R_RISCV_ADD8 => RelocKind::Add8,
            R_RISCV_ADD16 => RelocKind::Add16,
            R_RISCV_ADD32 => RelocKind::Add32,
            R_RISCV_ADD64 => RelocKind::Add64,
            R_RISCV_SUB8 => RelocKind::Sub8,
            R_RISCV_SUB16 => RelocKind::Sub16,
            R_RISCV_SUB32 => RelocKind::Sub32,
            R_RISCV_SUB64 => RelocKind::Sub64,
            R_RISCV_SUB6 => RelocKind::Sub6,
            R_RISCV_SET6 => RelocKind::Set6,
            R_RISCV_SET8 => RelocKind::Set8,
            R_RISCV_SET16 => RelocKind::Set16,
            R_RISCV_SET32 => RelocKind::Set32,

            R_RISCV_BRANCH => RelocKind::Branch,
            R_RISCV_JAL => RelocKind::Jal,
            R_RISCV_RVC_BRANCH => RelocKind::RvcBranch,
            R_RISCV_RVC_JUMP => RelocKind::RvcJump,
            R_RISCV_RVC_LUI => RelocKind::RvcLui,
            R_RISCV_CHERI_CJAL => RelocKind::CheriCjal,
            R_RISCV_CHERI_RVC_CJUMP => RelocKind::CheriRvcCjump,

            R_RISCV_PCREL_HI20 => RelocKind::PcrelHi20,
            R_RISCV_PCREL_LO12_I => RelocKind::PcrelLo12I,
            R_RISCV_PCREL_LO12_S => RelocKind::PcrelLo12S,
            R_RISCV_GOT_HI20 => RelocKind::GotHi20,
            R_RISCV_TLS_GOT_HI20 => RelocKind::TlsGotHi20,
            R_RISCV_TLS_GD_HI20 => RelocKind::TlsGdHi20,
            R_RISCV_HI20 => RelocKind::Hi20,
            R_RISCV_LO12_I => RelocKind::Lo12I,
            R_RISCV_LO12_S => RelocKind::Lo12S,
            R_RISCV_TPREL_HI20 => RelocKind::TprelHi20,
            R_RISCV_TPREL_LO12_I => RelocKind::TprelLo12I,
            R_RISCV_TPREL_LO12_S => RelocKind::TprelLo12S,
            R_RISCV_TPREL_ADD => RelocKind::TprelAdd,

            R_RISCV_CALL => RelocKind::Call,
            R_RISCV_CALL_PLT => RelocKind::CallPlt,
            R_RISCV_CHERI_CCALL => RelocKind::CheriCcall,

            R_RISCV_TLS_DTPREL32 => RelocKind::TlsDtpRel32,
            R_RISCV_TLS_DTPREL64 => RelocKind::TlsDtpRel64,
            R_RISCV_TLS_DTPMOD32 => RelocKind::TlsDtpMod32,
            R_RISCV_TLS_DTPMOD64 => RelocKind::TlsDtpMod64,

            R_RISCV_RELATIVE => RelocKind::Relative,
            R_RISCV_IRELATIVE => RelocKind::Irelative,
            R_RISCV_JUMP_SLOT => RelocKind::JumpSlot,

            R_RISCV_CHERI_CAPABILITY => RelocKind::CheriCapability,
            R_RISCV_CHERI_CAPTAB_PCREL_HI20 => RelocKind::CapTabPcrelHi20,
            R_RISCV_CHERI_TLS_IE_CAPTAB_PCREL_HI20 => RelocKind::TlsIeCapTab,
            R_RISCV_CHERI_TLS_GD_CAPTAB_PCREL_HI20 => RelocKind::TlsGdCapTab,

            R_RISCV_CHERIOT_COMPARTMENT_HI => RelocKind::CompartmentHi,
            R_RISCV_CHERIOT_COMPARTMENT_LO_I => RelocKind::CompartmentLoI,
            R_RISCV_CHERIOT_COMPARTMENT_LO_S => RelocKind::CompartmentLoS,
            R_RISCV_CHERIOT_COMPARTMENT_SIZE => RelocKind::CompartmentSize,

            _ => return None,
        })
    }

    /// The inverse of [`RelocKind::from_u32`]; used when finalize rewrites a
    /// relocation's kind once relaxation finalizes its layout.
    pub fn to_u32(self) -> u32 {
        match self {
            RelocKind::None => R_RISCV_NONE,
            RelocKind::Align => R_RISCV_ALIGN,
            RelocKind::Relax => R_RISCV_RELAX,

            RelocKind::Abs32 => R_RISCV_32,
            RelocKind::Abs64 => R_RISCV_64,
            RelocKind::Add8 => R_RISCV_ADD8,
            RelocKind::Add16 => R_RISCV_ADD16,
            RelocKind::Add32 => R_RISCV_ADD32,
            RelocKind::Add64 => R_RISCV_ADD64,
            RelocKind::Sub8 => R_RISCV_SUB8,
            RelocKind::Sub16 => R_RISCV_SUB16,
            RelocKind::Sub32 => R_RISCV_SUB32,
            RelocKind::Sub64 => R_RISCV_SUB64,
            RelocKind::Sub6 => R_RISCV_SUB6,
            RelocKind::Set6 => R_RISCV_SET6,
            RelocKind::Set8 => R_RISCV_SET8,
            RelocKind::Set16 => R_RISCV_SET16,
            RelocKind::Set32 => R_RISCV_SET32,

            RelocKind::Branch => R_RISCV_BRANCH,
            RelocKind::Jal => R_RISCV_JAL,
            RelocKind::RvcBranch => R_RISCV_RVC_BRANCH,
            RelocKind::RvcJump => R_RISCV_RVC_JUMP,
            RelocKind::RvcLui => R_RISCV_RVC_LUI,
            RelocKind::CheriCjal => R_RISCV_CHERI_CJAL,
            RelocKind::CheriRvcCjump => R_RISCV_CHERI_RVC_CJUMP,

            RelocKind::PcrelHi20 => R_RISCV_PCREL_HI20,
            RelocKind::PcrelLo12I => R_RISCV_PCREL_LO12_I,
            RelocKind::PcrelLo12S => R_RISCV_PCREL_LO12_S,
            RelocKind::GotHi20 => R_RISCV_GOT_HI20,
            RelocKind::TlsGotHi20 => R_RISCV_TLS_GOT_HI20,
            RelocKind::TlsGdHi20 => R_RISCV_TLS_GD_HI20,
            RelocKind::Hi20 => R_RISCV_HI20,
            RelocKind::Lo12I => R_RISCV_LO12_I,
            RelocKind::Lo12S => R_RISCV_LO12_S,
            RelocKind::TprelHi20 => R_RISCV_TPREL_HI20,
            RelocKind::TprelLo12I => R_RISCV_TPREL_LO12_I,
            RelocKind::TprelLo12S => R_RISCV_TPREL_LO12_S,
            RelocKind::TprelAdd => R_RISCV_TPREL_ADD,

            RelocKind::Call => R_RISCV_CALL,
            RelocKind::CallPlt => R_RISCV_CALL_PLT,
            RelocKind::CheriCcall => R_RISCV_CHERI_CCALL,

            RelocKind::TlsDtpRel32 => R_RISCV_TLS_DTPREL32,
            RelocKind::TlsDtpRel64 => R_RISCV_TLS_DTPREL64,
            RelocKind::TlsDtpMod32 => R_RISCV_TLS_DTPMOD32,
            RelocKind::TlsDtpMod64 => R_RISCV_TLS_DTPMOD64,

            RelocKind::Relative => R_RISCV_RELATIVE,
            RelocKind::Irelative => R_RISCV_IRELATIVE,
            RelocKind::JumpSlot => R_RISCV_JUMP_SLOT,

            RelocKind::CheriCapability => R_RISCV_CHERI_CAPABILITY,
            RelocKind::CapTabPcrelHi20 => R_RISCV_CHERI_CAPTAB_PCREL_HI20,
            RelocKind::TlsIeCapTab => R_RISCV_CHERI_TLS_IE_CAPTAB_PCREL_HI20,
            RelocKind::TlsGdCapTab => R_RISCV_CHERI_TLS_GD_CAPTAB_PCREL_HI20,

            RelocKind::CompartmentHi => R_RISCV_CHERIOT_COMPARTMENT_HI,
            RelocKind::CompartmentLoI => R_RISCV_CHERIOT_COMPARTMENT_LO_I,
            RelocKind::CompartmentLoS => R_RISCV_CHERIOT_COMPARTMENT_LO_S,
            RelocKind::CompartmentSize => R_RISCV_CHERIOT_COMPARTMENT_SIZE,
        }
    }

    /// True for the three `RELAX`-paired compressible call forms.
    #[inline]
    pub fn is_call_macro(self) -> bool {
        matches!(self, RelocKind::Call | RelocKind::CallPlt | RelocKind::CheriCcall)
    }

    /// True for the CHERIoT compartment HI/LO_I/LO_S triple eligible for
    /// `relax_cgp` collapse.
    #[inline]
    pub fn is_compartment(self) -> bool {
        matches!(
            self,
            RelocKind::CompartmentHi | RelocKind::CompartmentLoI | RelocKind::CompartmentLoS
        )
    }
}

/// A single record in a section's relocation list.
///
/// Offsets are strictly increasing before relaxation; two records may share
/// an offset only for a paired `RelocKind::Relax` hint immediately following
/// the instruction it annotates.
#[derive(Debug, Clone)]
pub struct Relocation {
    pub offset: u64,
    pub kind: RelocKind,
    /// Index of the target symbol in whatever symbol table the caller owns.
    pub symbol: u32,
    pub addend: i64,
}

impl Relocation {
    pub fn new(offset: u64, kind: RelocKind, symbol: u32, addend: i64) -> Self {
        Self {
            offset,
            kind,
            symbol,
            addend,
        }
    }
}
