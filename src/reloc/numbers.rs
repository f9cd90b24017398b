//! Raw relocation-type and eflags numbers.
//!
//! Standard RISC-V psABI relocation numbers come from the `elf` crate's
//! `abi` module rather than being hand-rolled, the same way the upstream
//! loader this backend is descended from pulls its `R_RISCV_*`/`EM_*`/`PT_*`
//! constants from it (`examples/weizhiao-rust-elfloader/src/arch/riscv64.rs`
//! and friends). CHERI/CHERIoT vendor-extension numbers have no psABI
//! assignment to draw on and live in a block below, local to this crate.
//! `elf::abi` does not define architecture `e_flags` bits, so `EF_RISCV_*`
//! stays hand-rolled too.

pub use elf::abi::{
    R_RISCV_32, R_RISCV_64, R_RISCV_ADD8, R_RISCV_ADD16, R_RISCV_ADD32, R_RISCV_ADD64,
    R_RISCV_ALIGN, R_RISCV_BRANCH, R_RISCV_CALL, R_RISCV_CALL_PLT, R_RISCV_GOT_HI20, R_RISCV_HI20,
    R_RISCV_IRELATIVE, R_RISCV_JAL, R_RISCV_JUMP_SLOT, R_RISCV_LO12_I, R_RISCV_LO12_S,
    R_RISCV_NONE, R_RISCV_PCREL_HI20, R_RISCV_PCREL_LO12_I, R_RISCV_PCREL_LO12_S, R_RISCV_RELATIVE,
    R_RISCV_RELAX, R_RISCV_RVC_BRANCH, R_RISCV_RVC_JUMP, R_RISCV_RVC_LUI, R_RISCV_SET6,
    R_RISCV_SET8, R_RISCV_SET16, R_RISCV_SET32, R_RISCV_SUB6, R_RISCV_SUB8, R_RISCV_SUB16,
    R_RISCV_SUB32, R_RISCV_SUB64, R_RISCV_TLS_DTPMOD32, R_RISCV_TLS_DTPMOD64, R_RISCV_TLS_DTPREL32,
    R_RISCV_TLS_DTPREL64, R_RISCV_TLS_GD_HI20, R_RISCV_TLS_GOT_HI20, R_RISCV_TPREL_ADD,
    R_RISCV_TPREL_HI20, R_RISCV_TPREL_LO12_I, R_RISCV_TPREL_LO12_S,
};

// --- CHERI capability extensions (vendor range) ----------------------------
pub const R_RISCV_CHERI_CAPABILITY: u32 = 192;
pub const R_RISCV_CHERI_CAPTAB_PCREL_HI20: u32 = 193;
pub const R_RISCV_CHERI_TLS_IE_CAPTAB_PCREL_HI20: u32 = 194;
pub const R_RISCV_CHERI_TLS_GD_CAPTAB_PCREL_HI20: u32 = 195;
pub const R_RISCV_CHERI_CJAL: u32 = 196;
pub const R_RISCV_CHERI_RVC_CJUMP: u32 = 197;
pub const R_RISCV_CHERI_CCALL: u32 = 198;

// --- CHERIoT compartment extensions (vendor range) -------------------------
pub const R_RISCV_CHERIOT_COMPARTMENT_HI: u32 = 208;
pub const R_RISCV_CHERIOT_COMPARTMENT_LO_I: u32 = 209;
pub const R_RISCV_CHERIOT_COMPARTMENT_LO_S: u32 = 210;
pub const R_RISCV_CHERIOT_COMPARTMENT_SIZE: u32 = 211;

// --- ELF header flags (EF_RISCV_*) -----------------------------------------
pub const EF_RISCV_RVC: u32 = 0x0001;
pub const EF_RISCV_FLOAT_ABI_MASK: u32 = 0x0006;
pub const EF_RISCV_FLOAT_ABI_SOFT: u32 = 0x0000;
pub const EF_RISCV_FLOAT_ABI_SINGLE: u32 = 0x0002;
pub const EF_RISCV_FLOAT_ABI_DOUBLE: u32 = 0x0004;
pub const EF_RISCV_FLOAT_ABI_QUAD: u32 = 0x0006;
pub const EF_RISCV_RVE: u32 = 0x0008;
/// Not part of upstream psABI: CHERIoT's compartmentalised ABI marker.
pub const EF_RISCV_CHERIABI: u32 = 0x0020;
/// Not part of upstream psABI: "object assembled in capability-pointer mode".
pub const EF_RISCV_CAP_MODE: u32 = 0x0040;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    /// The bits of an ELF header's `e_flags` field this backend cares about.
    pub struct EFlags: u32 {
        /// Object contains compressed (RVC) instructions.
        const RVC = EF_RISCV_RVC;
        /// Single-precision hardware floating point calling convention.
        const FLOAT_ABI_SINGLE = EF_RISCV_FLOAT_ABI_SINGLE;
        /// Double-precision hardware floating point calling convention.
        const FLOAT_ABI_DOUBLE = EF_RISCV_FLOAT_ABI_DOUBLE;
        /// Quad-precision hardware floating point calling convention.
        const FLOAT_ABI_QUAD = EF_RISCV_FLOAT_ABI_QUAD;
        /// Object targets the RVE reduced register-set ABI.
        const RVE = EF_RISCV_RVE;
        /// Object asserts the CHERIoT compartmentalised ABI.
        const CHERIABI = EF_RISCV_CHERIABI;
        /// Object was assembled in capability-pointer mode.
        const CAP_MODE = EF_RISCV_CAP_MODE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_abi_bits_round_trip() {
        let flags = EFlags::from_bits_truncate(EF_RISCV_FLOAT_ABI_DOUBLE);
        assert!(flags.contains(EFlags::FLOAT_ABI_DOUBLE));
        assert!(!flags.contains(EFlags::FLOAT_ABI_SINGLE));
    }

    #[test]
    fn unknown_bits_are_truncated() {
        let flags = EFlags::from_bits_truncate(0x8000_0000);
        assert!(flags.is_empty());
    }
}
