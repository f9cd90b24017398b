//! A RISC-V static-linker backend: relocation classification and
//! application, GOT/PLT synthesis, ELF header flag merging, CHERI capability
//! alignment, and iterative linker relaxation (including the CHERIoT
//! compartment-pointer extensions).
//!
//! This crate is one architecture's implementation of a polymorphic target
//! interface — it owns no global symbol table, output-section list, or
//! object parser. Callers thread a [`context::LinkContext`] through every
//! entry point and supply symbol/section lookups via the small trait and
//! closure seams each module exposes (see [`relax::RelaxEnv`] for the
//! largest of these).

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

cfg_if::cfg_if! {
    if #[cfg(feature = "log")] {
        /// Forwards to `log::debug!` when the `log` feature is enabled,
        /// otherwise expands to nothing. The ABI-branch-selection role
        /// `cfg_if` plays in other backends for this crate's interface
        /// (`is64`/`is_cheri_abi`) is instead a runtime match on
        /// `LinkConfig`, since this crate targets RISC-V regardless of the
        /// host it runs on; this is the one place selection is genuinely
        /// compile-time.
        macro_rules! trace_log {
            ($($arg:tt)*) => { log::debug!($($arg)*) };
        }
    } else {
        macro_rules! trace_log {
            ($($arg:tt)*) => {{}};
        }
    }
}
pub(crate) use trace_log;

pub mod cheri;
pub mod compartment;
pub mod context;
pub mod eflags;
pub mod encode;
pub mod error;
pub mod gotplt;
pub mod relax;
pub mod reloc;
pub mod symbol;

pub use context::{LinkConfig, LinkContext};
pub use error::{Diagnostics, Error, Result};
pub use reloc::kind::{RelocKind, Relocation};
pub use symbol::{ResolvedSymbol, Symbol, SymbolSection};
