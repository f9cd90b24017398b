//! Per-link configuration and state threaded through every public entry
//! point, instead of living behind global statics.
//!
//! The global symbol table, output-section list, and command-line parsing
//! are external collaborators; `LinkContext` only holds the configuration
//! values this backend consumes directly, plus the small amount of state
//! relocation classification mutates as a side effect (the "has static TLS
//! model" flag).

/// Configuration consumed by the backend for the duration of one link
/// invocation.
#[derive(Debug, Clone, Copy)]
pub struct LinkConfig {
    pub is64: bool,
    pub is_cheri_abi: bool,
    pub capability_size: u32,
    pub wordsize: u32,
    pub relax: bool,
    pub relocatable: bool,
    pub write_addends: bool,
    pub eflags: u32,
}

impl LinkConfig {
    /// Pointer width in bytes, derived from `is64` — used by the GOT/PLT
    /// writer and implicit-addend computation.
    #[inline]
    pub fn ptr_size(&self) -> u32 {
        if self.is64 { 8 } else { 4 }
    }
}

/// Per-link mutable state and configuration, scoped to the lifetime of one
/// link invocation.
pub struct LinkContext {
    pub config: LinkConfig,
    /// Set by the classifier when it sees `TLS_GOT_HI20`; later dynamic-tag
    /// emission (out of scope here) depends on it.
    has_static_tls_model: bool,
}

impl LinkContext {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            has_static_tls_model: false,
        }
    }

    #[inline]
    pub fn mark_static_tls_model(&mut self) {
        self.has_static_tls_model = true;
    }

    #[inline]
    pub fn has_static_tls_model(&self) -> bool {
        self.has_static_tls_model
    }
}
