use alloc::borrow::Cow;
use alloc::string::String;
use core::fmt::{Debug, Display};

/// Error types produced by the RISC-V linker backend.
///
/// Each variant carries an owned, human-readable message. The four variants
/// correspond to the four error kinds a link can encounter: incompatible
/// inputs (eflags mismatches), malformed relocations (range/alignment/opcode
/// failures), lookup failures (paired relocations that can't be resolved),
/// and internal invariant violations (section shrink overflow, unreachable
/// states during finalize).
#[derive(Debug)]
pub enum Error {
    /// Two or more input objects disagree on a property that must be
    /// uniform across the whole link (ELF header flags, CHERI ABI mode).
    IncompatibleInput {
        /// A descriptive message naming the offending object.
        msg: Cow<'static, str>,
    },

    /// A relocation could not be applied: unknown kind, value out of range,
    /// misaligned target, or an opcode the kind doesn't expect.
    MalformedRelocation {
        /// Byte offset of the relocation within its section.
        offset: u64,
        /// Name of the target symbol, when known.
        symbol: Option<String>,
        /// A descriptive message about the failure.
        msg: Cow<'static, str>,
    },

    /// A relocation that depends on another relocation or symbol could not
    /// find it (missing paired `HI20`, `LO12` targeting an absolute symbol).
    LookupFailure {
        /// A descriptive message about the failure.
        msg: Cow<'static, str>,
    },

    /// An internal invariant was violated. These are bugs in the backend or
    /// its caller, not bad input, and are always fatal.
    Internal {
        /// A descriptive message about the failure.
        msg: Cow<'static, str>,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::IncompatibleInput { msg } => write!(f, "incompatible input: {msg}"),
            Error::MalformedRelocation {
                offset,
                symbol,
                msg,
            } => match symbol {
                Some(sym) => write!(
                    f,
                    "malformed relocation at offset {offset:#x} (symbol `{sym}`): {msg}"
                ),
                None => write!(f, "malformed relocation at offset {offset:#x}: {msg}"),
            },
            Error::LookupFailure { msg } => write!(f, "lookup failure: {msg}"),
            Error::Internal { msg } => write!(f, "internal error: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

#[cold]
#[inline(never)]
pub(crate) fn incompatible_input(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::IncompatibleInput { msg: msg.into() }
}

#[cold]
#[inline(never)]
pub(crate) fn malformed_relocation(
    offset: u64,
    symbol: Option<&str>,
    msg: impl Into<Cow<'static, str>>,
) -> Error {
    Error::MalformedRelocation {
        offset,
        symbol: symbol.map(String::from),
        msg: msg.into(),
    }
}

#[cold]
#[inline(never)]
pub(crate) fn lookup_failure(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::LookupFailure { msg: msg.into() }
}

#[cold]
#[inline(never)]
pub(crate) fn internal(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Internal { msg: msg.into() }
}

/// Accumulates user-visible errors across a link so that unrelated problems
/// (e.g. several bad relocations in different sections) can all be reported
/// before the link aborts, instead of stopping at the first one.
///
/// Internal errors (`Error::Internal`) are never accumulated: callers should
/// propagate those immediately with `?` rather than pushing them here.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: alloc::vec::Vec<Error>,
}

impl Diagnostics {
    pub const fn new() -> Self {
        Self {
            errors: alloc::vec::Vec::new(),
        }
    }

    pub fn push(&mut self, err: Error) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Turns the collected diagnostics into a `Result`: `Ok(())` if none were
    /// recorded, otherwise the first error (callers that need the full list
    /// should inspect `errors()` before calling this).
    pub fn into_result(mut self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors.remove(0))
        }
    }
}
