//! Bridge Errors
//!
//! Error taxonomy shared by every layer of the bridge.

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::ffi::{EasyOpt, EntryPoint, Info};

/// Result code returned by the native engine (`CURLcode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurlCode(pub u32);

impl CurlCode {
    pub const OK: CurlCode = CurlCode(0);
    pub const UNSUPPORTED_PROTOCOL: CurlCode = CurlCode(1);
    pub const FAILED_INIT: CurlCode = CurlCode(2);
    pub const URL_MALFORMAT: CurlCode = CurlCode(3);
    pub const COULDNT_RESOLVE_HOST: CurlCode = CurlCode(6);
    pub const COULDNT_CONNECT: CurlCode = CurlCode(7);
    pub const WRITE_ERROR: CurlCode = CurlCode(23);
    pub const READ_ERROR: CurlCode = CurlCode(26);
    pub const OUT_OF_MEMORY: CurlCode = CurlCode(27);
    pub const OPERATION_TIMEDOUT: CurlCode = CurlCode(28);
    pub const ABORTED_BY_CALLBACK: CurlCode = CurlCode(42);
    pub const BAD_FUNCTION_ARGUMENT: CurlCode = CurlCode(43);
    pub const UNKNOWN_OPTION: CurlCode = CurlCode(48);
    pub const AGAIN: CurlCode = CurlCode(81);

    /// Whether the engine reported success
    pub fn is_ok(&self) -> bool {
        *self == CurlCode::OK
    }

    /// Symbolic name for the codes the bridge itself reasons about
    pub fn name(&self) -> Option<&'static str> {
        let name = match self.0 {
            0 => "CURLE_OK",
            1 => "CURLE_UNSUPPORTED_PROTOCOL",
            2 => "CURLE_FAILED_INIT",
            3 => "CURLE_URL_MALFORMAT",
            6 => "CURLE_COULDNT_RESOLVE_HOST",
            7 => "CURLE_COULDNT_CONNECT",
            23 => "CURLE_WRITE_ERROR",
            26 => "CURLE_READ_ERROR",
            27 => "CURLE_OUT_OF_MEMORY",
            28 => "CURLE_OPERATION_TIMEDOUT",
            42 => "CURLE_ABORTED_BY_CALLBACK",
            43 => "CURLE_BAD_FUNCTION_ARGUMENT",
            48 => "CURLE_UNKNOWN_OPTION",
            81 => "CURLE_AGAIN",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for CurlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "CURLcode {}", self.0),
        }
    }
}

/// Error type for bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The native module failed to load; recorded once at startup
    #[error("native module not loaded: {0}")]
    ModuleNotLoaded(String),

    /// A single entry point could not be resolved in the loaded module
    #[error("entry point `{}` unavailable: {reason}", entry.symbol())]
    EntryPointMissing { entry: EntryPoint, reason: String },

    /// The wrapper has no live native handle
    #[error("easy handle is nil")]
    NullHandle,

    /// The engine returned a null handle from init or duphandle
    #[error("{0} returned a nil handle")]
    InitFailed(&'static str),

    /// The option does not accept this kind of value
    #[error("option {option} expects {expected}, got {got}")]
    TypeMismatch {
        option: EasyOpt,
        expected: &'static str,
        got: &'static str,
    },

    /// Integer does not fit the native width of the option
    #[error("value {value} out of range for option {option}")]
    OutOfRange { option: EasyOpt, value: i64 },

    /// Global init flags do not fit a native `long`
    #[error("global init flags {0} out of range")]
    InvalidFlags(i64),

    /// Input longer than the native length argument can express
    #[error("input of {0} bytes is too long for the native call")]
    InputTooLong(usize),

    /// Text handed to the engine must not contain NUL bytes
    #[error("string contains an interior NUL byte: {0}")]
    InteriorNul(#[from] std::ffi::NulError),

    /// The engine refused to extend a native string list
    #[error("failed to append list item {0:?}")]
    ListAppend(String),

    /// The info code belongs to a category the bridge cannot decode
    #[error("unsupported info type for {0}")]
    UnsupportedInfo(Info),

    /// The engine rejected a validly encoded request
    #[error("{message} [{code}]")]
    Native { code: CurlCode, message: String },

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Filesystem failure while preparing native artifacts
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Native result code, when the engine produced one
    pub fn code(&self) -> Option<CurlCode> {
        match self {
            BridgeError::Native { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
