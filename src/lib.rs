//! curl-bridge - Callback Trampolines and Handle Lifecycle for libcurl
//!
//! Drives a native, callback-driven transfer engine (libcurl or
//! libcurl-impersonate) from safe Rust closures and owned values.
//!
//! # Features
//!
//! - **Callback trampolines**: fixed C-ABI entry points for write, read,
//!   header and transfer-info callbacks, routed back to Rust closures
//! - **Handle registry**: native handle address to wrapper, weakly held, so a
//!   dropped wrapper is simply not found
//! - **Owned-memory ledger**: option strings, header lists and borrowed
//!   buffers kept alive exactly as long as the engine may read them
//! - **Two invocation strategies**: a dynamically loaded module (default) or a
//!   linked libcurl (feature `static-link`), behind one [`NativeApi`]
//!
//! # Example
//!
//! ```ignore
//! use curl_bridge::{Easy, EasyOpt, Info, OptionValue};
//!
//! curl_bridge::global_init(curl_bridge::ffi::CURL_GLOBAL_ALL)?;
//!
//! let mut easy = Easy::init()?;
//! easy.setopt(EasyOpt::URL, "https://example.com")?;
//! easy.setopt(EasyOpt::HTTPHEADER, &["Accept: text/html", "X-Trace: 1"][..])?;
//! easy.setopt(EasyOpt::WRITEFUNCTION, OptionValue::write_function(|chunk, _| {
//!     println!("got {} bytes", chunk.len());
//!     true
//! }))?;
//! easy.perform()?;
//!
//! let code = easy.getinfo(Info::RESPONSE_CODE)?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Easy          │  setopt / perform / getinfo
//! └────────┬────────┘
//!          │ options, ledger
//!          ▼
//! ┌─────────────────┐        ┌─────────────────┐
//! │   NativeApi     │ ─────▶ │   libcurl       │
//! └─────────────────┘        └────────┬────────┘
//!                                     │ trampoline(ctx = handle)
//!                                     ▼
//! ┌─────────────────┐        ┌─────────────────┐
//! │ Handle Registry │ ◀───── │   Trampolines   │
//! └────────┬────────┘        └─────────────────┘
//!          │
//!          ▼
//!    Rust callback
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod ca_bundle;
pub mod config;
pub mod easy;
pub mod error;
pub mod ffi;

// Re-export commonly used types
pub use config::{BridgeConfig, ConfigError, ConfigResult, GlobalConfig, LibraryConfig, TlsConfig};
pub use easy::{
    CallbackKind, Easy, HandleRegistry, InfoValue, Ledger, OptionValue, Progress, RawPointer,
    UserData,
};
pub use error::{BridgeError, BridgeResult, CurlCode};
pub use ffi::{
    global_cleanup, global_init, version, DynamicApi, EasyOpt, Info, NativeApi, TrampolineTable,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
