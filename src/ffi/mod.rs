//! Platform Invocation Layer
//!
//! Everything that touches the native engine directly: raw types and codes,
//! the [`NativeApi`] call contract, and its two build-time strategies.
//!
//! # Architecture
//!
//! ```text
//! Easy / global calls
//!       │
//!       ▼
//! NativeApi (one trait, one trampoline table)
//!       │
//!       ├── DynamicApi  (default: libloading + resolved address table)
//!       │
//!       └── LinkedApi   (feature "static-link": #[link(name = "curl")])
//!       │
//!       ▼
//! libcurl / libcurl-impersonate
//! ```
//!
//! # Example
//!
//! ```ignore
//! use curl_bridge::ffi::{self, DynamicApi, NativeApi};
//!
//! let api = DynamicApi::load("/usr/lib/libcurl-impersonate.so.4");
//! println!("{}", api.version()?);
//!
//! ffi::global_init(ffi::CURL_GLOBAL_ALL)?;
//! ```

mod api;
mod global;
#[cfg(feature = "static-link")]
mod linked;
mod loader;
mod types;

pub use api::{NativeApi, TrampolineTable};
pub use global::{
    config, global_cleanup, global_cleanup_with, global_init, global_init_default,
    global_init_with, install_config, is_initialized, native, version,
};
#[cfg(feature = "static-link")]
pub use linked::LinkedApi;
pub(crate) use loader::c_string_lossy;
pub use loader::{DynamicApi, DynamicLibrary, LibraryLoader, ProcTable, LIBRARY_ENV};
pub use types::{
    CurlOffT, CurlSlist, EasyOpt, EntryPoint, Info, InfoType, OptionCategory, RawEasy,
    ReadCallbackPtr, WriteCallbackPtr, XferInfoCallbackPtr, CURLPAUSE_ALL, CURLPAUSE_CONT,
    CURLPAUSE_RECV, CURLPAUSE_SEND, CURL_GLOBAL_ALL, CURL_READFUNC_ABORT,
    CURL_WRITEFUNC_PAUSE, PROGRESS_ABORT, PROGRESS_CONTINUE,
};

#[cfg(test)]
mod tests;
