//! Easy Handles
//!
//! [`Easy`] owns one native transfer handle. While the handle is live the
//! wrapper's callback state is registered under the handle's address, which
//! is also the context pointer handed to the engine alongside every
//! trampoline.
//!
//! # Example
//!
//! ```ignore
//! use curl_bridge::{Easy, EasyOpt, OptionValue};
//!
//! let mut easy = Easy::init()?;
//! easy.setopt(EasyOpt::URL, "https://example.com")?;
//! easy.setopt(EasyOpt::WRITEFUNCTION, OptionValue::write_function(|chunk, _| {
//!     print!("{}", String::from_utf8_lossy(chunk));
//!     true
//! }))?;
//! easy.perform()?;
//! ```

mod callbacks;
mod info;
mod ledger;
mod options;
mod registry;
pub mod trampoline;

pub use callbacks::{
    forward_to_writer, progress_callback, pull_from_reader, read_callback, write_callback,
    CallbackKind, EasyState, Progress, ProgressCallback, ReadCallback, Slot, UserData,
    WriteCallback,
};
pub use info::InfoValue;
pub use ledger::{Allocation, Ledger, NativeList};
pub use options::{OptionValue, RawPointer};
pub use registry::HandleRegistry;

use std::ffi::CString;
use std::fmt;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr::{self, NonNull};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::ca_bundle;
use crate::error::{BridgeError, BridgeResult, CurlCode};
use crate::ffi::{self, c_string_lossy, EasyOpt, NativeApi, RawEasy};
use registry::EASY_HANDLES;

/// Managed wrapper around one native easy handle
pub struct Easy {
    handle: Option<NonNull<c_void>>,
    state: Arc<EasyState>,
    ledger: Ledger,
    api: Arc<dyn NativeApi>,
}

// The handle is owned exclusively and every call goes through `&mut self` or a
// read-only native query. Not `Sync`: one handle is never used from two
// threads at once.
unsafe impl Send for Easy {}

impl Easy {
    /// Create a handle on the process-wide native API (`curl_easy_init`)
    pub fn init() -> BridgeResult<Self> {
        Self::with_api(ffi::native())
    }

    /// Create a handle on a specific native API
    pub fn with_api(api: Arc<dyn NativeApi>) -> BridgeResult<Self> {
        let raw = api.easy_init()?;
        let mut easy = Self::adopt(raw, api, "curl_easy_init")?;
        easy.apply_ca_bundle();
        Ok(easy)
    }

    fn adopt(raw: RawEasy, api: Arc<dyn NativeApi>, origin: &'static str) -> BridgeResult<Self> {
        let handle = NonNull::new(raw).ok_or(BridgeError::InitFailed(origin))?;
        let state = Arc::new(EasyState::new());
        EASY_HANDLES.register(handle.as_ptr() as usize, &state);
        debug!(handle = ?handle.as_ptr(), origin, api = api.name(), "easy handle registered");
        Ok(Self {
            handle: Some(handle),
            state,
            ledger: Ledger::new(),
            api,
        })
    }

    fn apply_ca_bundle(&mut self) {
        let Some(path) = ca_bundle::bundle_path() else {
            return;
        };
        let Some(text) = path.to_str() else {
            warn!(path = %path.display(), "CA bundle path is not valid UTF-8; CAINFO not set");
            return;
        };
        if let Err(e) = self.setopt(EasyOpt::CAINFO, text) {
            warn!(error = %e, "failed to set CAINFO");
        }
    }

    /// Live native handle or a local error
    pub(crate) fn handle(&self) -> BridgeResult<RawEasy> {
        self.handle
            .map(|h| h.as_ptr())
            .ok_or(BridgeError::NullHandle)
    }

    /// Map a native result code to a result
    pub(crate) fn check(&self, code: CurlCode) -> BridgeResult<()> {
        if code.is_ok() {
            return Ok(());
        }
        Err(BridgeError::Native {
            code,
            message: self.api.easy_strerror(code),
        })
    }

    /// The native handle, null after cleanup
    pub fn raw_handle(&self) -> RawEasy {
        self.handle.map_or(ptr::null_mut(), |h| h.as_ptr())
    }

    /// Native API this handle calls
    pub fn api(&self) -> &Arc<dyn NativeApi> {
        &self.api
    }

    /// Whether a callback of `kind` is installed
    pub fn has_callback(&self, kind: CallbackKind) -> bool {
        self.state.is_installed(kind)
    }

    /// Clone the handle (`curl_easy_duphandle`).
    ///
    /// The duplicate keeps the native options but none of the callbacks: its
    /// callback options are reset so the engine never routes its callbacks to
    /// this wrapper. Native lists and borrowed buffers the duplicate still
    /// points at are shared with this wrapper's ledger.
    pub fn duphandle(&self) -> BridgeResult<Easy> {
        let source = self.handle()?;
        let raw = unsafe { self.api.easy_duphandle(source)? };
        let mut dup = Self::adopt(raw, Arc::clone(&self.api), "curl_easy_duphandle")?;

        for allocation in self.ledger.shared() {
            dup.ledger.append(allocation);
        }

        let handle = dup.handle()?;
        for kind in CallbackKind::ALL {
            if !self.state.is_installed(kind) {
                continue;
            }
            dup.detach(handle, kind)?;
        }
        Ok(dup)
    }

    fn detach(&mut self, handle: RawEasy, kind: CallbackKind) -> BridgeResult<()> {
        let api = Arc::clone(&self.api);
        unsafe {
            self.check(api.setopt_function(handle, kind.function_option(), ptr::null())?)?;
            self.check(api.setopt_pointer(handle, kind.data_option(), ptr::null())?)?;
            if kind == CallbackKind::Progress {
                self.check(api.setopt_long(handle, EasyOpt::NOPROGRESS, 1)?)?;
            }
        }
        Ok(())
    }

    /// Release the native handle (`curl_easy_cleanup`).
    ///
    /// Idempotent. Also run on drop.
    pub fn cleanup(&mut self) {
        if let Some(handle) = self.handle.take() {
            let raw = handle.as_ptr();
            EASY_HANDLES.unregister(raw as usize);
            if let Err(e) = unsafe { self.api.easy_cleanup(raw) } {
                warn!(handle = ?raw, error = %e, "easy cleanup failed");
            }
            debug!(handle = ?raw, "easy handle released");
        }
        self.ledger.release_all();
        self.state.clear_all();
    }

    /// Reset every option to its default (`curl_easy_reset`).
    ///
    /// Callbacks and owned allocations go too; the handle and its
    /// registration stay.
    pub fn reset(&mut self) -> BridgeResult<()> {
        let handle = self.handle()?;
        unsafe { self.api.easy_reset(handle)? };
        self.state.clear_all();
        let released = self.ledger.release_all();
        debug!(handle = ?handle, released, "easy handle reset");
        Ok(())
    }

    /// Run the transfer (`curl_easy_perform`)
    pub fn perform(&mut self) -> BridgeResult<()> {
        let handle = self.handle()?;
        let code = unsafe { self.api.easy_perform(handle)? };
        self.check(code)
    }

    /// Pause or resume (`curl_easy_pause`) with `CURLPAUSE_*` bits
    pub fn pause(&mut self, bitmask: c_int) -> BridgeResult<()> {
        let handle = self.handle()?;
        let code = unsafe { self.api.easy_pause(handle, bitmask)? };
        self.check(code)
    }

    /// URL-encode `input` (`curl_easy_escape`); NUL bytes are encoded too
    pub fn escape(&self, input: &str) -> BridgeResult<String> {
        let handle = self.handle()?;
        // A zero length makes the engine measure the input with strlen
        if input.is_empty() {
            return Ok(String::new());
        }
        let len = native_len(input)?;
        let escaped = unsafe {
            self.api
                .easy_escape(handle, input.as_ptr() as *const c_char, len)?
        };
        if escaped.is_null() {
            return Err(BridgeError::Native {
                code: CurlCode::OUT_OF_MEMORY,
                message: "curl_easy_escape returned null".to_string(),
            });
        }
        let out = unsafe { c_string_lossy(escaped) };
        unsafe { self.api.free(escaped as *mut c_void)? };
        Ok(out)
    }

    /// URL-decode `input` (`curl_easy_unescape`); the result may hold any bytes
    pub fn unescape(&self, input: &str) -> BridgeResult<Vec<u8>> {
        let handle = self.handle()?;
        if input.is_empty() {
            return Ok(Vec::new());
        }
        let len = native_len(input)?;
        let mut out_len: c_int = 0;
        let decoded = unsafe {
            self.api
                .easy_unescape(handle, input.as_ptr() as *const c_char, len, &mut out_len)?
        };
        if decoded.is_null() {
            return Err(BridgeError::Native {
                code: CurlCode::OUT_OF_MEMORY,
                message: "curl_easy_unescape returned null".to_string(),
            });
        }
        let bytes = match usize::try_from(out_len) {
            Ok(n) if n > 0 => {
                unsafe { std::slice::from_raw_parts(decoded as *const u8, n) }.to_vec()
            }
            _ => Vec::new(),
        };
        unsafe { self.api.free(decoded as *mut c_void)? };
        Ok(bytes)
    }

    /// Send raw bytes on a `CONNECT_ONLY` connection (`curl_easy_send`).
    ///
    /// `CURLE_AGAIN` comes back as a native error carrying that code.
    pub fn send(&mut self, buffer: &[u8]) -> BridgeResult<usize> {
        let handle = self.handle()?;
        let mut sent = 0usize;
        let code = unsafe {
            self.api
                .easy_send(handle, buffer.as_ptr() as *const c_void, buffer.len(), &mut sent)?
        };
        self.check(code)?;
        Ok(sent)
    }

    /// Receive raw bytes on a `CONNECT_ONLY` connection (`curl_easy_recv`)
    pub fn recv(&mut self, buffer: &mut [u8]) -> BridgeResult<usize> {
        let handle = self.handle()?;
        if buffer.is_empty() {
            return Ok(0);
        }
        let mut received = 0usize;
        let code = unsafe {
            self.api.easy_recv(
                handle,
                buffer.as_mut_ptr() as *mut c_void,
                buffer.len(),
                &mut received,
            )?
        };
        self.check(code)?;
        Ok(received)
    }

    /// Apply a browser fingerprint (`curl_easy_impersonate`).
    ///
    /// Only libcurl-impersonate exports this; elsewhere the call fails with a
    /// missing entry point.
    pub fn impersonate(&mut self, target: &str, default_headers: bool) -> BridgeResult<()> {
        let handle = self.handle()?;
        let target = CString::new(target)?;
        let code = unsafe {
            self.api
                .easy_impersonate(handle, target.as_ptr(), c_int::from(default_headers))?
        };
        self.check(code)
    }

    /// Ledger mark for a later [`Easy::ledger_truncate_from`]
    pub fn ledger_position(&self) -> usize {
        self.ledger.position()
    }

    /// Release every owned allocation recorded at or after `mark`.
    ///
    /// # Safety
    /// No option of this handle, or of a duplicate sharing its ledger entries,
    /// may still point at a released allocation: overwrite or null those
    /// options first. The engine reads them again on the next transfer.
    pub unsafe fn ledger_truncate_from(&mut self, mark: usize) -> usize {
        self.ledger.truncate_from(mark)
    }

    /// Live owned allocations
    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }
}

impl Drop for Easy {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl fmt::Debug for Easy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Easy")
            .field("handle", &self.raw_handle())
            .field("api", &self.api.name())
            .field("ledger", &self.ledger.len())
            .finish()
    }
}

fn native_len(input: &str) -> BridgeResult<c_int> {
    c_int::try_from(input.len()).map_err(|_| BridgeError::InputTooLong(input.len()))
}

/// Address an engine callback context must carry to reach `easy`
pub fn context_of(easy: &Easy) -> usize {
    easy.raw_handle() as usize
}

/// Whether a live wrapper is registered for `address`
pub fn is_registered(address: usize) -> bool {
    EASY_HANDLES.contains(address)
}
