//! Native Call Contract
//!
//! The single calling surface every layer above the platform uses. Two
//! implementations exist and one is chosen at build time: [`DynamicApi`]
//! resolves entry points from a loaded module, `LinkedApi` calls a linked
//! libcurl directly (feature `static-link`).
//!
//! [`DynamicApi`]: super::DynamicApi

use std::os::raw::{c_char, c_int, c_long, c_void};

use super::types::{
    CurlOffT, CurlSlist, EasyOpt, Info, RawEasy, ReadCallbackPtr, WriteCallbackPtr,
    XferInfoCallbackPtr,
};
use crate::easy::{trampoline, CallbackKind};
use crate::error::{BridgeResult, CurlCode};

/// Addresses handed to the engine as callback function options
#[derive(Debug, Clone, Copy)]
pub struct TrampolineTable {
    pub write: WriteCallbackPtr,
    pub read: ReadCallbackPtr,
    pub header: WriteCallbackPtr,
    pub xferinfo: XferInfoCallbackPtr,
}

impl TrampolineTable {
    /// Table pointing at the bridge's C-ABI adapters
    pub fn standard() -> Self {
        Self {
            write: trampoline::write_adapter,
            read: trampoline::read_adapter,
            header: trampoline::header_adapter,
            xferinfo: trampoline::xferinfo_adapter,
        }
    }

    /// Address for the given callback kind
    pub fn address(&self, kind: CallbackKind) -> *const c_void {
        match kind {
            CallbackKind::Write => self.write as *const c_void,
            CallbackKind::Read => self.read as *const c_void,
            CallbackKind::Header => self.header as *const c_void,
            CallbackKind::Progress => self.xferinfo as *const c_void,
        }
    }
}

/// Native call contract.
///
/// Methods taking a handle or raw pointer are `unsafe`: the caller guarantees
/// the handle came from this API and is still alive, and that pointers satisfy
/// the native function's documented requirements. Every method reports a
/// missing module or entry point as an error instead of crashing.
pub trait NativeApi: Send + Sync {
    /// Human readable name of the backing strategy
    fn name(&self) -> &str;

    /// Trampoline addresses valid for this strategy
    fn trampolines(&self) -> &TrampolineTable;

    /// `curl_version`
    fn version(&self) -> BridgeResult<String>;

    /// `curl_global_init`
    fn global_init(&self, flags: c_long) -> BridgeResult<CurlCode>;

    /// `curl_global_cleanup`
    fn global_cleanup(&self) -> BridgeResult<()>;

    /// `curl_easy_strerror`, copied into an owned string
    fn easy_strerror(&self, code: CurlCode) -> String;

    /// `curl_easy_init`; a null handle is reported as `Ok(null)`
    fn easy_init(&self) -> BridgeResult<RawEasy>;

    unsafe fn easy_duphandle(&self, handle: RawEasy) -> BridgeResult<RawEasy>;

    unsafe fn easy_cleanup(&self, handle: RawEasy) -> BridgeResult<()>;

    unsafe fn easy_reset(&self, handle: RawEasy) -> BridgeResult<()>;

    unsafe fn easy_perform(&self, handle: RawEasy) -> BridgeResult<CurlCode>;

    unsafe fn easy_pause(&self, handle: RawEasy, bitmask: c_int) -> BridgeResult<CurlCode>;

    unsafe fn setopt_long(&self, handle: RawEasy, opt: EasyOpt, value: c_long)
        -> BridgeResult<CurlCode>;

    unsafe fn setopt_off_t(
        &self,
        handle: RawEasy,
        opt: EasyOpt,
        value: CurlOffT,
    ) -> BridgeResult<CurlCode>;

    unsafe fn setopt_pointer(
        &self,
        handle: RawEasy,
        opt: EasyOpt,
        value: *const c_void,
    ) -> BridgeResult<CurlCode>;

    /// Function-pointer option; a null `func` clears it
    unsafe fn setopt_function(
        &self,
        handle: RawEasy,
        opt: EasyOpt,
        func: *const c_void,
    ) -> BridgeResult<CurlCode>;

    unsafe fn getinfo_long(&self, handle: RawEasy, info: Info, out: *mut c_long)
        -> BridgeResult<CurlCode>;

    unsafe fn getinfo_double(&self, handle: RawEasy, info: Info, out: *mut f64)
        -> BridgeResult<CurlCode>;

    unsafe fn getinfo_off_t(
        &self,
        handle: RawEasy,
        info: Info,
        out: *mut CurlOffT,
    ) -> BridgeResult<CurlCode>;

    unsafe fn getinfo_string(
        &self,
        handle: RawEasy,
        info: Info,
        out: *mut *const c_char,
    ) -> BridgeResult<CurlCode>;

    unsafe fn getinfo_slist(
        &self,
        handle: RawEasy,
        info: Info,
        out: *mut *mut CurlSlist,
    ) -> BridgeResult<CurlCode>;

    unsafe fn easy_send(
        &self,
        handle: RawEasy,
        buffer: *const c_void,
        len: usize,
        sent: *mut usize,
    ) -> BridgeResult<CurlCode>;

    unsafe fn easy_recv(
        &self,
        handle: RawEasy,
        buffer: *mut c_void,
        len: usize,
        received: *mut usize,
    ) -> BridgeResult<CurlCode>;

    /// Returns a string that must be released with [`NativeApi::free`]
    unsafe fn easy_escape(
        &self,
        handle: RawEasy,
        input: *const c_char,
        len: c_int,
    ) -> BridgeResult<*mut c_char>;

    /// Returns a string that must be released with [`NativeApi::free`]
    unsafe fn easy_unescape(
        &self,
        handle: RawEasy,
        input: *const c_char,
        len: c_int,
        out_len: *mut c_int,
    ) -> BridgeResult<*mut c_char>;

    /// `curl_easy_impersonate` (libcurl-impersonate only)
    unsafe fn easy_impersonate(
        &self,
        handle: RawEasy,
        target: *const c_char,
        default_headers: c_int,
    ) -> BridgeResult<CurlCode>;

    /// `curl_slist_append`; a null result means the engine refused
    unsafe fn slist_append(
        &self,
        list: *mut CurlSlist,
        item: *const c_char,
    ) -> BridgeResult<*mut CurlSlist>;

    unsafe fn slist_free_all(&self, list: *mut CurlSlist) -> BridgeResult<()>;

    /// `curl_free`
    unsafe fn free(&self, ptr: *mut c_void) -> BridgeResult<()>;
}
