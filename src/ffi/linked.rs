//! Linked libcurl
//!
//! Direct calls into a libcurl linked at build time. Signatures are checked
//! by the linker, so no entry point can be missing at runtime. Stock libcurl
//! has no impersonation entry point; that call always reports it as missing.

use std::os::raw::{c_char, c_int, c_long, c_void};

use super::api::{NativeApi, TrampolineTable};
use super::loader::c_string_lossy;
use super::types::{CurlOffT, CurlSlist, EasyOpt, EntryPoint, Info, RawEasy};
use crate::error::{BridgeError, BridgeResult, CurlCode};

#[link(name = "curl")]
extern "C" {
    fn curl_version() -> *const c_char;
    fn curl_global_init(flags: c_long) -> c_int;
    fn curl_global_cleanup();
    fn curl_free(ptr: *mut c_void);
    fn curl_easy_init() -> RawEasy;
    fn curl_easy_duphandle(handle: RawEasy) -> RawEasy;
    fn curl_easy_cleanup(handle: RawEasy);
    fn curl_easy_setopt(handle: RawEasy, option: c_int, ...) -> c_int;
    fn curl_easy_getinfo(handle: RawEasy, info: c_int, ...) -> c_int;
    fn curl_easy_perform(handle: RawEasy) -> c_int;
    fn curl_easy_pause(handle: RawEasy, bitmask: c_int) -> c_int;
    fn curl_easy_reset(handle: RawEasy);
    fn curl_easy_send(handle: RawEasy, buffer: *const c_void, len: usize, n: *mut usize)
        -> c_int;
    fn curl_easy_recv(handle: RawEasy, buffer: *mut c_void, len: usize, n: *mut usize) -> c_int;
    fn curl_easy_escape(handle: RawEasy, input: *const c_char, len: c_int) -> *mut c_char;
    fn curl_easy_unescape(
        handle: RawEasy,
        input: *const c_char,
        len: c_int,
        out_len: *mut c_int,
    ) -> *mut c_char;
    fn curl_easy_strerror(code: c_int) -> *const c_char;
    fn curl_slist_append(list: *mut CurlSlist, item: *const c_char) -> *mut CurlSlist;
    fn curl_slist_free_all(list: *mut CurlSlist);
}

/// Native calls into the linked library
pub struct LinkedApi {
    trampolines: TrampolineTable,
}

impl LinkedApi {
    pub fn new() -> Self {
        Self {
            trampolines: TrampolineTable::standard(),
        }
    }
}

impl Default for LinkedApi {
    fn default() -> Self {
        Self::new()
    }
}

fn code(rc: c_int) -> BridgeResult<CurlCode> {
    Ok(CurlCode(rc as u32))
}

impl NativeApi for LinkedApi {
    fn name(&self) -> &str {
        "linked"
    }

    fn trampolines(&self) -> &TrampolineTable {
        &self.trampolines
    }

    fn version(&self) -> BridgeResult<String> {
        Ok(unsafe { c_string_lossy(curl_version()) })
    }

    fn global_init(&self, flags: c_long) -> BridgeResult<CurlCode> {
        code(unsafe { curl_global_init(flags) })
    }

    fn global_cleanup(&self) -> BridgeResult<()> {
        unsafe { curl_global_cleanup() };
        Ok(())
    }

    fn easy_strerror(&self, rc: CurlCode) -> String {
        unsafe { c_string_lossy(curl_easy_strerror(rc.0 as c_int)) }
    }

    fn easy_init(&self) -> BridgeResult<RawEasy> {
        Ok(unsafe { curl_easy_init() })
    }

    unsafe fn easy_duphandle(&self, handle: RawEasy) -> BridgeResult<RawEasy> {
        Ok(curl_easy_duphandle(handle))
    }

    unsafe fn easy_cleanup(&self, handle: RawEasy) -> BridgeResult<()> {
        curl_easy_cleanup(handle);
        Ok(())
    }

    unsafe fn easy_reset(&self, handle: RawEasy) -> BridgeResult<()> {
        curl_easy_reset(handle);
        Ok(())
    }

    unsafe fn easy_perform(&self, handle: RawEasy) -> BridgeResult<CurlCode> {
        code(curl_easy_perform(handle))
    }

    unsafe fn easy_pause(&self, handle: RawEasy, bitmask: c_int) -> BridgeResult<CurlCode> {
        code(curl_easy_pause(handle, bitmask))
    }

    unsafe fn setopt_long(
        &self,
        handle: RawEasy,
        opt: EasyOpt,
        value: c_long,
    ) -> BridgeResult<CurlCode> {
        code(curl_easy_setopt(handle, opt.code(), value))
    }

    unsafe fn setopt_off_t(
        &self,
        handle: RawEasy,
        opt: EasyOpt,
        value: CurlOffT,
    ) -> BridgeResult<CurlCode> {
        code(curl_easy_setopt(handle, opt.code(), value))
    }

    unsafe fn setopt_pointer(
        &self,
        handle: RawEasy,
        opt: EasyOpt,
        value: *const c_void,
    ) -> BridgeResult<CurlCode> {
        code(curl_easy_setopt(handle, opt.code(), value))
    }

    unsafe fn setopt_function(
        &self,
        handle: RawEasy,
        opt: EasyOpt,
        func: *const c_void,
    ) -> BridgeResult<CurlCode> {
        code(curl_easy_setopt(handle, opt.code(), func))
    }

    unsafe fn getinfo_long(
        &self,
        handle: RawEasy,
        info: Info,
        out: *mut c_long,
    ) -> BridgeResult<CurlCode> {
        code(curl_easy_getinfo(handle, info.code(), out))
    }

    unsafe fn getinfo_double(
        &self,
        handle: RawEasy,
        info: Info,
        out: *mut f64,
    ) -> BridgeResult<CurlCode> {
        code(curl_easy_getinfo(handle, info.code(), out))
    }

    unsafe fn getinfo_off_t(
        &self,
        handle: RawEasy,
        info: Info,
        out: *mut CurlOffT,
    ) -> BridgeResult<CurlCode> {
        code(curl_easy_getinfo(handle, info.code(), out))
    }

    unsafe fn getinfo_string(
        &self,
        handle: RawEasy,
        info: Info,
        out: *mut *const c_char,
    ) -> BridgeResult<CurlCode> {
        code(curl_easy_getinfo(handle, info.code(), out))
    }

    unsafe fn getinfo_slist(
        &self,
        handle: RawEasy,
        info: Info,
        out: *mut *mut CurlSlist,
    ) -> BridgeResult<CurlCode> {
        code(curl_easy_getinfo(handle, info.code(), out))
    }

    unsafe fn easy_send(
        &self,
        handle: RawEasy,
        buffer: *const c_void,
        len: usize,
        sent: *mut usize,
    ) -> BridgeResult<CurlCode> {
        code(curl_easy_send(handle, buffer, len, sent))
    }

    unsafe fn easy_recv(
        &self,
        handle: RawEasy,
        buffer: *mut c_void,
        len: usize,
        received: *mut usize,
    ) -> BridgeResult<CurlCode> {
        code(curl_easy_recv(handle, buffer, len, received))
    }

    unsafe fn easy_escape(
        &self,
        handle: RawEasy,
        input: *const c_char,
        len: c_int,
    ) -> BridgeResult<*mut c_char> {
        Ok(curl_easy_escape(handle, input, len))
    }

    unsafe fn easy_unescape(
        &self,
        handle: RawEasy,
        input: *const c_char,
        len: c_int,
        out_len: *mut c_int,
    ) -> BridgeResult<*mut c_char> {
        Ok(curl_easy_unescape(handle, input, len, out_len))
    }

    unsafe fn easy_impersonate(
        &self,
        _handle: RawEasy,
        _target: *const c_char,
        _default_headers: c_int,
    ) -> BridgeResult<CurlCode> {
        Err(BridgeError::EntryPointMissing {
            entry: EntryPoint::EasyImpersonate,
            reason: "not available in a linked stock libcurl".to_string(),
        })
    }

    unsafe fn slist_append(
        &self,
        list: *mut CurlSlist,
        item: *const c_char,
    ) -> BridgeResult<*mut CurlSlist> {
        Ok(curl_slist_append(list, item))
    }

    unsafe fn slist_free_all(&self, list: *mut CurlSlist) -> BridgeResult<()> {
        curl_slist_free_all(list);
        Ok(())
    }

    unsafe fn free(&self, ptr: *mut c_void) -> BridgeResult<()> {
        curl_free(ptr);
        Ok(())
    }
}
