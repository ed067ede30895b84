//! Mock Native Engine
//!
//! An in-process stand-in for libcurl implementing `NativeApi`. Options are
//! recorded per handle; `perform` drives the bridge's real trampolines
//! through the C-ABI addresses it was given, exactly as the engine would.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_long, c_void};
use std::ptr;

use parking_lot::Mutex;

use curl_bridge::ffi::{
    CurlOffT, CurlSlist, EasyOpt, Info, NativeApi, RawEasy, ReadCallbackPtr, TrampolineTable,
    WriteCallbackPtr, XferInfoCallbackPtr, CURL_READFUNC_ABORT, CURL_WRITEFUNC_PAUSE,
};
use curl_bridge::{BridgeResult, CurlCode};

/// Status line delivered to the header callback
pub const STATUS_LINE: &[u8] = b"HTTP/1.1 200 OK\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stored {
    Long(c_long),
    OffT(CurlOffT),
    Pointer(usize),
    Function(usize),
}

#[derive(Debug, Default, Clone)]
struct HandleRecord {
    options: HashMap<u32, Stored>,
    performed: bool,
    delivered: usize,
    impersonate: Option<(String, bool)>,
}

#[derive(Debug, Default)]
struct MockState {
    handles: HashMap<usize, HandleRecord>,
    body: Vec<u8>,
    chunk_size: usize,
    uploaded: Vec<u8>,
    sent: Vec<u8>,
    recv_queue: Vec<u8>,
    live_nodes: usize,
    lists_freed: usize,
    appends: usize,
    fail_append_at: Option<usize>,
    reject_option: Option<u32>,
    global_inits: usize,
    global_cleanups: usize,
    paused_writes: usize,
}

/// Recording engine; every handle is a distinct heap address
pub struct MockEngine {
    trampolines: TrampolineTable,
    state: Mutex<MockState>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            trampolines: TrampolineTable::standard(),
            state: Mutex::new(MockState {
                chunk_size: 5,
                ..MockState::default()
            }),
        }
    }

    /// Response body handed to the write callback by `perform`
    pub fn set_body(&self, body: &[u8]) {
        self.state.lock().body = body.to_vec();
    }

    pub fn set_chunk_size(&self, size: usize) {
        self.state.lock().chunk_size = size.max(1);
    }

    /// Make the `n`th (0-based) `slist_append` from now on fail
    pub fn fail_append_at(&self, n: usize) {
        let mut state = self.state.lock();
        state.fail_append_at = Some(state.appends + n);
    }

    /// Reject every setopt of `opt` with `CURLE_UNKNOWN_OPTION`
    pub fn reject_option(&self, opt: EasyOpt) {
        self.state.lock().reject_option = Some(opt.0);
    }

    pub fn queue_recv(&self, bytes: &[u8]) {
        self.state.lock().recv_queue.extend_from_slice(bytes);
    }

    pub fn option(&self, handle: RawEasy, opt: EasyOpt) -> Option<Stored> {
        let state = self.state.lock();
        state
            .handles
            .get(&(handle as usize))
            .and_then(|h| h.options.get(&opt.0).copied())
    }

    /// String an object-pointer option currently points at
    pub fn text_option(&self, handle: RawEasy, opt: EasyOpt) -> Option<String> {
        match self.option(handle, opt)? {
            Stored::Pointer(0) => None,
            Stored::Pointer(p) => {
                Some(unsafe { CStr::from_ptr(p as *const c_char) }.to_string_lossy().into_owned())
            }
            _ => None,
        }
    }

    pub fn live_handles(&self) -> usize {
        self.state.lock().handles.len()
    }

    pub fn live_list_nodes(&self) -> usize {
        self.state.lock().live_nodes
    }

    pub fn lists_freed(&self) -> usize {
        self.state.lock().lists_freed
    }

    pub fn uploaded(&self) -> Vec<u8> {
        self.state.lock().uploaded.clone()
    }

    pub fn sent(&self) -> Vec<u8> {
        self.state.lock().sent.clone()
    }

    pub fn paused_writes(&self) -> usize {
        self.state.lock().paused_writes
    }

    pub fn impersonation(&self, handle: RawEasy) -> Option<(String, bool)> {
        let state = self.state.lock();
        state
            .handles
            .get(&(handle as usize))
            .and_then(|h| h.impersonate.clone())
    }

    pub fn global_counts(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.global_inits, state.global_cleanups)
    }

    fn store(&self, handle: RawEasy, opt: EasyOpt, value: Stored) -> CurlCode {
        let mut state = self.state.lock();
        if state.reject_option == Some(opt.0) {
            return CurlCode::UNKNOWN_OPTION;
        }
        match state.handles.get_mut(&(handle as usize)) {
            Some(record) => {
                record.options.insert(opt.0, value);
                CurlCode::OK
            }
            None => CurlCode::BAD_FUNCTION_ARGUMENT,
        }
    }

    fn pointer(options: &HashMap<u32, Stored>, opt: EasyOpt) -> usize {
        match options.get(&opt.0) {
            Some(Stored::Pointer(p)) | Some(Stored::Function(p)) => *p,
            _ => 0,
        }
    }

    fn long(options: &HashMap<u32, Stored>, opt: EasyOpt, default: c_long) -> c_long {
        match options.get(&opt.0) {
            Some(Stored::Long(v)) => *v,
            _ => default,
        }
    }

    fn push_node(&self, head: *mut CurlSlist, item: &CStr) -> *mut CurlSlist {
        let node = Box::into_raw(Box::new(CurlSlist {
            data: CString::from(item).into_raw(),
            next: ptr::null_mut(),
        }));
        self.state.lock().live_nodes += 1;
        if head.is_null() {
            return node;
        }
        let mut tail = head;
        unsafe {
            while !(*tail).next.is_null() {
                tail = (*tail).next;
            }
            (*tail).next = node;
        }
        head
    }

    fn upload(&self, read: usize, ctx: usize) -> CurlCode {
        let read: ReadCallbackPtr = unsafe { std::mem::transmute(read) };
        let mut buf = [0u8; 16];
        loop {
            let n = unsafe {
                read(buf.as_mut_ptr() as *mut c_char, 1, buf.len(), ctx as *mut c_void)
            };
            if n == CURL_READFUNC_ABORT {
                return CurlCode::ABORTED_BY_CALLBACK;
            }
            if n == 0 {
                return CurlCode::OK;
            }
            if n > buf.len() {
                return CurlCode::READ_ERROR;
            }
            self.state.lock().uploaded.extend_from_slice(&buf[..n]);
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Malloc'd copy, released through `NativeApi::free`
fn native_copy(bytes: &[u8]) -> *mut c_char {
    unsafe {
        let out = libc::malloc(bytes.len() + 1) as *mut u8;
        if out.is_null() {
            return ptr::null_mut();
        }
        ptr::copy_nonoverlapping(bytes.as_ptr(), out, bytes.len());
        *out.add(bytes.len()) = 0;
        out as *mut c_char
    }
}

impl NativeApi for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn trampolines(&self) -> &TrampolineTable {
        &self.trampolines
    }

    fn version(&self) -> BridgeResult<String> {
        Ok("libcurl/8.5.0-mock".to_string())
    }

    fn global_init(&self, _flags: c_long) -> BridgeResult<CurlCode> {
        self.state.lock().global_inits += 1;
        Ok(CurlCode::OK)
    }

    fn global_cleanup(&self) -> BridgeResult<()> {
        self.state.lock().global_cleanups += 1;
        Ok(())
    }

    fn easy_strerror(&self, code: CurlCode) -> String {
        format!("mock error {}", code.0)
    }

    fn easy_init(&self) -> BridgeResult<RawEasy> {
        let handle = Box::into_raw(Box::new(0u64)) as RawEasy;
        self.state
            .lock()
            .handles
            .insert(handle as usize, HandleRecord::default());
        Ok(handle)
    }

    unsafe fn easy_duphandle(&self, handle: RawEasy) -> BridgeResult<RawEasy> {
        let Some(record) = self.state.lock().handles.get(&(handle as usize)).cloned() else {
            return Ok(ptr::null_mut());
        };
        let dup = Box::into_raw(Box::new(0u64)) as RawEasy;
        let copy = HandleRecord {
            options: record.options,
            ..HandleRecord::default()
        };
        self.state.lock().handles.insert(dup as usize, copy);
        Ok(dup)
    }

    unsafe fn easy_cleanup(&self, handle: RawEasy) -> BridgeResult<()> {
        if self.state.lock().handles.remove(&(handle as usize)).is_some() {
            drop(Box::from_raw(handle as *mut u64));
        }
        Ok(())
    }

    unsafe fn easy_reset(&self, handle: RawEasy) -> BridgeResult<()> {
        if let Some(record) = self.state.lock().handles.get_mut(&(handle as usize)) {
            *record = HandleRecord::default();
        }
        Ok(())
    }

    unsafe fn easy_perform(&self, handle: RawEasy) -> BridgeResult<CurlCode> {
        let (options, body, chunk_size) = {
            let state = self.state.lock();
            let Some(record) = state.handles.get(&(handle as usize)) else {
                return Ok(CurlCode::BAD_FUNCTION_ARGUMENT);
            };
            (record.options.clone(), state.body.clone(), state.chunk_size)
        };

        if Self::pointer(&options, EasyOpt::URL) == 0 {
            return Ok(CurlCode::URL_MALFORMAT);
        }

        let header_fn = Self::pointer(&options, EasyOpt::HEADERFUNCTION);
        if header_fn != 0 {
            let header: WriteCallbackPtr = std::mem::transmute(header_fn);
            let ctx = Self::pointer(&options, EasyOpt::HEADERDATA) as *mut c_void;
            let n = header(STATUS_LINE.as_ptr() as *mut c_char, 1, STATUS_LINE.len(), ctx);
            if n != STATUS_LINE.len() {
                return Ok(CurlCode::WRITE_ERROR);
            }
        }

        let read_fn = Self::pointer(&options, EasyOpt::READFUNCTION);
        if Self::long(&options, EasyOpt::UPLOAD, 0) != 0 && read_fn != 0 {
            let code = self.upload(read_fn, Self::pointer(&options, EasyOpt::READDATA));
            if !code.is_ok() {
                return Ok(code);
            }
        }

        let write_fn = Self::pointer(&options, EasyOpt::WRITEFUNCTION);
        let progress_fn = Self::pointer(&options, EasyOpt::XFERINFOFUNCTION);
        let progress_on = Self::long(&options, EasyOpt::NOPROGRESS, 1) == 0 && progress_fn != 0;
        let total = body.len() as CurlOffT;
        let mut delivered = 0usize;

        for chunk in body.chunks(chunk_size) {
            if write_fn != 0 {
                let write: WriteCallbackPtr = std::mem::transmute(write_fn);
                let ctx = Self::pointer(&options, EasyOpt::WRITEDATA) as *mut c_void;
                let n = write(chunk.as_ptr() as *mut c_char, 1, chunk.len(), ctx);
                if n == CURL_WRITEFUNC_PAUSE {
                    self.state.lock().paused_writes += 1;
                    break;
                }
                if n != chunk.len() {
                    return Ok(CurlCode::WRITE_ERROR);
                }
            }
            delivered += chunk.len();

            if progress_on {
                let progress: XferInfoCallbackPtr = std::mem::transmute(progress_fn);
                let ctx = Self::pointer(&options, EasyOpt::XFERINFODATA) as *mut c_void;
                if progress(ctx, total, delivered as CurlOffT, 0, 0) != 0 {
                    return Ok(CurlCode::ABORTED_BY_CALLBACK);
                }
            }
        }

        if let Some(record) = self.state.lock().handles.get_mut(&(handle as usize)) {
            record.performed = true;
            record.delivered = delivered;
        }
        Ok(CurlCode::OK)
    }

    unsafe fn easy_pause(&self, _handle: RawEasy, _bitmask: c_int) -> BridgeResult<CurlCode> {
        Ok(CurlCode::OK)
    }

    unsafe fn setopt_long(
        &self,
        handle: RawEasy,
        opt: EasyOpt,
        value: c_long,
    ) -> BridgeResult<CurlCode> {
        Ok(self.store(handle, opt, Stored::Long(value)))
    }

    unsafe fn setopt_off_t(
        &self,
        handle: RawEasy,
        opt: EasyOpt,
        value: CurlOffT,
    ) -> BridgeResult<CurlCode> {
        Ok(self.store(handle, opt, Stored::OffT(value)))
    }

    unsafe fn setopt_pointer(
        &self,
        handle: RawEasy,
        opt: EasyOpt,
        value: *const c_void,
    ) -> BridgeResult<CurlCode> {
        Ok(self.store(handle, opt, Stored::Pointer(value as usize)))
    }

    unsafe fn setopt_function(
        &self,
        handle: RawEasy,
        opt: EasyOpt,
        func: *const c_void,
    ) -> BridgeResult<CurlCode> {
        Ok(self.store(handle, opt, Stored::Function(func as usize)))
    }

    unsafe fn getinfo_long(
        &self,
        handle: RawEasy,
        info: Info,
        out: *mut c_long,
    ) -> BridgeResult<CurlCode> {
        let state = self.state.lock();
        let Some(record) = state.handles.get(&(handle as usize)) else {
            return Ok(CurlCode::BAD_FUNCTION_ARGUMENT);
        };
        *out = match info {
            Info::RESPONSE_CODE if record.performed => 200,
            Info::RESPONSE_CODE => 0,
            _ => return Ok(CurlCode::UNKNOWN_OPTION),
        };
        Ok(CurlCode::OK)
    }

    unsafe fn getinfo_double(
        &self,
        _handle: RawEasy,
        info: Info,
        out: *mut f64,
    ) -> BridgeResult<CurlCode> {
        if info != Info::TOTAL_TIME {
            return Ok(CurlCode::UNKNOWN_OPTION);
        }
        *out = 0.25;
        Ok(CurlCode::OK)
    }

    unsafe fn getinfo_off_t(
        &self,
        handle: RawEasy,
        info: Info,
        out: *mut CurlOffT,
    ) -> BridgeResult<CurlCode> {
        let state = self.state.lock();
        match (info, state.handles.get(&(handle as usize))) {
            (Info::SIZE_DOWNLOAD_T, Some(record)) => {
                *out = record.delivered as CurlOffT;
                Ok(CurlCode::OK)
            }
            _ => Ok(CurlCode::UNKNOWN_OPTION),
        }
    }

    unsafe fn getinfo_string(
        &self,
        handle: RawEasy,
        info: Info,
        out: *mut *const c_char,
    ) -> BridgeResult<CurlCode> {
        let state = self.state.lock();
        let Some(record) = state.handles.get(&(handle as usize)) else {
            return Ok(CurlCode::BAD_FUNCTION_ARGUMENT);
        };
        *out = match info {
            Info::EFFECTIVE_URL => Self::pointer(&record.options, EasyOpt::URL) as *const c_char,
            Info::CONTENT_TYPE => ptr::null(),
            _ => return Ok(CurlCode::UNKNOWN_OPTION),
        };
        Ok(CurlCode::OK)
    }

    /// Echoes a fresh copy of the handle's `HTTPHEADER` list for `COOKIELIST`
    unsafe fn getinfo_slist(
        &self,
        handle: RawEasy,
        info: Info,
        out: *mut *mut CurlSlist,
    ) -> BridgeResult<CurlCode> {
        if info != Info::COOKIELIST {
            return Ok(CurlCode::UNKNOWN_OPTION);
        }
        let source = {
            let state = self.state.lock();
            let Some(record) = state.handles.get(&(handle as usize)) else {
                return Ok(CurlCode::BAD_FUNCTION_ARGUMENT);
            };
            Self::pointer(&record.options, EasyOpt::HTTPHEADER) as *const CurlSlist
        };
        let mut copy: *mut CurlSlist = ptr::null_mut();
        let mut node = source;
        while !node.is_null() {
            copy = self.push_node(copy, CStr::from_ptr((*node).data));
            node = (*node).next;
        }
        *out = copy;
        Ok(CurlCode::OK)
    }

    unsafe fn easy_send(
        &self,
        handle: RawEasy,
        buffer: *const c_void,
        len: usize,
        sent: *mut usize,
    ) -> BridgeResult<CurlCode> {
        let mut state = self.state.lock();
        let connect_only = state
            .handles
            .get(&(handle as usize))
            .map(|h| Self::long(&h.options, EasyOpt::CONNECT_ONLY, 0) != 0)
            .unwrap_or(false);
        if !connect_only {
            return Ok(CurlCode::UNSUPPORTED_PROTOCOL);
        }
        if len > 0 {
            let bytes = std::slice::from_raw_parts(buffer as *const u8, len);
            state.sent.extend_from_slice(bytes);
        }
        *sent = len;
        Ok(CurlCode::OK)
    }

    unsafe fn easy_recv(
        &self,
        _handle: RawEasy,
        buffer: *mut c_void,
        len: usize,
        received: *mut usize,
    ) -> BridgeResult<CurlCode> {
        let mut state = self.state.lock();
        if state.recv_queue.is_empty() {
            *received = 0;
            return Ok(CurlCode::AGAIN);
        }
        let n = len.min(state.recv_queue.len());
        let chunk: Vec<u8> = state.recv_queue.drain(..n).collect();
        ptr::copy_nonoverlapping(chunk.as_ptr(), buffer as *mut u8, n);
        *received = n;
        Ok(CurlCode::OK)
    }

    unsafe fn easy_escape(
        &self,
        _handle: RawEasy,
        input: *const c_char,
        len: c_int,
    ) -> BridgeResult<*mut c_char> {
        let bytes = std::slice::from_raw_parts(input as *const u8, len as usize);
        let mut out = String::new();
        for &b in bytes {
            if b.is_ascii_alphanumeric() || b"-._~".contains(&b) {
                out.push(b as char);
            } else {
                out.push_str(&format!("%{:02X}", b));
            }
        }
        Ok(native_copy(out.as_bytes()))
    }

    unsafe fn easy_unescape(
        &self,
        _handle: RawEasy,
        input: *const c_char,
        len: c_int,
        out_len: *mut c_int,
    ) -> BridgeResult<*mut c_char> {
        let bytes = std::slice::from_raw_parts(input as *const u8, len as usize);
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' && i + 2 < bytes.len() {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
                if let Ok(v) = u8::from_str_radix(hex, 16) {
                    out.push(v);
                    i += 3;
                    continue;
                }
            }
            out.push(bytes[i]);
            i += 1;
        }
        *out_len = out.len() as c_int;
        Ok(native_copy(&out))
    }

    unsafe fn easy_impersonate(
        &self,
        handle: RawEasy,
        target: *const c_char,
        default_headers: c_int,
    ) -> BridgeResult<CurlCode> {
        let target = CStr::from_ptr(target).to_string_lossy().into_owned();
        if target.is_empty() {
            return Ok(CurlCode::BAD_FUNCTION_ARGUMENT);
        }
        let mut state = self.state.lock();
        match state.handles.get_mut(&(handle as usize)) {
            Some(record) => {
                record.impersonate = Some((target, default_headers != 0));
                Ok(CurlCode::OK)
            }
            None => Ok(CurlCode::BAD_FUNCTION_ARGUMENT),
        }
    }

    unsafe fn slist_append(
        &self,
        list: *mut CurlSlist,
        item: *const c_char,
    ) -> BridgeResult<*mut CurlSlist> {
        {
            let mut state = self.state.lock();
            let index = state.appends;
            state.appends += 1;
            if state.fail_append_at == Some(index) {
                return Ok(ptr::null_mut());
            }
        }
        Ok(self.push_node(list, CStr::from_ptr(item)))
    }

    unsafe fn slist_free_all(&self, list: *mut CurlSlist) -> BridgeResult<()> {
        let mut node = list;
        let mut freed = 0;
        while !node.is_null() {
            let boxed = Box::from_raw(node);
            drop(CString::from_raw(boxed.data));
            node = boxed.next;
            freed += 1;
        }
        let mut state = self.state.lock();
        state.live_nodes -= freed;
        state.lists_freed += 1;
        Ok(())
    }

    unsafe fn free(&self, ptr: *mut c_void) -> BridgeResult<()> {
        libc::free(ptr);
        Ok(())
    }
}
