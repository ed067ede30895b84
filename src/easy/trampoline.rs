//! Callback Trampolines
//!
//! Fixed-signature entry points the engine calls during a transfer. Each
//! C-ABI adapter turns its raw arguments into slices, looks the context
//! pointer up in the handle registry and hands off to a safe body that maps
//! the managed result onto the engine's return-code vocabulary.
//!
//! Panics never unwind into the engine. A panicking callback is reported and
//! answered with the most conservative sentinel for its kind.

use std::os::raw::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::slice;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, trace};

use super::callbacks::{
    CallbackKind, EasyState, Progress, ReadCallback, Slot, WriteCallback,
};
use super::registry::EASY_HANDLES;
use crate::ffi::{
    CurlOffT, CURL_READFUNC_ABORT, CURL_WRITEFUNC_PAUSE, PROGRESS_ABORT, PROGRESS_CONTINUE,
};

/// Return value of a write or header trampoline with no callback to run
pub const WRITE_MISS: usize = 0;

/// Return value of a progress trampoline with no callback to run
pub const PROGRESS_MISS: c_int = PROGRESS_CONTINUE;

fn lookup(ctx: *mut c_void, kind: CallbackKind) -> Option<Arc<EasyState>> {
    let state = EASY_HANDLES.lookup(ctx as usize);
    if state.is_none() {
        trace!(ctx = ?ctx, %kind, "no wrapper registered for callback context");
    }
    state
}

fn guarded<R>(kind: CallbackKind, on_panic: R, body: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!(%kind, %message, "callback panicked");
            on_panic
        }
    }
}

fn deliver_chunk(slot: &Mutex<Slot<WriteCallback>>, kind: CallbackKind, chunk: &[u8]) -> usize {
    let mut slot = slot.lock();
    let Slot { callback, data } = &mut *slot;
    match callback {
        Some(callback) => {
            if callback(chunk, data) {
                chunk.len()
            } else {
                CURL_WRITEFUNC_PAUSE
            }
        }
        None => {
            trace!(%kind, "callback context has no callback installed");
            WRITE_MISS
        }
    }
}

/// Write body: full count on accept, pause sentinel on reject, `0` on a miss
pub fn deliver_write(state: Option<&EasyState>, chunk: &[u8]) -> usize {
    match state {
        Some(state) => deliver_chunk(&state.write, CallbackKind::Write, chunk),
        None => WRITE_MISS,
    }
}

/// Header body; same mapping as [`deliver_write`]
pub fn deliver_header(state: Option<&EasyState>, chunk: &[u8]) -> usize {
    match state {
        Some(state) => deliver_chunk(&state.header, CallbackKind::Header, chunk),
        None => WRITE_MISS,
    }
}

fn fill_from(slot: &Mutex<Slot<ReadCallback>>, buf: &mut [u8]) -> usize {
    let mut slot = slot.lock();
    let Slot { callback, data } = &mut *slot;
    let Some(callback) = callback else {
        trace!(kind = %CallbackKind::Read, "callback context has no callback installed");
        return CURL_READFUNC_ABORT;
    };
    if buf.is_empty() {
        return 0;
    }
    let capacity = buf.len();
    let count = callback(buf, data);
    match usize::try_from(count) {
        Ok(n) if n <= capacity => n,
        _ => {
            trace!(count, capacity, "read callback returned an invalid count");
            CURL_READFUNC_ABORT
        }
    }
}

/// Read body.
///
/// A miss aborts; zero capacity returns `0` without running the callback; a
/// negative or oversized count aborts.
pub fn deliver_read(state: Option<&EasyState>, buf: &mut [u8]) -> usize {
    match state {
        Some(state) => fill_from(&state.read, buf),
        None => CURL_READFUNC_ABORT,
    }
}

/// Progress body: `0` to continue, `1` to abort, `0` on a miss
pub fn deliver_progress(state: Option<&EasyState>, progress: Progress) -> c_int {
    let Some(state) = state else {
        return PROGRESS_MISS;
    };
    let mut slot = state.progress.lock();
    let Slot { callback, data } = &mut *slot;
    match callback {
        Some(callback) => {
            if callback(progress, data) {
                PROGRESS_CONTINUE
            } else {
                PROGRESS_ABORT
            }
        }
        None => PROGRESS_MISS,
    }
}

unsafe fn chunk<'a>(buffer: *mut c_char, size: usize, nmemb: usize) -> Option<&'a [u8]> {
    let len = size.checked_mul(nmemb)?;
    if len == 0 || buffer.is_null() {
        return Some(&[]);
    }
    Some(slice::from_raw_parts(buffer as *const u8, len))
}

/// `CURLOPT_WRITEFUNCTION` adapter
///
/// # Safety
/// Called by the engine with `buffer` valid for `size * nmemb` bytes.
pub unsafe extern "C" fn write_adapter(
    buffer: *mut c_char,
    size: usize,
    nmemb: usize,
    ctx: *mut c_void,
) -> usize {
    guarded(CallbackKind::Write, CURL_WRITEFUNC_PAUSE, || {
        let Some(data) = chunk(buffer, size, nmemb) else {
            return WRITE_MISS;
        };
        let state = lookup(ctx, CallbackKind::Write);
        deliver_write(state.as_deref(), data)
    })
}

/// `CURLOPT_HEADERFUNCTION` adapter
///
/// # Safety
/// Called by the engine with `buffer` valid for `size * nmemb` bytes.
pub unsafe extern "C" fn header_adapter(
    buffer: *mut c_char,
    size: usize,
    nmemb: usize,
    ctx: *mut c_void,
) -> usize {
    guarded(CallbackKind::Header, CURL_WRITEFUNC_PAUSE, || {
        let Some(data) = chunk(buffer, size, nmemb) else {
            return WRITE_MISS;
        };
        let state = lookup(ctx, CallbackKind::Header);
        deliver_header(state.as_deref(), data)
    })
}

/// `CURLOPT_READFUNCTION` adapter
///
/// # Safety
/// Called by the engine with `buffer` writable for `size * nitems` bytes.
pub unsafe extern "C" fn read_adapter(
    buffer: *mut c_char,
    size: usize,
    nitems: usize,
    ctx: *mut c_void,
) -> usize {
    guarded(CallbackKind::Read, CURL_READFUNC_ABORT, || {
        let state = lookup(ctx, CallbackKind::Read);
        let Some(capacity) = size.checked_mul(nitems) else {
            return CURL_READFUNC_ABORT;
        };
        let buf: &mut [u8] = if capacity == 0 || buffer.is_null() {
            &mut []
        } else {
            slice::from_raw_parts_mut(buffer as *mut u8, capacity)
        };
        deliver_read(state.as_deref(), buf)
    })
}

/// `CURLOPT_XFERINFOFUNCTION` adapter
///
/// # Safety
/// Called by the engine with the context pointer it was given.
pub unsafe extern "C" fn xferinfo_adapter(
    ctx: *mut c_void,
    dltotal: CurlOffT,
    dlnow: CurlOffT,
    ultotal: CurlOffT,
    ulnow: CurlOffT,
) -> c_int {
    guarded(CallbackKind::Progress, PROGRESS_ABORT, || {
        let state = lookup(ctx, CallbackKind::Progress);
        let progress = Progress {
            dltotal,
            dlnow,
            ultotal,
            ulnow,
        };
        deliver_progress(state.as_deref(), progress)
    })
}
