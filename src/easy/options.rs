//! Option Dispatcher
//!
//! Marshals one dynamically typed option value into the native encoding its
//! option expects. Values the option cannot take are rejected locally before
//! any native call; native rejections come back as the engine's own code.

use std::any::Any;
use std::ffi::CString;
use std::fmt;
use std::io::{Read, Write};
use std::os::raw::{c_long, c_void};
use std::ptr;
use std::sync::Arc;

use tracing::debug;

use super::callbacks::{
    forward_to_writer, progress_callback, pull_from_reader, read_callback, write_callback,
    CallbackKind, Progress, ProgressCallback, ReadCallback, UserData, WriteCallback,
};
use super::ledger::{Allocation, NativeList};
use super::Easy;
use crate::error::{BridgeError, BridgeResult};
use crate::ffi::{CurlSlist, EasyOpt, OptionCategory, RawEasy};

/// Opaque pointer handed to the engine untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPointer(*mut c_void);

// The bridge never dereferences it.
unsafe impl Send for RawPointer {}

impl RawPointer {
    /// # Safety
    /// `ptr` must satisfy whatever the target option documents, for as long as
    /// the engine may read it.
    pub unsafe fn new(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub fn null() -> Self {
        Self(ptr::null_mut())
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0
    }
}

/// Value for [`Easy::setopt`]
pub enum OptionValue {
    /// Null pointer: clears pointer options and callbacks
    Null,
    Long(i64),
    Bool(bool),
    /// Copied into an owned NUL-terminated string
    Text(String),
    /// Passed to the engine without copying
    Bytes(Arc<[u8]>),
    /// Built into a native string list
    List(Vec<String>),
    WriteFunction(WriteCallback),
    ReadFunction(ReadCallback),
    HeaderFunction(WriteCallback),
    ProgressFunction(ProgressCallback),
    /// Destination for `WRITEDATA` / `HEADERDATA`
    Sink(Box<dyn Write + Send>),
    /// Origin for `READDATA`
    Source(Box<dyn Read + Send>),
    /// Arbitrary caller data for any callback data option
    Data(Box<dyn Any + Send>),
    Pointer(RawPointer),
}

impl OptionValue {
    pub fn write_function<F>(f: F) -> Self
    where
        F: FnMut(&[u8], &mut UserData) -> bool + Send + 'static,
    {
        OptionValue::WriteFunction(write_callback(f))
    }

    pub fn header_function<F>(f: F) -> Self
    where
        F: FnMut(&[u8], &mut UserData) -> bool + Send + 'static,
    {
        OptionValue::HeaderFunction(write_callback(f))
    }

    pub fn read_function<F>(f: F) -> Self
    where
        F: FnMut(&mut [u8], &mut UserData) -> isize + Send + 'static,
    {
        OptionValue::ReadFunction(read_callback(f))
    }

    pub fn progress_function<F>(f: F) -> Self
    where
        F: FnMut(Progress, &mut UserData) -> bool + Send + 'static,
    {
        OptionValue::ProgressFunction(progress_callback(f))
    }

    pub fn sink(writer: impl Write + Send + 'static) -> Self {
        OptionValue::Sink(Box::new(writer))
    }

    pub fn source(reader: impl Read + Send + 'static) -> Self {
        OptionValue::Source(Box::new(reader))
    }

    pub fn data(value: impl Any + Send) -> Self {
        OptionValue::Data(Box::new(value))
    }

    pub fn bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        OptionValue::Bytes(bytes.into())
    }

    /// Variant name used in type mismatch errors
    pub fn kind_name(&self) -> &'static str {
        match self {
            OptionValue::Null => "null",
            OptionValue::Long(_) => "long",
            OptionValue::Bool(_) => "bool",
            OptionValue::Text(_) => "text",
            OptionValue::Bytes(_) => "bytes",
            OptionValue::List(_) => "list",
            OptionValue::WriteFunction(_) => "write function",
            OptionValue::ReadFunction(_) => "read function",
            OptionValue::HeaderFunction(_) => "header function",
            OptionValue::ProgressFunction(_) => "progress function",
            OptionValue::Sink(_) => "sink",
            OptionValue::Source(_) => "source",
            OptionValue::Data(_) => "data",
            OptionValue::Pointer(_) => "pointer",
        }
    }
}

impl fmt::Debug for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Long(v) => write!(f, "Long({})", v),
            OptionValue::Bool(v) => write!(f, "Bool({})", v),
            OptionValue::Text(v) => write!(f, "Text({:?})", v),
            OptionValue::Bytes(v) => write!(f, "Bytes({} bytes)", v.len()),
            OptionValue::List(v) => write!(f, "List({:?})", v),
            OptionValue::Pointer(p) => write!(f, "Pointer({:?})", p.as_ptr()),
            other => f.write_str(other.kind_name()),
        }
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Long(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Long(v.into())
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Text(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Text(v)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(v: Vec<String>) -> Self {
        OptionValue::List(v)
    }
}

impl From<&[&str]> for OptionValue {
    fn from(v: &[&str]) -> Self {
        OptionValue::List(v.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<u8>> for OptionValue {
    fn from(v: Vec<u8>) -> Self {
        OptionValue::Bytes(v.into())
    }
}

impl From<RawPointer> for OptionValue {
    fn from(p: RawPointer) -> Self {
        OptionValue::Pointer(p)
    }
}

/// Largest `POSTFIELDS` body described through the `long` size option
const POSTFIELDSIZE_LONG_MAX: usize = i32::MAX as usize;

fn expected_for(opt: EasyOpt) -> &'static str {
    if opt.is_wide_integer() {
        return "wide integer";
    }
    match opt.category() {
        OptionCategory::Long => "long or bool",
        OptionCategory::ObjectPoint => "text, bytes, list, pointer or null",
        OptionCategory::FunctionPoint => "function pointer or null",
        OptionCategory::OffT => "wide integer",
        OptionCategory::Blob => "pointer or null",
    }
}

fn mismatch(option: EasyOpt, expected: &'static str, value: &OptionValue) -> BridgeError {
    BridgeError::TypeMismatch {
        option,
        expected,
        got: value.kind_name(),
    }
}

impl Easy {
    /// Set an option (`curl_easy_setopt`).
    ///
    /// Callback function options install the bridge trampoline with the native
    /// handle as context; their data options route caller data to that
    /// callback.
    pub fn setopt(&mut self, opt: EasyOpt, value: impl Into<OptionValue>) -> BridgeResult<()> {
        let handle = self.handle()?;
        let value = value.into();
        debug!(option = %opt, value = ?value, "setopt");

        if let Some(kind) = CallbackKind::from_function_option(opt) {
            return self.set_callback(handle, kind, value);
        }
        if let Some(kind) = CallbackKind::from_data_option(opt) {
            return self.set_callback_data(handle, kind, value);
        }

        let category = opt.category();
        match value {
            OptionValue::Null => match category {
                OptionCategory::ObjectPoint | OptionCategory::Blob => {
                    self.set_pointer(handle, opt, ptr::null())
                }
                OptionCategory::FunctionPoint => self.set_function(handle, opt, ptr::null()),
                _ => Err(mismatch(opt, expected_for(opt), &value)),
            },
            OptionValue::Long(v) => self.set_integer(handle, opt, v),
            OptionValue::Bool(b) if category == OptionCategory::Long => {
                self.set_integer(handle, opt, i64::from(b))
            }
            OptionValue::Text(text) if category == OptionCategory::ObjectPoint => {
                self.set_text(handle, opt, &text)
            }
            OptionValue::Bytes(bytes) if category == OptionCategory::ObjectPoint => {
                self.set_bytes(handle, opt, bytes)
            }
            OptionValue::List(items) if category == OptionCategory::ObjectPoint => {
                self.set_list(handle, opt, &items)
            }
            OptionValue::Pointer(p) => match category {
                OptionCategory::ObjectPoint | OptionCategory::Blob => {
                    self.set_pointer(handle, opt, p.as_ptr())
                }
                OptionCategory::FunctionPoint => self.set_function(handle, opt, p.as_ptr()),
                _ => Err(mismatch(opt, expected_for(opt), &value)),
            },
            other => Err(mismatch(opt, expected_for(opt), &other)),
        }
    }

    fn set_pointer(
        &mut self,
        handle: RawEasy,
        opt: EasyOpt,
        value: *const c_void,
    ) -> BridgeResult<()> {
        let code = unsafe { self.api.setopt_pointer(handle, opt, value)? };
        self.check(code)
    }

    fn set_function(
        &mut self,
        handle: RawEasy,
        opt: EasyOpt,
        func: *const c_void,
    ) -> BridgeResult<()> {
        let code = unsafe { self.api.setopt_function(handle, opt, func)? };
        self.check(code)
    }

    fn set_integer(&mut self, handle: RawEasy, opt: EasyOpt, value: i64) -> BridgeResult<()> {
        if opt.is_wide_integer() {
            let code = unsafe { self.api.setopt_off_t(handle, opt, value)? };
            return self.check(code);
        }
        if opt.category() != OptionCategory::Long {
            return Err(mismatch(opt, expected_for(opt), &OptionValue::Long(value)));
        }
        let native = c_long::try_from(value)
            .map_err(|_| BridgeError::OutOfRange { option: opt, value })?;
        let code = unsafe { self.api.setopt_long(handle, opt, native)? };
        self.check(code)
    }

    fn set_text(&mut self, handle: RawEasy, opt: EasyOpt, text: &str) -> BridgeResult<()> {
        let owned = Arc::new(CString::new(text)?);
        let mark = self.ledger.position();
        self.ledger.append(Allocation::Text(Arc::clone(&owned)));
        self.set_pointer(handle, opt, owned.as_ptr() as *const c_void)
            .map_err(|e| {
                self.ledger.truncate_from(mark);
                e
            })
    }

    fn set_bytes(&mut self, handle: RawEasy, opt: EasyOpt, bytes: Arc<[u8]>) -> BridgeResult<()> {
        // An empty buffer has no allocation to keep alive
        let addr = if bytes.is_empty() {
            ptr::null()
        } else {
            bytes.as_ptr() as *const c_void
        };
        let mark = self.ledger.position();
        if !addr.is_null() && !self.ledger.contains(addr) {
            self.ledger.append(Allocation::Buffer(Arc::clone(&bytes)));
        }
        let result = self.set_pointer(handle, opt, addr).and_then(|()| {
            if opt != EasyOpt::POSTFIELDS {
                return Ok(());
            }
            let len = bytes.len();
            if len > POSTFIELDSIZE_LONG_MAX {
                self.set_integer(handle, EasyOpt::POSTFIELDSIZE_LARGE, len as i64)
            } else {
                self.set_integer(handle, EasyOpt::POSTFIELDSIZE, len as i64)
            }
        });
        if result.is_err() {
            self.ledger.truncate_from(mark);
        }
        result
    }

    /// Append one item to a list under construction.
    ///
    /// The item's copy is recorded in the ledger before the native call.
    fn append_list_item(
        &mut self,
        head: *mut CurlSlist,
        item: &str,
    ) -> BridgeResult<*mut CurlSlist> {
        let owned = Arc::new(CString::new(item)?);
        self.ledger.append(Allocation::Text(Arc::clone(&owned)));
        let next = unsafe { self.api.slist_append(head, owned.as_ptr())? };
        if next.is_null() {
            return Err(BridgeError::ListAppend(item.to_string()));
        }
        Ok(next)
    }

    fn set_list(&mut self, handle: RawEasy, opt: EasyOpt, items: &[String]) -> BridgeResult<()> {
        let mark = self.ledger.position();
        let mut head: *mut CurlSlist = ptr::null_mut();

        for item in items {
            match self.append_list_item(head, item) {
                Ok(next) => head = next,
                Err(e) => {
                    self.ledger.truncate_from(mark);
                    drop(unsafe { NativeList::from_raw(head, Arc::clone(&self.api)) });
                    debug!(option = %opt, error = %e, "list build rolled back");
                    return Err(e);
                }
            }
        }

        let list = Arc::new(unsafe { NativeList::from_raw(head, Arc::clone(&self.api)) });
        match self.set_pointer(handle, opt, list.as_ptr() as *const c_void) {
            Ok(()) => {
                if !head.is_null() {
                    self.ledger.append(Allocation::List(list));
                }
                Ok(())
            }
            Err(e) => {
                self.ledger.truncate_from(mark);
                Err(e)
            }
        }
    }

    /// Point the engine at the trampoline for `kind` with this handle as context
    fn install_trampoline(&mut self, handle: RawEasy, kind: CallbackKind) -> BridgeResult<()> {
        self.set_pointer(handle, kind.data_option(), handle as *const c_void)?;
        if kind == CallbackKind::Progress {
            self.set_integer(handle, EasyOpt::NOPROGRESS, 0)?;
        }
        let trampoline = self.api.trampolines().address(kind);
        self.set_function(handle, kind.function_option(), trampoline)
    }

    fn set_callback(
        &mut self,
        handle: RawEasy,
        kind: CallbackKind,
        value: OptionValue,
    ) -> BridgeResult<()> {
        match (kind, value) {
            (_, OptionValue::Null) => {
                self.state.clear(kind);
                self.set_function(handle, kind.function_option(), ptr::null())?;
                self.set_pointer(handle, kind.data_option(), ptr::null())?;
                if kind == CallbackKind::Progress {
                    self.set_integer(handle, EasyOpt::NOPROGRESS, 1)?;
                }
                Ok(())
            }
            // The slot is filled only once the engine accepted the trampoline
            (CallbackKind::Write, OptionValue::WriteFunction(f)) => {
                self.install_trampoline(handle, kind)?;
                self.state.write.lock().callback = Some(f);
                Ok(())
            }
            (CallbackKind::Read, OptionValue::ReadFunction(f)) => {
                self.install_trampoline(handle, kind)?;
                self.state.read.lock().callback = Some(f);
                Ok(())
            }
            (CallbackKind::Header, OptionValue::HeaderFunction(f)) => {
                self.install_trampoline(handle, kind)?;
                self.state.header.lock().callback = Some(f);
                Ok(())
            }
            (CallbackKind::Progress, OptionValue::ProgressFunction(f)) => {
                self.install_trampoline(handle, kind)?;
                self.state.progress.lock().callback = Some(f);
                Ok(())
            }
            (kind, other) => {
                let expected = match kind {
                    CallbackKind::Write => "write function or null",
                    CallbackKind::Read => "read function or null",
                    CallbackKind::Header => "header function or null",
                    CallbackKind::Progress => "progress function or null",
                };
                Err(mismatch(kind.function_option(), expected, &other))
            }
        }
    }

    fn set_callback_data(
        &mut self,
        handle: RawEasy,
        kind: CallbackKind,
        value: OptionValue,
    ) -> BridgeResult<()> {
        let installed = self.state.is_installed(kind);
        match (kind, value) {
            (_, OptionValue::Null) => {
                self.state.set_data(kind, UserData::Empty);
                if installed {
                    return Ok(());
                }
                self.set_pointer(handle, kind.data_option(), ptr::null())
            }
            (CallbackKind::Write | CallbackKind::Header, OptionValue::Sink(writer)) => {
                self.state.set_data(kind, UserData::Writer(writer));
                self.install_with_default(handle, kind, installed)
            }
            (CallbackKind::Read, OptionValue::Source(reader)) => {
                self.state.set_data(kind, UserData::Reader(reader));
                self.install_with_default(handle, kind, installed)
            }
            (_, OptionValue::Data(value)) => {
                self.state.set_data(kind, UserData::Any(value));
                if installed {
                    self.set_pointer(handle, kind.data_option(), handle as *const c_void)
                } else {
                    // Applied once a callback is installed
                    Ok(())
                }
            }
            (kind, other) => {
                let expected = match kind {
                    CallbackKind::Write | CallbackKind::Header => "sink, data or null",
                    CallbackKind::Read => "source, data or null",
                    CallbackKind::Progress => "data or null",
                };
                Err(mismatch(kind.data_option(), expected, &other))
            }
        }
    }

    /// Install the trampoline, backed by the forwarding default when no
    /// callback was set; a rejected install leaves the slot empty again.
    fn install_with_default(
        &mut self,
        handle: RawEasy,
        kind: CallbackKind,
        installed: bool,
    ) -> BridgeResult<()> {
        if installed {
            return self.install_trampoline(handle, kind);
        }
        self.install_default(kind);
        self.install_trampoline(handle, kind).map_err(|e| {
            self.state.clear(kind);
            e
        })
    }

    fn install_default(&mut self, kind: CallbackKind) {
        match kind {
            CallbackKind::Write => self.state.write.lock().callback = Some(forward_to_writer()),
            CallbackKind::Header => self.state.header.lock().callback = Some(forward_to_writer()),
            CallbackKind::Read => self.state.read.lock().callback = Some(pull_from_reader()),
            CallbackKind::Progress => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert!(matches!(OptionValue::from(5i64), OptionValue::Long(5)));
        assert!(matches!(OptionValue::from(5i32), OptionValue::Long(5)));
        assert!(matches!(OptionValue::from(true), OptionValue::Bool(true)));
        assert!(matches!(OptionValue::from("x"), OptionValue::Text(ref s) if s == "x"));

        let list: &[&str] = &["a", "b"];
        match OptionValue::from(list) {
            OptionValue::List(items) => assert_eq!(items, vec!["a", "b"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(OptionValue::Null.kind_name(), "null");
        assert_eq!(OptionValue::write_function(|_, _| true).kind_name(), "write function");
        assert_eq!(OptionValue::sink(Vec::<u8>::new()).kind_name(), "sink");
        assert_eq!(OptionValue::bytes(vec![1u8, 2]).kind_name(), "bytes");
        assert_eq!(format!("{:?}", OptionValue::Long(3)), "Long(3)");
    }

    #[test]
    fn test_expected_for_categories() {
        assert_eq!(expected_for(EasyOpt::VERBOSE), "long or bool");
        assert_eq!(expected_for(EasyOpt::INFILESIZE_LARGE), "wide integer");
        assert_eq!(expected_for(EasyOpt::WRITEFUNCTION), "function pointer or null");
        assert!(expected_for(EasyOpt::URL).starts_with("text"));
    }

    #[test]
    fn test_raw_pointer() {
        assert!(RawPointer::null().as_ptr().is_null());
        let mut target = 0u8;
        let p = unsafe { RawPointer::new(&mut target as *mut u8 as *mut c_void) };
        assert!(!p.as_ptr().is_null());
    }
}
