//! Callback Slots
//!
//! Managed callbacks and the caller data handed to them. Each wrapper owns
//! one slot per callback kind; the trampolines reach the slots through the
//! handle registry.

use std::any::Any;
use std::fmt;
use std::io::{Read, Write};

use parking_lot::Mutex;

use crate::ffi::EasyOpt;

/// The four engine callbacks the bridge serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    Write,
    Read,
    Header,
    Progress,
}

impl CallbackKind {
    pub const ALL: [CallbackKind; 4] = [
        CallbackKind::Write,
        CallbackKind::Read,
        CallbackKind::Header,
        CallbackKind::Progress,
    ];

    /// Option carrying the trampoline address
    pub fn function_option(&self) -> EasyOpt {
        match self {
            CallbackKind::Write => EasyOpt::WRITEFUNCTION,
            CallbackKind::Read => EasyOpt::READFUNCTION,
            CallbackKind::Header => EasyOpt::HEADERFUNCTION,
            CallbackKind::Progress => EasyOpt::XFERINFOFUNCTION,
        }
    }

    /// Option carrying the context pointer
    pub fn data_option(&self) -> EasyOpt {
        match self {
            CallbackKind::Write => EasyOpt::WRITEDATA,
            CallbackKind::Read => EasyOpt::READDATA,
            CallbackKind::Header => EasyOpt::HEADERDATA,
            CallbackKind::Progress => EasyOpt::XFERINFODATA,
        }
    }

    /// Kind whose function option is `opt`
    pub fn from_function_option(opt: EasyOpt) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.function_option() == opt)
    }

    /// Kind whose data option is `opt`
    pub fn from_data_option(opt: EasyOpt) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.data_option() == opt)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackKind::Write => "write",
            CallbackKind::Read => "read",
            CallbackKind::Header => "header",
            CallbackKind::Progress => "progress",
        }
    }
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transfer counters reported to a progress callback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub dltotal: i64,
    pub dlnow: i64,
    pub ultotal: i64,
    pub ulnow: i64,
}

/// Caller data passed to every invocation of a callback
#[derive(Default)]
pub enum UserData {
    #[default]
    Empty,
    /// Arbitrary value, recovered with [`UserData::downcast_mut`]
    Any(Box<dyn Any + Send>),
    /// Sink for write and header data
    Writer(Box<dyn Write + Send>),
    /// Source for upload data
    Reader(Box<dyn Read + Send>),
}

impl UserData {
    pub fn is_empty(&self) -> bool {
        matches!(self, UserData::Empty)
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        match self {
            UserData::Any(value) => value.downcast_mut(),
            _ => None,
        }
    }

    pub fn writer(&mut self) -> Option<&mut (dyn Write + Send)> {
        match self {
            UserData::Writer(w) => Some(w.as_mut()),
            _ => None,
        }
    }

    pub fn reader(&mut self) -> Option<&mut (dyn Read + Send)> {
        match self {
            UserData::Reader(r) => Some(r.as_mut()),
            _ => None,
        }
    }

    fn variant(&self) -> &'static str {
        match self {
            UserData::Empty => "empty",
            UserData::Any(_) => "any",
            UserData::Writer(_) => "writer",
            UserData::Reader(_) => "reader",
        }
    }
}

impl fmt::Debug for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserData::{}", self.variant())
    }
}

/// Write and header callback: `true` accepts the chunk, `false` pauses
pub type WriteCallback = Box<dyn FnMut(&[u8], &mut UserData) -> bool + Send>;

/// Read callback: fills the buffer and returns the byte count.
///
/// A negative count aborts the transfer.
pub type ReadCallback = Box<dyn FnMut(&mut [u8], &mut UserData) -> isize + Send>;

/// Progress callback: `true` continues, `false` aborts
pub type ProgressCallback = Box<dyn FnMut(Progress, &mut UserData) -> bool + Send>;

/// One installed callback and its data
pub struct Slot<F> {
    pub callback: Option<F>,
    pub data: UserData,
}

impl<F> Slot<F> {
    fn empty() -> Self {
        Self {
            callback: None,
            data: UserData::Empty,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.callback.is_some()
    }

    fn clear(&mut self) {
        self.callback = None;
        self.data = UserData::Empty;
    }
}

/// Callback state shared between a wrapper and the trampolines
pub struct EasyState {
    pub write: Mutex<Slot<WriteCallback>>,
    pub read: Mutex<Slot<ReadCallback>>,
    pub header: Mutex<Slot<WriteCallback>>,
    pub progress: Mutex<Slot<ProgressCallback>>,
}

impl EasyState {
    pub fn new() -> Self {
        Self {
            write: Mutex::new(Slot::empty()),
            read: Mutex::new(Slot::empty()),
            header: Mutex::new(Slot::empty()),
            progress: Mutex::new(Slot::empty()),
        }
    }

    /// Whether a callback of `kind` is installed
    pub fn is_installed(&self, kind: CallbackKind) -> bool {
        match kind {
            CallbackKind::Write => self.write.lock().is_installed(),
            CallbackKind::Read => self.read.lock().is_installed(),
            CallbackKind::Header => self.header.lock().is_installed(),
            CallbackKind::Progress => self.progress.lock().is_installed(),
        }
    }

    /// Replace the caller data of `kind`; returns the previous data
    pub fn set_data(&self, kind: CallbackKind, data: UserData) -> UserData {
        match kind {
            CallbackKind::Write => std::mem::replace(&mut self.write.lock().data, data),
            CallbackKind::Read => std::mem::replace(&mut self.read.lock().data, data),
            CallbackKind::Header => std::mem::replace(&mut self.header.lock().data, data),
            CallbackKind::Progress => std::mem::replace(&mut self.progress.lock().data, data),
        }
    }

    /// Drop the callback and data of `kind`
    pub fn clear(&self, kind: CallbackKind) {
        match kind {
            CallbackKind::Write => self.write.lock().clear(),
            CallbackKind::Read => self.read.lock().clear(),
            CallbackKind::Header => self.header.lock().clear(),
            CallbackKind::Progress => self.progress.lock().clear(),
        }
    }

    pub fn clear_all(&self) {
        for kind in CallbackKind::ALL {
            self.clear(kind);
        }
    }
}

impl Default for EasyState {
    fn default() -> Self {
        Self::new()
    }
}

/// Box a write or header callback
pub fn write_callback<F>(f: F) -> WriteCallback
where
    F: FnMut(&[u8], &mut UserData) -> bool + Send + 'static,
{
    Box::new(f)
}

/// Box a read callback
pub fn read_callback<F>(f: F) -> ReadCallback
where
    F: FnMut(&mut [u8], &mut UserData) -> isize + Send + 'static,
{
    Box::new(f)
}

/// Box a progress callback
pub fn progress_callback<F>(f: F) -> ProgressCallback
where
    F: FnMut(Progress, &mut UserData) -> bool + Send + 'static,
{
    Box::new(f)
}

/// Write callback forwarding every chunk into a [`UserData::Writer`]
pub fn forward_to_writer() -> WriteCallback {
    write_callback(|chunk, data| match data.writer() {
        Some(w) => w.write_all(chunk).is_ok(),
        None => false,
    })
}

/// Read callback pulling from a [`UserData::Reader`]; IO errors abort
pub fn pull_from_reader() -> ReadCallback {
    read_callback(|buf, data| match data.reader() {
        Some(r) => match r.read(buf) {
            Ok(n) => n as isize,
            Err(_) => -1,
        },
        None => -1,
    })
}
