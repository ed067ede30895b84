//! FFI Type System
//!
//! Raw native types, option/info codes and the engine's sentinel values.

use std::fmt;
use std::os::raw::{c_char, c_int, c_void};

/// Opaque native easy handle (`CURL *`)
pub type RawEasy = *mut c_void;

/// Native `curl_off_t`
pub type CurlOffT = i64;

/// Native string list node (`struct curl_slist`)
#[repr(C)]
#[derive(Debug)]
pub struct CurlSlist {
    pub data: *mut c_char,
    pub next: *mut CurlSlist,
}

/// `CURL_WRITEFUNC_PAUSE`: write/header callbacks ask the engine to pause
pub const CURL_WRITEFUNC_PAUSE: usize = 0x1000_0001;

/// `CURL_READFUNC_ABORT`: read callback aborts the transfer
pub const CURL_READFUNC_ABORT: usize = 0x1000_0000;

/// Progress callback return value that keeps the transfer going
pub const PROGRESS_CONTINUE: c_int = 0;

/// Progress callback return value that aborts the transfer
pub const PROGRESS_ABORT: c_int = 1;

/// `CURL_GLOBAL_ALL`
pub const CURL_GLOBAL_ALL: i64 = 3;

/// `CURLPAUSE_*` bits for `Easy::pause`
pub const CURLPAUSE_RECV: c_int = 1 << 0;
pub const CURLPAUSE_SEND: c_int = 1 << 2;
pub const CURLPAUSE_ALL: c_int = CURLPAUSE_RECV | CURLPAUSE_SEND;
pub const CURLPAUSE_CONT: c_int = 0;

const CURLOPTTYPE_OBJECTPOINT: u32 = 10_000;
const CURLOPTTYPE_FUNCTIONPOINT: u32 = 20_000;
const CURLOPTTYPE_OFF_T: u32 = 30_000;
const CURLOPTTYPE_BLOB: u32 = 40_000;

/// Native encoding class of an option, derived from its code range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionCategory {
    /// `long` argument
    Long,
    /// Object pointer: strings, lists, opaque data
    ObjectPoint,
    /// Function pointer
    FunctionPoint,
    /// `curl_off_t` argument
    OffT,
    /// `struct curl_blob *`
    Blob,
}

impl OptionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionCategory::Long => "long",
            OptionCategory::ObjectPoint => "objectpoint",
            OptionCategory::FunctionPoint => "functionpoint",
            OptionCategory::OffT => "off_t",
            OptionCategory::Blob => "blob",
        }
    }
}

/// Easy option code (`CURLoption`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EasyOpt(pub u32);

impl EasyOpt {
    pub const WRITEDATA: EasyOpt = EasyOpt(10_001);
    pub const URL: EasyOpt = EasyOpt(10_002);
    pub const PORT: EasyOpt = EasyOpt(3);
    pub const READDATA: EasyOpt = EasyOpt(10_009);
    pub const TIMEOUT: EasyOpt = EasyOpt(13);
    pub const POSTFIELDS: EasyOpt = EasyOpt(10_015);
    pub const USERAGENT: EasyOpt = EasyOpt(10_018);
    pub const HTTPHEADER: EasyOpt = EasyOpt(10_023);
    pub const HEADERDATA: EasyOpt = EasyOpt(10_029);
    pub const CUSTOMREQUEST: EasyOpt = EasyOpt(10_036);
    pub const VERBOSE: EasyOpt = EasyOpt(41);
    pub const NOPROGRESS: EasyOpt = EasyOpt(43);
    pub const UPLOAD: EasyOpt = EasyOpt(46);
    pub const POST: EasyOpt = EasyOpt(47);
    pub const FOLLOWLOCATION: EasyOpt = EasyOpt(52);
    pub const XFERINFODATA: EasyOpt = EasyOpt(10_057);
    pub const POSTFIELDSIZE: EasyOpt = EasyOpt(60);
    pub const CAINFO: EasyOpt = EasyOpt(10_065);
    pub const CONNECTTIMEOUT: EasyOpt = EasyOpt(78);
    pub const NOSIGNAL: EasyOpt = EasyOpt(99);
    pub const ACCEPT_ENCODING: EasyOpt = EasyOpt(10_102);
    pub const CONNECT_ONLY: EasyOpt = EasyOpt(141);
    pub const RESOLVE: EasyOpt = EasyOpt(10_203);
    pub const WRITEFUNCTION: EasyOpt = EasyOpt(20_011);
    pub const READFUNCTION: EasyOpt = EasyOpt(20_012);
    pub const HEADERFUNCTION: EasyOpt = EasyOpt(20_079);
    pub const XFERINFOFUNCTION: EasyOpt = EasyOpt(20_219);
    pub const INFILESIZE_LARGE: EasyOpt = EasyOpt(30_115);
    pub const RESUME_FROM_LARGE: EasyOpt = EasyOpt(30_116);
    pub const MAXFILESIZE_LARGE: EasyOpt = EasyOpt(30_117);
    pub const POSTFIELDSIZE_LARGE: EasyOpt = EasyOpt(30_120);
    pub const MAX_SEND_SPEED_LARGE: EasyOpt = EasyOpt(30_145);
    pub const MAX_RECV_SPEED_LARGE: EasyOpt = EasyOpt(30_146);
    pub const TIMEVALUE_LARGE: EasyOpt = EasyOpt(30_270);

    /// Raw code as passed to `curl_easy_setopt`
    pub fn code(&self) -> c_int {
        self.0 as c_int
    }

    /// Encoding class implied by the code range
    pub fn category(&self) -> OptionCategory {
        match self.0 {
            c if c >= CURLOPTTYPE_BLOB => OptionCategory::Blob,
            c if c >= CURLOPTTYPE_OFF_T => OptionCategory::OffT,
            c if c >= CURLOPTTYPE_FUNCTIONPOINT => OptionCategory::FunctionPoint,
            c if c >= CURLOPTTYPE_OBJECTPOINT => OptionCategory::ObjectPoint,
            _ => OptionCategory::Long,
        }
    }

    /// Options whose integer argument is `curl_off_t` rather than `long`.
    ///
    /// Selected by an explicit allow-list, never by value magnitude.
    pub fn is_wide_integer(&self) -> bool {
        matches!(
            *self,
            EasyOpt::INFILESIZE_LARGE
                | EasyOpt::RESUME_FROM_LARGE
                | EasyOpt::MAXFILESIZE_LARGE
                | EasyOpt::POSTFIELDSIZE_LARGE
                | EasyOpt::MAX_SEND_SPEED_LARGE
                | EasyOpt::MAX_RECV_SPEED_LARGE
                | EasyOpt::TIMEVALUE_LARGE
        )
    }

    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            EasyOpt::WRITEDATA => "WRITEDATA",
            EasyOpt::URL => "URL",
            EasyOpt::PORT => "PORT",
            EasyOpt::READDATA => "READDATA",
            EasyOpt::TIMEOUT => "TIMEOUT",
            EasyOpt::POSTFIELDS => "POSTFIELDS",
            EasyOpt::USERAGENT => "USERAGENT",
            EasyOpt::HTTPHEADER => "HTTPHEADER",
            EasyOpt::HEADERDATA => "HEADERDATA",
            EasyOpt::CUSTOMREQUEST => "CUSTOMREQUEST",
            EasyOpt::VERBOSE => "VERBOSE",
            EasyOpt::NOPROGRESS => "NOPROGRESS",
            EasyOpt::UPLOAD => "UPLOAD",
            EasyOpt::POST => "POST",
            EasyOpt::FOLLOWLOCATION => "FOLLOWLOCATION",
            EasyOpt::XFERINFODATA => "XFERINFODATA",
            EasyOpt::POSTFIELDSIZE => "POSTFIELDSIZE",
            EasyOpt::CAINFO => "CAINFO",
            EasyOpt::CONNECTTIMEOUT => "CONNECTTIMEOUT",
            EasyOpt::NOSIGNAL => "NOSIGNAL",
            EasyOpt::ACCEPT_ENCODING => "ACCEPT_ENCODING",
            EasyOpt::CONNECT_ONLY => "CONNECT_ONLY",
            EasyOpt::RESOLVE => "RESOLVE",
            EasyOpt::WRITEFUNCTION => "WRITEFUNCTION",
            EasyOpt::READFUNCTION => "READFUNCTION",
            EasyOpt::HEADERFUNCTION => "HEADERFUNCTION",
            EasyOpt::XFERINFOFUNCTION => "XFERINFOFUNCTION",
            EasyOpt::INFILESIZE_LARGE => "INFILESIZE_LARGE",
            EasyOpt::RESUME_FROM_LARGE => "RESUME_FROM_LARGE",
            EasyOpt::MAXFILESIZE_LARGE => "MAXFILESIZE_LARGE",
            EasyOpt::POSTFIELDSIZE_LARGE => "POSTFIELDSIZE_LARGE",
            EasyOpt::MAX_SEND_SPEED_LARGE => "MAX_SEND_SPEED_LARGE",
            EasyOpt::MAX_RECV_SPEED_LARGE => "MAX_RECV_SPEED_LARGE",
            EasyOpt::TIMEVALUE_LARGE => "TIMEVALUE_LARGE",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for EasyOpt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "CURLOPT_{}", name),
            None => write!(f, "option {}", self.0),
        }
    }
}

const CURLINFO_STRING: u32 = 0x10_0000;
const CURLINFO_LONG: u32 = 0x20_0000;
const CURLINFO_DOUBLE: u32 = 0x30_0000;
const CURLINFO_SLIST: u32 = 0x40_0000;
const CURLINFO_SOCKET: u32 = 0x50_0000;
const CURLINFO_OFF_T: u32 = 0x60_0000;
const CURLINFO_TYPEMASK: u32 = 0xf0_0000;

/// Result class of an info code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoType {
    String,
    Long,
    Double,
    /// Lists and pointer results share this class
    Slist,
    Socket,
    OffT,
    Unknown(u32),
}

/// Info code (`CURLINFO`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Info(pub u32);

impl Info {
    pub const EFFECTIVE_URL: Info = Info(CURLINFO_STRING + 1);
    pub const RESPONSE_CODE: Info = Info(CURLINFO_LONG + 2);
    pub const TOTAL_TIME: Info = Info(CURLINFO_DOUBLE + 3);
    pub const SIZE_DOWNLOAD_T: Info = Info(CURLINFO_OFF_T + 8);
    pub const CONTENT_TYPE: Info = Info(CURLINFO_STRING + 18);
    pub const REDIRECT_COUNT: Info = Info(CURLINFO_LONG + 20);
    pub const SSL_ENGINES: Info = Info(CURLINFO_SLIST + 27);
    pub const COOKIELIST: Info = Info(CURLINFO_SLIST + 28);
    pub const PRIMARY_IP: Info = Info(CURLINFO_STRING + 32);
    pub const HTTP_VERSION: Info = Info(CURLINFO_LONG + 46);
    pub const SCHEME: Info = Info(CURLINFO_STRING + 49);

    pub fn code(&self) -> c_int {
        self.0 as c_int
    }

    pub fn info_type(&self) -> InfoType {
        match self.0 & CURLINFO_TYPEMASK {
            CURLINFO_STRING => InfoType::String,
            CURLINFO_LONG => InfoType::Long,
            CURLINFO_DOUBLE => InfoType::Double,
            CURLINFO_SLIST => InfoType::Slist,
            CURLINFO_SOCKET => InfoType::Socket,
            CURLINFO_OFF_T => InfoType::OffT,
            other => InfoType::Unknown(other),
        }
    }
}

impl fmt::Display for Info {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "info 0x{:06x}", self.0)
    }
}

/// Native entry points the bridge calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    Version,
    GlobalInit,
    GlobalCleanup,
    Free,
    EasyInit,
    EasyDuphandle,
    EasyCleanup,
    EasySetopt,
    EasyGetinfo,
    EasyPerform,
    EasyPause,
    EasyReset,
    EasySend,
    EasyRecv,
    EasyEscape,
    EasyUnescape,
    EasyStrerror,
    EasyImpersonate,
    SlistAppend,
    SlistFreeAll,
}

impl EntryPoint {
    /// Number of entry points
    pub const COUNT: usize = 20;

    /// Every entry point, in table order
    pub const ALL: [EntryPoint; EntryPoint::COUNT] = [
        EntryPoint::Version,
        EntryPoint::GlobalInit,
        EntryPoint::GlobalCleanup,
        EntryPoint::Free,
        EntryPoint::EasyInit,
        EntryPoint::EasyDuphandle,
        EntryPoint::EasyCleanup,
        EntryPoint::EasySetopt,
        EntryPoint::EasyGetinfo,
        EntryPoint::EasyPerform,
        EntryPoint::EasyPause,
        EntryPoint::EasyReset,
        EntryPoint::EasySend,
        EntryPoint::EasyRecv,
        EntryPoint::EasyEscape,
        EntryPoint::EasyUnescape,
        EntryPoint::EasyStrerror,
        EntryPoint::EasyImpersonate,
        EntryPoint::SlistAppend,
        EntryPoint::SlistFreeAll,
    ];

    /// Exported symbol name
    pub fn symbol(&self) -> &'static str {
        match self {
            EntryPoint::Version => "curl_version",
            EntryPoint::GlobalInit => "curl_global_init",
            EntryPoint::GlobalCleanup => "curl_global_cleanup",
            EntryPoint::Free => "curl_free",
            EntryPoint::EasyInit => "curl_easy_init",
            EntryPoint::EasyDuphandle => "curl_easy_duphandle",
            EntryPoint::EasyCleanup => "curl_easy_cleanup",
            EntryPoint::EasySetopt => "curl_easy_setopt",
            EntryPoint::EasyGetinfo => "curl_easy_getinfo",
            EntryPoint::EasyPerform => "curl_easy_perform",
            EntryPoint::EasyPause => "curl_easy_pause",
            EntryPoint::EasyReset => "curl_easy_reset",
            EntryPoint::EasySend => "curl_easy_send",
            EntryPoint::EasyRecv => "curl_easy_recv",
            EntryPoint::EasyEscape => "curl_easy_escape",
            EntryPoint::EasyUnescape => "curl_easy_unescape",
            EntryPoint::EasyStrerror => "curl_easy_strerror",
            EntryPoint::EasyImpersonate => "curl_easy_impersonate",
            EntryPoint::SlistAppend => "curl_slist_append",
            EntryPoint::SlistFreeAll => "curl_slist_free_all",
        }
    }

    /// Index into a resolved-address table
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Write and header trampoline signature
pub type WriteCallbackPtr =
    unsafe extern "C" fn(*mut c_char, usize, usize, *mut c_void) -> usize;

/// Read trampoline signature
pub type ReadCallbackPtr = unsafe extern "C" fn(*mut c_char, usize, usize, *mut c_void) -> usize;

/// Transfer-info trampoline signature
pub type XferInfoCallbackPtr =
    unsafe extern "C" fn(*mut c_void, CurlOffT, CurlOffT, CurlOffT, CurlOffT) -> c_int;
