//! Dynamic Library Loader
//!
//! Loads the native engine from a shared library and resolves every entry
//! point once into an address table. A failed load, or a single missing
//! symbol, is recorded rather than raised: only the calls that need the
//! missing piece fail, each with a local error.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_long, c_void};
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use tracing::{debug, warn};

use super::api::{NativeApi, TrampolineTable};
use super::types::{CurlOffT, CurlSlist, EasyOpt, EntryPoint, Info, RawEasy};
use crate::config::LibraryConfig;
use crate::error::{BridgeError, BridgeResult, CurlCode};

/// Environment variable naming the module to load, overriding discovery
pub const LIBRARY_ENV: &str = "CURL_BRIDGE_LIBRARY";

type VersionFn = unsafe extern "C" fn() -> *const c_char;
type GlobalInitFn = unsafe extern "C" fn(c_long) -> c_int;
type GlobalCleanupFn = unsafe extern "C" fn();
type FreeFn = unsafe extern "C" fn(*mut c_void);
type EasyInitFn = unsafe extern "C" fn() -> RawEasy;
type EasyDuphandleFn = unsafe extern "C" fn(RawEasy) -> RawEasy;
type EasyVoidFn = unsafe extern "C" fn(RawEasy);
type EasySetoptFn = unsafe extern "C" fn(RawEasy, c_int, ...) -> c_int;
type EasyGetinfoFn = unsafe extern "C" fn(RawEasy, c_int, ...) -> c_int;
type EasyPerformFn = unsafe extern "C" fn(RawEasy) -> c_int;
type EasyPauseFn = unsafe extern "C" fn(RawEasy, c_int) -> c_int;
type EasySendFn = unsafe extern "C" fn(RawEasy, *const c_void, usize, *mut usize) -> c_int;
type EasyRecvFn = unsafe extern "C" fn(RawEasy, *mut c_void, usize, *mut usize) -> c_int;
type EasyEscapeFn = unsafe extern "C" fn(RawEasy, *const c_char, c_int) -> *mut c_char;
type EasyUnescapeFn =
    unsafe extern "C" fn(RawEasy, *const c_char, c_int, *mut c_int) -> *mut c_char;
type EasyStrerrorFn = unsafe extern "C" fn(c_int) -> *const c_char;
type EasyImpersonateFn = unsafe extern "C" fn(RawEasy, *const c_char, c_int) -> c_int;
type SlistAppendFn = unsafe extern "C" fn(*mut CurlSlist, *const c_char) -> *mut CurlSlist;
type SlistFreeAllFn = unsafe extern "C" fn(*mut CurlSlist);

/// A dynamically loaded library
pub struct DynamicLibrary {
    /// Path to the library
    path: PathBuf,
    /// The loaded library handle
    library: Library,
}

impl DynamicLibrary {
    /// Load a library from the given path
    pub fn load(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let path = path.as_ref().to_path_buf();

        // Safety: loading runs the library's initializers. The path is
        // supplied by configuration and trusted to be a libcurl build.
        let library = unsafe {
            Library::new(&path).map_err(|e| {
                BridgeError::ModuleNotLoaded(format!(
                    "failed to load library '{}': {}",
                    path.display(),
                    e
                ))
            })?
        };

        Ok(Self { path, library })
    }

    /// Get the path to this library
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve a symbol to its address
    pub fn symbol_address(&self, name: &str) -> Result<usize, String> {
        let c_name = CString::new(name).map_err(|_| format!("invalid symbol name: {}", name))?;

        // Safety: only the address is taken here; the call site casts it to
        // the signature documented for the symbol.
        let symbol: Symbol<*const ()> = unsafe {
            self.library
                .get(c_name.as_bytes_with_nul())
                .map_err(|e| {
                    format!("symbol '{}' not found in '{}': {}", name, self.path.display(), e)
                })?
        };

        Ok(*symbol as usize)
    }
}

/// Addresses of every entry point, resolved once at load
#[derive(Debug, Clone)]
pub struct ProcTable {
    addresses: [Result<usize, String>; EntryPoint::COUNT],
}

impl ProcTable {
    /// Resolve every entry point from `library`
    pub fn resolve(library: &DynamicLibrary) -> Self {
        let addresses = EntryPoint::ALL.map(|entry| {
            let resolved = library.symbol_address(entry.symbol());
            match &resolved {
                Err(reason) if entry == EntryPoint::EasyImpersonate => {
                    debug!(symbol = entry.symbol(), %reason, "optional entry point absent");
                }
                Err(reason) => {
                    warn!(symbol = entry.symbol(), %reason, "entry point unresolved");
                }
                Ok(_) => {}
            }
            resolved
        });
        Self { addresses }
    }

    /// Address of an entry point, or the reason it is unavailable
    pub fn get(&self, entry: EntryPoint) -> BridgeResult<usize> {
        match &self.addresses[entry.index()] {
            Ok(addr) => Ok(*addr),
            Err(reason) => Err(BridgeError::EntryPointMissing {
                entry,
                reason: reason.clone(),
            }),
        }
    }

    /// Entry points that failed to resolve
    pub fn missing(&self) -> Vec<EntryPoint> {
        EntryPoint::ALL
            .iter()
            .copied()
            .filter(|entry| self.addresses[entry.index()].is_err())
            .collect()
    }
}

struct LoadedModule {
    library: DynamicLibrary,
    procs: ProcTable,
}

/// Native calls through a dynamically loaded module
pub struct DynamicApi {
    module: Result<LoadedModule, String>,
    trampolines: TrampolineTable,
}

macro_rules! proc_fn {
    ($self:ident, $entry:expr, $ty:ty) => {{
        let addr = $self.resolve($entry)?;
        // Safety: the address was resolved for this symbol and `$ty` is the
        // symbol's native signature.
        std::mem::transmute::<usize, $ty>(addr)
    }};
}

impl DynamicApi {
    /// Load a module from an explicit path. Never fails; a load error is
    /// recorded and surfaced by every later call.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let module = DynamicLibrary::load(path).map(|library| {
            let procs = ProcTable::resolve(&library);
            LoadedModule { library, procs }
        });
        Self::from_module(module.map_err(|e| match e {
            BridgeError::ModuleNotLoaded(reason) => reason,
            other => other.to_string(),
        }))
    }

    /// Locate and load the module described by `config`
    pub fn from_config(config: &LibraryConfig) -> Self {
        let loader = LibraryLoader::from_config(config);
        match loader.locate() {
            Some(path) => Self::load(path),
            None => Self::unavailable(format!(
                "no library named {:?} found in {} search paths",
                loader.names,
                loader.search_paths.len()
            )),
        }
    }

    /// An API whose module failed to load for `reason`
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::from_module(Err(reason.into()))
    }

    fn from_module(module: Result<LoadedModule, String>) -> Self {
        if let Err(reason) = &module {
            warn!(%reason, "native module failed to load");
        }
        Self {
            module,
            trampolines: TrampolineTable::standard(),
        }
    }

    /// The recorded load error, if any
    pub fn load_error(&self) -> Option<&str> {
        self.module.as_ref().err().map(|s| s.as_str())
    }

    /// Path of the loaded module
    pub fn path(&self) -> Option<&Path> {
        self.module.as_ref().ok().map(|m| m.library.path())
    }

    /// Entry points that failed to resolve in the loaded module
    pub fn missing_entry_points(&self) -> Vec<EntryPoint> {
        match &self.module {
            Ok(module) => module.procs.missing(),
            Err(_) => EntryPoint::ALL.to_vec(),
        }
    }

    fn resolve(&self, entry: EntryPoint) -> BridgeResult<usize> {
        match &self.module {
            Ok(module) => module.procs.get(entry),
            Err(reason) => Err(BridgeError::ModuleNotLoaded(reason.clone())),
        }
    }
}

impl NativeApi for DynamicApi {
    fn name(&self) -> &str {
        "dynamic"
    }

    fn trampolines(&self) -> &TrampolineTable {
        &self.trampolines
    }

    fn version(&self) -> BridgeResult<String> {
        unsafe {
            let f = proc_fn!(self, EntryPoint::Version, VersionFn);
            Ok(c_string_lossy(f()))
        }
    }

    fn global_init(&self, flags: c_long) -> BridgeResult<CurlCode> {
        unsafe {
            let f = proc_fn!(self, EntryPoint::GlobalInit, GlobalInitFn);
            Ok(code(f(flags)))
        }
    }

    fn global_cleanup(&self) -> BridgeResult<()> {
        unsafe {
            let f = proc_fn!(self, EntryPoint::GlobalCleanup, GlobalCleanupFn);
            f();
        }
        Ok(())
    }

    fn easy_strerror(&self, rc: CurlCode) -> String {
        let lookup = || -> BridgeResult<String> {
            unsafe {
                let f = proc_fn!(self, EntryPoint::EasyStrerror, EasyStrerrorFn);
                Ok(c_string_lossy(f(rc.0 as c_int)))
            }
        };
        lookup().unwrap_or_else(|_| rc.to_string())
    }

    fn easy_init(&self) -> BridgeResult<RawEasy> {
        unsafe {
            let f = proc_fn!(self, EntryPoint::EasyInit, EasyInitFn);
            Ok(f())
        }
    }

    unsafe fn easy_duphandle(&self, handle: RawEasy) -> BridgeResult<RawEasy> {
        let f = proc_fn!(self, EntryPoint::EasyDuphandle, EasyDuphandleFn);
        Ok(f(handle))
    }

    unsafe fn easy_cleanup(&self, handle: RawEasy) -> BridgeResult<()> {
        let f = proc_fn!(self, EntryPoint::EasyCleanup, EasyVoidFn);
        f(handle);
        Ok(())
    }

    unsafe fn easy_reset(&self, handle: RawEasy) -> BridgeResult<()> {
        let f = proc_fn!(self, EntryPoint::EasyReset, EasyVoidFn);
        f(handle);
        Ok(())
    }

    unsafe fn easy_perform(&self, handle: RawEasy) -> BridgeResult<CurlCode> {
        let f = proc_fn!(self, EntryPoint::EasyPerform, EasyPerformFn);
        Ok(code(f(handle)))
    }

    unsafe fn easy_pause(&self, handle: RawEasy, bitmask: c_int) -> BridgeResult<CurlCode> {
        let f = proc_fn!(self, EntryPoint::EasyPause, EasyPauseFn);
        Ok(code(f(handle, bitmask)))
    }

    unsafe fn setopt_long(
        &self,
        handle: RawEasy,
        opt: EasyOpt,
        value: c_long,
    ) -> BridgeResult<CurlCode> {
        let f = proc_fn!(self, EntryPoint::EasySetopt, EasySetoptFn);
        Ok(code(f(handle, opt.code(), value)))
    }

    unsafe fn setopt_off_t(
        &self,
        handle: RawEasy,
        opt: EasyOpt,
        value: CurlOffT,
    ) -> BridgeResult<CurlCode> {
        let f = proc_fn!(self, EntryPoint::EasySetopt, EasySetoptFn);
        Ok(code(f(handle, opt.code(), value)))
    }

    unsafe fn setopt_pointer(
        &self,
        handle: RawEasy,
        opt: EasyOpt,
        value: *const c_void,
    ) -> BridgeResult<CurlCode> {
        let f = proc_fn!(self, EntryPoint::EasySetopt, EasySetoptFn);
        Ok(code(f(handle, opt.code(), value)))
    }

    unsafe fn setopt_function(
        &self,
        handle: RawEasy,
        opt: EasyOpt,
        func: *const c_void,
    ) -> BridgeResult<CurlCode> {
        let f = proc_fn!(self, EntryPoint::EasySetopt, EasySetoptFn);
        Ok(code(f(handle, opt.code(), func)))
    }

    unsafe fn getinfo_long(
        &self,
        handle: RawEasy,
        info: Info,
        out: *mut c_long,
    ) -> BridgeResult<CurlCode> {
        let f = proc_fn!(self, EntryPoint::EasyGetinfo, EasyGetinfoFn);
        Ok(code(f(handle, info.code(), out)))
    }

    unsafe fn getinfo_double(
        &self,
        handle: RawEasy,
        info: Info,
        out: *mut f64,
    ) -> BridgeResult<CurlCode> {
        let f = proc_fn!(self, EntryPoint::EasyGetinfo, EasyGetinfoFn);
        Ok(code(f(handle, info.code(), out)))
    }

    unsafe fn getinfo_off_t(
        &self,
        handle: RawEasy,
        info: Info,
        out: *mut CurlOffT,
    ) -> BridgeResult<CurlCode> {
        let f = proc_fn!(self, EntryPoint::EasyGetinfo, EasyGetinfoFn);
        Ok(code(f(handle, info.code(), out)))
    }

    unsafe fn getinfo_string(
        &self,
        handle: RawEasy,
        info: Info,
        out: *mut *const c_char,
    ) -> BridgeResult<CurlCode> {
        let f = proc_fn!(self, EntryPoint::EasyGetinfo, EasyGetinfoFn);
        Ok(code(f(handle, info.code(), out)))
    }

    unsafe fn getinfo_slist(
        &self,
        handle: RawEasy,
        info: Info,
        out: *mut *mut CurlSlist,
    ) -> BridgeResult<CurlCode> {
        let f = proc_fn!(self, EntryPoint::EasyGetinfo, EasyGetinfoFn);
        Ok(code(f(handle, info.code(), out)))
    }

    unsafe fn easy_send(
        &self,
        handle: RawEasy,
        buffer: *const c_void,
        len: usize,
        sent: *mut usize,
    ) -> BridgeResult<CurlCode> {
        let f = proc_fn!(self, EntryPoint::EasySend, EasySendFn);
        Ok(code(f(handle, buffer, len, sent)))
    }

    unsafe fn easy_recv(
        &self,
        handle: RawEasy,
        buffer: *mut c_void,
        len: usize,
        received: *mut usize,
    ) -> BridgeResult<CurlCode> {
        let f = proc_fn!(self, EntryPoint::EasyRecv, EasyRecvFn);
        Ok(code(f(handle, buffer, len, received)))
    }

    unsafe fn easy_escape(
        &self,
        handle: RawEasy,
        input: *const c_char,
        len: c_int,
    ) -> BridgeResult<*mut c_char> {
        let f = proc_fn!(self, EntryPoint::EasyEscape, EasyEscapeFn);
        Ok(f(handle, input, len))
    }

    unsafe fn easy_unescape(
        &self,
        handle: RawEasy,
        input: *const c_char,
        len: c_int,
        out_len: *mut c_int,
    ) -> BridgeResult<*mut c_char> {
        let f = proc_fn!(self, EntryPoint::EasyUnescape, EasyUnescapeFn);
        Ok(f(handle, input, len, out_len))
    }

    unsafe fn easy_impersonate(
        &self,
        handle: RawEasy,
        target: *const c_char,
        default_headers: c_int,
    ) -> BridgeResult<CurlCode> {
        let f = proc_fn!(self, EntryPoint::EasyImpersonate, EasyImpersonateFn);
        Ok(code(f(handle, target, default_headers)))
    }

    unsafe fn slist_append(
        &self,
        list: *mut CurlSlist,
        item: *const c_char,
    ) -> BridgeResult<*mut CurlSlist> {
        let f = proc_fn!(self, EntryPoint::SlistAppend, SlistAppendFn);
        Ok(f(list, item))
    }

    unsafe fn slist_free_all(&self, list: *mut CurlSlist) -> BridgeResult<()> {
        let f = proc_fn!(self, EntryPoint::SlistFreeAll, SlistFreeAllFn);
        f(list);
        Ok(())
    }

    unsafe fn free(&self, ptr: *mut c_void) -> BridgeResult<()> {
        let f = proc_fn!(self, EntryPoint::Free, FreeFn);
        f(ptr);
        Ok(())
    }
}

fn code(rc: c_int) -> CurlCode {
    CurlCode(rc as u32)
}

/// Copy a native NUL-terminated string; null becomes empty
pub(crate) unsafe fn c_string_lossy(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

/// Library discovery with search paths
pub struct LibraryLoader {
    /// Search paths for libraries
    search_paths: Vec<PathBuf>,
    /// Candidate library names, most preferred first
    names: Vec<String>,
    /// Explicit path that bypasses discovery
    explicit: Option<PathBuf>,
}

impl LibraryLoader {
    /// Create a loader with the default names and search paths
    pub fn new() -> Self {
        Self {
            search_paths: default_search_paths(),
            names: default_library_names(),
            explicit: std::env::var_os(LIBRARY_ENV).map(PathBuf::from),
        }
    }

    /// Create a loader from configuration; the environment override still wins
    pub fn from_config(config: &LibraryConfig) -> Self {
        let mut loader = Self::new();
        if loader.explicit.is_none() {
            loader.explicit = config.path.clone();
        }
        if !config.names.is_empty() {
            loader.names = config.names.clone();
        }
        let mut paths = config.search_paths.clone();
        paths.append(&mut loader.search_paths);
        loader.search_paths = paths;
        loader
    }

    /// Add a search path
    pub fn add_search_path(&mut self, path: impl AsRef<Path>) {
        self.search_paths.push(path.as_ref().to_path_buf());
    }

    /// Search paths in lookup order
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find a library by name
    pub fn find_library(&self, name: &str) -> Option<PathBuf> {
        // If it's already a path, check if it exists
        let path = Path::new(name);
        if path.exists() {
            return Some(path.to_path_buf());
        }

        let lib_name = library_filename(name);
        self.search_paths
            .iter()
            .map(|dir| dir.join(&lib_name))
            .find(|full_path| full_path.exists())
    }

    /// Resolve the module to load: explicit path first, then each name
    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit {
            return Some(path.clone());
        }
        self.names.iter().find_map(|name| self.find_library(name))
    }
}

impl Default for LibraryLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn default_library_names() -> Vec<String> {
    vec![
        "curl-impersonate".to_string(),
        "curl-impersonate-chrome".to_string(),
        "curl".to_string(),
    ]
}

/// Get the default library search paths for this platform
fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // Current directory
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd);
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/lib"));
        paths.push(PathBuf::from("/usr/local/lib"));
        paths.push(PathBuf::from("/usr/lib/x86_64-linux-gnu"));
        paths.push(PathBuf::from("/usr/lib/aarch64-linux-gnu"));
        paths.push(PathBuf::from("/lib"));
        paths.push(PathBuf::from("/lib64"));
        paths.push(PathBuf::from("/usr/lib64"));

        if let Ok(ld_path) = std::env::var("LD_LIBRARY_PATH") {
            paths.extend(ld_path.split(':').filter(|p| !p.is_empty()).map(PathBuf::from));
        }
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/usr/lib"));
        paths.push(PathBuf::from("/usr/local/lib"));
        paths.push(PathBuf::from("/opt/homebrew/lib"));

        if let Ok(dyld_path) = std::env::var("DYLD_LIBRARY_PATH") {
            paths.extend(dyld_path.split(':').filter(|p| !p.is_empty()).map(PathBuf::from));
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(path) = std::env::var("PATH") {
            paths.extend(path.split(';').filter(|p| !p.is_empty()).map(PathBuf::from));
        }
    }

    paths
}

/// Construct the platform-specific library filename
fn library_filename(name: &str) -> String {
    #[cfg(target_os = "linux")]
    {
        if name.starts_with("lib") && name.contains(".so") {
            name.to_string()
        } else {
            format!("lib{}.so.4", name)
        }
    }

    #[cfg(target_os = "macos")]
    {
        if name.starts_with("lib") && name.ends_with(".dylib") {
            name.to_string()
        } else {
            format!("lib{}.dylib", name)
        }
    }

    #[cfg(target_os = "windows")]
    {
        if name.ends_with(".dll") {
            name.to_string()
        } else {
            format!("lib{}.dll", name)
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        name.to_string()
    }
}
