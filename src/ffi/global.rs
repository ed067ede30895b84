//! Process-wide Native State
//!
//! The default native API, the configuration it was built from, and the
//! engine's global init/cleanup pair. The API is created on first use and
//! lives for the rest of the process; a load failure is kept inside it and
//! reported by every call.

use std::os::raw::c_long;
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::api::NativeApi;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};

static CONFIG: OnceCell<BridgeConfig> = OnceCell::new();

static NATIVE: Lazy<Arc<dyn NativeApi>> = Lazy::new(default_api);

static GLOBAL: Mutex<GlobalState> = parking_lot::const_mutex(GlobalState { initialized: false });

struct GlobalState {
    initialized: bool,
}

/// Use `config` instead of searching for curl-bridge.toml.
///
/// Only effective before the first call that needs configuration; returns
/// the config back if one was already in place.
pub fn install_config(config: BridgeConfig) -> Result<(), BridgeConfig> {
    CONFIG.set(config)
}

/// Active configuration, loaded from the working directory on first use
pub fn config() -> &'static BridgeConfig {
    CONFIG.get_or_init(|| match BridgeConfig::load_from_cwd() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "failed to load configuration; using defaults");
            BridgeConfig::default()
        }
    })
}

#[cfg(not(feature = "static-link"))]
fn default_api() -> Arc<dyn NativeApi> {
    let api = super::DynamicApi::from_config(&config().library);
    if let Some(path) = api.path() {
        info!(path = %path.display(), "native module loaded");
    }
    Arc::new(api)
}

#[cfg(feature = "static-link")]
fn default_api() -> Arc<dyn NativeApi> {
    Arc::new(super::LinkedApi::new())
}

/// Process-wide native API chosen at build time
pub fn native() -> Arc<dyn NativeApi> {
    Arc::clone(&NATIVE)
}

/// `curl_global_init` on the process-wide API; later calls are no-ops
pub fn global_init(flags: i64) -> BridgeResult<()> {
    global_init_with(&**NATIVE, flags)
}

/// [`global_init`] with the configured flags
pub fn global_init_default() -> BridgeResult<()> {
    global_init(config().global.init_flags)
}

/// `curl_global_cleanup`; only runs after a successful init
pub fn global_cleanup() -> BridgeResult<()> {
    global_cleanup_with(&**NATIVE)
}

/// Whether global init has run and not been cleaned up
pub fn is_initialized() -> bool {
    GLOBAL.lock().initialized
}

/// [`global_init`] against a specific API
pub fn global_init_with(api: &dyn NativeApi, flags: i64) -> BridgeResult<()> {
    let mut state = GLOBAL.lock();
    if state.initialized {
        debug!("global init already done");
        return Ok(());
    }
    let flags = c_long::try_from(flags).map_err(|_| BridgeError::InvalidFlags(flags))?;
    let code = api.global_init(flags)?;
    if !code.is_ok() {
        return Err(BridgeError::Native {
            code,
            message: api.easy_strerror(code),
        });
    }
    state.initialized = true;
    debug!(flags, api = api.name(), "global init");
    Ok(())
}

/// [`global_cleanup`] against a specific API
pub fn global_cleanup_with(api: &dyn NativeApi) -> BridgeResult<()> {
    let mut state = GLOBAL.lock();
    if !state.initialized {
        return Ok(());
    }
    api.global_cleanup()?;
    state.initialized = false;
    debug!(api = api.name(), "global cleanup");
    Ok(())
}

/// Raw `curl_version()` text
pub fn version() -> BridgeResult<String> {
    NATIVE.version()
}
