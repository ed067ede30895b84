//! Shared fixtures for the integration tests

#![allow(dead_code)]

pub mod mock_engine;

use std::sync::Arc;

use curl_bridge::{Easy, NativeApi};

pub use mock_engine::{MockEngine, Stored, STATUS_LINE};

pub fn engine() -> Arc<MockEngine> {
    Arc::new(MockEngine::new())
}

/// New handle on `engine`
pub fn easy_on(engine: &Arc<MockEngine>) -> Easy {
    let api: Arc<dyn NativeApi> = engine.clone();
    Easy::with_api(api).expect("mock easy_init")
}
