//! # Pageshim - browser API surface for embedded page scripts
//!
//! Page scripts written for a browser expect `window`-level globals that a
//! non-browser host does not have. This crate synthesizes them on top of a
//! small set of native primitives supplied by the host.
//!
//! ## Architecture
//!
//! - **host**: native primitives (transport, style engine, base64)
//! - **event_loop**: single-threaded loop every completion runs on
//! - **dom**: arena document and the element address scheme
//! - **style**: `getComputedStyle` over the host style engine
//! - **net**: `Headers`, the transport bridge, `XMLHttpRequest` and `fetch`
//! - **storage**: `localStorage` / `sessionStorage`
//! - **encoding**: `TextEncoder`
//! - **environment**: the page-facing globals, built once per page
//! - **js_engine**: Boa runtime with the page globals installed
//! - **config**: runtime configuration
//! - **utils**: shared error types

pub mod config;
pub mod dom;
pub mod encoding;
pub mod environment;
pub mod event_loop;
pub mod host;
pub mod js_engine;
pub mod net;
pub mod storage;
pub mod style;
pub mod utils;

// Re-export main types for convenience
pub use config::{LegacyCompletion, ShimConfig};
pub use environment::Environment;
pub use event_loop::EventLoop;
pub use utils::error::{Result, ShimError, TransportError};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "Pageshim";
