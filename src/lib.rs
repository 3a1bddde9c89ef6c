//! GRS Overlay: diagnostic highlighting for the GRS browser extension
//!
//! A Rust/WASM implementation of the extension's page overlay. An external
//! analysis engine reports diagnostics over text; this crate walks the page,
//! turns diagnostics into highlight markers, removes them again, and
//! coordinates the popup, background and content contexts.
//!
//! # Architecture
//!
//! ## Overlay Components
//! - `rules.rs` - RuleCode + RuleStates: rule vocabulary and enablement map
//! - `diagnostic.rs` - Diagnostic, Range + grouping by exact range
//! - `splice.rs` - Offset-tracking markup splicer
//! - `render.rs` - Highlight renderer (annotation markers)
//! - `remove.rs` - Highlight remover
//! - `walker.rs` - Text leaf walker with per-node failure containment
//! - `dom/` - Document trait + MemoryDocument
//!
//! ## Coordination
//! - `engine/` - Engine boundary, EngineLoader, background RemoteEngine
//! - `config.rs` - Persisted configuration (color + rule states)
//! - `protocol.rs` - ActionMessage / Ack + MessageBus
//! - `coordinator/` - ContentCoordinator: Scan / Normalize / Fix / SetRule pipelines
//! - `popup.rs` - PopupController
//! - `background.rs` - BackgroundCoordinator
//! - `web/` - Browser bindings (wasm32 only)
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { PopupScript } from './pkg/grs_overlay.js';
//!
//! await init();
//!
//! const popup = new PopupScript();
//! const { selectedColor, ruleStates } = await popup.load();
//!
//! colorInput.oninput = async () => {
//!   const ack = await popup.selectColor(colorInput.value, 300);
//!   if (ack) console.log(ack.status);   // "runScan finished"
//! };
//! ```

pub mod background;
pub mod config;
pub mod coordinator;
pub mod diagnostic;
pub mod dom;
pub mod engine;
pub mod popup;
pub mod protocol;
pub mod remove;
pub mod render;
pub mod rules;
pub mod splice;
pub mod walker;

#[cfg(target_arch = "wasm32")]
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

// Public exports
pub use background::BackgroundCoordinator;
pub use config::{Color, ConfigStore, Configuration, KeyValueStore, MemoryStore};
pub use coordinator::{ContentCoordinator, PipelineStatus, ScanReport};
pub use diagnostic::{group_diagnostics, Diagnostic, DiagnosticGroups, Range};
pub use dom::{Document, DomError, MemoryDocument};
pub use engine::{AnalysisError, Engine, EngineLoader, Loaded};
pub use popup::PopupController;
pub use protocol::{Ack, ActionMessage, MessageBus, Target};
pub use remove::remove_highlights;
pub use render::{render_diagnostics, SPAN_CLASS};
pub use rules::{RuleCode, RuleStates};

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Install the panic hook and console logger
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    // Fails only when a logger is already installed
    let _ = console_log::init_with_level(log::Level::Info);
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("grs-overlay v{}", env!("CARGO_PKG_VERSION"))
}
