//! Keeps a JSON, JSON5 or JSONC text document and a tree-editor panel showing
//! the same value, in both directions, without update loops.
//!
//! The host side lives in [`sync`] and [`panel`]; the isolated surface side in
//! [`surface`]. They exchange [`SyncMessage`] envelopes.

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod extension;
pub mod host;
pub mod panel;
pub mod protocol;
pub mod shell;
pub mod suppression;
pub mod surface;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::Variant;
pub use config::{SurfaceConfig, SyncConfig};
pub use error::{HostError, ParseError, SyncError, TransportError, WidgetError};
pub use extension::{HostEvent, JsonEditorExtension};
pub use protocol::{JsonPayload, SyncMessage};
pub use serde_json;
pub use surface::{TreeSurfaceController, TreeWidget, WidgetEvents, WidgetOptions};
pub use sync::DocumentSyncController;
