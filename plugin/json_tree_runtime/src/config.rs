use crate::protocol::{HOST_TO_SURFACE_CAP, SURFACE_TO_HOST_CAP};
use std::time::Duration;

pub const DEFAULT_SETTLE_WINDOW: Duration = Duration::from_millis(100);
pub const DEFAULT_OUTBOUND_QUEUE_CAP: usize = 256;
pub const DEFAULT_ASSET_ROOT: &str = "jsoneditor";

pub const PANEL_VIEW_TYPE: &str = "jsonEditor";
pub const PANEL_TITLE: &str = "JSON Tree Editor";

const SETTLE_MS_VAR: &str = "JSON_TREE_SETTLE_MS";
const OUTBOUND_QUEUE_CAP_VAR: &str = "JSON_TREE_OUTBOUND_QUEUE_CAP";
const ASSET_ROOT_VAR: &str = "JSON_TREE_ASSET_ROOT";
const INBOUND_FRAME_CAP_VAR: &str = "JSON_TREE_INBOUND_FRAME_CAP";
const OUTBOUND_FRAME_CAP_VAR: &str = "JSON_TREE_OUTBOUND_FRAME_CAP";

/// Host-side settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// How long document change events are ignored after a panel edit lands.
    pub settle_window: Duration,
    /// Directory, relative to the extension root, holding the widget assets.
    pub asset_root: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            settle_window: DEFAULT_SETTLE_WINDOW,
            asset_root: DEFAULT_ASSET_ROOT.to_string(),
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            settle_window: parse_millis(lookup(SETTLE_MS_VAR)).unwrap_or(defaults.settle_window),
            asset_root: lookup(ASSET_ROOT_VAR)
                .filter(|root| !root.trim().is_empty())
                .unwrap_or(defaults.asset_root),
        }
    }
}

/// Isolated-surface settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceConfig {
    pub settle_window: Duration,
    pub outbound_queue_cap: usize,
    /// Largest host envelope, in bytes, the surface will accept.
    pub inbound_frame_cap: usize,
    /// Largest envelope, in bytes, the surface will send to the host.
    pub outbound_frame_cap: usize,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            settle_window: DEFAULT_SETTLE_WINDOW,
            outbound_queue_cap: DEFAULT_OUTBOUND_QUEUE_CAP,
            inbound_frame_cap: HOST_TO_SURFACE_CAP,
            outbound_frame_cap: SURFACE_TO_HOST_CAP,
        }
    }
}

impl SurfaceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            settle_window: parse_millis(lookup(SETTLE_MS_VAR)).unwrap_or(defaults.settle_window),
            outbound_queue_cap: parse_positive(lookup(OUTBOUND_QUEUE_CAP_VAR))
                .unwrap_or(defaults.outbound_queue_cap),
            inbound_frame_cap: parse_positive(lookup(INBOUND_FRAME_CAP_VAR))
                .unwrap_or(defaults.inbound_frame_cap),
            outbound_frame_cap: parse_positive(lookup(OUTBOUND_FRAME_CAP_VAR))
                .unwrap_or(defaults.outbound_frame_cap),
        }
    }
}

fn parse_positive(raw: Option<String>) -> Option<usize> {
    raw.and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
}

fn parse_millis(raw: Option<String>) -> Option<Duration> {
    parse_positive(raw).map(|millis| Duration::from_millis(millis as u64))
}
