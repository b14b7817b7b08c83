//! Interfaces the host application provides to the plugin.
//!
//! Everything here is implemented by the embedding editor. Documents are
//! shared with `Rc` because the host owns them and all callbacks run on its
//! single dispatch thread.

use crate::codec::Variant;
use crate::error::HostError;
use crate::protocol::SyncMessage;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentUri(String);

impl DocumentUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `None` when the file is not part of the JSON family.
    pub fn variant(&self) -> Option<Variant> {
        Variant::for_file_name(&self.0)
    }

    pub fn is_json(&self) -> bool {
        self.variant().is_some()
    }
}

impl fmt::Display for DocumentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentUri {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

/// Byte offsets into a document's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    /// Range spanning offsets `0..text.len()`.
    pub fn whole(text: &str) -> Self {
        Self {
            start: 0,
            end: text.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: TextRange,
    pub new_text: String,
}

impl TextEdit {
    pub fn replace(range: TextRange, new_text: impl Into<String>) -> Self {
        Self {
            range,
            new_text: new_text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewColumn {
    Active,
    Beside,
    One,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorThemeKind {
    Light,
    Dark,
    HighContrast,
    HighContrastLight,
}

/// Theme the panel shell is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl From<ColorThemeKind> for Theme {
    fn from(kind: ColorThemeKind) -> Self {
        match kind {
            ColorThemeKind::Light | ColorThemeKind::HighContrastLight => Self::Light,
            ColorThemeKind::Dark | ColorThemeKind::HighContrast => Self::Dark,
        }
    }
}

/// Host-assigned identity of a panel instance; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelId(pub u64);

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panel-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelOptions {
    pub id: PanelId,
    pub view_type: String,
    pub title: String,
    pub column: ViewColumn,
    pub enable_scripts: bool,
    pub local_resource_roots: Vec<String>,
}

pub trait TextDocument {
    fn uri(&self) -> &DocumentUri;

    fn text(&self) -> String;

    /// Applies all edits as a single undoable transaction.
    fn apply_edits(&self, edits: &[TextEdit]) -> Result<(), HostError>;
}

/// The visual surface as seen from the host side.
pub trait WebviewPanel {
    fn set_html(&mut self, html: String);

    fn reveal(&mut self, column: ViewColumn);

    fn post_message(&mut self, message: &SyncMessage) -> Result<(), HostError>;

    /// URI the isolated context can load `relative` (under the asset root) from.
    fn asset_uri(&self, relative: &str) -> String;

    fn dispose(&mut self);
}

pub trait EditorHost {
    type Document: TextDocument;
    type Panel: WebviewPanel;

    fn active_document(&self) -> Option<Rc<Self::Document>>;

    fn visible_documents(&self) -> Vec<DocumentUri>;

    fn open_document(&self, uri: &DocumentUri) -> Result<Rc<Self::Document>, HostError>;

    fn show_document(&self, document: &Rc<Self::Document>, column: ViewColumn)
    -> Result<(), HostError>;

    fn color_theme(&self) -> ColorThemeKind;

    fn show_error_message(&self, message: &str);

    fn create_panel(&self, options: &PanelOptions) -> Result<Self::Panel, HostError>;
}
