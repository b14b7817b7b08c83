//! In-memory host, panel and widget used by the unit tests.

use crate::error::{HostError, WidgetError};
use crate::host::{
    ColorThemeKind, DocumentUri, EditorHost, PanelOptions, TextDocument, TextEdit, ViewColumn,
    WebviewPanel,
};
use crate::protocol::SyncMessage;
use crate::surface::{TreeWidget, WidgetEvents};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

pub struct FakeDocument {
    uri: DocumentUri,
    text: RefCell<String>,
    pub edit_count: Cell<usize>,
    pub reject_edits: Cell<bool>,
}

impl FakeDocument {
    pub fn new(uri: &str, text: &str) -> Rc<Self> {
        Rc::new(Self {
            uri: DocumentUri::new(uri),
            text: RefCell::new(text.to_string()),
            edit_count: Cell::new(0),
            reject_edits: Cell::new(false),
        })
    }

    /// Simulates the user typing in the text editor.
    pub fn set_text(&self, text: &str) {
        *self.text.borrow_mut() = text.to_string();
    }
}

impl TextDocument for FakeDocument {
    fn uri(&self) -> &DocumentUri {
        &self.uri
    }

    fn text(&self) -> String {
        self.text.borrow().clone()
    }

    fn apply_edits(&self, edits: &[TextEdit]) -> Result<(), HostError> {
        if self.reject_edits.get() {
            return Err(HostError::EditRejected {
                uri: self.uri.to_string(),
                reason: "document is read-only".to_string(),
            });
        }

        let mut text = self.text.borrow_mut();
        for edit in edits.iter().rev() {
            text.replace_range(edit.range.start..edit.range.end, &edit.new_text);
        }
        self.edit_count.set(self.edit_count.get() + 1);
        Ok(())
    }
}

#[derive(Debug)]
pub struct PanelRecord {
    pub options: PanelOptions,
    pub html: Vec<String>,
    pub posted: Vec<SyncMessage>,
    pub reveals: Vec<ViewColumn>,
    pub disposed: bool,
}

pub struct FakePanel {
    record: Rc<RefCell<PanelRecord>>,
}

impl FakePanel {
    pub fn new(options: PanelOptions) -> (Self, Rc<RefCell<PanelRecord>>) {
        let record = Rc::new(RefCell::new(PanelRecord {
            options,
            html: Vec::new(),
            posted: Vec::new(),
            reveals: Vec::new(),
            disposed: false,
        }));

        (
            Self {
                record: record.clone(),
            },
            record,
        )
    }
}

impl WebviewPanel for FakePanel {
    fn set_html(&mut self, html: String) {
        self.record.borrow_mut().html.push(html);
    }

    fn reveal(&mut self, column: ViewColumn) {
        self.record.borrow_mut().reveals.push(column);
    }

    fn post_message(&mut self, message: &SyncMessage) -> Result<(), HostError> {
        let mut record = self.record.borrow_mut();
        if record.disposed {
            return Err(HostError::PostFailed("panel disposed".to_string()));
        }
        record.posted.push(message.clone());
        Ok(())
    }

    fn asset_uri(&self, relative: &str) -> String {
        format!("webview://jsoneditor/{relative}")
    }

    fn dispose(&mut self) {
        self.record.borrow_mut().disposed = true;
    }
}

pub struct FakeHost {
    documents: RefCell<HashMap<DocumentUri, Rc<FakeDocument>>>,
    active: RefCell<Option<DocumentUri>>,
    visible: RefCell<Vec<DocumentUri>>,
    pub theme: Cell<ColorThemeKind>,
    pub errors: RefCell<Vec<String>>,
    pub shown: RefCell<Vec<(DocumentUri, ViewColumn)>>,
    pub panels: RefCell<Vec<Rc<RefCell<PanelRecord>>>>,
    pub fail_panel_creation: Cell<bool>,
}

impl FakeHost {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            documents: RefCell::new(HashMap::new()),
            active: RefCell::new(None),
            visible: RefCell::new(Vec::new()),
            theme: Cell::new(ColorThemeKind::Light),
            errors: RefCell::new(Vec::new()),
            shown: RefCell::new(Vec::new()),
            panels: RefCell::new(Vec::new()),
            fail_panel_creation: Cell::new(false),
        })
    }

    /// Registers a document on disk without opening an editor for it.
    pub fn add_document(&self, uri: &str, text: &str) -> Rc<FakeDocument> {
        let document = FakeDocument::new(uri, text);
        self.documents
            .borrow_mut()
            .insert(document.uri().clone(), document.clone());
        document
    }

    /// Registers a document and focuses an editor on it.
    pub fn open_editor(&self, uri: &str, text: &str) -> Rc<FakeDocument> {
        let document = self.add_document(uri, text);
        self.focus(uri);
        document
    }

    pub fn focus(&self, uri: &str) {
        let uri = DocumentUri::new(uri);
        if !self.visible.borrow().contains(&uri) {
            self.visible.borrow_mut().push(uri.clone());
        }
        *self.active.borrow_mut() = Some(uri);
    }

    pub fn delete_document(&self, uri: &str) {
        let uri = DocumentUri::new(uri);
        self.documents.borrow_mut().remove(&uri);
        self.visible.borrow_mut().retain(|visible| visible != &uri);
        let mut active = self.active.borrow_mut();
        if active.as_ref() == Some(&uri) {
            *active = None;
        }
    }

    pub fn panel_count(&self) -> usize {
        self.panels.borrow().len()
    }

    pub fn panel(&self, index: usize) -> Rc<RefCell<PanelRecord>> {
        self.panels.borrow()[index].clone()
    }

    /// Messages posted to the most recently created panel.
    pub fn posted(&self) -> Vec<SyncMessage> {
        self.panels
            .borrow()
            .last()
            .map(|record| record.borrow().posted.clone())
            .unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }
}

impl EditorHost for FakeHost {
    type Document = FakeDocument;
    type Panel = FakePanel;

    fn active_document(&self) -> Option<Rc<FakeDocument>> {
        let active = self.active.borrow();
        active
            .as_ref()
            .and_then(|uri| self.documents.borrow().get(uri).cloned())
    }

    fn visible_documents(&self) -> Vec<DocumentUri> {
        self.visible.borrow().clone()
    }

    fn open_document(&self, uri: &DocumentUri) -> Result<Rc<FakeDocument>, HostError> {
        self.documents
            .borrow()
            .get(uri)
            .cloned()
            .ok_or_else(|| HostError::OpenFailed {
                uri: uri.to_string(),
                reason: "file not found".to_string(),
            })
    }

    fn show_document(
        &self,
        document: &Rc<FakeDocument>,
        column: ViewColumn,
    ) -> Result<(), HostError> {
        self.shown
            .borrow_mut()
            .push((document.uri().clone(), column));
        self.focus(document.uri().as_str());
        Ok(())
    }

    fn color_theme(&self) -> ColorThemeKind {
        self.theme.get()
    }

    fn show_error_message(&self, message: &str) {
        self.errors.borrow_mut().push(message.to_string());
    }

    fn create_panel(&self, options: &PanelOptions) -> Result<FakePanel, HostError> {
        if self.fail_panel_creation.get() {
            return Err(HostError::PanelCreation("webviews unavailable".to_string()));
        }

        let (panel, record) = FakePanel::new(options.clone());
        self.panels.borrow_mut().push(record);
        Ok(panel)
    }
}

#[derive(Debug, Default)]
pub struct WidgetRecord {
    pub values: Vec<Value>,
    pub texts: Vec<String>,
    pub resizes: usize,
    pub fail_update: bool,
    pub fail_update_text: bool,
    pub fail_resize: bool,
    /// Report every pushed value back as a change, like the real widget does.
    pub echo_updates: bool,
}

pub struct FakeWidget {
    record: Rc<RefCell<WidgetRecord>>,
    events: WidgetEvents,
}

impl FakeWidget {
    pub fn new(events: WidgetEvents) -> (Self, Rc<RefCell<WidgetRecord>>) {
        let record = Rc::new(RefCell::new(WidgetRecord::default()));
        (
            Self {
                record: record.clone(),
                events,
            },
            record,
        )
    }
}

impl TreeWidget for FakeWidget {
    fn update(&mut self, value: &Value) -> Result<(), WidgetError> {
        let mut record = self.record.borrow_mut();
        if record.fail_update {
            return Err(WidgetError::new("update failed"));
        }
        record.values.push(value.clone());
        if record.echo_updates {
            self.events.changed(Some(value.clone()));
        }
        Ok(())
    }

    fn update_text(&mut self, text: &str) -> Result<(), WidgetError> {
        let mut record = self.record.borrow_mut();
        if record.fail_update_text {
            return Err(WidgetError::new("update_text failed"));
        }
        record.texts.push(text.to_string());
        Ok(())
    }

    fn resize(&mut self) -> Result<(), WidgetError> {
        let mut record = self.record.borrow_mut();
        if record.fail_resize {
            return Err(WidgetError::new("container detached"));
        }
        record.resizes += 1;
        Ok(())
    }
}
