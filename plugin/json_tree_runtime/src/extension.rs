use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::host::{ColorThemeKind, DocumentUri, EditorHost, PanelId, TextDocument, ViewColumn};
use crate::protocol::SyncMessage;
use crate::sync::DocumentSyncController;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Notifications delivered by the editor host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    ActiveEditorChanged,
    DocumentOpened(DocumentUri),
    DocumentChanged(DocumentUri),
    DocumentSaved(DocumentUri),
    ColorThemeChanged(ColorThemeKind),
    PanelMessage {
        panel: PanelId,
        message: SyncMessage,
    },
    PanelDisposed(PanelId),
}

/// Entry point wired to the host: the `start` command plus event dispatch.
pub struct JsonEditorExtension<H: EditorHost> {
    host: Rc<H>,
    sync: DocumentSyncController<H>,
    last_json_file: Option<DocumentUri>,
}

impl<H: EditorHost> JsonEditorExtension<H> {
    pub fn activate(host: Rc<H>, config: &SyncConfig, clock: Arc<dyn Clock>) -> Self {
        let sync = DocumentSyncController::new(host.clone(), config, clock);
        Self {
            host,
            sync,
            last_json_file: None,
        }
    }

    pub fn sync(&self) -> &DocumentSyncController<H> {
        &self.sync
    }

    pub fn last_json_file(&self) -> Option<&DocumentUri> {
        self.last_json_file.as_ref()
    }

    pub fn handle(&mut self, event: HostEvent) {
        match event {
            HostEvent::ActiveEditorChanged => {
                if let Some(document) = self.host.active_document() {
                    self.remember(document.uri());
                }
                self.sync.on_active_editor_changed();
            }
            HostEvent::DocumentOpened(uri) => self.remember(&uri),
            HostEvent::DocumentChanged(uri) => self.sync.on_document_changed(&uri),
            HostEvent::DocumentSaved(uri) => self.sync.on_document_saved(&uri),
            HostEvent::ColorThemeChanged(kind) => self.sync.on_theme_changed(kind),
            HostEvent::PanelMessage { panel, message } => {
                self.sync.on_panel_message(panel, message)
            }
            HostEvent::PanelDisposed(panel) => self.sync.on_panel_disposed(panel),
        }
    }

    /// Opens or reveals the tree editor.
    ///
    /// With a resource, that file is brought into an editor first. Without
    /// one, the active JSON editor is used, then the last JSON file seen.
    pub fn start(&mut self, resource: Option<DocumentUri>) -> Option<PanelId> {
        match resource {
            Some(uri) => self.start_with_resource(uri),
            None => self.start_without_resource(),
        }
    }

    fn start_with_resource(&mut self, uri: DocumentUri) -> Option<PanelId> {
        self.remember(&uri);

        if !self.host.visible_documents().contains(&uri) {
            let shown = self
                .host
                .open_document(&uri)
                .and_then(|document| self.host.show_document(&document, ViewColumn::Active));

            if let Err(err) = shown {
                error!(%uri, %err, "failed to open document for tree editor");
                self.notify(&format!("Failed to open document: {err}"));
                return None;
            }
        }

        self.show_panel()
    }

    fn start_without_resource(&mut self) -> Option<PanelId> {
        if let Some(document) = self.host.active_document()
            && document.uri().is_json()
        {
            self.remember(document.uri());
            return self.show_panel();
        }

        let Some(uri) = self.last_json_file.clone() else {
            self.notify("No JSON file is currently open or has been previously opened.");
            return None;
        };

        let document = match self.host.open_document(&uri) {
            Ok(document) => document,
            Err(err) => {
                warn!(%uri, %err, "last JSON file is gone; forgetting it");
                self.last_json_file = None;
                self.notify("The previously opened JSON file is no longer available.");
                return None;
            }
        };

        if let Err(err) = self.host.show_document(&document, ViewColumn::One) {
            error!(%uri, %err, "failed to show last JSON file");
            self.notify("Failed to show the JSON file.");
            return None;
        }

        self.show_panel()
    }

    fn show_panel(&mut self) -> Option<PanelId> {
        match self.sync.show() {
            Ok(outcome) => Some(outcome.id()),
            Err(err) => {
                error!(%err, "failed to open tree editor panel");
                self.notify(&format!("Failed to open JSON Tree Editor: {err}"));
                None
            }
        }
    }

    fn remember(&mut self, uri: &DocumentUri) {
        if uri.is_json() {
            debug!(%uri, "remembering last JSON file");
            self.last_json_file = Some(uri.clone());
        }
    }

    fn notify(&self, message: &str) {
        self.host.show_error_message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::panel::PanelLifecycle;
    use crate::test_support::FakeHost;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn activate(host: &Rc<FakeHost>) -> (JsonEditorExtension<FakeHost>, ManualClock) {
        let clock = ManualClock::new();
        let extension =
            JsonEditorExtension::activate(host.clone(), &SyncConfig::default(), Arc::new(clock.clone()));
        (extension, clock)
    }

    #[test]
    fn start_uses_active_json_editor() {
        let host = FakeHost::new();
        host.open_editor("file:///data/a.json", "{\"a\": 1}");
        let (mut extension, _clock) = activate(&host);

        assert_eq!(extension.start(None), Some(PanelId(1)));
        assert_eq!(host.posted(), vec![SyncMessage::update("{\n  \"a\": 1\n}")]);
        assert_eq!(
            extension.last_json_file(),
            Some(&DocumentUri::from("file:///data/a.json"))
        );
        assert!(host.errors().is_empty());
    }

    #[test]
    fn start_again_reveals_the_same_panel() {
        let host = FakeHost::new();
        host.open_editor("file:///data/a.json", "[]");
        let (mut extension, _clock) = activate(&host);

        assert_eq!(extension.start(None), Some(PanelId(1)));
        assert_eq!(extension.start(None), Some(PanelId(1)));
        assert_eq!(host.panel_count(), 1);
        assert_eq!(host.posted().len(), 1);
        assert_eq!(host.panel(0).borrow().reveals, vec![ViewColumn::Beside]);
    }

    #[test]
    fn start_with_hidden_resource_opens_it_first() {
        let host = FakeHost::new();
        host.add_document("file:///data/b.json5", "{b: 2}");
        let (mut extension, _clock) = activate(&host);

        extension.start(Some(DocumentUri::from("file:///data/b.json5")));

        assert_eq!(
            host.shown.borrow().clone(),
            vec![(DocumentUri::from("file:///data/b.json5"), ViewColumn::Active)]
        );
        assert_eq!(host.posted(), vec![SyncMessage::update("{\n  \"b\": 2\n}")]);
    }

    #[test]
    fn start_with_visible_resource_skips_opening() {
        let host = FakeHost::new();
        host.open_editor("file:///data/c.json", "{}");
        let (mut extension, _clock) = activate(&host);

        extension.start(Some(DocumentUri::from("file:///data/c.json")));

        assert!(host.shown.borrow().is_empty());
        assert_eq!(host.panel_count(), 1);
    }

    #[test]
    fn start_with_missing_resource_reports_open_failure() {
        let host = FakeHost::new();
        let (mut extension, _clock) = activate(&host);

        assert_eq!(extension.start(Some(DocumentUri::from("file:///gone.json"))), None);
        assert_eq!(
            host.errors(),
            vec!["Failed to open document: failed to open file:///gone.json: file not found"]
        );
        assert_eq!(host.panel_count(), 0);
    }

    #[test]
    fn start_falls_back_to_last_json_file() {
        let host = FakeHost::new();
        host.open_editor("file:///data/last.jsonc", "{\"x\": true}");
        let (mut extension, _clock) = activate(&host);
        extension.handle(HostEvent::ActiveEditorChanged);

        host.open_editor("file:///notes.md", "# notes");
        extension.handle(HostEvent::ActiveEditorChanged);

        assert_eq!(extension.start(None), Some(PanelId(1)));
        assert_eq!(
            host.shown.borrow().clone(),
            vec![(DocumentUri::from("file:///data/last.jsonc"), ViewColumn::One)]
        );
        assert_eq!(host.posted(), vec![SyncMessage::update("{\n  \"x\": true\n}")]);
    }

    #[test]
    fn start_forgets_a_deleted_last_file() {
        let host = FakeHost::new();
        host.add_document("file:///data/old.json", "{}");
        let (mut extension, _clock) = activate(&host);
        extension.handle(HostEvent::DocumentOpened(DocumentUri::from("file:///data/old.json")));
        host.delete_document("file:///data/old.json");

        assert_eq!(extension.start(None), None);
        assert_eq!(extension.last_json_file(), None);
        assert_eq!(
            host.errors(),
            vec!["The previously opened JSON file is no longer available."]
        );
    }

    #[test]
    fn start_without_any_json_file_notifies() {
        let host = FakeHost::new();
        host.open_editor("file:///readme.txt", "hi");
        let (mut extension, _clock) = activate(&host);

        assert_eq!(extension.start(None), None);
        assert_eq!(
            host.errors(),
            vec!["No JSON file is currently open or has been previously opened."]
        );
    }

    #[test]
    fn panel_creation_failure_is_reported() {
        let host = FakeHost::new();
        host.open_editor("file:///data/a.json", "{}");
        host.fail_panel_creation.set(true);
        let (mut extension, _clock) = activate(&host);

        assert_eq!(extension.start(None), None);
        assert_eq!(
            host.errors(),
            vec!["Failed to open JSON Tree Editor: failed to create panel: webviews unavailable"]
        );
        assert_eq!(extension.sync().lifecycle(), PanelLifecycle::Absent);
    }

    #[test]
    fn panel_edit_round_trip_does_not_echo() {
        let host = FakeHost::new();
        let document = host.open_editor("file:///data/cfg.json5", "{a: 1}");
        let (mut extension, clock) = activate(&host);
        let panel = extension.start(None).expect("panel");

        extension.handle(HostEvent::PanelMessage {
            panel,
            message: SyncMessage::update("{\"a\": 1, \"b\": [true]}"),
        });
        assert_eq!(document.text(), "{\n  a: 1,\n  b: [\n    true,\n  ],\n}");

        extension.handle(HostEvent::DocumentChanged(document.uri().clone()));
        assert_eq!(host.posted().len(), 1);

        clock.advance(Duration::from_millis(150));
        document.set_text("{a: 1, b: [false]}");
        extension.handle(HostEvent::DocumentChanged(document.uri().clone()));
        assert_eq!(
            host.posted().last(),
            Some(&SyncMessage::update(
                "{\n  \"a\": 1,\n  \"b\": [\n    false\n  ]\n}"
            ))
        );
    }

    #[test]
    fn disposal_detaches_until_next_start() {
        let host = FakeHost::new();
        let document = host.open_editor("file:///data/a.json", "{}");
        let (mut extension, _clock) = activate(&host);
        let panel = extension.start(None).expect("panel");

        extension.handle(HostEvent::PanelDisposed(panel));
        document.set_text("{\"after\": 1}");
        extension.handle(HostEvent::DocumentSaved(document.uri().clone()));
        extension.handle(HostEvent::PanelMessage {
            panel,
            message: SyncMessage::update("{\"late\": true}"),
        });

        assert_eq!(document.text(), "{\"after\": 1}");
        assert_eq!(host.panel(0).borrow().posted.len(), 1);

        assert_eq!(extension.start(None), Some(PanelId(2)));
        assert_eq!(host.posted(), vec![SyncMessage::update("{\n  \"after\": 1\n}")]);
    }

    #[test]
    fn theme_change_is_forwarded_to_the_panel() {
        let host = FakeHost::new();
        host.open_editor("file:///data/a.json", "{}");
        let (mut extension, _clock) = activate(&host);
        extension.start(None);

        extension.handle(HostEvent::ColorThemeChanged(ColorThemeKind::HighContrast));

        let record = host.panel(0);
        let record = record.borrow();
        assert_eq!(record.html.len(), 2);
        assert!(record.html[1].contains(r#"data-theme="dark""#));
        assert_eq!(record.posted.len(), 2);
    }
}
