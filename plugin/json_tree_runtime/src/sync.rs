//! Host-side half of the synchronization protocol.
//!
//! The text document is the source of truth. Its parsed value flows to the
//! panel as canonical JSON text, and edits made in the panel come back as a
//! whole-document replacement serialized in the document's own [`Variant`].
//! Parse failures never blank the panel: the last good content stays visible.

use crate::clock::Clock;
use crate::codec::{self, Variant};
use crate::config::SyncConfig;
use crate::error::HostError;
use crate::host::{
    ColorThemeKind, DocumentUri, EditorHost, PanelId, TextDocument, TextEdit, TextRange, Theme,
};
use crate::panel::{PanelHost, PanelLifecycle, ShowOutcome};
use crate::protocol::SyncMessage;
use crate::suppression::SuppressionWindow;
use serde_json::Value;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tracing::{debug, error, warn};

struct BoundDocument<D> {
    uri: DocumentUri,
    variant: Variant,
    document: Weak<D>,
    stale: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteStrategy {
    Reformat,
    Passthrough,
}

const WRITE_STRATEGIES: [WriteStrategy; 2] = [WriteStrategy::Reformat, WriteStrategy::Passthrough];

struct RenderedEdit {
    text: String,
    value: Option<Value>,
}

impl WriteStrategy {
    fn name(self) -> &'static str {
        match self {
            Self::Reformat => "reformat",
            Self::Passthrough => "passthrough",
        }
    }

    fn render(self, raw: &str, variant: Variant) -> Result<RenderedEdit, String> {
        match self {
            Self::Reformat => {
                let value = codec::parse_strict(raw).map_err(|err| err.to_string())?;
                Ok(RenderedEdit {
                    text: codec::stringify(&value, variant),
                    value: Some(value),
                })
            }
            Self::Passthrough => Ok(RenderedEdit {
                text: raw.to_string(),
                value: codec::parse(raw).ok(),
            }),
        }
    }
}

fn render_panel_edit(raw: &str, variant: Variant) -> Option<RenderedEdit> {
    for strategy in WRITE_STRATEGIES {
        match strategy.render(raw, variant) {
            Ok(rendered) => {
                debug!(strategy = strategy.name(), "selected write strategy for panel edit");
                return Some(rendered);
            }
            Err(err) => warn!(strategy = strategy.name(), %err, "write strategy failed"),
        }
    }

    None
}

pub struct DocumentSyncController<H: EditorHost> {
    host: Rc<H>,
    panel: PanelHost<H::Panel>,
    clock: Arc<dyn Clock>,
    bound: Option<BoundDocument<H::Document>>,
    canonical: Option<String>,
    last_good: Option<Value>,
    suppression: SuppressionWindow,
}

impl<H: EditorHost> DocumentSyncController<H> {
    pub fn new(host: Rc<H>, config: &SyncConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            host,
            panel: PanelHost::new(config.asset_root.clone()),
            clock,
            bound: None,
            canonical: None,
            last_good: None,
            suppression: SuppressionWindow::new(config.settle_window),
        }
    }

    pub fn lifecycle(&self) -> PanelLifecycle {
        self.panel.lifecycle()
    }

    pub fn panel_id(&self) -> Option<PanelId> {
        self.panel.active_id()
    }

    pub fn bound_uri(&self) -> Option<&DocumentUri> {
        self.bound.as_ref().map(|bound| &bound.uri)
    }

    pub fn bound_variant(&self) -> Option<Variant> {
        self.bound.as_ref().map(|bound| bound.variant)
    }

    /// Last canonical text sent to, or accepted from, the panel.
    pub fn canonical_text(&self) -> Option<&str> {
        self.canonical.as_deref()
    }

    /// True while the bound document's text does not parse and the panel is
    /// showing older content.
    pub fn is_stale(&self) -> bool {
        self.bound.as_ref().is_some_and(|bound| bound.stale)
    }

    /// Creates or reveals the panel, then binds whatever JSON editor is active.
    pub fn show(&mut self) -> Result<ShowOutcome, HostError> {
        let theme = Theme::from(self.host.color_theme());
        let host = &self.host;
        let outcome = self.panel.show(theme, |options| host.create_panel(options))?;

        if let ShowOutcome::Created(_) = outcome {
            self.reset_binding();
        }
        self.on_active_editor_changed();

        Ok(outcome)
    }

    pub fn on_active_editor_changed(&mut self) {
        if !self.panel.is_active() {
            return;
        }

        let Some(document) = self.host.active_document() else {
            return;
        };

        let uri = document.uri().clone();
        let Some(variant) = uri.variant() else {
            debug!(%uri, "active editor is not a JSON file; keeping panel content");
            return;
        };

        if self.is_bound_to(&document) {
            return;
        }

        debug!(%uri, ?variant, "binding document");
        self.bound = Some(BoundDocument {
            uri: uri.clone(),
            variant,
            document: Rc::downgrade(&document),
            stale: false,
        });

        match codec::parse(&document.text()) {
            Ok(value) => self.forward(value),
            Err(err) => {
                warn!(%uri, %err, "bound document does not parse; showing last good content");
                self.mark_stale();

                let fallback = self.last_good.clone().unwrap_or_else(codec::empty_object);
                let text = codec::canonical_text(&fallback);
                self.canonical = Some(text.clone());
                self.panel
                    .post(SyncMessage::update(text).with_error(format!("{uri}: {err}")));
            }
        }
    }

    pub fn on_document_saved(&mut self, uri: &DocumentUri) {
        self.refresh_from_document(uri, "save");
    }

    pub fn on_document_changed(&mut self, uri: &DocumentUri) {
        self.refresh_from_document(uri, "change");
    }

    /// Rebuilds the panel for the new theme and reloads it with the bound
    /// document's current value, falling back to the last canonical text when
    /// the document no longer parses.
    pub fn on_theme_changed(&mut self, kind: ColorThemeKind) {
        let theme = Theme::from(kind);
        if self.panel.theme().is_none_or(|shown| shown == theme) {
            return;
        }

        if let Some(bound) = &self.bound
            && let Some(document) = bound.document.upgrade()
        {
            match codec::parse(&document.text()) {
                Ok(value) => self.accept(Some(value)),
                Err(err) => debug!(uri = %bound.uri, %err, "keeping last canonical text for rebuild"),
            }
        }

        let current = self.canonical.clone().map(SyncMessage::update);
        self.panel.on_theme_changed(theme, current);
    }

    /// Applies an edit made in the panel to the bound document.
    pub fn on_panel_message(&mut self, id: PanelId, message: SyncMessage) {
        let Some(message) = self.panel.receive(id, message) else {
            return;
        };

        if let Some(note) = &message.error {
            warn!(panel = %id, %note, "surface reported an error");
        }

        let Some(payload) = message.json.filter(|payload| !payload.is_blank()) else {
            return;
        };

        let Some(bound) = &self.bound else {
            warn!(panel = %id, "no bound document; dropping panel edit");
            return;
        };

        let Some(document) = bound.document.upgrade() else {
            warn!(uri = %bound.uri, "bound document was closed; dropping panel edit");
            return;
        };

        let uri = bound.uri.clone();
        let Some(rendered) = render_panel_edit(&payload.to_raw_text(), bound.variant) else {
            return;
        };

        let current = document.text();
        if current == rendered.text {
            debug!(%uri, "document already matches panel content");
            self.accept(rendered.value);
            return;
        }

        let edit = TextEdit::replace(TextRange::whole(&current), rendered.text);

        self.suppression.begin();
        match document.apply_edits(std::slice::from_ref(&edit)) {
            Ok(()) => {
                self.suppression.settle(self.clock.now());
                self.accept(rendered.value);
            }
            Err(err) => {
                self.suppression.release();
                error!(%uri, %err, "failed to apply panel edit");
                self.host
                    .show_error_message(&format!("Failed to update {uri}: {err}"));
            }
        }
    }

    pub fn on_panel_disposed(&mut self, id: PanelId) {
        if self.panel.dispose(id) {
            self.reset_binding();
        }
    }

    fn refresh_from_document(&mut self, uri: &DocumentUri, trigger: &'static str) {
        if !self.panel.is_active() || !uri.is_json() {
            return;
        }

        let Some(bound) = &self.bound else {
            return;
        };

        if &bound.uri != uri {
            debug!(%uri, trigger, "ignoring event for unbound document");
            return;
        }

        // Inside the window only our own write is skipped. Any other content
        // still reaches the panel.
        let suppressed = self.suppression.is_active(self.clock.now());

        let Some(document) = bound.document.upgrade() else {
            debug!(%uri, "bound document was released");
            self.bound = None;
            return;
        };

        match codec::parse(&document.text()) {
            Ok(value) => {
                if suppressed
                    && self.canonical.as_deref() == Some(codec::canonical_text(&value).as_str())
                {
                    debug!(%uri, trigger, "ignoring echo of panel edit");
                    return;
                }
                self.forward(value);
            }
            Err(err) if suppressed => {
                debug!(%uri, %err, trigger, "unparsed text written by panel edit");
            }
            Err(err) => {
                warn!(%uri, %err, trigger, "document does not parse; panel left unchanged");
                self.mark_stale();
            }
        }
    }

    fn forward(&mut self, value: Value) {
        let text = codec::canonical_text(&value);
        let unchanged = self.canonical.as_deref() == Some(text.as_str());
        self.accept(Some(value));

        if unchanged {
            debug!("panel already shows this content");
            return;
        }

        self.panel.post(SyncMessage::update(text));
    }

    fn accept(&mut self, value: Option<Value>) {
        let Some(value) = value else {
            return;
        };

        if let Some(bound) = &mut self.bound {
            bound.stale = false;
        }
        self.canonical = Some(codec::canonical_text(&value));
        self.last_good = Some(value);
    }

    fn mark_stale(&mut self) {
        if let Some(bound) = &mut self.bound {
            bound.stale = true;
        }
    }

    fn is_bound_to(&self, document: &Rc<H::Document>) -> bool {
        self.bound.as_ref().is_some_and(|bound| {
            bound.uri == *document.uri()
                && bound
                    .document
                    .upgrade()
                    .is_some_and(|current| Rc::ptr_eq(&current, document))
        })
    }

    fn reset_binding(&mut self) {
        self.bound = None;
        self.canonical = None;
        self.last_good = None;
        self.suppression.release();
    }
}
