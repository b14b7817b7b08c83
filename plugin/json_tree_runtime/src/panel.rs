//! Lifecycle of the single tree-editor panel.
//!
//! At most one panel exists at a time. Showing an existing panel reveals it;
//! disposing it detaches everything so a later show starts from scratch with a
//! fresh [`PanelId`].

use crate::config::{PANEL_TITLE, PANEL_VIEW_TYPE};
use crate::error::HostError;
use crate::host::{PanelId, PanelOptions, Theme, ViewColumn, WebviewPanel};
use crate::protocol::SyncMessage;
use crate::shell::{ShellAssets, render_shell};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelLifecycle {
    Absent,
    Creating,
    Active,
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowOutcome {
    Created(PanelId),
    Revealed(PanelId),
}

impl ShowOutcome {
    pub fn id(self) -> PanelId {
        match self {
            Self::Created(id) | Self::Revealed(id) => id,
        }
    }
}

enum PanelSlot<P> {
    Absent,
    Creating,
    Active(ActivePanel<P>),
    Disposed,
}

struct ActivePanel<P> {
    id: PanelId,
    panel: P,
    theme: Theme,
    last_update: Option<SyncMessage>,
}

pub struct PanelHost<P: WebviewPanel> {
    slot: PanelSlot<P>,
    next_id: u64,
    asset_root: String,
}

impl<P: WebviewPanel> PanelHost<P> {
    pub fn new(asset_root: impl Into<String>) -> Self {
        Self {
            slot: PanelSlot::Absent,
            next_id: 1,
            asset_root: asset_root.into(),
        }
    }

    pub fn lifecycle(&self) -> PanelLifecycle {
        match self.slot {
            PanelSlot::Absent => PanelLifecycle::Absent,
            PanelSlot::Creating => PanelLifecycle::Creating,
            PanelSlot::Active(_) => PanelLifecycle::Active,
            PanelSlot::Disposed => PanelLifecycle::Disposed,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.slot, PanelSlot::Active(_))
    }

    pub fn active_id(&self) -> Option<PanelId> {
        match &self.slot {
            PanelSlot::Active(active) => Some(active.id),
            _ => None,
        }
    }

    pub fn theme(&self) -> Option<Theme> {
        match &self.slot {
            PanelSlot::Active(active) => Some(active.theme),
            _ => None,
        }
    }

    /// Reveals the active panel, or creates one through `create`.
    pub fn show<F>(&mut self, theme: Theme, create: F) -> Result<ShowOutcome, HostError>
    where
        F: FnOnce(&PanelOptions) -> Result<P, HostError>,
    {
        if let PanelSlot::Active(active) = &mut self.slot {
            active.panel.reveal(ViewColumn::Beside);
            debug!(panel = %active.id, "revealed existing panel");
            return Ok(ShowOutcome::Revealed(active.id));
        }

        let id = PanelId(self.next_id);
        self.next_id += 1;

        let options = PanelOptions {
            id,
            view_type: PANEL_VIEW_TYPE.to_string(),
            title: PANEL_TITLE.to_string(),
            column: ViewColumn::Beside,
            enable_scripts: true,
            local_resource_roots: vec![self.asset_root.clone()],
        };

        self.slot = PanelSlot::Creating;

        let mut panel = match create(&options) {
            Ok(panel) => panel,
            Err(err) => {
                self.slot = PanelSlot::Absent;
                return Err(err);
            }
        };

        panel.set_html(render_shell(theme, &ShellAssets::resolve(&panel)));
        debug!(panel = %id, theme = theme.as_str(), "created panel");

        self.slot = PanelSlot::Active(ActivePanel {
            id,
            panel,
            theme,
            last_update: None,
        });

        Ok(ShowOutcome::Created(id))
    }

    /// Posts to the active panel. Returns false when nothing was delivered.
    pub fn post(&mut self, message: SyncMessage) -> bool {
        let PanelSlot::Active(active) = &mut self.slot else {
            debug!("no active panel; dropping outbound message");
            return false;
        };

        if let Err(err) = active.panel.post_message(&message) {
            warn!(panel = %active.id, %err, "failed to post message to panel");
            return false;
        }

        if let Some(json) = message.json {
            active.last_update = Some(SyncMessage {
                json: Some(json),
                error: None,
            });
        }

        true
    }

    /// Rebuilds the shell in place when the theme actually changed, then posts
    /// `current` so the reloaded surface is not blank. Without `current` the
    /// last posted value is used.
    pub fn on_theme_changed(&mut self, theme: Theme, current: Option<SyncMessage>) -> bool {
        let PanelSlot::Active(active) = &mut self.slot else {
            return false;
        };

        if active.theme == theme {
            return false;
        }

        if current.is_some() {
            active.last_update = current;
        }

        active.theme = theme;
        active
            .panel
            .set_html(render_shell(theme, &ShellAssets::resolve(&active.panel)));
        debug!(panel = %active.id, theme = theme.as_str(), "rebuilt panel shell");

        if let Some(update) = &active.last_update
            && let Err(err) = active.panel.post_message(update)
        {
            warn!(panel = %active.id, %err, "failed to re-post content after shell rebuild");
        }

        true
    }

    /// Relays a message from the surface, but only for the live panel.
    pub fn receive(&self, id: PanelId, message: SyncMessage) -> Option<SyncMessage> {
        match &self.slot {
            PanelSlot::Active(active) if active.id == id => Some(message),
            _ => {
                debug!(panel = %id, "dropping message for inactive panel");
                None
            }
        }
    }

    pub fn dispose(&mut self, id: PanelId) -> bool {
        if self.active_id() != Some(id) {
            return false;
        }

        if let PanelSlot::Active(mut active) = std::mem::replace(&mut self.slot, PanelSlot::Disposed)
        {
            active.panel.dispose();
            debug!(panel = %active.id, "disposed panel");
        }

        true
    }
}
