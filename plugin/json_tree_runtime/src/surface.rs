//! Surface-side half of the synchronization protocol.
//!
//! The controller owns the tree widget. Values pushed in from the host are
//! applied under a suppression window so the widget's own change notification
//! for that push never travels back out. Everything that goes wrong inside the
//! surface becomes an advisory `{error}` envelope; nothing here is fatal.

use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::config::SurfaceConfig;
use crate::error::{SyncError, TransportError, WidgetError};
use crate::protocol::{
    InboundFrame, JsonPayload, SyncMessage, encode_message, reader_loop, writer_loop,
};
use crate::suppression::SuppressionWindow;
use serde_json::Value;
use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::thread;
use std::time::Instant;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetMode {
    Tree,
    View,
    Form,
}

impl WidgetMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tree => "tree",
            Self::View => "view",
            Self::Form => "form",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetOptions {
    pub mode: WidgetMode,
    pub modes: Vec<WidgetMode>,
    pub search: bool,
    pub sort_keys: bool,
}

impl Default for WidgetOptions {
    fn default() -> Self {
        Self {
            mode: WidgetMode::Tree,
            modes: vec![WidgetMode::Tree, WidgetMode::View, WidgetMode::Form],
            search: true,
            sort_keys: false,
        }
    }
}

/// The visual tree component. Change notifications flow back through the
/// [`WidgetEvents`] handle it was created with, possibly after `update` returns.
pub trait TreeWidget {
    fn update(&mut self, value: &Value) -> Result<(), WidgetError>;

    fn update_text(&mut self, text: &str) -> Result<(), WidgetError>;

    fn resize(&mut self) -> Result<(), WidgetError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Inbound(SyncMessage),
    /// The host sent a frame above the inbound cap; it was discarded.
    OversizeInbound {
        len: usize,
        max: usize,
    },
    Changed(Option<Value>),
    WidgetFailed(String),
    Resize,
    UncaughtError(String),
    UnhandledRejection(Option<String>),
    Shutdown,
}

/// Handle through which a widget reports activity to the event loop.
#[derive(Debug, Clone)]
pub struct WidgetEvents {
    tx: Sender<SurfaceEvent>,
}

impl WidgetEvents {
    pub fn new(tx: Sender<SurfaceEvent>) -> Self {
        Self { tx }
    }

    pub fn changed(&self, value: Option<Value>) {
        self.send(SurfaceEvent::Changed(value));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(SurfaceEvent::WidgetFailed(message.into()));
    }

    pub fn resized(&self) {
        self.send(SurfaceEvent::Resize);
    }

    fn send(&self, event: SurfaceEvent) {
        if self.tx.send(event).is_err() {
            debug!("surface event loop has exited; dropping widget event");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApplyStrategy {
    Value,
    RawText,
    EmptyPlaceholder,
}

const APPLY_STRATEGIES: [ApplyStrategy; 3] = [
    ApplyStrategy::Value,
    ApplyStrategy::RawText,
    ApplyStrategy::EmptyPlaceholder,
];

impl ApplyStrategy {
    fn name(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::RawText => "raw-text",
            Self::EmptyPlaceholder => "empty-placeholder",
        }
    }
}

pub struct TreeSurfaceController<W: TreeWidget> {
    widget: Option<W>,
    canonical: Option<String>,
    has_content: bool,
    suppression: SuppressionWindow,
    clock: Arc<dyn Clock>,
    outbound: SyncSender<SyncMessage>,
    queue_capacity: usize,
    frame_cap: usize,
    dropped_outbound: u64,
}

impl<W: TreeWidget> TreeSurfaceController<W> {
    pub fn new<F>(
        create_widget: F,
        events: WidgetEvents,
        outbound: SyncSender<SyncMessage>,
        clock: Arc<dyn Clock>,
        config: &SurfaceConfig,
    ) -> Self
    where
        F: FnOnce(WidgetOptions, WidgetEvents) -> Result<W, WidgetError>,
    {
        let widget = match create_widget(WidgetOptions::default(), events) {
            Ok(widget) => Some(widget),
            Err(err) => {
                error!(%err, "failed to create tree widget");
                None
            }
        };

        Self {
            widget,
            canonical: None,
            has_content: false,
            suppression: SuppressionWindow::new(config.settle_window),
            clock,
            outbound,
            queue_capacity: config.outbound_queue_cap,
            frame_cap: config.outbound_frame_cap,
            dropped_outbound: 0,
        }
    }

    pub fn has_widget(&self) -> bool {
        self.widget.is_some()
    }

    pub fn has_content(&self) -> bool {
        self.has_content
    }

    pub fn canonical_text(&self) -> Option<&str> {
        self.canonical.as_deref()
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppression.is_active(self.clock.now())
    }

    pub fn dropped_outbound(&self) -> u64 {
        self.dropped_outbound
    }

    pub fn handle(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::Inbound(message) => self.apply_incoming(message),
            SurfaceEvent::OversizeInbound { len, max } => self.on_oversize_inbound(len, max),
            SurfaceEvent::Changed(value) => self.emit_outgoing(value),
            SurfaceEvent::WidgetFailed(message) => self.on_widget_error(&message),
            SurfaceEvent::Resize => self.on_resize(),
            SurfaceEvent::UncaughtError(message) => self.on_uncaught_error(&message),
            SurfaceEvent::UnhandledRejection(reason) => {
                self.on_unhandled_rejection(reason.as_deref())
            }
            SurfaceEvent::Shutdown => debug!("surface shutdown requested"),
        }
    }

    /// Applies a host envelope to the widget.
    pub fn apply_incoming(&mut self, message: SyncMessage) {
        if let Some(note) = &message.error {
            warn!(%note, "host reported an error");
        }

        let Some(payload) = message.json else {
            if message.error.is_none() {
                warn!(err = %TransportError::MissingPayload, "dropping inbound envelope");
            }
            return;
        };

        if self.widget.is_none() {
            warn!("no tree widget; dropping inbound update");
            return;
        }

        if payload.is_blank() {
            if self.has_content {
                debug!("blank payload; keeping current content");
            } else if let Err(err) = self.push_value(codec::empty_object()) {
                self.report_apply_failure(&err);
            }
            return;
        }

        let value = match &payload {
            JsonPayload::Text(text) => match codec::parse_strict(text) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(%err, "inbound payload is not strict JSON");
                    None
                }
            },
            JsonPayload::Inline(value) => Some(value.clone()),
        };

        let mut last_error = None;
        for strategy in APPLY_STRATEGIES {
            let result = match strategy {
                ApplyStrategy::Value => match &value {
                    Some(value) => self.push_value(value.clone()),
                    None => continue,
                },
                ApplyStrategy::RawText => match &payload {
                    JsonPayload::Text(text) => self.push_text(text),
                    JsonPayload::Inline(_) => continue,
                },
                ApplyStrategy::EmptyPlaceholder if self.has_content => continue,
                ApplyStrategy::EmptyPlaceholder => self.push_value(codec::empty_object()),
            };

            match result {
                Ok(()) => {
                    debug!(strategy = strategy.name(), "applied inbound update");
                    return;
                }
                Err(err) => {
                    warn!(strategy = strategy.name(), %err, "apply strategy failed");
                    last_error = Some(err);
                }
            }
        }

        if let Some(err) = last_error {
            self.report_apply_failure(&err);
        }
    }

    /// Forwards a widget change to the host unless it is an echo or a no-op.
    pub fn emit_outgoing(&mut self, value: Option<Value>) {
        if self.suppression.is_active(self.clock.now()) {
            debug!("change raised by inbound update; not forwarding");
            return;
        }

        let value = match value {
            Some(Value::Null) | None if self.has_content => {
                debug!("ignoring spurious clear from widget");
                return;
            }
            Some(Value::Null) | None => codec::empty_object(),
            Some(value) => value,
        };

        let text = codec::canonical_text(&value);
        if self.canonical.as_deref() == Some(text.as_str()) {
            debug!("widget content unchanged");
            return;
        }

        // Canonical only moves once the edit can actually reach the host, so an
        // oversize edit is offered again on the next change.
        let message = SyncMessage::update(text.clone());
        match encode_message(&message) {
            Ok(encoded) if encoded.len() > self.frame_cap => {
                warn!(len = encoded.len(), max = self.frame_cap, "edit exceeds outbound frame cap");
                self.send(SyncMessage::advisory(format!(
                    "Edit too large to send: {} bytes exceeds the {}-byte limit",
                    encoded.len(),
                    self.frame_cap
                )));
                return;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(%err, "failed to encode widget change");
                return;
            }
        }

        self.canonical = Some(text);
        self.has_content = true;
        self.send(message);
    }

    pub fn on_oversize_inbound(&mut self, len: usize, max: usize) {
        warn!(len, max, "host document exceeds inbound frame cap");
        self.send(SyncMessage::advisory(format!(
            "Document too large for the tree editor: {len} bytes exceeds the {max}-byte limit"
        )));
    }

    pub fn on_widget_error(&mut self, message: &str) {
        let message = if message.trim().is_empty() {
            "Unknown tree widget error"
        } else {
            message
        };
        warn!(%message, "tree widget error");
        self.send(SyncMessage::advisory(message));
    }

    pub fn on_resize(&mut self) {
        let Some(widget) = self.widget.as_mut() else {
            return;
        };

        if let Err(err) = widget.resize() {
            warn!(%err, "tree widget resize failed");
            self.send(SyncMessage::advisory(format!("Resize failed: {err}")));
        }
    }

    pub fn on_uncaught_error(&mut self, message: &str) {
        error!(%message, "uncaught surface error");
        self.send(SyncMessage::advisory(format!("Uncaught error: {message}")));
    }

    pub fn on_unhandled_rejection(&mut self, reason: Option<&str>) {
        let reason = reason.unwrap_or("Unknown");
        error!(%reason, "unhandled rejection in surface");
        self.send(SyncMessage::advisory(format!(
            "Unhandled promise rejection: {reason}"
        )));
    }

    /// Clears the suppression window once its deferred deadline has passed.
    pub fn poll_timers(&mut self) -> bool {
        self.suppression.poll(self.clock.now())
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.suppression.deadline()
    }

    fn push_value(&mut self, value: Value) -> Result<(), WidgetError> {
        self.push(|widget| widget.update(&value))?;
        self.canonical = Some(codec::canonical_text(&value));
        self.has_content = true;
        Ok(())
    }

    fn push_text(&mut self, text: &str) -> Result<(), WidgetError> {
        self.push(|widget| widget.update_text(text))?;
        self.has_content = true;
        Ok(())
    }

    fn push<F>(&mut self, apply: F) -> Result<(), WidgetError>
    where
        F: FnOnce(&mut W) -> Result<(), WidgetError>,
    {
        let Some(widget) = self.widget.as_mut() else {
            return Err(WidgetError::new("no tree widget"));
        };

        self.suppression.begin();
        let result = apply(widget);
        self.suppression.settle(self.clock.now());
        result
    }

    fn report_apply_failure(&mut self, err: &WidgetError) {
        error!(%err, "could not apply inbound update");
        self.send(SyncMessage::advisory(format!("Failed to apply update: {err}")));
    }

    fn send(&mut self, message: SyncMessage) {
        match self.outbound.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_message)) => {
                self.dropped_outbound += 1;
                let dropped = self.dropped_outbound;
                if dropped == 1 || dropped.is_power_of_two() {
                    warn!(
                        cap = self.queue_capacity,
                        dropped, "surface outbound queue full; dropping envelope"
                    );
                }
            }
            Err(TrySendError::Disconnected(_message)) => {
                warn!("outbound writer has exited; dropping envelope");
            }
        }
    }
}

/// Runs a surface over a framed byte stream until the input closes.
///
/// Blocking reads and writes happen on their own threads; the controller and
/// the widget stay on the calling thread.
pub fn run<W, F, R, O>(
    create_widget: F,
    config: &SurfaceConfig,
    input: R,
    output: O,
) -> Result<(), SyncError>
where
    W: TreeWidget,
    F: FnOnce(WidgetOptions, WidgetEvents) -> Result<W, WidgetError>,
    R: Read + Send + 'static,
    O: Write + Send + 'static,
{
    let (event_tx, event_rx) = mpsc::channel();
    let (outbound_tx, outbound_rx) = mpsc::sync_channel(config.outbound_queue_cap);

    let outbound_cap = config.outbound_frame_cap;
    let writer_handle = thread::spawn(move || writer_loop(outbound_rx, output, outbound_cap));

    let inbound_cap = config.inbound_frame_cap;
    let reader_tx = event_tx.clone();
    let reader_handle = thread::spawn(move || {
        let result = reader_loop(input, inbound_cap, |frame| {
            let event = match frame {
                InboundFrame::Message(message) => SurfaceEvent::Inbound(message),
                InboundFrame::Oversize { len, max } => SurfaceEvent::OversizeInbound { len, max },
            };
            if reader_tx.send(event).is_err() {
                debug!("surface loop gone; dropping inbound envelope");
            }
        });
        if let Err(err) = &result {
            error!(%err, "inbound frame stream failed");
        }
        let _ = reader_tx.send(SurfaceEvent::Shutdown);
        result
    });

    let mut controller = TreeSurfaceController::new(
        create_widget,
        WidgetEvents::new(event_tx),
        outbound_tx,
        Arc::new(SystemClock),
        config,
    );

    let mut reader_done = false;
    loop {
        let event = match controller.next_deadline() {
            Some(deadline) => {
                match event_rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(event) => event,
                    Err(RecvTimeoutError::Timeout) => {
                        controller.poll_timers();
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match event_rx.recv() {
                Ok(event) => event,
                Err(_) => break,
            },
        };

        controller.poll_timers();

        if event == SurfaceEvent::Shutdown {
            reader_done = true;
            // Widget notifications queued behind the shutdown still count.
            for pending in event_rx.try_iter() {
                if pending != SurfaceEvent::Shutdown {
                    controller.handle(pending);
                }
            }
            break;
        }

        controller.handle(event);
    }

    // Dropping the controller releases the last outbound sender.
    drop(controller);

    let written = match writer_handle.join() {
        Ok(result) => result,
        Err(err) => {
            error!(?err, "writer thread join failed");
            Ok(())
        }
    };

    // The reader sends Shutdown as its last act, so joining it cannot block.
    let read = if reader_done || reader_handle.is_finished() {
        match reader_handle.join() {
            Ok(result) => result,
            Err(err) => {
                error!(?err, "reader thread join failed");
                Ok(())
            }
        }
    } else {
        debug!("reader thread still active during shutdown; skipping join");
        Ok(())
    };

    written?;
    read?;
    Ok(())
}
