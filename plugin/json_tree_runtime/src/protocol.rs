use crate::error::TransportError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::io::{self, Read, Write};
use std::sync::mpsc::Receiver;
use tracing::{debug, warn};

// Every envelope carries a whole document, so both directions default to the
// same generous cap. `SurfaceConfig` can override either one.
pub const SURFACE_TO_HOST_CAP: usize = 16 * 1024 * 1024;
pub const HOST_TO_SURFACE_CAP: usize = 16 * 1024 * 1024;

/// Envelope exchanged between the host and the isolated surface.
///
/// `json` drives an update; `error` is advisory and only ever logged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_payload"
    )]
    pub json: Option<JsonPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The `json` field as it arrives: normally a JSON string, occasionally an
/// already-structured value, or `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonPayload {
    Text(String),
    Inline(Value),
}

impl JsonPayload {
    /// Null, empty or whitespace-only payloads carry no content.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Inline(value) => value.is_null(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Inline(_) => None,
        }
    }

    /// Raw text form, used when the payload must be written verbatim.
    pub fn to_raw_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Inline(value) => value.to_string(),
        }
    }
}

impl From<Value> for JsonPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            other => Self::Inline(other),
        }
    }
}

impl SyncMessage {
    pub fn update(json: impl Into<String>) -> Self {
        Self {
            json: Some(JsonPayload::Text(json.into())),
            error: None,
        }
    }

    pub fn advisory(error: impl Into<String>) -> Self {
        Self {
            json: None,
            error: Some(error.into()),
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn json_text(&self) -> Option<&str> {
        self.json.as_ref().and_then(JsonPayload::as_text)
    }
}

// A present `null` must stay distinguishable from a missing field.
fn deserialize_payload<'de, D>(deserializer: D) -> Result<Option<JsonPayload>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| Some(JsonPayload::from(value)))
}

pub fn encode_message(message: &SyncMessage) -> Result<Vec<u8>, TransportError> {
    serde_json::to_vec(message).map_err(TransportError::Json)
}

pub fn decode_message(payload: &[u8]) -> Result<SyncMessage, TransportError> {
    serde_json::from_slice(payload).map_err(TransportError::Json)
}

/// Writes every queued envelope as a frame until all senders hang up.
/// Envelopes that fail to encode or exceed `max_payload` are dropped.
pub fn writer_loop<W: Write>(
    rx: Receiver<SyncMessage>,
    mut writer: W,
    max_payload: usize,
) -> io::Result<()> {
    for message in rx {
        let payload = match encode_message(&message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, "dropping unencodable envelope");
                continue;
            }
        };

        match write_frame(&mut writer, &payload, max_payload) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                warn!(%err, "dropping outbound envelope");
                continue;
            }
            Err(err) => return Err(err),
        }
        writer.flush()?;
    }

    Ok(())
}

/// What the reader hands to the surface for each frame it gets through.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Message(SyncMessage),
    /// A frame above the cap; its payload was read and discarded.
    Oversize { len: usize, max: usize },
}

/// Reads frames until EOF. Envelopes that do not decode are logged and skipped,
/// and oversize frames are skipped and reported. Only a truncated or unreadable
/// stream ends the loop with an error.
pub fn reader_loop<R, F>(mut reader: R, max_payload: usize, mut on_frame: F) -> io::Result<()>
where
    R: Read,
    F: FnMut(InboundFrame),
{
    loop {
        let len = match read_len(&mut reader) {
            Ok(len) => len,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                debug!("frame stream closed");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        if len > max_payload {
            skip_payload(&mut reader, len)?;
            warn!(len, max = max_payload, "skipped oversize inbound frame");
            on_frame(InboundFrame::Oversize {
                len,
                max: max_payload,
            });
            continue;
        }

        let payload = read_payload(&mut reader, len)?;
        match decode_message(&payload) {
            Ok(message) => on_frame(InboundFrame::Message(message)),
            Err(err) => warn!(%err, len, "dropping malformed envelope"),
        }
    }
}

pub fn read_frame(reader: &mut impl Read, max_payload: usize) -> io::Result<Vec<u8>> {
    let len = read_len(reader)?;
    if len > max_payload {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            TransportError::FrameTooLarge {
                len,
                max: max_payload,
            },
        ));
    }

    read_payload(reader, len)
}

fn read_len(reader: &mut impl Read) -> io::Result<usize> {
    let mut len_buf = [0_u8; 4];
    reader.read_exact(&mut len_buf)?;
    Ok(u32::from_be_bytes(len_buf) as usize)
}

// EOF is only clean on a frame boundary.
fn truncated(err: io::Error) -> io::Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        io::Error::new(io::ErrorKind::InvalidData, "truncated frame payload")
    } else {
        err
    }
}

fn read_payload(reader: &mut impl Read, len: usize) -> io::Result<Vec<u8>> {
    let mut payload = vec![0_u8; len];
    reader.read_exact(&mut payload).map_err(truncated)?;
    Ok(payload)
}

fn skip_payload(reader: &mut impl Read, len: usize) -> io::Result<()> {
    let skipped = io::copy(&mut reader.by_ref().take(len as u64), &mut io::sink())?;
    if skipped < len as u64 {
        return Err(truncated(io::ErrorKind::UnexpectedEof.into()));
    }
    Ok(())
}

pub fn write_frame(writer: &mut impl Write, payload: &[u8], max_payload: usize) -> io::Result<()> {
    if payload.len() > max_payload {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            TransportError::FrameTooLarge {
                len: payload.len(),
                max: max_payload,
            },
        ));
    }

    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "payload exceeds u32"))?;

    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    Ok(())
}
