//! Realtime envelope types and decoder.
//!
//! The server sends one JSON object per text frame, discriminated by a
//! `MessageType` field:
//!
//! ```json
//! {"MessageType": "download-update", "Title": "Foo", "BytesDownloaded": 5000, "TotalBytes": 100000}
//! ```
//!
//! [`decode_frame`] turns such a frame into a strongly-typed [`Envelope`]
//! exactly once, so consumers can match exhaustively instead of poking at
//! untyped JSON.

use std::str::FromStr;

use plexsync_core::message_types::{
    DISCRIMINATOR_FIELD, MSG_TYPE_DOWNLOAD_COMPLETE, MSG_TYPE_DOWNLOAD_START,
    MSG_TYPE_DOWNLOAD_UPDATE,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// The closed set of envelope discriminators this client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    DownloadStart,
    DownloadUpdate,
    DownloadComplete,
}

impl MessageKind {
    pub const ALL: [MessageKind; 3] = [
        MessageKind::DownloadStart,
        MessageKind::DownloadUpdate,
        MessageKind::DownloadComplete,
    ];

    /// Wire value of the discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::DownloadStart => MSG_TYPE_DOWNLOAD_START,
            MessageKind::DownloadUpdate => MSG_TYPE_DOWNLOAD_UPDATE,
            MessageKind::DownloadComplete => MSG_TYPE_DOWNLOAD_COMPLETE,
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discriminator outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown message kind: {0}")]
pub struct UnknownMessageKind(pub String);

impl FromStr for MessageKind {
    type Err = UnknownMessageKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            MSG_TYPE_DOWNLOAD_START => Ok(MessageKind::DownloadStart),
            MSG_TYPE_DOWNLOAD_UPDATE => Ok(MessageKind::DownloadUpdate),
            MSG_TYPE_DOWNLOAD_COMPLETE => Ok(MessageKind::DownloadComplete),
            other => Err(UnknownMessageKind(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A decoded realtime message.
///
/// Serialized with the internally-tagged `MessageType` field; payload
/// fields sit next to the tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "MessageType")]
pub enum Envelope {
    /// A download job was queued or started.
    #[serde(rename = "download-start")]
    DownloadStart(TransferData),

    /// Byte-level progress for a running job.
    #[serde(rename = "download-update")]
    DownloadUpdate(TransferData),

    /// A job finished.
    #[serde(rename = "download-complete")]
    DownloadComplete(CompleteData),
}

/// Payload for `download-start` and `download-update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransferData {
    pub title: String,
    #[serde(default)]
    pub bytes_downloaded: u64,
    /// `0` while the server does not know the size yet.
    #[serde(default)]
    pub total_bytes: u64,
}

/// Payload for `download-complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompleteData {
    pub title: String,
}

impl Envelope {
    pub fn kind(&self) -> MessageKind {
        match self {
            Envelope::DownloadStart(_) => MessageKind::DownloadStart,
            Envelope::DownloadUpdate(_) => MessageKind::DownloadUpdate,
            Envelope::DownloadComplete(_) => MessageKind::DownloadComplete,
        }
    }

    /// Title of the job this envelope refers to.
    pub fn title(&self) -> &str {
        match self {
            Envelope::DownloadStart(data) | Envelope::DownloadUpdate(data) => &data.title,
            Envelope::DownloadComplete(data) => &data.title,
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Outcome of decoding a well-formed frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A discriminator in the closed set with a valid payload.
    Known(Envelope),
    /// Valid JSON with a discriminator this client does not handle.
    Unrecognized(String),
}

/// Why a frame could not be decoded. The frame is dropped.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not JSON.
    #[error("Malformed JSON: {0}")]
    Json(#[source] serde_json::Error),

    /// The frame is JSON but has no string `MessageType` field.
    #[error("Missing MessageType discriminator")]
    MissingDiscriminator,

    /// The discriminator is known but the payload does not match it.
    #[error("Invalid {kind} payload: {source}")]
    Payload {
        kind: MessageKind,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode a realtime text frame.
///
/// Heartbeat frames must be filtered out before calling this; a bare
/// `PING` is not JSON and decodes to [`DecodeError::Json`].
pub fn decode_frame(text: &str) -> Result<Frame, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(DecodeError::Json)?;

    let kind = match value.get(DISCRIMINATOR_FIELD).and_then(|v| v.as_str()) {
        Some(raw) => match raw.parse::<MessageKind>() {
            Ok(kind) => kind,
            Err(UnknownMessageKind(raw)) => return Ok(Frame::Unrecognized(raw)),
        },
        None => return Err(DecodeError::MissingDiscriminator),
    };

    serde_json::from_value::<Envelope>(value)
        .map(Frame::Known)
        .map_err(|source| DecodeError::Payload { kind, source })
}
