//! Realtime wire constants.
//!
//! Shared by the envelope decoder and by tests that build raw frames.

/// Keep-alive text frame sent by the server. Carries no envelope.
pub const HEARTBEAT_FRAME: &str = "PING";

/// Name of the discriminator field on every envelope.
pub const DISCRIMINATOR_FIELD: &str = "MessageType";

/// A download job has been queued or has started.
pub const MSG_TYPE_DOWNLOAD_START: &str = "download-start";

/// Byte-level progress for a running download job.
pub const MSG_TYPE_DOWNLOAD_UPDATE: &str = "download-update";

/// A download job has finished.
pub const MSG_TYPE_DOWNLOAD_COMPLETE: &str = "download-complete";

/// Path of the realtime endpoint relative to the WebSocket root.
pub const REALTIME_PATH: &str = "/api/ws";
