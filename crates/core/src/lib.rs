//! Domain logic shared by the plexsync client crates.
//!
//! Nothing in here touches the network or spawns tasks: the download
//! progress table, the search ranking rules, and the wire-level
//! constants live here so they can be tested in isolation.

pub mod message_types;
pub mod progress;
pub mod search;
pub mod types;
