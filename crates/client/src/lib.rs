//! Terminal front-end for plexsync.
//!
//! Wires the realtime channel, the progress tracker, and the search ranker
//! together behind a line-oriented stdin interface. The library half holds
//! everything that can be tested without a terminal.

pub mod background;
pub mod command;
pub mod config;
pub mod logging;
pub mod render;
