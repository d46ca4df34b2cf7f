//! Chat relay for Parley.
//!
//! A single [`ChatBroadcaster`] actor owns a revisioned [`MessageLog`] and a
//! delivery cursor per connected client. Read tasks feed it inbound text on
//! a bounded channel; on every tick it sends each client whatever it has
//! not seen yet.
//!
//! ```text
//! read task ─┐
//! read task ─┼─ Inbound(text) ─→ ChatBroadcaster ─ tick ─→ send_text per client
//! read task ─┘                     (MessageLog + cursors)
//! ```

mod broadcaster;
mod config;
mod error;
mod log;

pub use broadcaster::{ChatBroadcaster, ChatHandle, ChatStats, ClientId};
pub use config::ChatConfig;
pub use error::ChatError;
pub use log::{floor_mod, MessageLog};
