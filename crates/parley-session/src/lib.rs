//! Ephemeral player sessions for Parley.
//!
//! A game client asks for a token, then periodically patches its session
//! with who it is and which match it is in. Sessions that stop being
//! patched expire and are swept away.
//!
//! # How it fits together
//!
//! ```text
//! HTTP handlers ──→ SessionStoreHandle ──(mpsc + oneshot)──→ SessionStore task
//!                                                              │
//!                                           SessionRegistry ←──┤ Clock
//!                                                              │ TokenGenerator
//!                                                              └ TickScheduler (sweep)
//! ```
//!
//! [`SessionRegistry`] holds the rules and takes time as an argument, so it
//! can be tested on its own. [`SessionStore`] wraps it in an actor with an
//! injectable [`Clock`] and [`TokenGenerator`].

mod clock;
mod error;
mod registry;
mod session;
mod store;
mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{Session, SessionConfig, SessionPatch, SessionView};
pub use store::{SessionStore, SessionStoreHandle};
pub use token::{RandomTokens, TokenGenerator};
