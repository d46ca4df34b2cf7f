//! Session types: the server's record of a player and its wire projections.
//!
//! A session is created when a client asks for a token and is kept alive
//! by patches. It tracks:
//! - WHO the player is (`player_name`)
//! - WHERE they are playing (`game_instance`, `is_in_game`)
//! - WHEN the record may be dropped (`expiry`)

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for the session store.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lifetime of a freshly created session. Default: 60 seconds.
    pub creation_lifetime: Duration,

    /// Lifetime granted by every successful patch, counted from the patch.
    /// Default: 60 seconds.
    pub patch_lifetime: Duration,

    /// How often the store sweeps expired sessions. Default: 60 seconds.
    ///
    /// A session may therefore outlive its expiry by up to one interval,
    /// but lookups still find it until the sweep runs.
    pub sweep_interval: Duration,

    /// Pending requests allowed on the store's command channel.
    pub channel_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            creation_lifetime: Duration::from_secs(60),
            patch_lifetime: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(60),
            channel_size: 64,
        }
    }
}

impl SessionConfig {
    /// Longest accepted session lifetime. Expiry instants are computed by
    /// adding a lifetime to the current instant, which must not overflow.
    pub const MAX_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

    /// Clamp values that would make the store unusable.
    ///
    /// - both lifetimes capped at [`Self::MAX_LIFETIME`]
    /// - `channel_size` raised to 1
    pub fn validated(mut self) -> Self {
        if self.creation_lifetime > Self::MAX_LIFETIME || self.patch_lifetime > Self::MAX_LIFETIME {
            tracing::warn!(
                creation_secs = self.creation_lifetime.as_secs(),
                patch_secs = self.patch_lifetime.as_secs(),
                max_secs = Self::MAX_LIFETIME.as_secs(),
                "session lifetime too long, clamping"
            );
        }
        self.creation_lifetime = self.creation_lifetime.min(Self::MAX_LIFETIME);
        self.patch_lifetime = self.patch_lifetime.min(Self::MAX_LIFETIME);
        self.channel_size = self.channel_size.max(1);
        self
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single player's session.
///
/// Only the registry creates or mutates these. Callers get value copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Unique, immutable key. Never reused.
    pub token: String,

    /// Whether the player is currently inside a match.
    pub is_in_game: bool,

    /// Opaque identifier of the match the player is in. Empty until patched.
    pub game_instance: String,

    /// Display name. Empty until patched.
    pub player_name: String,

    /// The session is dropped at the first sweep at or after this instant.
    pub expiry: Instant,
}

impl Session {
    /// Whether the session is due for removal at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expiry <= now
    }

    /// Applies the fields present in `patch` and renews the expiry.
    pub(crate) fn apply(&mut self, patch: &SessionPatch, expiry: Instant) {
        if let Some(is_in_game) = patch.is_in_game {
            self.is_in_game = is_in_game;
        }
        if let Some(game_instance) = &patch.game_instance {
            self.game_instance.clone_from(game_instance);
        }
        if let Some(player_name) = &patch.player_name {
            self.player_name.clone_from(player_name);
        }
        self.expiry = expiry;
    }
}

// ---------------------------------------------------------------------------
// Wire projections
// ---------------------------------------------------------------------------

/// JSON body returned by a session lookup.
///
/// ```json
/// {"token": "3f0c...", "gameInstance": "", "isInGame": false, "playerName": ""}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub token: String,
    pub game_instance: String,
    pub is_in_game: bool,
    pub player_name: String,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            token: session.token.clone(),
            game_instance: session.game_instance.clone(),
            is_in_game: session.is_in_game,
            player_name: session.player_name.clone(),
        }
    }
}

impl From<Session> for SessionView {
    fn from(session: Session) -> Self {
        Self {
            token: session.token,
            game_instance: session.game_instance,
            is_in_game: session.is_in_game,
            player_name: session.player_name,
        }
    }
}

/// JSON body of a session patch. Absent fields are left unchanged.
///
/// Unknown fields are ignored, including a `token` that some clients echo
/// back. The token in the URL is the one that counts. An empty object is a
/// valid patch that only renews the expiry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_instance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_in_game: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
}

impl SessionPatch {
    /// Whether the patch changes nothing but the expiry.
    pub fn is_heartbeat(&self) -> bool {
        self.game_instance.is_none() && self.is_in_game.is_none() && self.player_name.is_none()
    }
}
