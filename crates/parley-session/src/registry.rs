//! The session registry: every live session, keyed by token.
//!
//! This is the synchronous core of the session layer. It never reads the
//! clock itself: every time-dependent operation takes `now`, which keeps
//! the expiry rules testable without sleeping.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is a plain `HashMap` with no locking. It is owned by
//! the [`SessionStore`](crate::SessionStore) task and only reached through
//! that task's command channel.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::{Session, SessionConfig, SessionError, SessionPatch};

/// Token → session map with expiry bookkeeping.
///
/// ## Lifecycle
///
/// ```text
/// create() ──→ patch() ──→ patch() ... ──→ sweep()
///    │                                       │
///    └── expiry = now + creation_lifetime    └── removed once expiry <= now
///                 patch: expiry = now + patch_lifetime
/// ```
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
    creation_lifetime: Duration,
    patch_lifetime: Duration,
}

impl SessionRegistry {
    /// Creates an empty registry using the lifetimes from `config`.
    ///
    /// Lifetimes are capped at [`SessionConfig::MAX_LIFETIME`].
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            creation_lifetime: config.creation_lifetime.min(SessionConfig::MAX_LIFETIME),
            patch_lifetime: config.patch_lifetime.min(SessionConfig::MAX_LIFETIME),
        }
    }

    /// Inserts a blank session for `token`, expiring one creation lifetime
    /// after `now`.
    ///
    /// # Errors
    /// Returns [`SessionError::Collision`] if `token` is already in use.
    /// The existing session is not modified.
    pub fn create(&mut self, token: String, now: Instant) -> Result<&Session, SessionError> {
        use std::collections::hash_map::Entry;

        match self.sessions.entry(token) {
            Entry::Occupied(_) => Err(SessionError::Collision),
            Entry::Vacant(slot) => {
                let session = Session {
                    token: slot.key().clone(),
                    is_in_game: false,
                    game_instance: String::new(),
                    player_name: String::new(),
                    expiry: expiry_after(now, self.creation_lifetime),
                };
                Ok(slot.insert(session))
            }
        }
    }

    /// Returns a copy of the session for `token`, if any.
    ///
    /// Expired sessions are still returned until a sweep removes them.
    pub fn find(&self, token: &str) -> Option<Session> {
        self.sessions.get(token).cloned()
    }

    /// Applies `patch` and renews the session's expiry to one patch
    /// lifetime after `now`.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if no session has this token.
    pub fn patch(
        &mut self,
        token: &str,
        patch: &SessionPatch,
        now: Instant,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(token)
            .ok_or_else(|| SessionError::NotFound(token.to_owned()))?;
        session.apply(patch, expiry_after(now, self.patch_lifetime));
        Ok(())
    }

    /// Removes every session whose expiry is at or before `now` and returns
    /// their tokens.
    ///
    /// Expiry is purely time-based. Being in a game does not keep a session
    /// alive; only patches do.
    pub fn sweep(&mut self, now: Instant) -> Vec<String> {
        let mut removed = Vec::new();
        self.sessions.retain(|token, session| {
            if session.is_expired(now) {
                removed.push(token.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Returns the number of sessions, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// `now + lifetime`, saturating at the latest representable instant.
fn expiry_after(now: Instant, lifetime: Duration) -> Instant {
    now.checked_add(lifetime)
        .or_else(|| now.checked_add(SessionConfig::MAX_LIFETIME))
        .unwrap_or(now)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `SessionRegistry`.
    //!
    //! Time is passed in explicitly, so every test builds its own `t0` and
    //! offsets from it instead of sleeping.

    use super::*;

    // -- Helpers ----------------------------------------------------------

    const MINUTE: Duration = Duration::from_secs(60);

    fn registry() -> SessionRegistry {
        SessionRegistry::new(&SessionConfig::default())
    }

    fn name(player: &str) -> SessionPatch {
        SessionPatch {
            player_name: Some(player.into()),
            ..SessionPatch::default()
        }
    }

    // =====================================================================
    // create()
    // =====================================================================

    #[test]
    fn test_create_returns_blank_session() {
        let mut reg = registry();
        let t0 = Instant::now();

        let session = reg.create("abc".into(), t0).expect("should succeed");

        assert_eq!(session.token, "abc");
        assert!(!session.is_in_game);
        assert_eq!(session.game_instance, "");
        assert_eq!(session.player_name, "");
        assert_eq!(session.expiry, t0 + MINUTE);
    }

    #[test]
    fn test_create_collision_is_rejected_and_existing_kept() {
        let mut reg = registry();
        let t0 = Instant::now();
        reg.create("abc".into(), t0).unwrap();
        reg.patch("abc", &name("ada"), t0).unwrap();

        let result = reg.create("abc".into(), t0 + Duration::from_secs(5));

        assert!(matches!(result, Err(SessionError::Collision)));
        let existing = reg.find("abc").unwrap();
        assert_eq!(existing.player_name, "ada");
        assert_eq!(existing.expiry, t0 + MINUTE);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_create_uses_configured_lifetime() {
        let mut reg = SessionRegistry::new(&SessionConfig {
            creation_lifetime: Duration::from_secs(5),
            ..SessionConfig::default()
        });
        let t0 = Instant::now();

        let session = reg.create("abc".into(), t0).unwrap();

        assert_eq!(session.expiry, t0 + Duration::from_secs(5));
    }

    #[test]
    fn test_huge_lifetimes_do_not_overflow() {
        let mut reg = SessionRegistry::new(&SessionConfig {
            creation_lifetime: Duration::from_secs(u64::MAX),
            patch_lifetime: Duration::MAX,
            ..SessionConfig::default()
        });
        let t0 = Instant::now();

        let created = reg.create("abc".into(), t0).unwrap().expiry;
        assert_eq!(created, t0 + SessionConfig::MAX_LIFETIME);

        let t1 = t0 + MINUTE;
        reg.patch("abc", &name("ada"), t1).unwrap();
        assert_eq!(reg.find("abc").unwrap().expiry, t1 + SessionConfig::MAX_LIFETIME);
        assert!(reg.sweep(t1 + MINUTE).is_empty());
    }

    // =====================================================================
    // find()
    // =====================================================================

    #[test]
    fn test_find_unknown_returns_none() {
        let reg = registry();
        assert!(reg.find("missing").is_none());
    }

    #[test]
    fn test_find_returns_independent_copy() {
        let mut reg = registry();
        let t0 = Instant::now();
        reg.create("abc".into(), t0).unwrap();

        let mut copy = reg.find("abc").unwrap();
        copy.player_name = "mallory".into();

        assert_eq!(reg.find("abc").unwrap().player_name, "");
    }

    // =====================================================================
    // patch()
    // =====================================================================

    #[test]
    fn test_patch_applies_present_fields_and_renews_expiry() {
        let mut reg = registry();
        let t0 = Instant::now();
        reg.create("abc".into(), t0).unwrap();

        let t1 = t0 + Duration::from_secs(30);
        reg.patch(
            "abc",
            &SessionPatch {
                is_in_game: Some(true),
                game_instance: Some("g42".into()),
                player_name: None,
            },
            t1,
        )
        .expect("should succeed");

        let session = reg.find("abc").unwrap();
        assert!(session.is_in_game);
        assert_eq!(session.game_instance, "g42");
        assert_eq!(session.player_name, "");
        assert_eq!(session.expiry, t1 + MINUTE);
    }

    #[test]
    fn test_patch_heartbeat_only_renews_expiry() {
        let mut reg = registry();
        let t0 = Instant::now();
        reg.create("abc".into(), t0).unwrap();
        reg.patch("abc", &name("ada"), t0).unwrap();

        let t1 = t0 + Duration::from_secs(45);
        reg.patch("abc", &SessionPatch::default(), t1).unwrap();

        let session = reg.find("abc").unwrap();
        assert_eq!(session.player_name, "ada");
        assert_eq!(session.expiry, t1 + MINUTE);
    }

    #[test]
    fn test_patch_unknown_returns_not_found() {
        let mut reg = registry();

        let result = reg.patch("missing", &name("ada"), Instant::now());

        assert!(matches!(result, Err(SessionError::NotFound(t)) if t == "missing"));
        assert!(reg.is_empty());
    }

    // =====================================================================
    // sweep()
    // =====================================================================

    #[test]
    fn test_sweep_removes_expired_sessions() {
        let mut reg = registry();
        let t0 = Instant::now();
        reg.create("abc".into(), t0).unwrap();

        assert!(reg.sweep(t0 + Duration::from_secs(59)).is_empty());
        assert_eq!(reg.sweep(t0 + Duration::from_secs(61)), vec!["abc".to_owned()]);
        assert!(reg.find("abc").is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_sweep_removes_at_exact_expiry() {
        let mut reg = registry();
        let t0 = Instant::now();
        reg.create("abc".into(), t0).unwrap();

        assert_eq!(reg.sweep(t0 + MINUTE).len(), 1);
    }

    #[test]
    fn test_sweep_keeps_renewed_sessions() {
        let mut reg = registry();
        let t0 = Instant::now();
        reg.create("old".into(), t0).unwrap();
        reg.create("kept".into(), t0).unwrap();
        reg.patch("kept", &SessionPatch::default(), t0 + Duration::from_secs(50))
            .unwrap();

        let removed = reg.sweep(t0 + Duration::from_secs(61));

        assert_eq!(removed, vec!["old".to_owned()]);
        assert!(reg.find("kept").is_some());
    }

    #[test]
    fn test_sweep_retains_sessions_created_later() {
        let mut reg = registry();
        let t0 = Instant::now();
        reg.create("early".into(), t0).unwrap();
        reg.create("late".into(), t0 + Duration::from_secs(30)).unwrap();

        let removed = reg.sweep(t0 + Duration::from_secs(61));

        assert_eq!(removed, vec!["early".to_owned()]);
        assert_eq!(reg.find("late").unwrap().expiry, t0 + Duration::from_secs(90));
    }

    #[test]
    fn test_sweep_ignores_in_game_flag() {
        let mut reg = registry();
        let t0 = Instant::now();
        reg.create("abc".into(), t0).unwrap();
        reg.patch(
            "abc",
            &SessionPatch {
                is_in_game: Some(true),
                ..SessionPatch::default()
            },
            t0,
        )
        .unwrap();

        assert_eq!(reg.sweep(t0 + Duration::from_secs(61)).len(), 1);
    }

    #[test]
    fn test_swept_token_cannot_be_patched() {
        let mut reg = registry();
        let t0 = Instant::now();
        reg.create("abc".into(), t0).unwrap();
        reg.sweep(t0 + Duration::from_secs(61));

        let result = reg.patch("abc", &SessionPatch::default(), t0 + Duration::from_secs(62));

        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_sweep_on_empty_registry_returns_empty() {
        let mut reg = registry();
        assert!(reg.sweep(Instant::now()).is_empty());
    }
}
