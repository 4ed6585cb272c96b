//! The signed-in user, shared between the API client and the account store.
//!
//! The session holds only `Option<User>`; "authenticated" is derived from it
//! and cannot disagree with it. The user is mirrored to storage so a restart
//! shows the last known user until the startup check confirms or clears it.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::User;
use crate::storage::{Storage, keys, load_versioned, remove_logged, save_versioned};

const SCHEMA_VERSION: u32 = 1;

/// A point-in-time copy of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    user: Option<User>,
}

impl Session {
    /// An anonymous session.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { user: None }
    }

    /// A session for `user`.
    #[must_use]
    pub const fn authenticated(user: User) -> Self {
        Self { user: Some(user) }
    }

    /// The signed-in user.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Whether a user is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Shared handle to the live session.
#[derive(Clone)]
pub struct SessionState {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    user: RwLock<Option<User>>,
    storage: Arc<dyn Storage>,
}

impl SessionState {
    /// Restore the last persisted user, if any.
    #[must_use]
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let user = load_versioned::<Session>(storage.as_ref(), keys::SESSION, SCHEMA_VERSION)
            .and_then(|s| s.user);
        if let Some(user) = &user {
            debug!(user_id = %user.id, "Restored persisted session");
        }
        Self {
            inner: Arc::new(SessionInner {
                user: RwLock::new(user),
                storage,
            }),
        }
    }

    /// Copy the current session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        Session {
            user: self.inner.user.read().clone(),
        }
    }

    /// The signed-in user.
    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.inner.user.read().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.user.read().is_some()
    }

    /// Sign `user` in and persist.
    pub fn set_user(&self, user: User) {
        let session = Session::authenticated(user);
        save_versioned(
            self.inner.storage.as_ref(),
            keys::SESSION,
            SCHEMA_VERSION,
            &session,
        );
        *self.inner.user.write() = session.user;
    }

    /// Sign out locally and forget the persisted user.
    pub fn clear(&self) {
        *self.inner.user.write() = None;
        remove_logged(self.inner.storage.as_ref(), keys::SESSION);
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("user", &*self.inner.user.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use bazaar_core::{Email, UserId};

    use super::*;
    use crate::storage::MemoryStorage;

    pub(crate) fn sample_user() -> User {
        User {
            id: UserId::new("u1"),
            name: "Asha Rao".to_string(),
            email: Email::parse("asha@example.com").unwrap(),
            phone: None,
        }
    }

    #[test]
    fn test_authenticated_is_derived_from_user() {
        let anonymous = Session::anonymous();
        assert!(!anonymous.is_authenticated());
        assert!(anonymous.user().is_none());

        let session = Session::authenticated(sample_user());
        assert!(session.is_authenticated());
        assert_eq!(session.user().unwrap().name, "Asha Rao");
    }

    #[test]
    fn test_set_and_clear_persist() {
        let storage = Arc::new(MemoryStorage::new());
        let state = SessionState::load(storage.clone());
        assert!(!state.is_authenticated());

        state.set_user(sample_user());
        assert!(state.snapshot().is_authenticated());
        assert!(storage.contains(keys::SESSION));

        let restored = SessionState::load(storage.clone());
        assert_eq!(restored.user(), Some(sample_user()));

        restored.clear();
        assert!(!restored.is_authenticated());
        assert!(!storage.contains(keys::SESSION));
    }
}
