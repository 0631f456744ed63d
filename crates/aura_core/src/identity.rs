//! Session identity supplied by the host's sign-in flow.
//!
//! # Responsibility
//! - Model the signed-in user as an opaque identity.
//! - Let persistence ask "who is acting" without importing auth details.
//!
//! # Invariants
//! - A blank user id is never a live identity.

use std::sync::{PoisonError, RwLock};

/// Opaque identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    user_id: String,
}

impl Identity {
    /// Returns `None` for blank ids.
    pub fn new(user_id: impl Into<String>) -> Option<Self> {
        let user_id = user_id.into().trim().to_string();
        if user_id.is_empty() {
            return None;
        }
        Some(Self { user_id })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Source of the current identity.
pub trait IdentityProvider {
    fn current_identity(&self) -> Option<Identity>;
}

/// Sign-in slot filled and cleared by the host application.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    current: RwLock<Option<Identity>>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self {
            current: RwLock::new(Some(identity)),
        }
    }

    pub fn sign_in(&self, identity: Identity) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(identity);
    }

    pub fn sign_out(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_identity(&self) -> Option<Identity> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl IdentityProvider for Identity {
    fn current_identity(&self) -> Option<Identity> {
        Some(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{Identity, IdentityProvider, SessionIdentity};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn blank_user_id_is_not_an_identity() {
        assert!(Identity::new("   ").is_none());
        assert_eq!(Identity::new(" u-1 ").unwrap().user_id(), "u-1");
    }

    #[test]
    fn session_tracks_sign_in_and_out() {
        let session = SessionIdentity::new();
        assert!(session.current_identity().is_none());
        session.sign_in(Identity::new("u-1").unwrap());
        assert_eq!(session.current_identity().unwrap().user_id(), "u-1");
        session.sign_out();
        assert!(session.current_identity().is_none());
    }

    #[test]
    fn sign_out_survives_a_poisoned_slot() {
        let session = Arc::new(SessionIdentity::signed_in(Identity::new("u-1").unwrap()));
        let poisoner = Arc::clone(&session);
        let _ = thread::spawn(move || {
            let _guard = poisoner.current.write().unwrap();
            panic!("poison the session slot");
        })
        .join();
        assert!(session.current.is_poisoned());

        session.sign_out();
        assert!(session.current_identity().is_none());
        session.sign_in(Identity::new("u-2").unwrap());
        assert_eq!(session.current_identity().unwrap().user_id(), "u-2");
    }
}
