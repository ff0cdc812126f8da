//! Explicit session context.
//!
//! The signed-in user is carried as an owned context object handed to
//! every component that needs identity, created at sign-in and dropped
//! at sign-out. There is no ambient global user state.

use vicinity_shared::{LocationFix, UserProfile};

use crate::engine::EngineError;

/// The signed-in user's session.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserProfile,
}

impl Session {
    /// Establish a session from whatever the sign-in flow resolved.
    ///
    /// A missing identity is a fatal configuration error for every
    /// chat component: it is logged once here and nothing downstream
    /// retries (the user must exist before chat features start).
    pub fn sign_in(user: Option<UserProfile>) -> Result<Self, EngineError> {
        match user {
            Some(user) => {
                tracing::info!(user = user.id, username = %user.username, "session established");
                Ok(Self { user })
            }
            None => {
                tracing::error!("no resolved user identity, chat components stay offline");
                Err(EngineError::MissingIdentity)
            }
        }
    }

    /// The user's last known position, as recorded in the profile.
    pub fn position(&self) -> LocationFix {
        LocationFix::new(self.user.latitude, self.user.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn profile() -> UserProfile {
        UserProfile {
            id: 1,
            username: "ada".to_string(),
            image_url: "https://example.test/a.png".to_string(),
            latitude: 48.85,
            longitude: 2.35,
            visible: true,
            created_at: Utc::now(),
            last_active: Utc::now(),
        }
    }

    #[test]
    fn sign_in_requires_identity() {
        assert!(Session::sign_in(Some(profile())).is_ok());
        assert!(matches!(
            Session::sign_in(None),
            Err(EngineError::MissingIdentity)
        ));
    }
}
