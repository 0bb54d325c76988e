use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// The signed-in user, as returned by `GET /api/v1/user`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub org_id: String,
    #[serde(default)]
    pub org_name: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    /// `admin` or `regular`.
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.user_type.as_deref() == Some("admin")
    }

    /// Name shown in the header, falls back to the email and then the id.
    pub fn display_name(&self) -> &str {
        [&self.user_name, &self.email, &self.user_id]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or("unknown")
    }
}

/// Authenticated session context.
///
/// Built once at start-up and shared (behind an `Arc`) with the API client and
/// every view that needs the user. It is written when the user is fetched and
/// expired exactly once when the API answers `401`.
#[derive(Debug)]
pub struct Session {
    portal_url: String,
    user: RwLock<Option<User>>,
    expired: AtomicBool,
}

impl Session {
    pub fn new(portal_url: &str) -> Self {
        Self {
            portal_url: portal_url.trim_end_matches('/').to_string(),
            user: RwLock::new(None),
            expired: AtomicBool::new(false),
        }
    }

    /// Store the user and clear any previous expiry.
    pub fn sign_in(&self, user: User) {
        match self.user.write() {
            Ok(mut guard) => *guard = Some(user),
            Err(poisoned) => *poisoned.into_inner() = Some(user),
        }
        self.expired.store(false, Ordering::SeqCst);
    }

    /// Drop the user and mark the session expired.
    ///
    /// Returns `true` only for the call that actually expired the session.
    pub fn expire(&self) -> bool {
        match self.user.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
        !self.expired.swap(true, Ordering::SeqCst)
    }

    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    pub fn user(&self) -> Option<User> {
        match self.user.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// External sign-in URL, carrying the portal as the post-login redirect target.
    pub fn login_url(&self) -> String {
        let redirect = format!("{}/portal/", self.portal_url);
        let encoded: String = url::form_urlencoded::byte_serialize(redirect.as_bytes()).collect();
        format!("{}/sign-in?redirect={}", self.portal_url, encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        serde_json::from_str(r#"{"user_id": "u-1", "user_name": "ops", "user_type": "admin"}"#)
            .unwrap()
    }

    #[test]
    fn test_user_display_name() {
        let user = user();
        assert!(user.is_admin());
        assert_eq!(user.display_name(), "ops");

        let anonymous: User = serde_json::from_str(r#"{"user_id": "u-2"}"#).unwrap();
        assert!(!anonymous.is_admin());
        assert_eq!(anonymous.display_name(), "u-2");
    }

    #[test]
    fn test_session_lifecycle() {
        let session = Session::new("https://wavespeed.ai/");
        assert!(session.user().is_none());
        assert!(!session.is_expired());

        session.sign_in(user());
        assert_eq!(session.user().unwrap().user_name, "ops");

        // only the first expiry reports a transition
        assert!(session.expire());
        assert!(!session.expire());
        assert!(session.is_expired());
        assert!(session.user().is_none());

        session.sign_in(user());
        assert!(!session.is_expired());
    }

    #[test]
    fn test_login_url() {
        let session = Session::new("https://wavespeed.ai/");
        assert_eq!(
            session.login_url(),
            "https://wavespeed.ai/sign-in?redirect=https%3A%2F%2Fwavespeed.ai%2Fportal%2F"
        );
    }
}
