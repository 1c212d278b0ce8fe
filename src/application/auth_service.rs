// Authentication service - Operator login and the streaming session gate
use crate::application::ports::SessionGate;
use crate::domain::user::User;
use crate::infrastructure::password_hasher::PasswordHasher;
use chrono::Utc;
use std::sync::{PoisonError, RwLock};

pub const MISSING_CREDENTIALS: &str = "Please enter a username and password";
pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Result of a login attempt. Failures carry a message that is safe to show
/// and never tells an unknown user apart from a wrong password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub authenticated: bool,
    pub message: String,
}

impl AuthOutcome {
    fn success(full_name: &str) -> Self {
        Self {
            authenticated: true,
            message: format!("Welcome, {full_name}"),
        }
    }

    fn failure(message: &str) -> Self {
        Self {
            authenticated: false,
            message: message.to_string(),
        }
    }
}

/// Account to create at startup, with its plain-text password.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub role: String,
}

pub struct AuthenticationService {
    hasher: PasswordHasher,
    users: RwLock<Vec<User>>,
    current: RwLock<Option<User>>,
    // Verified against when the username is unknown, to keep timing uniform.
    decoy: (String, String),
}

impl AuthenticationService {
    pub fn new(hasher: PasswordHasher, accounts: Vec<NewUser>) -> Self {
        let users = accounts
            .into_iter()
            .map(|account| {
                let salt = hasher.generate_salt();
                User {
                    password_hash: hasher.hash_password(&account.password, &salt),
                    salt,
                    username: account.username,
                    full_name: account.full_name,
                    role: account.role,
                    last_login: None,
                }
            })
            .collect();

        let decoy_salt = hasher.generate_salt();
        let decoy_hash = hasher.hash_password(&hasher.generate_salt(), &decoy_salt);

        Self {
            hasher,
            users: RwLock::new(users),
            current: RwLock::new(None),
            decoy: (decoy_salt, decoy_hash),
        }
    }

    pub fn login(&self, username: &str, password: &str) -> AuthOutcome {
        if username.trim().is_empty() || password.trim().is_empty() {
            return AuthOutcome::failure(MISSING_CREDENTIALS);
        }

        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        let Some(user) = users.iter_mut().find(|u| u.username == username) else {
            let (salt, hash) = &self.decoy;
            let _ = self.hasher.verify_password(password, salt, hash);
            tracing::info!("Rejected login attempt");
            return AuthOutcome::failure(INVALID_CREDENTIALS);
        };

        if !self
            .hasher
            .verify_password(password, &user.salt, &user.password_hash)
        {
            tracing::info!("Rejected login attempt");
            return AuthOutcome::failure(INVALID_CREDENTIALS);
        }

        user.last_login = Some(Utc::now());
        let outcome = AuthOutcome::success(&user.full_name);
        tracing::info!("Operator {} logged in", user.username);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(user.clone());
        outcome
    }

    pub fn logout(&self) {
        if let Some(user) = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            tracing::info!("Operator {} logged out", user.username);
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn current_user(&self) -> Option<User> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionGate for AuthenticationService {
    fn is_session_active(&self) -> bool {
        self.is_authenticated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthenticationService {
        let hasher = PasswordHasher::new("test-pepper").unwrap();
        AuthenticationService::new(
            hasher,
            vec![NewUser {
                username: "admin".to_string(),
                password: "admin123".to_string(),
                full_name: "System Administrator".to_string(),
                role: "Administrator".to_string(),
            }],
        )
    }

    #[test]
    fn test_login_and_logout() {
        let auth = service();
        assert!(!auth.is_session_active());

        let outcome = auth.login("admin", "admin123");
        assert!(outcome.authenticated);
        assert!(auth.is_session_active());

        let user = auth.current_user().unwrap();
        assert_eq!(user.full_name, "System Administrator");
        assert!(user.last_login.is_some());

        auth.logout();
        assert!(!auth.is_authenticated());
        assert!(auth.current_user().is_none());
    }

    #[test]
    fn test_unknown_user_and_wrong_password_look_the_same() {
        let auth = service();
        let unknown = auth.login("operator", "admin123");
        let wrong = auth.login("admin", "admin124");

        assert!(!unknown.authenticated);
        assert!(!wrong.authenticated);
        assert_eq!(unknown, wrong);
        assert_eq!(wrong.message, INVALID_CREDENTIALS);
        assert!(!auth.is_authenticated());
    }

    #[test]
    fn test_blank_input_is_rejected_before_lookup() {
        let auth = service();
        assert_eq!(auth.login("", "admin123").message, MISSING_CREDENTIALS);
        assert_eq!(auth.login("admin", "   ").message, MISSING_CREDENTIALS);
    }

    #[test]
    fn test_stored_hash_is_not_the_password() {
        let auth = service();
        auth.login("admin", "admin123");
        let user = auth.current_user().unwrap();
        assert_ne!(user.password_hash, "admin123");
        assert!(!user.salt.is_empty());
    }
}
