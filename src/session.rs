//! Session boundary consumed by vote submission and page-level gating.
//!
//! The backend owns authentication; this module only answers "does the
//! caller currently hold a usable credential" and hands that credential to
//! the HTTP layer.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use parking_lot::Mutex;
use serde::Deserialize;

use crate::models::User;

/// Read-only view of the current session.
pub trait SessionProvider: Send + Sync {
    /// The bearer token, if one is held. Presence alone does not imply
    /// validity.
    fn token(&self) -> Option<String>;

    fn current_user(&self) -> Option<User>;

    /// True when a token is held and its `exp` claim has not passed.
    fn is_authenticated(&self) -> bool {
        self.token().is_some_and(|token| token_is_current(&token))
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[allow(dead_code)]
    sub: Option<String>,
    #[allow(dead_code)]
    exp: Option<u64>,
}

/// Local expiry check on the token's `exp` claim. The signature is not
/// verified; the server remains the authority and will reject a forged
/// token on submission.
fn token_is_current(token: &str) -> bool {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_aud = false;
    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation).is_ok()
}

#[derive(Default)]
struct SessionState {
    token: Option<String>,
    user: Option<User>,
}

/// Tab-scoped session storage. Holds the credential handed back by the
/// login flow; cleared on logout.
#[derive(Default)]
pub struct MemorySession {
    state: Mutex<SessionState>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, token: String, user: User) {
        let mut state = self.state.lock();
        state.token = Some(token);
        state.user = Some(user);
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.token = None;
        state.user = None;
    }
}

impl SessionProvider for MemorySession {
    fn token(&self) -> Option<String> {
        self.state.lock().token.clone()
    }

    fn current_user(&self) -> Option<User> {
        self.state.lock().user.clone()
    }
}
