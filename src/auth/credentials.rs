use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::models::User;
use crate::repository::{StoreResult, UserRepository};

use super::password;

/// Checks email/password pairs against stored user records.
#[derive(Clone)]
pub struct CredentialVerifier {
    users: Arc<dyn UserRepository>,
}

impl CredentialVerifier {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Returns the matching user, or `None` when the email is unknown or the
    /// password does not match. Only store faults are errors.
    pub async fn verify(&self, email: &str, password: &str) -> StoreResult<Option<User>> {
        let Some(user) = self.users.find_by_email(email).await? else {
            return Ok(None);
        };
        if password::verify_password(password, &user.password_hash) {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }
}

/// Decodes an `Authorization: Basic base64(email:password)` header value.
///
/// Anything that is not exactly a `Basic` scheme with a base64 payload holding one
/// `:`-separated email/password pair yields `None`.
pub fn decode_basic_credentials(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let mut segments = decoded.split(':');
    let email = segments.next()?;
    let password = segments.next()?;
    if segments.next().is_some() || email.is_empty() {
        return None;
    }
    Some((email.to_string(), password.to_string()))
}
