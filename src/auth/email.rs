//! Email/password sign-in input checks.

use crate::auth::error::{AuthError, AuthResult};

pub const EMAIL_PROVIDER_ID: &str = "password";

/// Loose shape check: one `@`, no whitespace, and a dot inside the domain.
///
/// The provider does the real validation; this only catches typos before a
/// round trip.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let clean = |part: &str| {
        !part.is_empty() && !part.contains(|c: char| c == '@' || c.is_whitespace())
    };
    if !clean(local) || !clean(domain) {
        return false;
    }
    domain
        .char_indices()
        .any(|(index, c)| c == '.' && index > 0 && index + 1 < domain.len())
}

/// Checks the form input and returns the trimmed email.
pub fn validate_email_sign_in<'a>(email: &'a str, password: &str) -> AuthResult<&'a str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::provider("auth/missing-email", "Email is required."));
    }
    if password.is_empty() {
        return Err(AuthError::provider("auth/missing-password", "Password is required."));
    }
    if !is_valid_email(email) {
        return Err(AuthError::provider("auth/invalid-email", "Email address is malformed."));
    }
    Ok(email)
}
