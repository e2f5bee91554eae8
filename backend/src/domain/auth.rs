//! Session identity and account credential primitives.
//!
//! The authentication protocol itself lives outside this crate. The session
//! provider hands over an identity; everything here validates the values the
//! dispatch surfaces send before a port is involved.

use std::fmt;

use serde::Deserialize;
use zeroize::Zeroizing;

use super::user::{EmailAddress, Role, UserId, UserName, UserValidationError};

/// Minimum password length accepted for new accounts and password changes.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Domain error returned when account credentials are invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialValidationError {
    /// Name or email failed user validation.
    User(UserValidationError),
    /// Password shorter than [`MIN_PASSWORD_LENGTH`] characters.
    PasswordTooShort { min: usize },
    /// Confirmation differs from the new password.
    PasswordMismatch,
}

impl fmt::Display for CredentialValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(inner) => inner.fmt(f),
            Self::PasswordTooShort { min } => {
                write!(f, "password must be at least {min} characters")
            }
            Self::PasswordMismatch => write!(f, "passwords do not match"),
        }
    }
}

impl std::error::Error for CredentialValidationError {}

impl From<UserValidationError> for CredentialValidationError {
    fn from(value: UserValidationError) -> Self {
        Self::User(value)
    }
}

/// Authenticated identity supplied by the session provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    id: UserId,
    email: EmailAddress,
    role_claim: Option<Role>,
}

impl Identity {
    /// Identity without a server-issued role claim.
    pub fn new(id: UserId, email: EmailAddress) -> Self {
        Self {
            id,
            email,
            role_claim: None,
        }
    }

    /// Attach a role claim verified by the authentication layer.
    pub fn with_role_claim(mut self, role: Role) -> Self {
        self.role_claim = Some(role);
        self
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    pub fn role_claim(&self) -> Option<Role> {
        self.role_claim
    }
}

/// Session object as published by the session provider.
///
/// A signed-out client has no session at all, so callers hold an
/// `Option<Session>`.
///
/// # Examples
/// ```
/// use dispatch::domain::Session;
///
/// let session: Session = serde_json::from_str(
///     r#"{"user": {"id": "1", "email": "admin@tech.com"}}"#,
/// )
/// .unwrap();
/// assert_eq!(session.identity().email().as_ref(), "admin@tech.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    user: SessionUser,
    #[serde(default)]
    role: Option<Role>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct SessionUser {
    id: UserId,
    email: EmailAddress,
}

impl Session {
    /// Identity carried by the session, including any role claim.
    pub fn identity(&self) -> Identity {
        let identity = Identity::new(self.user.id.clone(), self.user.email.clone());
        match self.role {
            Some(role) => identity.with_role_claim(role),
            None => identity,
        }
    }
}

fn check_password_length(password: &str) -> Result<(), CredentialValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CredentialValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

/// Validated details for provisioning a technician account.
///
/// ## Invariants
/// - `name` is trimmed and non-empty.
/// - `email` is a lower-cased address.
/// - `password` has at least [`MIN_PASSWORD_LENGTH`] characters and is wiped
///   on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct NewTechnician {
    name: UserName,
    email: EmailAddress,
    password: Zeroizing<String>,
}

impl NewTechnician {
    /// Construct provisioning details from raw form inputs.
    pub fn try_from_parts(
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Self, CredentialValidationError> {
        let name = UserName::new(name)?;
        let email = EmailAddress::new(email)?;
        check_password_length(password)?;
        Ok(Self {
            name,
            email,
            password: Zeroizing::new(password.to_owned()),
        })
    }

    pub fn name(&self) -> &UserName {
        &self.name
    }

    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl fmt::Debug for NewTechnician {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewTechnician")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Check a password change form before it reaches the authentication layer.
pub fn validate_password_change(
    new_password: &str,
    confirmation: &str,
) -> Result<(), CredentialValidationError> {
    if new_password != confirmation {
        return Err(CredentialValidationError::PasswordMismatch);
    }
    check_password_length(new_password)
}
