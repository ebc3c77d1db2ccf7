//! User, address and authentication payload types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AddressId, Email, EmailError, UserId};

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Account role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Seller,
    Admin,
}

/// A saved shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    #[serde(flatten)]
    pub fields: AddressFields,
    #[serde(default)]
    pub is_default: bool,
}

/// Address fields sent when creating or editing an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressFields {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "IN".to_string()
}

/// The authenticated shopper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub addresses: Vec<Address>,
    /// Free-form preferences (newsletter opt-in, saved theme, ...).
    #[serde(default)]
    pub preferences: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// The address marked as default, or the first one.
    #[must_use]
    pub fn default_address(&self) -> Option<&Address> {
        self.addresses
            .iter()
            .find(|a| a.is_default)
            .or_else(|| self.addresses.first())
    }
}

// =============================================================================
// Auth payloads
// =============================================================================

/// Form validation failures, shown inline next to the field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error(transparent)]
    Email(#[from] EmailError),
    #[error("password must be at least 8 characters")]
    PasswordTooShort,
    #[error("name is required")]
    MissingName,
    #[error("phone number must have 10 digits")]
    InvalidPhone,
}

/// `POST /auth/login` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: Email,
    pub password: String,
}

impl LoginRequest {
    /// Validate raw form input.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] for a malformed email or empty password.
    pub fn new(email: &str, password: &str) -> Result<Self, CredentialError> {
        let email = Email::parse(email)?;
        if password.is_empty() {
            return Err(CredentialError::PasswordTooShort);
        }
        Ok(Self {
            email,
            password: password.to_string(),
        })
    }
}

/// `POST /auth/register` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: Email,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl RegisterRequest {
    /// Validate raw form input.
    ///
    /// # Errors
    ///
    /// Returns the first [`CredentialError`] found.
    pub fn new(
        name: &str,
        email: &str,
        password: &str,
        phone: Option<&str>,
    ) -> Result<Self, CredentialError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CredentialError::MissingName);
        }
        let email = Email::parse(email)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(CredentialError::PasswordTooShort);
        }
        let phone = phone.map(normalize_phone).transpose()?;
        Ok(Self {
            name: name.to_string(),
            email,
            password: password.to_string(),
            phone,
        })
    }
}

/// Strip formatting from a phone number and check it has 10 digits.
///
/// A leading `+91` or `0` trunk prefix is accepted and dropped.
///
/// # Errors
///
/// Returns [`CredentialError::InvalidPhone`] if 10 digits do not remain.
pub fn normalize_phone(raw: &str) -> Result<String, CredentialError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let national = match digits.len() {
        12 if digits.starts_with("91") => digits.get(2..),
        11 if digits.starts_with('0') => digits.get(1..),
        10 => Some(digits.as_str()),
        _ => None,
    };
    national
        .map(str::to_string)
        .ok_or(CredentialError::InvalidPhone)
}

/// `POST /auth/login` and `/auth/register` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

/// `GET /auth/session` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub valid: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// `PUT /auth/profile` body. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<serde_json::Value>,
}
