use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{OrganizationDetails, Role, User, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub hashed_password: String,
}

/// Who is registering: someone new, or an existing user adding another role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegistrantUser {
    New(NewUser),
    Existing(i64),
}

/// Everything written by a registration. The backend stores it in one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRegistration {
    pub user: RegistrantUser,
    pub role: Role,
    pub org_name: String,
    pub org_address: String,
    pub org_details: OrganizationDetails,
    pub verification_code: String,
    pub code_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationResult {
    pub user: User,
    pub user_role: UserRole,
    pub org_id: i64,
}

/// The result of redeeming a single-use link token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenOutcome<T> {
    /// The token was redeemed by this call.
    Redeemed(T),
    /// The token had already been redeemed. Nothing was changed.
    AlreadyRedeemed(T),
}

impl<T> TokenOutcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            TokenOutcome::Redeemed(t) | TokenOutcome::AlreadyRedeemed(t) => t,
        }
    }

    pub fn was_redeemed(&self) -> bool {
        matches!(self, TokenOutcome::Redeemed(_))
    }
}
