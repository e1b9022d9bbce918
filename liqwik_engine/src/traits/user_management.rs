use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{OrgType, Role, User, UserRole},
    helpers::PasswordError,
    traits::{data_objects::RegistrationResult, NewRegistration, OrganizationError},
};

#[derive(Debug, Clone, Error)]
pub enum AuthApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Missing required fields")]
    MissingFields,
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Password must be at least 8 characters long")]
    PasswordTooShort,
    #[error("Invalid role. Must be 'seller' or 'buyer'")]
    InvalidRole,
    #[error("You are already registered as a {0} with this email")]
    AlreadyRegistered(Role),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Organization name already exists for {0}")]
    OrganizationNameTaken(OrgType),
    #[error("User not found")]
    UserNotFound,
    #[error("User role not found")]
    UserRoleNotFound,
    #[error("Email does not match user role")]
    EmailMismatch,
    #[error("This role has already been verified")]
    RoleAlreadyVerified,
    #[error("Invalid verification code")]
    InvalidVerificationCode,
    #[error("Verification code has expired. Please request a new one.")]
    VerificationCodeExpired,
    #[error("User account is inactive")]
    UserInactive,
    #[error("Email not verified")]
    EmailNotVerified,
    #[error("User not found or inactive")]
    OtpUserUnavailable,
    #[error("Invalid OTP code")]
    InvalidOtp,
    #[error("OTP code has expired")]
    OtpExpired,
    #[error("User does not have this role")]
    RoleNotOwned,
    #[error("This role has not been verified. Please verify your email for this role.")]
    RoleNotVerified,
    #[error("Role name does not match")]
    RoleMismatch,
    #[error("User has no verified roles")]
    NoVerifiedRoles,
    #[error("Not a first login")]
    NotFirstLogin,
    #[error("The {0} role cannot be granted by an administrator")]
    RoleNotGrantable(Role),
    #[error("User already has the {0} role")]
    RoleAlreadyGranted(Role),
    #[error("User cannot be deleted while they are the contact for an organization")]
    UserHasDependents,
    #[error("Password error: {0}")]
    PasswordError(String),
    #[error("{0}")]
    OrganizationError(#[from] OrganizationError),
}

impl From<sqlx::Error> for AuthApiError {
    fn from(e: sqlx::Error) -> Self {
        AuthApiError::DatabaseError(e.to_string())
    }
}

impl From<PasswordError> for AuthApiError {
    fn from(e: PasswordError) -> Self {
        AuthApiError::PasswordError(e.to_string())
    }
}

/// The `UserManagement` trait defines behaviour for managing users, their roles and the short-lived codes used to
/// verify them.
///
/// A user may hold several roles. Each [`UserRole`] is verified independently; the user's email counts as verified
/// once their first role is.
#[allow(async_fn_in_trait)]
pub trait UserManagement {
    async fn fetch_user_by_id(&self, user_id: i64) -> Result<Option<User>, AuthApiError>;

    /// Looks a user up by username or email.
    async fn fetch_user_by_login(&self, identifier: &str) -> Result<Option<User>, AuthApiError>;

    /// Returns the user that owns either the email or the username, if any.
    async fn fetch_user_by_email_or_username(&self, email: &str, username: &str)
        -> Result<Option<User>, AuthApiError>;

    async fn fetch_user_roles(&self, user_id: i64) -> Result<Vec<UserRole>, AuthApiError>;

    async fn fetch_user_role(&self, user_role_id: i64) -> Result<Option<UserRole>, AuthApiError>;

    /// Creates the user (if new), the user role and the organization in a single transaction.
    ///
    /// Fails with [`AuthApiError::AlreadyRegistered`] if the user already holds the role and with
    /// [`AuthApiError::OrganizationNameTaken`] if the organization name is in use for that organization type.
    async fn register_role(&self, registration: NewRegistration) -> Result<RegistrationResult, AuthApiError>;

    /// Overwrites the verification code of an unverified role.
    async fn update_role_verification_code(
        &self,
        user_role_id: i64,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthApiError>;

    /// Marks the role verified and clears its code. If this is the user's first verified role, the user's email is
    /// marked verified in the same transaction and `true` is returned.
    async fn mark_role_verified(&self, user_role_id: i64, at: DateTime<Utc>) -> Result<bool, AuthApiError>;

    /// Stores (or, with `None`, clears) the user's login one-time password.
    async fn set_login_otp(
        &self,
        user_id: i64,
        otp: Option<(&str, DateTime<Utc>)>,
    ) -> Result<(), AuthApiError>;

    async fn set_first_login(&self, user_id: i64, is_first_login: bool) -> Result<(), AuthApiError>;

    async fn fetch_all_users(&self) -> Result<Vec<User>, AuthApiError>;

    /// Returns the updated user, or `None` if the user does not exist.
    async fn set_user_active(&self, user_id: i64, active: bool) -> Result<Option<User>, AuthApiError>;

    /// Returns `false` if the user does not exist.
    async fn delete_user(&self, user_id: i64) -> Result<bool, AuthApiError>;

    /// Gives the user a role that needs no email verification.
    async fn grant_verified_role(&self, user_id: i64, role: Role, at: DateTime<Utc>) -> Result<UserRole, AuthApiError>;
}
