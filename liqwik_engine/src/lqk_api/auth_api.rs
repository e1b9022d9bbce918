//! Registration, email verification, login one-time passwords and role selection.
use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{Role, User, UserRole},
    helpers::{
        generate_verification_code,
        hash_password,
        is_valid_email,
        verify_password,
        LOGIN_OTP_TTL_MINUTES,
        MIN_PASSWORD_LENGTH,
        REGISTRATION_CODE_TTL_HOURS,
        RESEND_CODE_TTL_MINUTES,
    },
    lqk_api::auth_objects::{
        GenerateOtpRequest,
        LoginRequest,
        LoginResponse,
        RegistrationRequest,
        RegistrationResponse,
        ResendVerificationRequest,
        RoleSummary,
        SessionInfo,
        SwitchRoleRequest,
        VerifyEmailRequest,
        VerifyEmailResponse,
        VerifyOtpRequest,
    },
    mailer::{deliver, EmailMessage, Mailer},
    traits::{AuthApiError, NewRegistration, NewUser, RegistrantUser, UserManagement},
};

pub struct AuthApi<B, M> {
    db: B,
    mailer: M,
}

impl<B: Debug, M> Debug for AuthApi<B, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthApi ({:?})", self.db)
    }
}

impl<B, M> AuthApi<B, M> {
    pub fn new(db: B, mailer: M) -> Self {
        Self { db, mailer }
    }
}

impl<B, M> AuthApi<B, M>
where
    B: UserManagement,
    M: Mailer,
{
    /// Registers a user in the seller or buyer role, creating the user first if the email and username are new.
    ///
    /// An existing user adding a second role must supply their current password. The user, role and organization are
    /// written together; the verification email is sent afterwards.
    pub async fn register(&self, req: RegistrationRequest) -> Result<RegistrationResponse, AuthApiError> {
        if !req.has_required_fields() {
            return Err(AuthApiError::MissingFields);
        }
        if !is_valid_email(&req.email) {
            return Err(AuthApiError::InvalidEmail);
        }
        if req.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthApiError::PasswordTooShort);
        }
        let role = match req.role.parse::<Role>() {
            Ok(r @ (Role::Seller | Role::Buyer)) => r,
            _ => return Err(AuthApiError::InvalidRole),
        };
        let existing = self.db.fetch_user_by_email_or_username(&req.email, &req.username).await?;
        let registrant = match existing {
            Some(user) => {
                let roles = self.db.fetch_user_roles(user.id).await?;
                if roles.iter().any(|r| r.role == role) {
                    return Err(AuthApiError::AlreadyRegistered(role));
                }
                if !verify_password(&req.password, &user.hashed_password).await? {
                    info!("🔄️🔐️ Existing user #{} tried to add the {role} role with the wrong password", user.id);
                    return Err(AuthApiError::InvalidCredentials);
                }
                RegistrantUser::Existing(user.id)
            },
            None => {
                let hashed_password = hash_password(&req.password).await?;
                RegistrantUser::New(NewUser {
                    first_name: req.first_name.trim().to_string(),
                    middle_name: req.middle_name.clone().filter(|s| !s.trim().is_empty()),
                    last_name: req.last_name.trim().to_string(),
                    username: req.username.trim().to_string(),
                    email: req.email.trim().to_string(),
                    phone: req.phone.clone().filter(|s| !s.trim().is_empty()),
                    hashed_password,
                })
            },
        };
        let is_new_user = matches!(registrant, RegistrantUser::New(_));
        let code = generate_verification_code();
        let registration = NewRegistration {
            user: registrant,
            role,
            org_name: req.organization_name.trim().to_string(),
            org_address: req.address.trim().to_string(),
            org_details: req.org_details(role),
            verification_code: code.clone(),
            code_expires_at: Utc::now() + Duration::hours(REGISTRATION_CODE_TTL_HOURS),
        };
        let result = self.db.register_role(registration).await?;
        info!(
            "🔄️🔐️ User #{} registered as {role} (user role #{}, organization #{})",
            result.user.id, result.user_role.id, result.org_id
        );
        let email = EmailMessage::verification(&result.user.email, &result.user.first_name, &code, role);
        deliver(&self.mailer, email).await;
        Ok(RegistrationResponse {
            message: "Registration successful. Please check your email for the verification code.".into(),
            user_id: result.user.id,
            user_role_id: result.user_role.id,
            email: result.user.email,
            role,
            requires_verification: true,
            is_new_user,
        })
    }

    /// Looks up a role awaiting verification, checking that it belongs to `email` and is not yet verified.
    async fn pending_role(&self, email: &str, user_role_id: i64) -> Result<(User, UserRole), AuthApiError> {
        let user_role = self.db.fetch_user_role(user_role_id).await?.ok_or(AuthApiError::UserRoleNotFound)?;
        let user = self.db.fetch_user_by_id(user_role.user_id).await?.ok_or(AuthApiError::UserRoleNotFound)?;
        if !user.email.eq_ignore_ascii_case(email.trim()) {
            return Err(AuthApiError::EmailMismatch);
        }
        if user_role.is_role_verified {
            return Err(AuthApiError::RoleAlreadyVerified);
        }
        Ok((user, user_role))
    }

    /// Verifies a role with the code emailed at registration. The first verified role also verifies the user's email,
    /// which triggers the welcome email.
    pub async fn verify_email(&self, req: VerifyEmailRequest) -> Result<VerifyEmailResponse, AuthApiError> {
        if req.email.trim().is_empty() || req.code.trim().is_empty() {
            return Err(AuthApiError::MissingFields);
        }
        let (user, user_role) = self.pending_role(&req.email, req.user_role_id).await?;
        // The code is compared before its expiry is considered.
        if user_role.role_verification_code.as_deref() != Some(req.code.trim()) {
            return Err(AuthApiError::InvalidVerificationCode);
        }
        let now = Utc::now();
        match user_role.role_verification_expires_at {
            Some(expires_at) if expires_at >= now => {},
            _ => return Err(AuthApiError::VerificationCodeExpired),
        }
        let first_verification = self.db.mark_role_verified(user_role.id, now).await?;
        info!("🔄️🔐️ User #{} verified the {} role (user role #{})", user.id, user_role.role, user_role.id);
        if first_verification {
            deliver(&self.mailer, EmailMessage::welcome(&user.email, &user.first_name, user_role.role)).await;
        }
        Ok(VerifyEmailResponse {
            message: "Email verified successfully".into(),
            user_id: user.id,
            user_role_id: user_role.id,
            role: user_role.role,
            email_verified: true,
        })
    }

    /// Replaces the verification code of an unverified role with a fresh, shorter-lived one and emails it.
    pub async fn resend_verification(&self, req: ResendVerificationRequest) -> Result<(), AuthApiError> {
        if req.email.trim().is_empty() {
            return Err(AuthApiError::MissingFields);
        }
        let (user, user_role) = self.pending_role(&req.email, req.user_role_id).await?;
        let code = generate_verification_code();
        let expires_at = Utc::now() + Duration::minutes(RESEND_CODE_TTL_MINUTES);
        self.db.update_role_verification_code(user_role.id, &code, expires_at).await?;
        debug!("🔄️🔐️ New verification code issued for user role #{}", user_role.id);
        deliver(&self.mailer, EmailMessage::verification(&user.email, &user.first_name, &code, user_role.role)).await;
        Ok(())
    }

    /// Checks the password and starts the one-time password step of the login.
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AuthApiError> {
        if req.identifier.trim().is_empty() || req.password.is_empty() {
            return Err(AuthApiError::MissingFields);
        }
        let user = self.db.fetch_user_by_login(req.identifier.trim()).await?.ok_or(AuthApiError::InvalidCredentials)?;
        if !verify_password(&req.password, &user.hashed_password).await? {
            debug!("🔄️🔐️ Failed login attempt for user #{}", user.id);
            return Err(AuthApiError::InvalidCredentials);
        }
        check_can_log_in(&user)?;
        self.issue_login_otp(&user).await?;
        let roles = self.db.fetch_user_roles(user.id).await?.iter().map(RoleSummary::from).collect();
        Ok(LoginResponse {
            message: "Login OTP sent to your email".into(),
            user_id: user.id,
            email: user.email,
            requires_otp: true,
            roles,
        })
    }

    /// Issues and emails a new login one-time password. The code always goes to the address on file.
    pub async fn generate_login_otp(&self, req: GenerateOtpRequest) -> Result<(), AuthApiError> {
        if req.email.trim().is_empty() {
            return Err(AuthApiError::MissingFields);
        }
        let user = self.db.fetch_user_by_id(req.user_id).await?.ok_or(AuthApiError::UserNotFound)?;
        check_can_log_in(&user)?;
        if !user.email.eq_ignore_ascii_case(req.email.trim()) {
            warn!("🔄️🔐️ OTP requested for user #{} with an email that is not on file", user.id);
        }
        self.issue_login_otp(&user).await
    }

    async fn issue_login_otp(&self, user: &User) -> Result<(), AuthApiError> {
        let otp = generate_verification_code();
        let expires_at = Utc::now() + Duration::minutes(LOGIN_OTP_TTL_MINUTES);
        self.db.set_login_otp(user.id, Some((&otp, expires_at))).await?;
        deliver(&self.mailer, EmailMessage::login_otp(&user.email, &user.first_name, &otp)).await;
        Ok(())
    }

    /// Completes the login. The one-time password is cleared on success, so it cannot be replayed.
    pub async fn verify_login_otp(&self, req: VerifyOtpRequest) -> Result<SessionInfo, AuthApiError> {
        if req.otp.trim().is_empty() {
            return Err(AuthApiError::MissingFields);
        }
        let user = match self.db.fetch_user_by_id(req.user_id).await? {
            Some(u) if u.is_active => u,
            _ => return Err(AuthApiError::OtpUserUnavailable),
        };
        if user.login_otp.as_deref() != Some(req.otp.trim()) {
            return Err(AuthApiError::InvalidOtp);
        }
        match user.login_otp_expires_at {
            Some(expires_at) if expires_at >= Utc::now() => {},
            _ => return Err(AuthApiError::OtpExpired),
        }
        self.db.set_login_otp(user.id, None).await?;
        let session = self.session_for(&user, req.selected_user_role_id).await?;
        info!("🔄️🔐️ User #{} logged in as {:?}", user.id, session.selected_role);
        Ok(session)
    }

    /// Re-issues the session for another of the user's verified roles.
    pub async fn switch_role(&self, user_id: i64, req: SwitchRoleRequest) -> Result<SessionInfo, AuthApiError> {
        let user_role = self.db.fetch_user_role(req.user_role_id).await?.ok_or(AuthApiError::UserRoleNotFound)?;
        if user_role.user_id != user_id {
            return Err(AuthApiError::RoleNotOwned);
        }
        if !user_role.is_role_verified {
            return Err(AuthApiError::RoleNotVerified);
        }
        if user_role.role != req.role {
            return Err(AuthApiError::RoleMismatch);
        }
        let user = self.db.fetch_user_by_id(user_id).await?.ok_or(AuthApiError::UserNotFound)?;
        let session = self.session_for(&user, Some(user_role.id)).await?;
        debug!("🔄️🔐️ User #{user_id} switched to the {} role", user_role.role);
        Ok(session)
    }

    /// Builds the session for `user`. The requested role must be owned and verified; without one, the first verified
    /// role is selected.
    pub async fn session_for(&self, user: &User, selected_user_role_id: Option<i64>) -> Result<SessionInfo, AuthApiError> {
        let user_roles = self.db.fetch_user_roles(user.id).await?;
        let verified = user_roles.iter().filter(|r| r.is_role_verified).collect::<Vec<_>>();
        let selected = match selected_user_role_id {
            Some(id) => {
                let role = user_roles.iter().find(|r| r.id == id).ok_or(AuthApiError::RoleNotOwned)?;
                if !role.is_role_verified {
                    return Err(AuthApiError::RoleNotVerified);
                }
                Some(role)
            },
            None => verified.first().copied(),
        };
        if verified.is_empty() {
            return Err(AuthApiError::NoVerifiedRoles);
        }
        Ok(SessionInfo {
            user_id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            roles: verified.iter().map(|r| r.role).collect(),
            selected_role: selected.map(|r| r.role),
            selected_user_role_id: selected.map(|r| r.id),
        })
    }

    pub async fn check_first_login(&self, user_id: i64) -> Result<bool, AuthApiError> {
        let user = self.db.fetch_user_by_id(user_id).await?.ok_or(AuthApiError::UserNotFound)?;
        Ok(user.is_first_login)
    }

    pub async fn mark_not_first_login(&self, user_id: i64) -> Result<(), AuthApiError> {
        self.db.fetch_user_by_id(user_id).await?.ok_or(AuthApiError::UserNotFound)?;
        self.db.set_first_login(user_id, false).await
    }

    /// Emails the first-login greeting. Only valid while the first-login flag is still set.
    pub async fn send_first_login_success(&self, user_id: i64) -> Result<(), AuthApiError> {
        let user = self.db.fetch_user_by_id(user_id).await?.ok_or(AuthApiError::UserNotFound)?;
        if !user.is_first_login {
            return Err(AuthApiError::NotFirstLogin);
        }
        deliver(&self.mailer, EmailMessage::first_login_success(&user.email, &user.first_name)).await;
        Ok(())
    }
}

fn check_can_log_in(user: &User) -> Result<(), AuthApiError> {
    if !user.is_active {
        return Err(AuthApiError::UserInactive);
    }
    if !user.is_email_verified {
        return Err(AuthApiError::EmailNotVerified);
    }
    Ok(())
}
