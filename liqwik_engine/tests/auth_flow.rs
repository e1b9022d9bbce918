use chrono::{Duration, Utc};
use liqwik_engine::{
    auth_objects::{
        GenerateOtpRequest,
        LoginRequest,
        RegistrationRequest,
        ResendVerificationRequest,
        SwitchRoleRequest,
        VerifyEmailRequest,
        VerifyOtpRequest,
    },
    db_types::Role,
    mailer::EmailKind,
    traits::{AuthApiError, UserManagement},
};

mod support;

use support::Marketplace;

fn registration(username: &str, role: &str) -> RegistrationRequest {
    RegistrationRequest {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        username: username.into(),
        email: format!("{username}@example.com"),
        password: "analytical-engine".into(),
        role: role.into(),
        organization_name: format!("{username} {role} org"),
        address: "12 St James's Square".into(),
        legal_business_name: Some("Lovelace Ltd".into()),
        ..Default::default()
    }
}

async fn verification_code(mkt: &Marketplace, user_role_id: i64) -> String {
    let role = mkt.db.fetch_user_role(user_role_id).await.unwrap().unwrap();
    role.role_verification_code.expect("No verification code issued")
}

async fn login_otp(mkt: &Marketplace, user_id: i64) -> String {
    let user = mkt.db.fetch_user_by_id(user_id).await.unwrap().unwrap();
    user.login_otp.expect("No login OTP issued")
}

#[tokio::test]
async fn register_verify_and_log_in() {
    let mkt = Marketplace::new().await;
    let res = mkt.auth.register(registration("ada", "seller")).await.unwrap();
    assert!(res.is_new_user);
    assert!(res.requires_verification);
    assert_eq!(res.role, Role::Seller);
    assert_eq!(mkt.mailer.sent_of_kind(EmailKind::Verification).len(), 1);

    // Login is refused until the email is verified
    let login = LoginRequest { identifier: "ada".into(), password: "analytical-engine".into() };
    let err = mkt.auth.login(login.clone()).await.unwrap_err();
    assert!(matches!(err, AuthApiError::EmailNotVerified), "{err:?}");

    let code = verification_code(&mkt, res.user_role_id).await;
    let verified = mkt
        .auth
        .verify_email(VerifyEmailRequest { email: "ADA@example.com".into(), user_role_id: res.user_role_id, code })
        .await
        .unwrap();
    assert!(verified.email_verified);
    assert_eq!(mkt.mailer.sent_of_kind(EmailKind::Welcome).len(), 1);

    let login_res = mkt.auth.login(login).await.unwrap();
    assert!(login_res.requires_otp);
    assert_eq!(login_res.roles.len(), 1);
    assert!(login_res.roles[0].verified);
    assert_eq!(mkt.mailer.sent_of_kind(EmailKind::LoginOtp).len(), 1);

    let otp = login_otp(&mkt, res.user_id).await;
    let req = VerifyOtpRequest { user_id: res.user_id, otp: otp.clone(), selected_user_role_id: None };
    let session = mkt.auth.verify_login_otp(req.clone()).await.unwrap();
    assert_eq!(session.selected_role, Some(Role::Seller));
    assert_eq!(session.selected_user_role_id, Some(res.user_role_id));
    assert_eq!(session.roles, vec![Role::Seller]);

    // The OTP is single use
    let err = mkt.auth.verify_login_otp(req).await.unwrap_err();
    assert!(matches!(err, AuthApiError::InvalidOtp), "{err:?}");
    mkt.tear_down().await;
}

#[tokio::test]
async fn wrong_code_is_reported_before_expiry() {
    let mkt = Marketplace::new().await;
    let res = mkt.auth.register(registration("grace", "buyer")).await.unwrap();
    let req = VerifyEmailRequest { email: "grace@example.com".into(), user_role_id: res.user_role_id, code: "000000x".into() };
    let err = mkt.auth.verify_email(req).await.unwrap_err();
    assert!(matches!(err, AuthApiError::InvalidVerificationCode), "{err:?}");

    let req = VerifyEmailRequest { email: "someone@else.com".into(), user_role_id: res.user_role_id, code: "1".into() };
    let err = mkt.auth.verify_email(req).await.unwrap_err();
    assert!(matches!(err, AuthApiError::EmailMismatch), "{err:?}");
    mkt.tear_down().await;
}

#[tokio::test]
async fn matching_code_past_its_expiry_is_refused() {
    let mkt = Marketplace::new().await;
    let res = mkt.auth.register(registration("grace", "buyer")).await.unwrap();
    let expired = Utc::now() - Duration::minutes(1);
    mkt.db.update_role_verification_code(res.user_role_id, "314159", expired).await.unwrap();

    // A wrong code is still reported as wrong
    let req = VerifyEmailRequest { email: "grace@example.com".into(), user_role_id: res.user_role_id, code: "271828".into() };
    let err = mkt.auth.verify_email(req).await.unwrap_err();
    assert!(matches!(err, AuthApiError::InvalidVerificationCode), "{err:?}");
    let req = VerifyEmailRequest { email: "grace@example.com".into(), user_role_id: res.user_role_id, code: "314159".into() };
    let err = mkt.auth.verify_email(req).await.unwrap_err();
    assert!(matches!(err, AuthApiError::VerificationCodeExpired), "{err:?}");
    let role = mkt.db.fetch_user_role(res.user_role_id).await.unwrap().unwrap();
    assert!(!role.is_role_verified);
    assert_eq!(mkt.mailer.sent_of_kind(EmailKind::Welcome).len(), 0);

    // A fresh code gets the user through
    let resend = ResendVerificationRequest { email: "grace@example.com".into(), user_role_id: res.user_role_id };
    mkt.auth.resend_verification(resend).await.unwrap();
    let code = verification_code(&mkt, res.user_role_id).await;
    let req = VerifyEmailRequest { email: "grace@example.com".into(), user_role_id: res.user_role_id, code };
    mkt.auth.verify_email(req).await.unwrap();
    mkt.tear_down().await;
}

#[tokio::test]
async fn verified_roles_cannot_be_verified_or_resent_again() {
    let mkt = Marketplace::new().await;
    let res = mkt.auth.register(registration("hedy", "seller")).await.unwrap();
    let code = verification_code(&mkt, res.user_role_id).await;
    let req = VerifyEmailRequest { email: "hedy@example.com".into(), user_role_id: res.user_role_id, code };
    mkt.auth.verify_email(req.clone()).await.unwrap();

    let err = mkt.auth.verify_email(req).await.unwrap_err();
    assert!(matches!(err, AuthApiError::RoleAlreadyVerified), "{err:?}");
    let resend = ResendVerificationRequest { email: "hedy@example.com".into(), user_role_id: res.user_role_id };
    let err = mkt.auth.resend_verification(resend).await.unwrap_err();
    assert!(matches!(err, AuthApiError::RoleAlreadyVerified), "{err:?}");
    assert_eq!(mkt.mailer.sent_of_kind(EmailKind::Verification).len(), 1);
    assert_eq!(mkt.mailer.sent_of_kind(EmailKind::Welcome).len(), 1);
    mkt.tear_down().await;
}

#[tokio::test]
async fn expired_login_otp_is_refused() {
    let mkt = Marketplace::new().await;
    let res = mkt.auth.register(registration("radia", "buyer")).await.unwrap();
    let code = verification_code(&mkt, res.user_role_id).await;
    let req = VerifyEmailRequest { email: "radia@example.com".into(), user_role_id: res.user_role_id, code };
    mkt.auth.verify_email(req).await.unwrap();
    mkt.db.set_login_otp(res.user_id, Some(("654321", Utc::now() - Duration::seconds(1)))).await.unwrap();

    let req = VerifyOtpRequest { user_id: res.user_id, otp: "123456".into(), selected_user_role_id: None };
    let err = mkt.auth.verify_login_otp(req).await.unwrap_err();
    assert!(matches!(err, AuthApiError::InvalidOtp), "{err:?}");
    let req = VerifyOtpRequest { user_id: res.user_id, otp: "654321".into(), selected_user_role_id: None };
    let err = mkt.auth.verify_login_otp(req.clone()).await.unwrap_err();
    assert!(matches!(err, AuthApiError::OtpExpired), "{err:?}");

    mkt.db.set_login_otp(res.user_id, Some(("654321", Utc::now() + Duration::minutes(5)))).await.unwrap();
    let session = mkt.auth.verify_login_otp(req).await.unwrap();
    assert_eq!(session.selected_role, Some(Role::Buyer));
    mkt.tear_down().await;
}

#[tokio::test]
async fn resending_replaces_the_code() {
    let mkt = Marketplace::new().await;
    let res = mkt.auth.register(registration("alan", "seller")).await.unwrap();
    let first = verification_code(&mkt, res.user_role_id).await;
    mkt.auth
        .resend_verification(ResendVerificationRequest { email: "alan@example.com".into(), user_role_id: res.user_role_id })
        .await
        .unwrap();
    assert_eq!(mkt.mailer.sent_of_kind(EmailKind::Verification).len(), 2);
    let second = verification_code(&mkt, res.user_role_id).await;
    let role = mkt.db.fetch_user_role(res.user_role_id).await.unwrap().unwrap();
    let expires = role.role_verification_expires_at.unwrap();
    assert!(expires <= Utc::now() + Duration::minutes(15));
    if first != second {
        let req = VerifyEmailRequest { email: "alan@example.com".into(), user_role_id: res.user_role_id, code: first };
        assert!(mkt.auth.verify_email(req).await.is_err());
    }
    let req = VerifyEmailRequest { email: "alan@example.com".into(), user_role_id: res.user_role_id, code: second };
    mkt.auth.verify_email(req).await.unwrap();
    mkt.tear_down().await;
}

#[tokio::test]
async fn duplicate_and_second_role_registration() {
    let mkt = Marketplace::new().await;
    let first = mkt.auth.register(registration("linus", "seller")).await.unwrap();

    let err = mkt.auth.register(registration("linus", "seller")).await.unwrap_err();
    assert!(matches!(err, AuthApiError::AlreadyRegistered(Role::Seller)), "{err:?}");

    let mut wrong_password = registration("linus", "buyer");
    wrong_password.password = "not-the-password".into();
    let err = mkt.auth.register(wrong_password).await.unwrap_err();
    assert!(matches!(err, AuthApiError::InvalidCredentials), "{err:?}");

    let second = mkt.auth.register(registration("linus", "buyer")).await.unwrap();
    assert!(!second.is_new_user);
    assert_eq!(second.user_id, first.user_id);
    assert_ne!(second.user_role_id, first.user_role_id);

    // Verify both roles. Only the first verification sends a welcome email.
    for id in [first.user_role_id, second.user_role_id] {
        let code = verification_code(&mkt, id).await;
        let req = VerifyEmailRequest { email: "linus@example.com".into(), user_role_id: id, code };
        mkt.auth.verify_email(req).await.unwrap();
    }
    assert_eq!(mkt.mailer.sent_of_kind(EmailKind::Welcome).len(), 1);

    mkt.auth.generate_login_otp(GenerateOtpRequest { user_id: first.user_id, email: "linus@example.com".into() }).await.unwrap();
    let otp = login_otp(&mkt, first.user_id).await;
    let req = VerifyOtpRequest { user_id: first.user_id, otp, selected_user_role_id: Some(second.user_role_id) };
    let session = mkt.auth.verify_login_otp(req).await.unwrap();
    assert_eq!(session.selected_role, Some(Role::Buyer));
    assert_eq!(session.roles.len(), 2);

    let switched = mkt
        .auth
        .switch_role(first.user_id, SwitchRoleRequest { user_role_id: first.user_role_id, role: Role::Seller })
        .await
        .unwrap();
    assert_eq!(switched.selected_role, Some(Role::Seller));
    let err = mkt
        .auth
        .switch_role(first.user_id, SwitchRoleRequest { user_role_id: first.user_role_id, role: Role::Buyer })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthApiError::RoleMismatch), "{err:?}");
    mkt.tear_down().await;
}

#[tokio::test]
async fn registration_validation() {
    let mkt = Marketplace::new().await;
    let mut req = registration("x", "seller");
    req.organization_name = String::new();
    assert!(matches!(mkt.auth.register(req).await, Err(AuthApiError::MissingFields)));
    let mut req = registration("x", "seller");
    req.email = "not-an-email".into();
    assert!(matches!(mkt.auth.register(req).await, Err(AuthApiError::InvalidEmail)));
    let mut req = registration("x", "seller");
    req.password = "short".into();
    assert!(matches!(mkt.auth.register(req).await, Err(AuthApiError::PasswordTooShort)));
    let req = registration("x", "admin");
    assert!(matches!(mkt.auth.register(req).await, Err(AuthApiError::InvalidRole)));
    assert!(mkt.mailer.sent().is_empty());
    mkt.tear_down().await;
}

#[tokio::test]
async fn first_login_flag() {
    let mkt = Marketplace::new().await;
    let seller = mkt.seller("hopper").await;
    assert!(mkt.auth.check_first_login(seller.id()).await.unwrap());
    mkt.auth.send_first_login_success(seller.id()).await.unwrap();
    assert_eq!(mkt.mailer.sent_of_kind(EmailKind::FirstLoginSuccess).len(), 1);
    mkt.auth.mark_not_first_login(seller.id()).await.unwrap();
    assert!(!mkt.auth.check_first_login(seller.id()).await.unwrap());
    let err = mkt.auth.send_first_login_success(seller.id()).await.unwrap_err();
    assert!(matches!(err, AuthApiError::NotFirstLogin), "{err:?}");
    mkt.tear_down().await;
}

#[tokio::test]
async fn inactive_users_cannot_log_in() {
    let mkt = Marketplace::new().await;
    let seller = mkt.seller("dijkstra").await;
    mkt.admin.set_user_active(seller.id(), false).await.unwrap();
    let login = LoginRequest { identifier: "dijkstra@example.com".into(), password: liqwik_engine::test_utils::TEST_PASSWORD.into() };
    let err = mkt.auth.login(login).await.unwrap_err();
    assert!(matches!(err, AuthApiError::UserInactive), "{err:?}");
    mkt.tear_down().await;
}
