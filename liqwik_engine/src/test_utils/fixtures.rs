use chrono::{Duration, Utc};

use crate::{
    db_types::{BillToParty, BuyerKyb, NewBillToParty, OrganizationDetails, Role, SellerKyb, User, UserRole},
    helpers::hash_password,
    traits::{NewRegistration, NewUser, OrganizationManagement, RegistrantUser, UserManagement},
    SqliteDatabase,
};

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// A verified user holding one marketplace role, with the organization registered alongside it.
#[derive(Debug, Clone)]
pub struct TestParticipant {
    pub user: User,
    pub user_role: UserRole,
    pub org_id: i64,
}

impl TestParticipant {
    pub fn id(&self) -> i64 {
        self.user.id
    }
}

/// Registers `username` in `role` (seller or buyer) and marks the role verified, skipping the email round trip.
pub async fn create_user_with_role(db: &SqliteDatabase, username: &str, role: Role) -> TestParticipant {
    let hashed_password = hash_password(TEST_PASSWORD).await.expect("Could not hash password");
    let org_details = match role {
        Role::Buyer => OrganizationDetails::Buyer(BuyerKyb::default()),
        _ => OrganizationDetails::Seller(SellerKyb::default()),
    };
    let registration = NewRegistration {
        user: RegistrantUser::New(NewUser {
            first_name: capitalise(username),
            middle_name: None,
            last_name: "Tester".into(),
            username: username.into(),
            email: format!("{username}@example.com"),
            phone: None,
            hashed_password,
        }),
        role,
        org_name: format!("{} Holdings", capitalise(username)),
        org_address: "1 Market Street".into(),
        org_details,
        verification_code: "123456".into(),
        code_expires_at: Utc::now() + Duration::hours(1),
    };
    let result = db.register_role(registration).await.expect("Could not register test user");
    db.mark_role_verified(result.user_role.id, Utc::now()).await.expect("Could not verify test user");
    let user = db.fetch_user_by_id(result.user.id).await.expect("DB error").expect("Test user vanished");
    let user_role = db.fetch_user_role(result.user_role.id).await.expect("DB error").expect("Test role vanished");
    TestParticipant { user, user_role, org_id: result.org_id }
}

/// Gives an existing user an administrator-granted role, already verified.
pub async fn grant_role(db: &SqliteDatabase, user_id: i64, role: Role) -> UserRole {
    db.grant_verified_role(user_id, role, Utc::now()).await.expect("Could not grant role")
}

pub async fn create_bill_to_party(db: &SqliteDatabase, name: &str, contact_id: Option<i64>) -> BillToParty {
    let email = format!("accounts@{}.example.com", name.to_lowercase().replace(' ', "-"));
    let btp = NewBillToParty { name: name.into(), email, address: Some("2 Ledger Lane".into()), contact_id };
    db.create_bill_to_party(btp).await.expect("Could not create bill-to party")
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
