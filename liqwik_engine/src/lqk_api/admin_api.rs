//! User administration and the bill-to party directory.
use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{BillToParty, NewBillToParty, Role, User, UserRole},
    helpers::is_valid_email,
    traits::{AuthApiError, OrganizationManagement, UserManagement},
};

pub struct AdminApi<B> {
    db: B,
}

impl<B: Debug> Debug for AdminApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AdminApi ({:?})", self.db)
    }
}

impl<B> AdminApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> AdminApi<B>
where B: UserManagement + OrganizationManagement
{
    pub async fn users(&self) -> Result<Vec<User>, AuthApiError> {
        self.db.fetch_all_users().await
    }

    pub async fn set_user_active(&self, user_id: i64, active: bool) -> Result<User, AuthApiError> {
        let user = self.db.set_user_active(user_id, active).await?.ok_or(AuthApiError::UserNotFound)?;
        info!("🔄️👤️ User #{user_id} is now {}", if active { "active" } else { "inactive" });
        Ok(user)
    }

    /// Deletes the user and their roles. Users that are the contact of a seller or buyer organization cannot be
    /// deleted.
    pub async fn delete_user(&self, user_id: i64) -> Result<(), AuthApiError> {
        if !self.db.delete_user(user_id).await? {
            return Err(AuthApiError::UserNotFound);
        }
        info!("🔄️👤️ User #{user_id} deleted");
        Ok(())
    }

    /// Grants a role that is not self-service. Only the bill-to party and admin roles can be granted this way; they are
    /// verified on creation.
    pub async fn grant_role(&self, user_id: i64, role: Role) -> Result<UserRole, AuthApiError> {
        if !matches!(role, Role::BillToParty | Role::Admin) {
            return Err(AuthApiError::RoleNotGrantable(role));
        }
        self.db.fetch_user_by_id(user_id).await?.ok_or(AuthApiError::UserNotFound)?;
        let user_role = self.db.grant_verified_role(user_id, role, Utc::now()).await?;
        info!("🔄️👤️ User #{user_id} was granted the {role} role (user role #{})", user_role.id);
        Ok(user_role)
    }

    pub async fn create_bill_to_party(&self, bill_to_party: NewBillToParty) -> Result<BillToParty, AuthApiError> {
        let name = bill_to_party.name.trim().to_string();
        let email = bill_to_party.email.trim().to_string();
        if name.is_empty() || email.is_empty() {
            return Err(AuthApiError::MissingFields);
        }
        if !is_valid_email(&email) {
            return Err(AuthApiError::InvalidEmail);
        }
        let btp = self.db.create_bill_to_party(NewBillToParty { name, email, ..bill_to_party }).await?;
        info!("🔄️👤️ Bill-to party #{} ({}) created", btp.id, btp.name);
        Ok(btp)
    }

    pub async fn bill_to_parties(&self) -> Result<Vec<BillToParty>, AuthApiError> {
        Ok(self.db.fetch_bill_to_parties().await?)
    }
}
