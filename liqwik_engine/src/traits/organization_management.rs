use thiserror::Error;

use crate::db_types::{BillToParty, NewBillToParty, OrgContact, OrgType, Organization};

#[derive(Debug, Clone, Error)]
pub enum OrganizationError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Bill To Party not found")]
    BillToPartyNotFound,
    #[error("Bill To Party name already exists")]
    BillToPartyNameTaken,
    #[error("Contact user role not found")]
    ContactNotFound,
}

impl From<sqlx::Error> for OrganizationError {
    fn from(e: sqlx::Error) -> Self {
        OrganizationError::DatabaseError(e.to_string())
    }
}

/// Resolution of users to the organizations they act for.
///
/// A user acts for an organization when the organization's contact is one of the user's **verified** roles of the
/// matching kind. Callers must treat an empty result as "not authorized".
#[allow(async_fn_in_trait)]
pub trait OrganizationManagement {
    async fn fetch_orgs_for_user(&self, user_id: i64, org_type: OrgType)
        -> Result<Vec<Organization>, OrganizationError>;

    /// The contact person of a seller or buyer organization.
    async fn fetch_org_contact(&self, org_type: OrgType, org_id: i64) -> Result<Option<OrgContact>, OrganizationError>;

    async fn fetch_bill_to_party(&self, id: i64) -> Result<Option<BillToParty>, OrganizationError>;

    async fn fetch_bill_to_parties(&self) -> Result<Vec<BillToParty>, OrganizationError>;

    async fn create_bill_to_party(&self, bill_to_party: NewBillToParty) -> Result<BillToParty, OrganizationError>;
}
