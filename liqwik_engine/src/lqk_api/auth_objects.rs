use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db_types::{BuyerKyb, OrganizationDetails, Role, SellerKyb, UserRole};

/// The registration form. Missing strings deserialize as empty so that validation can report them uniformly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationRequest {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    pub role: String,
    pub organization_name: String,
    pub address: String,
    // Seller KYB
    pub legal_business_name: Option<String>,
    pub registration_number: Option<String>,
    pub tax_identification_number: Option<String>,
    pub business_type: Option<String>,
    pub industry_sector: Option<String>,
    pub date_of_incorporation: Option<NaiveDate>,
    pub business_bank_account_details: Option<String>,
    pub authorized_signatory_details: Option<String>,
    pub country_of_incorporation: Option<String>,
    pub registered_business_address: Option<String>,
    pub operating_address: Option<String>,
    pub website_url: Option<String>,
    pub list_of_directors: Option<String>,
    pub ultimate_beneficial_owners: Option<String>,
    pub shareholding_structure: Option<String>,
    // Buyer company information
    pub company_name: Option<String>,
    pub business_registration_number: Option<String>,
    pub billing_address: Option<String>,
    pub shipping_address: Option<String>,
    pub company_website: Option<String>,
    pub preferred_payment_method: Option<String>,
    pub bank_details: Option<String>,
    pub purchase_order_number: Option<String>,
}

impl RegistrationRequest {
    pub fn has_required_fields(&self) -> bool {
        [
            &self.first_name,
            &self.last_name,
            &self.username,
            &self.email,
            &self.password,
            &self.role,
            &self.organization_name,
            &self.address,
        ]
        .iter()
        .all(|s| !s.trim().is_empty())
    }

    /// Picks the organization details that belong to `role`. Other fields are ignored.
    pub fn org_details(&self, role: Role) -> OrganizationDetails {
        match role {
            Role::Buyer => OrganizationDetails::Buyer(BuyerKyb {
                company_name: self.company_name.clone(),
                business_type: self.business_type.clone(),
                industry_sector: self.industry_sector.clone(),
                business_registration_number: self.business_registration_number.clone(),
                tax_identification_number: self.tax_identification_number.clone(),
                billing_address: self.billing_address.clone(),
                shipping_address: self.shipping_address.clone(),
                company_website: self.company_website.clone(),
                preferred_payment_method: self.preferred_payment_method.clone(),
                bank_details: self.bank_details.clone(),
                purchase_order_number: self.purchase_order_number.clone(),
            }),
            _ => OrganizationDetails::Seller(SellerKyb {
                legal_business_name: self.legal_business_name.clone(),
                registration_number: self.registration_number.clone(),
                tax_identification_number: self.tax_identification_number.clone(),
                business_type: self.business_type.clone(),
                industry_sector: self.industry_sector.clone(),
                date_of_incorporation: self.date_of_incorporation,
                business_bank_account_details: self.business_bank_account_details.clone(),
                authorized_signatory_details: self.authorized_signatory_details.clone(),
                country_of_incorporation: self.country_of_incorporation.clone(),
                registered_business_address: self.registered_business_address.clone(),
                operating_address: self.operating_address.clone(),
                website_url: self.website_url.clone(),
                list_of_directors: self.list_of_directors.clone(),
                ultimate_beneficial_owners: self.ultimate_beneficial_owners.clone(),
                shareholding_structure: self.shareholding_structure.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub message: String,
    pub user_id: i64,
    pub user_role_id: i64,
    pub email: String,
    pub role: Role,
    pub requires_verification: bool,
    pub is_new_user: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailRequest {
    #[serde(default)]
    pub email: String,
    pub user_role_id: i64,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailResponse {
    pub message: String,
    pub user_id: i64,
    pub user_role_id: i64,
    pub role: Role,
    pub email_verified: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendVerificationRequest {
    #[serde(default)]
    pub email: String,
    pub user_role_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// A username or an email address.
    #[serde(default, alias = "username", alias = "email")]
    pub identifier: String,
    #[serde(default)]
    pub password: String,
}

/// A role as presented to the user when they choose which one to act in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSummary {
    pub user_role_id: i64,
    pub role: Role,
    pub verified: bool,
}

impl From<&UserRole> for RoleSummary {
    fn from(r: &UserRole) -> Self {
        Self { user_role_id: r.id, role: r.role, verified: r.is_role_verified }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub user_id: i64,
    pub email: String,
    pub requires_otp: bool,
    pub roles: Vec<RoleSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOtpRequest {
    pub user_id: i64,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub user_id: i64,
    #[serde(default)]
    pub otp: String,
    pub selected_user_role_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchRoleRequest {
    pub user_role_id: i64,
    pub role: Role,
}

/// The identity carried by a session. The server signs it into a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub user_id: i64,
    pub email: String,
    pub first_name: String,
    /// Every verified role the user holds.
    pub roles: Vec<Role>,
    pub selected_role: Option<Role>,
    pub selected_user_role_id: Option<i64>,
}

impl SessionInfo {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}
