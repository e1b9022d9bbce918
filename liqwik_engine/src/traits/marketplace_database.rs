use crate::traits::{
    AssetManagement,
    BidManagement,
    NotificationManagement,
    OrganizationManagement,
    PaymentTracking,
    UserManagement,
};

/// Everything a backend must provide to run the whole marketplace.
///
/// The workflow APIs each ask only for the contracts they use. The server holds one backend for all of them, and this
/// trait is the bound it uses.
pub trait MarketplaceDatabase:
    Clone
    + UserManagement
    + OrganizationManagement
    + AssetManagement
    + BidManagement
    + NotificationManagement
    + PaymentTracking
{
    /// The URL of the database
    fn url(&self) -> &str;
}
