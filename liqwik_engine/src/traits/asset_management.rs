use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{Asset, AssetContacts, AssetDocuments, AssetUpdate, NewAsset, OrgType},
    traits::{DocumentStoreError, OrganizationError, TokenOutcome},
};

#[derive(Debug, Clone, Error)]
pub enum AssetApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User is not associated with an {}", .0.label())]
    NotAnOrgMember(OrgType),
    #[error("Asset not found")]
    AssetNotFound,
    #[error("You do not have permission to access this asset")]
    Forbidden,
    #[error("Invoice Number is required")]
    MissingInvoiceNumber,
    #[error("Invoice Date is required")]
    MissingInvoiceDate,
    #[error("Payment Date is required")]
    MissingPaymentDate,
    #[error("Term Months is required")]
    MissingTermMonths,
    #[error("{0}")]
    ValidationError(String),
    #[error("Bill To Party not found")]
    BillToPartyNotFound,
    #[error("Duplicate Bill-to Party / Invoice Number")]
    DuplicateInvoice,
    #[error("Asset can no longer be edited")]
    NotEditable,
    #[error("Bill To Party cannot be changed once the fee is approved")]
    BillToPartyLocked,
    #[error("Fee is already approved")]
    FeeAlreadyApproved,
    #[error("Cannot approve fee on a cancelled asset")]
    FeeApprovalOnCancelledAsset,
    #[error("Fee must be approved before posting")]
    FeeNotApproved,
    #[error("Asset is already posted")]
    AlreadyPosted,
    #[error("Cannot post a cancelled asset")]
    PostOnCancelledAsset,
    #[error("Asset is already cancelled")]
    AlreadyCancelled,
    #[error("Invalid or Expired Token")]
    InvalidValidationToken,
    #[error("Invalid file type. Please upload PDF, Word, PNG, or JPG files.")]
    InvalidFileType,
    #[error("File size exceeds 10MB limit.")]
    FileTooLarge,
    #[error("Invalid file name")]
    InvalidFileName,
    #[error("Document not found")]
    DocumentNotFound,
    #[error("Document storage error: {0}")]
    DocumentStorageError(String),
    #[error("{0}")]
    OrganizationError(OrganizationError),
}

impl From<sqlx::Error> for AssetApiError {
    fn from(e: sqlx::Error) -> Self {
        AssetApiError::DatabaseError(e.to_string())
    }
}

impl From<OrganizationError> for AssetApiError {
    fn from(e: OrganizationError) -> Self {
        match e {
            OrganizationError::DatabaseError(s) => AssetApiError::DatabaseError(s),
            OrganizationError::BillToPartyNotFound => AssetApiError::BillToPartyNotFound,
            e => AssetApiError::OrganizationError(e),
        }
    }
}

impl From<DocumentStoreError> for AssetApiError {
    fn from(e: DocumentStoreError) -> Self {
        match e {
            DocumentStoreError::NotFound => AssetApiError::DocumentNotFound,
            e => AssetApiError::DocumentStorageError(e.to_string()),
        }
    }
}

/// Lifecycle guards. Backends call these inside the transaction that applies the transition.
impl Asset {
    pub fn check_editable(&self) -> Result<(), AssetApiError> {
        if self.is_editable() {
            Ok(())
        } else {
            Err(AssetApiError::NotEditable)
        }
    }

    /// Like [`Self::check_editable`], but the bill-to party is fixed once the fee is approved.
    pub fn check_updatable(&self, bill_to_party_id: Option<i64>) -> Result<(), AssetApiError> {
        self.check_editable()?;
        match bill_to_party_id {
            Some(id) if self.fee_approved_by_seller && id != self.bill_to_party_id => {
                Err(AssetApiError::BillToPartyLocked)
            },
            _ => Ok(()),
        }
    }

    pub fn check_fee_approvable(&self) -> Result<(), AssetApiError> {
        if self.fee_approved_by_seller {
            return Err(AssetApiError::FeeAlreadyApproved);
        }
        if self.is_cancelled {
            return Err(AssetApiError::FeeApprovalOnCancelledAsset);
        }
        Ok(())
    }

    pub fn check_postable(&self) -> Result<(), AssetApiError> {
        if self.is_cancelled {
            return Err(AssetApiError::PostOnCancelledAsset);
        }
        if !self.fee_approved_by_seller {
            return Err(AssetApiError::FeeNotApproved);
        }
        if self.is_posted {
            return Err(AssetApiError::AlreadyPosted);
        }
        Ok(())
    }

    pub fn check_cancellable(&self) -> Result<(), AssetApiError> {
        if self.is_cancelled {
            Err(AssetApiError::AlreadyCancelled)
        } else {
            Ok(())
        }
    }
}

/// The `AssetManagement` trait defines how assets (invoices put up for factoring) are stored and moved through their
/// lifecycle: `Draft → FeeApproved → Posted`, with validation by the bill-to party and cancellation possible along the
/// way.
///
/// Every transition method re-reads the asset inside its transaction and applies the matching guard, so two racing
/// requests cannot both succeed.
#[allow(async_fn_in_trait)]
pub trait AssetManagement {
    /// Inserts a new asset. A second asset with the same bill-to party and invoice number fails with
    /// [`AssetApiError::DuplicateInvoice`].
    async fn insert_asset(&self, asset: NewAsset) -> Result<Asset, AssetApiError>;

    async fn fetch_asset(&self, asset_id: i64) -> Result<Option<Asset>, AssetApiError>;

    /// All assets belonging to any of the given sellers, newest first.
    async fn fetch_assets_for_sellers(&self, seller_ids: &[i64]) -> Result<Vec<Asset>, AssetApiError>;

    /// Assets that are posted and not cancelled, newest first.
    async fn fetch_open_assets(&self) -> Result<Vec<Asset>, AssetApiError>;

    async fn fetch_asset_contacts(&self, asset_id: i64) -> Result<Option<AssetContacts>, AssetApiError>;

    async fn update_asset(&self, asset_id: i64, update: AssetUpdate) -> Result<Asset, AssetApiError>;

    /// Records stored document paths. Fields left as `None` keep their current value.
    async fn set_asset_documents(&self, asset_id: i64, documents: AssetDocuments) -> Result<Asset, AssetApiError>;

    /// Approves the fee and stores the bill-to party validation token.
    async fn approve_fee(
        &self,
        asset_id: i64,
        validation_token: &str,
        at: DateTime<Utc>,
    ) -> Result<Asset, AssetApiError>;

    async fn post_asset(&self, asset_id: i64, at: DateTime<Utc>) -> Result<Asset, AssetApiError>;

    async fn cancel_asset(&self, asset_id: i64, at: DateTime<Utc>) -> Result<Asset, AssetApiError>;

    /// Marks the asset holding `token` as validated by its bill-to party. Redeeming an already redeemed token changes
    /// nothing. An unknown token fails with [`AssetApiError::InvalidValidationToken`].
    async fn validate_by_token(&self, token: &str, at: DateTime<Utc>)
        -> Result<TokenOutcome<Asset>, AssetApiError>;
}
