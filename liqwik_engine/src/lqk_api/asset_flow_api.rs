//! The seller side of the asset lifecycle, bill-to party validation and asset documents.
use std::{collections::HashMap, fmt::Debug};

use chrono::Utc;
use log::*;

use crate::{
    db_types::{Asset, AssetContacts, AssetDocuments, DocumentType, OrgType, Role},
    helpers::random_token,
    lqk_api::{
        asset_objects::{
            content_type_for_file_name,
            is_safe_file_name,
            DocumentContent,
            DocumentInfo,
            DocumentUpload,
            NewAssetRequest,
            SellerAssetView,
            UpdateAssetRequest,
            ValidationStatus,
        },
        auth_objects::SessionInfo,
        notices,
    },
    mailer::{deliver, EmailMessage, Mailer},
    traits::{
        AssetApiError,
        AssetManagement,
        BidManagement,
        DocumentStore,
        NotificationManagement,
        OrganizationManagement,
        TokenOutcome,
    },
};

/// `AssetFlowApi` drives an asset from draft to posted (or cancelled) on behalf of its seller.
///
/// Every state change is committed before any notification or email is sent. Those side effects are best effort:
/// failures are logged and never undo the change.
pub struct AssetFlowApi<B, M, S> {
    db: B,
    mailer: M,
    store: S,
    public_url: String,
}

impl<B: Debug, M, S> Debug for AssetFlowApi<B, M, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AssetFlowApi ({:?})", self.db)
    }
}

impl<B, M, S> AssetFlowApi<B, M, S> {
    pub fn new<U: Into<String>>(db: B, mailer: M, store: S, public_url: U) -> Self {
        let public_url = public_url.into().trim_end_matches('/').to_string();
        Self { db, mailer, store, public_url }
    }

    pub fn validation_link(&self, token: &str) -> String {
        format!("{}/api/validate-bill-to-party/{token}", self.public_url)
    }
}

impl<B, M, S> AssetFlowApi<B, M, S>
where
    B: AssetManagement + BidManagement + OrganizationManagement + NotificationManagement,
    M: Mailer,
    S: DocumentStore,
{
    /// The ids of the seller organizations the user acts for. Fails if there are none.
    async fn seller_ids(&self, user_id: i64) -> Result<Vec<i64>, AssetApiError> {
        let orgs = self.db.fetch_orgs_for_user(user_id, OrgType::Seller).await?;
        if orgs.is_empty() {
            return Err(AssetApiError::NotAnOrgMember(OrgType::Seller));
        }
        Ok(orgs.into_iter().map(|o| o.id).collect())
    }

    /// Fetches an asset that belongs to one of the user's seller organizations.
    pub async fn owned_asset(&self, user_id: i64, asset_id: i64) -> Result<Asset, AssetApiError> {
        let seller_ids = self.seller_ids(user_id).await?;
        let asset = self.db.fetch_asset(asset_id).await?.ok_or(AssetApiError::AssetNotFound)?;
        if !seller_ids.contains(&asset.seller_id) {
            return Err(AssetApiError::Forbidden);
        }
        Ok(asset)
    }

    /// The counterparties to notify after a change has been committed. Lookup failures are logged, since the change
    /// itself stands either way.
    async fn contacts(&self, asset_id: i64) -> Option<AssetContacts> {
        match self.db.fetch_asset_contacts(asset_id).await {
            Ok(Some(c)) => Some(c),
            Ok(None) => {
                warn!("🔄️🧾️ Asset #{asset_id} has no contacts to notify");
                None
            },
            Err(e) => {
                warn!("🔄️🧾️ Could not look up the contacts of asset #{asset_id}. {e}");
                None
            },
        }
    }

    async fn view(&self, asset: Asset) -> Result<SellerAssetView, AssetApiError> {
        let btp_name = self.db.fetch_bill_to_party(asset.bill_to_party_id).await?.map(|b| b.name);
        let bids = self.db.fetch_bids_for_asset(asset.id).await.map_err(|e| AssetApiError::DatabaseError(e.to_string()))?;
        Ok(SellerAssetView::new(asset, btp_name, bids, Utc::now().date_naive()))
    }

    /// Creates an asset for the user's (first) seller organization, storing any documents that came with it.
    ///
    /// Documents are validated before anything is written. They are stored once the asset exists, since their paths
    /// contain the asset id.
    pub async fn create_asset(
        &self,
        user_id: i64,
        req: NewAssetRequest,
        uploads: Vec<(DocumentType, DocumentUpload)>,
    ) -> Result<SellerAssetView, AssetApiError> {
        let seller_id = self.seller_ids(user_id).await?[0];
        let new_asset = req.into_new_asset(seller_id)?;
        let uploads = uploads
            .into_iter()
            .filter(|(_, u)| !u.data.is_empty())
            .map(|(t, u)| u.validate().map(|ext| (t, ext, u)))
            .collect::<Result<Vec<_>, _>>()?;
        let btp = self.db.fetch_bill_to_party(new_asset.bill_to_party_id).await?.ok_or(AssetApiError::BillToPartyNotFound)?;
        let mut asset = self.db.insert_asset(new_asset).await?;
        info!("🔄️🧾️ Asset #{} (invoice {}) created for seller #{seller_id}", asset.id, asset.invoice_number);
        if !uploads.is_empty() {
            asset = self.store_documents(asset, uploads).await?;
        }
        let contact = self.db.fetch_org_contact(OrgType::Seller, seller_id).await?;
        match contact {
            Some(c) => notices::notify(&self.db, notices::asset_created(c.user_id, &asset, &btp.name)).await,
            None => warn!("🔄️🧾️ Seller #{seller_id} has no contact to notify about asset #{}", asset.id),
        }
        self.view(asset).await
    }

    async fn store_documents(
        &self,
        asset: Asset,
        uploads: Vec<(DocumentType, &'static str, DocumentUpload)>,
    ) -> Result<Asset, AssetApiError> {
        let mut documents = AssetDocuments::default();
        for (doc_type, ext, upload) in uploads {
            match self.store.save(asset.id, doc_type, ext, &upload.data).await {
                Ok(path) => {
                    debug!("🔄️🧾️ Stored {} for asset #{} at {path}", upload.file_name, asset.id);
                    documents.set(doc_type, path);
                },
                Err(e) => {
                    error!("🔄️🧾️ Could not store {} for asset #{}. {e}", upload.file_name, asset.id);
                    self.discard_documents(&documents).await;
                    return Err(e.into());
                },
            }
        }
        match self.db.set_asset_documents(asset.id, documents.clone()).await {
            Ok(asset) => Ok(asset),
            Err(e) => {
                error!("🔄️🧾️ Could not record documents for asset #{}. Removing the stored files. {e}", asset.id);
                self.discard_documents(&documents).await;
                Err(e)
            },
        }
    }

    async fn discard_documents(&self, documents: &AssetDocuments) {
        for path in documents.paths() {
            if let Err(e) = self.store.remove(path).await {
                warn!("🔄️🧾️ Could not remove orphaned document {path}. {e}");
            }
        }
    }

    /// The user's assets across all their seller organizations, newest first.
    pub async fn seller_assets(&self, user_id: i64) -> Result<Vec<SellerAssetView>, AssetApiError> {
        let seller_ids = self.seller_ids(user_id).await?;
        let assets = self.db.fetch_assets_for_sellers(&seller_ids).await?;
        let asset_ids = assets.iter().map(|a| a.id).collect::<Vec<_>>();
        let mut bids_by_asset = HashMap::<i64, Vec<_>>::new();
        let bids = self.db.fetch_bids_for_assets(&asset_ids).await.map_err(|e| AssetApiError::DatabaseError(e.to_string()))?;
        for bid in bids {
            bids_by_asset.entry(bid.asset_id).or_default().push(bid);
        }
        let btp_names = self
            .db
            .fetch_bill_to_parties()
            .await?
            .into_iter()
            .map(|b| (b.id, b.name))
            .collect::<HashMap<_, _>>();
        let today = Utc::now().date_naive();
        let views = assets
            .into_iter()
            .map(|a| {
                let bids = bids_by_asset.remove(&a.id).unwrap_or_default();
                let name = btp_names.get(&a.bill_to_party_id).cloned();
                SellerAssetView::new(a, name, bids, today)
            })
            .collect();
        Ok(views)
    }

    pub async fn seller_asset(&self, user_id: i64, asset_id: i64) -> Result<SellerAssetView, AssetApiError> {
        let asset = self.owned_asset(user_id, asset_id).await?;
        self.view(asset).await
    }

    pub async fn update_asset(
        &self,
        user_id: i64,
        asset_id: i64,
        req: UpdateAssetRequest,
    ) -> Result<SellerAssetView, AssetApiError> {
        let asset = self.owned_asset(user_id, asset_id).await?;
        let update = req.try_into()?;
        let asset = self.db.update_asset(asset.id, update).await?;
        debug!("🔄️🧾️ Asset #{asset_id} updated");
        if let Some(c) = self.contacts(asset_id).await {
            notices::notify(&self.db, notices::asset_updated(c.seller_user_id, &asset)).await;
        }
        self.view(asset).await
    }

    /// The seller accepts the platform fee. This issues the bill-to party validation token and asks the bill-to party
    /// to validate the invoice.
    pub async fn approve_fee(&self, user_id: i64, asset_id: i64) -> Result<Asset, AssetApiError> {
        self.owned_asset(user_id, asset_id).await?;
        let token = random_token();
        let asset = self.db.approve_fee(asset_id, &token, Utc::now()).await?;
        info!("🔄️🧾️ Fee approved for asset #{asset_id}");
        let Some(c) = self.contacts(asset_id).await else { return Ok(asset) };
        let fee_email =
            EmailMessage::seller_fee_confirmation(&c.seller_email, &c.seller_name, &asset.invoice_number, asset.fees_in_cents);
        deliver(&self.mailer, fee_email).await;
        let validation_email = EmailMessage::bill_to_party_validation(
            &c.bill_to_party_email,
            &c.bill_to_party_name,
            &c.seller_name,
            &asset.invoice_number,
            asset.face_value_in_cents,
            &self.validation_link(&token),
        );
        deliver(&self.mailer, validation_email).await;
        notices::notify(&self.db, notices::fee_approved(c.seller_user_id, &asset)).await;
        Ok(asset)
    }

    /// Puts the asset on the marketplace.
    pub async fn post_asset(&self, user_id: i64, asset_id: i64) -> Result<Asset, AssetApiError> {
        self.owned_asset(user_id, asset_id).await?;
        let asset = self.db.post_asset(asset_id, Utc::now()).await?;
        info!("🔄️🧾️ Asset #{asset_id} posted");
        let Some(c) = self.contacts(asset_id).await else { return Ok(asset) };
        notices::notify(&self.db, notices::asset_posted(c.seller_user_id, &asset)).await;
        deliver(&self.mailer, EmailMessage::asset_posted(&c.seller_email, &c.seller_name, &asset.invoice_number)).await;
        Ok(asset)
    }

    /// Withdraws the asset. Earlier flags are kept as history.
    pub async fn cancel_asset(&self, user_id: i64, asset_id: i64) -> Result<Asset, AssetApiError> {
        self.owned_asset(user_id, asset_id).await?;
        let asset = self.db.cancel_asset(asset_id, Utc::now()).await?;
        info!("🔄️🧾️ Asset #{asset_id} cancelled");
        let Some(c) = self.contacts(asset_id).await else { return Ok(asset) };
        notices::notify(&self.db, notices::asset_cancelled(c.seller_user_id, &asset)).await;
        let email = EmailMessage::asset_cancelled(&c.seller_email, &c.seller_name, &asset.invoice_number);
        deliver(&self.mailer, email).await;
        Ok(asset)
    }

    /// Redeems the token emailed to the bill-to party. Only the first redemption changes anything or notifies the
    /// seller.
    pub async fn validate_bill_to_party(&self, token: &str) -> Result<TokenOutcome<Asset>, AssetApiError> {
        let outcome = self.db.validate_by_token(token, Utc::now()).await?;
        match &outcome {
            TokenOutcome::Redeemed(asset) => {
                info!("🔄️🧾️ Asset #{} validated by its bill-to party", asset.id);
                if let Some(c) = self.contacts(asset.id).await {
                    let notice = notices::bill_to_party_validated(c.seller_user_id, asset, &c.bill_to_party_name);
                    notices::notify(&self.db, notice).await;
                }
            },
            TokenOutcome::AlreadyRedeemed(asset) => {
                debug!("🔄️🧾️ Validation token for asset #{} was used again", asset.id);
            },
        }
        Ok(outcome)
    }

    pub async fn check_validation(&self, user_id: i64, asset_id: i64) -> Result<ValidationStatus, AssetApiError> {
        let asset = self.owned_asset(user_id, asset_id).await?;
        Ok(ValidationStatus::from(&asset))
    }

    /// Documents may be seen by the owning seller, by buyers once the asset is posted, and by admins.
    async fn viewable_asset(&self, session: &SessionInfo, asset_id: i64) -> Result<Asset, AssetApiError> {
        let asset = self.db.fetch_asset(asset_id).await?.ok_or(AssetApiError::AssetNotFound)?;
        if session.has_role(Role::Admin) {
            return Ok(asset);
        }
        if session.has_role(Role::Seller) {
            let orgs = self.db.fetch_orgs_for_user(session.user_id, OrgType::Seller).await?;
            if orgs.iter().any(|o| o.id == asset.seller_id) {
                return Ok(asset);
            }
        }
        if session.has_role(Role::Buyer) && asset.is_posted {
            let orgs = self.db.fetch_orgs_for_user(session.user_id, OrgType::Buyer).await?;
            if !orgs.is_empty() {
                return Ok(asset);
            }
        }
        Err(AssetApiError::Forbidden)
    }

    pub async fn documents(&self, session: &SessionInfo, asset_id: i64) -> Result<Vec<DocumentInfo>, AssetApiError> {
        let asset = self.viewable_asset(session, asset_id).await?;
        Ok(DocumentInfo::for_asset(&asset))
    }

    pub async fn document(
        &self,
        session: &SessionInfo,
        asset_id: i64,
        file_name: &str,
    ) -> Result<DocumentContent, AssetApiError> {
        if !is_safe_file_name(file_name) {
            return Err(AssetApiError::InvalidFileName);
        }
        let asset = self.viewable_asset(session, asset_id).await?;
        let info = DocumentInfo::for_asset(&asset)
            .into_iter()
            .find(|d| d.file_name == file_name)
            .ok_or(AssetApiError::DocumentNotFound)?;
        let data = self.store.read(&info.path).await?;
        let content_type = content_type_for_file_name(&info.file_name);
        Ok(DocumentContent { info, content_type, data })
    }
}
