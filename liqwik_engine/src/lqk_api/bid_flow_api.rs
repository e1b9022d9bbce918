//! Buyer bids, the seller's decisions on them and the buyer's payment approval.
use std::{collections::HashMap, fmt::Debug};

use chrono::{DateTime, Duration, NaiveTime, Utc};
use log::*;

use crate::{
    db_types::{Asset, AssetBid, NewBid, NewBillToPartyPayment, OrgType, Organization},
    helpers::{random_token, PAYMENT_APPROVAL_WINDOW_HOURS},
    lqk_api::{
        bid_objects::{
            AcceptedBidView,
            BidAction,
            BidRequest,
            MarketplaceAsset,
            PaymentApproval,
            PaymentApprovalRequest,
            SellerBidAction,
        },
        notices,
        payment_tracking_api::PAYMENT_REMINDER_INTERVAL_DAYS,
    },
    mailer::{deliver, EmailMessage, Mailer},
    traits::{
        AssetManagement,
        BidApiError,
        BidManagement,
        NotificationManagement,
        OrganizationManagement,
        TokenOutcome,
    },
};

/// `BidFlowApi` handles everything that happens to an asset once it is on the marketplace.
///
/// At most one bid per asset is accepted at a time. The winning buyer has a limited window to approve payment through
/// an emailed link; approval creates the payment the bill-to party owes.
pub struct BidFlowApi<B, M> {
    db: B,
    mailer: M,
    public_url: String,
}

impl<B: Debug, M> Debug for BidFlowApi<B, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BidFlowApi ({:?})", self.db)
    }
}

impl<B, M> BidFlowApi<B, M> {
    pub fn new<U: Into<String>>(db: B, mailer: M, public_url: U) -> Self {
        let public_url = public_url.into().trim_end_matches('/').to_string();
        Self { db, mailer, public_url }
    }

    pub fn approval_link(&self, token: &str) -> String {
        format!("{}/api/approve-payment/{token}", self.public_url)
    }
}

impl<B, M> BidFlowApi<B, M>
where
    B: AssetManagement + BidManagement + OrganizationManagement + NotificationManagement,
    M: Mailer,
{
    async fn orgs(&self, user_id: i64, org_type: OrgType) -> Result<Vec<Organization>, BidApiError> {
        let orgs = self.db.fetch_orgs_for_user(user_id, org_type).await?;
        if orgs.is_empty() {
            return Err(BidApiError::NotAnOrgMember(org_type));
        }
        Ok(orgs)
    }

    async fn asset(&self, asset_id: i64) -> Result<Asset, BidApiError> {
        Ok(self.db.fetch_asset(asset_id).await?.ok_or(BidApiError::AssetNotFound)?)
    }

    /// Fetches a bid and checks that it was placed on `asset_id`.
    async fn bid_on(&self, asset_id: i64, bid_id: i64) -> Result<AssetBid, BidApiError> {
        match self.db.fetch_bid(bid_id).await? {
            Some(bid) if bid.asset_id == asset_id => Ok(bid),
            _ => Err(BidApiError::BidNotFound),
        }
    }

    async fn seller_owned_asset(&self, user_id: i64, asset_id: i64) -> Result<Asset, BidApiError> {
        let orgs = self.orgs(user_id, OrgType::Seller).await?;
        let asset = self.asset(asset_id).await?;
        if !orgs.iter().any(|o| o.id == asset.seller_id) {
            return Err(BidApiError::Forbidden);
        }
        Ok(asset)
    }

    async fn bill_to_party_names(&self) -> Result<HashMap<i64, String>, BidApiError> {
        let names = self.db.fetch_bill_to_parties().await?.into_iter().map(|b| (b.id, b.name)).collect();
        Ok(names)
    }

    //------------------------------------------   Buyers   -----------------------------------------------------------

    /// Places a bid on a posted asset on behalf of the user's (first) buyer organization.
    pub async fn place_bid(&self, user_id: i64, asset_id: i64, req: BidRequest) -> Result<AssetBid, BidApiError> {
        let buyer = self.orgs(user_id, OrgType::Buyer).await?.swap_remove(0);
        let asset = self.asset(asset_id).await?;
        if !asset.is_open_for_bids() {
            return Err(BidApiError::AssetNotOpen);
        }
        let cents_per_unit = req.cents_per_unit()?;
        let bid = self.db.insert_bid(NewBid { asset_id, buyer_id: buyer.id, num_units: 1, cents_per_unit }).await?;
        info!("🔄️💶️ {} placed bid #{} of {cents_per_unit} on asset #{asset_id}", buyer.name, bid.id);
        match self.db.fetch_asset_contacts(asset_id).await? {
            Some(c) => {
                let notice = notices::bid_received(c.seller_user_id, &buyer.name, &asset, &bid);
                notices::notify(&self.db, notice).await;
            },
            None => warn!("🔄️💶️ No seller contact to notify about bid #{}", bid.id),
        }
        notices::notify(&self.db, notices::bid_saved(user_id, &asset, &bid)).await;
        Ok(bid)
    }

    /// Changes the amount of one of the user's bids. Accepted bids cannot be changed.
    pub async fn update_bid(
        &self,
        user_id: i64,
        asset_id: i64,
        bid_id: i64,
        req: BidRequest,
    ) -> Result<AssetBid, BidApiError> {
        let buyers = self.orgs(user_id, OrgType::Buyer).await?;
        let asset = self.asset(asset_id).await?;
        let bid = self.bid_on(asset_id, bid_id).await?;
        if !buyers.iter().any(|b| b.id == bid.buyer_id) {
            return Err(BidApiError::Forbidden);
        }
        if !asset.is_open_for_bids() {
            return Err(BidApiError::AssetNotOpen);
        }
        let cents_per_unit = req.cents_per_unit()?;
        let bid = self.db.update_bid_amount(bid_id, cents_per_unit).await?;
        debug!("🔄️💶️ Bid #{bid_id} changed to {cents_per_unit}");
        notices::notify(&self.db, notices::bid_saved(user_id, &asset, &bid)).await;
        Ok(bid)
    }

    /// The user's own bids on an asset, newest first.
    pub async fn buyer_bids_on_asset(&self, user_id: i64, asset_id: i64) -> Result<Vec<AssetBid>, BidApiError> {
        let buyers = self.orgs(user_id, OrgType::Buyer).await?;
        self.asset(asset_id).await?;
        let bids = self.db.fetch_bids_for_asset(asset_id).await?;
        Ok(bids.into_iter().filter(|b| buyers.iter().any(|o| o.id == b.buyer_id)).collect())
    }

    /// Posted, uncancelled assets, newest first. With `only_with_own_bids`, only assets the user has bid on are
    /// listed.
    pub async fn marketplace(&self, user_id: i64, only_with_own_bids: bool) -> Result<Vec<MarketplaceAsset>, BidApiError> {
        let buyers = self.orgs(user_id, OrgType::Buyer).await?;
        let assets = self.db.fetch_open_assets().await?;
        let asset_ids = assets.iter().map(|a| a.id).collect::<Vec<_>>();
        let mut bids_by_asset = HashMap::<i64, Vec<AssetBid>>::new();
        for bid in self.db.fetch_bids_for_assets(&asset_ids).await? {
            bids_by_asset.entry(bid.asset_id).or_default().push(bid);
        }
        let names = self.bill_to_party_names().await?;
        let today = Utc::now().date_naive();
        let listing = assets
            .into_iter()
            .filter_map(|asset| {
                let bids = bids_by_asset.remove(&asset.id).unwrap_or_default();
                if only_with_own_bids && !bids.iter().any(|b| buyers.iter().any(|o| o.id == b.buyer_id)) {
                    return None;
                }
                let name = names.get(&asset.bill_to_party_id).cloned();
                Some(MarketplaceAsset::new(asset, name, bids, today))
            })
            .collect();
        Ok(listing)
    }

    /// A single marketplace asset. Assets that are no longer posted stay visible to buyers who bid on them.
    pub async fn marketplace_asset(&self, user_id: i64, asset_id: i64) -> Result<MarketplaceAsset, BidApiError> {
        let buyers = self.orgs(user_id, OrgType::Buyer).await?;
        let asset = self.asset(asset_id).await?;
        let bids = self.db.fetch_bids_for_asset(asset_id).await?;
        let has_bid = bids.iter().any(|b| buyers.iter().any(|o| o.id == b.buyer_id));
        if !asset.is_open_for_bids() && !has_bid {
            return Err(BidApiError::AssetNotOpen);
        }
        let name = self.db.fetch_bill_to_party(asset.bill_to_party_id).await?.map(|b| b.name);
        Ok(MarketplaceAsset::new(asset, name, bids, Utc::now().date_naive()))
    }

    /// The user's accepted bids, newest first, each with the asset it won.
    pub async fn accepted_bids(&self, user_id: i64) -> Result<Vec<AcceptedBidView>, BidApiError> {
        let buyer_ids = self.orgs(user_id, OrgType::Buyer).await?.into_iter().map(|o| o.id).collect::<Vec<_>>();
        let bids = self.db.fetch_bids_for_buyers(&buyer_ids).await?;
        let mut result = Vec::new();
        for bid in bids.into_iter().filter(|b| b.accepted) {
            let asset = self.asset(bid.asset_id).await?;
            let contacts = self.db.fetch_asset_contacts(bid.asset_id).await?.ok_or(BidApiError::AssetNotFound)?;
            result.push(AcceptedBidView {
                total_amount: bid.total().as_currency_units(),
                bid,
                asset,
                seller_name: contacts.seller_name,
                bill_to_party_name: contacts.bill_to_party_name,
            });
        }
        Ok(result)
    }

    //------------------------------------------   Sellers   ----------------------------------------------------------

    /// Bids on one of the user's assets, newest first.
    pub async fn seller_bids(&self, user_id: i64, asset_id: i64) -> Result<Vec<AssetBid>, BidApiError> {
        self.seller_owned_asset(user_id, asset_id).await?;
        self.db.fetch_bids_for_asset(asset_id).await
    }

    /// Applies the seller's decision and returns the asset's bids as they stand afterwards.
    pub async fn seller_action(
        &self,
        user_id: i64,
        asset_id: i64,
        req: SellerBidAction,
    ) -> Result<Vec<AssetBid>, BidApiError> {
        let action = req.action.parse::<BidAction>()?;
        let asset = self.seller_owned_asset(user_id, asset_id).await?;
        let bid = self.bid_on(asset_id, req.bid_id).await?;
        match action {
            BidAction::Accept => self.accept(&asset, &bid).await?,
            BidAction::CancelAccept => {
                self.db.cancel_bid_acceptance(bid.id).await?;
                info!("🔄️💶️ Acceptance of bid #{} on asset #{asset_id} withdrawn", bid.id);
            },
            BidAction::Reject => {
                let bid = self.db.reject_bid(bid.id, Utc::now()).await?;
                info!("🔄️💶️ Bid #{} on asset #{asset_id} rejected", bid.id);
                self.notify_rejected(&asset, &bid).await;
            },
        }
        self.db.fetch_bids_for_asset(asset_id).await
    }

    async fn accept(&self, asset: &Asset, bid: &AssetBid) -> Result<(), BidApiError> {
        if !asset.is_open_for_bids() {
            return Err(BidApiError::AssetNotOpen);
        }
        let now = Utc::now();
        let token = random_token();
        let deadline = now + Duration::hours(PAYMENT_APPROVAL_WINDOW_HOURS);
        let accepted = self.db.accept_bid(bid.id, &token, deadline, now).await?;
        info!(
            "🔄️💶️ Bid #{} accepted on asset #{}. {} other bids rejected",
            bid.id,
            asset.id,
            accepted.rejected.len()
        );
        for rejected in &accepted.rejected {
            self.notify_rejected(asset, rejected).await;
        }
        let parties = (
            self.db.fetch_org_contact(OrgType::Buyer, accepted.bid.buyer_id).await,
            self.db.fetch_asset_contacts(asset.id).await,
        );
        let (buyer, seller) = match parties {
            (Ok(Some(buyer)), Ok(Some(seller))) => (buyer, seller),
            _ => {
                warn!("🔄️💶️ Could not resolve the parties to bid #{}. The buyer was not told of the acceptance", bid.id);
                return Ok(());
            },
        };
        let email = EmailMessage::bid_accepted(
            &buyer.email,
            &buyer.first_name,
            &asset.invoice_number,
            accepted.bid.total(),
            deadline,
            &self.approval_link(&token),
        );
        deliver(&self.mailer, email).await;
        let notes = notices::bid_accepted(buyer.user_id, seller.seller_user_id, &seller.seller_name, asset, &accepted.bid);
        for n in notes {
            notices::notify(&self.db, n).await;
        }
        Ok(())
    }

    async fn notify_rejected(&self, asset: &Asset, bid: &AssetBid) {
        match self.db.fetch_org_contact(OrgType::Buyer, bid.buyer_id).await {
            Ok(Some(buyer)) => notices::notify(&self.db, notices::bid_rejected(buyer.user_id, asset, bid)).await,
            Ok(None) => warn!("🔄️💶️ Buyer #{} has no contact to tell about rejected bid #{}", bid.buyer_id, bid.id),
            Err(e) => warn!("🔄️💶️ Could not look up the buyer of rejected bid #{}. {e}", bid.id),
        }
    }

    //------------------------------------------   Payment approval   -------------------------------------------------

    /// Redeems the approval link emailed to the winning buyer.
    pub async fn approve_payment_by_token(&self, token: &str) -> Result<PaymentApproval, BidApiError> {
        let bid = self.db.fetch_bid_by_payment_token(token).await?.ok_or(BidApiError::InvalidPaymentToken)?;
        self.approve(bid).await
    }

    /// Approves payment for one of the user's accepted bids from within a session.
    pub async fn approve_payment(
        &self,
        user_id: i64,
        asset_id: i64,
        bid_id: i64,
        req: PaymentApprovalRequest,
    ) -> Result<PaymentApproval, BidApiError> {
        if req.payment_approved != Some(true) {
            return Err(BidApiError::PaymentApprovalRequired);
        }
        let buyers = self.orgs(user_id, OrgType::Buyer).await?;
        let bid = self.bid_on(asset_id, bid_id).await?;
        if !buyers.iter().any(|b| b.id == bid.buyer_id) {
            return Err(BidApiError::Forbidden);
        }
        if !bid.accepted && !bid.payment_approved_by_buyer {
            return Err(BidApiError::BidNotAccepted);
        }
        self.approve(bid).await
    }

    /// Records the approval and the bill-to party payment it creates. The payment is due at the start of the asset's
    /// payment date, and the first reminder falls due a few days from now.
    async fn approve(&self, bid: AssetBid) -> Result<PaymentApproval, BidApiError> {
        let asset = self.asset(bid.asset_id).await?;
        // Revisiting the link after approval still reports the approval
        if asset.is_cancelled && !bid.payment_approved_by_buyer {
            return Err(BidApiError::AssetNotOpen);
        }
        let now = Utc::now();
        let due_date = DateTime::<Utc>::from_naive_utc_and_offset(asset.payment_date.and_time(NaiveTime::default()), Utc);
        let payment = NewBillToPartyPayment {
            asset_id: asset.id,
            bid_id: bid.id,
            bill_to_party_id: asset.bill_to_party_id,
            amount_in_cents: asset.face_value_in_cents,
            due_date,
            next_reminder_due_at: now + Duration::days(PAYMENT_REMINDER_INTERVAL_DAYS),
        };
        let outcome = self.db.approve_bid_payment(bid.id, payment, now).await?;
        let (bid, payment) = match outcome {
            TokenOutcome::AlreadyRedeemed((bid, _)) => {
                debug!("🔄️💶️ Payment for bid #{} was already approved", bid.id);
                return Ok(PaymentApproval { bid, payment: None, newly_approved: false });
            },
            TokenOutcome::Redeemed(result) => result,
        };
        info!("🔄️💶️ Payment approved for bid #{} on asset #{}", bid.id, asset.id);
        self.send_payment_confirmations(&asset, &bid).await;
        Ok(PaymentApproval { bid, payment, newly_approved: true })
    }

    async fn send_payment_confirmations(&self, asset: &Asset, bid: &AssetBid) {
        let (buyer, seller) = match (
            self.db.fetch_org_contact(OrgType::Buyer, bid.buyer_id).await,
            self.db.fetch_asset_contacts(asset.id).await,
        ) {
            (Ok(Some(buyer)), Ok(Some(seller))) => (buyer, seller),
            _ => {
                warn!("🔄️💶️ Could not resolve the parties to bid #{}. No payment confirmations sent", bid.id);
                return;
            },
        };
        let amount = bid.total();
        let buyer_email =
            EmailMessage::buyer_payment_confirmation(&buyer.email, &buyer.first_name, &asset.invoice_number, amount);
        let buyer_sent = deliver(&self.mailer, buyer_email).await;
        let seller_email = EmailMessage::seller_payment_notification(
            &seller.seller_email,
            &seller.seller_name,
            &buyer.org_name,
            &asset.invoice_number,
            amount,
        );
        let seller_sent = deliver(&self.mailer, seller_email).await;
        if let Err(e) = self.db.set_payment_email_flags(bid.id, buyer_sent, seller_sent).await {
            warn!("🔄️💶️ Could not record payment email status for bid #{}. {e}", bid.id);
        }
        for n in notices::payment_made(buyer.user_id, seller.seller_user_id, asset, bid) {
            notices::notify(&self.db, n).await;
        }
    }
}
