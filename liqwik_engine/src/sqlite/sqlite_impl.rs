//! `SqliteDatabase` is a concrete implementation of a Liqwik backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Guarded transitions follow the same pattern throughout: open a transaction that holds the write lock
//! ([`begin_write`]), re-read the row, apply the guard, write, commit.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use liqwik_common::Cents;
use log::*;
use sqlx::SqlitePool;

use super::db::{
    assets,
    begin_write,
    bids,
    db_url,
    is_foreign_key_violation,
    is_unique_violation,
    job_locks,
    new_pool,
    notifications,
    organizations,
    payments,
    users,
};
use crate::{
    db_types::{
        AcceptedBid,
        Asset,
        AssetBid,
        AssetContacts,
        AssetDocuments,
        AssetUpdate,
        BillToParty,
        BillToPartyPayment,
        NewAsset,
        NewBid,
        NewBillToParty,
        NewBillToPartyPayment,
        NewNotification,
        Notification,
        OrgContact,
        OrgType,
        Organization,
        OrganizationDetails,
        Role,
        TrackedPayment,
        User,
        UserRole,
    },
    traits::{
        AssetApiError,
        AssetManagement,
        AuthApiError,
        BidApiError,
        BidManagement,
        MarketplaceDatabase,
        NewRegistration,
        NotificationApiError,
        NotificationManagement,
        OrganizationError,
        OrganizationManagement,
        PaymentTracking,
        PaymentTrackingError,
        RegistrantUser,
        RegistrationResult,
        TokenOutcome,
        UserManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl UserManagement for SqliteDatabase {
    async fn fetch_user_by_id(&self, user_id: i64) -> Result<Option<User>, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user_by_id(user_id, &mut conn).await?;
        Ok(user)
    }

    async fn fetch_user_by_login(&self, identifier: &str) -> Result<Option<User>, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user_by_login(identifier, &mut conn).await?;
        Ok(user)
    }

    async fn fetch_user_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user_by_email_or_username(email, username, &mut conn).await?;
        Ok(user)
    }

    async fn fetch_user_roles(&self, user_id: i64) -> Result<Vec<UserRole>, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        let roles = users::fetch_user_roles(user_id, &mut conn).await?;
        Ok(roles)
    }

    async fn fetch_user_role(&self, user_role_id: i64) -> Result<Option<UserRole>, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        let role = users::fetch_user_role(user_role_id, &mut conn).await?;
        Ok(role)
    }

    async fn register_role(&self, registration: NewRegistration) -> Result<RegistrationResult, AuthApiError> {
        let NewRegistration { user, role, org_name, org_address, org_details, verification_code, code_expires_at } =
            registration;
        let org_type = role.org_type().ok_or(AuthApiError::InvalidRole)?;
        if org_details.org_type() != org_type {
            return Err(AuthApiError::InvalidRole);
        }
        let mut tx = begin_write(&self.pool).await?;
        let user = match user {
            RegistrantUser::New(new_user) => users::insert_user(new_user, &mut tx).await?,
            RegistrantUser::Existing(id) => {
                users::fetch_user_by_id(id, &mut tx).await?.ok_or(AuthApiError::UserNotFound)?
            },
        };
        if users::fetch_user_role_for(user.id, role, &mut tx).await?.is_some() {
            return Err(AuthApiError::AlreadyRegistered(role));
        }
        if organizations::org_name_exists(org_type, &org_name, &mut tx).await? {
            return Err(AuthApiError::OrganizationNameTaken(org_type));
        }
        let user_role = users::insert_pending_role(user.id, role, &verification_code, code_expires_at, &mut tx)
            .await
            .map_err(|e| if is_unique_violation(&e) { AuthApiError::AlreadyRegistered(role) } else { e.into() })?;
        let org_id = match &org_details {
            OrganizationDetails::Seller(kyb) => {
                organizations::insert_seller(&org_name, &org_address, user_role.id, kyb, &mut tx).await
            },
            OrganizationDetails::Buyer(kyb) => {
                organizations::insert_buyer(&org_name, &org_address, user_role.id, kyb, &mut tx).await
            },
        }
        .map_err(|e| if is_unique_violation(&e) { AuthApiError::OrganizationNameTaken(org_type) } else { e.into() })?;
        tx.commit().await?;
        debug!("🗃️ User #{} registered as {role} for {org_type} #{org_id}", user.id);
        Ok(RegistrationResult { user, user_role, org_id })
    }

    async fn update_role_verification_code(
        &self,
        user_role_id: i64,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        match users::update_role_verification_code(user_role_id, code, expires_at, &mut conn).await? {
            0 => match users::fetch_user_role(user_role_id, &mut conn).await? {
                Some(_) => Err(AuthApiError::RoleAlreadyVerified),
                None => Err(AuthApiError::UserRoleNotFound),
            },
            _ => Ok(()),
        }
    }

    async fn mark_role_verified(&self, user_role_id: i64, at: DateTime<Utc>) -> Result<bool, AuthApiError> {
        let mut tx = begin_write(&self.pool).await?;
        let user_role = users::fetch_user_role(user_role_id, &mut tx).await?.ok_or(AuthApiError::UserRoleNotFound)?;
        if users::mark_role_verified(user_role_id, at, &mut tx).await? == 0 {
            return Err(AuthApiError::RoleAlreadyVerified);
        }
        let user = users::fetch_user_by_id(user_role.user_id, &mut tx).await?.ok_or(AuthApiError::UserNotFound)?;
        let first_verification = !user.is_email_verified;
        if first_verification {
            users::mark_email_verified(user.id, at, &mut tx).await?;
        }
        tx.commit().await?;
        debug!("🗃️ Role #{user_role_id} of user #{} verified. First verification: {first_verification}", user.id);
        Ok(first_verification)
    }

    async fn set_login_otp(&self, user_id: i64, otp: Option<(&str, DateTime<Utc>)>) -> Result<(), AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        let (code, expires_at) = match otp {
            Some((code, expires_at)) => (Some(code), Some(expires_at)),
            None => (None, None),
        };
        match users::set_login_otp(user_id, code, expires_at, &mut conn).await? {
            0 => Err(AuthApiError::UserNotFound),
            _ => Ok(()),
        }
    }

    async fn set_first_login(&self, user_id: i64, is_first_login: bool) -> Result<(), AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        match users::set_first_login(user_id, is_first_login, &mut conn).await? {
            0 => Err(AuthApiError::UserNotFound),
            _ => Ok(()),
        }
    }

    async fn fetch_all_users(&self) -> Result<Vec<User>, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        let users = users::fetch_all_users(&mut conn).await?;
        Ok(users)
    }

    async fn set_user_active(&self, user_id: i64, active: bool) -> Result<Option<User>, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::set_user_active(user_id, active, &mut conn).await?;
        Ok(user)
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        let deleted = users::delete_user(user_id, &mut conn)
            .await
            .map_err(|e| if is_foreign_key_violation(&e) { AuthApiError::UserHasDependents } else { e.into() })?;
        Ok(deleted > 0)
    }

    async fn grant_verified_role(&self, user_id: i64, role: Role, at: DateTime<Utc>) -> Result<UserRole, AuthApiError> {
        let mut tx = begin_write(&self.pool).await?;
        let user = users::fetch_user_by_id(user_id, &mut tx).await?.ok_or(AuthApiError::UserNotFound)?;
        let user_role = users::insert_verified_role(user.id, role, at, &mut tx)
            .await
            .map_err(|e| if is_unique_violation(&e) { AuthApiError::RoleAlreadyGranted(role) } else { e.into() })?;
        tx.commit().await?;
        Ok(user_role)
    }
}

impl OrganizationManagement for SqliteDatabase {
    async fn fetch_orgs_for_user(&self, user_id: i64, org_type: OrgType) -> Result<Vec<Organization>, OrganizationError> {
        let mut conn = self.pool.acquire().await?;
        let orgs = organizations::fetch_orgs_for_user(user_id, org_type, &mut conn).await?;
        Ok(orgs)
    }

    async fn fetch_org_contact(&self, org_type: OrgType, org_id: i64) -> Result<Option<OrgContact>, OrganizationError> {
        let mut conn = self.pool.acquire().await?;
        let contact = organizations::fetch_org_contact(org_type, org_id, &mut conn).await?;
        Ok(contact)
    }

    async fn fetch_bill_to_party(&self, id: i64) -> Result<Option<BillToParty>, OrganizationError> {
        let mut conn = self.pool.acquire().await?;
        let btp = organizations::fetch_bill_to_party(id, &mut conn).await?;
        Ok(btp)
    }

    async fn fetch_bill_to_parties(&self) -> Result<Vec<BillToParty>, OrganizationError> {
        let mut conn = self.pool.acquire().await?;
        let btps = organizations::fetch_bill_to_parties(&mut conn).await?;
        Ok(btps)
    }

    async fn create_bill_to_party(&self, bill_to_party: NewBillToParty) -> Result<BillToParty, OrganizationError> {
        let mut tx = begin_write(&self.pool).await?;
        if let Some(contact_id) = bill_to_party.contact_id {
            users::fetch_user_role(contact_id, &mut tx).await?.ok_or(OrganizationError::ContactNotFound)?;
        }
        let id = organizations::insert_bill_to_party(bill_to_party, &mut tx)
            .await
            .map_err(|e| if is_unique_violation(&e) { OrganizationError::BillToPartyNameTaken } else { e.into() })?;
        let btp = organizations::fetch_bill_to_party(id, &mut tx).await?.ok_or(OrganizationError::BillToPartyNotFound)?;
        tx.commit().await?;
        Ok(btp)
    }
}

fn asset_write_error(e: sqlx::Error) -> AssetApiError {
    if is_unique_violation(&e) {
        AssetApiError::DuplicateInvoice
    } else if is_foreign_key_violation(&e) {
        AssetApiError::BillToPartyNotFound
    } else if matches!(e, sqlx::Error::RowNotFound) {
        AssetApiError::AssetNotFound
    } else {
        e.into()
    }
}

enum AssetTransition<'a> {
    ApproveFee { token: &'a str, at: DateTime<Utc> },
    Post { at: DateTime<Utc> },
    Cancel { at: DateTime<Utc> },
    Update(AssetUpdate),
}

impl SqliteDatabase {
    /// Runs a guarded asset transition: the asset is re-read inside a transaction and `guard` is applied before the
    /// write.
    async fn transition_asset<G>(
        &self,
        asset_id: i64,
        guard: G,
        transition: AssetTransition<'_>,
    ) -> Result<Asset, AssetApiError>
    where
        G: Fn(&Asset) -> Result<(), AssetApiError>,
    {
        let mut tx = begin_write(&self.pool).await?;
        let asset = assets::fetch_asset(asset_id, &mut tx).await?.ok_or(AssetApiError::AssetNotFound)?;
        guard(&asset)?;
        let asset = match transition {
            AssetTransition::ApproveFee { token, at } => assets::approve_fee(asset_id, token, at, &mut tx).await,
            AssetTransition::Post { at } => assets::post_asset(asset_id, at, &mut tx).await,
            AssetTransition::Cancel { at } => assets::cancel_asset(asset_id, at, &mut tx).await,
            AssetTransition::Update(update) => assets::update_asset(asset_id, update, &mut tx).await,
        }
        .map_err(asset_write_error)?;
        tx.commit().await?;
        Ok(asset)
    }
}

impl AssetManagement for SqliteDatabase {
    async fn insert_asset(&self, asset: NewAsset) -> Result<Asset, AssetApiError> {
        let mut conn = self.pool.acquire().await?;
        let asset = assets::insert_asset(asset, &mut conn).await.map_err(asset_write_error)?;
        Ok(asset)
    }

    async fn fetch_asset(&self, asset_id: i64) -> Result<Option<Asset>, AssetApiError> {
        let mut conn = self.pool.acquire().await?;
        let asset = assets::fetch_asset(asset_id, &mut conn).await?;
        Ok(asset)
    }

    async fn fetch_assets_for_sellers(&self, seller_ids: &[i64]) -> Result<Vec<Asset>, AssetApiError> {
        let mut conn = self.pool.acquire().await?;
        let assets = assets::fetch_assets_for_sellers(seller_ids, &mut conn).await?;
        Ok(assets)
    }

    async fn fetch_open_assets(&self) -> Result<Vec<Asset>, AssetApiError> {
        let mut conn = self.pool.acquire().await?;
        let assets = assets::fetch_open_assets(&mut conn).await?;
        Ok(assets)
    }

    async fn fetch_asset_contacts(&self, asset_id: i64) -> Result<Option<AssetContacts>, AssetApiError> {
        let mut conn = self.pool.acquire().await?;
        let contacts = assets::fetch_asset_contacts(asset_id, &mut conn).await?;
        Ok(contacts)
    }

    async fn update_asset(&self, asset_id: i64, update: AssetUpdate) -> Result<Asset, AssetApiError> {
        let bill_to_party_id = update.bill_to_party_id;
        let guard = |asset: &Asset| asset.check_updatable(bill_to_party_id);
        self.transition_asset(asset_id, guard, AssetTransition::Update(update)).await
    }

    async fn set_asset_documents(&self, asset_id: i64, documents: AssetDocuments) -> Result<Asset, AssetApiError> {
        let mut conn = self.pool.acquire().await?;
        let asset = assets::set_asset_documents(asset_id, documents, &mut conn).await.map_err(asset_write_error)?;
        Ok(asset)
    }

    async fn approve_fee(
        &self,
        asset_id: i64,
        validation_token: &str,
        at: DateTime<Utc>,
    ) -> Result<Asset, AssetApiError> {
        let transition = AssetTransition::ApproveFee { token: validation_token, at };
        self.transition_asset(asset_id, Asset::check_fee_approvable, transition).await
    }

    async fn post_asset(&self, asset_id: i64, at: DateTime<Utc>) -> Result<Asset, AssetApiError> {
        self.transition_asset(asset_id, Asset::check_postable, AssetTransition::Post { at }).await
    }

    async fn cancel_asset(&self, asset_id: i64, at: DateTime<Utc>) -> Result<Asset, AssetApiError> {
        self.transition_asset(asset_id, Asset::check_cancellable, AssetTransition::Cancel { at }).await
    }

    async fn validate_by_token(&self, token: &str, at: DateTime<Utc>) -> Result<TokenOutcome<Asset>, AssetApiError> {
        let mut tx = begin_write(&self.pool).await?;
        let asset = assets::fetch_asset_by_validation_token(token, &mut tx)
            .await?
            .ok_or(AssetApiError::InvalidValidationToken)?;
        if asset.validated_by_bill_to_party {
            return Ok(TokenOutcome::AlreadyRedeemed(asset));
        }
        let outcome = match assets::mark_validated(asset.id, at, &mut tx).await? {
            Some(asset) => TokenOutcome::Redeemed(asset),
            None => TokenOutcome::AlreadyRedeemed(asset),
        };
        tx.commit().await?;
        Ok(outcome)
    }
}

impl BidManagement for SqliteDatabase {
    async fn insert_bid(&self, bid: NewBid) -> Result<AssetBid, BidApiError> {
        let mut conn = self.pool.acquire().await?;
        let bid = bids::insert_bid(bid, &mut conn).await?;
        Ok(bid)
    }

    async fn fetch_bid(&self, bid_id: i64) -> Result<Option<AssetBid>, BidApiError> {
        let mut conn = self.pool.acquire().await?;
        let bid = bids::fetch_bid(bid_id, &mut conn).await?;
        Ok(bid)
    }

    async fn fetch_bids_for_asset(&self, asset_id: i64) -> Result<Vec<AssetBid>, BidApiError> {
        let mut conn = self.pool.acquire().await?;
        let bids = bids::fetch_bids_for_assets(&[asset_id], &mut conn).await?;
        Ok(bids)
    }

    async fn fetch_bids_for_assets(&self, asset_ids: &[i64]) -> Result<Vec<AssetBid>, BidApiError> {
        let mut conn = self.pool.acquire().await?;
        let bids = bids::fetch_bids_for_assets(asset_ids, &mut conn).await?;
        Ok(bids)
    }

    async fn fetch_bids_for_buyers(&self, buyer_ids: &[i64]) -> Result<Vec<AssetBid>, BidApiError> {
        let mut conn = self.pool.acquire().await?;
        let bids = bids::fetch_bids_for_buyers(buyer_ids, &mut conn).await?;
        Ok(bids)
    }

    async fn update_bid_amount(&self, bid_id: i64, cents_per_unit: Cents) -> Result<AssetBid, BidApiError> {
        let mut tx = begin_write(&self.pool).await?;
        bids::fetch_bid(bid_id, &mut tx).await?.ok_or(BidApiError::BidNotFound)?;
        let bid = bids::update_bid_amount(bid_id, cents_per_unit, &mut tx).await?.ok_or(BidApiError::BidAlreadyAccepted)?;
        tx.commit().await?;
        Ok(bid)
    }

    async fn accept_bid(
        &self,
        bid_id: i64,
        payment_approval_token: &str,
        payment_deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<AcceptedBid, BidApiError> {
        let mut tx = begin_write(&self.pool).await?;
        let bid = bids::fetch_bid(bid_id, &mut tx).await?.ok_or(BidApiError::BidNotFound)?;
        if bid.accepted {
            return Err(BidApiError::BidAlreadyAccepted);
        }
        if bid.is_overdue {
            return Err(BidApiError::BidLapsed);
        }
        let accepted = bids::accept_bid(bid_id, payment_approval_token, payment_deadline, at, &mut tx)
            .await
            .map_err(|e| if is_unique_violation(&e) { BidApiError::AnotherBidAccepted } else { e.into() })?
            .ok_or(BidApiError::AnotherBidAccepted)?;
        let rejected = bids::reject_other_bids(accepted.asset_id, bid_id, at, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Bid #{bid_id} accepted on asset #{}. {} other bids rejected", accepted.asset_id, rejected.len());
        Ok(AcceptedBid { bid: accepted, rejected })
    }

    async fn cancel_bid_acceptance(&self, bid_id: i64) -> Result<AssetBid, BidApiError> {
        let mut tx = begin_write(&self.pool).await?;
        let bid = bids::fetch_bid(bid_id, &mut tx).await?.ok_or(BidApiError::BidNotFound)?;
        if !bid.accepted {
            return Err(BidApiError::BidNotAccepted);
        }
        if bid.payment_approved_by_buyer {
            return Err(BidApiError::PaymentAlreadyApproved);
        }
        let bid = bids::clear_acceptance(bid_id, &mut tx).await?.ok_or(BidApiError::BidNotAccepted)?;
        let n = bids::unreject_other_bids(bid.asset_id, bid_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Acceptance of bid #{bid_id} withdrawn. {n} bids re-opened");
        Ok(bid)
    }

    async fn reject_bid(&self, bid_id: i64, at: DateTime<Utc>) -> Result<AssetBid, BidApiError> {
        let mut tx = begin_write(&self.pool).await?;
        bids::fetch_bid(bid_id, &mut tx).await?.ok_or(BidApiError::BidNotFound)?;
        let bid = bids::reject_bid(bid_id, at, &mut tx).await?.ok_or(BidApiError::PaymentAlreadyApproved)?;
        tx.commit().await?;
        Ok(bid)
    }

    async fn fetch_bid_by_payment_token(&self, token: &str) -> Result<Option<AssetBid>, BidApiError> {
        let mut conn = self.pool.acquire().await?;
        let bid = bids::fetch_bid_by_payment_token(token, &mut conn).await?;
        Ok(bid)
    }

    async fn approve_bid_payment(
        &self,
        bid_id: i64,
        payment: NewBillToPartyPayment,
        at: DateTime<Utc>,
    ) -> Result<TokenOutcome<(AssetBid, Option<BillToPartyPayment>)>, BidApiError> {
        let mut tx = begin_write(&self.pool).await?;
        let bid = bids::fetch_bid(bid_id, &mut tx).await?.ok_or(BidApiError::InvalidPaymentToken)?;
        if bid.payment_approved_by_buyer {
            return Ok(TokenOutcome::AlreadyRedeemed((bid, None)));
        }
        let deadline_passed = bid.payment_deadline.map(|d| at > d).unwrap_or(false);
        if bid.is_overdue || deadline_passed {
            return Err(BidApiError::PaymentDeadlinePassed);
        }
        let bid = bids::mark_payment_approved(bid_id, at, &mut tx).await?.ok_or(BidApiError::InvalidPaymentToken)?;
        let payment = payments::insert_payment(payment, &mut tx).await?;
        tx.commit().await?;
        Ok(TokenOutcome::Redeemed((bid, Some(payment))))
    }

    async fn set_payment_email_flags(
        &self,
        bid_id: i64,
        buyer_confirmation_sent: bool,
        seller_notification_sent: bool,
    ) -> Result<(), BidApiError> {
        let mut conn = self.pool.acquire().await?;
        bids::set_payment_email_flags(bid_id, buyer_confirmation_sent, seller_notification_sent, &mut conn).await?;
        Ok(())
    }
}

impl NotificationManagement for SqliteDatabase {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, NotificationApiError> {
        let mut conn = self.pool.acquire().await?;
        let notification = notifications::insert_notification(notification, &mut conn).await?;
        trace!("🗃️ Notification #{} stored for user #{}", notification.id, notification.user_id);
        Ok(notification)
    }

    async fn fetch_notifications(
        &self,
        user_id: i64,
        role: Option<Role>,
        limit: i64,
    ) -> Result<Vec<Notification>, NotificationApiError> {
        let mut conn = self.pool.acquire().await?;
        let result = notifications::fetch_notifications(user_id, role, limit, &mut conn).await?;
        Ok(result)
    }

    async fn count_unread_notifications(&self, user_id: i64, role: Option<Role>) -> Result<i64, NotificationApiError> {
        let mut conn = self.pool.acquire().await?;
        let count = notifications::count_unread(user_id, role, &mut conn).await?;
        Ok(count)
    }

    async fn mark_notification_read(&self, user_id: i64, notification_id: i64) -> Result<bool, NotificationApiError> {
        let mut conn = self.pool.acquire().await?;
        let n = notifications::mark_read(user_id, notification_id, Utc::now(), &mut conn).await?;
        Ok(n > 0)
    }

    async fn mark_all_notifications_read(
        &self,
        user_id: i64,
        role: Option<Role>,
    ) -> Result<u64, NotificationApiError> {
        let mut conn = self.pool.acquire().await?;
        let n = notifications::mark_all_read(user_id, role, Utc::now(), &mut conn).await?;
        Ok(n)
    }
}

impl PaymentTracking for SqliteDatabase {
    async fn try_acquire_job_lock(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        ttl_ms: i64,
    ) -> Result<bool, PaymentTrackingError> {
        let mut conn = self.pool.acquire().await?;
        let acquired = job_locks::try_acquire(name, holder, now.timestamp_millis(), ttl_ms, &mut conn).await?;
        Ok(acquired)
    }

    async fn release_job_lock(&self, name: &str, holder: &str) -> Result<(), PaymentTrackingError> {
        let mut conn = self.pool.acquire().await?;
        job_locks::release(name, holder, &mut conn).await?;
        Ok(())
    }

    async fn expire_lapsed_bids(&self, now: DateTime<Utc>) -> Result<Vec<AssetBid>, PaymentTrackingError> {
        let mut tx = begin_write(&self.pool).await?;
        let waiting = bids::fetch_awaiting_payment_approval(&mut tx).await?;
        let mut lapsed = Vec::new();
        for bid in waiting.into_iter().filter(|b| b.payment_deadline.map(|d| d < now).unwrap_or(false)) {
            if let Some(bid) = bids::mark_bid_lapsed(bid.id, now, &mut tx).await? {
                lapsed.push(bid);
            }
        }
        tx.commit().await?;
        Ok(lapsed)
    }

    async fn fetch_unpaid_payments(&self) -> Result<Vec<TrackedPayment>, PaymentTrackingError> {
        let mut conn = self.pool.acquire().await?;
        let result = payments::fetch_unpaid_payments(&mut conn).await?;
        Ok(result)
    }

    async fn mark_payment_overdue(&self, payment_id: i64) -> Result<(), PaymentTrackingError> {
        let mut conn = self.pool.acquire().await?;
        payments::mark_overdue(payment_id, &mut conn).await?;
        Ok(())
    }

    async fn mark_overdue_notification_sent(&self, payment_id: i64) -> Result<(), PaymentTrackingError> {
        let mut conn = self.pool.acquire().await?;
        payments::mark_overdue_notification_sent(payment_id, &mut conn).await?;
        Ok(())
    }

    async fn record_reminder_sent(
        &self,
        payment_id: i64,
        sent_at: DateTime<Utc>,
        next_due_at: DateTime<Utc>,
    ) -> Result<i64, PaymentTrackingError> {
        let mut conn = self.pool.acquire().await?;
        let count = payments::record_reminder_sent(payment_id, sent_at, next_due_at, &mut conn).await?;
        Ok(count)
    }

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<BillToPartyPayment>, PaymentTrackingError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment(payment_id, &mut conn).await?;
        Ok(payment)
    }

    async fn mark_payment_paid(
        &self,
        payment_id: i64,
        paid_at: DateTime<Utc>,
    ) -> Result<BillToPartyPayment, PaymentTrackingError> {
        let mut tx = begin_write(&self.pool).await?;
        let result = match payments::mark_paid(payment_id, paid_at, &mut tx).await? {
            Some(payment) => Ok(payment),
            None => match payments::fetch_payment(payment_id, &mut tx).await? {
                Some(_) => Err(PaymentTrackingError::AlreadyPaid),
                None => Err(PaymentTrackingError::PaymentNotFound),
            },
        };
        tx.commit().await?;
        result
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) -> Result<(), sqlx::Error> {
        self.pool.close().await;
        Ok(())
    }

    /// Applies any outstanding schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }
}
