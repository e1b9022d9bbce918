#![allow(dead_code)]
use chrono::{Duration, NaiveDate, Utc};
use liqwik_engine::{
    asset_objects::{NewAssetRequest, SellerAssetView},
    bid_objects::{BidRequest, SellerBidAction},
    db_types::{AssetBid, BillToParty, Role},
    test_utils::{
        create_bill_to_party,
        create_user_with_role,
        test_db,
        MemoryDocumentStore,
        RecordingMailer,
        TestParticipant,
    },
    AdminApi,
    AssetFlowApi,
    AuthApi,
    BidFlowApi,
    NotificationApi,
    PaymentTrackingApi,
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub const PUBLIC_URL: &str = "https://liqwik.test";

/// A complete engine wired to a throwaway database.
pub struct Marketplace {
    pub db: SqliteDatabase,
    pub mailer: RecordingMailer,
    pub store: MemoryDocumentStore,
    pub auth: AuthApi<SqliteDatabase, RecordingMailer>,
    pub admin: AdminApi<SqliteDatabase>,
    pub assets: AssetFlowApi<SqliteDatabase, RecordingMailer, MemoryDocumentStore>,
    pub bids: BidFlowApi<SqliteDatabase, RecordingMailer>,
    pub notifications: NotificationApi<SqliteDatabase>,
    pub tracking: PaymentTrackingApi<SqliteDatabase, RecordingMailer>,
}

impl Marketplace {
    pub async fn new() -> Self {
        let db = test_db().await;
        let mailer = RecordingMailer::new();
        let store = MemoryDocumentStore::new();
        Self {
            auth: AuthApi::new(db.clone(), mailer.clone()),
            admin: AdminApi::new(db.clone()),
            assets: AssetFlowApi::new(db.clone(), mailer.clone(), store.clone(), PUBLIC_URL),
            bids: BidFlowApi::new(db.clone(), mailer.clone(), PUBLIC_URL),
            notifications: NotificationApi::new(db.clone()),
            tracking: PaymentTrackingApi::new(db.clone(), mailer.clone()),
            db,
            mailer,
            store,
        }
    }

    pub async fn tear_down(mut self) {
        let url = self.db.url().to_string();
        if let Err(e) = self.db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        if let Err(e) = Sqlite::drop_database(&url).await {
            warn!("🚀️ Could not remove test database {url}: {e}");
        }
    }

    pub async fn seller(&self, name: &str) -> TestParticipant {
        create_user_with_role(&self.db, name, Role::Seller).await
    }

    pub async fn buyer(&self, name: &str) -> TestParticipant {
        create_user_with_role(&self.db, name, Role::Buyer).await
    }

    pub async fn bill_to_party(&self, name: &str) -> BillToParty {
        create_bill_to_party(&self.db, name, None).await
    }

    /// A draft asset worth 1000.00 with its payment date 60 days out.
    pub async fn draft_asset(&self, seller: &TestParticipant, btp: &BillToParty, invoice: &str) -> SellerAssetView {
        let req = asset_request(invoice, btp.id, 1000.0, days_from_today(60));
        self.assets.create_asset(seller.id(), req, vec![]).await.expect("Could not create asset")
    }

    /// A draft asset taken through fee approval and posting, ready for bids.
    pub async fn posted_asset(&self, seller: &TestParticipant, btp: &BillToParty, invoice: &str) -> SellerAssetView {
        let view = self.draft_asset(seller, btp, invoice).await;
        self.assets.approve_fee(seller.id(), view.asset.id).await.expect("Could not approve fee");
        self.assets.post_asset(seller.id(), view.asset.id).await.expect("Could not post asset");
        self.assets.seller_asset(seller.id(), view.asset.id).await.expect("Could not fetch asset")
    }

    pub async fn bid(&self, buyer: &TestParticipant, asset_id: i64, amount: f64) -> AssetBid {
        let req = BidRequest { total_amount: Some(amount) };
        self.bids.place_bid(buyer.id(), asset_id, req).await.expect("Could not place bid")
    }

    pub async fn accept(&self, seller: &TestParticipant, asset_id: i64, bid_id: i64) -> Vec<AssetBid> {
        let action = SellerBidAction { bid_id, action: "accept".into() };
        self.bids.seller_action(seller.id(), asset_id, action).await.expect("Could not accept bid")
    }

    pub async fn bid_by_id(&self, bid_id: i64) -> AssetBid {
        use liqwik_engine::traits::BidManagement;
        self.db.fetch_bid(bid_id).await.expect("DB error").expect("Bid not found")
    }
}

pub fn asset_request(invoice: &str, bill_to_party_id: i64, face_value: f64, payment_date: NaiveDate) -> NewAssetRequest {
    NewAssetRequest {
        invoice_number: invoice.into(),
        invoice_date: Some(Utc::now().date_naive()),
        face_value: Some(face_value),
        payment_date: Some(payment_date),
        term_months: Some(3),
        apy: Some(8.5),
        fees: Some(25.0),
        bill_to_party_id: Some(bill_to_party_id),
    }
}

pub fn days_from_today(days: i64) -> NaiveDate {
    (Utc::now() + Duration::days(days)).date_naive()
}
