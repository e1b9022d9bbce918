use std::collections::HashMap;

use cucumber::World;
use liqwik_engine::{
    db_types::{Asset, AssetBid, BillToParty},
    test_utils::{prepare_test_env, random_db_path, MemoryDocumentStore, RecordingMailer, TestParticipant},
    traits::{AssetManagement, BidManagement},
    AssetFlowApi,
    BidFlowApi,
    NotificationApi,
    PaymentTrackingApi,
    SqliteDatabase,
};
use log::*;

pub const PUBLIC_URL: &str = "https://liqwik.test";

#[derive(Default, Debug, World)]
pub struct MarketplaceWorld {
    pub system: Option<MarketplaceSystem>,
    pub participants: HashMap<String, TestParticipant>,
    pub bill_to_parties: HashMap<String, BillToParty>,
    pub assets: HashMap<String, i64>,
    pub last_error: Option<String>,
}

#[derive(Debug)]
pub struct MarketplaceSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub mailer: RecordingMailer,
    pub assets: AssetFlowApi<SqliteDatabase, RecordingMailer, MemoryDocumentStore>,
    pub bids: BidFlowApi<SqliteDatabase, RecordingMailer>,
    pub notifications: NotificationApi<SqliteDatabase>,
    pub tracking: PaymentTrackingApi<SqliteDatabase, RecordingMailer>,
}

impl MarketplaceSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let mailer = RecordingMailer::new();
        Self {
            db_path: url,
            assets: AssetFlowApi::new(db.clone(), mailer.clone(), MemoryDocumentStore::new(), PUBLIC_URL),
            bids: BidFlowApi::new(db.clone(), mailer.clone(), PUBLIC_URL),
            notifications: NotificationApi::new(db.clone()),
            tracking: PaymentTrackingApi::new(db.clone(), mailer.clone()),
            db,
            mailer,
        }
    }
}

impl MarketplaceWorld {
    pub fn sys(&self) -> &MarketplaceSystem {
        self.system.as_ref().expect("Marketplace not initialised")
    }

    pub fn participant(&self, name: &str) -> &TestParticipant {
        self.participants.get(name).unwrap_or_else(|| panic!("No participant named {name}"))
    }

    pub fn asset_id(&self, invoice: &str) -> i64 {
        *self.assets.get(invoice).unwrap_or_else(|| panic!("No asset for invoice {invoice}"))
    }

    pub async fn asset(&self, invoice: &str) -> Asset {
        let id = self.asset_id(invoice);
        self.sys().db.fetch_asset(id).await.expect("DB error").expect("Asset vanished")
    }

    /// The bid placed by `buyer` on the asset for `invoice`.
    pub async fn bid(&self, buyer: &str, invoice: &str) -> AssetBid {
        let buyer_org = self.participant(buyer).org_id;
        let bids = self.sys().db.fetch_bids_for_asset(self.asset_id(invoice)).await.expect("DB error");
        bids.into_iter().find(|b| b.buyer_id == buyer_org).unwrap_or_else(|| panic!("{buyer} has no bid on {invoice}"))
    }

    pub fn record<T, E: std::fmt::Display>(&mut self, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(v) => {
                self.last_error = None;
                Some(v)
            },
            Err(e) => {
                debug!("🚀️ Step failed as expected: {e}");
                self.last_error = Some(e.to_string());
                None
            },
        }
    }
}
