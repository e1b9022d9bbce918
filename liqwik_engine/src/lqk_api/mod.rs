//! # Liqwik workflow API
//!
//! The `lqk_api` module exposes the programmatic API of the marketplace. Each API is a thin struct over a backend that
//! implements the traits in [`crate::traits`], plus a [`crate::mailer::Mailer`] where the workflow sends email.
//!
//! * [`auth_api`] covers registration, role verification, login one-time passwords and role switching.
//! * [`asset_flow_api`] drives an asset from draft to posted or cancelled, and serves its documents.
//! * [`bid_flow_api`] handles bids, the seller's decisions on them and the buyer's payment approval.
//! * [`payment_tracking_api`] runs the reminder and overdue sweep over bill-to party payments.
//! * [`notification_api`] lists notifications and tracks their read state.
//! * [`admin_api`] manages users and the bill-to party directory.
//!
//! State changes are committed before any side effect. Emails and notifications that follow are best effort.
//!
//! ```rust,ignore
//! use liqwik_engine::{BidFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/liqwik.db", 5).await?;
//! let api = BidFlowApi::new(db, mailer, "https://liqwik.example");
//! let listing = api.marketplace(user_id, false).await?;
//! ```

pub mod admin_api;
pub mod asset_flow_api;
pub mod asset_objects;
pub mod auth_api;
pub mod auth_objects;
pub mod bid_flow_api;
pub mod bid_objects;
pub mod notices;
pub mod notification_api;
pub mod payment_tracking_api;
