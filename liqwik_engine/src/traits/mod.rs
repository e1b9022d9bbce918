//! # Backend contracts
//!
//! This module defines the behaviour a storage backend must expose to drive the Liqwik marketplace. The workflow APIs
//! in this crate are generic over these traits, so a backend only needs to implement them to be usable by the server.
//!
//! * [`UserManagement`] covers users, their roles, email verification and login one-time passwords.
//! * [`OrganizationManagement`] resolves which seller and buyer organizations a user may act for, and manages the
//!   bill-to party directory.
//! * [`AssetManagement`] stores assets (invoices) and applies their lifecycle transitions.
//! * [`BidManagement`] stores bids and applies acceptance, rejection and payment approval atomically.
//! * [`NotificationManagement`] persists role-scoped in-app notifications.
//! * [`PaymentTracking`] supports the periodic bill-to party payment sweep.
//! * [`MarketplaceDatabase`] bundles all of the above, for callers that hold one backend for every workflow.
//! * [`DocumentStore`] keeps the files attached to assets. It is the one contract here that is not implemented by
//!   the database.
//!
//! State transitions that have guards are implemented by the backend inside a single transaction. The guard itself
//! lives on the domain types (see [`crate::db_types::Asset`]) so that every backend applies the same rules.
mod asset_management;
mod bid_management;
mod data_objects;
mod document_store;
mod marketplace_database;
mod notification_management;
mod organization_management;
mod payment_tracking;
mod user_management;

pub use asset_management::{AssetApiError, AssetManagement};
pub use bid_management::{BidApiError, BidManagement};
pub use data_objects::{NewRegistration, NewUser, RegistrantUser, RegistrationResult, TokenOutcome};
pub use document_store::{DocumentStore, DocumentStoreError};
pub use marketplace_database::MarketplaceDatabase;
pub use notification_management::{NotificationApiError, NotificationManagement};
pub use organization_management::{OrganizationError, OrganizationManagement};
pub use payment_tracking::{PaymentTracking, PaymentTrackingError};
pub use user_management::{AuthApiError, UserManagement};
