//! # Liqwik server
//! This crate hosts the HTTP server for the Liqwik invoice factoring marketplace. It is responsible for:
//! * Authenticating users and issuing session tokens.
//! * Translating REST requests into calls on the workflow APIs in `liqwik_engine`.
//! * Storing asset documents on disk and delivering the emails the engine composes.
//! * Running the payment tracking sweep on a timer.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! See [routes](routes/index.html). Everything under `/api` needs a session token, apart from the registration and
//! login endpoints and the two token links that are sent by email.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod file_storage;
pub mod helpers;
pub mod mail;
pub mod middleware;
pub mod payment_tracking_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
