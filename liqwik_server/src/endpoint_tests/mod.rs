mod auth;
mod helpers;
mod marketplace;
mod mocks;
mod notifications;
