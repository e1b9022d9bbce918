//! Helpers for tests of the engine and of crates built on it: throwaway databases, a mailer that records what it is
//! asked to send, an in-memory document store, and shortcuts for setting up marketplace participants.
pub mod fixtures;
pub mod memory_store;
pub mod prepare_env;
pub mod recording_mailer;

pub use fixtures::{create_bill_to_party, create_user_with_role, grant_role, TestParticipant, TEST_PASSWORD};
pub use memory_store::MemoryDocumentStore;
pub use prepare_env::{create_database, prepare_test_env, random_db_path, run_migrations, test_db};
pub use recording_mailer::RecordingMailer;
