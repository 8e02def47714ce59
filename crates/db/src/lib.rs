pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod stores;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{seed_demo_users, verify_demo_users, SeedResult};
pub use stores::{InMemoryApprovalStore, InMemoryUserStore, SqlApprovalStore, SqlUserStore};
