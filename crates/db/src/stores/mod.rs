use tenderdeck_core::errors::ApplicationError;

pub mod approval;
pub mod memory;
pub mod user;

pub use approval::SqlApprovalStore;
pub use memory::{InMemoryApprovalStore, InMemoryUserStore};
pub use user::SqlUserStore;

fn persistence(err: sqlx::Error) -> ApplicationError {
    ApplicationError::Persistence(err.to_string())
}

fn decode(message: impl Into<String>) -> ApplicationError {
    ApplicationError::Persistence(message.into())
}
