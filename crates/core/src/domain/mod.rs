pub mod approval;
pub mod tender;
pub mod user;
