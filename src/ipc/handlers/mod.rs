pub mod core;
pub mod registration;
pub mod reports;
