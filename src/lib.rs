pub mod apis;
pub mod errors;
pub mod ledgers;
pub mod standardized_types;
