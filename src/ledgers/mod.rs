pub mod ledger;
pub mod ledger_service;
pub mod margin;
