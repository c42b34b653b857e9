pub mod lifecycle;
pub mod ledger;
pub mod catalog;
pub mod seed;
