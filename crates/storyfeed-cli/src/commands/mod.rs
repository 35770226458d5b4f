pub mod ledger;
pub mod list;
pub mod run;
