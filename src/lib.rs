pub mod abi;
pub mod alert;
pub mod amount;
pub mod config;
pub mod error;
pub mod ledger;
pub mod monitor;
pub mod rpc;
