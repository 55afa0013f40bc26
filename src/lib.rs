//! ecops - operational tooling for an e-commerce analytics warehouse
//!
//! This library provides the design workbook export, BigQuery inventory and
//! summary, the monthly COGS accounting sync and the scheduled transformation
//! queries with their in-process models.

pub mod accounting;
pub mod config;
pub mod error;
pub mod inventory;
pub mod period;
pub mod scheduler;
pub mod transforms;
pub mod utils;
pub mod warehouse;
pub mod workbook;
