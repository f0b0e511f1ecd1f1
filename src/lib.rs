pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod handlers;
pub mod marketplace;
pub mod models;
pub mod pricing;
pub mod quote;
pub mod seed;
pub mod smart_match;
pub mod store;
pub mod workflow;
