//! Library book recommendations with sticky, bid-weighted strategy experiments.

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
