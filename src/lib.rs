//! shelfpass - access control and one-time purchases for paid e-books and resources
//!
//! This library provides the entitlement and fulfillment core (who can open
//! what, checkout, idempotent payment confirmation, purchase history), plus
//! its storage, payment processor integration, and HTTP handlers.

pub mod access;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod models;
pub mod notifications;
pub mod pagination;
pub mod payments;
