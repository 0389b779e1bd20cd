//! Amoura Billing - Payment and entitlement reconciliation service
//!
//! Accepts payment-provider lifecycle events, converts them idempotently
//! into durable entitlements and content unlocks, and answers paywall
//! access queries for the Amoura character marketplace.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
