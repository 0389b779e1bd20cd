//! Adapters connecting the domain's ports to real infrastructure.

pub mod http;
pub mod postgres;
pub mod stripe;
