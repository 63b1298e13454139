// File: ./src/client/mod.rs
pub mod core;
pub(crate) mod endpoints;
pub mod fetch;
pub mod headers;

pub use crate::client::core::CompassClient;
pub use crate::client::fetch::Pagination;
