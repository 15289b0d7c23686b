pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod indexer;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;
