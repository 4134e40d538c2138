pub mod checksum;
pub mod client;
pub mod config;
pub mod error;
pub mod resource;
pub mod state;
pub mod upload;

pub use error::{Error, Result};
