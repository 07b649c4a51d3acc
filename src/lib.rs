pub mod config;
pub mod error;
pub mod models;
pub mod protocol;
pub mod proxy;
pub mod server;

pub use error::{Error, Result};
