pub mod config;
pub mod error;
pub mod models;
pub mod stash;

pub use config::{ClientConfig, Config, Credentials};
pub use error::{ClientError, ExtractionError, Result};
pub use stash::StashClient;
