//! Loki push sink for the barrage load generator.
//!
//! ```no_run
//! use barrage::prelude::*;
//! use barrage::mock::{MockGun, MockGunConfig};
//! use barrage_loki::{LokiClient, LokiConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sink = LokiClient::new(LokiConfig::from_env())?;
//!     let generator = Generator::new(
//!         GeneratorConfig::new(Schedule::rps(5))
//!             .sink(Arc::new(sink))
//!             .gun(MockGun::new(MockGunConfig::default())),
//!     )?;
//!     generator.run()?;
//!     generator.wait().await;
//!     Ok(())
//! }
//! ```
mod client;
mod config;
mod error;

pub use client::LokiClient;
pub use config::LokiConfig;
pub use error::LokiError;
