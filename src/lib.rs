//! Tally light server for OBS Studio
//!
//! Watches one source in OBS and tells every connected tally client whether
//! it is in preview, in program, or off.
//!
//! ```text
//!  OBS ──ws──► ObsClient ──► EventBridge ──► Broadcaster ──tcp──► tally clients
//!                            (reconcile)       │
//!                                              ▼
//!                      TallyServer ──► ConnectionRegistry
//! ```
//!
//! # Example
//! ```no_run
//! use simple_tally::obs::{ObsClient, ObsConfig};
//! use simple_tally::{AppConfig, ServerConfig, TallyService};
//!
//! # async fn example() -> simple_tally::Result<()> {
//! let service = TallyService::bind(AppConfig::new("Cam1", ServerConfig::default())).await?;
//! let obs = ObsClient::connect(&ObsConfig::default().password("secret")).await?;
//!
//! service.run(obs, async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod bridge;
pub mod broadcast;
pub mod error;
pub mod obs;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;
pub mod tally;

pub use app::{AppConfig, TallyService};
pub use error::{Error, Result};
pub use server::{ServerConfig, TallyServer};
pub use tally::TallyState;
