//! Webhook receiver for Sonos cloud event deliveries.
//!
//! The cloud pushes namespace events (playback, metadata, volume, group
//! changes) as HTTP `POST`s to a URL registered per household. This crate
//! provides that endpoint:
//!
//! - [`CallbackServer`]: warp server bound to a free port in a range that
//!   validates the routing headers and JSON body of each delivery.
//! - [`WebhookRouter`]: filters deliveries by registered household and
//!   forwards them to a channel.
//! - [`WebhookPayload`]: household, target, namespace, type and raw JSON body.
//!
//! The crate knows nothing about the meaning of the body; decoding happens
//! in the consuming crates.
//!
//! ```no_run
//! use callback_server::{CallbackServer, WebhookPayload};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (tx, mut rx) = mpsc::unbounded_channel::<WebhookPayload>();
//!     let server = CallbackServer::new((3400, 3500), tx).await?;
//!     server.router().register("Sonos_abc").await;
//!
//!     tokio::spawn(async move {
//!         while let Some(delivery) = rx.recv().await {
//!             println!("{:?} for {}", delivery.namespace, delivery.target_value);
//!         }
//!     });
//!
//!     server.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod router;
mod server;

pub use error::{Result, WebhookError};
pub use router::{WebhookPayload, WebhookRouter};
pub use server::{CallbackServer, HOUSEHOLD_HEADER, NAMESPACE_HEADER, TARGET_HEADER, TYPE_HEADER};
