//! Live Feed - real-time object positions for connected clients
//!
//! This crate provides:
//! - The wire schema for position snapshots and alert digests
//! - [`LiveFeed`], which gives every subscriber its own ticking task and
//!   bounded delivery channel
//! - Deterministic presentation jitter keyed by object identity
//! - A WebSocket server that forwards a subscription and alert digests to
//!   each connected client
//!
//! # Isolation
//!
//! A subscriber that stops reading only loses its own ticks: delivery uses
//! `try_send` on a per-subscriber channel, so neither its ticker nor any
//! other subscriber ever waits on it. Dropping the [`Subscription`] aborts
//! its task.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use orbitwatch_live_feed::{FeedConfig, LiveFeed};
//! use orbitwatch_store::MemoryStore;
//!
//! # async fn demo() -> Result<(), orbitwatch_live_feed::FeedError> {
//! let feed = LiveFeed::new(Arc::new(MemoryStore::new()), FeedConfig::default())?;
//! let mut subscription = feed.subscribe();
//! while let Some(snapshot) = subscription.recv().await {
//!     println!("{} objects at tick {}", snapshot.positions.len(), snapshot.tick);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod feed;
pub mod jitter;
pub mod schema;
pub mod websocket;

pub use error::FeedError;
pub use feed::{FeedConfig, LiveFeed, Subscription};
pub use jitter::Jitter;
pub use schema::{AlertDigest, FeedMessage, ObjectProjection, PositionSnapshot};
pub use websocket::WsServer;
