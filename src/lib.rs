//! Streaming radar plot ingestion and live query engine.
//!
//! This library provides functionality to:
//! - Consume bearing/range reports over a persistent WebSocket feed
//! - Project each report onto the WGS-84 ellipsoid from a fixed station
//! - Keep the latest report per source in a live, snapshot-isolated store
//! - Answer paginated table queries and bounding-box queries over it
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │    Feed     │───▶│ Normalizer  │───▶│ Live Store  │
//! │ (WebSocket) │    │ (projector) │    │ (stn-keyed) │
//! └──────┬──────┘    └─────────────┘    └──────┬──────┘
//!        │ debounced publish                   │ snapshot
//!        ▼                                     ▼
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  Sessions   │◀──▶│ Dispatcher  │───▶│Query Engine │
//! │ (WebSocket) │    │ (commands)  │    │(table/area) │
//! └─────────────┘    └─────────────┘    └─────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use plotwatch::{
//!     feed::{FeedConfig, FeedConnector},
//!     geodesy::RangeUnit,
//!     normalize::{Normalizer, Station},
//!     store::LiveStore,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(LiveStore::new());
//!     let normalizer = Normalizer::new(Station::default(), RangeUnit::Meters);
//!
//!     let connector = FeedConnector::new(
//!         FeedConfig::default(),
//!         normalizer,
//!         Arc::clone(&store),
//!     );
//!
//!     // Runs until connector.stop(); reconnects forever.
//!     connector.run().await;
//! }
//! ```

pub mod dispatch;
pub mod feed;
pub mod geodesy;
pub mod normalize;
pub mod query;
pub mod server;
pub mod simulate;
pub mod store;
pub mod types;

pub use dispatch::{Command, Dispatcher, Response};
pub use feed::{ConnectionState, FeedConfig, FeedConnector, FeedStats};
pub use normalize::{NormalizeError, Normalizer, Station};
pub use query::{AreaResponse, QueryState, TablePage};
pub use store::LiveStore;
pub use types::{AreaBounds, FieldKey, FilterClause, RawReport, Report, SortColumn, StationId};
