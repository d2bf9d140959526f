//! Progress tracking and fan-out.
//!
//! [`ProgressStore`] holds the latest [`Progress`] per transfer and publishes
//! every change to a [`BroadcastHub`]. Observers either query the store for a
//! point-in-time copy or open a [`ProgressFeed`] for a live event stream.

mod feed;
mod hub;
mod store;
mod types;

pub use feed::{DEFAULT_HEARTBEAT_INTERVAL, ProgressEvent, ProgressFeed};
pub use hub::{BroadcastHub, DEFAULT_SUBSCRIBER_CAPACITY, Subscription};
pub use store::ProgressStore;
pub use types::{Progress, TransferStatus};
