//! The operation surface: typed command methods grouped by data type.
//!
//! Every method here is a thin adapter — build a [`Command`](crate::Command),
//! hand it to the connection core's dispatch, convert the reply. In
//! pipelined or transactional mode the returned values are sentinels;
//! the real outcomes arrive from `close_pipeline` or `exec`.

mod hashes;
mod keys;
mod lists;
mod pubsub;
mod scripting;
mod server;
mod sets;
mod sorted_sets;
mod strings;

pub use keys::{SortOptions, SortOrder, SortResult};
pub use lists::InsertPosition;
pub use strings::BitOp;
