//! fgk-schemas
//!
//! Shared value types of the guard kernel:
//! - order intents, offsets, book tops, account snapshots, positions
//! - canonical JSON + SHA-256 snapshot hashing (replay evidence)
//! - the China-futures trading-session calendar (night session belongs to
//!   the next trading day)
//!
//! Everything here is a plain value. No IO, no wall-clock, no randomness.

mod calendar;
mod canonical;
mod types;

pub use calendar::{SessionCalendar, NIGHT_SESSION_CUTOVER_MIN};
pub use canonical::{canonical_json, canonical_json_of, sha256_hex, snapshot_hash};
pub use types::{AccountSnapshot, BookTop, Offset, OrderIntent, PositionToClose, Side};
