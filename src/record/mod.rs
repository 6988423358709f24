//! Recognition and extraction of vdbench interval report lines.

pub mod classify;
pub mod schema;
pub mod snapshot;

pub use self::classify::{classify, is_candidate};
pub use self::schema::Schema;
pub use self::snapshot::{ExtractError, Snapshot};
