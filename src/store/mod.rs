//! Versioned generation store for cached request/response pairs.
//!
//! A generation is an immutable-once-superseded snapshot of cached
//! responses, identified by a version tag. Exactly one generation (the
//! configured tag) is ever queried at runtime; superseded generations are
//! destroyed on activation.

mod storage;
mod traits;

pub use storage::{MemoryStore, SqliteStore};
pub use traits::{GenerationStore, RequestKey, StoredResponse};
