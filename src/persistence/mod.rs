//! Audit-trail persistence

mod store;

pub use store::{tables, MemoryStore, StoredRecord};
