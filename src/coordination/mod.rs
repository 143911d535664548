//! Coordination layer: per-user aggregate context and routing

mod context;
mod coordinator;

pub use context::UserContext;
pub use coordinator::{
    Coordinator, ProcessedReading, SystemStatus, UserStatusReport,
};
