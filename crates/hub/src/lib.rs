//! An in-process data hub: a typed, hierarchical publish/subscribe
//! router for timestamped samples. Producers create inputs and push;
//! consumers create outputs and register push handlers; administrators
//! define observations and routes between any pair of resources.
//!
//! The hub is single-threaded: every operation runs to completion on
//! the caller's thread, transitive pushes run depth-first, and samples
//! are shared by reference count.

mod admin;
mod arena;
mod error;
mod handler;
mod hub;
mod io;
mod observation;
mod push;
mod query;
mod resource;
mod store;
mod tree;

pub use error::Error;
pub use handler::HandlerRef;
pub use hub::{Hub, SessionId};
pub use observation::Transform;
pub use resource::{Direction, MAX_UNITS_BYTES};
pub use store::{BufferStore, DirBufferStore, MemoryBufferStore};
pub use tree::{EntryKind, TreeChange, MAX_ENTRY_NAME_BYTES, MAX_RESOURCE_PATH_BYTES};

// Callers build and read samples through these.
pub use sample::{Kind, Sample, SampleRef, Value};
