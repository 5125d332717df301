//! Client side of the todo list: a local cache kept in step with the remote
//! store through optimistic mutations.

pub mod api;
pub mod cache;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod inflight;

pub use api::{PersistenceResult, TodoApi};
pub use cache::{LocalCache, Snapshot};
pub use coordinator::{ListEvent, ListView, MutationCoordinator, MutationPhase, PendingMutation};
pub use error::{MutationError, PersistenceError};
pub use http::{ClientSettings, HttpTodoApi, DEFAULT_REQUEST_TIMEOUT};
pub use inflight::{InFlightDeletes, MutationKind, PendingFlags};
