//! Queue module: job state, retry schedule, and the in-memory JobStore.

mod memory;
mod record;
mod retry;
mod state;

pub use memory::InMemoryJobStore;
pub use record::JobRecord;
pub use retry::RetryPolicy;
pub use state::JobStatus;
