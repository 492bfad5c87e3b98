//! Job orchestration: registry, executor, progress relay, state machine.

pub mod executor;
pub mod registry;
pub mod relay;
pub mod state;

pub use registry::TaskRegistry;
pub use relay::{ProgressEvent, ProgressReceiver, ProgressSender, progress_relay};
pub use state::{Job, JobSpec, JobStatus, JobUpdate};
