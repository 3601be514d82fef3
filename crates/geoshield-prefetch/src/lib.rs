//! Background cache warming over a random sample of location groups.

pub mod job;
pub mod sampling;
pub mod scheduler;

pub use job::{JobState, PrefetchAck, PrefetchError, PrefetchReport};
pub use sampling::{sample_count, sample_groups};
pub use scheduler::PrefetchScheduler;
