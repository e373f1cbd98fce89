//! Bucket scan scheduling

mod bucket;
mod scheduler;

pub use scheduler::BucketScheduler;
