//! Archive scheduling module.
//!
//! Watches pending sessions and finalizes each batch once its quiet
//! period has elapsed: pack, split, send, clean up.

mod runner;

pub use runner::{ArchiveScheduler, SchedulerMessage};
