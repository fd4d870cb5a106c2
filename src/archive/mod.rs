//! Archive creation for finalized media batches.
//!
//! Batches are packed into a single zip with stored (no-op) compression,
//! then split into numbered volumes when they exceed the configured size
//! limit so each upload stays under the Bot API ceiling.

mod builder;
mod volumes;

pub use builder::{ArchiveError, build_archive};
pub use volumes::split_into_volumes;
