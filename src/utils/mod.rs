//! Shared utility functions.
//!
//! - [`content_length`] - Expected size extraction from HTTP responses
//! - [`filename`] - Server-suggested file names
//! - [`fs`] - Path normalization, file name encoding and the atomic-or-failing file move

pub mod content_length;
pub mod filename;
pub mod fs;

pub use content_length::{expected_total, parse_content_range_total};
pub use filename::suggested_filename;
pub use fs::{encode_file_component, move_replacing, normalize_path};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks `mutex`, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
