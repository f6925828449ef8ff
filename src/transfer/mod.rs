//! Streamed uploads and downloads with progress reporting.

use std::sync::{Arc, Mutex};

pub mod downloader;
pub mod uploader;

/// Called with `(name, part, position, total)` while bytes are transferred.
///
/// `part` is the index of the file within a multi-file object, `total` is 0
/// when the server does not announce a length.
pub type ProgressListener =
    Arc<Mutex<dyn FnMut(Arc<String>, usize, usize, usize) + Send + Sync + 'static>>;

pub(crate) fn report(
    listener: Option<&ProgressListener>,
    name: &Arc<String>,
    part: usize,
    pos: usize,
    total: usize,
) {
    if let Some(pl) = listener {
        if let Ok(mut f) = pl.lock() {
            f(name.clone(), part, pos, total);
        }
    }
}
