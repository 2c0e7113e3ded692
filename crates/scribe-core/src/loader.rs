//! Background loading of resources.
//!
//! A [`Loader`] reads one resource on a worker thread in fixed-size chunks, posting
//! [`LoadMessage`]s over a channel. The worker never touches a [`crate::Document`]: the UI
//! thread receives [`LoadMessage::Finished`] and installs the bytes with
//! [`crate::Workspace::finish_load`]. Cancellation is checked at chunk boundaries.

use crate::vfs::{Vfs, VfsError};
use crossbeam_channel::{Receiver, Sender};
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use url::Url;

/// Default chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 65_536;

/// Resources longer than this many chunks are read with chunks four times larger.
pub const LARGE_RESOURCE_CHUNKS: u64 = 100;

/// Messages posted by the worker.
#[derive(Debug)]
pub enum LoadMessage {
    /// Bytes read so far.
    Progress {
        /// Percentage of the resource read (0..=100).
        percent: u8,
        /// Bytes read so far.
        bytes_read: u64,
    },
    /// The whole resource was read.
    Finished {
        /// Resource URL.
        url: Url,
        /// Raw bytes.
        bytes: Vec<u8>,
    },
    /// The load was cancelled; partial data is discarded.
    Cancelled {
        /// Resource URL.
        url: Url,
    },
    /// Reading failed.
    Failed {
        /// Resource URL.
        url: Url,
        /// Cause.
        error: VfsError,
    },
}

impl LoadMessage {
    /// Returns `true` for the final message of a load.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// Chunk size for a resource of `total` bytes.
pub fn chunk_size_for(total: u64, hint: Option<usize>) -> usize {
    let base = hint.unwrap_or(DEFAULT_CHUNK_SIZE).max(DEFAULT_CHUNK_SIZE);
    if total > base as u64 * LARGE_RESOURCE_CHUNKS {
        base * 4
    } else {
        base
    }
}

/// Spawns background loads.
#[derive(Debug, Clone, Copy, Default)]
pub struct Loader;

impl Loader {
    /// Start reading `url` on a worker thread.
    pub fn spawn(vfs: Arc<dyn Vfs>, url: Url, chunk_hint: Option<usize>) -> LoadHandle {
        let (tx, rx) = crossbeam_channel::unbounded();
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);
        let worker_url = url.clone();
        let thread = std::thread::Builder::new()
            .name("scribe-loader".to_string())
            .spawn(move || run_load(vfs.as_ref(), worker_url, chunk_hint, &worker_cancel, &tx));

        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::error!(%url, error = %err, "failed to spawn loader thread");
                None
            }
        };
        LoadHandle {
            url,
            rx,
            cancel,
            thread,
        }
    }
}

fn run_load(
    vfs: &dyn Vfs,
    url: Url,
    chunk_hint: Option<usize>,
    cancel: &AtomicBool,
    tx: &Sender<LoadMessage>,
) {
    let message = match read_chunks(vfs, &url, chunk_hint, cancel, tx) {
        Ok(Some(bytes)) => {
            tracing::info!(%url, bytes = bytes.len(), "load finished");
            LoadMessage::Finished { url, bytes }
        }
        Ok(None) => {
            tracing::info!(%url, "load cancelled");
            LoadMessage::Cancelled { url }
        }
        Err(error) => {
            tracing::warn!(%url, %error, "load failed");
            LoadMessage::Failed { url, error }
        }
    };
    // The receiver may be gone if the handle was dropped.
    let _ = tx.send(message);
}

fn read_chunks(
    vfs: &dyn Vfs,
    url: &Url,
    chunk_hint: Option<usize>,
    cancel: &AtomicBool,
    tx: &Sender<LoadMessage>,
) -> Result<Option<Vec<u8>>, VfsError> {
    let total = vfs.size(url).unwrap_or(0);
    let chunk = chunk_size_for(total, chunk_hint);
    let mut reader = vfs.open_read(url)?;
    let mut bytes = Vec::with_capacity(total as usize);
    let mut buf = vec![0u8; chunk];

    loop {
        if cancel.load(Ordering::Relaxed) {
            return Ok(None);
        }
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&buf[..n]);
        let bytes_read = bytes.len() as u64;
        let percent = if total == 0 {
            100
        } else {
            ((bytes_read * 100) / total).min(100) as u8
        };
        tracing::debug!(%url, percent, bytes_read, "load chunk");
        let _ = tx.send(LoadMessage::Progress {
            percent,
            bytes_read,
        });
    }
    if cancel.load(Ordering::Relaxed) {
        return Ok(None);
    }
    Ok(Some(bytes))
}

/// Handle to a running load.
#[derive(Debug)]
pub struct LoadHandle {
    url: Url,
    rx: Receiver<LoadMessage>,
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl LoadHandle {
    /// URL being loaded.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Channel carrying progress and the final message.
    pub fn progress(&self) -> &Receiver<LoadMessage> {
        &self.rx
    }

    /// Ask the worker to stop at the next chunk boundary.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`LoadHandle::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Block until the worker is done and return its final message.
    pub fn wait(mut self) -> LoadMessage {
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!(url = %self.url, "loader thread panicked");
        }
        let mut last = None;
        while let Ok(message) = self.rx.try_recv() {
            if message.is_terminal() {
                last = Some(message);
            }
        }
        last.unwrap_or_else(|| LoadMessage::Failed {
            url: self.url.clone(),
            error: VfsError::Io(std::io::Error::other("loader exited without a result")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_size_grows_for_long_resources() {
        assert_eq!(chunk_size_for(10, None), DEFAULT_CHUNK_SIZE);
        assert_eq!(
            chunk_size_for(DEFAULT_CHUNK_SIZE as u64 * 100, None),
            DEFAULT_CHUNK_SIZE
        );
        assert_eq!(
            chunk_size_for(DEFAULT_CHUNK_SIZE as u64 * 100 + 1, None),
            DEFAULT_CHUNK_SIZE * 4
        );
    }
}
