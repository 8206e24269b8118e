//! Asynchronous soft-delete pipeline.
//!
//! Request handlers enqueue [`DeleteRequest`]s; a single consumer task
//! coalesces them across callers and flushes them to the back-end when the
//! buffer fills or a timer fires, with one final flush at shutdown. Between
//! enqueue and flush a lookup may still return the URL — deletion is
//! at-least-eventually, bounded by `max(capacity trigger, tick interval)`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use keyhole_core::{DeleteRequest, Slug, Store};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Buffer size that triggers an immediate flush.
pub const FLUSH_CAPACITY: usize = 10;
/// Tick interval for timer-driven flushes of a partially filled buffer.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(10);
/// Queue depth before producers start awaiting capacity.
pub const QUEUE_DEPTH: usize = 1024;

/// Spawns the pipeline consumer over the receiving end of the deletion
/// queue.
///
/// The consumer is the sole owner of the buffer, so no lock guards it. It
/// exits after the final flush once `shutdown` fires (or once every sender
/// is dropped), and the returned handle resolves when it does.
pub fn spawn(
    store: Arc<dyn Store>,
    queue: mpsc::Receiver<DeleteRequest>,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(store, queue, shutdown))
}

/// Consumer loop: append on receive, flush on capacity, flush on tick,
/// flush once more on shutdown.
async fn run(
    store: Arc<dyn Store>,
    mut rx: mpsc::Receiver<DeleteRequest>,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(FLUSH_INTERVAL);
    // The first tick of a tokio interval fires immediately; skip it so the
    // timer trigger means "FLUSH_INTERVAL after start".
    ticker.tick().await;
    let mut buffer: Vec<DeleteRequest> = Vec::with_capacity(FLUSH_CAPACITY);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                if !buffer.is_empty() {
                    info!(pending = buffer.len(), "flushing deletions at shutdown");
                    flush(store.as_ref(), &buffer).await;
                }
                break;
            }
            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    debug!(pending = buffer.len(), "flushing deletions on timer");
                    flush(store.as_ref(), &buffer).await;
                    buffer.clear();
                }
            }
            request = rx.recv() => {
                match request {
                    Some(request) => {
                        buffer.push(request);
                        if buffer.len() >= FLUSH_CAPACITY {
                            debug!(pending = buffer.len(), "flushing deletions on capacity");
                            flush(store.as_ref(), &buffer).await;
                            buffer.clear();
                        }
                    }
                    None => {
                        if !buffer.is_empty() {
                            flush(store.as_ref(), &buffer).await;
                        }
                        break;
                    }
                }
            }
        }
    }
    rx.close();
}

/// Partitions the buffer by user and issues one batch delete per partition.
///
/// Flush failures are logged and the affected partition dropped: the 202
/// acknowledging the request has long been returned, and the deletion
/// contract is at-least-eventually.
async fn flush(store: &dyn Store, buffer: &[DeleteRequest]) {
    let mut by_user: HashMap<&str, Vec<Slug>> = HashMap::new();
    for request in buffer {
        by_user
            .entry(request.user_id.as_str())
            .or_default()
            .push(request.slug.clone());
    }

    for (user_id, slugs) in by_user {
        if let Err(e) = store.delete_batch(&slugs, user_id).await {
            error!(user_id, count = slugs.len(), error = %e, "deletion flush failed");
        }
    }
}
