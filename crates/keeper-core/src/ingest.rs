use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;

use crate::backend::Backend;
use crate::error::Result;
use crate::record::{BlockRecord, FileVersion};

/// A metadata record waiting to be appended to its host's log.
pub struct MetaWrite {
    pub hostname: String,
    pub meta: FileVersion,
}

/// Fire-and-forget submission side of the ingestion pipeline, held by the
/// request handlers. Cloning shares the same underlying queues.
///
/// Submission never blocks and never fails at the protocol level: the record
/// is acknowledged once it is queued. A write that later fails is only
/// observable in the log, and the next needed-blocks round trip is the
/// recovery path.
#[derive(Clone)]
pub struct Dispatcher {
    meta_tx: mpsc::UnboundedSender<MetaWrite>,
    block_tx: mpsc::UnboundedSender<BlockRecord>,
}

impl Dispatcher {
    /// Hand a file-version record to the metadata writer. Ownership moves to
    /// the queue.
    pub fn submit_metadata(&self, hostname: String, meta: FileVersion) {
        if self
            .meta_tx
            .send(MetaWrite { hostname, meta })
            .is_err()
        {
            tracing::warn!("metadata writer is gone; dropping record");
        }
    }

    /// Hand a block to the block writer. Ownership moves to the queue.
    pub fn submit_block(&self, block: BlockRecord) {
        if self.block_tx.send(block).is_err() {
            tracing::warn!("block writer is gone; dropping block");
        }
    }
}

/// The two long-lived writer threads. Joining waits for both queues to drain
/// after every [`Dispatcher`] clone has been dropped.
pub struct Ingest {
    meta_thread: JoinHandle<()>,
    block_thread: JoinHandle<()>,
}

impl Ingest {
    pub fn join(self) {
        if self.meta_thread.join().is_err() {
            tracing::error!("metadata writer thread panicked");
        }
        if self.block_thread.join().is_err() {
            tracing::error!("block writer thread panicked");
        }
    }
}

/// Spawn the two writer threads over `backend` and return them together with
/// the submission handle.
///
/// Each queue is unbounded with exactly one consumer. Writes for one host are
/// therefore serialised in submission order; block writes carry no ordering
/// between distinct digests. A failed write is logged and the loop continues;
/// the writer threads never die on I/O errors.
pub fn start(backend: Arc<dyn Backend>) -> Result<(Ingest, Dispatcher)> {
    let (meta_tx, mut meta_rx) = mpsc::unbounded_channel::<MetaWrite>();
    let (block_tx, mut block_rx) = mpsc::unbounded_channel::<BlockRecord>();

    let meta_backend = Arc::clone(&backend);
    let meta_thread = thread::Builder::new()
        .name("meta-writer".into())
        .spawn(move || {
            while let Some(write) = meta_rx.blocking_recv() {
                tracing::debug!(host = %write.hostname, file = %write.meta.name, "appending metadata record");
                if let Err(e) = meta_backend.store_metadata(&write.hostname, &write.meta) {
                    tracing::error!(host = %write.hostname, error = %e, "failed to append metadata record");
                }
            }
        })?;

    let block_thread = thread::Builder::new()
        .name("block-writer".into())
        .spawn(move || {
            while let Some(block) = block_rx.blocking_recv() {
                if let Err(e) = backend.store_block(&block) {
                    tracing::error!(hash = %block.hash, error = %e, "failed to store block");
                }
            }
        })?;

    Ok((
        Ingest {
            meta_thread,
            block_thread,
        },
        Dispatcher { meta_tx, block_tx },
    ))
}
