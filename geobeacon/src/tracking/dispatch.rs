//! Hand-off of upload calls from the coordinator.
//!
//! The coordinator is synchronous: it builds an [`UploadRequest`] and hands
//! it to an [`UploadDispatcher`]. Completion comes back later as an
//! [`UploadCompleted`] message on the runtime task, carrying the ticket it
//! was issued with.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::position::Position;
use crate::upload::{LocationBody, UploadClient, UploadOutcome};

/// Identifies which position an upload was for and which tracking session
/// issued it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadTicket {
    pub attempted: Position,
    pub session: u64,
}

/// One upload call.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub path: String,
    pub body: LocationBody,
    pub retry_count: u32,
    pub ticket: UploadTicket,
}

/// Result of a dispatched upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadCompleted {
    pub ticket: UploadTicket,
    pub outcome: UploadOutcome,
}

/// Sink for upload calls.
pub trait UploadDispatcher: Send {
    /// Start the upload. Must not block.
    fn dispatch(&mut self, request: UploadRequest);
}

/// Dispatcher that runs each upload on its own tokio task.
pub struct SpawnedUploads<C> {
    client: Arc<C>,
    tx: mpsc::UnboundedSender<UploadCompleted>,
}

impl<C: UploadClient> SpawnedUploads<C> {
    /// Create a dispatcher and the receiver completions arrive on.
    pub fn new(client: Arc<C>) -> (Self, mpsc::UnboundedReceiver<UploadCompleted>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { client, tx }, rx)
    }
}

impl<C: UploadClient> UploadDispatcher for SpawnedUploads<C> {
    fn dispatch(&mut self, request: UploadRequest) {
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();

        tracing::debug!(
            path = %request.path,
            lat = request.body.lat,
            lng = request.body.lng,
            "Dispatching upload"
        );

        tokio::spawn(async move {
            let outcome = client
                .post(&request.path, &request.body, request.retry_count)
                .await;
            // Receiver gone means the runtime has shut down
            let _ = tx.send(UploadCompleted {
                ticket: request.ticket,
                outcome,
            });
        });
    }
}
