//! Single-writer edit session
//!
//! Moves a [`DefinitionBuilder`] into its own tokio task. Callers hold a
//! cheap handle and send [`BuilderCommand`]s through a queue; the task
//! applies them one at a time, so concurrent callers never interleave
//! inside an operation.

use super::{BuilderCommand, BuilderError, DefinitionBuilder};
use crate::core::PipelineDefinition;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

const QUEUE_DEPTH: usize = 64;

enum Request {
    Apply {
        command: BuilderCommand,
        reply: oneshot::Sender<Result<(), BuilderError>>,
    },
    Snapshot {
        reply: oneshot::Sender<(PipelineDefinition, bool)>,
    },
    Validate {
        reply: oneshot::Sender<Vec<String>>,
    },
}

/// Handle to a builder owned by a background task
#[derive(Clone)]
pub struct EditSession {
    requests: mpsc::Sender<Request>,
}

/// The task side; returned from [`EditSession::spawn`] so the caller can
/// take the builder back with [`SessionWorker::close`]
pub struct SessionWorker {
    handle: JoinHandle<DefinitionBuilder>,
}

impl EditSession {
    /// Start a session around `builder`
    pub fn spawn(builder: DefinitionBuilder) -> (Self, SessionWorker) {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let handle = tokio::spawn(run_session(builder, rx));
        (Self { requests: tx }, SessionWorker { handle })
    }

    /// Apply one command and wait for its result
    pub async fn apply(&self, command: BuilderCommand) -> Result<(), BuilderError> {
        let (reply, response) = oneshot::channel();
        self.send(Request::Apply { command, reply }).await?;
        response.await.map_err(|_| BuilderError::SessionClosed)?
    }

    /// Current working copy and its dirty flag
    pub async fn snapshot(&self) -> Result<(PipelineDefinition, bool), BuilderError> {
        let (reply, response) = oneshot::channel();
        self.send(Request::Snapshot { reply }).await?;
        response.await.map_err(|_| BuilderError::SessionClosed)
    }

    pub async fn validate(&self) -> Result<Vec<String>, BuilderError> {
        let (reply, response) = oneshot::channel();
        self.send(Request::Validate { reply }).await?;
        response.await.map_err(|_| BuilderError::SessionClosed)
    }

    async fn send(&self, request: Request) -> Result<(), BuilderError> {
        self.requests
            .send(request)
            .await
            .map_err(|_| BuilderError::SessionClosed)
    }
}

impl SessionWorker {
    /// Wait until every handle is dropped, then return the builder
    pub async fn close(self) -> Result<DefinitionBuilder, BuilderError> {
        self.handle.await.map_err(|_| BuilderError::SessionClosed)
    }
}

async fn run_session(
    mut builder: DefinitionBuilder,
    mut requests: mpsc::Receiver<Request>,
) -> DefinitionBuilder {
    debug!("edit session started");
    while let Some(request) = requests.recv().await {
        match request {
            Request::Apply { command, reply } => {
                let _ = reply.send(builder.apply(command));
            }
            Request::Snapshot { reply } => {
                let _ = reply.send((builder.snapshot(), builder.is_dirty()));
            }
            Request::Validate { reply } => {
                let _ = reply.send(builder.validate());
            }
        }
    }
    debug!("edit session closed");
    builder
}
