//! Drives a [`GenerationSession`] against a [`TextGenerator`]
//!
//! The runner executes tasks in order on a spawned tokio task and reports
//! progress over a bounded channel, so a slow consumer holds the
//! generator back instead of buffering without limit.
//!
//! Cancellation:
//! - [`SessionHandle::cancel`] trips a [`CancellationToken`] that is
//!   checked around every await point, dropping the in-flight stream.
//! - Dropping the event receiver has the same effect.

use crate::config::SessionConfig;
use crate::conversation::{Insight, SavedConversation};
use crate::error::{DbCoachError, Result};
use crate::generation::TextGenerator;
use crate::prompts::build_task_request;
use crate::session::state::GenerationSession;

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default capacity of the event channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Progress notification emitted while a session runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A task became active
    TaskStarted {
        task_id: String,
        title: String,
        agent: String,
    },
    /// Text streamed for the active task
    Chunk { task_id: String, text: String },
    /// A task finished
    TaskCompleted { task_id: String },
    /// An agent note was recorded
    Insight(Insight),
    /// Every task finished; carries the finished record
    Completed(Box<SavedConversation>),
    /// Generation failed with the upstream message
    Failed { message: String },
    /// The session was cancelled
    Cancelled,
}

impl SessionEvent {
    /// Whether this is the last event of a session
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed(_) | Self::Failed { .. } | Self::Cancelled
        )
    }
}

/// Why a run stopped early
enum Stop {
    Cancelled,
    Failed(anyhow::Error),
}

/// Spawns sessions on the tokio runtime
///
/// # Examples
///
/// ```
/// use dbcoach::generation::FakeGenerator;
/// use dbcoach::session::{GenerationSession, SessionRunner};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> dbcoach::error::Result<()> {
/// let generator = Arc::new(FakeGenerator::new().with_chunks("schema", ["Hel", "lo"]));
/// let runner = SessionRunner::new(generator, 16);
/// let handle = runner.spawn(GenerationSession::new("a shop", "PostgreSQL"));
/// let conversation = handle.wait().await?;
/// assert_eq!(conversation.generated_content["schema"], "Hello");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SessionRunner {
    generator: Arc<dyn TextGenerator>,
    channel_capacity: usize,
}

impl SessionRunner {
    /// Create a runner; a zero capacity is raised to one
    pub fn new(generator: Arc<dyn TextGenerator>, channel_capacity: usize) -> Self {
        Self {
            generator,
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Create a runner using the session configuration
    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &SessionConfig) -> Self {
        Self::new(generator, config.channel_capacity)
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// Run `session` on a new task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, session: GenerationSession) -> SessionHandle {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let cancel = CancellationToken::new();
        let generator = Arc::clone(&self.generator);
        let token = cancel.clone();

        tracing::info!(
            "Starting session {} with generator {}",
            session.id(),
            generator.name()
        );
        let join = tokio::spawn(run_session(generator, session, tx, token));

        SessionHandle {
            events: rx,
            cancel,
            join,
        }
    }
}

/// Handle to a running session
pub struct SessionHandle {
    events: mpsc::Receiver<SessionEvent>,
    cancel: CancellationToken,
    join: JoinHandle<Result<SavedConversation>>,
}

impl SessionHandle {
    /// Receive the next event; `None` once the session has ended
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this session when tripped
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drain remaining events and return the session outcome
    ///
    /// # Errors
    ///
    /// Returns the generator error on failure, `DbCoachError::Cancelled`
    /// on cancellation and `DbCoachError::Session` if the task panicked.
    pub async fn wait(mut self) -> Result<SavedConversation> {
        while self.events.recv().await.is_some() {}
        self.join_result().await
    }

    /// Split into the event receiver and a future for the outcome
    ///
    /// Dropping the receiver cancels the session.
    pub fn into_parts(
        self,
    ) -> (
        mpsc::Receiver<SessionEvent>,
        CancellationToken,
        JoinHandle<Result<SavedConversation>>,
    ) {
        (self.events, self.cancel, self.join)
    }

    async fn join_result(self) -> Result<SavedConversation> {
        self.join
            .await
            .map_err(|e| DbCoachError::Session(format!("session task failed: {}", e)))?
    }
}

/// Send an event, stopping if the session is cancelled or the receiver
/// is gone
async fn emit(
    tx: &mpsc::Sender<SessionEvent>,
    cancel: &CancellationToken,
    event: SessionEvent,
) -> std::result::Result<(), Stop> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(Stop::Cancelled),

        sent = tx.send(event) => sent.map_err(|_| {
            tracing::debug!("Session event receiver dropped; cancelling");
            Stop::Cancelled
        }),
    }
}

async fn emit_last_insight(
    session: &GenerationSession,
    tx: &mpsc::Sender<SessionEvent>,
    cancel: &CancellationToken,
) -> std::result::Result<(), Stop> {
    match session.last_insight() {
        Some(insight) => emit(tx, cancel, SessionEvent::Insight(insight.clone())).await,
        None => Ok(()),
    }
}

async fn run_task(
    generator: &dyn TextGenerator,
    session: &mut GenerationSession,
    index: usize,
    tx: &mpsc::Sender<SessionEvent>,
    cancel: &CancellationToken,
) -> std::result::Result<(), Stop> {
    let definition = session.definitions()[index].clone();
    let task_id = definition.id.as_str();

    session.begin_task(task_id).map_err(Stop::Failed)?;
    emit(
        tx,
        cancel,
        SessionEvent::TaskStarted {
            task_id: definition.id.clone(),
            title: definition.title.clone(),
            agent: definition.agent.clone(),
        },
    )
    .await?;
    emit_last_insight(session, tx, cancel).await?;

    let request = build_task_request(
        task_id,
        &definition.title,
        &definition.agent,
        session.prompt(),
        session.db_type(),
        &session.previous_outputs(),
    );

    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Stop::Cancelled),
        _ = tx.closed() => return Err(Stop::Cancelled),
        started = generator.stream(request) => started.map_err(Stop::Failed)?,
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Stop::Cancelled),
            _ = tx.closed() => return Err(Stop::Cancelled),
            next = stream.next() => next,
        };

        match next {
            None => break,
            Some(Ok(text)) if text.is_empty() => {}
            Some(Ok(text)) => {
                session.push_chunk(task_id, &text).map_err(Stop::Failed)?;
                emit(
                    tx,
                    cancel,
                    SessionEvent::Chunk {
                        task_id: definition.id.clone(),
                        text,
                    },
                )
                .await?;
            }
            Some(Err(e)) => return Err(Stop::Failed(e)),
        }
    }

    session.complete_task(task_id).map_err(Stop::Failed)?;
    emit(
        tx,
        cancel,
        SessionEvent::TaskCompleted {
            task_id: definition.id.clone(),
        },
    )
    .await?;
    emit_last_insight(session, tx, cancel).await?;

    tracing::debug!("Task {} completed", task_id);
    Ok(())
}

async fn drive(
    generator: &dyn TextGenerator,
    session: &mut GenerationSession,
    tx: &mpsc::Sender<SessionEvent>,
    cancel: &CancellationToken,
) -> std::result::Result<SavedConversation, Stop> {
    session.start().map_err(Stop::Failed)?;
    for index in 0..session.definitions().len() {
        run_task(generator, session, index, tx, cancel).await?;
    }
    session.finish().map_err(Stop::Failed)
}

async fn run_session(
    generator: Arc<dyn TextGenerator>,
    mut session: GenerationSession,
    tx: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
) -> Result<SavedConversation> {
    match drive(generator.as_ref(), &mut session, &tx, &cancel).await {
        Ok(conversation) => {
            tracing::info!(
                "Session {} completed with {} chunk(s)",
                conversation.id,
                session.chunk_count()
            );
            let _ = tx
                .send(SessionEvent::Completed(Box::new(conversation.clone())))
                .await;
            Ok(conversation)
        }
        Err(Stop::Cancelled) => {
            tracing::info!("Session {} cancelled", session.id());
            let _ = session.cancel();
            let _ = tx.send(SessionEvent::Cancelled).await;
            Err(DbCoachError::Cancelled.into())
        }
        Err(Stop::Failed(e)) => {
            let message = match e.downcast_ref::<DbCoachError>() {
                Some(DbCoachError::Generation(m)) => m.clone(),
                _ => e.to_string(),
            };
            tracing::error!("Session {} failed: {}", session.id(), message);
            let _ = session.fail(message.clone());
            let _ = tx.send(SessionEvent::Failed { message }).await;
            Err(e)
        }
    }
}
