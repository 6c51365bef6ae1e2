//! Generation session state machine
//!
//! A session walks a fixed list of tasks. Each task moves
//! `pending -> active -> completed`; the session itself moves
//! `idle -> generating -> completed | error | cancelled`. Any other
//! transition is rejected with `DbCoachError::Session`.

use crate::conversation::{
    generate_title, new_conversation_id, now_micros, ConversationMetadata, ConversationStatus,
    Insight, SavedConversation, TaskEntry, TaskStatus,
};
use crate::error::{DbCoachError, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

/// Progress reported while a task is streaming, before completion
const MAX_STREAMING_PROGRESS: u8 = 95;

/// One step of the generation pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Task identifier, also the key in `generated_content`
    pub id: String,
    /// Title shown to the user
    pub title: String,
    /// Agent that owns the task
    pub agent: String,
}

impl TaskDefinition {
    /// Create a task definition
    pub fn new(id: impl Into<String>, title: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            agent: agent.into(),
        }
    }
}

/// The four-step analysis/schema/implementation/validation pipeline
pub fn default_pipeline() -> Vec<TaskDefinition> {
    vec![
        TaskDefinition::new("analysis", "Requirements Analysis", "Requirements Analyst"),
        TaskDefinition::new("schema", "Schema Design", "Schema Architect"),
        TaskDefinition::new(
            "implementation",
            "Implementation Package",
            "Implementation Specialist",
        ),
        TaskDefinition::new("validation", "Quality Validation", "Quality Assurance"),
    ]
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Generating,
    Completed,
    Error,
    Cancelled,
}

impl SessionState {
    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// In-memory state of one generation run
///
/// # Examples
///
/// ```
/// use dbcoach::session::{GenerationSession, SessionState, TaskDefinition};
///
/// # fn main() -> dbcoach::error::Result<()> {
/// let mut session = GenerationSession::with_tasks(
///     "a library catalog",
///     "SQLite",
///     vec![TaskDefinition::new("schema", "Schema Design", "Schema Architect")],
/// )?;
/// session.start()?;
/// session.begin_task("schema")?;
/// session.push_chunk("schema", "Hel")?;
/// session.push_chunk("schema", "lo")?;
/// session.complete_task("schema")?;
/// assert_eq!(session.state(), SessionState::Completed);
///
/// let conversation = session.finish()?;
/// assert_eq!(conversation.generated_content["schema"], "Hello");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GenerationSession {
    id: String,
    prompt: String,
    db_type: String,
    mode: String,
    user_id: Option<String>,
    definitions: Vec<TaskDefinition>,
    tasks: Vec<TaskEntry>,
    outputs: BTreeMap<String, String>,
    insights: Vec<Insight>,
    state: SessionState,
    chunk_count: usize,
    error: Option<String>,
    created_at: DateTime<Utc>,
    started: Option<Instant>,
    duration: Option<Duration>,
}

impl GenerationSession {
    /// Create a session running the default pipeline
    pub fn new(prompt: impl Into<String>, db_type: impl Into<String>) -> Self {
        Self::build(prompt.into(), db_type.into(), default_pipeline())
    }

    /// Create a session running a custom task list
    ///
    /// # Errors
    ///
    /// Returns `DbCoachError::Session` if `tasks` is empty or repeats an id.
    pub fn with_tasks(
        prompt: impl Into<String>,
        db_type: impl Into<String>,
        tasks: Vec<TaskDefinition>,
    ) -> Result<Self> {
        if tasks.is_empty() {
            return Err(DbCoachError::Session("a session needs at least one task".to_string()).into());
        }
        let mut seen = HashSet::new();
        for task in &tasks {
            if task.id.trim().is_empty() {
                return Err(DbCoachError::Session("task id cannot be empty".to_string()).into());
            }
            if !seen.insert(task.id.as_str()) {
                return Err(
                    DbCoachError::Session(format!("duplicate task id '{}'", task.id)).into(),
                );
            }
        }
        Ok(Self::build(prompt.into(), db_type.into(), tasks))
    }

    fn build(prompt: String, db_type: String, definitions: Vec<TaskDefinition>) -> Self {
        let tasks = definitions
            .iter()
            .map(|d| TaskEntry {
                id: d.id.clone(),
                title: d.title.clone(),
                agent: d.agent.clone(),
                status: TaskStatus::Pending,
                progress: 0,
            })
            .collect();

        Self {
            id: new_conversation_id(),
            prompt,
            db_type,
            mode: "dbcoach".to_string(),
            user_id: None,
            definitions,
            tasks,
            outputs: BTreeMap::new(),
            insights: Vec::new(),
            state: SessionState::Idle,
            chunk_count: 0,
            error: None,
            created_at: now_micros(),
            started: None,
            duration: None,
        }
    }

    /// Set the mode recorded in the conversation metadata
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    /// Set the owner recorded on the conversation
    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Id the finished conversation will carry
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The user's request
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Target database
    pub fn db_type(&self) -> &str {
        &self.db_type
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn definitions(&self) -> &[TaskDefinition] {
        &self.definitions
    }

    pub fn tasks(&self) -> &[TaskEntry] {
        &self.tasks
    }

    pub fn insights(&self) -> &[Insight] {
        &self.insights
    }

    /// Most recent insight, if any
    pub fn last_insight(&self) -> Option<&Insight> {
        self.insights.last()
    }

    /// Text streamed so far for a task
    pub fn output(&self, task_id: &str) -> Option<&str> {
        self.outputs.get(task_id).map(String::as_str)
    }

    /// Number of non-empty chunks accepted
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Failure message, set when the session ended in `error`
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// `(title, output)` pairs of completed tasks in pipeline order
    pub fn previous_outputs(&self) -> Vec<(String, String)> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| {
                (
                    t.title.clone(),
                    self.outputs.get(&t.id).cloned().unwrap_or_default(),
                )
            })
            .collect()
    }

    fn task_index(&self, task_id: &str) -> Result<usize> {
        self.tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| DbCoachError::Session(format!("unknown task '{}'", task_id)).into())
    }

    fn require_generating(&self, action: &str) -> Result<()> {
        if self.state != SessionState::Generating {
            return Err(DbCoachError::Session(format!(
                "cannot {} while session is {}",
                action, self.state
            ))
            .into());
        }
        Ok(())
    }

    /// Move `idle -> generating`
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(DbCoachError::Session(format!(
                "cannot start a session that is {}",
                self.state
            ))
            .into());
        }
        self.state = SessionState::Generating;
        self.started = Some(Instant::now());
        tracing::debug!("Session {} started with {} task(s)", self.id, self.tasks.len());
        Ok(())
    }

    /// Move a task `pending -> active`
    ///
    /// Only one task may be active at a time.
    pub fn begin_task(&mut self, task_id: &str) -> Result<()> {
        self.require_generating("begin a task")?;
        let index = self.task_index(task_id)?;

        if let Some(active) = self.tasks.iter().find(|t| t.status == TaskStatus::Active) {
            return Err(DbCoachError::Session(format!(
                "task '{}' is still active",
                active.id
            ))
            .into());
        }

        let task = &mut self.tasks[index];
        if task.status != TaskStatus::Pending {
            return Err(DbCoachError::Session(format!(
                "task '{}' is {}, expected pending",
                task_id, task.status
            ))
            .into());
        }

        task.status = TaskStatus::Active;
        task.progress = 0;
        let insight = Insight::now(task.agent.clone(), format!("Starting {}", task.title));
        self.outputs.entry(task_id.to_string()).or_default();
        self.insights.push(insight);
        Ok(())
    }

    /// Append streamed text to an active task
    ///
    /// Empty chunks are ignored.
    pub fn push_chunk(&mut self, task_id: &str, text: &str) -> Result<()> {
        self.require_generating("accept output")?;
        let index = self.task_index(task_id)?;

        let task = &mut self.tasks[index];
        if task.status != TaskStatus::Active {
            return Err(DbCoachError::Session(format!(
                "task '{}' is {}, output is only accepted while active",
                task_id, task.status
            ))
            .into());
        }
        if text.is_empty() {
            return Ok(());
        }

        task.progress = task.progress.saturating_add(5).min(MAX_STREAMING_PROGRESS);
        self.outputs
            .entry(task_id.to_string())
            .or_default()
            .push_str(text);
        self.chunk_count += 1;
        Ok(())
    }

    /// Move a task `active -> completed`
    ///
    /// Completing the last task completes the session.
    pub fn complete_task(&mut self, task_id: &str) -> Result<()> {
        self.require_generating("complete a task")?;
        let index = self.task_index(task_id)?;

        let task = &mut self.tasks[index];
        if task.status != TaskStatus::Active {
            return Err(DbCoachError::Session(format!(
                "task '{}' is {}, expected active",
                task_id, task.status
            ))
            .into());
        }

        task.status = TaskStatus::Completed;
        task.progress = 100;
        let insight = Insight::now(task.agent.clone(), format!("Completed {}", task.title));
        self.insights.push(insight);

        if self.tasks.iter().all(|t| t.status == TaskStatus::Completed) {
            self.state = SessionState::Completed;
            self.duration = self.started.map(|s| s.elapsed());
            tracing::debug!("Session {} completed", self.id);
        }
        Ok(())
    }

    /// End the session with an error
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        if self.state.is_terminal() {
            return Err(DbCoachError::Session(format!(
                "cannot fail a session that is {}",
                self.state
            ))
            .into());
        }
        self.state = SessionState::Error;
        self.error = Some(message.into());
        self.duration = self.started.map(|s| s.elapsed());
        Ok(())
    }

    /// End the session as cancelled
    pub fn cancel(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(DbCoachError::Session(format!(
                "cannot cancel a session that is {}",
                self.state
            ))
            .into());
        }
        self.state = SessionState::Cancelled;
        self.duration = self.started.map(|s| s.elapsed());
        Ok(())
    }

    /// Build the conversation record of a completed session
    ///
    /// # Errors
    ///
    /// Returns `DbCoachError::Session` unless the session is completed.
    pub fn finish(&self) -> Result<SavedConversation> {
        if self.state != SessionState::Completed {
            return Err(DbCoachError::Session(format!(
                "cannot finish a session that is {}",
                self.state
            ))
            .into());
        }

        let metadata = ConversationMetadata {
            duration_ms: self
                .duration
                .map(|d| d.as_millis().min(u128::from(u64::MAX)) as u64)
                .unwrap_or_default(),
            chunk_count: self.chunk_count,
            insight_count: self.insights.len(),
            mode: self.mode.clone(),
        };

        let conversation = SavedConversation {
            id: self.id.clone(),
            title: generate_title(&self.prompt, &self.db_type),
            prompt: self.prompt.clone(),
            db_type: self.db_type.clone(),
            status: ConversationStatus::Completed,
            generated_content: self.outputs.clone(),
            insights: self.insights.clone(),
            tasks: self.tasks.clone(),
            user_id: self.user_id.clone(),
            metadata: Some(metadata),
            created_at: self.created_at,
            updated_at: now_micros().max(self.created_at),
        };
        conversation.validate()?;
        Ok(conversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_task() -> GenerationSession {
        GenerationSession::with_tasks(
            "an online shop",
            "PostgreSQL",
            vec![TaskDefinition::new("schema", "Schema Design", "Schema Architect")],
        )
        .unwrap()
    }

    fn is_session_error(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<DbCoachError>(), Some(DbCoachError::Session(_)))
    }

    #[test]
    fn test_default_pipeline_order() {
        let session = GenerationSession::new("x", "MySQL");
        let ids: Vec<&str> = session.tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["analysis", "schema", "implementation", "validation"]);
        let agents: Vec<&str> = session.tasks().iter().map(|t| t.agent.as_str()).collect();
        assert_eq!(
            agents,
            vec![
                "Requirements Analyst",
                "Schema Architect",
                "Implementation Specialist",
                "Quality Assurance"
            ]
        );
        assert!(session.tasks().iter().all(|t| t.status == TaskStatus::Pending));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_with_tasks_rejects_empty_and_duplicates() {
        assert!(GenerationSession::with_tasks("x", "MySQL", vec![]).is_err());
        let dup = vec![
            TaskDefinition::new("a", "A", "X"),
            TaskDefinition::new("a", "B", "Y"),
        ];
        assert!(GenerationSession::with_tasks("x", "MySQL", dup).is_err());
    }

    #[test]
    fn test_chunks_concatenate() {
        let mut session = single_task();
        session.start().unwrap();
        session.begin_task("schema").unwrap();
        session.push_chunk("schema", "Hel").unwrap();
        session.push_chunk("schema", "").unwrap();
        session.push_chunk("schema", "lo").unwrap();
        assert_eq!(session.output("schema"), Some("Hello"));
        assert_eq!(session.chunk_count(), 2);
    }

    #[test]
    fn test_illegal_transitions() {
        let mut session = single_task();
        let err = session.begin_task("schema").unwrap_err();
        assert!(is_session_error(&err));

        session.start().unwrap();
        assert!(session.start().is_err());
        assert!(session.push_chunk("schema", "x").is_err());
        assert!(session.complete_task("schema").is_err());
        assert!(session.begin_task("missing").is_err());

        session.begin_task("schema").unwrap();
        assert!(session.begin_task("schema").is_err());
        session.complete_task("schema").unwrap();
        assert!(session.push_chunk("schema", "late").is_err());
        assert!(session.complete_task("schema").is_err());
    }

    #[test]
    fn test_only_one_active_task() {
        let mut session = GenerationSession::new("x", "MySQL");
        session.start().unwrap();
        session.begin_task("analysis").unwrap();
        let err = session.begin_task("schema").unwrap_err();
        assert!(err.to_string().contains("analysis"));
    }

    #[test]
    fn test_insights_per_transition() {
        let mut session = single_task();
        session.start().unwrap();
        session.begin_task("schema").unwrap();
        session.complete_task("schema").unwrap();
        let messages: Vec<&str> = session.insights().iter().map(|i| i.message.as_str()).collect();
        assert_eq!(messages, vec!["Starting Schema Design", "Completed Schema Design"]);
        assert!(session.insights().iter().all(|i| i.agent == "Schema Architect"));
    }

    #[test]
    fn test_completion_and_finish() {
        let mut session = GenerationSession::new("an online shop", "PostgreSQL")
            .with_mode("dbcoach")
            .with_user_id(Some("alice".to_string()));
        session.start().unwrap();
        for task in default_pipeline() {
            session.begin_task(&task.id).unwrap();
            session.push_chunk(&task.id, &format!("{} output", task.id)).unwrap();
            assert_eq!(session.state(), SessionState::Generating);
            session.complete_task(&task.id).unwrap();
        }
        assert_eq!(session.state(), SessionState::Completed);

        let conversation = session.finish().unwrap();
        assert_eq!(conversation.id, session.id());
        assert_eq!(conversation.title, "E-commerce Platform (PostgreSQL)");
        assert_eq!(conversation.status, ConversationStatus::Completed);
        assert_eq!(conversation.generated_content.len(), 4);
        assert_eq!(conversation.user_id.as_deref(), Some("alice"));
        assert!(conversation.tasks.iter().all(|t| t.progress == 100));
        let metadata = conversation.metadata.unwrap();
        assert_eq!(metadata.chunk_count, 4);
        assert_eq!(metadata.insight_count, 8);
        assert_eq!(metadata.mode, "dbcoach");
    }

    #[test]
    fn test_finish_requires_completion() {
        let mut session = single_task();
        assert!(session.finish().is_err());
        session.start().unwrap();
        session.fail("boom").unwrap();
        assert_eq!(session.state(), SessionState::Error);
        assert_eq!(session.error(), Some("boom"));
        assert!(session.finish().is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut session = single_task();
        session.start().unwrap();
        session.cancel().unwrap();
        assert_eq!(session.state(), SessionState::Cancelled);
        assert!(session.cancel().is_err());
        assert!(session.fail("late").is_err());
        assert!(session.begin_task("schema").is_err());
    }

    #[test]
    fn test_previous_outputs_only_completed() {
        let mut session = GenerationSession::new("x", "MySQL");
        session.start().unwrap();
        session.begin_task("analysis").unwrap();
        session.push_chunk("analysis", "entities").unwrap();
        session.complete_task("analysis").unwrap();
        session.begin_task("schema").unwrap();
        session.push_chunk("schema", "partial").unwrap();
        assert_eq!(
            session.previous_outputs(),
            vec![("Requirements Analysis".to_string(), "entities".to_string())]
        );
    }
}
