//! Prompts for the generation pipeline
//!
//! This module builds the system instruction and the user content sent
//! to the generator for each task of a session.

pub mod system_prompt;
pub mod task_prompt;

use crate::generation::GenerationRequest;

/// Builds the generation request for one task
///
/// # Arguments
///
/// * `task_id` - Task identifier (`analysis`, `schema`, ...)
/// * `task_title` - Task title shown to the user
/// * `agent` - Agent name that owns the task
/// * `user_prompt` - The developer's request
/// * `db_type` - Target database
/// * `previous` - `(task title, output)` pairs of completed tasks
///
/// # Examples
///
/// ```
/// use dbcoach::prompts::build_task_request;
///
/// let request = build_task_request(
///     "analysis",
///     "Requirements Analysis",
///     "Requirements Analyst",
///     "an online shop",
///     "PostgreSQL",
///     &[],
/// );
/// assert_eq!(request.task_id, "analysis");
/// assert!(request.system_prompt.contains("Requirements Analyst"));
/// assert!(request.prompt.contains("an online shop"));
/// ```
pub fn build_task_request(
    task_id: &str,
    task_title: &str,
    agent: &str,
    user_prompt: &str,
    db_type: &str,
    previous: &[(String, String)],
) -> GenerationRequest {
    GenerationRequest {
        task_id: task_id.to_string(),
        task_label: task_title.to_string(),
        system_prompt: system_prompt::generate_system_prompt(agent, db_type),
        prompt: task_prompt::generate_task_prompt(task_id, task_title, user_prompt, db_type, previous),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_task_request_fields() {
        let previous = vec![("Analysis".to_string(), "users, orders".to_string())];
        let request = build_task_request(
            "schema",
            "Schema Design",
            "Schema Architect",
            "a shop",
            "MySQL",
            &previous,
        );
        assert_eq!(request.task_label, "Schema Design");
        assert!(request.system_prompt.contains("MySQL"));
        assert!(request.prompt.contains("users, orders"));
    }
}
