//! System instruction shared by every task
//!
//! The instruction pins the model to the role of the agent running the
//! task and to the target database dialect.

/// Generates the system instruction for one agent
///
/// # Arguments
///
/// * `agent` - Display name of the agent (e.g. `Schema Architect`)
/// * `db_type` - Target database (e.g. `PostgreSQL`)
///
/// # Examples
///
/// ```
/// use dbcoach::prompts::system_prompt::generate_system_prompt;
///
/// let prompt = generate_system_prompt("Schema Architect", "MySQL");
/// assert!(prompt.contains("Schema Architect"));
/// assert!(prompt.contains("MySQL"));
/// ```
pub fn generate_system_prompt(agent: &str, db_type: &str) -> String {
    format!(
        r#"You are the {agent} on a database design team coaching a developer.

TARGET DATABASE: {db_type}

GUIDELINES:
- Use {db_type} syntax and data types in every example.
- Prefer explicit names for tables, columns, keys and indexes.
- Explain trade-offs briefly; do not pad the answer.
- Format the answer as Markdown with fenced code blocks for SQL.
- Build on the work of earlier team members instead of repeating it."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_names_agent_and_db() {
        let prompt = generate_system_prompt("Quality Assurance", "SQLite");
        assert!(prompt.starts_with("You are the Quality Assurance"));
        assert!(prompt.contains("TARGET DATABASE: SQLite"));
        assert!(prompt.contains("SQLite syntax"));
    }
}
