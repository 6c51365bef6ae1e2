//! Per-task instructions
//!
//! Each task of the default pipeline has a fixed template. Unknown task
//! ids fall back to a generic instruction built from the task title.

/// Instruction body for the requirements analysis task
const ANALYSIS: &str = r#"Analyze the requirements for this database.

Produce:
- The core entities and what each one represents
- Relationships between entities with their cardinality
- Expected data volumes and the read/write mix
- Open questions the developer should answer before building"#;

/// Instruction body for the schema design task
const SCHEMA: &str = r#"Design the database schema.

Produce:
- CREATE TABLE statements with primary keys, foreign keys and constraints
- Data type choices with a one-line reason where not obvious
- Normalization decisions and any deliberate denormalization"#;

/// Instruction body for the implementation task
const IMPLEMENTATION: &str = r#"Write the implementation package.

Produce:
- Index definitions for the main query paths
- Sample INSERT statements with realistic data
- The five most important queries the application will run
- A migration script that creates everything in the right order"#;

/// Instruction body for the validation task
const VALIDATION: &str = r#"Review the design for quality.

Produce:
- Integrity risks and missing constraints
- Performance hot spots and how to address them
- Security concerns (access control, sensitive columns)
- A short checklist of follow-up tasks"#;

/// Template for a known task id
pub fn task_instructions(task_id: &str) -> Option<&'static str> {
    match task_id {
        "analysis" => Some(ANALYSIS),
        "schema" => Some(SCHEMA),
        "implementation" => Some(IMPLEMENTATION),
        "validation" => Some(VALIDATION),
        _ => None,
    }
}

/// Builds the user content for one task
///
/// # Arguments
///
/// * `task_id` - Task identifier
/// * `task_title` - Task title, used when `task_id` has no template
/// * `user_prompt` - The developer's original request
/// * `db_type` - Target database
/// * `previous` - `(task title, output)` pairs of tasks already completed
///
/// # Examples
///
/// ```
/// use dbcoach::prompts::task_prompt::generate_task_prompt;
///
/// let prompt = generate_task_prompt("schema", "Schema Design", "a bookshop", "PostgreSQL", &[]);
/// assert!(prompt.contains("a bookshop"));
/// assert!(prompt.contains("CREATE TABLE"));
/// ```
pub fn generate_task_prompt(
    task_id: &str,
    task_title: &str,
    user_prompt: &str,
    db_type: &str,
    previous: &[(String, String)],
) -> String {
    let instructions = task_instructions(task_id)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Complete the task \"{}\".", task_title));

    let mut prompt = format!(
        "REQUEST:\n{}\n\nDATABASE: {}\n\nTASK:\n{}\n",
        user_prompt.trim(),
        db_type,
        instructions
    );

    let prior: Vec<&(String, String)> = previous
        .iter()
        .filter(|(_, output)| !output.trim().is_empty())
        .collect();
    if !prior.is_empty() {
        prompt.push_str("\nWORK SO FAR:\n");
        for (title, output) in prior {
            prompt.push_str(&format!("\n### {}\n{}\n", title, output.trim()));
        }
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tasks_have_templates() {
        for id in ["analysis", "schema", "implementation", "validation"] {
            assert!(task_instructions(id).is_some(), "missing template for {}", id);
        }
        assert!(task_instructions("deploy").is_none());
    }

    #[test]
    fn test_prompt_embeds_request_and_db() {
        let prompt = generate_task_prompt("analysis", "Analysis", "  a clinic  ", "MongoDB", &[]);
        assert!(prompt.starts_with("REQUEST:\na clinic\n"));
        assert!(prompt.contains("DATABASE: MongoDB"));
        assert!(!prompt.contains("WORK SO FAR"));
    }

    #[test]
    fn test_prompt_includes_previous_outputs() {
        let previous = vec![
            ("Requirements Analysis".to_string(), "Entities: patient".to_string()),
            ("Empty".to_string(), "   ".to_string()),
        ];
        let prompt = generate_task_prompt("schema", "Schema Design", "a clinic", "MySQL", &previous);
        assert!(prompt.contains("### Requirements Analysis\nEntities: patient"));
        assert!(!prompt.contains("### Empty"));
    }

    #[test]
    fn test_unknown_task_uses_title() {
        let prompt = generate_task_prompt("deploy", "Deployment Plan", "x", "MySQL", &[]);
        assert!(prompt.contains("Complete the task \"Deployment Plan\"."));
    }
}
