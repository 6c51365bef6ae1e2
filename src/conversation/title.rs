//! Display-title generation for conversations
//!
//! Titles are derived once from the prompt and database type. A fixed,
//! ordered table of domain keyword sets is scanned first; when nothing
//! matches, the first two meaningful words of the prompt are used.

use regex::Regex;
use std::sync::OnceLock;

/// Ordered domain table: the first set with a matching keyword wins.
const DOMAINS: &[(&[&str], &str)] = &[
    (
        &[
            "shop", "store", "cart", "order", "product", "ecommerce", "checkout", "catalog",
        ],
        "E-commerce Platform",
    ),
    (
        &["blog", "post", "article", "cms", "content", "publish"],
        "Content Management System",
    ),
    (
        &["social", "friend", "follower", "feed", "comment"],
        "Social Network",
    ),
    (
        &["patient", "hospital", "doctor", "medical", "clinic", "health"],
        "Healthcare System",
    ),
    (
        &["student", "course", "school", "university", "lesson", "enrollment"],
        "Learning Management System",
    ),
    (
        &["bank", "transaction", "payment", "finance", "invoice", "ledger"],
        "Financial System",
    ),
    (
        &["inventory", "warehouse", "stock", "supplier", "shipment"],
        "Inventory Management",
    ),
    (
        &["customer", "crm", "lead", "sales", "contact"],
        "CRM System",
    ),
    (
        &["employee", "payroll", "department", "recruit"],
        "HR Management System",
    ),
    (
        &["project", "task", "kanban", "sprint", "milestone"],
        "Project Management Tool",
    ),
    (
        &["booking", "reservation", "hotel", "ticket", "appointment"],
        "Booking System",
    ),
    (
        &["restaurant", "menu", "recipe", "food", "delivery"],
        "Restaurant Management",
    ),
    (
        &["library", "book", "author", "loan"],
        "Library Management System",
    ),
    (
        &["vector", "embedding", "similarity", "semantic"],
        "Semantic Search Engine",
    ),
    (
        &["sensor", "iot", "device", "telemetry", "metric"],
        "IoT Data Platform",
    ),
];

/// Words ignored when building a fallback title
const STOP_WORDS: &[&str] = &[
    "about", "application", "build", "could", "create", "database", "design", "from", "have",
    "into", "like", "make", "need", "please", "should", "simple", "some", "system", "that",
    "their", "there", "these", "this", "want", "where", "which", "with", "would",
];

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[a-z0-9]+").expect("static regex is valid"))
}

/// Exact keyword or its plural ("order", "orders", "address"/"addresses")
fn is_keyword_form(word: &str, keyword: &str) -> bool {
    match word.strip_prefix(keyword) {
        Some(rest) => rest.is_empty() || rest == "s" || rest == "es",
        None => false,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Generate a display title from a prompt and database type
///
/// # Examples
///
/// ```
/// use dbcoach::conversation::generate_title;
///
/// assert_eq!(
///     generate_title("Build me a shop with a cart", "PostgreSQL"),
///     "E-commerce Platform (PostgreSQL)"
/// );
/// assert_eq!(generate_title("xyz qqq", "MySQL"), "MySQL Database");
/// assert_eq!(
///     generate_title("Track astronomy observations", "MySQL"),
///     "Track Astronomy Database"
/// );
/// ```
pub fn generate_title(prompt: &str, db_type: &str) -> String {
    let lowered = prompt.to_lowercase();
    let words: Vec<&str> = word_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .collect();

    let label = if db_type.trim().is_empty() {
        "Database"
    } else {
        db_type.trim()
    };

    for (keywords, domain) in DOMAINS {
        let matched = words
            .iter()
            .any(|word| keywords.iter().any(|keyword| is_keyword_form(word, keyword)));
        if matched {
            return format!("{} ({})", domain, label);
        }
    }

    let meaningful: Vec<String> = words
        .iter()
        .filter(|word| word.len() > 3 && !STOP_WORDS.contains(word))
        .take(2)
        .map(|word| capitalize(word))
        .collect();

    if meaningful.is_empty() {
        if db_type.trim().is_empty() {
            "Database".to_string()
        } else {
            format!("{} Database", label)
        }
    } else {
        format!("{} Database", meaningful.join(" "))
    }
}
