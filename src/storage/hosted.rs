//! Hosted conversation backend
//!
//! Talks to a PostgREST endpoint (as exposed by Supabase) where each
//! conversation is one row of a pre-provisioned table. Field names are
//! translated through [`crate::storage::row`]. Transient failures are
//! retried with doubling backoff; client errors are not.

use crate::config::HostedStorageConfig;
use crate::conversation::{sort_newest_first, ConversationPatch, SavedConversation};
use crate::error::{DbCoachError, Result};
use crate::storage::row::{prepare_for_write, ConversationRow, ConversationRowUpdate};
use crate::storage::ConversationStorage;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use std::time::Duration;

/// Upper bound on the wait between retries
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// PostgREST-backed conversation store
///
/// # Examples
///
/// ```
/// use dbcoach::config::HostedStorageConfig;
/// use dbcoach::storage::HostedStorage;
///
/// let config = HostedStorageConfig {
///     url: Some("https://example.supabase.co".to_string()),
///     api_key: Some("anon-key".to_string()),
///     ..Default::default()
/// };
/// let storage = HostedStorage::new(config);
/// assert!(storage.is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct HostedStorage {
    client: Client,
    base_url: String,
    api_key: String,
    table: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl HostedStorage {
    /// Create a hosted store from configuration
    ///
    /// # Errors
    ///
    /// Returns `DbCoachError::Config` if the URL or API key is missing and
    /// `DbCoachError::Storage` if the HTTP client cannot be built.
    pub fn new(config: HostedStorageConfig) -> Result<Self> {
        let base_url = config
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                DbCoachError::Config("Hosted storage requires storage.hosted.url".to_string())
            })?;
        let api_key = config
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                DbCoachError::Config("Hosted storage requires storage.hosted.api_key".to_string())
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("dbcoach/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DbCoachError::Storage(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            table: config.table,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn request(&self, method: Method) -> RequestBuilder {
        self.client
            .request(method, self.table_url())
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    /// Send a request, retrying transient failures
    ///
    /// `build` is called once per attempt because request builders are
    /// consumed by `send`.
    async fn send<F>(&self, action: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            let backoff = backoff_for(self.retry_backoff, attempt);
            match build().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if is_transient(response.status()) && attempt < self.max_retries => {
                    tracing::warn!(
                        "{} returned {}, retrying in {:?} (attempt {}/{})",
                        action,
                        response.status(),
                        backoff,
                        attempt + 1,
                        self.max_retries
                    );
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    tracing::error!("{} failed with status {}: {}", action, status, body);
                    return Err(DbCoachError::Storage(format!(
                        "{} failed with status {}: {}",
                        action, status, body
                    ))
                    .into());
                }
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.max_retries => {
                    tracing::warn!(
                        "{} failed: {}, retrying in {:?} (attempt {}/{})",
                        action,
                        e,
                        backoff,
                        attempt + 1,
                        self.max_retries
                    );
                }
                Err(e) => {
                    tracing::error!("{} failed: {}", action, e);
                    return Err(DbCoachError::Storage(format!("{} failed: {}", action, e)).into());
                }
            }
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    async fn parse_rows(response: Response, action: &str) -> Result<Vec<SavedConversation>> {
        let rows: Vec<ConversationRow> = response.json().await.map_err(|e| {
            DbCoachError::Storage(format!("Failed to parse {} response: {}", action, e))
        })?;
        Ok(rows.into_iter().map(SavedConversation::from).collect())
    }

    async fn fetch(&self, action: &str, query: Vec<(&'static str, String)>) -> Result<Vec<SavedConversation>> {
        let response = self
            .send(action, || self.request(Method::GET).query(&query))
            .await?;
        let mut records = Self::parse_rows(response, action).await?;
        sort_newest_first(&mut records);
        Ok(records)
    }
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Wait before retry number `attempt + 1`, doubling from `base`
fn backoff_for(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(2u32.saturating_pow(attempt))
        .unwrap_or(MAX_BACKOFF)
        .min(MAX_BACKOFF)
}

/// Escape `LIKE` metacharacters so they match literally
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Quote a value for use inside a PostgREST logic filter
fn quote_filter_value(value: &str) -> String {
    let escaped = escape_like(value)
        .replace('\\', "\\\\")
        .replace('"', "\\\"");
    format!("\"*{}*\"", escaped)
}

/// Build the `or=(...)` filter used for search
pub(crate) fn search_filter(query: &str) -> String {
    let value = quote_filter_value(query);
    format!(
        "(title.ilike.{v},prompt.ilike.{v},db_type.ilike.{v})",
        v = value
    )
}

fn order_and_owner(owner_id: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("select", "*".to_string()),
        ("order", "created_at.desc".to_string()),
    ];
    if let Some(owner) = owner_id {
        query.push(("user_id", format!("eq.{}", owner)));
    }
    query
}

#[async_trait]
impl ConversationStorage for HostedStorage {
    fn backend_name(&self) -> &'static str {
        "hosted"
    }

    async fn save_conversation(&self, record: &SavedConversation) -> Result<()> {
        let prepared = prepare_for_write(record)?;
        let rows = vec![ConversationRow::from(&prepared)];

        self.send("Save conversation", || {
            self.request(Method::POST)
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(&rows)
        })
        .await?;

        tracing::debug!("Saved conversation {} to hosted store", prepared.id);
        Ok(())
    }

    async fn load_conversations(&self, owner_id: Option<&str>) -> Result<Vec<SavedConversation>> {
        self.fetch("Load conversations", order_and_owner(owner_id))
            .await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<SavedConversation>> {
        let query = vec![
            ("select", "*".to_string()),
            ("id", format!("eq.{}", id)),
            ("limit", "1".to_string()),
        ];
        Ok(self
            .fetch("Get conversation", query)
            .await?
            .into_iter()
            .next())
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        let filter = format!("eq.{}", id);
        self.send("Delete conversation", || {
            self.request(Method::DELETE).query(&[("id", filter.as_str())])
        })
        .await?;
        tracing::debug!("Deleted conversation {} from hosted store", id);
        Ok(())
    }

    async fn update_conversation(
        &self,
        id: &str,
        patch: ConversationPatch,
    ) -> Result<SavedConversation> {
        let mut record = self
            .get_conversation(id)
            .await?
            .ok_or_else(|| DbCoachError::NotFound(id.to_string()))?;
        record.apply_patch(patch);
        record.validate()?;

        let update = ConversationRowUpdate::from(&record);
        let filter = format!("eq.{}", id);
        let response = self
            .send("Update conversation", || {
                self.request(Method::PATCH)
                    .query(&[("id", filter.as_str())])
                    .header("Prefer", "return=representation")
                    .json(&update)
            })
            .await?;

        Self::parse_rows(response, "Update conversation")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbCoachError::NotFound(id.to_string()).into())
    }

    async fn search_conversations(
        &self,
        query: &str,
        owner_id: Option<&str>,
    ) -> Result<Vec<SavedConversation>> {
        if query.trim().is_empty() {
            return self.load_conversations(owner_id).await;
        }

        let mut params = order_and_owner(owner_id);
        params.push(("or", search_filter(query)));
        // `*` still reaches the server as a wildcard
        let mut records = self.fetch("Search conversations", params).await?;
        records.retain(|r| r.matches_query(query));
        Ok(records)
    }

    async fn find_by_id_prefix(&self, prefix: &str) -> Result<Vec<SavedConversation>> {
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
            return Ok(Vec::new());
        }
        let query = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
            ("id", format!("like.{}*", prefix.to_ascii_lowercase())),
        ];
        self.fetch("Find conversation by id prefix", query).await
    }
}
