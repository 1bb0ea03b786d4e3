mod session;
mod supabase;

pub use session::Session;
pub use supabase::SupabaseClient;

use crate::models::{Bookmark, BookmarkPatch, Identity, NewBookmark, OrderBy};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiErrorKind {
    Unauthorized,
    Network,
    Http,
    Parse,
    Config,
    Browser,
}

/// Gateway failure. Only `message` is ever shown to the user.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
    /// HTTP status when the backend answered at all.
    pub status: Option<u16>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    fn network(e: reqwest::Error) -> Self {
        Self::new(ApiErrorKind::Network, e.to_string())
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self::new(ApiErrorKind::Parse, e.to_string())
    }

    fn config(message: &str) -> Self {
        Self::new(ApiErrorKind::Config, message)
    }

    fn browser(message: &str) -> Self {
        Self::new(ApiErrorKind::Browser, message)
    }

    fn unauthorized(body: &str) -> Self {
        Self::new(
            ApiErrorKind::Unauthorized,
            error_message_from_body(body).unwrap_or_else(|| "Unauthorized".to_string()),
        )
        .with_status(401)
    }

    fn http(status: reqwest::StatusCode, body: &str, ctx: &str) -> Self {
        Self::new(
            ApiErrorKind::Http,
            error_message_from_body(body).unwrap_or_else(|| format!("{ctx} ({status})")),
        )
        .with_status(status.as_u16())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Pulls the human-readable part out of a PostgREST or GoTrue error body.
pub(crate) fn error_message_from_body(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error_description", "msg", "error"]
        .iter()
        .filter_map(|k| v.get(*k).and_then(|m| m.as_str()))
        .map(str::trim)
        .find(|m| !m.is_empty())
        .map(str::to_string)
}

/// Auth and record operations the app consumes from the hosted backend.
///
/// Every call resolves to a success payload or an [`ApiError`] carrying a
/// displayable message. Row scoping to the caller's identity is the backend's
/// job; `select_all` is deliberately unfiltered.
#[allow(async_fn_in_trait)]
pub trait Gateway {
    async fn current_identity(&self) -> ApiResult<Option<Identity>>;

    /// Starts the external provider flow. The page usually navigates away.
    async fn sign_in_with_provider(&self, provider: &str) -> ApiResult<()>;

    async fn sign_out(&self) -> ApiResult<()>;

    async fn insert(&self, record: &NewBookmark) -> ApiResult<()>;

    async fn update(&self, id: &str, patch: &BookmarkPatch) -> ApiResult<()>;

    async fn delete(&self, id: &str) -> ApiResult<()>;

    async fn select_all(&self, order: &OrderBy) -> ApiResult<Vec<Bookmark>>;
}
