use serde::{Deserialize, Deserializer, Serialize};

/// Signed-in user as reported by the auth service (`/auth/v1/user`).
///
/// Only the id and email are consumed; everything else the provider returns
/// is ignored.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Identity {
    pub fn display_name(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Bookmark {
    /// Backend-assigned. Tables may use bigint or uuid keys; both are kept as strings.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(rename = "user_id", default)]
    pub owner: String,
    #[serde(default)]
    pub created_at: String,
}

/// Insert payload. `id` and `created_at` are assigned by the backend.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct NewBookmark {
    pub title: String,
    pub url: String,
    #[serde(rename = "user_id")]
    pub owner: String,
}

/// Update payload. Owner and id are immutable.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct BookmarkPatch {
    pub title: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub column: &'static str,
    pub ascending: bool,
}

impl OrderBy {
    pub const NEWEST_FIRST: OrderBy = OrderBy {
        column: "created_at",
        ascending: false,
    };

    /// PostgREST `order=` value, e.g. `created_at.desc`.
    pub fn to_query_value(&self) -> String {
        let dir = if self.ascending { "asc" } else { "desc" };
        format!("{}.{}", self.column, dir)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}
