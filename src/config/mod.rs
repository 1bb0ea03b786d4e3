use serde::{Deserialize, Serialize};

const DEFAULT_TABLE: &str = "bookmarks";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Runtime configuration injected by the hosting page as `window.ENV`.
///
/// ```html
/// <script>
///   window.ENV = { SUPABASE_URL: "https://xyz.supabase.co", SUPABASE_ANON_KEY: "..." };
/// </script>
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EnvConfig {
    pub supabase_url: String,
    pub anon_key: String,
    pub table: String,
    /// Where the auth service sends the browser after the provider flow.
    pub redirect_to: String,
    pub log_level: String,
}

impl EnvConfig {
    pub fn new() -> Self {
        let env = web_sys::window()
            .and_then(|w| w.get("ENV"))
            .filter(|env| !env.is_undefined() && env.is_object());
        let origin = web_sys::window()
            .and_then(|w| w.location().origin().ok())
            .unwrap_or_default();

        let mut config = Self::from_lookup(|key| {
            let env = env.as_ref()?;
            js_sys::Reflect::get(env, &key.into()).ok()?.as_string()
        });
        if config.redirect_to.is_empty() {
            config.redirect_to = origin;
        }
        config
    }

    /// Builds a config from a key lookup. Both `SUPABASE_URL` and
    /// `supabase_url` spellings are accepted; upper case wins.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |upper: &str| {
            lookup(upper)
                .or_else(|| lookup(&upper.to_ascii_lowercase()))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            supabase_url: get("SUPABASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            anon_key: get("SUPABASE_ANON_KEY").unwrap_or_default(),
            table: get("BOOKMARKS_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            redirect_to: get("REDIRECT_URL").unwrap_or_default(),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.supabase_url.is_empty() && !self.anon_key.is_empty()
    }

    pub fn max_level(&self) -> tracing::Level {
        self.log_level
            .parse()
            .unwrap_or(tracing::Level::INFO)
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}
