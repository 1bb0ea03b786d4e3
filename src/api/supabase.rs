use super::session::TokenResponse;
use super::{ApiError, ApiErrorKind, ApiResult, Gateway, Session};
use crate::config::EnvConfig;
use crate::models::{Bookmark, BookmarkPatch, Identity, NewBookmark, OrderBy};
use crate::storage::{load_session, save_session};
use crate::util::now_ms;
use std::sync::{Arc, Mutex};

/// [`Gateway`] over a Supabase project: GoTrue for auth, PostgREST for rows.
#[derive(Clone)]
pub struct SupabaseClient {
    pub(crate) base_url: String,
    anon_key: String,
    table: String,
    redirect_to: String,
    session: Arc<Mutex<Option<Session>>>,
    /// Mirror session changes into localStorage. Off for clients built in tests.
    persist: bool,
}

impl SupabaseClient {
    pub fn new(config: &EnvConfig) -> Self {
        Self {
            base_url: config.supabase_url.clone(),
            anon_key: config.anon_key.clone(),
            table: config.table.clone(),
            redirect_to: config.redirect_to.clone(),
            session: Arc::new(Mutex::new(None)),
            persist: false,
        }
    }

    /// Restores the session after page load. A token in the URL fragment (the
    /// provider flow just redirected back) wins over the stored one; the
    /// fragment is then scrubbed from the address bar.
    pub fn load_from_storage(config: &EnvConfig) -> Self {
        let mut client = Self::new(config);
        client.persist = true;

        let fragment = web_sys::window()
            .and_then(|w| w.location().hash().ok())
            .unwrap_or_default();

        let session = match Session::from_fragment(&fragment, now_ms()) {
            Some(s) => {
                tracing::info!("session restored from auth redirect");
                save_session(Some(&s));
                scrub_fragment();
                Some(s)
            }
            None => {
                if let Some(err) = Session::error_from_fragment(&fragment) {
                    tracing::warn!(error = %err, "auth redirect returned an error");
                    scrub_fragment();
                }
                load_session()
            }
        };

        client.set_session(session);
        client
    }

    pub fn session(&self) -> Option<Session> {
        match self.session.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_session(&self, session: Option<Session>) {
        if self.persist {
            save_session(session.as_ref());
        }
        if let Ok(mut guard) = self.session.lock() {
            *guard = session;
        }
    }

    fn http(&self) -> reqwest::Client {
        reqwest::Client::new()
    }

    fn ensure_configured(&self) -> ApiResult<()> {
        if self.base_url.is_empty() || self.anon_key.is_empty() {
            return Err(ApiError::config(
                "Backend is not configured (SUPABASE_URL / SUPABASE_ANON_KEY)",
            ));
        }
        Ok(())
    }

    pub fn authorize_url(&self, provider: &str) -> String {
        let mut url = format!(
            "{}/auth/v1/authorize?provider={}",
            self.base_url,
            urlencoding::encode(provider)
        );
        if !self.redirect_to.is_empty() {
            url.push_str("&redirect_to=");
            url.push_str(&urlencoding::encode(&self.redirect_to));
        }
        url
    }

    pub(crate) fn table_url(&self, query: &str) -> String {
        if query.is_empty() {
            format!("{}/rest/v1/{}", self.base_url, self.table)
        } else {
            format!("{}/rest/v1/{}?{}", self.base_url, self.table, query)
        }
    }

    pub(crate) fn row_filter(id: &str) -> String {
        format!("id=eq.{}", urlencoding::encode(id))
    }

    fn with_auth_headers(
        &self,
        req: reqwest::RequestBuilder,
        session: Option<&Session>,
    ) -> reqwest::RequestBuilder {
        let bearer = session
            .map(|s| s.access_token.as_str())
            .unwrap_or(self.anon_key.as_str());
        req.header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    async fn execute(&self, req: reqwest::RequestBuilder, ctx: &str) -> ApiResult<reqwest::Response> {
        let res = req.send().await.map_err(ApiError::network)?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }

        let body = res.text().await.unwrap_or_default();
        tracing::warn!(%status, ctx, "backend request failed");
        if status.as_u16() == 401 {
            Err(ApiError::unauthorized(&body))
        } else {
            Err(ApiError::http(status, &body, ctx))
        }
    }

    /// Current session, refreshed first if it is about to expire.
    async fn fresh_session(&self) -> ApiResult<Option<Session>> {
        let Some(session) = self.session() else {
            return Ok(None);
        };
        if !session.is_expired(now_ms()) {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.clone() else {
            tracing::info!("session expired without refresh token");
            self.set_session(None);
            return Ok(None);
        };

        let req = self
            .http()
            .post(format!(
                "{}/auth/v1/token?grant_type=refresh_token",
                self.base_url
            ))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }));

        match self.execute(req, "Session refresh failed").await {
            Ok(res) => {
                let body: TokenResponse = res.json().await.map_err(ApiError::parse)?;
                let next = Session::from_token_response(body, &session, now_ms());
                tracing::debug!("session refreshed");
                self.set_session(Some(next.clone()));
                Ok(Some(next))
            }
            Err(e) if refresh_token_rejected(&e) => {
                tracing::info!(error = %e, "session refresh rejected");
                self.set_session(None);
                Ok(None)
            }
            Err(e) => {
                // Keep the stored session; the next page load can retry.
                tracing::warn!(error = %e, "session refresh unavailable");
                Err(e)
            }
        }
    }

    /// A data call answered 401: the token is dead, so stop sending it.
    fn forget_rejected<T>(&self, result: ApiResult<T>) -> ApiResult<T> {
        if let Err(e) = &result {
            if e.kind == ApiErrorKind::Unauthorized {
                tracing::info!("access token rejected; dropping session");
                self.set_session(None);
            }
        }
        result
    }

    /// Session for a data call. Falls back to the anon key when signed out,
    /// which row-level security turns into an empty result.
    async fn data_session(&self) -> ApiResult<Option<Session>> {
        self.ensure_configured()?;
        self.fresh_session().await
    }
}

/// GoTrue answers a revoked or reused refresh token with 400 `invalid_grant`
/// (401 on older versions). Any other failure is an outage, not a sign-out.
fn refresh_token_rejected(e: &ApiError) -> bool {
    e.kind == ApiErrorKind::Unauthorized || matches!(e.status, Some(400 | 401))
}

fn scrub_fragment() {
    let Some(window) = web_sys::window() else {
        return;
    };
    let path = window.location().pathname().unwrap_or_else(|_| "/".to_string());
    let search = window.location().search().unwrap_or_default();
    if let Ok(history) = window.history() {
        let _ = history.replace_state_with_url(
            &wasm_bindgen::JsValue::NULL,
            "",
            Some(&format!("{}{}", path, search)),
        );
    }
}

impl Gateway for SupabaseClient {
    async fn current_identity(&self) -> ApiResult<Option<Identity>> {
        self.ensure_configured()?;
        let Some(session) = self.fresh_session().await? else {
            return Ok(None);
        };

        let req = self.with_auth_headers(
            self.http().get(format!("{}/auth/v1/user", self.base_url)),
            Some(&session),
        );
        match self.execute(req, "Loading user failed").await {
            Ok(res) => {
                let identity: Identity = res.json().await.map_err(ApiError::parse)?;
                Ok(Some(identity))
            }
            Err(e) if e.kind == ApiErrorKind::Unauthorized => {
                tracing::info!("stored session rejected by auth service");
                self.set_session(None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in_with_provider(&self, provider: &str) -> ApiResult<()> {
        self.ensure_configured()?;
        let url = self.authorize_url(provider);
        tracing::info!(provider, "redirecting to identity provider");

        let window = web_sys::window().ok_or_else(|| ApiError::browser("No browser window"))?;
        window
            .location()
            .set_href(&url)
            .map_err(|_| ApiError::browser("Could not open the sign-in page"))
    }

    async fn sign_out(&self) -> ApiResult<()> {
        self.ensure_configured()?;
        let session = self.session();
        // Local sign-out happens even if the server call fails.
        self.set_session(None);

        let Some(session) = session else {
            return Ok(());
        };
        let req = self.with_auth_headers(
            self.http().post(format!("{}/auth/v1/logout", self.base_url)),
            Some(&session),
        );
        self.execute(req, "Sign out failed").await.map(|_| ())
    }

    async fn insert(&self, record: &NewBookmark) -> ApiResult<()> {
        let session = self.data_session().await?;
        let req = self
            .with_auth_headers(self.http().post(self.table_url("")), session.as_ref())
            .header("Prefer", "return=minimal")
            .json(record);
        self.forget_rejected(self.execute(req, "Adding bookmark failed").await)
            .map(|_| ())
    }

    async fn update(&self, id: &str, patch: &BookmarkPatch) -> ApiResult<()> {
        let session = self.data_session().await?;
        let req = self
            .with_auth_headers(
                self.http().patch(self.table_url(&Self::row_filter(id))),
                session.as_ref(),
            )
            .header("Prefer", "return=minimal")
            .json(patch);
        self.forget_rejected(self.execute(req, "Updating bookmark failed").await)
            .map(|_| ())
    }

    async fn delete(&self, id: &str) -> ApiResult<()> {
        let session = self.data_session().await?;
        let req = self.with_auth_headers(
            self.http().delete(self.table_url(&Self::row_filter(id))),
            session.as_ref(),
        );
        self.forget_rejected(self.execute(req, "Deleting bookmark failed").await)
            .map(|_| ())
    }

    async fn select_all(&self, order: &OrderBy) -> ApiResult<Vec<Bookmark>> {
        let session = self.data_session().await?;
        let query = format!("select=*&order={}", order.to_query_value());
        let req = self.with_auth_headers(self.http().get(self.table_url(&query)), session.as_ref());
        let res = self.forget_rejected(self.execute(req, "Loading bookmarks failed").await)?;
        res.json().await.map_err(ApiError::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EnvConfig {
        EnvConfig::from_lookup(|k| match k {
            "SUPABASE_URL" => Some("https://proj.supabase.co/".to_string()),
            "SUPABASE_ANON_KEY" => Some("anon-key".to_string()),
            "REDIRECT_URL" => Some("http://localhost:8080/".to_string()),
            _ => None,
        })
    }

    #[test]
    fn test_new_client_has_no_session() {
        let client = SupabaseClient::new(&config());
        assert_eq!(client.base_url, "https://proj.supabase.co");
        assert!(client.session().is_none());
        assert!(client.ensure_configured().is_ok());
    }

    #[test]
    fn test_authorize_url_encodes_redirect() {
        let client = SupabaseClient::new(&config());
        assert_eq!(
            client.authorize_url("google"),
            "https://proj.supabase.co/auth/v1/authorize?provider=google&redirect_to=http%3A%2F%2Flocalhost%3A8080%2F"
        );
    }

    #[test]
    fn test_table_urls() {
        let client = SupabaseClient::new(&config());
        assert_eq!(client.table_url(""), "https://proj.supabase.co/rest/v1/bookmarks");
        assert_eq!(
            client.table_url(&SupabaseClient::row_filter("a b")),
            "https://proj.supabase.co/rest/v1/bookmarks?id=eq.a%20b"
        );
    }

    #[test]
    fn test_unconfigured_client_reports_config_error() {
        let client = SupabaseClient::new(&EnvConfig::from_lookup(|_| None));
        let err = client.ensure_configured().expect_err("should be unconfigured");
        assert_eq!(err.kind, ApiErrorKind::Config);
    }

    #[test]
    fn test_set_session_without_persistence() {
        let client = SupabaseClient::new(&config());
        let s = Session {
            access_token: "t".to_string(),
            refresh_token: None,
            expires_at_ms: None,
        };
        client.set_session(Some(s.clone()));
        // Clones share the session cell.
        let other = client.clone();
        assert_eq!(other.session(), Some(s));
        other.set_session(None);
        assert!(client.session().is_none());
    }

    fn token() -> Session {
        Session {
            access_token: "t".to_string(),
            refresh_token: Some("r".to_string()),
            expires_at_ms: None,
        }
    }

    #[test]
    fn test_refresh_rejection_only_for_invalid_grant() {
        let revoked = r#"{"error":"invalid_grant","error_description":"Invalid Refresh Token: Already Used"}"#;
        assert!(refresh_token_rejected(&ApiError::http(
            reqwest::StatusCode::BAD_REQUEST,
            revoked,
            "Session refresh failed"
        )));
        assert!(refresh_token_rejected(&ApiError::unauthorized("")));

        for status in [
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            reqwest::StatusCode::BAD_GATEWAY,
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            reqwest::StatusCode::TOO_MANY_REQUESTS,
        ] {
            let e = ApiError::http(status, "", "Session refresh failed");
            assert!(!refresh_token_rejected(&e), "{status} must not sign out");
        }
        assert!(!refresh_token_rejected(&ApiError::new(
            ApiErrorKind::Network,
            "offline"
        )));
    }

    #[test]
    fn test_rejected_data_call_drops_session() {
        let client = SupabaseClient::new(&config());
        client.set_session(Some(token()));

        let outage: ApiResult<()> = Err(ApiError::http(
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            "",
            "Loading bookmarks failed",
        ));
        assert!(client.forget_rejected(outage).is_err());
        assert_eq!(client.session(), Some(token()));

        let rejected: ApiResult<()> = Err(ApiError::unauthorized(r#"{"msg":"JWT expired"}"#));
        let err = client.forget_rejected(rejected).expect_err("still an error");
        assert_eq!(err.message, "JWT expired");
        assert!(client.session().is_none());
    }
}
