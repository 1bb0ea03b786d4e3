use serde::{Deserialize, Serialize};

/// Treat tokens this close to expiry as already expired.
const EXPIRY_SKEW_MS: i64 = 30_000;

/// Auth session issued by the hosted auth service.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Absolute expiry in epoch milliseconds, if the service told us one.
    #[serde(default)]
    pub expires_at_ms: Option<i64>,
}

/// Body of `POST /auth/v1/token?grant_type=refresh_token`.
#[derive(Deserialize, Clone, Debug)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl Session {
    /// Parses the fragment the auth service appends after the provider flow:
    /// `#access_token=…&refresh_token=…&expires_in=3600&token_type=bearer`.
    ///
    /// Returns `None` when the fragment carries no access token (including
    /// the `#error=…` shape).
    pub fn from_fragment(fragment: &str, now_ms: i64) -> Option<Self> {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);

        let mut access_token = None;
        let mut refresh_token = None;
        let mut expires_in: Option<i64> = None;
        let mut expires_at: Option<i64> = None;

        for pair in fragment.split('&') {
            let Some((k, v)) = pair.split_once('=') else {
                continue;
            };
            let v = urlencoding::decode(v)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| v.to_string());
            match k {
                "access_token" if !v.is_empty() => access_token = Some(v),
                "refresh_token" if !v.is_empty() => refresh_token = Some(v),
                "expires_in" => expires_in = v.parse().ok(),
                "expires_at" => expires_at = v.parse().ok(),
                _ => {}
            }
        }

        // `expires_at` is epoch seconds; prefer it over the relative value.
        let expires_at_ms = expires_at
            .map(|s| s * 1000)
            .or_else(|| expires_in.map(|s| now_ms + s * 1000));

        Some(Self {
            access_token: access_token?,
            refresh_token,
            expires_at_ms,
        })
    }

    /// Error text from an `#error=…&error_description=…` fragment.
    pub fn error_from_fragment(fragment: &str) -> Option<String> {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        let mut error = None;
        let mut description = None;
        for pair in fragment.split('&') {
            let Some((k, v)) = pair.split_once('=') else {
                continue;
            };
            // Form encoding: '+' stands for a space.
            let v = v.replace('+', " ");
            let v = match urlencoding::decode(&v) {
                Ok(decoded) => decoded.into_owned(),
                Err(_) => v.clone(),
            };
            match k {
                "error" => error = Some(v),
                "error_description" => description = Some(v),
                _ => {}
            }
        }
        description.or(error).filter(|s| !s.trim().is_empty())
    }

    pub(crate) fn from_token_response(resp: TokenResponse, previous: &Session, now_ms: i64) -> Self {
        Self {
            access_token: resp.access_token,
            // Some deployments omit the rotated token; keep the old one then.
            refresh_token: resp.refresh_token.or_else(|| previous.refresh_token.clone()),
            expires_at_ms: resp.expires_in.map(|s| now_ms + s * 1000),
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        match self.expires_at_ms {
            Some(at) => now_ms + EXPIRY_SKEW_MS >= at,
            None => false,
        }
    }
}
