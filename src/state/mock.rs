//! In-memory gateway for state tests. Rows are kept newest first, like the
//! real `order=created_at.desc` query.

use crate::api::{ApiError, ApiErrorKind, ApiResult, Gateway};
use crate::models::{Bookmark, BookmarkPatch, Identity, NewBookmark, OrderBy};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    CurrentIdentity,
    SignIn(String),
    SignOut,
    Insert {
        title: String,
        url: String,
        owner: String,
    },
    Update {
        id: String,
        title: String,
        url: String,
    },
    Delete(String),
    SelectAll,
}

#[derive(Default)]
struct Inner {
    identity: Option<Identity>,
    rows: Vec<Bookmark>,
    calls: Vec<Call>,
    failures: HashMap<&'static str, ApiError>,
    held: HashMap<&'static str, Arc<Semaphore>>,
    next_id: u64,
}

#[derive(Default)]
pub(crate) struct MockGateway {
    inner: Mutex<Inner>,
}

pub(crate) fn identity(id: &str) -> Identity {
    Identity {
        id: id.to_string(),
        email: Some(format!("{id}@example.com")),
    }
}

pub(crate) fn bookmark(id: &str, title: &str) -> Bookmark {
    Bookmark {
        id: id.to_string(),
        title: title.to_string(),
        url: format!("https://example.com/{id}"),
        owner: "u1".to_string(),
        created_at: String::new(),
    }
}

impl MockGateway {
    pub fn signed_in(id: &str) -> Self {
        let gw = Self::default();
        gw.with(|i| {
            i.identity = Some(identity(id));
            i.next_id = 1000;
        });
        gw
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut guard = self.inner.lock().expect("mock lock");
        f(&mut guard)
    }

    pub fn set_rows(&self, rows: Vec<Bookmark>) {
        self.with(|i| i.rows = rows);
    }

    /// Makes the next call of `op` fail with `message`.
    pub fn fail_next(&self, op: &'static str, message: &str) {
        self.fail_next_with(op, ApiErrorKind::Http, message);
    }

    pub fn fail_next_with(&self, op: &'static str, kind: ApiErrorKind, message: &str) {
        self.with(|i| {
            i.failures.insert(op, ApiError::new(kind, message));
        });
    }

    /// Calls of `op` are recorded but do not return until [`Self::release`].
    pub fn hold(&self, op: &'static str) {
        self.with(|i| {
            i.held.insert(op, Arc::new(Semaphore::new(0)));
        });
    }

    pub fn release(&self, op: &'static str) {
        if let Some(gate) = self.with(|i| i.held.remove(op)) {
            gate.close();
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with(|i| i.calls.clone())
    }

    pub fn clear_calls(&self) {
        self.with(|i| i.calls.clear());
    }

    pub fn count(&self, call: &Call) -> usize {
        self.with(|i| i.calls.iter().filter(|c| *c == call).count())
    }

    /// Records the call, yields once so concurrent callers can interleave,
    /// waits while `op` is held, then reports any scripted failure.
    async fn enter(&self, op: &'static str, call: Call) -> ApiResult<()> {
        let gate = self.with(|i| {
            i.calls.push(call);
            i.held.get(op).cloned()
        });
        tokio::task::yield_now().await;
        if let Some(gate) = gate {
            // Closed on release; the error is the wake-up.
            let _ = gate.acquire().await;
        }
        match self.with(|i| i.failures.remove(op)) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Gateway for MockGateway {
    async fn current_identity(&self) -> ApiResult<Option<Identity>> {
        self.enter("current_identity", Call::CurrentIdentity).await?;
        Ok(self.with(|i| i.identity.clone()))
    }

    async fn sign_in_with_provider(&self, provider: &str) -> ApiResult<()> {
        self.enter("sign_in", Call::SignIn(provider.to_string())).await
    }

    async fn sign_out(&self) -> ApiResult<()> {
        let result = self.enter("sign_out", Call::SignOut).await;
        self.with(|i| i.identity = None);
        result
    }

    async fn insert(&self, record: &NewBookmark) -> ApiResult<()> {
        self.enter(
            "insert",
            Call::Insert {
                title: record.title.clone(),
                url: record.url.clone(),
                owner: record.owner.clone(),
            },
        )
        .await?;
        self.with(|i| {
            i.next_id += 1;
            let row = Bookmark {
                id: i.next_id.to_string(),
                title: record.title.clone(),
                url: record.url.clone(),
                owner: record.owner.clone(),
                created_at: String::new(),
            };
            i.rows.insert(0, row);
        });
        Ok(())
    }

    async fn update(&self, id: &str, patch: &BookmarkPatch) -> ApiResult<()> {
        self.enter(
            "update",
            Call::Update {
                id: id.to_string(),
                title: patch.title.clone(),
                url: patch.url.clone(),
            },
        )
        .await?;
        self.with(|i| {
            if let Some(row) = i.rows.iter_mut().find(|r| r.id == id) {
                row.title = patch.title.clone();
                row.url = patch.url.clone();
            }
        });
        Ok(())
    }

    async fn delete(&self, id: &str) -> ApiResult<()> {
        self.enter("delete", Call::Delete(id.to_string())).await?;
        self.with(|i| i.rows.retain(|r| r.id != id));
        Ok(())
    }

    async fn select_all(&self, order: &OrderBy) -> ApiResult<Vec<Bookmark>> {
        assert_eq!(order, &OrderBy::NEWEST_FIRST);
        self.enter("select_all", Call::SelectAll).await?;
        Ok(self.with(|i| i.rows.clone()))
    }
}
