use super::AppState;
use crate::api::{ApiError, ApiErrorKind, Gateway};
use crate::models::{BookmarkPatch, NewBookmark, OrderBy};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Backend accepted the change and the collection was re-fetched.
    Applied,
    /// Guard rejected the call; nothing was sent.
    Skipped,
    /// Backend rejected the change; the error was surfaced as a toast.
    Failed,
}

/// Keeps the busy counter honest even if the future is dropped mid-flight.
struct PendingGuard<'a, G> {
    state: &'a AppState<G>,
}

impl<'a, G> PendingGuard<'a, G> {
    fn enter(state: &'a AppState<G>) -> Self {
        state.mutate(|s| s.pending_mutations += 1);
        Self { state }
    }
}

impl<G> Drop for PendingGuard<'_, G> {
    fn drop(&mut self) {
        self.state
            .mutate(|s| s.pending_mutations = s.pending_mutations.saturating_sub(1));
    }
}

fn non_empty(title: &str, url: &str) -> Option<(String, String)> {
    let (title, url) = (title.trim(), url.trim());
    if title.is_empty() || url.is_empty() {
        None
    } else {
        Some((title.to_string(), url.to_string()))
    }
}

impl<G> AppState<G> {
    fn still_signed_in_as(&self, owner: &str) -> bool {
        self.read(|s| s.owner_id() == Some(owner))
    }

    /// Shows `message` as an error toast. A rejected token also ends the
    /// session here; the gateway has already dropped it.
    fn report_failure(&self, e: &ApiError, message: String) {
        if e.kind == ApiErrorKind::Unauthorized {
            tracing::info!("token rejected; signing out locally");
            self.mutate(|s| s.end_session());
        }
        self.notify_error(message);
    }
}

impl<G: Gateway> AppState<G> {
    /// Replaces the whole collection with the backend's current rows, newest
    /// first. On failure the collection is left as it was.
    ///
    /// The result is dropped if `owner` is no longer the signed-in identity
    /// by the time it arrives.
    pub async fn refresh(&self, owner: &str) -> bool {
        match self.gateway.select_all(&OrderBy::NEWEST_FIRST).await {
            Ok(rows) => {
                let count = rows.len();
                let applied = self.mutate(|s| {
                    if s.owner_id() != Some(owner) {
                        return false;
                    }
                    s.bookmarks = rows;
                    true
                });
                if applied {
                    tracing::debug!(owner, count, "collection refreshed");
                } else {
                    tracing::debug!(owner, "discarding refresh for a session that ended");
                }
                applied
            }
            Err(e) => {
                tracing::warn!(owner, error = %e, "refresh failed");
                let message = format!("Could not load bookmarks: {}", e.message);
                self.report_failure(&e, message);
                false
            }
        }
    }

    pub async fn create(&self, title: &str, url: &str, owner: &str) -> MutationOutcome {
        let Some((title, url)) = non_empty(title, url) else {
            return MutationOutcome::Skipped;
        };
        if !self.still_signed_in_as(owner) {
            return MutationOutcome::Skipped;
        }

        let _pending = PendingGuard::enter(self);
        let _serial = self.mutations.lock().await;
        // The session may have ended while this call was queued.
        if !self.still_signed_in_as(owner) {
            tracing::debug!(owner, "dropping queued insert for a session that ended");
            return MutationOutcome::Skipped;
        }

        let record = NewBookmark {
            title,
            url,
            owner: owner.to_string(),
        };
        match self.gateway.insert(&record).await {
            Ok(()) => {
                tracing::info!(owner, "bookmark added");
                self.refresh(owner).await;
                self.notify_success("Bookmark added");
                MutationOutcome::Applied
            }
            Err(e) => {
                tracing::warn!(owner, error = %e, "insert failed");
                self.report_failure(&e, e.message.clone());
                MutationOutcome::Failed
            }
        }
    }

    pub async fn update(&self, id: &str, title: &str, url: &str) -> MutationOutcome {
        let Some((title, url)) = non_empty(title, url) else {
            return MutationOutcome::Skipped;
        };
        let Some(owner) = self.read(|s| s.owner_id().map(str::to_string)) else {
            return MutationOutcome::Skipped;
        };

        let _pending = PendingGuard::enter(self);
        let _serial = self.mutations.lock().await;
        if !self.still_signed_in_as(&owner) {
            tracing::debug!(id, "dropping queued update for a session that ended");
            return MutationOutcome::Skipped;
        }

        match self.gateway.update(id, &BookmarkPatch { title, url }).await {
            Ok(()) => {
                tracing::info!(id, "bookmark updated");
                self.refresh(&owner).await;
                self.notify_success("Bookmark updated");
                MutationOutcome::Applied
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "update failed");
                self.report_failure(&e, e.message.clone());
                MutationOutcome::Failed
            }
        }
    }

    pub async fn delete(&self, id: &str) -> MutationOutcome {
        let _pending = PendingGuard::enter(self);
        let _serial = self.mutations.lock().await;

        match self.gateway.delete(id).await {
            Ok(()) => {
                tracing::info!(id, "bookmark deleted");
                // Editing a row that no longer exists would update nothing.
                let owner = self.mutate(|s| {
                    if s.form.editing.as_deref() == Some(id) {
                        s.form.clear();
                    }
                    s.owner_id().map(str::to_string)
                });
                if let Some(owner) = owner {
                    self.refresh(&owner).await;
                }
                self.notify_success("Bookmark deleted");
                MutationOutcome::Applied
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "delete failed");
                self.report_failure(&e, e.message.clone());
                MutationOutcome::Failed
            }
        }
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::super::mock::{bookmark, Call, MockGateway};
    use super::*;
    use crate::api::ApiErrorKind;
    use crate::models::Bookmark;
    use crate::state::{SessionState, ToastKind};
    use tokio::task::{spawn_local, LocalSet};

    async fn signed_in(rows: Vec<Bookmark>) -> AppState<MockGateway> {
        let gw = MockGateway::signed_in("u1");
        gw.set_rows(rows);
        let state = AppState::new(gw);
        state.initialize().await;
        state.gateway().clear_calls();
        state
    }

    #[tokio::test]
    async fn test_refresh_replaces_collection_in_backend_order() {
        let state = signed_in(vec![]).await;
        state
            .gateway()
            .set_rows(vec![bookmark("3", "c"), bookmark("2", "b"), bookmark("1", "a")]);

        assert!(state.refresh("u1").await);
        let ids: Vec<String> = state.bookmarks().into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_collection() {
        let state = signed_in(vec![bookmark("1", "Go Docs")]).await;
        state.gateway().set_rows(vec![]);
        state.gateway().fail_next("select_all", "timeout");

        assert!(!state.refresh("u1").await);
        assert_eq!(state.bookmarks().len(), 1);
        let toasts = state.toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].kind, ToastKind::Error);
        assert!(toasts[0].message.contains("timeout"));
    }

    #[tokio::test]
    async fn test_refresh_for_other_owner_is_discarded() {
        let state = signed_in(vec![bookmark("1", "Go Docs")]).await;
        state.gateway().set_rows(vec![]);

        assert!(!state.refresh("someone-else").await);
        assert_eq!(state.bookmarks().len(), 1);
    }

    #[tokio::test]
    async fn test_create_with_empty_title_makes_no_call() {
        let state = signed_in(vec![bookmark("1", "Go Docs")]).await;

        let out = state.create("", "https://x.com", "u1").await;

        assert_eq!(out, MutationOutcome::Skipped);
        assert!(state.gateway().calls().is_empty());
        assert_eq!(state.bookmarks().len(), 1);
    }

    #[tokio::test]
    async fn test_create_with_blank_url_makes_no_call() {
        let state = signed_in(vec![]).await;
        assert_eq!(
            state.create("Title", "   ", "u1").await,
            MutationOutcome::Skipped
        );
        assert!(state.gateway().calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_without_identity_makes_no_call() {
        let state = AppState::new(MockGateway::signed_out());
        state.initialize().await;
        state.gateway().clear_calls();

        assert_eq!(
            state.create("t", "https://x.com", "u1").await,
            MutationOutcome::Skipped
        );
        assert!(state.gateway().calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_success_inserts_then_refreshes_once() {
        let state = signed_in(vec![]).await;

        let out = state.create("  Go Docs ", "https://go.dev", "u1").await;

        assert_eq!(out, MutationOutcome::Applied);
        assert_eq!(
            state.gateway().calls(),
            vec![
                Call::Insert {
                    title: "Go Docs".to_string(),
                    url: "https://go.dev".to_string(),
                    owner: "u1".to_string(),
                },
                Call::SelectAll,
            ]
        );
        assert_eq!(state.bookmarks().len(), 1);
        assert_eq!(state.bookmarks()[0].title, "Go Docs");
        assert!(!state.snapshot().is_busy());
    }

    #[tokio::test]
    async fn test_create_failure_surfaces_message_without_refresh() {
        let state = signed_in(vec![]).await;
        state.gateway().fail_next("insert", "duplicate key value");

        let out = state.create("t", "https://x.com", "u1").await;

        assert_eq!(out, MutationOutcome::Failed);
        assert_eq!(state.gateway().count(&Call::SelectAll), 0);
        assert!(state.bookmarks().is_empty());
        assert_eq!(state.toasts()[0].message, "duplicate key value");
        assert!(!state.snapshot().is_busy());
    }

    #[tokio::test]
    async fn test_update_success_refreshes() {
        let state = signed_in(vec![bookmark("2", "Rust Book")]).await;

        let out = state
            .update("2", "The Rust Book", "https://doc.rust-lang.org/book")
            .await;

        assert_eq!(out, MutationOutcome::Applied);
        assert_eq!(state.bookmarks()[0].title, "The Rust Book");
        assert_eq!(state.gateway().count(&Call::SelectAll), 1);
    }

    #[tokio::test]
    async fn test_update_failure_no_refresh() {
        let state = signed_in(vec![bookmark("2", "Rust Book")]).await;
        state.gateway().fail_next("update", "permission denied");

        assert_eq!(
            state.update("2", "x", "https://x.com").await,
            MutationOutcome::Failed
        );
        assert_eq!(state.gateway().count(&Call::SelectAll), 0);
        assert_eq!(state.bookmarks()[0].title, "Rust Book");
    }

    #[tokio::test]
    async fn test_delete_success_and_failure() {
        let state = signed_in(vec![bookmark("2", "b"), bookmark("1", "a")]).await;

        assert_eq!(state.delete("2").await, MutationOutcome::Applied);
        assert_eq!(state.bookmarks().len(), 1);

        state.gateway().fail_next("delete", "row locked");
        assert_eq!(state.delete("1").await, MutationOutcome::Failed);
        assert_eq!(state.bookmarks().len(), 1);
        assert_eq!(state.gateway().count(&Call::SelectAll), 1);
    }

    const URL: &str = "https://x.example";

    fn insert(title: &str) -> Call {
        Call::Insert {
            title: title.to_string(),
            url: URL.to_string(),
            owner: "u1".to_string(),
        }
    }

    /// Everything but reads, in the order the backend saw it.
    fn writes(state: &AppState<MockGateway>) -> Vec<Call> {
        state
            .gateway()
            .calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::SelectAll | Call::CurrentIdentity))
            .collect()
    }

    async fn settle_until(cond: impl Fn() -> bool) {
        for _ in 0..100 {
            if cond() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("state never settled");
    }

    #[tokio::test]
    async fn test_mutations_from_separate_tasks_run_in_issue_order() {
        for late_after in 0..6 {
            let state = signed_in(vec![bookmark("1", "old")]).await;
            let local = LocalSet::new();

            local
                .run_until(async {
                    let mut tasks = Vec::new();
                    for title in ["A", "B", "C"] {
                        let state = state.clone();
                        tasks.push(spawn_local(async move {
                            state.create(title, URL, "u1").await
                        }));
                    }
                    for _ in 0..late_after {
                        tokio::task::yield_now().await;
                    }
                    let late = state.clone();
                    tasks.push(spawn_local(async move { late.delete("1").await }));

                    for task in tasks {
                        assert_eq!(task.await.expect("task"), MutationOutcome::Applied);
                    }
                })
                .await;

            assert_eq!(
                writes(&state),
                vec![
                    insert("A"),
                    insert("B"),
                    insert("C"),
                    Call::Delete("1".to_string())
                ],
                "late mutation after {late_after} yields"
            );
            let titles: Vec<String> = state.bookmarks().into_iter().map(|b| b.title).collect();
            assert_eq!(titles, vec!["C", "B", "A"]);
        }
    }

    #[tokio::test]
    async fn test_each_mutation_is_followed_by_its_own_refresh() {
        let state = signed_in(vec![bookmark("1", "old")]).await;
        let local = LocalSet::new();

        local
            .run_until(async {
                let a = {
                    let state = state.clone();
                    spawn_local(async move { state.create("A", URL, "u1").await })
                };
                let b = {
                    let state = state.clone();
                    spawn_local(async move { state.delete("1").await })
                };
                a.await.expect("task");
                b.await.expect("task");
            })
            .await;

        assert_eq!(
            state.gateway().calls(),
            vec![
                insert("A"),
                Call::SelectAll,
                Call::Delete("1".to_string()),
                Call::SelectAll
            ]
        );
    }

    #[tokio::test]
    async fn test_queued_create_is_dropped_after_sign_out() {
        let state = signed_in(vec![]).await;
        state.gateway().hold("insert");
        let local = LocalSet::new();

        local
            .run_until(async {
                let first = {
                    let state = state.clone();
                    spawn_local(async move { state.create("A", URL, "u1").await })
                };
                let queued = {
                    let state = state.clone();
                    spawn_local(async move { state.create("B", URL, "u1").await })
                };
                settle_until(|| state.snapshot().pending_mutations == 2).await;

                state.sign_out().await;
                state.gateway().release("insert");

                assert_eq!(first.await.expect("task"), MutationOutcome::Applied);
                assert_eq!(queued.await.expect("task"), MutationOutcome::Skipped);
            })
            .await;

        assert_eq!(writes(&state), vec![insert("A"), Call::SignOut]);
        assert!(state.bookmarks().is_empty());
        assert!(!state.snapshot().is_busy());
    }

    #[tokio::test]
    async fn test_queued_update_is_dropped_after_sign_out() {
        let state = signed_in(vec![bookmark("2", "b"), bookmark("1", "a")]).await;
        state.gateway().hold("delete");
        let local = LocalSet::new();

        local
            .run_until(async {
                let first = {
                    let state = state.clone();
                    spawn_local(async move { state.delete("1").await })
                };
                let queued = {
                    let state = state.clone();
                    spawn_local(async move { state.update("2", "renamed", URL).await })
                };
                settle_until(|| state.snapshot().pending_mutations == 2).await;

                state.sign_out().await;
                state.gateway().release("delete");

                assert_eq!(first.await.expect("task"), MutationOutcome::Applied);
                assert_eq!(queued.await.expect("task"), MutationOutcome::Skipped);
            })
            .await;

        assert_eq!(
            writes(&state),
            vec![Call::Delete("1".to_string()), Call::SignOut]
        );
    }

    #[tokio::test]
    async fn test_rejected_token_signs_out_locally() {
        let state = signed_in(vec![bookmark("1", "a")]).await;
        state
            .gateway()
            .fail_next_with("insert", ApiErrorKind::Unauthorized, "JWT expired");
        state.set_title("draft");

        assert_eq!(state.create("t", URL, "u1").await, MutationOutcome::Failed);

        assert_eq!(state.session(), SessionState::SignedOut);
        assert!(state.bookmarks().is_empty());
        assert_eq!(state.snapshot().form, Default::default());
        let toasts = state.toasts();
        assert_eq!(toasts.last().map(|t| t.message.as_str()), Some("JWT expired"));
        assert_eq!(state.gateway().count(&Call::SelectAll), 0);
    }

    #[tokio::test]
    async fn test_plain_http_failure_keeps_session() {
        let state = signed_in(vec![bookmark("1", "a")]).await;
        state.gateway().fail_next("delete", "row locked");

        assert_eq!(state.delete("1").await, MutationOutcome::Failed);
        assert!(matches!(state.session(), SessionState::SignedIn(_)));
        assert_eq!(state.bookmarks().len(), 1);
    }
}
