mod collection;
mod delete_gate;
mod filter;
mod form;
mod session;
mod theme;
mod toast;

#[cfg(all(test, not(target_arch = "wasm32")))]
mod mock;

pub use collection::MutationOutcome;
pub use delete_gate::{DeleteGate, GateOutcome};
pub use filter::filter_bookmarks;
pub use form::FormState;
pub use session::{SessionState, SIGN_IN_PROVIDER};
pub use theme::ThemeMode;
pub use toast::{Toast, ToastKind, Toasts};

use crate::api::SupabaseClient;
use crate::models::{Bookmark, Identity};
use leptos::prelude::*;
use std::sync::{Arc, Mutex, MutexGuard};

/// Everything the page renders, in one place.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub session: SessionState,
    /// Newest first, exactly as the backend last returned it.
    pub bookmarks: Vec<Bookmark>,
    pub search: String,
    pub form: FormState,
    pub delete_gate: DeleteGate,
    pub toasts: Toasts,
    pub pending_mutations: usize,
}

impl Snapshot {
    pub fn identity(&self) -> Option<&Identity> {
        match &self.session {
            SessionState::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.identity().map(|i| i.id.as_str())
    }

    pub fn visible_bookmarks(&self) -> Vec<Bookmark> {
        filter_bookmarks(&self.bookmarks, &self.search)
    }

    pub fn is_busy(&self) -> bool {
        self.pending_mutations > 0
    }

    /// Back to signed out with nothing of the previous user left behind.
    pub(crate) fn end_session(&mut self) {
        self.session = SessionState::SignedOut;
        self.bookmarks.clear();
        self.form.clear();
        self.delete_gate.clear();
    }
}

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Application state over a [`Gateway`](crate::api::Gateway).
///
/// The local collection is a read-through cache: every successful create,
/// update or delete is followed by exactly one full refresh, and nothing
/// patches the list locally. Mutations are serialized through a FIFO lock so
/// overlapping requests hit the backend in the order they were issued.
///
/// Cloning is cheap and clones share state.
pub struct AppState<G> {
    gateway: Arc<G>,
    snapshot: Arc<Mutex<Snapshot>>,
    mutations: Arc<tokio::sync::Mutex<()>>,
    listener: Option<Listener>,
}

impl<G> Clone for AppState<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            snapshot: Arc::clone(&self.snapshot),
            mutations: Arc::clone(&self.mutations),
            listener: self.listener.clone(),
        }
    }
}

impl<G> AppState<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway: Arc::new(gateway),
            snapshot: Arc::new(Mutex::new(Snapshot::default())),
            mutations: Arc::new(tokio::sync::Mutex::new(())),
            listener: None,
        }
    }

    /// Called after every state change. The view layer uses it to bump a
    /// revision signal.
    pub fn with_listener(mut self, listener: impl Fn() + Send + Sync + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        match self.snapshot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().clone()
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        f(&self.lock())
    }

    /// Applies `f` and then notifies the listener. The lock is released
    /// before the listener runs.
    pub(crate) fn mutate<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        let out = {
            let mut guard = self.lock();
            f(&mut guard)
        };
        if let Some(listener) = &self.listener {
            listener();
        }
        out
    }

    pub fn session(&self) -> SessionState {
        self.read(|s| s.session.clone())
    }

    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.read(|s| s.bookmarks.clone())
    }

    pub fn visible_bookmarks(&self) -> Vec<Bookmark> {
        self.read(Snapshot::visible_bookmarks)
    }

    pub fn set_search(&self, term: impl Into<String>) {
        let term = term.into();
        self.mutate(|s| s.search = term);
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.read(|s| s.toasts.items().to_vec())
    }

    pub fn dismiss_toast(&self, id: u64) {
        self.mutate(|s| {
            s.toasts.dismiss(id);
        });
    }

    pub(crate) fn notify_success(&self, message: impl Into<String>) {
        let message = message.into();
        self.mutate(|s| s.toasts.push(ToastKind::Success, message));
    }

    pub(crate) fn notify_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.mutate(|s| s.toasts.push(ToastKind::Error, message));
    }
}

pub type LiveState = AppState<SupabaseClient>;

/// Handle the view layer shares through context. `revision` changes on every
/// state mutation so reactive closures can track it.
#[derive(Clone, Copy)]
pub(crate) struct AppContext {
    pub state: StoredValue<LiveState>,
    pub revision: RwSignal<u64>,
    pub theme: RwSignal<ThemeMode>,
    /// Backend URL and key are present.
    pub configured: bool,
}

impl AppContext {
    pub fn new(gateway: SupabaseClient, theme: ThemeMode, configured: bool) -> Self {
        let revision = RwSignal::new(0u64);
        let state = AppState::new(gateway).with_listener(move || {
            // Late responses may land after the owner is gone.
            let _ = revision.try_update(|r| *r = r.wrapping_add(1));
        });
        Self {
            state: StoredValue::new(state),
            revision,
            theme: RwSignal::new(theme),
            configured,
        }
    }

    /// Tracked projection; pair with `Memo` so unrelated changes don't re-render.
    pub fn select<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        self.revision.track();
        self.state.with_value(|s| s.read(f))
    }

    pub fn state(&self) -> LiveState {
        self.state.get_value()
    }
}
