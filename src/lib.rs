mod api;
mod app;
mod components;
mod config;
mod logging;
mod models;
mod pages;
mod state;
mod storage;
mod util;

pub use api::{ApiError, ApiErrorKind, ApiResult, Gateway, Session, SupabaseClient};
pub use app::App;
pub use config::EnvConfig;
pub use models::{Bookmark, BookmarkPatch, Identity, NewBookmark, OrderBy};
pub use state::{
    filter_bookmarks, AppState, DeleteGate, FormState, GateOutcome, LiveState, MutationOutcome,
    SessionState, Snapshot, ThemeMode, Toast, ToastKind, Toasts, SIGN_IN_PROVIDER,
};

use leptos::prelude::*;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    let config = EnvConfig::new();
    logging::init(config.max_level());
    tracing::info!(
        configured = config.is_complete(),
        table = %config.table,
        "starting shelfmark"
    );
    mount_to_body(move || view! { <App config=config.clone() /> });
}
