use crate::api::SupabaseClient;
use crate::config::EnvConfig;
use crate::pages::HomePage;
use crate::state::{AppContext, ThemeMode};
use crate::storage::load_theme;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_router::components::{Route, Router, Routes};
use leptos_router::path;

#[component]
pub fn App(config: EnvConfig) -> impl IntoView {
    let gateway = SupabaseClient::load_from_storage(&config);
    let ctx = AppContext::new(gateway, initial_theme(), config.is_complete());
    provide_context(ctx);

    Effect::new(move |_| apply_theme(ctx.theme.get()));

    let state = ctx.state();
    spawn_local(async move {
        state.initialize().await;
    });

    view! {
        <Router>
            <Routes fallback=|| view! { <div class="px-4 py-8 text-xs text-muted-foreground">"Not found"</div> }>
                <Route path=path!("") view=HomePage />
            </Routes>
        </Router>
    }
}

/// Saved preference first, then the OS setting.
fn initial_theme() -> ThemeMode {
    if let Some(saved) = load_theme() {
        return saved;
    }
    let prefers_dark = web_sys::window()
        .and_then(|w| w.match_media("(prefers-color-scheme: dark)").ok().flatten())
        .map(|mq| mq.matches())
        .unwrap_or(false);
    if prefers_dark {
        ThemeMode::Dark
    } else {
        ThemeMode::Light
    }
}

/// Tailwind's `dark:` variants key off a class on `<html>`.
fn apply_theme(theme: ThemeMode) {
    let Some(root) = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.document_element())
    else {
        return;
    };
    if let Err(e) = root
        .class_list()
        .toggle_with_force("dark", theme.is_dark())
    {
        tracing::warn!(error = ?e, "could not apply theme");
    }
}
