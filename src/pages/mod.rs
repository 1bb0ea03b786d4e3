use crate::components::ui::{
    Alert, AlertDescription, AlertTitle, Button, ButtonSize, ButtonVariant, Card, CardContent,
    CardDescription, CardHeader, CardTitle, Input, Label, Spinner,
};
use crate::models::Bookmark;
use crate::state::{AppContext, SessionState, Toast, ToastKind};
use crate::storage::save_theme;
use crate::util::{display_date, display_host};
use icons::X;
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::collections::HashSet;
use wasm_bindgen::JsCast;

const TOAST_TTL_MS: i32 = 3_000;

#[component]
pub fn HomePage() -> impl IntoView {
    let ctx = expect_context::<AppContext>();
    let session = Memo::new(move |_| ctx.select(|s| s.session.clone()));

    view! {
        <div class="min-h-screen bg-background text-foreground transition-colors">
            <div class="mx-auto flex w-full max-w-2xl flex-col gap-6 px-4 py-10">
                <Header />
                {move || match session.get() {
                    SessionState::Loading => view! {
                        <div class="flex items-center justify-center gap-2 py-20 text-sm text-muted-foreground">
                            <Spinner />
                            "Loading..."
                        </div>
                    }
                    .into_any(),
                    SessionState::SignedOut => view! { <SignInCard /> }.into_any(),
                    SessionState::SignedIn(_) => view! {
                        <div class="flex flex-col gap-6">
                            <BookmarkForm />
                            <BookmarkList />
                        </div>
                    }
                    .into_any(),
                }}
            </div>
            <ToastHost />
        </div>
    }
}

#[component]
fn Header() -> impl IntoView {
    let ctx = expect_context::<AppContext>();
    let email = Memo::new(move |_| {
        ctx.select(|s| s.identity().map(|i| i.display_name().to_string()))
    });

    let on_toggle_theme = move |_: web_sys::MouseEvent| {
        let next = ctx.theme.get_untracked().toggled();
        ctx.theme.set(next);
        save_theme(next);
    };

    let on_sign_out = move |_: web_sys::MouseEvent| {
        let state = ctx.state();
        spawn_local(async move {
            state.sign_out().await;
        });
    };

    view! {
        <header class="flex items-center justify-between gap-3">
            <div class="flex items-center gap-2">
                <span class="text-lg font-semibold">"Shelfmark"</span>
                <span class="hidden text-xs text-muted-foreground sm:inline">"Your links, in one place."</span>
            </div>

            <div class="flex items-center gap-2">
                <Show when=move || email.get().is_some() fallback=|| ().into_view()>
                    <span class="max-w-48 truncate text-xs text-muted-foreground">
                        {move || email.get().unwrap_or_default()}
                    </span>
                    <Button variant=ButtonVariant::Outline size=ButtonSize::Sm on:click=on_sign_out>
                        "Sign out"
                    </Button>
                </Show>

                <Button
                    variant=ButtonVariant::Ghost
                    size=ButtonSize::Icon
                    attr:title=move || if ctx.theme.get().is_dark() { "Light mode" } else { "Dark mode" }
                    on:click=on_toggle_theme
                >
                    {move || {
                        if ctx.theme.get().is_dark() {
                            view! {
                                <svg xmlns="http://www.w3.org/2000/svg" width="16" height="16" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round" aria-hidden="true">
                                    <circle cx="12" cy="12" r="4"></circle>
                                    <path d="M12 2v2M12 20v2M4.93 4.93l1.41 1.41M17.66 17.66l1.41 1.41M2 12h2M20 12h2M6.34 17.66l-1.41 1.41M19.07 4.93l-1.41 1.41"></path>
                                </svg>
                            }
                            .into_any()
                        } else {
                            view! {
                                <svg xmlns="http://www.w3.org/2000/svg" width="16" height="16" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round" aria-hidden="true">
                                    <path d="M12 3a6 6 0 0 0 9 9 9 9 0 1 1-9-9Z"></path>
                                </svg>
                            }
                            .into_any()
                        }
                    }}
                </Button>
            </div>
        </header>
    }
}

#[component]
fn SignInCard() -> impl IntoView {
    let ctx = expect_context::<AppContext>();

    let on_sign_in = move |_: web_sys::MouseEvent| {
        let state = ctx.state();
        spawn_local(async move {
            state.sign_in().await;
        });
    };

    view! {
        <Card>
            <CardHeader>
                <CardTitle class="text-lg">"Sign in"</CardTitle>
                <CardDescription>"Keep your bookmarks private and reachable from any browser."</CardDescription>
            </CardHeader>
            <CardContent>
                <div class="flex flex-col gap-3">
                    <Show when=move || !ctx.configured fallback=|| ().into_view()>
                        <Alert class="border-destructive/30">
                            <AlertTitle class="text-destructive text-sm">"Backend not configured"</AlertTitle>
                            <AlertDescription class="text-destructive text-xs">
                                "Set SUPABASE_URL and SUPABASE_ANON_KEY in window.ENV."
                            </AlertDescription>
                        </Alert>
                    </Show>
                    <Button class="w-full" on:click=on_sign_in>
                        "Continue with Google"
                    </Button>
                </div>
            </CardContent>
        </Card>
    }
}

#[component]
fn BookmarkForm() -> impl IntoView {
    let ctx = expect_context::<AppContext>();
    let title = Memo::new(move |_| ctx.select(|s| s.form.title.clone()));
    let url = Memo::new(move |_| ctx.select(|s| s.form.url.clone()));
    let editing = Memo::new(move |_| ctx.select(|s| s.form.is_editing()));
    let can_submit = Memo::new(move |_| ctx.select(|s| s.form.can_submit()));
    let busy = Memo::new(move |_| ctx.select(|s| s.is_busy()));

    let on_submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();
        if !can_submit.get_untracked() {
            return;
        }
        let state = ctx.state();
        spawn_local(async move {
            state.submit_form().await;
        });
    };

    let on_key_down = move |ev: web_sys::KeyboardEvent| {
        if ev.key() == "Escape" {
            ctx.state().cancel_edit();
        }
    };

    let on_cancel = move |ev: web_sys::MouseEvent| {
        ev.prevent_default();
        ctx.state().cancel_edit();
    };

    view! {
        <Card>
            <CardHeader>
                <CardTitle class="text-base">
                    {move || if editing.get() { "Edit bookmark" } else { "Add bookmark" }}
                </CardTitle>
            </CardHeader>
            <CardContent>
                <form class="flex flex-col gap-3" on:submit=on_submit on:keydown=on_key_down>
                    <div class="flex flex-col gap-1.5">
                        <Label html_for="bookmark-title" class="text-xs">"Title"</Label>
                        <Input
                            id="bookmark-title"
                            placeholder="Rust Book"
                            autofocus=true
                            value=title
                            on_input=Callback::new(move |v: String| ctx.state().set_title(v))
                        />
                    </div>
                    <div class="flex flex-col gap-1.5">
                        <Label html_for="bookmark-url" class="text-xs">"URL"</Label>
                        <Input
                            id="bookmark-url"
                            r#type="url"
                            placeholder="https://doc.rust-lang.org/book"
                            value=url
                            on_input=Callback::new(move |v: String| ctx.state().set_url(v))
                        />
                    </div>
                    <div class="flex items-center gap-2">
                        <Button
                            size=ButtonSize::Sm
                            attr:r#type="submit"
                            attr:disabled=move || !can_submit.get() || busy.get()
                        >
                            <Show when=move || busy.get() fallback=|| ().into_view()>
                                <Spinner />
                            </Show>
                            {move || if editing.get() { "Save changes" } else { "Add bookmark" }}
                        </Button>
                        <Show when=move || editing.get() fallback=|| ().into_view()>
                            <Button
                                variant=ButtonVariant::Ghost
                                size=ButtonSize::Sm
                                attr:r#type="button"
                                on:click=on_cancel
                            >
                                "Cancel"
                            </Button>
                        </Show>
                    </div>
                </form>
            </CardContent>
        </Card>
    }
}

#[component]
fn BookmarkList() -> impl IntoView {
    let ctx = expect_context::<AppContext>();
    let visible = Memo::new(move |_| ctx.select(|s| s.visible_bookmarks()));
    let total = Memo::new(move |_| ctx.select(|s| s.bookmarks.len()));
    let search = Memo::new(move |_| ctx.select(|s| s.search.clone()));

    view! {
        <section class="flex flex-col gap-3">
            <div class="flex items-center justify-between gap-3">
                <h2 class="text-sm font-semibold">"Your bookmarks"</h2>
                <span class="text-xs text-muted-foreground">
                    {move || {
                        if search.get().is_empty() {
                            format!("{}", total.get())
                        } else {
                            format!("{} of {}", visible.get().len(), total.get())
                        }
                    }}
                </span>
            </div>

            <div class="relative">
                <svg
                    xmlns="http://www.w3.org/2000/svg"
                    width="16"
                    height="16"
                    viewBox="0 0 24 24"
                    fill="none"
                    stroke="currentColor"
                    stroke-width="2"
                    stroke-linecap="round"
                    stroke-linejoin="round"
                    class="pointer-events-none absolute left-3 top-1/2 -translate-y-1/2 text-muted-foreground"
                    aria-hidden="true"
                >
                    <circle cx="11" cy="11" r="8"></circle>
                    <path d="m21 21-4.3-4.3"></path>
                </svg>
                <Input
                    r#type="search"
                    placeholder="Search by title..."
                    aria_label="Search bookmarks"
                    class="pl-9"
                    value=search
                    on_input=Callback::new(move |v: String| ctx.state().set_search(v))
                />
            </div>

            <Show
                when=move || !visible.get().is_empty()
                fallback=move || view! {
                    <div class="rounded-md border border-dashed p-6 text-center text-sm text-muted-foreground">
                        {move || {
                            if total.get() == 0 {
                                "No bookmarks yet.".to_string()
                            } else {
                                format!("No bookmarks match \"{}\".", search.get())
                            }
                        }}
                    </div>
                }
            >
                <ul class="flex flex-col gap-2">
                    {move || {
                        visible
                            .get()
                            .into_iter()
                            .map(|bookmark| view! { <BookmarkRow bookmark=bookmark /> })
                            .collect_view()
                    }}
                </ul>
            </Show>
        </section>
    }
}

#[component]
fn BookmarkRow(bookmark: Bookmark) -> impl IntoView {
    let ctx = expect_context::<AppContext>();
    let id = StoredValue::new(bookmark.id.clone());
    let target = StoredValue::new(bookmark.clone());

    let armed = Memo::new(move |_| id.with_value(|id| ctx.select(|s| s.delete_gate.is_armed(id))));
    let editing = Memo::new(move |_| {
        id.with_value(|id| ctx.select(|s| s.form.editing.as_deref() == Some(id.as_str())))
    });

    let release = move || id.with_value(|id| ctx.state().release_delete(id));

    let on_focus_out = move |ev: web_sys::FocusEvent| {
        // Focus moving between the row's own buttons is not leaving the row.
        let row = ev
            .current_target()
            .and_then(|t| t.dyn_into::<web_sys::Node>().ok());
        let next = ev
            .related_target()
            .and_then(|t| t.dyn_into::<web_sys::Node>().ok());
        let still_inside = match (row, next) {
            (Some(row), Some(next)) => row.contains(Some(&next)),
            _ => false,
        };
        if !still_inside {
            release();
        }
    };

    let on_edit = move |ev: web_sys::MouseEvent| {
        ev.stop_propagation();
        target.with_value(|b| ctx.state().begin_edit(b));
    };

    let on_delete = move |ev: web_sys::MouseEvent| {
        ev.stop_propagation();
        let state = ctx.state();
        let id = id.get_value();
        spawn_local(async move {
            state.press_delete(&id).await;
        });
    };

    let host = display_host(&bookmark.url).to_string();
    let date = display_date(&bookmark.created_at).to_string();
    let has_date = !date.is_empty();

    view! {
        <li
            class=move || {
                let base = "group flex items-center justify-between gap-3 rounded-lg border bg-card px-4 py-3 transition-colors hover:bg-accent/40";
                if editing.get() { format!("{base} border-primary/60") } else { base.to_string() }
            }
            on:mouseleave=move |_| release()
            on:focusout=on_focus_out
        >
            <div class="min-w-0 flex-1">
                <a
                    href=bookmark.url.clone()
                    target="_blank"
                    rel="noopener noreferrer"
                    class="block truncate text-sm font-medium hover:underline"
                >
                    {bookmark.title.clone()}
                </a>
                <div class="flex items-center gap-2 truncate text-xs text-muted-foreground">
                    <span class="truncate">{host}</span>
                    <Show when=move || has_date fallback=|| ().into_view()>
                        <span>"·"</span>
                        <span>{date.clone()}</span>
                    </Show>
                </div>
            </div>

            <div class="flex shrink-0 items-center gap-1">
                <Button
                    variant=ButtonVariant::Ghost
                    size=ButtonSize::Icon
                    attr:title="Edit"
                    on:click=on_edit
                >
                    <svg xmlns="http://www.w3.org/2000/svg" width="16" height="16" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round" class="text-muted-foreground" aria-hidden="true">
                        <path d="M12 20h9" />
                        <path d="M16.5 3.5a2.121 2.121 0 0 1 3 3L7 19l-4 1 1-4Z" />
                    </svg>
                </Button>

                <button
                    type="button"
                    data-armed=move || armed.get().to_string()
                    class=move || delete_button_class(armed.get())
                    title=move || delete_button_title(armed.get())
                    aria-label=move || delete_button_title(armed.get())
                    on:click=on_delete
                >
                    {move || {
                        if armed.get() {
                            view! { "Confirm" }.into_any()
                        } else {
                            view! {
                                <svg xmlns="http://www.w3.org/2000/svg" width="16" height="16" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round" aria-hidden="true">
                                    <path d="M3 6h18" />
                                    <path d="M19 6v14a2 2 0 0 1-2 2H7a2 2 0 0 1-2-2V6" />
                                    <path d="M8 6V4a2 2 0 0 1 2-2h4a2 2 0 0 1 2 2v2" />
                                </svg>
                            }
                            .into_any()
                        }
                    }}
                </button>
            </div>
        </li>
    }
}

const DELETE_BUTTON_BASE: &str = "inline-flex items-center justify-center gap-2 whitespace-nowrap rounded-md text-sm font-medium transition-colors shrink-0 outline-none focus-visible:ring-2 focus-visible:ring-ring/50 hover:cursor-pointer select-none [&_svg]:pointer-events-none";

// The delete control stays a single element while it arms, so it keeps focus
// and the row's focusout never sees it removed. Only its look changes.
fn delete_button_class(armed: bool) -> String {
    let look = if armed {
        "h-8 px-3 bg-destructive text-white shadow-xs hover:bg-destructive/90 dark:bg-destructive/70"
    } else {
        "size-8 text-destructive hover:bg-accent dark:hover:bg-accent/50"
    };
    format!("{DELETE_BUTTON_BASE} {look}")
}

fn delete_button_title(armed: bool) -> &'static str {
    if armed {
        "Click again to delete"
    } else {
        "Delete"
    }
}

#[component]
fn ToastHost() -> impl IntoView {
    let ctx = expect_context::<AppContext>();
    let toasts = Memo::new(move |_| ctx.select(|s| s.toasts.items().to_vec()));
    let scheduled = StoredValue::new(HashSet::<u64>::new());

    // Each toast gets exactly one dismissal timer.
    Effect::new(move |_| {
        for toast in toasts.get() {
            let fresh = scheduled
                .try_update_value(|set| set.insert(toast.id))
                .unwrap_or(false);
            if fresh {
                schedule_dismiss(ctx, scheduled, toast.id);
            }
        }
    });

    view! {
        <div class="pointer-events-none fixed bottom-4 right-4 z-50 flex w-80 max-w-[calc(100vw-2rem)] flex-col gap-2">
            {move || {
                toasts
                    .get()
                    .into_iter()
                    .map(|toast| view! { <ToastItem toast=toast /> })
                    .collect_view()
            }}
        </div>
    }
}

fn schedule_dismiss(ctx: AppContext, scheduled: StoredValue<HashSet<u64>>, id: u64) {
    let cb = wasm_bindgen::closure::Closure::once_into_js(move || {
        ctx.state().dismiss_toast(id);
        let _ = scheduled.try_update_value(|set| set.remove(&id));
    });
    let _ = window().set_timeout_with_callback_and_timeout_and_arguments_0(
        cb.as_ref().unchecked_ref(),
        TOAST_TTL_MS,
    );
}

#[component]
fn ToastItem(toast: Toast) -> impl IntoView {
    let ctx = expect_context::<AppContext>();
    let id = toast.id;
    let accent = match toast.kind {
        ToastKind::Success => "border-l-4 border-l-emerald-500",
        ToastKind::Error => "border-l-4 border-l-destructive",
    };

    view! {
        <div
            role="status"
            data-kind=toast.kind.as_ref().to_string()
            class=format!("pointer-events-auto flex items-start gap-3 rounded-md border bg-card px-4 py-3 text-sm shadow-md {accent}")
        >
            <span class="flex-1 break-words">{toast.message.clone()}</span>
            <button
                class="text-muted-foreground hover:text-foreground hover:cursor-pointer"
                aria-label="Dismiss"
                on:click=move |_| ctx.state().dismiss_toast(id)
            >
                <X class="size-4" />
            </button>
        </div>
    }
}
