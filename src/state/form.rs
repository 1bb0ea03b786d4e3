use super::{AppState, MutationOutcome};
use crate::api::Gateway;
use crate::models::Bookmark;

/// Add/edit form. `editing` holds the id of the bookmark being edited.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormState {
    pub title: String,
    pub url: String,
    pub editing: Option<String>,
}

impl FormState {
    pub fn can_submit(&self) -> bool {
        !self.title.trim().is_empty() && !self.url.trim().is_empty()
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    pub fn begin_edit(&mut self, bookmark: &Bookmark) {
        self.editing = Some(bookmark.id.clone());
        self.title = bookmark.title.clone();
        self.url = bookmark.url.clone();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl<G> AppState<G> {
    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        self.mutate(|s| s.form.title = title);
    }

    pub fn set_url(&self, url: impl Into<String>) {
        let url = url.into();
        self.mutate(|s| s.form.url = url);
    }

    pub fn begin_edit(&self, bookmark: &Bookmark) {
        self.mutate(|s| s.form.begin_edit(bookmark));
    }

    /// Leaves edit mode without touching the backend. No-op when adding.
    pub fn cancel_edit(&self) {
        if self.read(|s| s.form.is_editing()) {
            self.mutate(|s| s.form.clear());
        }
    }
}

impl<G: Gateway> AppState<G> {
    /// Updates the bookmark under edit, or creates a new one for the signed-in
    /// user. The form is cleared only when the backend accepted the change.
    pub async fn submit_form(&self) -> MutationOutcome {
        let (form, owner) = self.read(|s| (s.form.clone(), s.owner_id().map(str::to_string)));
        if !form.can_submit() {
            return MutationOutcome::Skipped;
        }

        let outcome = match &form.editing {
            Some(id) => self.update(id, &form.title, &form.url).await,
            None => match owner {
                Some(owner) => self.create(&form.title, &form.url, &owner).await,
                None => MutationOutcome::Skipped,
            },
        };

        if outcome == MutationOutcome::Applied {
            self.mutate(|s| s.form.clear());
        }
        outcome
    }
}
