use super::AppState;
use crate::api::Gateway;
use crate::models::Identity;

pub const SIGN_IN_PROVIDER: &str = "google";

/// `Loading -> SignedOut`, `Loading -> SignedIn`, `SignedIn -> SignedOut`.
/// Nothing goes back to `Loading` short of a page reload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Loading,
    SignedOut,
    SignedIn(Identity),
}

impl<G: Gateway> AppState<G> {
    /// Resolves the startup session. Signed-in users get their collection
    /// loaded right away.
    pub async fn initialize(&self) {
        if self.read(|s| s.session != SessionState::Loading) {
            tracing::debug!("initialize called after session resolved; ignoring");
            return;
        }

        let identity = match self.gateway.current_identity().await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(error = %e, "could not resolve current identity");
                None
            }
        };

        match identity {
            Some(identity) => {
                tracing::info!(user = %identity.id, "signed in");
                let owner = identity.id.clone();
                self.mutate(|s| s.session = SessionState::SignedIn(identity));
                self.refresh(&owner).await;
            }
            None => {
                tracing::info!("signed out");
                self.mutate(|s| s.session = SessionState::SignedOut);
            }
        }
    }

    /// Hands off to the provider flow. Local state is untouched; the redirect
    /// back re-enters through [`AppState::initialize`].
    pub async fn sign_in(&self) {
        if let Err(e) = self.gateway.sign_in_with_provider(SIGN_IN_PROVIDER).await {
            tracing::warn!(error = %e, "sign-in could not start");
            self.notify_error(e.message);
        }
    }

    /// Clears identity, collection and form whatever the gateway says.
    pub async fn sign_out(&self) {
        let result = self.gateway.sign_out().await;

        self.mutate(|s| s.end_session());

        match result {
            Ok(()) => {
                tracing::info!("signed out");
                self.notify_success("Signed out");
            }
            Err(e) => {
                tracing::warn!(error = %e, "sign-out request failed; cleared locally");
                self.notify_error(e.message);
            }
        }
    }
}
