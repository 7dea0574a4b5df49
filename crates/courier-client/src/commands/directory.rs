use tracing::{info, warn};

use courier_shared::Result;

use super::{check_auth, with_timeout};
use crate::state::{lock, AppState};

/// Fetch every user and replace the directory listing.
///
/// On failure the error is stored on the directory for the view and
/// returned. A rejected token also ends the session.
pub async fn refresh_users(state: &AppState) -> Result<usize> {
    let token = state.token()?;
    let fetched = with_timeout(state.config.request_timeout, state.backend.list_users(&token)).await;

    match check_auth(state, fetched).await {
        Ok(users) => {
            let own_id = state.own_id();
            let count = lock(&state.directory)?.replace(users, own_id.as_ref());
            info!(count, "Directory refreshed");
            Ok(count)
        }
        Err(e) => {
            warn!(error = %e, "Failed to fetch users");
            if let Ok(mut directory) = lock(&state.directory) {
                directory.set_error(e.user_message());
            }
            Err(e)
        }
    }
}
