use tracing::{info, warn};

use courier_shared::protocol::{LoginRequest, SignupRequest};
use courier_shared::{CourierError, Result};

use super::{directory, with_timeout};
use crate::session::Session;
use crate::state::{lock, AppState};

/// Check a signup submission before anything is sent.
pub fn validate_signup(request: &SignupRequest, confirm_password: &str) -> Result<()> {
    let fields = [
        &request.name,
        &request.email,
        &request.mobile,
        &request.password,
    ];
    if fields.iter().any(|f| f.trim().is_empty()) || confirm_password.is_empty() {
        return Err(CourierError::Validation("All fields are required".into()));
    }
    if request.password != confirm_password {
        return Err(CourierError::Validation("Passwords do not match".into()));
    }
    Ok(())
}

pub async fn login(state: &AppState, request: LoginRequest) -> Result<Session> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(CourierError::Validation(
            "Email and password are required".into(),
        ));
    }

    let response = with_timeout(state.config.request_timeout, state.backend.login(&request)).await?;

    // Signing in over a live session: the old link and local state belong to it.
    if state.is_authenticated() {
        info!("Replacing the current session");
        close_realtime(state).await;
        reset_local(state);
    }

    let session = lock(&state.session)?.login(response)?;
    info!(email = %request.email, "Logged in");

    enter_chat(state).await;
    Ok(session)
}

pub async fn signup(state: &AppState, request: SignupRequest, confirm_password: &str) -> Result<()> {
    validate_signup(&request, confirm_password)?;
    with_timeout(state.config.request_timeout, state.backend.signup(&request)).await?;
    info!(email = %request.email, "Account created");
    Ok(())
}

/// Authenticated entry: open the realtime link and load the directory.
///
/// Neither failure blocks entry. A directory error is kept on the directory
/// for the view, and connection problems show up as connection state.
pub async fn enter_chat(state: &AppState) {
    if let Err(e) = connect_realtime(state) {
        warn!(error = %e, "Failed to open realtime channel");
    }
    if let Err(e) = directory::refresh_users(state).await {
        warn!(error = %e, "Directory unavailable on entry");
    }
}

/// Open the realtime link for the current session, once.
pub fn connect_realtime(state: &AppState) -> Result<()> {
    let mut slot = lock(&state.realtime)?;
    if slot.is_some() {
        return Ok(());
    }
    let token = state.token()?;
    *slot = Some(state.connector.connect(&token, state.inbound())?);
    Ok(())
}

pub async fn logout(state: &AppState) -> Result<bool> {
    close_realtime(state).await;
    reset_local(state);
    lock(&state.session)?.logout()
}

/// Sign out after the backend refused the token.
pub async fn invalidate_session(state: &AppState) {
    close_realtime(state).await;
    reset_local(state);
    match lock(&state.session) {
        Ok(mut session) => session.invalidate(),
        Err(e) => warn!(error = %e, "Failed to invalidate session"),
    }
}

/// Close the realtime link. Safe to call when none is open.
pub async fn close_realtime(state: &AppState) {
    let link = match lock(&state.realtime) {
        Ok(mut slot) => slot.take(),
        Err(_) => None,
    };
    if let Some(mut link) = link {
        link.close().await;
    }
}

fn reset_local(state: &AppState) {
    if let Ok(mut conversation) = lock(&state.conversation) {
        conversation.reset();
    }
    if let Ok(mut directory) = lock(&state.directory) {
        directory.clear();
    }
    if let Ok(mut composer) = lock(&state.composer) {
        composer.clear();
    }
}
