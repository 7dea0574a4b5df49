//! Command handlers invoked by the front-end.
//!
//! Each sub-module groups related commands by domain. Every handler takes
//! the shared [`AppState`](crate::state::AppState) by reference and returns
//! a `courier_shared::Result`; the caller decides how to show failures.

pub mod auth;
pub mod directory;
pub mod messaging;

use std::future::Future;
use std::time::Duration;

use courier_shared::{CourierError, Result};

use crate::state::AppState;

/// Bound a backend call by `limit`.
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout_secs = limit.as_secs_f32(), "Backend call timed out");
            Err(CourierError::Timeout(limit))
        }
    }
}

/// Sign out when the backend rejected the token of an authenticated call.
pub(crate) async fn check_auth<T>(state: &AppState, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        if e.is_auth() {
            auth::invalidate_session(state).await;
        }
    }
    result
}
