//! View composition: route gating, form models, the chat view models and
//! the terminal adapter that renders them.

pub mod chat;
pub mod forms;
pub mod terminal;

use crate::view::forms::{LoginForm, SignupForm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Signup,
    Chat,
}

/// The route actually shown for `requested`. Chat needs a session; the
/// login and signup routes are always reachable.
pub fn route_for(authenticated: bool, requested: Route) -> Route {
    match requested {
        Route::Chat if !authenticated => Route::Login,
        other => other,
    }
}

/// Everything the front-end keeps that is not domain state.
#[derive(Debug, Clone)]
pub struct Screen {
    requested: Route,
    pub login: LoginForm,
    pub signup: SignupForm,
    /// One-line notice shown above the prompt, e.g. "Account created".
    pub notice: Option<String>,
}

impl Screen {
    /// Start on the chat route; gating sends signed-out users to login.
    pub fn new() -> Self {
        Self {
            requested: Route::Chat,
            login: LoginForm::default(),
            signup: SignupForm::default(),
            notice: None,
        }
    }

    pub fn navigate(&mut self, route: Route) {
        self.requested = route;
    }

    pub fn route(&self, authenticated: bool) -> Route {
        route_for(authenticated, self.requested)
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_requires_session() {
        assert_eq!(route_for(false, Route::Chat), Route::Login);
        assert_eq!(route_for(true, Route::Chat), Route::Chat);
        assert_eq!(route_for(false, Route::Signup), Route::Signup);
        assert_eq!(route_for(true, Route::Login), Route::Login);
    }

    #[test]
    fn test_screen_starts_gated() {
        let screen = Screen::new();
        assert_eq!(screen.route(false), Route::Login);
        assert_eq!(screen.route(true), Route::Chat);
    }
}
