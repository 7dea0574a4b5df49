//! The terminal front-end: turns typed lines and background events into
//! commands, and renders the current route.
//!
//! [`App::handle_line`] is the error boundary. Every failure of a command
//! ends up as an inline message on the current route and the loop carries on.

use std::sync::Arc;

use tracing::{debug, error, info};

use courier_shared::protocol::SignupRequest;
use courier_shared::{CourierError, Result};

use crate::commands::{auth, directory, messaging};
use crate::events::UiEvent;
use crate::state::{lock, AppState};
use crate::view::chat::{ComposerView, DirectoryView, ThreadView};
use crate::view::terminal::{self, help_lines, parse_input, Intent};
use crate::view::{Route, Screen};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App {
    state: Arc<AppState>,
    screen: Screen,
}

impl App {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            screen: Screen::new(),
        }
    }

    pub fn route(&self) -> Route {
        self.screen.route(self.state.is_authenticated())
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    /// Resume a restored session.
    pub async fn start(&mut self) {
        if self.state.is_authenticated() {
            info!("Resuming stored session");
            auth::enter_chat(&self.state).await;
        }
    }

    pub async fn handle_line(&mut self, line: &str) -> Flow {
        let intent = parse_input(line);
        debug!(?intent, "Input");
        self.screen.notice = None;

        match self.dispatch(intent).await {
            Ok(flow) => flow,
            Err(e) => {
                self.show_error(&e);
                Flow::Continue
            }
        }
    }

    pub async fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::SessionRejected { reason } => {
                info!(reason = %reason, "Realtime rejected the session");
                auth::invalidate_session(&self.state).await;
                self.screen.login.error = Some("Your session has expired, please log in again".into());
            }
            UiEvent::InternalError(message) => {
                error!(message = %message, "Internal error");
                self.screen.notice = Some(format!("Internal error: {message}"));
            }
            UiEvent::NewMessage { .. }
            | UiEvent::UnreadChanged { .. }
            | UiEvent::ConnectionChanged(_) => {}
        }
    }

    /// Close the realtime link before exiting.
    pub async fn shutdown(&mut self) {
        auth::close_realtime(&self.state).await;
    }

    fn show_error(&mut self, error: &CourierError) {
        match self.route() {
            Route::Login => self.screen.login.fail(error),
            Route::Signup => self.screen.signup.fail(error),
            Route::Chat => self.screen.notice = Some(error.user_message()),
        }
    }

    fn require_chat(&self) -> Result<()> {
        if self.route() == Route::Chat {
            Ok(())
        } else {
            Err(CourierError::Validation("Log in first".into()))
        }
    }

    async fn dispatch(&mut self, intent: Intent) -> Result<Flow> {
        let state = self.state.clone();

        match intent {
            Intent::Navigate(route) => self.screen.navigate(route),

            Intent::Login { email, password } => {
                self.screen.navigate(Route::Login);
                self.screen.login.fill(&email, &password);
                let request = self.screen.login.submit();
                auth::login(&state, request).await?;
                self.screen.login.succeed();
                self.screen.navigate(Route::Chat);
            }

            Intent::Signup {
                email,
                mobile,
                password,
                confirm_password,
                name,
            } => {
                self.screen.navigate(Route::Signup);
                let form = &mut self.screen.signup;
                form.name = name;
                form.email = email;
                form.mobile = mobile;
                form.password = password;
                form.confirm_password = confirm_password;
                let request: SignupRequest = form.submit()?;
                let confirm = form.confirm_password.clone();

                auth::signup(&state, request, &confirm).await?;
                self.screen.signup.succeed();
                self.screen.navigate(Route::Login);
                self.screen.notice = Some("Account created, you can log in now".into());
            }

            Intent::RefreshUsers => {
                self.require_chat()?;
                directory::refresh_users(&state).await?;
            }

            Intent::Open(index) => {
                self.require_chat()?;
                messaging::select_peer(&state, index).await?;
            }

            Intent::Attach(path) => {
                self.require_chat()?;
                let kind = messaging::attach_file(&state, &path).await?;
                self.screen.notice = Some(format!("Attached {} ({})", path.display(), kind.as_str()));
            }

            Intent::Detach => {
                if !messaging::detach_file(&state)? {
                    self.screen.notice = Some("Nothing attached".into());
                }
            }

            Intent::Logout => {
                auth::logout(&state).await?;
                self.screen.navigate(Route::Login);
            }

            Intent::Quit => return Ok(Flow::Quit),

            Intent::Help => self.screen.notice = Some(help_lines().join("\n")),

            Intent::Send(text) => {
                if text.trim().is_empty() && self.route() != Route::Chat {
                    return Ok(Flow::Continue);
                }
                self.require_chat()?;
                messaging::set_draft(&state, text)?;
                messaging::send_message(&state).await?;
            }

            Intent::Usage(usage) => {
                return Err(CourierError::Validation(format!("Usage: {usage}")));
            }

            Intent::Unknown(name) => {
                return Err(CourierError::Validation(format!(
                    "Unknown command /{name}, try /help"
                )));
            }
        }

        Ok(Flow::Continue)
    }

    pub fn render(&self) -> Vec<String> {
        let mut lines = match self.route() {
            Route::Login => terminal::render_login(&self.screen.login),
            Route::Signup => terminal::render_signup(&self.screen.signup),
            Route::Chat => self.render_chat().unwrap_or_else(|e| vec![format!("! {e}")]),
        };
        if let Some(notice) = &self.screen.notice {
            lines.extend(notice.lines().map(str::to_string));
        }
        lines
    }

    fn render_chat(&self) -> Result<Vec<String>> {
        let own_id = self.state.own_id();
        let (thread, selected, unread) = {
            let conversation = lock(&self.state.conversation)?;
            (
                ThreadView::build(&conversation, own_id.as_ref()),
                conversation.peer().map(|p| p.id.clone()),
                conversation.unread().clone(),
            )
        };
        let directory = DirectoryView::build(&*lock(&self.state.directory)?, selected.as_ref(), &unread);
        let composer = ComposerView::build(&*lock(&self.state.composer)?, selected.is_some());

        Ok(terminal::render_chat(
            &directory,
            &thread,
            &composer,
            self.state.connection_state(),
        ))
    }
}
