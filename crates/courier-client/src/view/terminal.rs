//! Terminal adapter: renders view models to lines and parses typed input.

use std::path::PathBuf;

use courier_shared::constants::APP_NAME;
use courier_shared::ConnectionState;

use crate::view::chat::{
    ComposerView, DirectoryView, MessageBody, ThreadLine, ThreadView, THREAD_PLACEHOLDER,
};
use crate::view::forms::{LoginForm, SignupForm};
use crate::view::Route;

/// What a typed line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Navigate(Route),
    Login {
        email: String,
        password: String,
    },
    Signup {
        email: String,
        mobile: String,
        password: String,
        confirm_password: String,
        name: String,
    },
    RefreshUsers,
    /// Zero-based directory index.
    Open(usize),
    Attach(PathBuf),
    Detach,
    Logout,
    Quit,
    Help,
    /// Plain text for the composer. May be empty to send a lone attachment.
    Send(String),
    /// A command with the wrong arguments; carries its usage line.
    Usage(&'static str),
    Unknown(String),
}

const USAGE_LOGIN: &str = "/login <email> <password>";
const USAGE_SIGNUP: &str = "/signup <email> <mobile> <password> <confirm-password> <name...>";
const USAGE_OPEN: &str = "/open <number>";
const USAGE_ATTACH: &str = "/attach <path>";

pub fn parse_input(line: &str) -> Intent {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let Some(command) = line.strip_prefix('/') else {
        return Intent::Send(line.to_string());
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match (name, args.as_slice()) {
        ("login", []) => Intent::Navigate(Route::Login),
        ("login", [email, password]) => Intent::Login {
            email: email.to_string(),
            password: password.to_string(),
        },
        ("login", _) => Intent::Usage(USAGE_LOGIN),

        ("signup" | "register", []) => Intent::Navigate(Route::Signup),
        ("signup" | "register", [email, mobile, password, confirm, name @ ..]) if !name.is_empty() => {
            Intent::Signup {
                email: email.to_string(),
                mobile: mobile.to_string(),
                password: password.to_string(),
                confirm_password: confirm.to_string(),
                name: name.join(" "),
            }
        }
        ("signup" | "register", _) => Intent::Usage(USAGE_SIGNUP),

        ("users", _) => Intent::RefreshUsers,

        ("open", [n]) => match n.parse::<usize>() {
            Ok(n) if n >= 1 => Intent::Open(n - 1),
            _ => Intent::Usage(USAGE_OPEN),
        },
        ("open", _) => Intent::Usage(USAGE_OPEN),

        ("attach", []) => Intent::Usage(USAGE_ATTACH),
        ("attach", _) => {
            let path = command["attach".len()..].trim();
            Intent::Attach(PathBuf::from(path))
        }
        ("detach", _) => Intent::Detach,
        ("logout", _) => Intent::Logout,
        ("quit" | "exit", _) => Intent::Quit,
        ("help" | "?", _) => Intent::Help,
        _ => Intent::Unknown(name.to_string()),
    }
}

pub fn help_lines() -> Vec<String> {
    [
        USAGE_LOGIN,
        USAGE_SIGNUP,
        "/users                 reload the user list",
        USAGE_OPEN,
        USAGE_ATTACH,
        "/detach                drop the pending attachment",
        "/logout",
        "/quit",
        "<text>                 send to the open conversation",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// The degraded-connection banner, if any.
pub fn render_banner(state: ConnectionState) -> Option<String> {
    state
        .is_degraded()
        .then(|| format!("[realtime {state}: new messages may be delayed]"))
}

fn push_error(lines: &mut Vec<String>, error: Option<&str>) {
    if let Some(error) = error {
        lines.push(format!("! {error}"));
    }
}

pub fn render_login(form: &LoginForm) -> Vec<String> {
    let mut lines = vec![format!("== {APP_NAME} :: Log in ==")];
    if !form.email.is_empty() {
        lines.push(format!("Email: {}", form.email));
    }
    if form.loading {
        lines.push("Signing in...".to_string());
    }
    push_error(&mut lines, form.error.as_deref());
    lines.push(format!("{USAGE_LOGIN}   (or /signup to create an account)"));
    lines
}

pub fn render_signup(form: &SignupForm) -> Vec<String> {
    let mut lines = vec![format!("== {APP_NAME} :: Create account ==")];
    if form.loading {
        lines.push("Creating account...".to_string());
    }
    push_error(&mut lines, form.error.as_deref());
    lines.push(USAGE_SIGNUP.to_string());
    lines.push("Already registered? /login".to_string());
    lines
}

fn render_line(line: &ThreadLine) -> String {
    let who = if line.own { "you" } else { "them" };
    let time = line
        .sent_at
        .map(|t| format!("{} ", t.format("%H:%M")))
        .unwrap_or_default();
    let body = match &line.body {
        MessageBody::Text(text) => text.clone(),
        MessageBody::Image(url) => format!("[image] {url}"),
        MessageBody::Video(url) => format!("[video] {url}"),
        MessageBody::Document(url) => format!("[document] {url}"),
    };
    format!("  {time}{who:>4}: {body}")
}

pub fn render_chat(
    directory: &DirectoryView,
    thread: &ThreadView,
    composer: &ComposerView,
    connection: ConnectionState,
) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(banner) = render_banner(connection) {
        lines.push(banner);
    }

    lines.push("-- Users --".to_string());
    push_error(&mut lines, directory.error.as_deref());
    if directory.entries.is_empty() && directory.error.is_none() {
        lines.push("  (no users yet, try /users)".to_string());
    }
    for entry in &directory.entries {
        let marker = if entry.selected { '>' } else { ' ' };
        let unread = if entry.unread > 0 {
            format!(" ({} new)", entry.unread)
        } else {
            String::new()
        };
        lines.push(format!(
            "{marker} {:>2}. {} <{}>{unread}",
            entry.number, entry.name, entry.email
        ));
    }

    lines.push(String::new());
    match &thread.header {
        None => lines.push(THREAD_PLACEHOLDER.to_string()),
        Some(header) => {
            lines.push(format!("-- {header} --"));
            if thread.loading {
                lines.push("  loading history...".to_string());
            }
            lines.extend(thread.lines.iter().map(render_line));
        }
    }

    if let Some(attachment) = &composer.attachment {
        lines.push(format!("Attached: {attachment}   (/detach to remove)"));
    }
    lines
}
