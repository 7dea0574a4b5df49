//! Login and signup form models.

use courier_shared::protocol::{LoginRequest, SignupRequest};
use courier_shared::{CourierError, Result};

use crate::commands::auth::validate_signup;

/// Message shown for a failure: the backend's own text when it sent one,
/// the transport wording for network trouble, `fallback` otherwise.
fn failure_text(error: &CourierError, fallback: &str) -> String {
    match error {
        CourierError::Auth(msg) | CourierError::Validation(msg) if !msg.trim().is_empty() => {
            msg.clone()
        }
        _ if error.is_transient() => error.user_message(),
        _ => fallback.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub loading: bool,
    pub error: Option<String>,
}

impl LoginForm {
    pub fn fill(&mut self, email: &str, password: &str) {
        self.email = email.trim().to_string();
        self.password = password.to_string();
        self.error = None;
    }

    /// Mark the form as submitting and build the request.
    pub fn submit(&mut self) -> LoginRequest {
        self.loading = true;
        self.error = None;
        LoginRequest {
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }

    pub fn succeed(&mut self) {
        *self = Self::default();
    }

    pub fn fail(&mut self, error: &CourierError) {
        self.loading = false;
        self.password.clear();
        self.error = Some(failure_text(error, "Login failed"));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub password: String,
    pub confirm_password: String,
    pub loading: bool,
    pub error: Option<String>,
}

impl SignupForm {
    /// Validate and build the request. A validation failure is recorded on
    /// the form and returned.
    pub fn submit(&mut self) -> Result<SignupRequest> {
        let request = SignupRequest {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            mobile: self.mobile.trim().to_string(),
            password: self.password.clone(),
        };
        if let Err(e) = validate_signup(&request, &self.confirm_password) {
            self.error = Some(failure_text(&e, "Signup failed"));
            return Err(e);
        }
        self.loading = true;
        self.error = None;
        Ok(request)
    }

    pub fn succeed(&mut self) {
        *self = Self::default();
    }

    pub fn fail(&mut self, error: &CourierError) {
        self.loading = false;
        self.error = Some(failure_text(error, "Signup failed"));
    }
}
