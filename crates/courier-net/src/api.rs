//! REST backend client.
//!
//! [`Backend`] is the seam between the client logic and the remote
//! services: commands only ever talk to `Arc<dyn Backend>`, which lets the
//! tests script responses without a server. [`HttpBackend`] is the real
//! implementation over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use courier_shared::constants::{PATH_LOGIN, PATH_MESSAGES, PATH_SIGNUP, PATH_UPLOAD, PATH_USERS};
use courier_shared::protocol::{
    ApiErrorBody, LoginRequest, LoginResponse, SignupRequest, UploadResponse,
};
use courier_shared::{Attachment, CourierError, Message, NewMessage, Result, User, UserId};

/// Request/response surface of the chat backend.
///
/// Authenticated calls take the session token explicitly; the backend
/// implementation holds no session state of its own.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `POST /api/auth/login`
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse>;

    /// `POST /api/auth/signup`
    async fn signup(&self, request: &SignupRequest) -> Result<()>;

    /// `GET /api/users`
    async fn list_users(&self, token: &str) -> Result<Vec<User>>;

    /// `GET /api/messages/:userId`
    async fn fetch_history(&self, token: &str, peer: &UserId) -> Result<Vec<Message>>;

    /// `POST /api/messages/upload`, returning the stored file's URL.
    async fn upload_file(&self, token: &str, attachment: &Attachment) -> Result<String>;

    /// `POST /api/messages`
    async fn create_message(&self, token: &str, message: &NewMessage) -> Result<Message>;
}

/// [`Backend`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpBackend {
    /// Build a client for `base_url` with a per-request `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| CourierError::Validation(format!("Invalid API URL '{base_url}': {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CourierError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let joined = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| CourierError::Protocol(format!("Bad endpoint {joined}: {e}")))
    }

    fn history_endpoint(&self, peer: &UserId) -> Result<Url> {
        let mut url = self.endpoint(PATH_MESSAGES)?;
        url.path_segments_mut()
            .map_err(|_| CourierError::Protocol("API URL cannot be a base".into()))?
            .push(peer.as_str());
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| map_reqwest(e, self.timeout))?;
        check_status(response).await
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        response.json::<T>().await.map_err(|e| map_reqwest(e, self.timeout))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        debug!(email = %request.email, "Logging in");
        let response = self
            .send(self.client.post(self.endpoint(PATH_LOGIN)?).json(request))
            .await?;
        self.decode(response).await
    }

    async fn signup(&self, request: &SignupRequest) -> Result<()> {
        debug!(email = %request.email, "Signing up");
        self.send(self.client.post(self.endpoint(PATH_SIGNUP)?).json(request))
            .await?;
        Ok(())
    }

    async fn list_users(&self, token: &str) -> Result<Vec<User>> {
        let response = self
            .send(self.client.get(self.endpoint(PATH_USERS)?).bearer_auth(token))
            .await?;
        self.decode(response).await
    }

    async fn fetch_history(&self, token: &str, peer: &UserId) -> Result<Vec<Message>> {
        let response = self
            .send(self.client.get(self.history_endpoint(peer)?).bearer_auth(token))
            .await?;
        self.decode(response).await
    }

    async fn upload_file(&self, token: &str, attachment: &Attachment) -> Result<String> {
        let part = Part::bytes(attachment.bytes.clone())
            .file_name(attachment.file_name.clone())
            .mime_str(&attachment.media_type)
            .map_err(|e| {
                CourierError::Validation(format!(
                    "Invalid media type '{}': {e}",
                    attachment.media_type
                ))
            })?;
        let form = Form::new().part("file", part);

        debug!(
            file = %attachment.file_name,
            size = attachment.size(),
            media_type = %attachment.media_type,
            "Uploading attachment"
        );

        let response = self
            .send(
                self.client
                    .post(self.endpoint(PATH_UPLOAD)?)
                    .bearer_auth(token)
                    .multipart(form),
            )
            .await?;
        let uploaded: UploadResponse = self.decode(response).await?;
        Ok(uploaded.file_url)
    }

    async fn create_message(&self, token: &str, message: &NewMessage) -> Result<Message> {
        let response = self
            .send(
                self.client
                    .post(self.endpoint(PATH_MESSAGES)?)
                    .bearer_auth(token)
                    .json(message),
            )
            .await?;
        self.decode(response).await
    }
}

/// Turn a non-2xx response into a typed error, using the backend's
/// `{message}` body when there is one.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: ApiErrorBody = response.json().await.unwrap_or_default();
    let message = body
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());

    warn!(status = %status, message = %message, "Backend rejected request");
    Err(classify_status(status, message))
}

/// Map an HTTP status to the client error taxonomy.
pub fn classify_status(status: StatusCode, message: String) -> CourierError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CourierError::Auth(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            CourierError::Validation(message)
        }
        other => CourierError::Network(format!("{other}: {message}")),
    }
}

fn map_reqwest(e: reqwest::Error, timeout: Duration) -> CourierError {
    if e.is_timeout() {
        CourierError::Timeout(timeout)
    } else if e.is_decode() {
        CourierError::Protocol(format!("Unexpected response body: {e}"))
    } else {
        CourierError::Network(e.to_string())
    }
}
