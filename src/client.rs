//! Authenticated client for the rig HTTP API.
//!
//! Every operation funnels through [`RigClient::request`], which checks for a
//! token, attaches the bearer header, unwraps the `{ "payload": ... }`
//! envelope, and maps transport failures onto [`RigError`].

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::proto::{AddDestinationRequest, ChangePasswordRequest, LoginRequest, RegisterRequest};
use crate::session::{MemoryTokenStore, Session, StoreError, TokenStore};
use crate::transport::{HttpMethod, HttpRequest, HttpTransport, Transport, TransportFailure};

/// Production rig origin.
pub const RIG_BASE_URL: &str = "https://rig.xplex.me";
/// Development rig origin.
pub const RIG_DEV_BASE_URL: &str = "https://rig-dev.xplex.online";

const LOGIN_PATH: &str = "/accounts/auth/local";
const ACCOUNTS_PATH: &str = "/accounts/";
const PASSWORD_PATH: &str = "/accounts/password";
const STREAMS_PATH: &str = "/streams/";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RigDefaults;

impl RigDefaults {
    pub const TIMEOUT: Duration = Duration::from_millis(3000);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(3000);
}

#[derive(Clone, Debug)]
pub struct RigClientOptions {
    pub base_url: String,
    /// Pre-existing bearer token. Without one the client starts logged out.
    pub token: Option<SecretString>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for RigClientOptions {
    fn default() -> Self {
        Self {
            base_url: RIG_BASE_URL.to_string(),
            token: None,
            timeout: RigDefaults::TIMEOUT,
            connect_timeout: RigDefaults::CONNECT_TIMEOUT,
        }
    }
}

impl RigClientOptions {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

/// Client for the rig API.
///
/// `S` decides where the bearer token lives and is fixed for the lifetime of
/// the instance. `T` performs the HTTP exchange.
#[derive(Debug)]
pub struct RigClient<S = MemoryTokenStore, T = HttpTransport> {
    base_url: String,
    store: S,
    transport: T,
}

impl RigClient {
    /// Creates a logged-out client against [`RIG_BASE_URL`].
    pub fn new() -> Result<Self, RigError> {
        Self::with_options(RigClientOptions::default())
    }

    /// Creates a client that keeps its token in instance state.
    pub fn with_options(options: RigClientOptions) -> Result<Self, RigError> {
        let store = match options.token.clone() {
            Some(token) => MemoryTokenStore::with_token(token),
            None => MemoryTokenStore::new(),
        };
        let transport = HttpTransport::new(options.timeout, options.connect_timeout)
            .map_err(RigError::Client)?;
        Ok(RigClient::from_parts(options.base_url, store, transport))
    }
}

impl<S: TokenStore> RigClient<S, HttpTransport> {
    /// Creates a client whose token is read from and written to `store`.
    ///
    /// When `options.token` is set it is written into the store, keeping any
    /// username already recorded there.
    pub fn with_token_store(options: RigClientOptions, store: S) -> Result<Self, RigError> {
        if let Some(token) = options.token.clone() {
            let username = store.username()?;
            store.store_session(&Session::new(token, username))?;
        }
        let transport = HttpTransport::new(options.timeout, options.connect_timeout)
            .map_err(RigError::Client)?;
        Ok(RigClient::from_parts(options.base_url, store, transport))
    }
}

impl<S, T> RigClient<S, T> {
    /// Assembles a client from an explicit token store and transport.
    pub fn from_parts(base_url: impl Into<String>, store: S, transport: T) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end().trim_end_matches('/').to_string(),
            store,
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token_store(&self) -> &S {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl<S: TokenStore, T: Transport> RigClient<S, T> {
    /// Performs one call against rig and returns the unwrapped payload.
    ///
    /// With `auth_required` and no token held this fails with
    /// [`RigError::AuthenticationRequired`] before touching the network. A
    /// success body without a `payload` field resolves to `Value::Null`.
    pub async fn request(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<Value>,
        auth_required: bool,
    ) -> Result<Value, RigError> {
        let token = if auth_required {
            match self.store.token()? {
                Some(token) => Some(token),
                None => {
                    debug!(event = "rig_request_unauthenticated", %method, path);
                    return Err(RigError::AuthenticationRequired);
                }
            }
        } else {
            None
        };

        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        if let Some(token) = token.as_ref() {
            headers.insert(
                "Authorization".to_string(),
                format!("Bearer {}", token.expose_secret()),
            );
        }

        let request = HttpRequest {
            url: self.endpoint(path),
            method,
            body,
            headers,
        };

        debug!(event = "rig_request", %method, path, auth_required);
        match self.transport.send(request).await {
            Ok(response) => Ok(unwrap_payload(response.body)),
            Err(failure) => {
                warn!(event = "rig_request_failed", %method, path, failure = ?failure);
                Err(failure.into())
            }
        }
    }

    /// Like [`request`](Self::request), decoding the payload into `R`.
    pub async fn request_as<R: DeserializeOwned>(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<Value>,
        auth_required: bool,
    ) -> Result<R, RigError> {
        let payload = self.request(path, method, body, auth_required).await?;
        Ok(serde_json::from_value(payload)?)
    }

    /// Logs in and captures the returned token into the token store.
    ///
    /// Resolves to the session payload as sent by rig.
    pub async fn login(&self, username: &str, password: &str) -> Result<Value, RigError> {
        let body = encode(&LoginRequest { username, password })?;
        let payload = self
            .request(LOGIN_PATH, HttpMethod::Post, Some(body), false)
            .await?;

        let mut session = Session::from_payload(&payload).ok_or(RigError::InvalidSession)?;
        if session.username.is_none() {
            session.username = Some(username.to_string());
        }
        self.store.store_session(&session)?;
        info!(event = "rig_login_succeeded", username = session.username.as_deref());
        Ok(payload)
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<Value, RigError> {
        let body = encode(&RegisterRequest {
            username,
            password,
            email,
        })?;
        self.request(ACCOUNTS_PATH, HttpMethod::Post, Some(body), false)
            .await
    }

    /// Changes the logged-in user's password. This is not password recovery.
    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<Value, RigError> {
        let body = encode(&ChangePasswordRequest {
            old_password,
            new_password,
        })?;
        self.request(PASSWORD_PATH, HttpMethod::Post, Some(body), true)
            .await
    }

    pub async fn stream_list(&self) -> Result<Value, RigError> {
        self.request(STREAMS_PATH, HttpMethod::Get, None, true).await
    }

    pub async fn stream_detail(&self, stream_id: &str) -> Result<Value, RigError> {
        self.request(&stream_path(stream_id), HttpMethod::Get, None, true)
            .await
    }

    pub async fn stream_create(&self) -> Result<Value, RigError> {
        self.request(STREAMS_PATH, HttpMethod::Post, None, true).await
    }

    /// Adds a destination such as `YouTube` or `Twitch` to a stream.
    pub async fn stream_add_destination(
        &self,
        stream_id: &str,
        service: &str,
        stream_key: &str,
    ) -> Result<Value, RigError> {
        let body = encode(&AddDestinationRequest {
            service,
            stream_key,
        })?;
        let path = format!("{}/destination", stream_path(stream_id));
        self.request(&path, HttpMethod::Post, Some(body), true)
            .await
    }

    /// Rotates the ingest key of a stream.
    pub async fn stream_change_key(&self, stream_id: &str) -> Result<Value, RigError> {
        let path = format!("{}/changeKey", stream_path(stream_id));
        self.request(&path, HttpMethod::Post, None, true).await
    }

    /// Drops the held session. Authenticated calls fail until the next login.
    pub fn clear_session(&self) -> Result<(), RigError> {
        self.store.clear()?;
        info!(event = "rig_session_cleared");
        Ok(())
    }

    pub fn is_authenticated(&self) -> Result<bool, RigError> {
        Ok(self.store.token()?.is_some())
    }

    /// Username captured by the last login, if any.
    pub fn current_user(&self) -> Result<Option<String>, RigError> {
        Ok(self.store.username()?)
    }
}

#[derive(Debug, Error)]
pub enum RigError {
    #[error("authentication required: log in first")]
    AuthenticationRequired,

    #[error("rig returned http {status}: {body}")]
    Remote { status: StatusCode, body: Value },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("login response did not contain a session token")]
    InvalidSession,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to build http client: {0}")]
    Client(reqwest::Error),
}

impl RigError {
    /// Error body sent by rig, passed through untouched.
    pub fn remote_body(&self) -> Option<&Value> {
        match self {
            Self::Remote { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl From<TransportFailure> for RigError {
    fn from(failure: TransportFailure) -> Self {
        match failure {
            TransportFailure::Structured { status, body } => Self::Remote { status, body },
            TransportFailure::Message(message) => Self::Transport(message),
        }
    }
}

fn stream_path(stream_id: &str) -> String {
    format!("/streams/{stream_id}")
}

fn encode<B: Serialize>(body: &B) -> Result<Value, RigError> {
    Ok(serde_json::to_value(body)?)
}

fn unwrap_payload(body: Value) -> Value {
    match body {
        Value::Object(mut fields) => fields.remove("payload").unwrap_or(Value::Null),
        _ => Value::Null,
    }
}
