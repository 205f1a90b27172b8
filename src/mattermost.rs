//! Direct messages through the Mattermost v4 REST API.

use std::fmt;

use reqwest::blocking::Client;
use serde_derive::Deserialize;
use serde_json::json;
use tracing::{debug, info};

/// Status and body of an HTTP response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

/// The request could not be sent, or its response could not be read.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Authenticated access to the chat server's API. Paths are relative to the
/// API root, e.g. `users/me`.
pub trait ChatTransport {
    fn server_url(&self) -> &str;

    fn get(&self, path: &str) -> Result<Response, TransportError>;

    fn post(&self, path: &str, body: &serde_json::Value) -> Result<Response, TransportError>;
}

/// `ChatTransport` over HTTP, authenticating with a bearer token.
pub struct HttpTransport {
    client: Client,
    server_url: String,
    token: String,
}

impl HttpTransport {
    pub fn new<S: Into<String>>(server_url: &str, token: S) -> Self {
        Self {
            client: Client::new(),
            server_url: server_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v4/{}", self.server_url, path)
    }

    fn send(&self, req: reqwest::blocking::RequestBuilder) -> Result<Response, TransportError> {
        let resp = req
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| TransportError(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp.text().map_err(|e| TransportError(e.to_string()))?;
        Ok(Response { status, body })
    }
}

impl ChatTransport for HttpTransport {
    fn server_url(&self) -> &str {
        &self.server_url
    }

    fn get(&self, path: &str) -> Result<Response, TransportError> {
        self.send(self.client.get(self.url(path)))
    }

    fn post(&self, path: &str, body: &serde_json::Value) -> Result<Response, TransportError> {
        self.send(self.client.post(self.url(path)).json(body))
    }
}

/// The requests made to deliver a message, in order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Step {
    ViewSelf,
    SearchUser,
    OpenDirectChannel,
    PostMessage,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use Step::*;
        f.write_str(match self {
            ViewSelf => "looking up own user",
            SearchUser => "searching for user",
            OpenDirectChannel => "opening direct channel",
            PostMessage => "posting direct message",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("{step}: request failed: {source}")]
    Transport {
        step: Step,
        source: TransportError,
    },
    #[error("{step}: unexpected status {status}: {body}")]
    UnexpectedStatus {
        step: Step,
        status: u16,
        body: String,
    },
    #[error("{step}: malformed response: {reason}")]
    MalformedResponse { step: Step, reason: String },
    #[error(
        "chat user {username:?} is configured in the members directory but was not found at \
         server {server}"
    )]
    UserNotFound { username: String, server: String },
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: Option<String>,
}

const STATUS_OK: u16 = 200;
const STATUS_CREATED: u16 = 201;

fn expect_status(step: Step, want_status: u16, resp: Response) -> Result<Response, DispatchError> {
    if resp.status != want_status {
        return Err(DispatchError::UnexpectedStatus {
            step,
            status: resp.status,
            body: resp.body,
        });
    }
    debug!("Response from {}:\n{}", step, pretty(&resp.body));
    Ok(resp)
}

/// Decodes `resp` if it has the status the step expects.
fn decode<T: serde::de::DeserializeOwned>(
    step: Step,
    want_status: u16,
    resp: Response,
) -> Result<T, DispatchError> {
    let resp = expect_status(step, want_status, resp)?;
    serde_json::from_str(&resp.body).map_err(|e| DispatchError::MalformedResponse {
        step,
        reason: e.to_string(),
    })
}

fn pretty(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .and_then(|v| serde_json::to_string_pretty(&v))
        .unwrap_or_else(|_| body.to_string())
}

/// Sends direct messages from the account that owns the transport's token.
///
/// Each step depends on the result of the one before, so the first failure
/// ends the attempt. Nothing is retried.
pub struct Dispatcher<'a> {
    transport: &'a dyn ChatTransport,
}

impl<'a> Dispatcher<'a> {
    pub fn new(transport: &'a dyn ChatTransport) -> Self {
        Dispatcher { transport }
    }

    pub fn view_self(&self) -> Result<String, DispatchError> {
        let step = Step::ViewSelf;
        let resp = self
            .transport
            .get("users/me")
            .map_err(|source| DispatchError::Transport { step, source })?;
        let user: User = decode(step, STATUS_OK, resp)?;
        Ok(user.id)
    }

    /// Returns the id of the first user matching `username`.
    pub fn search_user(&self, username: &str) -> Result<String, DispatchError> {
        let step = Step::SearchUser;
        let resp = self
            .transport
            .post("users/search", &json!({ "term": username }))
            .map_err(|source| DispatchError::Transport { step, source })?;
        let users: Vec<User> = decode(step, STATUS_OK, resp)?;
        users
            .into_iter()
            .next()
            .map(|user| user.id)
            .ok_or_else(|| DispatchError::UserNotFound {
                username: username.to_string(),
                server: self.transport.server_url().to_string(),
            })
    }

    /// Creates, or fetches if it already exists, the direct channel between
    /// two users.
    pub fn open_direct_channel(&self, user_a: &str, user_b: &str) -> Result<String, DispatchError> {
        let step = Step::OpenDirectChannel;
        let resp = self
            .transport
            .post("channels/direct", &json!([user_a, user_b]))
            .map_err(|source| DispatchError::Transport { step, source })?;
        let channel: Channel = decode(step, STATUS_CREATED, resp)?;
        Ok(channel.id)
    }

    /// Posts `message` to the channel. Returns the new post's id, if the
    /// server's response names one.
    pub fn post_message(
        &self,
        channel_id: &str,
        message: &str,
    ) -> Result<Option<String>, DispatchError> {
        let step = Step::PostMessage;
        let resp = self
            .transport
            .post(
                "posts",
                &json!({ "channel_id": channel_id, "message": message }),
            )
            .map_err(|source| DispatchError::Transport { step, source })?;
        let resp = expect_status(step, STATUS_CREATED, resp)?;
        Ok(serde_json::from_str::<Post>(&resp.body)
            .ok()
            .and_then(|post| post.id))
    }

    /// Sends `message` to `username` in a direct channel with the bot.
    pub fn send(&self, username: &str, message: &str) -> Result<(), DispatchError> {
        let bot_id = self.view_self()?;
        info!("Bot user id: {}", bot_id);
        let user_id = self.search_user(username)?;
        info!("User id of {}: {}", username, user_id);
        let channel_id = self.open_direct_channel(&bot_id, &user_id)?;
        info!("Direct channel id: {}", channel_id);
        match self.post_message(&channel_id, message)? {
            Some(post_id) => info!("Posted direct message {}", post_id),
            None => info!("Posted direct message"),
        }
        Ok(())
    }
}
