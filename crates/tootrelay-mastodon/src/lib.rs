//! Mastodon adapter.
//!
//! Implements the `tootrelay-core` StreamingTransport: OAuth password grant
//! over HTTP, then the public timeline over the streaming WebSocket API.

use async_trait::async_trait;
use futures::{stream, StreamExt};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use tootrelay_core::{
    config::ServerConfig,
    domain::AccessToken,
    errors::Error,
    ports::{EventStream, StreamingTransport},
    Result,
};

pub mod events;

const OAUTH_SCOPE: &str = "read write follow";
const STREAMING_PATH: &str = "/api/v1/streaming";

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    username: &'a str,
    password: &'a str,
    scope: &'static str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client bound to one configured server.
#[derive(Clone, Debug)]
pub struct MastodonClient {
    server: ServerConfig,
    http: reqwest::Client,
}

impl MastodonClient {
    pub fn new(server: ServerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("tootrelay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self { server, http })
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.server.server_url.trim_end_matches('/'))
    }

    /// `ws(s)://{streaming}/api/v1/streaming?access_token=..&stream=public`.
    pub fn streaming_url(&self, token: &AccessToken) -> Result<Url> {
        let base = self.server.streaming_url().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}{STREAMING_PATH}"))
            .map_err(|e| Error::Config(format!("invalid streaming url {base:?}: {e}")))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(Error::Config(format!(
                    "unsupported streaming url scheme {other:?}"
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| Error::Config(format!("cannot use {scheme} for {base:?}")))?;

        let stream = if self.server.local_only {
            "public:local"
        } else {
            "public"
        };
        url.query_pairs_mut()
            .append_pair("access_token", &token.0)
            .append_pair("stream", stream);
        Ok(url)
    }
}

#[async_trait]
impl StreamingTransport for MastodonClient {
    async fn authenticate(&self) -> Result<AccessToken> {
        let req = TokenRequest {
            grant_type: "password",
            client_id: &self.server.client_id,
            client_secret: &self.server.client_secret,
            username: &self.server.account,
            password: &self.server.password,
            scope: OAUTH_SCOPE,
        };

        let resp = self
            .http
            .post(self.token_url())
            .form(&req)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("token request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Auth(format!(
                "token request failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| Error::Auth(format!("token response error: {e}")))?;

        if body.access_token.trim().is_empty() {
            return Err(Error::Auth("server returned an empty access token".to_string()));
        }

        Ok(AccessToken(body.access_token))
    }

    async fn open_public_stream(&self, token: &AccessToken) -> Result<EventStream> {
        let url = self.streaming_url(token)?;
        let (ws, _resp) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::Stream(format!("websocket handshake failed: {e}")))?;

        let server = self.server.server_url.clone();

        // Close frames, socket errors and EOF all end the sequence.
        let frames = stream::unfold(ws, move |mut ws| {
            let server = server.clone();
            async move {
                loop {
                    match ws.next().await {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(ev) = events::decode_frame(&text) {
                                return Some((ev, ws));
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(server = %server, ?frame, "stream closed by server");
                            return None;
                        }
                        // Pings are answered by tungstenite while reading.
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(server = %server, error = %e, "stream read failed");
                            return None;
                        }
                        None => return None,
                    }
                }
            }
        });

        Ok(frames.boxed())
    }
}
