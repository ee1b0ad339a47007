//! One-shot loopback redirect listener (RFC 8252 §7.3).

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::Url;
use subtle::ConstantTimeEq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::auth::error::AuthError;

const REDIRECT_PATH: &str = "/";
const MAX_REQUEST_HEAD: usize = 8192;
/// How long one connection may take to send its request head.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

const SUCCESS_HTML: &str = "<html><body><h1>Authentication successful</h1>\
<p>You may close this window and return to the terminal.</p></body></html>";
const FAILURE_HTML: &str = "<html><body><h1>Authentication failed</h1>\
<p>You may close this window and retry.</p></body></html>";
const NOT_FOUND_HTML: &str = "<html><body><h1>Not found</h1></body></html>";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct RedirectParams {
    pub(crate) code: Option<String>,
    pub(crate) state: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) error_description: Option<String>,
}

impl RedirectParams {
    /// Validate `state` and turn the redirect into an authorization code.
    pub(crate) fn into_code(self, expected_state: &str) -> Result<String, AuthError> {
        let state = self.state.as_deref().unwrap_or_default();
        if !bool::from(state.as_bytes().ct_eq(expected_state.as_bytes())) {
            return Err(AuthError::Protocol(
                "authorization redirect carried a mismatched state".to_string(),
            ));
        }
        if let Some(error) = self.error.filter(|e| !e.is_empty()) {
            return Err(AuthError::denied(error, self.error_description));
        }
        self.code.filter(|c| !c.is_empty()).ok_or_else(|| {
            AuthError::Protocol("authorization redirect carried no code".to_string())
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Incoming {
    Redirect(RedirectParams),
    /// The redirect path without `code` or `error`.
    Incomplete,
    NotFound,
}

/// A bound listener plus the redirect URI the provider must send the user to.
///
/// Dropped (and the port released) as soon as [`wait_for_code`](Self::wait_for_code)
/// returns.
#[derive(Debug)]
pub(crate) struct LoopbackListener {
    listener: TcpListener,
    redirect_uri: String,
}

impl LoopbackListener {
    /// Bind the first address in `addresses` that accepts a listener.
    pub(crate) async fn bind(addresses: &[String], hostname: &str) -> Result<Self, AuthError> {
        let mut failures = Vec::new();
        for address in addresses {
            match TcpListener::bind(address.as_str()).await {
                Ok(listener) => {
                    let port = listener
                        .local_addr()
                        .map_err(|e| AuthError::Transport(format!("{address}: {e}")))?
                        .port();
                    let redirect_uri = format!("http://{hostname}:{port}{REDIRECT_PATH}");
                    tracing::debug!(%address, %redirect_uri, "loopback listener bound");
                    return Ok(Self {
                        listener,
                        redirect_uri,
                    });
                }
                Err(err) => failures.push(format!("{address} ({err})")),
            }
        }
        Err(AuthError::Transport(format!(
            "could not bind a loopback listener: {}",
            if failures.is_empty() {
                "no bind address configured".to_string()
            } else {
                failures.join("; ")
            }
        )))
    }

    pub(crate) fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Serve requests until the authorization redirect arrives.
    ///
    /// Connections are read concurrently, each bounded by
    /// [`REQUEST_READ_TIMEOUT`], so an idle connection cannot hold up the
    /// redirect. Requests for other paths get a 404 and the listener keeps
    /// waiting. Unfinished reads are aborted when this returns.
    pub(crate) async fn wait_for_code(
        self,
        expected_state: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AuthError> {
        let mut reads: JoinSet<ConnectionRead> = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(redirect_cancelled()),
                accepted = self.listener.accept() => {
                    let (socket, peer) = accepted
                        .map_err(|e| AuthError::Transport(format!("loopback accept failed: {e}")))?;
                    reads.spawn(read_connection(socket, peer));
                }
                Some(joined) = reads.join_next() => {
                    let (mut socket, peer, head) = match joined {
                        Ok(read) => read,
                        Err(err) => {
                            tracing::debug!(error = %err, "loopback request reader failed");
                            continue;
                        }
                    };
                    let head = match head {
                        Ok(head) => head,
                        Err(err) => {
                            tracing::debug!(%peer, error = %err, "dropping unreadable loopback request");
                            continue;
                        }
                    };
                    match classify_request(&head) {
                        Incoming::NotFound => {
                            respond(&mut socket, "404 Not Found", NOT_FOUND_HTML).await;
                        }
                        Incoming::Incomplete => {
                            respond(&mut socket, "400 Bad Request", FAILURE_HTML).await;
                        }
                        Incoming::Redirect(params) => {
                            let outcome = params.into_code(expected_state);
                            match &outcome {
                                Ok(_) => respond(&mut socket, "200 OK", SUCCESS_HTML).await,
                                Err(_) => {
                                    respond(&mut socket, "400 Bad Request", FAILURE_HTML).await
                                }
                            }
                            return outcome;
                        }
                    }
                }
            }
        }
    }
}

type ConnectionRead = (TcpStream, SocketAddr, std::io::Result<String>);

async fn read_connection(mut socket: TcpStream, peer: SocketAddr) -> ConnectionRead {
    let head = tokio::time::timeout(REQUEST_READ_TIMEOUT, read_request_head(&mut socket))
        .await
        .unwrap_or_else(|_| {
            Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "no request received",
            ))
        });
    (socket, peer, head)
}

fn redirect_cancelled() -> AuthError {
    AuthError::Cancelled("waiting for the authorization redirect cancelled".to_string())
}

async fn read_request_head(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let read = socket.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.len() >= MAX_REQUEST_HEAD {
            break;
        }
    }
    if buffer.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "empty request",
        ));
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

pub(crate) fn classify_request(head: &str) -> Incoming {
    let mut parts = head.lines().next().unwrap_or_default().split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        return Incoming::NotFound;
    };
    let Ok(url) = Url::parse(&format!("http://127.0.0.1{target}")) else {
        return Incoming::NotFound;
    };
    if url.path() != REDIRECT_PATH {
        return Incoming::NotFound;
    }

    let mut params = RedirectParams::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            "error_description" => params.error_description = Some(value.into_owned()),
            _ => {}
        }
    }
    if params.code.is_none() && params.error.is_none() {
        return Incoming::Incomplete;
    }
    Incoming::Redirect(params)
}

async fn respond(socket: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(err) = socket.write_all(response.as_bytes()).await {
        tracing::debug!(status, error = %err, "could not write loopback response");
        return;
    }
    if let Err(err) = socket.shutdown().await {
        tracing::debug!(error = %err, "could not close loopback connection");
    }
}
