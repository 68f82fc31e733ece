//! Loopback redirect receiver for the installed-app OAuth flow
//!
//! Binds an ephemeral port on 127.0.0.1, opens the consent page in the
//! default browser, and waits for Google to redirect back with the
//! authorization code.

use async_trait::async_trait;
use bridge_traits::{
    auth::{AuthorizationCallback, AuthorizationCodeReceiver},
    error::{BridgeError, Result},
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use url::form_urlencoded;

/// How long one connection may take to send its request line
const CONNECTION_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Receives the OAuth redirect on a local HTTP listener.
///
/// Without a timeout the receiver waits until the browser calls back.
/// Connections that stay silent or fail are dropped and the receiver keeps
/// listening.
pub struct LoopbackCodeReceiver {
    listener: TcpListener,
    local_addr: SocketAddr,
    timeout: Option<Duration>,
    read_timeout: Duration,
    open_browser: bool,
}

enum Callback {
    Granted(AuthorizationCallback),
    Denied(String),
    Ignored,
}

impl LoopbackCodeReceiver {
    /// Bind to an ephemeral port on the loopback interface
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let local_addr = listener.local_addr()?;
        info!(port = local_addr.port(), "OAuth callback listener bound");

        Ok(Self {
            listener,
            local_addr,
            timeout: None,
            read_timeout: CONNECTION_READ_TIMEOUT,
            open_browser: true,
        })
    }

    /// Give up waiting for the redirect after `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Skip launching a browser; the authorization URL is only logged
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    async fn wait_for_callback(&self) -> Result<AuthorizationCallback> {
        loop {
            let (mut socket, peer) = self.listener.accept().await?;
            debug!(peer = %peer, "OAuth callback connection accepted");

            match tokio::time::timeout(self.read_timeout, handle_connection(&mut socket)).await {
                Ok(Ok(Callback::Granted(callback))) => return Ok(callback),
                Ok(Ok(Callback::Denied(reason))) => {
                    return Err(BridgeError::OperationFailed(reason))
                }
                Ok(Ok(Callback::Ignored)) => {}
                Ok(Err(e)) => {
                    warn!(peer = %peer, error = %e, "Dropping failed OAuth callback connection")
                }
                Err(_) => warn!(peer = %peer, "Dropping idle OAuth callback connection"),
            }
        }
    }
}

#[async_trait]
impl AuthorizationCodeReceiver for LoopbackCodeReceiver {
    fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/", self.local_addr.port())
    }

    async fn receive_code(&self, authorization_url: &str) -> Result<AuthorizationCallback> {
        if self.open_browser {
            if let Err(e) = open::that(authorization_url) {
                warn!(error = %e, "Failed to open browser, visit the authorization URL manually");
            }
        }
        info!(url = %authorization_url, "Waiting for OAuth consent");

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.wait_for_callback())
                .await
                .map_err(|_| {
                    BridgeError::Timeout(format!(
                        "No OAuth callback received within {}s",
                        limit.as_secs()
                    ))
                })?,
            None => self.wait_for_callback().await,
        }
    }
}

async fn handle_connection(socket: &mut TcpStream) -> Result<Callback> {
    let Some(params) = read_query(socket).await? else {
        respond(socket, "404 Not Found", "Not an authorization callback.").await?;
        return Ok(Callback::Ignored);
    };

    if let (Some(code), Some(state)) = (params.get("code"), params.get("state")) {
        let page = "Authorization complete. You can close this window.";
        if let Err(e) = respond(socket, "200 OK", page).await {
            warn!(error = %e, "Failed to answer the browser after consent");
        }
        return Ok(Callback::Granted(AuthorizationCallback {
            code: code.clone(),
            state: state.clone(),
        }));
    }

    if let Some(error) = params.get("error") {
        let description = params
            .get("error_description")
            .map(String::as_str)
            .unwrap_or("no description");
        if let Err(e) = respond(socket, "400 Bad Request", "Authorization was not granted.").await {
            warn!(error = %e, "Failed to answer the browser after refusal");
        }
        return Ok(Callback::Denied(format!(
            "Authorization denied: {} ({})",
            error, description
        )));
    }

    // favicon requests and the like
    respond(socket, "404 Not Found", "Not an authorization callback.").await?;
    Ok(Callback::Ignored)
}

/// Read the request line and return its query parameters.
///
/// Returns `None` when the request has no query string.
async fn read_query(socket: &mut TcpStream) -> Result<Option<HashMap<String, String>>> {
    let mut reader = BufReader::new(socket);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    // "GET /?code=...&state=... HTTP/1.1"
    let Some(target) = request_line.split_whitespace().nth(1) else {
        return Ok(None);
    };
    let Some((_, query)) = target.split_once('?') else {
        return Ok(None);
    };

    Ok(Some(
        form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect(),
    ))
}

async fn respond(socket: &mut TcpStream, status: &str, message: &str) -> Result<()> {
    let body = format!(
        "<!DOCTYPE html><html><head><title>Drive Transporter</title></head>\
         <body><p>{}</p></body></html>",
        message
    );
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.flush().await?;
    Ok(())
}
