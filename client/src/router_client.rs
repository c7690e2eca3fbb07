use std::sync::Arc;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::{debug, info, trace, warn};
use reqwest::Url;
use rustls::ClientConfig;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use crate::backend_client::{SERVICE_NAME, SessionToken};
use crate::errors::{CallError, ConfigurationError, ConnectError, DisconnectError};
use crate::wamp::{self, DecodeError, Dict, WampMessage};

/// Realm every session joins.
pub const ROUTER_REALM: &str = "com.digitallumens";

/// Positional and keyword results of a successful call, as received.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    pub args: Vec<Value>,
    pub kwargs: Dict,
}

/// Opens authenticated router sessions.
#[async_trait]
pub trait RouterConnector: Send + Sync {
    type Session: RouterSession;

    async fn connect(&self, realm: &str, token: &SessionToken) -> Result<Self::Session, ConnectError>;
}

/// An open router session.
#[async_trait]
pub trait RouterSession: Send {
    /// Calls `procedure` with keyword arguments only.
    async fn call(&mut self, procedure: &str, kwargs: Dict) -> Result<CallResult, CallError>;

    /// Leaves the realm and closes the transport.
    async fn disconnect(&mut self) -> Result<(), DisconnectError>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WAMP-over-WebSocket connector. `wss://` URIs present the client
/// certificate from the shared TLS config.
pub struct WampConnector {
    uri: String,
    tls: Arc<ClientConfig>,
}

impl WampConnector {
    pub fn new(uri: &str, tls: Arc<ClientConfig>) -> Result<Self, ConfigurationError> {
        let endpoint_err = |reason: String| ConfigurationError::Endpoint { uri: uri.to_string(), reason };
        let parsed = Url::parse(uri).map_err(|e| endpoint_err(e.to_string()))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(endpoint_err(format!("unsupported scheme {:?}", parsed.scheme())));
        }
        Ok(Self { uri: uri.to_string(), tls })
    }
}

#[async_trait]
impl RouterConnector for WampConnector {
    type Session = WampSession;

    async fn connect(&self, realm: &str, token: &SessionToken) -> Result<WampSession, ConnectError> {
        let mut request = self.uri.as_str().into_client_request().map_err(ConnectError::Transport)?;
        request
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(wamp::SUBPROTOCOL));

        debug!("Opening websocket to {}", self.uri);
        let connector = Connector::Rustls(Arc::clone(&self.tls));
        let (stream, _) = connect_async_tls_with_config(request, None, false, Some(connector))
            .await
            .map_err(ConnectError::Transport)?;

        let mut session = WampSession { stream, session_id: 0, next_request: 1, joined: false };
        let hello = WampMessage::Hello {
            realm: realm.to_string(),
            details: as_dict(json!({
                "roles": { "caller": { "features": {} } },
                "authmethods": ["ticket"],
                "authid": SERVICE_NAME,
                "agent": concat!("group_settings_cli/", env!("CARGO_PKG_VERSION")),
            })),
        };
        session.send(&hello).await.map_err(ConnectError::Transport)?;

        loop {
            let msg = match session.recv().await {
                Ok(Some(msg)) => msg,
                Ok(None) => return Err(ConnectError::Closed),
                Err(RecvError::Transport(e)) => return Err(ConnectError::Transport(e)),
                Err(RecvError::Decode(e)) => return Err(ConnectError::Protocol(e.to_string())),
            };
            match msg {
                WampMessage::Challenge { auth_method, .. } if auth_method == "ticket" => {
                    trace!("Answering ticket challenge");
                    let reply = WampMessage::Authenticate {
                        signature: token.as_str().to_string(),
                        extra: Dict::new(),
                    };
                    session.send(&reply).await.map_err(ConnectError::Transport)?;
                }
                WampMessage::Challenge { auth_method, .. } => {
                    return Err(ConnectError::UnsupportedChallenge(auth_method));
                }
                WampMessage::Welcome { session: id, .. } => {
                    info!("Joined realm {realm} as session {id}");
                    session.session_id = id;
                    session.joined = true;
                    return Ok(session);
                }
                WampMessage::Abort { reason, .. } => return Err(ConnectError::Aborted { reason }),
                other => {
                    return Err(ConnectError::Protocol(format!(
                        "unexpected message during session setup: {other:?}"
                    )));
                }
            }
        }
    }
}

enum RecvError {
    Transport(tungstenite::Error),
    Decode(DecodeError),
}

/// A joined WAMP session.
pub struct WampSession {
    stream: WsStream,
    session_id: u64,
    next_request: u64,
    joined: bool,
}

impl WampSession {
    async fn send(&mut self, msg: &WampMessage) -> Result<(), tungstenite::Error> {
        self.stream.send(Message::text(msg.encode())).await
    }

    /// Next WAMP message, or `None` once the transport is closed.
    async fn recv(&mut self) -> Result<Option<WampMessage>, RecvError> {
        while let Some(frame) = self.stream.next().await {
            match frame.map_err(RecvError::Transport)? {
                Message::Text(text) => {
                    return WampMessage::decode(text.as_str()).map(Some).map_err(RecvError::Decode);
                }
                Message::Close(_) => return Ok(None),
                Message::Binary(_) => warn!("Ignoring binary frame on a JSON session"),
                // ping/pong are answered by tungstenite
                _ => {}
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl RouterSession for WampSession {
    async fn call(&mut self, procedure: &str, kwargs: Dict) -> Result<CallResult, CallError> {
        let request = self.next_request;
        self.next_request += 1;

        let call = WampMessage::Call {
            request,
            options: Dict::new(),
            procedure: procedure.to_string(),
            args: Vec::new(),
            kwargs,
        };
        debug!("Calling {procedure} (request {request})");
        self.send(&call).await.map_err(CallError::Transport)?;

        loop {
            let msg = match self.recv().await {
                Ok(Some(msg)) => msg,
                Ok(None) => {
                    self.joined = false;
                    return Err(CallError::Closed);
                }
                Err(RecvError::Transport(e)) => return Err(CallError::Transport(e)),
                Err(RecvError::Decode(e)) => return Err(CallError::Protocol(e.to_string())),
            };
            match msg {
                WampMessage::Result { request: id, args, kwargs, .. } if id == request => {
                    return Ok(CallResult { args, kwargs });
                }
                WampMessage::Error { request_type: wamp::CALL, request: id, error, args, kwargs, .. }
                    if id == request =>
                {
                    let detail = json!({ "args": args, "kwargs": kwargs }).to_string();
                    return Err(CallError::Remote { uri: error, detail });
                }
                WampMessage::Goodbye { reason, .. } => {
                    warn!("Router ended the session: {reason}");
                    let reply = WampMessage::Goodbye { details: Dict::new(), reason: wamp::GOODBYE_AND_OUT.into() };
                    self.joined = false;
                    self.send(&reply).await.map_err(CallError::Transport)?;
                    return Err(CallError::Closed);
                }
                WampMessage::Abort { reason, .. } => {
                    self.joined = false;
                    return Err(CallError::Remote { uri: reason, detail: "session aborted".into() });
                }
                other => debug!("Ignoring message while awaiting request {request}: {other:?}"),
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), DisconnectError> {
        if self.joined {
            self.joined = false;
            let goodbye = WampMessage::Goodbye { details: Dict::new(), reason: wamp::CLOSE_REALM.into() };
            self.send(&goodbye).await.map_err(DisconnectError::Transport)?;
            // wait for the router's GOODBYE; anything else in flight is dropped
            loop {
                match self.recv().await {
                    Ok(Some(WampMessage::Goodbye { .. })) | Ok(None) => break,
                    Ok(Some(other)) => debug!("Discarding {other:?} while leaving realm"),
                    Err(RecvError::Transport(e)) => return Err(DisconnectError::Transport(e)),
                    Err(RecvError::Decode(e)) => warn!("Undecodable frame while leaving realm: {e}"),
                }
            }
        }

        match self.stream.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {}
            Err(e) => return Err(DisconnectError::Transport(e)),
        }
        // drain until the peer completes the close handshake
        while let Some(Ok(_)) = self.stream.next().await {}
        info!("Disconnected session {}", self.session_id);
        Ok(())
    }
}

fn as_dict(value: Value) -> Dict {
    match value {
        Value::Object(map) => map,
        _ => Dict::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tls() -> Arc<ClientConfig> {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(rustls::RootCertStore::empty())
            .with_no_client_auth();
        Arc::new(config)
    }

    #[test]
    fn accepts_websocket_schemes_only() {
        assert!(WampConnector::new("wss://router.example.com/ws", tls()).is_ok());
        assert!(WampConnector::new("ws://127.0.0.1:8080", tls()).is_ok());
        assert!(matches!(
            WampConnector::new("https://router.example.com", tls()),
            Err(ConfigurationError::Endpoint { .. })
        ));
        assert!(matches!(WampConnector::new("", tls()), Err(ConfigurationError::Endpoint { .. })));
    }
}
