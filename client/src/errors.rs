use thiserror::Error;

/// Missing or unusable configuration. Raised before any network activity.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("please specify {0} in the environment")]
    Missing(&'static str),
    #[error("{var} does not hold a JSON string: {source}")]
    NotJsonString {
        var: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("unable to append CA cert from {var} to pool: {reason}")]
    TrustPool { var: &'static str, reason: String },
    #[error("could not create X.509 key pair: {0}")]
    KeyPair(String),
    #[error("invalid endpoint {uri:?}: {reason}")]
    Endpoint { uri: String, reason: String },
    #[error("http client setup failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// The backend refused or failed to hand out a session token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("backend request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("backend rejected service auth with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("backend reply could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("backend reply carried an empty token")]
    EmptyToken,
}

/// The router session could not be opened.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("websocket connect failed: {0}")]
    Transport(#[source] tokio_tungstenite::tungstenite::Error),
    #[error("router aborted session: {reason}")]
    Aborted { reason: String },
    #[error("unsupported auth challenge {0:?}")]
    UnsupportedChallenge(String),
    #[error("router protocol violation: {0}")]
    Protocol(String),
    #[error("router closed the connection during session setup")]
    Closed,
}

/// The remote procedure call failed.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("websocket error during call: {0}")]
    Transport(#[source] tokio_tungstenite::tungstenite::Error),
    #[error("remote procedure returned error {uri}: {detail}")]
    Remote { uri: String, detail: String },
    #[error("router protocol violation: {0}")]
    Protocol(String),
    #[error("router closed the session before replying")]
    Closed,
}

/// Session teardown failed. Logged only, never escalated.
#[derive(Debug, Error)]
pub enum DisconnectError {
    #[error("websocket error during disconnect: {0}")]
    Transport(#[source] tokio_tungstenite::tungstenite::Error),
}

/// Everything that can end a run with a non-zero exit status.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("backend auth error: {0}")]
    Auth(#[from] AuthError),
    #[error("connect error: {0}")]
    Connect(#[from] ConnectError),
    #[error("router call error: {0}")]
    Call(#[from] CallError),
}

impl Error {
    /// Process exit status for this error kind (sysexits.h values).
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Configuration(_) => 78,
            Error::Auth(_) => 77,
            Error::Connect(_) => 69,
            Error::Call(_) => 70,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_and_nonzero() {
        let errors = [
            Error::from(ConfigurationError::Missing("GSCLI_CLIENT_CERT")),
            Error::from(AuthError::Rejected { status: 401, body: String::new() }),
            Error::from(ConnectError::Closed),
            Error::from(CallError::Closed),
        ];
        let mut codes: Vec<u8> = errors.iter().map(Error::exit_code).collect();
        assert!(codes.iter().all(|c| *c != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 4);
    }

    #[test]
    fn missing_variable_names_it() {
        let msg = ConfigurationError::Missing("GSCLI_CLIENT_KEY").to_string();
        assert!(msg.contains("GSCLI_CLIENT_KEY"), "{msg}");
    }
}
