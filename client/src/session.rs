use log::{debug, error, info};
use crate::backend_client::{BackendAuth, SERVICE_NAME};
use crate::errors::{CallError, Error};
use crate::request::Request;
use crate::router_client::{CallResult, ROUTER_REALM, RouterConnector, RouterSession};

/// Procedure exposed by the client service for all settings commands.
pub const SETTINGS_PROCEDURE: &str = "com.digitallumens.client-service.settings";

/// Collaborators for one run: who issues tokens and where to open sessions.
pub struct SessionContext<'a, A: ?Sized, C> {
    backend: &'a A,
    router: &'a C,
}

impl<'a, A, C> SessionContext<'a, A, C>
where
    A: BackendAuth + ?Sized,
    C: RouterConnector,
{
    pub fn new(backend: &'a A, router: &'a C) -> Self {
        Self { backend, router }
    }

    /// Authenticates, connects, performs the call and disconnects.
    ///
    /// Once a router session is open it is disconnected exactly once, whether
    /// or not the call succeeded. A failed disconnect is only logged.
    pub async fn execute(&self, request: Request) -> Result<CallResult, Error> {
        let token = self.backend.auth_service(SERVICE_NAME).await?;
        debug!("Authenticated as {SERVICE_NAME}");

        // encoded before connecting so an unsendable request never opens a session
        let request = request.with_token(token.as_str());
        let kwargs = request
            .to_kwargs()
            .map_err(|e| CallError::Protocol(format!("request could not be encoded: {e}")))?;

        let mut session = self.router.connect(ROUTER_REALM, &token).await?;

        let outcome = session.call(SETTINGS_PROCEDURE, kwargs).await;
        if let Err(e) = &outcome {
            error!("Router call returned an error: {e}");
        }

        match session.disconnect().await {
            Ok(()) => info!("Router session closed"),
            Err(e) => error!("Router disconnect returned an error: {e}"),
        }

        Ok(outcome?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use async_trait::async_trait;
    use serde_json::json;
    use crate::backend_client::SessionToken;
    use crate::errors::{AuthError, ConnectError, DisconnectError};
    use crate::request::{Procedure, build};
    use crate::wamp::Dict;

    #[derive(Default)]
    struct Journal {
        events: Mutex<Vec<String>>,
        kwargs: Mutex<Option<Dict>>,
    }

    impl Journal {
        fn push(&self, event: impl Into<String>) {
            self.events.lock().unwrap().push(event.into());
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[derive(Default, Clone, Copy)]
    struct Faults {
        auth: bool,
        connect: bool,
        call: bool,
        disconnect: bool,
    }

    struct FakeBackend {
        journal: Arc<Journal>,
        faults: Faults,
    }

    #[async_trait]
    impl BackendAuth for FakeBackend {
        async fn auth_service(&self, service: &str) -> Result<SessionToken, AuthError> {
            self.journal.push(format!("auth {service}"));
            if self.faults.auth {
                return Err(AuthError::Rejected { status: 403, body: "denied".into() });
            }
            Ok(SessionToken::new("tok-1"))
        }
    }

    struct FakeRouter {
        journal: Arc<Journal>,
        faults: Faults,
    }

    struct FakeSession {
        journal: Arc<Journal>,
        faults: Faults,
    }

    #[async_trait]
    impl RouterConnector for FakeRouter {
        type Session = FakeSession;

        async fn connect(&self, realm: &str, token: &SessionToken) -> Result<FakeSession, ConnectError> {
            self.journal.push(format!("connect {realm} {}", token.as_str()));
            if self.faults.connect {
                return Err(ConnectError::Closed);
            }
            Ok(FakeSession { journal: Arc::clone(&self.journal), faults: self.faults })
        }
    }

    #[async_trait]
    impl RouterSession for FakeSession {
        async fn call(&mut self, procedure: &str, kwargs: Dict) -> Result<CallResult, CallError> {
            self.journal.push(format!("call {procedure}"));
            *self.journal.kwargs.lock().unwrap() = Some(kwargs);
            if self.faults.call {
                return Err(CallError::Remote { uri: "wamp.error.runtime_error".into(), detail: "{}".into() });
            }
            Ok(CallResult { args: vec![json!({"status": 200, "results": {}})], kwargs: Dict::new() })
        }

        async fn disconnect(&mut self) -> Result<(), DisconnectError> {
            self.journal.push("disconnect");
            if self.faults.disconnect {
                return Err(DisconnectError::Transport(
                    tokio_tungstenite::tungstenite::Error::ConnectionClosed,
                ));
            }
            Ok(())
        }
    }

    async fn run(faults: Faults) -> (Result<CallResult, Error>, Arc<Journal>) {
        let journal = Arc::new(Journal::default());
        let backend = FakeBackend { journal: Arc::clone(&journal), faults };
        let router = FakeRouter { journal: Arc::clone(&journal), faults };
        let args: Vec<String> = ["g1", "3", "true", "1", "30"].iter().map(|s| s.to_string()).collect();
        let request = build(Procedure::SetSettings, &args);
        let result = SessionContext::new(&backend, &router).execute(request).await;
        (result, journal)
    }

    #[tokio::test]
    async fn one_of_each_step_on_success() {
        let (result, journal) = run(Faults::default()).await;
        assert!(result.is_ok(), "{result:?}");
        assert_eq!(
            journal.events(),
            vec![
                "auth group_settings_cli".to_string(),
                "connect com.digitallumens tok-1".to_string(),
                format!("call {SETTINGS_PROCEDURE}"),
                "disconnect".to_string(),
            ]
        );
        let kwargs = journal.kwargs.lock().unwrap().clone().unwrap();
        assert_eq!(kwargs["token"], "tok-1");
        assert_eq!(kwargs["id"], "g1");
        assert_eq!(kwargs["procedure"], "setSettings");
        assert_eq!(
            kwargs["params"],
            json!({"active_level": "3", "vacancy_enabled": "true", "inactive_level": "1", "vacancy_delay_sec": "30"})
        );
    }

    #[tokio::test]
    async fn failed_call_still_disconnects_once() {
        let (result, journal) = run(Faults { call: true, ..Faults::default() }).await;
        assert!(matches!(result, Err(Error::Call(_))), "{result:?}");
        let disconnects = journal.events().iter().filter(|e| *e == "disconnect").count();
        assert_eq!(disconnects, 1);
    }

    #[tokio::test]
    async fn auth_failure_stops_before_connect() {
        let (result, journal) = run(Faults { auth: true, ..Faults::default() }).await;
        assert!(matches!(result, Err(Error::Auth(_))), "{result:?}");
        assert_eq!(journal.events(), vec!["auth group_settings_cli".to_string()]);
    }

    #[tokio::test]
    async fn connect_failure_makes_no_call() {
        let (result, journal) = run(Faults { connect: true, ..Faults::default() }).await;
        assert!(matches!(result, Err(Error::Connect(_))), "{result:?}");
        assert_eq!(journal.events().len(), 2);
    }

    #[tokio::test]
    async fn disconnect_failure_does_not_fail_the_run() {
        let (result, journal) = run(Faults { disconnect: true, ..Faults::default() }).await;
        assert!(result.is_ok(), "{result:?}");
        assert_eq!(journal.events().last().map(String::as_str), Some("disconnect"));
    }
}
