use std::fmt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Client-service operation selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Procedure {
    SetSettings,
    GetSettings,
    GetSettingsMap,
}

impl Procedure {
    /// Name the client service dispatches on.
    pub fn as_str(self) -> &'static str {
        match self {
            Procedure::SetSettings => "setSettings",
            Procedure::GetSettings => "getSettings",
            // deployed services expect the historical action name
            Procedure::GetSettingsMap => "getSettingsMapAction",
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Procedure {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Lighting levels and vacancy behaviour for a group. Values pass through
/// untouched; the client service validates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSettings {
    pub active_level: String,
    pub vacancy_enabled: String,
    pub inactive_level: String,
    pub vacancy_delay_sec: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Params {
    Settings(GroupSettings),
    /// Serialized as `{}`.
    Empty {},
}

/// One settings command, sent to the router as keyword arguments.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Request {
    pub token: String,
    #[serde(rename = "id")]
    pub group_id: String,
    pub procedure: Procedure,
    pub params: Params,
}

impl Request {
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Keyword-argument mapping for the router call.
    pub fn to_kwargs(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(serde::ser::Error::custom(format!("request encoded as {other}, not an object"))),
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("group_id", &self.group_id)
            .field("procedure", &self.procedure)
            .field("params", &self.params)
            .finish()
    }
}

/// Builds the request for `procedure` from its positional arguments.
///
/// Missing arguments become empty strings and surplus ones are ignored.
pub fn build(procedure: Procedure, args: &[String]) -> Request {
    let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
    let params = match procedure {
        Procedure::SetSettings => Params::Settings(GroupSettings {
            active_level: arg(1),
            vacancy_enabled: arg(2),
            inactive_level: arg(3),
            vacancy_delay_sec: arg(4),
        }),
        Procedure::GetSettings | Procedure::GetSettingsMap => Params::Empty {},
    };
    Request {
        token: String::new(),
        group_id: arg(0),
        procedure,
        params,
    }
}

/// Decoded shape of a client-service reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reply {
    pub status: i64,
    #[serde(default)]
    pub results: Map<String, Value>,
}
