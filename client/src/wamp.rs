//! The slice of WAMP v2 (JSON serialization) a single caller needs:
//! session establishment with ticket auth, one CALL, and GOODBYE.

use serde_json::{Map, Value, json};
use thiserror::Error;

/// WebSocket subprotocol announced to the router.
pub const SUBPROTOCOL: &str = "wamp.2.json";

pub const HELLO: u64 = 1;
pub const WELCOME: u64 = 2;
pub const ABORT: u64 = 3;
pub const CHALLENGE: u64 = 4;
pub const AUTHENTICATE: u64 = 5;
pub const GOODBYE: u64 = 6;
pub const ERROR: u64 = 8;
pub const CALL: u64 = 48;
pub const RESULT: u64 = 50;

pub const CLOSE_REALM: &str = "wamp.close.close_realm";
pub const GOODBYE_AND_OUT: &str = "wamp.close.goodbye_and_out";

pub type Dict = Map<String, Value>;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message is not a non-empty array")]
    NotArray,
    #[error("unknown message type {0}")]
    UnknownType(u64),
    #[error("message type {code}: bad or missing element {index}")]
    BadElement { code: u64, index: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum WampMessage {
    Hello { realm: String, details: Dict },
    Welcome { session: u64, details: Dict },
    Abort { details: Dict, reason: String },
    Challenge { auth_method: String, extra: Dict },
    Authenticate { signature: String, extra: Dict },
    Goodbye { details: Dict, reason: String },
    Error {
        request_type: u64,
        request: u64,
        details: Dict,
        error: String,
        args: Vec<Value>,
        kwargs: Dict,
    },
    Call {
        request: u64,
        options: Dict,
        procedure: String,
        args: Vec<Value>,
        kwargs: Dict,
    },
    Result {
        request: u64,
        details: Dict,
        args: Vec<Value>,
        kwargs: Dict,
    },
}

impl WampMessage {
    /// Serializes to the JSON array form.
    pub fn encode(&self) -> String {
        self.to_value().to_string()
    }

    fn to_value(&self) -> Value {
        match self {
            WampMessage::Hello { realm, details } => json!([HELLO, realm, details]),
            WampMessage::Welcome { session, details } => json!([WELCOME, session, details]),
            WampMessage::Abort { details, reason } => json!([ABORT, details, reason]),
            WampMessage::Challenge { auth_method, extra } => json!([CHALLENGE, auth_method, extra]),
            WampMessage::Authenticate { signature, extra } => json!([AUTHENTICATE, signature, extra]),
            WampMessage::Goodbye { details, reason } => json!([GOODBYE, details, reason]),
            WampMessage::Error { request_type, request, details, error, args, kwargs } => {
                let head = vec![json!(ERROR), json!(request_type), json!(request), json!(details), json!(error)];
                with_payload(head, args, kwargs)
            }
            WampMessage::Call { request, options, procedure, args, kwargs } => {
                let head = vec![json!(CALL), json!(request), json!(options), json!(procedure)];
                with_payload(head, args, kwargs)
            }
            WampMessage::Result { request, details, args, kwargs } => {
                let head = vec![json!(RESULT), json!(request), json!(details)];
                with_payload(head, args, kwargs)
            }
        }
    }

    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        let items = match value {
            Value::Array(items) if !items.is_empty() => items,
            _ => return Err(DecodeError::NotArray),
        };
        let code = items[0].as_u64().ok_or(DecodeError::NotArray)?;
        let f = Fields { code, items: &items };

        let msg = match code {
            HELLO => WampMessage::Hello { realm: f.string(1)?, details: f.dict(2)? },
            WELCOME => WampMessage::Welcome { session: f.uint(1)?, details: f.dict(2)? },
            ABORT => WampMessage::Abort { details: f.dict(1)?, reason: f.string(2)? },
            CHALLENGE => WampMessage::Challenge { auth_method: f.string(1)?, extra: f.dict(2)? },
            AUTHENTICATE => WampMessage::Authenticate { signature: f.string(1)?, extra: f.dict(2)? },
            GOODBYE => WampMessage::Goodbye { details: f.dict(1)?, reason: f.string(2)? },
            ERROR => WampMessage::Error {
                request_type: f.uint(1)?,
                request: f.uint(2)?,
                details: f.dict(3)?,
                error: f.string(4)?,
                args: f.opt_list(5)?,
                kwargs: f.opt_dict(6)?,
            },
            CALL => WampMessage::Call {
                request: f.uint(1)?,
                options: f.dict(2)?,
                procedure: f.string(3)?,
                args: f.opt_list(4)?,
                kwargs: f.opt_dict(5)?,
            },
            RESULT => WampMessage::Result {
                request: f.uint(1)?,
                details: f.dict(2)?,
                args: f.opt_list(3)?,
                kwargs: f.opt_dict(4)?,
            },
            other => return Err(DecodeError::UnknownType(other)),
        };
        Ok(msg)
    }
}

// args must be present whenever kwargs is
fn with_payload(mut head: Vec<Value>, args: &[Value], kwargs: &Dict) -> Value {
    if !args.is_empty() || !kwargs.is_empty() {
        head.push(Value::Array(args.to_vec()));
    }
    if !kwargs.is_empty() {
        head.push(Value::Object(kwargs.clone()));
    }
    Value::Array(head)
}

struct Fields<'a> {
    code: u64,
    items: &'a [Value],
}

impl Fields<'_> {
    fn bad(&self, index: usize) -> DecodeError {
        DecodeError::BadElement { code: self.code, index }
    }

    fn uint(&self, index: usize) -> Result<u64, DecodeError> {
        self.items.get(index).and_then(Value::as_u64).ok_or_else(|| self.bad(index))
    }

    fn string(&self, index: usize) -> Result<String, DecodeError> {
        self.items
            .get(index)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| self.bad(index))
    }

    fn dict(&self, index: usize) -> Result<Dict, DecodeError> {
        self.items
            .get(index)
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| self.bad(index))
    }

    fn opt_list(&self, index: usize) -> Result<Vec<Value>, DecodeError> {
        match self.items.get(index) {
            None => Ok(Vec::new()),
            Some(Value::Array(list)) => Ok(list.clone()),
            Some(_) => Err(self.bad(index)),
        }
    }

    fn opt_dict(&self, index: usize) -> Result<Dict, DecodeError> {
        match self.items.get(index) {
            None => Ok(Dict::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(_) => Err(self.bad(index)),
        }
    }
}
