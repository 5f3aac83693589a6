//! Request/response wire shapes (§4.C).
//!
//! A request is a Message whose top-level array is
//! `[ requestId:integer, requestKey:string, arg0, arg1, … ]`. The
//! correlation id is plumbing the distilled spec leaves unspecified
//! ("correlation by request key") but a persistent, multiplexed proxy
//! connection (§4.H) needs *some* way to match a response to its call
//! when more than one request is in flight; a leading integer is the
//! minimal addition that doesn't change the request-key convention.
//!
//! A response is `[ requestId:integer, responseKey:string, ok:logical,
//! payload-or-failureReason? ]`.

use nimo_types::NimoError;
use nimo_value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: u64,
    pub key: String,
    pub args: Vec<Value>,
}

impl Request {
    pub fn new(id: u64, key: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            id,
            key: key.into(),
            args,
        }
    }

    pub fn into_value(self) -> Value {
        let mut items = Vec::with_capacity(2 + self.args.len());
        items.push(Value::Integer(self.id as i64));
        items.push(Value::String(self.key));
        items.extend(self.args);
        Value::Array(items)
    }

    pub fn from_value(value: Value) -> Result<Self, NimoError> {
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(NimoError::decode_failed(format!(
                    "request must be an array, got {}",
                    other.kind_name()
                )))
            }
        };
        let mut iter = items.into_iter();
        let id = match iter.next() {
            Some(Value::Integer(n)) => n as u64,
            _ => return Err(NimoError::decode_failed("request missing integer id")),
        };
        let key = match iter.next() {
            Some(Value::String(s)) => s,
            _ => return Err(NimoError::decode_failed("request missing string key")),
        };
        Ok(Request {
            id,
            key,
            args: iter.collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: u64,
    pub key: String,
    pub ok: bool,
    pub payload: Option<Value>,
    pub failure_reason: Option<String>,
}

impl Response {
    pub fn ok(id: u64, key: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            id,
            key: key.into(),
            ok: true,
            payload,
            failure_reason: None,
        }
    }

    pub fn err(id: u64, key: impl Into<String>, error: &NimoError) -> Self {
        Self {
            id,
            key: key.into(),
            ok: false,
            payload: None,
            failure_reason: Some(error.to_string()),
        }
    }

    /// A response for a key that has no handler registered. spec.md
    /// pins the exact wire literal: "Unknown keys yield the generic
    /// error response with `failureReason = \"unknown request\"`" — no
    /// `ErrorKind` prefix, unlike every other failure response.
    pub fn unknown_request(id: u64, key: impl Into<String>) -> Self {
        Self {
            id,
            key: key.into(),
            ok: false,
            payload: None,
            failure_reason: Some("unknown request".to_string()),
        }
    }

    pub fn into_value(self) -> Value {
        let mut items = vec![
            Value::Integer(self.id as i64),
            Value::String(self.key),
            Value::Logical(self.ok),
        ];
        if self.ok {
            if let Some(payload) = self.payload {
                items.push(payload);
            }
        } else if let Some(reason) = self.failure_reason {
            items.push(Value::String(reason));
        }
        Value::Array(items)
    }

    pub fn from_value(value: Value) -> Result<Self, NimoError> {
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(NimoError::decode_failed(format!(
                    "response must be an array, got {}",
                    other.kind_name()
                )))
            }
        };
        let mut iter = items.into_iter();
        let id = match iter.next() {
            Some(Value::Integer(n)) => n as u64,
            _ => return Err(NimoError::decode_failed("response missing integer id")),
        };
        let key = match iter.next() {
            Some(Value::String(s)) => s,
            _ => return Err(NimoError::decode_failed("response missing string key")),
        };
        let ok = match iter.next() {
            Some(Value::Logical(b)) => b,
            _ => return Err(NimoError::decode_failed("response missing ok flag")),
        };
        let tail = iter.next();
        let (payload, failure_reason) = if ok {
            (tail, None)
        } else {
            let reason = match tail {
                Some(Value::String(s)) => Some(s),
                Some(other) => Some(other.to_string()),
                None => None,
            };
            (None, reason)
        };
        Ok(Response {
            id,
            key,
            ok,
            payload,
            failure_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_roundtrip() {
        let req = Request::new(7, "addNode.", vec![Value::String("N1".into())]);
        let value = req.clone().into_value();
        assert_eq!(Request::from_value(value).unwrap(), req);
    }

    #[test]
    fn ok_response_roundtrip() {
        let resp = Response::ok(7, "addNode=", Some(Value::Logical(true)));
        let value = resp.clone().into_value();
        assert_eq!(Response::from_value(value).unwrap(), resp);
    }

    #[test]
    fn error_response_roundtrip() {
        let resp = Response::err(
            7,
            "addNode=",
            &NimoError::already_exists("node N1 already exists"),
        );
        let value = resp.clone().into_value();
        let back = Response::from_value(value).unwrap();
        assert!(!back.ok);
        assert!(back.failure_reason.unwrap().contains("already exists"));
    }
}
