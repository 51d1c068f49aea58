//! Invocation keys derived from call arguments
//!
//! A key is a structural composite of the positional values in call order
//! plus the named values sorted by name. Structure, not string rendering,
//! is what gets hashed, so values with identical textual forms (the string
//! `"1"` and the integer `1`) produce distinct keys.

use serde_json::Value;

use crate::callable::{ArgValue, CallArgs};
use crate::error::{CallError, Result};

/// Canonical, hashable form of a single structured value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    /// Bit pattern of a finite f64, with negative zero folded into zero.
    Float(u64),
    Str(String),
    Seq(Vec<KeyValue>),
    Map(Vec<(String, KeyValue)>),
}

fn canonical(value: &Value) -> KeyValue {
    match value {
        Value::Null => KeyValue::Null,
        Value::Bool(b) => KeyValue::Bool(*b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                KeyValue::UInt(u)
            } else if let Some(i) = n.as_i64() {
                KeyValue::Int(i)
            } else {
                let f = n.as_f64().unwrap_or(0.0);
                let f = if f == 0.0 { 0.0 } else { f };
                KeyValue::Float(f.to_bits())
            }
        }
        Value::String(s) => KeyValue::Str(s.clone()),
        Value::Array(items) => KeyValue::Seq(items.iter().map(canonical).collect()),
        Value::Object(map) => {
            let mut pairs: Vec<(String, KeyValue)> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonical(v)))
                .collect();
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            KeyValue::Map(pairs)
        }
    }
}

/// Canonical identifier for one invocation's arguments.
///
/// Two invocations with the same positional values (in the same order) and
/// the same name/value pairs (in any order) produce equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvocationKey {
    positional: Vec<KeyValue>,
    named: Vec<(String, KeyValue)>,
}

impl InvocationKey {
    /// Build the key for an argument bag.
    ///
    /// Fails with [`CallError::UnhashableArgument`] if any value is opaque;
    /// opaque handles have no canonical form. No side effects either way.
    pub fn for_args(args: &CallArgs) -> Result<Self> {
        let mut positional = Vec::with_capacity(args.positional().len());
        for (index, value) in args.positional().iter().enumerate() {
            match value {
                ArgValue::Json(v) => positional.push(canonical(v)),
                ArgValue::Opaque(_) => return Err(unhashable(format!("#{index}"))),
            }
        }

        // CallArgs stores named values sorted by name, so collecting here
        // preserves the canonical order.
        let mut named = Vec::new();
        for (name, value) in args.named_args() {
            match value {
                ArgValue::Json(v) => named.push((name.to_string(), canonical(v))),
                ArgValue::Opaque(_) => return Err(unhashable(name.to_string())),
            }
        }

        Ok(Self { positional, named })
    }
}

fn unhashable(argument: String) -> CallError {
    CallError::UnhashableArgument {
        argument,
        reason: "opaque values cannot be keyed".to_string(),
    }
}
