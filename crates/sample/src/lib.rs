use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

mod coerce;

/// Longest string payload a sample may carry, in bytes.
pub const MAX_STRING_VALUE_BYTES: usize = 50_000;

/// Kind enumerates the data types a sample can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Trigger,
    Boolean,
    Numeric,
    String,
    Json,
}

/// Value is the tagged union of sample payloads.
///
/// String and JSON payloads own their heap text outright; nothing hands
/// out interior pointers that could outlive a release.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Trigger,
    Boolean(bool),
    Numeric(f64),
    String(Box<str>),
    Json(Box<str>),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Trigger => Kind::Trigger,
            Value::Boolean(_) => Kind::Boolean,
            Value::Numeric(_) => Kind::Numeric,
            Value::String(_) => Kind::String,
            Value::Json(_) => Kind::Json,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Value::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&str> {
        match self {
            Value::Json(s) => Some(s),
            _ => None,
        }
    }

    /// Canonical JSON rendering: `null` for trigger, `true`/`false` for
    /// booleans, printf `%lf` text for numbers, the quoted payload for
    /// strings, and the payload itself for JSON.
    pub fn to_json_text(&self) -> String {
        match self {
            Value::Trigger => "null".to_string(),
            Value::Boolean(true) => "true".to_string(),
            Value::Boolean(false) => "false".to_string(),
            Value::Numeric(v) => format_number(*v),
            Value::String(s) => format!("\"{}\"", s),
            Value::Json(s) => s.to_string(),
        }
    }
}

/// The printf `%lf` rendering of a number.
pub fn format_number(value: f64) -> String {
    format!("{:.6}", value)
}

/// Sample is an immutable timestamped value.
///
/// Samples are shared by reference count across destinations and
/// handlers; build a sample completely before sharing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    timestamp: f64,
    value: Value,
}

/// Shared ownership of a sample.
pub type SampleRef = Rc<Sample>;

impl Sample {
    /// Build a sample. A zero timestamp resolves to the wall clock at
    /// construction.
    pub fn new(timestamp: f64, value: Value) -> Sample {
        let timestamp = if timestamp == 0.0 { now() } else { timestamp };
        Sample { timestamp, value }
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn kind(&self) -> Kind {
        self.value.kind()
    }

    /// A copy of this sample's value carrying a different timestamp.
    pub fn restamped(&self, timestamp: f64) -> Sample {
        Sample {
            timestamp,
            value: self.value.clone(),
        }
    }

    /// Canonical JSON rendering of the carried value.
    pub fn to_json_text(&self) -> String {
        self.value.to_json_text()
    }
}

/// Seconds since the Unix epoch, as a double.
pub fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}
