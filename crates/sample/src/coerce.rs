use crate::{format_number, Kind, Sample, Value};

impl Value {
    /// Convert this value to the requested kind.
    ///
    /// Conversions follow the device rules: triggers erase payloads,
    /// booleans and numbers render as their printf text, strings map to
    /// truthiness, and JSON text is interpreted leniently.
    pub fn coerce(&self, to: Kind) -> Value {
        use Value::*;

        if self.kind() == to {
            return self.clone();
        }
        match (self, to) {
            (_, Kind::Trigger) => Trigger,

            (Trigger, Kind::Boolean) => Boolean(false),
            (Trigger, Kind::Numeric) => Numeric(f64::NAN),
            (Trigger, Kind::String) => String("".into()),
            (Trigger, Kind::Json) => Json("null".into()),

            (Boolean(v), Kind::Numeric) => Numeric(if *v { 1.0 } else { 0.0 }),
            (Boolean(v), Kind::String) => String(bool_text(*v).into()),
            (Boolean(v), Kind::Json) => Json(bool_text(*v).into()),

            (Numeric(v), Kind::Boolean) => Boolean(*v != 0.0),
            (Numeric(v), Kind::String) => String(format_number(*v).into()),
            (Numeric(v), Kind::Json) => Json(format_number(*v).into()),

            (String(s), Kind::Boolean) => Boolean(!s.is_empty()),
            (String(s), Kind::Numeric) => Numeric(if s.is_empty() { 0.0 } else { 1.0 }),
            (String(s), Kind::Json) => Json(format!("\"{}\"", s).into()),

            (Json(t), Kind::Boolean) => Boolean(json::parse_bool(t)),
            (Json(t), Kind::Numeric) => Numeric(json::parse_number(t)),
            (Json(t), Kind::String) => String(t.clone()),

            // Same-kind pairs already returned above.
            _ => self.clone(),
        }
    }
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

impl Sample {
    /// A copy of this sample coerced to the requested kind,
    /// timestamp preserved.
    pub fn coerce(&self, to: Kind) -> Sample {
        Sample {
            timestamp: self.timestamp(),
            value: self.value().coerce(to),
        }
    }
}
