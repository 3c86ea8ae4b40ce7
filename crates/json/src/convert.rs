/// Interpret raw JSON text as a boolean.
///
/// `true` and `false` map to themselves. Text that parses as a number is
/// true iff the number is non-zero and not NaN. Any other non-empty text
/// is true.
pub fn parse_bool(text: &str) -> bool {
    match text {
        "true" => true,
        "false" => false,
        "" => false,
        _ => match parse_prefix(text) {
            Some(number) => number != 0.0 && !number.is_nan(),
            None => true,
        },
    }
}

/// Interpret raw JSON text as a number.
///
/// `true` is 1 and `false` is 0; otherwise the longest numeric prefix is
/// parsed, strtod-style, and NaN is returned when there is none.
pub fn parse_number(text: &str) -> f64 {
    match text {
        "true" => 1.0,
        "false" => 0.0,
        _ => parse_prefix(text).unwrap_or(f64::NAN),
    }
}

/// Parse the longest strtod-style numeric prefix of `text`.
fn parse_prefix(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut pos = 0;

    let negative = match bytes.first() {
        Some(b'+') => {
            pos += 1;
            false
        }
        Some(b'-') => {
            pos += 1;
            true
        }
        _ => false,
    };

    // strtod also recognizes the nan/inf spellings, which the printf-style
    // rendering of unparseable samples round-trips through.
    for (literal, value) in [
        ("infinity", f64::INFINITY),
        ("inf", f64::INFINITY),
        ("nan", f64::NAN),
    ] {
        let literal = literal.as_bytes();
        if bytes.len() >= pos + literal.len()
            && bytes[pos..pos + literal.len()].eq_ignore_ascii_case(literal)
        {
            return Some(if negative { -value } else { value });
        }
    }

    let mut digits = 0;
    while matches!(bytes.get(pos), Some(c) if c.is_ascii_digit()) {
        pos += 1;
        digits += 1;
    }
    if bytes.get(pos) == Some(&b'.') {
        pos += 1;
        while matches!(bytes.get(pos), Some(c) if c.is_ascii_digit()) {
            pos += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }
    if matches!(bytes.get(pos), Some(b'e') | Some(b'E')) {
        let mark = pos;
        pos += 1;
        if matches!(bytes.get(pos), Some(b'+') | Some(b'-')) {
            pos += 1;
        }
        let mut exponent = 0;
        while matches!(bytes.get(pos), Some(c) if c.is_ascii_digit()) {
            pos += 1;
            exponent += 1;
        }
        if exponent == 0 {
            // `1e` is the number 1 followed by the letter e.
            pos = mark;
        }
    }

    trimmed[..pos].parse().ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
        assert!(parse_bool("1"));
        assert!(parse_bool("-0.5"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("0.000"));
        assert!(!parse_bool("nan"));
        assert!(parse_bool("hello"));
        assert!(parse_bool("{\"a\":1}"));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("true"), 1.0);
        assert_eq!(parse_number("false"), 0.0);
        assert_eq!(parse_number("42"), 42.0);
        assert_eq!(parse_number("-12.5e2"), -1250.0);
        assert_eq!(parse_number("+3.25"), 3.25);
        assert_eq!(parse_number("77 trailing"), 77.0);
        assert_eq!(parse_number("1e"), 1.0);
        assert_eq!(parse_number("inf"), f64::INFINITY);
        assert_eq!(parse_number("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_number("nan").is_nan());
        assert!(parse_number("").is_nan());
        assert!(parse_number("hello").is_nan());
        assert!(parse_number("[1]").is_nan());
    }

    #[test]
    fn test_parse_number_formatted_round_trip() {
        for value in [0.0, 1.5, -7.25, 1013.25, 1.0e-5, 123456.789] {
            let text = format!("{:.6}", value);
            let parsed = parse_number(&text);
            let error = (parsed - value).abs();
            assert!(error <= 1e-6 * value.abs().max(1.0), "value: {}", value);
        }
    }

    #[quickcheck_macros::quickcheck]
    fn parse_number_round_trips_any_formatted(value: f64) -> bool {
        if !value.is_finite() {
            return true;
        }
        let parsed = parse_number(&format!("{:.6}", value));
        (parsed - value).abs() <= 1e-6 * value.abs().max(1.0)
    }
}
