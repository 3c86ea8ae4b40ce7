use crate::path::{Path, Segment};
use crate::scan::{Scanner, Token};
use crate::Error;

/// Extract the value at `spec` within `text`.
///
/// On success, yields the kind of the extracted value and its raw text:
/// the UTF-8 slice of `text` for objects and arrays, the slice with the
/// surrounding quotes stripped for strings.
pub fn extract<'t>(text: &'t str, spec: &str) -> Result<(Token, &'t str), Error> {
    let path = Path::parse(spec)?;
    extract_path(text, &path)
}

/// Extract using an already-parsed Path.
pub fn extract_path<'t>(text: &'t str, path: &Path) -> Result<(Token, &'t str), Error> {
    let mut slice = text;
    for segment in path.iter() {
        slice = match segment {
            Segment::Member(name) => member(slice, name)?,
            Segment::Index(index) => element(slice, *index)?,
        };
    }

    let mut scanner = Scanner::new(slice);
    let (token, raw) = scanner.scan_value()?;
    let raw = match token {
        Token::String => &raw[1..raw.len() - 1],
        _ => raw,
    };
    Ok((token, raw))
}

/// Step into the named member of an object value.
fn member<'t>(text: &'t str, name: &str) -> Result<&'t str, Error> {
    let mut scanner = Scanner::new(text);
    scanner.skip_ws();
    match scanner.peek() {
        Some(b'{') => scanner.bump(),
        // A well-formed value of any other kind has no members.
        _ => {
            scanner.scan_value()?;
            return Err(Error::NotFound);
        }
    }
    scanner.skip_ws();
    if scanner.peek() == Some(b'}') {
        return Err(Error::NotFound);
    }

    loop {
        scanner.skip_ws();
        if scanner.peek() != Some(b'"') {
            return Err(Error::Format);
        }
        // Member names compare literally, byte for byte.
        let member_name = scanner.scan_string()?;
        scanner.skip_ws();
        if scanner.peek() != Some(b':') {
            return Err(Error::Format);
        }
        scanner.bump();
        let (_, value) = scanner.scan_value()?;
        if member_name == name {
            return Ok(value);
        }
        scanner.skip_ws();
        match scanner.peek() {
            Some(b',') => scanner.bump(),
            Some(b'}') => return Err(Error::NotFound),
            _ => return Err(Error::Format),
        }
    }
}

/// Step into the indexed element of an array value.
fn element(text: &str, index: usize) -> Result<&str, Error> {
    let mut scanner = Scanner::new(text);
    scanner.skip_ws();
    match scanner.peek() {
        Some(b'[') => scanner.bump(),
        _ => {
            scanner.scan_value()?;
            return Err(Error::NotFound);
        }
    }
    scanner.skip_ws();
    if scanner.peek() == Some(b']') {
        return Err(Error::NotFound);
    }

    let mut at = 0;
    loop {
        let (_, value) = scanner.scan_value()?;
        if at == index {
            return Ok(value);
        }
        scanner.skip_ws();
        match scanner.peek() {
            Some(b',') => {
                scanner.bump();
                at += 1;
            }
            Some(b']') => return Err(Error::NotFound),
            _ => return Err(Error::Format),
        }
    }
}
