// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Parser for the canonical textual path form.

use crate::{Path, PathElem, PathError};

fn err(input: &str, reason: impl Into<String>) -> PathError {
    PathError::Parse {
        input: input.to_owned(),
        reason: reason.into(),
    }
}

/// Split `origin:/rest` into its parts. A `:` only introduces an origin when
/// it appears before the first `/` and `[`.
fn split_origin(input: &str) -> (Option<&str>, &str) {
    let stop = input.find(['/', '[']).unwrap_or(input.len());
    match input[..stop].find(':') {
        Some(i) => (Some(&input[..i]), &input[i + 1..]),
        None => (None, input),
    }
}

/// Parse `/a/b[k=v][k2=v2]/c`, optionally prefixed with `origin:`.
///
/// Inside key selectors a backslash escapes the next character: key names
/// need `\=`, `\]` and `\\`, key values need `\]` and `\\` (`\=` is
/// accepted too). `/` needs no escaping there.
pub fn parse(input: &str) -> Result<Path, PathError> {
    let (origin, body) = split_origin(input);
    let body = body.strip_prefix('/').unwrap_or(body);

    let mut path = Path::root();
    let mut chars = body.chars().peekable();
    while chars.peek().is_some() {
        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c == '/' || c == '[' {
                break;
            }
            name.push(c);
            chars.next();
        }
        let index = path.len();
        let mut elem =
            PathElem::new(name).map_err(|_| err(input, format!("element {index} has no name")))?;

        while chars.peek() == Some(&'[') {
            chars.next();
            let mut key = String::new();
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(c) => key.push(c),
                        None => return Err(err(input, "dangling escape")),
                    },
                    Some('=') => break,
                    Some(']') | None => return Err(err(input, "key selector without '='")),
                    Some(c) => key.push(c),
                }
            }
            let mut value = String::new();
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(c) => value.push(c),
                        None => return Err(err(input, "dangling escape")),
                    },
                    Some(']') => break,
                    Some(c) => value.push(c),
                    None => return Err(err(input, "unterminated key selector")),
                }
            }
            elem = elem.with_key(key, value).map_err(|e| err(input, e.to_string()))?;
        }

        match chars.next() {
            None | Some('/') => {}
            Some(c) => return Err(err(input, format!("unexpected {c:?} after element"))),
        }
        path.push(elem);
    }

    Ok(match origin {
        Some(o) => path.with_origin(o),
        None => path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keys_with_slashes_and_escapes() {
        let path = parse("/interfaces/interface[name=Ethernet1/1]/state").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.elems()[1].key("name"), Some("Ethernet1/1"));

        let escaped = parse(r"/a[k=x\]y]").unwrap();
        assert_eq!(escaped.elems()[0].key("k"), Some("x]y"));
        assert_eq!(escaped.to_string(), r"/a[k=x\]y]");

        let odd_key = parse(r"/a[k\=1\]=v\=w]").unwrap();
        assert_eq!(odd_key.elems()[0].key("k=1]"), Some("v=w"));
        assert_eq!(odd_key.to_string(), r"/a[k\=1\]=v=w]");
        assert_eq!(parse(&odd_key.to_string()).unwrap(), odd_key);
    }

    #[test]
    fn parses_origin_and_root() {
        let path = parse("cli:/show version").unwrap();
        assert_eq!(path.origin(), Some("cli"));
        assert_eq!(path.elems()[0].name(), "show version");
        assert!(parse("/").unwrap().is_empty());
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse("/a//b").is_err());
        assert!(parse("/a[k]").is_err());
        assert!(parse("/a[k=v").is_err());
        assert!(parse("/a[k=1][k=2]").is_err());
        assert!(parse("/a[k=1]b").is_err());
    }
}
