//! Minimal URI template matching (`scheme://{a}/x/{b}`).

use serde_json::{Map, Value};

enum Part<'a> {
    Literal(&'a str),
    Var(&'a str),
}

fn parse(template: &str) -> Option<Vec<Part<'_>>> {
    let mut parts = Vec::new();
    let mut rest = template;
    while !rest.is_empty() {
        match rest.find('{') {
            Some(0) => {
                let end = rest.find('}')?;
                let name = &rest[1..end];
                if name.is_empty() {
                    return None;
                }
                // Two adjacent variables cannot be split unambiguously.
                if matches!(parts.last(), Some(Part::Var(_))) {
                    return None;
                }
                parts.push(Part::Var(name));
                rest = &rest[end + 1..];
            }
            Some(start) => {
                parts.push(Part::Literal(&rest[..start]));
                rest = &rest[start..];
            }
            None => {
                parts.push(Part::Literal(rest));
                rest = "";
            }
        }
    }
    Some(parts)
}

/// Match `uri` against `template`, returning the captured variables.
///
/// A variable captures up to the next literal segment; the last variable
/// captures the remainder. Empty captures do not match.
pub fn match_uri_template(template: &str, uri: &str) -> Option<Map<String, Value>> {
    let parts = parse(template)?;
    let mut vars = Map::new();
    let mut rest = uri;

    for (i, part) in parts.iter().enumerate() {
        match part {
            Part::Literal(lit) => {
                rest = rest.strip_prefix(lit)?;
            }
            Part::Var(name) => {
                let value = match parts.get(i + 1) {
                    Some(Part::Literal(next)) => {
                        let end = rest.find(next)?;
                        let (value, tail) = rest.split_at(end);
                        rest = tail;
                        value
                    }
                    _ => std::mem::take(&mut rest),
                };
                if value.is_empty() {
                    return None;
                }
                vars.insert((*name).to_string(), Value::String(value.to_string()));
            }
        }
    }

    rest.is_empty().then_some(vars)
}
