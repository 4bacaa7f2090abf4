//! Recursive `{{variable}}` template expansion.
//!
//! Values may reference other variables; expansion keeps substituting until
//! a pass changes nothing. Placeholders with no matching variable stay in
//! the output as literal text. A chain that keeps producing new placeholders
//! (including a variable referencing itself) is abandoned after
//! [`MAX_EXPANSION_DEPTH`] passes — callers are expected to degrade to the
//! unresolved input via [`resolve_or_raw`], which is deliberate product
//! behavior rather than an error surface.

use relay_core::Envs;
use std::fmt;

/// Maximum number of substitution passes before resolution is abandoned.
pub const MAX_EXPANSION_DEPTH: usize = 10;

/// Template resolution failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateError {
    /// Expansion did not settle within [`MAX_EXPANSION_DEPTH`] passes
    DepthExceeded {
        /// Passes performed before giving up
        depth: usize,
    },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DepthExceeded { depth } => {
                write!(f, "template expansion exceeded {} passes", depth)
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// Expand every `{{name}}` placeholder in `raw` against `envs`.
///
/// Lookup follows [`Envs::get`] precedence: `selected` tier first, then
/// `global`, first match wins.
pub fn parse_template(raw: &str, envs: &Envs) -> std::result::Result<String, TemplateError> {
    let mut current = raw.to_string();
    for _ in 0..MAX_EXPANSION_DEPTH {
        let (next, substituted) = expand_once(&current, envs);
        if !substituted {
            return Ok(next);
        }
        current = next;
    }
    Err(TemplateError::DepthExceeded {
        depth: MAX_EXPANSION_DEPTH,
    })
}

/// Policy layer over [`parse_template`]: on overflow, fall back to the
/// unresolved input instead of surfacing the error.
pub fn resolve_or_raw(raw: &str, envs: &Envs) -> String {
    parse_template(raw, envs).unwrap_or_else(|_| raw.to_string())
}

/// One simultaneous substitution pass. Returns the rewritten string and
/// whether any placeholder was actually replaced; unmatched placeholders and
/// an unterminated `{{` are copied through verbatim.
fn expand_once(input: &str, envs: &Envs) -> (String, bool) {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    let mut substituted = false;

    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open + 2..].find("}}") else {
            break;
        };
        let name = &rest[open + 2..open + 2 + close];
        out.push_str(&rest[..open]);
        match envs.get(name) {
            Some(var) => {
                out.push_str(&var.value);
                substituted = true;
            }
            None => out.push_str(&rest[open..open + close + 4]),
        }
        rest = &rest[open + close + 4..];
    }

    out.push_str(rest);
    (out, substituted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::Variable;

    fn envs(selected: &[(&str, &str)], global: &[(&str, &str)]) -> Envs {
        Envs {
            global: global.iter().map(|(k, v)| Variable::new(*k, *v)).collect(),
            selected: selected.iter().map(|(k, v)| Variable::new(*k, *v)).collect(),
        }
    }

    #[test]
    fn replaces_simple_placeholders() {
        let envs = envs(&[("host", "api.example.com")], &[]);
        assert_eq!(
            parse_template("https://{{host}}/v1", &envs).unwrap(),
            "https://api.example.com/v1"
        );
    }

    #[test]
    fn expands_nested_references() {
        let envs = envs(
            &[("url", "{{scheme}}://{{host}}")],
            &[("scheme", "https"), ("host", "{{sub}}.example.com"), ("sub", "api")],
        );
        assert_eq!(
            parse_template("{{url}}", &envs).unwrap(),
            "https://api.example.com"
        );
    }

    #[test]
    fn selected_tier_wins_during_resolution() {
        let envs = envs(&[("host", "staging")], &[("host", "prod")]);
        assert_eq!(parse_template("{{host}}", &envs).unwrap(), "staging");
    }

    #[test]
    fn unmatched_placeholders_stay_literal() {
        let envs = envs(&[], &[]);
        assert_eq!(
            parse_template("ping {{nobody}} home", &envs).unwrap(),
            "ping {{nobody}} home"
        );
    }

    #[test]
    fn unterminated_braces_stay_literal() {
        let envs = envs(&[("a", "x")], &[]);
        assert_eq!(parse_template("{{a}} and {{broken", &envs).unwrap(), "x and {{broken");
    }

    #[test]
    fn self_reference_overflows() {
        let envs = envs(&[("loop", "{{loop}}")], &[]);
        assert_eq!(
            parse_template("{{loop}}", &envs),
            Err(TemplateError::DepthExceeded {
                depth: MAX_EXPANSION_DEPTH
            })
        );
    }

    #[test]
    fn resolve_or_raw_degrades_to_input_on_overflow() {
        let envs = envs(&[("a", "{{b}}"), ("b", "{{a}}")], &[]);
        assert_eq!(resolve_or_raw("{{a}}", &envs), "{{a}}");
        assert_eq!(resolve_or_raw("plain", &envs), "plain");
    }
}
