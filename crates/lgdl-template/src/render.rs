//! Template rendering: scans `{var[?default]}` and `${expr}` tokens and
//! substitutes them against a context.

use crate::arith;
use crate::context::{as_display_string, lookup};
use crate::error::TemplateError;
use serde_json::Value;

/// Render `template` against `context`. On any token failure the whole
/// render fails - rendered output never silently falls back to partial
/// text; the caller (the move's action executor) is responsible for
/// treating this as a fatal action.
pub fn render(template: &str, context: &Value) -> Result<String, TemplateError> {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '$' && chars.get(i + 1) == Some(&'{') {
            let close = find_close(&chars, i + 2)?;
            let expr_src: String = chars[i + 2..close].iter().collect();
            let value = arith::evaluate(&expr_src, context)?;
            out.push_str(&format_number(value));
            i = close + 1;
        } else if c == '{' {
            let close = find_close(&chars, i + 1)?;
            let token: String = chars[i + 1..close].iter().collect();
            out.push_str(&render_variable(&token, context)?);
            i = close + 1;
        } else {
            out.push(c);
            i += 1;
        }
    }
    Ok(out)
}

fn find_close(chars: &[char], start: usize) -> Result<usize, TemplateError> {
    chars[start..]
        .iter()
        .position(|&c| c == '}')
        .map(|p| start + p)
        .ok_or_else(|| TemplateError::ParseError {
            detail: "unterminated token: missing closing '}'".to_string(),
        })
}

fn render_variable(token: &str, context: &Value) -> Result<String, TemplateError> {
    let (path, fallback) = match token.split_once('?') {
        Some((p, f)) => (p, Some(f)),
        None => (token, None),
    };
    match lookup(context, path).and_then(as_display_string) {
        Some(s) => Ok(s),
        None => match fallback {
            Some(f) => Ok(f.to_string()),
            None => Err(TemplateError::MissingVariable {
                path: path.to_string(),
            }),
        },
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let mut s = format!("{value:.6}");
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_plain_text() {
        let ctx = json!({});
        assert_eq!(render("hello world", &ctx).unwrap(), "hello world");
    }

    #[test]
    fn renders_variable_with_fallback() {
        let ctx = json!({"name": "Smith"});
        assert_eq!(
            render("Dr. {name?Unknown}", &ctx).unwrap(),
            "Dr. Smith"
        );
        assert_eq!(
            render("Dr. {missing?Unknown}", &ctx).unwrap(),
            "Dr. Unknown"
        );
    }

    #[test]
    fn missing_variable_without_fallback_is_fatal() {
        let ctx = json!({});
        let err = render("Hello {name}", &ctx).unwrap_err();
        assert_eq!(err.code(), "E001");
    }

    #[test]
    fn renders_arithmetic() {
        let ctx = json!({"capacity": 12, "used": 5});
        assert_eq!(
            render("Remaining: ${capacity - used}", &ctx).unwrap(),
            "Remaining: 7"
        );
    }

    #[test]
    fn nested_path_and_arithmetic_combine() {
        let ctx = json!({"slots": {"severity": 8}, "max": 10});
        assert_eq!(
            render("Severity {slots.severity} of ${max}", &ctx).unwrap(),
            "Severity 8 of 10"
        );
    }
}
