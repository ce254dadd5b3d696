//! Pattern compilation: `{name}` placeholders to named regex capture
//! groups.

use crate::ir::{Modifier, Pattern};
use lgdl_ast::Modifier as AstModifier;
use regex::Regex;
use std::collections::HashSet;

/// Convert a raw trigger pattern (e.g. `"I need to see Dr. {doctor}"`) into
/// a compiled, case-insensitive regex with one named capture group per
/// `{name}` placeholder. Capture uses a conservative, non-greedy token
/// sequence so adjacent literal text still anchors the match.
pub fn compile_pattern(
    raw: &str,
    ast_modifiers: &[AstModifier],
) -> Result<Pattern, regex::Error> {
    let modifiers: HashSet<Modifier> = ast_modifiers.iter().map(map_modifier).collect();
    let strict = modifiers.contains(&Modifier::Strict);

    let mut regex_src = String::from("(?i)");
    if strict {
        regex_src.push('^');
    }
    let mut capture_names = Vec::new();

    let mut chars = raw.chars().peekable();
    let mut literal = String::new();
    while let Some(c) = chars.next() {
        if c == '{' {
            flush_literal(&mut regex_src, &mut literal);
            let mut name = String::new();
            for nc in chars.by_ref() {
                if nc == '}' {
                    break;
                }
                name.push(nc);
            }
            capture_names.push(name.clone());
            regex_src.push_str(&format!(r"(?P<{name}>.+?)"));
        } else {
            literal.push(c);
        }
    }
    flush_literal(&mut regex_src, &mut literal);
    if strict {
        regex_src.push('$');
    }

    let regex = Regex::new(&regex_src)?;

    Ok(Pattern {
        raw: raw.to_string(),
        regex,
        modifiers,
        capture_names,
    })
}

fn flush_literal(regex_src: &mut String, literal: &mut String) {
    if !literal.is_empty() {
        regex_src.push_str(&regex::escape(literal));
        literal.clear();
    }
}

fn map_modifier(m: &AstModifier) -> Modifier {
    match m {
        AstModifier::Strict => Modifier::Strict,
        AstModifier::Fuzzy => Modifier::Fuzzy,
        AstModifier::Learned => Modifier::Learned,
        AstModifier::ContextSensitive => Modifier::ContextSensitive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_named_captures() {
        let pattern = compile_pattern("I need to see Dr. {doctor}", &[AstModifier::Strict]).unwrap();
        let caps = pattern.regex.captures("i need to see dr. smith").unwrap();
        assert_eq!(&caps["doctor"], "smith");
    }

    #[test]
    fn strict_pattern_requires_full_match() {
        let pattern = compile_pattern("hello {name}", &[AstModifier::Strict]).unwrap();
        assert!(pattern.regex.is_match("hello world"));
        assert!(!pattern.regex.is_match("well hello world"));
    }

    #[test]
    fn non_strict_pattern_matches_substring() {
        let pattern = compile_pattern("hello {name}", &[]).unwrap();
        assert!(pattern.regex.is_match("well hello world indeed"));
    }
}
