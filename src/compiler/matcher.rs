//! Regular expressions recognising `@keyword(...)` directives
//!
//! Both forms capture the leading whitespace as group 1 so replacements can
//! keep the template's layout. The argument list is matched greedily up to
//! the last `)` on the line rather than by balancing parentheses, so a
//! directive followed by more parenthesised text on the same line swallows
//! that text too.

use regex::Regex;

/// Pattern text for the closed form: group 2 is `(args)` including both parentheses
pub fn closed_pattern(keyword: &str) -> String {
    format!(r"(\s*)@{}(\s*\(.*\))", regex::escape(keyword))
}

/// Pattern text for the open form: group 2 is `(args` without the closing parenthesis
pub fn open_pattern(keyword: &str) -> String {
    format!(r"(\s*)@{}(\s*\(.*)\)", regex::escape(keyword))
}

pub fn closed_matcher(keyword: &str) -> Regex {
    Regex::new(&closed_pattern(keyword)).expect("escaped directive keyword forms a valid pattern")
}

/// The open form lets a replacement append arguments before the final `)`
pub fn open_matcher(keyword: &str) -> Regex {
    Regex::new(&open_pattern(keyword)).expect("escaped directive keyword forms a valid pattern")
}
