//! Computing replacement text for accepted captures.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use regex::Captures;
use serde::{Deserialize, Serialize};

use super::matcher::{Capture, Matcher};

bitflags! {
    /// Post-processing applied to each computed replacement.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct ReplaceFunctions: u8 {
        const TRIM = 1;
        const TRIM_START = 1 << 1;
        const TRIM_END = 1 << 2;
        const TO_LOWER = 1 << 3;
        const TO_UPPER = 1 << 4;
    }
}

impl ReplaceFunctions {
    pub fn apply(self, value: String) -> String {
        let mut value = if self.contains(ReplaceFunctions::TRIM) {
            value.trim().to_string()
        } else {
            match (
                self.contains(ReplaceFunctions::TRIM_START),
                self.contains(ReplaceFunctions::TRIM_END),
            ) {
                (true, true) => value.trim().to_string(),
                (true, false) => value.trim_start().to_string(),
                (false, true) => value.trim_end().to_string(),
                (false, false) => value,
            }
        };
        if self.contains(ReplaceFunctions::TO_LOWER) {
            value = value.to_lowercase();
        } else if self.contains(ReplaceFunctions::TO_UPPER) {
            value = value.to_uppercase();
        }
        value
    }

    pub fn parse_list(input: &str) -> Result<Self, String> {
        input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .try_fold(ReplaceFunctions::empty(), |acc, name| {
                let flag = match name.to_ascii_lowercase().as_str() {
                    "trim" => ReplaceFunctions::TRIM,
                    "trim-start" => ReplaceFunctions::TRIM_START,
                    "trim-end" => ReplaceFunctions::TRIM_END,
                    "to-lower" | "lower" => ReplaceFunctions::TO_LOWER,
                    "to-upper" | "upper" => ReplaceFunctions::TO_UPPER,
                    other => return Err(format!("unknown replace function '{}'", other)),
                };
                Ok(acc | flag)
            })
    }
}

/// How the text of a capture is turned into its replacement.
#[derive(Clone)]
pub enum Replacement {
    /// Expands `$1`, `${name}` and `$$` against the captures of the match.
    Pattern(String),
    Literal(String),
    Function(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Replacement::Pattern(p) => f.debug_tuple("Pattern").field(p).finish(),
            Replacement::Literal(l) => f.debug_tuple("Literal").field(l).finish(),
            Replacement::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Result of replacing the captures of one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replaced {
    pub text: String,
    /// Number of captures that were replaced.
    pub count: usize,
}

impl Replaced {
    pub fn is_unchanged(&self, original: &str) -> bool {
        self.count == 0 || self.text == original
    }
}

#[derive(Debug, Clone)]
pub struct Replacer {
    replacement: Replacement,
    functions: ReplaceFunctions,
    max_count: Option<usize>,
}

impl Replacer {
    pub fn new(replacement: Replacement) -> Self {
        Self {
            replacement,
            functions: ReplaceFunctions::empty(),
            max_count: None,
        }
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::new(Replacement::Pattern(pattern.into()))
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Self::new(Replacement::Literal(text.into()))
    }

    pub fn function<F>(function: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self::new(Replacement::Function(Arc::new(function)))
    }

    pub fn with_functions(mut self, functions: ReplaceFunctions) -> Self {
        self.functions = functions;
        self
    }

    /// Replaces at most `max_count` captures per input.
    pub fn with_max_count(mut self, max_count: Option<usize>) -> Self {
        self.max_count = max_count.filter(|&n| n > 0);
        self
    }

    pub fn replacement(&self) -> &Replacement {
        &self.replacement
    }

    /// Replacement text for one accepted capture.
    pub fn evaluate(&self, captures: &Captures<'_>, capture: &Capture) -> String {
        let value = match &self.replacement {
            Replacement::Pattern(pattern) => {
                let mut expanded = String::new();
                captures.expand(pattern, &mut expanded);
                expanded
            }
            Replacement::Literal(text) => text.clone(),
            Replacement::Function(function) => function(&capture.value),
        };
        self.functions.apply(value)
    }

    /// Rewrites `input`: untouched spans are copied verbatim and every
    /// accepted capture of `matcher` is substituted.
    pub fn replace(&self, matcher: &Matcher, input: &str) -> Replaced {
        let limit = self.max_count.unwrap_or(usize::MAX);
        let mut text = String::with_capacity(input.len());
        let mut last = 0;
        let mut count = 0;

        for (captures, capture) in matcher.accepted_captures(input).take(limit) {
            text.push_str(&input[last..capture.start]);
            text.push_str(&self.evaluate(&captures, &capture));
            last = capture.end;
            count += 1;
        }
        text.push_str(&input[last..]);

        Replaced { text, count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::matcher::{GroupSelector, PatternOptions};

    fn matcher(pattern: &str) -> Matcher {
        Matcher::from_pattern(pattern, &PatternOptions::default()).unwrap()
    }

    #[test]
    fn test_pattern_expands_groups() {
        let replacer = Replacer::pattern("${y}-$1");
        let result = replacer.replace(&matcher(r"(\d\d)\.(?P<y>\d{4})"), "due 03.2024, paid 04.2025");
        assert_eq!(result.text, "due 2024-03, paid 2025-04");
        assert_eq!(result.count, 2);
    }

    #[test]
    fn test_literal_is_not_expanded() {
        let result = Replacer::literal("$1").replace(&matcher("(a)"), "cat");
        assert_eq!(result.text, "c$1t");
    }

    #[test]
    fn test_only_selected_group_is_replaced() {
        let m = matcher(r"v(\d+)").with_group(GroupSelector::Number(1)).unwrap();
        let result = Replacer::literal("2").replace(&m, "v1 and v7");
        assert_eq!(result.text, "v2 and v2");
    }

    #[test]
    fn test_function_with_post_processing() {
        let replacer = Replacer::function(|s| format!(" {} ", s)).with_functions(ReplaceFunctions::TRIM | ReplaceFunctions::TO_UPPER);
        let result = replacer.replace(&matcher("b+"), "abbc");
        assert_eq!(result.text, "aBBc");
    }

    #[test]
    fn test_max_count_limits_replacements() {
        let result = Replacer::literal("x").with_max_count(Some(1)).replace(&matcher("a"), "aaa");
        assert_eq!(result, Replaced { text: "xaa".into(), count: 1 });
    }

    #[test]
    fn test_no_match_is_unchanged() {
        let result = Replacer::literal("x").replace(&matcher("z"), "abc");
        assert!(result.is_unchanged("abc"));
        assert_eq!(ReplaceFunctions::parse_list("trim, to-lower"), Ok(ReplaceFunctions::TRIM | ReplaceFunctions::TO_LOWER));
    }
}
