//! A compiled pattern used as a single filter criterion.
//!
//! A [`Matcher`] wraps a regular expression together with an inversion flag,
//! an optional capture-group selector and an optional predicate. The result
//! of a match attempt is deliberately asymmetric:
//!
//! - non-inverted: `Some(MatchResult::Capture(..))` on success, `None` on failure;
//! - inverted: `Some(MatchResult::Unmatched)` when the pattern does *not* match,
//!   `None` when it does (the negative filter rejects the input).
//!
//! Callers therefore distinguish "the filter passed but there is no capture"
//! from "the filter failed".

use regex::{Captures, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::error::{CoreError, CoreResult};

/// Restricts a match to one capture group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupSelector {
    Number(usize),
    Name(String),
}

impl GroupSelector {
    /// Parses `"2"` as a group number and anything else as a group name.
    pub fn parse(value: &str) -> Self {
        match value.parse::<usize>() {
            Ok(n) => GroupSelector::Number(n),
            Err(_) => GroupSelector::Name(value.to_string()),
        }
    }
}

impl fmt::Display for GroupSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupSelector::Number(n) => write!(f, "{}", n),
            GroupSelector::Name(name) => f.write_str(name),
        }
    }
}

/// An accepted capture. Offsets are byte offsets into the matched input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub start: usize,
    pub end: usize,
    pub value: String,
}

impl Capture {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Outcome of a successful filter evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// The pattern matched and this capture was accepted.
    Capture(Capture),
    /// An inverted matcher passed because the pattern did not match.
    Unmatched,
}

impl MatchResult {
    pub fn capture(&self) -> Option<&Capture> {
        match self {
            MatchResult::Capture(capture) => Some(capture),
            MatchResult::Unmatched => None,
        }
    }
}

/// Options used to build a [`Matcher`] from pattern text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternOptions {
    pub ignore_case: bool,
    pub multiline: bool,
    /// Treat the pattern as literal text.
    pub literal: bool,
    /// Require word boundaries around the pattern.
    pub whole_word: bool,
    /// Anchor the pattern to the whole input.
    pub whole_input: bool,
}

type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Matcher {
    regex: Regex,
    invert: bool,
    group: Option<GroupSelector>,
    group_index: usize,
    predicate: Option<Predicate>,
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("pattern", &self.regex.as_str())
            .field("invert", &self.invert)
            .field("group", &self.group)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

impl Matcher {
    pub fn new(regex: Regex) -> Self {
        Self {
            regex,
            invert: false,
            group: None,
            group_index: 0,
            predicate: None,
        }
    }

    pub fn from_pattern(pattern: &str, options: &PatternOptions) -> CoreResult<Self> {
        let mut text = if options.literal {
            regex::escape(pattern)
        } else {
            pattern.to_string()
        };
        if options.whole_word {
            text = format!(r"\b(?:{})\b", text);
        }
        if options.whole_input {
            text = format!(r"\A(?:{})\z", text);
        }

        let regex = RegexBuilder::new(&text)
            .case_insensitive(options.ignore_case)
            .multi_line(options.multiline)
            .build()?;

        Ok(Self::new(regex))
    }

    pub fn inverted(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    /// Restricts accepted captures to `group`. Fails if the group does not exist.
    pub fn with_group(mut self, group: GroupSelector) -> CoreResult<Self> {
        let index = match &group {
            GroupSelector::Number(n) if *n < self.regex.captures_len() => *n,
            GroupSelector::Name(name) => self
                .regex
                .capture_names()
                .position(|n| n == Some(name.as_str()))
                .ok_or_else(|| CoreError::InvalidGroup(name.clone()))?,
            GroupSelector::Number(n) => return Err(CoreError::InvalidGroup(n.to_string())),
        };
        self.group_index = index;
        self.group = Some(group);
        Ok(self)
    }

    /// Adds a predicate a capture must satisfy to be accepted.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// `true` for inverted matchers, which express exclusion.
    pub fn is_negative(&self) -> bool {
        self.invert
    }

    pub fn group(&self) -> Option<&GroupSelector> {
        self.group.as_ref()
    }

    pub fn find(&self, input: &str) -> Option<MatchResult> {
        let accepted = self.accepted_captures(input).next().map(|(_, c)| c);
        match (accepted, self.invert) {
            (Some(capture), false) => Some(MatchResult::Capture(capture)),
            (None, false) => None,
            (Some(_), true) => None,
            (None, true) => Some(MatchResult::Unmatched),
        }
    }

    pub fn is_match(&self, input: &str) -> bool {
        self.find(input).is_some()
    }

    /// All accepted, non-overlapping captures of the underlying pattern,
    /// ignoring inversion.
    pub fn captures(&self, input: &str) -> Vec<Capture> {
        self.accepted_captures(input).map(|(_, c)| c).collect()
    }

    /// Accepted captures together with the full regex captures they came from.
    ///
    /// A match is skipped when the selected group did not participate or the
    /// predicate rejects the group's text.
    pub fn accepted_captures<'a>(
        &'a self,
        input: &'a str,
    ) -> impl Iterator<Item = (Captures<'a>, Capture)> + 'a {
        self.regex.captures_iter(input).filter_map(move |caps| {
            let m = caps.get(self.group_index)?;
            if let Some(predicate) = &self.predicate {
                if !predicate(m.as_str()) {
                    return None;
                }
            }
            let capture = Capture {
                start: m.start(),
                end: m.end(),
                value: m.as_str().to_string(),
            };
            Some((caps, capture))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn matcher(pattern: &str) -> Matcher {
        Matcher::from_pattern(pattern, &PatternOptions::default()).unwrap()
    }

    #[test]
    fn plain_match_returns_capture() {
        let result = matcher("o+").find("foo bar").unwrap();
        let capture = result.capture().unwrap();
        assert_eq!((capture.start, capture.end), (1, 3));
        assert_eq!(capture.value, "oo");
    }

    #[test]
    fn plain_failure_returns_none() {
        assert!(matcher("xyz").find("foo").is_none());
    }

    #[test]
    fn inverted_failure_is_an_empty_success() {
        let m = matcher("xyz").inverted(true);
        assert_eq!(m.find("foo"), Some(MatchResult::Unmatched));
        assert!(m.find("xyz").is_none());
    }

    #[test]
    fn group_selector_restricts_capture() {
        let m = matcher(r"(?<key>\w+)=(\d+)")
            .with_group(GroupSelector::Name("key".into()))
            .unwrap();
        let capture = m.find("a=1").unwrap().capture().cloned().unwrap();
        assert_eq!(capture.value, "a");

        let m = matcher(r"(\w+)=(\d+)")
            .with_group(GroupSelector::Number(2))
            .unwrap();
        assert_eq!(m.find("a=1").unwrap().capture().unwrap().value, "1");
    }

    #[test]
    fn unknown_group_fails_construction() {
        assert!(matches!(
            matcher(r"(\w+)").with_group(GroupSelector::Name("missing".into())),
            Err(CoreError::InvalidGroup(_))
        ));
        assert!(matches!(
            matcher(r"(\w+)").with_group(GroupSelector::Number(5)),
            Err(CoreError::InvalidGroup(_))
        ));
    }

    #[test]
    fn predicate_requeries_until_accepted() {
        let m = matcher(r"\d+").with_predicate(|s| s.len() > 2);
        let capture = m.find("1 22 333 4444").unwrap().capture().cloned().unwrap();
        assert_eq!(capture.value, "333");
        assert!(m.find("1 22").is_none());
    }

    #[test]
    fn pattern_options_are_applied() {
        let options = PatternOptions {
            ignore_case: true,
            literal: true,
            whole_word: true,
            ..Default::default()
        };
        let m = Matcher::from_pattern("a.b", &options).unwrap();
        assert!(m.is_match("x A.B y"));
        assert!(!m.is_match("aXb"));
        assert!(!m.is_match("ca.b"));

        let whole = PatternOptions {
            whole_input: true,
            ..Default::default()
        };
        let m = Matcher::from_pattern("abc", &whole).unwrap();
        assert!(m.is_match("abc"));
        assert!(!m.is_match("abcd"));
    }

    #[test]
    fn captures_lists_all_accepted_matches() {
        let values: Vec<_> = matcher(r"\d").captures("a1b2c3").into_iter().map(|c| c.value).collect();
        assert_eq!(values, ["1", "2", "3"]);
    }

    proptest! {
        #[test]
        fn inverted_result_is_present_iff_pattern_fails(
            pattern in "[ab]{1,3}",
            input in "[abc]{0,12}",
        ) {
            let plain = matcher(&pattern);
            let inverted = matcher(&pattern).inverted(true);
            prop_assert_eq!(inverted.find(&input).is_some(), plain.find(&input).is_none());
        }
    }
}
