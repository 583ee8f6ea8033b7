//! Tagged-line extraction shared by the planner and reflector grammars.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::error::ExploreError;

/// Line markers the reasoning service must emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Observation,
    Thought,
    Action,
    Summary,
    Decision,
    Documentation,
}

impl Tag {
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Observation => "Observation",
            Tag::Thought => "Thought",
            Tag::Action => "Action",
            Tag::Summary => "Summary",
            Tag::Decision => "Decision",
            Tag::Documentation => "Documentation",
        }
    }

    fn pattern(self) -> &'static Regex {
        static OBSERVATION: LazyLock<Regex> = LazyLock::new(|| tag_regex("Observation"));
        static THOUGHT: LazyLock<Regex> = LazyLock::new(|| tag_regex("Thought"));
        static ACTION: LazyLock<Regex> = LazyLock::new(|| tag_regex("Action"));
        static SUMMARY: LazyLock<Regex> = LazyLock::new(|| tag_regex("Summary"));
        static DECISION: LazyLock<Regex> = LazyLock::new(|| tag_regex("Decision"));
        static DOCUMENTATION: LazyLock<Regex> = LazyLock::new(|| tag_regex("Documentation"));
        match self {
            Tag::Observation => &OBSERVATION,
            Tag::Thought => &THOUGHT,
            Tag::Action => &ACTION,
            Tag::Summary => &SUMMARY,
            Tag::Decision => &DECISION,
            Tag::Documentation => &DOCUMENTATION,
        }
    }
}

fn tag_regex(tag: &str) -> Regex {
    Regex::new(&format!(r"(?m){tag}: (.*?)\r?$")).unwrap()
}

/// Why a structured reply could not be turned into a typed value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplyParseError {
    #[error("missing `{0}:` line")]
    MissingField(&'static str),
    #[error("undefined action `{0}`")]
    UndefinedAction(String),
    #[error("undefined decision `{0}`")]
    UndefinedDecision(String),
    #[error("invalid arguments for `{verb}`: {detail}")]
    InvalidArguments { verb: String, detail: String },
}

impl ReplyParseError {
    /// Attach the raw reply and lift into the session-fatal taxonomy.
    pub fn into_explore_error(self, raw: &str) -> ExploreError {
        match self {
            ReplyParseError::UndefinedAction(verb) => ExploreError::UndefinedAction(verb),
            ReplyParseError::UndefinedDecision(value) => ExploreError::UndefinedDecision(value),
            other => ExploreError::MalformedReply {
                reason: other.to_string(),
                raw: raw.to_string(),
            },
        }
    }
}

/// First `Tag: value` line in the reply, trimmed. Multiline values are not supported.
pub fn find_tag(content: &str, tag: Tag) -> Option<String> {
    tag.pattern()
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

pub fn require_tag(content: &str, tag: Tag) -> Result<String, ReplyParseError> {
    find_tag(content, tag).ok_or(ReplyParseError::MissingField(tag.as_str()))
}

/// Strip one pair of matching surrounding quotes, if present.
pub fn unquote(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return Some(&raw[1..raw.len() - 1]);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_match_wins() {
        let content = "Thought: one\nThought: two\n";
        assert_eq!(find_tag(content, Tag::Thought).as_deref(), Some("one"));
    }

    #[test]
    fn tolerates_crlf_line_endings() {
        let content = "Summary: opened menu\r\nAction: tap(1)\r\n";
        assert_eq!(find_tag(content, Tag::Summary).as_deref(), Some("opened menu"));
        assert_eq!(find_tag(content, Tag::Action).as_deref(), Some("tap(1)"));
    }

    #[test]
    fn marker_may_follow_other_text_on_the_line() {
        let content = "**Decision: BACK**";
        assert_eq!(find_tag(content, Tag::Decision).as_deref(), Some("BACK**"));
    }

    #[test]
    fn missing_field_is_typed() {
        assert_eq!(
            require_tag("nothing here", Tag::Action),
            Err(ReplyParseError::MissingField("Action"))
        );
    }

    #[test]
    fn unquote_requires_matching_pair() {
        assert_eq!(unquote("\"hello world\""), Some("hello world"));
        assert_eq!(unquote("'x'"), Some("x"));
        assert_eq!(unquote("\"x'"), None);
        assert_eq!(unquote("x"), None);
    }

    #[test]
    fn malformed_reply_keeps_raw_text() {
        let err = ReplyParseError::MissingField("Thought").into_explore_error("raw body");
        match err {
            ExploreError::MalformedReply { raw, .. } => assert_eq!(raw, "raw body"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
