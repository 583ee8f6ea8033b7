//! Reflector reply grammar.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::reply::{ReplyParseError, Tag, find_tag, require_tag, unquote};

/// Judgement about the action just performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Nothing changed on screen.
    Ineffective,
    /// Something changed but it leads away from the task; navigate back.
    Back,
    /// Something changed but the task cannot progress from here.
    Continue,
    /// The action moved the task forward.
    Success,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Ineffective => "ineffective",
            Decision::Back => "back",
            Decision::Continue => "continue",
            Decision::Success => "success",
        }
    }

    pub fn expects_documentation(self) -> bool {
        !matches!(self, Decision::Ineffective)
    }

    pub fn blacklists(self) -> bool {
        !matches!(self, Decision::Success)
    }

    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let raw = unquote(raw).unwrap_or(raw).trim();
        [
            Decision::Ineffective,
            Decision::Back,
            Decision::Continue,
            Decision::Success,
        ]
        .into_iter()
        .find(|decision| decision.as_str().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflectionOutcome {
    pub decision: Decision,
    pub thought: String,
    /// Present for every decision except `ineffective`.
    pub documentation: Option<String>,
}

pub fn parse_reflection_reply(content: &str) -> Result<ReflectionOutcome, ReplyParseError> {
    let raw_decision = require_tag(content, Tag::Decision)?;
    let thought = require_tag(content, Tag::Thought)?;
    let decision = Decision::parse(&raw_decision)
        .ok_or_else(|| ReplyParseError::UndefinedDecision(raw_decision.clone()))?;

    let documentation = if decision.expects_documentation() {
        let raw = find_tag(content, Tag::Documentation)
            .ok_or(ReplyParseError::MissingField(Tag::Documentation.as_str()))?;
        Some(unquote(&raw).unwrap_or(&raw).to_string())
    } else {
        None
    };

    Ok(ReflectionOutcome {
        decision,
        thought,
        documentation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ineffective_needs_no_documentation() {
        let outcome =
            parse_reflection_reply("Decision: INEFFECTIVE\nThought: nothing changed\n").expect("parse");
        assert_eq!(outcome.decision, Decision::Ineffective);
        assert_eq!(outcome.documentation, None);
    }

    #[test]
    fn success_strips_documentation_quotes() {
        let outcome = parse_reflection_reply(
            "Decision: SUCCESS\nThought: the drawer opened\nDocumentation: \"opens the side drawer\"\n",
        )
        .expect("parse");
        assert_eq!(outcome.decision, Decision::Success);
        assert_eq!(outcome.documentation.as_deref(), Some("opens the side drawer"));
    }

    #[test]
    fn decisions_are_case_insensitive() {
        let outcome = parse_reflection_reply(
            "Decision: Back\nThought: wrong page\nDocumentation: opens settings\n",
        )
        .expect("parse");
        assert_eq!(outcome.decision, Decision::Back);
        assert_eq!(outcome.documentation.as_deref(), Some("opens settings"));
    }

    #[test]
    fn continue_without_documentation_is_missing_field() {
        let err = parse_reflection_reply("Decision: CONTINUE\nThought: hmm\n").unwrap_err();
        assert_eq!(err, ReplyParseError::MissingField("Documentation"));
    }

    #[test]
    fn unknown_decision_is_undefined() {
        let err = parse_reflection_reply("Decision: MAYBE\nThought: unsure\n").unwrap_err();
        assert_eq!(err, ReplyParseError::UndefinedDecision("MAYBE".to_string()));
    }

    #[test]
    fn missing_thought_is_missing_field() {
        let err = parse_reflection_reply("Decision: SUCCESS\n").unwrap_err();
        assert_eq!(err, ReplyParseError::MissingField("Thought"));
    }

    #[test]
    fn only_success_keeps_element_available() {
        assert!(Decision::Ineffective.blacklists());
        assert!(Decision::Back.blacklists());
        assert!(Decision::Continue.blacklists());
        assert!(!Decision::Success.blacklists());
    }
}
