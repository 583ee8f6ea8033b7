//! In-memory state of one exploration session.
//!
//! The controller owns an [`ExplorationSession`] for the lifetime of the loop
//! and passes it by `&mut` into each step. Nothing here touches the device,
//! the reasoning service, or the filesystem: state transitions return the
//! side effects the caller must perform.

use std::collections::BTreeSet;
use std::ops::AddAssign;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::action::{Action, DocVerb, PlanMode};
use crate::core::reflection::{Decision, ReflectionOutcome};
use crate::exit_codes;

/// Rationale value meaning "no useful previous action".
pub const NO_PREVIOUS_ACTION: &str = "None";

/// Token counts reported by the reasoning service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
        self.total_tokens += rhs.total_tokens;
    }
}

/// Token totals split by which agent spent them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub explore: TokenUsage,
    pub reflect: TokenUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionSource {
    /// The planner answered `FINISH`.
    Planner,
    /// The latest screenshot matched the reference image.
    Similarity,
}

/// Terminal state of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionOutcome {
    TaskComplete { source: CompletionSource },
    MaxRoundsReached,
    Aborted { reason: String },
}

impl SessionOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionOutcome::TaskComplete { .. } => exit_codes::OK,
            SessionOutcome::MaxRoundsReached => exit_codes::MAX_ROUNDS,
            SessionOutcome::Aborted { .. } => exit_codes::ABORTED,
        }
    }
}

/// A documentation write requested by a reflection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocWrite {
    pub element_id: String,
    pub verb: DocVerb,
    pub text: String,
}

/// Side effects the controller performs after [`ExplorationSession::apply_reflection`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReflectionEffect {
    /// Issue `Device::back()` before writing documentation.
    pub navigate_back: bool,
    pub doc_write: Option<DocWrite>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplorationSession {
    pub round: u32,
    /// Element ids excluded from future candidate lists.
    pub blacklist: BTreeSet<String>,
    pub last_action_summary: String,
    pub doc_count: u32,
    pub plan_mode: PlanMode,
    /// Last early-exit similarity score, if one was computed.
    pub similarity: Option<f64>,
    /// Screenshot the next early-exit check compares against.
    pub last_screenshot: Option<PathBuf>,
    pub usage: UsageTotals,
}

impl Default for ExplorationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ExplorationSession {
    pub fn new() -> Self {
        Self {
            round: 0,
            blacklist: BTreeSet::new(),
            last_action_summary: NO_PREVIOUS_ACTION.to_string(),
            doc_count: 0,
            plan_mode: PlanMode::Elements,
            similarity: None,
            last_screenshot: None,
            usage: UsageTotals::default(),
        }
    }

    /// Advance to the next round and return its 1-based number.
    pub fn begin_round(&mut self) -> u32 {
        self.round += 1;
        self.round
    }

    pub fn rounds_exhausted(&self, max_rounds: u32) -> bool {
        self.round >= max_rounds
    }

    /// Record the planner's choice: carry its rationale forward and update the plan mode.
    pub fn record_plan(&mut self, action: &Action, rationale: &str) {
        self.last_action_summary = rationale.to_string();
        self.plan_mode = match action {
            Action::Grid => PlanMode::Grid,
            Action::TapGrid { .. } | Action::LongPressGrid { .. } | Action::SwipeGrid { .. } => {
                PlanMode::Elements
            }
            _ => self.plan_mode,
        };
    }

    /// Fold a reflection into the session and return the effects to perform.
    pub fn apply_reflection(
        &mut self,
        outcome: &ReflectionOutcome,
        element_id: &str,
        verb: DocVerb,
    ) -> ReflectionEffect {
        if outcome.decision.blacklists() {
            self.blacklist.insert(element_id.to_string());
            self.last_action_summary = NO_PREVIOUS_ACTION.to_string();
        }
        let doc_write = outcome
            .documentation
            .as_ref()
            .filter(|_| outcome.decision.expects_documentation())
            .map(|text| DocWrite {
                element_id: element_id.to_string(),
                verb,
                text: text.clone(),
            });
        ReflectionEffect {
            navigate_back: outcome.decision == Decision::Back,
            doc_write,
        }
    }

    /// Count a documentation write that actually landed in the store.
    pub fn record_doc(&mut self) {
        self.doc_count += 1;
    }
}

/// Final report for a session, persisted as `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub rounds: u32,
    pub doc_count: u32,
    pub usage: UsageTotals,
    pub similarity: Option<f64>,
    pub session_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(decision: Decision, documentation: Option<&str>) -> ReflectionOutcome {
        ReflectionOutcome {
            decision,
            thought: "t".to_string(),
            documentation: documentation.map(str::to_string),
        }
    }

    fn session_with_rationale() -> ExplorationSession {
        let mut session = ExplorationSession::new();
        session.record_plan(&Action::Tap { target: 1 }, "opened menu");
        session
    }

    #[test]
    fn new_session_starts_neutral() {
        let session = ExplorationSession::new();
        assert_eq!(session.round, 0);
        assert_eq!(session.last_action_summary, "None");
        assert_eq!(session.plan_mode, PlanMode::Elements);
    }

    #[test]
    fn ineffective_blacklists_without_documentation() {
        let mut session = session_with_rationale();
        let effect =
            session.apply_reflection(&outcome(Decision::Ineffective, None), "app.id_btn", DocVerb::Tap);
        assert!(session.blacklist.contains("app.id_btn"));
        assert_eq!(session.last_action_summary, "None");
        assert_eq!(effect, ReflectionEffect::default());
    }

    #[test]
    fn back_blacklists_navigates_and_documents() {
        let mut session = session_with_rationale();
        let effect = session.apply_reflection(
            &outcome(Decision::Back, Some("opens settings")),
            "app.id_gear",
            DocVerb::Tap,
        );
        assert!(session.blacklist.contains("app.id_gear"));
        assert_eq!(session.last_action_summary, "None");
        assert!(effect.navigate_back);
        assert_eq!(
            effect.doc_write,
            Some(DocWrite {
                element_id: "app.id_gear".to_string(),
                verb: DocVerb::Tap,
                text: "opens settings".to_string(),
            })
        );
    }

    #[test]
    fn continue_blacklists_without_navigating() {
        let mut session = session_with_rationale();
        let effect = session.apply_reflection(
            &outcome(Decision::Continue, Some("scrolls the list")),
            "app.id_list",
            DocVerb::VSwipe,
        );
        assert!(session.blacklist.contains("app.id_list"));
        assert!(!effect.navigate_back);
        assert!(effect.doc_write.is_some());
    }

    #[test]
    fn success_keeps_rationale_and_element() {
        let mut session = session_with_rationale();
        let effect = session.apply_reflection(
            &outcome(Decision::Success, Some("opens the side drawer")),
            "app.id_nav",
            DocVerb::Tap,
        );
        assert!(session.blacklist.is_empty());
        assert_eq!(session.last_action_summary, "opened menu");
        assert!(!effect.navigate_back);
        assert_eq!(effect.doc_write.map(|w| w.text).as_deref(), Some("opens the side drawer"));
    }

    #[test]
    fn grid_switch_reverts_after_grid_action() {
        let mut session = ExplorationSession::new();
        session.record_plan(&Action::Grid, "need finer control");
        assert_eq!(session.plan_mode, PlanMode::Grid);
        session.record_plan(
            &Action::TapGrid {
                target: 2,
                region: crate::core::grid::SubRegion::Center,
            },
            "tapped",
        );
        assert_eq!(session.plan_mode, PlanMode::Elements);
    }

    #[test]
    fn rounds_exhausted_at_bound() {
        let mut session = ExplorationSession::new();
        for _ in 0..3 {
            assert!(!session.rounds_exhausted(3));
            session.begin_round();
        }
        assert!(session.rounds_exhausted(3));
    }

    #[test]
    fn outcome_exit_codes_are_distinct() {
        assert_eq!(
            SessionOutcome::TaskComplete {
                source: CompletionSource::Planner
            }
            .exit_code(),
            0
        );
        assert_eq!(SessionOutcome::MaxRoundsReached.exit_code(), 2);
        assert_eq!(
            SessionOutcome::Aborted {
                reason: "x".to_string()
            }
            .exit_code(),
            3
        );
    }
}
