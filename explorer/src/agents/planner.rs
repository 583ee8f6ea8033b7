//! Planner agent: asks for the next action on the labelled screenshot.

use std::path::Path;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::core::action::{ActionDirective, PlanMode, parse_action_reply};
use crate::error::ExploreError;
use crate::io::prompt::PromptEngine;
use crate::io::reasoning::ReasoningService;

use super::{Exchange, invoke};

pub struct Planner<'a> {
    prompts: &'a PromptEngine,
}

impl<'a> Planner<'a> {
    pub fn new(prompts: &'a PromptEngine) -> Self {
        Self { prompts }
    }

    #[instrument(skip_all, fields(mode = ?mode))]
    pub fn ask<R: ReasoningService + ?Sized>(
        &self,
        reasoning: &R,
        mode: PlanMode,
        task: &str,
        last_act: &str,
        labeled_screenshot: &Path,
    ) -> Result<Exchange> {
        let prompt = self.prompts.render_explore(mode, task, last_act)?;
        debug!(prompt_bytes = prompt.len(), "planner prompt rendered");
        invoke(reasoning, prompt, &[labeled_screenshot])
    }
}

/// Parse the planner's reply under the grammar of `mode`.
pub fn directive(exchange: &Exchange, mode: PlanMode) -> Result<ActionDirective, ExploreError> {
    parse_action_reply(&exchange.reply.content, mode)
        .map_err(|err| err.into_explore_error(&exchange.reply.content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::Action;
    use crate::test_support::ScriptedReasoning;

    const REPLY: &str = "Observation: a settings list\nThought: open display\nAction: tap(3)\nSummary: opened display settings\n";

    #[test]
    fn ask_sends_prompt_with_one_image() {
        let prompts = PromptEngine::new().expect("prompts");
        let reasoning = ScriptedReasoning::new([REPLY]);
        let exchange = Planner::new(&prompts)
            .ask(&reasoning, PlanMode::Elements, "turn on dark mode", "None", Path::new("1_before_labeled.png"))
            .expect("ask");

        let requests = reasoning.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].images, vec![Path::new("1_before_labeled.png").to_path_buf()]);
        assert!(exchange.prompt.contains("turn on dark mode"));

        let directive = directive(&exchange, PlanMode::Elements).expect("directive");
        assert_eq!(directive.action, Action::Tap { target: 3 });
        assert_eq!(directive.rationale, "opened display settings");
    }

    #[test]
    fn malformed_reply_keeps_raw_content() {
        let prompts = PromptEngine::new().expect("prompts");
        let reasoning = ScriptedReasoning::new(["Thought: no observation\nAction: tap(1)\n"]);
        let exchange = Planner::new(&prompts)
            .ask(&reasoning, PlanMode::Elements, "t", "None", Path::new("a.png"))
            .expect("ask");
        match directive(&exchange, PlanMode::Elements).unwrap_err() {
            ExploreError::MalformedReply { raw, .. } => assert!(raw.contains("no observation")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn service_error_is_fatal_reasoning_error() {
        let prompts = PromptEngine::new().expect("prompts");
        let reasoning = ScriptedReasoning::failing("quota exceeded");
        let err = Planner::new(&prompts)
            .ask(&reasoning, PlanMode::Grid, "t", "None", Path::new("a.png"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExploreError>(),
            Some(ExploreError::Reasoning(inner)) if inner.message == "quota exceeded"
        ));
    }
}
