//! Reflector agent: compares before/after screenshots of one action.

use std::path::Path;

use anyhow::Result;
use tracing::instrument;

use crate::core::action::DocVerb;
use crate::core::reflection::{ReflectionOutcome, parse_reflection_reply};
use crate::error::ExploreError;
use crate::io::prompt::PromptEngine;
use crate::io::reasoning::ReasoningService;

use super::{Exchange, invoke};

/// What was done, and where, for the reflection prompt.
#[derive(Debug, Clone, Copy)]
pub struct ReflectRequest<'p> {
    pub verb: DocVerb,
    /// 1-based label of the acted element.
    pub element: usize,
    pub task: &'p str,
    pub last_act: &'p str,
    pub before: &'p Path,
    pub after: &'p Path,
}

pub struct Reflector<'a> {
    prompts: &'a PromptEngine,
}

impl<'a> Reflector<'a> {
    pub fn new(prompts: &'a PromptEngine) -> Self {
        Self { prompts }
    }

    #[instrument(skip_all, fields(verb = %request.verb, element = request.element))]
    pub fn ask<R: ReasoningService + ?Sized>(
        &self,
        reasoning: &R,
        request: &ReflectRequest<'_>,
    ) -> Result<Exchange> {
        let prompt = self.prompts.render_reflect(
            request.verb,
            request.element,
            request.task,
            request.last_act,
        )?;
        invoke(reasoning, prompt, &[request.before, request.after])
    }
}

pub fn outcome(exchange: &Exchange) -> Result<ReflectionOutcome, ExploreError> {
    parse_reflection_reply(&exchange.reply.content)
        .map_err(|err| err.into_explore_error(&exchange.reply.content))
}
