//! Reasoning-backed agents: the planner picks an action, the reflector judges it.
//!
//! Each agent renders its prompt, invokes the [`ReasoningService`], and hands
//! back the raw [`Exchange`] so the controller can log it before the reply is
//! parsed. Parsing is a separate step because a malformed reply is still an
//! exchange worth persisting.

use std::path::Path;

use anyhow::Result;

use crate::error::ExploreError;
use crate::io::reasoning::{ReasoningReply, ReasoningService};

pub mod planner;
pub mod reflector;

/// One prompt and the service's reply to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub prompt: String,
    pub reply: ReasoningReply,
}

fn invoke<R: ReasoningService + ?Sized>(
    reasoning: &R,
    prompt: String,
    images: &[&Path],
) -> Result<Exchange> {
    let reply = reasoning
        .invoke(&prompt, images)
        .map_err(ExploreError::from)?;
    Ok(Exchange { prompt, reply })
}
