//! Prompt rendering for the planner and the reflector.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::core::action::{DocVerb, PlanMode};

const EXPLORE_TEMPLATE: &str = include_str!("prompts/explore.md");
const EXPLORE_GRID_TEMPLATE: &str = include_str!("prompts/explore_grid.md");
const REFLECT_TEMPLATE: &str = include_str!("prompts/reflect.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("explore", EXPLORE_TEMPLATE)
            .context("explore template")?;
        env.add_template("explore_grid", EXPLORE_GRID_TEMPLATE)
            .context("explore_grid template")?;
        env.add_template("reflect", REFLECT_TEMPLATE)
            .context("reflect template")?;
        Ok(Self { env })
    }

    /// Planner prompt for the current plan mode.
    pub fn render_explore(&self, mode: PlanMode, task: &str, last_act: &str) -> Result<String> {
        let name = match mode {
            PlanMode::Elements => "explore",
            PlanMode::Grid => "explore_grid",
        };
        let template = self.env.get_template(name)?;
        let rendered = template.render(context! {
            task => task.trim(),
            last_act => last_act.trim(),
        })?;
        Ok(rendered)
    }

    /// Reflector prompt comparing the before/after screenshots of one action.
    pub fn render_reflect(
        &self,
        verb: DocVerb,
        element: usize,
        task: &str,
        last_act: &str,
    ) -> Result<String> {
        let template = self.env.get_template("reflect")?;
        let rendered = template.render(context! {
            action => verb.gerund(),
            element => element,
            task => task.trim(),
            last_act => last_act.trim(),
        })?;
        Ok(rendered)
    }
}
