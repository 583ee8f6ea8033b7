//! Exploration controller: the round-by-round observe/plan/act/reflect loop.
//!
//! Each round captures the screen and UI tree, asks the planner for one
//! action, performs it, captures the result, and asks the reflector whether
//! the action helped. The loop ends when the planner answers `FINISH`, when
//! the early-exit similarity check matches the reference image, when
//! `max_rounds` rounds have run, or on the first [`ExploreError`].
//!
//! Session-fatal errors end the session as [`SessionOutcome::Aborted`] and
//! still produce a summary. Plumbing errors (filesystem, templates) propagate
//! after a best-effort `Aborted` summary is written.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::agents::Exchange;
use crate::agents::planner::{self, Planner};
use crate::agents::reflector::{self, ReflectRequest, Reflector};
use crate::core::action::{Action, PlanMode};
use crate::core::extract::extract_candidates;
use crate::core::session::{CompletionSource, ExplorationSession, SessionOutcome, SessionReport};
use crate::error::{DeviceError, ExploreError};
use crate::io::action_executor::{ExecutorSettings, execute_action};
use crate::io::annotate::{AnnotateOptions, annotate_screenshot};
use crate::io::config::ExplorerConfig;
use crate::io::device::Device;
use crate::io::doc_store::{DocumentationStore, WriteOutcome};
use crate::io::layout::{SessionPaths, after_tag, before_tag, tree_tag};
use crate::io::prompt::PromptEngine;
use crate::io::reasoning::ReasoningService;
use crate::io::round_log::{ExploreLogEntry, ReflectLogEntry, append_jsonl, write_summary};
use crate::io::similarity::SimilarityScorer;

/// How the session decides it is done, chosen once at session start.
pub enum ExplorationMode {
    /// Only the planner's `FINISH` completes the task.
    Plain,
    /// Also complete when the latest screenshot matches `reference`.
    EarlyExit {
        reference: PathBuf,
        scorer: Box<dyn SimilarityScorer>,
    },
}

enum RoundEnd {
    Continue,
    Finished,
}

pub struct Explorer<'a, D: Device, R: ReasoningService> {
    device: &'a D,
    reasoning: &'a R,
    config: &'a ExplorerConfig,
    mode: ExplorationMode,
    prompts: PromptEngine,
}

impl<'a, D: Device, R: ReasoningService> Explorer<'a, D, R> {
    pub fn new(
        device: &'a D,
        reasoning: &'a R,
        config: &'a ExplorerConfig,
        mode: ExplorationMode,
    ) -> Result<Self> {
        Ok(Self {
            device,
            reasoning,
            config,
            mode,
            prompts: PromptEngine::new()?,
        })
    }

    /// Run one session for `task`, writing artifacts under `paths`.
    #[instrument(skip_all, fields(session = %paths.session_dir.display()))]
    pub fn run(&self, paths: &SessionPaths, task: &str) -> Result<SessionReport> {
        paths.create()?;
        let store = DocumentationStore::open(&paths.app.docs_dir)?;
        let mut session = ExplorationSession::new();
        info!(task, max_rounds = self.config.max_rounds, "exploration started");

        let outcome = match self.run_rounds(paths, &store, task, &mut session) {
            Ok(outcome) => outcome,
            Err(err) => match err.downcast_ref::<ExploreError>() {
                Some(fatal) => SessionOutcome::Aborted {
                    reason: fatal.to_string(),
                },
                None => {
                    let report = session_report(
                        paths,
                        &session,
                        SessionOutcome::Aborted {
                            reason: format!("{err:#}"),
                        },
                    );
                    if let Err(summary_err) = write_summary(&paths.summary_path, &report) {
                        warn!(error = %format!("{summary_err:#}"), "failed to write summary");
                    }
                    return Err(err);
                }
            },
        };

        match &outcome {
            SessionOutcome::TaskComplete { source } => {
                info!(rounds = session.round, docs = session.doc_count, ?source, "task completed");
            }
            SessionOutcome::MaxRoundsReached => {
                info!(rounds = session.round, docs = session.doc_count, "max rounds reached");
            }
            SessionOutcome::Aborted { reason } => {
                warn!(rounds = session.round, docs = session.doc_count, reason, "exploration aborted");
            }
        }

        let report = session_report(paths, &session, outcome);
        write_summary(&paths.summary_path, &report)?;
        Ok(report)
    }

    fn run_rounds(
        &self,
        paths: &SessionPaths,
        store: &DocumentationStore,
        task: &str,
        session: &mut ExplorationSession,
    ) -> Result<SessionOutcome> {
        loop {
            if session.rounds_exhausted(self.config.max_rounds) {
                return Ok(SessionOutcome::MaxRoundsReached);
            }
            if session.round > 0 && self.matches_reference(session) {
                return Ok(SessionOutcome::TaskComplete {
                    source: CompletionSource::Similarity,
                });
            }
            if let RoundEnd::Finished = self.run_round(paths, store, task, session)? {
                return Ok(SessionOutcome::TaskComplete {
                    source: CompletionSource::Planner,
                });
            }
        }
    }

    /// Early-exit check against the latest capture. Scorer errors skip the check.
    fn matches_reference(&self, session: &mut ExplorationSession) -> bool {
        let ExplorationMode::EarlyExit { reference, scorer } = &self.mode else {
            return false;
        };
        let Some(latest) = session.last_screenshot.clone() else {
            return false;
        };
        match scorer.score(reference, &latest) {
            Ok(score) => {
                session.similarity = Some(score);
                info!(
                    score,
                    threshold = self.config.similarity_threshold,
                    "similarity to reference"
                );
                score >= self.config.similarity_threshold
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "similarity check failed, skipping");
                false
            }
        }
    }

    #[instrument(skip_all, fields(round = session.round + 1))]
    fn run_round(
        &self,
        paths: &SessionPaths,
        store: &DocumentationStore,
        task: &str,
        session: &mut ExplorationSession,
    ) -> Result<RoundEnd> {
        let round = session.begin_round();
        let dir = paths.session_dir.as_path();

        let before_tag = before_tag(round);
        let before = self
            .device
            .capture_screenshot(&before_tag, dir)
            .map_err(ExploreError::from)?;
        session.last_screenshot = Some(before.clone());
        let tree_path = self
            .device
            .capture_ui_tree(&tree_tag(round), dir)
            .map_err(ExploreError::from)?;
        let xml = fs::read_to_string(&tree_path)
            .map_err(|err| capture_error("ui_tree", format!("read {}: {err}", tree_path.display())))?;
        let elements = extract_candidates(
            &xml,
            &session.blacklist,
            &self.config.extract_options(),
            round,
        )?;
        debug!(elements = elements.len(), "candidates extracted");

        let mode = session.plan_mode;
        let annotate = AnnotateOptions {
            dark_mode: self.config.dark_mode,
            grid: mode == PlanMode::Grid,
        };
        let labeled_before = paths.labeled_path(&before_tag);
        annotate_screenshot(&before, &labeled_before, &elements, annotate)
            .map_err(|err| capture_error("screenshot", format!("{err:#}")))?;

        let exchange = Planner::new(&self.prompts).ask(
            self.reasoning,
            mode,
            task,
            &session.last_action_summary,
            &labeled_before,
        )?;
        append_jsonl(
            &paths.explore_log_path,
            &ExploreLogEntry {
                round,
                prompt: exchange.prompt.clone(),
                image: file_name(&labeled_before),
                response: exchange.reply.raw.clone(),
                usage: exchange.reply.usage,
            },
        )?;
        session.usage.explore += exchange.reply.usage;

        let directive = planner::directive(&exchange, mode)?;
        info!(action = directive.action.verb(), target = ?directive.action.target(), "planned");
        session.record_plan(&directive.action, &directive.rationale);

        match directive.action {
            Action::Finish => return Ok(RoundEnd::Finished),
            Action::Grid => {
                info!("switching to grid mode");
                return Ok(RoundEnd::Continue);
            }
            _ => {}
        }

        let settings = ExecutorSettings {
            long_press_ms: self.config.long_press_ms,
            swipe_quick: self.config.swipe_quick,
        };
        let Some(executed) = execute_action(self.device, &directive.action, &elements, settings)?
        else {
            return Ok(RoundEnd::Continue);
        };
        self.pause();

        let Some(acted) = executed.reflection_target() else {
            debug!("text input is not reflected");
            return Ok(RoundEnd::Continue);
        };

        let after_tag = after_tag(round);
        let after = self
            .device
            .capture_screenshot(&after_tag, dir)
            .map_err(ExploreError::from)?;
        session.last_screenshot = Some(after.clone());
        let labeled_after = paths.labeled_path(&after_tag);
        annotate_screenshot(&after, &labeled_after, &elements, annotate)
            .map_err(|err| capture_error("screenshot", format!("{err:#}")))?;

        let exchange = Reflector::new(&self.prompts).ask(
            self.reasoning,
            &ReflectRequest {
                verb: executed.verb,
                element: acted.index,
                task,
                last_act: &session.last_action_summary,
                before: &labeled_before,
                after: &labeled_after,
            },
        )?;
        self.log_reflection(paths, round, &exchange, &labeled_before, &labeled_after)?;
        session.usage.reflect += exchange.reply.usage;

        let outcome = reflector::outcome(&exchange)?;
        info!(decision = %outcome.decision, element = %acted.element_id, "reflected");
        let effect = session.apply_reflection(&outcome, &acted.element_id, executed.verb);
        if effect.navigate_back {
            self.device.back().map_err(ExploreError::from)?;
        }
        if let Some(write) = effect.doc_write {
            match store.write_if_absent(&write.element_id, write.verb, &write.text)? {
                WriteOutcome::Stored => {
                    session.record_doc();
                    info!(element = %write.element_id, verb = %write.verb, "documentation added");
                }
                WriteOutcome::AlreadyDocumented => {
                    info!(element = %write.element_id, verb = %write.verb, "documentation exists, keeping first write");
                }
                WriteOutcome::Blank => debug!("blank documentation ignored"),
            }
        }
        self.pause();
        Ok(RoundEnd::Continue)
    }

    fn log_reflection(
        &self,
        paths: &SessionPaths,
        round: u32,
        exchange: &Exchange,
        before: &Path,
        after: &Path,
    ) -> Result<()> {
        append_jsonl(
            &paths.reflect_log_path,
            &ReflectLogEntry {
                round,
                prompt: exchange.prompt.clone(),
                image_before: file_name(before),
                image_after: file_name(after),
                response: exchange.reply.raw.clone(),
                usage: exchange.reply.usage,
            },
        )
    }

    fn pause(&self) {
        if self.config.request_interval_secs > 0 {
            thread::sleep(Duration::from_secs(self.config.request_interval_secs));
        }
    }
}

fn session_report(
    paths: &SessionPaths,
    session: &ExplorationSession,
    outcome: SessionOutcome,
) -> SessionReport {
    SessionReport {
        outcome,
        rounds: session.round,
        doc_count: session.doc_count,
        usage: session.usage,
        similarity: session.similarity,
        session_dir: paths.session_dir.clone(),
    }
}

/// A pulled capture that cannot be read or decoded is a device failure.
fn capture_error(command: &str, detail: String) -> ExploreError {
    ExploreError::Device(DeviceError::new(command, detail))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
