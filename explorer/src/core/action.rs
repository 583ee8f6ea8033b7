//! Typed action directives and the planner reply grammar.
//!
//! Grammar (one `Action:` line per reply):
//!
//! - element mode: `tap(N)`, `long_press(N)`, `text("S")`, `swipe(N, DIR, DIST)`, `grid()`
//! - grid mode: `tap(N, "R")`, `long_press(N, "R")`, `swipe(N1, "R1", N2, "R2")`, `grid()`
//! - any `Action:` containing `FINISH` completes the task.
//!
//! `N` is a 1-based index into the round's element list and `R` a [`SubRegion`] label.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::grid::SubRegion;
use crate::core::reply::{ReplyParseError, Tag, require_tag, unquote};

const FINISH_MARKER: &str = "FINISH";

/// Which grammar the planner is currently speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    #[default]
    Elements,
    Grid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl SwipeDirection {
    pub fn is_vertical(self) -> bool {
        matches!(self, SwipeDirection::Up | SwipeDirection::Down)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SwipeDirection::Up => "up",
            SwipeDirection::Down => "down",
            SwipeDirection::Left => "left",
            SwipeDirection::Right => "right",
        }
    }
}

impl FromStr for SwipeDirection {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "up" => Ok(SwipeDirection::Up),
            "down" => Ok(SwipeDirection::Down),
            "left" => Ok(SwipeDirection::Left),
            "right" => Ok(SwipeDirection::Right),
            other => Err(format!("unknown swipe direction `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDistance {
    Long,
    Medium,
    Short,
}

impl SwipeDistance {
    fn units(self) -> i32 {
        match self {
            SwipeDistance::Long => 3,
            SwipeDistance::Medium => 2,
            SwipeDistance::Short => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SwipeDistance::Long => "long",
            SwipeDistance::Medium => "medium",
            SwipeDistance::Short => "short",
        }
    }
}

impl FromStr for SwipeDistance {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "long" => Ok(SwipeDistance::Long),
            "medium" => Ok(SwipeDistance::Medium),
            "short" => Ok(SwipeDistance::Short),
            other => Err(format!("unknown swipe distance `{other}`")),
        }
    }
}

/// Offset of a directional swipe on a screen `width` pixels wide.
///
/// One unit is a tenth of the width; vertical swipes travel twice as far.
pub fn swipe_vector(width: u32, direction: SwipeDirection, distance: SwipeDistance) -> (i32, i32) {
    let unit = i32::try_from(width / 10).unwrap_or(i32::MAX / 8) * distance.units();
    match direction {
        SwipeDirection::Up => (0, -2 * unit),
        SwipeDirection::Down => (0, 2 * unit),
        SwipeDirection::Left => (-unit, 0),
        SwipeDirection::Right => (unit, 0),
    }
}

/// One interaction chosen by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verb", rename_all = "snake_case")]
pub enum Action {
    Tap {
        target: usize,
    },
    Text {
        input: String,
    },
    LongPress {
        target: usize,
    },
    Swipe {
        target: usize,
        direction: SwipeDirection,
        distance: SwipeDistance,
    },
    Grid,
    TapGrid {
        target: usize,
        region: SubRegion,
    },
    LongPressGrid {
        target: usize,
        region: SubRegion,
    },
    SwipeGrid {
        start: usize,
        start_region: SubRegion,
        end: usize,
        end_region: SubRegion,
    },
    Finish,
}

impl Action {
    pub fn verb(&self) -> &'static str {
        match self {
            Action::Tap { .. } => "tap",
            Action::Text { .. } => "text",
            Action::LongPress { .. } => "long_press",
            Action::Swipe { .. } => "swipe",
            Action::Grid => "grid",
            Action::TapGrid { .. } => "tap_grid",
            Action::LongPressGrid { .. } => "long_press_grid",
            Action::SwipeGrid { .. } => "swipe_grid",
            Action::Finish => "finish",
        }
    }

    /// Element index the action acts on, if any.
    pub fn target(&self) -> Option<usize> {
        match self {
            Action::Tap { target }
            | Action::LongPress { target }
            | Action::Swipe { target, .. }
            | Action::TapGrid { target, .. }
            | Action::LongPressGrid { target, .. } => Some(*target),
            Action::SwipeGrid { start, .. } => Some(*start),
            Action::Text { .. } | Action::Grid | Action::Finish => None,
        }
    }
}

/// Documentation slot an executed action writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocVerb {
    Tap,
    Text,
    VSwipe,
    HSwipe,
    LongPress,
}

impl DocVerb {
    pub const ALL: [DocVerb; 5] = [
        DocVerb::Tap,
        DocVerb::Text,
        DocVerb::VSwipe,
        DocVerb::HSwipe,
        DocVerb::LongPress,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DocVerb::Tap => "tap",
            DocVerb::Text => "text",
            DocVerb::VSwipe => "v_swipe",
            DocVerb::HSwipe => "h_swipe",
            DocVerb::LongPress => "long_press",
        }
    }

    /// Gerund used in the reflection prompt.
    pub fn gerund(self) -> &'static str {
        match self {
            // Text input is never reflected.
            DocVerb::Tap | DocVerb::Text => "tapping",
            DocVerb::VSwipe | DocVerb::HSwipe => "swiping",
            DocVerb::LongPress => "long pressing",
        }
    }

    pub fn for_swipe(direction: SwipeDirection) -> Self {
        if direction.is_vertical() {
            DocVerb::VSwipe
        } else {
            DocVerb::HSwipe
        }
    }
}

impl fmt::Display for DocVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed planner reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDirective {
    pub action: Action,
    pub observation: String,
    pub thought: String,
    /// `Summary:` line, fed into the next round's prompt.
    pub rationale: String,
}

/// Parse the four tagged lines and the action grammar for `mode`.
pub fn parse_action_reply(content: &str, mode: PlanMode) -> Result<ActionDirective, ReplyParseError> {
    let observation = require_tag(content, Tag::Observation)?;
    let thought = require_tag(content, Tag::Thought)?;
    let raw_action = require_tag(content, Tag::Action)?;
    let rationale = require_tag(content, Tag::Summary)?;

    let action = if raw_action.contains(FINISH_MARKER) {
        Action::Finish
    } else {
        parse_action(&raw_action, mode)?
    };

    Ok(ActionDirective {
        action,
        observation,
        thought,
        rationale,
    })
}

fn parse_action(raw: &str, mode: PlanMode) -> Result<Action, ReplyParseError> {
    let (verb, args) = split_call(raw);
    let known = match mode {
        PlanMode::Elements => ["tap", "text", "long_press", "swipe", "grid"].contains(&verb),
        PlanMode::Grid => ["tap", "long_press", "swipe", "grid"].contains(&verb),
    };
    if !known {
        return Err(ReplyParseError::UndefinedAction(verb.to_string()));
    }
    let args = args.ok_or_else(|| invalid(verb, "missing argument list"))?;

    if verb == "grid" {
        return Ok(Action::Grid);
    }
    if verb == "text" {
        let input = unquote(args).ok_or_else(|| invalid(verb, "expected a quoted string"))?;
        return Ok(Action::Text {
            input: input.to_string(),
        });
    }

    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    match (mode, verb) {
        (PlanMode::Elements, "tap") => {
            let [n] = expect_arity::<1>(verb, &parts)?;
            Ok(Action::Tap {
                target: parse_index(verb, n)?,
            })
        }
        (PlanMode::Elements, "long_press") => {
            let [n] = expect_arity::<1>(verb, &parts)?;
            Ok(Action::LongPress {
                target: parse_index(verb, n)?,
            })
        }
        (PlanMode::Elements, "swipe") => {
            let [n, dir, dist] = expect_arity::<3>(verb, &parts)?;
            Ok(Action::Swipe {
                target: parse_index(verb, n)?,
                direction: parse_label(verb, dir)?,
                distance: parse_label(verb, dist)?,
            })
        }
        (PlanMode::Grid, "tap") => {
            let [n, region] = expect_arity::<2>(verb, &parts)?;
            Ok(Action::TapGrid {
                target: parse_index(verb, n)?,
                region: parse_label(verb, region)?,
            })
        }
        (PlanMode::Grid, "long_press") => {
            let [n, region] = expect_arity::<2>(verb, &parts)?;
            Ok(Action::LongPressGrid {
                target: parse_index(verb, n)?,
                region: parse_label(verb, region)?,
            })
        }
        (PlanMode::Grid, "swipe") => {
            let [start, start_region, end, end_region] = expect_arity::<4>(verb, &parts)?;
            Ok(Action::SwipeGrid {
                start: parse_index(verb, start)?,
                start_region: parse_label(verb, start_region)?,
                end: parse_index(verb, end)?,
                end_region: parse_label(verb, end_region)?,
            })
        }
        _ => Err(ReplyParseError::UndefinedAction(verb.to_string())),
    }
}

/// Split `verb(args)` into the verb and the text between the first `(` and last `)`.
fn split_call(raw: &str) -> (&str, Option<&str>) {
    let raw = raw.trim();
    let Some(open) = raw.find('(') else {
        return (raw, None);
    };
    let verb = raw[..open].trim();
    let args = raw[open + 1..]
        .rfind(')')
        .map(|close| raw[open + 1..open + 1 + close].trim());
    (verb, args)
}

fn expect_arity<'a, const N: usize>(
    verb: &str,
    parts: &[&'a str],
) -> Result<[&'a str; N], ReplyParseError> {
    <[&str; N]>::try_from(parts)
        .map_err(|_| invalid(verb, &format!("expected {N} arguments, got {}", parts.len())))
}

fn parse_index(verb: &str, raw: &str) -> Result<usize, ReplyParseError> {
    match raw.parse::<usize>() {
        Ok(index) if index >= 1 => Ok(index),
        _ => Err(invalid(verb, &format!("`{raw}` is not a 1-based element index"))),
    }
}

fn parse_label<T: FromStr<Err = String>>(verb: &str, raw: &str) -> Result<T, ReplyParseError> {
    let label = unquote(raw).unwrap_or(raw).trim();
    label.parse().map_err(|detail: String| invalid(verb, &detail))
}

fn invalid(verb: &str, detail: &str) -> ReplyParseError {
    ReplyParseError::InvalidArguments {
        verb: verb.to_string(),
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(action: &str) -> String {
        format!(
            "Observation: a list of settings\nThought: open the menu\nAction: {action}\nSummary: opened menu\n"
        )
    }

    #[test]
    fn tap_scenario() {
        let directive = parse_action_reply(&reply("tap(3)"), PlanMode::Elements).expect("parse");
        assert_eq!(directive.action, Action::Tap { target: 3 });
        assert_eq!(directive.rationale, "opened menu");
        assert_eq!(directive.observation, "a list of settings");
    }

    #[test]
    fn unknown_verb_is_undefined() {
        let err = parse_action_reply(&reply("fly(3)"), PlanMode::Elements).unwrap_err();
        assert_eq!(err, ReplyParseError::UndefinedAction("fly".to_string()));
    }

    #[test]
    fn finish_anywhere_wins() {
        let directive =
            parse_action_reply(&reply("tap(2) then FINISH"), PlanMode::Elements).expect("parse");
        assert_eq!(directive.action, Action::Finish);
    }

    #[test]
    fn missing_summary_is_malformed() {
        let content = "Observation: o\nThought: t\nAction: tap(1)\n";
        assert_eq!(
            parse_action_reply(content, PlanMode::Elements).unwrap_err(),
            ReplyParseError::MissingField("Summary")
        );
    }

    #[test]
    fn text_is_unquoted_and_may_contain_parens() {
        let directive =
            parse_action_reply(&reply(r#"text("hello (world)")"#), PlanMode::Elements)
                .expect("parse");
        assert_eq!(
            directive.action,
            Action::Text {
                input: "hello (world)".to_string()
            }
        );
    }

    #[test]
    fn unquoted_text_is_rejected() {
        let err = parse_action_reply(&reply("text(hello)"), PlanMode::Elements).unwrap_err();
        assert!(matches!(err, ReplyParseError::InvalidArguments { verb, .. } if verb == "text"));
    }

    #[test]
    fn swipe_accepts_quoted_labels() {
        let directive = parse_action_reply(&reply(r#"swipe(21, "up", "medium")"#), PlanMode::Elements)
            .expect("parse");
        assert_eq!(
            directive.action,
            Action::Swipe {
                target: 21,
                direction: SwipeDirection::Up,
                distance: SwipeDistance::Medium,
            }
        );
    }

    #[test]
    fn swipe_rejects_unknown_direction() {
        let err =
            parse_action_reply(&reply("swipe(1, diagonal, long)"), PlanMode::Elements).unwrap_err();
        assert!(matches!(err, ReplyParseError::InvalidArguments { .. }));
    }

    #[test]
    fn zero_index_is_rejected() {
        let err = parse_action_reply(&reply("tap(0)"), PlanMode::Elements).unwrap_err();
        assert!(matches!(err, ReplyParseError::InvalidArguments { .. }));
    }

    #[test]
    fn grid_switch_parses_in_both_modes() {
        for mode in [PlanMode::Elements, PlanMode::Grid] {
            let directive = parse_action_reply(&reply("grid()"), mode).expect("parse");
            assert_eq!(directive.action, Action::Grid);
        }
    }

    #[test]
    fn grid_mode_actions_carry_regions() {
        let tap = parse_action_reply(&reply(r#"tap(4, "top-left")"#), PlanMode::Grid).expect("tap");
        assert_eq!(
            tap.action,
            Action::TapGrid {
                target: 4,
                region: SubRegion::TopLeft
            }
        );

        let swipe = parse_action_reply(
            &reply(r#"swipe(1, "bottom", 7, "center")"#),
            PlanMode::Grid,
        )
        .expect("swipe");
        assert_eq!(
            swipe.action,
            Action::SwipeGrid {
                start: 1,
                start_region: SubRegion::Bottom,
                end: 7,
                end_region: SubRegion::Center,
            }
        );
    }

    #[test]
    fn text_is_undefined_in_grid_mode() {
        let err = parse_action_reply(&reply(r#"text("x")"#), PlanMode::Grid).unwrap_err();
        assert_eq!(err, ReplyParseError::UndefinedAction("text".to_string()));
    }

    #[test]
    fn swipe_vector_scales_with_width_and_distance() {
        assert_eq!(swipe_vector(1080, SwipeDirection::Up, SwipeDistance::Medium), (0, -432));
        assert_eq!(swipe_vector(1080, SwipeDirection::Down, SwipeDistance::Short), (0, 216));
        assert_eq!(swipe_vector(1080, SwipeDirection::Left, SwipeDistance::Long), (-324, 0));
        assert_eq!(swipe_vector(1080, SwipeDirection::Right, SwipeDistance::Short), (108, 0));
    }

    #[test]
    fn doc_verb_for_swipe_direction() {
        assert_eq!(DocVerb::for_swipe(SwipeDirection::Down), DocVerb::VSwipe);
        assert_eq!(DocVerb::for_swipe(SwipeDirection::Left), DocVerb::HSwipe);
    }

    #[test]
    fn reflected_verbs_use_matching_gerunds() {
        assert_eq!(DocVerb::Tap.gerund(), "tapping");
        assert_eq!(DocVerb::VSwipe.gerund(), "swiping");
        assert_eq!(DocVerb::HSwipe.gerund(), "swiping");
        assert_eq!(DocVerb::LongPress.gerund(), "long pressing");
    }
}
