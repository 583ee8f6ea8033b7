//! Turn a planner directive into device input.

use tracing::{debug, instrument};

use crate::core::action::{Action, DocVerb};
use crate::core::element::{Element, Point};
use crate::error::ExploreError;
use crate::io::device::{Device, SWIPE_MS};

#[derive(Debug, Clone, Copy)]
pub struct ExecutorSettings {
    pub long_press_ms: u64,
    pub swipe_quick: bool,
}

/// The element an action was performed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActedElement {
    /// 1-based index into the round's element list.
    pub index: usize,
    pub element_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedAction {
    pub verb: DocVerb,
    pub acted: Option<ActedElement>,
}

impl ExecutedAction {
    /// Element to reflect on, or `None` when the action is not reflected (text input).
    pub fn reflection_target(&self) -> Option<&ActedElement> {
        if self.verb == DocVerb::Text {
            return None;
        }
        self.acted.as_ref()
    }
}

/// Perform `action` on `device`.
///
/// `grid()` and `FINISH` perform no input and return `Ok(None)`.
#[instrument(skip_all, fields(verb = action.verb(), target = ?action.target()))]
pub fn execute_action(
    device: &dyn Device,
    action: &Action,
    elements: &[Element],
    settings: ExecutorSettings,
) -> Result<Option<ExecutedAction>, ExploreError> {
    let executed = match action {
        Action::Grid | Action::Finish => return Ok(None),
        Action::Tap { target } => {
            let elem = resolve(elements, *target)?;
            device.tap(elem.center())?;
            acted(DocVerb::Tap, *target, elem)
        }
        Action::LongPress { target } => {
            let elem = resolve(elements, *target)?;
            device.long_press(elem.center(), settings.long_press_ms)?;
            acted(DocVerb::LongPress, *target, elem)
        }
        Action::Text { input } => {
            device.input_text(input)?;
            ExecutedAction {
                verb: DocVerb::Text,
                acted: None,
            }
        }
        Action::Swipe {
            target,
            direction,
            distance,
        } => {
            let elem = resolve(elements, *target)?;
            device.swipe(elem.center(), *direction, *distance, settings.swipe_quick)?;
            acted(DocVerb::for_swipe(*direction), *target, elem)
        }
        Action::TapGrid { target, region } => {
            let elem = resolve(elements, *target)?;
            device.tap(region.point_in(&elem.bbox))?;
            acted(DocVerb::Tap, *target, elem)
        }
        Action::LongPressGrid { target, region } => {
            let elem = resolve(elements, *target)?;
            device.long_press(region.point_in(&elem.bbox), settings.long_press_ms)?;
            acted(DocVerb::LongPress, *target, elem)
        }
        Action::SwipeGrid {
            start,
            start_region,
            end,
            end_region,
        } => {
            let start_elem = resolve(elements, *start)?;
            let end_elem = resolve(elements, *end)?;
            let from = start_region.point_in(&start_elem.bbox);
            let to = end_region.point_in(&end_elem.bbox);
            device.swipe_precise(from, to, SWIPE_MS)?;
            acted(dominant_swipe_verb(from, to), *start, start_elem)
        }
    };
    debug!(verb = %executed.verb, "action executed");
    Ok(Some(executed))
}

fn resolve(elements: &[Element], index: usize) -> Result<&Element, ExploreError> {
    index
        .checked_sub(1)
        .and_then(|i| elements.get(i))
        .ok_or(ExploreError::TargetOutOfRange {
            index,
            len: elements.len(),
        })
}

fn acted(verb: DocVerb, index: usize, elem: &Element) -> ExecutedAction {
    ExecutedAction {
        verb,
        acted: Some(ActedElement {
            index,
            element_id: elem.id.clone(),
        }),
    }
}

/// Vertical unless the horizontal travel is strictly larger.
fn dominant_swipe_verb(from: Point, to: Point) -> DocVerb {
    let dx = (to.0 - from.0).abs();
    let dy = (to.1 - from.1).abs();
    if dx > dy { DocVerb::HSwipe } else { DocVerb::VSwipe }
}
