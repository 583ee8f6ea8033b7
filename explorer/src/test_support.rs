//! Scripted collaborators and fixtures for exploration tests.
//!
//! [`ScriptedDevice`] serves queued screenshots and UI trees and records every
//! input primitive. [`ScriptedReasoning`] answers with queued reply texts and
//! records every request. Queues repeat their last entry once drained.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use serde_json::json;
use tempfile::TempDir;

use crate::core::action::{SwipeDirection, SwipeDistance};
use crate::core::element::Point;
use crate::core::session::TokenUsage;
use crate::error::{DeviceError, ReasoningError};
use crate::io::config::ExplorerConfig;
use crate::io::device::Device;
use crate::io::reasoning::{ReasoningReply, ReasoningService};

pub const SCREEN_SIZE: (u32, u32) = (400, 800);

/// Usage attached to every scripted reply.
pub const SCRIPTED_USAGE: TokenUsage = TokenUsage {
    prompt_tokens: 100,
    completion_tokens: 20,
    total_tokens: 120,
};

/// An input primitive received by [`ScriptedDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Tap(Point),
    LongPress(Point, u64),
    Text(String),
    Swipe(Point, SwipeDirection, SwipeDistance, bool),
    SwipePrecise(Point, Point, u64),
    Back,
}

pub struct ScriptedDevice {
    size: (u32, u32),
    screens: RefCell<VecDeque<RgbImage>>,
    trees: RefCell<VecDeque<String>>,
    calls: RefCell<Vec<DeviceCall>>,
    captures: RefCell<Vec<String>>,
    failing: RefCell<Option<String>>,
    corrupt_screenshots: Cell<bool>,
}

impl Default for ScriptedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDevice {
    /// A 400x800 device showing a blank screen with two buttons.
    pub fn new() -> Self {
        Self {
            size: SCREEN_SIZE,
            screens: RefCell::new(VecDeque::from([blank_screen(SCREEN_SIZE, 200)])),
            trees: RefCell::new(VecDeque::from([two_button_tree()])),
            calls: RefCell::new(Vec::new()),
            captures: RefCell::new(Vec::new()),
            failing: RefCell::new(None),
            corrupt_screenshots: Cell::new(false),
        }
    }

    pub fn with_screens(self, screens: Vec<RgbImage>) -> Self {
        *self.screens.borrow_mut() = screens.into();
        self
    }

    pub fn with_trees(self, trees: Vec<String>) -> Self {
        *self.trees.borrow_mut() = trees.into();
        self
    }

    /// Pull screenshots that are not valid PNG data. The capture itself succeeds.
    pub fn with_corrupt_screenshots(self) -> Self {
        self.corrupt_screenshots.set(true);
        self
    }

    /// Make every later call to `primitive` fail.
    ///
    /// Names: `screenshot`, `ui_tree`, `tap`, `long_press`, `text`, `swipe`,
    /// `swipe_precise`, `back`.
    pub fn fail_on(&self, primitive: &str) {
        *self.failing.borrow_mut() = Some(primitive.to_string());
    }

    /// Input primitives received so far, in order.
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.borrow().clone()
    }

    /// Tags of every capture (screenshots and UI trees), in order.
    pub fn captures(&self) -> Vec<String> {
        self.captures.borrow().clone()
    }

    fn check(&self, primitive: &str) -> Result<(), DeviceError> {
        match self.failing.borrow().as_deref() {
            Some(name) if name == primitive => {
                Err(DeviceError::new(primitive, "scripted failure"))
            }
            _ => Ok(()),
        }
    }

    fn record(&self, primitive: &str, call: DeviceCall) -> Result<(), DeviceError> {
        self.check(primitive)?;
        self.calls.borrow_mut().push(call);
        Ok(())
    }
}

fn next_scripted<T: Clone>(queue: &RefCell<VecDeque<T>>) -> Option<T> {
    let mut queue = queue.borrow_mut();
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl Device for ScriptedDevice {
    fn screen_size(&self) -> Result<(u32, u32), DeviceError> {
        Ok(self.size)
    }

    fn capture_screenshot(&self, tag: &str, dir: &Path) -> Result<PathBuf, DeviceError> {
        self.check("screenshot")?;
        let screen = next_scripted(&self.screens)
            .ok_or_else(|| DeviceError::new("screenshot", "no scripted screen"))?;
        let path = dir.join(format!("{tag}.png"));
        if self.corrupt_screenshots.get() {
            std::fs::write(&path, b"not a png")
                .map_err(|err| DeviceError::new("screenshot", err.to_string()))?;
        } else {
            screen
                .save(&path)
                .map_err(|err| DeviceError::new("screenshot", err.to_string()))?;
        }
        self.captures.borrow_mut().push(tag.to_string());
        Ok(path)
    }

    fn capture_ui_tree(&self, tag: &str, dir: &Path) -> Result<PathBuf, DeviceError> {
        self.check("ui_tree")?;
        let tree = next_scripted(&self.trees)
            .ok_or_else(|| DeviceError::new("ui_tree", "no scripted tree"))?;
        let path = dir.join(format!("{tag}.xml"));
        std::fs::write(&path, tree).map_err(|err| DeviceError::new("ui_tree", err.to_string()))?;
        self.captures.borrow_mut().push(tag.to_string());
        Ok(path)
    }

    fn tap(&self, point: Point) -> Result<(), DeviceError> {
        self.record("tap", DeviceCall::Tap(point))
    }

    fn long_press(&self, point: Point, duration_ms: u64) -> Result<(), DeviceError> {
        self.record("long_press", DeviceCall::LongPress(point, duration_ms))
    }

    fn input_text(&self, text: &str) -> Result<(), DeviceError> {
        self.record("text", DeviceCall::Text(text.to_string()))
    }

    fn swipe(
        &self,
        point: Point,
        direction: SwipeDirection,
        distance: SwipeDistance,
        quick: bool,
    ) -> Result<(), DeviceError> {
        self.record("swipe", DeviceCall::Swipe(point, direction, distance, quick))
    }

    fn swipe_precise(&self, start: Point, end: Point, duration_ms: u64) -> Result<(), DeviceError> {
        self.record("swipe_precise", DeviceCall::SwipePrecise(start, end, duration_ms))
    }

    fn back(&self) -> Result<(), DeviceError> {
        self.record("back", DeviceCall::Back)
    }
}

/// A request received by [`ScriptedReasoning`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub prompt: String,
    pub images: Vec<PathBuf>,
}

pub struct ScriptedReasoning {
    replies: RefCell<VecDeque<Result<String, ReasoningError>>>,
    requests: RefCell<Vec<RecordedRequest>>,
}

impl ScriptedReasoning {
    /// Answer each request with the next reply text. Unlike the device queues,
    /// a drained script is an error.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: RefCell::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Every request fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            replies: RefCell::new(VecDeque::from([Err(ReasoningError::new(message))])),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }
}

impl ReasoningService for ScriptedReasoning {
    fn invoke(&self, prompt: &str, images: &[&Path]) -> Result<ReasoningReply, ReasoningError> {
        self.requests.borrow_mut().push(RecordedRequest {
            prompt: prompt.to_string(),
            images: images.iter().map(|p| p.to_path_buf()).collect(),
        });
        let content = self
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ReasoningError::new("reasoning script exhausted")))?;
        Ok(ReasoningReply {
            raw: json!({
                "choices": [{ "message": { "role": "assistant", "content": content } }],
                "usage": {
                    "prompt_tokens": SCRIPTED_USAGE.prompt_tokens,
                    "completion_tokens": SCRIPTED_USAGE.completion_tokens,
                    "total_tokens": SCRIPTED_USAGE.total_tokens,
                },
            }),
            content,
            usage: SCRIPTED_USAGE,
        })
    }
}

/// Planner reply text in the four-line format.
pub fn plan_reply(action: &str, summary: &str) -> String {
    format!("Observation: a screen\nThought: try something\nAction: {action}\nSummary: {summary}\n")
}

/// Reflector reply text; `documentation` is omitted when `None`.
pub fn reflect_reply(decision: &str, documentation: Option<&str>) -> String {
    let mut reply = format!("Decision: {decision}\nThought: compared the screens\n");
    if let Some(doc) = documentation {
        let _ = writeln!(reply, "Documentation: {doc}");
    }
    reply
}

/// Builder for a uiautomator `<node>`.
#[derive(Debug, Clone, Default)]
pub struct UiNode {
    attrs: Vec<(String, String)>,
    children: Vec<UiNode>,
}

impl UiNode {
    pub fn new(class: &str) -> Self {
        Self::default().attr("class", class)
    }

    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn resource_id(self, id: &str) -> Self {
        self.attr("resource-id", id)
    }

    pub fn content_desc(self, desc: &str) -> Self {
        self.attr("content-desc", desc)
    }

    pub fn bounds(self, top_left: Point, bottom_right: Point) -> Self {
        let bounds = format!(
            "[{},{}][{},{}]",
            top_left.0, top_left.1, bottom_right.0, bottom_right.1
        );
        self.attr("bounds", &bounds)
    }

    pub fn clickable(self) -> Self {
        self.attr("clickable", "true")
    }

    pub fn focusable(self) -> Self {
        self.attr("focusable", "true")
    }

    pub fn index(self, index: u32) -> Self {
        self.attr("index", &index.to_string())
    }

    pub fn child(mut self, node: UiNode) -> Self {
        self.children.push(node);
        self
    }

    fn render(&self, out: &mut String) {
        out.push_str("<node");
        for (key, value) in &self.attrs {
            let _ = write!(out, " {key}=\"{}\"", escape_attr(value));
        }
        if self.children.is_empty() {
            out.push_str(" />");
            return;
        }
        out.push('>');
        for child in &self.children {
            child.render(out);
        }
        out.push_str("</node>");
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A complete uiautomator dump with `nodes` under the root.
pub fn hierarchy<I: IntoIterator<Item = UiNode>>(nodes: I) -> String {
    let mut out = String::from("<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><hierarchy rotation=\"0\">");
    for node in nodes {
        node.render(&mut out);
    }
    out.push_str("</hierarchy>");
    out
}

/// Two well-separated clickable buttons: `com.app.id_menu` then `com.app.id_search`.
pub fn two_button_tree() -> String {
    hierarchy([
        UiNode::new("android.widget.Button")
            .resource_id("com.app:id/menu")
            .bounds((0, 0), (100, 100))
            .clickable(),
        UiNode::new("android.widget.Button")
            .resource_id("com.app:id/search")
            .bounds((200, 400), (400, 600))
            .clickable(),
    ])
}

pub fn blank_screen((width, height): (u32, u32), shade: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([shade, shade, shade]))
}

pub fn write_png(path: &Path, image: &RgbImage) -> Result<()> {
    image
        .save(path)
        .with_context(|| format!("write png {}", path.display()))
}

/// Temporary exploration root.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir().context("create temp dir")?,
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

/// Defaults with no pacing delay.
pub fn quick_config(max_rounds: u32) -> ExplorerConfig {
    ExplorerConfig {
        max_rounds,
        request_interval_secs: 0,
        ..ExplorerConfig::default()
    }
}
