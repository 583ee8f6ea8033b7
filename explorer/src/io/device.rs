//! Device driver: screen capture and input primitives.
//!
//! The [`Device`] trait decouples the exploration loop from the backend
//! (currently `adb`). Tests use `test_support::ScriptedDevice`, which records
//! actions and serves fixture captures without spawning processes.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::core::action::{SwipeDirection, SwipeDistance, swipe_vector};
use crate::core::element::Point;
use crate::error::DeviceError;
use crate::io::config::DeviceConfig;
use crate::io::process::run_command_with_timeout;

/// Swipe duration when `quick` is requested.
pub const QUICK_SWIPE_MS: u64 = 100;
/// Default swipe duration, also used for precise swipes.
pub const SWIPE_MS: u64 = 400;

/// Abstraction over a controllable device.
///
/// Every method either succeeds or returns a [`DeviceError`]; callers treat
/// every error as fatal.
pub trait Device {
    /// Screen width and height in pixels.
    fn screen_size(&self) -> Result<(u32, u32), DeviceError>;

    /// Save a screenshot as `<dir>/<tag>.png` and return its path.
    fn capture_screenshot(&self, tag: &str, dir: &Path) -> Result<PathBuf, DeviceError>;

    /// Save the accessibility tree as `<dir>/<tag>.xml` and return its path.
    fn capture_ui_tree(&self, tag: &str, dir: &Path) -> Result<PathBuf, DeviceError>;

    fn tap(&self, point: Point) -> Result<(), DeviceError>;

    fn long_press(&self, point: Point, duration_ms: u64) -> Result<(), DeviceError>;

    fn input_text(&self, text: &str) -> Result<(), DeviceError>;

    /// Swipe from `point` using the unit-based swipe geometry.
    fn swipe(
        &self,
        point: Point,
        direction: SwipeDirection,
        distance: SwipeDistance,
        quick: bool,
    ) -> Result<(), DeviceError>;

    fn swipe_precise(&self, start: Point, end: Point, duration_ms: u64) -> Result<(), DeviceError>;

    fn back(&self) -> Result<(), DeviceError>;
}

/// Android device driven through the `adb` binary.
#[derive(Debug, Clone)]
pub struct AdbDevice {
    adb: String,
    serial: String,
    remote_screenshot_dir: String,
    remote_xml_dir: String,
    timeout: Duration,
    output_limit_bytes: usize,
    size: (u32, u32),
}

impl AdbDevice {
    /// Attach to `serial`, or to the only attached device when `serial` is unset,
    /// and read the screen size once.
    #[instrument(skip_all, fields(serial = ?cfg.serial))]
    pub fn connect(cfg: &DeviceConfig) -> Result<Self, DeviceError> {
        let serial = match &cfg.serial {
            Some(serial) => serial.clone(),
            None => {
                let devices = list_devices(cfg)?;
                match devices.as_slice() {
                    [only] => only.clone(),
                    [] => return Err(DeviceError::new("adb devices", "no attached devices")),
                    many => {
                        return Err(DeviceError::new(
                            "adb devices",
                            format!(
                                "{} devices attached ({}); set device.serial or pass --device",
                                many.len(),
                                many.join(", ")
                            ),
                        ));
                    }
                }
            }
        };

        let mut device = Self {
            adb: cfg.adb.clone(),
            serial,
            remote_screenshot_dir: cfg.remote_screenshot_dir.trim_end_matches('/').to_string(),
            remote_xml_dir: cfg.remote_xml_dir.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(cfg.command_timeout_secs),
            output_limit_bytes: cfg.output_limit_bytes,
            size: (0, 0),
        };
        let output = device.shell(&["wm", "size"])?;
        device.size = parse_wm_size(&output)
            .ok_or_else(|| DeviceError::new("wm size", format!("unexpected output `{}`", output.trim())))?;
        info!(serial = %device.serial, width = device.size.0, height = device.size.1, "device connected");
        Ok(device)
    }

    fn shell(&self, args: &[&str]) -> Result<String, DeviceError> {
        let mut full = vec!["shell"];
        full.extend_from_slice(args);
        self.adb(&full)
    }

    fn adb(&self, args: &[&str]) -> Result<String, DeviceError> {
        let mut full = vec!["-s", self.serial.as_str()];
        full.extend_from_slice(args);
        run_adb(&self.adb, &full, self.timeout, self.output_limit_bytes)
    }

    fn capture(&self, remote_dir: &str, file_name: &str, dump: &[&str], dir: &Path) -> Result<PathBuf, DeviceError> {
        let remote = format!("{remote_dir}/{file_name}");
        let local = dir.join(file_name);
        let mut dump_args = dump.to_vec();
        dump_args.push(remote.as_str());
        self.shell(&dump_args)?;
        let local_arg = local.to_string_lossy();
        self.adb(&["pull", remote.as_str(), &*local_arg])?;
        debug!(path = %local.display(), "pulled capture");
        Ok(local)
    }

    fn input_swipe(&self, start: Point, end: Point, duration_ms: u64) -> Result<(), DeviceError> {
        let args = [
            start.0.to_string(),
            start.1.to_string(),
            end.0.to_string(),
            end.1.to_string(),
            duration_ms.to_string(),
        ];
        let mut full = vec!["input", "swipe"];
        full.extend(args.iter().map(String::as_str));
        self.shell(&full).map(drop)
    }
}

impl Device for AdbDevice {
    fn screen_size(&self) -> Result<(u32, u32), DeviceError> {
        Ok(self.size)
    }

    #[instrument(skip_all, fields(tag = %tag))]
    fn capture_screenshot(&self, tag: &str, dir: &Path) -> Result<PathBuf, DeviceError> {
        self.capture(
            &self.remote_screenshot_dir,
            &format!("{tag}.png"),
            &["screencap", "-p"],
            dir,
        )
    }

    #[instrument(skip_all, fields(tag = %tag))]
    fn capture_ui_tree(&self, tag: &str, dir: &Path) -> Result<PathBuf, DeviceError> {
        self.capture(
            &self.remote_xml_dir,
            &format!("{tag}.xml"),
            &["uiautomator", "dump"],
            dir,
        )
    }

    fn tap(&self, point: Point) -> Result<(), DeviceError> {
        let (x, y) = (point.0.to_string(), point.1.to_string());
        self.shell(&["input", "tap", x.as_str(), y.as_str()]).map(drop)
    }

    fn long_press(&self, point: Point, duration_ms: u64) -> Result<(), DeviceError> {
        self.input_swipe(point, point, duration_ms)
    }

    fn input_text(&self, text: &str) -> Result<(), DeviceError> {
        let escaped = escape_input_text(text);
        self.shell(&["input", "text", escaped.as_str()]).map(drop)
    }

    fn swipe(
        &self,
        point: Point,
        direction: SwipeDirection,
        distance: SwipeDistance,
        quick: bool,
    ) -> Result<(), DeviceError> {
        let (dx, dy) = swipe_vector(self.size.0, direction, distance);
        let duration = if quick { QUICK_SWIPE_MS } else { SWIPE_MS };
        self.input_swipe(point, (point.0 + dx, point.1 + dy), duration)
    }

    fn swipe_precise(&self, start: Point, end: Point, duration_ms: u64) -> Result<(), DeviceError> {
        self.input_swipe(start, end, duration_ms)
    }

    fn back(&self) -> Result<(), DeviceError> {
        self.shell(&["input", "keyevent", "KEYCODE_BACK"]).map(drop)
    }
}

/// Serials of attached devices in the `device` state.
#[instrument(skip_all)]
pub fn list_devices(cfg: &DeviceConfig) -> Result<Vec<String>, DeviceError> {
    let output = run_adb(
        &cfg.adb,
        &["devices"],
        Duration::from_secs(cfg.command_timeout_secs),
        cfg.output_limit_bytes,
    )?;
    Ok(parse_device_list(&output))
}

fn run_adb(
    adb: &str,
    args: &[&str],
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<String, DeviceError> {
    let rendered = format!("{adb} {}", args.join(" "));
    debug!(command = %rendered, "running adb");
    let mut cmd = Command::new(adb);
    cmd.args(args);
    let output = run_command_with_timeout(cmd, timeout, output_limit_bytes)
        .map_err(|err| DeviceError::new(&rendered, format!("{err:#}")))?;
    if !output.succeeded() {
        return Err(DeviceError::new(rendered, output.failure_detail()));
    }
    Ok(output.stdout_text())
}

/// `input text` treats spaces as argument separators and `'` as a quote.
pub fn escape_input_text(text: &str) -> String {
    text.replace(' ', "%s").replace('\'', "")
}

/// Parse `wm size` output, e.g. `Physical size: 1080x2400`.
pub fn parse_wm_size(output: &str) -> Option<(u32, u32)> {
    let line = output
        .lines()
        .find_map(|line| line.trim().strip_prefix("Physical size:"))?;
    let (w, h) = line.trim().split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// Parse `adb devices` output into serials in the `device` state.
pub fn parse_device_list(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            (parts.next() == Some("device")).then(|| serial.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wm_size_reads_physical_line() {
        assert_eq!(parse_wm_size("Physical size: 1080x2400\n"), Some((1080, 2400)));
        assert_eq!(
            parse_wm_size("Physical size: 720x1280\nOverride size: 600x1000\n"),
            Some((720, 1280))
        );
        assert_eq!(parse_wm_size("error: no devices"), None);
    }

    #[test]
    fn device_list_skips_header_and_offline() {
        let output = "List of devices attached\nemulator-5554\tdevice\nR58M\toffline\n0123\tunauthorized\nXYZ\tdevice\n\n";
        assert_eq!(parse_device_list(output), vec!["emulator-5554", "XYZ"]);
    }

    #[test]
    fn text_escaping_matches_input_command() {
        assert_eq!(escape_input_text("it's a test"), "its%sa%stest");
    }

    #[cfg(unix)]
    #[test]
    fn missing_adb_binary_is_device_error() {
        let cfg = DeviceConfig {
            adb: "/nonexistent/adb-binary".to_string(),
            ..DeviceConfig::default()
        };
        let err = list_devices(&cfg).unwrap_err();
        assert_eq!(err.command, "/nonexistent/adb-binary devices");
    }
}
