//! admin — text wire format of the administration front end
//!
//! The remote front end polls device state and pushes configuration as
//! `key: value` text lines. Transport is out of scope here; this module is
//! the typed parse/format layer only. Requests are a record with explicit
//! optional fields — a missing key means "leave unchanged", an unknown key
//! is an error.

use std::fmt::Write as _;

use anyhow::{bail, Context, Result};

use crate::frame::{HEIGHT, WIDTH};
use crate::pipeline::DeviceState;

/// Operating mode reported to the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppMode {
    Off,
    #[default]
    CaptureOn,
}

/// A configuration push from the front end. Every field is optional;
/// absent fields leave the current setting untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdminRequest {
    pub exposure_time: Option<i32>,
    /// Wire-convention threshold (0 = compute automatically).
    pub threshold: Option<i32>,
    pub image_type: Option<i32>,
}

/// Everything the front end needs to know about the application, refreshed
/// once per poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplicationState {
    pub new_image_ready: bool,
    /// Capture timestamp of the last live image (frame-acquisition side).
    pub image_timestamp: u32,
    pub mode: AppMode,
    pub image_type: u32,
    /// Shutter time in microseconds.
    pub exposure_time: i32,
    /// Configured wire-convention threshold (0 = auto).
    pub threshold: i32,
    pub device: DeviceState,
}

/// Parse a request body of `key: value` lines into an [`AdminRequest`].
///
/// Whitespace around keys and values is trimmed; blank lines are skipped;
/// a line without a colon or with an unknown key is an error, as is a value
/// that does not parse as an integer.
pub fn parse_request(text: &str) -> Result<AdminRequest> {
    let mut req = AdminRequest::default();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once(':')
            .with_context(|| format!("invalid request line: {line:?}"))?;
        let key = key.trim();
        let value = value.trim();

        let parsed: i32 = value
            .parse()
            .with_context(|| format!("unable to parse value of {key:?}: {value:?}"))?;

        match key {
            "exposureTime" => req.exposure_time = Some(parsed),
            "Threshold" => req.threshold = Some(parsed),
            "ImageType" => req.image_type = Some(parsed),
            _ => bail!("unknown argument: {key:?}"),
        }
    }

    Ok(req)
}

/// Format the state record as the `key: value` response lines the front end
/// parses. Line set and order match the reference response, including the
/// fixed working resolution.
pub fn format_state(state: &ApplicationState) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "imgTS: {}", state.image_timestamp);
    let _ = writeln!(out, "exposureTime: {}", state.exposure_time);
    let _ = writeln!(out, "Threshold: {}", state.threshold);
    let _ = writeln!(out, "Stepcounter: {}", state.device.step_counter);
    let _ = writeln!(out, "width: {WIDTH}");
    let _ = writeln!(out, "height: {HEIGHT}");
    let _ = writeln!(out, "ImageType: {}", state.image_type);
    let _ = writeln!(out, "objectcount: {}", state.device.object_count);
    let _ = writeln!(out, "threscalc: {}", state.device.resolved_threshold);
    out
}
