//! The `computer` tool: screenshots plus mouse/keyboard control.
//!
//! Coordinates arriving from the model are in the virtual 1024x768
//! display and are scaled to the physical screen before injection. Every
//! input action returns a fresh screenshot after a short settle delay so
//! the model can verify its effect.

use super::{Tool, ToolResult};
use crate::coords;
use crate::keys::parse_key_combo;
use crate::platforms::{native, MouseButton, ScrollDirection};
use crate::screenshot;
use crate::AgentError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Delay before post-action screenshots, letting the UI settle.
const SCREENSHOT_DELAY: Duration = Duration::from_millis(500);
/// Upper bound for `hold_key` and `wait` durations.
const MAX_DURATION_SECS: f64 = 30.0;
/// Upper bound on wheel detents for a single scroll action.
const MAX_SCROLL_CLICKS: u32 = 100;

pub struct ComputerTool {
    /// Physical screen size in pixels.
    width: u32,
    height: u32,
}

impl ComputerTool {
    /// Create a tool bound to the primary monitor.
    pub fn new() -> Result<Self, AgentError> {
        let (width, height) = screenshot::primary_screen_size()?;
        Ok(Self { width, height })
    }

    /// Create a tool with an explicit display size (tests, headless).
    pub fn with_display(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse and scale the `coordinate` input parameter.
    fn coordinate(&self, input: &Value) -> Result<(u32, u32), String> {
        let pair = input
            .get("coordinate")
            .and_then(|v| v.as_array())
            .ok_or("coordinate must be an array of two non-negative integers")?;
        if pair.len() != 2 {
            return Err(format!("{pair:?} must be an array of length 2"));
        }
        let x = pair[0]
            .as_u64()
            .ok_or_else(|| format!("{pair:?} must contain non-negative integers"))?;
        let y = pair[1]
            .as_u64()
            .ok_or_else(|| format!("{pair:?} must contain non-negative integers"))?;
        coords::api_to_screen_checked(x as u32, y as u32, self.width, self.height)
    }

    /// Optional coordinate: None when absent, error when malformed.
    fn optional_coordinate(&self, input: &Value) -> Result<Option<(u32, u32)>, String> {
        if input.get("coordinate").is_none() || input.get("coordinate") == Some(&Value::Null) {
            return Ok(None);
        }
        self.coordinate(input).map(Some)
    }

    async fn screenshot_result(&self) -> ToolResult {
        match capture().await {
            Ok(image) => ToolResult::default().with_image(image),
            Err(e) => ToolResult::error(format!("Failed to take screenshot: {e}")),
        }
    }

    /// Attach a post-action screenshot to `output` after the settle delay.
    async fn with_screenshot(&self, output: String) -> ToolResult {
        tokio::time::sleep(SCREENSHOT_DELAY).await;
        match capture().await {
            Ok(image) => ToolResult::output(output).with_image(image),
            Err(e) => ToolResult {
                output: Some(output),
                error: Some(format!("Failed to take screenshot: {e}")),
                ..Default::default()
            },
        }
    }

    async fn dispatch(&self, action: &str, input: &Value) -> Result<ToolResult, String> {
        let get_str = |key: &str| -> Option<&str> { input.get(key).and_then(|v| v.as_str()) };
        let get_f64 = |key: &str| -> Option<f64> { input.get(key).and_then(|v| v.as_f64()) };

        let result = match action {
            "mouse_move" => {
                let (x, y) = self.coordinate(input)?;
                native::mouse_move(x, y).map_err(|e| e.to_string())?;
                self.with_screenshot(format!("Mouse moved to {x}, {y}")).await
            }
            "left_click_drag" => {
                let (x, y) = self.coordinate(input)?;
                native::drag_to(x, y).map_err(|e| e.to_string())?;
                self.with_screenshot(format!("Mouse dragged to {x}, {y}")).await
            }
            "key" => {
                let text = get_str("text").ok_or("Text is required for key action")?;
                if input.get("coordinate").is_some() {
                    return Err("Coordinate is not accepted for key action".into());
                }
                let combo = parse_key_combo(text)?;
                native::press_combo(&combo).map_err(|e| e.to_string())?;
                self.with_screenshot(format!("Key pressed: {text}")).await
            }
            "type" => {
                let text = get_str("text").ok_or("Text is required for type action")?;
                if input.get("coordinate").is_some() {
                    return Err("Coordinate is not accepted for type action".into());
                }
                native::type_text(text).map_err(|e| e.to_string())?;
                self.with_screenshot(format!("Text typed: {text}")).await
            }
            "left_click" | "right_click" | "middle_click" | "double_click" | "triple_click" => {
                let (button, count) = match action {
                    "right_click" => (MouseButton::Right, 1),
                    "middle_click" => (MouseButton::Middle, 1),
                    "double_click" => (MouseButton::Left, 2),
                    "triple_click" => (MouseButton::Left, 3),
                    _ => (MouseButton::Left, 1),
                };
                let at = self.optional_coordinate(input)?;
                native::click(button, at, count).map_err(|e| e.to_string())?;
                let location = at
                    .map(|(x, y)| format!(" at {x}, {y}"))
                    .unwrap_or_default();
                let label = action.replace('_', " ");
                self.with_screenshot(format!(
                    "{}{location}",
                    capitalize(&label)
                ))
                .await
            }
            "left_mouse_down" => {
                native::mouse_down(MouseButton::Left).map_err(|e| e.to_string())?;
                self.with_screenshot("Left mouse button pressed down".into()).await
            }
            "left_mouse_up" => {
                native::mouse_up(MouseButton::Left).map_err(|e| e.to_string())?;
                self.with_screenshot("Left mouse button released".into()).await
            }
            "scroll" => {
                let direction_name = get_str("scroll_direction")
                    .ok_or("Scroll direction is required for scroll action")?;
                let direction = ScrollDirection::parse(direction_name)
                    .ok_or_else(|| format!("Invalid scroll direction: {direction_name}"))?;
                let amount = get_f64("scroll_amount")
                    .ok_or("Scroll amount is required for scroll action")?;
                if amount < 0.0 {
                    return Err("Scroll amount must be non-negative".into());
                }
                if let Some((x, y)) = self.optional_coordinate(input)? {
                    native::mouse_move(x, y).map_err(|e| e.to_string())?;
                }
                native::scroll(direction, scroll_clicks(amount)).map_err(|e| e.to_string())?;
                self.with_screenshot(format!("Scrolled {direction_name} by {amount}"))
                    .await
            }
            "hold_key" => {
                let text = get_str("text").ok_or("Text is required for hold_key action")?;
                let duration =
                    get_f64("duration").ok_or("Duration is required for hold_key action")?;
                if duration > MAX_DURATION_SECS {
                    return Err("Duration must be 30 seconds or less".into());
                }
                let combo = parse_key_combo(text)?;
                native::combo_down(&combo).map_err(|e| e.to_string())?;
                tokio::time::sleep(Duration::from_secs_f64(duration.max(0.0))).await;
                native::combo_up(&combo).map_err(|e| e.to_string())?;
                self.with_screenshot(format!("Held key {text} for {duration} seconds"))
                    .await
            }
            "wait" => {
                let duration = get_f64("duration").ok_or("Duration is required for wait action")?;
                if duration > MAX_DURATION_SECS {
                    return Err("Duration must be 30 seconds or less".into());
                }
                tokio::time::sleep(Duration::from_secs_f64(duration.max(0.0))).await;
                self.with_screenshot(format!("Waited for {duration} seconds")).await
            }
            "screenshot" => self.screenshot_result().await,
            "cursor_position" => {
                let (sx, sy) = native::cursor_position().map_err(|e| e.to_string())?;
                let (x, y) = coords::scale_coordinates(
                    coords::CoordSource::Screen,
                    sx.max(0) as u32,
                    sy.max(0) as u32,
                    self.width,
                    self.height,
                );
                let shot = self.screenshot_result().await;
                ToolResult {
                    output: Some(format!("Cursor position: X={x}, Y={y}")),
                    base64_image: shot.base64_image,
                    ..Default::default()
                }
            }
            other => return Err(format!("Invalid action: {other}")),
        };
        Ok(result)
    }
}

#[async_trait]
impl Tool for ComputerTool {
    fn name(&self) -> &'static str {
        "computer"
    }

    fn api_params(&self) -> Value {
        json!({
            "type": "computer_20250124",
            "name": self.name(),
            "display_width_px": screenshot::TARGET_WIDTH,
            "display_height_px": screenshot::TARGET_HEIGHT,
            "display_number": null,
        })
    }

    async fn call(&self, input: Value) -> ToolResult {
        let Some(action) = input.get("action").and_then(|v| v.as_str()) else {
            return ToolResult::error("Missing required 'action' parameter");
        };
        debug!(action, "computer tool call");
        match self.dispatch(action, &input).await {
            Ok(result) => result,
            Err(message) => ToolResult::error(message),
        }
    }
}

async fn capture() -> Result<String, String> {
    tokio::task::spawn_blocking(screenshot::capture_xga_base64)
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
}

/// Bound the model-supplied scroll amount to a sane detent count. The
/// f64-to-u32 cast saturates, so huge values land on the cap instead of
/// wrapping into a sign flip downstream.
fn scroll_clicks(amount: f64) -> u32 {
    (amount as u32).min(MAX_SCROLL_CLICKS)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
