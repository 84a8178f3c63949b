//! Detection of environments where redirect sign-in results tend to get lost.
//!
//! The tracker only consumes a boolean. This module is one way of computing
//! it: the heuristic the web front end has shipped with, which combines the
//! user agent with touch capability and viewport size.

use std::env;

const MOBILE_USER_AGENT_TOKENS: &[&str] = &[
    "android",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

const SMALL_VIEWPORT_PX: f64 = 768.0;

/// Snapshot of the browser characteristics relevant to redirect reliability.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceProfile {
    pub user_agent: String,
    pub max_touch_points: u32,
    /// Whether `ontouchstart` is exposed on the window.
    pub has_touch_events: bool,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub device_pixel_ratio: f64,
}

impl DeviceProfile {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            device_pixel_ratio: 1.0,
            ..Default::default()
        }
    }

    pub fn with_touch(mut self, max_touch_points: u32) -> Self {
        self.max_touch_points = max_touch_points;
        self
    }

    pub fn with_viewport(mut self, width: f64, height: f64, device_pixel_ratio: f64) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self.device_pixel_ratio = device_pixel_ratio;
        self
    }

    fn has_mobile_user_agent(&self) -> bool {
        let agent = self.user_agent.to_ascii_lowercase();
        MOBILE_USER_AGENT_TOKENS
            .iter()
            .any(|token| agent.contains(token))
    }

    fn is_touch_device(&self) -> bool {
        self.has_touch_events || self.max_touch_points > 0
    }

    fn has_small_screen(&self) -> bool {
        self.viewport_width <= SMALL_VIEWPORT_PX || self.viewport_height <= SMALL_VIEWPORT_PX
    }

    /// Returns `true` when redirect results should be treated as unreliable.
    ///
    /// `YAMU_FORCE_DEVICE=mobile|desktop` overrides the heuristic on native
    /// targets, which is how the demos and integration tests pin behaviour.
    pub fn is_redirect_prone(&self) -> bool {
        match forced_device().as_deref() {
            Some("mobile") => return true,
            Some("desktop") => return false,
            _ => {}
        }

        self.has_mobile_user_agent()
            || (self.is_touch_device()
                && (self.has_small_screen() || self.device_pixel_ratio > 1.0))
    }

    /// Reads the current browser window.
    #[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
    pub fn detect() -> Option<Self> {
        use wasm_bindgen::JsValue;

        let window = web_sys::window()?;
        let navigator = window.navigator();
        let has_touch_events =
            js_sys::Reflect::has(&window, &JsValue::from_str("ontouchstart")).unwrap_or(false);
        let dimension = |value: Result<JsValue, JsValue>| {
            value.ok().and_then(|v| v.as_f64()).unwrap_or_default()
        };

        Some(Self {
            user_agent: navigator.user_agent().unwrap_or_default(),
            max_touch_points: navigator.max_touch_points().max(0) as u32,
            has_touch_events,
            viewport_width: dimension(window.inner_width()),
            viewport_height: dimension(window.inner_height()),
            device_pixel_ratio: window.device_pixel_ratio(),
        })
    }

    #[cfg(not(all(target_arch = "wasm32", feature = "wasm-web")))]
    pub fn detect() -> Option<Self> {
        let user_agent = env::var("YAMU_USER_AGENT").ok()?;
        Some(Self::new(user_agent).with_viewport(1280.0, 800.0, 1.0))
    }
}

fn forced_device() -> Option<String> {
    env::var("YAMU_FORCE_DEVICE")
        .ok()
        .map(|value| value.trim().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15";
    const DESKTOP: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/120.0";

    #[test]
    fn mobile_user_agent_is_redirect_prone() {
        let profile = DeviceProfile::new(IPHONE).with_viewport(1024.0, 1366.0, 1.0);
        assert!(profile.is_redirect_prone());
    }

    #[test]
    fn desktop_without_touch_is_not_redirect_prone() {
        let profile = DeviceProfile::new(DESKTOP).with_viewport(1920.0, 1080.0, 2.0);
        assert!(!profile.is_redirect_prone());
    }

    #[test]
    fn touch_laptop_with_high_density_display_counts_as_mobile() {
        let profile = DeviceProfile::new(DESKTOP)
            .with_touch(10)
            .with_viewport(1920.0, 1080.0, 1.5);
        assert!(profile.is_redirect_prone());
    }

    #[test]
    fn touch_device_with_large_standard_display_is_not_mobile() {
        let profile = DeviceProfile::new(DESKTOP)
            .with_touch(1)
            .with_viewport(1920.0, 1080.0, 1.0);
        assert!(!profile.is_redirect_prone());
    }
}
