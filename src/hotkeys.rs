//! Keyboard trigger matching for capture modes.
//!
//! The host forwards key events as [`KeyPress`] values; this module only
//! maps them to a [`CaptureMode`]. Default bindings are Ctrl+Alt+1 through
//! Ctrl+Alt+4. Matching is exact on all four modifiers, so Ctrl+Alt+Shift+1
//! does not fire, while AltGr layouts (which report ctrl and alt together)
//! do.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::capture::CaptureMode;

/// One key event as seen by the host page.
///
/// `code` is the layout-independent position name (`Digit1`, `Numpad1`);
/// some layouts compose the final character so `key` alone is not enough
/// to recognize a digit row press.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct KeyPress {
    pub key: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub meta: bool,
    /// Auto-repeat events never trigger a capture.
    #[serde(default)]
    pub repeat: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct HotkeyBinding {
    key: String,
    ctrl: bool,
    alt: bool,
    shift: bool,
    meta: bool,
}

impl HotkeyBinding {
    fn matches(&self, press: &KeyPress) -> bool {
        // Bindings store the key lowercased, but browsers report shifted
        // letters uppercase ("F" for Shift+f).
        let code = press.code.to_ascii_lowercase();
        let key_matches = press.key.eq_ignore_ascii_case(&self.key)
            || code == format!("digit{}", self.key)
            || code == format!("numpad{}", self.key);
        key_matches
            && press.ctrl == self.ctrl
            && press.alt == self.alt
            && press.shift == self.shift
            && press.meta == self.meta
    }
}

/// Parse a `"Ctrl+Alt+3"` style combo into a binding.
fn parse_combo(combo: &str) -> Option<HotkeyBinding> {
    let parts: Vec<&str> = combo.split('+').map(|s| s.trim()).collect();
    let key = parts.last()?.to_lowercase();
    if key.is_empty() {
        return None;
    }

    let mut binding = HotkeyBinding {
        key,
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    };
    for part in parts.iter().take(parts.len() - 1) {
        match part.to_lowercase().as_str() {
            "ctrl" | "control" | "commandorcontrol" => binding.ctrl = true,
            "alt" => binding.alt = true,
            "shift" => binding.shift = true,
            "meta" | "cmd" | "super" => binding.meta = true,
            _ => return None,
        }
    }
    Some(binding)
}

/// Capture-mode bindings, checked in registration order.
pub struct HotkeyMap {
    enabled: bool,
    bindings: Vec<(HotkeyBinding, CaptureMode)>,
}

impl HotkeyMap {
    /// The default map: Ctrl+Alt+1..4 for the four capture modes.
    pub fn new(enabled: bool) -> Self {
        let mut map = Self {
            enabled,
            bindings: Vec::new(),
        };
        map.bind("Ctrl+Alt+1", CaptureMode::FullPage);
        map.bind("Ctrl+Alt+2", CaptureMode::VisibleViewport);
        map.bind("Ctrl+Alt+3", CaptureMode::SelectedArea);
        map.bind("Ctrl+Alt+4", CaptureMode::Interactive);
        map
    }

    /// Add or replace the binding for `mode`. Invalid combos are ignored.
    pub fn bind(&mut self, combo: &str, mode: CaptureMode) {
        let Some(binding) = parse_combo(combo) else {
            log::warn!("[HOTKEY] ignoring invalid combo {:?}", combo);
            return;
        };
        self.bindings.retain(|(_, m)| *m != mode);
        self.bindings.push((binding, mode));
    }

    /// Map a key press to the capture mode it triggers, if any.
    pub fn mode_for(&self, press: &KeyPress) -> Option<CaptureMode> {
        if !self.enabled || press.repeat {
            return None;
        }
        self.bindings
            .iter()
            .find(|(binding, _)| binding.matches(press))
            .map(|(_, mode)| *mode)
    }
}

impl Default for HotkeyMap {
    fn default() -> Self {
        Self::new(true)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ctrl_alt(key: &str) -> KeyPress {
        KeyPress {
            key: key.into(),
            ctrl: true,
            alt: true,
            ..Default::default()
        }
    }

    #[test]
    fn default_bindings_cover_all_modes() {
        let map = HotkeyMap::default();
        assert_eq!(map.mode_for(&ctrl_alt("1")), Some(CaptureMode::FullPage));
        assert_eq!(
            map.mode_for(&ctrl_alt("2")),
            Some(CaptureMode::VisibleViewport)
        );
        assert_eq!(map.mode_for(&ctrl_alt("3")), Some(CaptureMode::SelectedArea));
        assert_eq!(map.mode_for(&ctrl_alt("4")), Some(CaptureMode::Interactive));
    }

    #[test]
    fn missing_modifier_does_not_trigger() {
        let map = HotkeyMap::default();
        let mut press = ctrl_alt("1");
        press.alt = false;
        assert_eq!(map.mode_for(&press), None);
    }

    #[test]
    fn extra_modifier_does_not_trigger() {
        let map = HotkeyMap::default();
        let mut shifted = ctrl_alt("1");
        shifted.shift = true;
        assert_eq!(map.mode_for(&shifted), None);

        let mut with_meta = ctrl_alt("1");
        with_meta.meta = true;
        assert_eq!(map.mode_for(&with_meta), None);
    }

    #[test]
    fn digit_code_matches_when_key_is_composed() {
        // AltGr layouts report a composed character in `key` but keep the
        // physical position in `code`.
        let map = HotkeyMap::default();
        let press = KeyPress {
            key: "\u{2081}".into(),
            code: "Digit1".into(),
            ctrl: true,
            alt: true,
            ..Default::default()
        };
        assert_eq!(map.mode_for(&press), Some(CaptureMode::FullPage));

        let numpad = KeyPress {
            key: "End".into(),
            code: "Numpad1".into(),
            ctrl: true,
            alt: true,
            ..Default::default()
        };
        assert_eq!(map.mode_for(&numpad), Some(CaptureMode::FullPage));
    }

    #[test]
    fn key_repeat_is_ignored() {
        let map = HotkeyMap::default();
        let mut press = ctrl_alt("3");
        press.repeat = true;
        assert_eq!(map.mode_for(&press), None);
    }

    #[test]
    fn disabled_map_matches_nothing() {
        let map = HotkeyMap::new(false);
        assert_eq!(map.mode_for(&ctrl_alt("1")), None);
    }

    #[test]
    fn rebinding_replaces_the_old_combo() {
        let mut map = HotkeyMap::default();
        map.bind("Ctrl+Shift+F", CaptureMode::FullPage);

        assert_eq!(map.mode_for(&ctrl_alt("1")), None);
        let press = KeyPress {
            key: "f".into(),
            ctrl: true,
            shift: true,
            ..Default::default()
        };
        assert_eq!(map.mode_for(&press), Some(CaptureMode::FullPage));
    }

    #[test]
    fn shifted_letter_matches_case_insensitively() {
        let mut map = HotkeyMap::default();
        map.bind("Ctrl+Shift+f", CaptureMode::VisibleViewport);

        // With Shift held the browser reports the shifted character.
        let press = KeyPress {
            key: "F".into(),
            code: "KeyF".into(),
            ctrl: true,
            shift: true,
            ..Default::default()
        };
        assert_eq!(map.mode_for(&press), Some(CaptureMode::VisibleViewport));
    }

    #[test]
    fn invalid_combo_is_ignored() {
        let mut map = HotkeyMap::default();
        map.bind("Hyper+1", CaptureMode::FullPage);
        // Old binding survives.
        assert_eq!(map.mode_for(&ctrl_alt("1")), Some(CaptureMode::FullPage));
    }

    #[test]
    fn combo_parsing_normalizes_modifier_spelling() {
        let mut map = HotkeyMap::new(true);
        map.bind("CommandOrControl + Alt + 9", CaptureMode::FullPage);
        assert_eq!(map.mode_for(&ctrl_alt("9")), Some(CaptureMode::FullPage));
    }
}
