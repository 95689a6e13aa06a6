//! Operating mode: whether downloads are intercepted and how the agent is told to treat them.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Tri-state operating mode, persisted as an integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Interception off; the browser handles every download.
    Disabled,
    /// Links are added to the agent without starting them.
    Manual,
    /// Links are added to the agent and started immediately.
    #[default]
    Auto,
}

impl Mode {
    /// All modes in toggle order.
    pub const ALL: [Mode; 3] = [Mode::Disabled, Mode::Manual, Mode::Auto];

    /// Integer stored in the settings table.
    #[must_use]
    pub const fn as_stored(self) -> i64 {
        match self {
            Self::Disabled => 0,
            Self::Manual => 1,
            Self::Auto => 2,
        }
    }

    /// Decodes a stored value. Absent or unknown values fall back to [`Mode::Auto`].
    #[must_use]
    pub fn from_stored(value: Option<i64>) -> Self {
        match value {
            Some(0) => Self::Disabled,
            Some(1) => Self::Manual,
            _ => Self::Auto,
        }
    }

    /// Next mode in the Disabled → Manual → Auto → Disabled cycle.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Disabled => Self::Manual,
            Self::Manual => Self::Auto,
            Self::Auto => Self::Disabled,
        }
    }

    /// Whether download-created events should be observed at all.
    #[must_use]
    pub const fn intercepts(self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Whether the agent should start links right away.
    ///
    /// Only Manual holds links back; a direct submission made while
    /// Disabled still starts.
    #[must_use]
    pub const fn autostart(self) -> bool {
        !matches!(self, Self::Manual)
    }

    /// Toolbar icon path for this mode.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Disabled => "icons/icon-128-disabled.png",
            Self::Manual => "icons/icon-128.png",
            Self::Auto => "icons/icon-128-auto.png",
        }
    }

    /// Toolbar tooltip for this mode.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Disabled => "Download Disabled",
            Self::Manual => "Manual Mode",
            Self::Auto => "Auto Mode",
        }
    }

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Manual => "manual",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" | "0" => Ok(Self::Disabled),
            "manual" | "1" => Ok(Self::Manual),
            "auto" | "2" => Ok(Self::Auto),
            other => Err(format!(
                "unknown mode '{other}' (expected disabled, manual or auto)"
            )),
        }
    }
}

/// Mode shared between the controller (writer) and the engine (reader).
#[derive(Debug)]
pub struct SharedMode(AtomicU8);

impl SharedMode {
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        Self(AtomicU8::new(encode(mode)))
    }

    #[must_use]
    pub fn get(&self) -> Mode {
        decode(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, mode: Mode) {
        self.0.store(encode(mode), Ordering::SeqCst);
    }
}

impl Default for SharedMode {
    fn default() -> Self {
        Self::new(Mode::default())
    }
}

fn encode(mode: Mode) -> u8 {
    match mode {
        Mode::Disabled => 0,
        Mode::Manual => 1,
        Mode::Auto => 2,
    }
}

fn decode(raw: u8) -> Mode {
    Mode::from_stored(Some(i64::from(raw)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_cycle_order_is_fixed() {
        let mut mode = Mode::Disabled;
        let mut visited = Vec::new();
        for _ in 0..6 {
            mode = mode.next();
            visited.push(mode);
        }
        assert_eq!(
            visited,
            vec![
                Mode::Manual,
                Mode::Auto,
                Mode::Disabled,
                Mode::Manual,
                Mode::Auto,
                Mode::Disabled
            ]
        );
    }

    #[test]
    fn test_mode_from_stored_defaults_to_auto() {
        assert_eq!(Mode::from_stored(None), Mode::Auto);
        assert_eq!(Mode::from_stored(Some(7)), Mode::Auto);
        assert_eq!(Mode::from_stored(Some(-1)), Mode::Auto);
        assert_eq!(Mode::from_stored(Some(0)), Mode::Disabled);
        assert_eq!(Mode::from_stored(Some(1)), Mode::Manual);
    }

    #[test]
    fn test_mode_stored_value_round_trips() {
        for mode in Mode::ALL {
            assert_eq!(Mode::from_stored(Some(mode.as_stored())), mode);
        }
    }

    #[test]
    fn test_mode_indicator_is_distinct_per_mode() {
        assert_ne!(Mode::Disabled.icon(), Mode::Manual.icon());
        assert_ne!(Mode::Manual.icon(), Mode::Auto.icon());
        assert_eq!(Mode::Disabled.title(), "Download Disabled");
        assert_eq!(Mode::Manual.title(), "Manual Mode");
        assert_eq!(Mode::Auto.title(), "Auto Mode");
    }

    #[test]
    fn test_mode_autostart_only_held_back_in_manual() {
        assert!(!Mode::Manual.autostart());
        assert!(Mode::Auto.autostart());
        assert!(Mode::Disabled.autostart());
    }

    #[test]
    fn test_mode_parse_accepts_labels_and_numbers() {
        assert_eq!("Manual".parse::<Mode>().unwrap(), Mode::Manual);
        assert_eq!("off".parse::<Mode>().unwrap(), Mode::Disabled);
        assert_eq!("2".parse::<Mode>().unwrap(), Mode::Auto);
        assert!("sometimes".parse::<Mode>().is_err());
    }

    #[test]
    fn test_shared_mode_set_and_get() {
        let shared = SharedMode::default();
        assert_eq!(shared.get(), Mode::Auto);
        shared.set(Mode::Disabled);
        assert_eq!(shared.get(), Mode::Disabled);
    }
}
