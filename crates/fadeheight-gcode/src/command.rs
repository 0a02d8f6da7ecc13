//! The injected `M420` command.

use std::fmt;

/// Mnemonic searched for in the machine start G-code. A user-supplied
/// `M420` suppresses injection.
pub const M420_MNEMONIC: &str = "M420 ";

/// Line appended to block 0 of a plate once it carries the command.
pub const PROCESSED_MARKER: &str = ";FADEHEIGHTPROCESSED\n";

/// Trailing comment of the injected line.
pub const COMMAND_COMMENT: &str = "added by FadeHeightSettingPlugin";

/// Bed leveling state and fade height, rendered as an `M420` line.
///
/// ```ignore
/// let cmd = FadeHeightCommand::new(true, 3.7);
/// assert_eq!(cmd.to_string(), "M420 S1 Z3 ;added by FadeHeightSettingPlugin\n");
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeHeightCommand {
    /// Bed leveling correction on/off.
    pub enabled: bool,
    /// Fade height (mm).
    pub fade_height_mm: f64,
}

impl FadeHeightCommand {
    /// Create a command.
    pub fn new(enabled: bool, fade_height_mm: f64) -> Self {
        Self {
            enabled,
            fade_height_mm,
        }
    }

    /// Fade height as embedded: truncated toward zero, whole millimeters.
    /// Non-finite heights embed as 0.
    pub fn fade_height_z(&self) -> i64 {
        if self.fade_height_mm.is_finite() {
            self.fade_height_mm.trunc() as i64
        } else {
            0
        }
    }

    /// Leveling off and no fade height: the command changes nothing.
    pub fn is_inactive(&self) -> bool {
        !self.enabled && self.fade_height_z() == 0
    }
}

impl fmt::Display for FadeHeightCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "M420 S{} Z{} ;{}",
            u8::from(self.enabled),
            self.fade_height_z(),
            COMMAND_COMMENT
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_format() {
        assert_eq!(
            FadeHeightCommand::new(true, 3.7).to_string(),
            "M420 S1 Z3 ;added by FadeHeightSettingPlugin\n"
        );
        assert_eq!(
            FadeHeightCommand::new(false, 10.0).to_string(),
            "M420 S0 Z10 ;added by FadeHeightSettingPlugin\n"
        );
    }

    #[test]
    fn test_truncation() {
        assert_eq!(FadeHeightCommand::new(true, 3.99).fade_height_z(), 3);
        assert_eq!(FadeHeightCommand::new(true, 0.99).fade_height_z(), 0);
        assert_eq!(FadeHeightCommand::new(true, -0.5).fade_height_z(), 0);
        assert_eq!(FadeHeightCommand::new(true, -2.5).fade_height_z(), -2);
        assert!(FadeHeightCommand::new(true, 3.99).to_string().contains(" Z3 "));
    }

    #[test]
    fn test_non_finite_height() {
        assert_eq!(FadeHeightCommand::new(true, f64::NAN).fade_height_z(), 0);
        assert_eq!(FadeHeightCommand::new(true, f64::INFINITY).fade_height_z(), 0);
    }

    #[test]
    fn test_inactive() {
        assert!(FadeHeightCommand::new(false, 0.0).is_inactive());
        assert!(FadeHeightCommand::new(false, 0.4).is_inactive());
        assert!(!FadeHeightCommand::new(true, 0.0).is_inactive());
        assert!(!FadeHeightCommand::new(false, 5.0).is_inactive());
    }

    #[test]
    fn test_mnemonic_matches_command() {
        assert!(FadeHeightCommand::new(true, 1.0).to_string().starts_with(M420_MNEMONIC));
        assert!(PROCESSED_MARKER.ends_with('\n'));
    }
}
