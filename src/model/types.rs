//! Core type definitions for the player

use std::collections::HashMap;
use std::fmt;

/// Playback state as reported by the media engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Engine is up but nothing has started playing yet
    #[default]
    Opening,
    Playing,
    Paused,
    Stopped,
    Error,
}

impl PlaybackState {
    /// Stopped and Error end the run loop.
    pub fn is_terminal(self) -> bool {
        matches!(self, PlaybackState::Stopped | PlaybackState::Error)
    }
}

/// Why the run loop ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    Stopped,
    EngineError,
}

impl Termination {
    pub fn exit_code(self) -> u8 {
        match self {
            Termination::Stopped => 0,
            Termination::EngineError => 1,
        }
    }
}

/// Screen power as last commanded by the controller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenState {
    pub enabled: bool,
    /// Only set by a screen-off transition, consumed by the next screen-on.
    pub was_playing_before_off: bool,
}

impl Default for ScreenState {
    fn default() -> Self {
        Self {
            enabled: true,
            was_playing_before_off: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KioskCommand {
    TogglePlayPause,
    Next,
    Previous,
    ToggleScreen,
    Stop,
}

impl KioskCommand {
    /// Commands that stay active while the screen is off.
    pub fn allowed_with_screen_off(self) -> bool {
        matches!(self, KioskCommand::ToggleScreen | KioskCommand::Stop)
    }
}

impl fmt::Display for KioskCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KioskCommand::TogglePlayPause => "toggle-play-pause",
            KioskCommand::Next => "next",
            KioskCommand::Previous => "previous",
            KioskCommand::ToggleScreen => "toggle-screen",
            KioskCommand::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// Key identifier to command table
#[derive(Clone, Debug)]
pub struct KeyMap {
    bindings: HashMap<String, KioskCommand>,
}

impl KeyMap {
    pub fn resolve(&self, key: &str) -> Option<KioskCommand> {
        self.bindings.get(key).copied()
    }
}

impl Default for KeyMap {
    /// Digit keys of the kiosk keypad: `1` moves forward, `2` moves back.
    fn default() -> Self {
        let bindings = [
            ("0", KioskCommand::TogglePlayPause),
            ("1", KioskCommand::Next),
            ("2", KioskCommand::Previous),
            ("3", KioskCommand::ToggleScreen),
            ("4", KioskCommand::Stop),
        ]
        .into_iter()
        .map(|(key, command)| (key.to_string(), command))
        .collect();

        Self { bindings }
    }
}
