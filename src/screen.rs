//! Backlight power control

use std::fs;
use std::io;
use std::path::PathBuf;

/// Power of the display backlight
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BacklightPower {
    On,
    Off,
}

impl BacklightPower {
    pub fn toggled(self) -> Self {
        match self {
            BacklightPower::On => BacklightPower::Off,
            BacklightPower::Off => BacklightPower::On,
        }
    }

    /// `bl_power` uses `1` for blanked and `0` for powered.
    fn from_bl_power(raw: &str) -> Self {
        if raw.trim() == "1" {
            BacklightPower::Off
        } else {
            BacklightPower::On
        }
    }

    fn as_bl_power(self) -> &'static str {
        match self {
            BacklightPower::On => "0",
            BacklightPower::Off => "1",
        }
    }
}

/// Anything that can read and switch the screen power
pub trait ScreenPower: Send + Sync + 'static {
    fn read(&self) -> io::Result<BacklightPower>;
    fn write(&self, power: BacklightPower) -> io::Result<()>;
}

/// Sysfs `bl_power` pseudo-file
#[derive(Clone, Debug)]
pub struct SysfsBacklight {
    path: PathBuf,
}

impl SysfsBacklight {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ScreenPower for SysfsBacklight {
    fn read(&self) -> io::Result<BacklightPower> {
        let raw = fs::read_to_string(&self.path)?;
        Ok(BacklightPower::from_bl_power(&raw))
    }

    fn write(&self, power: BacklightPower) -> io::Result<()> {
        fs::write(&self.path, power.as_bl_power())
    }
}
