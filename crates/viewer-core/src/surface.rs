use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Display tier of the device the viewer runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// Small or touch screens.
    Touch,
    #[default]
    Desktop,
}

impl DeviceClass {
    pub fn scale(self) -> f32 {
        match self {
            Self::Touch => 1.4,
            Self::Desktop => 1.2,
        }
    }

    /// Room kept below the page on touch screens for the navigation controls.
    pub fn extra_height_px(self) -> u32 {
        match self {
            Self::Touch => 50,
            Self::Desktop => 0,
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Touch => write!(f, "touch"),
            Self::Desktop => write!(f, "desktop"),
        }
    }
}

impl FromStr for DeviceClass {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "touch" | "mobile" => Ok(Self::Touch),
            "desktop" => Ok(Self::Desktop),
            other => Err(format!("unknown device class '{other}' (expected touch or desktop)")),
        }
    }
}
