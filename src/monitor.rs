use serde::{Deserialize, Serialize};

use crate::topology::AdapterId;

/// Refresh rate kept as the exact rational the OS reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefreshRate {
    pub numerator: u32,
    pub denominator: u32,
}

impl RefreshRate {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        RefreshRate { numerator, denominator }
    }

    pub fn hz(&self) -> f64 {
        if self.denominator == 0 {
            return 0.0;
        }
        let hz = self.numerator as f64 / self.denominator as f64;
        (hz * 10.0).round() / 10.0
    }
}

impl std::fmt::Display for RefreshRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}Hz", self.hz())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    #[default]
    Identity,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Rotation {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            2 => Rotation::Rotate90,
            3 => Rotation::Rotate180,
            4 => Rotation::Rotate270,
            _ => Rotation::Identity,
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            Rotation::Identity => 1,
            Rotation::Rotate90 => 2,
            Rotation::Rotate180 => 3,
            Rotation::Rotate270 => 4,
        }
    }

    /// Width and height swap on screen for portrait orientations.
    pub fn is_portrait(self) -> bool {
        matches!(self, Rotation::Rotate90 | Rotation::Rotate270)
    }

    pub fn label(self) -> &'static str {
        match self {
            Rotation::Identity => "",
            Rotation::Rotate90 => "Portrait",
            Rotation::Rotate180 => "Flipped",
            Rotation::Rotate270 => "Portrait Flipped",
        }
    }
}

/// Connector the target is attached through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputTechnology {
    Other,
    Hd15,
    Dvi,
    Hdmi,
    Lvds,
    DisplayportExternal,
    DisplayportEmbedded,
    DisplayportUsbTunnel,
    Miracast,
    IndirectWired,
    IndirectVirtual,
    Internal,
    #[default]
    #[serde(other)]
    Unknown,
}

impl OutputTechnology {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0xFFFF_FFFF => OutputTechnology::Other,
            0 => OutputTechnology::Hd15,
            4 => OutputTechnology::Dvi,
            5 => OutputTechnology::Hdmi,
            6 => OutputTechnology::Lvds,
            10 => OutputTechnology::DisplayportExternal,
            11 => OutputTechnology::DisplayportEmbedded,
            15 => OutputTechnology::Miracast,
            16 => OutputTechnology::IndirectWired,
            17 => OutputTechnology::IndirectVirtual,
            18 => OutputTechnology::DisplayportUsbTunnel,
            0x8000_0000 => OutputTechnology::Internal,
            _ => OutputTechnology::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OutputTechnology::Other => "Other",
            OutputTechnology::Hd15 => "VGA",
            OutputTechnology::Dvi => "DVI",
            OutputTechnology::Hdmi => "HDMI",
            OutputTechnology::Lvds => "LVDS",
            OutputTechnology::DisplayportExternal => "DisplayPort",
            OutputTechnology::DisplayportEmbedded => "eDP",
            OutputTechnology::DisplayportUsbTunnel => "USB-C DisplayPort",
            OutputTechnology::Miracast => "Miracast",
            OutputTechnology::IndirectWired => "Indirect (wired)",
            OutputTechnology::IndirectVirtual => "Indirect (virtual)",
            OutputTechnology::Internal => "Internal",
            OutputTechnology::Unknown => "Unknown",
        }
    }
}

/// What identifies a physical display across reboots and reconnects.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorIdentity {
    pub manufacturer: String,
    pub product_code: u16,
    #[serde(default)]
    pub friendly_name: String,
    #[serde(default)]
    pub device_path: String,
    #[serde(default)]
    pub connector: OutputTechnology,
}

/// Ids observed at capture time. Only ever a matching hint: the OS reassigns them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolatileIds {
    pub adapter_id: AdapterId,
    pub source_id: u32,
    pub target_id: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(flatten)]
    pub identity: MonitorIdentity,
    pub active: bool,
    #[serde(default)]
    pub primary: bool,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub refresh_rate: RefreshRate,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default)]
    pub hint: VolatileIds,
}

impl MonitorConfig {
    pub fn display_name(&self) -> String {
        if self.identity.friendly_name.is_empty() {
            format!("{} ({})", self.identity.manufacturer, self.identity.product_code)
        } else {
            self.identity.friendly_name.clone()
        }
    }

    pub fn resolution_string(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    pub fn rotation_string(&self) -> String {
        match self.rotation {
            Rotation::Identity => "Normal".to_string(),
            r => r.label().to_string(),
        }
    }

    /// Footprint on the virtual desktop, accounting for rotation.
    pub fn desktop_size(&self) -> (u32, u32) {
        if self.rotation.is_portrait() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    pub fn status_string(&self) -> String {
        if !self.active {
            "Disabled".to_string()
        } else if self.primary {
            "Active [Primary]".to_string()
        } else {
            "Active".to_string()
        }
    }
}
