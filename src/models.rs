use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single daily HRV reading in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Calendar day the reading belongs to
    pub date: NaiveDate,

    /// HRV value (typically RMSSD) in milliseconds, strictly positive
    pub value: f64,
}

impl Reading {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Reading { date, value }
    }

    /// A reading value must be a finite, strictly positive number
    pub fn is_valid_value(value: f64) -> bool {
        value.is_finite() && value > 0.0
    }
}

/// Training command issued for a day
///
/// `Learning` is issued while the baseline does not yet hold enough history
/// to classify; it is never asked about in compliance prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Command {
    Rest,
    Build,
    Perform,
    Learning,
}

impl Command {
    /// Whether a real recommendation was issued (anything but `Learning`)
    pub fn is_recommendation(&self) -> bool {
        !matches!(self, Command::Learning)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Rest => "REST",
            Command::Build => "BUILD",
            Command::Perform => "PERFORM",
            Command::Learning => "LEARNING",
        }
    }

    /// Static guidance shown alongside the command
    pub fn prescription(&self) -> &'static Prescription {
        match self {
            Command::Rest => &REST_PRESCRIPTION,
            Command::Build => &BUILD_PRESCRIPTION,
            Command::Perform => &PERFORM_PRESCRIPTION,
            Command::Learning => &LEARNING_PRESCRIPTION,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "REST" => Ok(Command::Rest),
            "BUILD" => Ok(Command::Build),
            "PERFORM" => Ok(Command::Perform),
            "LEARNING" => Ok(Command::Learning),
            _ => Err(format!("Invalid command: {}", s)),
        }
    }
}

/// Prescription text attached to a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prescription {
    pub headline: &'static str,
    pub prescription: &'static str,
    pub guidance: [&'static str; 3],
}

static REST_PRESCRIPTION: Prescription = Prescription {
    headline: "REST",
    prescription: "Light movement only. Walk, stretch, or mobilize. No intense training today.",
    guidance: [
        "Prioritize 8+ hours of sleep tonight",
        "Keep heart rate under 120 bpm",
        "Focus on nutrition and hydration",
    ],
};

static BUILD_PRESCRIPTION: Prescription = Prescription {
    headline: "BUILD",
    prescription: "Standard training day. Follow your program as planned.",
    guidance: [
        "Execute your scheduled workout",
        "Train at normal intensity",
        "Listen to your body for minor adjustments",
    ],
};

static PERFORM_PRESCRIPTION: Prescription = Prescription {
    headline: "PERFORM",
    prescription: "System primed. Push hard today — PRs, competition, max effort.",
    guidance: [
        "Go for personal records",
        "High intensity is welcomed",
        "Your body can handle more today",
    ],
};

static LEARNING_PRESCRIPTION: Prescription = Prescription {
    headline: "LEARNING",
    prescription: "Building your baseline. Keep logging HRV daily.",
    guidance: [
        "Train normally while we learn your patterns",
        "Log HRV at the same time each morning",
        "Preview commands start after 3 days",
    ],
};

/// Whether the user followed the previous day's command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Followed {
    Yes,
    Partial,
    No,
}

impl fmt::Display for Followed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Followed::Yes => write!(f, "yes"),
            Followed::Partial => write!(f, "partial"),
            Followed::No => write!(f, "no"),
        }
    }
}

impl FromStr for Followed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yes" | "y" => Ok(Followed::Yes),
            "partial" | "p" => Ok(Followed::Partial),
            "no" | "n" => Ok(Followed::No),
            _ => Err(format!("Invalid compliance answer: {} (expected yes, partial or no)", s)),
        }
    }
}

/// Self-reported energy level for a day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Energy {
    Low,
    Normal,
    High,
    Skipped,
}

impl fmt::Display for Energy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Energy::Low => write!(f, "low"),
            Energy::Normal => write!(f, "normal"),
            Energy::High => write!(f, "high"),
            Energy::Skipped => write!(f, "skipped"),
        }
    }
}

impl FromStr for Energy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Energy::Low),
            "normal" => Ok(Energy::Normal),
            "high" => Ok(Energy::High),
            "skip" | "skipped" => Ok(Energy::Skipped),
            _ => Err(format!(
                "Invalid energy level: {} (expected low, normal, high or skipped)",
                s
            )),
        }
    }
}

/// Per-day command and compliance record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceEntry {
    pub date: NaiveDate,
    pub command: Command,
    #[serde(default)]
    pub followed: Option<Followed>,
    #[serde(default)]
    pub energy: Option<Energy>,
}

impl ComplianceEntry {
    pub fn new(date: NaiveDate, command: Command) -> Self {
        ComplianceEntry {
            date,
            command,
            followed: None,
            energy: None,
        }
    }
}

/// Device or app the readings come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HrvSourceKind {
    Whoop,
    Apple,
    Oura,
    Garmin,
    Welltory,
    #[serde(other)]
    Other,
}

impl HrvSourceKind {
    pub const ALL: [HrvSourceKind; 6] = [
        HrvSourceKind::Whoop,
        HrvSourceKind::Apple,
        HrvSourceKind::Oura,
        HrvSourceKind::Garmin,
        HrvSourceKind::Welltory,
        HrvSourceKind::Other,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            HrvSourceKind::Whoop => "whoop",
            HrvSourceKind::Apple => "apple",
            HrvSourceKind::Oura => "oura",
            HrvSourceKind::Garmin => "garmin",
            HrvSourceKind::Welltory => "welltory",
            HrvSourceKind::Other => "other",
        }
    }

    pub fn default_label(&self) -> &'static str {
        match self {
            HrvSourceKind::Whoop => "WHOOP",
            HrvSourceKind::Apple => "Apple Watch",
            HrvSourceKind::Oura => "Oura",
            HrvSourceKind::Garmin => "Garmin",
            HrvSourceKind::Welltory => "Welltory (Phone Camera)",
            HrvSourceKind::Other => "Other",
        }
    }
}

impl FromStr for HrvSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        HrvSourceKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.id() == lowered)
            .ok_or_else(|| format!("Unknown HRV source: {}", s))
    }
}

/// Where readings originate, as `{type, label}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HrvSource {
    #[serde(rename = "type")]
    pub kind: HrvSourceKind,
    pub label: String,
}

impl HrvSource {
    /// Build a source from the catalogue; `Other` takes a free-text label
    pub fn new(kind: HrvSourceKind, custom_label: Option<String>) -> Self {
        let label = match (kind, custom_label) {
            (HrvSourceKind::Other, Some(text)) if !text.trim().is_empty() => {
                text.trim().to_string()
            }
            _ => kind.default_label().to_string(),
        };
        HrvSource { kind, label }
    }
}
