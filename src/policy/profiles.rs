use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Device-vendor family with a distinct background-process policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vendor {
    Xiaomi,
    Huawei,
    Honor,
    Oppo,
    Vivo,
    OnePlus,
    Meizu,
    Samsung,
    Asus,
    Nokia,
    Sony,
    Generic,
}

/// Substrings identifying each family. First match wins.
const VENDOR_PATTERNS: &[(&str, Vendor)] = &[
    ("xiaomi", Vendor::Xiaomi),
    ("redmi", Vendor::Xiaomi),
    ("poco", Vendor::Xiaomi),
    ("honor", Vendor::Honor),
    ("huawei", Vendor::Huawei),
    ("oneplus", Vendor::OnePlus),
    ("oppo", Vendor::Oppo),
    ("realme", Vendor::Oppo),
    ("vivo", Vendor::Vivo),
    ("iqoo", Vendor::Vivo),
    ("meizu", Vendor::Meizu),
    ("samsung", Vendor::Samsung),
    ("asus", Vendor::Asus),
    ("nokia", Vendor::Nokia),
    ("hmd", Vendor::Nokia),
    ("sony", Vendor::Sony),
];

impl Vendor {
    /// Classify a raw manufacturer string (case-insensitive substring match).
    pub fn classify(manufacturer: &str) -> Self {
        let normalized = manufacturer.trim().to_lowercase();
        VENDOR_PATTERNS
            .iter()
            .find(|(pattern, _)| normalized.contains(pattern))
            .map_or(Self::Generic, |(_, vendor)| *vendor)
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Xiaomi => "Xiaomi",
            Self::Huawei => "Huawei",
            Self::Honor => "Honor",
            Self::Oppo => "OPPO",
            Self::Vivo => "Vivo",
            Self::OnePlus => "OnePlus",
            Self::Meizu => "Meizu",
            Self::Samsung => "Samsung",
            Self::Asus => "ASUS",
            Self::Nokia => "Nokia",
            Self::Sony => "Sony",
            Self::Generic => "Generic",
        }
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// How intrusive a health alert should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlertUrgency {
    Low,
    Medium,
    High,
}

/// Tuning constants and remediation text for one vendor family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManufacturerProfile {
    pub vendor: Vendor,
    /// Interval between health-monitor polls.
    pub check_interval: Duration,
    /// Suggested pause between recovery attempts, reported in diagnostics.
    /// Automatic attempts are paced by `check_interval` polls instead.
    pub retry_interval: Duration,
    /// Recovery attempts before the user must be told.
    pub max_retries: u32,
    /// The vendor defers ordinary timers; an exact wake timer is needed.
    pub requires_wake_timer: bool,
    /// The worker must run as persistent foreground work to survive.
    pub requires_persistent_foreground_work: bool,
    pub alert_urgency: AlertUrgency,
    /// User-facing steps, in order, to whitelist the app.
    pub remediation_steps: Vec<String>,
    /// Rough share of devices on which the worker survives a day untouched.
    /// Diagnostics only; never used for control decisions.
    pub survival_rate: f64,
}

const fn mins(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

fn steps(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl ManufacturerProfile {
    /// Profile for a raw manufacturer string. Never fails.
    pub fn for_vendor(manufacturer: &str) -> Self {
        Self::for_family(Vendor::classify(manufacturer))
    }

    pub fn for_family(vendor: Vendor) -> Self {
        match vendor {
            Vendor::Xiaomi => Self {
                vendor,
                check_interval: mins(8),
                retry_interval: Duration::from_secs(30),
                max_retries: 5,
                requires_wake_timer: true,
                requires_persistent_foreground_work: true,
                alert_urgency: AlertUrgency::High,
                remediation_steps: steps(&[
                    "Open Settings > Apps > Manage apps and select this app",
                    "Enable Autostart",
                    "Set Battery saver to \"No restrictions\"",
                    "Lock the app in the recent apps screen",
                ]),
                survival_rate: 0.35,
            },
            Vendor::Huawei => Self {
                vendor,
                check_interval: mins(8),
                retry_interval: Duration::from_secs(30),
                max_retries: 5,
                requires_wake_timer: true,
                requires_persistent_foreground_work: true,
                alert_urgency: AlertUrgency::High,
                remediation_steps: steps(&[
                    "Open Settings > Battery > App launch",
                    "Turn off \"Manage automatically\" for this app",
                    "Enable Auto-launch, Secondary launch and Run in background",
                ]),
                survival_rate: 0.30,
            },
            Vendor::Honor => Self {
                vendor,
                check_interval: mins(8),
                retry_interval: Duration::from_secs(30),
                max_retries: 5,
                requires_wake_timer: true,
                requires_persistent_foreground_work: true,
                alert_urgency: AlertUrgency::High,
                remediation_steps: steps(&[
                    "Open Settings > Battery > App launch",
                    "Switch this app to \"Manage manually\"",
                    "Allow Auto-launch and Run in background",
                ]),
                survival_rate: 0.35,
            },
            Vendor::Oppo => Self {
                vendor,
                check_interval: mins(10),
                retry_interval: Duration::from_secs(45),
                max_retries: 4,
                requires_wake_timer: true,
                requires_persistent_foreground_work: true,
                alert_urgency: AlertUrgency::High,
                remediation_steps: steps(&[
                    "Open Settings > Battery > More settings",
                    "Disable \"Optimise battery use\" for this app",
                    "Enable Auto launch in Settings > App management",
                ]),
                survival_rate: 0.45,
            },
            Vendor::Vivo => Self {
                vendor,
                check_interval: mins(10),
                retry_interval: Duration::from_secs(45),
                max_retries: 4,
                requires_wake_timer: true,
                requires_persistent_foreground_work: true,
                alert_urgency: AlertUrgency::High,
                remediation_steps: steps(&[
                    "Open Settings > Battery > Background power consumption management",
                    "Allow high background power consumption for this app",
                    "Enable Autostart in i Manager > App manager",
                ]),
                survival_rate: 0.40,
            },
            Vendor::OnePlus => Self {
                vendor,
                check_interval: mins(10),
                retry_interval: Duration::from_secs(45),
                max_retries: 4,
                requires_wake_timer: true,
                requires_persistent_foreground_work: true,
                alert_urgency: AlertUrgency::High,
                remediation_steps: steps(&[
                    "Open Settings > Battery > Battery optimisation",
                    "Select this app and choose \"Don't optimise\"",
                    "Disable \"Deep optimisation\" in advanced battery settings",
                ]),
                survival_rate: 0.50,
            },
            Vendor::Meizu => Self {
                vendor,
                check_interval: mins(10),
                retry_interval: Duration::from_secs(45),
                max_retries: 4,
                requires_wake_timer: true,
                requires_persistent_foreground_work: true,
                alert_urgency: AlertUrgency::High,
                remediation_steps: steps(&[
                    "Open Security > Permissions > Background management",
                    "Allow this app to run in the background",
                ]),
                survival_rate: 0.45,
            },
            Vendor::Samsung => Self {
                vendor,
                check_interval: mins(15),
                retry_interval: Duration::from_secs(60),
                max_retries: 4,
                requires_wake_timer: false,
                requires_persistent_foreground_work: true,
                alert_urgency: AlertUrgency::Medium,
                remediation_steps: steps(&[
                    "Open Settings > Battery and device care > Battery",
                    "Remove this app from \"Sleeping apps\" and \"Deep sleeping apps\"",
                    "Add it to \"Never sleeping apps\"",
                ]),
                survival_rate: 0.70,
            },
            Vendor::Asus => Self {
                vendor,
                check_interval: mins(12),
                retry_interval: Duration::from_secs(60),
                max_retries: 4,
                requires_wake_timer: true,
                requires_persistent_foreground_work: false,
                alert_urgency: AlertUrgency::Medium,
                remediation_steps: steps(&[
                    "Open Mobile Manager > PowerMaster > Auto-start manager",
                    "Allow this app to auto-start",
                ]),
                survival_rate: 0.55,
            },
            Vendor::Nokia => Self {
                vendor,
                check_interval: mins(12),
                retry_interval: Duration::from_secs(60),
                max_retries: 4,
                requires_wake_timer: true,
                requires_persistent_foreground_work: false,
                alert_urgency: AlertUrgency::Medium,
                remediation_steps: steps(&[
                    "Open Settings > Apps > this app > Battery",
                    "Disable \"Battery manager\" restrictions for this app",
                ]),
                survival_rate: 0.55,
            },
            Vendor::Sony => Self {
                vendor,
                check_interval: mins(15),
                retry_interval: Duration::from_secs(60),
                max_retries: 3,
                requires_wake_timer: false,
                requires_persistent_foreground_work: false,
                alert_urgency: AlertUrgency::Medium,
                remediation_steps: steps(&[
                    "Open Settings > Battery > STAMINA mode",
                    "Add this app to the exceptions list",
                ]),
                survival_rate: 0.75,
            },
            Vendor::Generic => Self {
                vendor,
                check_interval: mins(20),
                retry_interval: Duration::from_secs(120),
                max_retries: 3,
                requires_wake_timer: false,
                requires_persistent_foreground_work: false,
                alert_urgency: AlertUrgency::Low,
                remediation_steps: steps(&[
                    "Open Settings > Apps > this app > Battery",
                    "Choose \"Unrestricted\" battery usage",
                ]),
                survival_rate: 0.85,
            },
        }
    }

    /// Vendors whose process killer is known to ignore standard exemptions.
    pub fn is_aggressive(&self) -> bool {
        self.alert_urgency == AlertUrgency::High
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_substring_case_insensitive() {
        assert_eq!(Vendor::classify("Xiaomi"), Vendor::Xiaomi);
        assert_eq!(Vendor::classify("  REDMI Note 12 "), Vendor::Xiaomi);
        assert_eq!(Vendor::classify("samsung"), Vendor::Samsung);
        assert_eq!(Vendor::classify("HUAWEI"), Vendor::Huawei);
        assert_eq!(Vendor::classify("HONOR"), Vendor::Honor);
        assert_eq!(Vendor::classify("OnePlus"), Vendor::OnePlus);
        assert_eq!(Vendor::classify("realme"), Vendor::Oppo);
        assert_eq!(Vendor::classify("HMD Global"), Vendor::Nokia);
    }

    #[test]
    fn unknown_vendor_falls_back_to_generic() {
        assert_eq!(Vendor::classify("Google"), Vendor::Generic);
        assert_eq!(Vendor::classify(""), Vendor::Generic);
        let profile = ManufacturerProfile::for_vendor("Fairphone");
        assert_eq!(profile.vendor, Vendor::Generic);
        assert_eq!(profile.max_retries, 3);
        assert_eq!(profile.check_interval, Duration::from_secs(20 * 60));
        assert_eq!(profile.alert_urgency, AlertUrgency::Low);
    }

    #[test]
    fn generic_has_the_longest_interval_and_lowest_urgency() {
        let generic = ManufacturerProfile::for_family(Vendor::Generic);
        for (_, vendor) in VENDOR_PATTERNS {
            let profile = ManufacturerProfile::for_family(*vendor);
            assert!(profile.check_interval <= generic.check_interval, "{vendor}");
            assert!(profile.alert_urgency >= generic.alert_urgency, "{vendor}");
            assert!(profile.max_retries >= generic.max_retries, "{vendor}");
        }
    }

    #[test]
    fn aggressive_vendors_check_more_often() {
        let xiaomi = ManufacturerProfile::for_vendor("xiaomi");
        let samsung = ManufacturerProfile::for_vendor("samsung");
        assert!(xiaomi.is_aggressive());
        assert!(!samsung.is_aggressive());
        assert!(xiaomi.check_interval < samsung.check_interval);
    }

    #[test]
    fn every_profile_has_remediation_steps() {
        for (_, vendor) in VENDOR_PATTERNS {
            let profile = ManufacturerProfile::for_family(*vendor);
            assert!(!profile.remediation_steps.is_empty());
            assert!((0.0..=1.0).contains(&profile.survival_rate));
        }
    }
}
