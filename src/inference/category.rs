//! Severity categories for forecast values

use serde::{Deserialize, Serialize};
use std::fmt;

/// Air-quality severity band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    /// Band containing `value`; upper breakpoints are inclusive
    pub fn from_value(value: f64) -> Self {
        match value {
            v if v <= 50.0 => AqiCategory::Good,
            v if v <= 100.0 => AqiCategory::Moderate,
            v if v <= 150.0 => AqiCategory::UnhealthyForSensitiveGroups,
            v if v <= 200.0 => AqiCategory::Unhealthy,
            v if v <= 300.0 => AqiCategory::VeryUnhealthy,
            _ => AqiCategory::Hazardous,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }

    /// Health guidance shown alongside a forecast
    pub fn recommendation(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Air quality is good. Normal activities can be continued.",
            AqiCategory::Moderate => {
                "Air quality is acceptable. Sensitive individuals should consider limiting outdoor activities."
            }
            AqiCategory::UnhealthyForSensitiveGroups => {
                "Sensitive groups should reduce outdoor activities and wear masks."
            }
            AqiCategory::Unhealthy => "Everyone should limit outdoor activities and use air purifiers indoors.",
            AqiCategory::VeryUnhealthy => "Avoid outdoor activities. Stay indoors with air purification.",
            AqiCategory::Hazardous => "Emergency conditions. Everyone should stay indoors and use air purifiers.",
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Category and guidance for a forecast value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub value: f64,
    pub category: AqiCategory,
    pub recommendation: String,
}

pub fn classify(value: f64) -> Classification {
    let category = AqiCategory::from_value(value);
    Classification {
        value,
        category,
        recommendation: category.recommendation().to_string(),
    }
}
