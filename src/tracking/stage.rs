//! Model version lifecycle stages

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lifecycle stage of a trained model version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStage {
    /// Not assigned to any stage
    #[default]
    None,
    /// Freshly trained, not yet validated
    Development,
    /// Being validated against live data
    Staging,
    /// Serving forecasts
    Production,
    /// Retired
    Archived,
}

/// Forward order a version moves through on its way to production
const FORWARD: [ModelStage; 3] = [ModelStage::Development, ModelStage::Staging, ModelStage::Production];

impl ModelStage {
    /// Check if transition to target stage is valid
    pub fn can_transition_to(&self, target: ModelStage) -> bool {
        match (self, target) {
            (_, ModelStage::Archived) => true,
            (ModelStage::None, ModelStage::Development) => true,
            (ModelStage::Development, ModelStage::Staging) => true,
            (ModelStage::Staging, ModelStage::Production) => true,
            // rollback
            (ModelStage::Production, ModelStage::Staging) => true,
            // rejected in validation
            (ModelStage::Staging, ModelStage::Development) => true,
            // restore
            (ModelStage::Archived, ModelStage::Development) => true,
            (a, b) if *a == b => true,
            _ => false,
        }
    }

    /// Valid single-step transitions leading from `self` to `target`
    ///
    /// Moving forward walks the lifecycle one stage at a time
    /// (e.g. `None → Development → Staging → Production`). Returns `None`
    /// when `target` cannot be reached.
    pub fn path_to(self, target: ModelStage) -> Option<Vec<ModelStage>> {
        if self == target {
            return Some(Vec::new());
        }
        if self.can_transition_to(target) {
            return Some(vec![target]);
        }
        let target_pos = FORWARD.iter().position(|s| *s == target)?;
        let start = match self {
            ModelStage::None | ModelStage::Archived => 0,
            other => FORWARD.iter().position(|s| *s == other)? + 1,
        };
        if start > target_pos {
            return None;
        }
        Some(FORWARD[start..=target_pos].to_vec())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelStage::None => "None",
            ModelStage::Development => "Development",
            ModelStage::Staging => "Staging",
            ModelStage::Production => "Production",
            ModelStage::Archived => "Archived",
        }
    }
}

impl std::fmt::Display for ModelStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModelStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(ModelStage::None),
            "development" | "dev" => Ok(ModelStage::Development),
            "staging" => Ok(ModelStage::Staging),
            "production" | "prod" => Ok(ModelStage::Production),
            "archived" => Ok(ModelStage::Archived),
            other => Err(format!("unknown model stage: {other}")),
        }
    }
}
