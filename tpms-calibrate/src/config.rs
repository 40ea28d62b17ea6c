use std::path::Path;

use serde::Deserialize;
use tpms_core::{
    CalibrationConfig, DEFAULT_ERROR_THRESHOLD, DEFAULT_SCALE_CANDIDATES, DEFAULT_TOP_HYPOTHESES,
    ReferencePolicy, RuleFamily, RuleRegistry,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub calibration: CalibrationSection,
    pub rules: RulesConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationSection {
    /// Scales tried for every discriminating rule
    pub scale_candidates: Vec<f64>,
    /// Fits with a summed error below this are shown in the report
    pub error_threshold: f64,
    /// Number of ranked hypotheses listed in the summary
    pub top_hypotheses: usize,
    /// Which two measurements anchor the delta computation
    pub reference: ReferencePolicy,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Rule families to enumerate
    pub families: Vec<RuleFamily>,
}

impl Config {
    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Engine settings with command-line overrides applied on top of the file.
    pub fn calibration(&self, overrides: &Overrides) -> CalibrationConfig {
        let scale_candidates = if overrides.scales.is_empty() {
            self.calibration.scale_candidates.clone()
        } else {
            overrides.scales.clone()
        };

        let families = if overrides.families.is_empty() {
            &self.rules.families
        } else {
            &overrides.families
        };

        CalibrationConfig {
            scale_candidates,
            error_threshold: overrides
                .threshold
                .unwrap_or(self.calibration.error_threshold),
            reference: overrides.reference.unwrap_or(self.calibration.reference),
            registry: RuleRegistry::with_families(families.iter().copied()),
            top_hypotheses: overrides
                .top
                .unwrap_or(self.calibration.top_hypotheses),
        }
    }
}

impl Default for CalibrationSection {
    fn default() -> Self {
        Self {
            scale_candidates: DEFAULT_SCALE_CANDIDATES.to_vec(),
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            top_hypotheses: DEFAULT_TOP_HYPOTHESES,
            reference: ReferencePolicy::FirstTwo,
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            families: RuleFamily::ALL.to_vec(),
        }
    }
}

/// Command-line settings that take precedence over the configuration file.
#[derive(Debug, Default, Clone, clap::Args)]
pub struct Overrides {
    /// Acceptance threshold for the summed error of a fit
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Scale candidate; repeat to replace the configured list
    #[arg(long = "scale")]
    pub scales: Vec<f64>,
    /// Rule family to enumerate (byte, u16-le, u16-be, u24-le, u24-be); repeatable
    #[arg(long = "family")]
    pub families: Vec<RuleFamily>,
    /// Reference pair as FIRST,SECOND measurement indices
    #[arg(long, value_parser = parse_reference)]
    pub reference: Option<ReferencePolicy>,
    /// Number of ranked hypotheses to list
    #[arg(long)]
    pub top: Option<usize>,
}

fn parse_reference(s: &str) -> Result<ReferencePolicy, String> {
    let (first, second) = s
        .split_once(',')
        .ok_or_else(|| format!("expected FIRST,SECOND, got {s:?}"))?;

    let index = |part: &str| {
        part.trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid measurement index {part:?}: {e}"))
    };

    Ok(ReferencePolicy::Pair {
        first: index(first)?,
        second: index(second)?,
    })
}
