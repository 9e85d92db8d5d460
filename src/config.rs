use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::few_shot::FewShotExampleSet;
use crate::prompt::PromptFormat;

/// Which simulator strategy to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationType {
    /// One echo call with `unknown` placeholders; distributions from logprobs.
    #[default]
    AllAtOnce,
    /// One call per token; distributions from logprobs.
    OneAtATime,
    /// One deterministic free-text (or JSON) call; point estimates only.
    LogprobFree,
}

impl SimulationType {
    pub fn default_prompt_format(&self) -> PromptFormat {
        match self {
            SimulationType::AllAtOnce => PromptFormat::None,
            SimulationType::OneAtATime => PromptFormat::InstructionFollowing,
            SimulationType::LogprobFree => PromptFormat::HarmonyV4,
        }
    }

    pub fn default_example_set(&self) -> FewShotExampleSet {
        match self {
            SimulationType::AllAtOnce => FewShotExampleSet::Original,
            SimulationType::OneAtATime | SimulationType::LogprobFree => FewShotExampleSet::Newer,
        }
    }
}

impl fmt::Display for SimulationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SimulationType::AllAtOnce => "all_at_once",
            SimulationType::OneAtATime => "one_at_a_time",
            SimulationType::LogprobFree => "logprob_free",
        };
        f.write_str(name)
    }
}

impl FromStr for SimulationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all_at_once" => Ok(SimulationType::AllAtOnce),
            "one_at_a_time" => Ok(SimulationType::OneAtATime),
            "logprob_free" => Ok(SimulationType::LogprobFree),
            other => Err(format!("invalid simulation type: {other}")),
        }
    }
}

fn default_max_concurrent() -> Option<usize> {
    Some(10)
}

fn default_json_mode() -> bool {
    true
}

/// Simulator selection. Unset format and example set fall back to the
/// strategy's defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub simulation_type: SimulationType,
    #[serde(default)]
    pub prompt_format: Option<PromptFormat>,
    #[serde(default)]
    pub few_shot_example_set: Option<FewShotExampleSet>,
    /// Bound on in-flight per-token requests.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: Option<usize>,
    /// Logprob-free encoding: JSON when true, delimited text otherwise.
    #[serde(default = "default_json_mode")]
    pub json_mode: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            simulation_type: SimulationType::default(),
            prompt_format: None,
            few_shot_example_set: None,
            max_concurrent: default_max_concurrent(),
            json_mode: default_json_mode(),
        }
    }
}

impl SimulatorConfig {
    pub fn for_type(simulation_type: SimulationType) -> Self {
        Self {
            simulation_type,
            ..Self::default()
        }
    }

    pub fn resolved_prompt_format(&self) -> PromptFormat {
        self.prompt_format
            .unwrap_or_else(|| self.simulation_type.default_prompt_format())
    }

    pub fn resolved_example_set(&self) -> FewShotExampleSet {
        self.few_shot_example_set
            .unwrap_or_else(|| self.simulation_type.default_example_set())
    }
}
