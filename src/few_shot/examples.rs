use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::activations::ActivationRecord;

/// A worked (explanation, scored tokens) pair shown ahead of the real query.
#[derive(Debug, Clone, PartialEq)]
pub struct FewShotExample {
    pub explanation: String,
    pub activation_records: Vec<ActivationRecord>,
    /// Per record, the first index whose activation is revealed in the prompt.
    pub first_revealed_activation_indices: Option<Vec<usize>>,
    /// Set on single-token prediction examples only.
    pub token_index_to_score: Option<usize>,
}

/// The fixed, curated example sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FewShotExampleSet {
    /// Legacy set built for the all-at-once prompt. Uses partial reveal and
    /// carries no single-token example.
    Original,
    Newer,
    Test,
}

impl FewShotExampleSet {
    pub fn examples(&self) -> Vec<FewShotExample> {
        match self {
            FewShotExampleSet::Original => original_examples(),
            FewShotExampleSet::Newer => newer_examples(),
            FewShotExampleSet::Test => test_examples(),
        }
    }

    pub fn single_token_prediction_example(&self) -> Option<FewShotExample> {
        match self {
            FewShotExampleSet::Original => None,
            FewShotExampleSet::Newer => Some(FewShotExample {
                explanation: "instances of the word \"chemistry\" or related scientific terms".to_string(),
                activation_records: vec![record(&[
                    ("The", 0.0),
                    (" lab", 1.2),
                    (" ran", 0.0),
                    (" a", 0.0),
                    (" chemistry", 9.6),
                    (" experiment", 3.1),
                ])],
                first_revealed_activation_indices: None,
                token_index_to_score: Some(4),
            }),
            FewShotExampleSet::Test => Some(FewShotExample {
                explanation: "the word \"cat\"".to_string(),
                activation_records: vec![record(&[("A", 0.0), (" cat", 8.0), (" sat", 0.0)])],
                first_revealed_activation_indices: None,
                token_index_to_score: Some(1),
            }),
        }
    }
}

impl fmt::Display for FewShotExampleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FewShotExampleSet::Original => "original",
            FewShotExampleSet::Newer => "newer",
            FewShotExampleSet::Test => "test",
        };
        f.write_str(name)
    }
}

impl FromStr for FewShotExampleSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(FewShotExampleSet::Original),
            "newer" => Ok(FewShotExampleSet::Newer),
            "test" => Ok(FewShotExampleSet::Test),
            other => Err(format!("invalid few-shot example set: {other}")),
        }
    }
}

fn record(pairs: &[(&str, f64)]) -> ActivationRecord {
    ActivationRecord {
        tokens: pairs.iter().map(|(t, _)| t.to_string()).collect(),
        activations: pairs.iter().map(|(_, a)| *a).collect(),
    }
}

fn original_examples() -> Vec<FewShotExample> {
    vec![
        FewShotExample {
            explanation: "vowels".to_string(),
            activation_records: vec![
                record(&[("a", 10.0), ("b", 0.0), ("c", 0.0)]),
                record(&[("d", 0.0), ("e", 10.0), ("f", 0.0)]),
            ],
            first_revealed_activation_indices: Some(vec![0, 1]),
            token_index_to_score: None,
        },
        FewShotExample {
            explanation: "days of the week".to_string(),
            activation_records: vec![
                record(&[("See", 0.0), (" you", 0.0), (" on", 0.5), (" Monday", 7.5), (".", 0.0)]),
                record(&[("Friday", 8.0), (" nights", 2.0), (" are", 0.0), (" fun", 0.0)]),
            ],
            first_revealed_activation_indices: Some(vec![3, 0]),
            token_index_to_score: None,
        },
    ]
}

fn newer_examples() -> Vec<FewShotExample> {
    vec![
        FewShotExample {
            explanation: "language related to something being groundbreaking".to_string(),
            activation_records: vec![
                record(&[
                    ("The", 0.0),
                    (" team", 0.0),
                    (" made", 0.4),
                    (" a", 0.0),
                    (" revolutionary", 6.8),
                    (" discovery", 2.1),
                    (".", 0.0),
                ]),
                record(&[
                    ("This", 0.0),
                    (" unprecedented", 7.3),
                    (" breakthrough", 7.9),
                    (" changed", 0.9),
                    (" medicine", 0.0),
                ]),
            ],
            first_revealed_activation_indices: None,
            token_index_to_score: None,
        },
        FewShotExample {
            explanation: "the closing parenthesis of a function call".to_string(),
            activation_records: vec![
                record(&[
                    ("print", 0.0),
                    ("(", 0.0),
                    ("x", 0.0),
                    (")", 4.5),
                    ("\n", 0.0),
                ]),
                record(&[
                    ("len", 0.0),
                    ("(", 0.0),
                    ("items", 0.0),
                    (")", 3.9),
                    (" >", 0.0),
                    (" 0", 0.0),
                ]),
            ],
            first_revealed_activation_indices: None,
            token_index_to_score: None,
        },
        FewShotExample {
            explanation: "years in the twentieth century".to_string(),
            activation_records: vec![record(&[
                ("In", 0.0),
                (" 1969", 5.2),
                (",", 0.0),
                (" and", 0.0),
                (" again", 0.0),
                (" in", 0.0),
                (" 2004", 0.6),
            ])],
            first_revealed_activation_indices: None,
            token_index_to_score: None,
        },
    ]
}

fn test_examples() -> Vec<FewShotExample> {
    vec![FewShotExample {
        explanation: "Canada".to_string(),
        activation_records: vec![record(&[
            ("Toronto", 4.0),
            (" is", 0.0),
            (" in", 0.0),
            (" Canada", 10.0),
        ])],
        first_revealed_activation_indices: None,
        token_index_to_score: None,
    }]
}
