//! Few-shot prompts for the three simulation strategies.

use serde_json::{json, Value};

use crate::activations::{
    calculate_max_activation, format_activation_records, format_sequences_for_simulation, normalize_activations,
    ActivationRecord,
};
use crate::error::{PromptError, SimulationError};
use crate::few_shot::{FewShotExample, FewShotExampleSet};
use crate::prompt::{Prompt, PromptBuilder, PromptFormat, Role, EXPLANATION_PREFIX};
use super::text_parser::{substitute_end_of_text, LINE_TERMINATOR};

const ALL_AT_ONCE_SYSTEM: &str = "We're studying neurons in a neural network.
Each neuron looks for some particular thing in a short document.
Look at summary of what the neuron does, and try to predict how it will fire on each token.

The activation format is token<tab>activation, activations go from 0 to 10, \"unknown\" indicates an unknown activation. Most activations will be 0.
";

const SINGLE_TOKEN_SYSTEM: &str = "We're studying neurons in a neural network. Each neuron looks for some particular thing in a short document. Look at  an explanation of what the neuron does, and try to predict its activations on a particular token.

The activation format is token<tab>activation, and activations range from 0 to 10. Most activations will be 0.

";

const SINGLE_TOKEN_TRANSITION: &str = "Now, we're going predict the activation of a new neuron on a single token, following the same rules as the examples above. Activations still range from 0 to 10.";

const LOGPROB_FREE_SYSTEM: &str = "We're studying neurons in a neural network. Each neuron looks for some particular thing in a short document. Look at an explanation of what the neuron does, and try to predict its activations on a particular token.

The activation format is token<tab>activation, and activations range from 0 to 10. Most activations will be 0.
For each sequence, you will see the tokens in the sequence where the activations are left blank. You will print the exact same tokens verbatim, but with the activations filled in according to the explanation.
";

const LOGPROB_FREE_JSON_SYSTEM: &str = "We're studying neurons in a neural network. Each neuron looks for certain things in a short document. Your task is to read the explanation of what the neuron does, and predict the neuron's activations for each token in the document.

For each document, you will see the full text of the document, then the tokens in the document with the activation left blank. You will print, in valid json, the exact same tokens verbatim, but with the activation values filled in according to the explanation. Pay special attention to the explanation's description of the context and order of tokens or words.

Fill out the activation values from 0 to 10. Please think carefully.
";

fn explanation_header(neuron: usize, explanation: &str) -> String {
    format!("Neuron {neuron}\nExplanation of neuron {neuron} behavior: {EXPLANATION_PREFIX} {explanation}")
}

/// Prompt scored in one echo call: every subject token is listed with an
/// `unknown` activation after the final `<start>` marker.
pub fn make_all_at_once_prompt(
    explanation: &str,
    tokens: &[String],
    example_set: FewShotExampleSet,
    format: PromptFormat,
) -> Result<Prompt, PromptError> {
    let mut builder = PromptBuilder::new();
    builder.add_message(Role::System, ALL_AT_ONCE_SYSTEM);

    let examples = example_set.examples();
    for (i, example) in examples.iter().enumerate() {
        builder.add_message(Role::User, format!("\n\n{}", explanation_header(i + 1, &example.explanation)));
        let formatted = format_activation_records(
            &example.activation_records,
            calculate_max_activation(&example.activation_records),
            example.first_revealed_activation_indices.as_deref(),
        );
        builder.add_message(Role::Assistant, format!("\nActivations: {formatted}\n"));
    }

    builder.add_message(
        Role::User,
        format!("\n\n{}", explanation_header(examples.len() + 1, explanation.trim())),
    );
    builder.add_message(
        Role::Assistant,
        format!("\nActivations: {}", format_sequences_for_simulation(&[tokens])),
    );
    builder.build(format, false)
}

fn add_single_token_subprompt(
    builder: &mut PromptBuilder,
    record: &ActivationRecord,
    neuron: usize,
    explanation: &str,
    token_index_to_score: usize,
    end_of_prompt: bool,
) {
    let trimmed = record.truncated_through(token_index_to_score);
    let last_token = trimmed.tokens.last().map(String::as_str).unwrap_or_default();
    builder.add_message(
        Role::User,
        format!(
            "\n{}\nText:\n{}\n\nLast token in the text:\n{}\n\nLast token activation, considering the token in the context in which it appeared in the text:\n",
            explanation_header(neuron, explanation.trim()),
            trimmed.tokens.concat(),
            last_token,
        ),
    );

    if !end_of_prompt {
        let normalized = normalize_activations(
            &trimmed.activations,
            calculate_max_activation(std::slice::from_ref(record)),
        );
        let last = normalized.last().copied().unwrap_or(0);
        builder.add_message(Role::Assistant, format!("{last}\n\n"));
    }
}

/// Prompt asking for the activation of `tokens[token_index_to_score]` alone,
/// given the text up to and including it.
pub fn make_single_token_prompt(
    explanation: &str,
    tokens: &[String],
    token_index_to_score: usize,
    example_set: FewShotExampleSet,
    format: PromptFormat,
) -> Result<Prompt, SimulationError> {
    let single_token_example: FewShotExample = example_set
        .single_token_prediction_example()
        .ok_or(SimulationError::MissingSingleTokenExample(example_set))?;
    let example_index = single_token_example
        .token_index_to_score
        .ok_or(SimulationError::MissingSingleTokenExample(example_set))?;
    let example_record = single_token_example
        .activation_records
        .first()
        .ok_or(SimulationError::MissingSingleTokenExample(example_set))?;

    let mut builder = PromptBuilder::new();
    builder.add_message(Role::System, SINGLE_TOKEN_SYSTEM);

    let examples = example_set.examples();
    for (i, example) in examples.iter().enumerate() {
        builder.add_message(Role::User, format!("{}\n", explanation_header(i + 1, &example.explanation)));
        let formatted = format_activation_records(
            &example.activation_records,
            calculate_max_activation(&example.activation_records),
            None,
        );
        builder.add_message(Role::Assistant, format!("Activations: {formatted}\n\n"));
    }

    builder.add_message(Role::System, SINGLE_TOKEN_TRANSITION);
    add_single_token_subprompt(
        &mut builder,
        example_record,
        examples.len() + 1,
        explanation,
        example_index,
        false,
    );

    let subject = ActivationRecord::unscored(tokens);
    add_single_token_subprompt(
        &mut builder,
        &subject,
        examples.len() + 2,
        explanation,
        token_index_to_score,
        true,
    );
    Ok(builder.build(format, true)?)
}

/// One `token\tvalue༗` line per token; values are blank unless `max_activation` is given.
pub fn format_record_for_logprob_free_simulation(record: &ActivationRecord, max_activation: Option<f64>) -> String {
    let normalized = max_activation.map(|max| normalize_activations(&record.activations, max));
    let mut out = String::new();
    for (i, token) in record.tokens.iter().enumerate() {
        let token = substitute_end_of_text(token);
        let value = normalized
            .as_ref()
            .and_then(|n| n.get(i))
            .map(|v| v.to_string())
            .unwrap_or_default();
        out.push_str(&format!("{token}\t{value}{LINE_TERMINATOR}"));
    }
    out
}

/// `{to_find, document, activations: [{token, activation}]}`, activations
/// null unless `max_activation` is given.
pub fn format_record_for_logprob_free_simulation_json(
    explanation: &str,
    record: &ActivationRecord,
    max_activation: Option<f64>,
) -> String {
    let normalized = max_activation.map(|max| normalize_activations(&record.activations, max));
    let shown: Vec<&str> = record.tokens.iter().map(|t| substitute_end_of_text(t)).collect();
    let activations: Vec<Value> = shown
        .iter()
        .enumerate()
        .map(|(i, token)| {
            let activation = normalized.as_ref().and_then(|n| n.get(i)).map_or(Value::Null, |v| json!(v));
            json!({ "token": token, "activation": activation })
        })
        .collect();

    json!({
        "to_find": explanation,
        "document": shown.concat(),
        "activations": activations,
    })
    .to_string()
}

/// Schema the JSON-mode predictor output must satisfy.
pub fn simulation_response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "to_find": { "type": "string" },
            "document": { "type": "string" },
            "activations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "token": { "type": "string" },
                        "activation": { "type": "number" }
                    },
                    "required": ["token", "activation"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["to_find", "document", "activations"],
        "additionalProperties": false
    })
}

pub fn make_logprob_free_prompt(
    explanation: &str,
    tokens: &[String],
    example_set: FewShotExampleSet,
    format: PromptFormat,
) -> Result<Prompt, PromptError> {
    let mut builder = PromptBuilder::new();
    builder.add_message(Role::System, LOGPROB_FREE_SYSTEM);

    let examples = example_set.examples();
    for (i, example) in examples.iter().enumerate() {
        let max = calculate_max_activation(&example.activation_records);
        for (r, record) in example.activation_records.iter().enumerate() {
            let header = if r == 0 {
                format!("{}\n\n", explanation_header(i + 1, &example.explanation))
            } else {
                String::new()
            };
            builder.add_message(
                Role::User,
                format!(
                    "{header}Sequence {n} Tokens without Activations:\n{}\n\nSequence {n} Tokens with Activations:\n",
                    format_record_for_logprob_free_simulation(record, None),
                    n = r + 1,
                ),
            );
            builder.add_message(
                Role::Assistant,
                format!("{}\n\n", format_record_for_logprob_free_simulation(record, Some(max))),
            );
        }
    }

    builder.add_message(
        Role::User,
        format!(
            "{}\n\nSequence 1 Tokens without Activations:\n{}\n\nSequence 1 Tokens with Activations:\n",
            explanation_header(examples.len() + 1, explanation),
            format_record_for_logprob_free_simulation(&ActivationRecord::unscored(tokens), None),
        ),
    );
    builder.build(format, true)
}

/// JSON variant. Shows only the first record of each example.
pub fn make_logprob_free_prompt_json(
    explanation: &str,
    tokens: &[String],
    example_set: FewShotExampleSet,
    format: PromptFormat,
) -> Result<Prompt, PromptError> {
    let mut builder = PromptBuilder::new();
    builder.add_message(Role::System, LOGPROB_FREE_JSON_SYSTEM);

    for example in example_set.examples() {
        let Some(record) = example.activation_records.first() else {
            continue;
        };
        let max = calculate_max_activation(std::slice::from_ref(record));
        builder.add_message(
            Role::User,
            format_record_for_logprob_free_simulation_json(&example.explanation, record, None),
        );
        builder.add_message(
            Role::Assistant,
            format_record_for_logprob_free_simulation_json(&example.explanation, record, Some(max)),
        );
    }

    builder.add_message(
        Role::User,
        format_record_for_logprob_free_simulation_json(explanation, &ActivationRecord::unscored(tokens), None),
    );
    builder.build(format, true)
}
