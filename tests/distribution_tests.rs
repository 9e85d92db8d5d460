mod common;

use common::table;
use neuron_simulator::simulation::distribution::{
    compute_expected_value, compute_predicted_activation_stats, parse_top_logprobs,
};

#[test]
fn test_expected_value_is_weighted_mean() {
    // p(0) = 0.5, p(10) = 0.25, p(4) = 0.25 before normalization
    let t = table(&[("0", 0.5f64.ln()), ("10", 0.25f64.ln()), ("4", 0.25f64.ln())]);
    let dist = compute_predicted_activation_stats(&t);

    assert_eq!(dist.values, vec![0, 10, 4], "Table order must be preserved");
    let total: f64 = dist.probabilities.iter().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!((dist.expected_value - 3.5).abs() < 1e-9, "EV was {}", dist.expected_value);
}

#[test]
fn test_renormalizes_over_valid_candidates_only() {
    // Non-numeric mass is dropped, the rest is rescaled to sum to 1.
    let t = table(&[("2", 0.1f64.ln()), ("the", 0.8f64.ln()), ("6", 0.1f64.ln())]);
    let dist = compute_predicted_activation_stats(&t);

    assert_eq!(dist.values, vec![2, 6]);
    assert!((dist.probabilities[0] - 0.5).abs() < 1e-9);
    assert!((dist.probabilities[1] - 0.5).abs() < 1e-9);
    assert!((dist.expected_value - 4.0).abs() < 1e-9);
}

#[test]
fn test_out_of_range_and_non_canonical_tokens_dropped() {
    let t = table(&[
        ("11", -0.1),
        (" 3", -0.1),
        ("03", -0.1),
        ("+5", -0.1),
        ("-1", -0.1),
        ("7", -1.0),
    ]);
    let raw = parse_top_logprobs(&t);

    assert_eq!(raw.len(), 1, "Only \"7\" is a quantized value");
    assert_eq!(raw[0].0, 7);
    assert!((raw[0].1 - (-1.0f64).exp()).abs() < 1e-12, "Unnormalized probability is exp(logprob)");
}

#[test]
fn test_expected_value_stays_in_scale() {
    let tables = [
        table(&[("10", -0.01)]),
        table(&[("0", -0.01)]),
        table(&[("0", -3.0), ("1", -2.0), ("5", -0.5), ("9", -1.2), ("10", -4.0)]),
        table(&[("3", -30.0), ("8", -29.0)]),
    ];
    for t in &tables {
        let dist = compute_predicted_activation_stats(t);
        assert!((0.0..=10.0).contains(&dist.expected_value), "EV {} out of range", dist.expected_value);
        let total: f64 = dist.probabilities.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);

        let pairs: Vec<(u32, f64)> = dist.values.iter().copied().zip(dist.probabilities.iter().copied()).collect();
        assert!((compute_expected_value(&pairs) - dist.expected_value).abs() < 1e-12);
    }
}

#[test]
fn test_no_valid_candidates_yields_empty_distribution() {
    let t = table(&[("hello", -0.2), ("\n", -1.5)]);
    let dist = compute_predicted_activation_stats(&t);

    assert!(dist.values.is_empty());
    assert!(dist.probabilities.is_empty());
    assert_eq!(dist.expected_value, 0.0);

    let empty = compute_predicted_activation_stats(&table(&[]));
    assert_eq!(empty.expected_value, 0.0);
}

#[test]
fn test_duplicate_candidate_keeps_first_position() {
    let t = table(&[("1", -5.0), ("2", -1.0), ("1", -1.0)]);
    let raw = parse_top_logprobs(&t);

    assert_eq!(raw.iter().map(|(v, _)| *v).collect::<Vec<_>>(), vec![1, 2]);
    assert!((raw[0].1 - (-1.0f64).exp()).abs() < 1e-12, "Later probability wins");
}

#[test]
fn test_logprob_table_deserializes_in_document_order() {
    let t: neuron_simulator::services::llm::TokenLogprobs =
        serde_json::from_str(r#"{"9": -0.5, "1": -1.0, "x": -2.0, "0": -3.0}"#).unwrap();
    let order: Vec<&str> = t.iter().map(|(tok, _)| tok).collect();
    assert_eq!(order, vec!["9", "1", "x", "0"]);

    let pairs: neuron_simulator::services::llm::TokenLogprobs =
        serde_json::from_str(r#"[["4", -0.1], ["2", -0.7]]"#).unwrap();
    assert_eq!(pairs.len(), 2);
}
