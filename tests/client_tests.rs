use std::sync::Arc;

use neuron_simulator::few_shot::FewShotExampleSet;
use neuron_simulator::prompt::{Message, Prompt, PromptFormat, Role};
use neuron_simulator::services::llm::{ClientConfig, LLMService, PredictionRequest, Predictor};
use neuron_simulator::simulation::prompts::simulation_response_schema;
use neuron_simulator::simulation::ExplanationNeuronSimulator;
use neuron_simulator::{PredictorError, SimulationError};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// What the stub endpoint received.
struct Captured {
    request_line: String,
    headers: String,
    body: Value,
}

/// Serves exactly one HTTP request with a canned status and JSON body.
async fn serve_once(status: u16, response: Value) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "Connection closed before headers were complete");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        while buf.len() < header_end + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "Connection closed before body was complete");
            buf.extend_from_slice(&chunk[..n]);
        }
        let body: Value = serde_json::from_slice(&buf[header_end..header_end + content_length]).unwrap();

        let payload = response.to_string();
        let reply = format!(
            "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
            payload.len()
        );
        socket.write_all(reply.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();

        let mut lines = head.lines();
        let request_line = lines.next().unwrap_or_default().to_string();
        Captured {
            request_line,
            headers: lines.collect::<Vec<_>>().join("\n").to_lowercase(),
            body,
        }
    });

    (base_url, handle)
}

fn service(base_url: String, api_key: Option<&str>) -> LLMService {
    LLMService::new(ClientConfig {
        base_url,
        model: "stub-model".to_string(),
        api_key: api_key.map(str::to_string),
        timeout_secs: 5,
    })
}

fn chat_prompt() -> Prompt {
    Prompt::Messages(vec![
        Message {
            role: Role::System,
            content: "sys".to_string(),
        },
        Message {
            role: Role::User,
            content: "hi".to_string(),
        },
    ])
}

// Never contacted: requests below fail before anything is sent.
const UNREACHABLE: &str = "http://127.0.0.1:9";

#[tokio::test]
async fn test_completion_echo_request_and_null_first_table() {
    let (base_url, server) = serve_once(
        200,
        json!({
            "choices": [{
                "text": "a\tunknown",
                "logprobs": {
                    "tokens": ["a", "\t", "unknown"],
                    "text_offset": [0, 1, 2],
                    "top_logprobs": [null, {"\t": -0.01}, {"7": -0.3, "0": -1.4, "x": -3.0}]
                }
            }]
        }),
    )
    .await;
    let llm = service(base_url, Some("secret"));

    let response = llm
        .predict(PredictionRequest::score_echo(Prompt::Text("a\tunknown".to_string()), 15))
        .await
        .expect("completion succeeds");

    let captured = server.await.unwrap();
    assert!(captured.request_line.starts_with("POST /v1/completions "), "{}", captured.request_line);
    assert!(captured.headers.contains("authorization: bearer secret"));
    assert_eq!(captured.body["model"], "stub-model");
    assert_eq!(captured.body["prompt"], "a\tunknown");
    assert_eq!(captured.body["echo"], true);
    assert_eq!(captured.body["max_tokens"], 0);
    assert_eq!(captured.body["logprobs"], 15);
    assert!(captured.body.get("temperature").is_none());

    assert_eq!(response.text, "a\tunknown");
    let logprobs = response.logprobs.expect("logprobs decoded");
    assert_eq!(logprobs.text_offset, vec![0, 1, 2]);
    assert!(logprobs.top_logprobs[0].is_empty(), "Null first table becomes empty");
    let order: Vec<&str> = logprobs.top_logprobs[2].iter().map(|(t, _)| t).collect();
    assert_eq!(order, vec!["7", "0", "x"]);
}

#[tokio::test]
async fn test_chat_logprobs_become_character_offsets() {
    let (base_url, server) = serve_once(
        200,
        json!({
            "choices": [{
                "message": { "role": "assistant", "content": "né5" },
                "logprobs": {
                    "content": [
                        { "token": "né", "logprob": -0.2, "bytes": [110, 195, 169],
                          "top_logprobs": [{ "token": "né", "logprob": -0.2 }] },
                        { "token": "5", "logprob": -0.1,
                          "top_logprobs": [{ "token": "5", "logprob": -0.1 }, { "token": "0", "logprob": -2.5 }] }
                    ]
                }
            }]
        }),
    )
    .await;
    let llm = service(base_url, None);

    let response = llm
        .predict(PredictionRequest::single_token(chat_prompt(), 15))
        .await
        .expect("chat succeeds");

    let captured = server.await.unwrap();
    assert!(captured.request_line.starts_with("POST /v1/chat/completions "));
    assert!(!captured.headers.contains("authorization"));
    assert_eq!(captured.body["messages"], json!([
        { "role": "system", "content": "sys" },
        { "role": "user", "content": "hi" }
    ]));
    assert_eq!(captured.body["max_tokens"], 1);
    assert_eq!(captured.body["logprobs"], true);
    assert_eq!(captured.body["top_logprobs"], 15);
    assert!(captured.body.get("response_format").is_none());

    assert_eq!(response.text, "né5");
    let logprobs = response.logprobs.expect("logprobs decoded");
    assert_eq!(logprobs.text_offset, vec![0, 2], "Offsets count characters, not bytes");
    assert_eq!(logprobs.top_logprobs[1].iter().collect::<Vec<_>>(), vec![("5", -0.1), ("0", -2.5)]);
}

#[tokio::test]
async fn test_chat_schema_becomes_response_format() {
    let (base_url, server) = serve_once(
        200,
        json!({ "choices": [{ "message": { "role": "assistant", "content": "{\"activations\": []}" } }] }),
    )
    .await;
    let llm = service(base_url, None);

    let schema = simulation_response_schema();
    let response = llm
        .predict(PredictionRequest::free_text(chat_prompt(), 2000, Some(schema.clone())))
        .await
        .expect("chat succeeds");

    let captured = server.await.unwrap();
    let format = &captured.body["response_format"];
    assert_eq!(format["type"], "json_schema");
    assert_eq!(format["json_schema"]["schema"], schema);
    assert_eq!(format["json_schema"]["strict"], true);
    assert_eq!(captured.body["temperature"], 0.0);
    assert!(captured.body.get("logprobs").is_none(), "No logprobs requested");
    assert!(captured.body.get("top_logprobs").is_none());

    assert_eq!(response.text, "{\"activations\": []}");
    assert!(response.logprobs.is_none());
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let (base_url, server) = serve_once(500, json!({ "error": "overloaded" })).await;
    let llm = service(base_url, None);

    let err = llm
        .predict(PredictionRequest::single_token(Prompt::Text("x".to_string()), 15))
        .await
        .unwrap_err();
    server.await.unwrap();

    match err {
        PredictorError::Status(status) => assert_eq!(status.as_u16(), 500),
        other => panic!("Expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn test_chat_rejects_echo_scoring() {
    let llm = service(UNREACHABLE.to_string(), None);

    let err = llm
        .predict(PredictionRequest::score_echo(chat_prompt(), 15))
        .await
        .unwrap_err();
    assert!(matches!(err, PredictorError::Unsupported(_)), "got {err:?}");
}

#[tokio::test]
async fn test_completion_rejects_response_schema() {
    let llm = service(UNREACHABLE.to_string(), None);

    let request = PredictionRequest::free_text(
        Prompt::Text("x".to_string()),
        2000,
        Some(simulation_response_schema()),
    );
    let err = llm.predict(request).await.unwrap_err();
    assert!(matches!(err, PredictorError::Unsupported(_)), "got {err:?}");
}

#[tokio::test]
async fn test_all_at_once_on_structured_prompt_fails_clearly() {
    let llm = Arc::new(service(UNREACHABLE.to_string(), None));
    let simulator = ExplanationNeuronSimulator::new(llm, "cats", FewShotExampleSet::Newer, PromptFormat::HarmonyV4);

    let err = simulator.simulate(&["cat".to_string()]).await.unwrap_err();
    assert!(
        matches!(err, SimulationError::Predictor(PredictorError::Unsupported(_))),
        "got {err:?}"
    );
}
