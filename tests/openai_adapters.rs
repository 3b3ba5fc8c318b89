//! OpenAI adapters against a local mock server.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use paradise_agent::core::reasoner::{
    BaseReasoner, DirectoryKnowledgeStore, OpenAIReasoner, OpenAIReasonerConfig, ReasonerError,
    TravelInfoTool, Utterance,
};
use paradise_agent::core::stt::{BaseSTT, OpenAISTT, OpenAISTTConfig, STTConfig, SpeechEvent};
use paradise_agent::core::tts::{BaseTTS, OpenAITTS, OpenAITTSConfig, TTSConfig, TTSError};
use paradise_agent::core::AudioFrame;

fn speech_frame() -> AudioFrame {
    AudioFrame::new(vec![8000; 320], 16000, 1)
}

fn error_body(message: &str, code: &str) -> serde_json::Value {
    json!({"error": {"message": message, "type": code, "code": code}})
}

// =============================================================================
// Recognizer
// =============================================================================

fn recognizer(server: &MockServer) -> OpenAISTT {
    OpenAISTT::with_config(OpenAISTTConfig {
        base: STTConfig {
            api_key: "sk-test".to_string(),
            ..Default::default()
        },
        base_url: format!("{}/v1", server.uri()),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_stt_uploads_segment_and_emits_final() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "  I want to visit Kyoto. "})))
        .expect(1)
        .mount(&server)
        .await;

    let stt = recognizer(&server);
    let stream = stt.stream().await.unwrap();
    for _ in 0..40 {
        stream.input.push_frame(speech_frame()).unwrap();
    }
    stream.input.close().await.unwrap();

    let events: Vec<SpeechEvent> = stream.events.collect().await;
    assert_eq!(events, vec![SpeechEvent::final_text("I want to visit Kyoto.")]);
}

#[tokio::test]
async fn test_stt_failure_emits_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(error_body("Invalid API key", "invalid_api_key")))
        .expect(1)
        .mount(&server)
        .await;

    let stt = recognizer(&server);
    let stream = stt.stream().await.unwrap();
    for _ in 0..40 {
        stream.input.push_frame(speech_frame()).unwrap();
    }
    stream.input.close().await.unwrap();

    let events: Vec<SpeechEvent> = stream.events.collect().await;
    assert!(events.is_empty());
    assert!(stream.input.push_frame(speech_frame()).is_err());
}

// =============================================================================
// Synthesizer
// =============================================================================

fn synthesizer(server: &MockServer) -> OpenAITTS {
    OpenAITTS::with_config(OpenAITTSConfig {
        base: TTSConfig {
            api_key: "sk-test".to_string(),
            voice_id: Some("nova".to_string()),
            ..Default::default()
        },
        base_url: format!("{}/v1", server.uri()),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_tts_streams_pcm_as_20ms_frames() {
    let server = MockServer::start().await;
    // Two full 24kHz frames plus a 290-sample tail
    let pcm: Vec<u8> = (0..(480 * 2 + 290) as i16)
        .flat_map(|s| s.to_le_bytes())
        .collect();
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(body_partial_json(json!({
            "input": "Welcome to Lisbon",
            "voice": "nova",
            "response_format": "pcm"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(pcm))
        .expect(1)
        .mount(&server)
        .await;

    let tts = synthesizer(&server);
    assert_eq!(tts.sample_rate(), 24000);

    let stream = tts.synthesize("Welcome to Lisbon").await.unwrap();
    let frames: Vec<AudioFrame> = stream
        .filter_map(|chunk| async move { chunk.ok().flatten() })
        .collect()
        .await;

    let lengths: Vec<usize> = frames.iter().map(|f| f.data.len()).collect();
    assert_eq!(lengths, vec![480, 480, 290]);
    assert!(frames.iter().all(|f| f.sample_rate == 24000 && f.num_channels == 1));
    assert_eq!(frames[1].data[0], 480);
}

#[tokio::test]
async fn test_tts_long_reply_survives_playback_paced_reads() {
    let server = MockServer::start().await;
    // Three seconds of 24kHz audio
    let pcm = vec![0u8; 24000 * 3 * 2];
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(pcm))
        .mount(&server)
        .await;

    let tts = OpenAITTS::with_config(OpenAITTSConfig {
        base: TTSConfig {
            api_key: "sk-test".to_string(),
            ..Default::default()
        },
        base_url: format!("{}/v1", server.uri()),
        read_timeout: Duration::from_secs(1),
        ..Default::default()
    })
    .unwrap();

    let mut stream = tts.synthesize("A long description of the Amalfi coast").await.unwrap();
    let mut frames = 0;
    while let Some(chunk) = stream.next().await {
        if chunk.unwrap().is_some() {
            frames += 1;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
    assert_eq!(frames, 150);
}

#[tokio::test]
async fn test_tts_quota_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(error_body("You exceeded your current quota", "insufficient_quota")),
        )
        .mount(&server)
        .await;

    match synthesizer(&server).synthesize("Hello").await {
        Err(e) => {
            assert!(matches!(e, TTSError::QuotaExceeded(_)));
            assert!(e.is_quota());
        }
        Ok(_) => panic!("expected quota error"),
    }
}

#[tokio::test]
async fn test_tts_unauthorized_is_connection_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(ResponseTemplate::new(401).set_body_json(error_body("Invalid API key", "invalid_api_key")))
        .mount(&server)
        .await;

    match synthesizer(&server).synthesize("Hello").await {
        Err(e) => {
            assert!(matches!(e, TTSError::ConnectionFailed(_)));
            assert!(!e.is_quota());
        }
        Ok(_) => panic!("expected auth error"),
    }
}

#[tokio::test]
async fn test_tts_blank_text_skips_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let stream = synthesizer(&server).synthesize("   ").await.unwrap();
    assert_eq!(stream.count().await, 0);
}

// =============================================================================
// Reasoner
// =============================================================================

fn reasoner_config(server: &MockServer) -> OpenAIReasonerConfig {
    OpenAIReasonerConfig {
        api_key: "sk-test".to_string(),
        base_url: format!("{}/v1", server.uri()),
        ..Default::default()
    }
}

fn kyoto_guide() -> Arc<DirectoryKnowledgeStore> {
    let mut store = DirectoryKnowledgeStore::default();
    store.add_document(
        "kyoto.md",
        "Kyoto temples open at dawn. Fushimi Inari is busiest at noon.\n\nGion hosts evening tea houses.",
    );
    Arc::new(store)
}

fn tool_call_response(arguments: serde_json::Value) -> serde_json::Value {
    json!({
        "choices": [{
            "index": 0,
            "finish_reason": "tool_calls",
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {
                        "name": "retrieve_travel_info",
                        "arguments": arguments.to_string()
                    }
                }]
            }
        }]
    })
}

fn text_response(text: &str) -> serde_json::Value {
    json!({
        "choices": [{
            "index": 0,
            "finish_reason": "stop",
            "message": {"role": "assistant", "content": text}
        }]
    })
}

#[tokio::test]
async fn test_reasoner_plain_reply_includes_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_string_contains("I want to go somewhere warm"))
        .and(body_string_contains("How about Lisbon?"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("  Great, when are you leaving? ")))
        .expect(1)
        .mount(&server)
        .await;

    let reasoner = OpenAIReasoner::new(reasoner_config(&server)).unwrap();
    let history = vec![
        Utterance::user("I want to go somewhere warm"),
        Utterance::assistant("How about Lisbon?"),
    ];
    let reply = reasoner.respond("Sounds good", &history).await.unwrap();
    assert_eq!(reply, "Great, when are you leaving?");
}

#[tokio::test]
async fn test_reasoner_narrates_tool_call_and_feeds_result_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_response(
            json!({"query": "temples", "destination": "Kyoto"}),
        )))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("call_1"))
        .and(body_string_contains("Kyoto temples open at dawn"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("Go early to the temples.")))
        .expect(1)
        .mount(&server)
        .await;

    let narrations = Arc::new(Mutex::new(Vec::new()));
    let mut reasoner = OpenAIReasoner::new(reasoner_config(&server))
        .unwrap()
        .with_tool(Arc::new(TravelInfoTool::new(kyoto_guide())));
    reasoner.on_tool_announcement({
        let narrations = Arc::clone(&narrations);
        Arc::new(move |text: String| narrations.lock().push(text))
    });

    let reply = reasoner.respond("What should I see in Kyoto?", &[]).await.unwrap();
    assert_eq!(reply, "Go early to the temples.");
    assert_eq!(
        *narrations.lock(),
        vec!["Let me check my travel archives for information about temples...".to_string()]
    );
}

#[tokio::test]
async fn test_reasoner_gives_up_after_max_tool_rounds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_response(json!({"query": "food"}))))
        .expect(2)
        .mount(&server)
        .await;

    let reasoner = OpenAIReasoner::new(OpenAIReasonerConfig {
        max_tool_rounds: 1,
        ..reasoner_config(&server)
    })
    .unwrap()
    .with_tool(Arc::new(TravelInfoTool::new(kyoto_guide())));

    let err = reasoner.respond("Where should I eat?", &[]).await.unwrap_err();
    assert!(matches!(err, ReasonerError::TooManyToolRounds(1)));
}

#[tokio::test]
async fn test_reasoner_maps_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("quota please"))
        .respond_with(ResponseTemplate::new(429).set_body_json(error_body("Rate limit reached", "rate_limit_exceeded")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("bad key please"))
        .respond_with(ResponseTemplate::new(401).set_body_json(error_body("Invalid API key", "invalid_api_key")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("empty please"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("   ")))
        .mount(&server)
        .await;

    let reasoner = OpenAIReasoner::new(reasoner_config(&server)).unwrap();
    assert!(matches!(
        reasoner.respond("quota please", &[]).await,
        Err(ReasonerError::RateLimitExceeded(_))
    ));
    assert!(matches!(
        reasoner.respond("bad key please", &[]).await,
        Err(ReasonerError::AuthenticationFailed(_))
    ));
    assert!(matches!(
        reasoner.respond("empty please", &[]).await,
        Err(ReasonerError::InvalidResponse(_))
    ));
}
