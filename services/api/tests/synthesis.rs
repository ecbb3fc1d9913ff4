use axum::{
    Json, Router,
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    routing::post,
};
use futures::StreamExt;
use persona_core::{
    BridgeError,
    synthesis::{ElevenLabsSynthesizer, OpenAISpeechSynthesizer, SpeechSynthesizer, VoiceConfig},
};
use serde_json::Value;
use std::collections::HashMap;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

async fn collect(synthesizer: &dyn SpeechSynthesizer, sentence: &str) -> Result<Vec<u8>, BridgeError> {
    let mut audio = synthesizer.synthesize(sentence, &VoiceConfig::default()).await?;
    let mut pcm = Vec::new();
    while let Some(chunk) = audio.next().await {
        pcm.extend_from_slice(&chunk?);
    }
    Ok(pcm)
}

#[tokio::test]
async fn test_elevenlabs_streams_pcm() {
    let app = Router::new().route(
        "/v1/text-to-speech/{voice_id}/stream",
        post(
            |Path(voice_id): Path<String>,
             Query(query): Query<HashMap<String, String>>,
             headers: HeaderMap,
             Json(body): Json<Value>| async move {
                assert_eq!(voice_id, "JBFqnCBsd6RMkjVDRZzb");
                assert_eq!(query["output_format"], "pcm_24000");
                assert_eq!(headers["xi-api-key"], "eleven-key");
                assert_eq!(body["text"], "Price is what you pay.");
                assert_eq!(body["model_id"], "eleven_multilingual_v2");
                vec![1u8, 2, 3, 4]
            },
        ),
    );
    let base = serve(app).await;
    let tts = ElevenLabsSynthesizer::new("eleven-key".into()).with_base_url(&base);

    let pcm = collect(&tts, "Price is what you pay.").await.unwrap();
    assert_eq!(pcm, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_elevenlabs_error_status_is_synthesis_error() {
    let app = Router::new().route(
        "/v1/text-to-speech/{voice_id}/stream",
        post(|| async { (StatusCode::UNAUTHORIZED, "invalid api key") }),
    );
    let base = serve(app).await;
    let tts = ElevenLabsSynthesizer::new("wrong".into()).with_base_url(&base);

    let err = collect(&tts, "Hello.").await.unwrap_err();
    match err {
        BridgeError::Synthesis(message) => assert!(message.contains("invalid api key")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_openai_speech_requests_raw_pcm() {
    let app = Router::new().route(
        "/v1/audio/speech",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            assert_eq!(headers["authorization"], "Bearer openai-key");
            assert_eq!(body["response_format"], "pcm");
            assert_eq!(body["input"], "Hello.");
            vec![9u8, 9]
        }),
    );
    let base = serve(app).await;
    let tts = OpenAISpeechSynthesizer::new("openai-key".into()).with_base_url(&base);

    assert_eq!(collect(&tts, "Hello.").await.unwrap(), vec![9, 9]);
    assert_eq!(tts.sample_rate(&VoiceConfig::default()), 24_000);
}
