use base64::Engine;
use speakloop::nats::messages::{
    AudioFrameMessage, GenerateReplyMessage, GenerateRequestMessage, HistoryEntry,
    SpeakReplyMessage, TranscriptMessage,
};
use speakloop::Role;

#[test]
fn test_audio_frame_serialization() {
    let msg = AudioFrameMessage {
        session_id: "conversation-1".to_string(),
        sequence: 0,
        pcm: base64::engine::general_purpose::STANDARD.encode([0u8; 100]),
        sample_rate: 16000,
        channels: 1,
        timestamp: "2026-03-02T09:15:00Z".to_string(),
        final_frame: false,
    };

    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("conversation-1"));
    assert!(json.contains("\"final\":false"));
    assert!(json.contains("\"sequence\":0"));

    let deserialized: AudioFrameMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.session_id, "conversation-1");
    assert_eq!(deserialized.sample_rate, 16000);
    assert!(!deserialized.final_frame);
}

#[test]
fn test_audio_frame_final_marker() {
    let json = r#"{
        "session_id": "conversation-1",
        "sequence": 42,
        "pcm": "",
        "sample_rate": 16000,
        "channels": 1,
        "timestamp": "2026-03-02T09:15:04Z",
        "final": true
    }"#;

    let msg: AudioFrameMessage = serde_json::from_str(json).unwrap();
    assert!(msg.final_frame);
    assert!(msg.pcm.is_empty());
    assert_eq!(msg.sequence, 42);
}

#[test]
fn test_transcript_partial() {
    let json = r#"{
        "session_id": "conversation-1",
        "text": "me llamo",
        "partial": true,
        "timestamp": "2026-03-02T09:15:02Z",
        "confidence": 0.87
    }"#;

    let msg: TranscriptMessage = serde_json::from_str(json).unwrap();
    assert!(msg.partial);
    assert_eq!(msg.text, "me llamo");
    assert_eq!(msg.confidence, Some(0.87));
}

#[test]
fn test_transcript_no_confidence() {
    let json = r#"{
        "session_id": "conversation-1",
        "text": "hola",
        "partial": false,
        "timestamp": "2026-03-02T09:15:02Z"
    }"#;

    let msg: TranscriptMessage = serde_json::from_str(json).unwrap();
    assert_eq!(msg.confidence, None);
}

#[test]
fn test_generate_request_carries_roles() {
    let msg = GenerateRequestMessage {
        session_id: "conversation-1".to_string(),
        language: "es".to_string(),
        level: "A2".to_string(),
        history: vec![
            HistoryEntry {
                role: Role::Assistant,
                text: "¿Cómo te llamas?".to_string(),
            },
            HistoryEntry {
                role: Role::Learner,
                text: "Me llamo Ana".to_string(),
            },
        ],
    };

    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"role\":\"assistant\""));
    assert!(json.contains("\"role\":\"learner\""));
    assert!(json.contains("\"level\":\"A2\""));
}

#[test]
fn test_generate_reply_error() {
    let msg: GenerateReplyMessage =
        serde_json::from_str(r#"{"text": null, "error": "model overloaded"}"#).unwrap();
    assert!(msg.text.is_none());
    assert_eq!(msg.error.as_deref(), Some("model overloaded"));
}

#[test]
fn test_speak_reply_ok() {
    let msg: SpeakReplyMessage = serde_json::from_str(r#"{"ok": true, "error": null}"#).unwrap();
    assert!(msg.ok);
    assert!(msg.error.is_none());
}

#[test]
fn test_pcm_encoding_roundtrip() {
    let original_samples: Vec<i16> = vec![100, -200, 300, -400];

    let pcm_bytes: Vec<u8> = original_samples
        .iter()
        .flat_map(|&s| s.to_le_bytes())
        .collect();

    let encoded = base64::engine::general_purpose::STANDARD.encode(&pcm_bytes);
    let decoded_bytes = base64::engine::general_purpose::STANDARD
        .decode(&encoded)
        .unwrap();

    let decoded_samples: Vec<i16> = decoded_bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect();

    assert_eq!(decoded_samples, original_samples);
}
