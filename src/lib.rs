pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod nats;
pub mod speech;
pub mod turn;
pub mod utterance;

pub use audio::{AmplitudeMonitor, AudioBackend, AudioBackendConfig, AudioFile, AudioFrame, FileBackend};
pub use config::Config;
pub use error::{ConversationError, ConversationResult};
pub use http::{create_router, AppState};
pub use nats::NatsClient;
pub use speech::{
    GenerationRequest, RecognitionEvent, ResponseGenerator, SpeechRecognizer, SpeechSynthesizer,
};
pub use turn::{
    Collaborators, ConversationSession, ConversationState, Message, Role, SessionConfig,
    SessionHandle, SilenceDetector, TurnEvent,
};
pub use utterance::{FluencyMetrics, UtteranceAccumulator, UtteranceSnapshot};
