use serde::{Deserialize, Serialize};

/// Who has the floor in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// No session activity; initial state and the target of teardown
    Idle,
    /// Capturing and recognizing the learner
    Listening,
    /// Waiting on the response generator
    Processing,
    /// Synthesized reply is playing
    Speaking,
    /// Tutor finished; acquiring capture for the learner's answer
    WaitingForResponse,
}

/// Inputs that drive the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnTrigger {
    StartSession,
    StartListening,
    StopListening,
    EndSession,
    ReplyReady,
    GenerationFailed,
    SynthesisFinished,
    SynthesisFailed,
    CaptureReady,
    /// Capture could not be acquired or the transcript stream broke
    CaptureFailed,
    SilenceWithSpeech,
    SilenceWithoutSpeech,
}

impl ConversationState {
    /// Next state for `trigger`
    ///
    /// `None` means the trigger is not valid here and must be ignored.
    /// Returning the current state means a no-op.
    pub fn next(self, trigger: TurnTrigger) -> Option<ConversationState> {
        use ConversationState::*;
        use TurnTrigger::*;

        match (self, trigger) {
            (_, EndSession) => Some(Idle),

            (Idle, StartSession) => Some(Processing),
            (Idle, StartListening) => Some(WaitingForResponse),
            (Idle, StopListening) => Some(Idle),

            (Processing, ReplyReady) => Some(Speaking),
            (Processing, GenerationFailed) => Some(WaitingForResponse),

            (Speaking, SynthesisFinished) => Some(WaitingForResponse),
            (Speaking, SynthesisFailed) => Some(WaitingForResponse),

            (WaitingForResponse, CaptureReady) => Some(Listening),
            (WaitingForResponse, CaptureFailed) => Some(WaitingForResponse),
            (WaitingForResponse, StartListening) => Some(WaitingForResponse),

            (Listening, StartListening) => Some(Listening),
            (Listening, SilenceWithoutSpeech) => Some(Listening),
            (Listening, SilenceWithSpeech) => Some(Processing),
            (Listening, CaptureFailed) => Some(WaitingForResponse),

            (Listening | WaitingForResponse, StopListening) => Some(Idle),

            _ => None,
        }
    }

    /// Whether audio capture may be running in this state
    pub fn is_capturing(self) -> bool {
        self == ConversationState::Listening
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::Listening => "listening",
            ConversationState::Processing => "processing",
            ConversationState::Speaking => "speaking",
            ConversationState::WaitingForResponse => "waiting_for_response",
        }
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::ConversationState::*;
    use super::TurnTrigger::*;
    use super::*;

    const ALL: [ConversationState; 5] = [Idle, Listening, Processing, Speaking, WaitingForResponse];

    #[test]
    fn test_main_loop() {
        let mut state = Idle;
        for (trigger, expected) in [
            (StartSession, Processing),
            (ReplyReady, Speaking),
            (SynthesisFinished, WaitingForResponse),
            (CaptureReady, Listening),
            (SilenceWithoutSpeech, Listening),
            (SilenceWithSpeech, Processing),
        ] {
            state = state.next(trigger).unwrap();
            assert_eq!(state, expected);
        }
    }

    #[test]
    fn test_end_session_from_anywhere() {
        for state in ALL {
            assert_eq!(state.next(EndSession), Some(Idle));
        }
    }

    #[test]
    fn test_failures_return_to_capture() {
        assert_eq!(Processing.next(GenerationFailed), Some(WaitingForResponse));
        assert_eq!(Speaking.next(SynthesisFailed), Some(WaitingForResponse));
        assert_eq!(Listening.next(CaptureFailed), Some(WaitingForResponse));
        assert_eq!(WaitingForResponse.next(CaptureReady), Some(Listening));
    }

    #[test]
    fn test_contract_violations_rejected() {
        assert_eq!(Speaking.next(StartListening), None);
        assert_eq!(Processing.next(StartListening), None);
        assert_eq!(Listening.next(StartSession), None);
        assert_eq!(Idle.next(SilenceWithSpeech), None);
        assert_eq!(Speaking.next(StopListening), None);
    }

    #[test]
    fn test_capture_failure_never_idles() {
        for state in ALL {
            assert_ne!(state.next(CaptureFailed), Some(Idle));
        }
    }

    #[test]
    fn test_start_listening_idempotent() {
        assert_eq!(Listening.next(StartListening), Some(Listening));
    }

    #[test]
    fn test_only_listening_captures() {
        let capturing: Vec<_> = ALL.into_iter().filter(|s| s.is_capturing()).collect();
        assert_eq!(capturing, vec![Listening]);
    }
}
