use std::future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::task::{JoinError, JoinHandle};
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::context::{Message, Role, TurnContext};
use super::events::TurnEvent;
use super::silence::SilenceDetector;
use super::state::{ConversationState, TurnTrigger};
use crate::audio::{AmplitudeMonitor, AudioBackend};
use crate::error::{ConversationError, ConversationResult};
use crate::speech::{RecognitionEvent, ResponseGenerator, SpeechRecognizer, SpeechSynthesizer};
use crate::utterance::FluencyMetrics;

const COMMAND_CAPACITY: usize = 16;
const EVENT_CAPACITY: usize = 64;
const FRAME_CAPACITY: usize = 100;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// The external services one session talks to
pub struct Collaborators {
    pub recognizer: Box<dyn SpeechRecognizer>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    /// Capture source for level metering; recognizers that capture on their
    /// own can run without one
    pub audio: Option<Box<dyn AudioBackend>>,
}

enum Command {
    StartSession(oneshot::Sender<ConversationState>),
    StartListening(oneshot::Sender<ConversationState>),
    StopListening(oneshot::Sender<ConversationState>),
    EndSession(oneshot::Sender<ConversationState>),
    History(oneshot::Sender<Vec<Message>>),
    Shutdown(oneshot::Sender<ConversationState>),
}

/// What woke the orchestrator up
enum Wake {
    Command(Option<Command>),
    Transcript(Option<RecognitionEvent>),
    Silence,
    TurnCap,
    Retry,
    Generated(Result<ConversationResult<String>, JoinError>),
    Spoken(Result<anyhow::Result<()>, JoinError>),
}

/// Entry point for running a conversation
pub struct ConversationSession;

impl ConversationSession {
    /// Spawn the orchestrator task for one session
    ///
    /// The session starts `Idle`; everything else goes through the handle.
    pub fn spawn(config: SessionConfig, collaborators: Collaborators) -> SessionHandle {
        info!("Creating conversation session: {}", config.session_id);

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConversationState::Idle);
        let (metrics_tx, metrics_rx) = watch::channel(FluencyMetrics::default());
        let (level_tx, level_rx) = watch::channel(0.0f32);
        let (last_error_tx, last_error_rx) = watch::channel(None);
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let session_id = config.session_id.clone();
        let orchestrator = Orchestrator {
            context: TurnContext::new(
                config.language.clone(),
                config.level.clone(),
                config.pause_threshold,
            ),
            silence: SilenceDetector::new(config.silence_timeout),
            config,
            state: ConversationState::Idle,
            turn_cap: None,
            retry_at: None,
            recognizer: collaborators.recognizer,
            generator: collaborators.generator,
            synthesizer: collaborators.synthesizer,
            audio: collaborators.audio,
            capturing: false,
            pump: None,
            transcripts: None,
            generation: None,
            synthesis: None,
            generation_failures: 0,
            synthesis_failures: 0,
            capture_failures: 0,
            commands: command_rx,
            state_tx,
            metrics_tx,
            level_tx: Arc::new(level_tx),
            last_error_tx,
            events_tx: events_tx.clone(),
        };

        let task = tokio::spawn(orchestrator.run());

        SessionHandle {
            session_id,
            commands: command_tx,
            state_rx,
            metrics_rx,
            level_rx,
            last_error_rx,
            events_tx,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }
}

/// Host-facing control surface of a running session
#[derive(Clone)]
pub struct SessionHandle {
    session_id: String,
    commands: mpsc::Sender<Command>,
    state_rx: watch::Receiver<ConversationState>,
    metrics_rx: watch::Receiver<FluencyMetrics>,
    level_rx: watch::Receiver<f32>,
    last_error_rx: watch::Receiver<Option<String>>,
    events_tx: broadcast::Sender<TurnEvent>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Begin a conversation: the tutor speaks first
    pub async fn start_session(&self) -> ConversationResult<ConversationState> {
        self.request(Command::StartSession).await
    }

    /// Start capturing the learner
    ///
    /// Returns once capture has been acquired (or the request was ignored).
    pub async fn start_listening(&self) -> ConversationResult<ConversationState> {
        self.request(Command::StartListening).await
    }

    pub async fn stop_listening(&self) -> ConversationResult<ConversationState> {
        self.request(Command::StopListening).await
    }

    /// Tear everything down and go `Idle`; safe to call repeatedly
    pub async fn end_session(&self) -> ConversationResult<ConversationState> {
        self.request(Command::EndSession).await
    }

    pub async fn history(&self) -> ConversationResult<Vec<Message>> {
        self.request(Command::History).await
    }

    /// End the session and stop the orchestrator task
    pub async fn shutdown(&self) -> ConversationResult<()> {
        // Already gone is fine
        let _ = self.request(Command::Shutdown).await;

        let mut handle = self.task.lock().await;
        if let Some(task) = handle.take() {
            if let Err(e) = task.await {
                error!("Conversation task panicked: {}", e);
            }
        }
        Ok(())
    }

    pub fn state(&self) -> ConversationState {
        *self.state_rx.borrow()
    }

    pub fn metrics(&self) -> FluencyMetrics {
        *self.metrics_rx.borrow()
    }

    /// Current input level in [0, 1]
    pub fn level(&self) -> f32 {
        *self.level_rx.borrow()
    }

    /// Most recent failure surfaced as `TurnEvent::Error`
    pub fn last_error(&self) -> Option<String> {
        self.last_error_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TurnEvent> {
        self.events_tx.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConversationState> {
        self.state_rx.clone()
    }

    pub fn watch_metrics(&self) -> watch::Receiver<FluencyMetrics> {
        self.metrics_rx.clone()
    }

    pub fn watch_level(&self) -> watch::Receiver<f32> {
        self.level_rx.clone()
    }

    /// Wait until the published state equals `target`
    ///
    /// Short-lived states can be skipped by the watch channel; use
    /// `subscribe` to observe every transition.
    pub async fn wait_for_state(&self, target: ConversationState) -> ConversationResult<()> {
        let mut rx = self.state_rx.clone();
        loop {
            if *rx.borrow_and_update() == target {
                return Ok(());
            }
            rx.changed()
                .await
                .map_err(|_| ConversationError::SessionClosed)?;
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> ConversationResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| ConversationError::SessionClosed)?;
        rx.await.map_err(|_| ConversationError::SessionClosed)
    }
}

/// Single writer for session state
///
/// Every mutation of the conversation state, the utterance and the metrics
/// happens on this task.
struct Orchestrator {
    config: SessionConfig,
    state: ConversationState,
    context: TurnContext,
    silence: SilenceDetector,
    turn_cap: Option<Instant>,
    retry_at: Option<Instant>,

    recognizer: Box<dyn SpeechRecognizer>,
    generator: Arc<dyn ResponseGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    audio: Option<Box<dyn AudioBackend>>,

    capturing: bool,
    pump: Option<JoinHandle<()>>,
    transcripts: Option<mpsc::Receiver<RecognitionEvent>>,
    generation: Option<JoinHandle<ConversationResult<String>>>,
    synthesis: Option<JoinHandle<anyhow::Result<()>>>,

    generation_failures: u32,
    synthesis_failures: u32,
    capture_failures: u32,

    commands: mpsc::Receiver<Command>,
    state_tx: watch::Sender<ConversationState>,
    metrics_tx: watch::Sender<FluencyMetrics>,
    level_tx: Arc<watch::Sender<f32>>,
    last_error_tx: watch::Sender<Option<String>>,
    events_tx: broadcast::Sender<TurnEvent>,
}

impl Orchestrator {
    async fn run(mut self) {
        info!("Conversation task started: {}", self.config.session_id);

        loop {
            // Transcripts are polled before the deadlines so a pending update
            // always re-arms the detector before it can fire.
            let wake = tokio::select! {
                biased;
                command = self.commands.recv() => Wake::Command(command),
                event = next_transcript(&mut self.transcripts) => Wake::Transcript(event),
                _ = self.silence.fired() => Wake::Silence,
                _ = sleep_until(self.turn_cap) => Wake::TurnCap,
                _ = sleep_until(self.retry_at) => Wake::Retry,
                result = join(&mut self.generation) => Wake::Generated(result),
                result = join(&mut self.synthesis) => Wake::Spoken(result),
            };

            match wake {
                Wake::Command(Some(Command::Shutdown(ack))) => {
                    self.end_session().await;
                    let _ = ack.send(self.state);
                    break;
                }
                Wake::Command(Some(command)) => self.on_command(command).await,
                Wake::Command(None) => {
                    debug!("All session handles dropped");
                    self.end_session().await;
                    break;
                }
                Wake::Transcript(Some(event)) => self.on_transcript(event),
                Wake::Transcript(None) => self.on_stream_closed().await,
                Wake::Silence => self.on_silence().await,
                Wake::TurnCap => self.on_turn_cap().await,
                Wake::Retry => self.on_retry().await,
                Wake::Generated(result) => {
                    self.generation = None;
                    let result = result.unwrap_or_else(|e| {
                        Err(ConversationError::Generation(format!("generator task failed: {}", e)))
                    });
                    self.on_generated(result).await;
                }
                Wake::Spoken(result) => {
                    self.synthesis = None;
                    let result = result
                        .map_err(anyhow::Error::from)
                        .and_then(|spoken| spoken);
                    self.on_spoken(result).await;
                }
            }
        }

        info!("Conversation task stopped: {}", self.config.session_id);
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::StartSession(ack) => {
                self.start_session();
                let _ = ack.send(self.state);
            }
            Command::StartListening(ack) => {
                self.start_listening().await;
                let _ = ack.send(self.state);
            }
            Command::StopListening(ack) => {
                self.stop_listening().await;
                let _ = ack.send(self.state);
            }
            Command::EndSession(ack) => {
                self.end_session().await;
                let _ = ack.send(self.state);
            }
            Command::History(ack) => {
                let _ = ack.send(self.context.history().to_vec());
            }
            Command::Shutdown(ack) => {
                self.end_session().await;
                let _ = ack.send(self.state);
            }
        }
    }

    fn start_session(&mut self) {
        if self.state != ConversationState::Idle {
            warn!("Session already active ({}), ignoring start", self.state);
            return;
        }

        info!("Starting conversation session: {}", self.config.session_id);
        self.context.clear_history();
        self.generation_failures = 0;
        self.synthesis_failures = 0;
        self.capture_failures = 0;
        self.last_error_tx.send_replace(None);

        self.transition(TurnTrigger::StartSession);
        self.request_reply();
    }

    async fn start_listening(&mut self) {
        match self.state {
            ConversationState::Idle => {
                self.capture_failures = 0;
                self.transition(TurnTrigger::StartListening);
                self.begin_listening().await;
            }
            ConversationState::Listening | ConversationState::WaitingForResponse => {
                debug!("Already listening");
            }
            state => warn!("Cannot start listening while {}", state),
        }
    }

    async fn stop_listening(&mut self) {
        match self.state {
            ConversationState::Listening | ConversationState::WaitingForResponse => {
                info!("Listening stopped by host");
                self.release_capture().await;
                self.retry_at = None;
                self.transition(TurnTrigger::StopListening);
            }
            ConversationState::Idle => debug!("Not listening"),
            state => warn!("Cannot stop listening while {}", state),
        }
    }

    async fn end_session(&mut self) {
        if self.state == ConversationState::Idle {
            debug!("Session already idle");
            return;
        }

        info!("Ending conversation session: {}", self.config.session_id);

        self.release_capture().await;
        self.retry_at = None;

        if let Some(task) = self.generation.take() {
            task.abort();
        }
        if let Some(task) = self.synthesis.take() {
            task.abort();
            if let Err(e) = self.synthesizer.stop().await {
                error!("Failed to stop speech synthesis: {:#}", e);
            }
        }

        self.transition(TurnTrigger::EndSession);
    }

    fn request_reply(&mut self) {
        let request = self.context.generation_request();
        let generator = Arc::clone(&self.generator);
        let timeout = self.config.generation_timeout;

        debug!("Requesting reply ({} messages of history)", request.history.len());

        self.generation = Some(tokio::spawn(async move {
            match time::timeout(timeout, generator.generate(request)).await {
                Ok(Ok(text)) if text.trim().is_empty() => {
                    Err(ConversationError::Generation("empty reply".to_string()))
                }
                Ok(Ok(text)) => Ok(text),
                Ok(Err(e)) => Err(ConversationError::Generation(format!("{:#}", e))),
                Err(_) => Err(ConversationError::Timeout(timeout)),
            }
        }));
    }

    async fn on_generated(&mut self, result: ConversationResult<String>) {
        if self.state != ConversationState::Processing {
            debug!("Discarding reply received while {}", self.state);
            return;
        }

        match result {
            Ok(text) => {
                self.generation_failures = 0;
                self.speak_reply(text.trim().to_string());
            }
            Err(e) => {
                self.generation_failures += 1;
                warn!(
                    "Reply generation failed ({} in a row): {}",
                    self.generation_failures, e
                );
                let failures = self.generation_failures;
                self.report_failure(&e, failures);

                match self.config.fallback_reply.clone() {
                    Some(fallback) => self.speak_reply(fallback),
                    None => {
                        self.transition(TurnTrigger::GenerationFailed);
                        self.begin_listening().await;
                    }
                }
            }
        }
    }

    fn speak_reply(&mut self, text: String) {
        self.context.push_assistant(&text);
        self.emit(TurnEvent::TurnCompleted {
            role: Role::Assistant,
            text: text.clone(),
            metrics: None,
        });
        self.transition(TurnTrigger::ReplyReady);

        let synthesizer = Arc::clone(&self.synthesizer);
        self.synthesis = Some(tokio::spawn(async move { synthesizer.speak(&text).await }));
    }

    async fn on_spoken(&mut self, result: anyhow::Result<()>) {
        if self.state != ConversationState::Speaking {
            debug!("Discarding synthesis completion received while {}", self.state);
            return;
        }

        match result {
            Ok(()) => {
                self.synthesis_failures = 0;
                self.transition(TurnTrigger::SynthesisFinished);
            }
            Err(e) => {
                self.synthesis_failures += 1;
                warn!("Speech synthesis failed, skipping playback: {:#}", e);
                let failures = self.synthesis_failures;
                self.report_failure(&ConversationError::Synthesis(format!("{:#}", e)), failures);
                self.transition(TurnTrigger::SynthesisFailed);
            }
        }

        self.begin_listening().await;
    }

    /// Acquire capture and enter `Listening` from `WaitingForResponse`
    async fn begin_listening(&mut self) {
        if self.state != ConversationState::WaitingForResponse {
            return;
        }

        match self.acquire_capture().await {
            Ok(()) => {
                let now = Instant::now();
                self.context.begin_turn(now);
                self.metrics_tx.send_replace(self.context.metrics());
                self.silence.arm(now);
                self.turn_cap = self.config.max_turn_duration.map(|cap| now + cap);
                self.transition(TurnTrigger::CaptureReady);
            }
            Err(e) => self.on_capture_failure(e).await,
        }
    }

    async fn acquire_capture(&mut self) -> ConversationResult<()> {
        let (frames_tx, frames_rx) = mpsc::channel(FRAME_CAPACITY);

        if let Some(backend) = self.audio.as_mut() {
            let mut frames = backend
                .start()
                .await
                .map_err(|e| ConversationError::Capture(format!("{:#}", e)))?;

            debug!("Capturing audio from {}", backend.name());

            let mut monitor =
                AmplitudeMonitor::publishing_to(self.config.level_smoothing, Arc::clone(&self.level_tx));
            self.pump = Some(tokio::spawn(async move {
                while let Some(frame) = frames.recv().await {
                    monitor.observe(&frame);
                    if frames_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                monitor.reset();
            }));
        }

        match self.recognizer.start(frames_rx).await {
            Ok(transcripts) => {
                self.transcripts = Some(transcripts);
                self.capturing = true;
                debug!("Recognition started with {}", self.recognizer.name());
                Ok(())
            }
            Err(e) => {
                if let Some(pump) = self.pump.take() {
                    pump.abort();
                }
                if let Some(backend) = self.audio.as_mut() {
                    if let Err(e) = backend.stop().await {
                        error!("Failed to stop audio backend: {:#}", e);
                    }
                }
                Err(ConversationError::Recognition(format!("{:#}", e)))
            }
        }
    }

    /// Stop capture and drop any transcript events still in flight
    async fn release_capture(&mut self) {
        self.silence.cancel();
        self.turn_cap = None;

        if !self.capturing {
            return;
        }
        self.capturing = false;
        self.transcripts = None;

        if let Err(e) = self.recognizer.stop().await {
            error!("Failed to stop recognizer: {:#}", e);
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Some(backend) = self.audio.as_mut() {
            if let Err(e) = backend.stop().await {
                error!("Failed to stop audio backend: {:#}", e);
            }
        }
        self.level_tx.send_replace(0.0);
    }

    /// Retry capture with a delay that doubles per consecutive failure
    async fn on_capture_failure(&mut self, e: ConversationError) {
        self.release_capture().await;
        self.capture_failures += 1;
        let failures = self.capture_failures;

        let delay = retry_delay(self.config.recognition_retry_delay, failures);
        warn!(
            "Capture failed ({} in a row), retrying in {:?}: {}",
            failures, delay, e
        );
        self.report_failure(&e, failures);

        self.transition(TurnTrigger::CaptureFailed);
        self.retry_at = Some(Instant::now() + delay);
    }

    async fn on_retry(&mut self) {
        self.retry_at = None;
        self.begin_listening().await;
    }

    fn on_transcript(&mut self, event: RecognitionEvent) {
        if self.state != ConversationState::Listening {
            return;
        }

        self.capture_failures = 0;
        let now = Instant::now();
        let metrics = self.context.apply_partial(&event.text, now);
        self.silence.on_transcript_update(now);
        self.metrics_tx.send_replace(metrics);

        self.emit(TurnEvent::Transcript {
            text: event.text,
            is_final: event.is_final,
        });
    }

    /// The recognizer closed its stream without being asked to
    async fn on_stream_closed(&mut self) {
        self.transcripts = None;
        if self.state != ConversationState::Listening {
            return;
        }

        if !self.context.snapshot().is_empty() {
            debug!("Transcript stream ended after speech, ending the turn");
            self.end_turn(Instant::now()).await;
            return;
        }

        let error = ConversationError::Recognition("transcript stream ended".to_string());
        self.on_capture_failure(error).await;
    }

    async fn on_silence(&mut self) {
        if self.state != ConversationState::Listening {
            return;
        }

        let now = Instant::now();
        if self.context.snapshot().is_empty() {
            debug!("Silence without speech, still listening");
            self.silence.arm(now);
            self.transition(TurnTrigger::SilenceWithoutSpeech);
            return;
        }

        self.end_turn(now).await;
    }

    async fn on_turn_cap(&mut self) {
        self.turn_cap = None;
        if self.state != ConversationState::Listening {
            return;
        }

        let now = Instant::now();
        if self.context.snapshot().is_empty() {
            self.turn_cap = self.config.max_turn_duration.map(|cap| now + cap);
            return;
        }

        info!("Maximum turn length reached, ending the learner's turn");
        self.end_turn(now).await;
    }

    async fn end_turn(&mut self, now: Instant) {
        self.release_capture().await;

        let message = self.context.finish_turn(now);
        self.metrics_tx.send_replace(self.context.metrics());

        info!(
            "Learner turn complete: \"{}\" ({:.0} wpm, confidence {:.1})",
            message.text,
            self.context.metrics().words_per_minute,
            self.context.metrics().confidence_score
        );

        self.emit(TurnEvent::TurnCompleted {
            role: Role::Learner,
            text: message.text,
            metrics: message.metrics,
        });

        self.transition(TurnTrigger::SilenceWithSpeech);
        self.request_reply();
    }

    /// Surface a failure once per streak, when it reaches the threshold
    fn report_failure(&self, error: &ConversationError, consecutive: u32) {
        if consecutive != self.config.failure_threshold.max(1) {
            return;
        }
        error!("Surfacing {} failure after {} in a row: {}", error.kind(), consecutive, error);
        self.last_error_tx.send_replace(Some(error.to_string()));
        self.emit(TurnEvent::Error {
            kind: error.kind().to_string(),
            message: error.to_string(),
        });
    }

    fn transition(&mut self, trigger: TurnTrigger) {
        match self.state.next(trigger) {
            Some(next) if next != self.state => {
                let from = self.state;
                self.state = next;
                info!("Conversation state: {} -> {} ({:?})", from, next, trigger);
                self.state_tx.send_replace(next);
                self.emit(TurnEvent::StateChanged { from, to: next });
            }
            Some(_) => {}
            None => warn!("Ignoring {:?} while {}", trigger, self.state),
        }
    }

    fn emit(&self, event: TurnEvent) {
        // No subscribers is fine
        let _ = self.events_tx.send(event);
    }
}

fn retry_delay(base: Duration, failures: u32) -> Duration {
    let doublings = failures.saturating_sub(1).min(16);
    base.saturating_mul(1 << doublings).min(MAX_RETRY_DELAY)
}

async fn next_transcript(
    transcripts: &mut Option<mpsc::Receiver<RecognitionEvent>>,
) -> Option<RecognitionEvent> {
    match transcripts {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

async fn join<T>(task: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles_up_to_cap() {
        let base = Duration::from_millis(250);
        assert_eq!(retry_delay(base, 1), Duration::from_millis(250));
        assert_eq!(retry_delay(base, 2), Duration::from_millis(500));
        assert_eq!(retry_delay(base, 4), Duration::from_secs(2));
        assert_eq!(retry_delay(base, 6), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(base, u32::MAX), MAX_RETRY_DELAY);
    }
}
