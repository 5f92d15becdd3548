//! External speech collaborators
//!
//! The conversation engine only talks to recognition, response generation
//! and synthesis through these traits. Concrete implementations live in
//! `crate::nats` (service-backed) and `scripted` (deterministic playback).

mod generator;
mod recognizer;
pub mod scripted;
mod synthesizer;

pub use generator::{GenerationRequest, ResponseGenerator};
pub use recognizer::{RecognitionEvent, SpeechRecognizer};
pub use scripted::{ScriptStep, ScriptedGenerator, ScriptedRecognizer, ScriptedSynthesizer};
pub use synthesizer::SpeechSynthesizer;
