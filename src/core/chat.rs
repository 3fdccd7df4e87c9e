//! Turn handling for a single conversation.
//!
//! A [`Conversation`] owns the active [`Session`] and moves through
//! `Idle -> Generating -> Idle` for each turn. [`Conversation::submit`] runs a
//! whole turn against a [`ModelRunner`]; callers that drive generation
//! themselves use [`Conversation::begin_turn`] and
//! [`Conversation::finish_turn`] and may observe the intermediate state.

use crate::core::generation::GenerationSettings;
use crate::core::message::{Message, Role};
use crate::core::runner::{ModelRunner, RunnerError};
use crate::core::session::Session;
use std::fmt;
use tracing::{debug, warn};

/// Label that opens the model's reply in a composed prompt.
pub const ASSISTANT_PREFIX: &str = "Assistant: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    Generating,
}

#[derive(Debug)]
pub enum ChatError {
    /// No model is loaded; the transcript was not touched.
    ModelNotLoaded,
    /// A turn is already in progress.
    Busy,
    /// The input contained nothing but whitespace.
    EmptyInput,
    /// The runner failed. The user message stays in the transcript.
    GenerationFailed(RunnerError),
    /// A turn was finished without one having been started.
    NoTurnInProgress,
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::ModelNotLoaded => {
                write!(f, "No model loaded. Use /load-model <path> first")
            }
            ChatError::Busy => write!(f, "A response is still being generated"),
            ChatError::EmptyInput => write!(f, "Nothing to send"),
            ChatError::GenerationFailed(err) => write!(f, "Generation failed: {err}"),
            ChatError::NoTurnInProgress => write!(f, "No response is being generated"),
        }
    }
}

impl std::error::Error for ChatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChatError::GenerationFailed(err) => Some(err),
            _ => None,
        }
    }
}

/// Build the text sent to the model.
///
/// Persona instructions come first when present, followed by every user and
/// assistant message as `User: ...` / `Assistant: ...` blocks. System
/// messages are local notes and are never sent. The prompt ends with an open
/// `Assistant: ` line for the model to complete.
pub fn compose_prompt(messages: &[Message], instructions: Option<&str>) -> String {
    let mut prompt = String::new();
    if let Some(instructions) = instructions.filter(|text| !text.trim().is_empty()) {
        prompt.push_str(instructions);
        prompt.push_str("\n\n");
    }
    for message in messages {
        let Some(label) = message.role.prompt_label() else {
            continue;
        };
        prompt.push_str(label);
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push_str("\n\n");
    }
    prompt.push_str(ASSISTANT_PREFIX);
    prompt
}

/// A turn that has been started and is waiting for the model.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub prompt: String,
    pub settings: GenerationSettings,
}

pub struct Conversation {
    session: Session,
    state: ChatState,
}

impl Conversation {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            state: ChatState::Idle,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == ChatState::Generating
    }

    /// Swap in a different session, e.g. after `/load`.
    pub fn replace_session(&mut self, session: Session) -> Result<Session, ChatError> {
        if self.is_busy() {
            return Err(ChatError::Busy);
        }
        Ok(std::mem::replace(&mut self.session, session))
    }

    /// Drop every message from the transcript. Settings are kept.
    pub fn clear(&mut self) -> Result<(), ChatError> {
        if self.is_busy() {
            return Err(ChatError::Busy);
        }
        self.session.messages.clear();
        Ok(())
    }

    /// Record a local note in the transcript. Notes are not sent to the model.
    pub fn push_note(&mut self, text: impl Into<String>) -> Result<(), ChatError> {
        if self.is_busy() {
            return Err(ChatError::Busy);
        }
        self.session.messages.push(Message::system(text));
        Ok(())
    }

    /// Validate input, append the user message and enter `Generating`.
    ///
    /// Nothing is appended when an error is returned.
    pub fn begin_turn(
        &mut self,
        user_text: &str,
        model_loaded: bool,
    ) -> Result<PendingTurn, ChatError> {
        if self.is_busy() {
            return Err(ChatError::Busy);
        }
        if !model_loaded {
            return Err(ChatError::ModelNotLoaded);
        }
        let text = user_text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyInput);
        }

        self.session.messages.push(Message::user(text));
        let prompt = compose_prompt(
            &self.session.messages,
            self.session.persona_instructions(),
        );
        self.state = ChatState::Generating;
        debug!(
            messages = self.session.messages.len(),
            prompt_chars = prompt.len(),
            "turn started"
        );

        Ok(PendingTurn {
            prompt,
            settings: self.session.generation_settings.clone(),
        })
    }

    /// Apply the runner's result and return to `Idle`.
    pub fn finish_turn(
        &mut self,
        _turn: PendingTurn,
        result: Result<String, RunnerError>,
    ) -> Result<Message, ChatError> {
        if !self.is_busy() {
            return Err(ChatError::NoTurnInProgress);
        }
        self.state = ChatState::Idle;
        match result {
            Ok(text) => {
                let message = Message::new(Role::Assistant, text.trim());
                self.session.messages.push(message.clone());
                Ok(message)
            }
            Err(err) => {
                warn!(error = %err, "generation failed");
                Err(ChatError::GenerationFailed(err))
            }
        }
    }

    /// Run one full turn: append the user message, generate, append the reply.
    pub async fn submit(
        &mut self,
        user_text: &str,
        runner: Option<&dyn ModelRunner>,
    ) -> Result<Message, ChatError> {
        let Some(runner) = runner else {
            return Err(ChatError::ModelNotLoaded);
        };
        let turn = self.begin_turn(user_text, true)?;
        let result = runner.generate(&turn.prompt, &turn.settings).await;
        self.finish_turn(turn, result)
    }
}
