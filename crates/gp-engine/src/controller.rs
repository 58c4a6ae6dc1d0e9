use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use gp_contracts::events::{EventPayload, EventWriter};
use gp_contracts::session::{
    ImageBlob, ImageRef, MessageBody, MessageId, Role, Session, SessionChange,
};
use serde_json::Value;

use crate::{error_chain_text, GenerationClient};

pub const IMAGINE_PREFIX: &str = "/imagine ";
pub const IMAGINE_MISSING_PROMPT_REPLY: &str = "Please provide a prompt after /imagine.";
pub const TURN_FAILED_REPLY: &str = "Sorry, I encountered an error. Please try again.";

const EVENT_ERROR_MAX_CHARS: usize = 1024;

/// Why a send was ignored. Nothing is appended and no provider call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejected {
    EmptyInput,
    TurnInFlight,
}

impl SendRejected {
    pub fn as_str(self) -> &'static str {
        match self {
            SendRejected::EmptyInput => "empty_input",
            SendRejected::TurnInFlight => "turn_in_flight",
        }
    }
}

impl fmt::Display for SendRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendRejected::EmptyInput => write!(f, "nothing to send"),
            SendRejected::TurnInFlight => write!(f, "a reply is still pending"),
        }
    }
}

impl std::error::Error for SendRejected {}

/// Provider work a turn needs, decided from the raw input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnRequest {
    Imagine { prompt: String },
    ImagineWithoutPrompt,
    TextWithImage { prompt: String, image: ImageBlob },
    Text { prompt: String },
}

impl TurnRequest {
    /// First match wins: `/imagine ` prefix (any case), then an attached
    /// image, then plain text. An image sent with `/imagine` is not
    /// forwarded.
    pub fn route(text: &str, image: Option<ImageBlob>) -> Self {
        let has_prefix = text
            .get(..IMAGINE_PREFIX.len())
            .map(|head| head.eq_ignore_ascii_case(IMAGINE_PREFIX))
            .unwrap_or(false);
        if has_prefix {
            let prompt = text[IMAGINE_PREFIX.len()..].trim();
            if prompt.is_empty() {
                return TurnRequest::ImagineWithoutPrompt;
            }
            return TurnRequest::Imagine {
                prompt: prompt.to_string(),
            };
        }
        let prompt = text.trim().to_string();
        match image {
            Some(image) => TurnRequest::TextWithImage { prompt, image },
            None => TurnRequest::Text { prompt },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TurnRequest::Imagine { .. } => "imagine",
            TurnRequest::ImagineWithoutPrompt => "imagine_without_prompt",
            TurnRequest::TextWithImage { .. } => "text_with_image",
            TurnRequest::Text { .. } => "text",
        }
    }

    pub fn needs_provider(&self) -> bool {
        !matches!(self, TurnRequest::ImagineWithoutPrompt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub text: String,
    pub image_data_uri: Option<String>,
}

impl TurnReply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_data_uri: None,
        }
    }
}

/// A turn whose placeholder is waiting on [`execute_turn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    pub user_id: MessageId,
    pub assistant_id: MessageId,
    pub request: TurnRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Rejected(SendRejected),
    Completed {
        user_id: MessageId,
        assistant_id: MessageId,
        failed: bool,
    },
}

/// Performs the provider call for `request`. Safe to run off the thread
/// that owns the controller.
pub fn execute_turn(client: &dyn GenerationClient, request: &TurnRequest) -> Result<TurnReply> {
    match request {
        TurnRequest::Imagine { prompt } => {
            let data_uri = client.generate_image(prompt)?;
            Ok(TurnReply {
                text: format!("Image generated for: \"{prompt}\""),
                image_data_uri: Some(data_uri),
            })
        }
        TurnRequest::ImagineWithoutPrompt => Ok(TurnReply::text(IMAGINE_MISSING_PROMPT_REPLY)),
        TurnRequest::TextWithImage { prompt, image } => Ok(TurnReply::text(
            client.generate_text_with_image(prompt, image)?,
        )),
        TurnRequest::Text { prompt } => Ok(TurnReply::text(client.generate_text(prompt)?)),
    }
}

/// Owns the session and drives one request/response turn at a time.
pub struct ConversationController {
    client: Arc<dyn GenerationClient>,
    session: Session,
    events: Option<EventWriter>,
}

impl ConversationController {
    pub fn new(client: Arc<dyn GenerationClient>, session: Session) -> Self {
        Self {
            client,
            session,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn client(&self) -> Arc<dyn GenerationClient> {
        Arc::clone(&self.client)
    }

    pub fn is_busy(&self) -> bool {
        self.session.has_pending()
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.session.set_authenticated(authenticated);
    }

    pub fn set_search_term(&mut self, term: &str) {
        self.session.set_search_term(term);
        self.record_changes();
    }

    /// Appends the user message and the pending placeholder.
    ///
    /// Fails with [`SendRejected`] (recoverable through `downcast_ref`) for
    /// blank input or while another turn is pending; the session is left
    /// untouched in that case.
    pub fn begin_turn(&mut self, text: &str, image: Option<ImageBlob>) -> Result<PendingTurn> {
        let rejected = if text.trim().is_empty() && image.is_none() {
            Some(SendRejected::EmptyInput)
        } else if self.session.has_pending() {
            Some(SendRejected::TurnInFlight)
        } else {
            None
        };
        if let Some(reason) = rejected {
            self.emit("send_rejected", payload([("reason", reason.as_str().into())]));
            return Err(reason.into());
        }

        self.session.mark_started();
        self.session.clear_search();
        let user_body = MessageBody::compose(
            Some(text.to_string()),
            image.as_ref().map(ImageBlob::preview),
        )
        .unwrap_or_else(|| MessageBody::text(text));
        let user_id = self.session.append(Role::User, user_body)?;
        let assistant_id = self.session.append_pending()?;
        self.record_changes();

        let request = TurnRequest::route(text, image);
        self.emit(
            "turn_dispatched",
            payload([
                ("message_id", assistant_id.get().into()),
                ("route", request.kind().into()),
            ]),
        );
        Ok(PendingTurn {
            user_id,
            assistant_id,
            request,
        })
    }

    /// Resolves the turn's placeholder in place. A failed turn gets the
    /// fixed apology; the error itself only reaches the event log.
    pub fn resolve_turn(&mut self, turn: PendingTurn, result: Result<TurnReply>) -> Result<bool> {
        let id = turn.assistant_id;
        let resolved = result.and_then(|reply| {
            MessageBody::compose(
                Some(reply.text),
                reply
                    .image_data_uri
                    .map(|data_uri| ImageRef::Generated { data_uri }),
            )
            .ok_or_else(|| anyhow::anyhow!("provider reply was empty"))
        });
        let (body, failure) = match resolved {
            Ok(body) => (body, None),
            Err(err) => (
                MessageBody::text(TURN_FAILED_REPLY),
                Some(error_chain_text(&err, EVENT_ERROR_MAX_CHARS)),
            ),
        };
        let failed = failure.is_some();

        self.session.resolve_pending(id, body, failed)?;
        self.record_changes();
        match failure {
            Some(error) => self.emit(
                "turn_failed",
                payload([
                    ("message_id", id.get().into()),
                    ("route", turn.request.kind().into()),
                    ("error", error.into()),
                ]),
            ),
            None => self.emit(
                "turn_resolved",
                payload([
                    ("message_id", id.get().into()),
                    ("route", turn.request.kind().into()),
                ]),
            ),
        }
        Ok(failed)
    }

    /// One complete turn on the calling thread.
    pub fn send(&mut self, text: &str, image: Option<ImageBlob>) -> Result<SendOutcome> {
        let turn = match self.begin_turn(text, image) {
            Ok(turn) => turn,
            Err(err) => {
                if let Some(reason) = err.downcast_ref::<SendRejected>() {
                    return Ok(SendOutcome::Rejected(*reason));
                }
                return Err(err);
            }
        };
        let result = execute_turn(self.client.as_ref(), &turn.request);
        let user_id = turn.user_id;
        let assistant_id = turn.assistant_id;
        let failed = self.resolve_turn(turn, result)?;
        Ok(SendOutcome::Completed {
            user_id,
            assistant_id,
            failed,
        })
    }

    fn record_changes(&mut self) {
        for change in self.session.take_changes() {
            match change {
                SessionChange::Appended { id, role } => {
                    let pending = self.session.get(id).is_some_and(|m| m.is_pending());
                    self.emit(
                        "message_appended",
                        payload([
                            ("message_id", id.get().into()),
                            ("role", role.as_str().into()),
                            ("pending", pending.into()),
                        ]),
                    );
                }
                SessionChange::Resolved { id, failed } => {
                    let has_image = self
                        .session
                        .get(id)
                        .is_some_and(|m| m.image().is_some());
                    self.emit(
                        "message_resolved",
                        payload([
                            ("message_id", id.get().into()),
                            ("has_image", has_image.into()),
                            ("failed", failed.into()),
                        ]),
                    );
                }
                SessionChange::SearchChanged { term } => {
                    self.emit("search_changed", payload([("term", term.into())]));
                }
            }
        }
    }

    /// Best effort: a broken event log never blocks or strands a turn.
    fn emit(&self, event_type: &str, payload: EventPayload) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        if let Err(err) = events.emit(event_type, payload) {
            eprintln!("gp event log: {err:#}");
        }
    }
}

fn payload<const N: usize>(fields: [(&str, Value); N]) -> EventPayload {
    fields
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
