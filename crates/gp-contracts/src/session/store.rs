use anyhow::{bail, Result};
use uuid::Uuid;

use super::filter::filter_messages;
use super::message::{Message, MessageBody, MessageId, Role};

/// Mutation recorded by a [`Session`], drained by whoever renders or logs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    Appended { id: MessageId, role: Role },
    Resolved { id: MessageId, failed: bool },
    SearchChanged { term: String },
}

/// In-memory conversation: the message log plus the flags the chat view needs.
///
/// Messages are kept newest first. Ids come from a per-session counter, so
/// creation order is also id order. Only one assistant placeholder may be
/// pending at a time, and it is resolved in place exactly once.
#[derive(Debug, Clone)]
pub struct Session {
    session_id: String,
    messages: Vec<Message>,
    next_id: u64,
    pending: Option<MessageId>,
    has_started: bool,
    authenticated: bool,
    search_term: String,
    changes: Vec<SessionChange>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            next_id: 1,
            pending: None,
            has_started: false,
            authenticated: false,
            search_term: String::new(),
            changes: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// All messages, newest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn has_started(&self) -> bool {
        self.has_started
    }

    pub fn mark_started(&mut self) {
        self.has_started = true;
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        let term = term.into();
        if term == self.search_term {
            return;
        }
        self.search_term = term.clone();
        self.changes.push(SessionChange::SearchChanged { term });
    }

    pub fn clear_search(&mut self) {
        self.set_search_term(String::new());
    }

    pub fn pending_id(&self) -> Option<MessageId> {
        self.pending
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Appends a finished message.
    pub fn append(&mut self, role: Role, body: MessageBody) -> Result<MessageId> {
        if body.is_pending() {
            bail!("use append_pending for placeholder messages");
        }
        Ok(self.push(role, body))
    }

    /// Appends the assistant placeholder for the turn in flight.
    pub fn append_pending(&mut self) -> Result<MessageId> {
        if let Some(existing) = self.pending {
            bail!("message {existing} is already pending");
        }
        let id = self.push(Role::Assistant, MessageBody::Pending);
        self.pending = Some(id);
        Ok(id)
    }

    /// Replaces the pending placeholder `id` with its final body. `failed`
    /// marks a body that stands in for a reply the provider never gave.
    pub fn resolve_pending(&mut self, id: MessageId, body: MessageBody, failed: bool) -> Result<()> {
        if self.pending != Some(id) {
            bail!("message {id} is not the pending message");
        }
        if body.is_pending() {
            bail!("message {id} must resolve to final content");
        }
        let Some(message) = self.messages.iter_mut().find(|message| message.id == id) else {
            bail!("pending message {id} missing from the log");
        };
        message.body = body;
        self.pending = None;
        self.changes.push(SessionChange::Resolved { id, failed });
        Ok(())
    }

    /// Messages filtered by the current search term.
    pub fn visible_messages(&self) -> Vec<&Message> {
        filter_messages(&self.messages, &self.search_term)
    }

    pub fn take_changes(&mut self) -> Vec<SessionChange> {
        std::mem::take(&mut self.changes)
    }

    fn push(&mut self, role: Role, body: MessageBody) -> MessageId {
        let id = MessageId::new(self.next_id);
        self.next_id += 1;
        self.messages.insert(0, Message { id, role, body });
        self.changes.push(SessionChange::Appended { id, role });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::{Session, SessionChange};
    use crate::session::{MessageBody, Role};

    #[test]
    fn messages_are_newest_first_with_monotonic_ids() -> anyhow::Result<()> {
        let mut session = Session::with_id("s-1");
        let first = session.append(Role::User, MessageBody::text("one"))?;
        let second = session.append_pending()?;
        let third_err = session.append_pending();
        assert!(third_err.is_err());

        let ids: Vec<u64> = session.messages().iter().map(|m| m.id.get()).collect();
        assert_eq!(ids, vec![second.get(), first.get()]);
        assert!(first < second);
        assert_eq!(session.pending_id(), Some(second));
        Ok(())
    }

    #[test]
    fn pending_resolves_once_in_place() -> anyhow::Result<()> {
        let mut session = Session::with_id("s-1");
        session.append(Role::User, MessageBody::text("hello"))?;
        let pending = session.append_pending()?;
        assert!(session.get(pending).is_some_and(|m| m.is_pending()));

        session.resolve_pending(pending, MessageBody::text("hi there"), false)?;
        let resolved = session.get(pending).expect("resolved message");
        assert_eq!(resolved.text(), Some("hi there"));
        assert!(!resolved.is_pending());
        assert!(!session.has_pending());
        assert_eq!(session.messages()[0].id, pending);

        assert!(session
            .resolve_pending(pending, MessageBody::text("again"), false)
            .is_err());
        Ok(())
    }

    #[test]
    fn resolve_rejects_unknown_ids_and_pending_bodies() -> anyhow::Result<()> {
        let mut session = Session::with_id("s-1");
        let user = session.append(Role::User, MessageBody::text("hello"))?;
        let pending = session.append_pending()?;
        assert!(session.resolve_pending(user, MessageBody::text("x"), false).is_err());
        assert!(session.resolve_pending(pending, MessageBody::Pending, false).is_err());
        assert!(session.append(Role::Assistant, MessageBody::Pending).is_err());
        assert_eq!(session.pending_id(), Some(pending));
        Ok(())
    }

    #[test]
    fn changes_are_recorded_and_drained() -> anyhow::Result<()> {
        let mut session = Session::with_id("s-1");
        let user = session.append(Role::User, MessageBody::text("hello"))?;
        session.set_search_term("hel");
        session.set_search_term("hel");
        let pending = session.append_pending()?;
        session.resolve_pending(pending, MessageBody::text("done"), true)?;

        assert_eq!(
            session.take_changes(),
            vec![
                SessionChange::Appended {
                    id: user,
                    role: Role::User
                },
                SessionChange::SearchChanged {
                    term: "hel".to_string()
                },
                SessionChange::Appended {
                    id: pending,
                    role: Role::Assistant
                },
                SessionChange::Resolved {
                    id: pending,
                    failed: true
                },
            ]
        );
        assert!(session.take_changes().is_empty());
        Ok(())
    }

    #[test]
    fn visible_messages_follow_search_term() -> anyhow::Result<()> {
        let mut session = Session::new();
        assert!(!session.session_id().is_empty());
        session.append(Role::User, MessageBody::text("Cats"))?;
        session.append(Role::Assistant, MessageBody::text("Dogs"))?;
        assert_eq!(session.visible_messages().len(), 2);
        session.set_search_term("cat");
        assert_eq!(session.visible_messages().len(), 1);
        session.clear_search();
        assert_eq!(session.search_term(), "");
        assert_eq!(session.visible_messages().len(), 2);
        Ok(())
    }
}
