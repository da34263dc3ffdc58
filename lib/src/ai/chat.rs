// lib/src/ai/chat.rs
//! Rule-based assistant chat. Sessions live in memory only.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use models::{MedError, MedResult, ValidationError};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::analysis::{AnalysisReport, SymptomAnalyzer, Urgency};
use crate::config::AiConfig;
use crate::context::Actor;

pub const DISCLAIMER: &str = "This assistant does not give medical diagnoses. Please consult a doctor.";
const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub content: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct ChatSession {
    owner: Uuid,
    messages: Vec<ChatMessage>,
    last_active: Instant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub session_id: Uuid,
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisReport>,
}

#[derive(Debug, Clone)]
pub struct ChatService {
    sessions: Arc<RwLock<HashMap<Uuid, ChatSession>>>,
    analyzer: SymptomAnalyzer,
    max_history: usize,
    session_ttl: Duration,
    max_sessions_per_user: usize,
}

const GREETINGS: &[&str] = &["hello", "hi", "hey", "greetings"];
const BOOKING_WORDS: &[&str] = &["appointment", "book", "schedule", "reschedule", "cancel"];

impl ChatService {
    pub fn new(analyzer: SymptomAnalyzer, config: &AiConfig) -> Self {
        ChatService {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            analyzer,
            max_history: config.max_history.max(2),
            session_ttl: Duration::from_secs(config.session_ttl_secs),
            max_sessions_per_user: config.max_sessions_per_user.max(1),
        }
    }

    fn expired(&self, session: &ChatSession, now: Instant) -> bool {
        now.saturating_duration_since(session.last_active) >= self.session_ttl
    }

    fn respond(&self, message: &str) -> (String, Option<AnalysisReport>) {
        let lower = message.to_lowercase();
        let words: Vec<&str> = lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();
        if words.len() <= 4 && words.first().is_some_and(|w| GREETINGS.contains(w)) {
            return ("Hello! I can help you find a doctor, book an appointment or describe your symptoms.".into(), None);
        }
        if BOOKING_WORDS.iter().any(|w| lower.contains(w)) {
            return (
                "You can see open slots under Appointments and book one directly. \
                 Pending appointments can be cancelled or moved to another slot of the same doctor."
                    .into(),
                None,
            );
        }
        let report = self.analyzer.analyze(message);
        if report.matched.is_empty() && report.urgency == Urgency::Routine {
            return (format!("I'm not sure I understood. Could you describe your symptoms? {}", DISCLAIMER), None);
        }
        let reply = format!(
            "Urgency: {}. Suggested specialties: {}. {} {}",
            report.urgency,
            report.suggested_specialties.join(", "),
            report.advice,
            DISCLAIMER
        );
        (reply, Some(report))
    }

    /// Sends a message, opening a new session when `session_id` is `None`.
    /// Idle sessions expire; opening one past the per-user cap drops that
    /// user's least recently used session.
    pub async fn send(&self, actor: &Actor, session_id: Option<Uuid>, message: &str) -> MedResult<ChatReply> {
        self.send_at(actor, session_id, message, Instant::now()).await
    }

    async fn send_at(&self, actor: &Actor, session_id: Option<Uuid>, message: &str, now: Instant) -> MedResult<ChatReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ValidationError::MissingField("message").into());
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ValidationError::InvalidValue { field: "message", reason: format!("at most {MAX_MESSAGE_CHARS} characters") }.into());
        }
        let (reply, analysis) = self.respond(message);

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !self.expired(s, now));
        if sessions.len() < before {
            debug!(dropped = before - sessions.len(), "idle chat sessions expired");
        }
        let session_id = match session_id {
            Some(id) => match sessions.get(&id) {
                Some(s) if s.owner == actor.user_id => id,
                _ => return Err(MedError::not_found("Chat session", id)),
            },
            None => {
                let owned: Vec<(Uuid, Instant)> =
                    sessions.iter().filter(|(_, s)| s.owner == actor.user_id).map(|(id, s)| (*id, s.last_active)).collect();
                if owned.len() >= self.max_sessions_per_user {
                    if let Some((oldest, _)) = owned.iter().min_by_key(|(_, at)| *at) {
                        sessions.remove(oldest);
                        debug!(session = %oldest, user = %actor.user_id, "chat session evicted");
                    }
                }
                let id = Uuid::new_v4();
                sessions.insert(id, ChatSession { owner: actor.user_id, messages: Vec::new(), last_active: now });
                debug!(session = %id, user = %actor.user_id, "chat session opened");
                id
            }
        };
        let Some(session) = sessions.get_mut(&session_id) else {
            return Err(MedError::not_found("Chat session", session_id));
        };
        session.last_active = now;
        let at = Utc::now();
        session.messages.push(ChatMessage { speaker: Speaker::User, content: message.to_string(), at });
        session.messages.push(ChatMessage { speaker: Speaker::Assistant, content: reply.clone(), at });
        if session.messages.len() > self.max_history {
            let excess = session.messages.len() - self.max_history;
            session.messages.drain(..excess);
        }
        Ok(ChatReply { session_id, reply, analysis })
    }

    pub async fn history(&self, actor: &Actor, session_id: Uuid) -> MedResult<Vec<ChatMessage>> {
        let sessions = self.sessions.read().await;
        match sessions.get(&session_id) {
            Some(s) if s.owner == actor.user_id && !self.expired(s, Instant::now()) => Ok(s.messages.clone()),
            _ => Err(MedError::not_found("Chat session", session_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::medical::UserRole;

    fn actor() -> Actor {
        Actor::new(Uuid::new_v4(), UserRole::Patient, Some(Uuid::new_v4()))
    }

    fn service(max_history: usize) -> ChatService {
        ChatService::new(SymptomAnalyzer::new(), &AiConfig { max_history, ..AiConfig::default() })
    }

    #[tokio::test]
    async fn sessions_belong_to_their_creator() {
        let chat = service(10);
        let me = actor();
        let reply = chat.send(&me, None, "Hello there").await.unwrap();
        assert!(reply.reply.starts_with("Hello!"));
        chat.send(&me, Some(reply.session_id), "I have a fever").await.unwrap();
        assert_eq!(chat.history(&me, reply.session_id).await.unwrap().len(), 4);

        let stranger = actor();
        assert!(chat.history(&stranger, reply.session_id).await.is_err());
        assert!(chat.send(&stranger, Some(reply.session_id), "hi").await.is_err());
    }

    #[tokio::test]
    async fn symptoms_are_triaged_with_disclaimer() {
        let chat = service(10);
        let reply = chat.send(&actor(), None, "sudden shortness of breath").await.unwrap();
        let analysis = reply.analysis.unwrap();
        assert_eq!(analysis.urgency, Urgency::Emergency);
        assert!(reply.reply.ends_with(DISCLAIMER));
    }

    #[tokio::test]
    async fn history_is_trimmed() {
        let chat = service(4);
        let me = actor();
        let first = chat.send(&me, None, "first question about my rash").await.unwrap();
        for i in 0..5 {
            chat.send(&me, Some(first.session_id), &format!("follow up {i}")).await.unwrap();
        }
        let history = chat.history(&me, first.session_id).await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "follow up 3");
        assert!(chat.send(&me, None, "   ").await.is_err());
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let config = AiConfig { session_ttl_secs: 60, ..AiConfig::default() };
        let chat = ChatService::new(SymptomAnalyzer::new(), &config);
        let me = actor();
        let start = Instant::now();
        let reply = chat.send_at(&me, None, "hello", start).await.unwrap();
        chat.send_at(&me, Some(reply.session_id), "still here", start + Duration::from_secs(50)).await.unwrap();

        let later = start + Duration::from_secs(50 + 61);
        let gone = chat.send_at(&me, Some(reply.session_id), "anyone?", later).await;
        assert!(matches!(gone, Err(MedError::NotFound { .. })));
        assert!(chat.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn opening_past_the_cap_evicts_the_least_recent_session() {
        let config = AiConfig { max_sessions_per_user: 2, ..AiConfig::default() };
        let chat = ChatService::new(SymptomAnalyzer::new(), &config);
        let me = actor();
        let start = Instant::now();
        let first = chat.send_at(&me, None, "hello", start).await.unwrap().session_id;
        let second = chat.send_at(&me, None, "hello", start + Duration::from_secs(1)).await.unwrap().session_id;
        // Touching the first makes the second the least recently used.
        chat.send_at(&me, Some(first), "hi again", start + Duration::from_secs(2)).await.unwrap();
        let third = chat.send_at(&me, None, "hello", start + Duration::from_secs(3)).await.unwrap().session_id;

        assert!(chat.history(&me, first).await.is_ok());
        assert!(chat.history(&me, second).await.is_err());
        assert!(chat.history(&me, third).await.is_ok());

        // Other users keep their own allowance.
        let other = actor();
        chat.send_at(&other, None, "hello", start + Duration::from_secs(4)).await.unwrap();
        assert_eq!(chat.sessions.read().await.len(), 3);
    }
}
