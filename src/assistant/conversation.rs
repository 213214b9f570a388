use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use super::ollama::ChatModel;
use super::prompt;
use super::AssistantError;
use crate::db::repository;
use crate::models::{AiTurn, ConversationKey, Report, TurnRole};

/// Context window: the instruction turn plus this many most-recent turns
/// go to the model.
const CONTEXT_WINDOW_TURNS: usize = 10;

/// Default newest-bound on history reads.
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Returned to the caller when the model call fails. Conversation
/// continuity is prioritized over failure transparency.
const FALLBACK_RESPONSE: &str = "I'm sorry, I'm having trouble responding right now. \
     Please try again in a few minutes. For any urgent concern, contact your treating \
     doctor directly — they are always your best source of guidance.";

/// Result of starting a conversation: the computed key plus a
/// display-oriented report summary when one is attached.
#[derive(Debug, Clone)]
pub struct ConversationStart {
    pub key: ConversationKey,
    pub summary: Option<ReportSummary>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ReportSummary {
    pub patient_name: String,
    pub patient_age: Option<u32>,
    pub patient_gender: Option<String>,
    pub diagnosis: String,
    pub confidence_percentage: f64,
    pub severity: &'static str,
}

impl ReportSummary {
    fn from_report(report: &Report) -> Self {
        Self {
            patient_name: report.patient_name.clone(),
            patient_age: report.patient_age,
            patient_gender: report.patient_gender.clone(),
            diagnosis: report.disease_name.clone(),
            confidence_percentage: report.confidence_percentage,
            severity: prompt::severity_band(report.confidence_percentage),
        }
    }
}

/// Manages AI conversation lifecycle: key computation, turn persistence,
/// bounded context assembly, and fallback on model failure.
pub struct AssistantManager<'a> {
    conn: &'a Connection,
    model: &'a dyn ChatModel,
}

impl<'a> AssistantManager<'a> {
    pub fn new(conn: &'a Connection, model: &'a dyn ChatModel) -> Self {
        Self { conn, model }
    }

    /// Start (or resume) a conversation for a requester.
    ///
    /// With a report id the conversation is grounded: the report must
    /// exist, and when its patient identity is known it must match the
    /// requester.
    pub fn start(
        &self,
        requester: &str,
        report_id: Option<&str>,
    ) -> Result<ConversationStart, AssistantError> {
        let requester = requester.trim().to_lowercase();
        if requester.is_empty() {
            return Err(AssistantError::EmptyRequester);
        }

        let Some(report_id) = report_id else {
            return Ok(ConversationStart {
                key: ConversationKey::General { requester },
                summary: None,
            });
        };

        let report = self.load_report(report_id)?;
        if let Some(patient_email) = &report.patient_email {
            if !patient_email.eq_ignore_ascii_case(&requester) {
                return Err(AssistantError::Forbidden);
            }
        }

        Ok(ConversationStart {
            key: ConversationKey::ReportGrounded {
                requester,
                report_id: report.report_id.clone(),
            },
            summary: Some(ReportSummary::from_report(&report)),
        })
    }

    /// Process one user turn: persist it, assemble the bounded context,
    /// call the model, persist and return the assistant turn.
    ///
    /// A model failure never surfaces as a hard error: the user turn is
    /// already durable, and a static fallback is persisted and returned
    /// in place of the model response.
    pub fn send(&self, key: &ConversationKey, user_text: &str) -> Result<AiTurn, AssistantError> {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(AssistantError::EmptyMessage);
        }
        if key.requester().trim().is_empty() {
            return Err(AssistantError::EmptyRequester);
        }

        // The user turn is durable before any model call.
        self.persist_turn(key, TurnRole::User, user_text)?;

        let report = match key.report_id() {
            Some(report_id) => Some(self.load_report(report_id)?),
            None => None,
        };

        let window =
            repository::recent_ai_turns(self.conn, &key.storage_key(), CONTEXT_WINDOW_TURNS)?;
        let mut messages = vec![prompt::instruction_turn(report.as_ref())];
        messages.extend(prompt::history_messages(&window));

        let response = match self.model.invoke(&messages) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                tracing::warn!(key = %key.storage_key(), "model returned empty text, using fallback");
                FALLBACK_RESPONSE.to_string()
            }
            Err(e) => {
                tracing::warn!(key = %key.storage_key(), error = %e, "model call failed, using fallback");
                FALLBACK_RESPONSE.to_string()
            }
        };

        self.persist_turn(key, TurnRole::Assistant, &response)
    }

    /// The most recent `limit` turns (default cap 200), ascending order.
    /// Restartable read.
    pub fn history(
        &self,
        key: &ConversationKey,
        limit: Option<usize>,
    ) -> Result<Vec<AiTurn>, AssistantError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        Ok(repository::recent_ai_turns(
            self.conn,
            &key.storage_key(),
            limit,
        )?)
    }

    fn load_report(&self, report_id: &str) -> Result<Report, AssistantError> {
        repository::get_report(self.conn, report_id)?
            .ok_or_else(|| AssistantError::ReportNotFound(report_id.to_string()))
    }

    fn persist_turn(
        &self,
        key: &ConversationKey,
        role: TurnRole,
        content: &str,
    ) -> Result<AiTurn, AssistantError> {
        let mut turn = AiTurn {
            id: Uuid::new_v4(),
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
            seq: 0,
        };
        turn.seq = repository::insert_ai_turn(self.conn, &key.storage_key(), &turn)?;
        Ok(turn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::ollama::ChatMessage;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{DiseaseType, ImageResult};
    use std::sync::Mutex;

    /// Chat model double: either answers fixed text or fails, and records
    /// what it was asked.
    struct FakeModel {
        response: Result<String, String>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl FakeModel {
        fn answering(text: &str) -> Self {
            Self {
                response: Ok(text.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                response: Err("quota exceeded".into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn last_request(&self) -> Vec<ChatMessage> {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl ChatModel for FakeModel {
        fn invoke(&self, messages: &[ChatMessage]) -> Result<String, AssistantError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.response
                .clone()
                .map_err(AssistantError::ModelUnavailable)
        }
    }

    fn seed_report(conn: &Connection, report_id: &str, patient: Option<&str>) {
        let report = Report {
            report_id: report_id.into(),
            patient_email: patient.map(String::from),
            patient_name: "Pat Doe".into(),
            patient_age: Some(61),
            patient_gender: Some("female".into()),
            doctor_email: "doc@example.com".into(),
            disease_type: DiseaseType::Pneumonia,
            disease_name: "Pneumonia".into(),
            probability: 0.72,
            has_disease: true,
            confidence_percentage: 72.0,
            image_results: vec![ImageResult {
                probability: 0.72,
                label: "Pneumonia".into(),
            }],
            images_requested: 1,
            images_evaluated: 1,
            created_at: Utc::now(),
        };
        repository::insert_report(conn, &report).unwrap();
    }

    #[test]
    fn start_without_report_is_general() {
        let conn = open_memory_database().unwrap();
        let model = FakeModel::answering("ok");
        let manager = AssistantManager::new(&conn, &model);

        let started = manager.start(" Pat@Example.Com ", None).unwrap();
        assert_eq!(
            started.key,
            ConversationKey::General {
                requester: "pat@example.com".into()
            }
        );
        assert!(started.summary.is_none());
    }

    #[test]
    fn start_rejects_blank_requester() {
        let conn = open_memory_database().unwrap();
        let model = FakeModel::answering("ok");
        let manager = AssistantManager::new(&conn, &model);

        assert!(matches!(
            manager.start("   ", None),
            Err(AssistantError::EmptyRequester)
        ));

        let key = ConversationKey::General {
            requester: "  ".into(),
        };
        assert!(matches!(
            manager.send(&key, "hello"),
            Err(AssistantError::EmptyRequester)
        ));
    }

    #[test]
    fn start_with_unknown_report_is_not_found() {
        let conn = open_memory_database().unwrap();
        let model = FakeModel::answering("ok");
        let manager = AssistantManager::new(&conn, &model);

        let result = manager.start("pat@example.com", Some("RPT-missing"));
        assert!(matches!(result, Err(AssistantError::ReportNotFound(_))));
    }

    #[test]
    fn start_with_foreign_report_is_forbidden() {
        let conn = open_memory_database().unwrap();
        seed_report(&conn, "RPT-1", Some("someone-else@example.com"));
        let model = FakeModel::answering("ok");
        let manager = AssistantManager::new(&conn, &model);

        let result = manager.start("pat@example.com", Some("RPT-1"));
        assert!(matches!(result, Err(AssistantError::Forbidden)));
    }

    #[test]
    fn start_with_unattributed_report_is_allowed() {
        let conn = open_memory_database().unwrap();
        seed_report(&conn, "RPT-1", None);
        let model = FakeModel::answering("ok");
        let manager = AssistantManager::new(&conn, &model);

        let started = manager.start("pat@example.com", Some("RPT-1")).unwrap();
        let summary = started.summary.unwrap();
        assert_eq!(summary.diagnosis, "Pneumonia");
        assert_eq!(summary.severity, "Moderate");
        assert_eq!(summary.patient_age, Some(61));
    }

    #[test]
    fn send_persists_both_turns_and_grounds_the_model() {
        let conn = open_memory_database().unwrap();
        seed_report(&conn, "RPT-1", Some("pat@example.com"));
        let model = FakeModel::answering("Your report shows pneumonia findings.");
        let manager = AssistantManager::new(&conn, &model);

        let key = manager
            .start("pat@example.com", Some("RPT-1"))
            .unwrap()
            .key;
        let reply = manager.send(&key, "What does my result mean?").unwrap();
        assert_eq!(reply.role, TurnRole::Assistant);

        let history = manager.history(&key, None).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, TurnRole::User);
        assert_eq!(history[1].content, "Your report shows pneumonia findings.");

        let request = model.last_request();
        assert_eq!(request[0].role, crate::assistant::ChatRole::System);
        assert!(request[0].content.contains("Pneumonia"));
        assert!(request[0].content.contains("Pat Doe"));
        // The just-persisted user message is the final element.
        assert_eq!(
            request.last().unwrap().content,
            "What does my result mean?"
        );
    }

    #[test]
    fn send_rejects_empty_text() {
        let conn = open_memory_database().unwrap();
        let model = FakeModel::answering("ok");
        let manager = AssistantManager::new(&conn, &model);
        let key = ConversationKey::General {
            requester: "pat@example.com".into(),
        };

        assert!(matches!(
            manager.send(&key, "   "),
            Err(AssistantError::EmptyMessage)
        ));
        assert!(manager.history(&key, None).unwrap().is_empty());
    }

    #[test]
    fn model_failure_falls_back_and_persists() {
        let conn = open_memory_database().unwrap();
        let model = FakeModel::failing();
        let manager = AssistantManager::new(&conn, &model);
        let key = ConversationKey::General {
            requester: "pat@example.com".into(),
        };

        let reply = manager.send(&key, "Hello?").unwrap();
        assert!(!reply.content.is_empty());
        assert!(reply.content.contains("treating doctor"));

        let history = manager.history(&key, None).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "Hello?");
        assert_eq!(history[1].content, reply.content);
    }

    #[test]
    fn context_window_is_bounded() {
        let conn = open_memory_database().unwrap();
        let model = FakeModel::answering("ok");
        let manager = AssistantManager::new(&conn, &model);
        let key = ConversationKey::General {
            requester: "pat@example.com".into(),
        };

        for i in 0..12 {
            manager.send(&key, &format!("question {i}")).unwrap();
        }

        let request = model.last_request();
        // Instruction turn + at most 10 history turns.
        assert!(request.len() <= 11);
        assert_eq!(request.last().unwrap().content, "question 11");
    }

    #[test]
    fn conversations_accumulate_and_never_terminate() {
        let conn = open_memory_database().unwrap();
        let model = FakeModel::answering("ok");
        let manager = AssistantManager::new(&conn, &model);
        let key = ConversationKey::General {
            requester: "pat@example.com".into(),
        };

        manager.send(&key, "first").unwrap();
        manager.send(&key, "second").unwrap();

        let history = manager.history(&key, None).unwrap();
        assert_eq!(history.len(), 4);
        let contents: Vec<_> = history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents[0], "first");
        assert_eq!(contents[2], "second");
    }
}
