//! Transport-agnostic application state.
//!
//! `CoreState` is the single wiring point between the UI/transport layer
//! and the consultation core: it owns the storage context, the broadcast
//! bus, the classifier registry, and the chat model, hands them to each
//! component at construction time, and exposes the outward operations as
//! `Result`-returning APIs. Nothing panics across this boundary.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::assistant::{
    AssistantError, AssistantManager, ChatModel, ConversationStart, OllamaChatClient,
};
use crate::config::{Config, ConfigError};
use crate::db;
use crate::db::repository;
use crate::diagnosis::{AggregationEngine, ClassifierRegistry, DiagnosisError, ImageInput};
use crate::models::{
    AiTurn, ConversationKey, Participant, ParticipantRole, Report, RoomMessage,
};
use crate::rooms::{
    resolve_room_id, BroadcastBus, MessageStore, RoomError, RoomEvent, RoomSubscription,
};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] db::DatabaseError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Diagnosis(#[from] DiagnosisError),

    #[error(transparent)]
    Assistant(#[from] AssistantError),

    #[error("Unknown disease type: {0}")]
    UnknownDiseaseType(String),
}

/// Shared state for one running consultation core.
///
/// Wrapped in `Arc` at startup so every transport shares the same bus and
/// report-id counter. Each operation opens its own database connection;
/// all tables are append-only, so atomic inserts are the only write
/// coordination needed.
pub struct CoreState {
    database_path: PathBuf,
    bus: Arc<BroadcastBus>,
    engine: AggregationEngine,
    chat_model: Box<dyn ChatModel>,
}

impl CoreState {
    /// Build the core from deployment configuration.
    ///
    /// The chat client comes from the configured Ollama endpoint, model
    /// name, and timeout, so `Config::from_env` gates startup: no model
    /// name, no core.
    pub fn from_config(
        config: &Config,
        registry: ClassifierRegistry,
    ) -> Result<Self, CoreError> {
        let chat_model = Box::new(OllamaChatClient::new(
            &config.ollama_base_url,
            &config.chat_model,
            config.llm_timeout_secs,
        ));
        Self::new(config, registry, chat_model)
    }

    /// Build the core with an injected chat model, run migrations, and
    /// wire the collaborators.
    pub fn new(
        config: &Config,
        registry: ClassifierRegistry,
        chat_model: Box<dyn ChatModel>,
    ) -> Result<Self, CoreError> {
        // Open once up front so schema problems surface at startup.
        db::open_database(&config.database_path)?;

        tracing::info!(db = %config.database_path.display(), "consultation core ready");
        Ok(Self {
            database_path: config.database_path.clone(),
            bus: BroadcastBus::new(),
            engine: AggregationEngine::new(registry),
            chat_model,
        })
    }

    fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        Ok(db::open_database(&self.database_path)?)
    }

    /// The live fan-out bus, for transports that hold subscriptions.
    pub fn bus(&self) -> &Arc<BroadcastBus> {
        &self.bus
    }

    // ── Participants ────────────────────────────────────────

    pub fn register_participant(&self, participant: &Participant) -> Result<(), CoreError> {
        let conn = self.open_db()?;
        repository::insert_participant(&conn, participant)?;
        Ok(())
    }

    // ── Rooms ───────────────────────────────────────────────

    /// Deterministic room id for a doctor-patient pair.
    pub fn resolve_room_id(&self, doctor_identity: &str, patient_key: &str) -> String {
        resolve_room_id(doctor_identity, patient_key)
    }

    /// Subscribe a connection to a room.
    pub fn join_room(&self, room_id: &str) -> RoomSubscription {
        self.bus.join(room_id)
    }

    /// Durably store a message, then fan it out to every current
    /// subscriber of its room. The write is confirmed before any
    /// broadcast, so an acknowledged message is never lost.
    pub fn append_room_message(
        &self,
        room_id: &str,
        sender_email: &str,
        sender_role: ParticipantRole,
        text: &str,
    ) -> Result<RoomMessage, CoreError> {
        let conn = self.open_db()?;
        let message = MessageStore::new(&conn).append(room_id, sender_email, sender_role, text)?;
        self.bus
            .publish(&message.room_id, RoomEvent::Message(message.clone()));
        Ok(message)
    }

    /// Most recent messages of a room (default cap 200), ascending order.
    pub fn room_history(
        &self,
        room_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<RoomMessage>, CoreError> {
        let conn = self.open_db()?;
        Ok(MessageStore::new(&conn).history(room_id, limit)?)
    }

    /// Publish an ephemeral typing indicator; never persisted.
    pub fn notify_typing(&self, room_id: &str, email: &str) {
        self.bus.publish_ephemeral(
            room_id,
            RoomEvent::Typing {
                email: email.to_string(),
            },
        );
    }

    /// Publish an ephemeral presence change; never persisted.
    pub fn notify_presence(&self, room_id: &str, email: &str, joined: bool) {
        self.bus.publish_ephemeral(
            room_id,
            RoomEvent::Presence {
                email: email.to_string(),
                joined,
            },
        );
    }

    // ── Diagnosis ───────────────────────────────────────────

    /// Aggregate classifier outputs over a submission and persist the
    /// resulting report. `patient_email` attaches the report to a
    /// registered patient when one is known.
    pub fn aggregate_prediction(
        &self,
        images: &[ImageInput],
        disease_type: &str,
        doctor_email: &str,
        patient_email: Option<&str>,
    ) -> Result<Report, CoreError> {
        let disease = disease_type
            .trim()
            .to_lowercase()
            .parse()
            .map_err(|_| CoreError::UnknownDiseaseType(disease_type.to_string()))?;

        let result = self.engine.predict(images, disease)?;

        let conn = self.open_db()?;
        let patient = match patient_email {
            Some(email) => repository::get_participant(&conn, email)?,
            None => None,
        };
        Ok(self
            .engine
            .persist_report(&conn, &result, doctor_email, patient.as_ref())?)
    }

    /// All reports for one patient, newest first.
    pub fn patient_reports(&self, patient_email: &str) -> Result<Vec<Report>, CoreError> {
        let conn = self.open_db()?;
        Ok(repository::reports_for_patient(&conn, patient_email)?)
    }

    // ── AI assistant ────────────────────────────────────────

    /// Start an AI conversation, optionally grounded in a report.
    pub fn start_conversation(
        &self,
        requester: &str,
        report_id: Option<&str>,
    ) -> Result<ConversationStart, CoreError> {
        let conn = self.open_db()?;
        Ok(AssistantManager::new(&conn, self.chat_model.as_ref()).start(requester, report_id)?)
    }

    /// Send one user turn; returns the persisted assistant turn (the
    /// model response, or the static fallback on model failure).
    pub fn send_turn(&self, key: &ConversationKey, text: &str) -> Result<AiTurn, CoreError> {
        let conn = self.open_db()?;
        Ok(AssistantManager::new(&conn, self.chat_model.as_ref()).send(key, text)?)
    }

    /// Most recent turns of a conversation (default cap 200), ascending.
    pub fn conversation_history(
        &self,
        key: &ConversationKey,
        limit: Option<usize>,
    ) -> Result<Vec<AiTurn>, CoreError> {
        let conn = self.open_db()?;
        Ok(AssistantManager::new(&conn, self.chat_model.as_ref()).history(key, limit)?)
    }
}
