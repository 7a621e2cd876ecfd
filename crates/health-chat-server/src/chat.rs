//! Chat turn handling.
//!
//! [`ChatService`] decides the bot reply for a patient message, records the
//! exchange and assembles what the chat page shows. Store access goes through
//! [`ChatService::with_db`], which holds the lock for one closure and never
//! across an `.await`.

use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDateTime};
use health_chat_core::{
    conversation_history, detect_intent, format_appointment, AppointmentChangeRequest, Database,
    DbError, DbResult, Intent, Message, Patient, Sender, TimeParser, DEFAULT_HISTORY_TOKENS,
    HISTORY_MESSAGE_LIMIT,
};
use health_chat_llm::{
    appointment_confirmation, build_reply_prompt, build_summary_prompt,
    medication_acknowledgement, medication_mentions, to_entity_map, ConfiguredExtractor,
    ContentModerator, Entity, EntityExtractor, LanguageModel, ASK_FOR_TIME_REPLY,
    LLM_FAILURE_REPLY, OFF_TOPIC_REPLY,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::graph::KnowledgeGraph;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for ChatError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ChatError::LockPoisoned(e.to_string())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

/// Tunables for the reply flow.
#[derive(Debug, Clone, Copy)]
pub struct ChatSettings {
    pub time_parser: TimeParser,
    pub history_tokens: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            time_parser: TimeParser::new(false),
            history_tokens: DEFAULT_HISTORY_TOKENS,
        }
    }
}

/// Everything the chat page renders for one patient.
#[derive(Debug, Clone)]
pub struct ChatPage {
    pub patient: Patient,
    pub messages: Vec<Message>,
    pub summary: String,
    pub appointment_requests: Vec<AppointmentChangeRequest>,
}

pub struct ChatService<M, G> {
    db: Arc<Mutex<Database>>,
    model: Arc<M>,
    extractor: ConfiguredExtractor<M>,
    graph: G,
    settings: ChatSettings,
}

impl<M, G> ChatService<M, G>
where
    M: LanguageModel + ContentModerator,
    G: KnowledgeGraph,
{
    pub fn new(
        db: Arc<Mutex<Database>>,
        model: Arc<M>,
        extractor: ConfiguredExtractor<M>,
        graph: G,
        settings: ChatSettings,
    ) -> Self {
        Self {
            db,
            model,
            extractor,
            graph,
            settings,
        }
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Run one synchronous store operation under the lock.
    pub fn with_db<T, F>(&self, f: F) -> ChatResult<T>
    where
        F: FnOnce(&Database) -> DbResult<T>,
    {
        let db = self.db.lock()?;
        Ok(f(&db)?)
    }

    /// The patient the chat is talking to.
    pub fn current_patient(&self) -> ChatResult<Option<Patient>> {
        self.with_db(|db| db.first_patient())
    }

    // =========================================================================
    // Replies
    // =========================================================================

    pub async fn respond(&self, patient: &Patient, user_input: &str) -> ChatResult<String> {
        self.respond_at(patient, user_input, Local::now().naive_local())
            .await
    }

    /// Decide the reply to `user_input`, with `now` anchoring relative times.
    ///
    /// Only store failures are errors. Model, moderation, extraction and
    /// graph failures turn into fixed replies or are skipped.
    pub async fn respond_at(
        &self,
        patient: &Patient,
        user_input: &str,
        now: NaiveDateTime,
    ) -> ChatResult<String> {
        match self.model.is_flagged(user_input).await {
            Ok(false) => {}
            Ok(true) => {
                info!(patient_id = patient.id, "Message flagged by moderation");
                return Ok(OFF_TOPIC_REPLY.to_string());
            }
            Err(e) => {
                error!(patient_id = patient.id, "Moderation failed: {}", e);
                return Ok(OFF_TOPIC_REPLY.to_string());
            }
        }

        let intent = detect_intent(user_input);
        debug!(patient_id = patient.id, ?intent, "Detected intent");

        match intent {
            Intent::AppointmentChange => self.appointment_reply(patient, user_input, now),
            Intent::MedicationChange => Ok(self.medication_reply(patient, user_input).await),
            Intent::General => self.general_reply(patient, user_input).await,
        }
    }

    fn appointment_reply(
        &self,
        patient: &Patient,
        user_input: &str,
        now: NaiveDateTime,
    ) -> ChatResult<String> {
        let Some(requested) = self.settings.time_parser.parse(user_input, now) else {
            return Ok(ASK_FOR_TIME_REPLY.to_string());
        };

        let request = self.with_db(|db| db.insert_appointment_request(patient.id, requested))?;
        info!(
            patient_id = patient.id,
            request_id = request.id,
            requested = %request.requested_time,
            "Stored appointment change request"
        );

        Ok(appointment_confirmation(
            &patient.doctor_name,
            &format_appointment(&requested),
        ))
    }

    async fn medication_reply(&self, patient: &Patient, user_input: &str) -> String {
        let entities = self.entities(user_input).await;
        info!(
            patient_id = patient.id,
            medications = ?medication_mentions(&entities),
            "Medication change requested"
        );
        medication_acknowledgement(&patient.doctor_name)
    }

    async fn general_reply(&self, patient: &Patient, user_input: &str) -> ChatResult<String> {
        let entities = to_entity_map(&self.entities(user_input).await);
        // Always merges the patient node, even with no entities.
        if let Err(e) = self.graph.save_entities(&patient.full_name(), &entities).await {
            warn!(patient_id = patient.id, "Knowledge graph write failed: {}", e);
        }

        let recent = self.with_db(|db| db.recent_messages(patient.id, HISTORY_MESSAGE_LIMIT))?;
        let history = conversation_history(&recent, self.settings.history_tokens);
        let prompt = build_reply_prompt(patient, &history, user_input);

        match self.model.complete(&prompt).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                error!(patient_id = patient.id, "LLM completion failed: {}", e);
                Ok(LLM_FAILURE_REPLY.to_string())
            }
        }
    }

    async fn entities(&self, user_input: &str) -> Vec<Entity> {
        match self.extractor.extract(user_input).await {
            Ok(entities) => entities,
            Err(e) => {
                warn!("Entity extraction failed: {}", e);
                Vec::new()
            }
        }
    }

    // =========================================================================
    // Exchanges
    // =========================================================================

    /// Reply to `user_input` and record the patient and bot messages.
    pub async fn submit(&self, patient: &Patient, user_input: &str) -> ChatResult<String> {
        self.submit_at(patient, user_input, Local::now().naive_local())
            .await
    }

    pub async fn submit_at(
        &self,
        patient: &Patient,
        user_input: &str,
        now: NaiveDateTime,
    ) -> ChatResult<String> {
        let reply = self.respond_at(patient, user_input, now).await?;
        self.with_db(|db| {
            db.insert_message(patient.id, Sender::Patient, user_input)?;
            db.insert_message(patient.id, Sender::Bot, &reply)?;
            Ok(())
        })?;
        Ok(reply)
    }

    /// LLM summary of the messages; empty when there is nothing to summarize
    /// or the model fails.
    pub async fn summarize(&self, messages: &[Message]) -> String {
        if messages.is_empty() {
            return String::new();
        }

        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        match self.model.complete(&build_summary_prompt(&texts)).await {
            Ok(summary) => summary,
            Err(e) => {
                error!("Conversation summary failed: {}", e);
                String::new()
            }
        }
    }

    pub async fn page(&self, patient: Patient) -> ChatResult<ChatPage> {
        let (messages, appointment_requests) = self.with_db(|db| {
            Ok((
                db.list_messages(patient.id)?,
                db.list_unreviewed_appointment_requests(patient.id)?,
            ))
        })?;
        let summary = self.summarize(&messages).await;

        Ok(ChatPage {
            patient,
            messages,
            summary,
            appointment_requests,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use chrono::NaiveDate;
    use health_chat_llm::{KeywordEntityExtractor, LlmError};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn service(
        model: ScriptedModel,
        graph: RecordingGraph,
    ) -> (ChatService<ScriptedModel, RecordingGraph>, Patient) {
        let db = Database::open_in_memory().unwrap();
        let patient = db.insert_patient(&sample_new_patient()).unwrap();
        let service = ChatService::new(
            Arc::new(Mutex::new(db)),
            Arc::new(model),
            ConfiguredExtractor::Keyword(KeywordEntityExtractor),
            graph,
            ChatSettings::default(),
        );
        (service, patient)
    }

    fn messages(service: &ChatService<ScriptedModel, RecordingGraph>, patient: &Patient) -> Vec<Message> {
        service.with_db(|db| db.list_messages(patient.id)).unwrap()
    }

    #[tokio::test]
    async fn test_flagged_message_gets_off_topic_reply() {
        let model = ScriptedModel::replying(&[]).flagging(Ok(true));
        let (service, patient) = service(model, RecordingGraph::default());

        let reply = service.respond_at(&patient, "something awful", now()).await.unwrap();
        assert_eq!(reply, OFF_TOPIC_REPLY);
    }

    #[tokio::test]
    async fn test_moderation_error_blocks() {
        let model = ScriptedModel::replying(&["should not be used"])
            .flagging(Err(LlmError::InvalidResponse("timeout".into())));
        let (service, patient) = service(model, RecordingGraph::default());

        let reply = service.respond_at(&patient, "hello", now()).await.unwrap();
        assert_eq!(reply, OFF_TOPIC_REPLY);
    }

    #[tokio::test]
    async fn test_appointment_request_stored() {
        let (service, patient) = service(ScriptedModel::default(), RecordingGraph::default());

        let reply = service
            .respond_at(&patient, "Can I reschedule to March 5 at 2pm?", now())
            .await
            .unwrap();
        assert_eq!(
            reply,
            "I will convey your request to Dr. Smith to reschedule to March 05, 2025 at 02:00 PM."
        );

        let requests = service
            .with_db(|db| db.list_unreviewed_appointment_requests(patient.id))
            .unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].requested_time,
            NaiveDate::from_ymd_opt(2025, 3, 5)
                .unwrap()
                .and_hms_opt(14, 0, 0)
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_appointment_without_time_asks() {
        let (service, patient) = service(ScriptedModel::default(), RecordingGraph::default());

        let reply = service
            .respond_at(&patient, "I need to reschedule my appointment", now())
            .await
            .unwrap();
        assert_eq!(reply, ASK_FOR_TIME_REPLY);
        assert!(service
            .with_db(|db| db.list_appointment_requests())
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_past_time_rejected_when_future_required() {
        let db = Database::open_in_memory().unwrap();
        let patient = db.insert_patient(&sample_new_patient()).unwrap();
        let service = ChatService::new(
            Arc::new(Mutex::new(db)),
            Arc::new(ScriptedModel::default()),
            ConfiguredExtractor::Keyword(KeywordEntityExtractor),
            RecordingGraph::default(),
            ChatSettings {
                time_parser: TimeParser::new(true),
                ..ChatSettings::default()
            },
        );

        let reply = service
            .respond_at(&patient, "Please reschedule to January 2 at 10am", now())
            .await
            .unwrap();
        assert_eq!(reply, ASK_FOR_TIME_REPLY);
    }

    #[tokio::test]
    async fn test_medication_change_acknowledged() {
        let model = ScriptedModel::replying(&["unused"]);
        let (service, patient) = service(model, RecordingGraph::default());

        let reply = service
            .respond_at(&patient, "I want a new medication instead of lipitor", now())
            .await
            .unwrap();
        assert_eq!(
            reply,
            "I will inform Dr. Smith about your request regarding medication changes."
        );
        assert!(service.model.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_general_reply_uses_history_and_graph() {
        let model = ScriptedModel::replying(&["Rest and drink fluids."]);
        let (service, patient) = service(model, RecordingGraph::default());
        service
            .with_db(|db| {
                db.insert_message(patient.id, Sender::Patient, "I felt tired yesterday")?;
                db.insert_message(patient.id, Sender::Bot, "Sorry to hear that.")?;
                Ok(())
            })
            .unwrap();

        let reply = service
            .respond_at(&patient, "I have a headache, can I take tylenol?", now())
            .await
            .unwrap();
        assert_eq!(reply, "Rest and drink fluids.");

        let prompts = service.model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("I felt tired yesterday\nSorry to hear that.\n"));
        assert!(prompts[0].ends_with("The patient says: \"I have a headache, can I take tylenol?\""));

        let saved = service.graph().saved.lock().unwrap().clone();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "Jane Doe");
        assert_eq!(saved[0].1["DRUG"], "acetaminophen");
        assert_eq!(saved[0].1["SYMPTOM"], "headache");
    }

    #[tokio::test]
    async fn test_graph_failure_does_not_block_reply() {
        let model = ScriptedModel::replying(&["Take it with food."]);
        let graph = RecordingGraph {
            fail: true,
            ..RecordingGraph::default()
        };
        let (service, patient) = service(model, graph);

        let reply = service
            .respond_at(&patient, "Is aspirin safe?", now())
            .await
            .unwrap();
        assert_eq!(reply, "Take it with food.");
    }

    #[tokio::test]
    async fn test_general_reply_without_entities_still_saves_patient() {
        let model = ScriptedModel::replying(&["Hello Jane!"]);
        let (service, patient) = service(model, RecordingGraph::default());

        service.respond_at(&patient, "Hello there", now()).await.unwrap();

        let saved = service.graph().saved.lock().unwrap().clone();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "Jane Doe");
        assert!(saved[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_llm_failure_apologises() {
        let (service, patient) = service(ScriptedModel::default(), RecordingGraph::default());

        let reply = service.respond_at(&patient, "Hello there", now()).await.unwrap();
        assert_eq!(reply, LLM_FAILURE_REPLY);
    }

    #[tokio::test]
    async fn test_submit_stores_both_messages_in_order() {
        let model = ScriptedModel::replying(&["Hi Jane!"]);
        let (service, patient) = service(model, RecordingGraph::default());

        let reply = service.submit_at(&patient, "Hello", now()).await.unwrap();
        assert_eq!(reply, "Hi Jane!");

        let stored = messages(&service, &patient);
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].sender, Sender::Patient);
        assert_eq!(stored[0].text, "Hello");
        assert_eq!(stored[1].sender, Sender::Bot);
        assert_eq!(stored[1].text, "Hi Jane!");
    }

    #[tokio::test]
    async fn test_summarize() {
        let model = ScriptedModel::replying(&["Patient reports headaches."]);
        let (service, patient) = service(model, RecordingGraph::default());

        assert_eq!(service.summarize(&[]).await, "");
        assert!(service.model.prompts().is_empty());

        service
            .with_db(|db| db.insert_message(patient.id, Sender::Patient, "My head hurts").map(|_| ()))
            .unwrap();
        let stored = messages(&service, &patient);
        assert_eq!(service.summarize(&stored).await, "Patient reports headaches.");
        assert!(service.model.prompts()[0].contains("Conversation:\nMy head hurts\n"));

        // queue is empty now, so the model errors
        assert_eq!(service.summarize(&stored).await, "");
    }

    #[tokio::test]
    async fn test_page_collects_unreviewed_requests() {
        let model = ScriptedModel::replying(&["summary"]);
        let (service, patient) = service(model, RecordingGraph::default());
        service
            .submit_at(&patient, "Reschedule to Feb 3 at 9:30am", now())
            .await
            .unwrap();
        let reviewed = service
            .with_db(|db| {
                let request = db.insert_appointment_request(patient.id, now())?;
                db.mark_appointment_reviewed(request.id)
            })
            .unwrap();
        assert!(reviewed);

        let page = service.page(patient.clone()).await.unwrap();
        assert_eq!(page.messages.len(), 2);
        assert_eq!(page.summary, "summary");
        assert_eq!(page.appointment_requests.len(), 1);
        assert!(!page.appointment_requests[0].reviewed);
    }

    #[test]
    fn test_current_patient() {
        let (service, patient) = service(ScriptedModel::default(), RecordingGraph::default());
        assert_eq!(service.current_patient().unwrap(), Some(patient));
    }
}
