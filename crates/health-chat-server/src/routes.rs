//! HTTP routes.
//!
//! `/` is the patient-facing chat page. `/admin/*` is JSON tooling for staff:
//! patient records, the message log and appointment request review.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{delete, get, post},
    Json, Router,
};
use health_chat_core::{AppointmentChangeRequest, Message, NewPatient, Patient};
use health_chat_llm::{ContentModerator, LanguageModel};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::chat::{ChatError, ChatService};
use crate::graph::KnowledgeGraph;
use crate::page::render_chat_page;

pub const NO_PATIENT_TEXT: &str = "No patient data available.";

/// Shared state for all handlers.
pub struct AppState<M, G> {
    pub chat: Arc<ChatService<M, G>>,
}

impl<M, G> Clone for AppState<M, G> {
    fn clone(&self) -> Self {
        Self {
            chat: Arc::clone(&self.chat),
        }
    }
}

impl<M, G> AppState<M, G> {
    pub fn new(chat: ChatService<M, G>) -> Self {
        Self {
            chat: Arc::new(chat),
        }
    }
}

type ApiError = (StatusCode, &'static str);

fn internal_error(context: &str, e: ChatError) -> ApiError {
    error!("{}: {}", context, e);
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
}

pub fn router<M, G>(state: AppState<M, G>) -> Router
where
    M: LanguageModel + ContentModerator + 'static,
    G: KnowledgeGraph + 'static,
{
    Router::new()
        .route("/", get(chat_page::<M, G>).post(post_message::<M, G>))
        .route("/health", get(health::<M, G>))
        .route(
            "/admin/patients",
            get(list_patients::<M, G>).post(create_patient::<M, G>),
        )
        .route("/admin/patients/:id", delete(delete_patient::<M, G>))
        .route("/admin/messages", get(list_messages::<M, G>))
        .route(
            "/admin/appointment-requests",
            get(list_appointment_requests::<M, G>),
        )
        .route(
            "/admin/appointment-requests/:id/review",
            post(review_appointment_request::<M, G>),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =========================================================================
// Chat page
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct MessageForm {
    #[serde(default)]
    pub message: String,
}

async fn chat_page<M, G>(State(state): State<AppState<M, G>>) -> Result<Response, ApiError>
where
    M: LanguageModel + ContentModerator,
    G: KnowledgeGraph,
{
    let Some(patient) = state
        .chat
        .current_patient()
        .map_err(|e| internal_error("Load patient", e))?
    else {
        return Ok(NO_PATIENT_TEXT.into_response());
    };

    let page = state
        .chat
        .page(patient)
        .await
        .map_err(|e| internal_error("Load chat page", e))?;
    Ok(Html(render_chat_page(&page)).into_response())
}

async fn post_message<M, G>(
    State(state): State<AppState<M, G>>,
    Form(form): Form<MessageForm>,
) -> Result<Response, ApiError>
where
    M: LanguageModel + ContentModerator,
    G: KnowledgeGraph,
{
    let Some(patient) = state
        .chat
        .current_patient()
        .map_err(|e| internal_error("Load patient", e))?
    else {
        return Ok(NO_PATIENT_TEXT.into_response());
    };

    if form.message.trim().is_empty() {
        return Ok(Redirect::to("/").into_response());
    }

    info!(patient_id = patient.id, "Patient message received");
    state
        .chat
        .submit(&patient, &form.message)
        .await
        .map_err(|e| internal_error("Submit message", e))?;

    Ok(Redirect::to("/").into_response())
}

// =========================================================================
// Health
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
    /// `ok`, `disabled`, or the connection error
    pub graph: String,
}

async fn health<M, G>(State(state): State<AppState<M, G>>) -> Json<HealthRes>
where
    M: LanguageModel + ContentModerator,
    G: KnowledgeGraph,
{
    let graph = match state.chat.graph().ping().await {
        Ok(status) => status.to_string(),
        Err(e) => e.to_string(),
    };

    Json(HealthRes {
        ok: true,
        message: "Health chat is alive".into(),
        graph,
    })
}

// =========================================================================
// Admin
// =========================================================================

async fn list_patients<M, G>(
    State(state): State<AppState<M, G>>,
) -> Result<Json<Vec<Patient>>, ApiError>
where
    M: LanguageModel + ContentModerator,
    G: KnowledgeGraph,
{
    state
        .chat
        .with_db(|db| db.list_patients())
        .map(Json)
        .map_err(|e| internal_error("List patients", e))
}

async fn create_patient<M, G>(
    State(state): State<AppState<M, G>>,
    Json(req): Json<NewPatient>,
) -> Result<(StatusCode, Json<Patient>), ApiError>
where
    M: LanguageModel + ContentModerator,
    G: KnowledgeGraph,
{
    let patient = state
        .chat
        .with_db(|db| db.insert_patient(&req))
        .map_err(|e| internal_error("Create patient", e))?;
    info!(patient_id = patient.id, "Patient created");
    Ok((StatusCode::CREATED, Json(patient)))
}

async fn delete_patient<M, G>(
    State(state): State<AppState<M, G>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
    M: LanguageModel + ContentModerator,
    G: KnowledgeGraph,
{
    let deleted = state
        .chat
        .with_db(|db| db.delete_patient(id))
        .map_err(|e| internal_error("Delete patient", e))?;

    if deleted {
        info!(patient_id = id, "Patient deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Patient not found"))
    }
}

async fn list_messages<M, G>(
    State(state): State<AppState<M, G>>,
) -> Result<Json<Vec<Message>>, ApiError>
where
    M: LanguageModel + ContentModerator,
    G: KnowledgeGraph,
{
    let messages = state
        .chat
        .with_db(|db| match db.first_patient()? {
            Some(patient) => Ok(Some(db.list_messages(patient.id)?)),
            None => Ok(None),
        })
        .map_err(|e| internal_error("List messages", e))?;

    messages
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, NO_PATIENT_TEXT))
}

/// Admin view of a request with its one-line description.
#[derive(Debug, Serialize, Deserialize)]
pub struct AppointmentRequestRes {
    #[serde(flatten)]
    pub request: AppointmentChangeRequest,
    pub description: String,
}

async fn list_appointment_requests<M, G>(
    State(state): State<AppState<M, G>>,
) -> Result<Json<Vec<AppointmentRequestRes>>, ApiError>
where
    M: LanguageModel + ContentModerator,
    G: KnowledgeGraph,
{
    let (requests, patients) = state
        .chat
        .with_db(|db| Ok((db.list_appointment_requests()?, db.list_patients()?)))
        .map_err(|e| internal_error("List appointment requests", e))?;

    let first_names: HashMap<i64, String> = patients
        .into_iter()
        .map(|p| (p.id, p.first_name))
        .collect();

    let items = requests
        .into_iter()
        .map(|request| {
            let first_name = first_names
                .get(&request.patient_id)
                .map(String::as_str)
                .unwrap_or_default();
            AppointmentRequestRes {
                description: request.describe(first_name),
                request,
            }
        })
        .collect();

    Ok(Json(items))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewRes {
    pub id: i64,
    pub reviewed: bool,
}

async fn review_appointment_request<M, G>(
    State(state): State<AppState<M, G>>,
    Path(id): Path<i64>,
) -> Result<Json<ReviewRes>, ApiError>
where
    M: LanguageModel + ContentModerator,
    G: KnowledgeGraph,
{
    let updated = state
        .chat
        .with_db(|db| db.mark_appointment_reviewed(id))
        .map_err(|e| internal_error("Review appointment request", e))?;

    if updated {
        info!(request_id = id, "Appointment request reviewed");
        Ok(Json(ReviewRes { id, reviewed: true }))
    } else {
        Err((StatusCode::NOT_FOUND, "Appointment request not found"))
    }
}
