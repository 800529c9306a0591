//! Web server for the questionnaire.
//!
//! Provides a JSON API driving one wizard per session and static file
//! serving for the frontend.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::services::ServeDir;
use uuid::Uuid;

use crate::domain::{ChoiceField, DietInfo, Exercise, Goal, Personal, Step, choice_fields};
use crate::error::{GoalError, ValidationError};
use crate::plan::FitnessPlan;
use crate::predictor::Predictor;
use crate::wizard::{DietForm, ExerciseForm, GoalForm, PersonalForm, StepProgress, Wizard};

/// One user's questionnaire.
pub struct Session {
    pub wizard: Wizard,
    pub created_at: DateTime<Utc>,
    /// Time of the last request that touched this session.
    pub last_seen: DateTime<Utc>,
    /// Plan from the last successful goal submission.
    pub plan: Option<FitnessPlan>,
}

impl Session {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            wizard: Wizard::new(),
            created_at: now,
            last_seen: now,
            plan: None,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_seen > ttl
    }
}

/// Shared application state.
pub struct AppState {
    /// Fitted model and encoders, read-only for the process lifetime.
    pub predictor: Arc<Predictor>,
    /// Sessions by id. Each session is only touched by its own requests.
    pub sessions: RwLock<HashMap<Uuid, Session>>,
    /// Idle time after which a session is discarded.
    pub session_ttl: Duration,
}

impl AppState {
    pub fn new(predictor: Arc<Predictor>, session_ttl: Duration) -> Self {
        Self {
            predictor,
            sessions: RwLock::new(HashMap::new()),
            session_ttl,
        }
    }
}

// === JSON Response Types ===

#[derive(Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub cursor: u8,
    pub step: Step,
    pub progress: Vec<StepProgress>,
    pub created_at: String,
    pub personal: Option<Personal>,
    pub exercise: Option<Exercise>,
    pub diet: Option<DietInfo>,
    pub goal: Option<Goal>,
    pub plan: Option<FitnessPlan>,
    pub error: Option<String>,
}

impl SessionView {
    fn new(id: Uuid, session: &Session) -> Self {
        let wizard = &session.wizard;
        Self {
            id,
            cursor: wizard.cursor(),
            step: wizard.step(),
            progress: wizard.progress(),
            created_at: session.created_at.to_rfc3339(),
            personal: wizard.personal().cloned(),
            exercise: wizard.exercise().cloned(),
            diet: wizard.diet().cloned(),
            goal: wizard.goal().cloned(),
            plan: session.plan.clone(),
            error: None,
        }
    }

    /// Same view with an inline error and no result panel.
    fn with_error(mut self, message: String) -> Self {
        self.plan = None;
        self.error = Some(message);
        self
    }
}

type ApiResult = Result<(StatusCode, Json<SessionView>), StatusCode>;

// === Router Setup ===

/// Creates the application router.
pub fn create_router(state: Arc<AppState>, static_dir: PathBuf) -> Router {
    Router::new()
        .route("/api/choices", get(get_choices))
        .route("/api/sessions", post(create_session))
        .route(
            "/api/sessions/{id}",
            get(get_session).delete(delete_session),
        )
        .route("/api/sessions/{id}/personal", post(submit_personal))
        .route("/api/sessions/{id}/exercise", post(submit_exercise))
        .route("/api/sessions/{id}/diet", post(submit_diet))
        .route("/api/sessions/{id}/goal", post(submit_goal))
        .fallback_service(ServeDir::new(static_dir).append_index_html_on_directories(true))
        .with_state(state)
}

/// Runs the web server.
pub async fn run_server(
    state: Arc<AppState>,
    port: u16,
    static_dir: PathBuf,
) -> anyhow::Result<()> {
    let app = create_router(state, static_dir);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("Server running at http://localhost:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// === API Handlers ===

/// GET /api/choices - Options of every select field.
async fn get_choices() -> Json<Vec<ChoiceField>> {
    Json(choice_fields())
}

/// POST /api/sessions - Start a new questionnaire.
async fn create_session(State(state): State<Arc<AppState>>) -> (StatusCode, Json<SessionView>) {
    let now = Utc::now();
    let id = Uuid::new_v4();
    let session = Session::new(now);
    let view = SessionView::new(id, &session);

    let mut sessions = state.sessions.write().await;
    let before = sessions.len();
    sessions.retain(|_, s| !s.is_expired(now, state.session_ttl));
    if sessions.len() < before {
        log::info!("Evicted {} idle sessions", before - sessions.len());
    }
    sessions.insert(id, session);
    log::info!("Session {} started", id);

    (StatusCode::CREATED, Json(view))
}

/// GET /api/sessions/:id - Current step, stored answers and last plan.
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, StatusCode> {
    let mut sessions = state.sessions.write().await;
    let session = live_session(&mut sessions, id, state.session_ttl)?;
    Ok(Json(SessionView::new(id, session)))
}

/// DELETE /api/sessions/:id - Discard a questionnaire.
async fn delete_session(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> StatusCode {
    match state.sessions.write().await.remove(&id) {
        Some(_) => {
            log::info!("Session {} closed", id);
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

/// POST /api/sessions/:id/personal
async fn submit_personal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Result<Json<PersonalForm>, JsonRejection>,
) -> ApiResult {
    let form = read_form(payload, id, Step::Personal);
    submit_step(&state, id, |wizard| wizard.submit_personal(&form?)).await
}

/// POST /api/sessions/:id/exercise
async fn submit_exercise(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ExerciseForm>, JsonRejection>,
) -> ApiResult {
    let form = read_form(payload, id, Step::Exercise);
    submit_step(&state, id, |wizard| wizard.submit_exercise(&form?)).await
}

/// POST /api/sessions/:id/diet
async fn submit_diet(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Result<Json<DietForm>, JsonRejection>,
) -> ApiResult {
    let form = read_form(payload, id, Step::Diet);
    submit_step(&state, id, |wizard| wizard.submit_diet(&form?)).await
}

/// POST /api/sessions/:id/goal - Validate the goal and compute the plan.
///
/// Inference runs on a copy of the wizard without holding the session lock.
async fn submit_goal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Result<Json<GoalForm>, JsonRejection>,
) -> ApiResult {
    let mut wizard = {
        let mut sessions = state.sessions.write().await;
        live_session(&mut sessions, id, state.session_ttl)?
            .wizard
            .clone()
    };

    let outcome = read_form(payload, id, Step::Goal)
        .map_err(GoalError::from)
        .and_then(|form| wizard.submit_goal(&form, &state.predictor));

    let mut sessions = state.sessions.write().await;
    // Deleted while the plan was computed
    let session = sessions.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;

    match outcome {
        Ok(plan) => {
            log::info!(
                "Session {}: plan {} kcal, {} g protein, {} min",
                id,
                plan.calories,
                plan.protein,
                plan.exercise_minutes
            );
            session.wizard = wizard;
            session.plan = Some(plan);
            Ok((StatusCode::OK, Json(SessionView::new(id, session))))
        }
        Err(GoalError::Validation(e)) => {
            log::warn!("Session {}: {}", id, e);
            Ok(rejected(id, session, e.to_string()))
        }
        Err(e @ GoalError::Prediction(_)) => {
            log::error!("Session {}: prediction failed: {}", id, e);
            Ok(rejected(id, session, e.to_string()))
        }
    }
}

// === Helper Functions ===

/// Applies one of the first three steps to a session.
async fn submit_step<F>(state: &AppState, id: Uuid, apply: F) -> ApiResult
where
    F: FnOnce(&mut Wizard) -> Result<(), ValidationError>,
{
    let mut sessions = state.sessions.write().await;
    let session = live_session(&mut sessions, id, state.session_ttl)?;

    match apply(&mut session.wizard) {
        Ok(()) => {
            log::info!("Session {} advanced to step {}", id, session.wizard.cursor());
            Ok((StatusCode::OK, Json(SessionView::new(id, session))))
        }
        Err(e) => {
            log::warn!("Session {}: {}", id, e);
            Ok(rejected(id, session, e.to_string()))
        }
    }
}

/// Looks up a session, dropping it if it has been idle too long.
fn live_session(
    sessions: &mut HashMap<Uuid, Session>,
    id: Uuid,
    ttl: Duration,
) -> Result<&mut Session, StatusCode> {
    let now = Utc::now();
    if sessions.get(&id).is_some_and(|s| s.is_expired(now, ttl)) {
        sessions.remove(&id);
        log::info!("Session {} expired", id);
    }

    let session = sessions.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    session.last_seen = now;
    Ok(session)
}

/// A body that is not the step's form counts as an incomplete step.
fn read_form<T>(
    payload: Result<Json<T>, JsonRejection>,
    id: Uuid,
    step: Step,
) -> Result<T, ValidationError> {
    payload.map(|Json(form)| form).map_err(|rejection| {
        log::warn!(
            "Session {}: unreadable {} form: {}",
            id,
            step,
            rejection.body_text()
        );
        ValidationError::Incomplete { step }
    })
}

fn rejected(id: Uuid, session: &Session, message: String) -> (StatusCode, Json<SessionView>) {
    let view = SessionView::new(id, session).with_error(message);
    (StatusCode::UNPROCESSABLE_ENTITY, Json(view))
}
