use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::bidding::ShiftBid;
use crate::engine::Engine;
use crate::error::RosterError;
use crate::exchange::{ResolveAction, RespondAction, ShiftChangeRequest};
use crate::notify::Notification;
use crate::outcome::Outcome;
use crate::registry::Shift;

/// HTTP surface over the engine. Session management is out of scope; the
/// acting member arrives in the `x-actor-id` header and stands in for the
/// authenticated principal.
pub fn router(engine: Engine) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/schedule", get(schedule_range))
        .route("/api/schedule/solve", post(start_solve))
        .route("/api/schedule/solve/status/:job_id", get(solve_status))
        .route("/api/schedule/:shift_id", get(get_shift))
        .route("/api/schedule/:shift_id/assign", put(assign_shift))
        .route("/api/bidding/open-shifts", get(open_bidding_shifts))
        .route("/api/bidding/my-bids", get(my_bids))
        .route("/api/bidding/shifts/:shift_id/open", post(open_for_bidding))
        .route(
            "/api/bidding/shifts/:shift_id/bids",
            get(list_bids).post(place_bid),
        )
        .route(
            "/api/bidding/shifts/:shift_id/bids/:bid_id/award",
            post(award_bid),
        )
        .route("/api/bidding/bids/:bid_id/retract", put(retract_bid))
        .route("/api/shift-changes", post(create_change_request))
        .route("/api/shift-changes/my-requests", get(my_change_requests))
        .route("/api/shift-changes/pending", get(pending_change_requests))
        .route("/api/shift-changes/:request_id/respond", put(respond_change))
        .route("/api/shift-changes/:request_id/resolve", put(resolve_change))
        .route("/api/shift-changes/:request_id/cancel", put(cancel_change))
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/active", get(active_notifications))
        .route("/api/notifications/unread-count", get(unread_count))
        .route(
            "/api/notifications/:notification_id/mark-as-read",
            put(mark_read),
        )
        .route("/api/notifications/:notification_id/archive", put(archive))
        .layer(cors)
        .with_state(engine)
}

// ---------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------

pub enum ApiError {
    Engine(RosterError),
    BadRequest(String),
}

impl From<RosterError> for ApiError {
    fn from(e: RosterError) -> Self {
        Self::Engine(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "BAD_REQUEST",
                    message,
                },
            ),
            ApiError::Engine(e) => {
                let status = match &e {
                    RosterError::NotFound { .. } => StatusCode::NOT_FOUND,
                    RosterError::Unauthorized { .. } => StatusCode::FORBIDDEN,
                    RosterError::SolverUnavailable(_) => StatusCode::BAD_GATEWAY,
                    RosterError::SolverTimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
                    _ => StatusCode::CONFLICT,
                };
                (
                    status,
                    ErrorBody {
                        error: e.kind(),
                        message: e.to_string(),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

fn actor_id(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    let value = headers
        .get("x-actor-id")
        .ok_or_else(|| ApiError::BadRequest("missing x-actor-id header".into()))?;
    let value = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("invalid x-actor-id header".into()))?;
    value
        .parse()
        .map_err(|_| ApiError::BadRequest("x-actor-id is not a valid member id".into()))
}

// ---------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------

#[derive(Serialize)]
struct ShiftDto {
    id: Uuid,
    date: NaiveDate,
    start_time: String,
    end_time: String,
    location_id: Uuid,
    template_id: Uuid,
    required_qualification: Option<Uuid>,
    status: String,
    assignee: Option<Uuid>,
}

impl From<&Shift> for ShiftDto {
    fn from(s: &Shift) -> Self {
        Self {
            id: s.id,
            date: s.date,
            start_time: s.start_time.format("%H:%M").to_string(),
            end_time: s.end_time.format("%H:%M").to_string(),
            location_id: s.location_id,
            template_id: s.template_id,
            required_qualification: s.required_qualification,
            status: s.status.to_string(),
            assignee: s.assignee,
        }
    }
}

#[derive(Serialize)]
struct AppliedShiftDto {
    applied: bool,
    shift: ShiftDto,
}

impl From<Outcome<Shift>> for AppliedShiftDto {
    fn from(outcome: Outcome<Shift>) -> Self {
        Self {
            applied: outcome.applied,
            shift: ShiftDto::from(&outcome.value),
        }
    }
}

#[derive(Serialize)]
struct BidDto {
    id: Uuid,
    shift_id: Uuid,
    member_id: Uuid,
    member_name: Option<String>,
    status: String,
    note: Option<String>,
}

#[derive(Serialize)]
struct MyBidDto {
    bid_id: Uuid,
    status: String,
    note: Option<String>,
    shift: ShiftDto,
}

#[derive(Serialize)]
struct ChangeRequestDto {
    id: Uuid,
    initiating_shift_id: Uuid,
    initiating_member_id: Uuid,
    target_shift_id: Uuid,
    target_member_id: Uuid,
    status: String,
    reason: Option<String>,
    resolution_notes: Option<String>,
}

impl From<&ShiftChangeRequest> for ChangeRequestDto {
    fn from(r: &ShiftChangeRequest) -> Self {
        Self {
            id: r.id,
            initiating_shift_id: r.initiating_shift_id,
            initiating_member_id: r.initiating_member_id,
            target_shift_id: r.target_shift_id,
            target_member_id: r.target_member_id,
            status: r.status.to_string(),
            reason: r.reason.clone(),
            resolution_notes: r.resolution_notes.clone(),
        }
    }
}

#[derive(Serialize)]
struct AppliedChangeRequestDto {
    applied: bool,
    request: ChangeRequestDto,
}

impl From<Outcome<ShiftChangeRequest>> for AppliedChangeRequestDto {
    fn from(outcome: Outcome<ShiftChangeRequest>) -> Self {
        Self {
            applied: outcome.applied,
            request: ChangeRequestDto::from(&outcome.value),
        }
    }
}

#[derive(Serialize)]
struct NotificationDto {
    id: Uuid,
    kind: String,
    message: String,
    related_entity_id: Option<Uuid>,
    status: String,
    created_at: String,
}

impl From<&Notification> for NotificationDto {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            kind: n.kind.to_string(),
            message: n.message.clone(),
            related_entity_id: n.related_entity_id,
            status: n.status.to_string(),
            created_at: n.created_at.to_rfc3339(),
        }
    }
}

async fn bid_dto(engine: &Engine, bid: &ShiftBid) -> BidDto {
    BidDto {
        id: bid.id,
        shift_id: bid.shift_id,
        member_id: bid.member_id,
        member_name: engine.member_name(bid.member_id).await,
        status: bid.status.to_string(),
        note: bid.note.clone(),
    }
}

// ---------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------

#[derive(Deserialize)]
struct RangeQuery {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

async fn schedule_range(
    State(engine): State<Engine>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<ShiftDto>>, ApiError> {
    let shifts = engine
        .shifts_in_range(range.start_date, range.end_date)
        .await;
    Ok(Json(shifts.iter().map(ShiftDto::from).collect()))
}

async fn get_shift(
    State(engine): State<Engine>,
    Path(shift_id): Path<Uuid>,
) -> Result<Json<ShiftDto>, ApiError> {
    let shift = engine.shift(shift_id).await?;
    Ok(Json(ShiftDto::from(&shift)))
}

#[derive(Deserialize)]
struct AssignBody {
    member_id: Uuid,
}

async fn assign_shift(
    State(engine): State<Engine>,
    Path(shift_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<AssignBody>,
) -> Result<Json<AppliedShiftDto>, ApiError> {
    let actor = actor_id(&headers)?;
    let outcome = engine.assign(shift_id, body.member_id, actor).await?;
    Ok(Json(outcome.into()))
}

#[derive(Deserialize)]
struct SolveQuery {
    year: i32,
    month: u32,
}

#[derive(Serialize)]
struct SolveStartedDto {
    job_id: String,
    status: String,
}

async fn start_solve(
    State(engine): State<Engine>,
    Query(window): Query<SolveQuery>,
    headers: HeaderMap,
) -> Result<Json<SolveStartedDto>, ApiError> {
    let actor = actor_id(&headers)?;
    let job = engine.start_solve(window.year, window.month, actor).await?;
    Ok(Json(SolveStartedDto {
        job_id: job.job_id,
        status: job.status.to_string(),
    }))
}

async fn solve_status(
    State(engine): State<Engine>,
    Path(job_id): Path<String>,
) -> Result<Json<SolveStartedDto>, ApiError> {
    let status = engine.poll_solver_status(&job_id).await?;
    Ok(Json(SolveStartedDto {
        job_id,
        status: status.to_string(),
    }))
}

// ---------------------------------------------------------------------
// Bidding
// ---------------------------------------------------------------------

async fn open_bidding_shifts(State(engine): State<Engine>) -> Json<Vec<ShiftDto>> {
    let shifts = engine.open_bidding_shifts().await;
    Json(shifts.iter().map(ShiftDto::from).collect())
}

async fn open_for_bidding(
    State(engine): State<Engine>,
    Path(shift_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<AppliedShiftDto>, ApiError> {
    let actor = actor_id(&headers)?;
    let outcome = engine.open_for_bidding(shift_id, actor).await?;
    Ok(Json(outcome.into()))
}

#[derive(Deserialize)]
struct PlaceBidBody {
    #[serde(default)]
    note: Option<String>,
}

async fn place_bid(
    State(engine): State<Engine>,
    Path(shift_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<PlaceBidBody>,
) -> Result<Json<BidDto>, ApiError> {
    let actor = actor_id(&headers)?;
    let bid = engine.place_bid(shift_id, actor, body.note).await?;
    Ok(Json(bid_dto(&engine, &bid).await))
}

async fn list_bids(
    State(engine): State<Engine>,
    Path(shift_id): Path<Uuid>,
) -> Result<Json<Vec<BidDto>>, ApiError> {
    let bids = engine.bids_for_shift(shift_id).await?;
    let mut dtos = Vec::with_capacity(bids.len());
    for bid in &bids {
        dtos.push(bid_dto(&engine, bid).await);
    }
    Ok(Json(dtos))
}

async fn my_bids(
    State(engine): State<Engine>,
    headers: HeaderMap,
) -> Result<Json<Vec<MyBidDto>>, ApiError> {
    let actor = actor_id(&headers)?;
    let bids = engine.my_bids(actor).await;
    Ok(Json(
        bids.iter()
            .map(|(bid, shift)| MyBidDto {
                bid_id: bid.id,
                status: bid.status.to_string(),
                note: bid.note.clone(),
                shift: ShiftDto::from(shift),
            })
            .collect(),
    ))
}

async fn retract_bid(
    State(engine): State<Engine>,
    Path(bid_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = actor_id(&headers)?;
    let outcome = engine.retract_bid(bid_id, actor).await?;
    Ok(Json(serde_json::json!({
        "applied": outcome.applied,
        "bid": bid_dto(&engine, &outcome.value).await,
    })))
}

async fn award_bid(
    State(engine): State<Engine>,
    Path((shift_id, bid_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = actor_id(&headers)?;
    let outcome = engine.award(shift_id, bid_id, actor).await?;
    let (shift, bid) = outcome.value;
    Ok(Json(serde_json::json!({
        "applied": outcome.applied,
        "shift": ShiftDto::from(&shift),
        "bid": bid_dto(&engine, &bid).await,
    })))
}

// ---------------------------------------------------------------------
// Shift changes
// ---------------------------------------------------------------------

#[derive(Deserialize)]
struct CreateChangeBody {
    initiating_shift_id: Uuid,
    target_shift_id: Uuid,
    #[serde(default)]
    reason: Option<String>,
}

async fn create_change_request(
    State(engine): State<Engine>,
    headers: HeaderMap,
    Json(body): Json<CreateChangeBody>,
) -> Result<Json<ChangeRequestDto>, ApiError> {
    let actor = actor_id(&headers)?;
    let request = engine
        .create_change_request(
            body.initiating_shift_id,
            body.target_shift_id,
            actor,
            body.reason,
        )
        .await?;
    Ok(Json(ChangeRequestDto::from(&request)))
}

async fn my_change_requests(
    State(engine): State<Engine>,
    headers: HeaderMap,
) -> Result<Json<Vec<ChangeRequestDto>>, ApiError> {
    let actor = actor_id(&headers)?;
    let requests = engine.my_change_requests(actor).await;
    Ok(Json(requests.iter().map(ChangeRequestDto::from).collect()))
}

async fn pending_change_requests(
    State(engine): State<Engine>,
    headers: HeaderMap,
) -> Result<Json<Vec<ChangeRequestDto>>, ApiError> {
    let actor = actor_id(&headers)?;
    let requests = engine.pending_change_requests(actor).await?;
    Ok(Json(requests.iter().map(ChangeRequestDto::from).collect()))
}

#[derive(Deserialize)]
struct RespondBody {
    action: RespondAction,
}

async fn respond_change(
    State(engine): State<Engine>,
    Path(request_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<RespondBody>,
) -> Result<Json<AppliedChangeRequestDto>, ApiError> {
    let actor = actor_id(&headers)?;
    let outcome = engine
        .respond_change_request(request_id, body.action, actor)
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Deserialize)]
struct ResolveBody {
    action: ResolveAction,
    #[serde(default)]
    notes: Option<String>,
}

async fn resolve_change(
    State(engine): State<Engine>,
    Path(request_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<ResolveBody>,
) -> Result<Json<AppliedChangeRequestDto>, ApiError> {
    let actor = actor_id(&headers)?;
    let outcome = engine
        .resolve_change_request(request_id, body.action, actor, body.notes)
        .await?;
    Ok(Json(outcome.into()))
}

async fn cancel_change(
    State(engine): State<Engine>,
    Path(request_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<AppliedChangeRequestDto>, ApiError> {
    let actor = actor_id(&headers)?;
    let outcome = engine.cancel_change_request(request_id, actor).await?;
    Ok(Json(outcome.into()))
}

// ---------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------

async fn list_notifications(
    State(engine): State<Engine>,
    headers: HeaderMap,
) -> Result<Json<Vec<NotificationDto>>, ApiError> {
    let actor = actor_id(&headers)?;
    let notifications = engine.notifications_for(actor).await;
    Ok(Json(
        notifications.iter().map(NotificationDto::from).collect(),
    ))
}

async fn active_notifications(
    State(engine): State<Engine>,
    headers: HeaderMap,
) -> Result<Json<Vec<NotificationDto>>, ApiError> {
    let actor = actor_id(&headers)?;
    let notifications = engine.active_notifications_for(actor).await;
    Ok(Json(
        notifications.iter().map(NotificationDto::from).collect(),
    ))
}

async fn unread_count(
    State(engine): State<Engine>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = actor_id(&headers)?;
    let count = engine.unread_count(actor).await;
    Ok(Json(serde_json::json!({ "unread": count })))
}

async fn mark_read(
    State(engine): State<Engine>,
    Path(notification_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = actor_id(&headers)?;
    let outcome = engine.mark_notification_read(notification_id, actor).await?;
    Ok(Json(serde_json::json!({
        "applied": outcome.applied,
        "notification": NotificationDto::from(&outcome.value),
    })))
}

async fn archive(
    State(engine): State<Engine>,
    Path(notification_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = actor_id(&headers)?;
    let outcome = engine.archive_notification(notification_id, actor).await?;
    Ok(Json(serde_json::json!({
        "applied": outcome.applied,
        "notification": NotificationDto::from(&outcome.value),
    })))
}
