//! Work-plan tracking endpoints for converted orders.
//!
//! Handlers load the order, run the tracker mutation, and persist guarded
//! on the status they read, mirroring the booking endpoints.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use tailor_core::domain::actor::{Actor, ActorRole};
use tailor_core::domain::order::{CompletionFeedback, Order, OrderId, WorkStageDraft};
use tailor_core::domain::schedule::TailorId;
use tailor_core::notify::NotificationEvent;

use crate::api::{correlation_id, domain_error, repo_error, ApiError, ApiState};
use crate::identity::Identity;

#[derive(Debug, Deserialize)]
pub struct WorkPlanRequest {
    pub stages: Vec<WorkStageDraft>,
}

#[derive(Debug, Deserialize)]
pub struct RejectPlanRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct DelayRequestBody {
    pub reason: String,
    pub additional_days: u16,
}

#[derive(Debug, Deserialize)]
pub struct DelayResponseBody {
    pub approved: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DelayAccepted {
    pub request_index: usize,
    pub order: Order,
}

pub async fn get_order(
    State(state): State<ApiState>,
    Identity(actor): Identity,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let cid = correlation_id();
    let order = load_order(&state, &id, &cid).await?;
    require_participant(&order, &actor, &cid)?;
    Ok(Json(order))
}

pub async fn list_my_orders(
    State(state): State<ApiState>,
    Identity(actor): Identity,
) -> Result<Json<Vec<Order>>, ApiError> {
    let cid = correlation_id();
    if actor.role != ActorRole::Tailor {
        return Err(ApiError::forbidden("only tailors may list their orders", &cid));
    }

    let orders = state
        .orders
        .list_for_tailor(&TailorId(actor.id.clone()))
        .await
        .map_err(|error| repo_error(error, &cid))?;

    Ok(Json(orders))
}

pub async fn submit_work_plan(
    State(state): State<ApiState>,
    Identity(actor): Identity,
    Path(id): Path<String>,
    Json(payload): Json<WorkPlanRequest>,
) -> Result<Json<Order>, ApiError> {
    let cid = correlation_id();
    let mut order = load_order(&state, &id, &cid).await?;
    let expected = order.status;

    let now = Utc::now();
    state
        .tracker
        .submit_work_plan(&mut order, &actor, payload.stages, now.date_naive(), now)
        .map_err(|error| domain_error(error, &cid))?;

    state.orders.save(&order, expected).await.map_err(|error| repo_error(error, &cid))?;
    notify(&state, &order, &actor, "order.submit_work_plan", &cid);
    Ok(Json(order))
}

pub async fn approve_work_plan(
    State(state): State<ApiState>,
    Identity(actor): Identity,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let cid = correlation_id();
    let mut order = load_order(&state, &id, &cid).await?;
    let expected = order.status;

    state
        .tracker
        .approve_work_plan(&mut order, &actor, Utc::now())
        .map_err(|error| domain_error(error, &cid))?;

    state.orders.save(&order, expected).await.map_err(|error| repo_error(error, &cid))?;
    notify(&state, &order, &actor, "order.approve_work_plan", &cid);
    Ok(Json(order))
}

pub async fn reject_work_plan(
    State(state): State<ApiState>,
    Identity(actor): Identity,
    Path(id): Path<String>,
    Json(payload): Json<RejectPlanRequest>,
) -> Result<Json<Order>, ApiError> {
    let cid = correlation_id();
    let mut order = load_order(&state, &id, &cid).await?;
    let expected = order.status;

    state
        .tracker
        .reject_work_plan(&mut order, &actor, &payload.reason, Utc::now())
        .map_err(|error| domain_error(error, &cid))?;

    state.orders.save(&order, expected).await.map_err(|error| repo_error(error, &cid))?;
    notify(&state, &order, &actor, "order.reject_work_plan", &cid);
    Ok(Json(order))
}

pub async fn complete_stage(
    State(state): State<ApiState>,
    Identity(actor): Identity,
    Path((id, index)): Path<(String, usize)>,
) -> Result<Json<Order>, ApiError> {
    let cid = correlation_id();
    let mut order = load_order(&state, &id, &cid).await?;
    let expected = order.status;

    state
        .tracker
        .complete_stage(&mut order, &actor, index, Utc::now())
        .map_err(|error| domain_error(error, &cid))?;

    state.orders.save(&order, expected).await.map_err(|error| repo_error(error, &cid))?;
    notify(&state, &order, &actor, "order.complete_stage", &cid);
    Ok(Json(order))
}

pub async fn request_delay(
    State(state): State<ApiState>,
    Identity(actor): Identity,
    Path(id): Path<String>,
    Json(payload): Json<DelayRequestBody>,
) -> Result<Json<DelayAccepted>, ApiError> {
    let cid = correlation_id();
    let mut order = load_order(&state, &id, &cid).await?;
    let expected = order.status;

    let request_index = state
        .tracker
        .request_delay(&mut order, &actor, payload.reason, payload.additional_days, Utc::now())
        .map_err(|error| domain_error(error, &cid))?;

    state.orders.save(&order, expected).await.map_err(|error| repo_error(error, &cid))?;
    notify(&state, &order, &actor, "order.request_delay", &cid);
    Ok(Json(DelayAccepted { request_index, order }))
}

pub async fn respond_to_delay(
    State(state): State<ApiState>,
    Identity(actor): Identity,
    Path((id, index)): Path<(String, usize)>,
    Json(payload): Json<DelayResponseBody>,
) -> Result<Json<Order>, ApiError> {
    let cid = correlation_id();
    let mut order = load_order(&state, &id, &cid).await?;
    let expected = order.status;

    state
        .tracker
        .respond_to_delay(&mut order, &actor, index, payload.approved, Utc::now())
        .map_err(|error| domain_error(error, &cid))?;

    state.orders.save(&order, expected).await.map_err(|error| repo_error(error, &cid))?;
    notify(&state, &order, &actor, "order.respond_to_delay", &cid);
    Ok(Json(order))
}

pub async fn confirm_receipt(
    State(state): State<ApiState>,
    Identity(actor): Identity,
    Path(id): Path<String>,
    Json(payload): Json<CompleteRequest>,
) -> Result<Json<Order>, ApiError> {
    let cid = correlation_id();
    let mut order = load_order(&state, &id, &cid).await?;
    let expected = order.status;

    let feedback =
        payload.rating.map(|rating| CompletionFeedback { rating, comment: payload.comment });
    state
        .tracker
        .confirm_receipt(&mut order, &actor, feedback, Utc::now())
        .map_err(|error| domain_error(error, &cid))?;

    state.orders.save(&order, expected).await.map_err(|error| repo_error(error, &cid))?;
    notify(&state, &order, &actor, "order.confirm_receipt", &cid);
    Ok(Json(order))
}

pub async fn submit_review(
    State(state): State<ApiState>,
    Identity(actor): Identity,
    Path(id): Path<String>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<Order>, ApiError> {
    let cid = correlation_id();
    let mut order = load_order(&state, &id, &cid).await?;
    let expected = order.status;

    let feedback = CompletionFeedback { rating: payload.rating, comment: payload.comment };
    state
        .tracker
        .submit_review(&mut order, &actor, feedback, Utc::now())
        .map_err(|error| domain_error(error, &cid))?;

    state.orders.save(&order, expected).await.map_err(|error| repo_error(error, &cid))?;
    notify(&state, &order, &actor, "order.submit_review", &cid);
    Ok(Json(order))
}

async fn load_order(state: &ApiState, id: &str, cid: &str) -> Result<Order, ApiError> {
    state
        .orders
        .find_by_id(&OrderId(id.to_string()))
        .await
        .map_err(|error| repo_error(error, cid))?
        .ok_or_else(|| ApiError::not_found("order", cid))
}

fn require_participant(order: &Order, actor: &Actor, cid: &str) -> Result<(), ApiError> {
    let allowed = match actor.role {
        ActorRole::Customer => actor.id == order.customer_id.0,
        ActorRole::Tailor => actor.id == order.tailor_id.0,
        ActorRole::Admin | ActorRole::System => true,
    };
    if allowed {
        Ok(())
    } else {
        Err(ApiError::forbidden("only order participants may view this order", cid))
    }
}

fn notify(state: &ApiState, order: &Order, actor: &Actor, event_type: &str, cid: &str) {
    state.notifications.notify(
        NotificationEvent::new(
            Some(order.booking_id.clone()),
            Some(order.id.clone()),
            cid,
            event_type,
            actor.id.clone(),
        )
        .with_metadata("status", order.status.as_str()),
    );
}
