use crate::editors::portfolio::{PortfolioView, SaveSummary, SearchRequest, TickerRequest};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

pub async fn open(State(state): State<AppState>) -> Result<Json<PortfolioView>, AppError> {
    Ok(Json(state.portfolio.open().await?))
}

pub async fn search(
    State(state): State<AppState>,
    Path(session): Path<Uuid>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.portfolio.search(session, &payload.pattern)?))
}

pub async fn add(
    State(state): State<AppState>,
    Path(session): Path<Uuid>,
    Json(payload): Json<TickerRequest>,
) -> Result<Json<PortfolioView>, AppError> {
    Ok(Json(state.portfolio.add(session, &payload.ticker)?))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(session): Path<Uuid>,
    Json(payload): Json<TickerRequest>,
) -> Result<Json<PortfolioView>, AppError> {
    Ok(Json(state.portfolio.remove(session, &payload.ticker)?))
}

pub async fn save(
    State(state): State<AppState>,
    Path(session): Path<Uuid>,
) -> Result<Json<SaveSummary>, AppError> {
    Ok(Json(state.portfolio.save(session).await?))
}
