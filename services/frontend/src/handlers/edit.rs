use crate::editors::dividends::{AddRow, DivView, SaveReport};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

pub async fn open(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<DivView>, AppError> {
    Ok(Json(state.dividends.open(&ticker).await?))
}

pub async fn add_row(
    State(state): State<AppState>,
    Path(session): Path<Uuid>,
    Json(row): Json<AddRow>,
) -> Result<Json<DivView>, AppError> {
    Ok(Json(state.dividends.add(session, row).await?))
}

pub async fn reload(
    State(state): State<AppState>,
    Path(session): Path<Uuid>,
) -> Result<Json<DivView>, AppError> {
    Ok(Json(state.dividends.reload(session).await?))
}

pub async fn save(
    State(state): State<AppState>,
    Path(session): Path<Uuid>,
) -> Result<Json<SaveReport>, AppError> {
    Ok(Json(state.dividends.save(session).await?))
}
