use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use persistence::JsonView;
use types::ids::{Group, TableId};

/// Rows of a table in extended-JSON form.
pub async fn get_table(
    State(state): State<AppState>,
    Path((group, name)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let group: Group = group.parse()?;
    let json = state.tables.get_json(&TableId::new(group, name)).await?;

    Ok(([(header::CONTENT_TYPE, "application/json")], json).into_response())
}
