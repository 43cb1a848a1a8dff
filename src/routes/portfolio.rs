// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Portfolio routes. The image of a new entry is staged beforehand in the
//! `portfolioImage` slot.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::files::StoredObject;
use crate::models::portfolio::PortfolioItem;
use crate::services::portfolio::NewPortfolioItem;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Extension, Json, Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/portfolio", get(list_items).post(add_item))
        .route("/api/portfolio/files", get(list_files))
        .route("/api/portfolio/{item_id}", delete(remove_item))
}

async fn list_items(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<PortfolioItem>>> {
    Ok(Json(state.portfolio.list(&user.uid).await?))
}

async fn add_item(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(item): Json<NewPortfolioItem>,
) -> Result<(StatusCode, Json<PortfolioItem>)> {
    let item = state.portfolio.add(&user.session(), item).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn remove_item(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(item_id): Path<String>,
) -> Result<StatusCode> {
    state.portfolio.remove(&user.session(), &item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_files(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<StoredObject>>> {
    Ok(Json(state.portfolio.list_files(&user.session()).await?))
}
