//! services/api/src/web/pages.rs
//!
//! Read-only access to static page content.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ticketing_core::Page;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::state::AppState;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct PageSectionResponse {
    pub h2: String,
    pub p: String,
    pub img: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct PageResponse {
    pub slug: String,
    pub title: String,
    pub tags: String,
    pub description: String,
    pub header: Option<String>,
    pub sections: Vec<PageSectionResponse>,
}

impl From<Page> for PageResponse {
    fn from(page: Page) -> Self {
        Self {
            slug: page.slug,
            title: page.title,
            tags: page.tags,
            description: page.description,
            header: page.header,
            sections: page
                .sections
                .into_iter()
                .map(|s| PageSectionResponse {
                    h2: s.h2,
                    p: s.p,
                    img: s.img,
                })
                .collect(),
        }
    }
}

/// Content for one page, looked up by title.
#[utoipa::path(
    get,
    path = "/api/page/{title}",
    params(("title" = String, Path, description = "Page title")),
    responses(
        (status = 200, description = "Page content", body = PageResponse),
        (status = 404, description = "Page not found")
    )
)]
pub async fn page_handler(
    State(state): State<Arc<AppState>>,
    Path(title): Path<String>,
) -> Result<Json<PageResponse>, ApiError> {
    let page = state
        .pages
        .find_page_by_title(&title)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Page {} not found", title)))?;
    Ok(Json(page.into()))
}

/// An information page, looked up by its slug.
#[utoipa::path(
    get,
    path = "/api/information/{slug}",
    params(("slug" = String, Path, description = "Page slug")),
    responses(
        (status = 200, description = "Page content", body = PageResponse),
        (status = 404, description = "Page not found")
    )
)]
pub async fn information_page_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<PageResponse>, ApiError> {
    let page = state
        .pages
        .find_page_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Page {} not found", slug)))?;
    Ok(Json(page.into()))
}
