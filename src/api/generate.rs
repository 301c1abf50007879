//! Article generator endpoint
//!
//! Returns the generated fields without saving anything; the editor panel
//! saves through the regular article and paragraph endpoints.

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::api::middleware::{require_editor, ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::services::GeneratedArticle;

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub topic: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(generate))
}

async fn generate(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(body): ApiJson<GenerateRequest>,
) -> Result<Json<GeneratedArticle>, ApiError> {
    require_editor(&user)?;
    let article = state.generator.generate(body.topic.as_deref().unwrap_or_default()).await?;
    Ok(Json(article))
}
