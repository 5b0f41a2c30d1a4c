//! Highlight preference routes

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::highlights::{is_hex_color, KeyValueStore, StoreError, HIGHLIGHT_COLORS};
use crate::render::COLOR_PREFERENCE_KEY;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/color", get(get_color).put(set_color))
}

#[derive(Debug, Serialize)]
pub struct ColorPreference {
    pub color: String,
    pub palette: &'static [&'static str],
}

#[derive(Debug, Deserialize)]
pub struct SetColor {
    pub color: String,
}

/// Current highlight color and the predefined palette
async fn get_color(State(state): State<AppState>) -> Json<ColorPreference> {
    Json(ColorPreference {
        color: state.renderer().configured_color().await,
        palette: &HIGHLIGHT_COLORS,
    })
}

/// Store the preferred highlight color
async fn set_color(
    State(state): State<AppState>,
    Json(data): Json<SetColor>,
) -> Result<Json<ColorPreference>> {
    let color = data.color.trim();
    if !is_hex_color(color) {
        return Err(AppError::BadRequest(format!(
            "Color must be #RRGGBB, got '{}'",
            data.color
        )));
    }
    let color = color.to_ascii_uppercase();

    let encoded = serde_json::to_string(&color).map_err(StoreError::from)?;
    state.substrate().set(COLOR_PREFERENCE_KEY, &encoded).await?;
    tracing::info!("Highlight color preference set to {}", color);

    Ok(Json(ColorPreference {
        color,
        palette: &HIGHLIGHT_COLORS,
    }))
}
