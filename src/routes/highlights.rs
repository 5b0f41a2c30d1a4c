//! Highlights API routes
//!
//! Every request works on its own freshly parsed document; only the store
//! and configuration are shared.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::anchor::{serialize_range, StructuralPath};
use crate::dom::{parse_html, Boundary, Document, TextRange};
use crate::error::{AppError, Result};
use crate::highlights::{
    is_hex_color, HighlightKind, HighlightRecord, QuoteHighlight, SaveOutcome, UpdateOutcome,
};
use crate::render::{RenderReport, ViewSession};
use crate::state::AppState;

/// Create the highlights router
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_highlights)
                .post(create_highlight)
                .delete(clear_highlights),
        )
        .route("/render", post(render_document))
        .route("/import", post(import_highlights))
        .route("/:id", patch(update_highlight).delete(delete_highlight))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    url: Option<String>,
    #[serde(default = "default_kind")]
    kind: HighlightKind,
}

#[derive(Debug, Deserialize)]
struct KindQuery {
    #[serde(default = "default_kind")]
    kind: HighlightKind,
}

#[derive(Debug, Deserialize)]
struct ClearQuery {
    url: String,
    #[serde(default = "default_kind")]
    kind: HighlightKind,
}

fn default_kind() -> HighlightKind {
    HighlightKind::Sentence
}

/// A selection boundary addressed by structural path
#[derive(Debug, Deserialize)]
pub struct BoundaryPayload {
    pub path: String,
    pub offset: usize,
}

/// Create highlight request
#[derive(Debug, Deserialize)]
pub struct CreateHighlight {
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub html: String,
    pub start: BoundaryPayload,
    pub end: BoundaryPayload,
    pub color: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateResponse {
    /// False when an identical highlight already existed
    pub created: bool,
    pub highlight: QuoteHighlight,
    /// The document with every stored highlight drawn
    pub html: String,
}

/// Render request
#[derive(Debug, Deserialize)]
pub struct RenderDocument {
    pub url: String,
    pub html: String,
}

/// Per-outcome counts of an import
#[derive(Debug, Default, Serialize)]
pub struct ImportResponse {
    pub stored: usize,
    pub duplicate: usize,
    pub invalid: Vec<ImportRejection>,
}

#[derive(Debug, Serialize)]
pub struct ImportRejection {
    /// Position of the record in the request body
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub html: String,
    pub report: RenderReport,
    pub words: RenderReport,
}

/// List highlights, for one document or all of them
async fn list_highlights(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<HighlightRecord>> {
    let store = state.store(query.kind);
    let records = match query.url {
        Some(url) => store.get_for_document(&url).await,
        None => store.get_all().await,
    };
    Json(records)
}

/// Anchor a selection and store it as a quote highlight
async fn create_highlight(
    State(state): State<AppState>,
    Json(data): Json<CreateHighlight>,
) -> Result<(StatusCode, Json<CreateResponse>)> {
    if data.url.trim().is_empty() {
        return Err(AppError::BadRequest("url must not be empty".to_string()));
    }
    if let Some(color) = data.color.as_deref().filter(|color| !is_hex_color(color)) {
        return Err(AppError::BadRequest(format!(
            "Color must be #RRGGBB, got '{}'",
            color
        )));
    }

    let mut doc = parse_html(&data.html);
    let range = TextRange::new(
        decode_boundary(&doc, &data.start)?,
        decode_boundary(&doc, &data.end)?,
    );
    let window = state.config().highlights.context_window;
    let anchor = serialize_range(&doc, &range, window)
        .filter(|anchor| !anchor.quote.exact.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Selection contains no text".to_string()))?;

    let renderer = state.renderer();
    let color = match data.color {
        Some(color) => color,
        None => renderer.configured_color().await,
    };
    let mut highlight = QuoteHighlight::new(&data.url, &data.title, &anchor).with_color(&color);
    if let Some(note) = &data.note {
        highlight = highlight.with_note(note);
    }

    let store = state.store(HighlightKind::Sentence);
    let (status, created) = match store.save(&HighlightRecord::Sentence(highlight.clone())).await {
        SaveOutcome::Stored => (StatusCode::CREATED, true),
        SaveOutcome::Duplicate => (StatusCode::OK, false),
        SaveOutcome::Invalid(e) => return Err(AppError::BadRequest(e.to_string())),
        SaveOutcome::Unavailable => {
            return Err(AppError::Internal("Highlight storage unavailable".to_string()))
        }
    };

    let session = ViewSession::new(data.url, data.title);
    renderer.render_highlights(&mut doc, &session).await;

    Ok((
        status,
        Json(CreateResponse {
            created,
            highlight,
            html: doc.to_html(),
        }),
    ))
}

fn decode_boundary(doc: &Document, payload: &BoundaryPayload) -> Result<Boundary> {
    let path: StructuralPath = payload
        .path
        .parse()
        .map_err(|e| AppError::BadRequest(format!("Invalid path '{}': {}", payload.path, e)))?;
    let node = path
        .decode(doc)
        .ok_or_else(|| AppError::BadRequest(format!("No node at '{}'", payload.path)))?;

    let length = doc.node_length(node);
    if payload.offset > length {
        return Err(AppError::BadRequest(format!(
            "Offset {} out of bounds for '{}' (length {})",
            payload.offset, payload.path, length
        )));
    }
    Ok(Boundary::new(node, payload.offset))
}

/// Draw every stored highlight into a document
async fn render_document(
    State(state): State<AppState>,
    Json(data): Json<RenderDocument>,
) -> Json<RenderResponse> {
    let mut doc = parse_html(&data.html);
    let session = ViewSession::new(data.url, String::new());

    let report = state.renderer().render_highlights(&mut doc, &session).await;
    let words = state.word_renderer().render_highlights(&mut doc, &session).await;

    Json(RenderResponse {
        html: doc.to_html(),
        report,
        words,
    })
}

/// Store previously exported records as they are.
///
/// Each record is validated and deduplicated on its own; one bad record does
/// not reject the batch.
async fn import_highlights(
    State(state): State<AppState>,
    Query(query): Query<KindQuery>,
    Json(records): Json<Vec<Value>>,
) -> Result<Json<ImportResponse>> {
    let store = state.store(query.kind);
    let mut response = ImportResponse::default();

    for (index, value) in records.iter().enumerate() {
        match store.save_value(value).await {
            SaveOutcome::Stored => response.stored += 1,
            SaveOutcome::Duplicate => response.duplicate += 1,
            SaveOutcome::Invalid(e) => response.invalid.push(ImportRejection {
                index,
                reason: e.to_string(),
            }),
            SaveOutcome::Unavailable => {
                return Err(AppError::Internal("Highlight storage unavailable".to_string()))
            }
        }
    }

    tracing::info!(
        "Imported {} {} highlight(s), {} duplicate, {} invalid",
        response.stored,
        query.kind.as_str(),
        response.duplicate,
        response.invalid.len()
    );
    Ok(Json(response))
}

/// Merge a partial update into a highlight
async fn update_highlight(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<KindQuery>,
    Json(patch): Json<Value>,
) -> Result<Json<HighlightRecord>> {
    if !patch.is_object() {
        return Err(AppError::BadRequest("Patch must be a JSON object".to_string()));
    }

    match state.store(query.kind).update(&id, &patch).await {
        UpdateOutcome::Applied(record) => Ok(Json(record)),
        UpdateOutcome::Missing => Err(AppError::NotFound(format!("Highlight not found: {}", id))),
        UpdateOutcome::Duplicate => Err(AppError::Conflict(format!(
            "Update would duplicate another highlight: {}",
            id
        ))),
        UpdateOutcome::Invalid(e) => Err(AppError::BadRequest(e.to_string())),
        UpdateOutcome::Unavailable => {
            Err(AppError::Internal("Highlight storage unavailable".to_string()))
        }
    }
}

/// Delete a highlight
async fn delete_highlight(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<KindQuery>,
) -> Result<StatusCode> {
    if state.store(query.kind).remove(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Highlight not found: {}", id)))
    }
}

/// Delete every highlight of a document
async fn clear_highlights(
    State(state): State<AppState>,
    Query(query): Query<ClearQuery>,
) -> Json<Value> {
    let removed = state.store(query.kind).clear_for_document(&query.url).await;
    Json(serde_json::json!({ "removed": removed }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::build_app;
    use crate::config::Config;
    use crate::highlights::MemoryStore;
    use crate::state::AppState;

    const URL: &str = "https://example.com/fox";
    const HTML: &str = "<p>The quick brown fox jumps. The quick brown fox runs.</p>";

    fn app() -> axum::Router {
        build_app(AppState::new(Config::default(), Arc::new(MemoryStore::new())))
    }

    async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn create_body(start: usize, end: usize) -> Value {
        json!({
            "url": URL,
            "title": "Fox",
            "html": HTML,
            "start": { "path": "/html/body/p/text()[1]", "offset": start },
            "end": { "path": "/html/body/p/text()[1]", "offset": end },
            "note": "second fox"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_create_list_render_delete() {
        let app = app();

        let (status, body) = send(&app, "POST", "/api/v1/highlights", Some(create_body(31, 46))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["created"], true);
        assert_eq!(body["highlight"]["exact"], "quick brown fox");
        assert_eq!(body["highlight"]["prefix"], "he quick brown fox jumps. The ");
        assert!(body["html"]
            .as_str()
            .unwrap()
            .contains("jumps. The <span class=\"sentence-highlight\""));
        let id = body["highlight"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "POST", "/api/v1/highlights", Some(create_body(31, 46))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["created"], false);

        let (_, list) = send(&app, "GET", &format!("/api/v1/highlights?url={}", URL), None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["kind"], "sentence");

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/highlights/render",
            Some(json!({ "url": URL, "html": HTML })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report"]["rendered"], 1);
        assert!(body["html"].as_str().unwrap().contains("title=\"second fox\""));

        let (status, _) = send(&app, "DELETE", &format!("/api/v1/highlights/{}", id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", &format!("/api/v1/highlights/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_selection() {
        let app = app();

        let mut body = create_body(4, 19);
        body["start"]["path"] = json!("/html/body/div");
        let (status, error) = send(&app, "POST", "/api/v1/highlights", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"], "bad_request");

        let (status, _) = send(&app, "POST", "/api/v1/highlights", Some(create_body(4, 4))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "POST", "/api/v1/highlights", Some(create_body(4, 999))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_and_clear() {
        let app = app();
        let (_, body) = send(&app, "POST", "/api/v1/highlights", Some(create_body(4, 9))).await;
        let id = body["highlight"]["id"].as_str().unwrap().to_string();

        let (status, updated) = send(
            &app,
            "PATCH",
            &format!("/api/v1/highlights/{}", id),
            Some(json!({ "color": "#BBDEFB" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["color"], "#BBDEFB");

        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/api/v1/highlights/{}", id),
            Some(json!({ "exact": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "PATCH",
            "/api/v1/highlights/missing",
            Some(json!({ "color": "#BBDEFB" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, "DELETE", &format!("/api/v1/highlights?url={}", URL), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], 1);

        let (_, list) = send(&app, "GET", "/api/v1/highlights", None).await;
        assert!(list.as_array().unwrap().is_empty());
    }

    fn stored_record(id: &str, exact: &str) -> Value {
        json!({
            "id": id,
            "url": URL,
            "title": "Fox",
            "timestamp": 1_700_000_000_000i64,
            "startXPath": "/html/body/p/text()[1]",
            "endXPath": "/html/body/p/text()[1]",
            "startOffset": 4,
            "endOffset": 9,
            "exact": exact,
            "prefix": "The ",
            "suffix": " brown"
        })
    }

    #[tokio::test]
    async fn test_create_rejects_non_hex_color() {
        let mut body = create_body(4, 9);
        body["color"] = json!("red; position: fixed");
        let (status, error) = send(&app(), "POST", "/api/v1/highlights", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(error["message"].as_str().unwrap().contains("#RRGGBB"));
    }

    #[tokio::test]
    async fn test_import_then_guarded_updates() {
        let app = app();

        let records = json!([
            stored_record("a", "quick"),
            stored_record("b", "brown"),
            stored_record("a-again", "quick"),
            { "id": "broken", "url": URL }
        ]);
        let (status, body) = send(&app, "POST", "/api/v1/highlights/import", Some(records)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stored"], 2);
        assert_eq!(body["duplicate"], 1);
        assert_eq!(body["invalid"][0]["index"], 3);

        let (status, error) = send(
            &app,
            "PATCH",
            "/api/v1/highlights/b",
            Some(json!({ "exact": "quick" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error["error"], "conflict");

        let (status, _) = send(
            &app,
            "PATCH",
            "/api/v1/highlights/b",
            Some(json!({ "color": "red; position: fixed" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "PATCH",
            "/api/v1/highlights/b",
            Some(json!({ "prefix": "x".repeat(31) })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, list) = send(&app, "GET", &format!("/api/v1/highlights?url={}", URL), None).await;
        assert_eq!(list.as_array().unwrap().len(), 2);
        assert_eq!(list[1]["exact"], "brown");
        assert_eq!(list[1]["prefix"], "The ");
    }
}
