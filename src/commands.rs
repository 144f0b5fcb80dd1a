// HTTP command handlers
use axum::{
    extract::{Path as UrlPath, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::path::{Component, Path, PathBuf};

use crate::board::BoardStatus;
use crate::error::SoundboardError;
use crate::library::catalog::safe_join;
use crate::library::scanner::DirectoryScanner;
use crate::playback::{ClipSnapshot, ToggleOutcome};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Human readable status line
    pub status: String,
    pub state: Option<BoardStatus>,
    pub active: Option<String>,
    /// Whether the server plays sounds itself
    pub playback: bool,
    pub clips: Vec<ClipSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub outcome: ToggleOutcome,
    pub status: String,
}

fn error_response(code: StatusCode, message: impl Into<String>) -> Response {
    (code, Json(json!({ "error": message.into() }))).into_response()
}

/// GET /api/sounds
pub async fn list_sounds(State(state): State<AppState>) -> Response {
    tracing::debug!("GET /api/sounds - Fetching sound files");
    let dir = state.sounds_dir.clone();

    let scanned = tokio::task::spawn_blocking(move || DirectoryScanner::scan(dir.as_path()))
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
        .and_then(|result| result);

    match scanned {
        Ok(files) => Json(files).into_response(),
        Err(e) => {
            tracing::error!("Error reading sounds directory: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Could not read sounds directory")
        }
    }
}

/// GET /sounds/:file
pub async fn serve_sound(State(state): State<AppState>, UrlPath(file): UrlPath<String>) -> Response {
    match safe_join(&state.sounds_dir, &file) {
        Some(path) => serve_file(&path).await,
        None => {
            tracing::warn!("Rejected sound path: {}", file);
            not_found()
        }
    }
}

/// GET /
pub async fn index(State(state): State<AppState>) -> Response {
    tracing::debug!("Serving index.html");
    serve_file(&state.public_dir.join("index.html")).await
}

/// Anything else is looked up under the public directory
pub async fn public_file(State(state): State<AppState>, uri: Uri) -> Response {
    match resolve_public(&state.public_dir, uri.path()) {
        Some(path) => serve_file(&path).await,
        None => not_found(),
    }
}

/// GET /api/status
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let response = match &state.board {
        Some(board) => {
            let status = board.status();
            StatusResponse {
                status: status.to_string(),
                state: Some(status),
                active: board.controller().and_then(|c| c.active()),
                playback: true,
                clips: board.buttons(),
            }
        }
        None => StatusResponse {
            status: "Playback disabled".to_string(),
            state: None,
            active: None,
            playback: false,
            clips: Vec::new(),
        },
    };
    Json(response)
}

/// POST /api/sounds/:id/toggle
pub async fn toggle_sound(State(state): State<AppState>, UrlPath(id): UrlPath<String>) -> Response {
    let Some(board) = &state.board else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Playback is disabled");
    };

    match board.press(&id).await {
        Ok(outcome) => Json(ToggleResponse {
            outcome,
            status: board.status().to_string(),
        })
        .into_response(),
        Err(e @ SoundboardError::UnknownClip(_)) => error_response(StatusCode::NOT_FOUND, e.to_string()),
        Err(e) => {
            tracing::error!("Toggle of {} failed: {}", id, e);
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

async fn serve_file(path: &Path) -> Response {
    match tokio::fs::read(path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type(path))], bytes).into_response(),
        Err(e) => {
            tracing::debug!("Cannot serve {}: {}", path.display(), e);
            not_found()
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "ico" => "image/x-icon",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    }
}

/// Map a request path onto the public directory; only plain path
/// segments are allowed
pub fn resolve_public(root: &Path, uri_path: &str) -> Option<PathBuf> {
    let relative = uri_path.trim_start_matches('/');
    if relative.is_empty() {
        return None;
    }

    let mut path = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => path.push(part),
            _ => return None,
        }
    }
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(content_type(Path::new("a b.MP3")), "audio/mpeg");
        assert_eq!(content_type(Path::new("clip.ogg")), "audio/ogg");
        assert_eq!(content_type(Path::new("index.html")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_resolve_public() {
        let root = Path::new("/srv/public");
        assert_eq!(resolve_public(root, "/app.js"), Some(root.join("app.js")));
        assert_eq!(resolve_public(root, "/css/site.css"), Some(root.join("css").join("site.css")));
        assert_eq!(resolve_public(root, "/../secret"), None);
        assert_eq!(resolve_public(root, "/"), None);
    }
}
