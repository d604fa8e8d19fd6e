use std::path::Path;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json,
};
use chrono::Utc;
use log::info;
use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    Router,
};

/// The multipart field the file is read from
const FIELD_NAME: &str = "image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Audio,
}

impl UploadKind {
    fn directory(&self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Audio => "audio",
        }
    }
}

/// Where an uploaded file can be fetched from
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_url: Option<String>,
}

/// The multipart body of an upload
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// The image or audio file
    #[schema(value_type = String, format = Binary)]
    image: Vec<u8>,
}

impl UploadResult {
    fn new(kind: UploadKind, url: String) -> Self {
        match kind {
            UploadKind::Image => Self {
                image_url: Some(url),
                audio_url: None,
            },
            UploadKind::Audio => Self {
                image_url: None,
                audio_url: Some(url),
            },
        }
    }
}

/// Returns the kind and file extension of an allowed MIME type
pub fn classify(mime: &str) -> Option<(UploadKind, &'static str)> {
    let essence = mime.split(';').next().unwrap_or_default().trim();

    let allowed = match essence {
        "image/jpeg" => (UploadKind::Image, "jpg"),
        "image/png" => (UploadKind::Image, "png"),
        "image/gif" => (UploadKind::Image, "gif"),
        "image/webp" => (UploadKind::Image, "webp"),
        "audio/webm" => (UploadKind::Audio, "webm"),
        "audio/mp4" => (UploadKind::Audio, "m4a"),
        "audio/mpeg" => (UploadKind::Audio, "mp3"),
        "audio/ogg" => (UploadKind::Audio, "ogg"),
        "audio/wav" => (UploadKind::Audio, "wav"),
        _ => return None,
    };

    Some(allowed)
}

/// Creates a unique file name, such as `1718000000000-k3j9x2qa.png`
pub fn unique_file_name(extension: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();

    format!("{}-{}.{}", Utc::now().timestamp_millis(), suffix, extension)
}

async fn store(upload_dir: &Path, kind: UploadKind, name: &str, data: &[u8]) -> ServerResult<()> {
    let directory = upload_dir.join(kind.directory());

    tokio::fs::create_dir_all(&directory)
        .await
        .map_err(ServerError::Storage)?;

    tokio::fs::write(directory.join(name), data)
        .await
        .map_err(ServerError::Storage)
}

fn invalid_upload(error: MultipartError, limit: usize) -> ServerError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::TooLarge(limit)
    } else {
        ServerError::InvalidUpload(error.body_text())
    }
}

#[utoipa::path(
    post,
    path = "/upload",
    tag = "uploads",
    request_body(
        content = UploadForm,
        content_type = "multipart/form-data",
        description = "A single image or audio file in the `image` field"
    ),
    responses(
        (status = 200, body = UploadResult),
        (status = 400, description = "No file, a disallowed type, or a file that is too large"),
        (status = 500, description = "The file could not be stored")
    )
)]
async fn upload(
    State(context): State<ServerContext>,
    mut multipart: Multipart,
) -> ServerResult<Json<UploadResult>> {
    let config = &context.config;
    let limit = config.max_upload_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| invalid_upload(e, limit))?
    {
        if field.name() != Some(FIELD_NAME) {
            continue;
        }

        let mime = field.content_type().unwrap_or_default().to_string();
        let (kind, extension) = classify(&mime).ok_or(ServerError::FileType(mime))?;

        let data = field.bytes().await.map_err(|e| invalid_upload(e, limit))?;

        if data.len() > limit {
            return Err(ServerError::TooLarge(limit));
        }

        let name = unique_file_name(extension);
        store(&config.upload_dir, kind, &name, &data).await?;

        let url = format!(
            "{}/uploads/{}/{}",
            config.public_url,
            kind.directory(),
            name
        );

        info!("Stored upload {} ({} bytes)", url, data.len());
        return Ok(Json(UploadResult::new(kind, url)));
    }

    Err(ServerError::NoFile)
}

pub fn router(max_upload_bytes: usize) -> Router {
    // Leaves room for the multipart framing around the file
    let body_limit = max_upload_bytes + 64 * 1024;

    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(body_limit))
}
