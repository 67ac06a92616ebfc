//! HTTP handlers for file operations.
//! Streams bodies in both directions to avoid buffering whole objects in
//! memory and delegates all storage semantics to the transfer engine.

use crate::{
    errors::AppError,
    models::file::FileEntry,
    services::{
        download,
        gateway::{DEFAULT_CONTENT_TYPE, ObjectStore, S3Gateway},
        keys, listing, upload,
    },
};
use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, Query, State,
        multipart::{Field, MultipartError},
    },
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use futures::stream;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::io;

/// Query params accepted by `GET /files`.
#[derive(Debug, Deserialize)]
pub struct FindQuery {
    #[serde(default)]
    pub pattern: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub files: Vec<FileEntry>,
}

/// Download `/files/{*key}` as a streaming response.
///
/// Non-image content types are served as attachments so browsers download
/// rather than render them.
pub async fn download_file(
    State(gateway): State<S3Gateway>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let opened = download::open(&gateway, &key).await?;
    let disposition = opened.attachment_disposition(&key);

    let mut response = Response::new(Body::from_stream(opened.stream));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&opened.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
    );
    if let Some(value) = disposition {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            headers.insert(header::CONTENT_DISPOSITION, header_value);
        }
    }

    Ok(response)
}

/// Upload `POST /files` from a multipart form.
///
/// Fields: `file` (required), `new_filename`, `set_unique_name`. The file
/// part is streamed straight into the store; metadata fields must precede
/// it in the form, since the key is fixed when the transfer starts.
pub async fn upload_file(
    State(gateway): State<S3Gateway>,
    mut form: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut new_filename = String::new();
    let mut set_unique_name = false;

    while let Some(field) = form.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "new_filename" => new_filename = field.text().await.map_err(form_error)?,
            "set_unique_name" => {
                set_unique_name = parse_flag(&field.text().await.map_err(form_error)?)
            }
            "file" => {
                let original = if new_filename.is_empty() {
                    field.file_name().unwrap_or("file").to_string()
                } else {
                    new_filename.clone()
                };
                let key = if set_unique_name {
                    keys::unique_key(&original)
                } else {
                    original
                };
                let content_type = field
                    .content_type()
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_string();

                let source = field_stream(field);
                let filename = upload::upload_stream(&gateway, source, &key, &content_type).await?;

                if set_unique_name && !keys::is_unique_key(&filename) {
                    return Err(AppError::internal(format!(
                        "generated filename is not UUID4_ prefixed: {filename}"
                    )));
                }
                return Ok((StatusCode::CREATED, Json(UploadResponse { filename })));
            }
            _ => {}
        }
    }

    Err(AppError::new(
        StatusCode::UNPROCESSABLE_ENTITY,
        "multipart form is missing a `file` field",
    ))
}

/// Delete `/files/{*key}`. Idempotent: a missing key is still success.
pub async fn delete_file(
    State(gateway): State<S3Gateway>,
    Path(key): Path<String>,
) -> Result<Json<Value>, AppError> {
    gateway.delete_object(&key).await?;

    Ok(Json(json!({
        "details": format!("Deleted file if it existed: {key}")
    })))
}

/// List `GET /files?pattern=` — substring-filtered listing with content
/// types.
pub async fn find_files(
    State(gateway): State<S3Gateway>,
    Query(query): Query<FindQuery>,
) -> Result<Json<ListResponse>, AppError> {
    let files = listing::find_files(&gateway, &query.pattern).await?;
    Ok(Json(ListResponse { files }))
}

/// Adapt a multipart field into the orchestrator's pulled byte source.
fn field_stream(field: Field<'_>) -> impl futures::Stream<Item = io::Result<Bytes>> + Send + '_ {
    stream::try_unfold(field, |mut field| async move {
        match field.chunk().await {
            Ok(Some(chunk)) => Ok(Some((chunk, field))),
            Ok(None) => Ok(None),
            Err(err) => Err(io::Error::new(io::ErrorKind::Other, err)),
        }
    })
}

fn form_error(err: MultipartError) -> AppError {
    AppError::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_field_accepts_common_truthy_spellings() {
        assert!(parse_flag("true"));
        assert!(parse_flag("True"));
        assert!(parse_flag("1"));
        assert!(parse_flag("on"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("yes please"));
    }
}
