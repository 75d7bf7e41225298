//! Custom Extractors
//!
//! Path ID parsing, validated JSON bodies and multipart file reading.

use axum::extract::{multipart::Field, FromRequest, Json, Multipart, Request};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::application::services::FileUpload;
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;

/// Parse a snowflake path segment.
pub fn parse_id(raw: &str, what: &str) -> Result<i64, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid {} ID", what)))
}

/// JSON body that has passed `validator` checks.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        value.validate().map_err(validation_error)?;
        Ok(ValidatedJson(value))
    }
}

/// Fields of an upload form: one `file` part plus optional text parts.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<FileUpload>,
    pub content: Option<String>,
    pub author_id: Option<String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            match field.name().unwrap_or_default() {
                "file" => form.file = Some(read_file(field).await?),
                "content" => form.content = Some(read_text(field).await?),
                "author_id" => form.author_id = Some(read_text(field).await?),
                other => tracing::debug!(field = other, "Ignoring unknown multipart field"),
            }
        }
        Ok(form)
    }

    pub fn require_file(&mut self) -> Result<FileUpload, AppError> {
        self.file
            .take()
            .ok_or_else(|| AppError::BadRequest("Missing 'file' field".into()))
    }
}

async fn read_file(field: Field<'_>) -> Result<FileUpload, AppError> {
    let name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes: Bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(FileUpload {
        name,
        content_type,
        bytes,
    })
}

async fn read_text(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))
}
