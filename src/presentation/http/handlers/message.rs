//! Message and Webhook Handlers

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{
    CreateMessageRequest, CreateWebhookRequest, WebhookMessageRequest,
};
use crate::application::dto::response::{DeletionResponse, MessageResponse, WebhookResponse};
use crate::presentation::http::extractors::{parse_id, UploadForm, ValidatedJson};
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Post a text message
pub async fn send_message(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    ValidatedJson(body): ValidatedJson<CreateMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let channel_id = parse_id(&channel_id, "channel")?;
    let posted = state
        .write_guard
        .post_message(channel_id, body.author_id, &body.content, None)
        .await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::from(posted))))
}

/// Post a message with one attachment (multipart: file, content, author_id)
pub async fn send_attachment(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let channel_id = parse_id(&channel_id, "channel")?;
    let mut form = UploadForm::read(multipart).await?;
    let author_id = form
        .author_id
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Missing 'author_id' field".into()))
        .and_then(|raw| parse_id(raw, "author"))?;
    let upload = form.require_file()?;

    let posted = state
        .write_guard
        .post_message(
            channel_id,
            author_id,
            form.content.as_deref().unwrap_or_default(),
            Some(upload),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::from(posted))))
}

/// Get message by ID, with its attachment
pub async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let message_id = parse_id(&message_id, "message")?;
    let (message, file) = state.rooms.get_message_with_file(message_id).await?;
    Ok(Json(MessageResponse::with_file(message, file)))
}

/// Delete a message with its attachment
pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> Result<Json<DeletionResponse>, AppError> {
    let message_id = parse_id(&message_id, "message")?;
    let outcome = state.rooms.delete_message(message_id).await?;
    Ok(Json(DeletionResponse::new(message_id, outcome)))
}

/// Create a webhook bound to a channel
pub async fn create_webhook(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    ValidatedJson(body): ValidatedJson<CreateWebhookRequest>,
) -> Result<(StatusCode, Json<WebhookResponse>), AppError> {
    let channel_id = parse_id(&channel_id, "channel")?;
    let webhook = state.rooms.create_webhook(channel_id, &body.name).await?;
    Ok((StatusCode::CREATED, Json(WebhookResponse::from(webhook))))
}

/// Post through a webhook
pub async fn execute_webhook(
    State(state): State<AppState>,
    Path(webhook_id): Path<String>,
    ValidatedJson(body): ValidatedJson<WebhookMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let webhook_id = parse_id(&webhook_id, "webhook")?;
    let posted = state
        .write_guard
        .post_webhook_message(webhook_id, &body.content, None)
        .await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::from(posted))))
}
