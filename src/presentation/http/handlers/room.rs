//! Room Handlers

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{
    AddMemberRequest, CreateChannelRequest, CreateRoomRequest, RoomSettingsRequest,
};
use crate::application::dto::response::{
    ChannelResponse, DeletionResponse, FileResponse, MemberResponse, RoomResponse, UsageResponse,
};
use crate::domain::ChannelType;
use crate::presentation::http::extractors::{parse_id, UploadForm, ValidatedJson};
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Create a room
pub async fn create_room(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), AppError> {
    let room = state
        .rooms
        .create_room(&body.name, &body.settings.to_patch())
        .await?;
    Ok((StatusCode::CREATED, Json(RoomResponse::from(room))))
}

/// Get room by ID
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomResponse>, AppError> {
    let room_id = parse_id(&room_id, "room")?;
    let room = state.rooms.get_room(room_id).await?;
    Ok(Json(RoomResponse::from(room)))
}

/// Update quota and retention settings
pub async fn update_settings(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    ValidatedJson(body): ValidatedJson<RoomSettingsRequest>,
) -> Result<Json<RoomResponse>, AppError> {
    let room_id = parse_id(&room_id, "room")?;
    let room = state.rooms.update_settings(room_id, &body.to_patch()).await?;
    Ok(Json(RoomResponse::from(room)))
}

/// Delete a room and everything in it
pub async fn delete_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<DeletionResponse>, AppError> {
    let room_id = parse_id(&room_id, "room")?;
    let deletion = state.rooms.delete_room(room_id).await?;
    Ok(Json(DeletionResponse::from(deletion)))
}

/// Current usage against the room's limits
pub async fn get_usage(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<UsageResponse>, AppError> {
    let room_id = parse_id(&room_id, "room")?;
    let report = state.rooms.room_usage(room_id).await?;
    Ok(Json(UsageResponse::from(report)))
}

/// List channels of a room
pub async fn list_channels(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<ChannelResponse>>, AppError> {
    let room_id = parse_id(&room_id, "room")?;
    let channels = state.rooms.list_channels(room_id).await?;
    Ok(Json(channels.into_iter().map(ChannelResponse::from).collect()))
}

/// Create a channel (quota-guarded)
pub async fn create_channel(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    ValidatedJson(body): ValidatedJson<CreateChannelRequest>,
) -> Result<(StatusCode, Json<ChannelResponse>), AppError> {
    let room_id = parse_id(&room_id, "room")?;
    let channel_type = match body.channel_type.as_deref() {
        None => ChannelType::default(),
        Some(raw) => ChannelType::parse(raw)
            .ok_or_else(|| AppError::Validation(format!("type: unknown channel type '{}'", raw)))?,
    };

    let channel = state
        .write_guard
        .create_channel(room_id, &body.name, channel_type)
        .await?;
    Ok((StatusCode::CREATED, Json(ChannelResponse::from(channel))))
}

/// Add a member (quota-guarded, idempotent)
pub async fn add_member(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(body): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<MemberResponse>), AppError> {
    let room_id = parse_id(&room_id, "room")?;
    let member = state.write_guard.add_member(room_id, body.user_id).await?;
    Ok((StatusCode::CREATED, Json(MemberResponse::from(member))))
}

/// Upload a room file (multipart, quota-guarded)
pub async fn upload_file(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<FileResponse>), AppError> {
    let room_id = parse_id(&room_id, "room")?;
    let upload = UploadForm::read(multipart).await?.require_file()?;
    let file = state.write_guard.upload_file(room_id, upload).await?;
    Ok((StatusCode::CREATED, Json(FileResponse::from(file))))
}

/// Get file metadata
pub async fn get_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<FileResponse>, AppError> {
    let file_id = parse_id(&file_id, "file")?;
    let file = state.rooms.get_file(file_id).await?;
    Ok(Json(FileResponse::from(file)))
}

/// Delete a file and purge its blob
pub async fn delete_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<DeletionResponse>, AppError> {
    let file_id = parse_id(&file_id, "file")?;
    let outcome = state.rooms.delete_file(file_id).await?;
    Ok(Json(DeletionResponse::new(file_id, outcome)))
}
