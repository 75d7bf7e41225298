//! In-memory metadata store.
//!
//! Implements every repository trait and [`RetentionStore`] over one set of
//! tables behind a single lock, so each call is atomic the way a Postgres
//! transaction is. Used by the test suites and when the server runs without
//! a database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::domain::{
    Channel, ChannelRepository, DeletedBatch, DeletedMessage, ExpiredResource, File,
    FileRepository, FileStatus, Member, MemberRepository, Message, MessageRepository,
    ResourceClass, RetentionStore, Room, RoomRepository, RoomSettings, Upload, Webhook,
    WebhookRepository,
};
use crate::shared::error::AppError;

#[derive(Debug, Default)]
struct Tables {
    rooms: HashMap<i64, Room>,
    members: HashMap<(i64, i64), Member>,
    channels: HashMap<i64, Channel>,
    webhooks: HashMap<i64, Webhook>,
    files: HashMap<i64, File>,
    messages: HashMap<i64, Message>,
    uploads: HashMap<i64, Upload>,
}

impl Tables {
    fn channel_room(&self, channel_id: i64) -> Option<i64> {
        self.channels.get(&channel_id).map(|c| c.room_id)
    }

    /// Remove uploads of `message_id` and the files nothing else points at.
    fn remove_message_tree(&mut self, message_id: i64) -> Option<DeletedMessage> {
        let file_ids: Vec<i64> = self
            .uploads
            .values()
            .filter(|u| u.message_id == message_id)
            .map(|u| u.file_id)
            .collect();
        self.uploads.retain(|_, u| u.message_id != message_id);

        let mut blob_keys = Vec::new();
        for file_id in file_ids {
            if self.uploads.values().any(|u| u.file_id == file_id) {
                continue;
            }
            if let Some(file) = self.files.remove(&file_id) {
                blob_keys.push(file.key);
            }
        }

        self.messages
            .remove(&message_id)
            .map(|message| DeletedMessage { message, blob_keys })
    }

    fn remove_file_tree(&mut self, file_id: i64) -> Option<File> {
        self.uploads.retain(|_, u| u.file_id != file_id);
        self.files.remove(&file_id)
    }
}

/// Injected failures for exercising error paths.
#[derive(Debug, Default)]
struct Faults {
    /// Retention calls that fail with a transient error before succeeding
    retention_failures: u32,
    fail_message_create: bool,
    fail_file_activate: bool,
}

/// Metadata store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` retention store calls fail transiently.
    pub fn fail_next_retention_calls(&self, count: u32) {
        self.faults.lock().retention_failures = count;
    }

    pub fn fail_message_create(&self, fail: bool) {
        self.faults.lock().fail_message_create = fail;
    }

    pub fn fail_file_activate(&self, fail: bool) {
        self.faults.lock().fail_file_activate = fail;
    }

    fn retention_fault(&self) -> Result<(), AppError> {
        let mut faults = self.faults.lock();
        if faults.retention_failures > 0 {
            faults.retention_failures -= 1;
            return Err(AppError::Transient("injected store failure".into()));
        }
        Ok(())
    }

    /// Insert or replace a room row directly.
    pub fn insert_room(&self, room: Room) {
        self.tables.lock().rooms.insert(room.id, room);
    }

    pub fn insert_channel(&self, channel: Channel) {
        self.tables.lock().channels.insert(channel.id, channel);
    }

    pub fn insert_file(&self, file: File) {
        self.tables.lock().files.insert(file.id, file);
    }

    pub fn insert_message(&self, message: Message, upload: Option<Upload>) {
        let mut tables = self.tables.lock();
        if let Some(upload) = upload {
            tables.uploads.insert(upload.id, upload);
        }
        tables.messages.insert(message.id, message);
    }

    pub fn set_file_created_at(&self, id: i64, created_at: DateTime<Utc>) {
        if let Some(file) = self.tables.lock().files.get_mut(&id) {
            file.created_at = created_at;
        }
    }

    pub fn set_message_created_at(&self, id: i64, created_at: DateTime<Utc>) {
        if let Some(message) = self.tables.lock().messages.get_mut(&id) {
            message.created_at = created_at;
        }
    }

    pub fn contains_file(&self, id: i64) -> bool {
        self.tables.lock().files.contains_key(&id)
    }

    pub fn contains_message(&self, id: i64) -> bool {
        self.tables.lock().messages.contains_key(&id)
    }

    pub fn upload_count(&self) -> usize {
        self.tables.lock().uploads.len()
    }

    pub fn file_count(&self, room_id: i64) -> usize {
        self.tables
            .lock()
            .files
            .values()
            .filter(|f| f.room_id == room_id)
            .count()
    }

    pub fn message_count(&self, room_id: i64) -> usize {
        let tables = self.tables.lock();
        tables
            .messages
            .values()
            .filter(|m| tables.channel_room(m.channel_id) == Some(room_id))
            .count()
    }

    fn sorted_rooms(tables: &Tables) -> Vec<Room> {
        let mut rooms: Vec<Room> = tables.rooms.values().cloned().collect();
        rooms.sort_by_key(|r| (r.created_at, r.id));
        rooms
    }
}

#[async_trait]
impl RoomRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Room>, AppError> {
        Ok(self.tables.lock().rooms.get(&id).cloned())
    }

    async fn create(&self, room: &Room) -> Result<Room, AppError> {
        let mut tables = self.tables.lock();
        if tables.rooms.contains_key(&room.id) {
            return Err(AppError::Conflict("Room with this ID already exists".into()));
        }
        tables.rooms.insert(room.id, room.clone());
        Ok(room.clone())
    }

    async fn update_settings(&self, id: i64, settings: &RoomSettings) -> Result<Room, AppError> {
        let mut tables = self.tables.lock();
        let room = tables
            .rooms
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Room {} not found", id)))?;
        room.settings = *settings;
        room.updated_at = Utc::now();
        Ok(room.clone())
    }

    async fn delete(&self, id: i64) -> Result<Vec<String>, AppError> {
        let mut tables = self.tables.lock();
        if tables.rooms.remove(&id).is_none() {
            return Err(AppError::NotFound(format!("Room {} not found", id)));
        }

        let channel_ids: Vec<i64> = tables
            .channels
            .values()
            .filter(|c| c.room_id == id)
            .map(|c| c.id)
            .collect();
        let message_ids: Vec<i64> = tables
            .messages
            .values()
            .filter(|m| channel_ids.contains(&m.channel_id))
            .map(|m| m.id)
            .collect();

        tables.uploads.retain(|_, u| !message_ids.contains(&u.message_id));
        tables.messages.retain(|_, m| !channel_ids.contains(&m.channel_id));
        tables.webhooks.retain(|_, w| !channel_ids.contains(&w.channel_id));
        tables.channels.retain(|_, c| c.room_id != id);
        tables.members.retain(|(room_id, _), _| *room_id != id);

        let keys: Vec<String> = tables
            .files
            .values()
            .filter(|f| f.room_id == id)
            .map(|f| f.key.clone())
            .collect();
        tables.files.retain(|_, f| f.room_id != id);

        Ok(keys)
    }

    async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<Room>, AppError> {
        let tables = self.tables.lock();
        Ok(Self::sorted_rooms(&tables)
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn bytes_used(&self, room_id: i64) -> Result<i64, AppError> {
        Ok(self
            .tables
            .lock()
            .files
            .values()
            .filter(|f| f.room_id == room_id)
            .map(|f| f.size_bytes)
            .sum())
    }

    async fn channel_count(&self, room_id: i64) -> Result<i64, AppError> {
        Ok(self
            .tables
            .lock()
            .channels
            .values()
            .filter(|c| c.room_id == room_id)
            .count() as i64)
    }

    async fn member_count(&self, room_id: i64) -> Result<i64, AppError> {
        Ok(self
            .tables
            .lock()
            .members
            .keys()
            .filter(|(r, _)| *r == room_id)
            .count() as i64)
    }
}

#[async_trait]
impl ChannelRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Channel>, AppError> {
        Ok(self.tables.lock().channels.get(&id).cloned())
    }

    async fn find_by_room_id(&self, room_id: i64) -> Result<Vec<Channel>, AppError> {
        let mut channels: Vec<Channel> = self
            .tables
            .lock()
            .channels
            .values()
            .filter(|c| c.room_id == room_id)
            .cloned()
            .collect();
        channels.sort_by_key(|c| (c.created_at, c.id));
        Ok(channels)
    }

    async fn create(&self, channel: &Channel) -> Result<Channel, AppError> {
        let mut tables = self.tables.lock();
        if !tables.rooms.contains_key(&channel.room_id) {
            return Err(AppError::NotFound(format!("Room {} not found", channel.room_id)));
        }
        if tables.channels.contains_key(&channel.id) {
            return Err(AppError::Conflict("Channel with this ID already exists".into()));
        }
        tables.channels.insert(channel.id, channel.clone());
        Ok(channel.clone())
    }
}

#[async_trait]
impl MemberRepository for InMemoryStore {
    async fn find(&self, room_id: i64, user_id: i64) -> Result<Option<Member>, AppError> {
        Ok(self.tables.lock().members.get(&(room_id, user_id)).cloned())
    }

    async fn add(&self, member: &Member) -> Result<Member, AppError> {
        let mut tables = self.tables.lock();
        let key = (member.room_id, member.user_id);
        if tables.members.contains_key(&key) {
            return Err(AppError::Conflict("User is already a member of this room".into()));
        }
        tables.members.insert(key, member.clone());
        Ok(member.clone())
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        Ok(self.tables.lock().messages.get(&id).cloned())
    }

    async fn create(&self, message: &Message, upload: Option<&Upload>) -> Result<Message, AppError> {
        if self.faults.lock().fail_message_create {
            return Err(AppError::Transient("injected message insert failure".into()));
        }
        let mut tables = self.tables.lock();
        if !tables.channels.contains_key(&message.channel_id) {
            return Err(AppError::NotFound(format!(
                "Channel {} not found",
                message.channel_id
            )));
        }
        if let Some(upload) = upload {
            if !tables.files.contains_key(&upload.file_id) {
                return Err(AppError::NotFound(format!("File {} not found", upload.file_id)));
            }
            tables.uploads.insert(upload.id, upload.clone());
        }
        tables.messages.insert(message.id, message.clone());
        Ok(message.clone())
    }

    async fn find_upload(&self, message_id: i64) -> Result<Option<Upload>, AppError> {
        Ok(self
            .tables
            .lock()
            .uploads
            .values()
            .find(|u| u.message_id == message_id)
            .cloned())
    }

    async fn delete(&self, id: i64) -> Result<Option<DeletedMessage>, AppError> {
        Ok(self.tables.lock().remove_message_tree(id))
    }
}

#[async_trait]
impl FileRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<File>, AppError> {
        Ok(self.tables.lock().files.get(&id).cloned())
    }

    async fn reserve(&self, file: &File) -> Result<File, AppError> {
        let mut tables = self.tables.lock();
        if tables.files.contains_key(&file.id) || tables.files.values().any(|f| f.key == file.key) {
            return Err(AppError::Conflict("File with this ID or key already exists".into()));
        }
        let reserved = File {
            status: FileStatus::Pending,
            ..file.clone()
        };
        tables.files.insert(reserved.id, reserved.clone());
        Ok(reserved)
    }

    async fn activate(&self, id: i64) -> Result<File, AppError> {
        if self.faults.lock().fail_file_activate {
            return Err(AppError::Transient("injected activate failure".into()));
        }
        let mut tables = self.tables.lock();
        let file = tables
            .files
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))?;
        file.status = FileStatus::Active;
        Ok(file.clone())
    }

    async fn discard(&self, id: i64) -> Result<(), AppError> {
        let mut tables = self.tables.lock();
        if tables
            .files
            .get(&id)
            .is_some_and(|f| f.status == FileStatus::Pending)
        {
            tables.files.remove(&id);
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<Option<File>, AppError> {
        Ok(self.tables.lock().remove_file_tree(id))
    }
}

#[async_trait]
impl WebhookRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Webhook>, AppError> {
        Ok(self.tables.lock().webhooks.get(&id).cloned())
    }

    async fn create(&self, webhook: &Webhook) -> Result<Webhook, AppError> {
        let mut tables = self.tables.lock();
        if !tables.channels.contains_key(&webhook.channel_id) {
            return Err(AppError::NotFound(format!(
                "Channel {} not found",
                webhook.channel_id
            )));
        }
        tables.webhooks.insert(webhook.id, webhook.clone());
        Ok(webhook.clone())
    }
}

#[async_trait]
impl RetentionStore for InMemoryStore {
    async fn list_rooms(&self, offset: i64, limit: i64) -> Result<Vec<Room>, AppError> {
        self.retention_fault()?;
        RoomRepository::list_page(self, offset, limit).await
    }

    async fn find_expired_page(
        &self,
        room_id: i64,
        class: ResourceClass,
        cutoff: DateTime<Utc>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ExpiredResource>, AppError> {
        self.retention_fault()?;
        let tables = self.tables.lock();

        let mut expired: Vec<ExpiredResource> = match class {
            ResourceClass::Files => tables
                .files
                .values()
                .filter(|f| f.room_id == room_id && f.created_at < cutoff)
                .map(|f| ExpiredResource {
                    id: f.id,
                    room_id,
                    channel_id: None,
                    created_at: f.created_at,
                })
                .collect(),
            ResourceClass::Messages => tables
                .messages
                .values()
                .filter(|m| {
                    m.created_at < cutoff && tables.channel_room(m.channel_id) == Some(room_id)
                })
                .map(|m| ExpiredResource {
                    id: m.id,
                    room_id,
                    channel_id: Some(m.channel_id),
                    created_at: m.created_at,
                })
                .collect(),
        };

        expired.sort_by_key(|r| (r.created_at, r.id));
        Ok(expired
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn delete_expired_batch(
        &self,
        room_id: i64,
        class: ResourceClass,
        resources: &[ExpiredResource],
    ) -> Result<DeletedBatch, AppError> {
        self.retention_fault()?;
        let mut tables = self.tables.lock();
        let mut batch = DeletedBatch::default();

        for resource in resources {
            match class {
                ResourceClass::Messages => {
                    let in_room = tables
                        .messages
                        .get(&resource.id)
                        .and_then(|m| tables.channel_room(m.channel_id))
                        == Some(room_id);
                    if !in_room {
                        continue;
                    }
                    if let Some(deleted) = tables.remove_message_tree(resource.id) {
                        batch.ids.push(resource.id);
                        batch.blob_keys.extend(deleted.blob_keys);
                    }
                }
                ResourceClass::Files => {
                    if tables.files.get(&resource.id).map(|f| f.room_id) != Some(room_id) {
                        continue;
                    }
                    if let Some(file) = tables.remove_file_tree(resource.id) {
                        batch.ids.push(resource.id);
                        batch.blob_keys.push(file.key);
                    }
                }
            }
        }

        Ok(batch)
    }
}
