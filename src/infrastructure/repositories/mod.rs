//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits, and the
//! [`Repositories`] bundle services are built from.
//!
//! ## Available Repositories
//!
//! - **RoomRepository** - Rooms, settings and derived usage
//! - **ChannelRepository** - Channels within a room
//! - **MemberRepository** - Room membership
//! - **MessageRepository** - Messages with their optional upload
//! - **FileRepository** - File metadata with pending reservations
//! - **WebhookRepository** - Webhooks posting into channels
//! - **RetentionStore** - Paging and batch deletes for the sweeper
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! let repos = Repositories::postgres(pool.clone());
//! let room = repos.rooms.find_by_id(room_id).await?;
//! ```

pub mod channel_repository;
pub mod file_repository;
pub mod member_repository;
pub mod message_repository;
pub mod retention_repository;
pub mod room_repository;
pub mod webhook_repository;

use std::sync::Arc;

use sqlx::PgPool;

pub use channel_repository::PgChannelRepository;
pub use file_repository::PgFileRepository;
pub use member_repository::PgMemberRepository;
pub use message_repository::PgMessageRepository;
pub use retention_repository::PgRetentionStore;
pub use room_repository::PgRoomRepository;
pub use webhook_repository::PgWebhookRepository;

use crate::domain::{
    ChannelRepository, FileRepository, MemberRepository, MessageRepository, RetentionStore,
    RoomRepository, WebhookRepository,
};
use crate::infrastructure::memory::InMemoryStore;

/// Every metadata store seam, behind trait objects.
#[derive(Clone)]
pub struct Repositories {
    pub rooms: Arc<dyn RoomRepository>,
    pub channels: Arc<dyn ChannelRepository>,
    pub members: Arc<dyn MemberRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub files: Arc<dyn FileRepository>,
    pub webhooks: Arc<dyn WebhookRepository>,
    pub retention: Arc<dyn RetentionStore>,
}

impl Repositories {
    /// Repositories backed by PostgreSQL.
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            rooms: Arc::new(PgRoomRepository::new(pool.clone())),
            channels: Arc::new(PgChannelRepository::new(pool.clone())),
            members: Arc::new(PgMemberRepository::new(pool.clone())),
            messages: Arc::new(PgMessageRepository::new(pool.clone())),
            files: Arc::new(PgFileRepository::new(pool.clone())),
            webhooks: Arc::new(PgWebhookRepository::new(pool.clone())),
            retention: Arc::new(PgRetentionStore::new(pool)),
        }
    }

    /// Repositories sharing one in-memory store.
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            rooms: store.clone(),
            channels: store.clone(),
            members: store.clone(),
            messages: store.clone(),
            files: store.clone(),
            webhooks: store.clone(),
            retention: store,
        }
    }
}
