//! # Domain Entities
//!
//! Core domain entities representing the room resources under quota and
//! retention control. All entities map directly to their database tables.
//!
//! ## Entities
//!
//! - **Room**: Unit of quota and retention, owns everything below
//! - **Channel**: A text or call channel inside a room
//! - **Member**: A user's membership in a room
//! - **Message**: A message in a channel (user or webhook authored)
//! - **File / Upload**: Blob metadata and the message-to-file pointer
//! - **Webhook**: External poster bound to a channel
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access operations.
//! These traits are implemented in the infrastructure layer, following the
//! dependency inversion principle.

mod channel;
mod file;
mod member;
mod message;
mod room;
mod webhook;

pub use channel::{Channel, ChannelRepository, ChannelType};
pub use file::{File, FileRepository, FileStatus, FileType, Upload};
pub use member::{Member, MemberRepository};
pub use message::{DeletedMessage, Message, MessageRepository, MAX_CONTENT_LENGTH};
pub use room::{Room, RoomRepository, RoomSettings, RoomSettingsPatch, RoomUsage};
pub use webhook::{Webhook, WebhookRepository};
