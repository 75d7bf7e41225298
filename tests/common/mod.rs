//! Common Test Utilities
//!
//! Builds the full application state over the in-memory metadata and blob
//! stores, with a pinned clock and a pacer that never sleeps.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tokio::sync::watch;
use tower::ServiceExt;

use roomkeeper::application::services::FileUpload;
use roomkeeper::config::{
    CorsSettings, DatabaseSettings, RedisSettings, RetentionSettings, RoomDefaults, ServerSettings,
    Settings, SnowflakeSettings, StorageSettings, TelemetrySettings,
};
use roomkeeper::domain::{ChannelType, Room, RoomSettingsPatch};
use roomkeeper::infrastructure::memory::InMemoryStore;
use roomkeeper::infrastructure::repositories::Repositories;
use roomkeeper::infrastructure::storage::InMemoryBlobStore;
use roomkeeper::presentation::http::create_router;
use roomkeeper::shared::clock::{FixedClock, RecordingPacer};
use roomkeeper::startup::{AppState, Stores};

/// 2026-01-01T00:00:00Z, the instant every test starts at.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

pub fn test_settings(retention: RetentionSettings) -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseSettings {
            url: "postgres://unused".into(),
            max_connections: 1,
            min_connections: 0,
            acquire_timeout: 1,
        },
        redis: RedisSettings {
            enabled: false,
            url: "redis://unused".into(),
        },
        storage: StorageSettings {
            root: "unused".into(),
            timeout_ms: 1_000,
        },
        snowflake: SnowflakeSettings { machine_id: 7 },
        cors: CorsSettings {
            allowed_origins: vec!["http://localhost:3000".into()],
        },
        telemetry: TelemetrySettings { json: false },
        room_defaults: RoomDefaults::default(),
        retention,
        environment: "test".into(),
    }
}

/// Retention settings with small batches and a short delay.
pub fn test_retention(room_batch: i64) -> RetentionSettings {
    RetentionSettings {
        room_batch,
        resource_batch: 2,
        batch_delay_ms: 25,
        store_timeout_ms: 1_000,
        max_attempts: 3,
        blob_concurrency: 2,
        ..RetentionSettings::default()
    }
}

/// Application state plus handles on everything behind it.
pub struct TestContext {
    pub store: Arc<InMemoryStore>,
    pub blobs: Arc<InMemoryBlobStore>,
    pub clock: Arc<FixedClock>,
    pub pacer: Arc<RecordingPacer>,
    pub shutdown: watch::Sender<bool>,
    pub state: AppState,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_retention(test_retention(10))
    }

    pub fn with_retention(retention: RetentionSettings) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let blobs = Arc::new(InMemoryBlobStore::new());
        let clock = Arc::new(FixedClock::new(epoch()));
        let pacer = Arc::new(RecordingPacer::new());
        let (shutdown, shutdown_rx) = watch::channel(false);

        let stores = Stores {
            repos: Repositories::in_memory(store.clone()),
            blobs: blobs.clone(),
            clock: clock.clone(),
            pacer: pacer.clone(),
            db: None,
            redis: None,
        };
        let state = AppState::assemble(test_settings(retention), stores, shutdown_rx);

        Self {
            store,
            blobs,
            clock,
            pacer,
            shutdown,
            state,
        }
    }

    pub fn app(&self) -> TestApp {
        TestApp {
            router: create_router(self.state.clone()),
        }
    }

    /// Create a room with the given limits through the room service.
    pub async fn room(&self, patch: RoomSettingsPatch) -> Room {
        self.state.rooms.create_room("test-room", &patch).await.unwrap()
    }

    /// Create a text channel through the write guard.
    pub async fn channel(&self, room_id: i64, name: &str) -> i64 {
        self.state
            .write_guard
            .create_channel(room_id, name, ChannelType::Text)
            .await
            .unwrap()
            .id
    }
}

/// Limits small enough to hit in a test.
pub fn limits(total: i64, single: i64, channels: i64, users: i64) -> RoomSettingsPatch {
    RoomSettingsPatch {
        total_bytes_allowed: Some(total),
        single_file_bytes_allowed: Some(single),
        max_channels: Some(channels),
        max_users: Some(users),
        ..RoomSettingsPatch::default()
    }
}

pub fn upload(name: &str, len: usize) -> FileUpload {
    FileUpload {
        name: name.into(),
        content_type: "application/octet-stream".into(),
        bytes: Bytes::from(vec![1u8; len]),
    }
}

/// Router driven in-process with `oneshot`.
pub struct TestApp {
    pub router: Router,
}

impl TestApp {
    pub async fn request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn send_json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send_json("POST", uri, body).await
    }

    /// POST a multipart form with one file part and optional text parts.
    pub async fn post_multipart(
        &self,
        uri: &str,
        file_name: &str,
        bytes: &[u8],
        fields: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        const BOUNDARY: &str = "roomkeeper-test-boundary";
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }
}
