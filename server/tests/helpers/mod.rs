//! Reusable test helpers for integration tests.
//!
//! Provides in-memory stores, recording fakes for the external collaborators
//! (identity resolver, allow-list, remote console) and a [`TestBot`] wrapping
//! the full axum event router.
//!
//! ## Test Servers
//!
//! Use [`spawn_test_server()`] to stand up a real HTTP server on a random
//! port, e.g. as a fake identity service for the HTTP resolver.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use uuid::Uuid;
use wl_bridge::binding::{AccountLinker, AllowListEffects, BindError, BindResult, BindingService};
use wl_bridge::bot::{self, Bot, CustomCommands};
use wl_bridge::config::Config;
use wl_bridge::console::{ChannelError, Console};
use wl_bridge::db::Store;
use wl_bridge::permissions::PermissionService;
use wl_bridge::resolver::{GameProfile, IdentityResolver, ResolveError};
use wl_bridge::whitelist::{ConsoleWhitelist, WhitelistChannel};

/// Timeout used by services under test.
pub const TEST_TIMEOUT: Duration = Duration::from_millis(500);

/// Open a fresh, migrated in-memory store.
pub async fn memory_store() -> Store {
    Store::open_in_memory()
        .await
        .expect("Failed to open in-memory store")
}

/// A migrated database file under the system temp dir, removed on drop.
pub struct FileStore {
    pub store: Store,
    path: PathBuf,
}

impl FileStore {
    pub async fn open() -> Self {
        let path = std::env::temp_dir().join(format!("wl-bridge-test-{}.db", Uuid::new_v4()));
        let store = Store::open(&format!("sqlite://{}?mode=rwc", path.display()))
            .await
            .expect("Failed to open file store");
        Self { store, path }
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", self.path.display()));
        }
    }
}

// ============================================================================
// Binding side effects
// ============================================================================

/// One side effect as seen by [`RecordingEffects`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Revoke(Uuid),
    Admit(Uuid),
}

/// Records every side effect in call order; can be told to fail or stall.
#[derive(Default)]
pub struct RecordingEffects {
    calls: Mutex<Vec<Effect>>,
    fail_revoke: bool,
    fail_admit: bool,
    fail_admit_of: Option<Uuid>,
    stall: Option<Duration>,
}

impl RecordingEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_revoke() -> Self {
        Self {
            fail_revoke: true,
            ..Self::default()
        }
    }

    pub fn failing_admit() -> Self {
        Self {
            fail_admit: true,
            ..Self::default()
        }
    }

    /// Only admitting `game_uuid` fails; every other effect succeeds.
    pub fn failing_admit_of(game_uuid: Uuid) -> Self {
        Self {
            fail_admit_of: Some(game_uuid),
            ..Self::default()
        }
    }

    /// Every effect sleeps for `delay` before succeeding.
    pub fn stalling(delay: Duration) -> Self {
        Self {
            stall: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Effect> {
        self.calls.lock().unwrap().clone()
    }

    async fn record(&self, effect: Effect, fail: bool) -> BindResult<()> {
        self.calls.lock().unwrap().push(effect);

        if let Some(delay) = self.stall {
            tokio::time::sleep(delay).await;
        }
        if fail {
            let game_uuid = match effect {
                Effect::Revoke(id) | Effect::Admit(id) => id,
            };
            return Err(BindError::Channel {
                name: game_uuid.to_string(),
                source: ChannelError::Command {
                    command: format!("{effect:?}"),
                    reason: "refused by test".into(),
                },
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AllowListEffects for RecordingEffects {
    async fn revoke(&self, game_uuid: Uuid) -> BindResult<()> {
        self.record(Effect::Revoke(game_uuid), self.fail_revoke).await
    }

    async fn admit(&self, game_uuid: Uuid) -> BindResult<()> {
        let fail = self.fail_admit || self.fail_admit_of == Some(game_uuid);
        self.record(Effect::Admit(game_uuid), fail).await
    }
}

// ============================================================================
// Identity resolver
// ============================================================================

/// In-memory identity directory. Name lookups are case-insensitive.
#[derive(Default)]
pub struct FakeResolver {
    profiles: Mutex<HashMap<String, GameProfile>>,
    by_name_calls: Mutex<Vec<String>>,
    stall: Option<Duration>,
}

impl FakeResolver {
    pub fn with_players(names: &[&str]) -> Self {
        let resolver = Self::default();
        for name in names {
            resolver.add(name);
        }
        resolver
    }

    /// Every lookup sleeps for `delay` first.
    pub fn stalling(mut self, delay: Duration) -> Self {
        self.stall = Some(delay);
        self
    }

    /// Register a player with a fresh UUID and return its profile.
    pub fn add(&self, name: &str) -> GameProfile {
        let profile = GameProfile {
            name: name.to_string(),
            id: Uuid::new_v4(),
        };
        self.profiles
            .lock()
            .unwrap()
            .insert(name.to_lowercase(), profile.clone());
        profile
    }

    pub fn profile(&self, name: &str) -> GameProfile {
        self.profiles.lock().unwrap()[&name.to_lowercase()].clone()
    }

    pub fn by_name_calls(&self) -> Vec<String> {
        self.by_name_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityResolver for FakeResolver {
    async fn resolve_by_name(&self, name: &str) -> Result<GameProfile, ResolveError> {
        self.by_name_calls.lock().unwrap().push(name.to_string());
        if let Some(delay) = self.stall {
            tokio::time::sleep(delay).await;
        }
        self.profiles
            .lock()
            .unwrap()
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(name.to_string()))
    }

    async fn resolve_by_uuid(&self, id: Uuid) -> Result<String, ResolveError> {
        if let Some(delay) = self.stall {
            tokio::time::sleep(delay).await;
        }
        self.profiles
            .lock()
            .unwrap()
            .values()
            .find(|profile| profile.id == id)
            .map(|profile| profile.name.clone())
            .ok_or_else(|| ResolveError::NotFound(id.to_string()))
    }
}

// ============================================================================
// Allow-list and console
// ============================================================================

/// Records allow-list operations as `"add <name>"` / `"remove <name>"`.
#[derive(Default)]
pub struct RecordingWhitelist {
    ops: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingWhitelist {
    /// Make the given operation (e.g. `"add Alex"`) fail from now on.
    pub fn fail_on(&self, op: &str) {
        self.failing.lock().unwrap().insert(op.to_string());
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    fn apply(&self, op: String) -> Result<(), ChannelError> {
        self.ops.lock().unwrap().push(op.clone());
        if self.failing.lock().unwrap().contains(&op) {
            return Err(ChannelError::Command {
                command: op,
                reason: "refused by test".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl WhitelistChannel for RecordingWhitelist {
    async fn add(&self, name: &str) -> Result<(), ChannelError> {
        self.apply(format!("add {name}"))
    }

    async fn remove(&self, name: &str) -> Result<(), ChannelError> {
        self.apply(format!("remove {name}"))
    }
}

/// Remote console that records commands and answers with a fixed text.
#[derive(Default)]
pub struct RecordingConsole {
    commands: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingConsole {
    pub fn fail_on(&self, command: &str) {
        self.failing.lock().unwrap().insert(command.to_string());
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl Console for RecordingConsole {
    async fn execute(&self, command: &str) -> Result<String, ChannelError> {
        self.commands.lock().unwrap().push(command.to_string());
        if self.failing.lock().unwrap().contains(command) {
            return Err(ChannelError::Command {
                command: command.to_string(),
                reason: "refused by test".into(),
            });
        }
        Ok(format!("executed: {command}"))
    }
}

// ============================================================================
// Services
// ============================================================================

/// Account linker over fakes.
pub struct TestLinker {
    pub linker: AccountLinker,
    pub store: Store,
    pub resolver: Arc<FakeResolver>,
    pub whitelist: Arc<RecordingWhitelist>,
}

pub async fn test_linker(resolver: FakeResolver) -> TestLinker {
    let store = memory_store().await;
    let resolver = Arc::new(resolver);
    let whitelist = Arc::new(RecordingWhitelist::default());
    let bindings = Arc::new(BindingService::new(store.clone(), TEST_TIMEOUT));
    let linker = AccountLinker::new(bindings, resolver.clone(), whitelist.clone());

    TestLinker {
        linker,
        store,
        resolver,
        whitelist,
    }
}

// ============================================================================
// Test Bot
// ============================================================================

/// The full event router over an in-memory store and recording fakes.
pub struct TestBot {
    pub router: Router,
    pub store: Store,
    pub permissions: PermissionService,
    pub resolver: Arc<FakeResolver>,
    pub console: Arc<RecordingConsole>,
    pub config: Arc<Config>,
}

impl TestBot {
    pub async fn new(resolver: FakeResolver, custom: CustomCommands) -> Self {
        let config = Arc::new(Config::default_for_test());
        let store = memory_store().await;
        let resolver = Arc::new(resolver);
        let console = Arc::new(RecordingConsole::default());

        let bindings = Arc::new(BindingService::new(store.clone(), TEST_TIMEOUT));
        let linker = AccountLinker::new(
            bindings,
            resolver.clone(),
            Arc::new(ConsoleWhitelist::new(console.clone())),
        );
        let permissions = PermissionService::new(store.clone());

        let bot = Bot::new(
            config.clone(),
            linker,
            permissions.clone(),
            console.clone(),
            custom,
            None,
        );

        Self {
            router: bot::router(Arc::new(bot)),
            store,
            permissions,
            resolver,
            console,
            config,
        }
    }

    /// POST one event to `/events`.
    pub async fn post_event(&self, event: serde_json::Value) -> Response<Body> {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/events")
            .header("content-type", "application/json")
            .body(Body::from(event.to_string()))
            .expect("Failed to build request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// Send a group message and return the quick reply text, if any.
    pub async fn say(&self, group_id: i64, user_id: i64, text: &str) -> Option<String> {
        let response = self.post_event(group_message(group_id, user_id, text)).await;
        if response.status() == 204 {
            return None;
        }
        assert_eq!(response.status(), 200, "unexpected status");
        let body = body_to_json(response).await;
        Some(
            body["reply"]
                .as_str()
                .expect("reply must be a string")
                .to_string(),
        )
    }
}

/// OneBot group message event.
pub fn group_message(group_id: i64, user_id: i64, text: &str) -> serde_json::Value {
    serde_json::json!({
        "time": 1_700_000_000,
        "self_id": 99,
        "post_type": "message",
        "message_type": "group",
        "sub_type": "normal",
        "message_id": 1,
        "group_id": group_id,
        "user_id": user_id,
        "message": text,
        "raw_message": text,
        "font": 0,
    })
}

/// OneBot member-left notice.
pub fn member_left(group_id: i64, user_id: i64) -> serde_json::Value {
    serde_json::json!({
        "time": 1_700_000_000,
        "self_id": 99,
        "post_type": "notice",
        "notice_type": "group_decrease",
        "sub_type": "leave",
        "group_id": group_id,
        "operator_id": user_id,
        "user_id": user_id,
    })
}

/// Collect a response body and parse it as JSON.
pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}

// ============================================================================
// Test Server
// ============================================================================

/// A running test server bound to a random port.
pub struct TestServer {
    /// Server address (127.0.0.1:PORT).
    pub addr: SocketAddr,
    /// Base URL for HTTP requests (e.g., `http://127.0.0.1:12345`).
    pub url: String,
    _handle: JoinHandle<()>,
}

/// Spawn a real HTTP server on a random port.
pub async fn spawn_test_server(router: Router) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local addr");
    let url = format!("http://{addr}");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Test server failed");
    });

    TestServer {
        addr,
        url,
        _handle: handle,
    }
}
