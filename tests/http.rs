use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct Stats {
    count: usize,
    median_interval: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Tile {
    #[serde(rename = "type")]
    kind: String,
    active: bool,
    status_text: String,
    stats: BTreeMap<String, Stats>,
}

#[derive(Debug, Deserialize)]
struct Tiles {
    child_name: Option<String>,
    tiles: Vec<Tile>,
}

#[derive(Debug, Deserialize)]
struct Message {
    sender: String,
    message: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Grid {
    columns: usize,
    rows: usize,
    cell_width: f64,
}

#[derive(Debug, Deserialize)]
struct Access {
    writer: bool,
    owner: bool,
    requests: Vec<String>,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl TestServer {
    fn room_url(&self, room: Uuid, path: &str) -> String {
        format!("{}/api/baby/{room}{path}", self.base_url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_data_dir() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("baby_stats_http_{}_{}", std::process::id(), nanos));
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/manifest.json")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_baby_stats"))
        .env("PORT", port.to_string())
        .env("APP_DATA_DIR", unique_data_dir())
        .env("BABY_STATS_CONFIRM_TICKS", "1")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn messages(client: &Client, server: &TestServer, room: Uuid) -> Vec<Message> {
    client
        .get(server.room_url(room, "/messages"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn http_root_redirects_to_a_fresh_room() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    for path in ["/", "/baby/not-a-uuid"] {
        let response = client
            .get(format!("{}{path}", server.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()["location"].to_str().unwrap().to_string();
        let id = location.strip_prefix("/baby/").expect("room path");
        assert!(Uuid::try_parse(id).is_ok());
    }

    let room = Uuid::new_v4();
    let page = client
        .get(format!("{}/baby/{room}", server.base_url))
        .send()
        .await
        .unwrap();
    assert!(page.status().is_success());
    assert!(page.text().await.unwrap().contains(&room.to_string()));
}

#[tokio::test]
async fn http_record_expands_implications() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let room = Uuid::new_v4();

    let response = client
        .post(server.room_url(room, "/record"))
        .json(&json!({ "type": "diaper_urine", "sender": "Alice" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let log = messages(&client, &server, room).await;
    let kinds: Vec<&str> = log.iter().filter_map(|m| m.message["type"].as_str()).collect();
    assert_eq!(kinds, vec!["awake", "diaper_urine"]);
    assert!(log.iter().all(|m| m.sender == "Alice" && m.message["sender_name"] == "Alice"));

    let tiles: Tiles = client
        .get(server.room_url(room, "/tiles"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let awake = tiles.tiles.iter().find(|tile| tile.kind == "awake").unwrap();
    assert!(awake.active);
    assert_eq!(awake.status_text, "just now");
    assert_eq!(awake.stats["24h"].count, 1);
    assert_eq!(awake.stats["24h"].median_interval, None);
    let asleep = tiles.tiles.iter().find(|tile| tile.kind == "asleep").unwrap();
    assert!(!asleep.active);
    assert_eq!(asleep.status_text, "never");
}

#[tokio::test]
async fn http_unknown_type_is_rejected_without_side_effects() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let room = Uuid::new_v4();

    let response = client
        .post(server.room_url(room, "/record"))
        .json(&json!({ "type": "foo", "sender": "Alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(messages(&client, &server, room).await.is_empty());
}

#[tokio::test]
async fn http_writers_need_an_owner_grant() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let room = Uuid::new_v4();

    let response = client
        .post(server.room_url(room, "/child_name"))
        .json(&json!({ "child_name": "Ada", "sender": "Alice" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let denied = client
        .post(server.room_url(room, "/record"))
        .json(&json!({ "type": "asleep", "sender": "Bob" }))
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let requested: Access = client
        .post(server.room_url(room, "/access/request"))
        .json(&json!({ "sender": "Bob" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!requested.writer);

    let owner: Access = client
        .get(server.room_url(room, "/access?sender=Alice"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(owner.owner);
    assert_eq!(owner.requests, vec!["Bob".to_string()]);

    let granted = client
        .post(server.room_url(room, "/access/grant"))
        .json(&json!({ "sender": "Alice", "target": "Bob" }))
        .send()
        .await
        .unwrap();
    assert!(granted.status().is_success());

    let allowed = client
        .post(server.room_url(room, "/record"))
        .json(&json!({ "type": "asleep", "sender": "Bob" }))
        .send()
        .await
        .unwrap();
    assert!(allowed.status().is_success());

    let tiles: Tiles = client
        .get(server.room_url(room, "/tiles"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tiles.child_name.as_deref(), Some("Ada"));
    assert!(tiles.tiles.iter().any(|tile| tile.kind == "asleep" && tile.active));
}

#[tokio::test]
async fn http_grid_fits_every_tile() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let room = Uuid::new_v4();

    let grid: Grid = client
        .get(server.room_url(room, "/grid?width=900&height=900"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!((grid.columns, grid.rows), (3, 3));
    assert_eq!(grid.cell_width, 300.0);

    let invalid = client
        .get(server.room_url(room, "/grid?width=0&height=900"))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_armed_press_commits_after_countdown() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let room = Uuid::new_v4();

    let response = client
        .post(server.room_url(room, "/arm"))
        .json(&json!({ "type": "feeding_formula", "sender": "Alice" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert!(messages(&client, &server, room).await.is_empty());

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let log = messages(&client, &server, room).await;
        if !log.is_empty() {
            let kinds: Vec<&str> = log.iter().filter_map(|m| m.message["type"].as_str()).collect();
            assert_eq!(kinds, vec!["awake", "feeding_formula"]);
            break;
        }
        if Instant::now() > deadline {
            panic!("countdown never committed");
        }
        sleep(Duration::from_millis(100)).await;
    }
}
