
use std::sync::Arc;
use std::time::Duration;

use chessdesk_core::api::BoardApi;
use chessdesk_core::auth::AuthFlow;
use chessdesk_core::clock::ClockDisplay;
use chessdesk_core::config::{AuthConfig, Endpoints};
use chessdesk_core::session::{AppState, SessionController, SessionDeps, SessionEvent};
use chessdesk_core::token_store::{MemoryTokenStore, TokenStore};
use chessdesk_types::Color;
use fixtures::{GAME_START, SNAPSHOT, backoff, ndjson_response, stream_client};
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(5);

fn deps(server: &MockServer, tokens: Arc<dyn TokenStore>) -> SessionDeps {
    let endpoints = Endpoints::new(&server.uri());
    SessionDeps {
        streams: stream_client(&server.uri(), Arc::clone(&tokens), backoff(60_000, 60_000)),
        api: BoardApi::new(reqwest::Client::new(), endpoints.clone(), Arc::clone(&tokens)),
        auth: Arc::new(AuthFlow::new(
            reqwest::Client::new(),
            endpoints,
            AuthConfig::default(),
            Arc::clone(&tokens),
            Arc::new(|_: &str| {}),
        )),
        tokens,
    }
}

async fn next_matching(
    rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
    mut predicate: impl FnMut(&SessionEvent) -> bool,
) -> SessionEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            let event = rx.recv().await.expect("session stopped");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for session event")
}

async fn mount_account(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "alice",
            "username": "Alice"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn game_start_opens_game_stream_and_enters_game_on_snapshot() {
    let server = MockServer::start().await;
    mount_account(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/stream/event"))
        .respond_with(ndjson_response(&[GAME_START]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/board/game/stream/abcd1234"))
        .respond_with(ndjson_response(&[SNAPSHOT]))
        .expect(1)
        .mount(&server)
        .await;

    let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::with_token(fixtures::TOKEN));
    let (controller, handle, mut events) = SessionController::new(deps(&server, tokens));
    let session = tokio::spawn(controller.run());

    assert_eq!(
        events.recv().await,
        Some(SessionEvent::StateChanged(AppState::Home))
    );

    next_matching(&mut events, |e| *e == SessionEvent::StateChanged(AppState::Game)).await;
    let started = next_matching(&mut events, |e| matches!(e, SessionEvent::GameStarted { .. })).await;
    let SessionEvent::GameStarted { snapshot, color } = started else {
        unreachable!();
    };
    assert_eq!(snapshot.id, "abcd1234");
    assert_eq!(snapshot.white.name.as_deref(), Some("Alice"));
    assert_eq!(color, Some(Color::White));

    let clock = next_matching(&mut events, |e| matches!(e, SessionEvent::Clock(_))).await;
    assert_eq!(
        clock,
        SessionEvent::Clock(ClockDisplay {
            player: "00:10:00".to_string(),
            opponent: "00:10:00".to_string(),
        })
    );

    handle.dispose();
    handle.dispose();
    tokio::time::timeout(WAIT, session).await.unwrap().unwrap();
}

#[tokio::test]
async fn profile_is_loaded_on_entering_home() {
    let server = MockServer::start().await;
    mount_account(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/stream/event"))
        .respond_with(ndjson_response(&[]))
        .mount(&server)
        .await;

    let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::with_token(fixtures::TOKEN));
    let (controller, handle, mut events) = SessionController::new(deps(&server, tokens));
    let session = tokio::spawn(controller.run());

    let loaded =
        next_matching(&mut events, |e| matches!(e, SessionEvent::ProfileLoaded { .. })).await;
    assert_eq!(
        loaded,
        SessionEvent::ProfileLoaded {
            username: "Alice".to_string()
        }
    );

    handle.dispose();
    tokio::time::timeout(WAIT, session).await.unwrap().unwrap();
}

#[tokio::test]
async fn without_token_starts_in_authorization_and_opens_no_streams() {
    let server = MockServer::start().await;
    let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::default());
    let (controller, handle, mut events) = SessionController::new(deps(&server, tokens));
    let session = tokio::spawn(controller.run());

    assert_eq!(
        events.recv().await,
        Some(SessionEvent::StateChanged(AppState::Authorization))
    );

    handle.make_move("e2e4");
    let result = next_matching(&mut events, |e| matches!(e, SessionEvent::ActionResult { .. })).await;
    assert!(matches!(result, SessionEvent::ActionResult { ok: false, .. }));

    handle.dispose();
    tokio::time::timeout(WAIT, session).await.unwrap().unwrap();
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn logout_clears_token_and_returns_to_authorization() {
    let server = MockServer::start().await;
    mount_account(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/stream/event"))
        .respond_with(ndjson_response(&[]))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token(fixtures::TOKEN));
    let (controller, handle, mut events) =
        SessionController::new(deps(&server, Arc::clone(&store) as Arc<dyn TokenStore>));
    let session = tokio::spawn(controller.run());

    next_matching(&mut events, |e| *e == SessionEvent::StateChanged(AppState::Home)).await;
    handle.logout();
    next_matching(&mut events, |e| {
        *e == SessionEvent::StateChanged(AppState::Authorization)
    })
    .await;
    assert!(!store.has_token());

    handle.dispose();
    tokio::time::timeout(WAIT, session).await.unwrap().unwrap();
}
