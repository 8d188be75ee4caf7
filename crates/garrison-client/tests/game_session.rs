//! End-to-end tests for the master → game server hand-off and the
//! independence of the two sessions.

mod common;

use std::time::Duration;

use common::{FakeServer, ServerScript, client_with_server, server_entry};
use garrison_client::{ClientError, MasterClient, SessionConfig};
use garrison_transport::MemoryConnector;

fn master_config() -> SessionConfig {
    SessionConfig::new("master.test", 4063)
}

fn game_config() -> SessionConfig {
    SessionConfig::new("game.test", 5500)
}

#[tokio::test]
async fn test_open_game_session_requires_a_connected_master() {
    let client =
        MasterClient::with_connector(master_config(), MemoryConnector::new());

    let result = client.open_game_session(game_config(), "join-key-1").await;
    assert!(matches!(result, Err(ClientError::Precondition(_))));
}

#[tokio::test]
async fn test_request_join_returns_the_key() {
    let (client, _connector, _server) =
        client_with_server(master_config(), ServerScript::default()).await;
    client.connect().await.unwrap();

    let key = client
        .request_join(&server_entry("game.test", 5500))
        .await
        .expect("the master should issue a key");
    assert_eq!(key, "join-key-1");
}

#[tokio::test]
async fn test_open_game_session_probes_then_presents_the_key() {
    let (client, connector, _master) =
        client_with_server(master_config(), ServerScript::default()).await;
    client.connect().await.unwrap();

    let (game_half, game_server) = FakeServer::start(ServerScript::default());
    connector.seed(game_half).await;

    let game = client
        .open_game_session(game_config(), "join-key-1")
        .await
        .expect("join should succeed");
    assert!(game.connected());
    assert_eq!(
        game_server.call_names().await,
        vec!["Ping".to_string(), "JoinGame".to_string()]
    );
}

#[tokio::test]
async fn test_rejected_join_key_tears_the_game_session_down() {
    let (client, connector, _master) =
        client_with_server(master_config(), ServerScript::default()).await;
    client.connect().await.unwrap();

    let script = ServerScript {
        reject_join: true,
        ..ServerScript::default()
    };
    let (game_half, game_server) = FakeServer::start(script);
    connector.seed(game_half).await;

    let result = client.open_game_session(game_config(), "stale-key").await;
    assert!(matches!(result, Err(ClientError::Validation(_))));
    // The half-open session said goodbye on its way out.
    game_server.settle().await;
    assert_eq!(game_server.count("Disconnect").await, 1);
    // The master session is untouched.
    assert!(client.connected());
}

#[tokio::test]
async fn test_join_game_server_combines_key_request_and_join() {
    let (client, connector, master) =
        client_with_server(master_config(), ServerScript::default()).await;
    client.connect().await.unwrap();

    let (game_half, game_server) = FakeServer::start(ServerScript::default());
    connector.seed(game_half).await;

    let game = client
        .join_game_server(&server_entry("game.test", 5500))
        .await
        .expect("join should succeed");
    assert!(game.connected());
    assert_eq!(master.count("RequestJoin").await, 1);
    assert_eq!(game_server.count("JoinGame").await, 1);
}

#[tokio::test]
async fn test_sessions_tear_down_independently() {
    let (client, connector, _master) =
        client_with_server(master_config(), ServerScript::default()).await;
    client.connect().await.unwrap();

    let (game_half, _game_server) = FakeServer::start(ServerScript::default());
    connector.seed(game_half).await;
    let game = client
        .open_game_session(game_config(), "join-key-1")
        .await
        .unwrap();

    // Closing the master session leaves the game session standing.
    client.disconnect().await;
    assert!(!client.connected());
    assert!(game.connected());

    // And vice versa on a fresh pair.
    game.disconnect().await;
    assert!(!game.connected());
}

#[tokio::test(start_paused = true)]
async fn test_game_session_runs_its_own_keep_alive() {
    let (client, connector, master) =
        client_with_server(master_config(), ServerScript::default()).await;
    client.connect().await.unwrap();

    let (game_half, game_server) = FakeServer::start(ServerScript::default());
    connector.seed(game_half).await;
    let game = client
        .open_game_session(game_config(), "join-key-1")
        .await
        .unwrap();
    assert!(game.connected());

    // The game session heartbeats without any login of its own; the
    // master session, never logged in here, stays silent.
    tokio::time::sleep(Duration::from_secs(40)).await;
    assert!(game_server.count("KeepAlive").await >= 2);
    assert_eq!(master.count("KeepAlive").await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_game_latency_prober_reports_after_a_burst() {
    let (client, connector, _master) =
        client_with_server(master_config(), ServerScript::default()).await;
    client.connect().await.unwrap();

    let (game_half, _game_server) = FakeServer::start(ServerScript::default());
    connector.seed(game_half).await;
    let game = client
        .open_game_session(game_config(), "join-key-1")
        .await
        .unwrap();

    // Six samples a second apart make up the first burst.
    tokio::time::sleep(Duration::from_secs(8)).await;
    assert!(game.average_latency().await.is_some());
    let formatted = game.formatted_average_latency().await;
    assert!(formatted.ends_with(" ms"), "got {formatted:?}");
}
