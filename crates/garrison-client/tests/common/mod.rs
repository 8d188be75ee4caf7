//! Shared test fixtures: a scripted in-process server that speaks the
//! wire protocol over one half of a memory pair, recording every call
//! name it sees.

#![allow(dead_code)]

use std::sync::Arc;

use garrison_client::{MasterClient, SessionConfig};
use garrison_protocol::{
    Call, CallOutcome, Codec, Fault, FaultCode, GameMode, JsonCodec, Reply,
    Request, Response, ServerInfo, TankAttributes, TankColor,
};
use garrison_transport::memory::memory_pair;
use garrison_transport::{Connection, MemoryConnection, MemoryConnector};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// How a fake server behaves, beyond the happy path.
#[derive(Clone, Default)]
pub struct ServerScript {
    /// Answer `GatewayOpen` with success instead of `UnknownCall`.
    pub gateway: bool,
    /// Reject every login with `PermissionDenied`.
    pub deny_login: bool,
    /// Never answer logins at all.
    pub stall_login: bool,
    /// Reject `JoinGame` with `BadInformation`.
    pub reject_join: bool,
    /// Roster returned by `TankList`.
    pub tanks: Vec<TankAttributes>,
    /// Roster returned by `ServerList`.
    pub servers: Vec<ServerInfo>,
}

/// One scripted server answering on one connection.
pub struct FakeServer {
    conn: Arc<MemoryConnection>,
    calls: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl FakeServer {
    /// Starts a server on one half of a fresh memory pair and returns
    /// the client half for seeding into a connector.
    pub fn start(script: ServerScript) -> (MemoryConnection, FakeServer) {
        let (client_half, server_half) = memory_pair();
        let conn = Arc::new(server_half);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let handle = tokio::spawn(serve(
            Arc::clone(&conn),
            script,
            Arc::clone(&calls),
        ));
        (client_half, FakeServer { conn, calls, handle })
    }

    /// Every call name seen, in order.
    pub async fn call_names(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    /// How many times the named call was seen.
    pub async fn count(&self, name: &str) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.as_str() == name)
            .count()
    }

    /// Severs the connection, as if the server process died.
    pub async fn kill(&self) {
        let _ = self.conn.close().await;
    }

    /// Lets the server task drain frames already on the wire. Needed
    /// before asserting on fire-and-forget notifications, which the
    /// client does not wait for.
    pub async fn settle(&self) {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }
}

async fn serve(
    conn: Arc<MemoryConnection>,
    script: ServerScript,
    calls: Arc<Mutex<Vec<String>>>,
) {
    let codec = JsonCodec;
    while let Ok(Some(data)) = conn.recv().await {
        let request: Request = codec.decode(&data).expect("client sent bad frame");
        calls.lock().await.push(request.call.name().to_string());
        let Some(outcome) = respond(&request.call, &script) else {
            continue;
        };
        let response = Response {
            id: request.id,
            outcome,
        };
        let _ = conn.send(&codec.encode(&response).unwrap()).await;
    }
}

fn respond(call: &Call, script: &ServerScript) -> Option<CallOutcome> {
    let ok = |reply| Some(CallOutcome::Ok(reply));
    let fault = |code, reason: &str| {
        Some(CallOutcome::Fault(Fault {
            code,
            reason: reason.into(),
        }))
    };
    match call {
        Call::Ping => ok(Reply::Pong),
        Call::GatewayOpen { .. } => {
            if script.gateway {
                ok(Reply::GatewayOpened)
            } else {
                fault(FaultCode::UnknownCall, "no such operation")
            }
        }
        // Goodbye notifications never get an answer.
        Call::GatewayClose | Call::Disconnect => None,
        Call::Login { .. } => {
            if script.stall_login {
                None
            } else if script.deny_login {
                fault(FaultCode::PermissionDenied, "bad password")
            } else {
                ok(Reply::LoggedIn {
                    token: "tok-1".into(),
                })
            }
        }
        Call::CheckClientVersion => ok(Reply::ClientVersion {
            version: "R18".into(),
        }),
        Call::KeepAlive => ok(Reply::Ack),
        Call::CreateTank { .. }
        | Call::UpdateTank { .. }
        | Call::DeleteTank { .. }
        | Call::SelectTank { .. } => ok(Reply::Accepted { ok: true }),
        Call::TankList => ok(Reply::Tanks {
            tanks: script.tanks.clone(),
        }),
        Call::ServerList => ok(Reply::Servers {
            servers: script.servers.clone(),
        }),
        Call::RequestJoin { .. } => ok(Reply::JoinKey {
            key: "join-key-1".into(),
        }),
        Call::JoinGame { .. } => {
            if script.reject_join {
                fault(FaultCode::BadInformation, "unknown join key")
            } else {
                ok(Reply::Ack)
            }
        }
    }
}

/// A tank that passes local validation.
pub fn tank(name: &str) -> TankAttributes {
    TankAttributes {
        name: name.into(),
        speed_factor: 1.1,
        armor_factor: 0.9,
        model: "scout".into(),
        skin: String::new(),
        weapon_id: 2,
        color: TankColor::new(180, 40, 40),
    }
}

/// A plausible game-server roster entry.
pub fn server_entry(host: &str, port: u16) -> ServerInfo {
    ServerInfo {
        host: host.into(),
        port,
        name: format!("{host}:{port}"),
        approved: true,
        use_gateway: false,
        player_count: 3,
        player_limit: 16,
        current_map: "canyon".into(),
        game_mode: GameMode::Deathmatch,
    }
}

/// A master client whose next dial reaches a fresh scripted server.
/// The connector is returned so further dials can be seeded.
pub async fn client_with_server(
    config: SessionConfig,
    script: ServerScript,
) -> (MasterClient<MemoryConnector>, MemoryConnector, FakeServer) {
    let connector = MemoryConnector::new();
    let (client_half, server) = FakeServer::start(script);
    connector.seed(client_half).await;
    let client = MasterClient::with_connector(config, connector.clone());
    (client, connector, server)
}
