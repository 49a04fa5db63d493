//! End-to-end tests over real TCP connections.

use statebus_engine::{Action, ClientEndpoint, Reducer, SyncConfig, SyncStore, SYNC_PROTOCOL};
use statebus_rpc::{RpcClient, RpcError, RpcResult, RpcService, RPC_PROTOCOL};
use statebus_server::{ServerConfig, SyncServer};
use statebus_state::{set_path, Value};
use statebus_transport::{TcpClientConfig, TcpClientTransport, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn init_tracing() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn counting_reducer() -> Reducer {
    Box::new(|state, action| match action.name.as_str() {
        "increment" => {
            let count = state.get("count").and_then(Value::as_integer).unwrap_or(0);
            set_path(state, &["count"], Value::Integer(count + 1))
        }
        _ => state.clone(),
    })
}

fn count_store() -> Arc<SyncStore> {
    Arc::new(
        SyncStore::new(
            SyncConfig::new(["count"]),
            counting_reducer(),
            Value::empty_map(),
        )
        .unwrap(),
    )
}

async fn start_server() -> SyncServer {
    init_tracing();
    SyncServer::start(ServerConfig::ephemeral(), count_store())
        .await
        .unwrap()
}

fn connect_client(server: &SyncServer) -> (TcpClientTransport, Arc<ClientEndpoint>) {
    let transport = TcpClientTransport::connect(
        TcpClientConfig::new(server.local_addr().to_string())
            .with_reconnect_delay(Duration::from_millis(20)),
    );
    let endpoint = ClientEndpoint::new(count_store());
    transport.register_protocol(SYNC_PROTOCOL, endpoint.clone());
    (transport, endpoint)
}

async fn wait_for_count(endpoint: &ClientEndpoint, expected: i64) {
    timeout(WAIT, async {
        loop {
            if endpoint.store().state().get("count") == Some(&Value::Integer(expected)) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "count never reached {expected}, state: {:?}",
            endpoint.store().state()
        )
    });
}

#[tokio::test]
async fn late_client_catches_up_then_tracks() {
    let server = start_server().await;
    server.dispatch(&Action::local("increment", Value::Null));
    server.dispatch(&Action::local("increment", Value::Null));

    let (transport, endpoint) = connect_client(&server);
    wait_for_count(&endpoint, 2).await;

    server.dispatch(&Action::local("increment", Value::Null));
    wait_for_count(&endpoint, 3).await;
    assert_eq!(endpoint.store().versions().get("count"), Some(&3));

    transport.shutdown();
    server.shutdown();
}

#[tokio::test]
async fn broadcast_reaches_every_client() {
    let server = start_server().await;

    let (transport_a, endpoint_a) = connect_client(&server);
    let (transport_b, endpoint_b) = connect_client(&server);

    timeout(WAIT, async {
        while server.connection_count() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    server.dispatch(&Action::local("increment", Value::Null));
    wait_for_count(&endpoint_a, 1).await;
    wait_for_count(&endpoint_b, 1).await;

    transport_a.shutdown();
    transport_b.shutdown();
    server.shutdown();
}

#[tokio::test]
async fn forwarded_action_mutates_server_state() {
    let server = start_server().await;
    let (transport, endpoint) = connect_client(&server);

    // Queued until the connection is up, then flushed.
    endpoint.dispatch(&Action::to_peer("increment", Value::Null));
    wait_for_count(&endpoint, 1).await;
    assert_eq!(
        server.store().state().get("count"),
        Some(&Value::Integer(1))
    );

    transport.shutdown();
    server.shutdown();
}

struct GreeterService;

impl RpcService for GreeterService {
    fn call(&self, method: &str, args: Value) -> RpcResult<Value> {
        match method {
            "greet" => {
                let name = args.as_text().unwrap_or("stranger");
                Ok(Value::from(format!("hello, {name}")))
            }
            other => Err(RpcError::UnknownMethod(other.to_string())),
        }
    }
}

#[tokio::test]
async fn rpc_rides_the_same_connection() {
    let server = start_server().await;
    server.register_service("greeter", Arc::new(GreeterService));

    let (transport, endpoint) = connect_client(&server);
    let rpc = RpcClient::with_timeout(Duration::from_secs(2));
    transport.register_protocol(RPC_PROTOCOL, rpc.clone());

    let result = rpc.call("greeter", "greet", Value::from("ada")).await;
    assert_eq!(result, Ok(Value::from("hello, ada")));

    // Sync still works on the shared connection.
    server.dispatch(&Action::local("increment", Value::Null));
    wait_for_count(&endpoint, 1).await;

    transport.shutdown();
    server.shutdown();
}
