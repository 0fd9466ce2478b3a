use std::net::SocketAddr;

use nukemcp::{config::Config, server::Server};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
};

struct Relay {
    _tmp: TempDir,
    addr: SocketAddr,
}

async fn start_relay() -> Relay {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config {
        port: 0,
        data_dir: tmp.path().to_path_buf(),
        ..Config::default()
    };
    let server = Server::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    Relay { _tmp: tmp, addr }
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    async fn send_line(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn read_response(&mut self) -> Value {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).await.unwrap();
        assert!(read > 0, "relay closed the connection unexpectedly");
        serde_json::from_str(line.trim()).unwrap()
    }

    async fn request(&mut self, command: &str, params: Value) -> Value {
        let payload = json!({"command": command, "params": params});
        self.send_line(&payload.to_string()).await;
        self.read_response().await
    }
}

#[tokio::test]
async fn create_node_round_trip() {
    let relay = start_relay().await;
    let mut client = Client::connect(relay.addr).await;

    let response = client
        .request("create_node", json!({"node_type": "Blur"}))
        .await;
    assert_eq!(response["status"], json!("success"));
    assert_eq!(response["result"]["name"], json!("Blur1"));
    assert_eq!(response["result"]["class"], json!("Blur"));
}

#[tokio::test]
async fn pipelined_requests_answer_in_order() {
    let relay = start_relay().await;
    let mut client = Client::connect(relay.addr).await;

    // Write all requests before reading a single response.
    for _ in 0..3 {
        client
            .send_line(&json!({"command": "create_node", "params": {"node_type": "Blur"}}).to_string())
            .await;
    }

    for expected in ["Blur1", "Blur2", "Blur3"] {
        let response = client.read_response().await;
        assert_eq!(response["status"], json!("success"));
        assert_eq!(response["result"]["name"], json!(expected));
    }
}

#[tokio::test]
async fn malformed_json_gets_an_error_and_keeps_the_session() {
    let relay = start_relay().await;
    let mut client = Client::connect(relay.addr).await;

    client.send_line("this is not json").await;
    let response = client.read_response().await;
    assert_eq!(response["status"], json!("error"));
    assert!(response["message"]
        .as_str()
        .unwrap()
        .starts_with("invalid JSON"));

    let response = client.request("get_script_info", json!({})).await;
    assert_eq!(response["status"], json!("success"));
}

#[tokio::test]
async fn unknown_operations_and_missing_parameters_are_reported() {
    let relay = start_relay().await;
    let mut client = Client::connect(relay.addr).await;

    let response = client.request("paint_stroke", json!({})).await;
    assert_eq!(response["status"], json!("error"));
    assert_eq!(
        response["message"],
        json!("unknown operation: paint_stroke")
    );

    let response = client.request("create_node", json!({})).await;
    assert_eq!(response["status"], json!("error"));
    assert_eq!(response["message"], json!("missing parameter: node_type"));
}

#[tokio::test]
async fn session_state_survives_reconnects() {
    let relay = start_relay().await;

    {
        let mut client = Client::connect(relay.addr).await;
        let response = client
            .request("create_node", json!({"node_type": "Grade", "name": "Lift"}))
            .await;
        assert_eq!(response["status"], json!("success"));
    }

    // The first session ended; the next one sees the same script.
    let mut client = Client::connect(relay.addr).await;
    let response = client.request("get_script_info", json!({})).await;
    assert_eq!(response["status"], json!("success"));
    assert_eq!(response["result"]["node_count"], json!(1));

    let response = client
        .request("get_node_info", json!({"node_name": "Lift"}))
        .await;
    assert_eq!(response["result"]["class"], json!("Grade"));
}

#[tokio::test]
async fn workflow_operations_compose_over_the_wire() {
    let relay = start_relay().await;
    let mut client = Client::connect(relay.addr).await;

    client
        .request("create_node", json!({"node_type": "Read", "name": "Plate"}))
        .await;
    let response = client
        .request("setup_keyer", json!({"input_node_name": "Plate"}))
        .await;
    assert_eq!(response["status"], json!("success"));
    assert_eq!(
        response["result"]["created_nodes"].as_array().unwrap().len(),
        4
    );

    let response = client
        .request(
            "save_template",
            json!({"template_name": "key_setup", "node_names": ["Premult1"]}),
        )
        .await;
    assert_eq!(response["status"], json!("success"));

    let response = client
        .request("load_template", json!({"template_name": "key_setup"}))
        .await;
    assert_eq!(response["status"], json!("success"));
    assert_eq!(
        response["result"]["loaded_nodes"].as_array().unwrap().len(),
        1
    );
}
