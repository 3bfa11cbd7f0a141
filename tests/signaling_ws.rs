//! Drives the client against a local WebSocket server playing the media server.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use one2many::error::PeerError;
use one2many::peer::{IceCandidate, MediaKind, MediaPeer, PeerFactory, Role};
use one2many::signaling::{self, OutgoingMessage, Signaler};
use one2many::stats::rtp::RtcStatsReport;
use one2many::{Client, ClientConfig, ClientError, SessionState, UserCommand};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

struct ScriptedPeer {
    role: Role,
    signaler: Signaler,
    answers: Mutex<Vec<String>>,
    candidates: Mutex<Vec<IceCandidate>>,
    closed: AtomicBool,
}

#[async_trait]
impl MediaPeer for ScriptedPeer {
    fn role(&self) -> Role {
        self.role
    }

    async fn generate_offer(&self) -> Result<String, PeerError> {
        let candidate = IceCandidate {
            candidate: "candidate:1 1 UDP 2122260223 127.0.0.1 50000 typ host".into(),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
        };
        let _ = self
            .signaler
            .send(OutgoingMessage::OnIceCandidate { candidate });
        Ok(format!("offer-{}", self.role))
    }

    async fn process_answer(&self, sdp_answer: &str) -> Result<(), PeerError> {
        self.answers.lock().unwrap().push(sdp_answer.to_owned());
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError> {
        self.candidates.lock().unwrap().push(candidate);
        Ok(())
    }

    fn local_kinds(&self) -> Vec<MediaKind> {
        Vec::new()
    }

    fn remote_kinds(&self) -> Vec<MediaKind> {
        Vec::new()
    }

    async fn stats(&self) -> Result<RtcStatsReport, PeerError> {
        Ok(RtcStatsReport::default())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct ScriptedFactory {
    peers: Mutex<Vec<Arc<ScriptedPeer>>>,
}

impl ScriptedFactory {
    fn last(&self) -> Arc<ScriptedPeer> {
        self.peers.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl PeerFactory for ScriptedFactory {
    async fn create(
        &self,
        role: Role,
        signaler: Signaler,
    ) -> Result<Arc<dyn MediaPeer>, PeerError> {
        let peer = Arc::new(ScriptedPeer {
            role,
            signaler,
            answers: Mutex::new(Vec::new()),
            candidates: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        self.peers.lock().unwrap().push(peer.clone());
        Ok(peer)
    }
}

async fn send_json(ws: &mut WebSocketStream<TcpStream>, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("socket ended early: {other:?}"),
        }
    }
}

async fn start_client(
    addr: std::net::SocketAddr,
    dir: &tempfile::TempDir,
) -> (Client, mpsc::UnboundedReceiver<String>, Arc<ScriptedFactory>) {
    let channel = signaling::connect(&format!("ws://{addr}/call")).await.unwrap();
    let config = ClientConfig::new(format!("ws://{addr}/call"))
        .with_stats_dir(dir.path())
        .with_stats_interval(Duration::from_secs(3600))
        .unwrap();
    let factory = Arc::new(ScriptedFactory::default());
    let client = Client::new(config, channel.signaler, factory.clone());
    (client, channel.inbound, factory)
}

#[tokio::test]
async fn presenter_session_over_websocket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let seen = vec![next_json(&mut ws).await, next_json(&mut ws).await];

        send_json(
            &mut ws,
            json!({"id": "presenterResponse", "response": "accepted", "sdpAnswer": "answer-sdp"}),
        )
        .await;
        send_json(
            &mut ws,
            json!({"id": "iceCandidate", "candidate": {
                "candidate": "candidate:9 1 UDP 1 10.1.1.1 40000 typ host",
                "sdpMid": "0", "sdpMLineIndex": 0}}),
        )
        .await;
        ws.send(Message::Text("not json".into())).await.unwrap();
        send_json(&mut ws, json!({"id": "somethingElse"})).await;
        send_json(&mut ws, json!({"id": "stopCommunication"})).await;
        let _ = ws.close(None).await;
        seen
    });

    let dir = tempfile::tempdir().unwrap();
    let (client, inbound, factory) = start_client(addr, &dir).await;
    let states = client.subscribe();
    let (commands, command_rx) = mpsc::unbounded_channel();
    commands.send(UserCommand::Presenter).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(10), client.run(inbound, command_rx))
        .await
        .expect("client did not finish");
    assert!(matches!(result, Err(ClientError::WsClosed)));

    let seen = server.await.unwrap();
    let offer = seen.iter().find(|m| m["id"] == "presenter").unwrap();
    assert_eq!(offer["sdpOffer"], "offer-presenter");
    let local = seen.iter().find(|m| m["id"] == "onIceCandidate").unwrap();
    assert_eq!(local["candidate"]["sdpMLineIndex"], 0);

    let peer = factory.last();
    assert_eq!(*peer.answers.lock().unwrap(), vec!["answer-sdp".to_owned()]);
    assert_eq!(peer.candidates.lock().unwrap().len(), 1);
    assert!(peer.closed.load(Ordering::SeqCst));
    assert_eq!(*states.borrow(), SessionState::Idle);
    // nothing was sampled, so nothing was dumped
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn rejected_viewer_then_quit() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let mut viewer = next_json(&mut ws).await;
        while viewer["id"] != "viewer" {
            viewer = next_json(&mut ws).await;
        }
        send_json(
            &mut ws,
            json!({"id": "viewerResponse", "response": "rejected",
                   "message": "No active sender now. Become sender or try again later ..."}),
        )
        .await;
        // hold the socket open until the client leaves
        while let Some(Ok(_)) = ws.next().await {}
        viewer
    });

    let dir = tempfile::tempdir().unwrap();
    let (client, inbound, factory) = start_client(addr, &dir).await;
    let (commands, command_rx) = mpsc::unbounded_channel();
    commands.send(UserCommand::Viewer).unwrap();
    let task = tokio::spawn(client.run(inbound, command_rx));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let closed = factory
            .peers
            .lock()
            .unwrap()
            .last()
            .is_some_and(|p| p.closed.load(Ordering::SeqCst));
        if closed {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "viewer was never released");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    commands.send(UserCommand::Quit).unwrap();
    assert!(task.await.unwrap().is_ok());
    assert!(factory.last().answers.lock().unwrap().is_empty());

    // the scripted peer still holds a signaler, the socket must close anyway
    let viewer = tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .expect("socket left open after quit")
        .unwrap();
    assert_eq!(viewer["sdpOffer"], "offer-viewer");
    assert!(factory.last().signaler.is_closed());
}
