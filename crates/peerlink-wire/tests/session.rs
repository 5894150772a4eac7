//! End-to-end tests: a real session talking to an in-process peer over
//! loopback TCP.

use peerlink_auth::ChallengeResponder;
use peerlink_types::message::decode_delegate;
use peerlink_types::{Delegate, Message, MessageType};
use peerlink_wire::{
    ConnectError, Mode, Pipeline, SendError, Session, SessionEvent, SessionObserver,
    TransportConfig,
};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;

const PSK: &str = "integration-psk";

#[derive(Default)]
struct Recorder(Mutex<Vec<SessionEvent>>);

impl Recorder {
    fn saw(&self, wanted: impl Fn(&SessionEvent) -> bool) -> bool {
        self.0.lock().unwrap().iter().any(wanted)
    }
}

impl SessionObserver for Recorder {
    fn on_event(&self, event: &SessionEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

fn psk_secret() -> Vec<u8> {
    Sha256::digest(PSK.as_bytes()).to_vec()
}

fn config(address: String, mode: &str, auth: &str, transforms: &str) -> TransportConfig {
    TransportConfig {
        address: vec![address],
        agent_id: Uuid::new_v4(),
        listener_id: Uuid::new_v4(),
        auth: auth.to_string(),
        padding: String::new(),
        psk: PSK.to_string(),
        transforms: transforms.to_string(),
        mode: mode.to_string(),
    }
}

/// Read one envelope from the agent and decode the message inside.
async fn receive(
    stream: &mut TcpStream,
    pipeline: &Pipeline,
    secret: &[u8],
) -> (Delegate, Message) {
    let mut buf = vec![0u8; 64 * 1024];
    let n = stream.read(&mut buf).await.unwrap();
    assert!(n > 0, "agent closed the connection");
    let envelope = decode_delegate(&buf[..n]).unwrap();
    let msg = pipeline.deconstruct(&envelope.payload, secret).unwrap();
    (envelope, msg)
}

/// Reply to the agent. Replies are not enveloped.
async fn reply(stream: &mut TcpStream, pipeline: &Pipeline, secret: &[u8], msg: Message) {
    let bytes = pipeline.construct(msg, secret).unwrap();
    stream.write_all(&bytes).await.unwrap();
}

fn idle() -> Message {
    Message::new(Uuid::new_v4(), MessageType::Idle)
}

#[tokio::test]
async fn test_reverse_none_aes_round_trip() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let cfg = config(
        server.local_addr().unwrap().to_string(),
        "tcp-reverse",
        "none",
        "aes",
    );
    let (agent_id, listener_id) = (cfg.agent_id, cfg.listener_id);

    let peer = tokio::spawn(async move {
        let pipeline = Pipeline::from_names("aes").unwrap();
        let secret = psk_secret();
        let (mut stream, _) = server.accept().await.unwrap();

        let (_, checkin) = receive(&mut stream, &pipeline, &secret).await;
        assert_eq!(checkin.kind, MessageType::Checkin);
        reply(&mut stream, &pipeline, &secret, idle()).await;

        // Echo the message back.
        let (envelope, jobs) = receive(&mut stream, &pipeline, &secret).await;
        reply(&mut stream, &pipeline, &secret, jobs.clone()).await;
        (envelope, jobs)
    });

    let mut session = Session::new(cfg).unwrap();
    session.initial().await.unwrap();
    assert!(session.is_connected());

    let body = b"0123456789".to_vec();
    let replies = session
        .send(Message::with_payload(agent_id, MessageType::Jobs, body.clone()))
        .await
        .unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].kind, MessageType::Jobs);
    assert_eq!(replies[0].payload, body);

    let (envelope, jobs) = peer.await.unwrap();
    assert_eq!(envelope.agent, agent_id);
    assert_eq!(envelope.listener, listener_id);
    assert_eq!(jobs.id, agent_id);
    assert_eq!(jobs.payload, body);
    assert!(jobs.padding.is_empty());
}

#[tokio::test]
async fn test_bind_mode_accepts_peer() {
    let cfg = config("127.0.0.1:0".to_string(), "tcp-bind", "none", "jwe,gob-base");
    let mut session = Session::new(cfg).unwrap();
    assert_eq!(session.mode(), Mode::Bind);
    let local = session.listen().await.unwrap();

    let peer = tokio::spawn(async move {
        let pipeline = Pipeline::from_names("jwe,gob-base").unwrap();
        let secret = psk_secret();
        let mut stream = TcpStream::connect(local).await.unwrap();
        let (_, checkin) = receive(&mut stream, &pipeline, &secret).await;
        reply(&mut stream, &pipeline, &secret, idle()).await;
        (checkin, stream.local_addr().unwrap())
    });

    session.initial().await.unwrap();
    let (checkin, peer_addr) = peer.await.unwrap();
    assert_eq!(checkin.kind, MessageType::Checkin);
    assert_eq!(checkin.id, session.agent_id());
    assert_eq!(session.peer_addr(), Some(peer_addr));
}

#[tokio::test]
async fn test_send_reconnects_after_peer_reset() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let cfg = config(
        server.local_addr().unwrap().to_string(),
        "tcp-reverse",
        "none",
        "aes,gob-base",
    );

    // Serve one request per connection, then hang up.
    let peer = tokio::spawn(async move {
        let pipeline = Pipeline::from_names("aes,gob-base").unwrap();
        let secret = psk_secret();
        let mut seen = Vec::new();
        for _ in 0..2 {
            let (mut stream, _) = server.accept().await.unwrap();
            let (_, msg) = receive(&mut stream, &pipeline, &secret).await;
            seen.push(msg.payload);
            reply(&mut stream, &pipeline, &secret, idle()).await;
        }
        seen
    });

    let recorder = Arc::new(Recorder::default());
    let mut session = Session::with_observer(cfg, recorder.clone()).unwrap();
    session.initial().await.unwrap();

    let agent = session.agent_id();
    let err = session
        .send(Message::with_payload(agent, MessageType::Jobs, b"lost".to_vec()))
        .await
        .unwrap_err();
    assert!(
        matches!(err, SendError::PeerReset { .. } | SendError::Write { .. }),
        "unexpected error: {err}"
    );
    assert!(!session.is_connected());

    let replies = session
        .send(Message::with_payload(agent, MessageType::Jobs, b"again".to_vec()))
        .await
        .unwrap();
    assert_eq!(replies[0].kind, MessageType::Idle);
    assert!(session.is_connected());
    assert!(recorder.saw(|e| matches!(e, SessionEvent::Reconnecting)));

    let seen = peer.await.unwrap();
    assert_eq!(seen[1], b"again");
}

#[tokio::test]
async fn test_peer_shutdown_without_reply_is_peer_reset() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let cfg = config(
        server.local_addr().unwrap().to_string(),
        "tcp-reverse",
        "none",
        "aes",
    );

    // Read the request, then close the write side without answering.
    let peer = tokio::spawn(async move {
        let pipeline = Pipeline::from_names("aes").unwrap();
        let (mut stream, _) = server.accept().await.unwrap();
        let (_, msg) = receive(&mut stream, &pipeline, &psk_secret()).await;
        stream.shutdown().await.unwrap();
        (msg, stream)
    });

    let recorder = Arc::new(Recorder::default());
    let mut session = Session::with_observer(cfg, recorder.clone()).unwrap();
    session.connect().await.unwrap();
    let agent = session.agent_id();
    let err = session
        .send(Message::new(agent, MessageType::Checkin))
        .await
        .unwrap_err();
    assert!(matches!(err, SendError::PeerReset { .. }), "unexpected error: {err}");
    assert!(!session.is_connected());
    assert!(recorder.saw(|e| matches!(e, SessionEvent::PeerReset { .. })));

    let (msg, _stream) = peer.await.unwrap();
    assert_eq!(msg.kind, MessageType::Checkin);
}

#[tokio::test]
async fn test_reverse_session_cannot_listen() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let cfg = config(
        server.local_addr().unwrap().to_string(),
        "tcp-reverse",
        "none",
        "aes",
    );
    let mut session = Session::new(cfg).unwrap();
    let err = session.listen().await.unwrap_err();
    assert!(matches!(err, ConnectError::NotBindMode { .. }));
}

#[tokio::test]
async fn test_opaque_handshake_rotates_secret() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let cfg = config(
        server.local_addr().unwrap().to_string(),
        "tcp-reverse",
        "opaque",
        "jwe,gob-base",
    );

    let peer = tokio::spawn(async move {
        let pipeline = Pipeline::from_names("jwe,gob-base").unwrap();
        let bootstrap = psk_secret();
        let mut responder = ChallengeResponder::new(Uuid::new_v4(), PSK);
        let (mut stream, _) = server.accept().await.unwrap();

        let (_, init) = receive(&mut stream, &pipeline, &bootstrap).await;
        let challenge = responder.respond(&init).unwrap();
        reply(&mut stream, &pipeline, &bootstrap, challenge).await;

        // The agent switches keys before sending its completion.
        let key = responder.session_key().unwrap().to_vec();
        let (_, complete) = receive(&mut stream, &pipeline, &key).await;
        let ack = responder.respond(&complete).unwrap();
        reply(&mut stream, &pipeline, &key, ack).await;
        assert!(responder.is_verified());

        let (_, jobs) = receive(&mut stream, &pipeline, &key).await;
        reply(&mut stream, &pipeline, &key, idle()).await;
        jobs
    });

    let recorder = Arc::new(Recorder::default());
    let mut session = Session::with_observer(cfg, recorder.clone()).unwrap();
    session.initial().await.unwrap();
    assert!(recorder.saw(|e| matches!(e, SessionEvent::SecretRotated)));
    assert!(recorder.saw(|e| matches!(
        e,
        SessionEvent::Authenticated { authenticator: "opaque" }
    )));

    let agent = session.agent_id();
    session
        .send(Message::with_payload(agent, MessageType::Jobs, b"after-auth".to_vec()))
        .await
        .unwrap();
    assert_eq!(peer.await.unwrap().payload, b"after-auth");
}

#[tokio::test]
async fn test_padding_applied_within_bound() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut cfg = config(
        server.local_addr().unwrap().to_string(),
        "tcp-reverse",
        "none",
        "aes",
    );
    cfg.padding = "64".to_string();

    let peer = tokio::spawn(async move {
        let pipeline = Pipeline::from_names("aes").unwrap();
        let secret = psk_secret();
        let (mut stream, _) = server.accept().await.unwrap();
        let mut pads = Vec::new();
        for _ in 0..20 {
            let (_, msg) = receive(&mut stream, &pipeline, &secret).await;
            pads.push(msg.padding);
            reply(&mut stream, &pipeline, &secret, idle()).await;
        }
        pads
    });

    let mut session = Session::new(cfg).unwrap();
    assert_eq!(session.get("paddingmax"), "64");
    session.connect().await.unwrap();
    let agent = session.agent_id();
    for _ in 0..20 {
        session
            .send(Message::new(agent, MessageType::Checkin))
            .await
            .unwrap();
    }

    let pads = peer.await.unwrap();
    assert!(pads.iter().all(|p| p.len() < 64));
    assert!(pads.iter().all(|p| p.chars().all(|c| c.is_ascii_alphanumeric())));
    assert!(pads.iter().any(|p| !p.is_empty()));
}

#[tokio::test]
async fn test_undecodable_reply_keeps_connection() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let cfg = config(
        server.local_addr().unwrap().to_string(),
        "tcp-reverse",
        "none",
        "aes",
    );

    let peer = tokio::spawn(async move {
        let pipeline = Pipeline::from_names("aes").unwrap();
        let (mut stream, _) = server.accept().await.unwrap();
        let _ = receive(&mut stream, &pipeline, &psk_secret()).await;
        // Encrypted under the wrong key.
        reply(&mut stream, &pipeline, b"not-the-secret", idle()).await;
        stream
    });

    let mut session = Session::new(cfg).unwrap();
    session.connect().await.unwrap();
    let agent = session.agent_id();
    let err = session
        .send(Message::new(agent, MessageType::Checkin))
        .await
        .unwrap_err();
    assert!(matches!(err, SendError::Deconstruct(_)));
    assert!(session.is_connected());
    drop(peer.await.unwrap());
}

#[tokio::test]
async fn test_dial_failure_is_connect_error() {
    let addr = {
        let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap()
    };
    let cfg = config(addr.to_string(), "tcp-reverse", "none", "aes");
    let mut session = Session::new(cfg).unwrap();
    let err = session.initial().await.unwrap_err();
    assert!(err.to_string().contains("connecting"));
    assert!(!session.is_connected());
}
