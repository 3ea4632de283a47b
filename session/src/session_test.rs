use super::*;
use crate::transport::ChannelTransport;
use frames::{DecodeError, Tag};
use tokio::time::timeout;

fn session_pair() -> (Session<ChannelTransport>, Session<ChannelTransport>) {
    let (a, b) = ChannelTransport::pair();
    (Session::new(a), Session::new(b))
}

fn canonical_sequence() -> Vec<Message> {
    vec![
        Message::Ping,
        Message::text("A"),
        Message::text("B"),
        Message::text("CD"),
        Message::Close,
    ]
}

async fn recv_message(session: &mut Session<ChannelTransport>) -> Message {
    timeout(Duration::from_millis(500), session.recv())
        .await
        .expect("recv timed out")
        .expect("recv should succeed")
        .expect("stream ended unexpectedly")
}

#[tokio::test]
async fn new_session_starts_open() {
    let (client, _peer) = session_pair();
    assert_eq!(client.state(), ConnectionState::Open);
    assert!(client.is_open());
}

#[tokio::test]
async fn peer_observes_canonical_sequence_in_order() {
    let (mut client, mut peer) = session_pair();

    client.send_all(&canonical_sequence()).await.expect("send all");

    let mut observed = Vec::new();
    while peer.is_open() {
        observed.push(recv_message(&mut peer).await);
    }
    assert_eq!(observed, canonical_sequence());
}

#[tokio::test]
async fn send_writes_encoded_frame_bytes() {
    let (a, mut raw_peer) = ChannelTransport::pair();
    let mut client = Session::new(a);

    client.send(&Message::Text(vec![65])).await.expect("send");

    assert_eq!(raw_peer.recv().await.expect("recv"), Some(vec![0x01, 0x41]));
}

#[tokio::test]
async fn sending_close_transitions_to_closed() {
    let (mut client, _peer) = session_pair();

    client.send(&Message::Close).await.expect("send close");

    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn send_after_close_is_rejected() {
    let (mut client, _peer) = session_pair();
    client.send(&Message::Close).await.expect("send close");

    let err = client.send(&Message::Ping).await.expect_err("send should fail");
    assert!(matches!(err, TransportError::Closed));
}

#[tokio::test]
async fn send_all_stops_at_first_failure() {
    let (a, mut raw_peer) = ChannelTransport::pair();
    let mut client = Session::new(a);
    let messages = vec![Message::Close, Message::text("late")];

    let err = client.send_all(&messages).await.expect_err("second send should fail");
    assert!(matches!(err, TransportError::Closed));
    assert_eq!(raw_peer.recv().await.expect("recv"), Some(vec![0x02]));
}

#[tokio::test]
async fn receiving_close_transitions_to_closed() {
    let (mut client, mut peer) = session_pair();
    client.send(&Message::Close).await.expect("send close");

    assert_eq!(recv_message(&mut peer).await, Message::Close);
    assert_eq!(peer.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn recv_after_close_is_rejected() {
    let (mut client, mut peer) = session_pair();
    client.send(&Message::Close).await.expect("send close");
    recv_message(&mut peer).await;

    let err = peer.recv().await.expect_err("recv should fail");
    assert!(matches!(err, SessionError::Transport(TransportError::Closed)));
}

#[tokio::test]
async fn transport_end_transitions_to_closed() {
    let (a, b) = ChannelTransport::pair();
    let mut peer = Session::new(b);
    drop(a);

    assert!(peer.recv().await.expect("recv").is_none());
    assert_eq!(peer.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn send_to_vanished_peer_closes_session() {
    let (a, b) = ChannelTransport::pair();
    let mut client = Session::new(a);
    drop(b);

    let err = client.send(&Message::Ping).await.expect_err("send should fail");
    assert!(matches!(err, TransportError::Disconnected));
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn malformed_frame_closes_session_by_default() {
    let (mut raw_client, b) = ChannelTransport::pair();
    let mut peer = Session::new(b);

    raw_client.send(vec![0x03]).await.expect("send");

    let err = peer.recv().await.expect_err("decode should fail");
    assert!(matches!(err, SessionError::Decode(DecodeError::UnknownTag(3))));
    assert_eq!(peer.state(), ConnectionState::Closed);
    assert_eq!(raw_client.recv().await.expect("recv"), None);
}

#[tokio::test]
async fn malformed_frame_leaves_session_open_when_configured() {
    let (mut raw_client, b) = ChannelTransport::pair();
    let mut peer = Session::new(b).with_close_on_malformed(false);

    raw_client.send(Vec::new()).await.expect("send empty");
    raw_client.send(vec![0x01, 0x42]).await.expect("send text");

    let err = peer.recv().await.expect_err("decode should fail");
    assert!(matches!(err, SessionError::Decode(DecodeError::EmptyFrame)));
    assert!(peer.is_open());
    assert_eq!(recv_message(&mut peer).await, Message::Text(vec![0x42]));
}

#[tokio::test]
async fn strict_session_rejects_control_frame_payload() {
    let (mut raw_client, b) = ChannelTransport::pair();
    let mut peer = Session::new(b).with_close_on_malformed(false);

    raw_client.send(vec![0x00, 0x01]).await.expect("send");

    let err = peer.recv().await.expect_err("decode should fail");
    assert!(matches!(
        err,
        SessionError::Decode(DecodeError::UnexpectedPayload { tag: Tag::Ping, len: 2 })
    ));
}

#[tokio::test]
async fn lenient_session_ignores_trailing_bytes_on_control_frames() {
    let (mut raw_client, b) = ChannelTransport::pair();
    let mut peer = Session::new(b).with_policy(DecodePolicy::Lenient);

    raw_client.send(vec![0x00, 0x00]).await.expect("send ping");
    raw_client.send(vec![0x02, 0x00]).await.expect("send close");

    assert_eq!(recv_message(&mut peer).await, Message::Ping);
    assert_eq!(recv_message(&mut peer).await, Message::Close);
    assert_eq!(peer.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn legacy_session_reads_stream_id_layout() {
    let (mut raw_client, b) = ChannelTransport::pair();
    let mut peer = Session::new(b).with_policy(DecodePolicy::Legacy);

    for frame in [vec![0, 0], vec![1, 0, 65], vec![1, 0, 66], vec![1, 0, 67, 68], vec![2, 0]] {
        raw_client.send(frame).await.expect("send");
    }

    let mut observed = Vec::new();
    while peer.is_open() {
        observed.push(recv_message(&mut peer).await);
    }
    assert_eq!(observed, canonical_sequence());
}

#[tokio::test]
async fn recv_timeout_expires_without_closing() {
    let (_client, mut peer) = session_pair();

    let err = peer
        .recv_timeout(Duration::from_millis(20))
        .await
        .expect_err("recv should time out");
    assert!(matches!(err, SessionError::Transport(TransportError::Timeout)));
    assert!(peer.is_open());
}

#[tokio::test]
async fn recv_next_uses_configured_deadline() {
    let (_a, b) = ChannelTransport::pair();
    let config = SessionConfig {
        recv_timeout: Duration::from_millis(20),
        ..SessionConfig::default()
    };
    let mut peer = Session::with_config(b, &config);

    let err = peer.recv_next().await.expect_err("recv should time out");
    assert!(matches!(err, SessionError::Transport(TransportError::Timeout)));
}

#[tokio::test]
async fn with_config_applies_policy_and_malformed_handling() {
    let (mut raw_client, b) = ChannelTransport::pair();
    let config = SessionConfig {
        close_on_malformed: false,
        decode_policy: DecodePolicy::Lenient,
        ..SessionConfig::default()
    };
    let mut peer = Session::with_config(b, &config);

    raw_client.send(vec![0x09]).await.expect("send bad");
    raw_client.send(vec![0x00, 0x00]).await.expect("send padded ping");

    assert!(peer.recv().await.is_err());
    assert!(peer.is_open());
    assert_eq!(recv_message(&mut peer).await, Message::Ping);
}

#[tokio::test]
async fn close_sends_close_frame_and_ends_transport() {
    let (a, mut raw_peer) = ChannelTransport::pair();
    let mut client = Session::new(a);

    client.close().await.expect("close");

    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(raw_peer.recv().await.expect("recv"), Some(vec![0x02]));
    assert_eq!(raw_peer.recv().await.expect("recv"), None);
}

#[tokio::test]
async fn close_after_sent_close_does_not_send_twice() {
    let (a, mut raw_peer) = ChannelTransport::pair();
    let mut client = Session::new(a);

    client.send(&Message::Close).await.expect("send close");
    client.close().await.expect("close");
    client.close().await.expect("close again");

    assert_eq!(raw_peer.recv().await.expect("recv"), Some(vec![0x02]));
    assert_eq!(raw_peer.recv().await.expect("recv"), None);
}

#[tokio::test]
async fn into_inner_returns_transport() {
    let (a, mut raw_peer) = ChannelTransport::pair();
    let client = Session::new(a);

    let mut transport = client.into_inner();
    transport.send(vec![0x00]).await.expect("send");
    assert_eq!(raw_peer.recv().await.expect("recv"), Some(vec![0x00]));
}
