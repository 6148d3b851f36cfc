// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Session tests against a scripted peer on a local socket.

use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use tokio_jabber::stanzas::iq::{Iq, IqType};
use tokio_jabber::stanzas::jid::Jid;
use tokio_jabber::stanzas::ping::Ping;
use tokio_jabber::{Config, Error, Session, SessionEvent, SessionState, Stanza, TlsPolicy};

const HEADER: &str = "<?xml version='1.0'?><stream:stream xmlns='jabber:client' xmlns:stream='http://etherx.jabber.org/streams' id='stream-1' from='test' version='1.0'>";
const FEATURES_SASL: &str = "<stream:features><mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><mechanism>PLAIN</mechanism></mechanisms></stream:features>";
const FEATURES_BIND: &str =
    "<stream:features><bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/></stream:features>";
const SASL_SUCCESS: &str = "<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>";
const BIND_RESULT: &str = "<iq type='result' id='resource-bind'><bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'><jid>alice@test/home</jid></bind></iq>";

/// Reads from the socket until the accumulated text contains `pattern`.
async fn read_until(socket: &mut TcpStream, buf: &mut String, pattern: &str) -> String {
    let mut bytes = [0u8; 4096];
    while !buf.contains(pattern) {
        let n = socket.read(&mut bytes).await.expect("peer read");
        assert!(n > 0, "peer saw EOF while waiting for {:?}", pattern);
        buf.push_str(std::str::from_utf8(&bytes[..n]).expect("peer utf8"));
    }
    std::mem::take(buf)
}

/// Extracts the value of an attribute from serialized XML.
fn attr_value<'a>(xml: &'a str, attr: &str) -> &'a str {
    let marker = format!("{}='", attr);
    let start = xml.find(&marker).expect("attribute present") + marker.len();
    let end = xml[start..].find('\'').expect("attribute terminated") + start;
    &xml[start..end]
}

/// Walks a scripted peer through connect, SASL PLAIN and binding, then
/// hands the socket to the per-test closure.
async fn serve_negotiation(listener: TcpListener) -> (TcpStream, String) {
    let (mut socket, _) = listener.accept().await.expect("accept");
    let mut buf = String::new();

    read_until(&mut socket, &mut buf, "<stream:stream").await;
    socket.write_all(HEADER.as_bytes()).await.unwrap();
    socket.write_all(FEATURES_SASL.as_bytes()).await.unwrap();

    read_until(&mut socket, &mut buf, "</auth>").await;
    socket.write_all(SASL_SUCCESS.as_bytes()).await.unwrap();

    read_until(&mut socket, &mut buf, "<stream:stream").await;
    socket.write_all(HEADER.as_bytes()).await.unwrap();
    socket.write_all(FEATURES_BIND.as_bytes()).await.unwrap();

    read_until(&mut socket, &mut buf, "resource-bind").await;
    socket.write_all(BIND_RESULT.as_bytes()).await.unwrap();

    (socket, buf)
}

async fn test_config() -> (Config, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().unwrap().port();
    let mut config = Config::new(
        "127.0.0.1",
        Jid::new("alice@test/home").unwrap(),
        "secret",
    );
    config.port = port;
    config.tls = TlsPolicy::Disabled;
    config.allow_plain_cleartext = true;
    (config, listener)
}

#[tokio::test]
async fn connect_and_bind() {
    let (config, listener) = test_config().await;
    let peer = tokio::spawn(serve_negotiation(listener));

    let (session, mut events) = Session::new(config);
    session.connect().await.expect("connect");
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.jid(), Some(Jid::new("alice@test/home").unwrap()));
    assert!(!session.is_encrypted());

    match events.recv().await {
        Some(SessionEvent::Online { jid }) => {
            assert_eq!(jid, Jid::new("alice@test/home").unwrap())
        }
        other => panic!("unexpected event: {:?}", other),
    }

    peer.await.unwrap();
    session.close().await;
}

#[tokio::test]
async fn iq_request_correlation() {
    let (config, listener) = test_config().await;
    let peer = tokio::spawn(async move {
        let (mut socket, _) = serve_negotiation(listener).await;
        let mut buf = String::new();
        let request = read_until(&mut socket, &mut buf, "urn:xmpp:ping").await;
        let id = attr_value(&request, "id").to_owned();
        let reply = format!("<iq type='result' id='{}'/>", id);
        socket.write_all(reply.as_bytes()).await.unwrap();
        socket
    });

    let (session, _events) = Session::new(config);
    session.connect().await.expect("connect");
    let response = session
        .iq_request(Iq::from_get("x", Ping))
        .await
        .expect("ping response");
    assert!(matches!(response.payload, IqType::Result(None)));

    peer.await.unwrap();
    session.close().await;
}

#[tokio::test]
async fn iq_error_surfaces_condition() {
    use tokio_jabber::stanzas::stanza_error::DefinedCondition;

    let (config, listener) = test_config().await;
    let peer = tokio::spawn(async move {
        let (mut socket, _) = serve_negotiation(listener).await;
        let mut buf = String::new();
        let request = read_until(&mut socket, &mut buf, "urn:xmpp:ping").await;
        let id = attr_value(&request, "id").to_owned();
        let reply = format!(
            "<iq type='error' id='{}'><error type='cancel'><service-unavailable xmlns='urn:ietf:params:xml:ns:xmpp-stanzas'/></error></iq>",
            id
        );
        socket.write_all(reply.as_bytes()).await.unwrap();
        socket
    });

    let (session, _events) = Session::new(config);
    session.connect().await.expect("connect");
    let error = session
        .iq_request(Iq::from_get("x", Ping))
        .await
        .expect_err("stanza error");
    match error {
        Error::Stanza(e) => {
            assert_eq!(e.defined_condition, DefinedCondition::ServiceUnavailable)
        }
        other => panic!("unexpected error: {:?}", other),
    }

    peer.await.unwrap();
    session.close().await;
}

#[tokio::test]
async fn iq_timeout_fires() {
    let (mut config, listener) = test_config().await;
    config.default_timeout = Some(Duration::from_millis(50));
    let peer = tokio::spawn(async move {
        let (mut socket, _) = serve_negotiation(listener).await;
        // Never answer; keep the socket open long enough for the timeout.
        tokio::time::sleep(Duration::from_millis(500)).await;
        let _ = socket.shutdown().await;
    });

    let (session, _events) = Session::new(config);
    session.connect().await.expect("connect");
    let started = Instant::now();
    let error = session
        .iq_request(Iq::from_get("x", Ping))
        .await
        .expect_err("timeout");
    assert!(matches!(error, Error::Timeout));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_millis(450));

    session.close().await;
    peer.await.unwrap();
}

#[tokio::test]
async fn inbound_message_raises_stanza_event() {
    let (config, listener) = test_config().await;
    let peer = tokio::spawn(async move {
        let (mut socket, _) = serve_negotiation(listener).await;
        socket
            .write_all(
                b"<message from='bob@test' to='alice@test/home' type='chat'><body>hi back</body></message>",
            )
            .await
            .unwrap();
        socket
    });

    let (session, mut events) = Session::new(config);
    session.connect().await.expect("connect");
    let _ = events.recv().await; // Online

    match events.recv().await {
        Some(SessionEvent::Stanza(Stanza::Message(message))) => {
            assert_eq!(message.from, Some(Jid::new("bob@test").unwrap()));
            let (_, body) = message.get_best_body(&[]).expect("body");
            assert_eq!(body.0, "hi back");
        }
        other => panic!("unexpected event: {:?}", other),
    }

    peer.await.unwrap();
    session.close().await;
}

#[tokio::test]
async fn close_sends_stream_end_and_disposes() {
    let (config, listener) = test_config().await;
    let peer = tokio::spawn(async move {
        let (mut socket, _) = serve_negotiation(listener).await;
        let mut buf = String::new();
        read_until(&mut socket, &mut buf, "</stream:stream>").await;
    });

    let (session, _events) = Session::new(config);
    session.connect().await.expect("connect");
    session.close().await;
    // The peer task only finishes once it saw the closing envelope.
    peer.await.unwrap();

    let error = session
        .send_stanza(minidom::Element::builder("presence", "jabber:client").build())
        .expect_err("disposed");
    assert!(matches!(error, Error::Disposed));

    let error = session
        .iq_request(Iq::from_get("x", Ping))
        .await
        .expect_err("disposed");
    assert!(matches!(error, Error::Disposed));

    // close() is idempotent.
    session.close().await;
}

#[tokio::test]
async fn tls_required_by_server_with_tls_disabled() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().unwrap().port();
    let peer = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut buf = String::new();
        read_until(&mut socket, &mut buf, "<stream:stream").await;
        socket.write_all(HEADER.as_bytes()).await.unwrap();
        socket
            .write_all(
                b"<stream:features><starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'><required/></starttls></stream:features>",
            )
            .await
            .unwrap();
        // Leave the socket open; the client must bail out on its own.
        tokio::time::sleep(Duration::from_millis(200)).await;
    });

    let mut config = Config::new(
        "127.0.0.1",
        Jid::new("alice@test/home").unwrap(),
        "secret",
    );
    config.port = port;
    config.tls = TlsPolicy::Disabled;

    let (session, _events) = Session::new(config);
    let error = session.connect().await.expect_err("refused");
    assert!(matches!(error, Error::TlsRequiredByServer));
    peer.await.unwrap();
}
