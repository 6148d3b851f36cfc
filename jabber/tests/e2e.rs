// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! End-to-end scenarios against a scripted peer: login and roster,
//! message round-trips, subscriptions, rooms, in-band transfers, and
//! archive paging.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as Base64, Engine};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::timeout;

use jabber::{
    ArchiveFilter, Client, ClientBuilder, Event, PageRequest, SubscriptionDecision,
};
use jabber_stanzas::jid::{BareJid, Jid};
use jabber_stanzas::muc::Status as MucStatus;
use tokio_jabber::TlsPolicy;

const HEADER: &str = "<?xml version='1.0'?><stream:stream xmlns='jabber:client' xmlns:stream='http://etherx.jabber.org/streams' id='stream-1' from='test' version='1.0'>";
const FEATURES_SASL: &str = "<stream:features><mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><mechanism>PLAIN</mechanism></mechanisms></stream:features>";
const FEATURES_BIND: &str =
    "<stream:features><bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/></stream:features>";
const SASL_SUCCESS: &str = "<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>";
const BIND_RESULT: &str = "<iq type='result' id='resource-bind'><bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'><jid>alice@test/home</jid></bind></iq>";

struct Peer {
    socket: TcpStream,
    buf: String,
}

impl Peer {
    /// Accepts the client and walks it through SASL PLAIN and binding.
    async fn negotiate(listener: TcpListener) -> Peer {
        let (socket, _) = listener.accept().await.expect("accept");
        let mut peer = Peer {
            socket,
            buf: String::new(),
        };
        peer.read_until("<stream:stream").await;
        peer.send(HEADER).await;
        peer.send(FEATURES_SASL).await;
        peer.read_until("</auth>").await;
        peer.send(SASL_SUCCESS).await;
        peer.read_until("<stream:stream").await;
        peer.send(HEADER).await;
        peer.send(FEATURES_BIND).await;
        peer.read_until("resource-bind").await;
        peer.send(BIND_RESULT).await;
        peer
    }

    async fn send(&mut self, xml: &str) {
        self.socket.write_all(xml.as_bytes()).await.expect("write");
    }

    /// Reads until the buffered text contains `pattern`, returning and
    /// clearing the buffer.
    async fn read_until(&mut self, pattern: &str) -> String {
        let mut bytes = [0u8; 8192];
        while !self.buf.contains(pattern) {
            let n = self.socket.read(&mut bytes).await.expect("peer read");
            assert!(n > 0, "peer saw EOF while waiting for {:?}", pattern);
            self.buf
                .push_str(std::str::from_utf8(&bytes[..n]).expect("peer utf8"));
        }
        std::mem::take(&mut self.buf)
    }
}

/// The value of `attr` on the iq element nearest before `marker`.
fn iq_id_near(xml: &str, marker: &str) -> String {
    let position = xml.find(marker).expect("marker present");
    let iq_start = xml[..position].rfind("<iq").expect("iq start before marker");
    attr_value(&xml[iq_start..], "id")
}

fn attr_value(xml: &str, attr: &str) -> String {
    let needle = format!("{}='", attr);
    let start = xml.find(&needle).expect("attribute present") + needle.len();
    let end = xml[start..].find('\'').expect("attribute terminated") + start;
    String::from(&xml[start..end])
}

async fn connected_client() -> (Client, Peer, broadcast::Receiver<Event>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().unwrap().port();
    let client = ClientBuilder::new(Jid::new("alice@test/home").unwrap(), "secret")
        .host("127.0.0.1")
        .port(port)
        .tls(TlsPolicy::Disabled)
        .allow_plain_cleartext()
        .default_timeout(Some(Duration::from_secs(5)))
        .build()
        .expect("build");
    let events = client.subscribe();

    let peer = tokio::spawn(Peer::negotiate(listener));
    client.simple_authenticate().await.expect("authenticate");
    let peer = peer.await.unwrap();
    (client, peer, events)
}

async fn expect_event<F: Fn(&Event) -> bool>(
    events: &mut broadcast::Receiver<Event>,
    what: &str,
    predicate: F,
) -> Event {
    timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event channel");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", what))
}

// Scenario: login, roster fetch, initial presence, orderly close.
#[tokio::test]
async fn login_roster_and_presence() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().unwrap().port();
    let client = ClientBuilder::new(Jid::new("alice@test/home").unwrap(), "secret")
        .host("127.0.0.1")
        .port(port)
        .tls(TlsPolicy::Disabled)
        .allow_plain_cleartext()
        .build()
        .expect("build");

    let peer = tokio::spawn(async move {
        let mut peer = Peer::negotiate(listener).await;

        // The authenticated session fetches the roster...
        let request = peer.read_until("jabber:iq:roster").await;
        let id = iq_id_near(&request, "jabber:iq:roster");
        peer.send(&format!(
            "<iq type='result' id='{}'><query xmlns='jabber:iq:roster'><item jid='bob@test' name='Bob' subscription='both'/></query></iq>",
            id
        ))
        .await;

        // ...then broadcasts its availability.
        let presence = peer.read_until("<presence").await;
        assert!(!presence.contains("type='unavailable'"));

        peer.read_until("</stream:stream>").await;
    });

    client.authenticate().await.expect("authenticate");

    // The roster mirror fills asynchronously from the dispatch task.
    timeout(Duration::from_secs(5), async {
        loop {
            if client.roster().items().len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("roster mirrored");
    let items = client.roster().items();
    assert_eq!(items[0].jid, BareJid::new("bob@test").unwrap());

    client.close().await;
    peer.await.unwrap();
}

// Scenario: one message out, one message in.
#[tokio::test]
async fn message_round_trip() {
    let (client, mut peer, mut events) = connected_client().await;

    client
        .send_message(Jid::new("bob@test").unwrap(), "hi")
        .expect("send");
    let wire = peer.read_until("</message>").await;
    assert!(wire.contains("<body>hi</body>"));
    assert!(wire.contains("to='bob@test'"));

    peer.send(
        "<message from='bob@test/pda' to='alice@test/home' type='chat'><body>hi back</body></message>",
    )
    .await;
    let event = expect_event(&mut events, "message event", |event| {
        matches!(event, Event::Message(_))
    })
    .await;
    match event {
        Event::Message(message) => {
            assert_eq!(message.body, "hi back");
            assert_eq!(
                message.from.unwrap().to_bare(),
                BareJid::new("bob@test").unwrap()
            );
            assert!(!message.groupchat);
        }
        _ => unreachable!(),
    }

    client.close().await;
}

// Scenario: subscription handshake, approval observed exactly once.
#[tokio::test]
async fn subscription_handshake() {
    let (client, mut peer, mut events) = connected_client().await;

    let bob = BareJid::new("bob@test").unwrap();
    client.request_subscription(&bob).expect("subscribe");
    let wire = peer.read_until("type='subscribe'").await;
    assert!(wire.contains("to='bob@test'"));

    peer.send("<presence from='bob@test' to='alice@test/home' type='subscribed'/>")
        .await;
    expect_event(&mut events, "subscription approval", |event| {
        matches!(event, Event::SubscriptionApproved(jid) if *jid == bob)
    })
    .await;

    // A later unsubscribed is a revocation, not a refusal.
    peer.send("<presence from='bob@test' to='alice@test/home' type='unsubscribed'/>")
        .await;
    expect_event(&mut events, "unsubscribed", |event| {
        matches!(event, Event::Unsubscribed(jid) if *jid == bob)
    })
    .await;

    client.close().await;
}

// Scenario: an inbound subscription request, decided by the callback.
#[tokio::test]
async fn inbound_subscription_approved_by_callback() {
    let (client, mut peer, _events) = connected_client().await;
    client.on_subscription_request(|_jid| SubscriptionDecision::Approve);

    peer.send("<presence from='carol@test' to='alice@test/home' type='subscribe'/>")
        .await;
    let wire = peer.read_until("type='subscribed'").await;
    assert!(wire.contains("to='carol@test'"));

    client.close().await;
}

// Scenario: join a room, observe the self-presence, change the subject.
#[tokio::test]
async fn muc_join_and_subject() {
    let (client, mut peer, mut events) = connected_client().await;

    let room = BareJid::new("room@conf.test").unwrap();
    client
        .join_room(room.clone(), "alice", None, None)
        .expect("join");
    let wire = peer.read_until("</presence>").await;
    assert!(wire.contains("to='room@conf.test/alice'"));
    assert!(wire.contains("http://jabber.org/protocol/muc"));

    peer.send(
        "<presence from='room@conf.test/alice' to='alice@test/home'><x xmlns='http://jabber.org/protocol/muc#user'><item affiliation='owner' role='moderator'/><status code='110'/><status code='201'/></x></presence>",
    )
    .await;
    let event = expect_event(&mut events, "room presence", |event| {
        matches!(event, Event::GroupPresenceChanged { .. })
    })
    .await;
    match event {
        Event::GroupPresenceChanged {
            room: seen_room,
            nick,
            available,
            statuses,
            ..
        } => {
            assert_eq!(seen_room, room);
            assert_eq!(nick.as_deref(), Some("alice"));
            assert!(available);
            assert!(statuses.contains(&MucStatus::SelfPresence));
            assert!(statuses.contains(&MucStatus::RoomHasBeenCreated));
        }
        _ => unreachable!(),
    }

    client
        .edit_room_subject(&room, "welcome")
        .expect("subject");
    let wire = peer.read_until("</message>").await;
    assert!(wire.contains("type='groupchat'"));
    assert!(wire.contains("<subject>welcome</subject>"));
    assert!(!wire.contains("<body>"));

    client.close().await;
}

// Scenario: a 2048-byte outbound transfer, forced in-band.
#[tokio::test]
async fn in_band_file_transfer_sends_every_byte() {
    let (client, mut peer, mut events) = connected_client().await;
    client.force_in_band_transfers(true).expect("force ibb");

    let payload: Vec<u8> = (0..2048u32).map(|i| (i % 251) as u8).collect();
    let source: jabber::TransferSource = Box::new(std::io::Cursor::new(payload.clone()));

    let client2 = client.clone();
    let transfer = tokio::spawn(async move {
        client2
            .initiate_file_transfer(
                Jid::new("bob@test/pda").unwrap(),
                "blob.bin",
                2048,
                None,
                source,
            )
            .await
    });

    // The offer advertises IBB only.
    let offer = peer.read_until("</iq>").await;
    assert!(offer.contains("http://jabber.org/protocol/si"));
    assert!(offer.contains("http://jabber.org/protocol/ibb"));
    assert!(!offer.contains("http://jabber.org/protocol/bytestreams"));
    let offer_id = iq_id_near(&offer, "http://jabber.org/protocol/si");

    peer.send(&format!(
        "<iq type='result' id='{}' from='bob@test/pda'><si xmlns='http://jabber.org/protocol/si'><feature xmlns='http://jabber.org/protocol/feature-neg'><x xmlns='jabber:x:data' type='submit'><field var='stream-method'><value>http://jabber.org/protocol/ibb</value></field></x></feature></si></iq>",
        offer_id
    ))
    .await;

    let sid = transfer.await.unwrap().expect("transfer negotiated");

    // The open frame, then the data frames, then the close.
    let open = peer.read_until("<open").await;
    let open_id = iq_id_near(&open, "<open");
    peer.send(&format!(
        "<iq type='result' id='{}' from='bob@test/pda'/>",
        open_id
    ))
    .await;

    let mut received: Vec<u8> = vec![];
    loop {
        let frame = peer.read_until("</iq>").await;
        if frame.contains("<close") {
            let close_id = iq_id_near(&frame, "<close");
            peer.send(&format!(
                "<iq type='result' id='{}' from='bob@test/pda'/>",
                close_id
            ))
            .await;
            break;
        }
        let data_start = frame.find("<data").expect("data frame");
        let text_start = frame[data_start..].find('>').unwrap() + data_start + 1;
        let text_end = frame[text_start..].find('<').unwrap() + text_start;
        received.extend(Base64.decode(&frame[text_start..text_end]).expect("base64"));
        let data_id = iq_id_near(&frame, "<data");
        peer.send(&format!(
            "<iq type='result' id='{}' from='bob@test/pda'/>",
            data_id
        ))
        .await;
    }
    assert_eq!(received, payload);

    // Progress events end exactly at the total.
    let event = expect_event(&mut events, "final progress", |event| {
        matches!(
            event,
            Event::FileTransferProgress {
                transferred,
                total,
                ..
            } if transferred == total
        )
    })
    .await;
    match event {
        Event::FileTransferProgress {
            sid: seen_sid,
            transferred,
            total,
            ..
        } => {
            assert_eq!(seen_sid, sid);
            assert_eq!(transferred, 2048);
            assert_eq!(total, 2048);
        }
        _ => unreachable!(),
    }

    client.close().await;
}

// Scenario: a 2048-byte inbound transfer accepted into a duplex sink.
#[tokio::test]
async fn in_band_file_transfer_receives_every_byte() {
    let (client, mut peer, _events) = connected_client().await;

    let (sink, mut readback) = tokio::io::duplex(16 * 1024);
    // A shared slot hands the single sink out of the Fn callback once.
    let slot: Arc<Mutex<Option<jabber::TransferSink>>> =
        Arc::new(Mutex::new(Some(Box::new(sink))));
    let callback_slot = Arc::clone(&slot);
    client.on_file_transfer_request(move |offer| {
        assert_eq!(offer.name, "blob.bin");
        assert_eq!(offer.size, 2048);
        callback_slot.lock().unwrap().take()
    });

    let payload: Vec<u8> = (0..2048u32).map(|i| (i % 249) as u8).collect();

    // The SI offer for an IBB transfer.
    peer.send(
        "<iq type='set' id='offer-1' from='bob@test/pda' to='alice@test/home'><si xmlns='http://jabber.org/protocol/si' id='peer-sid-1' profile='http://jabber.org/protocol/si/profile/file-transfer'><file xmlns='http://jabber.org/protocol/si/profile/file-transfer' name='blob.bin' size='2048'/><feature xmlns='http://jabber.org/protocol/feature-neg'><x xmlns='jabber:x:data' type='form'><field var='stream-method' type='list-single'><option><value>http://jabber.org/protocol/ibb</value></option></field></x></feature></si></iq>",
    )
    .await;
    let answer = peer.read_until("</iq>").await;
    assert!(answer.contains("id='offer-1'"));
    assert!(answer.contains("http://jabber.org/protocol/ibb"));

    // Open, two kilobyte-sized frames, close.
    peer.send(
        "<iq type='set' id='open-1' from='bob@test/pda' to='alice@test/home'><open xmlns='http://jabber.org/protocol/ibb' block-size='1024' sid='peer-sid-1'/></iq>",
    )
    .await;
    peer.read_until("id='open-1'").await;

    for (seq, chunk) in payload.chunks(1024).enumerate() {
        peer.send(&format!(
            "<iq type='set' id='data-{}' from='bob@test/pda' to='alice@test/home'><data xmlns='http://jabber.org/protocol/ibb' seq='{}' sid='peer-sid-1'>{}</data></iq>",
            seq,
            seq,
            Base64.encode(chunk)
        ))
        .await;
        peer.read_until(&format!("id='data-{}'", seq)).await;
    }

    peer.send(
        "<iq type='set' id='close-1' from='bob@test/pda' to='alice@test/home'><close xmlns='http://jabber.org/protocol/ibb' sid='peer-sid-1'/></iq>",
    )
    .await;
    peer.read_until("id='close-1'").await;

    let mut received = vec![0u8; 2048];
    timeout(Duration::from_secs(5), readback.read_exact(&mut received))
        .await
        .expect("sink drained")
        .expect("sink bytes");
    assert_eq!(received, payload);

    client.close().await;
}

// Scenario: three pages walk the whole five-message archive.
#[tokio::test]
async fn mam_paged_query() {
    let (client, mut peer, _events) = connected_client().await;

    let archive = [
        ("m1", "one"),
        ("m2", "two"),
        ("m3", "three"),
        ("m4", "four"),
        ("m5", "five"),
    ];

    let peer_task = tokio::spawn(async move {
        for page in [&archive[0..2], &archive[2..4], &archive[4..5]] {
            let request = peer.read_until("urn:xmpp:mam:2").await;
            let iq_id = iq_id_near(&request, "urn:xmpp:mam:2");
            let query_id = attr_value(&request, "queryid");
            for (archive_id, body) in page {
                peer.send(&format!(
                    "<message to='alice@test/home'><result xmlns='urn:xmpp:mam:2' queryid='{}' id='{}'><forwarded xmlns='urn:xmpp:forward:0'><delay xmlns='urn:xmpp:delay' stamp='2010-07-10T23:08:25Z'/><message xmlns='jabber:client' from='witch@test' to='alice@test'><body>{}</body></message></forwarded></result></message>",
                    query_id, archive_id, body
                ))
                .await;
            }
            let first = page.first().map(|(id, _)| *id).unwrap();
            let last = page.last().map(|(id, _)| *id).unwrap();
            let complete = last == "m5";
            peer.send(&format!(
                "<iq type='result' id='{}'><fin xmlns='urn:xmpp:mam:2'{}><set xmlns='http://jabber.org/protocol/rsm'><first index='0'>{}</first><last>{}</last><count>5</count></set></fin></iq>",
                iq_id,
                if complete { " complete='true'" } else { "" },
                first,
                last
            ))
            .await;
        }
        peer
    });

    let mut all = vec![];
    let mut after: Option<String> = None;
    for expected in [2usize, 2, 1] {
        let page = client
            .get_archived_messages(
                PageRequest {
                    max: Some(2),
                    after: after.clone(),
                    before: None,
                },
                ArchiveFilter::default(),
            )
            .await
            .expect("archive page");
        assert_eq!(page.messages.len(), expected);
        assert_eq!(page.total, Some(5));
        after = page.last.clone();
        all.extend(page.messages);
    }

    let bodies: Vec<String> = all
        .iter()
        .map(|m| m.message.get_best_body(&[]).unwrap().1 .0.clone())
        .collect();
    assert_eq!(bodies, ["one", "two", "three", "four", "five"]);
    assert!(all.iter().all(|m| m.timestamp.is_some()));

    let mut peer = peer_task.await.unwrap();
    // An empty archive comes back as an empty page with total 0.
    let empty_task = tokio::spawn(async move {
        let request = peer.read_until("urn:xmpp:mam:2").await;
        let iq_id = iq_id_near(&request, "urn:xmpp:mam:2");
        peer.send(&format!(
            "<iq type='result' id='{}'><fin xmlns='urn:xmpp:mam:2' complete='true'><set xmlns='http://jabber.org/protocol/rsm'><count>0</count></set></fin></iq>",
            iq_id
        ))
        .await;
        peer
    });
    let page = client
        .get_archived_messages(
            PageRequest {
                max: Some(2),
                after,
                before: None,
            },
            ArchiveFilter::default(),
        )
        .await
        .expect("empty page");
    assert!(page.messages.is_empty());
    assert_eq!(page.total, Some(0));
    assert!(page.complete);

    empty_task.await.unwrap();
    client.close().await;
}

// A custom iq nobody handles is answered with service-unavailable, unless
// the delegate steps in.
#[tokio::test]
async fn custom_iq_delegate() {
    let (client, mut peer, _events) = connected_client().await;

    peer.send(
        "<iq type='get' id='c1' from='bob@test/pda' to='alice@test/home'><query xmlns='urn:example:custom'/></iq>",
    )
    .await;
    let reply = peer.read_until("</iq>").await;
    assert!(reply.contains("id='c1'"));
    assert!(reply.contains("service-unavailable"));

    client.on_custom_iq(|_from, payload| {
        assert_eq!(payload.name(), "query");
        Some(
            minidom::Element::builder("query", "urn:example:custom")
                .append("pong")
                .build(),
        )
    });
    peer.send(
        "<iq type='get' id='c2' from='bob@test/pda' to='alice@test/home'><query xmlns='urn:example:custom'/></iq>",
    )
    .await;
    let reply = peer.read_until("</iq>").await;
    assert!(reply.contains("id='c2'"));
    assert!(reply.contains("type='result'"));
    assert!(reply.contains("pong"));

    client.close().await;
}
