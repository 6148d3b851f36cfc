// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The SOCKS5 bytestream backend (XEP-0065): out-of-band TCP transfer,
//! authenticated by the SHA-1 of sid + initiator + target used as the
//! SOCKS5 destination domain.

use std::any::Any;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use sha1::{Digest, Sha1};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use jabber_stanzas::bytestreams::{Query, StreamHost};
use jabber_stanzas::iq::{Iq, IqType};
use jabber_stanzas::jid::Jid;
use jabber_stanzas::ns;
use jabber_stanzas::stanza_error::{DefinedCondition, ErrorType, StanzaError};
use tokio_jabber::{Error, Stanza};

use crate::extension::{Extension, ExtensionContext};
use crate::filetransfer::{ByteStreamBackend, Direction, FileTransfer, TransferSession};

const ACCEPT_TIMEOUT: Duration = Duration::from_secs(60);

/// The SOCKS5 backend extension.
///
/// Direct candidates require [`Socks5::set_advertised_address`] so the peer
/// knows where to connect; proxy streamhosts can be added with
/// [`Socks5::add_streamhost`].
pub struct Socks5 {
    ft: Arc<FileTransfer>,
    advertised_address: Mutex<Option<String>>,
    proxies: Mutex<Vec<StreamHost>>,
}

/// The hex SHA-1 over sid + initiator + target, both bare, used as the
/// SOCKS5 destination.
fn dst_addr(sid: &str, initiator: &Jid, target: &Jid) -> String {
    let input = format!("{}{}{}", sid, initiator.to_bare(), target.to_bare());
    let digest = Sha1::digest(input.as_bytes());
    let mut out = String::with_capacity(40);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// The client half of the SOCKS5 handshake: CONNECT to the given domain.
async fn socks5_connect(stream: &mut TcpStream, domain: &str) -> io::Result<()> {
    // No-authentication greeting.
    stream.write_all(&[0x05, 0x01, 0x00]).await?;
    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await?;
    if reply != [0x05, 0x00] {
        return Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "SOCKS5 authentication negotiation failed",
        ));
    }

    // CONNECT, addressed by domain, port zero per XEP-0065.
    let mut request = vec![0x05, 0x01, 0x00, 0x03, domain.len() as u8];
    request.extend_from_slice(domain.as_bytes());
    request.extend_from_slice(&[0x00, 0x00]);
    stream.write_all(&request).await?;

    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    if header[1] != 0x00 {
        return Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "SOCKS5 connect refused",
        ));
    }
    // Drain the bound address, which nobody cares about.
    let addr_len = match header[3] {
        0x01 => 4,
        0x03 => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            usize::from(len[0])
        }
        0x04 => 16,
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "invalid SOCKS5 address type",
            ))
        }
    };
    let mut rest = vec![0u8; addr_len + 2];
    stream.read_exact(&mut rest).await?;
    Ok(())
}

/// The server half of the SOCKS5 handshake, as run by the initiator on a
/// direct candidate. Returns the domain the peer asked to connect to.
async fn socks5_serve(stream: &mut TcpStream) -> io::Result<String> {
    let mut greeting = [0u8; 2];
    stream.read_exact(&mut greeting).await?;
    if greeting[0] != 0x05 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "not a SOCKS5 greeting",
        ));
    }
    let mut methods = vec![0u8; usize::from(greeting[1])];
    stream.read_exact(&mut methods).await?;
    if !methods.contains(&0x00) {
        stream.write_all(&[0x05, 0xff]).await?;
        return Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "peer requires SOCKS5 authentication",
        ));
    }
    stream.write_all(&[0x05, 0x00]).await?;

    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    if header[1] != 0x01 || header[3] != 0x03 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "unexpected SOCKS5 request",
        ));
    }
    let mut len = [0u8; 1];
    stream.read_exact(&mut len).await?;
    let mut domain = vec![0u8; usize::from(len[0])];
    stream.read_exact(&mut domain).await?;
    let mut port = [0u8; 2];
    stream.read_exact(&mut port).await?;

    let domain = String::from_utf8(domain)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid SOCKS5 domain"))?;

    // Success, echoing the domain back as the bound address.
    let mut reply = vec![0x05, 0x00, 0x00, 0x03, domain.len() as u8];
    reply.extend_from_slice(domain.as_bytes());
    reply.extend_from_slice(&[0x00, 0x00]);
    stream.write_all(&reply).await?;
    Ok(domain)
}

impl Socks5 {
    /// The registry tag of this extension.
    pub const TAG: &'static str = "Socks5Bytestreams";

    pub(crate) fn new(ft: Arc<FileTransfer>) -> Socks5 {
        Socks5 {
            ft,
            advertised_address: Mutex::new(None),
            proxies: Mutex::new(Vec::new()),
        }
    }

    /// Sets the address peers can reach this machine on, enabling direct
    /// streamhost candidates.
    pub fn set_advertised_address<A: Into<String>>(&self, address: A) {
        *self.advertised_address.lock().unwrap() = Some(address.into());
    }

    /// Adds a proxy streamhost candidate to offer along the direct one.
    pub fn add_streamhost(&self, host: StreamHost) {
        self.proxies.lock().unwrap().push(host);
    }

    /// The target side: try each candidate until one accepts the SOCKS5
    /// connection, announce it, then pull the bytes.
    fn handle_query(&self, ctx: &ExtensionContext, iq: &Iq, query: Query) {
        let session = match self.ft.session(&query.sid) {
            Some(session)
                if session.direction == Direction::Receiving
                    && session.method == ns::BYTESTREAMS =>
            {
                session
            }
            _ => {
                let mut reply = Iq::from_error(
                    iq.id.clone(),
                    StanzaError::new(
                        ErrorType::Cancel,
                        DefinedCondition::ItemNotFound,
                        "en",
                        None,
                    ),
                );
                if let Some(from) = &iq.from {
                    reply.to = Some(from.clone());
                }
                if let Err(e) = ctx.session.send_iq_response(reply) {
                    warn!("cannot bounce bytestreams query: {}", e);
                }
                return;
            }
        };

        let ft = Arc::clone(&self.ft);
        let ctx = ctx.clone();
        let iq_id = iq.id.clone();
        let initiator = iq.from.clone();
        tokio::spawn(async move {
            let target = match ctx.session.jid() {
                Some(jid) => jid,
                None => return,
            };
            let initiator_jid = match initiator {
                Some(jid) => jid,
                None => return,
            };
            let domain = dst_addr(&session.sid, &initiator_jid, &target);

            let mut connected = None;
            for host in &query.streamhosts {
                match TcpStream::connect((host.host.as_str(), host.port)).await {
                    Ok(mut stream) => match socks5_connect(&mut stream, &domain).await {
                        Ok(()) => {
                            connected = Some((stream, host.jid.clone()));
                            break;
                        }
                        Err(e) => debug!("streamhost {} handshake failed: {}", host.host, e),
                    },
                    Err(e) => debug!("streamhost {} unreachable: {}", host.host, e),
                }
            }

            let (stream, used) = match connected {
                Some(connected) => connected,
                None => {
                    let mut reply = Iq::from_error(
                        iq_id,
                        StanzaError::new(
                            ErrorType::Cancel,
                            DefinedCondition::ItemNotFound,
                            "en",
                            Some(String::from("No reachable streamhost")),
                        ),
                    );
                    reply.to = Some(initiator_jid);
                    let _ = ctx.session.send_iq_response(reply);
                    ft.remove_session(&session.sid);
                    ft.emit_aborted(&session);
                    return;
                }
            };

            let mut answer = Query::new(session.sid.clone());
            answer.streamhost_used = Some(used);
            let mut reply = Iq::from_result(iq_id, Some(answer));
            reply.to = Some(initiator_jid);
            if ctx.session.send_iq_response(reply).is_err() {
                ft.remove_session(&session.sid);
                ft.emit_aborted(&session);
                return;
            }

            pull_bytes(stream, &ft, &session).await;
        });
    }
}

/// Reads the whole payload from the socket into the session sink, with
/// progress events along the way.
async fn pull_bytes(mut stream: TcpStream, ft: &Arc<FileTransfer>, session: &Arc<TransferSession>) {
    let mut sink = match session.take_sink() {
        Some(sink) => sink,
        None => return,
    };
    let mut buffer = vec![0u8; 8192];
    let mut remaining = session.total;
    while remaining > 0 {
        if session.is_cancelled() {
            ft.remove_session(&session.sid);
            ft.emit_aborted(session);
            return;
        }
        let n = match stream.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("socks5 read failed: {}", e);
                break;
            }
        };
        if sink.write_all(&buffer[..n]).await.is_err() {
            break;
        }
        remaining = remaining.saturating_sub(n as u64);
        session.add_transferred(n as u64);
        ft.emit_progress(session);
    }
    let _ = sink.flush().await;
    let _ = sink.shutdown().await;
    ft.remove_session(&session.sid);
    if !session.is_complete() {
        ft.emit_aborted(session);
    }
}

/// Writes the whole payload from the session source into the socket, with
/// progress events along the way.
async fn push_bytes(mut stream: TcpStream, ft: &Arc<FileTransfer>, session: &Arc<TransferSession>) {
    let mut source = match session.take_source() {
        Some(source) => source,
        None => return,
    };
    let mut buffer = vec![0u8; 8192];
    loop {
        if session.is_cancelled() {
            ft.remove_session(&session.sid);
            ft.emit_aborted(session);
            return;
        }
        let n = match source.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("socks5 source read failed: {}", e);
                break;
            }
        };
        if stream.write_all(&buffer[..n]).await.is_err() {
            break;
        }
        session.add_transferred(n as u64);
        ft.emit_progress(session);
    }
    let _ = stream.flush().await;
    let _ = stream.shutdown().await;
    ft.remove_session(&session.sid);
    if !session.is_complete() {
        ft.emit_aborted(session);
    }
}

impl Extension for Socks5 {
    fn name(&self) -> &'static str {
        Socks5::TAG
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[ns::BYTESTREAMS]
    }

    fn input_filter(&self, ctx: &ExtensionContext, stanza: &mut Stanza) -> bool {
        let iq = match stanza {
            Stanza::Iq(iq) => iq,
            _ => return false,
        };
        let payload = match &iq.payload {
            IqType::Set(payload) if payload.is("query", ns::BYTESTREAMS) => payload.clone(),
            _ => return false,
        };
        match Query::try_from(payload) {
            Ok(query) => self.handle_query(ctx, iq, query),
            Err(e) => debug!("invalid bytestreams query: {}", e),
        }
        true
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl ByteStreamBackend for Socks5 {
    fn stream_namespace(&self) -> &'static str {
        ns::BYTESTREAMS
    }

    /// The initiator side: publish candidates, wait for the peer's choice,
    /// then serve or relay the bytes.
    fn start_sending(&self, ctx: &ExtensionContext, session: Arc<TransferSession>) {
        let ft = Arc::clone(&self.ft);
        let ctx = ctx.clone();
        let advertised = self.advertised_address.lock().unwrap().clone();
        let proxies = self.proxies.lock().unwrap().clone();
        tokio::spawn(async move {
            if let Err(e) = push_session(&ctx, &ft, &session, advertised, proxies).await {
                debug!("socks5 transfer {} failed: {}", session.sid, e);
                ft.remove_session(&session.sid);
                ft.emit_aborted(&session);
            }
        });
    }

    fn abort(&self, _ctx: &ExtensionContext, session: &TransferSession) {
        session.cancel();
    }
}

async fn push_session(
    ctx: &ExtensionContext,
    ft: &Arc<FileTransfer>,
    session: &Arc<TransferSession>,
    advertised: Option<String>,
    proxies: Vec<StreamHost>,
) -> Result<(), Error> {
    let initiator = ctx.session.jid().ok_or(Error::NotConnected)?;
    let target = session.peer.clone();
    let domain = dst_addr(&session.sid, &initiator, &target);

    let mut query = Query::new(session.sid.clone());
    let mut listener = None;
    if let Some(address) = advertised {
        let bound = TcpListener::bind(("0.0.0.0", 0)).await.map_err(Error::Io)?;
        let port = bound.local_addr().map_err(Error::Io)?.port();
        query.streamhosts.push(StreamHost {
            jid: initiator.clone(),
            host: address,
            port,
        });
        listener = Some(bound);
    }
    query.streamhosts.extend(proxies.iter().cloned());
    if query.streamhosts.is_empty() {
        return Err(Error::NotSupported);
    }

    let response = ctx
        .iq_request(Iq::from_set("socks5-offer", query).with_to(target.clone()))
        .await?;
    let used = match response.payload {
        IqType::Result(Some(payload)) => Query::try_from(payload)?
            .streamhost_used
            .ok_or(Error::InvalidState)?,
        _ => return Err(Error::InvalidState),
    };

    if used == initiator {
        // Direct transfer: the peer connected to our own streamhost.
        let listener = listener.ok_or(Error::InvalidState)?;
        let accepted = tokio::time::timeout(ACCEPT_TIMEOUT, listener.accept())
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(Error::Io)?;
        let (mut stream, _) = accepted;
        let served = socks5_serve(&mut stream).await.map_err(Error::Io)?;
        if served != domain {
            return Err(Error::NotAcceptable);
        }
        push_bytes(stream, ft, session).await;
        return Ok(());
    }

    // Relayed transfer: connect to the proxy the peer picked and activate
    // the stream there. Best-effort, as proxies go.
    let proxy = proxies
        .into_iter()
        .find(|proxy| proxy.jid == used)
        .ok_or(Error::InvalidState)?;
    let mut stream = TcpStream::connect((proxy.host.as_str(), proxy.port))
        .await
        .map_err(Error::Io)?;
    socks5_connect(&mut stream, &domain).await.map_err(Error::Io)?;

    let mut activate = Query::new(session.sid.clone());
    activate.activate = Some(target);
    ctx.iq_request(Iq::from_set("socks5-activate", activate).with_to(proxy.jid))
        .await?;

    push_bytes(stream, ft, session).await;
    Ok(())
}
