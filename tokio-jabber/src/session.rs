// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The session engine: negotiation, dispatch, and IQ correlation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use minidom::Element;
use rand::{thread_rng, Rng};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

use jabber_stanzas::iq::{Iq, IqType};
use jabber_stanzas::jid::Jid;
use jabber_stanzas::ns;
use jabber_stanzas::stream::StreamError;

use crate::auth::auth;
use crate::bind::{bind, establish_session};
use crate::codec::{Packet, XmppCodec};
use crate::connect::{starttls, CertificateValidator, Connection};
use crate::error::{Error, ProtocolError};
use crate::event::{SessionEvent, SessionState, Stanza};
use crate::xmlstream::XmlStream;

/// When to upgrade the transport to TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Never upgrade; fails with [`Error::TlsRequiredByServer`] when the
    /// server insists.
    Disabled,
    /// Upgrade when the server offers it.
    Opportunistic,
    /// Fail when the server does not offer an upgrade.
    Required,
}

/// Everything needed to establish a session.
pub struct Config {
    /// The host to connect to.
    pub host: String,
    /// The port to connect to.
    pub port: u16,
    /// The account address; its resource, if any, is suggested to the
    /// server during binding.
    pub jid: Jid,
    /// The account password.
    pub password: String,
    /// The TLS upgrade policy.
    pub tls: TlsPolicy,
    /// Allows the PLAIN mechanism over an unencrypted channel.
    pub allow_plain_cleartext: bool,
    /// How long to wait for IQ responses; `None` waits forever.
    pub default_timeout: Option<Duration>,
    /// Replaces the built-in webpki certificate validation when set.
    pub certificate_validator: Option<Arc<dyn CertificateValidator>>,
}

impl Config {
    /// Creates a configuration with the defaults: port 5222, opportunistic
    /// STARTTLS, a 30 second IQ timeout.
    pub fn new<H: Into<String>, P: Into<String>>(host: H, jid: Jid, password: P) -> Config {
        Config {
            host: host.into(),
            port: 5222,
            jid,
            password: password.into(),
            tls: TlsPolicy::Opportunistic,
            allow_plain_cleartext: false,
            default_timeout: Some(Duration::from_secs(30)),
            certificate_validator: None,
        }
    }
}

enum WriterCmd {
    Stanza(Element),
    End,
}

type PendingMap = HashMap<String, oneshot::Sender<Result<Iq, Error>>>;

struct SessionInner {
    config: Config,
    state_tx: watch::Sender<SessionState>,
    // Kept so that the watch channel never closes.
    state_rx: watch::Receiver<SessionState>,
    pending: Mutex<PendingMap>,
    writer: Mutex<Option<mpsc::UnboundedSender<WriterCmd>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    jid: Mutex<Option<Jid>>,
    default_timeout: Mutex<Option<Duration>>,
    encrypted: AtomicBool,
    disposed: AtomicBool,
}

/// A handle on one long-lived session. Cheap to clone; all clones drive the
/// same connection.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

fn make_id() -> String {
    let id: u64 = thread_rng().gen();
    format!("{}", id)
}

/// Gives a stanza an id when the caller didn't set one.
pub(crate) fn add_stanza_id(mut stanza: Element) -> Element {
    if stanza.is("iq", ns::DEFAULT_NS)
        || stanza.is("message", ns::DEFAULT_NS)
        || stanza.is("presence", ns::DEFAULT_NS)
    {
        if stanza.attr("id").is_none() {
            stanza.set_attr("id", make_id());
        }
    }
    stanza
}

impl Session {
    /// Creates a disconnected session handle and its inbound event channel.
    /// Nothing touches the network until [`Session::connect`] is called.
    pub fn new(config: Config) -> (Session, mpsc::UnboundedReceiver<SessionEvent>) {
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let default_timeout = config.default_timeout;
        let inner = Arc::new(SessionInner {
            config,
            state_tx,
            state_rx,
            pending: Mutex::new(HashMap::new()),
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            events_tx,
            jid: Mutex::new(None),
            default_timeout: Mutex::new(default_timeout),
            encrypted: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        });
        (Session { inner }, events_rx)
    }

    /// Connects, negotiates TLS and SASL, binds a resource. On return the
    /// session is `Ready` and a full JID is available.
    pub async fn connect(&self) -> Result<(), Error> {
        if self.is_ready() {
            return Err(Error::InvalidState);
        }
        self.establish().await
    }

    fn set_state(&self, state: SessionState) {
        self.inner.state_tx.send_replace(state);
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.inner.state_rx.borrow()
    }

    /// A receiver notified on every state transition.
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.inner.state_rx.clone()
    }

    /// The full JID bound by the server, available from `Ready` on.
    pub fn jid(&self) -> Option<Jid> {
        self.inner.jid.lock().unwrap().clone()
    }

    /// Whether the transport is TLS-encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.inner.encrypted.load(Ordering::SeqCst)
    }

    /// Whether the session is ready for traffic.
    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// The session-wide IQ timeout; `None` waits forever.
    pub fn default_timeout(&self) -> Option<Duration> {
        *self.inner.default_timeout.lock().unwrap()
    }

    /// Changes the session-wide IQ timeout.
    pub fn set_default_timeout(&self, timeout: Option<Duration>) {
        *self.inner.default_timeout.lock().unwrap() = timeout;
    }

    fn check_usable(&self) -> Result<(), Error> {
        if self.inner.disposed.load(Ordering::SeqCst) {
            return Err(Error::Disposed);
        }
        Ok(())
    }

    /// Runs the whole negotiation sequence and spawns the reader and writer
    /// tasks.
    async fn establish(&self) -> Result<(), Error> {
        self.check_usable()?;
        let inner = &self.inner;
        let config = &inner.config;

        self.set_state(SessionState::Connecting);
        let connection = match Connection::connect(&config.host, config.port).await {
            Ok(connection) => connection,
            Err(e) => {
                self.set_state(SessionState::Disconnected);
                return Err(e);
            }
        };

        let result = self.negotiate(connection).await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                self.set_state(SessionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn negotiate(&self, connection: Connection) -> Result<(), Error> {
        let inner = &self.inner;
        let config = &inner.config;
        let domain = config.jid.domain().to_owned();

        let mut stream = XmlStream::start(connection, domain.clone()).await?;
        self.set_state(SessionState::StreamOpened);

        // TLS upgrade, when policy and features agree.
        let offered = stream.stream_features.can_starttls();
        let required = stream.stream_features.tls_required();
        match config.tls {
            TlsPolicy::Disabled if required => return Err(Error::TlsRequiredByServer),
            TlsPolicy::Disabled => (),
            TlsPolicy::Required if !offered => {
                return Err(ProtocolError::NoTls.into());
            }
            TlsPolicy::Opportunistic if !offered => (),
            TlsPolicy::Required | TlsPolicy::Opportunistic => {
                self.set_state(SessionState::TlsNegotiating);
                let tls_connection =
                    starttls(stream, config.certificate_validator.clone()).await?;
                inner.encrypted.store(true, Ordering::SeqCst);
                stream = XmlStream::start(tls_connection, domain.clone()).await?;
                self.set_state(SessionState::StreamReopened);
            }
        }

        // SASL.
        self.set_state(SessionState::SaslInProgress);
        let username = config
            .jid
            .node()
            .ok_or(Error::InvalidArgument("account JID must have a node part"))?
            .to_owned();
        let channel_binding = stream.stream.get_ref().channel_binding();
        auth(
            &mut stream,
            &username,
            &config.password,
            channel_binding,
            self.is_encrypted(),
            config.allow_plain_cleartext,
        )
        .await?;
        stream = stream.restart().await?;
        self.set_state(SessionState::Authenticated);

        // Resource binding and the legacy session.
        self.set_state(SessionState::Binding);
        let resource = config.jid.resource().map(str::to_owned);
        let jid = bind(&mut stream, resource).await?;
        establish_session(&mut stream).await?;
        *inner.jid.lock().unwrap() = Some(jid.clone());
        self.set_state(SessionState::Ready);

        // Hand the two stream halves to their tasks.
        let (sink, source) = stream.stream.split();
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        *inner.writer.lock().unwrap() = Some(writer_tx);
        tokio::spawn(writer_loop(sink, writer_rx));
        let reader = tokio::spawn(reader_loop(self.clone(), source));
        *inner.reader.lock().unwrap() = Some(reader);

        let _ = inner.events_tx.send(SessionEvent::Online { jid });
        Ok(())
    }

    /// Serializes one element on the stream. Safe to call from any task;
    /// elements appear on the wire in call order.
    pub fn send_stanza(&self, stanza: Element) -> Result<(), Error> {
        self.check_usable()?;
        let writer = self.inner.writer.lock().unwrap();
        let writer = writer.as_ref().ok_or(Error::NotConnected)?;
        writer
            .send(WriterCmd::Stanza(add_stanza_id(stanza)))
            .map_err(|_| Error::NotConnected)
    }

    fn fresh_id(&self) -> String {
        make_id()
    }

    /// Sends an iq request and waits for the correlated response, using the
    /// session default timeout.
    ///
    /// The request is assigned a fresh unique id; the returned iq is the
    /// `result` payload, while `error` responses surface as
    /// [`Error::Stanza`].
    pub async fn iq_request(&self, iq: Iq) -> Result<Iq, Error> {
        let timeout = self.default_timeout();
        self.iq_request_with_timeout(iq, timeout).await
    }

    /// Like [`Session::iq_request`], with an explicit timeout; `None` waits
    /// forever.
    pub async fn iq_request_with_timeout(
        &self,
        mut iq: Iq,
        timeout: Option<Duration>,
    ) -> Result<Iq, Error> {
        self.check_usable()?;
        if !self.is_ready() {
            return Err(Error::NotConnected);
        }

        let id = self.fresh_id();
        iq.id = id.clone();
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().unwrap().insert(id.clone(), tx);

        if let Err(e) = self.send_stanza(iq.into()) {
            self.inner.pending.lock().unwrap().remove(&id);
            return Err(e);
        }

        let received = match timeout {
            Some(duration) => match tokio::time::timeout(duration, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.inner.pending.lock().unwrap().remove(&id);
                    return Err(Error::Timeout);
                }
            },
            None => rx.await,
        };

        match received {
            Ok(result) => result,
            // The sender was dropped without a verdict; session teardown.
            Err(_) => Err(Error::Cancelled),
        }
    }

    /// Fire-and-forget variant of [`Session::iq_request`]: the callback is
    /// invoked exactly once, with the response or with the error that ended
    /// the wait.
    pub fn iq_request_callback<F>(&self, iq: Iq, callback: F)
    where
        F: FnOnce(Result<Iq, Error>) + Send + 'static,
    {
        let session = self.clone();
        tokio::spawn(async move {
            callback(session.iq_request(iq).await);
        });
    }

    /// Sends an iq response (result or error) for a request we received.
    pub fn send_iq_response(&self, iq: Iq) -> Result<(), Error> {
        self.send_stanza(iq.into())
    }

    fn release_pending(&self, mk_err: impl Fn() -> Error) {
        let pending: Vec<_> = {
            let mut map = self.inner.pending.lock().unwrap();
            map.drain().collect()
        };
        for (_, tx) in pending {
            let _ = tx.send(Err(mk_err()));
        }
    }

    fn teardown_tasks(&self) {
        *self.inner.writer.lock().unwrap() = None;
        if let Some(reader) = self.inner.reader.lock().unwrap().take() {
            reader.abort();
        }
    }

    /// Tears the connection down and re-runs the whole negotiation.
    /// Outstanding IQ waiters resolve with [`Error::ConnectionLost`];
    /// session-scoped state restoration (roster, presence) is the upper
    /// layer's business.
    pub async fn reconnect(&self) -> Result<(), Error> {
        self.check_usable()?;
        self.teardown_tasks();
        self.release_pending(|| Error::ConnectionLost);
        *self.inner.jid.lock().unwrap() = None;
        self.inner.encrypted.store(false, Ordering::SeqCst);
        self.set_state(SessionState::Disconnected);
        self.establish().await
    }

    /// Closes the session for good: sends the closing envelope, cancels all
    /// waiters, and invalidates the handle. Every subsequent operation
    /// fails with [`Error::Disposed`]. Idempotent.
    pub async fn close(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.set_state(SessionState::Closing);
        self.release_pending(|| Error::Cancelled);
        if let Some(writer) = self.inner.writer.lock().unwrap().take() {
            let _ = writer.send(WriterCmd::End);
        }
        if let Some(reader) = self.inner.reader.lock().unwrap().take() {
            reader.abort();
        }
        let _ = self
            .inner
            .events_tx
            .send(SessionEvent::Disconnected(Error::Disconnected));
        self.set_state(SessionState::Disconnected);
    }

    /// Called from the reader on a fatal stream condition.
    fn connection_lost(&self, error: Error) {
        self.teardown_tasks();
        self.release_pending(|| Error::ConnectionLost);
        self.set_state(SessionState::Lost);
        let _ = self.inner.events_tx.send(SessionEvent::Disconnected(error));
    }

    /// Routes one inbound top-level element. Returns true when the element
    /// was fatal for the stream.
    fn dispatch(&self, elem: Element) -> bool {
        if elem.is("error", ns::STREAM) {
            let error = match StreamError::try_from(elem) {
                Ok(error) => Error::Stream(error),
                Err(e) => e.into(),
            };
            self.connection_lost(error);
            return true;
        }

        let stanza = match Stanza::classify(elem) {
            Ok(Some(stanza)) => stanza,
            Ok(None) => {
                debug!("ignoring unknown non-stanza element");
                return false;
            }
            Err(e) => {
                // A malformed stanza is reported but doesn't kill the
                // stream.
                let _ = self.inner.events_tx.send(SessionEvent::ParseError(e));
                return false;
            }
        };

        // IQ responses are correlated here; everything else goes up.
        if let Stanza::Iq(iq) = &stanza {
            match iq.payload {
                IqType::Result(_) | IqType::Error(_) => {
                    let waiter = self.inner.pending.lock().unwrap().remove(&iq.id);
                    match waiter {
                        Some(tx) => {
                            let verdict = match &iq.payload {
                                IqType::Error(error) => Err(Error::Stanza(error.clone())),
                                _ => Ok(iq.clone()),
                            };
                            let _ = tx.send(verdict);
                        }
                        None => {
                            debug!("dropping unsolicited iq response with id {}", iq.id);
                        }
                    }
                    return false;
                }
                IqType::Get(_) | IqType::Set(_) => (),
            }
        }

        let _ = self.inner.events_tx.send(SessionEvent::Stanza(stanza));
        false
    }
}

async fn writer_loop(
    mut sink: SplitSink<Framed<Connection, XmppCodec>, Packet>,
    mut rx: mpsc::UnboundedReceiver<WriterCmd>,
) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WriterCmd::Stanza(stanza) => {
                if let Err(e) = sink.send(Packet::Stanza(stanza)).await {
                    warn!("write error: {}", e);
                    break;
                }
            }
            WriterCmd::End => {
                let _ = sink.send(Packet::StreamEnd).await;
                let _ = sink.close().await;
                break;
            }
        }
    }
}

async fn reader_loop(session: Session, mut source: SplitStream<Framed<Connection, XmppCodec>>) {
    loop {
        match source.next().await {
            Some(Ok(Packet::Stanza(elem))) => {
                if session.dispatch(elem) {
                    break;
                }
            }
            Some(Ok(Packet::Text(_))) => (),
            Some(Ok(Packet::StreamStart(_))) => {
                session.connection_lost(ProtocolError::InvalidStreamStart.into());
                break;
            }
            Some(Ok(Packet::StreamEnd)) => {
                session.connection_lost(Error::Disconnected);
                break;
            }
            Some(Err(e)) => {
                session.connection_lost(e);
                break;
            }
            None => {
                session.connection_lost(Error::Disconnected);
                break;
            }
        }
    }
}
