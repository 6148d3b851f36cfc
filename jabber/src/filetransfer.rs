// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The SI file-transfer coordinator (XEP-0096): owns the session table,
//! answers offers, picks a byte-stream method, and drives the chosen
//! backend.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rand::{thread_rng, Rng};
use tokio::io::AsyncRead;

use jabber_stanzas::jid::Jid;
use jabber_stanzas::ns;
use jabber_stanzas::si::{StreamInitiation as SiPayload, TransferFile};
use jabber_stanzas::stanza_error::{DefinedCondition, ErrorType, StanzaError};
use tokio_jabber::Error;

use crate::event::Event;
use crate::extension::{Extension, ExtensionContext};
use crate::si::{SiProfile, StreamInitiation};

/// An inbound transfer offer, as shown to the acceptance callback.
#[derive(Debug, Clone)]
pub struct FileTransferOffer {
    /// The session identifier proposed by the sender.
    pub sid: String,

    /// The sender.
    pub from: Option<Jid>,

    /// The file name the sender suggests.
    pub name: String,

    /// The size of the file in bytes.
    pub size: u64,

    /// An optional description.
    pub description: Option<String>,
}

/// Which way the bytes flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// We offer and push the file.
    Sending,

    /// The peer pushes, we store.
    Receiving,
}

/// Where the bytes come from on the sending side.
pub type TransferSource = Box<dyn AsyncRead + Send + Unpin>;

/// The payload stream of a transfer session, handed to the backend once.
pub enum TransferStream {
    /// The sending side reads from here.
    Source(Option<TransferSource>),

    /// The receiving side writes here.
    Sink(Option<crate::callbacks::TransferSink>),
}

/// One file transfer, keyed by its sid.
pub struct TransferSession {
    /// The session identifier.
    pub sid: String,

    /// Which way the bytes flow.
    pub direction: Direction,

    /// The other side.
    pub peer: Jid,

    /// The file name of this transfer.
    pub name: String,

    /// The total number of bytes to move.
    pub total: u64,

    /// The bytes moved so far; never exceeds `total`.
    transferred: Mutex<u64>,

    /// The namespace of the byte-stream method this session uses.
    pub method: String,

    /// The data stream; the backend takes it when the transfer starts.
    pub stream: Mutex<TransferStream>,

    cancelled: AtomicBool,
}

impl TransferSession {
    pub(crate) fn new(
        sid: String,
        direction: Direction,
        peer: Jid,
        name: String,
        total: u64,
        method: String,
        stream: TransferStream,
    ) -> TransferSession {
        TransferSession {
            sid,
            direction,
            peer,
            name,
            total,
            transferred: Mutex::new(0),
            method,
            stream: Mutex::new(stream),
            cancelled: AtomicBool::new(false),
        }
    }

    /// The bytes moved so far.
    pub fn transferred(&self) -> u64 {
        *self.transferred.lock().unwrap()
    }

    /// Whether the transfer has moved every byte.
    pub fn is_complete(&self) -> bool {
        self.transferred() == self.total
    }

    /// Marks the session cancelled; backends poll this between chunks.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the session was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Records progress, clamped to the total.
    pub(crate) fn add_transferred(&self, bytes: u64) -> u64 {
        let mut transferred = self.transferred.lock().unwrap();
        *transferred = (*transferred + bytes).min(self.total);
        *transferred
    }

    /// Takes the source out of the session; only the backend does this.
    pub(crate) fn take_source(&self) -> Option<TransferSource> {
        match *self.stream.lock().unwrap() {
            TransferStream::Source(ref mut source) => source.take(),
            TransferStream::Sink(_) => None,
        }
    }

    /// Takes the sink out of the session; only the backend does this.
    pub(crate) fn take_sink(&self) -> Option<crate::callbacks::TransferSink> {
        match *self.stream.lock().unwrap() {
            TransferStream::Sink(ref mut sink) => sink.take(),
            TransferStream::Source(_) => None,
        }
    }
}

/// The contract between the coordinator and a byte-stream backend.
pub trait ByteStreamBackend: Send + Sync {
    /// The namespace this backend negotiates under.
    fn stream_namespace(&self) -> &'static str;

    /// Starts pushing an accepted outbound session.
    fn start_sending(&self, ctx: &ExtensionContext, session: Arc<TransferSession>);

    /// Aborts a session this backend is driving.
    fn abort(&self, ctx: &ExtensionContext, session: &TransferSession);
}

/// The file-transfer coordinator extension.
pub struct FileTransfer {
    ctx: ExtensionContext,
    si: Arc<StreamInitiation>,
    sessions: Mutex<HashMap<String, Arc<TransferSession>>>,
    backends: Mutex<Vec<Arc<dyn ByteStreamBackend>>>,
    force_in_band: AtomicBool,
}

impl FileTransfer {
    /// The registry tag of this extension.
    pub const TAG: &'static str = "SiFileTransfer";

    pub(crate) fn new(ctx: ExtensionContext, si: Arc<StreamInitiation>) -> FileTransfer {
        FileTransfer {
            ctx,
            si,
            sessions: Mutex::new(HashMap::new()),
            backends: Mutex::new(Vec::new()),
            force_in_band: AtomicBool::new(false),
        }
    }

    /// Registers a byte-stream backend; called by the backend extensions
    /// while they load.
    pub fn register_backend(&self, backend: Arc<dyn ByteStreamBackend>) {
        self.backends.lock().unwrap().push(backend);
    }

    /// Skips SOCKS5 and negotiates everything in-band.
    pub fn set_force_in_band(&self, force: bool) {
        self.force_in_band.store(force, Ordering::SeqCst);
    }

    fn backend(&self, namespace: &str) -> Option<Arc<dyn ByteStreamBackend>> {
        self.backends
            .lock()
            .unwrap()
            .iter()
            .find(|backend| backend.stream_namespace() == namespace)
            .cloned()
    }

    /// The method preference: SOCKS5 over IBB, intersected with what both
    /// sides speak; `force_in_band` drops SOCKS5 from consideration.
    fn pick_method(&self, offered: &[String]) -> Option<String> {
        let force_in_band = self.force_in_band.load(Ordering::SeqCst);
        let mut ranked = vec![];
        if !force_in_band {
            ranked.push(ns::BYTESTREAMS);
        }
        ranked.push(ns::IBB);
        for method in ranked {
            if offered.iter().any(|m| m == method) && self.backend(method).is_some() {
                return Some(String::from(method));
            }
        }
        None
    }

    /// The methods we can offer when sending.
    fn local_methods(&self) -> Vec<&'static str> {
        let force_in_band = self.force_in_band.load(Ordering::SeqCst);
        self.backends
            .lock()
            .unwrap()
            .iter()
            .map(|backend| backend.stream_namespace())
            .filter(|namespace| !force_in_band || *namespace != ns::BYTESTREAMS)
            .collect()
    }

    /// A snapshot of the session with this sid.
    pub fn session(&self, sid: &str) -> Option<Arc<TransferSession>> {
        self.sessions.lock().unwrap().get(sid).cloned()
    }

    pub(crate) fn remove_session(&self, sid: &str) -> Option<Arc<TransferSession>> {
        self.sessions.lock().unwrap().remove(sid)
    }

    pub(crate) fn insert_session(&self, session: Arc<TransferSession>) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.sid.clone(), session);
    }

    pub(crate) fn emit_progress(&self, session: &TransferSession) {
        self.ctx.emit(Event::FileTransferProgress {
            sid: session.sid.clone(),
            name: session.name.clone(),
            transferred: session.transferred(),
            total: session.total,
        });
    }

    pub(crate) fn emit_aborted(&self, session: &TransferSession) {
        self.ctx.emit(Event::FileTransferAborted {
            sid: session.sid.clone(),
        });
    }

    /// Offers a file to a peer and, once the peer picked a method, starts
    /// the matching backend.
    pub async fn initiate(
        &self,
        to: Jid,
        name: &str,
        size: u64,
        description: Option<&str>,
        source: TransferSource,
    ) -> Result<String, Error> {
        let sid: String = format!("si-{}", thread_rng().gen::<u64>());
        let methods = self.local_methods();
        if methods.is_empty() {
            return Err(Error::NotSupported);
        }

        let mut file = TransferFile::new(name, size);
        file.desc = description.map(String::from);
        let offer = SiPayload::new_offer(&sid, file, &methods);

        let answer = self.si.send_offer(&self.ctx, to.clone(), offer).await?;
        let method = answer
            .selected_method()
            .map(String::from)
            .ok_or(Error::NotAcceptable)?;
        let backend = self.backend(&method).ok_or(Error::NotSupported)?;

        let session = Arc::new(TransferSession::new(
            sid.clone(),
            Direction::Sending,
            to,
            String::from(name),
            size,
            method,
            TransferStream::Source(Some(source)),
        ));
        self.sessions
            .lock()
            .unwrap()
            .insert(sid.clone(), session.clone());

        backend.start_sending(&self.ctx, session);
        Ok(sid)
    }

    /// Cancels a transfer and notifies the backend driving it.
    pub fn cancel(&self, sid: &str) -> Result<(), Error> {
        let session = self
            .session(sid)
            .ok_or(Error::InvalidArgument("unknown transfer sid"))?;
        session.cancel();
        if let Some(backend) = self.backend(&session.method) {
            backend.abort(&self.ctx, &session);
        }
        self.remove_session(sid);
        self.emit_aborted(&session);
        Ok(())
    }
}

impl SiProfile for FileTransfer {
    fn handle_offer(
        &self,
        ctx: &ExtensionContext,
        from: Option<&Jid>,
        offer: &SiPayload,
    ) -> Result<SiPayload, StanzaError> {
        let not_acceptable = || {
            StanzaError::new(
                ErrorType::Cancel,
                DefinedCondition::NotAcceptable,
                "en",
                None,
            )
        };

        let sid = match &offer.sid {
            Some(sid) if !sid.is_empty() => sid.clone(),
            _ => {
                return Err(StanzaError::new(
                    ErrorType::Modify,
                    DefinedCondition::BadRequest,
                    "en",
                    Some(String::from("Missing stream id")),
                ))
            }
        };

        // A duplicate sid is a hard conflict, per the SI rules.
        if self.sessions.lock().unwrap().contains_key(&sid) {
            return Err(StanzaError::new(
                ErrorType::Cancel,
                DefinedCondition::Conflict,
                "en",
                None,
            ));
        }

        let method = match self.pick_method(&offer.offered_methods()) {
            Some(method) => method,
            None => return Err(not_acceptable()),
        };

        let file = match &offer.file {
            Some(file) => file.clone(),
            None => {
                return Err(StanzaError::new(
                    ErrorType::Modify,
                    DefinedCondition::BadRequest,
                    "en",
                    Some(String::from("Missing file description")),
                ))
            }
        };

        let description = FileTransferOffer {
            sid: sid.clone(),
            from: from.cloned(),
            name: file.name.clone(),
            size: file.size,
            description: file.desc.clone(),
        };
        let sink = match ctx.callbacks.decide_file_transfer(&description) {
            Some(Some(sink)) => sink,
            // Rejected by the callback, or nobody is willing to decide.
            Some(None) | None => return Err(not_acceptable()),
        };

        let peer = match from {
            Some(from) => from.clone(),
            None => return Err(not_acceptable()),
        };
        let session = Arc::new(TransferSession::new(
            sid.clone(),
            Direction::Receiving,
            peer,
            file.name.clone(),
            file.size,
            method.clone(),
            TransferStream::Sink(Some(sink)),
        ));
        self.sessions.lock().unwrap().insert(sid, session);

        Ok(SiPayload::new_selection(&method))
    }
}

impl Extension for FileTransfer {
    fn name(&self) -> &'static str {
        FileTransfer::TAG
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[ns::SI_FILE_TRANSFER]
    }

    fn detached(&self) {
        // Closing down aborts everything still moving.
        let sessions: Vec<_> = {
            let mut sessions = self.sessions.lock().unwrap();
            sessions.drain().map(|(_, session)| session).collect()
        };
        for session in sessions {
            session.cancel();
            self.emit_aborted(&session);
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::TransferSink;

    struct NullBackend(&'static str);

    impl ByteStreamBackend for NullBackend {
        fn stream_namespace(&self) -> &'static str {
            self.0
        }

        fn start_sending(&self, _ctx: &ExtensionContext, _session: Arc<TransferSession>) {}

        fn abort(&self, _ctx: &ExtensionContext, _session: &TransferSession) {}
    }

    fn coordinator() -> FileTransfer {
        let ctx = crate::test_support::offline_context();
        let ft = FileTransfer::new(ctx, Arc::new(StreamInitiation::new()));
        ft.register_backend(Arc::new(NullBackend(ns::BYTESTREAMS)));
        ft.register_backend(Arc::new(NullBackend(ns::IBB)));
        ft
    }

    fn offer(sid: &str, methods: &[&str]) -> SiPayload {
        SiPayload::new_offer(sid, TransferFile::new("a.bin", 2048), methods)
    }

    fn accept_all(ft: &FileTransfer) {
        ft.ctx.callbacks.set_file_transfer(Box::new(|_offer| {
            let sink: TransferSink = Box::new(tokio::io::sink());
            Some(sink)
        }));
    }

    #[test]
    fn test_socks5_preferred_over_ibb() {
        let ft = coordinator();
        accept_all(&ft);
        let answer = ft
            .handle_offer(
                &ft.ctx.clone(),
                Some(&Jid::new("bob@test/pda").unwrap()),
                &offer("s1", &[ns::IBB, ns::BYTESTREAMS]),
            )
            .unwrap();
        assert_eq!(answer.selected_method(), Some(ns::BYTESTREAMS));
    }

    #[test]
    fn test_force_in_band_skips_socks5() {
        let ft = coordinator();
        accept_all(&ft);
        ft.set_force_in_band(true);
        let answer = ft
            .handle_offer(
                &ft.ctx.clone(),
                Some(&Jid::new("bob@test/pda").unwrap()),
                &offer("s2", &[ns::IBB, ns::BYTESTREAMS]),
            )
            .unwrap();
        assert_eq!(answer.selected_method(), Some(ns::IBB));
    }

    #[test]
    fn test_duplicate_sid_conflicts() {
        let ft = coordinator();
        accept_all(&ft);
        let from = Jid::new("bob@test/pda").unwrap();
        ft.handle_offer(&ft.ctx.clone(), Some(&from), &offer("dup", &[ns::IBB]))
            .unwrap();
        let error = ft
            .handle_offer(&ft.ctx.clone(), Some(&from), &offer("dup", &[ns::IBB]))
            .unwrap_err();
        assert_eq!(error.defined_condition, DefinedCondition::Conflict);
    }

    #[test]
    fn test_no_common_method() {
        let ft = coordinator();
        accept_all(&ft);
        let error = ft
            .handle_offer(
                &ft.ctx.clone(),
                Some(&Jid::new("bob@test/pda").unwrap()),
                &offer("s3", &["urn:example:custom-stream"]),
            )
            .unwrap_err();
        assert_eq!(error.defined_condition, DefinedCondition::NotAcceptable);
    }

    #[test]
    fn test_rejection_by_callback() {
        let ft = coordinator();
        ft.ctx
            .callbacks
            .set_file_transfer(Box::new(|_offer| None));
        let error = ft
            .handle_offer(
                &ft.ctx.clone(),
                Some(&Jid::new("bob@test/pda").unwrap()),
                &offer("s4", &[ns::IBB]),
            )
            .unwrap_err();
        assert_eq!(error.defined_condition, DefinedCondition::NotAcceptable);
    }

    #[test]
    fn test_progress_is_clamped() {
        let session = TransferSession {
            sid: String::from("s"),
            direction: Direction::Sending,
            peer: Jid::new("bob@test").unwrap(),
            name: String::from("a.bin"),
            total: 10,
            transferred: Mutex::new(0),
            method: String::from(ns::IBB),
            stream: Mutex::new(TransferStream::Source(None)),
            cancelled: AtomicBool::new(false),
        };
        assert_eq!(session.add_transferred(6), 6);
        assert!(!session.is_complete());
        assert_eq!(session.add_transferred(6), 10);
        assert!(session.is_complete());
    }
}
