// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The in-band bytestream backend (XEP-0047): file data chunked into
//! base64 iq stanzas on the XMPP stream itself.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

use jabber_stanzas::ibb::{Close, Data, Open, Stanza as IbbStanza, StreamId};
use jabber_stanzas::iq::{Iq, IqType};
use jabber_stanzas::jid::Jid;
use jabber_stanzas::ns;
use jabber_stanzas::stanza_error::{DefinedCondition, ErrorType, StanzaError};
use tokio_jabber::{Error, Stanza};

use crate::extension::{Extension, ExtensionContext};
use crate::filetransfer::{ByteStreamBackend, Direction, FileTransfer, TransferSession};

const BLOCK_SIZE: u16 = 4096;

enum SinkCmd {
    Chunk(Vec<u8>),
    Close,
    Abort,
}

struct InboundStream {
    expected_seq: u16,
    writer: mpsc::UnboundedSender<SinkCmd>,
}

/// The IBB backend extension.
pub struct Ibb {
    ft: Arc<FileTransfer>,
    inbound: Mutex<HashMap<String, InboundStream>>,
}

impl Ibb {
    /// The registry tag of this extension.
    pub const TAG: &'static str = "InBandBytestreams";

    pub(crate) fn new(ft: Arc<FileTransfer>) -> Ibb {
        Ibb {
            ft,
            inbound: Mutex::new(HashMap::new()),
        }
    }

    fn reply_result(&self, ctx: &ExtensionContext, iq: &Iq) {
        let mut reply = Iq::empty_result(iq.id.clone());
        if let Some(from) = &iq.from {
            reply.to = Some(from.clone());
        }
        if let Err(e) = ctx.session.send_iq_response(reply) {
            warn!("cannot acknowledge ibb frame: {}", e);
        }
    }

    fn reply_error(&self, ctx: &ExtensionContext, iq: &Iq, condition: DefinedCondition) {
        let mut reply = Iq::from_error(
            iq.id.clone(),
            StanzaError::new(ErrorType::Cancel, condition, "en", None),
        );
        if let Some(from) = &iq.from {
            reply.to = Some(from.clone());
        }
        if let Err(e) = ctx.session.send_iq_response(reply) {
            warn!("cannot bounce ibb frame: {}", e);
        }
    }

    /// Starts the sink writer task for an accepted inbound session.
    fn handle_open(&self, ctx: &ExtensionContext, iq: &Iq, open: Open) {
        let session = match self.ft.session(&open.sid.0) {
            Some(session)
                if session.direction == Direction::Receiving && session.method == ns::IBB =>
            {
                session
            }
            _ => {
                self.reply_error(ctx, iq, DefinedCondition::NotAcceptable);
                return;
            }
        };
        let sink = match session.take_sink() {
            Some(sink) => sink,
            None => {
                self.reply_error(ctx, iq, DefinedCondition::UnexpectedRequest);
                return;
            }
        };

        let (writer, mut chunks) = mpsc::unbounded_channel();
        self.inbound.lock().unwrap().insert(
            open.sid.0.clone(),
            InboundStream {
                expected_seq: 0,
                writer,
            },
        );

        let ft = Arc::clone(&self.ft);
        let mut sink = sink;
        tokio::spawn(async move {
            while let Some(cmd) = chunks.recv().await {
                match cmd {
                    SinkCmd::Chunk(chunk) => {
                        if let Err(e) = sink.write_all(&chunk).await {
                            warn!("ibb sink write failed: {}", e);
                            ft.remove_session(&session.sid);
                            ft.emit_aborted(&session);
                            return;
                        }
                        session.add_transferred(chunk.len() as u64);
                        ft.emit_progress(&session);
                    }
                    SinkCmd::Close => {
                        let _ = sink.flush().await;
                        let _ = sink.shutdown().await;
                        ft.remove_session(&session.sid);
                        return;
                    }
                    SinkCmd::Abort => {
                        ft.remove_session(&session.sid);
                        ft.emit_aborted(&session);
                        return;
                    }
                }
            }
        });

        self.reply_result(ctx, iq);
    }

    /// Validates the sequence number and queues the chunk; a hole or a
    /// duplicate aborts the whole stream.
    fn handle_data(&self, ctx: &ExtensionContext, iq: Option<&Iq>, data: Data) {
        let mut inbound = self.inbound.lock().unwrap();
        let stream = match inbound.get_mut(&data.sid.0) {
            Some(stream) => stream,
            None => {
                if let Some(iq) = iq {
                    self.reply_error(ctx, iq, DefinedCondition::ItemNotFound);
                }
                return;
            }
        };

        if data.seq != stream.expected_seq {
            debug!(
                "ibb sequence mismatch on {}: got {}, expected {}",
                data.sid.0, data.seq, stream.expected_seq
            );
            let _ = stream.writer.send(SinkCmd::Abort);
            inbound.remove(&data.sid.0);
            if let Some(iq) = iq {
                self.reply_error(ctx, iq, DefinedCondition::UnexpectedRequest);
            }
            return;
        }
        stream.expected_seq = stream.expected_seq.wrapping_add(1);
        let _ = stream.writer.send(SinkCmd::Chunk(data.data));
        if let Some(iq) = iq {
            self.reply_result(ctx, iq);
        }
    }

    fn handle_close(&self, ctx: &ExtensionContext, iq: &Iq, close: Close) {
        match self.inbound.lock().unwrap().remove(&close.sid.0) {
            Some(stream) => {
                let _ = stream.writer.send(SinkCmd::Close);
                self.reply_result(ctx, iq);
            }
            None => self.reply_error(ctx, iq, DefinedCondition::ItemNotFound),
        }
    }
}

impl Extension for Ibb {
    fn name(&self) -> &'static str {
        Ibb::TAG
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[ns::IBB]
    }

    fn input_filter(&self, ctx: &ExtensionContext, stanza: &mut Stanza) -> bool {
        match stanza {
            Stanza::Iq(iq) => {
                let payload = match &iq.payload {
                    IqType::Set(payload) if payload.has_ns(ns::IBB) => payload.clone(),
                    _ => return false,
                };
                if payload.is("open", ns::IBB) {
                    match Open::try_from(payload) {
                        Ok(open) => self.handle_open(ctx, iq, open),
                        Err(_) => self.reply_error(ctx, iq, DefinedCondition::BadRequest),
                    }
                } else if payload.is("data", ns::IBB) {
                    match Data::try_from(payload) {
                        Ok(data) => self.handle_data(ctx, Some(iq), data),
                        Err(_) => self.reply_error(ctx, iq, DefinedCondition::BadRequest),
                    }
                } else if payload.is("close", ns::IBB) {
                    match Close::try_from(payload) {
                        Ok(close) => self.handle_close(ctx, iq, close),
                        Err(_) => self.reply_error(ctx, iq, DefinedCondition::BadRequest),
                    }
                } else {
                    return false;
                }
                true
            }
            Stanza::Message(message) => {
                // Message-carried data frames get no acknowledgment.
                match message.extract_payload::<Data>("data", ns::IBB) {
                    Ok(Some(data)) => {
                        self.handle_data(ctx, None, data);
                        true
                    }
                    _ => false,
                }
            }
            Stanza::Presence(_) => false,
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl ByteStreamBackend for Ibb {
    fn stream_namespace(&self) -> &'static str {
        ns::IBB
    }

    fn start_sending(&self, ctx: &ExtensionContext, session: Arc<TransferSession>) {
        let ft = Arc::clone(&self.ft);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = push_session(&ctx, &ft, &session).await {
                debug!("ibb transfer {} failed: {}", session.sid, e);
                ft.remove_session(&session.sid);
                ft.emit_aborted(&session);
            }
        });
    }

    fn abort(&self, _ctx: &ExtensionContext, session: &TransferSession) {
        // The sending task polls the cancel flag between chunks; inbound
        // streams drop their writer.
        if let Some(stream) = self.inbound.lock().unwrap().remove(&session.sid) {
            let _ = stream.writer.send(SinkCmd::Abort);
        }
    }
}

/// Pushes one outbound session chunk by chunk.
async fn push_session(
    ctx: &ExtensionContext,
    ft: &Arc<FileTransfer>,
    session: &Arc<TransferSession>,
) -> Result<(), Error> {
    let to = session.peer.clone();
    let sid = StreamId(session.sid.clone());
    let mut source = session.take_source().ok_or(Error::InvalidState)?;

    let open = Open {
        block_size: BLOCK_SIZE,
        sid: sid.clone(),
        stanza: IbbStanza::Iq,
    };
    ctx.iq_request(Iq::from_set("ibb-open", open).with_to(to.clone()))
        .await?;

    let mut seq: u16 = 0;
    let mut buffer = vec![0u8; usize::from(BLOCK_SIZE)];
    loop {
        if session.is_cancelled() {
            close_stream(ctx, &to, &sid).await;
            return Err(Error::Cancelled);
        }

        let n = source.read(&mut buffer).await.map_err(Error::Io)?;
        if n == 0 {
            break;
        }

        let data = Data {
            seq,
            sid: sid.clone(),
            data: buffer[..n].to_vec(),
        };
        seq = seq.wrapping_add(1);
        ctx.iq_request(Iq::from_set("ibb-data", data).with_to(to.clone()))
            .await?;

        session.add_transferred(n as u64);
        ft.emit_progress(session);
    }

    close_stream(ctx, &to, &sid).await;
    ft.remove_session(&session.sid);
    Ok(())
}

async fn close_stream(ctx: &ExtensionContext, to: &Jid, sid: &StreamId) {
    let close = Close { sid: sid.clone() };
    if let Err(e) = ctx
        .iq_request(Iq::from_set("ibb-close", close).with_to(to.clone()))
        .await
    {
        debug!("ibb close not acknowledged: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filetransfer::TransferStream;

    fn receiving_session(sid: &str, total: u64) -> Arc<TransferSession> {
        Arc::new(TransferSession::new(
            String::from(sid),
            Direction::Receiving,
            Jid::new("bob@test/pda").unwrap(),
            String::from("a.bin"),
            total,
            String::from(ns::IBB),
            TransferStream::Sink(Some(Box::new(tokio::io::sink()))),
        ))
    }

    fn iq_set(id: &str, payload: minidom::Element) -> Iq {
        Iq {
            from: Some(Jid::new("bob@test/pda").unwrap()),
            to: None,
            id: String::from(id),
            payload: IqType::Set(payload),
        }
    }

    #[tokio::test]
    async fn test_out_of_order_seq_aborts() {
        let ctx = crate::test_support::offline_context();
        let ft = Arc::new(FileTransfer::new(
            ctx.clone(),
            Arc::new(crate::si::StreamInitiation::new()),
        ));
        let ibb = Ibb::new(Arc::clone(&ft));

        ft.insert_session(receiving_session("s1", 8));

        let open: minidom::Element =
            "<open xmlns='http://jabber.org/protocol/ibb' block-size='4096' sid='s1'/>"
                .parse()
                .unwrap();
        let mut stanza = Stanza::Iq(iq_set("o1", open));
        assert!(ibb.input_filter(&ctx, &mut stanza));
        assert!(ibb.inbound.lock().unwrap().contains_key("s1"));

        // Frame 0 is fine.
        let data: minidom::Element =
            "<data xmlns='http://jabber.org/protocol/ibb' seq='0' sid='s1'>AAAA</data>"
                .parse()
                .unwrap();
        let mut stanza = Stanza::Iq(iq_set("d1", data));
        assert!(ibb.input_filter(&ctx, &mut stanza));

        // Frame 2 skips a sequence number: the stream dies.
        let data: minidom::Element =
            "<data xmlns='http://jabber.org/protocol/ibb' seq='2' sid='s1'>AAAA</data>"
                .parse()
                .unwrap();
        let mut stanza = Stanza::Iq(iq_set("d2", data));
        assert!(ibb.input_filter(&ctx, &mut stanza));
        assert!(!ibb.inbound.lock().unwrap().contains_key("s1"));
    }

    #[tokio::test]
    async fn test_open_for_unknown_sid_is_rejected() {
        let ctx = crate::test_support::offline_context();
        let ft = Arc::new(FileTransfer::new(
            ctx.clone(),
            Arc::new(crate::si::StreamInitiation::new()),
        ));
        let ibb = Ibb::new(Arc::clone(&ft));

        let open: minidom::Element =
            "<open xmlns='http://jabber.org/protocol/ibb' block-size='4096' sid='nope'/>"
                .parse()
                .unwrap();
        let mut stanza = Stanza::Iq(iq_set("o1", open));
        // Consumed (and bounced), but no inbound stream appears.
        assert!(ibb.input_filter(&ctx, &mut stanza));
        assert!(ibb.inbound.lock().unwrap().is_empty());
    }
}
