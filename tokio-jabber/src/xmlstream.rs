// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! `XmlStream` provides encoding/decoding for an RFC 6120 XML stream.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{sink::SinkExt, stream::StreamExt, Sink, Stream};
use minidom::Element;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use jabber_stanzas::ns;
use jabber_stanzas::stream::StreamFeatures;

use crate::codec::{Packet, XmppCodec};
use crate::error::{Error, ProtocolError};

/// Wraps a binary stream (tokio's `AsyncRead + AsyncWrite`) to decode and
/// encode XMPP packets.
///
/// The stream header is exchanged by [`XmlStream::start`]; a mid-connection
/// stream restart (after STARTTLS or after authentication) re-runs the same
/// exchange over the same transport via [`XmlStream::restart`].
///
/// Implements `Sink + Stream`.
pub struct XmlStream<S: AsyncRead + AsyncWrite + Unpin> {
    /// The codec-framed transport.
    pub stream: Framed<S, XmppCodec>,
    /// The domain the stream was opened to.
    pub domain: String,
    /// `<stream:features/>` announced by the server.
    pub stream_features: StreamFeatures,
    /// Stream `id` attribute sent by the server.
    pub id: String,
}

impl<S: AsyncRead + AsyncWrite + Unpin> XmlStream<S> {
    /// Sends a `<stream:stream>` start tag, waits for the one of the
    /// server and its `<stream:features/>`, and constructs an `XmlStream`.
    pub async fn start(stream: S, domain: String) -> Result<Self, Error> {
        let mut stream = Framed::new(stream, XmppCodec::new());
        let attrs = [
            ("to".to_owned(), domain.clone()),
            ("version".to_owned(), "1.0".to_owned()),
            ("xmlns".to_owned(), ns::JABBER_CLIENT.to_owned()),
            ("xmlns:stream".to_owned(), ns::STREAM.to_owned()),
        ]
        .iter()
        .cloned()
        .collect();
        stream.send(Packet::StreamStart(attrs)).await?;

        let stream_attrs;
        loop {
            match stream.next().await {
                Some(Ok(Packet::StreamStart(attrs))) => {
                    stream_attrs = attrs;
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => return Err(Error::Disconnected),
            }
        }

        stream_attrs
            .get("xmlns")
            .ok_or(ProtocolError::NoStreamNamespace)?;
        let stream_id = stream_attrs
            .get("id")
            .ok_or(ProtocolError::NoStreamId)?
            .clone();

        if stream_attrs.get("version").is_none() {
            // Pre-RFC 6120 server, there will be no features.
            return Ok(XmlStream {
                stream,
                domain,
                stream_features: StreamFeatures::default(),
                id: stream_id,
            });
        }

        loop {
            match stream.next().await {
                Some(Ok(Packet::Stanza(stanza))) => {
                    if let Ok(stream_features) = StreamFeatures::try_from(stanza) {
                        return Ok(XmlStream {
                            stream,
                            domain,
                            stream_features,
                            id: stream_id,
                        });
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => return Err(Error::Disconnected),
            }
        }
    }

    /// Unwraps the inner transport, discarding all parser state.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    /// Re-runs the header exchange on the same transport; both sides drop
    /// their parser state.
    pub async fn restart(self) -> Result<Self, Error> {
        let domain = self.domain.clone();
        let stream = self.stream.into_inner();
        Self::start(stream, domain).await
    }

    /// Serializes one element as a direct child of the stream envelope.
    pub async fn send_stanza<E: Into<Element>>(&mut self, e: E) -> Result<(), Error> {
        self.send(Packet::Stanza(e.into())).await
    }

    /// Waits for the next complete top-level child element of the stream
    /// envelope.
    ///
    /// Returns `Error::Disconnected` once the peer has closed its side of
    /// the stream.
    pub async fn read_element(&mut self) -> Result<Element, Error> {
        loop {
            match self.next().await {
                Some(Ok(Packet::Stanza(stanza))) => return Ok(stanza),
                Some(Ok(Packet::Text(_))) => {}
                Some(Ok(Packet::StreamStart(_))) => {
                    return Err(ProtocolError::InvalidStreamStart.into())
                }
                Some(Ok(Packet::StreamEnd)) | None => return Err(Error::Disconnected),
                Some(Err(e)) => return Err(e),
            }
        }
    }

    /// Sends `</stream:stream>` and flushes the transport.
    pub async fn close(&mut self) -> Result<(), Error> {
        self.send(Packet::StreamEnd).await
    }
}

/// Proxy to self.stream.
impl<S: AsyncRead + AsyncWrite + Unpin> Sink<Packet> for XmlStream<S> {
    type Error = Error;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.stream)
            .poll_ready(cx)
            .map_err(|e| e.into())
    }

    fn start_send(mut self: Pin<&mut Self>, item: Packet) -> Result<(), Self::Error> {
        Pin::new(&mut self.stream)
            .start_send(item)
            .map_err(|e| e.into())
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.stream)
            .poll_flush(cx)
            .map_err(|e| e.into())
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.stream)
            .poll_close(cx)
            .map_err(|e| e.into())
    }
}

/// Proxy to self.stream.
impl<S: AsyncRead + AsyncWrite + Unpin> Stream for XmlStream<S> {
    type Item = Result<Packet, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.stream).poll_next(cx)
    }
}
