// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use minidom::Element;

use jabber_stanzas::iq::Iq;
use jabber_stanzas::jid::Jid;
use jabber_stanzas::message::Message;
use jabber_stanzas::ns;
use jabber_stanzas::presence::Presence;

use crate::error::Error;

/// A typed stanza, as dispatched to the upper layer.
#[derive(Debug, Clone)]
pub enum Stanza {
    /// An `<iq/>` stanza.
    Iq(Iq),
    /// A `<message/>` stanza.
    Message(Message),
    /// A `<presence/>` stanza.
    Presence(Presence),
}

impl Stanza {
    /// Classifies and parses a top-level stream child, or returns `Ok(None)`
    /// for non-stanza elements (nonzas).
    pub fn classify(elem: Element) -> Result<Option<Stanza>, Error> {
        if elem.is("iq", ns::DEFAULT_NS) {
            Ok(Some(Stanza::Iq(Iq::try_from(elem)?)))
        } else if elem.is("message", ns::DEFAULT_NS) {
            Ok(Some(Stanza::Message(Message::try_from(elem)?)))
        } else if elem.is("presence", ns::DEFAULT_NS) {
            Ok(Some(Stanza::Presence(Presence::try_from(elem)?)))
        } else {
            Ok(None)
        }
    }
}

impl From<Stanza> for Element {
    fn from(stanza: Stanza) -> Element {
        match stanza {
            Stanza::Iq(iq) => iq.into(),
            Stanza::Message(message) => message.into(),
            Stanza::Presence(presence) => presence.into(),
        }
    }
}

/// The lifecycle of a session, from TCP connect to authenticated, bound,
/// ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport.
    Disconnected,
    /// TCP connect in progress.
    Connecting,
    /// The initial stream header exchange is done.
    StreamOpened,
    /// STARTTLS negotiation and handshake in progress.
    TlsNegotiating,
    /// The stream was reopened on the encrypted transport.
    StreamReopened,
    /// SASL exchange in progress.
    SaslInProgress,
    /// The stream is authenticated and was reopened.
    Authenticated,
    /// Resource binding in progress.
    Binding,
    /// The session is usable, a full JID is bound.
    Ready,
    /// An orderly shutdown is in progress.
    Closing,
    /// The connection broke down; only `reconnect` can revive the session.
    Lost,
}

/// What a session reports to its consumer.
#[derive(Debug)]
pub enum SessionEvent {
    /// Negotiation finished, the session is ready under the given JID.
    Online {
        /// The full JID bound by the server.
        jid: Jid,
    },
    /// An inbound stanza survived the correlation layer and is for the
    /// upper layer to process.
    Stanza(Stanza),
    /// A single inbound stanza could not be parsed; the stream goes on.
    ParseError(Error),
    /// The session ended, orderly or not.
    Disconnected(Error),
}
