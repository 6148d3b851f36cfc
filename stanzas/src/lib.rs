// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A crate parsing common XMPP elements into Rust structures.
//!
//! Each module implements the `TryFrom<Element>` trait, which takes a
//! minidom [`Element`] and returns a `Result` whose value is a specialised
//! struct for this protocol. The same structs implement
//! `Into<minidom::Element>` for serialisation.

#![deny(missing_docs, bare_trait_objects)]

pub use minidom::Element;

pub use crate::util::error::Error;

#[macro_use]
mod util;

/// XML namespace definitions used by XMPP.
pub mod ns;

/// XMPP addresses.
pub mod jid;

/// RFC 6120: stanzas and negotiation.
pub mod bind;
/// The `<iq/>` stanza.
pub mod iq;
/// The `<message/>` stanza.
pub mod message;
/// The `<presence/>` stanza.
pub mod presence;
/// SASL nonzas.
pub mod sasl;
/// Stanza-level errors.
pub mod stanza_error;
/// STARTTLS nonzas.
pub mod starttls;
/// Stream features and stream errors.
pub mod stream;

/// RFC 6121: roster management.
pub mod roster;

/// XEP-0004: Data Forms.
pub mod data_forms;

/// XEP-0016: Privacy Lists.
pub mod privacy;

/// XEP-0030: Service Discovery.
pub mod disco;

/// XEP-0045: Multi-User Chat.
pub mod muc;

/// XEP-0047: In-Band Bytestreams.
pub mod ibb;

/// XEP-0055: Jabber Search.
pub mod search;

/// XEP-0059: Result Set Management.
pub mod rsm;

/// XEP-0060 (subset): Publish-Subscribe, as used by Personal Eventing.
pub mod pubsub;

/// XEP-0065: SOCKS5 Bytestreams.
pub mod bytestreams;

/// XEP-0077: In-Band Registration.
pub mod ibr;

/// XEP-0085: Chat State Notifications.
pub mod chatstates;

/// XEP-0092: Software Version.
pub mod version;

/// XEP-0095 and XEP-0096: Stream Initiation and its file-transfer profile.
pub mod si;

/// XEP-0107: User Mood.
pub mod mood;

/// XEP-0108: User Activity.
pub mod activity;

/// XEP-0115: Entity Capabilities.
pub mod caps;

/// XEP-0118: User Tune.
pub mod tune;

/// XEP-0191: Blocking Command.
pub mod blocking;

/// XEP-0199: XMPP Ping.
pub mod ping;

/// XEP-0202: Entity Time.
pub mod time;

/// XEP-0203: Delayed Delivery.
pub mod delay;

/// XEP-0224: Attention.
pub mod attention;

/// XEP-0280: Message Carbons.
pub mod carbons;

/// XEP-0297: Stanza Forwarding.
pub mod forwarding;

/// XEP-0313: Message Archive Management.
pub mod mam;

/// XEP-0363: HTTP File Upload.
pub mod http_upload;
