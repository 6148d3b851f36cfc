// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Low-level [XMPP](https://xmpp.org/) session engine with asynchronous
//! I/O using [tokio](https://tokio.rs/).
//!
//! The entry point is [`Session::connect`], which performs the whole
//! negotiation (TCP, STARTTLS, SASL, resource binding) and returns a
//! cloneable handle plus the inbound event channel. For a typed
//! instant-messaging API on top, see the `jabber` crate.

#![deny(unsafe_code, missing_docs, bare_trait_objects)]

pub use jabber_stanzas as stanzas;
pub use minidom;

mod auth;
mod bind;
/// The XML codec turning bytes into packets.
pub mod codec;
/// Transports and the STARTTLS upgrade.
pub mod connect;
/// Detailed error types.
pub mod error;
mod event;
mod session;
/// The raw XML stream.
pub mod xmlstream;

pub use crate::error::{AuthError, Error, ProtocolError};
pub use crate::event::{SessionEvent, SessionState, Stanza};
pub use crate::session::{Config, Session, TlsPolicy};
