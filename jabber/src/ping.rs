// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! XMPP ping (XEP-0199), both directions.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::warn;

use jabber_stanzas::iq::{Iq, IqType};
use jabber_stanzas::jid::Jid;
use jabber_stanzas::ns;
use jabber_stanzas::ping::Ping as PingPayload;
use tokio_jabber::{Error, Stanza};

use crate::extension::{Extension, ExtensionContext};

/// Application-level pings.
pub struct Ping {
    ctx: ExtensionContext,
}

impl Ping {
    /// The registry tag of this extension.
    pub const TAG: &'static str = "Ping";

    pub(crate) fn new(ctx: ExtensionContext) -> Ping {
        Ping { ctx }
    }

    /// Pings an entity (or the server when `to` is None) and measures the
    /// round trip.
    pub async fn ping(&self, to: Option<Jid>) -> Result<Duration, Error> {
        let mut iq = Iq::from_get("ping", PingPayload);
        if let Some(to) = to {
            iq = iq.with_to(to);
        }
        let started = Instant::now();
        match self.ctx.iq_request(iq).await {
            Ok(_) => Ok(started.elapsed()),
            // A service-unavailable answer still proves the peer is there.
            Err(Error::Stanza(_)) => Ok(started.elapsed()),
            Err(e) => Err(e),
        }
    }
}

impl Extension for Ping {
    fn name(&self) -> &'static str {
        Ping::TAG
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[ns::PING]
    }

    fn input_filter(&self, ctx: &ExtensionContext, stanza: &mut Stanza) -> bool {
        let iq = match stanza {
            Stanza::Iq(iq) => iq,
            _ => return false,
        };
        match &iq.payload {
            IqType::Get(payload) if payload.is("ping", ns::PING) => (),
            _ => return false,
        }
        let mut reply = Iq::empty_result(iq.id.clone());
        if let Some(from) = &iq.from {
            reply.to = Some(from.clone());
        }
        if let Err(e) = ctx.session.send_iq_response(reply) {
            warn!("cannot answer ping: {}", e);
        }
        true
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
