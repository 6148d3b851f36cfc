// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Entity time (XEP-0202), both directions.

use std::any::Any;
use std::sync::Arc;

use chrono::{Local, Offset, Utc};
use log::warn;

use jabber_stanzas::iq::{Iq, IqType};
use jabber_stanzas::jid::Jid;
use jabber_stanzas::ns;
use jabber_stanzas::time::{TimeQuery, TimeResult};
use tokio_jabber::{Error, Stanza};

use crate::extension::{Extension, ExtensionContext};

/// Entity time queries.
pub struct EntityTime {
    ctx: ExtensionContext,
}

impl EntityTime {
    /// The registry tag of this extension.
    pub const TAG: &'static str = "EntityTime";

    pub(crate) fn new(ctx: ExtensionContext) -> EntityTime {
        EntityTime { ctx }
    }

    /// Asks an entity for its local time.
    pub async fn query(&self, to: Jid) -> Result<TimeResult, Error> {
        let iq = Iq::from_get("time", TimeQuery).with_to(to);
        let response = self.ctx.iq_request(iq).await?;
        match response.payload {
            IqType::Result(Some(payload)) => Ok(TimeResult::try_from(payload)?),
            _ => Err(Error::InvalidState),
        }
    }

    fn local_time() -> TimeResult {
        let now = Utc::now();
        let offset = Local::now().offset().fix();
        let total_minutes = offset.local_minus_utc() / 60;
        let tzo = format!(
            "{}{:02}:{:02}",
            if total_minutes < 0 { '-' } else { '+' },
            total_minutes.abs() / 60,
            total_minutes.abs() % 60
        );
        TimeResult {
            utc: now.fixed_offset(),
            tzo,
        }
    }
}

impl Extension for EntityTime {
    fn name(&self) -> &'static str {
        EntityTime::TAG
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[ns::TIME]
    }

    fn input_filter(&self, ctx: &ExtensionContext, stanza: &mut Stanza) -> bool {
        let iq = match stanza {
            Stanza::Iq(iq) => iq,
            _ => return false,
        };
        match &iq.payload {
            IqType::Get(payload) if payload.is("time", ns::TIME) => (),
            _ => return false,
        }
        let mut reply = Iq::from_result(iq.id.clone(), Some(Self::local_time()));
        if let Some(from) = &iq.from {
            reply.to = Some(from.clone());
        }
        if let Err(e) = ctx.session.send_iq_response(reply) {
            warn!("cannot answer time query: {}", e);
        }
        true
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_time_shape() {
        let time = EntityTime::local_time();
        assert!(time.tzo.starts_with('+') || time.tzo.starts_with('-'));
        assert_eq!(time.tzo.len(), 6);
    }
}
