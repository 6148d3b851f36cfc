// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Software version (XEP-0092), both directions.

use std::any::Any;
use std::sync::Arc;

use log::warn;

use jabber_stanzas::iq::{Iq, IqType};
use jabber_stanzas::jid::Jid;
use jabber_stanzas::ns;
use jabber_stanzas::version::{VersionQuery, VersionResult};
use tokio_jabber::{Error, Stanza};

use crate::extension::{Extension, ExtensionContext};

/// Software version queries.
pub struct SoftwareVersion {
    ctx: ExtensionContext,
}

impl SoftwareVersion {
    /// The registry tag of this extension.
    pub const TAG: &'static str = "SoftwareVersion";

    pub(crate) fn new(ctx: ExtensionContext) -> SoftwareVersion {
        SoftwareVersion { ctx }
    }

    /// Asks an entity what software it runs.
    pub async fn query(&self, to: Jid) -> Result<VersionResult, Error> {
        let iq = Iq::from_get("version", VersionQuery).with_to(to);
        let response = self.ctx.iq_request(iq).await?;
        match response.payload {
            IqType::Result(Some(payload)) => Ok(VersionResult::try_from(payload)?),
            _ => Err(Error::InvalidState),
        }
    }
}

impl Extension for SoftwareVersion {
    fn name(&self) -> &'static str {
        SoftwareVersion::TAG
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[ns::VERSION]
    }

    fn input_filter(&self, ctx: &ExtensionContext, stanza: &mut Stanza) -> bool {
        let iq = match stanza {
            Stanza::Iq(iq) => iq,
            _ => return false,
        };
        match &iq.payload {
            IqType::Get(payload) if payload.is("query", ns::VERSION) => (),
            _ => return false,
        }
        let settings = &ctx.settings;
        let result = VersionResult {
            name: settings.software_name.clone(),
            version: settings.software_version.clone(),
            os: settings.software_os.clone(),
        };
        let mut reply = Iq::from_result(iq.id.clone(), Some(result));
        if let Some(from) = &iq.from {
            reply.to = Some(from.clone());
        }
        if let Err(e) = ctx.session.send_iq_response(reply) {
            warn!("cannot answer version query: {}", e);
        }
        true
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
