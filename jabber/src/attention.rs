// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Attention (XEP-0224), better known as the buzz.

use std::any::Any;
use std::sync::Arc;

use jabber_stanzas::attention::Attention as AttentionPayload;
use jabber_stanzas::jid::Jid;
use jabber_stanzas::message::Message;
use jabber_stanzas::ns;
use tokio_jabber::{Error, Stanza};

use crate::extension::{Extension, ExtensionContext};

/// The attention extension; advertises support and sends buzzes.
pub struct Attention {
    ctx: ExtensionContext,
}

impl Attention {
    /// The registry tag of this extension.
    pub const TAG: &'static str = "Attention";

    pub(crate) fn new(ctx: ExtensionContext) -> Attention {
        Attention { ctx }
    }

    /// Buzzes a contact, optionally with a message alongside.
    pub fn buzz(&self, to: Jid, body: Option<&str>) -> Result<(), Error> {
        let mut message = Message::chat(to).with_payload(AttentionPayload);
        if let Some(body) = body {
            message = message.with_body(String::new(), String::from(body));
        }
        self.ctx.send_stanza(Stanza::Message(message))
    }
}

impl Extension for Attention {
    fn name(&self) -> &'static str {
        Attention::TAG
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[ns::ATTENTION]
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
