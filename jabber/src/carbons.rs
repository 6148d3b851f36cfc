// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Message carbons (XEP-0280): copies of messages handled by other
//! resources of this account.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::warn;

use jabber_stanzas::carbons::{Disable, Enable, Received, Sent};
use jabber_stanzas::iq::Iq;
use jabber_stanzas::message::Message;
use jabber_stanzas::ns;
use tokio_jabber::{Error, Stanza};

use crate::extension::{Extension, ExtensionContext};

/// The carbons extension. When enabled, copies received on other resources
/// are unwrapped and re-injected into the inbound path, so they surface as
/// ordinary message events.
pub struct Carbons {
    ctx: ExtensionContext,
    enabled: AtomicBool,
}

impl Carbons {
    /// The registry tag of this extension.
    pub const TAG: &'static str = "Carbons";

    pub(crate) fn new(ctx: ExtensionContext) -> Carbons {
        Carbons {
            ctx,
            enabled: AtomicBool::new(false),
        }
    }

    /// Asks the server to start copying messages to this resource.
    pub async fn enable(&self) -> Result<(), Error> {
        self.ctx
            .iq_request(Iq::from_set("carbons-enable", Enable))
            .await?;
        self.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Asks the server to stop copying messages to this resource.
    pub async fn disable(&self) -> Result<(), Error> {
        self.ctx
            .iq_request(Iq::from_set("carbons-disable", Disable))
            .await?;
        self.enabled.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Whether carbons are currently enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn sender_is_own_account(&self, message: &Message) -> bool {
        let from = match &message.from {
            Some(from) => from,
            // No sender means the server injected it directly.
            None => return true,
        };
        match self.ctx.session.jid() {
            Some(bound) => from.to_bare() == bound.to_bare(),
            None => false,
        }
    }

    fn has_carbon_payload(message: &Message) -> bool {
        message
            .payloads
            .iter()
            .any(|payload| payload.is("received", ns::CARBONS) || payload.is("sent", ns::CARBONS))
    }
}

impl Extension for Carbons {
    fn name(&self) -> &'static str {
        Carbons::TAG
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[ns::CARBONS]
    }

    fn input_filter(&self, _ctx: &ExtensionContext, stanza: &mut Stanza) -> bool {
        let message = match stanza {
            Stanza::Message(message) => message,
            _ => return false,
        };
        if !Self::has_carbon_payload(message) {
            return false;
        }

        // A forged carbon from a third party must not impersonate anyone.
        if !self.sender_is_own_account(message) {
            warn!("dropping carbon copy from untrusted sender");
            return true;
        }

        let inner = match message.extract_payload::<Received>("received", ns::CARBONS) {
            Ok(Some(received)) => *received.forwarded.message,
            Ok(None) => match message.extract_payload::<Sent>("sent", ns::CARBONS) {
                Ok(Some(sent)) => *sent.forwarded.message,
                Ok(None) => return false,
                Err(e) => {
                    warn!("invalid sent carbon: {}", e);
                    return true;
                }
            },
            Err(e) => {
                warn!("invalid received carbon: {}", e);
                return true;
            }
        };

        // Never unwrap more than one layer, a carbon of a carbon is a loop.
        if Self::has_carbon_payload(&inner) {
            warn!("refusing to unwrap a nested carbon copy");
            return true;
        }

        // Re-inject the inner message into the inbound path: the remaining
        // filters and the built-in handlers see it as a normal delivery.
        *stanza = Stanza::Message(inner);
        false
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jabber_stanzas::jid::Jid;
    use minidom::Element;

    fn carbon_message(from: &str, inner_body: &str) -> Message {
        let xml = format!(
            "<message xmlns='jabber:client' from='{}' to='tester@example.org/unit'><received xmlns='urn:xmpp:carbons:2'><forwarded xmlns='urn:xmpp:forward:0'><message xmlns='jabber:client' from='friend@example.com/home' to='tester@example.org/other' type='chat'><body>{}</body></message></forwarded></received></message>",
            from, inner_body
        );
        let elem: Element = xml.parse().unwrap();
        Message::try_from(elem).unwrap()
    }

    #[test]
    fn test_unwrap_received_carbon() {
        let carbons = Carbons::new(crate::test_support::offline_context());
        let ctx = carbons.ctx.clone();
        // An offline session has no bound JID, so the from-less carbon path
        // is exercised instead.
        let mut message = carbon_message("tester@example.org", "coucou");
        message.from = None;
        let mut stanza = Stanza::Message(message);
        assert!(!carbons.input_filter(&ctx, &mut stanza));
        match stanza {
            Stanza::Message(inner) => {
                assert_eq!(
                    inner.from,
                    Some(Jid::new("friend@example.com/home").unwrap())
                );
                assert_eq!(inner.get_best_body(&[]).unwrap().1 .0, "coucou");
            }
            other => panic!("unexpected stanza: {:?}", other),
        }
    }

    #[test]
    fn test_forged_carbon_is_dropped() {
        let carbons = Carbons::new(crate::test_support::offline_context());
        let ctx = carbons.ctx.clone();
        let mut stanza = Stanza::Message(carbon_message("mallory@evil.example", "gotcha"));
        // Consumed without being re-injected.
        assert!(carbons.input_filter(&ctx, &mut stanza));
    }

    #[test]
    fn test_nested_carbon_is_refused() {
        let carbons = Carbons::new(crate::test_support::offline_context());
        let ctx = carbons.ctx.clone();
        let xml = "<message xmlns='jabber:client'><received xmlns='urn:xmpp:carbons:2'><forwarded xmlns='urn:xmpp:forward:0'><message xmlns='jabber:client'><received xmlns='urn:xmpp:carbons:2'><forwarded xmlns='urn:xmpp:forward:0'><message xmlns='jabber:client'/></forwarded></received></message></forwarded></received></message>";
        let elem: Element = xml.parse().unwrap();
        let message = Message::try_from(elem).unwrap();
        let mut stanza = Stanza::Message(message);
        assert!(carbons.input_filter(&ctx, &mut stanza));
    }

    #[test]
    fn test_plain_message_untouched() {
        let carbons = Carbons::new(crate::test_support::offline_context());
        let ctx = carbons.ctx.clone();
        let mut stanza = Stanza::Message(Message::chat(None));
        assert!(!carbons.input_filter(&ctx, &mut stanza));
    }
}
