// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Personal eventing (XEP-0163): publish to own nodes, dispatch inbound
//! notifications to the typed mood/activity/tune events.

use std::any::Any;
use std::sync::Arc;

use log::debug;
use minidom::Element;

use jabber_stanzas::activity::UserActivity;
use jabber_stanzas::iq::Iq;
use jabber_stanzas::mood::UserMood;
use jabber_stanzas::ns;
use jabber_stanzas::pubsub::{Event as PubSubEvent, PubSub};
use jabber_stanzas::tune::Tune;
use tokio_jabber::{Error, Stanza};

use crate::event::Event;
use crate::extension::{Extension, ExtensionContext};

/// Publish/subscribe over the user's own nodes.
pub struct Pep {
    ctx: ExtensionContext,
}

impl Pep {
    /// The registry tag of this extension.
    pub const TAG: &'static str = "Pep";

    pub(crate) fn new(ctx: ExtensionContext) -> Pep {
        Pep { ctx }
    }

    /// Publishes one payload on the given personal node.
    pub async fn publish<P: Into<Element>>(&self, node: &str, payload: P) -> Result<(), Error> {
        let iq = Iq::from_set("pep-publish", PubSub::publish(node, payload));
        self.ctx.iq_request(iq).await?;
        Ok(())
    }

    fn dispatch_notification(&self, ctx: &ExtensionContext, event: PubSubEvent, from: Option<jabber_stanzas::jid::Jid>) {
        let from = match from {
            Some(from) => from.to_bare(),
            None => return,
        };
        for item in event.items {
            let payload = match item.payload {
                Some(payload) => payload,
                None => continue,
            };
            match event.node.as_str() {
                ns::MOOD => match UserMood::try_from(payload) {
                    Ok(mood) => ctx.emit(Event::MoodChanged {
                        from: from.clone(),
                        mood: mood.mood,
                        text: mood.text,
                    }),
                    Err(e) => debug!("invalid mood notification: {}", e),
                },
                ns::ACTIVITY => match UserActivity::try_from(payload) {
                    Ok(activity) => ctx.emit(Event::ActivityChanged {
                        from: from.clone(),
                        general: activity.general,
                        specific: activity.specific,
                        text: activity.text,
                    }),
                    Err(e) => debug!("invalid activity notification: {}", e),
                },
                ns::TUNE => match Tune::try_from(payload) {
                    Ok(tune) => ctx.emit(Event::Tune {
                        from: from.clone(),
                        tune,
                    }),
                    Err(e) => debug!("invalid tune notification: {}", e),
                },
                other => debug!("ignoring pep notification for node {}", other),
            }
        }
    }
}

impl Extension for Pep {
    fn name(&self) -> &'static str {
        Pep::TAG
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[
            ns::MOOD,
            "http://jabber.org/protocol/mood+notify",
            ns::ACTIVITY,
            "http://jabber.org/protocol/activity+notify",
            ns::TUNE,
            "http://jabber.org/protocol/tune+notify",
        ]
    }

    fn input_filter(&self, ctx: &ExtensionContext, stanza: &mut Stanza) -> bool {
        let message = match stanza {
            Stanza::Message(message) => message,
            _ => return false,
        };
        let event = match message.extract_payload::<PubSubEvent>("event", ns::PUBSUB_EVENT) {
            Ok(Some(event)) => event,
            Ok(None) => return false,
            Err(e) => {
                debug!("invalid pubsub event: {}", e);
                return true;
            }
        };
        self.dispatch_notification(ctx, event, message.from.clone());
        true
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jabber_stanzas::jid::Jid;
    use jabber_stanzas::message::Message;
    use jabber_stanzas::mood::Mood;
    use tokio::sync::broadcast::error::TryRecvError;

    fn pep_with_events() -> (Pep, tokio::sync::broadcast::Receiver<Event>) {
        let ctx = crate::test_support::offline_context();
        let events = ctx.events.subscribe();
        (Pep::new(ctx.clone()), events)
    }

    #[test]
    fn test_mood_notification() {
        let (pep, mut events) = pep_with_events();
        let ctx = pep.ctx.clone();

        let payload: Element = "<event xmlns='http://jabber.org/protocol/pubsub#event'><items node='http://jabber.org/protocol/mood'><item><mood xmlns='http://jabber.org/protocol/mood'><happy/></mood></item></items></event>"
            .parse()
            .unwrap();
        let mut message = Message::normal(None);
        message.from = Some(Jid::new("bob@example.org").unwrap());
        message.payloads.push(payload);

        let mut stanza = Stanza::Message(message);
        assert!(pep.input_filter(&ctx, &mut stanza));

        match events.try_recv() {
            Ok(Event::MoodChanged { from, mood, .. }) => {
                assert_eq!(from.to_string(), "bob@example.org");
                assert_eq!(mood, Some(Mood::Happy));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_plain_message_not_consumed() {
        let (pep, mut events) = pep_with_events();
        let ctx = pep.ctx.clone();
        let mut stanza = Stanza::Message(Message::chat(None));
        assert!(!pep.input_filter(&ctx, &mut stanza));
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }
}
