// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Chat state notifications (XEP-0085).

use std::any::Any;
use std::sync::Arc;

use jabber_stanzas::chatstates::ChatState;
use jabber_stanzas::jid::Jid;
use jabber_stanzas::message::{Message, MessageType};
use jabber_stanzas::ns;
use tokio_jabber::{Error, Stanza};

use crate::event::Event;
use crate::extension::{Extension, ExtensionContext};

/// Sends and receives composing notifications.
pub struct ChatStates {
    ctx: ExtensionContext,
}

impl ChatStates {
    /// The registry tag of this extension.
    pub const TAG: &'static str = "ChatStates";

    pub(crate) fn new(ctx: ExtensionContext) -> ChatStates {
        ChatStates { ctx }
    }

    /// Sends a standalone chat state to a peer.
    pub fn send_state(&self, to: Jid, state: ChatState) -> Result<(), Error> {
        let message = Message::chat(to).with_payload(state);
        self.ctx.send_stanza(Stanza::Message(message))
    }
}

impl Extension for ChatStates {
    fn name(&self) -> &'static str {
        ChatStates::TAG
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[ns::CHATSTATES]
    }

    fn input_filter(&self, ctx: &ExtensionContext, stanza: &mut Stanza) -> bool {
        let message = match stanza {
            Stanza::Message(message) => message,
            _ => return false,
        };
        if message.type_ == MessageType::Error {
            return false;
        }
        let state = match message.extract_payload::<ChatState>("active", ns::CHATSTATES) {
            Ok(Some(state)) => Some(state),
            _ => {
                // Any of the five states may appear; probe the others.
                ["composing", "paused", "inactive", "gone"]
                    .iter()
                    .find_map(|name| {
                        message
                            .extract_payload::<ChatState>(name, ns::CHATSTATES)
                            .ok()
                            .flatten()
                    })
            }
        };
        let state = match state {
            Some(state) => state,
            None => return false,
        };
        if let Some(from) = message.from.clone() {
            ctx.emit(Event::ChatStateChanged { from, state });
        }
        // A bare notification carries nothing else of interest; a state
        // attached to a body rides along with the message event.
        message.bodies.is_empty() && message.subjects.is_empty() && message.payloads.is_empty()
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minidom::Element;

    fn filter(xml: &str) -> (bool, Option<Event>) {
        let chatstates = ChatStates::new(crate::test_support::offline_context());
        let ctx = chatstates.ctx.clone();
        let mut events = ctx.events.subscribe();
        let elem: Element = xml.parse().unwrap();
        let mut stanza = Stanza::Message(Message::try_from(elem).unwrap());
        let consumed = chatstates.input_filter(&ctx, &mut stanza);
        (consumed, events.try_recv().ok())
    }

    #[test]
    fn test_standalone_composing_is_consumed() {
        let (consumed, event) = filter(
            "<message xmlns='jabber:client' from='bob@example.org/pda' type='chat'><composing xmlns='http://jabber.org/protocol/chatstates'/></message>",
        );
        assert!(consumed);
        match event {
            Some(Event::ChatStateChanged { state, .. }) => {
                assert_eq!(state, ChatState::Composing)
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_state_with_body_rides_along() {
        let (consumed, event) = filter(
            "<message xmlns='jabber:client' from='bob@example.org/pda' type='chat'><active xmlns='http://jabber.org/protocol/chatstates'/><body>hi</body></message>",
        );
        assert!(!consumed);
        assert!(matches!(
            event,
            Some(Event::ChatStateChanged {
                state: ChatState::Active,
                ..
            })
        ));
    }

    #[test]
    fn test_message_without_state() {
        let (consumed, event) = filter(
            "<message xmlns='jabber:client' from='bob@example.org/pda' type='chat'><body>hi</body></message>",
        );
        assert!(!consumed);
        assert!(event.is_none());
    }
}
