// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Chat state notifications (XEP-0085).

use core::convert::TryFrom;

use minidom::Element;

use crate::message::MessagePayload;
use crate::ns;
use crate::util::error::Error;

/// The activity state of a chat participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    /// The participant is actively taking part in the conversation.
    Active,

    /// The participant is composing a message.
    Composing,

    /// The participant stopped taking part in the conversation.
    Gone,

    /// The participant started composing but stopped.
    Paused,

    /// The participant isn't actively taking part in the conversation.
    Inactive,
}

impl MessagePayload for ChatState {}

impl ChatState {
    /// The element name of this state on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ChatState::Active => "active",
            ChatState::Composing => "composing",
            ChatState::Gone => "gone",
            ChatState::Paused => "paused",
            ChatState::Inactive => "inactive",
        }
    }
}

impl TryFrom<Element> for ChatState {
    type Error = Error;

    fn try_from(elem: Element) -> Result<ChatState, Error> {
        check_ns_only!(elem, "chatstate", CHATSTATES);
        check_no_children!(elem, "chatstate");
        check_no_attributes!(elem, "chatstate");
        Ok(match elem.name() {
            "active" => ChatState::Active,
            "composing" => ChatState::Composing,
            "gone" => ChatState::Gone,
            "paused" => ChatState::Paused,
            "inactive" => ChatState::Inactive,
            _ => return Err(Error::ParseError("This is not a chatstate element.")),
        })
    }
}

impl From<ChatState> for Element {
    fn from(state: ChatState) -> Element {
        Element::builder(state.name(), ns::CHATSTATES).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple() {
        for (xml, state) in [
            ("<active xmlns='http://jabber.org/protocol/chatstates'/>", ChatState::Active),
            ("<composing xmlns='http://jabber.org/protocol/chatstates'/>", ChatState::Composing),
            ("<gone xmlns='http://jabber.org/protocol/chatstates'/>", ChatState::Gone),
            ("<paused xmlns='http://jabber.org/protocol/chatstates'/>", ChatState::Paused),
            ("<inactive xmlns='http://jabber.org/protocol/chatstates'/>", ChatState::Inactive),
        ] {
            let elem: Element = xml.parse().unwrap();
            assert_eq!(ChatState::try_from(elem.clone()).unwrap(), state);
            assert_eq!(Element::from(state), elem);
        }
    }

    #[test]
    fn test_invalid() {
        let elem: Element = "<coucou xmlns='http://jabber.org/protocol/chatstates'/>"
            .parse()
            .unwrap();
        let error = ChatState::try_from(elem).unwrap_err();
        let message = match error {
            Error::ParseError(string) => string,
            _ => panic!(),
        };
        assert_eq!(message, "This is not a chatstate element.");
    }
}
