// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::convert::TryFrom;

use minidom::Element;

use crate::delay::Delay;
use crate::message::Message;
use crate::ns;
use crate::util::error::Error;

/// Contains a forwarded stanza, either standalone or part of another
/// extension such as carbons or MAM results (XEP-0297).
///
/// The schema allows any stanza kind in here, but what crosses the wire in
/// practice is a message, so that is what this models.
#[derive(Debug, Clone, PartialEq)]
pub struct Forwarded {
    /// When the stanza originally got sent.
    pub delay: Option<Delay>,

    /// The stanza being forwarded.
    pub message: Box<Message>,
}

impl TryFrom<Element> for Forwarded {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Forwarded, Error> {
        check_self!(elem, "forwarded", FORWARD);
        check_no_attributes!(elem, "forwarded");
        let mut delay = None;
        let mut message = None;
        for child in elem.children() {
            if child.is("delay", ns::DELAY) {
                if delay.is_some() {
                    return Err(Error::ParseError("More than one delay in forwarded."));
                }
                delay = Some(Delay::try_from(child.clone())?);
            } else if child.is("message", ns::DEFAULT_NS) {
                if message.is_some() {
                    return Err(Error::ParseError("More than one message in forwarded."));
                }
                message = Some(Message::try_from(child.clone())?);
            } else {
                return Err(Error::ParseError("Unknown child in forwarded element."));
            }
        }
        let message =
            message.ok_or(Error::ParseError("Forwarded element must contain a message."))?;
        Ok(Forwarded {
            delay,
            message: Box::new(message),
        })
    }
}

impl From<Forwarded> for Element {
    fn from(forwarded: Forwarded) -> Element {
        Element::builder("forwarded", ns::FORWARD)
            .append_all(forwarded.delay.map(Element::from))
            .append(Element::from(*forwarded.message))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jid::Jid;

    #[test]
    fn test_simple() {
        let elem: Element =
            "<forwarded xmlns='urn:xmpp:forward:0'><message xmlns='jabber:client'/></forwarded>"
                .parse()
                .unwrap();
        Forwarded::try_from(elem).unwrap();
    }

    #[test]
    fn test_delay_and_message() {
        let elem: Element = "<forwarded xmlns='urn:xmpp:forward:0'><delay xmlns='urn:xmpp:delay' stamp='2010-07-10T23:08:25Z'/><message xmlns='jabber:client' from='witch@shakespeare.lit' to='macbeth@shakespeare.lit'><body>Hail to thee</body></message></forwarded>"
            .parse()
            .unwrap();
        let forwarded = Forwarded::try_from(elem).unwrap();
        assert!(forwarded.delay.is_some());
        assert_eq!(
            forwarded.message.from,
            Some(Jid::new("witch@shakespeare.lit").unwrap())
        );
        assert_eq!(
            forwarded.message.get_best_body(&[]).unwrap().1 .0,
            "Hail to thee"
        );
    }

    #[test]
    fn test_requires_message() {
        let elem: Element = "<forwarded xmlns='urn:xmpp:forward:0'/>".parse().unwrap();
        let error = Forwarded::try_from(elem).unwrap_err();
        let message = match error {
            Error::ParseError(string) => string,
            _ => panic!(),
        };
        assert_eq!(message, "Forwarded element must contain a message.");
    }
}
