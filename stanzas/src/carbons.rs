// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Message carbons (XEP-0280).

use core::convert::TryFrom;

use minidom::Element;

use crate::forwarding::Forwarded;
use crate::iq::IqSetPayload;
use crate::message::MessagePayload;
use crate::ns;
use crate::util::error::Error;

generate_empty_element!(
    /// Enable carbons for this session.
    Enable,
    "enable",
    CARBONS
);

impl IqSetPayload for Enable {}

generate_empty_element!(
    /// Disable a previously-enabled carbons session.
    Disable,
    "disable",
    CARBONS
);

impl IqSetPayload for Disable {}

generate_empty_element!(
    /// Request the enclosing message to not be copied to other
    /// carbons-enabled resources of the user.
    Private,
    "private",
    CARBONS
);

impl MessagePayload for Private {}

/// Wrapper for a message received on another resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Received {
    /// Wrapper for the enclosed message.
    pub forwarded: Forwarded,
}

impl MessagePayload for Received {}

impl TryFrom<Element> for Received {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Received, Error> {
        check_self!(elem, "received", CARBONS);
        check_no_attributes!(elem, "received");
        let mut forwarded = None;
        for child in elem.children() {
            if !child.is("forwarded", ns::FORWARD) || forwarded.is_some() {
                return Err(Error::ParseError("Unknown child in received element."));
            }
            forwarded = Some(Forwarded::try_from(child.clone())?);
        }
        Ok(Received {
            forwarded: forwarded
                .ok_or(Error::ParseError("Missing forwarded in received element."))?,
        })
    }
}

impl From<Received> for Element {
    fn from(received: Received) -> Element {
        Element::builder("received", ns::CARBONS)
            .append(Element::from(received.forwarded))
            .build()
    }
}

/// Wrapper for a message sent from another resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    /// Wrapper for the enclosed message.
    pub forwarded: Forwarded,
}

impl MessagePayload for Sent {}

impl TryFrom<Element> for Sent {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Sent, Error> {
        check_self!(elem, "sent", CARBONS);
        check_no_attributes!(elem, "sent");
        let mut forwarded = None;
        for child in elem.children() {
            if !child.is("forwarded", ns::FORWARD) || forwarded.is_some() {
                return Err(Error::ParseError("Unknown child in sent element."));
            }
            forwarded = Some(Forwarded::try_from(child.clone())?);
        }
        Ok(Sent {
            forwarded: forwarded.ok_or(Error::ParseError("Missing forwarded in sent element."))?,
        })
    }
}

impl From<Sent> for Element {
    fn from(sent: Sent) -> Element {
        Element::builder("sent", ns::CARBONS)
            .append(Element::from(sent.forwarded))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jid::Jid;

    #[test]
    fn empty_elements() {
        let elem: Element = "<enable xmlns='urn:xmpp:carbons:2'/>".parse().unwrap();
        Enable::try_from(elem).unwrap();

        let elem: Element = "<disable xmlns='urn:xmpp:carbons:2'/>".parse().unwrap();
        Disable::try_from(elem).unwrap();

        let elem: Element = "<private xmlns='urn:xmpp:carbons:2'/>".parse().unwrap();
        Private::try_from(elem).unwrap();
    }

    #[test]
    fn forwarded_elements() {
        let elem: Element = "<received xmlns='urn:xmpp:carbons:2'>
  <forwarded xmlns='urn:xmpp:forward:0'>
    <message xmlns='jabber:client'
             to='juliet@capulet.example/balcony'
             from='romeo@montague.example/home'/>
  </forwarded>
</received>"
            .parse()
            .unwrap();
        let received = Received::try_from(elem).unwrap();
        assert_eq!(
            received.forwarded.message.to,
            Some(Jid::new("juliet@capulet.example/balcony").unwrap())
        );

        let elem: Element = "<sent xmlns='urn:xmpp:carbons:2'>
  <forwarded xmlns='urn:xmpp:forward:0'>
    <message xmlns='jabber:client'
             to='juliet@capulet.example/balcony'
             from='romeo@montague.example/home'/>
  </forwarded>
</sent>"
            .parse()
            .unwrap();
        let sent = Sent::try_from(elem).unwrap();
        assert_eq!(
            sent.forwarded.message.from,
            Some(Jid::new("romeo@montague.example/home").unwrap())
        );
    }

    #[test]
    fn test_serialize_received() {
        let reference: Element = "<received xmlns='urn:xmpp:carbons:2'><forwarded xmlns='urn:xmpp:forward:0'><message xmlns='jabber:client' to='juliet@capulet.example/balcony' from='romeo@montague.example/home'/></forwarded></received>"
            .parse()
            .unwrap();

        let elem: Element = "<forwarded xmlns='urn:xmpp:forward:0'><message xmlns='jabber:client' to='juliet@capulet.example/balcony' from='romeo@montague.example/home'/></forwarded>"
            .parse()
            .unwrap();
        let forwarded = Forwarded::try_from(elem).unwrap();

        let received = Received { forwarded };
        let serialized: Element = received.into();
        assert_eq!(serialized, reference);
    }
}
