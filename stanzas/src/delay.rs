// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::convert::TryFrom;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use minidom::Element;

use crate::jid::Jid;
use crate::message::MessagePayload;
use crate::ns;
use crate::util::error::Error;

/// Notes when and by whom a stanza got delayed (XEP-0203).
#[derive(Debug, Clone, PartialEq)]
pub struct Delay {
    /// The entity which delayed this stanza.
    pub from: Option<Jid>,

    /// The time at which this stanza was originally sent.
    pub stamp: DateTime<FixedOffset>,

    /// The optional reason this stanza got delayed.
    pub data: Option<String>,
}

impl MessagePayload for Delay {}

impl TryFrom<Element> for Delay {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Delay, Error> {
        check_self!(elem, "delay", DELAY);
        check_no_children!(elem, "delay");
        check_no_unknown_attributes!(elem, "delay", ["from", "stamp"]);
        let stamp: String = get_attr!(elem, "stamp", Required);
        let data = match elem.text() {
            text if text.is_empty() => None,
            text => Some(text),
        };
        Ok(Delay {
            from: get_attr!(elem, "from", Option),
            stamp: DateTime::parse_from_rfc3339(&stamp)?,
            data,
        })
    }
}

impl From<Delay> for Element {
    fn from(delay: Delay) -> Element {
        Element::builder("delay", ns::DELAY)
            .attr("from", delay.from)
            .attr(
                "stamp",
                delay.stamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            )
            .append_all(delay.data)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple() {
        let elem: Element =
            "<delay xmlns='urn:xmpp:delay' from='capulet.com' stamp='2002-09-10T23:08:25Z'/>"
                .parse()
                .unwrap();
        let delay = Delay::try_from(elem).unwrap();
        assert_eq!(delay.from, Some(Jid::new("capulet.com").unwrap()));
        assert_eq!(delay.stamp.timestamp(), 1031699305);
        assert_eq!(delay.data, None);
    }

    #[test]
    fn test_invalid_stamp() {
        let elem: Element = "<delay xmlns='urn:xmpp:delay' stamp='coucou'/>"
            .parse()
            .unwrap();
        assert!(matches!(
            Delay::try_from(elem),
            Err(Error::ChronoParseError(_))
        ));
    }

    #[test]
    fn test_serialise() {
        let elem: Element = "<delay xmlns='urn:xmpp:delay' stamp='2002-09-10T23:08:25Z'/>"
            .parse()
            .unwrap();
        let delay = Delay {
            from: None,
            stamp: DateTime::parse_from_rfc3339("2002-09-10T23:08:25Z").unwrap(),
            data: None,
        };
        let elem2 = Element::from(delay);
        assert_eq!(elem, elem2);
    }
}
