// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Entity time (XEP-0202).

use core::convert::TryFrom;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use minidom::Element;

use crate::iq::{IqGetPayload, IqResultPayload};
use crate::ns;
use crate::util::error::Error;

generate_empty_element!(
    /// Asks an entity for its current local time.
    TimeQuery,
    "time",
    TIME
);

impl IqGetPayload for TimeQuery {}

/// The current time of an entity, with its timezone offset.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeResult {
    /// The UTC time of the entity.
    pub utc: DateTime<FixedOffset>,

    /// The numeric timezone offset of the entity, e.g. `-06:00`.
    pub tzo: String,
}

impl IqResultPayload for TimeResult {}

impl TryFrom<Element> for TimeResult {
    type Error = Error;

    fn try_from(elem: Element) -> Result<TimeResult, Error> {
        check_self!(elem, "time", TIME);
        check_no_attributes!(elem, "time");
        let mut utc = None;
        let mut tzo = None;
        for child in elem.children() {
            if child.is("utc", ns::TIME) {
                if utc.is_some() {
                    return Err(Error::ParseError("More than one utc in time element."));
                }
                utc = Some(DateTime::parse_from_rfc3339(&child.text())?);
            } else if child.is("tzo", ns::TIME) {
                if tzo.is_some() {
                    return Err(Error::ParseError("More than one tzo in time element."));
                }
                tzo = Some(child.text());
            } else {
                return Err(Error::ParseError("Unknown child in time element."));
            }
        }
        Ok(TimeResult {
            utc: utc.ok_or(Error::ParseError("Missing utc in time element."))?,
            tzo: tzo.ok_or(Error::ParseError("Missing tzo in time element."))?,
        })
    }
}

impl From<TimeResult> for Element {
    fn from(time: TimeResult) -> Element {
        Element::builder("time", ns::TIME)
            .append(
                Element::builder("tzo", ns::TIME)
                    .append(time.tzo)
                    .build(),
            )
            .append(
                Element::builder("utc", ns::TIME)
                    .append(time.utc.to_rfc3339_opts(SecondsFormat::Secs, true))
                    .build(),
            )
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result() {
        let elem: Element = "<time xmlns='urn:xmpp:time'><tzo>-06:00</tzo><utc>2006-12-19T17:58:35Z</utc></time>"
            .parse()
            .unwrap();
        let time = TimeResult::try_from(elem).unwrap();
        assert_eq!(time.tzo, "-06:00");
        assert_eq!(time.utc.timestamp(), 1166551115);
    }

    #[test]
    fn test_missing_tzo() {
        let elem: Element = "<time xmlns='urn:xmpp:time'><utc>2006-12-19T17:58:35Z</utc></time>"
            .parse()
            .unwrap();
        let error = TimeResult::try_from(elem).unwrap_err();
        let message = match error {
            Error::ParseError(string) => string,
            _ => panic!(),
        };
        assert_eq!(message, "Missing tzo in time element.");
    }
}
