// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::convert::TryFrom;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use minidom::Element;

use crate::ns;
use crate::presence::PresencePayload;
use crate::util::error::Error;

/// How much of the room history to request on join.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct History {
    /// Limit the total number of characters in the history.
    pub maxchars: Option<u32>,

    /// Limit the total number of messages in the history.
    pub maxstanzas: Option<u32>,

    /// Send only the messages received in the last `seconds` seconds.
    pub seconds: Option<u32>,

    /// Send only the messages received since this datetime.
    pub since: Option<DateTime<FixedOffset>>,
}

impl History {
    /// Requests an empty history.
    pub fn none() -> History {
        History {
            maxchars: Some(0),
            ..History::default()
        }
    }
}

impl TryFrom<Element> for History {
    type Error = Error;

    fn try_from(elem: Element) -> Result<History, Error> {
        check_self!(elem, "history", MUC);
        check_no_children!(elem, "history");
        check_no_unknown_attributes!(
            elem,
            "history",
            ["maxchars", "maxstanzas", "seconds", "since"]
        );
        let since: Option<String> = get_attr!(elem, "since", Option);
        Ok(History {
            maxchars: get_attr!(elem, "maxchars", Option),
            maxstanzas: get_attr!(elem, "maxstanzas", Option),
            seconds: get_attr!(elem, "seconds", Option),
            since: match since {
                Some(since) => Some(DateTime::parse_from_rfc3339(&since)?),
                None => None,
            },
        })
    }
}

impl From<History> for Element {
    fn from(history: History) -> Element {
        Element::builder("history", ns::MUC)
            .attr("maxchars", history.maxchars.map(|v| format!("{}", v)))
            .attr("maxstanzas", history.maxstanzas.map(|v| format!("{}", v)))
            .attr("seconds", history.seconds.map(|v| format!("{}", v)))
            .attr(
                "since",
                history
                    .since
                    .map(|since| since.to_rfc3339_opts(SecondsFormat::Secs, true)),
            )
            .build()
    }
}

/// The `<x/>` envelope sent in the presence used to join a room.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Muc {
    /// The password to use when the room is protected by one.
    pub password: Option<String>,

    /// Control how much of the room history to receive.
    pub history: Option<History>,
}

impl PresencePayload for Muc {}

impl Muc {
    /// Creates an empty join envelope.
    pub fn new() -> Muc {
        Muc::default()
    }

    /// Sets the password to use for the room.
    pub fn with_password<S: Into<String>>(mut self, password: S) -> Muc {
        self.password = Some(password.into());
        self
    }

    /// Sets the history request of the join.
    pub fn with_history(mut self, history: History) -> Muc {
        self.history = Some(history);
        self
    }
}

impl TryFrom<Element> for Muc {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Muc, Error> {
        check_self!(elem, "x", MUC);
        check_no_attributes!(elem, "x");
        let mut muc = Muc::default();
        for child in elem.children() {
            if child.is("password", ns::MUC) {
                if muc.password.is_some() {
                    return Err(Error::ParseError("More than one password in x element."));
                }
                muc.password = Some(child.text());
            } else if child.is("history", ns::MUC) {
                if muc.history.is_some() {
                    return Err(Error::ParseError("More than one history in x element."));
                }
                muc.history = Some(History::try_from(child.clone())?);
            } else {
                return Err(Error::ParseError("Unknown child in x element."));
            }
        }
        Ok(muc)
    }
}

impl From<Muc> for Element {
    fn from(muc: Muc) -> Element {
        Element::builder("x", ns::MUC)
            .append_all(muc.password.map(|password| {
                Element::builder("password", ns::MUC)
                    .append(password)
                    .build()
            }))
            .append_all(muc.history.map(Element::from))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_muc_simple() {
        let elem: Element = "<x xmlns='http://jabber.org/protocol/muc'/>".parse().unwrap();
        Muc::try_from(elem).unwrap();
    }

    #[test]
    fn test_history() {
        let elem: Element = "<x xmlns='http://jabber.org/protocol/muc'><history maxstanzas='20'/></x>"
            .parse()
            .unwrap();
        let muc = Muc::try_from(elem).unwrap();
        let history = muc.history.unwrap();
        assert_eq!(history.maxstanzas, Some(20));

        let muc = Muc::new().with_history(History::none());
        let elem = Element::from(muc);
        let muc = Muc::try_from(elem).unwrap();
        assert_eq!(muc.history.unwrap().maxchars, Some(0));
    }

    #[test]
    fn test_password_roundtrip() {
        let elem: Element =
            "<x xmlns='http://jabber.org/protocol/muc'><password>coucou</password></x>"
                .parse()
                .unwrap();
        let elem1 = elem.clone();
        let muc = Muc::try_from(elem).unwrap();
        assert_eq!(muc.password.as_deref(), Some("coucou"));
        let elem2 = Element::from(muc);
        assert_eq!(elem1, elem2);
    }
}
