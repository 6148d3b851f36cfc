// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::convert::TryFrom;
use std::collections::BTreeMap;

use minidom::Element;

use crate::jid::Jid;
use crate::ns;
use crate::util::error::Error;

/// Should be implemented on every known payload of a `<presence/>`.
pub trait PresencePayload: TryFrom<Element> + Into<Element> {}

generate_attribute!(
    /// The availability of an entity, beyond plain available.
    Show, "show", {
        /// The entity or resource is temporarily away.
        Away => "away",

        /// The entity or resource is actively interested in chatting.
        Chat => "chat",

        /// The entity or resource is busy (dnd = "Do Not Disturb").
        Dnd => "dnd",

        /// The entity or resource is away for an extended period (xa =
        /// "eXtended Away").
        Xa => "xa",
    }
);

generate_attribute!(
    /// The type of a presence.
    PresenceType, "type", {
        /// An error has occurred regarding processing of a previously sent
        /// presence stanza.
        Error => "error",

        /// A request for an entity's current presence.
        Probe => "probe",

        /// The sender wishes to subscribe to the recipient's presence.
        Subscribe => "subscribe",

        /// The sender has allowed the recipient to receive their presence.
        Subscribed => "subscribed",

        /// The sender is no longer available for communication.
        Unavailable => "unavailable",

        /// The sender is unsubscribing from the receiver's presence.
        Unsubscribe => "unsubscribe",

        /// The subscription request has been denied or a previously granted
        /// subscription has been canceled.
        Unsubscribed => "unsubscribed",

        /// The sender is available, this is the absence of a type attribute.
        None => "",
    }, Default = None
);

type Lang = String;

/// The main structure representing the `<presence/>` stanza.
#[derive(Debug, Clone, PartialEq)]
pub struct Presence {
    /// The JID emitting this stanza.
    pub from: Option<Jid>,

    /// The recipient of this stanza.
    pub to: Option<Jid>,

    /// The @id attribute of this stanza.
    pub id: Option<String>,

    /// The type of this presence.
    pub type_: PresenceType,

    /// The availability of the sender.
    pub show: Option<Show>,

    /// A list of statuses, sorted per language.
    pub statuses: BTreeMap<Lang, String>,

    /// The priority of this presence, over other resources of the same user.
    pub priority: i8,

    /// A list of the extension payloads contained in this stanza.
    pub payloads: Vec<Element>,
}

impl Presence {
    /// Creates a new presence of the given type.
    pub fn new(type_: PresenceType) -> Presence {
        Presence {
            from: None,
            to: None,
            id: None,
            type_,
            show: None,
            statuses: BTreeMap::new(),
            priority: 0i8,
            payloads: vec![],
        }
    }

    /// Creates an available presence.
    pub fn available() -> Presence {
        Presence::new(PresenceType::None)
    }

    /// Sets the recipient of this presence.
    pub fn with_to<J: Into<Jid>>(mut self, to: J) -> Presence {
        self.to = Some(to.into());
        self
    }

    /// Sets the availability of this presence.
    pub fn with_show(mut self, show: Show) -> Presence {
        self.show = Some(show);
        self
    }

    /// Sets the priority of this presence.
    pub fn with_priority(mut self, priority: i8) -> Presence {
        self.priority = priority;
        self
    }

    /// Appends a payload to this presence.
    pub fn with_payload<P: PresencePayload>(mut self, payload: P) -> Presence {
        self.payloads.push(payload.into());
        self
    }

    /// Sets the status in the given language.
    pub fn set_status<L: Into<Lang>, S: Into<String>>(&mut self, lang: L, status: S) {
        self.statuses.insert(lang.into(), status.into());
    }
}

impl TryFrom<Element> for Presence {
    type Error = Error;

    fn try_from(root: Element) -> Result<Presence, Error> {
        check_self!(root, "presence", DEFAULT_NS);
        let mut presence = Presence::new(PresenceType::None);
        presence.from = get_attr!(root, "from", Option);
        presence.to = get_attr!(root, "to", Option);
        presence.id = get_attr!(root, "id", Option);
        presence.type_ = get_attr!(root, "type", Default);
        for elem in root.children() {
            if elem.is("show", ns::DEFAULT_NS) {
                if presence.show.is_some() {
                    return Err(Error::ParseError("Show element present twice."));
                }
                check_no_children!(elem, "show");
                check_no_attributes!(elem, "show");
                presence.show = Some(elem.text().parse()?);
            } else if elem.is("status", ns::DEFAULT_NS) {
                check_no_children!(elem, "status");
                check_no_unknown_attributes!(elem, "status", ["xml:lang"]);
                let lang = get_attr!(elem, "xml:lang", Default);
                if presence.statuses.insert(lang, elem.text()).is_some() {
                    return Err(Error::ParseError(
                        "Status element present twice for the same xml:lang.",
                    ));
                }
            } else if elem.is("priority", ns::DEFAULT_NS) {
                check_no_children!(elem, "priority");
                check_no_attributes!(elem, "priority");
                presence.priority = elem.text().parse::<i8>()?;
            } else {
                presence.payloads.push(elem.clone());
            }
        }
        Ok(presence)
    }
}

impl From<Presence> for Element {
    fn from(presence: Presence) -> Element {
        Element::builder("presence", ns::DEFAULT_NS)
            .attr("from", presence.from)
            .attr("to", presence.to)
            .attr("id", presence.id)
            .attr("type", presence.type_)
            .append_all(presence.show.map(|show| {
                Element::builder("show", ns::DEFAULT_NS)
                    .append(show.to_string())
                    .build()
            }))
            .append_all(presence.statuses.into_iter().map(|(lang, status)| {
                Element::builder("status", ns::DEFAULT_NS)
                    .attr(
                        "xml:lang",
                        match lang.as_ref() {
                            "" => None,
                            lang => Some(lang),
                        },
                    )
                    .append(status)
                    .build()
            }))
            .append_all(if presence.priority == 0 {
                None
            } else {
                Some(
                    Element::builder("priority", ns::DEFAULT_NS)
                        .append(format!("{}", presence.priority))
                        .build(),
                )
            })
            .append_all(presence.payloads)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple() {
        let elem: Element = "<presence xmlns='jabber:client'/>".parse().unwrap();
        let presence = Presence::try_from(elem).unwrap();
        assert_eq!(presence.type_, PresenceType::None);
        assert_eq!(presence.show, None);
        assert_eq!(presence.priority, 0);
    }

    #[test]
    fn test_show_status_priority() {
        let elem: Element = "<presence xmlns='jabber:client'><show>dnd</show><status>Busy</status><status xml:lang='fr'>Occupé</status><priority>5</priority></presence>".parse().unwrap();
        let presence = Presence::try_from(elem).unwrap();
        assert_eq!(presence.show, Some(Show::Dnd));
        assert_eq!(presence.statuses[""], "Busy");
        assert_eq!(presence.statuses["fr"], "Occupé");
        assert_eq!(presence.priority, 5);
    }

    #[test]
    fn test_invalid_show() {
        let elem: Element = "<presence xmlns='jabber:client'><show>coucou</show></presence>"
            .parse()
            .unwrap();
        let error = Presence::try_from(elem).unwrap_err();
        let message = match error {
            Error::ParseError(string) => string,
            _ => panic!(),
        };
        assert_eq!(message, "Unknown value for 'show' attribute.");
    }

    #[test]
    fn test_subscribe() {
        let elem: Element = "<presence xmlns='jabber:client' type='subscribe' to='bob@example.org'/>"
            .parse()
            .unwrap();
        let presence = Presence::try_from(elem).unwrap();
        assert_eq!(presence.type_, PresenceType::Subscribe);
    }

    #[test]
    fn test_serialise() {
        let elem: Element = "<presence xmlns='jabber:client'><show>away</show><priority>-1</priority></presence>".parse().unwrap();
        let presence = Presence::available()
            .with_show(Show::Away)
            .with_priority(-1);
        let elem2 = Element::from(presence);
        assert_eq!(elem, elem2);
    }
}
