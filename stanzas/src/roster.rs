// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::convert::TryFrom;

use minidom::Element;

use crate::iq::{IqGetPayload, IqResultPayload, IqSetPayload};
use crate::jid::BareJid;
use crate::ns;
use crate::util::error::Error;

generate_elem_id!(
    /// Represents a group a contact is part of.
    Group,
    "group",
    ROSTER
);

generate_attribute!(
    /// The state of your mutual subscription with a contact.
    Subscription, "subscription", {
        /// The user doesn't have any subscription to this contact's
        /// presence, and neither does this contact.
        None => "none",

        /// Only this contact has a subscription with you, not the opposite.
        From => "from",

        /// Only you have a subscription with this contact, not the opposite.
        To => "to",

        /// Both you and your contact are subscribed to each other's
        /// presence.
        Both => "both",

        /// In a roster set, this asks the server to remove this contact item
        /// from your roster.
        Remove => "remove",
    }, Default = None
);

generate_attribute!(
    /// The sub-state of subscription with a contact.
    Ask, "ask", (
        /// Pending sub-state of the 'none' subscription state.
        Subscribe => "subscribe"
    )
);

/// Contact from the user's contact list.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// JID of this contact.
    pub jid: BareJid,

    /// Name of this contact.
    pub name: Option<String>,

    /// Subscription status of this contact.
    pub subscription: Subscription,

    /// Indicates the "Pending Out" sub-state for this contact.
    pub ask: Ask,

    /// Groups this contact is part of.
    pub groups: Vec<Group>,
}

impl Item {
    /// Creates a new roster item for the given contact.
    pub fn new(jid: BareJid) -> Item {
        Item {
            jid,
            name: None,
            subscription: Subscription::None,
            ask: Ask::None,
            groups: vec![],
        }
    }
}

impl TryFrom<Element> for Item {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Item, Error> {
        check_self!(elem, "item", ROSTER);
        check_no_unknown_attributes!(elem, "item", ["jid", "name", "subscription", "ask"]);
        let mut item = Item {
            jid: get_attr!(elem, "jid", Required),
            name: get_attr!(elem, "name", Option),
            subscription: get_attr!(elem, "subscription", Default),
            ask: get_attr!(elem, "ask", Default),
            groups: vec![],
        };
        if item.name.as_deref() == Some("") {
            item.name = None;
        }
        for child in elem.children() {
            if !child.is("group", ns::ROSTER) {
                return Err(Error::ParseError("Unknown child in item element."));
            }
            item.groups.push(Group::try_from(child.clone())?);
        }
        Ok(item)
    }
}

impl From<Item> for Element {
    fn from(item: Item) -> Element {
        Element::builder("item", ns::ROSTER)
            .attr("jid", item.jid)
            .attr("name", item.name)
            .attr("subscription", item.subscription)
            .attr("ask", item.ask)
            .append_all(item.groups)
            .build()
    }
}

/// The contact list of the user.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Roster {
    /// Version of the contact list.
    ///
    /// This is an opaque string that should only be sent back to the server
    /// on a new connection, if this client is storing the contact list
    /// between connections.
    pub ver: Option<String>,

    /// List of the contacts of the user.
    pub items: Vec<Item>,
}

impl IqGetPayload for Roster {}
impl IqSetPayload for Roster {}
impl IqResultPayload for Roster {}

impl TryFrom<Element> for Roster {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Roster, Error> {
        check_self!(elem, "query", ROSTER, "roster query");
        check_no_unknown_attributes!(elem, "query", ["ver"]);
        let mut roster = Roster {
            ver: get_attr!(elem, "ver", Option),
            items: vec![],
        };
        for child in elem.children() {
            if !child.is("item", ns::ROSTER) {
                return Err(Error::ParseError("Unknown child in roster query."));
            }
            roster.items.push(Item::try_from(child.clone())?);
        }
        Ok(roster)
    }
}

impl From<Roster> for Element {
    fn from(roster: Roster) -> Element {
        Element::builder("query", ns::ROSTER)
            .attr("ver", roster.ver)
            .append_all(roster.items)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;

    #[test]
    fn test_get() {
        let elem: Element = "<query xmlns='jabber:iq:roster'/>".parse().unwrap();
        let roster = Roster::try_from(elem).unwrap();
        assert!(roster.ver.is_none());
        assert!(roster.items.is_empty());
    }

    #[test]
    fn test_result() {
        let elem: Element = r#"<query xmlns='jabber:iq:roster' ver='ver11'>
  <item jid='romeo@example.net'
        name='Romeo'
        subscription='both'>
    <group>Friends</group>
  </item>
  <item jid='contact@example.org'
        subscription='none'
        ask='subscribe'
        name='MyContact'/>
</query>"#
            .parse()
            .unwrap();
        let roster = Roster::try_from(elem).unwrap();
        assert_eq!(roster.ver, Some(String::from("ver11")));
        assert_eq!(roster.items.len(), 2);
        assert_eq!(
            roster.items[0].jid,
            BareJid::new("romeo@example.net").unwrap()
        );
        assert_eq!(roster.items[0].subscription, Subscription::Both);
        assert_eq!(roster.items[0].ask, Ask::None);
        assert_eq!(
            roster.items[0].groups,
            vec![Group::from_str("Friends").unwrap()]
        );
        assert_eq!(roster.items[1].subscription, Subscription::None);
        assert_eq!(roster.items[1].ask, Ask::Subscribe);
    }

    #[test]
    fn test_remove() {
        let elem: Element = r#"<query xmlns='jabber:iq:roster'>
  <item jid='nurse@example.com' subscription='remove'/>
</query>"#
            .parse()
            .unwrap();
        let roster = Roster::try_from(elem).unwrap();
        assert_eq!(roster.items[0].subscription, Subscription::Remove);
    }

    #[test]
    fn test_roundtrip() {
        let elem: Element = "<query xmlns='jabber:iq:roster'><item jid='test@example.org'><group>A</group><group>B</group></item></query>"
            .parse()
            .unwrap();
        let elem1 = elem.clone();
        let roster = Roster::try_from(elem).unwrap();
        assert_eq!(roster.items[0].groups.len(), 2);
        let elem2 = Element::from(roster);
        assert_eq!(elem1, elem2);
    }

    #[test]
    fn test_invalid_child() {
        let elem: Element = "<query xmlns='jabber:iq:roster'><coucou/></query>"
            .parse()
            .unwrap();
        let error = Roster::try_from(elem).unwrap_err();
        let message = match error {
            Error::ParseError(string) => string,
            _ => panic!(),
        };
        assert_eq!(message, "Unknown child in roster query.");
    }
}
