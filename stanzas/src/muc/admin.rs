// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::convert::TryFrom;

use minidom::Element;

use crate::iq::{IqGetPayload, IqResultPayload, IqSetPayload};
use crate::jid::Jid;
use crate::muc::user::{Affiliation, Role};
use crate::ns;
use crate::util::error::Error;

/// An item of a muc#admin query: either a change request, an occupant-list
/// request (affiliation or role only), or one entry of the response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdminItem {
    /// The affiliation to query or assign.
    pub affiliation: Option<Affiliation>,

    /// The role to query or assign.
    pub role: Option<Role>,

    /// The JID affected by this item.
    pub jid: Option<Jid>,

    /// The nickname affected by this item.
    pub nick: Option<String>,

    /// The reason given for the change.
    pub reason: Option<String>,
}

impl TryFrom<Element> for AdminItem {
    type Error = Error;

    fn try_from(elem: Element) -> Result<AdminItem, Error> {
        check_self!(elem, "item", MUC_ADMIN);
        check_no_unknown_attributes!(elem, "item", ["affiliation", "role", "jid", "nick"]);
        let mut item = AdminItem {
            affiliation: get_attr!(elem, "affiliation", Option),
            role: get_attr!(elem, "role", Option),
            jid: get_attr!(elem, "jid", Option),
            nick: get_attr!(elem, "nick", Option),
            reason: None,
        };
        for child in elem.children() {
            if child.is("reason", ns::MUC_ADMIN) {
                item.reason = Some(child.text());
            } else if child.is("actor", ns::MUC_ADMIN) {
                // Reported by some servers on list responses, ignored.
            } else {
                return Err(Error::ParseError("Unknown child in admin item."));
            }
        }
        Ok(item)
    }
}

impl From<AdminItem> for Element {
    fn from(item: AdminItem) -> Element {
        Element::builder("item", ns::MUC_ADMIN)
            .attr("affiliation", item.affiliation)
            .attr("role", item.role)
            .attr("jid", item.jid)
            .attr("nick", item.nick)
            .append_all(item.reason.map(|reason| {
                Element::builder("reason", ns::MUC_ADMIN)
                    .append(reason)
                    .build()
            }))
            .build()
    }
}

/// A muc#admin query, to read or change affiliations and roles.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdminQuery {
    /// The items of this query.
    pub items: Vec<AdminItem>,
}

impl IqGetPayload for AdminQuery {}
impl IqSetPayload for AdminQuery {}
impl IqResultPayload for AdminQuery {}

impl TryFrom<Element> for AdminQuery {
    type Error = Error;

    fn try_from(elem: Element) -> Result<AdminQuery, Error> {
        check_self!(elem, "query", MUC_ADMIN, "muc#admin query");
        check_no_attributes!(elem, "query");
        let mut query = AdminQuery::default();
        for child in elem.children() {
            if !child.is("item", ns::MUC_ADMIN) {
                return Err(Error::ParseError("Unknown child in admin query."));
            }
            query.items.push(AdminItem::try_from(child.clone())?);
        }
        Ok(query)
    }
}

impl From<AdminQuery> for Element {
    fn from(query: AdminQuery) -> Element {
        Element::builder("query", ns::MUC_ADMIN)
            .append_all(query.items)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kick_request() {
        let elem: Element = "<query xmlns='http://jabber.org/protocol/muc#admin'><item nick='pistol' role='none'><reason>Avaunt!</reason></item></query>"
            .parse()
            .unwrap();
        let query = AdminQuery::try_from(elem).unwrap();
        assert_eq!(query.items.len(), 1);
        assert_eq!(query.items[0].nick.as_deref(), Some("pistol"));
        assert_eq!(query.items[0].role, Some(Role::None));
        assert_eq!(query.items[0].reason.as_deref(), Some("Avaunt!"));
    }

    #[test]
    fn test_list_request_roundtrip() {
        let elem: Element = "<query xmlns='http://jabber.org/protocol/muc#admin'><item affiliation='outcast'/></query>"
            .parse()
            .unwrap();
        let elem1 = elem.clone();
        let query = AdminQuery::try_from(elem).unwrap();
        assert_eq!(query.items[0].affiliation, Some(Affiliation::Outcast));
        let elem2 = Element::from(query);
        assert_eq!(elem1, elem2);
    }
}
