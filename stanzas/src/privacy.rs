// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Privacy lists (XEP-0016).

use core::convert::TryFrom;

use minidom::Element;

use crate::iq::{IqGetPayload, IqResultPayload, IqSetPayload};
use crate::ns;
use crate::util::error::Error;

generate_attribute!(
    /// Whether a matching stanza is let through or discarded.
    Action, "action", {
        /// The stanza is delivered.
        Allow => "allow",

        /// The stanza is dropped.
        Deny => "deny",
    }
);

generate_attribute!(
    /// What a privacy rule matches on.
    SelectorType, "type", {
        /// Matches a JID, following the XEP-0016 shadowing rules.
        Jid => "jid",

        /// Matches every contact in the named roster group.
        Group => "group",

        /// Matches contacts with the given subscription state.
        Subscription => "subscription",
    }
);

/// One rule of a privacy list.
///
/// A rule without a selector type matches everything; a rule without any
/// granularity flag matches every stanza kind.
#[derive(Debug, Clone, PartialEq)]
pub struct PrivacyItem {
    /// What this rule matches on, everything when absent.
    pub type_: Option<SelectorType>,

    /// The value the selector compares against.
    pub value: Option<String>,

    /// Whether matching stanzas are allowed or denied.
    pub action: Action,

    /// The evaluation position of this rule; unique within a list,
    /// evaluated in ascending order.
    pub order: u32,

    /// Rule applies to messages.
    pub message: bool,

    /// Rule applies to inbound presence.
    pub presence_in: bool,

    /// Rule applies to outbound presence.
    pub presence_out: bool,

    /// Rule applies to iq stanzas.
    pub iq: bool,
}

impl PrivacyItem {
    /// Creates a new rule matching everything.
    pub fn new(action: Action, order: u32) -> PrivacyItem {
        PrivacyItem {
            type_: None,
            value: None,
            action,
            order,
            message: false,
            presence_in: false,
            presence_out: false,
            iq: false,
        }
    }

    /// Whether this rule constrains no stanza kind, i.e. matches all of
    /// them.
    pub fn matches_all_kinds(&self) -> bool {
        !self.message && !self.presence_in && !self.presence_out && !self.iq
    }
}

impl TryFrom<Element> for PrivacyItem {
    type Error = Error;

    fn try_from(elem: Element) -> Result<PrivacyItem, Error> {
        check_self!(elem, "item", PRIVACY);
        check_no_unknown_attributes!(elem, "item", ["type", "value", "action", "order"]);
        let mut item = PrivacyItem {
            type_: get_attr!(elem, "type", Option),
            value: get_attr!(elem, "value", Option),
            action: get_attr!(elem, "action", Required),
            order: get_attr!(elem, "order", Required),
            message: false,
            presence_in: false,
            presence_out: false,
            iq: false,
        };
        if item.type_.is_some() && item.value.is_none() {
            return Err(Error::ParseError(
                "Privacy item with a type must have a value.",
            ));
        }
        for child in elem.children() {
            if child.is("message", ns::PRIVACY) {
                item.message = true;
            } else if child.is("presence-in", ns::PRIVACY) {
                item.presence_in = true;
            } else if child.is("presence-out", ns::PRIVACY) {
                item.presence_out = true;
            } else if child.is("iq", ns::PRIVACY) {
                item.iq = true;
            } else {
                return Err(Error::ParseError("Unknown child in privacy item."));
            }
        }
        Ok(item)
    }
}

impl From<PrivacyItem> for Element {
    fn from(item: PrivacyItem) -> Element {
        Element::builder("item", ns::PRIVACY)
            .attr("type", item.type_)
            .attr("value", item.value)
            .attr("action", item.action)
            .attr("order", format!("{}", item.order))
            .append_all(
                [
                    (item.message, "message"),
                    (item.presence_in, "presence-in"),
                    (item.presence_out, "presence-out"),
                    (item.iq, "iq"),
                ]
                .into_iter()
                .filter(|(set, _)| *set)
                .map(|(_, name)| Element::builder(name, ns::PRIVACY).build()),
            )
            .build()
    }
}

/// A named, ordered privacy list.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    /// The name of this list.
    pub name: String,

    /// The rules, in ascending order of evaluation.
    pub items: Vec<PrivacyItem>,
}

impl List {
    /// Creates a new empty list.
    pub fn new<N: Into<String>>(name: N) -> List {
        List {
            name: name.into(),
            items: vec![],
        }
    }
}

impl TryFrom<Element> for List {
    type Error = Error;

    fn try_from(elem: Element) -> Result<List, Error> {
        check_self!(elem, "list", PRIVACY);
        check_no_unknown_attributes!(elem, "list", ["name"]);
        let mut list = List {
            name: get_attr!(elem, "name", Required),
            items: vec![],
        };
        for child in elem.children() {
            if !child.is("item", ns::PRIVACY) {
                return Err(Error::ParseError("Unknown child in privacy list."));
            }
            list.items.push(PrivacyItem::try_from(child.clone())?);
        }
        list.items.sort_by_key(|item| item.order);
        for window in list.items.windows(2) {
            if window[0].order == window[1].order {
                return Err(Error::ParseError(
                    "Duplicate order in privacy list items.",
                ));
            }
        }
        Ok(list)
    }
}

impl From<List> for Element {
    fn from(list: List) -> Element {
        Element::builder("list", ns::PRIVACY)
            .attr("name", list.name)
            .append_all(list.items)
            .build()
    }
}

/// The name of a list referenced by an `<active/>` or `<default/>` child; an
/// absent name declines the active or default list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRef {
    /// The name of the referenced list, if any.
    pub name: Option<String>,
}

fn parse_list_ref(elem: &Element) -> Result<ListRef, Error> {
    check_no_children!(elem, "list reference");
    check_no_unknown_attributes!(elem, "list reference", ["name"]);
    Ok(ListRef {
        name: get_attr!(elem, "name", Option),
    })
}

/// A privacy query or response, carrying list declarations and the
/// active/default markers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    /// The list active for this session.
    pub active: Option<ListRef>,

    /// The list applied when no list is active.
    pub default: Option<ListRef>,

    /// List payloads; a get carries names only, a result the full rules.
    pub lists: Vec<List>,
}

impl IqGetPayload for Query {}
impl IqSetPayload for Query {}
impl IqResultPayload for Query {}

impl TryFrom<Element> for Query {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Query, Error> {
        check_self!(elem, "query", PRIVACY, "privacy query");
        check_no_attributes!(elem, "query");
        let mut query = Query::default();
        for child in elem.children() {
            if child.is("active", ns::PRIVACY) {
                query.active = Some(parse_list_ref(child)?);
            } else if child.is("default", ns::PRIVACY) {
                query.default = Some(parse_list_ref(child)?);
            } else if child.is("list", ns::PRIVACY) {
                query.lists.push(List::try_from(child.clone())?);
            } else {
                return Err(Error::ParseError("Unknown child in privacy query."));
            }
        }
        Ok(query)
    }
}

impl From<Query> for Element {
    fn from(query: Query) -> Element {
        Element::builder("query", ns::PRIVACY)
            .append_all(query.active.map(|active| {
                Element::builder("active", ns::PRIVACY)
                    .attr("name", active.name)
                    .build()
            }))
            .append_all(query.default.map(|default| {
                Element::builder("default", ns::PRIVACY)
                    .attr("name", default.name)
                    .build()
            }))
            .append_all(query.lists)
            .build()
    }
}
