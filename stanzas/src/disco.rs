// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Service discovery (XEP-0030).

use core::convert::TryFrom;

use minidom::Element;

use crate::data_forms::{DataForm, DataFormType};
use crate::iq::{IqGetPayload, IqResultPayload};
use crate::jid::Jid;
use crate::ns;
use crate::rsm::{SetQuery, SetResult};
use crate::util::error::Error;

/// Structure representing a `disco#info` request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiscoInfoQuery {
    /// Node on which we are doing the discovery.
    pub node: Option<String>,
}

impl IqGetPayload for DiscoInfoQuery {}

impl TryFrom<Element> for DiscoInfoQuery {
    type Error = Error;

    fn try_from(elem: Element) -> Result<DiscoInfoQuery, Error> {
        check_self!(elem, "query", DISCO_INFO, "disco#info query");
        check_no_children!(elem, "disco#info query");
        check_no_unknown_attributes!(elem, "disco#info query", ["node"]);
        Ok(DiscoInfoQuery {
            node: get_attr!(elem, "node", Option),
        })
    }
}

impl From<DiscoInfoQuery> for Element {
    fn from(query: DiscoInfoQuery) -> Element {
        Element::builder("query", ns::DISCO_INFO)
            .attr("node", query.node)
            .build()
    }
}

/// Structure representing a `<feature/>` element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Feature {
    /// Namespace of the feature we want to represent.
    pub var: String,
}

impl Feature {
    /// Create a new `<feature/>` with the according `@var`.
    pub fn new<S: Into<String>>(var: S) -> Feature {
        Feature { var: var.into() }
    }
}

impl TryFrom<Element> for Feature {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Feature, Error> {
        check_self!(elem, "feature", DISCO_INFO);
        check_no_children!(elem, "feature");
        check_no_unknown_attributes!(elem, "feature", ["var"]);
        Ok(Feature {
            var: get_attr!(elem, "var", Required),
        })
    }
}

impl From<Feature> for Element {
    fn from(feature: Feature) -> Element {
        Element::builder("feature", ns::DISCO_INFO)
            .attr("var", feature.var)
            .build()
    }
}

/// Structure representing an `<identity/>` element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Category of this identity.
    pub category: String,

    /// Type of this identity.
    pub type_: String,

    /// Lang of the name of this identity.
    pub lang: Option<String>,

    /// Name of this identity.
    pub name: Option<String>,
}

impl Identity {
    /// Create a new `<identity/>`.
    pub fn new<C, T, L, N>(category: C, type_: T, lang: L, name: N) -> Identity
    where
        C: Into<String>,
        T: Into<String>,
        L: Into<String>,
        N: Into<String>,
    {
        Identity {
            category: category.into(),
            type_: type_.into(),
            lang: Some(lang.into()),
            name: Some(name.into()),
        }
    }
}

impl TryFrom<Element> for Identity {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Identity, Error> {
        check_self!(elem, "identity", DISCO_INFO);
        check_no_children!(elem, "identity");
        check_no_unknown_attributes!(elem, "identity", ["category", "type", "xml:lang", "name"]);
        let category: String = get_attr!(elem, "category", Required);
        if category.is_empty() {
            return Err(Error::ParseError("Identity must have a non-empty 'category' attribute."));
        }
        let type_: String = get_attr!(elem, "type", Required);
        if type_.is_empty() {
            return Err(Error::ParseError("Identity must have a non-empty 'type' attribute."));
        }
        Ok(Identity {
            category,
            type_,
            lang: get_attr!(elem, "xml:lang", Option),
            name: get_attr!(elem, "name", Option),
        })
    }
}

impl From<Identity> for Element {
    fn from(identity: Identity) -> Element {
        Element::builder("identity", ns::DISCO_INFO)
            .attr("category", identity.category)
            .attr("type", identity.type_)
            .attr("xml:lang", identity.lang)
            .attr("name", identity.name)
            .build()
    }
}

/// Structure representing a `disco#info` result.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoInfoResult {
    /// Node on which we have done this discovery.
    pub node: Option<String>,

    /// List of identities exposed by this entity.
    pub identities: Vec<Identity>,

    /// List of features supported by this entity.
    pub features: Vec<Feature>,

    /// List of extensions reported by this entity.
    pub extensions: Vec<DataForm>,
}

impl IqResultPayload for DiscoInfoResult {}

impl DiscoInfoResult {
    /// Whether the given feature namespace is advertised.
    pub fn has_feature(&self, var: &str) -> bool {
        self.features.iter().any(|feature| feature.var == var)
    }
}

impl TryFrom<Element> for DiscoInfoResult {
    type Error = Error;

    fn try_from(elem: Element) -> Result<DiscoInfoResult, Error> {
        check_self!(elem, "query", DISCO_INFO, "disco#info result");
        check_no_unknown_attributes!(elem, "disco#info result", ["node"]);

        let mut result = DiscoInfoResult {
            node: get_attr!(elem, "node", Option),
            identities: vec![],
            features: vec![],
            extensions: vec![],
        };

        for child in elem.children() {
            if child.is("identity", ns::DISCO_INFO) {
                result.identities.push(Identity::try_from(child.clone())?);
            } else if child.is("feature", ns::DISCO_INFO) {
                result.features.push(Feature::try_from(child.clone())?);
            } else if child.is("x", ns::DATA_FORMS) {
                let form = DataForm::try_from(child.clone())?;
                if form.type_ != DataFormType::Result_ {
                    return Err(Error::ParseError(
                        "Data form must have a 'result' type in disco#info.",
                    ));
                }
                result.extensions.push(form);
            } else {
                return Err(Error::ParseError("Unknown element in disco#info."));
            }
        }

        Ok(result)
    }
}

impl From<DiscoInfoResult> for Element {
    fn from(disco: DiscoInfoResult) -> Element {
        Element::builder("query", ns::DISCO_INFO)
            .attr("node", disco.node)
            .append_all(disco.identities)
            .append_all(disco.features)
            .append_all(disco.extensions.into_iter().map(Element::from))
            .build()
    }
}

/// Structure representing a `disco#items` request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiscoItemsQuery {
    /// Node on which we are doing the discovery.
    pub node: Option<String>,

    /// Optional paging via Result Set Management.
    pub rsm: Option<SetQuery>,
}

impl IqGetPayload for DiscoItemsQuery {}

impl TryFrom<Element> for DiscoItemsQuery {
    type Error = Error;

    fn try_from(elem: Element) -> Result<DiscoItemsQuery, Error> {
        check_self!(elem, "query", DISCO_ITEMS, "disco#items query");
        check_no_unknown_attributes!(elem, "disco#items query", ["node"]);
        let mut query = DiscoItemsQuery {
            node: get_attr!(elem, "node", Option),
            rsm: None,
        };
        for child in elem.children() {
            if child.is("set", ns::RSM) {
                if query.rsm.is_some() {
                    return Err(Error::ParseError("More than one set in disco#items query."));
                }
                query.rsm = Some(SetQuery::try_from(child.clone())?);
            } else {
                return Err(Error::ParseError("Unknown element in disco#items query."));
            }
        }
        Ok(query)
    }
}

impl From<DiscoItemsQuery> for Element {
    fn from(query: DiscoItemsQuery) -> Element {
        Element::builder("query", ns::DISCO_ITEMS)
            .attr("node", query.node)
            .append_all(query.rsm.map(Element::from))
            .build()
    }
}

/// Structure representing an `<item/>` element of a `disco#items` result.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// JID of the entity pointed by this item.
    pub jid: Jid,

    /// Node of the entity pointed by this item.
    pub node: Option<String>,

    /// Name of the entity pointed by this item.
    pub name: Option<String>,
}

impl TryFrom<Element> for Item {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Item, Error> {
        check_self!(elem, "item", DISCO_ITEMS);
        check_no_children!(elem, "item");
        check_no_unknown_attributes!(elem, "item", ["jid", "node", "name"]);
        Ok(Item {
            jid: get_attr!(elem, "jid", Required),
            node: get_attr!(elem, "node", Option),
            name: get_attr!(elem, "name", Option),
        })
    }
}

impl From<Item> for Element {
    fn from(item: Item) -> Element {
        Element::builder("item", ns::DISCO_ITEMS)
            .attr("jid", item.jid)
            .attr("node", item.node)
            .attr("name", item.name)
            .build()
    }
}

/// Structure representing a `disco#items` result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiscoItemsResult {
    /// Node on which we have done this discovery.
    pub node: Option<String>,

    /// List of items pointed by this entity.
    pub items: Vec<Item>,

    /// Optional paging via Result Set Management.
    pub rsm: Option<SetResult>,
}

impl IqResultPayload for DiscoItemsResult {}

impl TryFrom<Element> for DiscoItemsResult {
    type Error = Error;

    fn try_from(elem: Element) -> Result<DiscoItemsResult, Error> {
        check_self!(elem, "query", DISCO_ITEMS, "disco#items result");
        check_no_unknown_attributes!(elem, "disco#items result", ["node"]);
        let mut result = DiscoItemsResult {
            node: get_attr!(elem, "node", Option),
            items: vec![],
            rsm: None,
        };
        for child in elem.children() {
            if child.is("item", ns::DISCO_ITEMS) {
                result.items.push(Item::try_from(child.clone())?);
            } else if child.is("set", ns::RSM) {
                if result.rsm.is_some() {
                    return Err(Error::ParseError(
                        "More than one set in disco#items result.",
                    ));
                }
                result.rsm = Some(SetResult::try_from(child.clone())?);
            } else {
                return Err(Error::ParseError("Unknown element in disco#items result."));
            }
        }
        Ok(result)
    }
}

impl From<DiscoItemsResult> for Element {
    fn from(result: DiscoItemsResult) -> Element {
        Element::builder("query", ns::DISCO_ITEMS)
            .attr("node", result.node)
            .append_all(result.items)
            .append_all(result.rsm.map(Element::from))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_query() {
        let elem: Element = "<query xmlns='http://jabber.org/protocol/disco#info'/>"
            .parse()
            .unwrap();
        let query = DiscoInfoQuery::try_from(elem).unwrap();
        assert!(query.node.is_none());
    }

    #[test]
    fn test_info_result() {
        let elem: Element = "<query xmlns='http://jabber.org/protocol/disco#info'><identity category='client' type='pc'/><feature var='http://jabber.org/protocol/disco#info'/><feature var='urn:xmpp:mam:2'/></query>"
            .parse()
            .unwrap();
        let result = DiscoInfoResult::try_from(elem).unwrap();
        assert_eq!(result.identities.len(), 1);
        assert_eq!(result.features.len(), 2);
        assert!(result.has_feature(ns::MAM));
        assert!(!result.has_feature(ns::MUC));
    }

    #[test]
    fn test_items_result() {
        let elem: Element = "<query xmlns='http://jabber.org/protocol/disco#items'><item jid='conference.example.org' name='Rooms'/></query>"
            .parse()
            .unwrap();
        let result = DiscoItemsResult::try_from(elem).unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(
            result.items[0].jid,
            Jid::new("conference.example.org").unwrap()
        );
    }

    #[test]
    fn test_roundtrip() {
        let elem: Element = "<query xmlns='http://jabber.org/protocol/disco#info'><identity category='client' type='pc' name='jabber-rs'/><feature var='urn:xmpp:ping'/></query>"
            .parse()
            .unwrap();
        let elem1 = elem.clone();
        let result = DiscoInfoResult::try_from(elem).unwrap();
        let elem2 = Element::from(result);
        assert_eq!(elem1, elem2);
    }
}
