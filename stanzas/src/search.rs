// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Jabber search (XEP-0055).

use core::convert::TryFrom;
use std::collections::BTreeMap;

use minidom::Element;

use crate::data_forms::DataForm;
use crate::iq::{IqGetPayload, IqResultPayload, IqSetPayload};
use crate::jid::Jid;
use crate::ns;
use crate::util::error::Error;

/// A search request: either asking a directory for its search fields, or
/// submitting a search.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchQuery {
    /// Instructions from the directory.
    pub instructions: Option<String>,

    /// The legacy fixed fields (first, last, nick, email), keyed by element
    /// name.
    pub fields: BTreeMap<String, String>,

    /// The extended search form, when the directory provides one.
    pub form: Option<DataForm>,
}

impl IqGetPayload for SearchQuery {}
impl IqSetPayload for SearchQuery {}

impl TryFrom<Element> for SearchQuery {
    type Error = Error;

    fn try_from(elem: Element) -> Result<SearchQuery, Error> {
        check_self!(elem, "query", SEARCH, "search query");
        check_no_attributes!(elem, "query");
        let mut query = SearchQuery::default();
        for child in elem.children() {
            if child.is("instructions", ns::SEARCH) {
                query.instructions = Some(child.text());
            } else if child.is("x", ns::DATA_FORMS) {
                if query.form.is_some() {
                    return Err(Error::ParseError("More than one form in search query."));
                }
                query.form = Some(DataForm::try_from(child.clone())?);
            } else if child.has_ns(ns::SEARCH) {
                query.fields.insert(child.name().to_owned(), child.text());
            } else {
                return Err(Error::ParseError("Unknown child in search query."));
            }
        }
        Ok(query)
    }
}

impl From<SearchQuery> for Element {
    fn from(query: SearchQuery) -> Element {
        Element::builder("query", ns::SEARCH)
            .append_all(query.instructions.map(|instructions| {
                Element::builder("instructions", ns::SEARCH)
                    .append(instructions)
                    .build()
            }))
            .append_all(query.fields.into_iter().map(|(name, value)| {
                Element::builder(name, ns::SEARCH).append(value).build()
            }))
            .append_all(query.form.map(Element::from))
            .build()
    }
}

/// One directory entry of a search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchItem {
    /// The address of the found entity.
    pub jid: Jid,

    /// The entity's reported fields, keyed by element name.
    pub fields: BTreeMap<String, String>,
}

/// The results of a search.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchResult {
    /// The matching directory entries.
    pub items: Vec<SearchItem>,

    /// The extended result form, when the directory reports results that
    /// way.
    pub form: Option<DataForm>,
}

impl IqResultPayload for SearchResult {}

impl TryFrom<Element> for SearchResult {
    type Error = Error;

    fn try_from(elem: Element) -> Result<SearchResult, Error> {
        check_self!(elem, "query", SEARCH, "search result");
        check_no_attributes!(elem, "query");
        let mut result = SearchResult::default();
        for child in elem.children() {
            if child.is("item", ns::SEARCH) {
                let mut fields = BTreeMap::new();
                for field in child.children() {
                    if !field.has_ns(ns::SEARCH) {
                        return Err(Error::ParseError("Unknown child in search item."));
                    }
                    fields.insert(field.name().to_owned(), field.text());
                }
                result.items.push(SearchItem {
                    jid: get_attr!(child, "jid", Required),
                    fields,
                });
            } else if child.is("x", ns::DATA_FORMS) {
                if result.form.is_some() {
                    return Err(Error::ParseError("More than one form in search result."));
                }
                result.form = Some(DataForm::try_from(child.clone())?);
            } else {
                return Err(Error::ParseError("Unknown child in search result."));
            }
        }
        Ok(result)
    }
}

impl From<SearchResult> for Element {
    fn from(result: SearchResult) -> Element {
        Element::builder("query", ns::SEARCH)
            .append_all(result.items.into_iter().map(|item| {
                Element::builder("item", ns::SEARCH)
                    .attr("jid", item.jid)
                    .append_all(item.fields.into_iter().map(|(name, value)| {
                        Element::builder(name, ns::SEARCH).append(value).build()
                    }))
                    .build()
            }))
            .append_all(result.form.map(Element::from))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_request() {
        let elem: Element = "<query xmlns='jabber:iq:search'><instructions>Fill in one or more fields to search</instructions><first/><last/><nick/><email/></query>"
            .parse()
            .unwrap();
        let query = SearchQuery::try_from(elem).unwrap();
        assert!(query.instructions.is_some());
        assert_eq!(query.fields.len(), 4);
    }

    #[test]
    fn test_result() {
        let elem: Element = "<query xmlns='jabber:iq:search'><item jid='juliet@capulet.com'><first>Juliet</first><last>Capulet</last></item></query>"
            .parse()
            .unwrap();
        let result = SearchResult::try_from(elem).unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].jid, Jid::new("juliet@capulet.com").unwrap());
        assert_eq!(result.items[0].fields["first"], "Juliet");
    }
}
