// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! In-band registration (XEP-0077).

use core::convert::TryFrom;
use std::collections::BTreeMap;

use minidom::Element;

use crate::data_forms::DataForm;
use crate::iq::{IqGetPayload, IqResultPayload, IqSetPayload};
use crate::ns;
use crate::util::error::Error;

/// A registration query: requesting the fields, submitting them, or
/// cancelling a registration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    /// Whether the sending entity is already registered.
    pub registered: bool,

    /// Asks the server to remove this registration.
    pub remove: bool,

    /// Instructions from the server on how to fill the registration.
    pub instructions: Option<String>,

    /// The legacy fixed fields (username, password, email, …), keyed by
    /// element name.
    pub fields: BTreeMap<String, String>,

    /// The extended registration form, when the server provides one.
    pub form: Option<DataForm>,
}

impl IqGetPayload for Query {}
impl IqSetPayload for Query {}
impl IqResultPayload for Query {}

impl Query {
    /// Creates an empty query, to ask a server for its registration fields.
    pub fn new() -> Query {
        Query::default()
    }

    /// Sets one of the legacy fields.
    pub fn with_field<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Query {
        self.fields.insert(name.into(), value.into());
        self
    }
}

impl TryFrom<Element> for Query {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Query, Error> {
        check_self!(elem, "query", REGISTER, "registration query");
        check_no_attributes!(elem, "query");
        let mut query = Query::default();
        for child in elem.children() {
            if child.is("registered", ns::REGISTER) {
                query.registered = true;
            } else if child.is("remove", ns::REGISTER) {
                query.remove = true;
            } else if child.is("instructions", ns::REGISTER) {
                query.instructions = Some(child.text());
            } else if child.is("x", ns::DATA_FORMS) {
                if query.form.is_some() {
                    return Err(Error::ParseError(
                        "More than one form in registration query.",
                    ));
                }
                query.form = Some(DataForm::try_from(child.clone())?);
            } else if child.has_ns(ns::REGISTER) {
                query
                    .fields
                    .insert(child.name().to_owned(), child.text());
            } else {
                return Err(Error::ParseError("Unknown child in registration query."));
            }
        }
        Ok(query)
    }
}

impl From<Query> for Element {
    fn from(query: Query) -> Element {
        Element::builder("query", ns::REGISTER)
            .append_all(if query.registered {
                Some(Element::builder("registered", ns::REGISTER).build())
            } else {
                None
            })
            .append_all(query.instructions.map(|instructions| {
                Element::builder("instructions", ns::REGISTER)
                    .append(instructions)
                    .build()
            }))
            .append_all(query.fields.into_iter().map(|(name, value)| {
                Element::builder(name, ns::REGISTER).append(value).build()
            }))
            .append_all(query.form.map(Element::from))
            .append_all(if query.remove {
                Some(Element::builder("remove", ns::REGISTER).build())
            } else {
                None
            })
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_request() {
        let elem: Element = "<query xmlns='jabber:iq:register'><instructions>Choose a username and password</instructions><username/><password/></query>"
            .parse()
            .unwrap();
        let query = Query::try_from(elem).unwrap();
        assert_eq!(
            query.instructions.as_deref(),
            Some("Choose a username and password")
        );
        assert!(query.fields.contains_key("username"));
        assert!(query.fields.contains_key("password"));
        assert!(!query.registered);
    }

    #[test]
    fn test_submission_roundtrip() {
        let query = Query::new()
            .with_field("username", "bill")
            .with_field("password", "Calliope");
        let elem = Element::from(query.clone());
        assert_eq!(Query::try_from(elem).unwrap(), query);
    }

    #[test]
    fn test_remove() {
        let elem: Element = "<query xmlns='jabber:iq:register'><remove/></query>"
            .parse()
            .unwrap();
        let query = Query::try_from(elem).unwrap();
        assert!(query.remove);
    }
}
