// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Software version (XEP-0092).

use core::convert::TryFrom;

use minidom::Element;

use crate::iq::{IqGetPayload, IqResultPayload};
use crate::ns;
use crate::util::error::Error;

generate_empty_element!(
    /// Asks an entity about the software it runs.
    VersionQuery,
    "query",
    VERSION
);

impl IqGetPayload for VersionQuery {}

/// The software an entity runs.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionResult {
    /// The name of this software.
    pub name: String,

    /// The version of this software.
    pub version: String,

    /// The operating system this software runs on.
    pub os: Option<String>,
}

impl IqResultPayload for VersionResult {}

impl TryFrom<Element> for VersionResult {
    type Error = Error;

    fn try_from(elem: Element) -> Result<VersionResult, Error> {
        check_self!(elem, "query", VERSION, "version query");
        check_no_attributes!(elem, "query");
        let mut name = None;
        let mut version = None;
        let mut os = None;
        for child in elem.children() {
            if child.is("name", ns::VERSION) {
                name = Some(child.text());
            } else if child.is("version", ns::VERSION) {
                version = Some(child.text());
            } else if child.is("os", ns::VERSION) {
                os = Some(child.text());
            } else {
                return Err(Error::ParseError("Unknown child in version query."));
            }
        }
        Ok(VersionResult {
            name: name.ok_or(Error::ParseError("Missing name in version query."))?,
            version: version.ok_or(Error::ParseError("Missing version in version query."))?,
            os,
        })
    }
}

impl From<VersionResult> for Element {
    fn from(version: VersionResult) -> Element {
        Element::builder("query", ns::VERSION)
            .append(
                Element::builder("name", ns::VERSION)
                    .append(version.name)
                    .build(),
            )
            .append(
                Element::builder("version", ns::VERSION)
                    .append(version.version)
                    .build(),
            )
            .append_all(version.os.map(|os| {
                Element::builder("os", ns::VERSION).append(os).build()
            }))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result() {
        let elem: Element = "<query xmlns='jabber:iq:version'><name>Exodus</name><version>0.7.0.4</version><os>Windows-XP 5.01.2600</os></query>"
            .parse()
            .unwrap();
        let version = VersionResult::try_from(elem).unwrap();
        assert_eq!(version.name, "Exodus");
        assert_eq!(version.version, "0.7.0.4");
        assert_eq!(version.os.as_deref(), Some("Windows-XP 5.01.2600"));
    }

    #[test]
    fn test_roundtrip() {
        let version = VersionResult {
            name: String::from("jabber-rs"),
            version: String::from("0.1.0"),
            os: None,
        };
        let elem = Element::from(version.clone());
        assert_eq!(VersionResult::try_from(elem).unwrap(), version);
    }
}
