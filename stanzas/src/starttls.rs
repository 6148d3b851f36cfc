// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::convert::TryFrom;

use minidom::Element;

use crate::ns;
use crate::util::error::Error;

generate_empty_element!(
    /// Requests the transport to be upgraded to TLS.
    Request,
    "starttls",
    TLS
);

generate_empty_element!(
    /// Announces that the TLS handshake can start.
    Proceed,
    "proceed",
    TLS
);

/// Announces the STARTTLS negotiation failed; the stream is closed
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure;

impl TryFrom<Element> for Failure {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Failure, Error> {
        check_self!(elem, "failure", TLS);
        check_no_attributes!(elem, "failure");
        Ok(Failure)
    }
}

impl From<Failure> for Element {
    fn from(_: Failure) -> Element {
        Element::builder("failure", ns::TLS).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple() {
        let elem: Element = "<starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>"
            .parse()
            .unwrap();
        Request::try_from(elem).unwrap();

        let elem: Element = "<proceed xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>"
            .parse()
            .unwrap();
        Proceed::try_from(elem).unwrap();

        let elem: Element = "<failure xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>"
            .parse()
            .unwrap();
        Failure::try_from(elem).unwrap();
    }

    #[test]
    fn test_serialise() {
        let elem: Element = "<starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>"
            .parse()
            .unwrap();
        assert_eq!(Element::from(Request), elem);
    }
}
