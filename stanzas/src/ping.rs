// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::iq::IqGetPayload;

generate_empty_element!(
    /// An application-level ping (XEP-0199); the reply is an empty iq
    /// result.
    Ping,
    "ping",
    PING
);

impl IqGetPayload for Ping {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::error::Error;
    use core::convert::TryFrom;
    use minidom::Element;

    #[test]
    fn test_simple() {
        let elem: Element = "<ping xmlns='urn:xmpp:ping'/>".parse().unwrap();
        Ping::try_from(elem).unwrap();
    }

    #[test]
    fn test_invalid() {
        let elem: Element = "<ping xmlns='urn:xmpp:ping'><coucou/></ping>".parse().unwrap();
        let error = Ping::try_from(elem).unwrap_err();
        let message = match error {
            Error::ParseError(string) => string,
            _ => panic!(),
        };
        assert_eq!(message, "Unknown child in ping element.");
    }
}
