// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::convert::TryFrom;

use minidom::Element;

use crate::iq::{IqResultPayload, IqSetPayload};
use crate::jid::Jid;
use crate::ns;
use crate::util::error::Error;

/// The request for resource binding, sent by the client to the server after
/// authentication.
#[derive(Debug, Clone, PartialEq)]
pub struct BindQuery {
    /// The resource this client wants to bind, or None to let the server
    /// assign one.
    pub resource: Option<String>,
}

impl BindQuery {
    /// Creates a resource binding request.
    pub fn new(resource: Option<String>) -> BindQuery {
        BindQuery { resource }
    }
}

impl IqSetPayload for BindQuery {}

impl TryFrom<Element> for BindQuery {
    type Error = Error;

    fn try_from(elem: Element) -> Result<BindQuery, Error> {
        check_self!(elem, "bind", BIND);
        check_no_attributes!(elem, "bind");
        let mut resource = None;
        for child in elem.children() {
            if resource.is_some() {
                return Err(Error::ParseError("Bind can only have one resource."));
            }
            if child.is("resource", ns::BIND) {
                resource = Some(child.text());
            } else {
                return Err(Error::ParseError("Unknown element in bind request."));
            }
        }
        Ok(BindQuery { resource })
    }
}

impl From<BindQuery> for Element {
    fn from(bind: BindQuery) -> Element {
        Element::builder("bind", ns::BIND)
            .append_all(bind.resource.map(|resource| {
                Element::builder("resource", ns::BIND)
                    .append(resource)
                    .build()
            }))
            .build()
    }
}

/// The response for resource binding, containing the resulting full JID.
#[derive(Debug, Clone, PartialEq)]
pub struct BindResponse {
    /// The full JID returned by the server for this client.
    pub jid: Jid,
}

impl IqResultPayload for BindResponse {}

impl From<BindResponse> for Jid {
    fn from(bind: BindResponse) -> Jid {
        bind.jid
    }
}

impl TryFrom<Element> for BindResponse {
    type Error = Error;

    fn try_from(elem: Element) -> Result<BindResponse, Error> {
        check_self!(elem, "bind", BIND);
        check_no_attributes!(elem, "bind");
        let mut jid = None;
        for child in elem.children() {
            if jid.is_some() {
                return Err(Error::ParseError("Bind can only have one jid."));
            }
            if child.is("jid", ns::BIND) {
                jid = Some(child.text().parse::<Jid>()?);
            } else {
                return Err(Error::ParseError("Unknown element in bind response."));
            }
        }
        let jid = jid.ok_or(Error::ParseError("Bind response must contain a jid."))?;
        Ok(BindResponse { jid })
    }
}

impl From<BindResponse> for Element {
    fn from(bind: BindResponse) -> Element {
        Element::builder("bind", ns::BIND)
            .append(
                Element::builder("jid", ns::BIND)
                    .append(bind.jid.to_string())
                    .build(),
            )
            .build()
    }
}

/// The request for legacy session establishment of RFC 3921.
#[derive(Debug, Clone, PartialEq)]
pub struct Session;

impl IqSetPayload for Session {}

impl TryFrom<Element> for Session {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Session, Error> {
        check_self!(elem, "session", SESSION);
        check_no_attributes!(elem, "session");
        check_no_children!(elem, "session");
        Ok(Session)
    }
}

impl From<Session> for Element {
    fn from(_: Session) -> Element {
        Element::builder("session", ns::SESSION).build()
    }
}
