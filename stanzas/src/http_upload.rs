// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! HTTP file upload (XEP-0363): negotiating a slot; the HTTP transfer
//! itself is the caller's business.

use core::convert::TryFrom;

use minidom::Element;

use crate::iq::{IqGetPayload, IqResultPayload};
use crate::ns;
use crate::util::error::Error;

/// A request for an upload slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotRequest {
    /// The file name to be uploaded.
    pub filename: String,

    /// Size of the file to be uploaded, in bytes.
    pub size: u64,

    /// Content-Type of the file.
    pub content_type: Option<String>,
}

impl IqGetPayload for SlotRequest {}

impl TryFrom<Element> for SlotRequest {
    type Error = Error;

    fn try_from(elem: Element) -> Result<SlotRequest, Error> {
        check_self!(elem, "request", HTTP_UPLOAD, "slot request");
        check_no_children!(elem, "request");
        check_no_unknown_attributes!(elem, "request", ["filename", "size", "content-type"]);
        Ok(SlotRequest {
            filename: get_attr!(elem, "filename", Required),
            size: get_attr!(elem, "size", Required),
            content_type: get_attr!(elem, "content-type", Option),
        })
    }
}

impl From<SlotRequest> for Element {
    fn from(request: SlotRequest) -> Element {
        Element::builder("request", ns::HTTP_UPLOAD)
            .attr("filename", request.filename)
            .attr("size", format!("{}", request.size))
            .attr("content-type", request.content_type)
            .build()
    }
}

/// An HTTP header to be set on the PUT request.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// The header name; only Authorization, Cookie and Expires are allowed
    /// by the XEP.
    pub name: String,

    /// The header value.
    pub value: String,
}

/// The slot returned by the upload service.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// The URL to PUT the file to.
    pub put_url: String,

    /// The headers to set on the PUT request.
    pub put_headers: Vec<Header>,

    /// The URL the file will be retrievable from.
    pub get_url: String,
}

impl IqResultPayload for Slot {}

impl TryFrom<Element> for Slot {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Slot, Error> {
        check_self!(elem, "slot", HTTP_UPLOAD);
        check_no_attributes!(elem, "slot");
        let mut put_url = None;
        let mut put_headers = vec![];
        let mut get_url = None;
        for child in elem.children() {
            if child.is("put", ns::HTTP_UPLOAD) {
                if put_url.is_some() {
                    return Err(Error::ParseError("More than one put in slot element."));
                }
                put_url = Some(get_attr!(child, "url", Required));
                for header in child.children() {
                    if !header.is("header", ns::HTTP_UPLOAD) {
                        return Err(Error::ParseError("Unknown child in put element."));
                    }
                    put_headers.push(Header {
                        name: get_attr!(header, "name", Required),
                        value: header.text(),
                    });
                }
            } else if child.is("get", ns::HTTP_UPLOAD) {
                if get_url.is_some() {
                    return Err(Error::ParseError("More than one get in slot element."));
                }
                get_url = Some(get_attr!(child, "url", Required));
            } else {
                return Err(Error::ParseError("Unknown child in slot element."));
            }
        }
        Ok(Slot {
            put_url: put_url.ok_or(Error::ParseError("Missing put in slot element."))?,
            put_headers,
            get_url: get_url.ok_or(Error::ParseError("Missing get in slot element."))?,
        })
    }
}

impl From<Slot> for Element {
    fn from(slot: Slot) -> Element {
        Element::builder("slot", ns::HTTP_UPLOAD)
            .append(
                Element::builder("put", ns::HTTP_UPLOAD)
                    .attr("url", slot.put_url)
                    .append_all(slot.put_headers.into_iter().map(|header| {
                        Element::builder("header", ns::HTTP_UPLOAD)
                            .attr("name", header.name)
                            .append(header.value)
                            .build()
                    }))
                    .build(),
            )
            .append(
                Element::builder("get", ns::HTTP_UPLOAD)
                    .attr("url", slot.get_url)
                    .build(),
            )
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request() {
        let elem: Element = "<request xmlns='urn:xmpp:http:upload:0' filename='très cool.jpg' size='23456' content-type='image/jpeg'/>"
            .parse()
            .unwrap();
        let request = SlotRequest::try_from(elem).unwrap();
        assert_eq!(request.filename, "très cool.jpg");
        assert_eq!(request.size, 23456);
        assert_eq!(request.content_type.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn test_slot() {
        let elem: Element = "<slot xmlns='urn:xmpp:http:upload:0'><put url='https://upload.montague.tld/files/x.jpg'><header name='Authorization'>Basic Base64String==</header></put><get url='https://download.montague.tld/files/x.jpg'/></slot>"
            .parse()
            .unwrap();
        let slot = Slot::try_from(elem).unwrap();
        assert_eq!(slot.put_headers.len(), 1);
        assert_eq!(slot.put_headers[0].name, "Authorization");
        assert!(slot.get_url.starts_with("https://download"));
    }
}
