// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! In-band bytestreams (XEP-0047).

use core::convert::TryFrom;

use base64::{engine::general_purpose::STANDARD as Base64, Engine};
use minidom::Element;

use crate::iq::IqSetPayload;
use crate::message::MessagePayload;
use crate::ns;
use crate::util::error::Error;

generate_id!(
    /// An identifier matching a stream.
    StreamId
);

generate_attribute!(
    /// Which stanza type to use to exchange data.
    Stanza, "stanza", {
        /// `<iq/>` gives a feedback on whether the chunk has been received
        /// or not, which is useful in the case the recipient might not
        /// receive them in a timely manner, or to do your own throttling
        /// based on the results.
        Iq => "iq",

        /// `<message/>` can be faster, since it doesn't require any
        /// feedback, but in practice it will be throttled by the servers on
        /// the way.
        Message => "message",
    }, Default = Iq
);

/// Starts an in-band bytestream session with the given parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Open {
    /// Maximum size in bytes for each chunk.
    pub block_size: u16,

    /// The identifier to be used to create a stream.
    pub sid: StreamId,

    /// Which stanza type to use to exchange data.
    pub stanza: Stanza,
}

impl IqSetPayload for Open {}

impl TryFrom<Element> for Open {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Open, Error> {
        check_self!(elem, "open", IBB);
        check_no_children!(elem, "open");
        check_no_unknown_attributes!(elem, "open", ["block-size", "sid", "stanza"]);
        Ok(Open {
            block_size: get_attr!(elem, "block-size", Required),
            sid: get_attr!(elem, "sid", Required),
            stanza: get_attr!(elem, "stanza", Default),
        })
    }
}

impl From<Open> for Element {
    fn from(open: Open) -> Element {
        Element::builder("open", ns::IBB)
            .attr("block-size", format!("{}", open.block_size))
            .attr("sid", open.sid)
            .attr("stanza", open.stanza)
            .build()
    }
}

/// Exchange a chunk of data in an open stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    /// Sequence number of this chunk, must wraparound after 65535.
    pub seq: u16,

    /// The identifier of the stream on which data is being exchanged.
    pub sid: StreamId,

    /// The bytes of this chunk.
    pub data: Vec<u8>,
}

impl IqSetPayload for Data {}
impl MessagePayload for Data {}

impl TryFrom<Element> for Data {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Data, Error> {
        check_self!(elem, "data", IBB);
        check_no_children!(elem, "data");
        check_no_unknown_attributes!(elem, "data", ["seq", "sid"]);
        Ok(Data {
            seq: get_attr!(elem, "seq", Required),
            sid: get_attr!(elem, "sid", Required),
            data: Base64.decode(elem.text())?,
        })
    }
}

impl From<Data> for Element {
    fn from(data: Data) -> Element {
        Element::builder("data", ns::IBB)
            .attr("seq", format!("{}", data.seq))
            .attr("sid", data.sid)
            .append(Base64.encode(&data.data))
            .build()
    }
}

/// Close an open stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Close {
    /// The identifier of the stream to be closed.
    pub sid: StreamId,
}

impl IqSetPayload for Close {}

impl TryFrom<Element> for Close {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Close, Error> {
        check_self!(elem, "close", IBB);
        check_no_children!(elem, "close");
        check_no_unknown_attributes!(elem, "close", ["sid"]);
        Ok(Close {
            sid: get_attr!(elem, "sid", Required),
        })
    }
}

impl From<Close> for Element {
    fn from(close: Close) -> Element {
        Element::builder("close", ns::IBB)
            .attr("sid", close.sid)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple() {
        let sid = StreamId(String::from("coucou"));

        let elem: Element =
            "<open xmlns='http://jabber.org/protocol/ibb' block-size='3' sid='coucou'/>"
                .parse()
                .unwrap();
        let open = Open::try_from(elem).unwrap();
        assert_eq!(open.block_size, 3);
        assert_eq!(open.sid, sid);
        assert_eq!(open.stanza, Stanza::Iq);

        let elem: Element =
            "<data xmlns='http://jabber.org/protocol/ibb' seq='0' sid='coucou'>AAAA</data>"
                .parse()
                .unwrap();
        let data = Data::try_from(elem).unwrap();
        assert_eq!(data.seq, 0);
        assert_eq!(data.sid, sid);
        assert_eq!(data.data, vec![0, 0, 0]);

        let elem: Element = "<close xmlns='http://jabber.org/protocol/ibb' sid='coucou'/>"
            .parse()
            .unwrap();
        let close = Close::try_from(elem).unwrap();
        assert_eq!(close.sid, sid);
    }

    #[test]
    fn test_invalid() {
        let elem: Element = "<open xmlns='http://jabber.org/protocol/ibb'/>"
            .parse()
            .unwrap();
        let error = Open::try_from(elem).unwrap_err();
        let message = match error {
            Error::ParseError(string) => string,
            _ => panic!(),
        };
        assert_eq!(message, "Required attribute 'block-size' missing.");
    }

    #[test]
    fn test_data_roundtrip() {
        let data = Data {
            seq: 65535,
            sid: StreamId(String::from("s1")),
            data: vec![1, 2, 3, 4],
        };
        let elem = Element::from(data.clone());
        let data2 = Data::try_from(elem).unwrap();
        assert_eq!(data, data2);
    }
}
