// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! SOCKS5 bytestreams (XEP-0065).

use core::convert::TryFrom;

use minidom::Element;

use crate::iq::{IqResultPayload, IqSetPayload};
use crate::jid::Jid;
use crate::ns;
use crate::util::error::Error;

generate_attribute!(
    /// The transport mode of the bytestream.
    Mode, "mode", {
        /// A plain TCP connection.
        Tcp => "tcp",

        /// UDP associations; not supported by this implementation.
        Udp => "udp",
    }, Default = Tcp
);

/// A candidate host the peer may connect to.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamHost {
    /// The entity offering this host.
    pub jid: Jid,

    /// The network address of this host.
    pub host: String,

    /// The port to connect to.
    pub port: u16,
}

impl TryFrom<Element> for StreamHost {
    type Error = Error;

    fn try_from(elem: Element) -> Result<StreamHost, Error> {
        check_self!(elem, "streamhost", BYTESTREAMS);
        check_no_children!(elem, "streamhost");
        check_no_unknown_attributes!(elem, "streamhost", ["jid", "host", "port"]);
        Ok(StreamHost {
            jid: get_attr!(elem, "jid", Required),
            host: get_attr!(elem, "host", Required),
            port: get_attr!(elem, "port", Required),
        })
    }
}

impl From<StreamHost> for Element {
    fn from(host: StreamHost) -> Element {
        Element::builder("streamhost", ns::BYTESTREAMS)
            .attr("jid", host.jid)
            .attr("host", host.host)
            .attr("port", format!("{}", host.port))
            .build()
    }
}

/// A bytestream negotiation query: candidate announcement, host selection,
/// or proxy activation.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// The session this stream belongs to.
    pub sid: String,

    /// The transport mode.
    pub mode: Mode,

    /// The candidate hosts, on the initiator side.
    pub streamhosts: Vec<StreamHost>,

    /// The candidate the target connected to, in the result.
    pub streamhost_used: Option<Jid>,

    /// The target to activate, sent to a proxy.
    pub activate: Option<Jid>,
}

impl IqSetPayload for Query {}
impl IqResultPayload for Query {}

impl Query {
    /// Creates a new empty query for the given session.
    pub fn new<S: Into<String>>(sid: S) -> Query {
        Query {
            sid: sid.into(),
            mode: Mode::Tcp,
            streamhosts: vec![],
            streamhost_used: None,
            activate: None,
        }
    }
}

impl TryFrom<Element> for Query {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Query, Error> {
        check_self!(elem, "query", BYTESTREAMS, "bytestreams query");
        check_no_unknown_attributes!(elem, "bytestreams query", ["sid", "mode", "dstaddr"]);
        let mut query = Query {
            sid: get_attr!(elem, "sid", Required),
            mode: get_attr!(elem, "mode", Default),
            streamhosts: vec![],
            streamhost_used: None,
            activate: None,
        };
        for child in elem.children() {
            if child.is("streamhost", ns::BYTESTREAMS) {
                query.streamhosts.push(StreamHost::try_from(child.clone())?);
            } else if child.is("streamhost-used", ns::BYTESTREAMS) {
                if query.streamhost_used.is_some() {
                    return Err(Error::ParseError(
                        "More than one streamhost-used in query.",
                    ));
                }
                query.streamhost_used = Some(get_attr!(child, "jid", Required));
            } else if child.is("activate", ns::BYTESTREAMS) {
                if query.activate.is_some() {
                    return Err(Error::ParseError("More than one activate in query."));
                }
                query.activate = Some(child.text().parse::<Jid>()?);
            } else {
                return Err(Error::ParseError("Unknown child in bytestreams query."));
            }
        }
        Ok(query)
    }
}

impl From<Query> for Element {
    fn from(query: Query) -> Element {
        Element::builder("query", ns::BYTESTREAMS)
            .attr("sid", query.sid)
            .attr("mode", query.mode)
            .append_all(query.streamhosts)
            .append_all(query.streamhost_used.map(|jid| {
                Element::builder("streamhost-used", ns::BYTESTREAMS)
                    .attr("jid", jid)
                    .build()
            }))
            .append_all(query.activate.map(|jid| {
                Element::builder("activate", ns::BYTESTREAMS)
                    .append(jid.to_string())
                    .build()
            }))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streamhosts() {
        let elem: Element = r#"<query xmlns='http://jabber.org/protocol/bytestreams' sid='vxf9n471bn46'>
  <streamhost jid='romeo@montague.example/home' host='192.0.2.1' port='7625'/>
  <streamhost jid='streamer.example.com' host='203.0.113.1' port='7625'/>
</query>"#
            .parse()
            .unwrap();
        let query = Query::try_from(elem).unwrap();
        assert_eq!(query.sid, "vxf9n471bn46");
        assert_eq!(query.mode, Mode::Tcp);
        assert_eq!(query.streamhosts.len(), 2);
        assert_eq!(query.streamhosts[0].host, "192.0.2.1");
        assert_eq!(query.streamhosts[1].port, 7625);
    }

    #[test]
    fn test_streamhost_used() {
        let elem: Element = "<query xmlns='http://jabber.org/protocol/bytestreams' sid='s1'><streamhost-used jid='streamer.example.com'/></query>"
            .parse()
            .unwrap();
        let query = Query::try_from(elem).unwrap();
        assert_eq!(
            query.streamhost_used,
            Some(Jid::new("streamer.example.com").unwrap())
        );
    }

    #[test]
    fn test_roundtrip() {
        let mut query = Query::new("s1");
        query.streamhosts.push(StreamHost {
            jid: Jid::new("proxy.example.org").unwrap(),
            host: String::from("198.51.100.1"),
            port: 1080,
        });
        let elem = Element::from(query.clone());
        let query2 = Query::try_from(elem).unwrap();
        assert_eq!(query, query2);
    }
}
