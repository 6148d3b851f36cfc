// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Message archive management (XEP-0313).

use core::convert::TryFrom;

use minidom::Element;

use crate::data_forms::DataForm;
use crate::forwarding::Forwarded;
use crate::iq::{IqResultPayload, IqSetPayload};
use crate::message::MessagePayload;
use crate::ns;
use crate::rsm::{SetQuery, SetResult};
use crate::util::error::Error;

generate_id!(
    /// An identifier matching a result message to the query requesting it.
    QueryId
);

/// Starts a query to the archive.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// An optional identifier for matching forwarded messages to this query.
    pub queryid: Option<QueryId>,

    /// Used for filtering the results.
    pub form: Option<DataForm>,

    /// Used for paging through results.
    pub set: Option<SetQuery>,
}

impl IqSetPayload for Query {}

impl TryFrom<Element> for Query {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Query, Error> {
        check_self!(elem, "query", MAM, "MAM query");
        check_no_unknown_attributes!(elem, "MAM query", ["queryid"]);
        let mut query = Query {
            queryid: get_attr!(elem, "queryid", Option),
            form: None,
            set: None,
        };
        for child in elem.children() {
            if child.is("x", ns::DATA_FORMS) {
                if query.form.is_some() {
                    return Err(Error::ParseError("More than one form in MAM query."));
                }
                query.form = Some(DataForm::try_from(child.clone())?);
            } else if child.is("set", ns::RSM) {
                if query.set.is_some() {
                    return Err(Error::ParseError("More than one set in MAM query."));
                }
                query.set = Some(SetQuery::try_from(child.clone())?);
            } else {
                return Err(Error::ParseError("Unknown child in MAM query."));
            }
        }
        Ok(query)
    }
}

impl From<Query> for Element {
    fn from(query: Query) -> Element {
        Element::builder("query", ns::MAM)
            .attr("queryid", query.queryid)
            .append_all(query.form.map(Element::from))
            .append_all(query.set.map(Element::from))
            .build()
    }
}

/// The wrapper around forwarded archived messages.
#[derive(Debug, Clone, PartialEq)]
pub struct Result_ {
    /// The stanza-id under which the archive stored this stanza.
    pub id: String,

    /// The same queryid as the one requested in the [Query].
    pub queryid: Option<QueryId>,

    /// The actual stanza being forwarded.
    pub forwarded: Forwarded,
}

impl MessagePayload for Result_ {}

impl TryFrom<Element> for Result_ {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Result_, Error> {
        check_self!(elem, "result", MAM, "MAM result");
        check_no_unknown_attributes!(elem, "MAM result", ["id", "queryid"]);
        let mut forwarded = None;
        for child in elem.children() {
            if !child.is("forwarded", ns::FORWARD) || forwarded.is_some() {
                return Err(Error::ParseError("Unknown child in MAM result."));
            }
            forwarded = Some(Forwarded::try_from(child.clone())?);
        }
        Ok(Result_ {
            id: get_attr!(elem, "id", Required),
            queryid: get_attr!(elem, "queryid", Option),
            forwarded: forwarded.ok_or(Error::ParseError("Missing forwarded in MAM result."))?,
        })
    }
}

impl From<Result_> for Element {
    fn from(result: Result_) -> Element {
        Element::builder("result", ns::MAM)
            .attr("id", result.id)
            .attr("queryid", result.queryid)
            .append(Element::from(result.forwarded))
            .build()
    }
}

/// Notes the end of a page in a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Fin {
    /// True when the end of the archive has been reached.
    pub complete: bool,

    /// The query this page belongs to, when the server echoes it.
    pub queryid: Option<QueryId>,

    /// Describes the current page, it should contain at least `first` and
    /// `last`, and generally `count`.
    pub set: SetResult,
}

impl IqResultPayload for Fin {}
impl MessagePayload for Fin {}

impl TryFrom<Element> for Fin {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Fin, Error> {
        check_self!(elem, "fin", MAM, "MAM fin");
        check_no_unknown_attributes!(elem, "MAM fin", ["complete", "queryid", "stable"]);
        let complete = match elem.attr("complete") {
            Some("true") | Some("1") => true,
            _ => false,
        };
        let mut set = None;
        for child in elem.children() {
            if !child.is("set", ns::RSM) || set.is_some() {
                return Err(Error::ParseError("Unknown child in MAM fin."));
            }
            set = Some(SetResult::try_from(child.clone())?);
        }
        Ok(Fin {
            complete,
            queryid: get_attr!(elem, "queryid", Option),
            set: set.ok_or(Error::ParseError("Missing set in MAM fin."))?,
        })
    }
}

impl From<Fin> for Element {
    fn from(fin: Fin) -> Element {
        Element::builder("fin", ns::MAM)
            .attr("complete", if fin.complete { Some("true") } else { None })
            .attr("queryid", fin.queryid)
            .append(Element::from(fin.set))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query() {
        let elem: Element = "<query xmlns='urn:xmpp:mam:2'/>".parse().unwrap();
        Query::try_from(elem).unwrap();
    }

    #[test]
    fn test_result() {
        let elem: Element = r#"<result xmlns='urn:xmpp:mam:2' queryid='f27' id='28482-98726-73623'>
  <forwarded xmlns='urn:xmpp:forward:0'>
    <delay xmlns='urn:xmpp:delay' stamp='2010-07-10T23:08:25Z'/>
    <message xmlns='jabber:client' from='witch@shakespeare.lit' to='macbeth@shakespeare.lit'>
      <body>Hail to thee</body>
    </message>
  </forwarded>
</result>"#
            .parse()
            .unwrap();
        let result = Result_::try_from(elem).unwrap();
        assert_eq!(result.id, "28482-98726-73623");
        assert_eq!(result.queryid, Some(QueryId(String::from("f27"))));
        assert!(result.forwarded.delay.is_some());
    }

    #[test]
    fn test_fin() {
        let elem: Element = r#"<fin xmlns='urn:xmpp:mam:2' complete='true'>
  <set xmlns='http://jabber.org/protocol/rsm'>
    <first index='0'>28482-98726-73623</first>
    <last>09af3-cc343-b409f</last>
    <count>5</count>
  </set>
</fin>"#
            .parse()
            .unwrap();
        let fin = Fin::try_from(elem).unwrap();
        assert!(fin.complete);
        assert_eq!(fin.set.count, Some(5));
        assert_eq!(fin.set.last.as_deref(), Some("09af3-cc343-b409f"));
    }

    #[test]
    fn test_fin_requires_set() {
        let elem: Element = "<fin xmlns='urn:xmpp:mam:2'/>".parse().unwrap();
        let error = Fin::try_from(elem).unwrap_err();
        let message = match error {
            Error::ParseError(string) => string,
            _ => panic!(),
        };
        assert_eq!(message, "Missing set in MAM fin.");
    }

    #[test]
    fn test_query_roundtrip() {
        let elem: Element = "<query xmlns='urn:xmpp:mam:2' queryid='q1'><set xmlns='http://jabber.org/protocol/rsm'><max>2</max></set></query>"
            .parse()
            .unwrap();
        let elem1 = elem.clone();
        let query = Query::try_from(elem).unwrap();
        let elem2 = Element::from(query);
        assert_eq!(elem1, elem2);
    }
}
