// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::convert::TryFrom;

use minidom::Element;

use crate::jid::Jid;
use crate::ns;
use crate::stanza_error::StanzaError;
use crate::util::error::Error;

/// Should be implemented on every known payload of an `<iq type='get'/>`.
pub trait IqGetPayload: TryFrom<Element> + Into<Element> {}

/// Should be implemented on every known payload of an `<iq type='set'/>`.
pub trait IqSetPayload: TryFrom<Element> + Into<Element> {}

/// Should be implemented on every known payload of an `<iq type='result'/>`.
pub trait IqResultPayload: TryFrom<Element> + Into<Element> {}

/// Represents one of the four types of iq stanzas and their payload.
#[derive(Debug, Clone)]
pub enum IqType {
    /// A request for data.
    Get(Element),

    /// A request to change some data.
    Set(Element),

    /// The response to a request, with optional data.
    Result(Option<Element>),

    /// An error response to a request.
    Error(StanzaError),
}

impl IqType {
    /// The value of the `type` attribute for this payload.
    pub fn as_str(&self) -> &'static str {
        match self {
            IqType::Get(_) => "get",
            IqType::Set(_) => "set",
            IqType::Result(_) => "result",
            IqType::Error(_) => "error",
        }
    }
}

/// The main structure representing the `<iq/>` stanza.
#[derive(Debug, Clone)]
pub struct Iq {
    /// The JID emitting this stanza.
    pub from: Option<Jid>,

    /// The recipient of this stanza.
    pub to: Option<Jid>,

    /// The @id attribute of this stanza, which is required in order to match
    /// a request with its response.
    pub id: String,

    /// The payload content of this stanza.
    pub payload: IqType,
}

impl Iq {
    /// Creates an `<iq type='get'/>` stanza with the given payload.
    pub fn from_get<S: Into<String>, P: IqGetPayload>(id: S, payload: P) -> Iq {
        Iq {
            from: None,
            to: None,
            id: id.into(),
            payload: IqType::Get(payload.into()),
        }
    }

    /// Creates an `<iq type='set'/>` stanza with the given payload.
    pub fn from_set<S: Into<String>, P: IqSetPayload>(id: S, payload: P) -> Iq {
        Iq {
            from: None,
            to: None,
            id: id.into(),
            payload: IqType::Set(payload.into()),
        }
    }

    /// Creates an empty `<iq type='result'/>` stanza.
    pub fn empty_result<S: Into<String>>(id: S) -> Iq {
        Iq {
            from: None,
            to: None,
            id: id.into(),
            payload: IqType::Result(None),
        }
    }

    /// Creates an `<iq type='result'/>` stanza with the given payload.
    pub fn from_result<S: Into<String>, P: IqResultPayload>(id: S, payload: Option<P>) -> Iq {
        Iq {
            from: None,
            to: None,
            id: id.into(),
            payload: IqType::Result(payload.map(Into::into)),
        }
    }

    /// Creates an `<iq type='error'/>` stanza answering the given request.
    pub fn from_error<S: Into<String>>(id: S, error: StanzaError) -> Iq {
        Iq {
            from: None,
            to: None,
            id: id.into(),
            payload: IqType::Error(error),
        }
    }

    /// Sets the recipient of this stanza.
    pub fn with_to(mut self, to: Jid) -> Iq {
        self.to = Some(to);
        self
    }

    /// Sets the emitter of this stanza.
    pub fn with_from(mut self, from: Jid) -> Iq {
        self.from = Some(from);
        self
    }
}

impl TryFrom<Element> for Iq {
    type Error = Error;

    fn try_from(root: Element) -> Result<Iq, Error> {
        check_self!(root, "iq", DEFAULT_NS);
        let from = get_attr!(root, "from", Option);
        let to = get_attr!(root, "to", Option);
        let id: String = get_attr!(root, "id", Required);
        let type_: String = get_attr!(root, "type", Required);

        let mut payload = None;
        let mut error_payload = None;
        for elem in root.children() {
            if elem.is("error", ns::DEFAULT_NS) {
                if error_payload.is_some() {
                    return Err(Error::ParseError("Wrong number of children in iq element."));
                }
                error_payload = Some(StanzaError::try_from(elem.clone())?);
            } else {
                if payload.is_some() {
                    return Err(Error::ParseError("Wrong number of children in iq element."));
                }
                payload = Some(elem.clone());
            }
        }

        let payload = match type_.as_str() {
            "get" => match payload {
                Some(payload) => IqType::Get(payload),
                None => return Err(Error::ParseError("Wrong number of children in iq element.")),
            },
            "set" => match payload {
                Some(payload) => IqType::Set(payload),
                None => return Err(Error::ParseError("Wrong number of children in iq element.")),
            },
            "result" => IqType::Result(payload),
            "error" => match error_payload {
                Some(payload) => IqType::Error(payload),
                None => return Err(Error::ParseError("Wrong number of children in iq element.")),
            },
            _ => return Err(Error::ParseError("Unknown iq type.")),
        };

        Ok(Iq {
            from,
            to,
            id,
            payload,
        })
    }
}

impl From<Iq> for Element {
    fn from(iq: Iq) -> Element {
        let type_ = iq.payload.as_str();
        let mut stanza = Element::builder("iq", ns::DEFAULT_NS)
            .attr("from", iq.from)
            .attr("to", iq.to)
            .attr("id", iq.id)
            .attr("type", type_)
            .build();
        match iq.payload {
            IqType::Get(elem) | IqType::Set(elem) | IqType::Result(Some(elem)) => {
                stanza.append_child(elem);
            }
            IqType::Error(error) => {
                stanza.append_child(error.into());
            }
            IqType::Result(None) => (),
        }
        stanza
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stanza_error::{DefinedCondition, ErrorType};

    #[test]
    fn test_require_type_and_id() {
        let elem: Element = "<iq xmlns='jabber:client'/>".parse().unwrap();
        Iq::try_from(elem).unwrap_err();

        let elem: Element = "<iq xmlns='jabber:client' type='get'/>".parse().unwrap();
        Iq::try_from(elem).unwrap_err();
    }

    #[test]
    fn test_get() {
        let elem: Element = "<iq xmlns='jabber:client' type='get' id='a'>
            <ping xmlns='urn:xmpp:ping'/>
        </iq>"
            .parse()
            .unwrap();
        let iq = Iq::try_from(elem).unwrap();
        assert_eq!(iq.id, "a");
        assert!(matches!(iq.payload, IqType::Get(_)));
    }

    #[test]
    fn test_result_empty() {
        let elem: Element = "<iq xmlns='jabber:client' type='result' id='b'/>"
            .parse()
            .unwrap();
        let iq = Iq::try_from(elem).unwrap();
        assert!(matches!(iq.payload, IqType::Result(None)));
    }

    #[test]
    fn test_error() {
        let elem: Element = "<iq xmlns='jabber:client' type='error' id='c'>
            <ping xmlns='urn:xmpp:ping'/>
            <error type='cancel'>
                <service-unavailable xmlns='urn:ietf:params:xml:ns:xmpp-stanzas'/>
            </error>
        </iq>"
            .parse()
            .unwrap();
        let iq = Iq::try_from(elem).unwrap();
        match iq.payload {
            IqType::Error(error) => {
                assert_eq!(error.type_, ErrorType::Cancel);
                assert_eq!(
                    error.defined_condition,
                    DefinedCondition::ServiceUnavailable
                );
            }
            _ => panic!(),
        }
    }

    #[test]
    fn test_serialise() {
        let elem: Element = "<iq xmlns='jabber:client' type='result' id='d'/>"
            .parse()
            .unwrap();
        let iq = Iq::empty_result("d");
        let elem2 = Element::from(iq);
        assert_eq!(elem, elem2);
    }

    #[test]
    fn test_roundtrip_set() {
        let elem: Element =
            "<iq xmlns='jabber:client' type='set' id='e' to='example.org'><query xmlns='jabber:iq:roster'/></iq>"
                .parse()
                .unwrap();
        let iq = Iq::try_from(elem.clone()).unwrap();
        let elem2 = Element::from(iq);
        assert_eq!(elem, elem2);
    }
}
