// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::convert::TryFrom;
use core::str::FromStr;
use std::collections::BTreeMap;

use minidom::Element;

use crate::jid::Jid;
use crate::ns;
use crate::util::error::Error;

generate_attribute!(
    /// The type of the error.
    ErrorType, "type", {
        /// Retry after providing credentials.
        Auth => "auth",

        /// Do not retry (the error cannot be remedied).
        Cancel => "cancel",

        /// Proceed (the condition was only a warning).
        Continue => "continue",

        /// Retry after changing the data sent.
        Modify => "modify",

        /// Retry after waiting (the error is temporary).
        Wait => "wait",
    }
);

/// List of defined error conditions, as per RFC 6120 §8.3.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinedCondition {
    /// The sender has sent a stanza containing XML that does not conform to
    /// the appropriate schema or that cannot be processed.
    BadRequest,

    /// Access cannot be granted because an existing resource exists with the
    /// same name or address.
    Conflict,

    /// The feature represented in the XML stanza is not implemented by the
    /// intended recipient or an intermediate server.
    FeatureNotImplemented,

    /// The requesting entity does not possess the necessary permissions to
    /// perform an action.
    Forbidden,

    /// The recipient or server can no longer be contacted at this address,
    /// typically on a permanent basis.
    Gone,

    /// The server has experienced a misconfiguration or other internal error
    /// that prevents it from processing the stanza.
    InternalServerError,

    /// The addressed JID or item requested cannot be found.
    ItemNotFound,

    /// The sending entity has provided an XMPP address that violates the
    /// address format rules.
    JidMalformed,

    /// The recipient or server understands the request but cannot process it
    /// because it does not meet its criteria.
    NotAcceptable,

    /// The recipient or server does not allow any entity to perform the
    /// action.
    NotAllowed,

    /// The sender needs to provide credentials before being allowed to
    /// perform the action, or has provided improper credentials.
    NotAuthorized,

    /// The entity has violated some local service policy.
    PolicyViolation,

    /// The requesting entity is not authorized to access the requested
    /// service because payment is required.
    PaymentRequired,

    /// The intended recipient is temporarily unavailable.
    RecipientUnavailable,

    /// The recipient or server is redirecting requests for this information
    /// to another entity, typically in a temporary fashion.
    Redirect,

    /// The requesting entity is not authorized to access the requested
    /// service because prior registration is necessary.
    RegistrationRequired,

    /// A remote server or service specified as part or all of the JID of the
    /// intended recipient does not exist or cannot be resolved.
    RemoteServerNotFound,

    /// A remote server or service was resolved but communications could not
    /// be established within a reasonable amount of time.
    RemoteServerTimeout,

    /// The server or recipient is busy or lacks the system resources
    /// necessary to service the request.
    ResourceConstraint,

    /// The server or recipient does not currently provide the requested
    /// service.
    ServiceUnavailable,

    /// The requesting entity is not authorized to access the requested
    /// service because a prior subscription is necessary.
    SubscriptionRequired,

    /// The error condition is not one of those defined by the other
    /// conditions in this list.
    UndefinedCondition,

    /// The recipient or server understood the request but was not expecting
    /// it at this time.
    UnexpectedRequest,
}

impl DefinedCondition {
    /// The element name of this condition on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            DefinedCondition::BadRequest => "bad-request",
            DefinedCondition::Conflict => "conflict",
            DefinedCondition::FeatureNotImplemented => "feature-not-implemented",
            DefinedCondition::Forbidden => "forbidden",
            DefinedCondition::Gone => "gone",
            DefinedCondition::InternalServerError => "internal-server-error",
            DefinedCondition::ItemNotFound => "item-not-found",
            DefinedCondition::JidMalformed => "jid-malformed",
            DefinedCondition::NotAcceptable => "not-acceptable",
            DefinedCondition::NotAllowed => "not-allowed",
            DefinedCondition::NotAuthorized => "not-authorized",
            DefinedCondition::PolicyViolation => "policy-violation",
            DefinedCondition::PaymentRequired => "payment-required",
            DefinedCondition::RecipientUnavailable => "recipient-unavailable",
            DefinedCondition::Redirect => "redirect",
            DefinedCondition::RegistrationRequired => "registration-required",
            DefinedCondition::RemoteServerNotFound => "remote-server-not-found",
            DefinedCondition::RemoteServerTimeout => "remote-server-timeout",
            DefinedCondition::ResourceConstraint => "resource-constraint",
            DefinedCondition::ServiceUnavailable => "service-unavailable",
            DefinedCondition::SubscriptionRequired => "subscription-required",
            DefinedCondition::UndefinedCondition => "undefined-condition",
            DefinedCondition::UnexpectedRequest => "unexpected-request",
        }
    }
}

impl FromStr for DefinedCondition {
    type Err = Error;

    fn from_str(s: &str) -> Result<DefinedCondition, Error> {
        Ok(match s {
            "bad-request" => DefinedCondition::BadRequest,
            "conflict" => DefinedCondition::Conflict,
            "feature-not-implemented" => DefinedCondition::FeatureNotImplemented,
            "forbidden" => DefinedCondition::Forbidden,
            "gone" => DefinedCondition::Gone,
            "internal-server-error" => DefinedCondition::InternalServerError,
            "item-not-found" => DefinedCondition::ItemNotFound,
            "jid-malformed" => DefinedCondition::JidMalformed,
            "not-acceptable" => DefinedCondition::NotAcceptable,
            "not-allowed" => DefinedCondition::NotAllowed,
            "not-authorized" => DefinedCondition::NotAuthorized,
            "policy-violation" => DefinedCondition::PolicyViolation,
            "payment-required" => DefinedCondition::PaymentRequired,
            "recipient-unavailable" => DefinedCondition::RecipientUnavailable,
            "redirect" => DefinedCondition::Redirect,
            "registration-required" => DefinedCondition::RegistrationRequired,
            "remote-server-not-found" => DefinedCondition::RemoteServerNotFound,
            "remote-server-timeout" => DefinedCondition::RemoteServerTimeout,
            "resource-constraint" => DefinedCondition::ResourceConstraint,
            "service-unavailable" => DefinedCondition::ServiceUnavailable,
            "subscription-required" => DefinedCondition::SubscriptionRequired,
            "undefined-condition" => DefinedCondition::UndefinedCondition,
            "unexpected-request" => DefinedCondition::UnexpectedRequest,
            _ => return Err(Error::ParseError("Invalid defined-condition.")),
        })
    }
}

impl From<DefinedCondition> for Element {
    fn from(condition: DefinedCondition) -> Element {
        Element::builder(condition.name(), ns::XMPP_STANZAS).build()
    }
}

type Lang = String;

/// The representation of a `<error/>` child in a stanza.
#[derive(Debug, Clone, PartialEq)]
pub struct StanzaError {
    /// The type of this error.
    pub type_: ErrorType,

    /// The entity returning this error.
    pub by: Option<Jid>,

    /// One of the defined conditions of RFC 6120.
    pub defined_condition: DefinedCondition,

    /// Human-readable description of this error, per language.
    pub texts: BTreeMap<Lang, String>,

    /// A protocol-specific condition element.
    pub other: Option<Element>,
}

impl StanzaError {
    /// Creates a new `<error/>` with the given type and condition.
    pub fn new<T: Into<Option<String>>>(
        type_: ErrorType,
        defined_condition: DefinedCondition,
        lang: &str,
        text: T,
    ) -> StanzaError {
        let mut texts = BTreeMap::new();
        if let Some(text) = text.into() {
            texts.insert(String::from(lang), text);
        }
        StanzaError {
            type_,
            by: None,
            defined_condition,
            texts,
            other: None,
        }
    }

    /// The first available error text, if any.
    pub fn text(&self) -> Option<&str> {
        self.texts
            .get("")
            .or_else(|| self.texts.values().next())
            .map(String::as_str)
    }
}

impl TryFrom<Element> for StanzaError {
    type Error = Error;

    fn try_from(elem: Element) -> Result<StanzaError, Error> {
        check_self!(elem, "error", DEFAULT_NS);
        check_no_unknown_attributes!(elem, "error", ["type", "by"]);

        let type_ = get_attr!(elem, "type", Required);
        let by = get_attr!(elem, "by", Option);
        let mut defined_condition = None;
        let mut texts = BTreeMap::new();
        let mut other = None;

        for child in elem.children() {
            if child.is("text", ns::XMPP_STANZAS) {
                let lang = get_attr!(child, "xml:lang", Default);
                if texts.insert(lang, child.text()).is_some() {
                    return Err(Error::ParseError(
                        "Text element present twice for the same xml:lang.",
                    ));
                }
            } else if child.has_ns(ns::XMPP_STANZAS) {
                if defined_condition.is_some() {
                    return Err(Error::ParseError(
                        "Error must not have more than one defined-condition.",
                    ));
                }
                defined_condition = Some(child.name().parse()?);
            } else {
                if other.is_some() {
                    return Err(Error::ParseError(
                        "Error must not have more than one other element.",
                    ));
                }
                other = Some(child.clone());
            }
        }

        let defined_condition = defined_condition
            .ok_or(Error::ParseError("Error must have a defined-condition."))?;

        Ok(StanzaError {
            type_,
            by,
            defined_condition,
            texts,
            other,
        })
    }
}

impl From<StanzaError> for Element {
    fn from(err: StanzaError) -> Element {
        Element::builder("error", ns::DEFAULT_NS)
            .attr("type", err.type_)
            .attr("by", err.by)
            .append(Element::from(err.defined_condition))
            .append_all(err.texts.into_iter().map(|(lang, text)| {
                Element::builder("text", ns::XMPP_STANZAS)
                    .attr(
                        "xml:lang",
                        match lang.as_ref() {
                            "" => None,
                            lang => Some(lang),
                        },
                    )
                    .append(text)
                    .build()
            }))
            .append_all(err.other)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple() {
        let elem: Element = "<error xmlns='jabber:client' type='cancel'><undefined-condition xmlns='urn:ietf:params:xml:ns:xmpp-stanzas'/></error>".parse().unwrap();
        let error = StanzaError::try_from(elem).unwrap();
        assert_eq!(error.type_, ErrorType::Cancel);
        assert_eq!(
            error.defined_condition,
            DefinedCondition::UndefinedCondition
        );
    }

    #[test]
    fn test_text_and_condition() {
        let elem: Element = "<error xmlns='jabber:client' type='wait'><resource-constraint xmlns='urn:ietf:params:xml:ns:xmpp-stanzas'/><text xmlns='urn:ietf:params:xml:ns:xmpp-stanzas' xml:lang='en'>Slow down</text></error>".parse().unwrap();
        let error = StanzaError::try_from(elem).unwrap();
        assert_eq!(error.type_, ErrorType::Wait);
        assert_eq!(
            error.defined_condition,
            DefinedCondition::ResourceConstraint
        );
        assert_eq!(error.texts["en"], "Slow down");
        assert_eq!(error.text(), Some("Slow down"));
    }

    #[test]
    fn test_missing_condition() {
        let elem: Element = "<error xmlns='jabber:client' type='cancel'/>".parse().unwrap();
        let error = StanzaError::try_from(elem).unwrap_err();
        let message = match error {
            Error::ParseError(string) => string,
            _ => panic!(),
        };
        assert_eq!(message, "Error must have a defined-condition.");
    }

    #[test]
    fn test_serialise() {
        let elem: Element = "<error xmlns='jabber:client' type='cancel'><item-not-found xmlns='urn:ietf:params:xml:ns:xmpp-stanzas'/></error>".parse().unwrap();
        let error = StanzaError::new(
            ErrorType::Cancel,
            DefinedCondition::ItemNotFound,
            "en",
            None,
        );
        let elem2 = Element::from(error);
        assert_eq!(elem, elem2);
    }
}
