// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::convert::TryFrom;
use core::str::FromStr;

use base64::{engine::general_purpose::STANDARD as Base64, Engine};
use minidom::Element;

use crate::ns;
use crate::util::error::Error;

generate_attribute!(
    /// The SASL mechanism used during authentication.
    Mechanism, "mechanism", {
        /// Uses no hashing or encryption, the credentials are sent in plain
        /// text; should only be used over an encrypted channel.
        Plain => "PLAIN",

        /// The historic challenge-response mechanism of RFC 2831.
        DigestMd5 => "DIGEST-MD5",

        /// Channel-binding-capable salted challenge-response mechanism.
        ScramSha1 => "SCRAM-SHA-1",

        /// Like SCRAM-SHA-1 but with SHA-256 as the hash function.
        ScramSha256 => "SCRAM-SHA-256",

        /// Anonymous login.
        Anonymous => "ANONYMOUS",
    }
);

fn decode_sasl_data(text: &str) -> Result<Vec<u8>, Error> {
    if text.is_empty() || text == "=" {
        return Ok(Vec::new());
    }
    Ok(Base64.decode(text)?)
}

fn encode_sasl_data(data: &[u8]) -> String {
    if data.is_empty() {
        String::from("=")
    } else {
        Base64.encode(data)
    }
}

/// The first stanza of a SASL exchange, selecting a mechanism.
#[derive(Debug, Clone, PartialEq)]
pub struct Auth {
    /// The mechanism the client wants to use.
    pub mechanism: Mechanism,

    /// The initial response, if this mechanism has one.
    pub data: Vec<u8>,
}

impl TryFrom<Element> for Auth {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Auth, Error> {
        check_self!(elem, "auth", SASL);
        check_no_children!(elem, "auth");
        check_no_unknown_attributes!(elem, "auth", ["mechanism"]);
        Ok(Auth {
            mechanism: get_attr!(elem, "mechanism", Required),
            data: decode_sasl_data(&elem.text())?,
        })
    }
}

impl From<Auth> for Element {
    fn from(auth: Auth) -> Element {
        Element::builder("auth", ns::SASL)
            .attr("mechanism", auth.mechanism)
            .append(encode_sasl_data(&auth.data))
            .build()
    }
}

/// A server-issued challenge during a SASL exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Challenge {
    /// The challenge payload.
    pub data: Vec<u8>,
}

impl TryFrom<Element> for Challenge {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Challenge, Error> {
        check_self!(elem, "challenge", SASL);
        check_no_children!(elem, "challenge");
        check_no_attributes!(elem, "challenge");
        Ok(Challenge {
            data: decode_sasl_data(&elem.text())?,
        })
    }
}

impl From<Challenge> for Element {
    fn from(challenge: Challenge) -> Element {
        Element::builder("challenge", ns::SASL)
            .append(encode_sasl_data(&challenge.data))
            .build()
    }
}

/// The client's answer to a server challenge.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// The response payload.
    pub data: Vec<u8>,
}

impl TryFrom<Element> for Response {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Response, Error> {
        check_self!(elem, "response", SASL);
        check_no_children!(elem, "response");
        check_no_attributes!(elem, "response");
        Ok(Response {
            data: decode_sasl_data(&elem.text())?,
        })
    }
}

impl From<Response> for Element {
    fn from(response: Response) -> Element {
        Element::builder("response", ns::SASL)
            .append(encode_sasl_data(&response.data))
            .build()
    }
}

/// Ends a SASL exchange successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct Success {
    /// Optional final additional data.
    pub data: Vec<u8>,
}

impl TryFrom<Element> for Success {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Success, Error> {
        check_self!(elem, "success", SASL);
        check_no_children!(elem, "success");
        check_no_attributes!(elem, "success");
        Ok(Success {
            data: decode_sasl_data(&elem.text())?,
        })
    }
}

impl From<Success> for Element {
    fn from(success: Success) -> Element {
        Element::builder("success", ns::SASL)
            .append(encode_sasl_data(&success.data))
            .build()
    }
}

/// The list of authentication failure conditions of RFC 6120 §6.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinedCondition {
    /// The client aborted the exchange.
    Aborted,

    /// This account is disabled.
    AccountDisabled,

    /// The credentials of this account expired.
    CredentialsExpired,

    /// This mechanism is only available when the channel is encrypted.
    EncryptionRequired,

    /// A base64 payload could not be decoded.
    IncorrectEncoding,

    /// The authzid provided is invalid.
    InvalidAuthzid,

    /// The server does not support this mechanism.
    InvalidMechanism,

    /// The request was malformed.
    MalformedRequest,

    /// The server considers this mechanism too weak for this account.
    MechanismTooWeak,

    /// The credentials were wrong.
    NotAuthorized,

    /// The server had a temporary failure, retrying later may work.
    TemporaryAuthFailure,
}

impl DefinedCondition {
    fn name(&self) -> &'static str {
        match self {
            DefinedCondition::Aborted => "aborted",
            DefinedCondition::AccountDisabled => "account-disabled",
            DefinedCondition::CredentialsExpired => "credentials-expired",
            DefinedCondition::EncryptionRequired => "encryption-required",
            DefinedCondition::IncorrectEncoding => "incorrect-encoding",
            DefinedCondition::InvalidAuthzid => "invalid-authzid",
            DefinedCondition::InvalidMechanism => "invalid-mechanism",
            DefinedCondition::MalformedRequest => "malformed-request",
            DefinedCondition::MechanismTooWeak => "mechanism-too-weak",
            DefinedCondition::NotAuthorized => "not-authorized",
            DefinedCondition::TemporaryAuthFailure => "temporary-auth-failure",
        }
    }
}

impl core::fmt::Display for DefinedCondition {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(fmt, "{}", self.name())
    }
}

impl FromStr for DefinedCondition {
    type Err = Error;

    fn from_str(s: &str) -> Result<DefinedCondition, Error> {
        Ok(match s {
            "aborted" => DefinedCondition::Aborted,
            "account-disabled" => DefinedCondition::AccountDisabled,
            "credentials-expired" => DefinedCondition::CredentialsExpired,
            "encryption-required" => DefinedCondition::EncryptionRequired,
            "incorrect-encoding" => DefinedCondition::IncorrectEncoding,
            "invalid-authzid" => DefinedCondition::InvalidAuthzid,
            "invalid-mechanism" => DefinedCondition::InvalidMechanism,
            "malformed-request" => DefinedCondition::MalformedRequest,
            "mechanism-too-weak" => DefinedCondition::MechanismTooWeak,
            "not-authorized" => DefinedCondition::NotAuthorized,
            "temporary-auth-failure" => DefinedCondition::TemporaryAuthFailure,
            _ => return Err(Error::ParseError("Unknown SASL defined-condition.")),
        })
    }
}

/// Ends a SASL exchange on failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    /// The reason the authentication failed.
    pub defined_condition: DefinedCondition,

    /// Optional human-readable description.
    pub text: Option<String>,
}

impl TryFrom<Element> for Failure {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Failure, Error> {
        check_self!(elem, "failure", SASL);
        check_no_attributes!(elem, "failure");
        let mut defined_condition = None;
        let mut text = None;
        for child in elem.children() {
            if child.is("text", ns::SASL) {
                text = Some(child.text());
            } else if child.has_ns(ns::SASL) {
                if defined_condition.is_some() {
                    return Err(Error::ParseError(
                        "Failure must not have more than one defined-condition.",
                    ));
                }
                defined_condition = Some(child.name().parse()?);
            } else {
                return Err(Error::ParseError("Unknown element in SASL failure."));
            }
        }
        let defined_condition = defined_condition
            .ok_or(Error::ParseError("Failure must have a defined-condition."))?;
        Ok(Failure {
            defined_condition,
            text,
        })
    }
}

impl From<Failure> for Element {
    fn from(failure: Failure) -> Element {
        Element::builder("failure", ns::SASL)
            .append(Element::builder(failure.defined_condition.name(), ns::SASL).build())
            .append_all(failure.text.map(|text| {
                Element::builder("text", ns::SASL).append(text).build()
            }))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth() {
        let elem: Element =
            "<auth xmlns='urn:ietf:params:xml:ns:xmpp-sasl' mechanism='PLAIN'>AGp1bGlldAByMG0zMG15cjBtMzA=</auth>"
                .parse()
                .unwrap();
        let auth = Auth::try_from(elem).unwrap();
        assert_eq!(auth.mechanism, Mechanism::Plain);
        assert_eq!(auth.data, b"\0juliet\0r0m30myr0m30");
    }

    #[test]
    fn test_empty_data_is_equals_sign() {
        let auth = Auth {
            mechanism: Mechanism::Anonymous,
            data: Vec::new(),
        };
        let elem = Element::from(auth);
        assert_eq!(elem.text(), "=");
        let auth = Auth::try_from(elem).unwrap();
        assert!(auth.data.is_empty());
    }

    #[test]
    fn test_failure() {
        let elem: Element = "<failure xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><not-authorized/><text>Wrong password</text></failure>"
            .parse()
            .unwrap();
        let failure = Failure::try_from(elem).unwrap();
        assert_eq!(
            failure.defined_condition,
            DefinedCondition::NotAuthorized
        );
        assert_eq!(failure.text, Some(String::from("Wrong password")));
    }

    #[test]
    fn test_success_roundtrip() {
        let elem: Element = "<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>dj1hYmM=</success>"
            .parse()
            .unwrap();
        let success = Success::try_from(elem.clone()).unwrap();
        assert_eq!(Element::from(success), elem);
    }
}
