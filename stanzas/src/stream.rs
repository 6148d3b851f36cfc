// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The `<stream:features/>` and `<stream:error/>` children of the stream
//! envelope.

use core::convert::TryFrom;

use minidom::Element;

use crate::ns;
use crate::util::error::Error;

/// The STARTTLS advertisement inside stream features.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StartTls {
    /// Whether the server requires the channel to be encrypted before
    /// continuing.
    pub required: bool,
}

/// The features advertised by the server after a stream header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamFeatures {
    /// STARTTLS, when the transport can still be upgraded.
    pub starttls: Option<StartTls>,

    /// The SASL mechanisms offered by the server.
    pub sasl_mechanisms: Vec<String>,

    /// Whether resource binding is available.
    pub bind: bool,

    /// Whether the legacy session of RFC 3921 is advertised.
    pub session: bool,

    /// Every other advertised feature, unparsed.
    pub others: Vec<Element>,
}

impl StreamFeatures {
    /// Whether the transport can be upgraded to TLS.
    pub fn can_starttls(&self) -> bool {
        self.starttls.is_some()
    }

    /// Whether the server requires TLS before going further.
    pub fn tls_required(&self) -> bool {
        match self.starttls {
            Some(ref starttls) => starttls.required,
            None => false,
        }
    }

    /// Whether resource binding is available.
    pub fn can_bind(&self) -> bool {
        self.bind
    }
}

impl TryFrom<Element> for StreamFeatures {
    type Error = Error;

    fn try_from(root: Element) -> Result<StreamFeatures, Error> {
        check_self!(root, "features", STREAM, "stream:features");
        let mut features = StreamFeatures::default();
        for child in root.children() {
            if child.is("starttls", ns::TLS) {
                features.starttls = Some(StartTls {
                    required: child.has_child("required", ns::TLS),
                });
            } else if child.is("mechanisms", ns::SASL) {
                for mech in child.children() {
                    if mech.is("mechanism", ns::SASL) {
                        features.sasl_mechanisms.push(mech.text());
                    }
                }
            } else if child.is("bind", ns::BIND) {
                features.bind = true;
            } else if child.is("session", ns::SESSION) {
                features.session = true;
            } else {
                features.others.push(child.clone());
            }
        }
        Ok(features)
    }
}

/// A fatal stream-level error; the stream closes after it.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamError {
    /// The name of the defined condition of RFC 6120 §4.9.3.
    pub condition: String,

    /// Optional human-readable description.
    pub text: Option<String>,
}

impl TryFrom<Element> for StreamError {
    type Error = Error;

    fn try_from(root: Element) -> Result<StreamError, Error> {
        check_self!(root, "error", STREAM, "stream:error");
        let mut condition = None;
        let mut text = None;
        for child in root.children() {
            if child.is("text", ns::XMPP_STREAMS) {
                text = Some(child.text());
            } else if child.has_ns(ns::XMPP_STREAMS) {
                condition = Some(child.name().to_owned());
            }
        }
        let condition =
            condition.ok_or(Error::ParseError("Stream error must have a condition."))?;
        Ok(StreamError { condition, text })
    }
}
