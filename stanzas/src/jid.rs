// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Jabber identifiers, the addresses of RFC 6122.
//!
//! A JID has the shape `node@domain/resource`, where both the node and the
//! resource are optional. A JID without a resource is a *bare* JID, one with
//! a resource is a *full* JID.

use core::fmt;
use core::str::FromStr;
use std::error::Error as StdError;

use minidom::IntoAttributeValue;

/// An error raised when constructing an invalid address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JidParseError {
    /// The domain part is missing or empty.
    NoDomain,

    /// An `@` was present but the node part is empty.
    EmptyNode,

    /// A `/` was present but the resource part is empty.
    EmptyResource,

    /// The domain part contains a stray `@`.
    StrayAtSign,

    /// A resource was given where a bare JID was expected.
    ResourceInBareJid,

    /// No resource was given where a full JID was expected.
    NoResource,
}

impl fmt::Display for JidParseError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "invalid address: {}",
            match self {
                JidParseError::NoDomain => "no domain found in this JID",
                JidParseError::EmptyNode => "empty node part",
                JidParseError::EmptyResource => "empty resource part",
                JidParseError::StrayAtSign => "stray '@' in the domain part",
                JidParseError::ResourceInBareJid => "resource in bare JID",
                JidParseError::NoResource => "no resource in full JID",
            }
        )
    }
}

impl StdError for JidParseError {}

/// An XMPP address, whose resource part may or may not be present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Jid {
    node: Option<String>,
    domain: String,
    resource: Option<String>,
}

impl Jid {
    /// Parses a string into a `Jid`, failing with [`JidParseError`] when the
    /// address is invalid.
    pub fn new(s: &str) -> Result<Jid, JidParseError> {
        s.parse()
    }

    /// Builds a `Jid` from its pre-split parts.
    pub fn from_parts(
        node: Option<&str>,
        domain: &str,
        resource: Option<&str>,
    ) -> Result<Jid, JidParseError> {
        if domain.is_empty() {
            return Err(JidParseError::NoDomain);
        }
        if domain.contains('@') {
            return Err(JidParseError::StrayAtSign);
        }
        if let Some(node) = node {
            if node.is_empty() {
                return Err(JidParseError::EmptyNode);
            }
        }
        if let Some(resource) = resource {
            if resource.is_empty() {
                return Err(JidParseError::EmptyResource);
            }
        }
        Ok(Jid {
            node: node.map(String::from),
            domain: String::from(domain),
            resource: resource.map(String::from),
        })
    }

    /// The node part, the part before the `@`.
    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    /// The domain part, the only mandatory part of a JID.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The resource part, the part after the `/`.
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Whether this JID carries a resource.
    pub fn is_full(&self) -> bool {
        self.resource.is_some()
    }

    /// Whether this JID lacks a resource.
    pub fn is_bare(&self) -> bool {
        self.resource.is_none()
    }

    /// Returns this address with the resource dropped.
    pub fn to_bare(&self) -> BareJid {
        BareJid {
            inner: Jid {
                node: self.node.clone(),
                domain: self.domain.clone(),
                resource: None,
            },
        }
    }

    /// Consumes this address, dropping the resource.
    pub fn into_bare(mut self) -> BareJid {
        self.resource = None;
        BareJid { inner: self }
    }

    /// Tries to view this address as a full JID.
    pub fn try_into_full(self) -> Result<FullJid, JidParseError> {
        if self.resource.is_some() {
            Ok(FullJid { inner: self })
        } else {
            Err(JidParseError::NoResource)
        }
    }
}

impl FromStr for Jid {
    type Err = JidParseError;

    fn from_str(s: &str) -> Result<Jid, JidParseError> {
        let (bare, resource) = match s.find('/') {
            Some(slash) => (&s[..slash], Some(&s[slash + 1..])),
            None => (s, None),
        };
        let (node, domain) = match bare.find('@') {
            Some(at) => (Some(&bare[..at]), &bare[at + 1..]),
            None => (None, bare),
        };
        Jid::from_parts(node, domain, resource)
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        if let Some(ref node) = self.node {
            write!(fmt, "{}@", node)?;
        }
        write!(fmt, "{}", self.domain)?;
        if let Some(ref resource) = self.resource {
            write!(fmt, "/{}", resource)?;
        }
        Ok(())
    }
}

impl IntoAttributeValue for Jid {
    fn into_attribute_value(self) -> Option<String> {
        Some(self.to_string())
    }
}

/// An XMPP address without a resource part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BareJid {
    inner: Jid,
}

impl BareJid {
    /// Parses a string into a `BareJid`, rejecting addresses carrying a
    /// resource.
    pub fn new(s: &str) -> Result<BareJid, JidParseError> {
        s.parse()
    }

    /// Builds a `BareJid` from its pre-split parts.
    pub fn from_parts(node: Option<&str>, domain: &str) -> Result<BareJid, JidParseError> {
        Ok(BareJid {
            inner: Jid::from_parts(node, domain, None)?,
        })
    }

    /// The node part, the part before the `@`.
    pub fn node(&self) -> Option<&str> {
        self.inner.node()
    }

    /// The domain part.
    pub fn domain(&self) -> &str {
        self.inner.domain()
    }

    /// Attaches a resource to this bare JID.
    pub fn with_resource(&self, resource: &str) -> Result<FullJid, JidParseError> {
        let jid = Jid::from_parts(self.node(), self.domain(), Some(resource))?;
        Ok(FullJid { inner: jid })
    }
}

impl FromStr for BareJid {
    type Err = JidParseError;

    fn from_str(s: &str) -> Result<BareJid, JidParseError> {
        let jid = Jid::from_str(s)?;
        if jid.resource.is_some() {
            return Err(JidParseError::ResourceInBareJid);
        }
        Ok(BareJid { inner: jid })
    }
}

impl fmt::Display for BareJid {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.inner.fmt(fmt)
    }
}

impl From<BareJid> for Jid {
    fn from(bare: BareJid) -> Jid {
        bare.inner
    }
}

impl IntoAttributeValue for BareJid {
    fn into_attribute_value(self) -> Option<String> {
        self.inner.into_attribute_value()
    }
}

/// An XMPP address with a resource part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FullJid {
    inner: Jid,
}

impl FullJid {
    /// Parses a string into a `FullJid`, rejecting addresses without a
    /// resource.
    pub fn new(s: &str) -> Result<FullJid, JidParseError> {
        s.parse()
    }

    /// Builds a `FullJid` from its pre-split parts.
    pub fn from_parts(
        node: Option<&str>,
        domain: &str,
        resource: &str,
    ) -> Result<FullJid, JidParseError> {
        Ok(FullJid {
            inner: Jid::from_parts(node, domain, Some(resource))?,
        })
    }

    /// The node part, the part before the `@`.
    pub fn node(&self) -> Option<&str> {
        self.inner.node()
    }

    /// The domain part.
    pub fn domain(&self) -> &str {
        self.inner.domain()
    }

    /// The resource part, always present on a full JID.
    pub fn resource(&self) -> &str {
        self.inner.resource().unwrap()
    }

    /// Returns this address with the resource dropped.
    pub fn to_bare(&self) -> BareJid {
        self.inner.to_bare()
    }
}

impl FromStr for FullJid {
    type Err = JidParseError;

    fn from_str(s: &str) -> Result<FullJid, JidParseError> {
        Jid::from_str(s)?.try_into_full()
    }
}

impl fmt::Display for FullJid {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.inner.fmt(fmt)
    }
}

impl From<FullJid> for Jid {
    fn from(full: FullJid) -> Jid {
        full.inner
    }
}

impl IntoAttributeValue for FullJid {
    fn into_attribute_value(self) -> Option<String> {
        self.inner.into_attribute_value()
    }
}
