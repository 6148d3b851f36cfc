// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Entity capabilities (XEP-0115).

use core::convert::TryFrom;

use base64::{engine::general_purpose::STANDARD as Base64, Engine};
use minidom::Element;
use sha1::{Digest, Sha1};

use crate::disco::{DiscoInfoQuery, DiscoInfoResult};
use crate::ns;
use crate::presence::PresencePayload;
use crate::util::error::Error;

/// A capability hash broadcast in presence, identifying which features an
/// application supports without querying it every time.
#[derive(Debug, Clone, PartialEq)]
pub struct Caps {
    /// A URI identifying the application.
    pub node: String,

    /// The hash algorithm used; only `sha-1` is emitted by this
    /// implementation.
    pub hash: String,

    /// The hash of the application's disco#info.
    pub ver: Vec<u8>,
}

impl PresencePayload for Caps {}

impl Caps {
    /// Creates a new `<c/>` from its node and sha-1 hash.
    pub fn new<N: Into<String>>(node: N, ver: Vec<u8>) -> Caps {
        Caps {
            node: node.into(),
            hash: String::from("sha-1"),
            ver,
        }
    }

    /// The base64 form of the hash, as seen on the wire.
    pub fn ver_string(&self) -> String {
        Base64.encode(&self.ver)
    }
}

impl TryFrom<Element> for Caps {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Caps, Error> {
        check_self!(elem, "c", CAPS);
        check_no_children!(elem, "c");
        check_no_unknown_attributes!(elem, "c", ["node", "hash", "ver", "ext"]);
        let ver: String = get_attr!(elem, "ver", Required);
        Ok(Caps {
            node: get_attr!(elem, "node", Required),
            hash: get_attr!(elem, "hash", Required),
            ver: Base64.decode(ver)?,
        })
    }
}

impl From<Caps> for Element {
    fn from(caps: Caps) -> Element {
        let ver = caps.ver_string();
        Element::builder("c", ns::CAPS)
            .attr("node", caps.node)
            .attr("hash", caps.hash)
            .attr("ver", ver)
            .build()
    }
}

fn compute_item(field: &str) -> Vec<u8> {
    let mut bytes = field.as_bytes().to_vec();
    bytes.push(b'<');
    bytes
}

fn compute_items<T, F: Fn(&T) -> Vec<u8>>(things: &[T], encode: F) -> Vec<u8> {
    let mut string: Vec<u8> = vec![];
    let mut accumulator: Vec<Vec<u8>> = vec![];
    for thing in things {
        accumulator.push(encode(thing));
    }
    // The i;octet collation, lexicographic over bytes.
    accumulator.sort();
    for mut bytes in accumulator {
        string.append(&mut bytes);
    }
    string
}

/// Applies the XEP-0115 algorithm on the provided disco#info result, to
/// generate the hash input.
pub fn compute_disco(disco: &DiscoInfoResult) -> Vec<u8> {
    let mut input = compute_items(&disco.identities, |identity| {
        let lang = identity.lang.clone().unwrap_or_default();
        let name = identity.name.clone().unwrap_or_default();
        compute_item(&format!(
            "{}/{}/{}/{}",
            identity.category, identity.type_, lang, name
        ))
    });
    input.extend(compute_items(&disco.features, |feature| {
        compute_item(&feature.var)
    }));
    input.extend(compute_items(&disco.extensions, |extension| {
        let mut bytes = match extension.form_type {
            Some(ref form_type) => form_type.as_bytes().to_vec(),
            None => vec![],
        };
        bytes.push(b'<');
        for field in &extension.fields {
            if field.var.as_deref() == Some("FORM_TYPE") {
                continue;
            }
            if let Some(ref var) = field.var {
                bytes.append(&mut compute_item(var));
            }
            bytes.append(&mut compute_items(&field.values, |value| {
                compute_item(value)
            }));
        }
        bytes
    }));
    input
}

/// Hashes the result of [compute_disco()] with sha-1.
pub fn hash_caps(data: &[u8]) -> Vec<u8> {
    Sha1::digest(data).to_vec()
}

/// Helper function to create the query for the disco#info corresponding to a
/// caps hash.
pub fn query_caps(caps: &Caps) -> DiscoInfoQuery {
    DiscoInfoQuery {
        node: Some(format!("{}#{}", caps.node, caps.ver_string())),
    }
}
