// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A client implementation of the historic DIGEST-MD5 mechanism (RFC 2831),
//! kept for servers which offer nothing better.

use std::collections::HashMap;

use md5::{Digest, Md5};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::error::AuthError;

fn hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Splits a digest challenge into its key=value pairs, stripping quotes.
fn parse_challenge(text: &str) -> HashMap<String, String> {
    let mut pairs = HashMap::new();
    for part in text.split(',') {
        let mut kv = part.splitn(2, '=');
        let key = match kv.next() {
            Some(key) => key.trim(),
            None => continue,
        };
        let value = match kv.next() {
            Some(value) => value.trim().trim_matches('"'),
            None => continue,
        };
        pairs.insert(key.to_owned(), value.to_owned());
    }
    pairs
}

/// The client side of a DIGEST-MD5 exchange.
pub struct DigestMd5 {
    username: String,
    password: String,
    digest_uri: String,
    cnonce: String,
    responded: bool,
}

impl DigestMd5 {
    /// Creates a new mechanism instance for the given account.
    pub fn new(username: &str, password: &str, domain: &str) -> DigestMd5 {
        let cnonce: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        DigestMd5 {
            username: username.to_owned(),
            password: password.to_owned(),
            digest_uri: format!("xmpp/{}", domain),
            cnonce,
            responded: false,
        }
    }

    /// The IANA name of this mechanism.
    pub fn name(&self) -> &'static str {
        "DIGEST-MD5"
    }

    /// DIGEST-MD5 has no initial response.
    pub fn initial(&mut self) -> Vec<u8> {
        Vec::new()
    }

    /// Answers a server challenge.
    ///
    /// The first challenge carries the nonce and gets the full digest
    /// response; the second carries `rspauth` and is answered with an empty
    /// payload.
    pub fn response(&mut self, challenge: &[u8]) -> Result<Vec<u8>, AuthError> {
        let text = std::str::from_utf8(challenge).map_err(|_| AuthError::InvalidChallenge)?;
        let pairs = parse_challenge(text);

        if pairs.contains_key("rspauth") {
            if !self.responded {
                return Err(AuthError::InvalidChallenge);
            }
            return Ok(Vec::new());
        }

        let nonce = pairs
            .get("nonce")
            .ok_or(AuthError::InvalidChallenge)?
            .clone();
        let realm = pairs.get("realm").cloned().unwrap_or_default();
        let nc = "00000001";
        let qop = "auth";

        let a1_start = Md5::digest(
            format!("{}:{}:{}", self.username, realm, self.password).as_bytes(),
        );
        let mut a1 = a1_start.to_vec();
        a1.extend_from_slice(format!(":{}:{}", nonce, self.cnonce).as_bytes());
        let ha1 = hex(&Md5::digest(&a1));

        let a2 = format!("AUTHENTICATE:{}", self.digest_uri);
        let ha2 = hex(&Md5::digest(a2.as_bytes()));

        let kd = format!(
            "{}:{}:{}:{}:{}:{}",
            ha1, nonce, nc, self.cnonce, qop, ha2
        );
        let response = hex(&Md5::digest(kd.as_bytes()));

        self.responded = true;
        Ok(format!(
            "username=\"{}\",realm=\"{}\",nonce=\"{}\",cnonce=\"{}\",nc={},qop={},digest-uri=\"{}\",response={},charset=utf-8",
            self.username, realm, nonce, self.cnonce, nc, qop, self.digest_uri, response
        )
        .into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_challenge() {
        let pairs = parse_challenge(
            "realm=\"somerealm\",nonce=\"OA6MG9tEQGm2hh\",qop=\"auth\",charset=utf-8,algorithm=md5-sess",
        );
        assert_eq!(pairs["realm"], "somerealm");
        assert_eq!(pairs["nonce"], "OA6MG9tEQGm2hh");
        assert_eq!(pairs["algorithm"], "md5-sess");
    }

    // The worked example of RFC 2831 §4, with its fixed cnonce.
    #[test]
    fn test_rfc_2831_example() {
        let mut mech = DigestMd5::new("chris", "secret", "elwood.innosoft.com");
        mech.cnonce = String::from("OA6MHXh6VqTrRk");
        mech.digest_uri = String::from("imap/elwood.innosoft.com");
        let response = mech
            .response(
                b"realm=\"elwood.innosoft.com\",nonce=\"OA6MG9tEQGm2hh\",qop=\"auth\",algorithm=md5-sess,charset=utf-8",
            )
            .unwrap();
        let text = String::from_utf8(response).unwrap();
        assert!(text.contains("response=d388dad90d4bbd760a152321f2143af7"));
        assert!(text.contains("username=\"chris\""));
        assert!(text.contains("nc=00000001"));
    }

    #[test]
    fn test_rspauth_round() {
        let mut mech = DigestMd5::new("alice", "secret", "example.org");
        let _ = mech
            .response(b"realm=\"example.org\",nonce=\"abc\",qop=\"auth\",charset=utf-8")
            .unwrap();
        let done = mech.response(b"rspauth=1234").unwrap();
        assert!(done.is_empty());
    }

    #[test]
    fn test_rspauth_before_challenge() {
        let mut mech = DigestMd5::new("alice", "secret", "example.org");
        assert!(mech.response(b"rspauth=1234").is_err());
    }
}
