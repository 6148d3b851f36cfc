// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! SASL negotiation.

mod digest_md5;

pub use self::digest_md5::DigestMd5;

use std::collections::HashSet;

use sasl::client::mechanisms::{Plain, Scram};
use sasl::client::Mechanism;
use sasl::common::scram::Sha1;
use sasl::common::{ChannelBinding, Credentials};
use tokio::io::{AsyncRead, AsyncWrite};

use jabber_stanzas::ns;
use jabber_stanzas::sasl::{Auth, Challenge, Failure, Mechanism as XmppMechanism, Response, Success};

use crate::error::{AuthError, Error};
use crate::xmlstream::XmlStream;

enum AnyMechanism {
    ScramSha1(Scram<Sha1>),
    DigestMd5(DigestMd5),
    Plain(Plain),
}

impl AnyMechanism {
    fn xmpp_name(&self) -> XmppMechanism {
        match self {
            AnyMechanism::ScramSha1(_) => XmppMechanism::ScramSha1,
            AnyMechanism::DigestMd5(_) => XmppMechanism::DigestMd5,
            AnyMechanism::Plain(_) => XmppMechanism::Plain,
        }
    }

    fn initial(&mut self) -> Vec<u8> {
        match self {
            AnyMechanism::ScramSha1(mech) => mech.initial(),
            AnyMechanism::DigestMd5(mech) => mech.initial(),
            AnyMechanism::Plain(mech) => mech.initial(),
        }
    }

    fn response(&mut self, challenge: &[u8]) -> Result<Vec<u8>, AuthError> {
        match self {
            AnyMechanism::ScramSha1(mech) => mech.response(challenge).map_err(AuthError::Sasl),
            AnyMechanism::DigestMd5(mech) => mech.response(challenge),
            AnyMechanism::Plain(mech) => mech.response(challenge).map_err(AuthError::Sasl),
        }
    }
}

/// Picks the best mechanism both sides support, in the fixed preference
/// order SCRAM-SHA-1, DIGEST-MD5, PLAIN.
///
/// PLAIN is only selectable over an encrypted channel, unless the caller
/// explicitly opted into sending the password in clear.
fn select_mechanism(
    remote_mechs: &HashSet<String>,
    username: &str,
    password: &str,
    domain: &str,
    channel_binding: ChannelBinding,
    encrypted: bool,
    allow_plain_cleartext: bool,
) -> Result<AnyMechanism, Error> {
    if remote_mechs.contains("SCRAM-SHA-1") {
        let creds = Credentials::default()
            .with_username(username)
            .with_password(password)
            .with_channel_binding(channel_binding);
        let scram = Scram::<Sha1>::from_credentials(creds).map_err(AuthError::Sasl)?;
        return Ok(AnyMechanism::ScramSha1(scram));
    }
    if remote_mechs.contains("DIGEST-MD5") {
        return Ok(AnyMechanism::DigestMd5(DigestMd5::new(
            username, password, domain,
        )));
    }
    if remote_mechs.contains("PLAIN") {
        if !encrypted && !allow_plain_cleartext {
            return Err(AuthError::PlainOverCleartext.into());
        }
        let creds = Credentials::default()
            .with_username(username)
            .with_password(password);
        let plain = Plain::from_credentials(creds).map_err(AuthError::Sasl)?;
        return Ok(AnyMechanism::Plain(plain));
    }
    Err(AuthError::NoMechanism.into())
}

/// Runs the SASL exchange over an opened stream. On success the caller must
/// restart the stream.
pub(crate) async fn auth<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut XmlStream<S>,
    username: &str,
    password: &str,
    channel_binding: ChannelBinding,
    encrypted: bool,
    allow_plain_cleartext: bool,
) -> Result<(), Error> {
    let remote_mechs: HashSet<String> = stream
        .stream_features
        .sasl_mechanisms
        .iter()
        .cloned()
        .collect();

    let domain = stream.domain.clone();
    let mut mechanism = select_mechanism(
        &remote_mechs,
        username,
        password,
        &domain,
        channel_binding,
        encrypted,
        allow_plain_cleartext,
    )?;

    let initial = mechanism.initial();
    stream
        .send_stanza(Auth {
            mechanism: mechanism.xmpp_name(),
            data: initial,
        })
        .await?;

    loop {
        let stanza = stream.read_element().await?;
        if stanza.is("challenge", ns::SASL) {
            let challenge = Challenge::try_from(stanza)?;
            let response = mechanism.response(&challenge.data)?;
            stream.send_stanza(Response { data: response }).await?;
        } else if stanza.is("success", ns::SASL) {
            Success::try_from(stanza)?;
            return Ok(());
        } else if stanza.is("failure", ns::SASL) {
            let failure = Failure::try_from(stanza)?;
            return Err(Error::Auth(AuthError::Fail(failure.defined_condition)));
        } else {
            // Ignore and loop.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mechs(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| String::from(*s)).collect()
    }

    #[test]
    fn test_preference_order() {
        let selected = select_mechanism(
            &mechs(&["PLAIN", "DIGEST-MD5", "SCRAM-SHA-1"]),
            "alice",
            "secret",
            "example.org",
            ChannelBinding::None,
            true,
            false,
        )
        .unwrap();
        assert!(matches!(selected, AnyMechanism::ScramSha1(_)));

        let selected = select_mechanism(
            &mechs(&["PLAIN", "DIGEST-MD5"]),
            "alice",
            "secret",
            "example.org",
            ChannelBinding::None,
            true,
            false,
        )
        .unwrap();
        assert!(matches!(selected, AnyMechanism::DigestMd5(_)));
    }

    #[test]
    fn test_plain_needs_encryption() {
        let err = select_mechanism(
            &mechs(&["PLAIN"]),
            "alice",
            "secret",
            "example.org",
            ChannelBinding::None,
            false,
            false,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Auth(AuthError::PlainOverCleartext)
        ));

        let selected = select_mechanism(
            &mechs(&["PLAIN"]),
            "alice",
            "secret",
            "example.org",
            ChannelBinding::None,
            false,
            true,
        )
        .unwrap();
        assert!(matches!(selected, AnyMechanism::Plain(_)));
    }

    #[test]
    fn test_no_mechanism() {
        let err = select_mechanism(
            &mechs(&["EXTERNAL"]),
            "alice",
            "secret",
            "example.org",
            ChannelBinding::None,
            true,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::NoMechanism)));
    }
}
