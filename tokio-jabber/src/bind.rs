// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Resource binding and legacy session establishment.

use tokio::io::{AsyncRead, AsyncWrite};

use jabber_stanzas::bind::{BindQuery, BindResponse, Session};
use jabber_stanzas::iq::{Iq, IqType};
use jabber_stanzas::jid::Jid;
use jabber_stanzas::ns;

use crate::error::{Error, ProtocolError};
use crate::xmlstream::XmlStream;

const BIND_REQ_ID: &str = "resource-bind";
const SESSION_REQ_ID: &str = "session-establish";

/// Binds a resource on an authenticated stream, returning the full JID the
/// server assigned.
pub(crate) async fn bind<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut XmlStream<S>,
    resource: Option<String>,
) -> Result<Jid, Error> {
    if !stream.stream_features.can_bind() {
        return Err(Error::NotSupported);
    }

    let iq = Iq::from_set(BIND_REQ_ID, BindQuery::new(resource));
    stream.send_stanza(iq).await?;

    loop {
        let stanza = stream.read_element().await?;
        if !stanza.is("iq", ns::DEFAULT_NS) {
            continue;
        }
        let iq = Iq::try_from(stanza)?;
        if iq.id != BIND_REQ_ID {
            continue;
        }
        match iq.payload {
            IqType::Result(Some(payload)) => {
                let bind = BindResponse::try_from(payload)?;
                return Ok(bind.into());
            }
            IqType::Error(error) => return Err(error.into()),
            _ => return Err(ProtocolError::InvalidBindResponse.into()),
        }
    }
}

/// Establishes the legacy session of RFC 3921 when the server still
/// advertises it.
pub(crate) async fn establish_session<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut XmlStream<S>,
) -> Result<(), Error> {
    if !stream.stream_features.session {
        return Ok(());
    }

    let iq = Iq::from_set(SESSION_REQ_ID, Session);
    stream.send_stanza(iq).await?;

    loop {
        let stanza = stream.read_element().await?;
        if !stanza.is("iq", ns::DEFAULT_NS) {
            continue;
        }
        let iq = Iq::try_from(stanza)?;
        if iq.id != SESSION_REQ_ID {
            continue;
        }
        return match iq.payload {
            IqType::Result(_) => Ok(()),
            IqType::Error(error) => Err(error.into()),
            _ => Err(Error::InvalidState),
        };
    }
}
