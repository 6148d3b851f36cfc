// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Detailed error types.

use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;

use sasl::client::MechanismError as SaslMechanismError;

use jabber_stanzas::jid::JidParseError;
use jabber_stanzas::sasl::DefinedCondition as SaslDefinedCondition;
use jabber_stanzas::stanza_error::StanzaError;
use jabber_stanzas::stream::StreamError;

/// Top-level error type.
#[derive(Debug)]
pub enum Error {
    /// I/O error.
    Io(IoError),
    /// TLS error.
    Tls(tokio_rustls::rustls::Error),
    /// Error parsing a Jabber-Id.
    JidParse(JidParseError),
    /// Protocol-level error.
    Protocol(ProtocolError),
    /// Authentication error.
    Auth(AuthError),
    /// The server requires an encrypted channel but TLS was disabled by the
    /// caller.
    TlsRequiredByServer,
    /// The stream was closed by a stream-level error from the peer.
    Stream(StreamError),
    /// The peer answered a request with a stanza error.
    Stanza(StanzaError),
    /// The operation requires a connection and there is none.
    NotConnected,
    /// The operation requires an authenticated session.
    NotAuthenticated,
    /// The session has been closed and cannot be used anymore.
    Disposed,
    /// The correlated response did not arrive in time.
    Timeout,
    /// The waiter was released because the session is going away.
    Cancelled,
    /// The connection was lost while the request was in flight.
    ConnectionLost,
    /// Connection closed.
    Disconnected,
    /// The peer does not support the requested feature.
    NotSupported,
    /// A session or stream with the same identifier already exists.
    Conflict,
    /// The offer was rejected by the other side.
    NotAcceptable,
    /// An argument given to the operation is invalid.
    InvalidArgument(&'static str),
    /// Should never happen.
    InvalidState,
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(fmt, "IO error: {}", e),
            Error::Tls(e) => write!(fmt, "TLS error: {}", e),
            Error::JidParse(e) => write!(fmt, "jid parse error: {}", e),
            Error::Protocol(e) => write!(fmt, "protocol error: {}", e),
            Error::Auth(e) => write!(fmt, "authentication error: {}", e),
            Error::TlsRequiredByServer => {
                write!(fmt, "the server requires TLS but it was disabled")
            }
            Error::Stream(e) => write!(fmt, "stream error: {}", e.condition),
            Error::Stanza(e) => write!(
                fmt,
                "stanza error: {} ({})",
                e.defined_condition.name(),
                e.text().unwrap_or("no text")
            ),
            Error::NotConnected => write!(fmt, "not connected"),
            Error::NotAuthenticated => write!(fmt, "not authenticated"),
            Error::Disposed => write!(fmt, "session already disposed"),
            Error::Timeout => write!(fmt, "request timed out"),
            Error::Cancelled => write!(fmt, "request cancelled"),
            Error::ConnectionLost => write!(fmt, "connection lost"),
            Error::Disconnected => write!(fmt, "disconnected"),
            Error::NotSupported => write!(fmt, "not supported by the peer"),
            Error::Conflict => write!(fmt, "conflicting identifier"),
            Error::NotAcceptable => write!(fmt, "not acceptable"),
            Error::InvalidArgument(s) => write!(fmt, "invalid argument: {}", s),
            Error::InvalidState => write!(fmt, "invalid state"),
        }
    }
}

impl StdError for Error {}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

impl From<tokio_rustls::rustls::Error> for Error {
    fn from(e: tokio_rustls::rustls::Error) -> Self {
        Error::Tls(e)
    }
}

impl From<JidParseError> for Error {
    fn from(e: JidParseError) -> Self {
        Error::JidParse(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Error::Auth(e)
    }
}

impl From<StanzaError> for Error {
    fn from(e: StanzaError) -> Self {
        Error::Stanza(e)
    }
}

impl From<minidom::Error> for Error {
    fn from(e: minidom::Error) -> Self {
        ProtocolError::Parser(e).into()
    }
}

impl From<jabber_stanzas::Error> for Error {
    fn from(e: jabber_stanzas::Error) -> Self {
        ProtocolError::Parsers(e).into()
    }
}

/// XMPP protocol-level error.
#[derive(Debug)]
pub enum ProtocolError {
    /// XML parser error.
    Parser(minidom::Error),
    /// Error with expected stanza schema.
    Parsers(jabber_stanzas::Error),
    /// No TLS available.
    NoTls,
    /// Invalid response to resource binding.
    InvalidBindResponse,
    /// No xmlns attribute in <stream:stream>.
    NoStreamNamespace,
    /// No id attribute in <stream:stream>.
    NoStreamId,
    /// Unexpected <stream:stream> (shouldn't occur).
    InvalidStreamStart,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProtocolError::Parser(e) => write!(fmt, "XML parser error: {}", e),
            ProtocolError::Parsers(e) => write!(fmt, "error with expected stanza schema: {}", e),
            ProtocolError::NoTls => write!(fmt, "no TLS available"),
            ProtocolError::InvalidBindResponse => {
                write!(fmt, "invalid response to resource binding")
            }
            ProtocolError::NoStreamNamespace => {
                write!(fmt, "no xmlns attribute in <stream:stream>")
            }
            ProtocolError::NoStreamId => write!(fmt, "no id attribute in <stream:stream>"),
            ProtocolError::InvalidStreamStart => write!(fmt, "unexpected <stream:stream>"),
        }
    }
}

impl StdError for ProtocolError {}

impl From<minidom::Error> for ProtocolError {
    fn from(e: minidom::Error) -> Self {
        ProtocolError::Parser(e)
    }
}

impl From<jabber_stanzas::Error> for ProtocolError {
    fn from(e: jabber_stanzas::Error) -> Self {
        ProtocolError::Parsers(e)
    }
}

/// Authentication error.
#[derive(Debug)]
pub enum AuthError {
    /// No matching SASL mechanism available.
    NoMechanism,
    /// The only mechanisms left would send the password in clear text over
    /// an unencrypted channel.
    PlainOverCleartext,
    /// Local SASL implementation error.
    Sasl(SaslMechanismError),
    /// A malformed SASL challenge was received.
    InvalidChallenge,
    /// Failure from server.
    Fail(SaslDefinedCondition),
}

impl StdError for AuthError {}

impl fmt::Display for AuthError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthError::NoMechanism => write!(fmt, "no matching SASL mechanism available"),
            AuthError::PlainOverCleartext => write!(
                fmt,
                "PLAIN is only acceptable over an encrypted channel"
            ),
            AuthError::Sasl(s) => write!(fmt, "local SASL implementation error: {}", s),
            AuthError::InvalidChallenge => write!(fmt, "malformed SASL challenge"),
            AuthError::Fail(c) => write!(fmt, "failure from the server: {}", c),
        }
    }
}
