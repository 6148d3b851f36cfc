// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! TCP connection establishment and the STARTTLS upgrade.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use log::warn;
use sasl::common::ChannelBinding;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{
    ClientConfig, DigitallySignedStruct, ProtocolVersion, RootCertStore, SignatureScheme,
};
use tokio_rustls::TlsConnector;

use jabber_stanzas::starttls;

use crate::error::Error;
use crate::xmlstream::XmlStream;

/// A caller-supplied predicate over the server certificate chain, replacing
/// the default webpki validation when set.
///
/// Certificates are handed over in DER form, end-entity first.
pub trait CertificateValidator: Send + Sync {
    /// Returns whether the presented chain should be trusted.
    fn verify(&self, chain: &[Vec<u8>]) -> bool;
}

struct PredicateVerifier {
    predicate: Arc<dyn CertificateValidator>,
}

impl std::fmt::Debug for PredicateVerifier {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.write_str("PredicateVerifier")
    }
}

impl ServerCertVerifier for PredicateVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        let mut chain = Vec::with_capacity(1 + intermediates.len());
        chain.push(end_entity.as_ref().to_vec());
        for cert in intermediates {
            chain.push(cert.as_ref().to_vec());
        }
        if self.predicate.verify(&chain) {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(tokio_rustls::rustls::Error::General(
                "certificate rejected by the configured validator".to_owned(),
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

/// The byte transport under the XML stream: a plain TCP socket, or the same
/// socket upgraded to TLS.
pub enum Connection {
    /// An unencrypted connection.
    Tcp(TcpStream),
    /// A TLS-upgraded connection.
    Tls(Box<TlsStream<TcpStream>>),
}

impl Connection {
    /// Opens a plain TCP connection to the given address.
    pub async fn connect(host: &str, port: u16) -> Result<Connection, Error> {
        let stream = TcpStream::connect((host, port)).await?;
        Ok(Connection::Tcp(stream))
    }

    /// Whether the transport is encrypted.
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Connection::Tls(_))
    }

    /// The channel binding data this transport can offer to SASL.
    pub fn channel_binding(&self) -> ChannelBinding {
        match self {
            Connection::Tcp(_) => ChannelBinding::None,
            Connection::Tls(stream) => {
                let (_, connection) = stream.get_ref();
                match connection.protocol_version() {
                    Some(ProtocolVersion::TLSv1_3) => {
                        let data = vec![0u8; 32];
                        match connection.export_keying_material(
                            data,
                            b"EXPORTER-Channel-Binding",
                            None,
                        ) {
                            Ok(data) => ChannelBinding::TlsExporter(data),
                            Err(e) => {
                                warn!("cannot export keying material: {}", e);
                                ChannelBinding::None
                            }
                        }
                    }
                    _ => ChannelBinding::None,
                }
            }
        }
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            Connection::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Connection::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            Connection::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            Connection::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            Connection::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

fn tls_config(validator: Option<Arc<dyn CertificateValidator>>) -> ClientConfig {
    match validator {
        Some(predicate) => ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(PredicateVerifier { predicate }))
            .with_no_client_auth(),
        None => {
            let mut root_store = RootCertStore::empty();
            root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        }
    }
}

/// Performs `<starttls/>` on an [`XmlStream`] and returns the encrypted
/// transport. The stream must be restarted by the caller afterwards.
pub async fn starttls(
    mut stream: XmlStream<Connection>,
    validator: Option<Arc<dyn CertificateValidator>>,
) -> Result<Connection, Error> {
    let domain = stream.domain.clone();
    stream.send_stanza(starttls::Request).await?;

    let reply = stream.read_element().await?;
    if reply.is("failure", jabber_stanzas::ns::TLS) {
        return Err(Error::Protocol(crate::error::ProtocolError::NoTls));
    } else if !reply.is("proceed", jabber_stanzas::ns::TLS) {
        return Err(Error::InvalidState);
    }

    let tcp_stream = match stream.into_inner() {
        Connection::Tcp(stream) => stream,
        Connection::Tls(_) => return Err(Error::InvalidState),
    };

    let server_name = ServerName::try_from(domain)
        .map_err(|_| Error::InvalidArgument("invalid TLS server name"))?;
    let connector = TlsConnector::from(Arc::new(tls_config(validator)));
    let tls_stream = connector.connect(server_name, tcp_stream).await?;
    Ok(Connection::Tls(Box::new(tls_stream)))
}
