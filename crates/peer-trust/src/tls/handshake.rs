//! The certificate chain rustls passes to a server certificate verifier.

use rustls_pki_types::{CertificateDer, ServerName};

use crate::cert::Certificate;
use crate::error::{Result, TrustError};
use crate::handshake::PeerHandshake;

/// Peer chain as presented during a rustls handshake: the end-entity
/// certificate followed by the intermediates, in the order the server sent
/// them.
#[derive(Debug)]
pub struct PresentedChain<'a> {
    end_entity: &'a CertificateDer<'a>,
    intermediates: &'a [CertificateDer<'a>],
    hostname: Option<&'a str>,
}

impl<'a> PresentedChain<'a> {
    pub fn new(
        end_entity: &'a CertificateDer<'a>,
        intermediates: &'a [CertificateDer<'a>],
        server_name: &'a ServerName<'a>,
    ) -> Self {
        let hostname = match server_name {
            ServerName::DnsName(name) => Some(name.as_ref()),
            _ => None,
        };

        Self {
            end_entity,
            intermediates,
            hostname,
        }
    }
}

impl PeerHandshake for PresentedChain<'_> {
    fn check(&self) -> Result<()> {
        // rustls only calls a verifier once the server sent a Certificate
        // message, so the leaf slot is always filled.
        if self.end_entity.is_empty() {
            return Err(TrustError::InvalidHandshake(
                "end-entity certificate is empty".to_owned(),
            ));
        }
        Ok(())
    }

    fn peer_cert(&self, index: usize) -> Option<Certificate> {
        let der = match index {
            0 => self.end_entity,
            n => self.intermediates.get(n - 1)?,
        };
        Some(Certificate::from_der(der.as_ref().to_vec()))
    }

    fn hostname(&self) -> Option<&str> {
        self.hostname
    }
}
