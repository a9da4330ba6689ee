//! SMTP health check.
//!
//! Verifies the target actually speaks SMTP instead of merely accepting
//! connections: greeting, EHLO exchange and optionally STARTTLS.

use super::error::{CheckError, CheckResult};
use super::settings::CheckSettings;
use super::{Checker, SettingHelp};
use crate::config::TargetConfig;
use async_trait::async_trait;
use rustls::pki_types::ServerName;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

const SETTING_INSECURE_TLS: &str = "insecureTLS";
const SETTING_PORT: &str = "port";
const SETTING_TIMEOUT: &str = "timeout";
const SETTING_TLS: &str = "tls";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// A target is up iff it completes an SMTP greeting and EHLO exchange,
/// over STARTTLS when requested.
#[derive(Debug, Default)]
pub struct SmtpCheck;

impl SmtpCheck {
    /// Create a new SMTP check.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    async fn exchange(addr: SocketAddr, tls: bool, insecure: bool) -> CheckResult<()> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| CheckError::ConnectionFailed {
                endpoint: addr.to_string(),
                message: e.to_string(),
            })?;
        let mut stream = BufReader::new(stream);

        expect_reply(&mut stream, "220").await?;
        send_line(&mut stream, "EHLO localhost").await?;
        expect_reply(&mut stream, "250").await?;

        if tls {
            send_line(&mut stream, "STARTTLS").await?;
            expect_reply(&mut stream, "220").await?;

            let connector = TlsConnector::from(Arc::new(tls_config(insecure)));
            let server_name = ServerName::from(addr.ip());
            let tls_stream = connector
                .connect(server_name, stream.into_inner())
                .await
                .map_err(|e| CheckError::Tls(e.to_string()))?;
            let mut stream = BufReader::new(tls_stream);

            send_line(&mut stream, "EHLO localhost").await?;
            expect_reply(&mut stream, "250").await?;
            send_line(&mut stream, "QUIT").await?;
        } else {
            send_line(&mut stream, "QUIT").await?;
        }

        Ok(())
    }
}

#[async_trait]
impl Checker for SmtpCheck {
    async fn check(&self, settings: &CheckSettings, target: &TargetConfig) -> CheckResult<()> {
        let addr = SocketAddr::new(target.addr, settings.port_or(SETTING_PORT, target.port));
        let limit = settings.duration_or(SETTING_TIMEOUT, DEFAULT_TIMEOUT);
        let tls = settings.bool_or(SETTING_TLS, false);
        let insecure = settings.bool_or(SETTING_INSECURE_TLS, false);

        timeout(limit, Self::exchange(addr, tls, insecure))
            .await
            .map_err(|_| CheckError::Timeout(limit))?
    }

    fn help(&self) -> Vec<SettingHelp> {
        vec![
            SettingHelp {
                name: SETTING_INSECURE_TLS,
                default: "false".to_string(),
                description: "Skip TLS certificate validation",
            },
            SettingHelp {
                name: SETTING_PORT,
                default: "target-port".to_string(),
                description: "Port to connect to",
            },
            SettingHelp {
                name: SETTING_TIMEOUT,
                default: humantime::format_duration(DEFAULT_TIMEOUT).to_string(),
                description: "Timeout for the whole exchange",
            },
            SettingHelp {
                name: SETTING_TLS,
                default: "false".to_string(),
                description: "Upgrade the session with STARTTLS",
            },
        ]
    }
}

/// Send one command line, CRLF-terminated.
async fn send_line<S>(stream: &mut S, line: &str) -> CheckResult<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(format!("{line}\r\n").as_bytes()).await?;
    Ok(())
}

/// Read one (possibly multiline) SMTP reply and require the given code.
async fn expect_reply<S>(stream: &mut S, code: &str) -> CheckResult<()>
where
    S: AsyncBufRead + Unpin,
{
    loop {
        let mut line = String::new();
        let n = stream.read_line(&mut line).await?;
        if n == 0 {
            return Err(CheckError::UnexpectedReply {
                expected: code.to_string(),
                reply: "connection closed".to_string(),
            });
        }

        if !line.starts_with(code) {
            return Err(CheckError::UnexpectedReply {
                expected: code.to_string(),
                reply: line.trim_end().to_string(),
            });
        }

        // "250-..." continues a multiline reply, "250 ..." ends it.
        if line.as_bytes().get(3) != Some(&b'-') {
            return Ok(());
        }
    }
}

fn tls_config(insecure: bool) -> rustls::ClientConfig {
    if insecure {
        rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerify))
            .with_no_client_auth()
    } else {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    }
}

/// Certificate verifier accepting anything, for `insecureTLS`.
#[derive(Debug)]
struct NoVerify;

impl rustls::client::danger::ServerCertVerifier for NoVerify {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
