//! HTTP health check.

use super::error::{CheckError, CheckResult};
use super::settings::CheckSettings;
use super::{Checker, SettingHelp};
use crate::config::TargetConfig;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;

const SETTING_CODE: &str = "code";
const SETTING_EXPECT_CONTENT: &str = "expectContent";
const SETTING_HOST: &str = "host";
const SETTING_INSECURE_TLS: &str = "insecureTLS";
const SETTING_METHOD: &str = "method";
const SETTING_PATH: &str = "path";
const SETTING_PORT: &str = "port";
const SETTING_TIMEOUT: &str = "timeout";
const SETTING_TLS: &str = "tls";

const DEFAULT_CODE: i64 = 200;
const DEFAULT_METHOD: &str = "GET";
const DEFAULT_PATH: &str = "/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

const USER_AGENT: &str = concat!("natlb/", env!("CARGO_PKG_VERSION"));

/// A target is up iff an HTTP request to it yields the expected status
/// code (and, optionally, the expected response body content).
#[derive(Debug, Default)]
pub struct HttpCheck;

impl HttpCheck {
    /// Create a new HTTP check.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Checker for HttpCheck {
    async fn check(&self, settings: &CheckSettings, target: &TargetConfig) -> CheckResult<()> {
        let scheme = if settings.bool_or(SETTING_TLS, false) {
            "https"
        } else {
            "http"
        };
        let endpoint = SocketAddr::new(target.addr, settings.port_or(SETTING_PORT, target.port));
        let url = format!(
            "{scheme}://{endpoint}{}",
            settings.str_or(SETTING_PATH, DEFAULT_PATH)
        );

        let method: reqwest::Method = settings
            .str_or(SETTING_METHOD, DEFAULT_METHOD)
            .parse()
            .map_err(|_| CheckError::InvalidSetting {
                key: SETTING_METHOD.to_string(),
                message: "not a valid HTTP method".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(settings.duration_or(SETTING_TIMEOUT, DEFAULT_TIMEOUT))
            .danger_accept_invalid_certs(settings.bool_or(SETTING_INSECURE_TLS, false))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CheckError::Request(e.to_string()))?;

        let mut request = client.request(method, url);
        let host = settings.str_or(SETTING_HOST, "");
        if !host.is_empty() {
            request = request.header(reqwest::header::HOST, host);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CheckError::Request(e.to_string()))?;

        let want = settings.int_or(SETTING_CODE, DEFAULT_CODE);
        let got = i64::from(response.status().as_u16());
        if got != want {
            return Err(CheckError::UnexpectedStatus {
                got: response.status().as_u16(),
                want: u16::try_from(want).unwrap_or_default(),
            });
        }

        let expect = settings.str_or(SETTING_EXPECT_CONTENT, "");
        if expect.is_empty() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .map_err(|e| CheckError::Request(e.to_string()))?;
        if !body.contains(&expect) {
            return Err(CheckError::ContentMismatch);
        }

        Ok(())
    }

    fn help(&self) -> Vec<SettingHelp> {
        vec![
            SettingHelp {
                name: SETTING_CODE,
                default: DEFAULT_CODE.to_string(),
                description: "HTTP status code to expect from the request",
            },
            SettingHelp {
                name: SETTING_EXPECT_CONTENT,
                default: String::new(),
                description: "Content to search for in the response body",
            },
            SettingHelp {
                name: SETTING_HOST,
                default: String::new(),
                description: "Host header to send with the request",
            },
            SettingHelp {
                name: SETTING_INSECURE_TLS,
                default: "false".to_string(),
                description: "Skip TLS certificate validation",
            },
            SettingHelp {
                name: SETTING_METHOD,
                default: DEFAULT_METHOD.to_string(),
                description: "Method to use for the request",
            },
            SettingHelp {
                name: SETTING_PATH,
                default: DEFAULT_PATH.to_string(),
                description: "Path to send the request to",
            },
            SettingHelp {
                name: SETTING_PORT,
                default: "target-port".to_string(),
                description: "Port to send the request to",
            },
            SettingHelp {
                name: SETTING_TIMEOUT,
                default: humantime::format_duration(DEFAULT_TIMEOUT).to_string(),
                description: "Timeout for the request",
            },
            SettingHelp {
                name: SETTING_TLS,
                default: "false".to_string(),
                description: "Connect using TLS",
            },
        ]
    }
}
