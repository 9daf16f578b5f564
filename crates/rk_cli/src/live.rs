//! Live server directory API.
//!
//! Every successful fetch refreshes the fallback file so later offline runs
//! see the same data.

use chrono::Utc;
use clap::Args;
use reqwest::blocking::Client;
use rk_core::data::{parse_payload_value, save_fallback, DataProvider};
use rk_core::{ForecastError, ServerRecord};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_ENDPOINT: &str = "https://rocdir.lilithgame.com/get/roles";

/// Request parameters of the directory endpoint.
#[derive(Debug, Clone, Args)]
pub struct LiveArgs {
    /// Directory endpoint URL
    #[arg(long, global = true, env = "RK_API_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    #[arg(long, global = true, env = "RK_APP_UID", default_value = "", hide_env_values = true)]
    pub app_uid: String,

    #[arg(long, global = true, env = "RK_APP_TOKEN", default_value = "", hide_env_values = true)]
    pub app_token: String,

    #[arg(long, global = true, env = "RK_APP_ID", default_value = "")]
    pub app_id: String,

    #[arg(long, global = true, env = "RK_LG_CHANNEL", default_value = "and")]
    pub lg_channel: String,

    #[arg(long, global = true, env = "RK_SDK_TYPE", default_value = "1")]
    pub sdk_type: String,

    #[arg(long, global = true, env = "RK_IP", default_value = "")]
    pub ip: String,

    #[arg(long, global = true, env = "RK_UDID", default_value = "", hide_env_values = true)]
    pub udid: String,

    #[arg(long, global = true, env = "RK_LANG", default_value = "en")]
    pub lang: String,

    #[arg(long, global = true, env = "RK_PLATFORM", default_value = "android")]
    pub platform: String,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "RK_API_TIMEOUT", default_value_t = 10)]
    pub timeout_secs: u64,
}

impl LiveArgs {
    fn query(&self) -> [(&'static str, &str); 9] {
        [
            ("app_uid", self.app_uid.as_str()),
            ("app_token", self.app_token.as_str()),
            ("app_id", self.app_id.as_str()),
            ("lg_channel", self.lg_channel.as_str()),
            ("sdk_type", self.sdk_type.as_str()),
            ("ip", self.ip.as_str()),
            ("udid", self.udid.as_str()),
            ("lang", self.lang.as_str()),
            ("platform", self.platform.as_str()),
        ]
    }
}

pub struct LiveProvider {
    args: LiveArgs,
    client: Client,
    fallback_path: PathBuf,
}

impl LiveProvider {
    pub fn new(args: LiveArgs, fallback_path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(args.timeout_secs))
            .user_agent(concat!("rk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            args,
            client,
            fallback_path: fallback_path.into(),
        })
    }

    fn request(&self) -> reqwest::Result<Value> {
        debug!(endpoint = %self.args.endpoint, "requesting server directory");
        self.client
            .get(&self.args.endpoint)
            .query(&self.args.query())
            .send()?
            .error_for_status()?
            .json::<Value>()
    }
}

impl DataProvider for LiveProvider {
    fn name(&self) -> &str {
        "live-api"
    }

    fn fetch(&self) -> rk_core::Result<Vec<ServerRecord>> {
        let payload = self.request().map_err(|e| ForecastError::Io(std::io::Error::other(e)))?;
        let records = parse_payload_value(&payload)?;

        if let Err(err) = save_fallback(&self.fallback_path, &payload, Utc::now()) {
            warn!(path = %self.fallback_path.display(), error = %err, "could not refresh fallback file");
        }
        Ok(records)
    }
}
