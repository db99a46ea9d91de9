use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::report::domain::report::Report;
use crate::report::domain::report_sink::ReportSink;
use crate::shared::constants::TELEGRAM_API_BASE;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Posts the report text to a chat through the Telegram Bot API
/// `sendMessage` method.
///
/// The bot token is part of the request URL, so transport errors are
/// stripped of their URL before being returned.
pub struct TelegramReportSink {
    client: reqwest::blocking::Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramReportSink {
    pub fn new(token: &str, chat_id: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_base: TELEGRAM_API_BASE.to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }

    /// Points the sink at a different Bot API server.
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

impl ReportSink for TelegramReportSink {
    fn name(&self) -> &str {
        "telegram"
    }

    fn deliver(&self, report: &Report) -> Result<(), Box<dyn std::error::Error>> {
        let text = report.message();
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: &text,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .map_err(|e| e.without_url())?;
        let status = response.status();
        let api: ApiResponse = response.json().map_err(|e| e.without_url())?;

        if !api.ok {
            return Err(format!(
                "Telegram rejected the message ({status}): {}",
                api.description.unwrap_or_default()
            )
            .into());
        }
        log::debug!("Report delivered to Telegram chat {}", self.chat_id);
        Ok(())
    }
}
