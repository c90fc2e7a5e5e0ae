use std::time::Duration;

use time::{format_description::BorrowedFormatItem, macros::format_description, Date};
use tracing::{info, warn};

use crate::config::{self, Config};
use crate::error::{Error, Result};

static URL_YEAR_FMT: &[BorrowedFormatItem] = format_description!("[year repr:last_two]");
static URL_DAY_FMT: &[BorrowedFormatItem] = format_description!("[day]");
static MONTH_ABBR_FMT: &[BorrowedFormatItem] = format_description!("[month repr:short]");

/// Builds the daily file URL, e.g. `{base_url}d24set19.xls` for 2024-09-19.
pub fn build_url(base_url: &str, date: Date) -> Result<String> {
    let month_abbr = format_part(date, MONTH_ABBR_FMT)?;
    let month_abbr_pt = portuguese_month(&month_abbr)?;
    Ok(format!(
        "{base_url}d{}{month_abbr_pt}{}.xls",
        format_part(date, URL_YEAR_FMT)?,
        format_part(date, URL_DAY_FMT)?
    ))
}

/// Portuguese file-name abbreviation for an English month abbreviation such as `Sep`.
pub fn portuguese_month(english_abbr: &str) -> Result<&'static str> {
    let key = english_abbr.to_uppercase();
    config::month_pt_br(&key)
        .ok_or_else(|| Error::Configuration(format!("month '{key}' not found in the mapping")))
}

fn format_part(date: Date, fmt: &[BorrowedFormatItem<'_>]) -> Result<String> {
    date.format(fmt)
        .map_err(|e| Error::Configuration(format!("cannot format {date}: {e}")))
}

/// Something able to GET a URL. HTTP error statuses must come back as errors.
pub trait Transport {
    fn get(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let fetch_error = |e: reqwest::Error| Error::TransientFetch {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(fetch_error)?;
        Ok(response.bytes().map_err(fetch_error)?.to_vec())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: config::MAX_RETRIES,
            delay: config::RETRY_DELAY,
        }
    }
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: config.retry_delay,
        }
    }
}

/// Downloads `url`, trying at most `policy.max_retries` times and calling `sleep` between
/// attempts. Returns `None` when every attempt failed; callers skip the day.
pub fn download_file<T, S>(
    transport: &T,
    url: &str,
    policy: RetryPolicy,
    mut sleep: S,
) -> Option<Vec<u8>>
where
    T: Transport + ?Sized,
    S: FnMut(Duration),
{
    for attempt in 1..=policy.max_retries {
        info!(url, attempt, max = policy.max_retries, "downloading");
        match transport.get(url) {
            Ok(bytes) => {
                info!(url, bytes = bytes.len(), "downloaded");
                return Some(bytes);
            }
            Err(e) => {
                warn!(url, attempt, "download failed: {e}");
                if attempt < policy.max_retries {
                    sleep(policy.delay);
                }
            }
        }
    }
    warn!(url, attempts = policy.max_retries, "giving up");
    None
}
