use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::error::Error;

const API_KEY_HEADER: &str = "DD-API-KEY";
const CONTENT_TYPE_JSON: &str = "application/json";
// Maximum content size for a single log: 256kb
pub(crate) const MAX_ENTRY_BYTES: usize = 256 * 1024;
const MAX_RETRY: u32 = 3;

pub(crate) const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Delivers one serialized log entry per call to the intake endpoint.
///
/// A non-2xx response is retried up to [`MAX_RETRY`] times, pausing `retry_delay` between
/// attempts and rebuilding the request each time. Transport failures are not retried: a
/// request that cannot be made at all fails right away, only rejected responses get another
/// chance. Entries above [`MAX_ENTRY_BYTES`] are cut off at the limit before the first
/// attempt, which can leave the trailing JSON unterminated.
pub(crate) struct Shipper {
    client: Client,
    endpoint: Url,
    api_key: String,
    retry_delay: Duration,
}

impl Shipper {
    pub(crate) fn new(client: Client, endpoint: Url, api_key: String, retry_delay: Duration) -> Shipper {
        Shipper {
            client,
            endpoint,
            api_key,
            retry_delay,
        }
    }

    pub(crate) fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub(crate) fn ship(&self, payload: &[u8]) -> Result<(), Error> {
        let payload = &payload[..payload.len().min(MAX_ENTRY_BYTES)];

        let mut retries = 0;
        loop {
            let response = self
                .client
                .post(self.endpoint.clone())
                .header(API_KEY_HEADER, self.api_key.as_str())
                .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
                .body(payload.to_vec())
                .send()?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }
            if retries >= MAX_RETRY {
                let body = match response.bytes() {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
                    Err(e) => format!("could not read body of HTTP error response: {e}"),
                };
                return Err(Error::Rejected { status, body });
            }
            // consume the body so the connection goes back to the pool
            let _ = response.bytes();

            retries += 1;
            thread::sleep(self.retry_delay);
        }
    }
}
