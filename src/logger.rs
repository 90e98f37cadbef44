use std::time::Duration;

use reqwest::blocking::Client;
use slog::{Drain, Level, OwnedKVList, Record};
use url::Url;

use crate::error::Error;
use crate::format::{Formatter, JsonFormatter};
use crate::shipper::{Shipper, DEFAULT_RETRY_DELAY};

const DEFAULT_MIN_LEVEL: Level = Level::Info;
const DEFAULT_BASE_URL: &str = "http://http-intake.logs.datadoghq.eu";
const DEFAULT_BASE_PATH: &str = "/v1/input";
// The fixed `ddsource` tag identifying where these logs come from.
const SOURCE_TAG: &str = "rust";

const ALL_LEVELS: [Level; 6] = [
    Level::Critical,
    Level::Error,
    Level::Warning,
    Level::Info,
    Level::Debug,
    Level::Trace,
];

/// A drain that delivers every log record to the Datadog HTTP log intake API, one POST
/// request per record, serialized by the configured [`Formatter`].
///
/// Delivery is synchronous and blocking, including the retry pauses of the delivery engine;
/// use [`slog_async::Async`](https://docs.rs/slog-async) around this drain to decouple call
/// sites from intake latency. An instance never changes after construction, so it can be
/// shared freely between threads; concurrent deliveries keep their retry state on their own
/// stack.
///
/// Use the [`Builder`] to construct it and then use it as an slog drain.
pub struct Logger {
    min_level: Level,
    formatter: Box<dyn Formatter>,
    shipper: Shipper,
}

/// Builds the Datadog logger.
///
/// Every option except the API key has a default, and leaving an option untouched is
/// distinguishable from setting it to any value, including the defaults themselves.
#[derive(Default)]
pub struct Builder {
    api_key: String,
    min_level: Option<Level>,
    base_url: Option<String>,
    base_path: Option<String>,
    service: Option<String>,
    host: Option<String>,
    retry_delay: Option<Duration>,
    http_client: Option<Client>,
    formatter: Option<Box<dyn Formatter>>,
}

impl Builder {
    /// Creates the builder taking the API key used to authenticate against the intake API.
    pub fn new(api_key: &str) -> Builder {
        Builder {
            api_key: api_key.to_string(),
            ..Default::default()
        }
    }

    /// Sets the least severe level that will still be shipped. Defaults to `Info`.
    pub fn min_level(self, level: Level) -> Builder {
        Builder {
            min_level: Some(level),
            ..self
        }
    }

    /// Sets the root of the intake endpoint. Defaults to the EU intake host
    /// `http://http-intake.logs.datadoghq.eu`.
    pub fn base_url(self, url: impl Into<String>) -> Builder {
        Builder {
            base_url: Some(url.into()),
            ..self
        }
    }

    /// Sets the path of the intake endpoint. Defaults to `/v1/input`.
    pub fn base_path(self, path: impl Into<String>) -> Builder {
        Builder {
            base_path: Some(path.into()),
            ..self
        }
    }

    /// Sets the value of the `service` tag noted down on every shipped record.
    pub fn service(self, service: impl Into<String>) -> Builder {
        Builder {
            service: Some(service.into()),
            ..self
        }
    }

    /// Sets the value of the `host` tag noted down on every shipped record.
    pub fn host(self, host: impl Into<String>) -> Builder {
        Builder {
            host: Some(host.into()),
            ..self
        }
    }

    /// Sets the pause between delivery retries. Defaults to 1 second.
    pub fn retry_delay(self, delay: Duration) -> Builder {
        Builder {
            retry_delay: Some(delay),
            ..self
        }
    }

    /// Sets the HTTP client used for deliveries, for callers that need their own timeout or
    /// transport configuration. Each logger otherwise builds a client of its own.
    pub fn http_client(self, client: Client) -> Builder {
        Builder {
            http_client: Some(client),
            ..self
        }
    }

    /// Sets the formatter that turns records into payload bytes. Defaults to
    /// [`JsonFormatter`].
    pub fn formatter(self, formatter: impl Formatter + 'static) -> Builder {
        Builder {
            formatter: Some(Box::new(formatter)),
            ..self
        }
    }

    /// Consumes the builder, returning the Datadog logger.
    ///
    /// Fails with [`Error::MissingApiKey`] when no key was given and with
    /// [`Error::InvalidEndpoint`] when base URL and base path do not combine into a valid
    /// URL.
    pub fn build(self) -> Result<Logger, Error> {
        if self.api_key.is_empty() {
            return Err(Error::MissingApiKey);
        }

        let base_url = self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_path = self.base_path.unwrap_or_else(|| DEFAULT_BASE_PATH.to_string());
        let service = self.service.unwrap_or_default();
        let host = self.host.unwrap_or_default();
        let endpoint = build_url(&base_url, &base_path, &service, &host)?;

        Ok(Logger {
            min_level: self.min_level.unwrap_or(DEFAULT_MIN_LEVEL),
            formatter: self
                .formatter
                .unwrap_or_else(|| Box::new(JsonFormatter::new())),
            shipper: Shipper::new(
                self.http_client.unwrap_or_else(Client::new),
                endpoint,
                self.api_key,
                self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY),
            ),
        })
    }
}

fn build_url(base_url: &str, base_path: &str, service: &str, host: &str) -> Result<Url, Error> {
    let endpoint = format!("{}{}", base_url, base_path);
    let mut url = match Url::parse(&endpoint) {
        Ok(url) => url,
        Err(source) => return Err(Error::InvalidEndpoint { endpoint, source }),
    };

    url.query_pairs_mut()
        .append_pair("service", service)
        .append_pair("ddsource", SOURCE_TAG)
        .append_pair("host", host);

    Ok(url)
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("min_level", &self.min_level)
            .field("endpoint", self.shipper.endpoint())
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// The severities this drain accepts, ordered from most severe down to and including the
    /// configured minimum. Purely declarative; `log` itself does not filter.
    pub fn levels(&self) -> Vec<Level> {
        ALL_LEVELS
            .iter()
            .copied()
            .filter(|level| level.is_at_least(self.min_level))
            .collect()
    }

    /// The configured severity floor.
    pub fn min_level(&self) -> Level {
        self.min_level
    }

    /// The fully parameterized intake URL every record is POSTed to.
    pub fn endpoint(&self) -> &Url {
        self.shipper.endpoint()
    }
}

impl Drain for Logger {
    type Ok = ();
    type Err = Error;

    fn log(&self, record: &Record, values: &OwnedKVList) -> Result<Self::Ok, Self::Err> {
        let payload = self.formatter.format(record, values)?;
        self.shipper.ship(&payload)
    }

    fn is_enabled(&self, level: Level) -> bool {
        level.is_at_least(self.min_level)
    }
}
