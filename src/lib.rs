//! This crate implements a [slog](https://crates.io/crates/slog) drain that ships JSON formatted
//! logs to the [Datadog](https://www.datadoghq.com) HTTP log intake API.
//!
//! Log records at or above the configured level are serialized to a single JSON object and
//! delivered one POST request per record, authenticated with the `DD-API-KEY` header. The
//! payload looks like this:
//!
//! ```json
//!  {
//!     "timestamp": ${timeRFC3339},
//!     "status": ${levelLowercase},
//!     "message": ${message},
//!     ... // logged field 1
//!     ... // logged field 2
//!     ...
//!  }
//! ```
//!
//! Example usage:
//!
//! ```no_run
//!  use slog::*;
//!  use slog_datadog::logger::Builder;
//!
//!  let datadog_drain = Builder::new("my-api-key")
//!    .service("my-app")
//!    .host("my-host.example.com")
//!    .build()
//!    .unwrap();
//!
//!  let drain = slog_async::Async::new(datadog_drain.fuse()).build().fuse();
//!
//!  let log = Logger::root(drain, o!());
//!  info!(log, "Ship me to {}!", "Datadog"; "request_id" => 42);
//! ```
//!
//! # Delivery semantics
//!
//! Delivery is synchronous: the drain does not return until the record is accepted by the
//! intake API or delivery terminally fails. A non-2xx response is retried up to 3 times with
//! a 1 second pause between attempts; a transport failure (DNS, connection refused) is
//! returned immediately without retrying. Payloads larger than 256 KiB are cut off at the
//! byte limit, which can leave the trailing JSON unterminated.
//!
//! Wrap the drain in [`slog_async::Async`](https://docs.rs/slog-async) as shown above to keep
//! delivery latency and retry pauses off the logging call sites.

/// Error types returned by the builder and the drain
pub mod error;

/// The [`Formatter`](format::Formatter) capability and the default JSON formatter
pub mod format;

/// The [`slog::Drain`](https://docs.rs/slog/latest/slog/trait.Drain.html) implementation and its [`Builder`](logger::Builder)
pub mod logger;

mod shipper;
