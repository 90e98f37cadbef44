use std::cell::RefCell;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use core::fmt::Write;
use serde_json::{Map, Value};
use slog::{Key, Level, OwnedKVList, Record, KV};

use crate::error::Error;

/// Turns a log record into the payload bytes delivered to the intake API.
///
/// The drain ships whatever this returns verbatim, so implementations decide the wire
/// representation. [`JsonFormatter`] is the default; anything satisfying this trait can be
/// plugged in through [`Builder::formatter`](crate::logger::Builder::formatter).
pub trait Formatter: Send + Sync {
    fn format(&self, record: &Record, values: &OwnedKVList) -> Result<Vec<u8>, Error>;
}

/// Renders a record as a single flat JSON object using the reserved Datadog attributes
/// `timestamp`, `status` and `message`, with all key/value pairs from the log statement and
/// the logger context merged in alongside them.
///
/// Reserved attribute names win when a logged field uses the same key.
#[derive(Default, Debug)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> JsonFormatter {
        JsonFormatter
    }
}

// The `status` values the Datadog log pipeline maps onto its own severities.
fn status_str(level: Level) -> &'static str {
    match level {
        Level::Critical => "critical",
        Level::Error => "error",
        Level::Warning => "warn",
        Level::Info => "info",
        Level::Debug => "debug",
        Level::Trace => "trace",
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, record: &Record, values: &OwnedKVList) -> Result<Vec<u8>, Error> {
        let ser = &mut Serializer::new();
        record.kv().serialize(record, ser)?;
        values.serialize(record, ser)?;

        let now: DateTime<Utc> = Utc::now();
        let mut fields = ser.done();
        fields.insert(
            "timestamp".to_string(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        );
        fields.insert(
            "status".to_string(),
            Value::String(status_str(record.level()).to_string()),
        );
        fields.insert(
            "message".to_string(),
            Value::String(format!("{}", record.msg())),
        );

        Ok(Value::Object(fields).to_string().into_bytes())
    }
}

// Collects the slog key/value pairs of one record into a JSON object.
struct Serializer {
    fields: Map<String, Value>,
}

impl Serializer {
    fn new() -> Serializer {
        Serializer { fields: Map::new() }
    }

    fn emit_val(&mut self, key: Key, val: Value) -> slog::Result {
        self.fields.insert(key.to_string(), val);
        Ok(())
    }

    fn emit_serde_json_number<V>(&mut self, key: Key, value: V) -> slog::Result
    where
        serde_json::Number: From<V>,
    {
        self.emit_val(key, Value::Number(serde_json::Number::from(value)))
    }

    fn done(&mut self) -> Map<String, Value> {
        std::mem::take(&mut self.fields)
    }
}

// used by Serializer
thread_local! {
    static THREAD_LOCAL_BUF: RefCell<String> = RefCell::new(String::with_capacity(256))
}

impl slog::Serializer for Serializer {
    fn emit_bool(&mut self, key: Key, val: bool) -> slog::Result {
        self.emit_val(key, Value::Bool(val))
    }

    fn emit_unit(&mut self, key: Key) -> slog::Result {
        self.emit_val(key, Value::Null)
    }

    fn emit_str(&mut self, key: Key, val: &str) -> slog::Result {
        self.emit_val(key, Value::String(val.to_string()))
    }

    fn emit_char(&mut self, key: Key, val: char) -> slog::Result {
        self.emit_val(key, Value::String(val.to_string()))
    }

    fn emit_none(&mut self, key: Key) -> slog::Result {
        self.emit_val(key, Value::Null)
    }

    fn emit_u8(&mut self, key: Key, val: u8) -> slog::Result {
        self.emit_serde_json_number::<u8>(key, val)
    }

    fn emit_i8(&mut self, key: Key, val: i8) -> slog::Result {
        self.emit_serde_json_number::<i8>(key, val)
    }

    fn emit_u16(&mut self, key: Key, val: u16) -> slog::Result {
        self.emit_serde_json_number::<u16>(key, val)
    }

    fn emit_i16(&mut self, key: Key, val: i16) -> slog::Result {
        self.emit_serde_json_number::<i16>(key, val)
    }

    fn emit_usize(&mut self, key: Key, val: usize) -> slog::Result {
        self.emit_serde_json_number::<usize>(key, val)
    }

    fn emit_isize(&mut self, key: Key, val: isize) -> slog::Result {
        self.emit_serde_json_number::<isize>(key, val)
    }

    fn emit_u32(&mut self, key: Key, val: u32) -> slog::Result {
        self.emit_serde_json_number::<u32>(key, val)
    }

    fn emit_i32(&mut self, key: Key, val: i32) -> slog::Result {
        self.emit_serde_json_number::<i32>(key, val)
    }

    fn emit_f32(&mut self, key: Key, val: f32) -> slog::Result {
        self.emit_f64(key, f64::from(val))
    }

    fn emit_u64(&mut self, key: Key, val: u64) -> slog::Result {
        self.emit_serde_json_number::<u64>(key, val)
    }

    fn emit_i64(&mut self, key: Key, val: i64) -> slog::Result {
        self.emit_serde_json_number::<i64>(key, val)
    }

    fn emit_f64(&mut self, key: Key, val: f64) -> slog::Result {
        // NaN and infinities have no JSON representation
        match serde_json::Number::from_f64(val) {
            Some(num) => self.emit_val(key, Value::Number(num)),
            None => self.emit_val(key, Value::Null),
        }
    }

    fn emit_arguments(&mut self, key: Key, val: &fmt::Arguments) -> slog::Result {
        THREAD_LOCAL_BUF.with(|buf| {
            let mut buf = buf.borrow_mut();
            buf.write_fmt(*val)?;
            let res = self.emit_val(key, Value::String(buf.clone()));
            buf.clear();
            res
        })
    }
}
