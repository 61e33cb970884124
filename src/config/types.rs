use serde::Deserializer;
use serde::de::{Error, Unexpected, Visitor};
use std::{fmt, time::Duration};

// -------------------------------------------------------------------------------------------------
// ---- LogLevel -----------------------------------------------------------------------------------

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

// -------------------------------------------------------------------------------------------------
// ---- Durations ----------------------------------------------------------------------------------

/// Accepts `"250ms"`, `"1m 30s"` (humantime) or bare integer milliseconds.
pub fn de_duration<'de, D>(d: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    d.deserialize_any(DurationVisitor)
}

pub fn de_opt_duration<'de, D>(d: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    d.deserialize_option(OptDurationVisitor)
}

struct DurationVisitor;
struct OptDurationVisitor;

impl<'de> Visitor<'de> for DurationVisitor {
    type Value = Duration;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a duration like \"1s\" or integer milliseconds")
    }

    fn visit_u64<E: Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Duration::from_millis(v))
    }

    fn visit_i64<E: Error>(self, v: i64) -> Result<Self::Value, E> {
        let ms = u64::try_from(v).map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))?;
        Ok(Duration::from_millis(ms))
    }

    fn visit_str<E: Error>(self, v: &str) -> Result<Self::Value, E> {
        humantime::parse_duration(v).map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
    }
}

impl<'de> Visitor<'de> for OptDurationVisitor {
    type Value = Option<Duration>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an optional duration like \"1s\" or integer milliseconds")
    }

    fn visit_none<E: Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D2>(self, d2: D2) -> Result<Self::Value, D2::Error>
    where
        D2: Deserializer<'de>,
    {
        d2.deserialize_any(DurationVisitor).map(Some)
    }
}

// -------------------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------
