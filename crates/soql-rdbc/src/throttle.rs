//! API usage guard
//!
//! The provider reports quota usage on every response in a header of the form
//! `api-usage=<used>/<total>`. Requests stop once usage reaches the total,
//! before the provider starts rejecting them.

use tracing::warn;

use crate::error::{Error, Result};

/// Response header carrying the usage counters
pub const HEADER: &str = "Sforce-Limit-Info";

/// Used/total request counters parsed from one response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Requests used so far
    pub used: u64,
    /// Requests allowed
    pub total: u64,
}

impl RateLimit {
    /// Parse a `label=<used>/<total>` header line
    ///
    /// Only the first `;`-separated entry counts. Each side of the `/` may
    /// carry its own `label=` prefix (`used=100/total=100`), and anything
    /// after a counter's digits is ignored (`250(appName=x)`).
    pub fn parse(line: &str) -> Result<Self> {
        let entry = line.split(';').next().unwrap_or_default();
        let (_, statistic) = entry
            .trim()
            .split_once('=')
            .ok_or_else(|| malformed(line))?;
        let (used, total) = statistic.split_once('/').ok_or_else(|| malformed(line))?;

        Ok(Self {
            used: counter(used).ok_or_else(|| malformed(line))?,
            total: counter(total).ok_or_else(|| malformed(line))?,
        })
    }

    /// Fail once usage has reached the total
    pub fn check(self) -> Result<Self> {
        if self.used >= self.total {
            warn!(used = self.used, total = self.total, "API request quota reached");
            return Err(Error::Throttled {
                used: self.used,
                total: self.total,
            });
        }
        Ok(self)
    }

    /// Remaining requests before the guard trips
    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.used)
    }
}

/// Parse and check a header line in one step
pub fn guard(line: &str) -> Result<RateLimit> {
    RateLimit::parse(line)?.check()
}

fn counter(part: &str) -> Option<u64> {
    let part = part.trim();
    let value = if part.starts_with(|c: char| c.is_ascii_digit()) {
        part
    } else {
        part.split_once('=')?.1.trim_start()
    };
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

fn malformed(line: &str) -> Error {
    Error::decode(format!("malformed {HEADER} header: {line:?}"))
}
