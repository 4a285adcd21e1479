use alloy::primitives::Address;
use anyhow::{anyhow, bail, Context};

use std::time::Duration;

use url::Url;

/// Parse a string URL & returns it as [Url].
pub fn parse_url(s: &str) -> Result<Url, url::ParseError> {
    s.parse()
}

/// Parses a string duration & return it as [Duration].
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    let split_index = s.find(|c: char| !c.is_ascii_digit()).ok_or_else(|| anyhow!("Invalid duration format: {}", s))?;

    let (value_str, suffix) = s.split_at(split_index);
    let value: u64 = value_str.parse().map_err(|_| anyhow!("Invalid duration value: {}", value_str))?;

    let seconds = |unit: u64| {
        value.checked_mul(unit).map(Duration::from_secs).ok_or_else(|| anyhow!("Duration is too large: {}", s))
    };
    match suffix.trim() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "min" => seconds(60),
        "h" => seconds(60 * 60),
        _ => bail!("Invalid duration suffix: {}. Expected 'ms', 's', 'min' or 'h'.", suffix),
    }
}

/// Parses a hex encoded EVM address. The checksum is not enforced.
pub fn parse_address(s: &str) -> anyhow::Result<Address> {
    s.trim().parse::<Address>().with_context(|| format!("Invalid address format: {s}"))
}
