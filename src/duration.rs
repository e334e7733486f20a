//! Duration parsing for TTLs and timeouts like "15d", "360h", "30m" or "45".

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer};

/// Parse a duration string like "15d", "360h", "30m", "60s" or "3600".
///
/// Supported units:
/// - `d` - days (24 hours)
/// - `h` - hours
/// - `m` - minutes
/// - `s` - seconds
///
/// A bare integer is read as seconds, matching what Vault accepts for
/// `VAULT_WRAP_TTL` and `VAULT_CLIENT_TIMEOUT`. The input is
/// case-insensitive and whitespace is trimmed.
///
/// # Examples
///
/// ```
/// use destruct::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("15d").unwrap(), Duration::from_secs(15 * 24 * 60 * 60));
/// assert_eq!(parse_duration("360h").unwrap(), Duration::from_secs(360 * 60 * 60));
/// assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(30 * 60));
/// assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        anyhow::bail!("Duration is empty");
    }

    let (num, multiplier) = match s.char_indices().last() {
        Some((idx, 'd')) => (&s[..idx], 24 * 60 * 60),
        Some((idx, 'h')) => (&s[..idx], 60 * 60),
        Some((idx, 'm')) => (&s[..idx], 60),
        Some((idx, 's')) => (&s[..idx], 1),
        Some((_, c)) if c.is_ascii_digit() => (s.as_str(), 1),
        _ => anyhow::bail!("Duration must end with d, h, m, s or be a number of seconds"),
    };

    let num: u64 = num
        .parse()
        .with_context(|| format!("Invalid number in duration {s:?}"))?;
    let secs = num
        .checked_mul(multiplier)
        .context("Duration is too large")?;

    Ok(Duration::from_secs(secs))
}

/// Format a duration using the largest unit that divides it evenly.
///
/// ```
/// use destruct::duration::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(360 * 60 * 60)), "15d");
/// assert_eq!(format_duration(Duration::from_secs(2 * 60 * 60)), "2h");
/// assert_eq!(format_duration(Duration::from_secs(90)), "90s");
/// ```
pub fn format_duration(d: Duration) -> String {
    const SECS_PER_DAY: u64 = 24 * 60 * 60;
    const SECS_PER_HOUR: u64 = 60 * 60;
    const SECS_PER_MINUTE: u64 = 60;

    let secs = d.as_secs();
    if secs >= SECS_PER_DAY && secs % SECS_PER_DAY == 0 {
        format!("{}d", secs / SECS_PER_DAY)
    } else if secs >= SECS_PER_HOUR && secs % SECS_PER_HOUR == 0 {
        format!("{}h", secs / SECS_PER_HOUR)
    } else if secs >= SECS_PER_MINUTE && secs % SECS_PER_MINUTE == 0 {
        format!("{}m", secs / SECS_PER_MINUTE)
    } else {
        format!("{secs}s")
    }
}

/// Serde deserializer for optional duration strings in the config file.
///
/// Use with `#[serde(default, deserialize_with = "deserialize_duration_opt")]`.
pub fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        Some(s) => parse_duration(&s).map(Some).map_err(de::Error::custom),
        None => Ok(None),
    }
}
