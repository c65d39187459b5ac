//! Reader for the systemd-flavoured `.service` / `.timer` job definitions.
//!
//! Only a small subset is understood: `[Unit] Description=` carries the
//! prompt, `[Timer]` carries `OnUnitActiveSec=`, `OnCalendar=` and
//! `RandomizedDelaySec=`. Sections and keys are case-insensitive; lines
//! starting with `#` or `;` are comments.

use super::types::{DailyClock, TimerSpec};
use crate::error::UnitFileError;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

type Sections = HashMap<String, HashMap<String, String>>;

pub fn read_service_prompt(path: &Path) -> Result<String, UnitFileError> {
    let sections = parse_ini(&std::fs::read_to_string(path)?)?;
    parse_service_prompt(&sections)
}

pub fn read_timer_spec(path: &Path) -> Result<TimerSpec, UnitFileError> {
    let sections = parse_ini(&std::fs::read_to_string(path)?)?;
    parse_timer_spec(&sections)
}

fn parse_service_prompt(sections: &Sections) -> Result<String, UnitFileError> {
    let prompt = sections
        .get("unit")
        .and_then(|unit| unit.get("description"))
        .map(|v| v.trim())
        .unwrap_or_default();
    if prompt.is_empty() {
        return Err(UnitFileError::MissingDescription);
    }
    Ok(prompt.to_string())
}

fn parse_timer_spec(sections: &Sections) -> Result<TimerSpec, UnitFileError> {
    let timer = sections
        .get("timer")
        .ok_or(UnitFileError::MissingSection("Timer"))?;
    let value = |key: &str| timer.get(key).map_or("", |v| v.trim());

    let mut spec = TimerSpec::default();

    let interval = value("onunitactivesec");
    if !interval.is_empty() {
        spec.interval = Some(parse_duration(interval).map_err(UnitFileError::Duration)?);
    }

    let calendar = value("oncalendar");
    if !calendar.is_empty() {
        spec.daily_clock = Some(parse_daily_clock(calendar).map_err(UnitFileError::Clock)?);
    }

    let jitter = value("randomizeddelaysec");
    if !jitter.is_empty() {
        spec.jitter_secs = jitter
            .parse::<i64>()
            .ok()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| UnitFileError::Jitter(jitter.to_string()))?;
    }

    if !spec.has_schedule() {
        return Err(UnitFileError::MissingSchedule);
    }
    Ok(spec)
}

fn parse_ini(text: &str) -> Result<Sections, UnitFileError> {
    let mut sections = Sections::new();
    let mut current: Option<String> = None;

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_lowercase();
            if name.is_empty() {
                return Err(UnitFileError::EmptySection(index + 1));
            }
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }

        let (Some(section), Some((key, value))) = (current.as_ref(), line.split_once('=')) else {
            continue;
        };
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        sections
            .entry(section.clone())
            .or_default()
            .insert(key, value.trim().to_string());
    }

    Ok(sections)
}

/// Plain positive seconds (`300`) or unit expressions such as `1h30m`,
/// `1.5h`, `250ms`. Units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty".into());
    }

    if let Ok(secs) = raw.parse::<i64>() {
        return u64::try_from(secs)
            .ok()
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| "must be > 0".to_string());
    }

    let (negative, body) = match raw.as_bytes()[0] {
        b'-' => (true, &raw[1..]),
        b'+' => (false, &raw[1..]),
        _ => (false, raw),
    };
    if body == "0" {
        return Err("must be > 0".into());
    }
    if body.is_empty() {
        return Err(format!("invalid duration {raw:?}"));
    }

    let mut total_nanos: u128 = 0;
    let mut rest = body;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {raw:?}"))?;
        let (number, tail) = rest.split_at(number_len);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let scale = unit_nanos(unit)
            .ok_or_else(|| format!("unknown unit {unit:?} in duration {raw:?}"))?;
        total_nanos = component_nanos(number, scale)
            .and_then(|nanos| total_nanos.checked_add(nanos))
            .ok_or_else(|| format!("invalid duration {raw:?}"))?;
        rest = tail;
    }

    if negative || total_nanos == 0 {
        return Err("must be > 0".into());
    }
    let secs = u64::try_from(total_nanos / 1_000_000_000)
        .map_err(|_| format!("invalid duration {raw:?}"))?;
    #[allow(clippy::cast_possible_truncation)]
    let nanos = (total_nanos % 1_000_000_000) as u32;
    Ok(Duration::new(secs, nanos))
}

fn unit_nanos(unit: &str) -> Option<u128> {
    Some(match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 3_600 * 1_000_000_000,
        _ => return None,
    })
}

/// `number` is `digits[.digits]`; at least one side must carry digits.
fn component_nanos(number: &str, scale: u128) -> Option<u128> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.contains('.') {
        return None;
    }

    let whole_value = if whole.is_empty() {
        0
    } else {
        whole.parse::<u128>().ok()?
    };
    let mut nanos = whole_value.checked_mul(scale)?;

    let mut divisor: u128 = 1;
    let mut fraction_value: u128 = 0;
    for digit in fraction.chars() {
        if divisor > 1_000_000_000_000_000_000 {
            break;
        }
        fraction_value = fraction_value * 10 + u128::from(digit.to_digit(10)?);
        divisor *= 10;
    }
    nanos = nanos.checked_add(fraction_value * scale / divisor)?;
    Some(nanos)
}

/// `HH:MM[:SS]`, optionally preceded by one wildcard date token such as
/// `*-*-*`.
pub fn parse_daily_clock(raw: &str) -> Result<DailyClock, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty".into());
    }

    let parts: Vec<&str> = raw.split_whitespace().collect();
    let clock_text = match parts.as_slice() {
        [date, clock] if date.contains('*') => *clock,
        [clock] => *clock,
        _ => raw,
    };

    let fields: Vec<&str> = clock_text.split(':').collect();
    if fields.len() != 2 && fields.len() != 3 {
        return Err(format!("unsupported format {raw:?}"));
    }

    let field = |index: usize, label: &str, max: u32| {
        fields[index]
            .parse::<i64>()
            .ok()
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n <= max)
            .ok_or_else(|| format!("invalid {label} {:?}", fields[index]))
    };

    Ok(DailyClock {
        hour: field(0, "hour", 23)?,
        minute: field(1, "minute", 59)?,
        second: if fields.len() == 3 {
            field(2, "second", 59)?
        } else {
            0
        },
    })
}
