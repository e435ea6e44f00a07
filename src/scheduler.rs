//! Five-field cron schedules ("min hour dom month dow") used to trigger
//! backup cycles. Supported tokens per field: `*`, `*/N` steps, `A-B` ranges,
//! and `A,B,C` lists.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

impl std::fmt::Display for CronExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    min: u32,
    max: u32,
    allowed: Vec<bool>,
}

impl Field {
    fn new(min: u32, max: u32) -> Self {
        let size = (max - min + 1) as usize;
        Self {
            min,
            max,
            allowed: vec![false; size],
        }
    }

    fn set(&mut self, value: u32) -> Result<()> {
        if value < self.min || value > self.max {
            bail!(
                "cron field value {value} out of range {}..={}",
                self.min,
                self.max
            );
        }
        self.allowed[(value - self.min) as usize] = true;
        Ok(())
    }

    fn set_all(&mut self) {
        for slot in &mut self.allowed {
            *slot = true;
        }
    }

    fn matches(&self, value: u32) -> bool {
        if value < self.min || value > self.max {
            return false;
        }
        self.allowed[(value - self.min) as usize]
    }
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 5 {
            bail!("cron expression must have 5 fields: min hour dom month dow");
        }

        Ok(Self {
            source: expr.to_owned(),
            minute: parse_field(parts[0], 0, 59)
                .with_context(|| format!("invalid minute field {:?}", parts[0]))?,
            hour: parse_field(parts[1], 0, 23)
                .with_context(|| format!("invalid hour field {:?}", parts[1]))?,
            day_of_month: parse_field(parts[2], 1, 31)
                .with_context(|| format!("invalid day-of-month field {:?}", parts[2]))?,
            month: parse_field(parts[3], 1, 12)
                .with_context(|| format!("invalid month field {:?}", parts[3]))?,
            day_of_week: parse_field(parts[4], 0, 6)
                .with_context(|| format!("invalid day-of-week field {:?}", parts[4]))?,
        })
    }

    pub fn matches(&self, t: DateTime<Utc>) -> bool {
        self.minute.matches(t.minute())
            && self.hour.matches(t.hour())
            && self.day_of_month.matches(t.day())
            && self.month.matches(t.month())
            && self.day_of_week.matches(t.weekday().num_days_from_sunday())
    }

    /// Next matching minute boundary strictly after `after`. Bounded to a
    /// 366-day search so an impossible schedule fails instead of spinning.
    pub fn next_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let mut t = after + chrono::Duration::minutes(1);
        t = t
            .with_second(0)
            .and_then(|rounded| rounded.with_nanosecond(0))
            .unwrap_or(t);

        for _ in 0..(366 * 24 * 60) {
            if self.matches(t) {
                return Ok(t);
            }
            t = t + chrono::Duration::minutes(1);
        }
        bail!("cron expression produced no matching time within 366 days");
    }
}

fn parse_field(token: &str, min: u32, max: u32) -> Result<Field> {
    let mut field = Field::new(min, max);
    if token == "*" {
        field.set_all();
        return Ok(field);
    }

    for part in token.split(',') {
        let part = part.trim();
        if part.is_empty() {
            bail!("empty cron field token");
        }
        if let Some(step) = part.strip_prefix("*/") {
            let step: u32 = step.parse().context("invalid cron step")?;
            if step == 0 {
                bail!("cron step must be > 0");
            }
            let mut value = min;
            while value <= max {
                field.set(value)?;
                value += step;
            }
            continue;
        }
        if let Some((start, end)) = part.split_once('-') {
            let start: u32 = start.parse().context("invalid cron range start")?;
            let end: u32 = end.parse().context("invalid cron range end")?;
            if start > end {
                bail!("cron range start > end");
            }
            for value in start..=end {
                field.set(value)?;
            }
            continue;
        }

        let value: u32 = part.parse().context("invalid cron value")?;
        field.set(value)?;
    }
    Ok(field)
}
