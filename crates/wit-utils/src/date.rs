//! Timestamps and identities as they appear on commit and tag headers.

use bstr::{BStr, BString, ByteSlice};
use chrono::{Local, Offset};

use crate::error::UtilError;
use crate::Result;

/// A point in time with the author's UTC offset, as stored in objects.
///
/// The offset is kept in minutes; the wire form is `±HHMM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WitDate {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Offset from UTC in minutes (e.g. -300 for `-0500`).
    pub tz_offset: i32,
}

impl WitDate {
    pub fn new(timestamp: i64, tz_offset_minutes: i32) -> Self {
        Self {
            timestamp,
            tz_offset: tz_offset_minutes,
        }
    }

    /// Current time in the local timezone.
    pub fn now() -> Self {
        let now = Local::now();
        Self {
            timestamp: now.timestamp(),
            tz_offset: now.offset().fix().local_minus_utc() / 60,
        }
    }

    /// Parse the raw object form: `<unix_ts> ±HHMM`.
    pub fn parse(input: &str) -> Result<Self> {
        let mut parts = input.trim().split_whitespace();
        let ts = parts
            .next()
            .ok_or_else(|| UtilError::DateParse("empty date".into()))?;
        let timestamp: i64 = ts
            .parse()
            .map_err(|_| UtilError::DateParse(format!("bad timestamp: {ts}")))?;

        let tz = parts.next().unwrap_or("+0000");
        let tz_offset = parse_tz(tz)?;

        if parts.next().is_some() {
            return Err(UtilError::DateParse(format!("trailing data in: {input}")));
        }
        Ok(Self {
            timestamp,
            tz_offset,
        })
    }

    /// Format as the raw object form: `<unix_ts> ±HHMM`.
    pub fn to_raw(&self) -> String {
        format!("{} {}", self.timestamp, format_tz(self.tz_offset))
    }
}

fn parse_tz(tz: &str) -> Result<i32> {
    let bytes = tz.as_bytes();
    if bytes.len() != 5 || (bytes[0] != b'+' && bytes[0] != b'-') {
        return Err(UtilError::DateParse(format!("bad timezone: {tz}")));
    }
    let digits = &tz[1..];
    let raw: i32 = digits
        .parse()
        .map_err(|_| UtilError::DateParse(format!("bad timezone: {tz}")))?;
    let minutes = (raw / 100) * 60 + raw % 100;
    Ok(if bytes[0] == b'-' { -minutes } else { minutes })
}

fn format_tz(offset_minutes: i32) -> String {
    let sign = if offset_minutes < 0 { '-' } else { '+' };
    let abs = offset_minutes.unsigned_abs();
    format!("{}{:02}{:02}", sign, abs / 60, abs % 60)
}

/// An identity line: `Name <email> unix_ts ±HHMM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: BString,
    pub email: BString,
    pub date: WitDate,
}

impl Signature {
    pub fn new(name: impl Into<BString>, email: impl Into<BString>, date: WitDate) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            date,
        }
    }

    /// Parse from the object header form.
    ///
    /// Example: `Ada Lovelace <ada@example.com> 1234567890 +0000`
    pub fn parse(input: &BStr) -> Result<Self> {
        let input = input.as_bytes();

        let gt_pos = input
            .iter()
            .rposition(|&b| b == b'>')
            .ok_or_else(|| UtilError::SignatureParse("missing '>'".into()))?;
        let lt_pos = input[..gt_pos]
            .iter()
            .rposition(|&b| b == b'<')
            .ok_or_else(|| UtilError::SignatureParse("missing '<'".into()))?;

        let name = input[..lt_pos].trim();
        let email = &input[lt_pos + 1..gt_pos];

        let date_str = input[gt_pos + 1..].trim();
        let date_str = std::str::from_utf8(date_str)
            .map_err(|_| UtilError::SignatureParse("non-UTF-8 date".into()))?;
        let date = WitDate::parse(date_str)?;

        Ok(Self {
            name: BString::from(name),
            email: BString::from(email),
            date,
        })
    }

    /// Format in the object header form.
    pub fn to_bytes(&self) -> BString {
        let mut out = BString::from(Vec::new());
        out.extend_from_slice(&self.name);
        out.extend_from_slice(b" <");
        out.extend_from_slice(&self.email);
        out.extend_from_slice(b"> ");
        out.extend_from_slice(self.date.to_raw().as_bytes());
        out
    }
}
