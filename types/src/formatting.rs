//! Number formatting for rate metrics and session summaries.
//!
//! Every numeric value the replay tool prints goes through here so that
//! rates, totals and durations look the same everywhere, including the
//! European variant (`.` and `,` swapped).

/// Swap `.` and `,` in an already formatted number.
fn europeanize(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '.' => ',',
            ',' => '.',
            other => other,
        })
        .collect()
}

#[inline]
fn maybe_eu(s: String, european: bool) -> String {
    if european { europeanize(&s) } else { s }
}

/// Format a rate (damage or healing per second) with a K/M suffix.
///
/// - `>= 1,000,000` is shown as `X.XXM`
/// - `>= 1,000` is shown as `X.XXK`
/// - anything smaller is rounded to a whole number
///
/// Non-finite input renders as `0` so a broken denominator never leaks
/// `NaN` into a display.
///
/// # Examples
/// ```
/// use skirmish_types::formatting::format_rate;
/// assert_eq!(format_rate(200.0, false), "200");
/// assert_eq!(format_rate(1_500.0, false), "1.50K");
/// assert_eq!(format_rate(2_250_000.0, false), "2.25M");
/// assert_eq!(format_rate(1_500.0, true), "1,50K");
/// assert_eq!(format_rate(f64::NAN, false), "0");
/// ```
pub fn format_rate(n: f64, european: bool) -> String {
    if !n.is_finite() {
        return "0".to_string();
    }
    let abs = n.abs();
    let s = if abs >= 1_000_000.0 {
        format!("{:.2}M", n / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.2}K", n / 1_000.0)
    } else {
        format!("{:.0}", n)
    };
    maybe_eu(s, european)
}

/// Format an integer total with thousands separators.
///
/// # Examples
/// ```
/// use skirmish_types::formatting::format_total;
/// assert_eq!(format_total(0, false), "0");
/// assert_eq!(format_total(1_234_567, false), "1,234,567");
/// assert_eq!(format_total(1_234_567, true), "1.234.567");
/// assert_eq!(format_total(-4_200, false), "-4,200");
/// ```
pub fn format_total(n: i64, european: bool) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    maybe_eu(out, european)
}

/// Format a percentage with one decimal place.
///
/// # Examples
/// ```
/// use skirmish_types::formatting::format_pct;
/// assert_eq!(format_pct(42.7, false), "42.7%");
/// assert_eq!(format_pct(42.7, true), "42,7%");
/// ```
pub fn format_pct(n: f64, european: bool) -> String {
    maybe_eu(format!("{:.1}%", n), european)
}

/// Format a share of a whole as a percentage. Zero total yields `0.0%`.
pub fn format_share(part: f64, whole: f64, european: bool) -> String {
    if whole <= 0.0 {
        return maybe_eu("0.0%".to_string(), european);
    }
    format_pct(part / whole * 100.0, european)
}

/// Format elapsed seconds as `M:SS` (rounded to the nearest second).
///
/// Negative or non-finite values clamp to `0:00`.
///
/// # Examples
/// ```
/// use skirmish_types::formatting::format_duration;
/// assert_eq!(format_duration(125.4), "2:05");
/// assert_eq!(format_duration(59.6), "1:00");
/// assert_eq!(format_duration(-3.0), "0:00");
/// ```
pub fn format_duration(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.round() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Format a session-relative timestamp as `M:SS.s` for event listings.
///
/// # Examples
/// ```
/// use skirmish_types::formatting::format_offset;
/// assert_eq!(format_offset(3.3, false), "0:03.3");
/// assert_eq!(format_offset(75.0, true), "1:15,0");
/// ```
pub fn format_offset(secs: f64, european: bool) -> String {
    let secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
    let mins = (secs / 60.0).floor() as u64;
    let rem = secs - (mins as f64) * 60.0;
    maybe_eu(format!("{}:{:04.1}", mins, rem), european)
}
