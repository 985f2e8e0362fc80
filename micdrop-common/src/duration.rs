//! ISO-8601 duration parsing
//!
//! Video catalogs report track lengths as ISO-8601 duration strings
//! (`PT3M45S`). Queue assembly only ever needs whole seconds, so the
//! parser collapses everything to that.

/// Parse an ISO-8601 duration string into whole seconds (floored).
///
/// Supported designators: `W`, `D` and, after `T`: `H`, `M`, `S`, with an
/// optional decimal fraction (`.` or `,`) on any component. Designators
/// must appear in descending order and at most once each.
///
/// Years and calendar months have no fixed length in seconds and are
/// rejected, as are negative and empty durations.
///
/// # Examples
///
/// ```
/// use micdrop_common::duration::parse_iso8601_seconds;
///
/// assert_eq!(parse_iso8601_seconds("PT3M45S"), Some(225));
/// assert_eq!(parse_iso8601_seconds("PT1H2M3S"), Some(3723));
/// assert_eq!(parse_iso8601_seconds("P1DT12H"), Some(129600));
/// assert_eq!(parse_iso8601_seconds("3:45"), None);
/// ```
pub fn parse_iso8601_seconds(input: &str) -> Option<i64> {
    let s = input.trim();
    let rest = s.strip_prefix(['P', 'p'])?;
    if rest.is_empty() {
        return None;
    }

    let mut total: f64 = 0.0;
    let mut num = String::new();
    let mut in_time = false;
    let mut saw_component = false;
    // Designator ranks: W=5, D=4, H=3, M=2, S=1. Must strictly decrease.
    let mut last_rank = u8::MAX;

    for c in rest.chars() {
        match c {
            'T' | 't' => {
                if in_time || !num.is_empty() {
                    return None;
                }
                in_time = true;
            }
            '0'..='9' => num.push(c),
            '.' | ',' => num.push('.'),
            unit => {
                if num.is_empty() {
                    return None;
                }
                let value: f64 = num.parse().ok()?;
                num.clear();

                let (rank, factor) = match (unit.to_ascii_uppercase(), in_time) {
                    ('W', false) => (5, 604_800.0),
                    ('D', false) => (4, 86_400.0),
                    ('H', true) => (3, 3_600.0),
                    ('M', true) => (2, 60.0),
                    ('S', true) => (1, 1.0),
                    // Years, calendar months, or a time designator
                    // outside the T section.
                    _ => return None,
                };
                if rank >= last_rank {
                    return None;
                }
                last_rank = rank;
                total += value * factor;
                saw_component = true;
            }
        }
    }

    // Trailing digits without a designator are malformed.
    if !num.is_empty() || !saw_component {
        return None;
    }
    if !total.is_finite() || total > i64::MAX as f64 {
        return None;
    }
    Some(total.floor() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typical_track_lengths() {
        assert_eq!(parse_iso8601_seconds("PT3M45S"), Some(225));
        assert_eq!(parse_iso8601_seconds("PT4M13S"), Some(253));
        assert_eq!(parse_iso8601_seconds("PT5M55S"), Some(355));
        assert_eq!(parse_iso8601_seconds("PT1M"), Some(60));
        assert_eq!(parse_iso8601_seconds("PT58S"), Some(58));
        assert_eq!(parse_iso8601_seconds("PT0S"), Some(0));
    }

    #[test]
    fn test_hours_days_weeks() {
        assert_eq!(parse_iso8601_seconds("PT1H2M3S"), Some(3723));
        assert_eq!(parse_iso8601_seconds("PT2H"), Some(7200));
        assert_eq!(parse_iso8601_seconds("P1D"), Some(86400));
        assert_eq!(parse_iso8601_seconds("P1DT12H"), Some(129600));
        assert_eq!(parse_iso8601_seconds("P2W"), Some(1_209_600));
    }

    #[test]
    fn test_seconds_exceeding_a_minute() {
        // Unnormalized values are legal ISO-8601.
        assert_eq!(parse_iso8601_seconds("PT90S"), Some(90));
        assert_eq!(parse_iso8601_seconds("PT100M"), Some(6000));
    }

    #[test]
    fn test_fractions_floor() {
        assert_eq!(parse_iso8601_seconds("PT3.5S"), Some(3));
        assert_eq!(parse_iso8601_seconds("PT1.5M"), Some(90));
        assert_eq!(parse_iso8601_seconds("PT1,5M"), Some(90));
    }

    #[test]
    fn test_lowercase_accepted() {
        assert_eq!(parse_iso8601_seconds("pt3m45s"), Some(225));
    }

    #[test]
    fn test_malformed_rejected() {
        assert_eq!(parse_iso8601_seconds(""), None);
        assert_eq!(parse_iso8601_seconds("P"), None);
        assert_eq!(parse_iso8601_seconds("PT"), None);
        assert_eq!(parse_iso8601_seconds("3:45"), None);
        assert_eq!(parse_iso8601_seconds("225"), None);
        assert_eq!(parse_iso8601_seconds("PT45"), None); // no designator
        assert_eq!(parse_iso8601_seconds("PTM"), None); // no value
        assert_eq!(parse_iso8601_seconds("PT3X"), None);
    }

    #[test]
    fn test_calendar_units_rejected() {
        assert_eq!(parse_iso8601_seconds("P3Y"), None);
        assert_eq!(parse_iso8601_seconds("P1M"), None); // month, not minute
        assert_eq!(parse_iso8601_seconds("P1Y2M3D"), None);
    }

    #[test]
    fn test_ordering_enforced() {
        assert_eq!(parse_iso8601_seconds("PT1S2M"), None);
        assert_eq!(parse_iso8601_seconds("PT1M1M"), None);
        assert_eq!(parse_iso8601_seconds("P1DT1H"), Some(90000));
        // Time designators require the T section.
        assert_eq!(parse_iso8601_seconds("P1H"), None);
    }
}
