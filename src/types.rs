use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// How the supervisor decides that a running OS process belongs to a
/// registry entry.
///
/// - `Contains`: every token of the identifying command must appear as a
///   substring of the process' joined command line (default).
/// - `Exact`: the process argv must equal the identifying command. Falls back
///   to `Contains` when the process table cannot provide a split argv.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Contains,
    Exact,
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "contains" => Ok(MatchMode::Contains),
            "exact" => Ok(MatchMode::Exact),
            other => Err(format!(
                "invalid match_mode: {other} (expected \"contains\" or \"exact\")"
            )),
        }
    }
}

/// Which built-in report a scheduled job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    WeeklyBriefing,
    DailyStatus,
}

impl ReportKind {
    /// Suffix used in `<YYYY-MM-DD>_<suffix>.md`.
    pub fn file_suffix(self) -> &'static str {
        match self {
            ReportKind::WeeklyBriefing => "Weekly_Briefing",
            ReportKind::DailyStatus => "Daily_Status",
        }
    }
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration(" 1m "), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
    }

    #[test]
    fn rejects_bad_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("3d").is_err());
    }

    #[test]
    fn match_mode_from_str() {
        assert_eq!("Exact".parse::<MatchMode>(), Ok(MatchMode::Exact));
        assert!("fuzzy".parse::<MatchMode>().is_err());
    }
}
