use std::fmt;
use std::path::PathBuf;

use crate::calendar::Month;

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    IndicatorNotFound,
    InvalidConfiguration,
    InvalidPeriodicity,
    EndBeforeStart,
    MalformedCompetence,
    InvalidAmount,
    InvalidEnumValue,
    InvalidInput,
    ConfirmedOverwrite,
    StorageFailure,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::IndicatorNotFound => "E2001",
            Self::InvalidConfiguration => "E2002",
            Self::InvalidPeriodicity => "E2003",
            Self::EndBeforeStart => "E2004",
            Self::MalformedCompetence => "E2005",
            Self::InvalidAmount => "E2006",
            Self::InvalidEnumValue => "E2007",
            Self::InvalidInput => "E2008",
            Self::ConfirmedOverwrite => "E2009",
            Self::StorageFailure => "E5001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::IndicatorNotFound => "Indicator not found",
            Self::InvalidConfiguration => "Indicator has no resolvable anchor month",
            Self::InvalidPeriodicity => "Periodicity out of range",
            Self::EndBeforeStart => "End month precedes start month",
            Self::MalformedCompetence => "Malformed competence",
            Self::InvalidAmount => "Invalid amount",
            Self::InvalidEnumValue => "Invalid direction/value kind",
            Self::InvalidInput => "Invalid input",
            Self::ConfirmedOverwrite => "Confirmed submission cannot be cleared",
            Self::StorageFailure => "Storage failure",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `metas init` to create the database."),
            Self::ConfigParseError => Some("Fix syntax in .metas/config.toml and retry."),
            Self::IndicatorNotFound => Some("Run `metas indicator list` to see valid ids."),
            Self::InvalidConfiguration => {
                Some("Set a start month with `metas indicator update <id> --start YYYY-MM`.")
            }
            Self::InvalidPeriodicity => Some("Use a periodicity between 1 and 12 months."),
            Self::EndBeforeStart => Some("Move the end month on or after the start month."),
            Self::MalformedCompetence => Some("Use the YYYY-MM format, e.g. 2025-03."),
            Self::InvalidAmount => Some("Use digits with an optional decimal separator."),
            Self::InvalidEnumValue => Some("Use one of the documented direction/kind values."),
            Self::InvalidInput | Self::ConfirmedOverwrite => None,
            Self::StorageFailure => Some("Check that the database file is writable."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failures raised by the reconciliation engine and the store.
#[derive(Debug, thiserror::Error)]
pub enum MetasError {
    #[error("no store at {}", .0.display())]
    NotInitialized(PathBuf),

    #[error("cannot parse {}: {reason}", path.display())]
    ConfigParse { path: PathBuf, reason: String },

    #[error("indicator {indicator_id} has neither a start month nor a creation date")]
    InvalidConfiguration { indicator_id: i64 },

    #[error("indicator {0} not found")]
    IndicatorNotFound(i64),

    #[error("periodicity {0} is outside 1..=12")]
    InvalidPeriodicity(i64),

    #[error("end month {end} precedes start month {start}")]
    EndBeforeStart { start: Month, end: Month },

    #[error("malformed competence '{0}': expected YYYY-MM")]
    MalformedCompetence(String),

    #[error("invalid amount '{0}'")]
    InvalidAmount(String),

    #[error("unknown {field} '{value}'")]
    InvalidEnumValue { field: &'static str, value: String },

    #[error("{0}")]
    InvalidInput(String),

    #[error("submission {0} is confirmed and cannot be reset to pending")]
    ConfirmedOverwrite(i64),

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl MetasError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized(_) => ErrorCode::NotInitialized,
            Self::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Self::InvalidConfiguration { .. } => ErrorCode::InvalidConfiguration,
            Self::IndicatorNotFound(_) => ErrorCode::IndicatorNotFound,
            Self::InvalidPeriodicity(_) => ErrorCode::InvalidPeriodicity,
            Self::EndBeforeStart { .. } => ErrorCode::EndBeforeStart,
            Self::MalformedCompetence(_) => ErrorCode::MalformedCompetence,
            Self::InvalidAmount(_) => ErrorCode::InvalidAmount,
            Self::InvalidEnumValue { .. } => ErrorCode::InvalidEnumValue,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::ConfirmedOverwrite(_) => ErrorCode::ConfirmedOverwrite,
            Self::Storage(_) => ErrorCode::StorageFailure,
        }
    }

    /// Remediation text, falling back to the code's summary.
    #[must_use]
    pub fn suggestion(&self) -> String {
        let code = self.code();
        code.hint().unwrap_or_else(|| code.message()).to_string()
    }
}

pub type Result<T, E = MetasError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::{ErrorCode, MetasError};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::IndicatorNotFound,
            ErrorCode::InvalidConfiguration,
            ErrorCode::InvalidPeriodicity,
            ErrorCode::EndBeforeStart,
            ErrorCode::MalformedCompetence,
            ErrorCode::InvalidAmount,
            ErrorCode::InvalidEnumValue,
            ErrorCode::InvalidInput,
            ErrorCode::ConfirmedOverwrite,
            ErrorCode::StorageFailure,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::InvalidConfiguration.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn errors_map_to_codes_and_suggestions() {
        let err = MetasError::MalformedCompetence("2025/01".into());
        assert_eq!(err.code(), ErrorCode::MalformedCompetence);
        assert!(err.suggestion().contains("YYYY-MM"));

        let err = MetasError::InvalidInput("name must not be blank".into());
        assert_eq!(err.suggestion(), "Invalid input");
    }
}
