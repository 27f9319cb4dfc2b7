//! Argument validation used by every builder step.
//!
//! Builders call these helpers as options are set and keep the first
//! failure, which `build()` then reports as a [`ConfigError`].

use crate::error::ConfigError;
use std::time::Duration;

/// Reject a zero duration.
pub fn positive_duration(name: &'static str, value: Duration) -> Result<Duration, ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::invalid_argument(
            name,
            "must be greater than zero",
        ));
    }
    Ok(value)
}

/// Reject a zero count.
pub fn positive_count(name: &'static str, value: u32) -> Result<u32, ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid_argument(
            name,
            "must be greater than zero",
        ));
    }
    Ok(value)
}

/// Reject an empty or whitespace-only name.
pub fn non_empty(name: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid_argument(name, "must not be empty"));
    }
    Ok(())
}

/// Keeps the first validation failure seen while a builder is chained.
#[derive(Debug, Default)]
pub struct FirstError(Option<ConfigError>);

impl FirstError {
    /// Unwrap `result`, remembering its error if it is the first one.
    pub fn check<T>(&mut self, result: Result<T, ConfigError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                if self.0.is_none() {
                    self.0 = Some(err);
                }
                None
            }
        }
    }

    /// `Err` with the first recorded failure, if any.
    pub fn into_result(self) -> Result<(), ConfigError> {
        match self.0 {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_duration_is_rejected() {
        assert!(positive_duration("timeout", Duration::ZERO).is_err());
        assert_eq!(
            positive_duration("timeout", Duration::from_millis(1)).unwrap(),
            Duration::from_millis(1)
        );
    }

    #[test]
    fn zero_count_is_rejected() {
        let err = positive_count("stop_after", 0).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidArgument { name: "stop_after", .. }
        ));
        assert_eq!(positive_count("stop_after", 3).unwrap(), 3);
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(non_empty("name", "  ").is_err());
        assert!(non_empty("name", "payments").is_ok());
    }

    #[test]
    fn first_error_wins() {
        let mut errors = FirstError::default();
        assert_eq!(errors.check(positive_count("a", 1)), Some(1));
        assert_eq!(errors.check(positive_count("b", 0)), None);
        assert_eq!(errors.check(positive_count("c", 0)), None);

        match errors.into_result() {
            Err(ConfigError::InvalidArgument { name, .. }) => assert_eq!(name, "b"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
