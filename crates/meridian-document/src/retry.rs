//! Meridian Retry
//!
//! Bounded immediate retry for operations that can hit transient
//! backing-store faults.
//!
//! @version 0.1.0
//! @author Meridian Development Team

use meridian_common::Result;

/// Run `operation` up to `attempts` times in total.
///
/// Only retryable errors trigger another attempt, and there is no delay
/// between attempts. Once the budget is spent the last error is returned
/// unchanged. A budget of zero still makes one attempt.
pub fn retry_transient<T, F>(attempts: u32, mut operation: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < attempts => {
                tracing::warn!("Attempt {} of {} failed, retrying: {}", attempt, attempts, err);
                attempt += 1;
            }
            Err(err) => {
                if err.is_retryable() {
                    tracing::error!("Giving up after {} attempts: {}", attempts, err);
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_common::MeridianError;

    fn fault() -> MeridianError {
        MeridianError::TransientStorageFault("connection reset".to_string())
    }

    #[test]
    fn test_retries_then_succeeds() {
        let mut calls = 0;
        let result = retry_transient(3, || {
            calls += 1;
            if calls < 2 {
                Err(fault())
            } else {
                Ok(calls)
            }
        });

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_succeeds_on_last_attempt() {
        let mut calls = 0;
        let result = retry_transient(3, || {
            calls += 1;
            if calls < 3 {
                Err(fault())
            } else {
                Ok(())
            }
        });

        assert!(result.is_ok());
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_fails_after_budget() {
        let mut calls = 0;
        let result: Result<()> = retry_transient(3, || {
            calls += 1;
            Err(fault())
        });

        assert!(matches!(result, Err(MeridianError::TransientStorageFault(_))));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_permanent_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<()> = retry_transient(3, || {
            calls += 1;
            Err(MeridianError::DatasetAlreadyExists("foo_bar".to_string()))
        });

        assert!(matches!(result, Err(MeridianError::DatasetAlreadyExists(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_zero_budget_still_attempts_once() {
        let mut calls = 0;
        let _ = retry_transient(0, || {
            calls += 1;
            Err::<(), _>(fault())
        });
        assert_eq!(calls, 1);
    }
}
