// Retry strategy with exponential backoff for reacquiring the audio device

use std::fmt::Display;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReconnectionStrategy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    current_attempt: u32,
}

impl ReconnectionStrategy {
    /// 10 attempts, 1 s doubling up to 30 s
    pub fn new() -> Self {
        Self::with_limits(10, 1000, 30_000)
    }

    pub fn with_limits(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            current_attempt: 0,
        }
    }

    /// Delay before the next attempt (base * 2^attempt, capped)
    /// `None` once every attempt is spent
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }

        let delay_ms = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(self.current_attempt))
            .min(self.max_delay_ms);
        self.current_attempt += 1;

        Some(Duration::from_millis(delay_ms))
    }

    /// Call after a successful attempt
    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    pub fn should_retry(&self) -> bool {
        self.current_attempt < self.max_attempts
    }

    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }

    /// Run `attempt` until it succeeds, fails with an error `is_transient`
    /// rejects, or the attempts are spent (the last error is returned)
    pub fn retry<T, E, F, P>(&mut self, mut attempt: F, is_transient: P) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        loop {
            match attempt() {
                Ok(value) => {
                    self.reset();
                    return Ok(value);
                }
                Err(e) if is_transient(&e) => match self.next_delay() {
                    Some(delay) => {
                        log::warn!(
                            "{}; attempt {} of {} in {:?}",
                            e,
                            self.current_attempt,
                            self.max_attempts,
                            delay
                        );
                        thread::sleep(delay);
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for ReconnectionStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let mut strategy = ReconnectionStrategy::new();
        let delays: Vec<u64> = std::iter::from_fn(|| strategy.next_delay())
            .map(|d| d.as_millis() as u64)
            .collect();

        assert_eq!(
            delays,
            vec![1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000, 30000, 30000]
        );
        assert!(!strategy.should_retry());
    }

    #[test]
    fn test_reset() {
        let mut strategy = ReconnectionStrategy::with_limits(3, 10, 100);
        strategy.next_delay();
        strategy.next_delay();
        assert_eq!(strategy.current_attempt(), 2);

        strategy.reset();
        assert_eq!(strategy.current_attempt(), 0);
        assert_eq!(strategy.next_delay(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_retry_until_success() {
        let mut strategy = ReconnectionStrategy::with_limits(5, 0, 0);
        let mut calls = 0;

        let result: Result<u32, String> = strategy.retry(
            || {
                calls += 1;
                if calls < 3 {
                    Err("device busy".to_string())
                } else {
                    Ok(calls)
                }
            },
            |_| true,
        );

        assert_eq!(result, Ok(3));
        assert_eq!(strategy.current_attempt(), 0);
    }

    #[test]
    fn test_retry_gives_up() {
        let mut strategy = ReconnectionStrategy::with_limits(2, 0, 0);
        let mut calls = 0;

        let result: Result<(), String> = strategy.retry(
            || {
                calls += 1;
                Err(format!("failure {}", calls))
            },
            |_| true,
        );

        // First try plus two retries
        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_permanent_error_is_not_retried() {
        let mut strategy = ReconnectionStrategy::with_limits(5, 0, 0);
        let mut calls = 0;

        let result: Result<(), String> = strategy.retry(
            || {
                calls += 1;
                Err("unsupported format".to_string())
            },
            |e| e.contains("busy"),
        );

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
