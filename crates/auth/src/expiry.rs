//! Relative token lifetimes such as `30m`, `24h` or `7d`.

use chrono::Duration;

use crate::token::TokenError;

/// A validated `^[0-9]+[smhd]$` lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenExpiry {
    amount: u64,
    unit: ExpiryUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl ExpiryUnit {
    fn seconds(self) -> u64 {
        match self {
            ExpiryUnit::Seconds => 1,
            ExpiryUnit::Minutes => 60,
            ExpiryUnit::Hours => 60 * 60,
            ExpiryUnit::Days => 24 * 60 * 60,
        }
    }
}

impl TokenExpiry {
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let invalid = || {
            TokenError::InvalidExpiry(format!(
                "{raw:?} must be a number followed by s, m, h or d (e.g. 24h, 30m, 7d)"
            ))
        };

        let Some(suffix) = raw.chars().last() else {
            return Err(invalid());
        };
        let unit = match suffix {
            's' => ExpiryUnit::Seconds,
            'm' => ExpiryUnit::Minutes,
            'h' => ExpiryUnit::Hours,
            'd' => ExpiryUnit::Days,
            _ => return Err(invalid()),
        };
        let digits = &raw[..raw.len() - suffix.len_utf8()];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let amount = digits.parse::<u64>().map_err(|_| invalid())?;

        Ok(Self { amount, unit })
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn unit(&self) -> ExpiryUnit {
        self.unit
    }

    /// Lifetime as a duration; fails when it does not fit a signed timestamp.
    pub fn to_duration(&self) -> Result<Duration, TokenError> {
        let secs = self
            .amount
            .checked_mul(self.unit.seconds())
            .and_then(|s| i64::try_from(s).ok())
            .ok_or_else(|| TokenError::InvalidExpiry("token lifetime is too large".into()))?;
        Duration::try_seconds(secs)
            .ok_or_else(|| TokenError::InvalidExpiry("token lifetime is too large".into()))
    }
}
