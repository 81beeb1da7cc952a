//! Per-pair trailing-stop state.

use super::money::Ratio;

/// Trailing-stop value and confirmation counter for one observed pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailingDetails {
    trailing: Option<Ratio>,
    confirmations: u32,
}

impl TrailingDetails {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            trailing: None,
            confirmations: 1,
        }
    }

    /// Current trailing-stop value, if one has been set.
    #[must_use]
    pub fn trailing(&self) -> Option<Ratio> {
        self.trailing
    }

    #[must_use]
    pub fn has_trailing(&self) -> bool {
        self.trailing.is_some()
    }

    /// Consecutive confirmations seen so far (always at least 1).
    #[must_use]
    pub fn confirmations(&self) -> u32 {
        self.confirmations
    }

    pub fn set_trailing(&mut self, value: Ratio) {
        self.trailing = Some(value);
    }

    pub fn increment_confirmations(&mut self) {
        self.confirmations = self.confirmations.saturating_add(1);
    }

    pub fn reset_confirmations(&mut self) {
        self.confirmations = 1;
    }

    /// Clear the trailing value and the counter.
    pub fn reset(&mut self) {
        self.trailing = None;
        self.confirmations = 1;
    }
}

impl Default for TrailingDetails {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn starts_empty_with_counter_at_one() {
        let details = TrailingDetails::default();
        assert!(!details.has_trailing());
        assert_eq!(details.confirmations(), 1);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut details = TrailingDetails::new();
        details.set_trailing(dec!(0.15));
        details.increment_confirmations();
        details.increment_confirmations();
        assert_eq!(details.confirmations(), 3);

        details.reset();
        assert_eq!(details, TrailingDetails::new());
    }
}
