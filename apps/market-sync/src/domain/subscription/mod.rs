//! Subscription Tracking
//!
//! Domain type for the set of symbols the client wants live updates for.
//!
//! # Design
//!
//! The set lives independently of any socket. Mutations report the delta
//! (symbols actually added or removed) so the connection layer can forward
//! exactly that delta when connected, and replay the full set after every
//! successful (re)connect.

use std::collections::BTreeSet;

// =============================================================================
// Types
// =============================================================================

/// A symbol string (exchange ticker).
pub type Symbol = String;

/// Normalize a raw symbol: surrounding whitespace is trimmed, blanks rejected.
fn normalize(raw: impl Into<Symbol>) -> Option<Symbol> {
    let raw = raw.into();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == raw.len() {
        Some(raw)
    } else {
        Some(trimmed.to_string())
    }
}

// =============================================================================
// Subscription Set
// =============================================================================

/// Symbols subscribed for live updates.
///
/// Ordered so that replay messages are deterministic.
///
/// # Example
///
/// ```rust
/// use market_sync::domain::subscription::SubscriptionSet;
///
/// let mut set = SubscriptionSet::new();
///
/// let added = set.add(["SBER", "GAZP"]);
/// assert_eq!(added, vec!["GAZP".to_string(), "SBER".to_string()]);
///
/// // Already present - nothing to forward upstream
/// assert!(set.add(["SBER"]).is_empty());
///
/// let removed = set.remove(["SBER", "LKOH"]);
/// assert_eq!(removed, vec!["SBER".to_string()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    symbols: BTreeSet<Symbol>,
}

impl SubscriptionSet {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            symbols: BTreeSet::new(),
        }
    }

    /// Add symbols.
    ///
    /// Returns the symbols that were not yet present, sorted.
    pub fn add<I, S>(&mut self, symbols: I) -> Vec<Symbol>
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        let mut added: Vec<Symbol> = symbols
            .into_iter()
            .filter_map(normalize)
            .filter(|symbol| self.symbols.insert(symbol.clone()))
            .collect();
        added.sort();
        added
    }

    /// Remove symbols.
    ///
    /// Returns the symbols that were present, sorted.
    pub fn remove<I, S>(&mut self, symbols: I) -> Vec<Symbol>
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        let mut removed: Vec<Symbol> = symbols
            .into_iter()
            .filter_map(normalize)
            .filter(|symbol| self.symbols.remove(symbol))
            .collect();
        removed.sort();
        removed
    }

    /// Remove every symbol, returning what was subscribed.
    pub fn clear(&mut self) -> Vec<Symbol> {
        std::mem::take(&mut self.symbols).into_iter().collect()
    }

    /// Check whether a symbol is subscribed.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    /// All subscribed symbols, sorted.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Symbol> {
        self.symbols.iter().cloned().collect()
    }

    /// Number of subscribed symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_new_symbols() {
        let mut set = SubscriptionSet::new();

        let added = set.add(["SBER", "GAZP"]);

        assert_eq!(added, vec!["GAZP", "SBER"]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn add_existing_symbol_is_not_a_delta() {
        let mut set = SubscriptionSet::new();
        set.add(["SBER"]);

        let added = set.add(["SBER", "LKOH"]);

        assert_eq!(added, vec!["LKOH"]);
    }

    #[test]
    fn duplicate_in_one_call_added_once() {
        let mut set = SubscriptionSet::new();

        let added = set.add(["SBER", "SBER"]);

        assert_eq!(added, vec!["SBER"]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn blank_symbols_ignored_and_whitespace_trimmed() {
        let mut set = SubscriptionSet::new();

        let added = set.add(["", "   ", " YNDX "]);

        assert_eq!(added, vec!["YNDX"]);
        assert!(set.contains("YNDX"));
    }

    #[test]
    fn remove_reports_only_present_symbols() {
        let mut set = SubscriptionSet::new();
        set.add(["SBER", "GAZP"]);

        let removed = set.remove(["GAZP", "MGNT"]);

        assert_eq!(removed, vec!["GAZP"]);
        assert!(!set.contains("GAZP"));
        assert!(set.contains("SBER"));
    }

    #[test]
    fn clear_returns_everything() {
        let mut set = SubscriptionSet::new();
        set.add(["SBER", "GAZP"]);

        let removed = set.clear();

        assert_eq!(removed, vec!["GAZP", "SBER"]);
        assert!(set.is_empty());
    }

    #[test]
    fn to_vec_is_sorted() {
        let mut set = SubscriptionSet::new();
        set.add(["VTBR", "AFLT", "MOEX"]);

        assert_eq!(set.to_vec(), vec!["AFLT", "MOEX", "VTBR"]);
    }
}
