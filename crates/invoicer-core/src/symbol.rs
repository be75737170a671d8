//! # Variable Symbol Allocation
//!
//! Generates the 6-digit variable symbol a payer quotes with a bank
//! transfer so the payment can be matched to its invoice or subscription
//! period.
//!
//! ## Allocation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Symbol Allocation                                    │
//! │                                                                         │
//! │  RandomSource ──► candidate "482913"                                   │
//! │                        │                                                │
//! │                        ▼                                                │
//! │               lookup: in use? ──yes──► next candidate (≤ max attempts) │
//! │                        │                                                │
//! │                        no                                               │
//! │                        ▼                                                │
//! │               caller inserts owner + symbol                            │
//! │                        │                                                │
//! │                        ├── UNIQUE violation ──► fresh candidate        │
//! │                        ▼                                                │
//! │                     allocated                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The allocator only answers "free at check time". The database's unique
//! index on the symbol decides who wins a race; see `invoicer-db`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult, ValidationError};

/// Number of distinct symbols: first digit 1-9, five free digits.
pub const SYMBOL_SPACE: u32 = 900_000;

/// Retry budget before giving up with `SymbolSpaceExhausted`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;

const SUFFIX_MAX: u32 = 99_999;

// =============================================================================
// Payment Symbol
// =============================================================================

/// A 6-digit variable symbol, `^[1-9][0-9]{5}$`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PaymentSymbol(String);

impl PaymentSymbol {
    /// Length of every symbol.
    pub const LEN: usize = 6;

    fn from_draw(first_digit: u32, suffix: u32) -> Self {
        PaymentSymbol(format!("{}{:05}", first_digit, suffix))
    }

    /// Returns the symbol as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the symbol as a number (100000-999999).
    pub fn value(&self) -> u32 {
        self.0.parse().unwrap_or_default()
    }

    /// Builds the symbol for a value in 100000-999999.
    pub fn from_value(value: u32) -> Result<Self, ValidationError> {
        value.to_string().parse()
    }
}

impl FromStr for PaymentSymbol {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == Self::LEN
            && (b'1'..=b'9').contains(&bytes[0])
            && bytes[1..].iter().all(u8::is_ascii_digit);

        if !well_formed {
            return Err(ValidationError::InvalidFormat {
                field: "variable_symbol".to_string(),
                reason: "must be 6 digits without a leading zero".to_string(),
            });
        }

        Ok(PaymentSymbol(s.to_string()))
    }
}

impl TryFrom<String> for PaymentSymbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PaymentSymbol> for String {
    fn from(symbol: PaymentSymbol) -> Self {
        symbol.0
    }
}

impl fmt::Display for PaymentSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PaymentSymbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Random Sources
// =============================================================================

/// Source of uniform integers for candidate generation.
///
/// Injected so tests can replay exact candidate sequences.
pub trait RandomSource {
    /// Returns a value in `low..=high`.
    fn next_in_range(&mut self, low: u32, high: u32) -> u32;
}

/// `StdRng`-backed source, OS-seeded in production.
#[derive(Debug, Clone)]
pub struct StdRandom(StdRng);

impl StdRandom {
    /// Seeds from the operating system.
    pub fn from_entropy() -> Self {
        StdRandom(StdRng::from_entropy())
    }

    /// Deterministic stream for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        StdRandom(StdRng::seed_from_u64(seed))
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomSource for StdRandom {
    fn next_in_range(&mut self, low: u32, high: u32) -> u32 {
        self.0.gen_range(low..=high)
    }
}

/// Replays a fixed list of symbols, cycling when the list runs out.
///
/// ## Example
/// ```rust
/// use invoicer_core::symbol::{ScriptedRandom, SymbolAllocator};
///
/// let mut allocator = SymbolAllocator::new(ScriptedRandom::symbols(&[111111, 222222]));
/// let symbol = allocator.allocate(|s| s.as_str() == "111111").unwrap();
/// assert_eq!(symbol.as_str(), "222222");
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    script: Vec<u32>,
    pending: VecDeque<u32>,
}

impl ScriptedRandom {
    /// Scripts raw draws, consumed in order by `next_in_range`.
    pub fn draws(draws: &[u32]) -> Self {
        ScriptedRandom {
            script: draws.to_vec(),
            pending: draws.iter().copied().collect(),
        }
    }

    /// Scripts whole symbols (each becomes a first-digit and suffix draw).
    pub fn symbols(symbols: &[u32]) -> Self {
        let draws: Vec<u32> = symbols
            .iter()
            .flat_map(|s| [s / 100_000, s % 100_000])
            .collect();
        Self::draws(&draws)
    }
}

impl RandomSource for ScriptedRandom {
    fn next_in_range(&mut self, low: u32, high: u32) -> u32 {
        if self.pending.is_empty() {
            self.pending.extend(self.script.iter().copied());
        }

        let value = self.pending.pop_front().unwrap_or(low);
        if (low..=high).contains(&value) {
            value
        } else {
            let span = u64::from(high - low) + 1;
            low + (u64::from(value) % span) as u32
        }
    }
}

// =============================================================================
// Allocator
// =============================================================================

/// Generates variable symbols with a bounded retry budget.
#[derive(Debug, Clone)]
pub struct SymbolAllocator<R> {
    rng: R,
    max_attempts: u32,
}

impl<R: RandomSource> SymbolAllocator<R> {
    /// Creates an allocator with the default budget of 100 attempts.
    pub fn new(rng: R) -> Self {
        SymbolAllocator {
            rng,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Overrides the retry budget (minimum 1).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Returns the retry budget.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Draws one candidate: first digit 1-9, then a 5-digit suffix.
    pub fn generate(&mut self) -> PaymentSymbol {
        let first = self.rng.next_in_range(1, 9);
        let suffix = self.rng.next_in_range(0, SUFFIX_MAX);
        PaymentSymbol::from_draw(first, suffix)
    }

    /// Yields at most `max_attempts` fresh candidates.
    ///
    /// Used by async callers that check each candidate against the
    /// database; an exhausted iterator means `SymbolSpaceExhausted`.
    pub fn candidates(&mut self) -> Candidates<'_, R> {
        let remaining = self.max_attempts;
        Candidates {
            allocator: self,
            remaining,
        }
    }

    /// Returns the first candidate for which `in_use` is false.
    ///
    /// ## Errors
    /// `SymbolSpaceExhausted` once the budget is spent.
    pub fn allocate<F>(&mut self, mut in_use: F) -> CoreResult<PaymentSymbol>
    where
        F: FnMut(&PaymentSymbol) -> bool,
    {
        let attempts = self.max_attempts;
        self.candidates()
            .find(|candidate| !in_use(candidate))
            .ok_or(CoreError::SymbolSpaceExhausted { attempts })
    }
}

/// Iterator returned by [`SymbolAllocator::candidates`].
#[derive(Debug)]
pub struct Candidates<'a, R> {
    allocator: &'a mut SymbolAllocator<R>,
    remaining: u32,
}

impl<R: RandomSource> Iterator for Candidates<'_, R> {
    type Item = PaymentSymbol;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.allocator.generate())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining as usize, Some(self.remaining as usize))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
