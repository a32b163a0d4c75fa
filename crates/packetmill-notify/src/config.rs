use serde::{Deserialize, Serialize};

use crate::signal::BASIC_SIGNALS_PER_WORD;

/// Minimum number of signal words a router allocates up front.
const SIGNAL_WORDS_MIN: usize = 1;

/// Ceiling on pre-allocated signal words.
///
/// A word carries 30 basic signals, so this bounds a single router at
/// roughly 30k queue-like elements before configuration becomes suspect.
const SIGNAL_WORDS_MAX: usize = 1024;

/// Tunables for a router's signal allocation behavior.
///
/// The defaults reproduce the classic behavior: one shared word, grown
/// silently when more basic signals are requested than one word can hold
/// (at the cost of derived-signal precision across words). Disabling
/// growth makes `new_basic_signal` fail once the pre-allocated words are
/// used up, which callers are expected to answer with a busy fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Allocate additional signal words once the current ones are full.
    pub grow_signal_words: bool,
    /// Number of signal words created at router startup.
    pub initial_signal_words: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            grow_signal_words: true,
            initial_signal_words: SIGNAL_WORDS_MIN,
        }
    }
}

impl RouterConfig {
    /// Clamp fields to their supported ranges.
    pub fn normalized(mut self) -> Self {
        self.initial_signal_words = self
            .initial_signal_words
            .clamp(SIGNAL_WORDS_MIN, SIGNAL_WORDS_MAX);
        self
    }

    /// Hard cap on basic signals, or `None` when growth is enabled.
    pub fn max_basic_signals(&self) -> Option<u32> {
        if self.grow_signal_words {
            None
        } else {
            Some(self.initial_signal_words as u32 * BASIC_SIGNALS_PER_WORD)
        }
    }
}
