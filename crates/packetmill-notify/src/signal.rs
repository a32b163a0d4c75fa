//! Activity signals shared between producers and their consumers.
//!
//! A signal answers one question cheaply: is it worth trying right now? A
//! pull consumer checks the combined signal of everything upstream before
//! rescheduling itself; producers flip their bit when packets (or space)
//! appear. Signals are allowed to be conservatively wrong in one direction
//! only: they may report active when nothing is there, never the reverse.
//!
//! One router shares a single [`SignalWord`] for all of its basic signals,
//! so a derived signal over several producers is still a single atomic load
//! plus a mask test. Combining signals that live in different words loses
//! that precision and collapses to the always-active overderived singleton.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use crossbeam_utils::CachePadded;

/// Reserved bit backing the busy singleton. Permanently set in the static
/// word, never handed out as a basic signal.
pub const TRUE_BIT: u32 = 1 << 0;

/// Reserved bit marking a signal as imprecise. Only meaningful together
/// with [`TRUE_BIT`] in the overderived singleton.
pub const OVERDERIVED_BIT: u32 = 1 << 1;

/// First bit index available for basic signals.
pub(crate) const FIRST_BASIC_BIT: u32 = 2;

/// Basic signals one word can hold (the low two bits are reserved).
pub const BASIC_SIGNALS_PER_WORD: u32 = u32::BITS - FIRST_BASIC_BIT;

/// A shared atomic cell holding signal bits.
///
/// Cache-line padded so producers hammering their bit do not invalidate
/// neighboring state. Producers mutate it with `fetch_or`/`fetch_and`;
/// consumers read it with a single load through [`NotifierSignal::active`].
pub struct SignalWord {
    value: CachePadded<AtomicU32>,
}

impl SignalWord {
    pub(crate) fn new(initial: u32) -> Self {
        Self {
            value: CachePadded::new(AtomicU32::new(initial)),
        }
    }

    #[inline(always)]
    pub fn load(&self, ordering: Ordering) -> u32 {
        self.value.load(ordering)
    }

    /// Sets every bit in `mask`, returning true when all of them were
    /// previously clear.
    #[inline(always)]
    pub(crate) fn set(&self, mask: u32) -> bool {
        let previous = self.value.fetch_or(mask, Ordering::AcqRel);
        previous & mask == 0
    }

    #[inline(always)]
    pub(crate) fn clear(&self, mask: u32) {
        self.value.fetch_and(!mask, Ordering::AcqRel);
    }
}

impl fmt::Debug for SignalWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignalWord({:#x})", self.load(Ordering::Relaxed))
    }
}

/// Process-wide word backing the idle, busy, and overderived singletons.
/// Initialized on first use, before any singleton signal can exist.
fn static_word() -> &'static Arc<SignalWord> {
    static WORD: OnceLock<Arc<SignalWord>> = OnceLock::new();
    WORD.get_or_init(|| Arc::new(SignalWord::new(TRUE_BIT | OVERDERIVED_BIT)))
}

/// An activity signal: a reference to a [`SignalWord`] plus a bit mask.
///
/// The signal is *active* when any masked bit is set. Masks with several
/// bits are derived signals combining multiple producers over one word.
///
/// Four distinguished values exist besides router-allocated basic signals:
///
/// - [`NotifierSignal::uninitialized`]: the sentinel, never active, also
///   what a failed search returns ("always try").
/// - [`NotifierSignal::idle`]: never active; the identity of `+`.
/// - [`NotifierSignal::busy`]: always active; absorbs everything.
/// - [`NotifierSignal::overderived`]: always active, flagged imprecise;
///   produced when signals from different words are combined.
#[derive(Clone)]
pub struct NotifierSignal {
    word: Option<Arc<SignalWord>>,
    mask: u32,
}

impl NotifierSignal {
    /// The uninitialized sentinel.
    pub const fn uninitialized() -> Self {
        Self { word: None, mask: 0 }
    }

    /// A signal that is never active.
    pub fn idle() -> Self {
        Self {
            word: Some(static_word().clone()),
            mask: 0,
        }
    }

    /// A signal that is always active.
    pub fn busy() -> Self {
        Self {
            word: Some(static_word().clone()),
            mask: TRUE_BIT,
        }
    }

    /// The always-active singleton recording that derivation lost
    /// precision.
    pub fn overderived() -> Self {
        Self {
            word: Some(static_word().clone()),
            mask: TRUE_BIT | OVERDERIVED_BIT,
        }
    }

    /// A basic signal over `bit` of `word`.
    pub(crate) fn basic(word: Arc<SignalWord>, bit: u32) -> Self {
        debug_assert!(bit >= FIRST_BASIC_BIT && bit < u32::BITS);
        Self {
            word: Some(word),
            mask: 1 << bit,
        }
    }

    /// Whether the signal refers to a word at all.
    #[inline(always)]
    pub fn initialized(&self) -> bool {
        self.word.is_some()
    }

    /// Whether any masked bit is currently set. Uninitialized signals are
    /// never active.
    #[inline(always)]
    pub fn active(&self) -> bool {
        match &self.word {
            Some(word) => word.load(Ordering::Acquire) & self.mask != 0,
            None => false,
        }
    }

    pub fn is_idle(&self) -> bool {
        *self == Self::idle()
    }

    pub fn is_busy(&self) -> bool {
        *self == Self::busy()
    }

    pub fn is_overderived(&self) -> bool {
        *self == Self::overderived()
    }

    /// The raw bit mask.
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Sets or clears the masked bits. Returns true when activating
    /// flipped the masked bits from all-clear, i.e. the signal made an
    /// inactive-to-active transition. No-op on uninitialized signals.
    pub fn set_active(&self, active: bool) -> bool {
        let Some(word) = &self.word else {
            return false;
        };
        if active {
            word.set(self.mask)
        } else {
            word.clear(self.mask);
            false
        }
    }

    pub(crate) fn same_word(&self, other: &Self) -> bool {
        match (&self.word, &other.word) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Default for NotifierSignal {
    fn default() -> Self {
        Self::uninitialized()
    }
}

impl PartialEq for NotifierSignal {
    fn eq(&self, other: &Self) -> bool {
        match (&self.word, &other.word) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b) && self.mask == other.mask,
            _ => false,
        }
    }
}

impl Eq for NotifierSignal {}

impl std::ops::AddAssign<&NotifierSignal> for NotifierSignal {
    /// Derives this signal by folding in `rhs`.
    ///
    /// Busy absorbs from either side; a zero mask (idle or uninitialized)
    /// is the identity; same-word operands union their masks precisely;
    /// anything else collapses to overderived.
    fn add_assign(&mut self, rhs: &NotifierSignal) {
        if self.is_busy() {
            return;
        }
        if rhs.is_busy() {
            *self = NotifierSignal::busy();
            return;
        }
        if self.mask == 0 {
            *self = rhs.clone();
            return;
        }
        if rhs.mask == 0 {
            return;
        }
        if self.same_word(rhs) {
            self.mask |= rhs.mask;
        } else {
            *self = NotifierSignal::overderived();
        }
    }
}

impl std::ops::AddAssign for NotifierSignal {
    fn add_assign(&mut self, rhs: NotifierSignal) {
        *self += &rhs;
    }
}

impl std::ops::Add for NotifierSignal {
    type Output = NotifierSignal;

    fn add(mut self, rhs: NotifierSignal) -> NotifierSignal {
        self += &rhs;
        self
    }
}

impl std::ops::Add<&NotifierSignal> for NotifierSignal {
    type Output = NotifierSignal;

    fn add(mut self, rhs: &NotifierSignal) -> NotifierSignal {
        self += rhs;
        self
    }
}

impl fmt::Display for NotifierSignal {
    /// Renders "word-address/mask:masked-value", for debugging only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.word {
            Some(word) => write!(
                f,
                "{:p}/{:x}:{:x}",
                Arc::as_ptr(word),
                self.mask,
                word.load(Ordering::Relaxed) & self.mask
            ),
            None => write!(f, "null/0:0"),
        }
    }
}

impl fmt::Debug for NotifierSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NotifierSignal({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_pair() -> (NotifierSignal, NotifierSignal) {
        let word = Arc::new(SignalWord::new(0));
        (
            NotifierSignal::basic(word.clone(), FIRST_BASIC_BIT),
            NotifierSignal::basic(word, FIRST_BASIC_BIT + 1),
        )
    }

    #[test]
    fn singleton_activity() {
        assert!(!NotifierSignal::uninitialized().active());
        assert!(!NotifierSignal::idle().active());
        assert!(NotifierSignal::busy().active());
        assert!(NotifierSignal::overderived().active());
        assert!(NotifierSignal::overderived().is_overderived());
        assert!(!NotifierSignal::busy().is_overderived());
    }

    #[test]
    fn busy_absorbs() {
        let (a, _) = basic_pair();
        for x in [
            NotifierSignal::uninitialized(),
            NotifierSignal::idle(),
            NotifierSignal::busy(),
            NotifierSignal::overderived(),
            a,
        ] {
            assert!((NotifierSignal::busy() + x.clone()).is_busy());
            assert!((x + NotifierSignal::busy()).is_busy());
        }
    }

    #[test]
    fn idle_is_identity() {
        let (a, _) = basic_pair();
        assert_eq!(NotifierSignal::idle() + a.clone(), a);
        assert_eq!(a.clone() + NotifierSignal::idle(), a);
        assert_eq!(
            NotifierSignal::uninitialized() + a.clone(),
            a.clone()
        );
        assert_eq!(a.clone() + NotifierSignal::uninitialized(), a);
    }

    #[test]
    fn overderived_absorbs_except_busy() {
        let (a, _) = basic_pair();
        assert!((NotifierSignal::overderived() + a.clone()).is_overderived());
        assert!((a + NotifierSignal::overderived()).is_overderived());
        assert!(
            (NotifierSignal::overderived() + NotifierSignal::overderived()).is_overderived()
        );
        assert!((NotifierSignal::overderived() + NotifierSignal::busy()).is_busy());
    }

    #[test]
    fn same_word_union_is_precise() {
        let (a, b) = basic_pair();
        let derived = a.clone() + b.clone();
        assert_eq!(derived.mask(), a.mask() | b.mask());
        assert!(!derived.active());

        a.set_active(true);
        assert!(derived.active());
        a.set_active(false);
        assert!(!derived.active());
        b.set_active(true);
        assert!(derived.active());
    }

    #[test]
    fn different_word_union_collapses() {
        let (a, _) = basic_pair();
        let (b, _) = basic_pair();
        assert!((a + b).is_overderived());
    }

    #[test]
    fn set_active_reports_transition() {
        let (a, _) = basic_pair();
        assert!(a.set_active(true));
        assert!(!a.set_active(true));
        assert!(!a.set_active(false));
        assert!(a.set_active(true));
    }

    #[test]
    fn display_is_a_word_mask_value_triple() {
        let (a, _) = basic_pair();
        a.set_active(true);
        let rendered = a.to_string();
        assert!(rendered.ends_with("/4:4"));
        assert_eq!(NotifierSignal::uninitialized().to_string(), "null/0:0");
    }

    #[test]
    fn equality_distinguishes_sentinels() {
        assert_eq!(NotifierSignal::uninitialized(), NotifierSignal::default());
        assert_ne!(NotifierSignal::uninitialized(), NotifierSignal::idle());
        assert_ne!(NotifierSignal::busy(), NotifierSignal::overderived());
        let (a, b) = basic_pair();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
