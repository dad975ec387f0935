//------------ Expanse -------------------------------------------------------

// The range of critical bytes covered by a node's children. `size` is
// cached because the promotion predicates compare it against occupancy
// constantly, and because `high - low + 1` overflows a u8 for the full
// alphabet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Expanse {
    pub low: u8,
    pub high: u8,
    pub size: u16,
}

impl Expanse {
    pub(crate) fn new(a: u8, b: u8) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Expanse {
            low,
            high,
            size: (high - low) as u16 + 1,
        }
    }

    // The expanse of a node with no children.
    pub(crate) fn empty() -> Self {
        Expanse {
            low: 0,
            high: 0,
            size: 0,
        }
    }

    // Extend the range to cover `cb`; a no-op if `cb` is already covered.
    // An empty expanse grows to the single byte.
    pub(crate) fn with(self, cb: u8) -> Self {
        if self.size == 0 {
            return Expanse::new(cb, cb);
        }
        if cb < self.low {
            return Expanse::new(cb, self.high);
        }
        if cb > self.high {
            return Expanse::new(self.low, cb);
        }
        self
    }

    pub(crate) fn contains(self, cb: u8) -> bool {
        self.size != 0 && cb >= self.low && cb <= self.high
    }
}
