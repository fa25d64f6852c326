//! Reconnect backoff curves.
//!
//! Three independent curves, one per error category. Each category owns its own running index:
//! a successful connect resets only the index of the category that just succeeded, so an HTTP
//! auth failure doesn't inherit a fast network-fault retry cadence and vice versa.

use std::time::Duration;

/// Which family a connect failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Transport/TCP-level failures and clean/data-loss closes.
    Transport,
    /// Non-2xx HTTP responses from the opener.
    Http,
    /// Anything else.
    Other,
}

impl Category {
    const ALL: [Category; 3] = [Category::Transport, Category::Http, Category::Other];

    fn index(self) -> usize {
        match self {
            Category::Transport => 0,
            Category::Http => 1,
            Category::Other => 2,
        }
    }

    fn curve(self) -> Curve {
        match self {
            Category::Transport => Curve { initial: Duration::from_millis(250), max: Duration::from_secs(16) },
            Category::Http => Curve { initial: Duration::from_secs(10), max: Duration::from_secs(240) },
            Category::Other => Curve { initial: Duration::from_secs(10), max: Duration::from_secs(240) },
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Curve {
    initial: Duration,
    max: Duration,
}

impl Curve {
    /// The delay for the `n`th consecutive failure in this curve (`n` is 0-indexed).
    fn step(self, n: u32) -> Duration {
        let doubled = self.initial.checked_mul(1u32.checked_shl(n).unwrap_or(u32::MAX)).unwrap_or(self.max);
        doubled.min(self.max)
    }
}

/// The three per-category running indices tracked by a [`crate::monitor::Monitor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Backoff {
    indices: [u32; 3],
}

impl Backoff {
    pub fn new() -> Self {
        Backoff::default()
    }

    /// The delay to wait before the next reconnect attempt for `category`, without advancing it.
    pub fn delay(&self, category: Category) -> Duration {
        category.curve().step(self.indices[category.index()])
    }

    /// Record a failure in `category`, advancing its index toward the cap.
    pub fn record_failure(&mut self, category: Category) {
        let i = category.index();
        self.indices[i] = self.indices[i].saturating_add(1);
    }

    /// Reset only `category`'s index, e.g. after a successful connect in that category.
    pub fn reset(&mut self, category: Category) {
        self.indices[category.index()] = 0;
    }
}
