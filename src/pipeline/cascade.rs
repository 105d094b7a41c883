//! Ordered evidence strategies.
//!
//! Every extractor tries several independent sources of evidence in a fixed
//! precedence order (digital text, then OCR, then pixels). Instead of nesting
//! fallbacks, each extractor declares a slice of named [`Strategy`] values and
//! hands it to [`run`], which stops at the first conclusive [`Attempt`].

use tracing::debug;

/// Result of one strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    /// Evidence found. Stop.
    Hit(T),
    /// Conclusive negative. Stop without consulting later strategies.
    Veto(T),
    /// Nothing conclusive. Try the next strategy.
    Miss,
}

/// A named evidence source over a context `C`.
pub struct Strategy<C, T> {
    pub name: &'static str,
    pub run: fn(&C) -> Attempt<T>,
}

/// How a cascade settled.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<T> {
    /// Name of the strategy that decided.
    pub strategy: &'static str,
    pub value: T,
    /// `true` for a hit, `false` for a veto.
    pub hit: bool,
}

/// Run `strategies` in order against `ctx`. `None` when every strategy missed.
pub fn run<C, T>(label: &str, strategies: &[Strategy<C, T>], ctx: &C) -> Option<Resolution<T>> {
    for s in strategies {
        match (s.run)(ctx) {
            Attempt::Hit(value) => {
                debug!("[{label}] {} → hit", s.name);
                return Some(Resolution {
                    strategy: s.name,
                    value,
                    hit: true,
                });
            }
            Attempt::Veto(value) => {
                debug!("[{label}] {} → veto", s.name);
                return Some(Resolution {
                    strategy: s.name,
                    value,
                    hit: false,
                });
            }
            Attempt::Miss => debug!("[{label}] {} → miss", s.name),
        }
    }
    None
}
