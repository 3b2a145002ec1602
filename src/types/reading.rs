use serde::{Deserialize, Serialize};

/// Where a source value came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    #[default]
    Live,
    Fallback,
}

/// A value produced by a rate source adapter.
///
/// Adapters never fail outward. When the remote read does not produce a
/// usable value they return `Fallback` carrying the configured constant,
/// so callers can tell "fallback used" apart from a real quote.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SourceReading<T> {
    Live(T),
    Fallback(T),
}

impl<T> SourceReading<T> {
    pub fn value(&self) -> &T {
        match self {
            SourceReading::Live(v) | SourceReading::Fallback(v) => v,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            SourceReading::Live(v) | SourceReading::Fallback(v) => v,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SourceReading::Fallback(_))
    }

    pub fn provenance(&self) -> Provenance {
        match self {
            SourceReading::Live(_) => Provenance::Live,
            SourceReading::Fallback(_) => Provenance::Fallback,
        }
    }
}
