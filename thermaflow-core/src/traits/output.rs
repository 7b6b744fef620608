//! Physical output trait

/// Trait for the physical output stage (SSRs, relays, fan drivers)
///
/// Outputs are addressed by logical index (0..MAX_OUTPUTS). Pin mapping
/// and polarity are the implementation's concern.
pub trait OutputDriver {
    /// Switch an output on or off
    fn set_output(&mut self, index: usize, on: bool);

    /// Check if an output is currently on
    fn is_on(&self, index: usize) -> bool;
}
