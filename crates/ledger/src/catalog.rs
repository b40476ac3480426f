use crate::error::LedgerError;
use core_types::Instrument;
use dashmap::DashMap;

/// Read-only lookup of instrument reference data.
pub trait InstrumentCatalog: Send + Sync {
    fn instrument(&self, symbol: &str) -> Option<Instrument>;
}

/// In-memory catalog keyed by symbol.
#[derive(Debug, Default)]
pub struct InstrumentRegistry {
    instruments: DashMap<String, Instrument>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an instrument after validating its reference data.
    pub fn list(&self, instrument: Instrument) -> Result<(), LedgerError> {
        instrument.validate()?;
        tracing::info!(symbol = %instrument.symbol, tradeable = instrument.is_tradeable, "instrument listed");
        self.instruments.insert(instrument.symbol.clone(), instrument);
        Ok(())
    }

    /// Flips the tradeable flag. Returns false for an unknown symbol.
    pub fn set_tradeable(&self, symbol: &str, tradeable: bool) -> bool {
        match self.instruments.get_mut(symbol) {
            Some(mut entry) => {
                entry.is_tradeable = tradeable;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

impl InstrumentCatalog for InstrumentRegistry {
    fn instrument(&self, symbol: &str) -> Option<Instrument> {
        self.instruments.get(symbol).map(|entry| entry.value().clone())
    }
}
