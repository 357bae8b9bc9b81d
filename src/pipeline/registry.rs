//! Static denom -> (name, symbol) lookup
//!
//! Built once at startup and passed to the engine; never mutated while
//! events are processed.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const UOSMO: &str = "uosmo";
pub const UION: &str = "uion";
pub const ATOM_DENOM: &str = "ibc/27394FB092D2ECCD56123C74F36E4C1F926001CEADA9CA97EA622B25F41E5EB2";
pub const USDC_DENOM: &str = "ibc/D189335C6E4A68B513C10AB227BF1C1D38C746766278BA3EEB4FB14124F1D858";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DenomInfo {
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Default)]
pub struct DenomRegistry {
    entries: HashMap<String, DenomInfo>,
}

impl DenomRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in table for the Osmosis deployment
    pub fn osmosis() -> Self {
        let table: [(&str, &str, &str); 8] = [
            (UOSMO, "Osmosis", "OSMO"),
            (UION, "Ion", "ION"),
            (ATOM_DENOM, "Cosmos Hub Atom", "ATOM"),
            (USDC_DENOM, "USD Coin", "USDC"),
            ("ibc/46B44899322F3CD854D2D46DEEF881958467CDD4B3B10086DA49296BBED94BED", "Juno", "JUNO"),
            ("ibc/987C17B11ABC2B20019178ACE62929FE9840202CE79498E29FE8E5CB02B7C0A4", "Stargaze", "STARS"),
            ("ibc/1480B8FD20AD5FCAE81EA87584D269547DD4D436843C1D20F15E00EB64743EF4", "Akash Network", "AKT"),
            ("ibc/0954E1C28EB7AF5B72D24F3BC2B47BBB2FDF91BDDFD57B74B99E133AED40972A", "Secret Network", "SCRT"),
        ];

        let mut registry = Self::empty();
        for (denom, name, symbol) in table {
            registry.insert(denom, name, symbol);
        }
        registry
    }

    pub fn insert(&mut self, denom: &str, name: &str, symbol: &str) {
        self.entries.insert(
            denom.to_string(),
            DenomInfo {
                name: name.to_string(),
                symbol: symbol.to_string(),
            },
        );
    }

    /// Merge entries from a JSON object `{"<denom>": {"name": .., "symbol": ..}}`
    ///
    /// File entries replace built-in ones with the same denom.
    pub fn with_overrides_from_file(
        mut self,
        path: impl AsRef<Path>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let json = fs::read_to_string(path.as_ref())?;
        let overrides: HashMap<String, DenomInfo> = serde_json::from_str(&json)?;
        log::info!(
            "📇 Loaded {} denom registry overrides from {}",
            overrides.len(),
            path.as_ref().display()
        );
        self.entries.extend(overrides);
        Ok(self)
    }

    /// (name, symbol) for a denom; unknown denoms pass through as `(denom, denom)`
    pub fn lookup(&self, denom: &str) -> (String, String) {
        match self.entries.get(denom) {
            Some(info) => (info.name.clone(), info.symbol.clone()),
            None => (denom.to_string(), denom.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
