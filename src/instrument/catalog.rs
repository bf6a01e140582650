//! Instrument catalog and tradeable maturity classification.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use time::macros::format_description;
use time::Date;
use tracing::{debug, info, instrument, warn};

use super::types::{Contract, MaturityKey, VenueInstrument};
use crate::error::CatalogError;

/// Contracts grouped by underlier and by maturity.
///
/// Built once at startup, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    by_underlier: BTreeMap<String, Vec<Contract>>,
    by_maturity: BTreeMap<MaturityKey, Vec<Contract>>,
    by_symbol: BTreeMap<String, Contract>,
    maturity_by_symbol: HashMap<String, MaturityKey>,
}

impl Catalog {
    /// Build the catalog from the venue instrument list.
    ///
    /// A record belongs to root `R` when its symbol starts with `R/`. Records
    /// matching no root, and non-futures records, are skipped.
    #[instrument(skip_all, fields(roots = ?root_tickers, records = instruments.len()))]
    pub fn build(
        root_tickers: &[String],
        instruments: &[VenueInstrument],
    ) -> Result<Self, CatalogError> {
        if root_tickers.is_empty() {
            return Err(CatalogError::NoRootTickers);
        }

        let mut contracts = Vec::new();

        for record in instruments {
            let symbol = record.instrument_id.symbol.as_str();

            let Some(root) = root_tickers
                .iter()
                .find(|root| symbol.starts_with(&format!("{}/", root)))
            else {
                continue;
            };

            if let Some(cfi) = record.cfi_code.as_deref() {
                if !cfi.starts_with('F') {
                    debug!(symbol, cfi, "Skipping non-futures instrument");
                    continue;
                }
            }

            contracts.push(parse_contract(root, record)?);
        }

        let catalog = Self::from_contracts(contracts);

        info!(
            contracts = catalog.len(),
            maturities = catalog.by_maturity.len(),
            tradeable = catalog.tradeable_maturities().len(),
            "Instrument catalog built"
        );

        Ok(catalog)
    }

    /// Build a catalog from already constructed contracts.
    ///
    /// Later contracts with an already seen symbol are ignored.
    pub fn from_contracts(contracts: impl IntoIterator<Item = Contract>) -> Self {
        let mut catalog = Self::default();

        for contract in contracts {
            if catalog.by_symbol.contains_key(contract.symbol()) {
                warn!(symbol = contract.symbol(), "Duplicate instrument ignored");
                continue;
            }

            let key = contract.maturity_key();
            catalog
                .maturity_by_symbol
                .insert(contract.symbol().to_string(), key.clone());
            catalog
                .by_underlier
                .entry(contract.underlier().to_string())
                .or_default()
                .push(contract.clone());
            catalog.by_maturity.entry(key).or_default().push(contract.clone());
            catalog
                .by_symbol
                .insert(contract.symbol().to_string(), contract);
        }

        for bucket in catalog.by_underlier.values_mut() {
            bucket.sort_by(|a, b| {
                a.maturity()
                    .cmp(&b.maturity())
                    .then_with(|| a.symbol().cmp(b.symbol()))
            });
        }
        for bucket in catalog.by_maturity.values_mut() {
            bucket.sort_by(|a, b| a.symbol().cmp(b.symbol()));
        }

        catalog
    }

    /// Maturities with contracts from at least two distinct underliers.
    pub fn tradeable_maturities(&self) -> BTreeSet<MaturityKey> {
        self.by_maturity
            .keys()
            .filter(|key| self.is_tradeable(key))
            .cloned()
            .collect()
    }

    /// Check if a maturity bucket allows a cross-underlier spread.
    pub fn is_tradeable(&self, key: &MaturityKey) -> bool {
        let underliers: BTreeSet<&str> = self
            .contracts_for_maturity(key)
            .iter()
            .map(Contract::underlier)
            .collect();
        underliers.len() >= 2
    }

    /// Contracts sharing a maturity bucket.
    pub fn contracts_for_maturity(&self, key: &MaturityKey) -> &[Contract] {
        self.by_maturity.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Contracts on an underlier, ordered by maturity.
    pub fn contracts_for_underlier(&self, underlier: &str) -> &[Contract] {
        self.by_underlier
            .get(underlier)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Look up a contract by venue symbol.
    pub fn contract_by_symbol(&self, symbol: &str) -> Option<&Contract> {
        self.by_symbol.get(symbol)
    }

    /// Maturity bucket of a contract symbol.
    pub fn maturity_of(&self, symbol: &str) -> Option<&MaturityKey> {
        self.maturity_by_symbol.get(symbol)
    }

    /// Underlier root tickers present in the catalog.
    pub fn underliers(&self) -> impl Iterator<Item = &str> {
        self.by_underlier.keys().map(String::as_str)
    }

    /// Symbols of every contract in a tradeable maturity.
    pub fn tradeable_symbols(&self) -> Vec<String> {
        self.tradeable_maturities()
            .iter()
            .flat_map(|key| self.contracts_for_maturity(key))
            .map(|c| c.symbol().to_string())
            .collect()
    }

    /// Underliers with at least one contract in a tradeable maturity.
    pub fn tradeable_underliers(&self) -> BTreeSet<String> {
        self.tradeable_maturities()
            .iter()
            .flat_map(|key| self.contracts_for_maturity(key))
            .map(|c| c.underlier().to_string())
            .collect()
    }

    /// Number of contracts.
    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    /// Check if the catalog holds no contracts.
    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}

fn parse_contract(root: &str, record: &VenueInstrument) -> Result<Contract, CatalogError> {
    let symbol = record.instrument_id.symbol.as_str();
    let unparseable = |reason: String| CatalogError::UnparseableInstrument {
        symbol: symbol.to_string(),
        reason,
    };

    let suffix = &symbol[root.len() + 1..];
    if suffix.is_empty() {
        return Err(unparseable("empty maturity suffix".to_string()));
    }

    let raw_date = record
        .maturity_date
        .as_deref()
        .ok_or_else(|| unparseable("missing maturity date".to_string()))?;
    let maturity = parse_maturity_date(raw_date)
        .ok_or_else(|| unparseable(format!("bad maturity date {:?}", raw_date)))?;

    let multiplier = record
        .contract_multiplier
        .filter(|m| m.is_finite() && *m > 0.0)
        .ok_or_else(|| unparseable("missing or non-positive contract multiplier".to_string()))?;

    Ok(Contract::new(symbol, root, maturity, multiplier))
}

/// Parse `YYYYMMDD`, falling back to an ISO `YYYY-MM-DD` prefix.
fn parse_maturity_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    if let Ok(date) = Date::parse(raw, format_description!("[year][month][day]")) {
        return Some(date);
    }
    raw.get(..10)
        .and_then(|prefix| Date::parse(prefix, format_description!("[year]-[month]-[day]")).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::types::VenueInstrumentId;
    use time::macros::date;

    fn record(symbol: &str, maturity: Option<&str>, multiplier: Option<f64>) -> VenueInstrument {
        VenueInstrument {
            instrument_id: VenueInstrumentId {
                market_id: Some("ROFX".to_string()),
                symbol: symbol.to_string(),
            },
            maturity_date: maturity.map(str::to_string),
            contract_multiplier: multiplier,
            cfi_code: Some("FXXXSX".to_string()),
        }
    }

    fn roots() -> Vec<String> {
        vec!["GGAL".to_string(), "PAMP".to_string(), "DLR".to_string()]
    }

    fn venue_list() -> Vec<VenueInstrument> {
        vec![
            record("GGAL/DIC23", Some("20231229"), Some(100.0)),
            record("PAMP/DIC23", Some("20231229"), Some(100.0)),
            record("GGAL/FEB24", Some("20240229"), Some(100.0)),
            record("DLR/ENE24", Some("2024-01-31"), Some(1000.0)),
            record("SOJ.ROS/MAY24", Some("20240531"), Some(1.0)),
        ]
    }

    #[test]
    fn build_groups_by_underlier_and_maturity() {
        let catalog = Catalog::build(&roots(), &venue_list()).unwrap();

        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.contracts_for_underlier("GGAL").len(), 2);
        assert_eq!(
            catalog.contracts_for_underlier("GGAL")[0].symbol(),
            "GGAL/DIC23"
        );
        assert_eq!(catalog.contracts_for_maturity(&"DIC23".into()).len(), 2);
        assert_eq!(
            catalog.maturity_of("DLR/ENE24"),
            Some(&MaturityKey::new("ENE24"))
        );
        assert_eq!(
            catalog.contract_by_symbol("DLR/ENE24").map(Contract::maturity),
            Some(date!(2024 - 01 - 31))
        );
    }

    #[test]
    fn tradeable_maturities_need_two_underliers() {
        let catalog = Catalog::build(&roots(), &venue_list()).unwrap();
        let tradeable = catalog.tradeable_maturities();

        assert_eq!(tradeable.len(), 1);
        assert!(tradeable.contains(&MaturityKey::new("DIC23")));
        assert!(!catalog.is_tradeable(&"FEB24".into()));
        assert_eq!(catalog.tradeable_symbols(), vec!["GGAL/DIC23", "PAMP/DIC23"]);
        assert_eq!(
            catalog.tradeable_underliers().into_iter().collect::<Vec<_>>(),
            vec!["GGAL", "PAMP"]
        );
    }

    #[test]
    fn every_contract_is_in_one_bucket_of_each_kind() {
        let catalog = Catalog::build(&roots(), &venue_list()).unwrap();

        for symbol in ["GGAL/DIC23", "PAMP/DIC23", "GGAL/FEB24", "DLR/ENE24"] {
            let by_underlier = catalog
                .underliers()
                .flat_map(|u| catalog.contracts_for_underlier(u))
                .filter(|c| c.symbol() == symbol)
                .count();
            let key = catalog.maturity_of(symbol).unwrap();
            let by_maturity = catalog
                .contracts_for_maturity(key)
                .iter()
                .filter(|c| c.symbol() == symbol)
                .count();

            assert_eq!(by_underlier, 1, "{symbol}");
            assert_eq!(by_maturity, 1, "{symbol}");
        }
    }

    #[test]
    fn bad_maturity_date_is_unparseable() {
        let list = vec![record("GGAL/DIC23", Some("next year"), Some(100.0))];
        let result = Catalog::build(&roots(), &list);

        assert!(matches!(
            result,
            Err(CatalogError::UnparseableInstrument { ref symbol, .. }) if symbol == "GGAL/DIC23"
        ));
    }

    #[test]
    fn missing_multiplier_is_unparseable() {
        let list = vec![record("GGAL/DIC23", Some("20231229"), None)];

        assert!(matches!(
            Catalog::build(&roots(), &list),
            Err(CatalogError::UnparseableInstrument { .. })
        ));
    }

    #[test]
    fn non_futures_records_are_skipped() {
        let mut option = record("GGAL/DIC23C500", Some("20231229"), Some(100.0));
        option.cfi_code = Some("OCASPS".to_string());

        let catalog = Catalog::build(&roots(), &[option]).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn empty_roots_rejected() {
        assert!(matches!(
            Catalog::build(&[], &venue_list()),
            Err(CatalogError::NoRootTickers)
        ));
    }

    #[test]
    fn lookups_on_unknown_keys_are_empty() {
        let catalog = Catalog::build(&roots(), &venue_list()).unwrap();

        assert!(catalog.contracts_for_maturity(&"JUN30".into()).is_empty());
        assert!(catalog.contracts_for_underlier("YPFD").is_empty());
        assert!(catalog.contract_by_symbol("YPFD/DIC23").is_none());
        assert!(catalog.maturity_of("YPFD/DIC23").is_none());
    }

    #[test]
    fn duplicate_symbols_keep_first() {
        let catalog = Catalog::from_contracts(vec![
            Contract::new("GGAL/DIC23", "GGAL", date!(2023 - 12 - 29), 100.0),
            Contract::new("GGAL/DIC23", "GGAL", date!(2023 - 12 - 30), 10.0),
        ]);

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.contracts_for_underlier("GGAL").len(), 1);
        assert_eq!(
            catalog.contract_by_symbol("GGAL/DIC23").map(Contract::multiplier),
            Some(100.0)
        );
    }
}
