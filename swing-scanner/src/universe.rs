//! Categorized symbol universe.
//!
//! Symbols come from the `universe` config section; when it is empty the
//! built-in index constituents are used. A symbol listed in more than one
//! category keeps the first one (Next 50, then Midcap, then Smallcap).

use std::collections::{HashMap, HashSet};
use swing_common::UniverseConfig;

use crate::analysis::ranking::{UniverseRanker, DEFAULT_CATEGORY};

pub const NEXT50: &str = "Next 50";
pub const MIDCAP: &str = "Midcap";
pub const SMALLCAP: &str = "Smallcap";

const BUILTIN_NEXT50: &[&str] = &[
    "ADANIENSOL.NS", "ADANIGREEN.NS", "ADANIPOWER.NS", "ATGL.NS", "AMBUJACEM.NS",
    "BEL.NS", "BANKBARODA.NS", "BOSCHLTD.NS", "CANBK.NS", "CHOLAFIN.NS",
    "DLF.NS", "DMART.NS", "GAIL.NS", "GODREJCP.NS", "HAL.NS",
    "HAVELLS.NS", "ICICIGI.NS", "IOC.NS", "IRCTC.NS", "IRFC.NS",
    "JINDALSTEL.NS", "JIOFIN.NS", "LODHA.NS", "MARICO.NS", "NAUKRI.NS",
    "PIDILITIND.NS", "PFC.NS", "PNB.NS", "RECLTD.NS", "SHREECEM.NS",
    "SIEMENS.NS", "TORNTPOWER.NS", "TRENT.NS", "TVSMOTOR.NS", "VEDL.NS",
];

const BUILTIN_MIDCAP: &[&str] = &[
    "YESBANK.NS", "FEDERALBNK.NS", "IDFCFIRSTB.NS", "AUBANK.NS", "M&MFIN.NS",
    "LICHSGFIN.NS", "TIINDIA.NS", "ASHOKLEY.NS", "APOLLOTYRE.NS", "MRF.NS",
    "PERSISTENT.NS", "COFORGE.NS", "KPITTECH.NS", "MPHASIS.NS", "TATAELXSI.NS",
    "MAXHEALTH.NS", "LUPIN.NS", "AUROPHARMA.NS", "ALKEM.NS", "FORTIS.NS",
    "CUMMINSIND.NS", "BHEL.NS", "CGPOWER.NS", "POLYCAB.NS", "SUZLON.NS",
    "PRESTIGE.NS", "OBEROIRLTY.NS", "HINDPETRO.NS", "OILINDIA.NS", "SOLARINDS.NS",
];

const BUILTIN_SMALLCAP: &[&str] = &[
    "HINDCOPPER.NS", "COCHINSHIP.NS", "NBCC.NS", "HUDCO.NS", "NATIONALUM.NS",
    "NMDC.NS", "SAIL.NS", "BSOFT.NS", "CYIENT.NS", "CDSL.NS",
    "BSE.NS", "MCX.NS", "CAMS.NS", "ANGELONE.NS", "IEX.NS",
    "RBLBANK.NS", "MANAPPURAM.NS", "PVRINOX.NS", "BLUESTARCO.NS", "KEC.NS",
    "GRSE.NS", "MAZDOCK.NS", "BDL.NS", "TITAGARH.NS", "WELCORP.NS",
];

/// Ordered, de-duplicated symbols with their categories.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    symbols: Vec<String>,
    categories: HashMap<String, String>,
}

impl Universe {
    /// Build from config, falling back to the built-in lists when nothing is configured.
    pub fn from_config(config: &UniverseConfig) -> Self {
        if config.is_empty() {
            tracing::info!("No universe configured, using built-in constituents");
            return Self::builtin();
        }

        let mut universe = Self::default();
        universe.extend(&config.next50, Some(NEXT50));
        universe.extend(&config.midcap, Some(MIDCAP));
        universe.extend(&config.smallcap, Some(SMALLCAP));
        universe.extend(&config.extra, None);
        universe
    }

    pub fn builtin() -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut universe = Self::default();
        universe.extend(&owned(BUILTIN_NEXT50), Some(NEXT50));
        universe.extend(&owned(BUILTIN_MIDCAP), Some(MIDCAP));
        universe.extend(&owned(BUILTIN_SMALLCAP), Some(SMALLCAP));
        universe
    }

    fn extend(&mut self, list: &[String], category: Option<&str>) {
        let mut seen: HashSet<String> = self.symbols.iter().cloned().collect();
        for raw in list {
            let symbol = raw.trim().to_uppercase();
            if symbol.is_empty() || !seen.insert(symbol.clone()) {
                continue;
            }
            if let Some(category) = category {
                self.categories.insert(symbol.clone(), category.to_string());
            }
            self.symbols.push(symbol);
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn category_of(&self, symbol: &str) -> &str {
        self.categories
            .get(symbol)
            .map_or(DEFAULT_CATEGORY, String::as_str)
    }

    /// Ranker carrying this universe's categories.
    pub fn ranker(&self) -> UniverseRanker {
        UniverseRanker::new(self.categories.clone())
    }
}
