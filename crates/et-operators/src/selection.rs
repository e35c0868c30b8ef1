//! Parent-selection operator settings.

use serde_json::{Map, Value};
use tracing::warn;

use crate::entry::{f64_param, u32_param, Decoded, SingleMethodForm};

pub const DEFAULT_RANK_PRESSURE: f64 = 2.0;
pub const DEFAULT_RANK_EXPONENT: f64 = 1.0;
pub const DEFAULT_ROULETTE_PRESSURE: f64 = 2.0;
pub const DEFAULT_TOURNAMENT_SIZE: u32 = 3;

/// How parents are chosen from the population.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionMethod {
    Random,
    Rank { pressure: f64, exponent: f64 },
    Roulette,
    RouletteScaled { pressure: f64 },
    /// Stochastic universal sampling.
    StochasticUniversal,
    Tournament { t_size: u32 },
}

impl SelectionMethod {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Rank { .. } => "rank",
            Self::Roulette => "roulette",
            Self::RouletteScaled { .. } => "roulette_scaled",
            Self::StochasticUniversal => "stochiastic",
            Self::Tournament { .. } => "tournament",
        }
    }

    fn parameters(&self) -> Map<String, Value> {
        let mut p = Map::new();
        match self {
            Self::Rank { pressure, exponent } => {
                p.insert("pressure".into(), Value::from(*pressure));
                p.insert("exponent".into(), Value::from(*exponent));
            }
            Self::RouletteScaled { pressure } => {
                p.insert("pressure".into(), Value::from(*pressure));
            }
            Self::Tournament { t_size } => {
                p.insert("tSize".into(), Value::from(*t_size));
            }
            Self::Random | Self::Roulette | Self::StochasticUniversal => {}
        }
        p
    }

    /// Explicit decode table; `None` means the name is unknown.
    fn decode(name: &str, p: &Map<String, Value>) -> Option<Self> {
        match name {
            "random" => Some(Self::Random),
            "rank" => Some(Self::Rank {
                pressure: f64_param(p, "pressure", DEFAULT_RANK_PRESSURE),
                exponent: f64_param(p, "exponent", DEFAULT_RANK_EXPONENT),
            }),
            "roulette" => Some(Self::Roulette),
            "roulette_scaled" => Some(Self::RouletteScaled {
                pressure: f64_param(p, "pressure", DEFAULT_ROULETTE_PRESSURE),
            }),
            "stochiastic" => Some(Self::StochasticUniversal),
            "tournament" => Some(Self::Tournament {
                t_size: u32_param(p, "tSize", DEFAULT_TOURNAMENT_SIZE),
            }),
            _ => None,
        }
    }
}

/// Selection settings: at most one active method. Each setter overwrites
/// whatever was active before.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSettings {
    method: Option<SelectionMethod>,
}

impl SelectionSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_random(&mut self) {
        self.method = Some(SelectionMethod::Random);
    }

    pub fn set_rank(&mut self, pressure: f64, exponent: f64) {
        self.method = Some(SelectionMethod::Rank { pressure, exponent });
    }

    pub fn set_roulette(&mut self) {
        self.method = Some(SelectionMethod::Roulette);
    }

    pub fn set_roulette_scaled(&mut self, pressure: f64) {
        self.method = Some(SelectionMethod::RouletteScaled { pressure });
    }

    pub fn set_stochastic_universal(&mut self) {
        self.method = Some(SelectionMethod::StochasticUniversal);
    }

    pub fn set_tournament(&mut self, t_size: u32) {
        self.method = Some(SelectionMethod::Tournament { t_size });
    }

    pub fn method(&self) -> Option<&SelectionMethod> {
        self.method.as_ref()
    }

    pub fn serialize(&self) -> SingleMethodForm {
        match &self.method {
            Some(m) => SingleMethodForm {
                method: Some(m.key().to_string()),
                parameters: m.parameters(),
            },
            None => SingleMethodForm::empty(),
        }
    }

    pub fn from_serialized(form: &SingleMethodForm) -> Decoded<Self> {
        let mut settings = Self::new();
        let mut skipped = 0;
        if let Some(name) = &form.method {
            match SelectionMethod::decode(name, &form.parameters) {
                Some(method) => settings.method = Some(method),
                None => {
                    warn!("Skipping unknown selection method: {name}");
                    skipped = 1;
                }
            }
        }
        Decoded {
            value: settings,
            skipped,
        }
    }

    /// Build from an operator-supplied request. Selection methods carry no
    /// feature-sized parameters, so this is the same replay as
    /// [`Self::from_serialized`].
    pub fn from_request(form: &SingleMethodForm) -> Decoded<Self> {
        Self::from_serialized(form)
    }
}
