//! Mutation operator settings.
//!
//! Unlike selection and replacement, several mutation methods may be active
//! at once; the settings hold an insertion-ordered set keyed by method name.

use serde_json::{Map, Value};
use tracing::warn;

use crate::entry::{bool_param, f64_param, req_f64, req_usize, Decoded, MethodEntry};
use crate::method_set::{MethodKey, MethodSet};

pub const DEFAULT_BINARY_RATE: f64 = 0.05;
pub const DEFAULT_BINARY_NORMALIZE: bool = false;

#[derive(Debug, Clone, PartialEq)]
pub enum MutationMethod {
    /// Bit-flip mutation over the selection genome.
    Binary { rate: f64, normalize: bool },
    /// Gaussian perturbation over the weight genome; sized per feature.
    Gauss {
        number_features: usize,
        min: f64,
        max: f64,
        sigma: f64,
        rate: f64,
    },
    Inversion,
    Shift,
    Swap,
}

impl MethodKey for MutationMethod {
    fn key(&self) -> &'static str {
        match self {
            Self::Binary { .. } => "binary",
            Self::Gauss { .. } => "gauss",
            Self::Inversion => "inversion",
            Self::Shift => "shift",
            Self::Swap => "swap",
        }
    }
}

impl MutationMethod {
    fn parameters(&self) -> Map<String, Value> {
        let mut p = Map::new();
        match self {
            Self::Binary { rate, normalize } => {
                p.insert("rate".into(), Value::from(*rate));
                p.insert("normalize".into(), Value::from(*normalize));
            }
            Self::Gauss {
                number_features,
                min,
                max,
                sigma,
                rate,
            } => {
                p.insert("numberFeatures".into(), Value::from(*number_features as u64));
                p.insert("min".into(), Value::from(*min));
                p.insert("max".into(), Value::from(*max));
                p.insert("sigma".into(), Value::from(*sigma));
                p.insert("rate".into(), Value::from(*rate));
            }
            Self::Inversion | Self::Shift | Self::Swap => {}
        }
        p
    }

    /// Decode from the durable form, where gauss carries its own feature
    /// count. `None` means unknown name or a required parameter is missing.
    fn decode(name: &str, p: &Map<String, Value>) -> Option<Self> {
        match name {
            "binary" => Some(Self::Binary {
                rate: f64_param(p, "rate", DEFAULT_BINARY_RATE),
                normalize: bool_param(p, "normalize", DEFAULT_BINARY_NORMALIZE),
            }),
            "gauss" => Some(Self::Gauss {
                number_features: req_usize(p, "numberFeatures")?,
                min: req_f64(p, "min")?,
                max: req_f64(p, "max")?,
                sigma: req_f64(p, "sigma")?,
                rate: req_f64(p, "rate")?,
            }),
            "inversion" => Some(Self::Inversion),
            "shift" => Some(Self::Shift),
            "swap" => Some(Self::Swap),
            _ => None,
        }
    }

    /// Decode from an operator request, where gauss is sized from the
    /// classifier's feature count rather than the request itself.
    fn decode_request(name: &str, p: &Map<String, Value>, num_features: usize) -> Option<Self> {
        match name {
            "gauss" => Some(Self::Gauss {
                number_features: num_features,
                min: req_f64(p, "min")?,
                max: req_f64(p, "max")?,
                sigma: req_f64(p, "sigma")?,
                rate: req_f64(p, "rate")?,
            }),
            _ => Self::decode(name, p),
        }
    }
}

/// Mutation settings: an ordered set of simultaneously active methods.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationSettings {
    methods: MethodSet<MutationMethod>,
}

impl MutationSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_binary(&mut self, rate: f64, normalize: bool) {
        self.methods.upsert(MutationMethod::Binary { rate, normalize });
    }

    pub fn set_gauss(&mut self, number_features: usize, min: f64, max: f64, sigma: f64, rate: f64) {
        self.methods.upsert(MutationMethod::Gauss {
            number_features,
            min,
            max,
            sigma,
            rate,
        });
    }

    pub fn set_inversion(&mut self) {
        self.methods.upsert(MutationMethod::Inversion);
    }

    pub fn set_shift(&mut self) {
        self.methods.upsert(MutationMethod::Shift);
    }

    pub fn set_swap(&mut self) {
        self.methods.upsert(MutationMethod::Swap);
    }

    pub fn methods(&self) -> &[MutationMethod] {
        self.methods.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn serialize(&self) -> Vec<MethodEntry> {
        self.methods
            .iter()
            .map(|m| MethodEntry {
                method: m.key().to_string(),
                parameters: m.parameters(),
            })
            .collect()
    }

    pub fn from_serialized(entries: &[MethodEntry]) -> Decoded<Self> {
        let mut settings = Self::new();
        let mut skipped = 0;
        for entry in entries {
            match MutationMethod::decode(&entry.method, &entry.parameters) {
                Some(method) => settings.methods.upsert(method),
                None => {
                    warn!("Skipping unusable mutation method: {}", entry.method);
                    skipped += 1;
                }
            }
        }
        Decoded {
            value: settings,
            skipped,
        }
    }

    pub fn from_request(entries: &[MethodEntry], num_features: usize) -> Decoded<Self> {
        let mut settings = Self::new();
        let mut skipped = 0;
        for entry in entries {
            match MutationMethod::decode_request(&entry.method, &entry.parameters, num_features) {
                Some(method) => settings.methods.upsert(method),
                None => {
                    warn!("Skipping unusable mutation method: {}", entry.method);
                    skipped += 1;
                }
            }
        }
        Decoded {
            value: settings,
            skipped,
        }
    }
}
