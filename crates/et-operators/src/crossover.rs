//! Crossover operator settings. Multi-method, same container semantics as
//! mutation.

use serde_json::{Map, Value};
use tracing::warn;

use crate::entry::{f64_param, req_f64, req_u32, req_usize, Decoded, MethodEntry};
use crate::method_set::{MethodKey, MethodSet};

pub const DEFAULT_HYPERCUBE_ALPHA: f64 = 0.0;
pub const DEFAULT_SBX_ETA: f64 = 1.0;
pub const DEFAULT_SEGMENT_ALPHA: f64 = 0.0;
pub const DEFAULT_UNIFORM_PREFERENCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub enum CrossoverMethod {
    Hypercube {
        num_features: usize,
        min: f64,
        max: f64,
        alpha: f64,
    },
    NPoint {
        n: u32,
    },
    /// Simulated binary crossover.
    Sbx {
        num_features: usize,
        min: f64,
        max: f64,
        eta: f64,
    },
    Segment {
        num_features: usize,
        min: f64,
        max: f64,
        alpha: f64,
    },
    Uniform {
        preference: f64,
    },
}

impl MethodKey for CrossoverMethod {
    fn key(&self) -> &'static str {
        match self {
            Self::Hypercube { .. } => "hypercube",
            Self::NPoint { .. } => "nPoint",
            Self::Sbx { .. } => "sbx",
            Self::Segment { .. } => "segment",
            Self::Uniform { .. } => "uniform",
        }
    }
}

impl CrossoverMethod {
    fn parameters(&self) -> Map<String, Value> {
        let mut p = Map::new();
        match self {
            Self::Hypercube {
                num_features,
                min,
                max,
                alpha,
            }
            | Self::Segment {
                num_features,
                min,
                max,
                alpha,
            } => {
                p.insert("numFeatures".into(), Value::from(*num_features as u64));
                p.insert("min".into(), Value::from(*min));
                p.insert("max".into(), Value::from(*max));
                p.insert("alpha".into(), Value::from(*alpha));
            }
            Self::NPoint { n } => {
                p.insert("n".into(), Value::from(*n));
            }
            Self::Sbx {
                num_features,
                min,
                max,
                eta,
            } => {
                p.insert("numFeatures".into(), Value::from(*num_features as u64));
                p.insert("min".into(), Value::from(*min));
                p.insert("max".into(), Value::from(*max));
                p.insert("eta".into(), Value::from(*eta));
            }
            Self::Uniform { preference } => {
                p.insert("preference".into(), Value::from(*preference));
            }
        }
        p
    }

    fn decode(name: &str, p: &Map<String, Value>) -> Option<Self> {
        match name {
            "hypercube" => Some(Self::Hypercube {
                num_features: req_usize(p, "numFeatures")?,
                min: req_f64(p, "min")?,
                max: req_f64(p, "max")?,
                alpha: f64_param(p, "alpha", DEFAULT_HYPERCUBE_ALPHA),
            }),
            "nPoint" => Some(Self::NPoint {
                n: req_u32(p, "n")?,
            }),
            "sbx" => Some(Self::Sbx {
                num_features: req_usize(p, "numFeatures")?,
                min: req_f64(p, "min")?,
                max: req_f64(p, "max")?,
                eta: f64_param(p, "eta", DEFAULT_SBX_ETA),
            }),
            "segment" => Some(Self::Segment {
                num_features: req_usize(p, "numFeatures")?,
                min: req_f64(p, "min")?,
                max: req_f64(p, "max")?,
                alpha: f64_param(p, "alpha", DEFAULT_SEGMENT_ALPHA),
            }),
            "uniform" => Some(Self::Uniform {
                preference: f64_param(p, "preference", DEFAULT_UNIFORM_PREFERENCE),
            }),
            _ => None,
        }
    }

    fn decode_request(name: &str, p: &Map<String, Value>, num_features: usize) -> Option<Self> {
        match name {
            "hypercube" => Some(Self::Hypercube {
                num_features,
                min: req_f64(p, "min")?,
                max: req_f64(p, "max")?,
                alpha: f64_param(p, "alpha", DEFAULT_HYPERCUBE_ALPHA),
            }),
            "sbx" => Some(Self::Sbx {
                num_features,
                min: req_f64(p, "min")?,
                max: req_f64(p, "max")?,
                eta: f64_param(p, "eta", DEFAULT_SBX_ETA),
            }),
            "segment" => Some(Self::Segment {
                num_features,
                min: req_f64(p, "min")?,
                max: req_f64(p, "max")?,
                alpha: f64_param(p, "alpha", DEFAULT_SEGMENT_ALPHA),
            }),
            _ => Self::decode(name, p),
        }
    }
}

/// Crossover settings: an ordered set of simultaneously active methods.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrossoverSettings {
    methods: MethodSet<CrossoverMethod>,
}

impl CrossoverSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_hypercube(&mut self, num_features: usize, min: f64, max: f64, alpha: f64) {
        self.methods.upsert(CrossoverMethod::Hypercube {
            num_features,
            min,
            max,
            alpha,
        });
    }

    pub fn set_n_point(&mut self, n: u32) {
        self.methods.upsert(CrossoverMethod::NPoint { n });
    }

    pub fn set_sbx(&mut self, num_features: usize, min: f64, max: f64, eta: f64) {
        self.methods.upsert(CrossoverMethod::Sbx {
            num_features,
            min,
            max,
            eta,
        });
    }

    pub fn set_segment(&mut self, num_features: usize, min: f64, max: f64, alpha: f64) {
        self.methods.upsert(CrossoverMethod::Segment {
            num_features,
            min,
            max,
            alpha,
        });
    }

    pub fn set_uniform(&mut self, preference: f64) {
        self.methods.upsert(CrossoverMethod::Uniform { preference });
    }

    pub fn methods(&self) -> &[CrossoverMethod] {
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
            match CrossoverMethod::decode(&entry.method, &entry.parameters) {
                Some(method) => settings.methods.upsert(method),
                None => {
                    warn!("Skipping unusable crossover method: {}", entry.method);
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
            match CrossoverMethod::decode_request(&entry.method, &entry.parameters, num_features) {
                Some(method) => settings.methods.upsert(method),
                None => {
                    warn!("Skipping unusable crossover method: {}", entry.method);
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
