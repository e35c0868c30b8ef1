//! Population-replacement operator settings.

use serde_json::{Map, Value};
use tracing::warn;

use crate::entry::{u32_param, Decoded, SingleMethodForm};

pub const DEFAULT_REPLACEMENT_TOURNAMENT_SIZE: u32 = 3;

/// How offspring are merged back into the population.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplacementMethod {
    /// The offspring generation replaces the parents wholesale.
    Generational,
    /// Steady-state: a deterministic tournament picks who gets evicted.
    SsgaDetTournament { t_size: u32 },
    /// Steady-state: the worst individual is evicted.
    SsgaWorse,
}

impl ReplacementMethod {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Generational => "generational",
            Self::SsgaDetTournament { .. } => "SSGAdetTournament",
            Self::SsgaWorse => "SSGAworse",
        }
    }

    fn parameters(&self) -> Map<String, Value> {
        let mut p = Map::new();
        if let Self::SsgaDetTournament { t_size } = self {
            p.insert("tSize".into(), Value::from(*t_size));
        }
        p
    }

    fn decode(name: &str, p: &Map<String, Value>) -> Option<Self> {
        match name {
            "generational" => Some(Self::Generational),
            "SSGAdetTournament" => Some(Self::SsgaDetTournament {
                t_size: u32_param(p, "tSize", DEFAULT_REPLACEMENT_TOURNAMENT_SIZE),
            }),
            "SSGAworse" => Some(Self::SsgaWorse),
            _ => None,
        }
    }
}

/// Replacement settings: at most one active method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplacementSettings {
    method: Option<ReplacementMethod>,
}

impl ReplacementSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_generational(&mut self) {
        self.method = Some(ReplacementMethod::Generational);
    }

    pub fn set_ssga_det_tournament(&mut self, t_size: u32) {
        self.method = Some(ReplacementMethod::SsgaDetTournament { t_size });
    }

    pub fn set_ssga_worse(&mut self) {
        self.method = Some(ReplacementMethod::SsgaWorse);
    }

    pub fn method(&self) -> Option<&ReplacementMethod> {
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
            match ReplacementMethod::decode(name, &form.parameters) {
                Some(method) => settings.method = Some(method),
                None => {
                    warn!("Skipping unknown replacement method: {name}");
                    skipped = 1;
                }
            }
        }
        Decoded {
            value: settings,
            skipped,
        }
    }

    pub fn from_request(form: &SingleMethodForm) -> Decoded<Self> {
        Self::from_serialized(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn latest_setter_wins() {
        let mut r = ReplacementSettings::new();
        r.set_generational();
        r.set_ssga_det_tournament(30);

        assert_eq!(
            serde_json::to_value(r.serialize()).unwrap(),
            json!({
                "method": "SSGAdetTournament",
                "parameters": {"tSize": 30}
            })
        );
    }

    #[test]
    fn round_trip_is_fixed_point() {
        let mut r = ReplacementSettings::new();
        r.set_ssga_worse();

        let encoded = r.serialize();
        let decoded = ReplacementSettings::from_serialized(&encoded);
        assert_eq!(decoded.skipped, 0);
        assert_eq!(decoded.value.serialize(), encoded);
    }

    #[test]
    fn tournament_size_defaults_when_missing() {
        let form: SingleMethodForm =
            serde_json::from_value(json!({"method": "SSGAdetTournament", "parameters": {}}))
                .unwrap();
        let decoded = ReplacementSettings::from_serialized(&form);
        assert_eq!(
            decoded.value.method(),
            Some(&ReplacementMethod::SsgaDetTournament {
                t_size: DEFAULT_REPLACEMENT_TOURNAMENT_SIZE
            })
        );
    }
}
