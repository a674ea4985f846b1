//! # Configuração da Resolução
//!
//! Um único struct imutável, [`ResolutionConfig`], é passado por referência para
//! cada componente no momento da construção. Não existe estado global.
//!
//! ## Presets
//!
//! | Preset          | `min_combined_score` | Pesos (string/token/semantic/graph) |
//! |-----------------|----------------------|-------------------------------------|
//! | `aggressive`    | 0.65                 | 0.2 / 0.4 / 0.2 / 0.2               |
//! | `conservative`  | 0.85                 | 0.2 / 0.4 / 0.2 / 0.2               |
//! | `name_focused`  | 0.70                 | 0.2 / 0.5 / 0.15 / 0.15             |
//!
//! Ajustes pontuais são aplicados por cima de um preset via [`ConfigOverrides`]
//! e a combinação é sempre validada ([`ResolutionConfig::validate`]).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Pesos da soma ponderada. O sinal de cargo/abreviação não tem peso: ele atua
/// como override no [`crate::scorer::CombinedScorer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub string: f64,
    pub token: f64,
    pub semantic: f64,
    pub graph: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            string: 0.2,
            token: 0.4,
            semantic: 0.2,
            graph: 0.2,
        }
    }
}

impl SignalWeights {
    fn named(&self) -> [(&'static str, f64); 4] {
        [
            ("string", self.string),
            ("token", self.token),
            ("semantic", self.semantic),
            ("graph", self.graph),
        ]
    }
}

/// Liga/desliga cada sinal individualmente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalToggles {
    pub string: bool,
    pub token: bool,
    pub semantic: bool,
    pub graph: bool,
    pub role_abbreviation: bool,
}

impl Default for SignalToggles {
    fn default() -> Self {
        Self {
            string: true,
            token: true,
            semantic: true,
            graph: true,
            role_abbreviation: true,
        }
    }
}

/// Pacotes nomeados de limiares e pesos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Mais merges (favorece recall).
    Aggressive,
    /// Menos merges (favorece precisão).
    Conservative,
    /// Padrão com peso maior na sobreposição de tokens do nome.
    NameFocused,
}

impl Preset {
    pub fn name(&self) -> &'static str {
        match self {
            Preset::Aggressive => "aggressive",
            Preset::Conservative => "conservative",
            Preset::NameFocused => "name_focused",
        }
    }

    pub fn all() -> &'static [Preset] {
        &[Preset::Aggressive, Preset::Conservative, Preset::NameFocused]
    }

    /// Configuração resolvida do preset.
    pub fn config(&self) -> ResolutionConfig {
        let base = ResolutionConfig::default();
        match self {
            Preset::Aggressive => ResolutionConfig {
                min_combined_score: 0.65,
                ..base
            },
            Preset::Conservative => ResolutionConfig {
                min_combined_score: 0.85,
                ..base
            },
            Preset::NameFocused => ResolutionConfig {
                min_combined_score: 0.7,
                weights: SignalWeights {
                    string: 0.2,
                    token: 0.5,
                    semantic: 0.15,
                    graph: 0.15,
                },
                ..base
            },
        }
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "aggressive" => Ok(Preset::Aggressive),
            "conservative" => Ok(Preset::Conservative),
            "name_focused" => Ok(Preset::NameFocused),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }
}

/// Configuração completa de uma passada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    pub weights: SignalWeights,
    pub toggles: SignalToggles,
    /// Piso do score combinado para que uma aresta una dois clusters.
    pub min_combined_score: f64,
    /// Faixa abaixo do piso em que arestas viram quase-merges no diagnóstico.
    pub clustering_tolerance: f64,
    /// Similaridade de string a partir da qual o par é tratado como idêntico.
    pub exact_match_threshold: f64,
    /// Valor mínimo imposto pelo override de cargo/abreviação.
    pub high_similarity_threshold: f64,
    /// Arestas abaixo do piso mas acima deste valor também são quase-merges.
    pub partial_match_threshold: f64,
    /// Descrições com similaridade acima disso são consideradas duplicadas.
    pub description_similarity_threshold: f64,
    /// Limite, em caracteres, da descrição consolidada.
    pub max_description_len: usize,
    /// Tamanho do vocabulário TF-IDF.
    pub semantic_max_features: usize,
    /// Códigos diferentes ("E-1" vs "E-2") vetam o par em tipos legislativos.
    pub preserve_legislative_codes: bool,
    /// Tamanho do pool de workers; `None` usa o pool global do rayon.
    pub worker_threads: Option<usize>,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            toggles: SignalToggles::default(),
            min_combined_score: 0.7,
            clustering_tolerance: 0.15,
            exact_match_threshold: 1.0,
            high_similarity_threshold: 0.85,
            partial_match_threshold: 0.6,
            description_similarity_threshold: 0.9,
            max_description_len: 2000,
            semantic_max_features: 1000,
            preserve_legislative_codes: true,
            worker_threads: None,
        }
    }
}

impl ResolutionConfig {
    /// Preset (ou o padrão) + overrides, já validado.
    pub fn from_parts(
        preset: Option<Preset>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut config = preset.map(|p| p.config()).unwrap_or_default();
        overrides.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (signal, value) in self.weights.named() {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { signal, value });
            }
        }
        let t = &self.toggles;
        let enabled_sum: f64 = [
            (t.string, self.weights.string),
            (t.token, self.weights.token),
            (t.semantic, self.weights.semantic),
            (t.graph, self.weights.graph),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, w)| w)
        .sum();
        if enabled_sum <= 0.0 {
            return Err(ConfigError::ZeroWeights);
        }

        for (name, value) in [
            ("min_combined_score", self.min_combined_score),
            ("exact_match_threshold", self.exact_match_threshold),
            ("high_similarity_threshold", self.high_similarity_threshold),
            ("partial_match_threshold", self.partial_match_threshold),
            ("description_similarity_threshold", self.description_similarity_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }
        if self.min_combined_score > self.high_similarity_threshold
            || self.high_similarity_threshold > self.exact_match_threshold
        {
            return Err(ConfigError::ThresholdOrder {
                min: self.min_combined_score,
                high: self.high_similarity_threshold,
                exact: self.exact_match_threshold,
            });
        }
        if !self.clustering_tolerance.is_finite() || self.clustering_tolerance < 0.0 {
            return Err(ConfigError::NegativeTolerance(self.clustering_tolerance));
        }
        if self.max_description_len == 0 {
            return Err(ConfigError::ZeroDescriptionLen);
        }
        if self.worker_threads == Some(0) {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }
}

/// Ajustes explícitos aplicados sobre um preset. Campos ausentes não mudam nada.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub weights: Option<SignalWeights>,
    pub toggles: Option<SignalToggles>,
    pub min_combined_score: Option<f64>,
    pub clustering_tolerance: Option<f64>,
    pub exact_match_threshold: Option<f64>,
    pub high_similarity_threshold: Option<f64>,
    pub partial_match_threshold: Option<f64>,
    pub description_similarity_threshold: Option<f64>,
    pub max_description_len: Option<usize>,
    pub semantic_max_features: Option<usize>,
    pub preserve_legislative_codes: Option<bool>,
    pub worker_threads: Option<usize>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut ResolutionConfig) {
        if let Some(w) = self.weights {
            config.weights = w;
        }
        if let Some(t) = self.toggles {
            config.toggles = t;
        }
        if let Some(v) = self.min_combined_score {
            config.min_combined_score = v;
        }
        if let Some(v) = self.clustering_tolerance {
            config.clustering_tolerance = v;
        }
        if let Some(v) = self.exact_match_threshold {
            config.exact_match_threshold = v;
        }
        if let Some(v) = self.high_similarity_threshold {
            config.high_similarity_threshold = v;
        }
        if let Some(v) = self.partial_match_threshold {
            config.partial_match_threshold = v;
        }
        if let Some(v) = self.description_similarity_threshold {
            config.description_similarity_threshold = v;
        }
        if let Some(v) = self.max_description_len {
            config.max_description_len = v;
        }
        if let Some(v) = self.semantic_max_features {
            config.semantic_max_features = v;
        }
        if let Some(v) = self.preserve_legislative_codes {
            config.preserve_legislative_codes = v;
        }
        if let Some(v) = self.worker_threads {
            config.worker_threads = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ResolutionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_combined_score, 0.7);
        assert_eq!(config.weights.token, 0.4);
    }

    #[test]
    fn test_presets_only_move_threshold() {
        assert_eq!(Preset::Aggressive.config().min_combined_score, 0.65);
        assert_eq!(Preset::Conservative.config().min_combined_score, 0.85);
        assert_eq!(Preset::Aggressive.config().weights, SignalWeights::default());
        let nf = Preset::NameFocused.config();
        assert_eq!(nf.min_combined_score, 0.7);
        assert!(nf.weights.token > SignalWeights::default().token);
        for preset in Preset::all() {
            assert!(preset.config().validate().is_ok(), "{}", preset.name());
        }
    }

    #[test]
    fn test_preset_from_str() {
        assert_eq!("name-focused".parse::<Preset>(), Ok(Preset::NameFocused));
        assert_eq!("AGGRESSIVE".parse::<Preset>(), Ok(Preset::Aggressive));
        assert_eq!(
            "loose".parse::<Preset>(),
            Err(ConfigError::UnknownPreset("loose".into()))
        );
    }

    #[test]
    fn test_overrides_apply_on_top_of_preset() {
        let overrides = ConfigOverrides {
            min_combined_score: Some(0.8),
            worker_threads: Some(2),
            ..Default::default()
        };
        let config = ResolutionConfig::from_parts(Some(Preset::Aggressive), &overrides).unwrap();
        assert_eq!(config.min_combined_score, 0.8);
        assert_eq!(config.worker_threads, Some(2));
    }

    #[test]
    fn test_overrides_cap_semantic_vocabulary() {
        let overrides: ConfigOverrides =
            serde_json::from_str(r#"{"semantic_max_features": 50}"#).unwrap();
        let config = ResolutionConfig::from_parts(Some(Preset::NameFocused), &overrides).unwrap();
        assert_eq!(config.semantic_max_features, 50);
        assert_eq!(config.min_combined_score, 0.7);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad_order = ConfigOverrides {
            min_combined_score: Some(0.9),
            ..Default::default()
        };
        assert!(matches!(
            ResolutionConfig::from_parts(None, &bad_order),
            Err(ConfigError::ThresholdOrder { .. })
        ));

        let negative = ConfigOverrides {
            weights: Some(SignalWeights { token: -1.0, ..Default::default() }),
            ..Default::default()
        };
        assert!(matches!(
            ResolutionConfig::from_parts(None, &negative),
            Err(ConfigError::InvalidWeight { signal: "token", .. })
        ));

        let all_off = ConfigOverrides {
            toggles: Some(SignalToggles {
                string: false,
                token: false,
                semantic: false,
                graph: false,
                role_abbreviation: true,
            }),
            ..Default::default()
        };
        assert_eq!(ResolutionConfig::from_parts(None, &all_off), Err(ConfigError::ZeroWeights));

        let zero_workers = ConfigOverrides { worker_threads: Some(0), ..Default::default() };
        assert_eq!(
            ResolutionConfig::from_parts(None, &zero_workers),
            Err(ConfigError::ZeroWorkers)
        );
    }

    #[test]
    fn test_config_deserializes_partially() {
        let config: ResolutionConfig =
            serde_json::from_str(r#"{"min_combined_score": 0.75}"#).unwrap();
        assert_eq!(config.min_combined_score, 0.75);
        assert_eq!(config.clustering_tolerance, 0.15);
    }
}
