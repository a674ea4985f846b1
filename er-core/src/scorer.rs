//! # Scorer Combinado
//!
//! Agrega os sinais de um par candidato em um único `combined_score`, nesta ordem:
//!
//! 1. **Código legislativo**: itens de pauta/portarias/resoluções com códigos
//!    principais em conflito ("E-1" vs "E-2") são vetados (`combined = 0`).
//! 2. **Exato**: nomes normalizados idênticos, ou similaridade de string acima de
//!    `exact_match_threshold` → `combined = 1.0`.
//! 3. **Soma ponderada** normalizada pelos pesos dos sinais que participaram:
//!    `Σ wᵢ·sᵢ / Σ wᵢ`. Sinais desligados ou que se abstiveram ficam de fora.
//! 4. **Override de cargo/abreviação**: se o padrão casou,
//!    `combined = max(ponderado, high_similarity_threshold)`.
//! 5. **Código compartilhado**: atos do mesmo tipo com o mesmo código principal
//!    ("Ordinance 2024-01" e "Ordinance No. 2024-01 amending Chapter 62") recebem
//!    o mesmo piso `high_similarity_threshold`.
//!
//! O cálculo das arestas é paralelo (rayon). Cada worker produz uma aresta
//! imutável; `collect` preserva a ordem dos candidatos.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::blocking::{CandidatePair, CandidateSet};
use crate::config::ResolutionConfig;
use crate::error::ResolveError;
use crate::mention::{EntityType, MentionId};
use crate::normalize::{compare_codes, CodeRelation};
use crate::signals::{PatternMatch, RoleAbbreviation, ScoringContext, SignalKind, PROVIDERS};

/// Qual regra produziu o `combined_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTier {
    Exact,
    RoleOverride,
    Weighted,
    CodeMatch,
    CodeMismatch,
}

/// Justificativa legível de uma aresta (aparece no relatório de merge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchReason {
    ExactName,
    Initials,
    Acronym,
    RoleTitle,
    RoleAttachment,
    /// Sinal ponderado de maior contribuição.
    Signal { signal: SignalKind },
    SharedCode,
    CodeMismatch,
}

impl MatchReason {
    pub fn label(&self) -> String {
        match self {
            MatchReason::ExactName => "exact name match".to_string(),
            MatchReason::Initials => "abbreviated given name".to_string(),
            MatchReason::Acronym => "acronym of full name".to_string(),
            MatchReason::RoleTitle => "role title with matching surname".to_string(),
            MatchReason::RoleAttachment => "role attached to surname in same document".to_string(),
            MatchReason::Signal { signal } => format!("strongest signal: {}", signal.name()),
            MatchReason::SharedCode => "same legislative code".to_string(),
            MatchReason::CodeMismatch => "different legislative codes".to_string(),
        }
    }
}

impl From<PatternMatch> for MatchReason {
    fn from(pattern: PatternMatch) -> Self {
        match pattern {
            PatternMatch::Initials => MatchReason::Initials,
            PatternMatch::Acronym => MatchReason::Acronym,
            PatternMatch::RoleTitle => MatchReason::RoleTitle,
            PatternMatch::RoleOnly => MatchReason::RoleAttachment,
        }
    }
}

/// Par candidato pontuado, com o detalhamento por sinal para auditoria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    pub mention_a_id: MentionId,
    pub mention_b_id: MentionId,
    #[serde(skip)]
    pub a: usize,
    #[serde(skip)]
    pub b: usize,
    pub signal_scores: BTreeMap<SignalKind, f64>,
    pub combined_score: f64,
    pub tier: ScoreTier,
    pub reason: MatchReason,
}

pub struct CombinedScorer<'c> {
    config: &'c ResolutionConfig,
}

impl<'c> CombinedScorer<'c> {
    pub fn new(config: &'c ResolutionConfig) -> Self {
        Self { config }
    }

    fn enabled(&self, kind: SignalKind) -> bool {
        let t = &self.config.toggles;
        match kind {
            SignalKind::String => t.string,
            SignalKind::Token => t.token,
            SignalKind::Semantic => t.semantic,
            SignalKind::Graph => t.graph,
            SignalKind::RoleAbbreviation => t.role_abbreviation,
        }
    }

    fn weight(&self, kind: SignalKind) -> Option<f64> {
        let w = &self.config.weights;
        match kind {
            SignalKind::String => Some(w.string),
            SignalKind::Token => Some(w.token),
            SignalKind::Semantic => Some(w.semantic),
            SignalKind::Graph => Some(w.graph),
            SignalKind::RoleAbbreviation => None,
        }
    }

    pub fn score_pair(&self, pair: CandidatePair, ctx: &ScoringContext<'_>) -> SimilarityEdge {
        let (a, b) = (pair.a, pair.b);
        let edge = |signal_scores: BTreeMap<SignalKind, f64>,
                    combined_score: f64,
                    tier: ScoreTier,
                    reason: MatchReason| SimilarityEdge {
            mention_a_id: ctx.store.get(a).id.clone(),
            mention_b_id: ctx.store.get(b).id.clone(),
            a,
            b,
            signal_scores,
            combined_score,
            tier,
            reason,
        };

        let (na, nb) = (&ctx.names[a], &ctx.names[b]);
        let entity_type = ctx.store.get(a).entity_type;
        let codes = if self.config.preserve_legislative_codes && entity_type.is_legislative() {
            let strip_prefix =
                matches!(entity_type, EntityType::Ordinance | EntityType::Resolution);
            compare_codes(&na.codes, &nb.codes, strip_prefix)
        } else {
            CodeRelation::Unknown
        };
        if codes == CodeRelation::Conflict {
            return edge(BTreeMap::new(), 0.0, ScoreTier::CodeMismatch, MatchReason::CodeMismatch);
        }

        if na.normalized == nb.normalized {
            let scores = BTreeMap::from([(SignalKind::String, 1.0)]);
            return edge(scores, 1.0, ScoreTier::Exact, MatchReason::ExactName);
        }

        let mut scores = BTreeMap::new();
        for provider in PROVIDERS.iter().filter(|p| self.enabled(p.kind())) {
            if let Some(score) = provider.score(a, b, ctx) {
                scores.insert(provider.kind(), score);
            }
        }

        if scores
            .get(&SignalKind::String)
            .is_some_and(|&s| s >= self.config.exact_match_threshold)
        {
            return edge(scores, 1.0, ScoreTier::Exact, MatchReason::ExactName);
        }

        let (mut numerator, mut denominator) = (0.0, 0.0);
        let mut strongest: Option<(SignalKind, f64)> = None;
        for (&kind, &score) in &scores {
            let Some(weight) = self.weight(kind) else { continue };
            numerator += weight * score;
            denominator += weight;
            if strongest.map_or(true, |(_, best)| weight * score > best) {
                strongest = Some((kind, weight * score));
            }
        }
        let weighted = if denominator > 0.0 { numerator / denominator } else { 0.0 };

        let pattern = if scores.get(&SignalKind::RoleAbbreviation) == Some(&1.0) {
            RoleAbbreviation::classify(a, b, ctx)
        } else {
            None
        };

        match pattern {
            Some(pattern) => edge(
                scores,
                weighted.max(self.config.high_similarity_threshold),
                ScoreTier::RoleOverride,
                pattern.into(),
            ),
            None if codes == CodeRelation::Shared => edge(
                scores,
                weighted.max(self.config.high_similarity_threshold),
                ScoreTier::CodeMatch,
                MatchReason::SharedCode,
            ),
            None => {
                let signal = strongest.map_or(SignalKind::String, |(kind, _)| kind);
                edge(scores, weighted, ScoreTier::Weighted, MatchReason::Signal { signal })
            }
        }
    }

    /// Pontua todos os candidatos em paralelo, preservando a ordem de entrada.
    pub fn score_all(
        &self,
        candidates: &CandidateSet,
        ctx: &ScoringContext<'_>,
    ) -> Result<Vec<SimilarityEdge>, ResolveError> {
        let run = || {
            candidates
                .pairs
                .par_iter()
                .map(|&pair| self.score_pair(pair, ctx))
                .collect::<Vec<_>>()
        };
        let edges = match self.config.worker_threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
                pool.install(run)
            }
            None => run(),
        };
        tracing::debug!(edges = edges.len(), "arestas pontuadas");
        Ok(edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocking::generate_candidates;
    use crate::config::SignalToggles;
    use crate::mention::{Mention, MentionStore};

    fn names_only() -> ResolutionConfig {
        ResolutionConfig {
            toggles: SignalToggles {
                semantic: false,
                graph: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn score(config: &ResolutionConfig, mentions: Vec<Mention>) -> SimilarityEdge {
        let store = MentionStore::from_mentions(mentions, vec![]).unwrap();
        let ctx = ScoringContext::build(&store, config);
        CombinedScorer::new(config).score_pair(CandidatePair { a: 0, b: 1 }, &ctx)
    }

    fn person(id: &str, name: &str) -> Mention {
        Mention::new(id, name, EntityType::Person, "d")
    }

    #[test]
    fn test_exact_match_shortcut() {
        let pair = vec![person("a", "Vince Lago"), person("b", "vince  lago")];
        let edge = score(&names_only(), pair);
        assert_eq!(edge.combined_score, 1.0);
        assert_eq!(edge.tier, ScoreTier::Exact);
        assert_eq!(edge.reason, MatchReason::ExactName);
    }

    #[test]
    fn test_reordered_name_is_exact_via_string_signal() {
        let pair = vec![person("a", "Lago, Vince"), person("b", "Vince Lago")];
        let edge = score(&names_only(), pair);
        assert_eq!(edge.tier, ScoreTier::Exact);
        assert_eq!(edge.combined_score, 1.0);
    }

    #[test]
    fn test_weighted_sum_over_participating_signals() {
        let edge = score(&names_only(), vec![person("a", "Lago"), person("b", "Vince Lago")]);
        // string 0.4, token 0.7 (subconjunto) → (0.2·0.4 + 0.4·0.7) / 0.6
        assert!((edge.combined_score - 0.6).abs() < 1e-9, "{}", edge.combined_score);
        assert_eq!(edge.tier, ScoreTier::Weighted);
        assert_eq!(edge.reason, MatchReason::Signal { signal: SignalKind::Token });
        assert!(!edge.signal_scores.contains_key(&SignalKind::Semantic));
        assert_eq!(edge.signal_scores.get(&SignalKind::RoleAbbreviation), Some(&0.0));
    }

    #[test]
    fn test_role_override_lifts_to_high_threshold() {
        let config = names_only();
        let edge = score(&config, vec![person("a", "V. Lago"), person("b", "Vince Lago")]);
        assert_eq!(edge.tier, ScoreTier::RoleOverride);
        assert_eq!(edge.reason, MatchReason::Initials);
        assert_eq!(edge.combined_score, config.high_similarity_threshold);
    }

    #[test]
    fn test_role_override_disabled_by_toggle() {
        let mut config = names_only();
        config.toggles.role_abbreviation = false;
        let edge = score(&config, vec![person("a", "V. Lago"), person("b", "Vince Lago")]);
        assert_eq!(edge.tier, ScoreTier::Weighted);
        assert!(edge.combined_score < config.min_combined_score);
    }

    #[test]
    fn test_code_mismatch_vetoes_pair() {
        let items = vec![
            Mention::new("a", "Agenda Item E-1", EntityType::AgendaItem, "d"),
            Mention::new("b", "Agenda Item E-2", EntityType::AgendaItem, "d"),
        ];
        let edge = score(&ResolutionConfig::default(), items.clone());
        assert_eq!(edge.tier, ScoreTier::CodeMismatch);
        assert_eq!(edge.combined_score, 0.0);

        let mut config = names_only();
        config.preserve_legislative_codes = false;
        let edge = score(&config, items);
        assert!(edge.combined_score > 0.5);
    }

    #[test]
    fn test_extra_numbers_in_title_do_not_veto() {
        let ordinance = |id: &str, name: &str| Mention::new(id, name, EntityType::Ordinance, "d");
        let ordinances = vec![
            ordinance("a", "Ordinance 2024-01"),
            ordinance("b", "Ordinance No. 2024-01 amending Chapter 62"),
        ];
        let config = ResolutionConfig::default();
        let edge = score(&config, ordinances);
        assert_eq!(edge.tier, ScoreTier::CodeMatch);
        assert_eq!(edge.reason, MatchReason::SharedCode);
        assert!(edge.combined_score >= config.high_similarity_threshold);

        let different_acts = vec![
            ordinance("a", "Ordinance 2024-01 amending Chapter 62"),
            ordinance("b", "Ordinance 2024-02 amending Chapter 62"),
        ];
        assert_eq!(score(&config, different_acts).tier, ScoreTier::CodeMismatch);
    }

    #[test]
    fn test_type_prefix_is_ignored_for_resolutions() {
        let resolutions = vec![
            Mention::new("a", "R-2024-15", EntityType::Resolution, "d"),
            Mention::new("b", "2024-15", EntityType::Resolution, "d"),
        ];
        let config = ResolutionConfig::default();
        let edge = score(&config, resolutions);
        assert_eq!(edge.tier, ScoreTier::CodeMatch);
        assert!(edge.combined_score >= config.min_combined_score);

        // em itens de pauta o prefixo faz parte do código
        let items = vec![
            Mention::new("a", "Agenda Item E-1", EntityType::AgendaItem, "d"),
            Mention::new("b", "Agenda Item F-1", EntityType::AgendaItem, "d"),
        ];
        assert_eq!(score(&config, items).tier, ScoreTier::CodeMismatch);
    }

    #[test]
    fn test_score_all_with_dedicated_pool_keeps_order() {
        let store = MentionStore::from_mentions(
            vec![
                person("m1", "Vince Lago"),
                person("m2", "V. Lago"),
                person("m3", "Lago"),
                person("m4", "Rhonda Anderson"),
                person("m5", "R. Anderson"),
            ],
            vec![],
        )
        .unwrap();
        let config = ResolutionConfig { worker_threads: Some(2), ..names_only() };
        let ctx = ScoringContext::build(&store, &config);
        let candidates = generate_candidates(&ctx);
        let edges = CombinedScorer::new(&config).score_all(&candidates, &ctx).unwrap();
        assert_eq!(edges.len(), candidates.len());
        for (edge, pair) in edges.iter().zip(&candidates.pairs) {
            assert_eq!(edge.a, pair.a);
            assert_eq!(edge.b, pair.b);
            assert!(edge.mention_a_id < edge.mention_b_id);
        }
    }

    #[test]
    fn test_edge_serializes_signal_names() {
        let edge = score(&names_only(), vec![person("a", "Lago"), person("b", "Vince Lago")]);
        let json = serde_json::to_value(&edge).unwrap();
        assert!(json["signal_scores"]["token"].is_number());
        assert_eq!(json["tier"], "weighted");
        assert_eq!(json["reason"]["kind"], "signal");
        assert!(json.get("a").is_none());
    }
}
