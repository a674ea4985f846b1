//! # Provedores de Sinais de Similaridade
//!
//! Cinco estratégias independentes, cada uma uma função pura de duas menções
//! (e do contexto pré-computado) retornando um score em [0, 1]:
//!
//! | Sinal               | Evidência                                           |
//! |---------------------|-----------------------------------------------------|
//! | `string`            | Levenshtein normalizado (direto e com tokens ordenados) |
//! | `token`             | Jaccard dos tokens significativos, com bônus de subconjunto |
//! | `semantic`          | cosseno TF-IDF de `nome + descrição`               |
//! | `graph`             | Jaccard dos vizinhos estruturais                    |
//! | `role_abbreviation` | padrões de iniciais, siglas e cargos               |
//!
//! Um provedor pode **se abster** (`None`) quando não há evidência suficiente:
//! o sinal estrutural se abstém se algum dos lados tem menos de 2 vizinhos, e o
//! semântico se abstém quando um dos textos não gera nenhum termo. Abstenção
//! nunca penaliza; o sinal simplesmente sai da média ponderada.
//!
//! As menções são referenciadas pelo índice no [`MentionStore`].

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use strsim::normalized_levenshtein;

use crate::config::ResolutionConfig;
use crate::mention::{EntityType, MentionStore};
use crate::normalize::{canonical_role, is_initial, NameParts};
use crate::tfidf::TfIdfIndex;

/// Vizinhos mínimos para o sinal estrutural opinar.
pub const MIN_STRUCTURAL_NEIGHBORS: usize = 2;

/// Identificador de cada sinal (chave do `signal_scores` de uma aresta).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    String,
    Token,
    Semantic,
    Graph,
    RoleAbbreviation,
}

impl SignalKind {
    pub fn name(&self) -> &'static str {
        match self {
            SignalKind::String => "string",
            SignalKind::Token => "token",
            SignalKind::Semantic => "semantic",
            SignalKind::Graph => "graph",
            SignalKind::RoleAbbreviation => "role_abbreviation",
        }
    }
}

/// Dados derivados da passada inteira, calculados uma vez e compartilhados
/// (somente leitura) entre os workers.
#[derive(Debug)]
pub struct ScoringContext<'a> {
    pub store: &'a MentionStore,
    pub names: Vec<NameParts>,
    /// Vizinhança estrutural não-direcionada, por índice.
    pub neighbors: Vec<BTreeSet<usize>>,
    pub tfidf: TfIdfIndex,
    /// (documento, cargo) → sobrenomes ligados ao cargo naquele documento.
    role_bindings: HashMap<(String, &'static str), BTreeSet<String>>,
}

impl<'a> ScoringContext<'a> {
    pub fn build(store: &'a MentionStore, config: &ResolutionConfig) -> Self {
        let names: Vec<NameParts> =
            store.mentions().iter().map(|m| NameParts::parse(&m.name)).collect();
        let neighbors = store.adjacency();

        let tfidf = if config.toggles.semantic {
            let texts: Vec<String> = store
                .mentions()
                .iter()
                .map(|m| format!("{} {}", m.name, m.description))
                .collect();
            TfIdfIndex::build(&texts, config.semantic_max_features)
        } else {
            TfIdfIndex::default()
        };

        let mut role_bindings: HashMap<(String, &'static str), BTreeSet<String>> = HashMap::new();
        for (mention, parts) in store.mentions().iter().zip(&names) {
            if mention.entity_type != EntityType::Person {
                continue;
            }
            let Some(surname) = &parts.surname else { continue };
            let roles = parts
                .role
                .into_iter()
                .chain(mention.roles.iter().filter_map(|r| canonical_role(r)));
            for role in roles {
                role_bindings
                    .entry((mention.source.document.clone(), role))
                    .or_default()
                    .insert(surname.clone());
            }
        }

        Self {
            store,
            names,
            neighbors,
            tfidf,
            role_bindings,
        }
    }

    /// Vizinhos estruturais de `a`, excluindo as duas menções comparadas.
    pub fn structural_neighbors(&self, a: usize, b: usize) -> BTreeSet<usize> {
        self.neighbors[a].iter().copied().filter(|&n| n != a && n != b).collect()
    }

    /// Menções com evidência estrutural insuficiente (anomalia leve).
    pub fn sparse_structure(&self) -> Vec<usize> {
        self.neighbors
            .iter()
            .enumerate()
            .filter(|(_, n)| n.len() < MIN_STRUCTURAL_NEIGHBORS)
            .map(|(i, _)| i)
            .collect()
    }

    /// Sobrenomes associados a `role` no documento.
    pub fn role_binding(&self, document: &str, role: &str) -> Option<&BTreeSet<String>> {
        let role = canonical_role(role)?;
        self.role_bindings.get(&(document.to_string(), role))
    }

    /// A menção carrega o cargo (no nome ou na lista `roles`).
    fn has_role(&self, i: usize, role: &str) -> bool {
        self.names[i].role == Some(role)
            || self.store.get(i).roles.iter().any(|r| canonical_role(r) == Some(role))
    }
}

/// Estratégia de similaridade. `None` significa abstenção.
pub trait SimilarityProvider: Send + Sync {
    fn kind(&self) -> SignalKind;
    fn score(&self, a: usize, b: usize, ctx: &ScoringContext<'_>) -> Option<f64>;
}

pub struct StringSimilarity;
pub struct TokenOverlap;
pub struct SemanticSimilarity;
pub struct GraphStructure;
pub struct RoleAbbreviation;

/// Conjunto fechado de provedores, na ordem em que são avaliados.
pub static PROVIDERS: [&dyn SimilarityProvider; 5] = [
    &StringSimilarity,
    &TokenOverlap,
    &SemanticSimilarity,
    &GraphStructure,
    &RoleAbbreviation,
];

impl SimilarityProvider for StringSimilarity {
    fn kind(&self) -> SignalKind {
        SignalKind::String
    }

    fn score(&self, a: usize, b: usize, ctx: &ScoringContext<'_>) -> Option<f64> {
        let (na, nb) = (&ctx.names[a], &ctx.names[b]);
        if na.normalized == nb.normalized {
            return Some(1.0);
        }
        let direct = normalized_levenshtein(&na.normalized, &nb.normalized);
        let reordered = normalized_levenshtein(&na.sorted, &nb.sorted);
        Some(direct.max(reordered))
    }
}

/// Jaccard com bônus de +0.2 quando um conjunto contém o outro.
pub fn token_jaccard(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    let jaccard = inter / union;

    if a.is_subset(b) || b.is_subset(a) {
        let min_tokens = a.len().min(b.len());
        if min_tokens >= 2 || jaccard >= 0.5 {
            return (jaccard + 0.2).min(1.0);
        }
    }
    jaccard
}

impl SimilarityProvider for TokenOverlap {
    fn kind(&self) -> SignalKind {
        SignalKind::Token
    }

    fn score(&self, a: usize, b: usize, ctx: &ScoringContext<'_>) -> Option<f64> {
        let (na, nb) = (&ctx.names[a], &ctx.names[b]);
        let score = match (na.significant.is_empty(), nb.significant.is_empty()) {
            (false, false) => token_jaccard(&na.token_set(), &nb.token_set()),
            (true, true) => {
                let ca: BTreeSet<&str> = na.content.iter().map(String::as_str).collect();
                let cb: BTreeSet<&str> = nb.content.iter().map(String::as_str).collect();
                token_jaccard(&ca, &cb)
            }
            _ => 0.0,
        };
        Some(score)
    }
}

impl SimilarityProvider for SemanticSimilarity {
    fn kind(&self) -> SignalKind {
        SignalKind::Semantic
    }

    fn score(&self, a: usize, b: usize, ctx: &ScoringContext<'_>) -> Option<f64> {
        if ctx.tfidf.vector(a).is_empty() || ctx.tfidf.vector(b).is_empty() {
            return None;
        }
        Some(ctx.tfidf.similarity(a, b))
    }
}

impl SimilarityProvider for GraphStructure {
    fn kind(&self) -> SignalKind {
        SignalKind::Graph
    }

    fn score(&self, a: usize, b: usize, ctx: &ScoringContext<'_>) -> Option<f64> {
        let na = ctx.structural_neighbors(a, b);
        let nb = ctx.structural_neighbors(b, a);
        if na.len() < MIN_STRUCTURAL_NEIGHBORS || nb.len() < MIN_STRUCTURAL_NEIGHBORS {
            return None;
        }
        let inter = na.intersection(&nb).count() as f64;
        let union = na.union(&nb).count() as f64;
        Some(inter / union)
    }
}

/// Qual padrão de nomeação disparou o sinal de cargo/abreviação.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternMatch {
    /// "V. Lago" ↔ "Vince Lago".
    Initials,
    /// "CGPD" ↔ "Coral Gables Police Department".
    Acronym,
    /// "Mayor Lago" ↔ "Vince Lago" (cargo Mayor, mesmo sobrenome).
    RoleTitle,
    /// "Mayor" ↔ "Vince Lago", com o cargo ligado só a Lago no mesmo documento
    /// (pelo próprio "Vince Lago" ou por uma terceira menção como "Mayor Lago").
    RoleOnly,
}

impl RoleAbbreviation {
    /// Classifica o par, testando os dois sentidos.
    pub fn classify(a: usize, b: usize, ctx: &ScoringContext<'_>) -> Option<PatternMatch> {
        let (ma, mb) = (ctx.store.get(a), ctx.store.get(b));
        if ma.entity_type != mb.entity_type {
            return None;
        }
        if ma.entity_type == EntityType::Person {
            classify_person(a, b, ctx).or_else(|| classify_person(b, a, ctx))
        } else {
            acronym_of(&ctx.names[a], &ctx.names[b])
                .or_else(|| acronym_of(&ctx.names[b], &ctx.names[a]))
        }
    }
}

impl SimilarityProvider for RoleAbbreviation {
    fn kind(&self) -> SignalKind {
        SignalKind::RoleAbbreviation
    }

    fn score(&self, a: usize, b: usize, ctx: &ScoringContext<'_>) -> Option<f64> {
        Some(if Self::classify(a, b, ctx).is_some() { 1.0 } else { 0.0 })
    }
}

fn acronym_of(short: &NameParts, long: &NameParts) -> Option<PatternMatch> {
    let acronym = short.acronym.as_deref()?;
    (long.content.len() >= 2 && long.initialism == acronym).then_some(PatternMatch::Acronym)
}

/// `a` é a forma "curta" (iniciais, cargo+sobrenome ou só cargo).
fn classify_person(a: usize, b: usize, ctx: &ScoringContext<'_>) -> Option<PatternMatch> {
    let (na, nb) = (&ctx.names[a], &ctx.names[b]);

    if na.is_role_only() {
        let role = na.role?;
        let surname = nb.surname.as_ref()?;
        let (da, db) = (&ctx.store.get(a).source.document, &ctx.store.get(b).source.document);
        if nb.is_role_only() || da != db {
            return None;
        }
        // o vínculo pode vir do próprio `b` ou de outra menção ("Mayor Lago")
        let bound = ctx.role_binding(da, role)?;
        return (bound.len() == 1 && bound.contains(surname)).then_some(PatternMatch::RoleOnly);
    }

    if na.surname.is_none() || na.surname != nb.surname || nb.is_role_only() {
        return None;
    }

    if na.initials > 0 && initials_align(&na.significant, &nb.significant) {
        return Some(PatternMatch::Initials);
    }

    if let Some(role) = na.role {
        if ctx.has_role(b, role) && given_names_compatible(&na.significant, &nb.significant) {
            return Some(PatternMatch::RoleTitle);
        }
    }
    None
}

/// Alinhamento posicional: cada token curto é igual ao longo ou é sua inicial,
/// e ao menos um par é inicial ↔ nome completo.
fn initials_align(short: &[String], long: &[String]) -> bool {
    if short.len() != long.len() {
        return false;
    }
    let mut abbreviated = false;
    for (s, l) in short.iter().zip(long) {
        if s == l {
            continue;
        }
        if is_initial(s) && !is_initial(l) && l.starts_with(s.as_str()) {
            abbreviated = true;
        } else {
            return false;
        }
    }
    abbreviated
}

/// Prenomes (tudo menos o sobrenome) não se contradizem.
fn given_names_compatible(a: &[String], b: &[String]) -> bool {
    let given = |tokens: &[String]| -> Vec<String> {
        tokens.split_last().map(|(_, rest)| rest.to_vec()).unwrap_or_default()
    };
    let (ga, gb) = (given(a), given(b));
    let (short, long) = if ga.len() <= gb.len() { (ga, gb) } else { (gb, ga) };
    short.iter().all(|s| {
        long.iter().any(|l| {
            s == l
                || (is_initial(s) && l.starts_with(s.as_str()))
                || (is_initial(l) && s.starts_with(l.as_str()))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mention::{Mention, Relationship};

    fn store(mentions: Vec<Mention>, rels: Vec<Relationship>) -> MentionStore {
        MentionStore::from_mentions(mentions, rels).unwrap()
    }

    fn person(id: &str, name: &str, doc: &str) -> Mention {
        Mention::new(id, name, EntityType::Person, doc)
    }

    #[test]
    fn test_string_similarity_is_order_insensitive() {
        let s = store(
            vec![person("a", "Lago, Vince", "d"), person("b", "Vince Lago", "d")],
            vec![],
        );
        let ctx = ScoringContext::build(&s, &ResolutionConfig::default());
        assert_eq!(StringSimilarity.score(0, 1, &ctx), Some(1.0));
        assert_eq!(TokenOverlap.score(0, 1, &ctx), Some(1.0));
    }

    #[test]
    fn test_token_overlap_ignores_titles() {
        let s = store(
            vec![
                person("a", "Commissioner Kirk Menendez", "d"),
                person("b", "Mr. Kirk Menendez", "d"),
            ],
            vec![],
        );
        let ctx = ScoringContext::build(&s, &ResolutionConfig::default());
        assert_eq!(TokenOverlap.score(0, 1, &ctx), Some(1.0));
    }

    #[test]
    fn test_token_jaccard_subset_boost() {
        let a = BTreeSet::from(["lago"]);
        let b = BTreeSet::from(["vince", "lago"]);
        assert!((token_jaccard(&a, &b) - 0.7).abs() < 1e-9);

        let c = BTreeSet::from(["vince", "lago", "jr", "x"]);
        assert!((token_jaccard(&a, &c) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_graph_abstains_without_structure() {
        let s = store(
            vec![
                person("a", "Vince Lago", "d").with_neighbors(["c"]),
                person("b", "V. Lago", "d").with_neighbors(["c"]),
                Mention::new("c", "City Commission", EntityType::Organization, "d"),
            ],
            vec![],
        );
        let ctx = ScoringContext::build(&s, &ResolutionConfig::default());
        assert_eq!(GraphStructure.score(0, 1, &ctx), None);
        assert!(ctx.sparse_structure().contains(&0));
    }

    #[test]
    fn test_graph_jaccard_over_shared_neighbors() {
        let s = store(
            vec![
                person("a", "Vince Lago", "d").with_neighbors(["c", "e", "f"]),
                person("b", "V. Lago", "d").with_neighbors(["c", "e"]),
                Mention::new("c", "City Commission", EntityType::Organization, "d"),
                Mention::new("e", "Agenda Item E-1", EntityType::AgendaItem, "d"),
                Mention::new("f", "Coral Gables", EntityType::Location, "d"),
            ],
            vec![],
        );
        let ctx = ScoringContext::build(&s, &ResolutionConfig::default());
        let score = GraphStructure.score(0, 1, &ctx).unwrap();
        assert!((score - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_semantic_similarity_uses_descriptions() {
        let s = store(
            vec![
                person("a", "Vince Lago", "d")
                    .with_description("presides over the city commission"),
                person("b", "V. Lago", "d").with_description("presides over the city commission"),
                person("c", "Kirk Menendez", "d").with_description("budget workshop speaker"),
            ],
            vec![],
        );
        let ctx = ScoringContext::build(&s, &ResolutionConfig::default());
        let close = SemanticSimilarity.score(0, 1, &ctx).unwrap();
        let far = SemanticSimilarity.score(0, 2, &ctx).unwrap();
        assert!(close > far);
    }

    #[test]
    fn test_initials_pattern() {
        let s = store(vec![person("a", "V. Lago", "d1"), person("b", "Vince Lago", "d2")], vec![]);
        let ctx = ScoringContext::build(&s, &ResolutionConfig::default());
        assert_eq!(RoleAbbreviation::classify(0, 1, &ctx), Some(PatternMatch::Initials));
        assert_eq!(RoleAbbreviation::classify(1, 0, &ctx), Some(PatternMatch::Initials));
        assert_eq!(RoleAbbreviation.score(0, 1, &ctx), Some(1.0));
    }

    #[test]
    fn test_initials_must_agree() {
        let s = store(vec![person("a", "K. Lago", "d"), person("b", "Vince Lago", "d")], vec![]);
        let ctx = ScoringContext::build(&s, &ResolutionConfig::default());
        assert_eq!(RoleAbbreviation::classify(0, 1, &ctx), None);
    }

    #[test]
    fn test_acronym_pattern() {
        let s = store(
            vec![
                Mention::new("a", "CGPD", EntityType::Organization, "d"),
                Mention::new("b", "Coral Gables Police Department", EntityType::Organization, "d"),
            ],
            vec![],
        );
        let ctx = ScoringContext::build(&s, &ResolutionConfig::default());
        assert_eq!(RoleAbbreviation::classify(0, 1, &ctx), Some(PatternMatch::Acronym));
    }

    #[test]
    fn test_role_title_pattern() {
        let s = store(
            vec![
                person("a", "Mayor Lago", "d1"),
                person("b", "Vince Lago", "d2").with_roles(["Mayor"]),
                person("c", "Tom Lago", "d2").with_roles(["Resident"]),
            ],
            vec![],
        );
        let ctx = ScoringContext::build(&s, &ResolutionConfig::default());
        assert_eq!(RoleAbbreviation::classify(0, 1, &ctx), Some(PatternMatch::RoleTitle));
        assert_eq!(RoleAbbreviation::classify(0, 2, &ctx), None);
    }

    #[test]
    fn test_role_only_requires_same_document_binding() {
        let s = store(
            vec![
                person("a", "Mayor", "minutes"),
                person("b", "Vince Lago", "minutes").with_roles(["Mayor"]),
                person("c", "Mayor", "agenda"),
            ],
            vec![],
        );
        let ctx = ScoringContext::build(&s, &ResolutionConfig::default());
        assert_eq!(RoleAbbreviation::classify(0, 1, &ctx), Some(PatternMatch::RoleOnly));
        assert_eq!(RoleAbbreviation::classify(2, 1, &ctx), None);
        assert!(ctx.role_binding("minutes", "Mayor").is_some());
    }

    #[test]
    fn test_role_only_via_third_mention() {
        let s = store(
            vec![
                person("a", "Mayor", "minutes"),
                person("b", "Vince Lago", "minutes"),
                person("c", "Mayor Lago", "minutes"),
                person("d", "Tom Lago", "agenda"),
            ],
            vec![],
        );
        let ctx = ScoringContext::build(&s, &ResolutionConfig::default());
        assert_eq!(RoleAbbreviation::classify(0, 1, &ctx), Some(PatternMatch::RoleOnly));
        assert_eq!(RoleAbbreviation::classify(0, 2, &ctx), Some(PatternMatch::RoleOnly));
        assert_eq!(RoleAbbreviation::classify(0, 3, &ctx), None);
    }

    #[test]
    fn test_role_only_rejects_ambiguous_binding() {
        let s = store(
            vec![
                person("a", "Mayor", "d"),
                person("b", "Vince Lago", "d").with_roles(["Mayor"]),
                person("c", "Mayor Anderson", "d"),
            ],
            vec![],
        );
        let ctx = ScoringContext::build(&s, &ResolutionConfig::default());
        assert_eq!(RoleAbbreviation::classify(0, 1, &ctx), None);
    }

    #[test]
    fn test_providers_stay_in_unit_interval() {
        let s = store(
            vec![
                person("a", "Vince Lago", "d").with_description("mayor"),
                person("b", "Rhonda Anderson", "d").with_description("vice mayor"),
            ],
            vec![],
        );
        let ctx = ScoringContext::build(&s, &ResolutionConfig::default());
        for provider in PROVIDERS.iter() {
            if let Some(score) = provider.score(0, 1, &ctx) {
                assert!((0.0..=1.0).contains(&score), "{}", provider.kind().name());
            }
        }
    }
}
