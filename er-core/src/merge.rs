//! # Consolidação (Merge Resolver)
//!
//! Gera uma [`CanonicalEntity`] por cluster e reescreve os relacionamentos para
//! apontar para as entidades canônicas.
//!
//! ## Escolha do nome canônico
//!
//! Ranking (maior vence): tokens significativos que não são iniciais, depois
//! seus caracteres, depois menos iniciais, depois a menção mais antiga.
//! "Vince Lago" > "Lago" > "V. Lago". Menções que são só um cargo ("Mayor") só
//! viram nome canônico quando o cluster não tem outra opção.
//!
//! ## Relacionamentos
//!
//! Duplicatas `(origem, destino, tipo)` após a reescrita colapsam no **maior**
//! peso, com `merged_count` registrando quantas foram fundidas. Laços criados
//! pelo merge (origem == destino) são descartados e contados.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use strsim::normalized_levenshtein;

use crate::cluster::Clustering;
use crate::config::ResolutionConfig;
use crate::error::ResolveError;
use crate::mention::{EntityType, MentionId, MentionStore, SourceRef};
use crate::normalize::{canonical_role, is_initial, NameParts};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub id: String,
    pub canonical_name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub aliases: BTreeSet<String>,
    pub merged_roles: Vec<String>,
    pub merged_description: String,
    pub member_mention_ids: BTreeSet<MentionId>,
    /// Documentos (e trechos) de origem das menções.
    pub provenance: Vec<SourceRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRelationship {
    pub source: String,
    pub target: String,
    pub relation_type: String,
    pub weight: f64,
    pub merged_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutput {
    pub entities: Vec<CanonicalEntity>,
    pub relationships: Vec<CanonicalRelationship>,
    pub dropped_self_loops: usize,
    /// Índice da menção → índice da entidade em `entities`.
    pub entity_of: Vec<usize>,
}

/// Chave de ranking do nome canônico (ordem lexicográfica, maior vence).
fn name_rank(parts: &NameParts, position: usize) -> (usize, usize, Reverse<usize>, Reverse<usize>) {
    let full: Vec<&String> = parts.significant.iter().filter(|t| !is_initial(t)).collect();
    let chars = full.iter().map(|t| t.chars().count()).sum();
    (
        full.len(),
        chars,
        Reverse(parts.initials),
        Reverse(position),
    )
}

pub struct MergeResolver<'c> {
    config: &'c ResolutionConfig,
}

impl<'c> MergeResolver<'c> {
    pub fn new(config: &'c ResolutionConfig) -> Self {
        Self { config }
    }

    pub fn resolve(
        &self,
        store: &MentionStore,
        names: &[NameParts],
        clustering: &Clustering,
    ) -> Result<MergeOutput, ResolveError> {
        let mut used: HashSet<String> = store.mentions().iter().map(|m| m.id.clone()).collect();
        let mut entity_of = vec![0usize; store.len()];
        let mut entities = Vec::with_capacity(clustering.clusters.len());

        for (n, members) in clustering.clusters.iter().enumerate() {
            let mut id = format!("canon-{}", n + 1);
            let mut suffix = 1;
            while used.contains(&id) {
                id = format!("canon-{}-{}", n + 1, suffix);
                suffix += 1;
            }
            used.insert(id.clone());

            let entity = self.build_entity(id, store, names, members)?;
            if members.len() > 1 {
                tracing::trace!(
                    entity = %entity.id,
                    name = %entity.canonical_name,
                    members = members.len(),
                    "menções consolidadas"
                );
            }
            for &i in members {
                entity_of[i] = entities.len();
            }
            entities.push(entity);
        }

        let (relationships, dropped_self_loops) =
            rewrite_relationships(store, &entities, &entity_of);

        Ok(MergeOutput {
            entities,
            relationships,
            dropped_self_loops,
            entity_of,
        })
    }

    fn build_entity(
        &self,
        id: String,
        store: &MentionStore,
        names: &[NameParts],
        members: &[usize],
    ) -> Result<CanonicalEntity, ResolveError> {
        let types: BTreeSet<EntityType> =
            members.iter().map(|&i| store.get(i).entity_type).collect();
        let entity_type = match (types.len(), types.first()) {
            (1, Some(&t)) => t,
            _ => {
                return Err(ResolveError::TypeConflict {
                    entity_id: id,
                    members: members.iter().map(|&i| store.get(i).id.clone()).collect(),
                    types: types.into_iter().collect(),
                })
            }
        };

        let all_role_only = members.iter().all(|&i| names[i].is_role_only());
        let canonical = members
            .iter()
            .copied()
            .filter(|&i| all_role_only || !names[i].is_role_only())
            .max_by_key(|&i| name_rank(&names[i], i))
            .unwrap_or(members[0]);

        let aliases = members.iter().map(|&i| store.get(i).name.clone()).collect();

        let mut merged_roles: Vec<String> = Vec::new();
        let mut seen_roles: HashSet<String> = HashSet::new();
        for &i in members {
            for role in &store.get(i).roles {
                let key = canonical_role(role)
                    .map(str::to_string)
                    .unwrap_or_else(|| role.trim().to_lowercase());
                if !role.trim().is_empty() && seen_roles.insert(key) {
                    merged_roles.push(role.trim().to_string());
                }
            }
        }

        let order = std::iter::once(canonical)
            .chain(members.iter().copied().filter(|&i| i != canonical));
        let merged_description =
            self.merge_descriptions(order.map(|i| store.get(i).description.as_str()));

        let mut provenance: Vec<SourceRef> = Vec::new();
        for &i in members {
            let source = &store.get(i).source;
            if !provenance.contains(source) {
                provenance.push(source.clone());
            }
        }

        Ok(CanonicalEntity {
            id,
            canonical_name: store.get(canonical).name.clone(),
            entity_type,
            aliases,
            merged_roles,
            merged_description,
            member_mention_ids: members.iter().map(|&i| store.get(i).id.clone()).collect(),
            provenance,
        })
    }

    /// Concatena fragmentos distintos, descartando quase-duplicatas.
    fn merge_descriptions<'d>(&self, fragments: impl Iterator<Item = &'d str>) -> String {
        let mut kept: Vec<&str> = Vec::new();
        let mut kept_lower: Vec<String> = Vec::new();
        for fragment in fragments.map(str::trim).filter(|f| !f.is_empty()) {
            let lower = fragment.to_lowercase();
            let duplicate = kept_lower.iter().any(|k| {
                normalized_levenshtein(k, &lower) >= self.config.description_similarity_threshold
            });
            if !duplicate {
                kept.push(fragment);
                kept_lower.push(lower);
            }
        }
        let joined = kept.join("\n");
        if joined.chars().count() > self.config.max_description_len {
            joined.chars().take(self.config.max_description_len).collect()
        } else {
            joined
        }
    }
}

fn rewrite_relationships(
    store: &MentionStore,
    entities: &[CanonicalEntity],
    entity_of: &[usize],
) -> (Vec<CanonicalRelationship>, usize) {
    let mut out: Vec<CanonicalRelationship> = Vec::new();
    let mut position: HashMap<(usize, usize, String), usize> = HashMap::new();
    let mut dropped = 0;

    for rel in store.relationships() {
        let (Some(s), Some(t)) = (store.index_of(&rel.source), store.index_of(&rel.target)) else {
            continue;
        };
        let (es, et) = (entity_of[s], entity_of[t]);
        if es == et {
            dropped += 1;
            continue;
        }
        match position.entry((es, et, rel.relation_type.clone())) {
            std::collections::hash_map::Entry::Occupied(slot) => {
                let existing = &mut out[*slot.get()];
                existing.weight = existing.weight.max(rel.weight);
                existing.merged_count += 1;
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(out.len());
                out.push(CanonicalRelationship {
                    source: entities[es].id.clone(),
                    target: entities[et].id.clone(),
                    relation_type: rel.relation_type.clone(),
                    weight: rel.weight,
                    merged_count: 1,
                });
            }
        }
    }
    (out, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mention::{Mention, Relationship};

    fn setup(mentions: Vec<Mention>, rels: Vec<Relationship>) -> (MentionStore, Vec<NameParts>) {
        let store = MentionStore::from_mentions(mentions, rels).unwrap();
        let names = store.mentions().iter().map(|m| NameParts::parse(&m.name)).collect();
        (store, names)
    }

    fn clustering(clusters: Vec<Vec<usize>>) -> Clustering {
        Clustering {
            clusters,
            ..Default::default()
        }
    }

    fn person(id: &str, name: &str) -> Mention {
        Mention::new(id, name, EntityType::Person, "d")
    }

    #[test]
    fn test_canonical_name_prefers_complete_name() {
        let (store, names) = setup(
            vec![
                person("a", "V. Lago"),
                person("b", "Lago"),
                person("c", "Vince Lago"),
                person("d", "Mayor"),
            ],
            vec![],
        );
        let config = ResolutionConfig::default();
        let out = MergeResolver::new(&config)
            .resolve(&store, &names, &clustering(vec![vec![0, 1, 2, 3]]))
            .unwrap();
        assert_eq!(out.entities[0].canonical_name, "Vince Lago");
        assert_eq!(out.entities[0].aliases.len(), 4);

        let out = MergeResolver::new(&config)
            .resolve(&store, &names, &clustering(vec![vec![0, 1], vec![2], vec![3]]))
            .unwrap();
        assert_eq!(out.entities[0].canonical_name, "Lago");
        assert_eq!(out.entities[2].canonical_name, "Mayor");
    }

    #[test]
    fn test_role_only_never_wins_over_a_name() {
        let (store, names) =
            setup(vec![person("a", "Vice Mayor"), person("b", "R. Anderson")], vec![]);
        let config = ResolutionConfig::default();
        let out = MergeResolver::new(&config)
            .resolve(&store, &names, &clustering(vec![vec![0, 1]]))
            .unwrap();
        assert_eq!(out.entities[0].canonical_name, "R. Anderson");
    }

    #[test]
    fn test_roles_and_descriptions_are_merged() {
        let (store, names) = setup(
            vec![
                person("a", "Vince Lago")
                    .with_roles(["Mayor"])
                    .with_description("Mayor of Coral Gables."),
                person("b", "V. Lago")
                    .with_roles(["mayor", "Commissioner"])
                    .with_description("Mayor of Coral Gables"),
                person("c", "Lago").with_description("Chaired the budget hearing."),
            ],
            vec![],
        );
        let config = ResolutionConfig::default();
        let out = MergeResolver::new(&config)
            .resolve(&store, &names, &clustering(vec![vec![0, 1, 2]]))
            .unwrap();
        let entity = &out.entities[0];
        assert_eq!(entity.merged_roles, vec!["Mayor", "Commissioner"]);
        assert_eq!(
            entity.merged_description,
            "Mayor of Coral Gables.\nChaired the budget hearing."
        );
        assert_eq!(entity.provenance.len(), 1);
    }

    #[test]
    fn test_description_is_capped() {
        let (store, names) =
            setup(vec![person("a", "Vince Lago").with_description("x".repeat(50))], vec![]);
        let config = ResolutionConfig { max_description_len: 10, ..Default::default() };
        let out = MergeResolver::new(&config)
            .resolve(&store, &names, &clustering(vec![vec![0]]))
            .unwrap();
        assert_eq!(out.entities[0].merged_description.chars().count(), 10);
    }

    #[test]
    fn test_relationships_rewritten_and_collapsed() {
        let (store, names) = setup(
            vec![
                person("a", "Vince Lago"),
                person("b", "V. Lago"),
                Mention::new("c", "Agenda Item E-1", EntityType::AgendaItem, "d"),
            ],
            vec![
                Relationship::new("a", "c", "sponsors", 0.4),
                Relationship::new("b", "c", "sponsors", 0.9),
                Relationship::new("a", "b", "same_as", 1.0),
            ],
        );
        let config = ResolutionConfig::default();
        let out = MergeResolver::new(&config)
            .resolve(&store, &names, &clustering(vec![vec![0, 1], vec![2]]))
            .unwrap();
        assert_eq!(out.dropped_self_loops, 1);
        assert_eq!(
            out.relationships,
            vec![CanonicalRelationship {
                source: "canon-1".into(),
                target: "canon-2".into(),
                relation_type: "sponsors".into(),
                weight: 0.9,
                merged_count: 2,
            }]
        );
    }

    #[test]
    fn test_canonical_ids_avoid_mention_ids() {
        let (store, names) =
            setup(vec![person("canon-1", "Vince Lago"), person("x", "Kirk Menendez")], vec![]);
        let config = ResolutionConfig::default();
        let out = MergeResolver::new(&config)
            .resolve(&store, &names, &clustering(vec![vec![0], vec![1]]))
            .unwrap();
        assert_eq!(out.entities[0].id, "canon-1-1");
        assert_eq!(out.entities[1].id, "canon-2");
        assert_eq!(out.entity_of, vec![0, 1]);
    }

    #[test]
    fn test_type_conflict_fails_fast() {
        let (store, names) = setup(
            vec![
                Mention::new("a", "Agenda Item E-1", EntityType::AgendaItem, "d"),
                Mention::new("b", "Ordinance 2024-01", EntityType::Ordinance, "d"),
            ],
            vec![],
        );
        let config = ResolutionConfig::default();
        let err = MergeResolver::new(&config)
            .resolve(&store, &names, &clustering(vec![vec![0, 1]]))
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::TypeConflict { ref entity_id, .. } if entity_id == "canon-1"
        ));
    }
}
