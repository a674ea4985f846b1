//! # Clusterer
//!
//! Particiona as menções em classes de equivalência (futuras entidades canônicas)
//! com **union-find** sobre índices do repositório (arena), com compressão de
//! caminho e união por rank.
//!
//! - Arestas com `combined_score >= min_combined_score` unem seus extremos.
//! - Arestas abaixo do piso, mas dentro de `clustering_tolerance` dele ou acima de
//!   `partial_match_threshold`, viram **quase-merges** (diagnóstico, sem união).
//! - As arestas são processadas em ordem fixa (par de ids) para que a saída seja
//!   reprodutível.
//! - A união é transitiva: A↔B e B↔C juntam A e C. Pares unidos só por
//!   encadeamento são listados em `transitive_links` para revisão manual.
//!
//! Depois da união, todo cluster é verificado: membros com tipos diferentes são
//! um erro fatal ([`ResolveError::MixedTypeCluster`]).

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::ResolutionConfig;
use crate::error::ResolveError;
use crate::mention::{MentionId, MentionStore};
use crate::scorer::{ScoreTier, SimilarityEdge};

/// Union-find em arena.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Une os conjuntos de `a` e `b`. Retorna `false` se já eram o mesmo.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }
}

/// Aresta abaixo do piso registrada para revisão.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearMiss {
    pub edge: SimilarityEdge,
    /// Quanto faltou para `min_combined_score`.
    pub gap: f64,
}

/// Dois membros de um cluster sem aresta direta acima do piso.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitiveLink {
    pub mention_a_id: MentionId,
    pub mention_b_id: MentionId,
    /// Score direto, quando o par chegou a ser pontuado.
    pub direct_score: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct Clustering {
    /// Índices dos membros; clusters ordenados pelo menor membro, membros em ordem crescente.
    pub clusters: Vec<Vec<usize>>,
    pub merge_edges: Vec<SimilarityEdge>,
    pub near_misses: Vec<NearMiss>,
    pub transitive_links: Vec<TransitiveLink>,
}

pub struct Clusterer<'c> {
    config: &'c ResolutionConfig,
}

impl<'c> Clusterer<'c> {
    pub fn new(config: &'c ResolutionConfig) -> Self {
        Self { config }
    }

    fn is_near_miss(&self, edge: &SimilarityEdge) -> bool {
        let c = self.config;
        edge.tier != ScoreTier::CodeMismatch
            && edge.combined_score < c.min_combined_score
            && (edge.combined_score >= c.min_combined_score - c.clustering_tolerance
                || edge.combined_score >= c.partial_match_threshold)
    }

    pub fn cluster(
        &self,
        store: &MentionStore,
        edges: &[SimilarityEdge],
    ) -> Result<Clustering, ResolveError> {
        let mut ordered: Vec<&SimilarityEdge> = edges.iter().collect();
        ordered.sort_by(|x, y| {
            (&x.mention_a_id, &x.mention_b_id).cmp(&(&y.mention_a_id, &y.mention_b_id))
        });

        let mut uf = UnionFind::new(store.len());
        let mut merge_edges = Vec::new();
        let mut near_misses = Vec::new();

        for edge in ordered {
            if edge.combined_score >= self.config.min_combined_score {
                uf.union(edge.a, edge.b);
                merge_edges.push(edge.clone());
            } else if self.is_near_miss(edge) {
                let gap = self.config.min_combined_score - edge.combined_score;
                tracing::debug!(
                    a = %edge.mention_a_id,
                    b = %edge.mention_b_id,
                    score = edge.combined_score,
                    gap,
                    "quase-merge, não unido"
                );
                near_misses.push(NearMiss { edge: edge.clone(), gap });
            }
        }

        let mut root_to_cluster: HashMap<usize, usize> = HashMap::new();
        let mut clusters: Vec<Vec<usize>> = Vec::new();
        for i in 0..store.len() {
            let root = uf.find(i);
            let slot = *root_to_cluster.entry(root).or_insert_with(|| {
                clusters.push(Vec::new());
                clusters.len() - 1
            });
            clusters[slot].push(i);
        }

        for members in &clusters {
            let types: BTreeSet<_> = members.iter().map(|&i| store.get(i).entity_type).collect();
            if types.len() > 1 {
                return Err(ResolveError::MixedTypeCluster {
                    members: members.iter().map(|&i| store.get(i).id.clone()).collect(),
                    types: types.into_iter().collect(),
                });
            }
        }

        let transitive_links = transitive_links(store, &clusters, &merge_edges, edges);

        Ok(Clustering {
            clusters,
            merge_edges,
            near_misses,
            transitive_links,
        })
    }
}

fn transitive_links(
    store: &MentionStore,
    clusters: &[Vec<usize>],
    merge_edges: &[SimilarityEdge],
    all_edges: &[SimilarityEdge],
) -> Vec<TransitiveLink> {
    let key = |a: usize, b: usize| (a.min(b), a.max(b));
    let direct: BTreeSet<(usize, usize)> = merge_edges.iter().map(|e| key(e.a, e.b)).collect();
    let scored: HashMap<(usize, usize), f64> =
        all_edges.iter().map(|e| (key(e.a, e.b), e.combined_score)).collect();

    let mut links = Vec::new();
    for members in clusters.iter().filter(|m| m.len() > 2) {
        for (k, &x) in members.iter().enumerate() {
            for &y in &members[k + 1..] {
                if direct.contains(&key(x, y)) {
                    continue;
                }
                let (ia, ib) = (&store.get(x).id, &store.get(y).id);
                let (first, second) = if ia <= ib { (ia, ib) } else { (ib, ia) };
                links.push(TransitiveLink {
                    mention_a_id: first.clone(),
                    mention_b_id: second.clone(),
                    direct_score: scored.get(&key(x, y)).copied(),
                });
            }
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mention::{EntityType, Mention};
    use crate::scorer::MatchReason;
    use crate::signals::SignalKind;

    fn store(n: usize) -> MentionStore {
        let mentions = (0..n)
            .map(|i| Mention::new(format!("m{i}"), format!("Name {i}"), EntityType::Person, "d"))
            .collect();
        MentionStore::from_mentions(mentions, vec![]).unwrap()
    }

    fn edge(store: &MentionStore, a: usize, b: usize, score: f64) -> SimilarityEdge {
        SimilarityEdge {
            mention_a_id: store.get(a).id.clone(),
            mention_b_id: store.get(b).id.clone(),
            a,
            b,
            signal_scores: Default::default(),
            combined_score: score,
            tier: ScoreTier::Weighted,
            reason: MatchReason::Signal { signal: SignalKind::Token },
        }
    }

    #[test]
    fn test_union_find_basics() {
        let mut uf = UnionFind::new(4);
        assert!(uf.union(0, 1));
        assert!(uf.union(2, 3));
        assert!(!uf.union(1, 0));
        assert_ne!(uf.find(0), uf.find(2));
        assert!(uf.union(1, 3));
        assert_eq!(uf.find(0), uf.find(2));
    }

    #[test]
    fn test_partition_covers_every_mention() {
        let s = store(5);
        let edges = vec![edge(&s, 0, 1, 0.9), edge(&s, 3, 4, 0.75)];
        let config = ResolutionConfig::default();
        let result = Clusterer::new(&config).cluster(&s, &edges).unwrap();
        assert_eq!(result.clusters, vec![vec![0, 1], vec![2], vec![3, 4]]);
        assert_eq!(result.merge_edges.len(), 2);
    }

    #[test]
    fn test_chaining_is_reported() {
        let s = store(3);
        let edges = vec![edge(&s, 0, 1, 0.72), edge(&s, 1, 2, 0.71), edge(&s, 0, 2, 0.3)];
        let config = ResolutionConfig::default();
        let result = Clusterer::new(&config).cluster(&s, &edges).unwrap();
        assert_eq!(result.clusters, vec![vec![0, 1, 2]]);
        assert_eq!(
            result.transitive_links,
            vec![TransitiveLink {
                mention_a_id: "m0".into(),
                mention_b_id: "m2".into(),
                direct_score: Some(0.3),
            }]
        );
    }

    #[test]
    fn test_near_miss_window() {
        let s = store(6);
        let edges = vec![
            edge(&s, 0, 1, 0.6),  // dentro da tolerância
            edge(&s, 2, 3, 0.5),  // fora de tudo
            edge(&s, 4, 5, 0.69), // logo abaixo do piso
        ];
        let config = ResolutionConfig::default();
        let result = Clusterer::new(&config).cluster(&s, &edges).unwrap();
        let logged: Vec<_> = result
            .near_misses
            .iter()
            .map(|n| (n.edge.a, n.edge.b))
            .collect();
        assert_eq!(logged, vec![(0, 1), (4, 5)]);
        assert!((result.near_misses[0].gap - 0.1).abs() < 1e-9);
        assert_eq!(result.clusters.len(), 6);
    }

    #[test]
    fn test_partial_threshold_also_logs() {
        let s = store(2);
        let config = ResolutionConfig {
            clustering_tolerance: 0.0,
            partial_match_threshold: 0.6,
            ..Default::default()
        };
        let result = Clusterer::new(&config).cluster(&s, &[edge(&s, 0, 1, 0.62)]).unwrap();
        assert_eq!(result.near_misses.len(), 1);
    }

    #[test]
    fn test_edge_order_does_not_matter() {
        let s = store(4);
        let mut edges = vec![edge(&s, 0, 1, 0.8), edge(&s, 2, 3, 0.8), edge(&s, 1, 2, 0.65)];
        let config = ResolutionConfig::default();
        let first = Clusterer::new(&config).cluster(&s, &edges).unwrap();
        edges.reverse();
        let second = Clusterer::new(&config).cluster(&s, &edges).unwrap();
        assert_eq!(first.clusters, second.clusters);
        assert_eq!(first.near_misses, second.near_misses);
    }

    #[test]
    fn test_mixed_type_cluster_is_fatal() {
        let s = MentionStore::from_mentions(
            vec![
                Mention::new("p", "Coral Gables", EntityType::Person, "d"),
                Mention::new("o", "Coral Gables", EntityType::Organization, "d"),
            ],
            vec![],
        )
        .unwrap();
        let config = ResolutionConfig::default();
        let err = Clusterer::new(&config).cluster(&s, &[edge(&s, 0, 1, 1.0)]).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::MixedTypeCluster { ref members, .. } if members.len() == 2
        ));
    }
}
