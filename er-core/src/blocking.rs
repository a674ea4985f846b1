//! # Gerador de Candidatos (Blocagem)
//!
//! Comparar todas as menções entre si é O(n²). A blocagem agrupa as menções por
//! `(tipo, letra da assinatura)` e só compara pares que dividem algum bloco:
//!
//! ```text
//! "Vince Lago"  → person {l, v}   ─┐
//! "V. Lago"     → person {l, v}   ─┼─ bloco (person, 'l')
//! "Lago"        → person {l}      ─┘
//! "Kirk Menendez" → person {k, m}     (nunca comparado com Lago)
//! ```
//!
//! Menções de pessoa que são só um cargo ("Mayor") não têm sobrenome para
//! blocar: vão para um bloco por documento e são pareadas com todas as pessoas
//! do mesmo documento.

use std::collections::{BTreeMap, BTreeSet};

use crate::mention::EntityType;
use crate::signals::ScoringContext;

/// Par candidato (índices no repositório), orientado por id: `id(a) < id(b)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidatePair {
    pub a: usize,
    pub b: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    /// Pares distintos, ordenados por `(id_a, id_b)`.
    pub pairs: Vec<CandidatePair>,
    pub blocks: usize,
    pub role_only_blocks: usize,
    pub largest_block: usize,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

pub fn generate_candidates(ctx: &ScoringContext<'_>) -> CandidateSet {
    let store = ctx.store;
    let mut blocks: BTreeMap<(EntityType, char), Vec<usize>> = BTreeMap::new();
    let mut role_only: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    let mut persons_by_doc: BTreeMap<&str, Vec<usize>> = BTreeMap::new();

    for (i, mention) in store.mentions().iter().enumerate() {
        let parts = &ctx.names[i];
        if mention.entity_type == EntityType::Person {
            persons_by_doc.entry(mention.source.document.as_str()).or_default().push(i);
            if parts.is_role_only() {
                role_only.entry(mention.source.document.as_str()).or_default().push(i);
                continue;
            }
        }
        for c in parts.signature() {
            blocks.entry((mention.entity_type, c)).or_default().push(i);
        }
    }

    let mut seen: BTreeSet<(usize, usize)> = BTreeSet::new();
    let mut largest_block = 0;

    for members in blocks.values() {
        largest_block = largest_block.max(members.len());
        for (k, &x) in members.iter().enumerate() {
            for &y in &members[k + 1..] {
                seen.insert((x.min(y), x.max(y)));
            }
        }
    }

    for (document, members) in &role_only {
        let persons = persons_by_doc.get(document).map(Vec::as_slice).unwrap_or(&[]);
        largest_block = largest_block.max(persons.len());
        for &x in members {
            for &y in persons {
                if x != y {
                    seen.insert((x.min(y), x.max(y)));
                }
            }
        }
    }

    let mut pairs: Vec<CandidatePair> = seen
        .into_iter()
        .map(|(x, y)| {
            if store.get(x).id <= store.get(y).id {
                CandidatePair { a: x, b: y }
            } else {
                CandidatePair { a: y, b: x }
            }
        })
        .collect();
    pairs.sort_by(|p, q| {
        (&store.get(p.a).id, &store.get(p.b).id).cmp(&(&store.get(q.a).id, &store.get(q.b).id))
    });

    tracing::debug!(
        pairs = pairs.len(),
        blocks = blocks.len(),
        role_only_blocks = role_only.len(),
        largest_block,
        "candidatos gerados"
    );

    CandidateSet {
        pairs,
        blocks: blocks.len(),
        role_only_blocks: role_only.len(),
        largest_block,
    }
}
