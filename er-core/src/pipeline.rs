//! # Pipeline de Resolução — Orquestrador com Eventos Observáveis
//!
//! Encadeia os estágios da resolução e emite um evento a cada passo via canal
//! (`mpsc`), permitindo que o servidor WebSocket transmita o progresso ao cliente:
//!
//! ```text
//! MentionStore → blocagem → sinais → scorer → clusterer → merge → saída
//!   InputValidated  CandidatesGenerated  EdgesScored  NearMiss*  ClusterFormed*  Done
//! ```
//!
//! Erros fatais (entrada inválida, invariante violada) interrompem a passada sem
//! nenhuma saída parcial. Anomalias leves vão para [`Diagnostics`].

use std::sync::mpsc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::blocking::generate_candidates;
use crate::cluster::{Clusterer, NearMiss, TransitiveLink};
use crate::config::{Preset, ResolutionConfig};
use crate::error::ResolveError;
use crate::merge::{CanonicalEntity, CanonicalRelationship, MergeResolver};
use crate::mention::{Mention, MentionId, MentionRecord, MentionStore, Relationship};
use crate::scorer::{CombinedScorer, MatchReason};
use crate::signals::ScoringContext;

/// Lote de menções e relacionamentos vindo do extrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionInput {
    pub mentions: Vec<MentionRecord>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl ResolutionInput {
    pub fn from_mentions(mentions: Vec<Mention>, relationships: Vec<Relationship>) -> Self {
        Self {
            mentions: mentions.into_iter().map(MentionRecord::from).collect(),
            relationships,
        }
    }
}

/// Anomalias leves acumuladas durante a passada.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub near_misses: Vec<NearMiss>,
    pub transitive_links: Vec<TransitiveLink>,
    /// Menções com menos de 2 vizinhos (o sinal estrutural se absteve).
    pub sparse_structure_mentions: Vec<MentionId>,
    pub dropped_self_loops: usize,
}

/// Um merge executado (uma aresta acima do piso).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRecord {
    pub entity_id: String,
    pub canonical_name: String,
    pub mention_a_id: MentionId,
    pub mention_b_id: MentionId,
    pub combined_score: f64,
    pub reason: MatchReason,
}

/// Relatório de merge: contagens e merges executados.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub min_combined_score: f64,
    pub input_mentions: usize,
    pub canonical_entities: usize,
    pub merged_mentions: usize,
    /// Redução percentual do número de nós.
    pub reduction_pct: f64,
    pub candidate_pairs: usize,
    pub scored_edges: usize,
    pub merge_edges: usize,
    pub near_misses: usize,
    pub transitive_links: usize,
    pub sparse_structure_mentions: usize,
    pub dropped_self_loops: usize,
    pub merges: Vec<MergeRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionOutput {
    pub entities: Vec<CanonicalEntity>,
    pub relationships: Vec<CanonicalRelationship>,
    pub diagnostics: Diagnostics,
    pub report: ResolutionReport,
}

/// Quantos quase-merges o relatório em texto lista.
const TEXT_REPORT_NEAR_MISSES: usize = 10;

impl ResolutionOutput {
    /// Entidade que contém a menção `id`.
    pub fn entity_of(&self, mention_id: &str) -> Option<&CanonicalEntity> {
        self.entities
            .iter()
            .find(|e| e.member_mention_ids.contains(mention_id))
    }

    /// Relatório legível (merges executados e principais quase-merges).
    pub fn render_text(&self) -> String {
        let r = &self.report;
        let mut out = String::new();
        out.push_str("Entity Resolution Report\n");
        out.push_str(&"=".repeat(50));
        out.push_str("\n\n");
        out.push_str(&format!("Minimum combined score: {:.2}\n", r.min_combined_score));
        out.push_str(&format!(
            "Mentions: {} -> canonical entities: {} ({:.1}% reduction)\n",
            r.input_mentions, r.canonical_entities, r.reduction_pct
        ));
        out.push_str(&format!(
            "Candidate pairs: {}, scored edges: {}, merges executed: {}\n",
            r.candidate_pairs, r.scored_edges, r.merge_edges
        ));
        out.push_str(&format!(
            "Near misses: {}, transitive links: {}\n",
            r.near_misses, r.transitive_links
        ));
        out.push_str(&format!(
            "Sparse-structure mentions: {}, dropped self loops: {}\n\n",
            r.sparse_structure_mentions, r.dropped_self_loops
        ));

        out.push_str("Executed merges:\n");
        out.push_str(&"-".repeat(20));
        out.push('\n');
        for merge in &r.merges {
            out.push_str(&format!(
                "\n'{}' <- {} + {}\n  Score: {:.3}\n  Reason: {}\n",
                merge.canonical_name,
                merge.mention_a_id,
                merge.mention_b_id,
                merge.combined_score,
                merge.reason.label()
            ));
        }

        if !self.diagnostics.near_misses.is_empty() {
            out.push_str("\n\nTop candidates (not merged):\n");
            out.push_str(&"-".repeat(30));
            out.push('\n');
            let mut ranked: Vec<&NearMiss> = self.diagnostics.near_misses.iter().collect();
            ranked.sort_by(|a, b| b.edge.combined_score.total_cmp(&a.edge.combined_score));
            for miss in ranked.into_iter().take(TEXT_REPORT_NEAR_MISSES) {
                out.push_str(&format!(
                    "\n{} <-> {}\n  Score: {:.3} (gap {:.3})\n  Reason: {}\n",
                    miss.edge.mention_a_id,
                    miss.edge.mention_b_id,
                    miss.edge.combined_score,
                    miss.gap,
                    miss.edge.reason.label()
                ));
            }
        }
        out
    }
}

/// Eventos emitidos pelo pipeline durante a resolução.
///
/// Permitem que a UI acompanhe cada estágio. O último evento é sempre `Done`
/// ou `Error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ResolutionEvent {
    /// **Passo 1**: entrada validada e repositório construído.
    InputValidated {
        mentions: usize,
        relationships: usize,
    },
    /// **Passo 2**: blocagem concluída.
    CandidatesGenerated {
        pairs: usize,
        blocks: usize,
        role_only_blocks: usize,
        largest_block: usize,
    },
    /// **Passo 3**: todas as arestas pontuadas e clusterizadas.
    EdgesScored {
        edges: usize,
        above_threshold: usize,
    },
    /// Uma aresta ficou logo abaixo do piso (não unida).
    NearMiss { near_miss: NearMiss },
    /// **Passo 4**: um cluster com mais de uma menção virou entidade canônica.
    ClusterFormed {
        entity_id: String,
        canonical_name: String,
        members: Vec<MentionId>,
    },
    /// **Conclusão**: saída completa.
    Done {
        output: ResolutionOutput,
        processing_ms: u64,
    },
    /// **Falha**: erro fatal; nenhuma saída parcial.
    Error { message: String, kind: String },
}

/// O pipeline de resolução.
///
/// - **Sync**: [`ResolutionPipeline::resolve`] para scripts e testes.
/// - **Streaming**: [`ResolutionPipeline::resolve_streaming`] para o WebSocket.
#[derive(Debug, Clone)]
pub struct ResolutionPipeline {
    config: ResolutionConfig,
}

impl ResolutionPipeline {
    /// Cria o pipeline validando a configuração.
    pub fn new(config: ResolutionConfig) -> Result<Self, ResolveError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn from_preset(preset: Preset) -> Self {
        Self {
            config: preset.config(),
        }
    }

    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    /// Resolve o lote de forma síncrona.
    pub fn resolve(&self, input: &ResolutionInput) -> Result<ResolutionOutput, ResolveError> {
        self.run(input, &mut |_| {})
    }

    /// Resolve o lote enviando os eventos de progresso pelo canal `tx`.
    ///
    /// Não retorna valores: o resultado chega no evento `Done` (ou `Error`).
    pub fn resolve_streaming(&self, input: &ResolutionInput, tx: mpsc::Sender<ResolutionEvent>) {
        let start = Instant::now();
        let result = self.run(input, &mut |event| {
            let _ = tx.send(event);
        });
        let last = match result {
            Ok(output) => ResolutionEvent::Done {
                output,
                processing_ms: start.elapsed().as_millis() as u64,
            },
            Err(err) => ResolutionEvent::Error {
                message: err.to_string(),
                kind: err.kind().to_string(),
            },
        };
        let _ = tx.send(last);
    }

    fn run(
        &self,
        input: &ResolutionInput,
        emit: &mut dyn FnMut(ResolutionEvent),
    ) -> Result<ResolutionOutput, ResolveError> {
        let store = MentionStore::new(input.mentions.clone(), input.relationships.clone())?;
        emit(ResolutionEvent::InputValidated {
            mentions: store.len(),
            relationships: store.relationships().len(),
        });

        let ctx = ScoringContext::build(&store, &self.config);
        let sparse: Vec<MentionId> = ctx
            .sparse_structure()
            .into_iter()
            .map(|i| store.get(i).id.clone())
            .collect();
        if self.config.toggles.graph && !sparse.is_empty() {
            tracing::warn!(
                mentions = sparse.len(),
                "menções com evidência estrutural insuficiente; sinal de grafo se absterá"
            );
        }

        let candidates = generate_candidates(&ctx);
        emit(ResolutionEvent::CandidatesGenerated {
            pairs: candidates.len(),
            blocks: candidates.blocks,
            role_only_blocks: candidates.role_only_blocks,
            largest_block: candidates.largest_block,
        });

        let edges = CombinedScorer::new(&self.config).score_all(&candidates, &ctx)?;
        let clustering = Clusterer::new(&self.config).cluster(&store, &edges)?;
        emit(ResolutionEvent::EdgesScored {
            edges: edges.len(),
            above_threshold: clustering.merge_edges.len(),
        });
        for near_miss in &clustering.near_misses {
            emit(ResolutionEvent::NearMiss {
                near_miss: near_miss.clone(),
            });
        }

        let merged = MergeResolver::new(&self.config).resolve(&store, &ctx.names, &clustering)?;
        for entity in merged.entities.iter().filter(|e| e.member_mention_ids.len() > 1) {
            emit(ResolutionEvent::ClusterFormed {
                entity_id: entity.id.clone(),
                canonical_name: entity.canonical_name.clone(),
                members: entity.member_mention_ids.iter().cloned().collect(),
            });
        }

        let merges = clustering
            .merge_edges
            .iter()
            .map(|edge| {
                let entity = &merged.entities[merged.entity_of[edge.a]];
                MergeRecord {
                    entity_id: entity.id.clone(),
                    canonical_name: entity.canonical_name.clone(),
                    mention_a_id: edge.mention_a_id.clone(),
                    mention_b_id: edge.mention_b_id.clone(),
                    combined_score: edge.combined_score,
                    reason: edge.reason,
                }
            })
            .collect();

        let input_mentions = store.len();
        let canonical_entities = merged.entities.len();
        let reduction_pct = if input_mentions == 0 {
            0.0
        } else {
            (input_mentions - canonical_entities) as f64 / input_mentions as f64 * 100.0
        };
        let report = ResolutionReport {
            min_combined_score: self.config.min_combined_score,
            input_mentions,
            canonical_entities,
            merged_mentions: input_mentions - canonical_entities,
            reduction_pct,
            candidate_pairs: candidates.len(),
            scored_edges: edges.len(),
            merge_edges: clustering.merge_edges.len(),
            near_misses: clustering.near_misses.len(),
            transitive_links: clustering.transitive_links.len(),
            sparse_structure_mentions: sparse.len(),
            dropped_self_loops: merged.dropped_self_loops,
            merges,
        };

        tracing::info!(
            mentions = input_mentions,
            entities = canonical_entities,
            candidates = report.candidate_pairs,
            merges = report.merge_edges,
            near_misses = report.near_misses,
            "resolução concluída"
        );

        Ok(ResolutionOutput {
            entities: merged.entities,
            relationships: merged.relationships,
            diagnostics: Diagnostics {
                near_misses: clustering.near_misses,
                transitive_links: clustering.transitive_links,
                sparse_structure_mentions: sparse,
                dropped_self_loops: merged.dropped_self_loops,
            },
            report,
        })
    }
}

impl Default for ResolutionPipeline {
    fn default() -> Self {
        Self {
            config: ResolutionConfig::default(),
        }
    }
}
