//! # Taxonomia de Erros da Resolução
//!
//! Três famílias de falhas podem aparecer numa passada de resolução:
//!
//! - **Integridade da entrada** (fatal): ids duplicados, nomes vazios, tipos desconhecidos,
//!   relacionamentos ou vizinhos apontando para menções inexistentes.
//! - **Violação de invariante** (fatal, indica bug): um cluster com tipos mistos.
//! - **Anomalias leves** (não fatais): evidência estrutural insuficiente, quase-merges.
//!   Estas **não** são erros; elas viram itens do relatório de diagnóstico
//!   ([`crate::pipeline::Diagnostics`]).
//!
//! Nenhuma saída parcial é emitida quando um erro fatal ocorre.

use thiserror::Error;

use crate::mention::{EntityType, MentionId};

/// Erro fatal de uma passada de resolução.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("id de menção duplicado: '{id}'")]
    DuplicateMentionId { id: MentionId },

    #[error("menção '{id}' possui nome vazio")]
    EmptyName { id: MentionId },

    #[error("menção '{id}' possui tipo desconhecido '{value}'")]
    UnknownEntityType { id: MentionId, value: String },

    #[error("relacionamento #{index} referencia menção inexistente '{missing}'")]
    DanglingRelationship { index: usize, missing: MentionId },

    #[error("menção '{id}' lista vizinho inexistente '{missing}'")]
    DanglingNeighbor { id: MentionId, missing: MentionId },

    /// Invariante do clusterer: arestas só existem dentro de um mesmo tipo.
    #[error("cluster com tipos mistos {types:?}: {members:?}")]
    MixedTypeCluster {
        members: Vec<MentionId>,
        types: Vec<EntityType>,
    },

    #[error("conflito de tipo ao consolidar '{entity_id}' ({types:?}): {members:?}")]
    TypeConflict {
        entity_id: String,
        members: Vec<MentionId>,
        types: Vec<EntityType>,
    },

    #[error("configuração inválida: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("falha ao criar o pool de workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl ResolveError {
    /// Identificador estável da variante (para JSON e eventos).
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::DuplicateMentionId { .. } => "duplicate_mention_id",
            ResolveError::EmptyName { .. } => "empty_name",
            ResolveError::UnknownEntityType { .. } => "unknown_entity_type",
            ResolveError::DanglingRelationship { .. } => "dangling_relationship",
            ResolveError::DanglingNeighbor { .. } => "dangling_neighbor",
            ResolveError::MixedTypeCluster { .. } => "mixed_type_cluster",
            ResolveError::TypeConflict { .. } => "type_conflict",
            ResolveError::InvalidConfig(_) => "invalid_config",
            ResolveError::WorkerPool(_) => "worker_pool",
        }
    }

    /// `true` para erros causados pela entrada (e não por bug do motor).
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ResolveError::DuplicateMentionId { .. }
                | ResolveError::EmptyName { .. }
                | ResolveError::UnknownEntityType { .. }
                | ResolveError::DanglingRelationship { .. }
                | ResolveError::DanglingNeighbor { .. }
                | ResolveError::InvalidConfig(_)
        )
    }
}

/// Erros de validação de [`crate::config::ResolutionConfig`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("peso do sinal '{signal}' não é finito e não-negativo: {value}")]
    InvalidWeight { signal: &'static str, value: f64 },

    #[error("a soma dos pesos precisa ser positiva")]
    ZeroWeights,

    #[error("limiar '{name}' fora de [0, 1]: {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error(
        "limiares fora de ordem: exigido min_combined_score ({min}) <= \
         high_similarity_threshold ({high}) <= exact_match_threshold ({exact})"
    )]
    ThresholdOrder { min: f64, high: f64, exact: f64 },

    #[error("clustering_tolerance precisa ser finita e >= 0: {0}")]
    NegativeTolerance(f64),

    #[error("max_description_len precisa ser >= 1")]
    ZeroDescriptionLen,

    #[error("worker_threads precisa ser >= 1")]
    ZeroWorkers,

    #[error("preset desconhecido '{0}' (use aggressive, conservative ou name_focused)")]
    UnknownPreset(String),
}
