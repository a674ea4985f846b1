//! # er-core — Resolução de Entidades para Grafos de Reuniões Municipais
//!
//! Passadas independentes de extração produzem muitas menções textuais da mesma
//! entidade do mundo real: um comissário escrito de três jeitos, um item de pauta
//! citado pelo código e pela portaria que o implementa, um departamento por sigla
//! e por extenso. Este crate decide quais menções denotam a mesma **entidade
//! canônica** e as consolida, sem fundir entidades distintas.
//!
//! ## Arquitetura
//!
//! O dado flui por um pipeline linear:
//!
//! 1.  **Entrada** ([`mention`]): menções e relacionamentos validados num repositório imutável.
//! 2.  **Normalização** ([`normalize`]): nomes decompostos em tokens, cargos, iniciais e códigos.
//! 3.  **Blocagem** ([`blocking`]): só pares plausíveis (mesmo tipo, assinatura em comum).
//! 4.  **Sinais** ([`signals`]): string, tokens, semântico ([`tfidf`]), estrutura do grafo, cargo/abreviação.
//! 5.  **Score** ([`scorer`]): soma ponderada com atalhos de tier, em paralelo.
//! 6.  **Clusterização** ([`cluster`]): union-find, quase-merges e encadeamentos.
//! 7.  **Consolidação** ([`merge`]): nome canônico, aliases, cargos, descrição, relacionamentos reescritos.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use er_core::{EntityType, Mention, Preset, ResolutionInput, ResolutionPipeline};
//!
//! let input = ResolutionInput::from_mentions(
//!     vec![
//!         Mention::new("m1", "V. Lago", EntityType::Person, "minutes"),
//!         Mention::new("m2", "Vince Lago", EntityType::Person, "agenda"),
//!     ],
//!     vec![],
//! );
//!
//! let pipeline = ResolutionPipeline::from_preset(Preset::Conservative);
//! let output = pipeline.resolve(&input).expect("entrada válida");
//!
//! assert_eq!(output.entities.len(), 1);
//! assert_eq!(output.entities[0].canonical_name, "Vince Lago");
//! ```

pub mod blocking;
pub mod cluster;
pub mod config;
pub mod corpus;
pub mod error;
pub mod merge;
pub mod mention;
pub mod normalize;
pub mod pipeline;
pub mod scorer;
pub mod signals;
pub mod tfidf;

pub use config::{ConfigOverrides, Preset, ResolutionConfig, SignalToggles, SignalWeights};
pub use error::{ConfigError, ResolveError};
pub use merge::{CanonicalEntity, CanonicalRelationship};
pub use mention::{EntityType, Mention, MentionId, MentionRecord, Relationship, SourceRef};
pub use pipeline::{
    Diagnostics, ResolutionEvent, ResolutionInput, ResolutionOutput, ResolutionPipeline,
};
pub use scorer::{MatchReason, ScoreTier, SimilarityEdge};
pub use signals::SignalKind;
