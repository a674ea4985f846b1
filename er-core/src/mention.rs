//! # Menções e o Repositório de Menções
//!
//! Uma **menção** é uma referência textual a uma entidade, extraída de um documento
//! de reunião (pauta, ata, portaria, resolução). A mesma pessoa pode aparecer como
//! "Vince Lago", "V. Lago" ou "Mayor Lago"; cada uma dessas ocorrências é uma menção.
//!
//! ## Entrada vs. Modelo Validado
//!
//! - [`MentionRecord`]: formato de fio (JSON) vindo do extrator. O `type` é uma string livre.
//! - [`Mention`]: registro validado, com [`EntityType`] fechado.
//!
//! [`MentionStore::new`] faz a conversão e rejeita entradas inconsistentes
//! (ids duplicados, nomes vazios, tipos desconhecidos, referências pendentes).
//! O repositório é imutável depois de construído; os demais estágios apenas o leem
//! e se referem às menções pelo **índice** (arena), nunca por ponteiro.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// Identificador de menção atribuído pelo extrator.
pub type MentionId = String;

/// Categorias de entidade do grafo de reuniões.
///
/// Menções de tipos diferentes **nunca** são fundidas: "Agenda Item E-1" e
/// "Ordinance 2024-01" podem descrever o mesmo ato legislativo, mas ficam ligadas
/// por um relacionamento, não por merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// **Pessoa**: prefeitos, comissários, servidores. Ex: "Vince Lago".
    Person,
    /// **Organização**: departamentos, conselhos, empresas. Ex: "Coral Gables Police Department".
    Organization,
    /// **Item de Pauta**: itens numerados da agenda. Ex: "Agenda Item E-1".
    AgendaItem,
    /// **Portaria/Ordinance**: atos normativos numerados. Ex: "Ordinance 2024-01".
    Ordinance,
    /// **Resolução**: deliberações numeradas. Ex: "Resolution 2024-15".
    Resolution,
    /// **Local**: endereços, bairros, cidades.
    Location,
    /// **Reunião**: sessões da comissão.
    Meeting,
    /// **Documento**: anexos, relatórios, transcrições.
    Document,
    /// **Projeto**: obras e programas.
    Project,
}

impl EntityType {
    /// Nome da categoria como string (igual à serialização)
    pub fn name(&self) -> &'static str {
        match self {
            EntityType::Person => "person",
            EntityType::Organization => "organization",
            EntityType::AgendaItem => "agenda_item",
            EntityType::Ordinance => "ordinance",
            EntityType::Resolution => "resolution",
            EntityType::Location => "location",
            EntityType::Meeting => "meeting",
            EntityType::Document => "document",
            EntityType::Project => "project",
        }
    }

    /// Tenta parsear a partir de string, tolerando caixa e separadores
    /// (ex: "AGENDA_ITEM", "agenda-item", "Agenda Item" → `AgendaItem`).
    pub fn from_str(s: &str) -> Option<Self> {
        let key: String = s
            .trim()
            .chars()
            .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c.to_ascii_lowercase() })
            .collect();
        match key.as_str() {
            "person" => Some(EntityType::Person),
            "organization" | "organisation" | "org" => Some(EntityType::Organization),
            "agenda_item" => Some(EntityType::AgendaItem),
            "ordinance" => Some(EntityType::Ordinance),
            "resolution" => Some(EntityType::Resolution),
            "location" => Some(EntityType::Location),
            "meeting" => Some(EntityType::Meeting),
            "document" => Some(EntityType::Document),
            "project" => Some(EntityType::Project),
            _ => None,
        }
    }

    /// Tipos cujos nomes carregam códigos identificadores (E-1, 2024-01).
    pub fn is_legislative(&self) -> bool {
        matches!(
            self,
            EntityType::AgendaItem | EntityType::Ordinance | EntityType::Resolution
        )
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Proveniência de uma menção: de qual documento (e trecho) ela veio.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    /// Identificador do documento de origem (ex: "2024-01-09-minutes").
    pub document: String,
    /// Chunk de texto dentro do documento, quando conhecido.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<u32>,
    /// Página do PDF original, quando conhecida.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl SourceRef {
    pub fn document(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            chunk: None,
            page: None,
        }
    }
}

/// Uma menção validada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub id: MentionId,
    /// Texto de superfície como extraído ("V. Lago", "Mayor Lago"). Nunca vazio.
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default)]
    pub description: String,
    /// Cargos/títulos observados, em ordem de aparição ("Mayor", "Commissioner").
    #[serde(default)]
    pub roles: Vec<String>,
    pub source: SourceRef,
    /// Menções extraídas como relacionadas a esta. Evidência estrutural apenas.
    #[serde(default)]
    pub neighbors: BTreeSet<MentionId>,
    /// Atributos não modelados. Nunca participam da pontuação.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Mention {
    pub fn new(
        id: impl Into<MentionId>,
        name: impl Into<String>,
        entity_type: EntityType,
        document: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            entity_type,
            description: String::new(),
            roles: Vec::new(),
            source: SourceRef::document(document),
            neighbors: BTreeSet::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_neighbors<I, S>(mut self, neighbors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<MentionId>,
    {
        self.neighbors = neighbors.into_iter().map(Into::into).collect();
        self
    }
}

/// Menção no formato de fio, antes da validação.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentionRecord {
    pub id: MentionId,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub source: SourceRef,
    #[serde(default)]
    pub neighbors: BTreeSet<MentionId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl From<Mention> for MentionRecord {
    fn from(m: Mention) -> Self {
        Self {
            id: m.id,
            name: m.name,
            entity_type: m.entity_type.name().to_string(),
            description: m.description,
            roles: m.roles,
            source: m.source,
            neighbors: m.neighbors,
            extra: m.extra,
        }
    }
}

impl TryFrom<MentionRecord> for Mention {
    type Error = ResolveError;

    fn try_from(r: MentionRecord) -> Result<Self, Self::Error> {
        let entity_type = EntityType::from_str(&r.entity_type).ok_or_else(|| {
            ResolveError::UnknownEntityType {
                id: r.id.clone(),
                value: r.entity_type.clone(),
            }
        })?;
        Ok(Self {
            id: r.id,
            name: r.name,
            entity_type,
            description: r.description,
            roles: r.roles,
            source: r.source,
            neighbors: r.neighbors,
            extra: r.extra,
        })
    }
}

fn default_weight() -> f64 {
    1.0
}

/// Relacionamento extraído entre duas menções (direcionado).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: MentionId,
    pub target: MentionId,
    pub relation_type: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl Relationship {
    pub fn new(
        source: impl Into<MentionId>,
        target: impl Into<MentionId>,
        relation_type: impl Into<String>,
        weight: f64,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation_type: relation_type.into(),
            weight,
        }
    }
}

/// Repositório imutável de menções de uma passada, com índice id → posição.
#[derive(Debug, Clone)]
pub struct MentionStore {
    mentions: Vec<Mention>,
    relationships: Vec<Relationship>,
    index: HashMap<MentionId, usize>,
}

impl MentionStore {
    /// Valida registros de fio e constrói o repositório.
    pub fn new(
        records: Vec<MentionRecord>,
        relationships: Vec<Relationship>,
    ) -> Result<Self, ResolveError> {
        let mentions = records
            .into_iter()
            .map(Mention::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_mentions(mentions, relationships)
    }

    /// Constrói a partir de menções já tipadas, aplicando as mesmas validações.
    pub fn from_mentions(
        mut mentions: Vec<Mention>,
        relationships: Vec<Relationship>,
    ) -> Result<Self, ResolveError> {
        let mut index = HashMap::with_capacity(mentions.len());

        for (i, mention) in mentions.iter_mut().enumerate() {
            let trimmed = mention.name.trim();
            if trimmed.is_empty() {
                return Err(ResolveError::EmptyName { id: mention.id.clone() });
            }
            if trimmed.len() != mention.name.len() {
                mention.name = trimmed.to_string();
            }
            if index.insert(mention.id.clone(), i).is_some() {
                return Err(ResolveError::DuplicateMentionId { id: mention.id.clone() });
            }
        }

        for mention in &mentions {
            if let Some(missing) = mention.neighbors.iter().find(|n| !index.contains_key(*n)) {
                return Err(ResolveError::DanglingNeighbor {
                    id: mention.id.clone(),
                    missing: missing.clone(),
                });
            }
        }

        for (i, rel) in relationships.iter().enumerate() {
            for endpoint in [&rel.source, &rel.target] {
                if !index.contains_key(endpoint) {
                    return Err(ResolveError::DanglingRelationship {
                        index: i,
                        missing: endpoint.clone(),
                    });
                }
            }
        }

        Ok(Self {
            mentions,
            relationships,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.mentions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mentions.is_empty()
    }

    pub fn get(&self, index: usize) -> &Mention {
        &self.mentions[index]
    }

    pub fn mentions(&self) -> &[Mention] {
        &self.mentions
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Vizinhança estrutural não-direcionada de cada menção (por índice):
    /// `neighbors` declarados ∪ extremidades dos relacionamentos.
    pub fn adjacency(&self) -> Vec<BTreeSet<usize>> {
        let mut adj = vec![BTreeSet::new(); self.mentions.len()];
        for (i, mention) in self.mentions.iter().enumerate() {
            for n in &mention.neighbors {
                if let Some(j) = self.index_of(n) {
                    if i != j {
                        adj[i].insert(j);
                        adj[j].insert(i);
                    }
                }
            }
        }
        for rel in &self.relationships {
            if let (Some(s), Some(t)) = (self.index_of(&rel.source), self.index_of(&rel.target)) {
                if s != t {
                    adj[s].insert(t);
                    adj[t].insert(s);
                }
            }
        }
        adj
    }
}
