//! # Corpus de Demonstração — Reunião da Comissão de Coral Gables
//!
//! Menções extraídas de três documentos de uma mesma reunião (pauta, ata e texto
//! da portaria), escritas como um extrator real as produziria: a mesma pessoa
//! com e sem cargo, abreviada, com nome invertido; a mesma organização por
//! sigla e por extenso; o mesmo ato legislativo como item de pauta e como
//! portaria.
//!
//! ## Casos Cobertos
//! - Duplicata exata e nome invertido ("Lago, Vince")
//! - Iniciais ("V. Lago"), cargo + sobrenome ("Mayor Lago"), só cargo ("Mayor")
//! - Sigla ("CGPD")
//! - Códigos diferentes que nunca devem fundir ("E-1" vs "E-2", "2024-01" vs "2024-02")
//! - Referentes idênticos de tipos diferentes, ligados por relacionamento

use crate::mention::{EntityType, Mention, Relationship};
use crate::pipeline::ResolutionInput;

const AGENDA: &str = "2024-01-09-agenda";
const MINUTES: &str = "2024-01-09-minutes";
const ORDINANCE: &str = "ordinance-2024-01";

/// Uma menção do corpus: (id, nome, tipo, documento, cargos, descrição).
struct DemoMention {
    id: &'static str,
    name: &'static str,
    entity_type: EntityType,
    document: &'static str,
    roles: &'static [&'static str],
    description: &'static str,
}

const MENTIONS: &[DemoMention] = &[
    // ===== PAUTA =====
    DemoMention {
        id: "ag-1",
        name: "Vince Lago",
        entity_type: EntityType::Person,
        document: AGENDA,
        roles: &["Mayor"],
        description: "Mayor of the City of Coral Gables; presides over the commission meeting.",
    },
    DemoMention {
        id: "ag-2",
        name: "Rhonda Anderson",
        entity_type: EntityType::Person,
        document: AGENDA,
        roles: &["Vice Mayor"],
        description: "Vice Mayor of Coral Gables.",
    },
    DemoMention {
        id: "ag-3",
        name: "Kirk Menendez",
        entity_type: EntityType::Person,
        document: AGENDA,
        roles: &["Commissioner"],
        description: "City commissioner.",
    },
    DemoMention {
        id: "ag-4",
        name: "Agenda Item E-1",
        entity_type: EntityType::AgendaItem,
        document: AGENDA,
        roles: &[],
        description: "An ordinance amending the zoning code for mixed-use districts.",
    },
    DemoMention {
        id: "ag-5",
        name: "Agenda Item E-2",
        entity_type: EntityType::AgendaItem,
        document: AGENDA,
        roles: &[],
        description: "A resolution approving the parks and recreation budget.",
    },
    DemoMention {
        id: "ag-6",
        name: "Coral Gables Police Department",
        entity_type: EntityType::Organization,
        document: AGENDA,
        roles: &[],
        description: "Presents the annual public safety report.",
    },
    DemoMention {
        id: "ag-7",
        name: "City Commission",
        entity_type: EntityType::Organization,
        document: AGENDA,
        roles: &[],
        description: "Governing body of the City of Coral Gables.",
    },
    // ===== ATA =====
    DemoMention {
        id: "mi-1",
        name: "Mayor",
        entity_type: EntityType::Person,
        document: MINUTES,
        roles: &[],
        description: "Called the meeting to order at 9:00 a.m.",
    },
    DemoMention {
        id: "mi-2",
        name: "Mayor Lago",
        entity_type: EntityType::Person,
        document: MINUTES,
        roles: &[],
        description: "Presided over the commission meeting.",
    },
    DemoMention {
        id: "mi-3",
        name: "V. Lago",
        entity_type: EntityType::Person,
        document: MINUTES,
        roles: &[],
        description: "Moved to approve Item E-1 on first reading.",
    },
    DemoMention {
        id: "mi-4",
        name: "Vice Mayor Anderson",
        entity_type: EntityType::Person,
        document: MINUTES,
        roles: &[],
        description: "Seconded the motion.",
    },
    DemoMention {
        id: "mi-5",
        name: "Commissioner Menendez",
        entity_type: EntityType::Person,
        document: MINUTES,
        roles: &[],
        description: "Asked about parking requirements in mixed-use districts.",
    },
    DemoMention {
        id: "mi-6",
        name: "CGPD",
        entity_type: EntityType::Organization,
        document: MINUTES,
        roles: &[],
        description: "Presented the public safety report.",
    },
    DemoMention {
        id: "mi-7",
        name: "Agenda Item E-2",
        entity_type: EntityType::AgendaItem,
        document: MINUTES,
        roles: &[],
        description: "Parks and recreation budget resolution; approved unanimously.",
    },
    // ===== PORTARIA =====
    DemoMention {
        id: "or-1",
        name: "Ordinance 2024-01",
        entity_type: EntityType::Ordinance,
        document: ORDINANCE,
        roles: &[],
        description: "Amends the zoning code for mixed-use districts.",
    },
    DemoMention {
        id: "or-2",
        name: "Ordinance 2024-02",
        entity_type: EntityType::Ordinance,
        document: ORDINANCE,
        roles: &[],
        description: "Amends the zoning code for historic districts.",
    },
    DemoMention {
        id: "or-3",
        name: "Lago, Vince",
        entity_type: EntityType::Person,
        document: ORDINANCE,
        roles: &["Mayor"],
        description: "Signed the ordinance as Mayor.",
    },
];

/// (origem, destino, tipo, peso)
const RELATIONSHIPS: &[(&str, &str, &str, f64)] = &[
    ("ag-1", "ag-7", "member of", 1.0),
    ("ag-2", "ag-7", "member of", 1.0),
    ("ag-3", "ag-7", "member of", 1.0),
    ("ag-1", "ag-4", "sponsors", 0.8),
    ("ag-6", "ag-7", "reports to", 0.6),
    ("ag-4", "or-1", "is the same legislative action", 1.0),
    ("mi-2", "ag-7", "presides over", 1.0),
    ("mi-3", "ag-4", "moved to approve", 0.9),
    ("mi-4", "ag-4", "seconded", 0.9),
    ("mi-5", "ag-4", "discussed", 0.5),
    ("mi-6", "ag-7", "reports to", 0.7),
    ("or-3", "or-1", "signed", 1.0),
];

/// Menções do corpus de demonstração.
pub fn demo_mentions() -> Vec<Mention> {
    MENTIONS
        .iter()
        .map(|m| {
            Mention::new(m.id, m.name, m.entity_type, m.document)
                .with_roles(m.roles.iter().copied())
                .with_description(m.description)
        })
        .collect()
}

pub fn demo_relationships() -> Vec<Relationship> {
    RELATIONSHIPS
        .iter()
        .map(|&(source, target, relation_type, weight)| {
            Relationship::new(source, target, relation_type, weight)
        })
        .collect()
}

/// Lote completo pronto para o pipeline.
pub fn demo_input() -> ResolutionInput {
    ResolutionInput::from_mentions(demo_mentions(), demo_relationships())
}
