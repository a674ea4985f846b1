//! # Normalização de Nomes
//!
//! Todos os sinais de similaridade comparam nomes **normalizados**, nunca o texto cru.
//! Este módulo decompõe um nome de superfície em partes reutilizáveis ([`NameParts`]):
//!
//! | Campo         | "Mayor Vince Lago"  | "Lago, Vince"  | "CGPD"  |
//! |---------------|---------------------|----------------|---------|
//! | `normalized`  | `mayor vince lago`  | `lago vince`   | `cgpd`  |
//! | `significant` | `[vince, lago]`     | `[vince, lago]`| `[cgpd]`|
//! | `role`        | `mayor`             | —              | —       |
//! | `surname`     | `lago`              | `lago`         | `cgpd`  |
//! | `acronym`     | —                   | —              | `cgpd`  |
//!
//! ## Léxicos
//!
//! - **Honoríficos** ("mr", "dr", "hon") e sufixos ("jr") são descartados.
//! - **Stop words** ("the", "of") são descartadas.
//! - **Cargos** ("mayor", "vice mayor", "city manager") são reconhecidos do mais longo
//!   para o mais curto e removidos dos tokens significativos, mas lembrados em `role`.
//!
//! ## Códigos Legislativos
//!
//! Itens de pauta, portarias e resoluções carregam códigos ("E-1", "2024-01").
//! Eles são extraídos e canonizados (`E-1`, `2024-1`) para que "Agenda Item E-1" e
//! "Agenda Item E-2" nunca sejam confundidos por similaridade de string.
//! A comparação ([`compare_codes`]) olha o código principal: números extras no
//! título ("amending Chapter 62") não separam o mesmo ato.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-/_]+").expect("regex de separadores inválida"));

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("regex de pontuação inválida"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("regex de espaços inválida"));

static LEGISLATIVE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:([a-z]{1,2})-?)?(\d+(?:[-./]\d+)*)\b")
        .expect("regex de códigos legislativos inválida")
});

/// Pronomes de tratamento e sufixos geracionais.
pub const HONORIFICS: &[&str] = &[
    "mr", "mrs", "ms", "miss", "dr", "hon", "honorable", "sir", "madam", "jr", "sr", "ii", "iii",
];

/// Stop words em inglês descartadas de todas as comparações por token.
pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from",
];

/// Cargos reconhecidos, do mais longo para o mais curto (casamento guloso).
pub const ROLE_PHRASES: &[&str] = &[
    "vice mayor",
    "city manager",
    "assistant city manager",
    "city attorney",
    "city clerk",
    "police chief",
    "fire chief",
    "finance director",
    "mayor",
    "commissioner",
    "councilman",
    "councilwoman",
    "councilmember",
    "director",
    "manager",
    "chief",
    "clerk",
    "attorney",
    "chairman",
    "chairwoman",
    "chairperson",
    "chair",
];

/// Lista de cargos ordenada pelo número de tokens (decrescente).
static ROLE_LEXICON: LazyLock<Vec<(&'static str, Vec<&'static str>)>> = LazyLock::new(|| {
    let mut lexicon: Vec<(&'static str, Vec<&'static str>)> = ROLE_PHRASES
        .iter()
        .map(|phrase| (*phrase, phrase.split(' ').collect()))
        .collect();
    lexicon.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    lexicon
});

/// Minúsculas, separadores viram espaço, pontuação some, espaços colapsados.
pub fn normalize_text(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let spaced = SEPARATORS.replace_all(&lower, " ");
    let stripped = PUNCTUATION.replace_all(&spaced, "");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

/// Tokens (palavras Unicode) de um texto já normalizado.
pub fn words(normalized: &str) -> Vec<String> {
    normalized.unicode_words().map(str::to_string).collect()
}

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

pub fn is_honorific(token: &str) -> bool {
    HONORIFICS.contains(&token)
}

/// Token de uma letra só ("v" em "V. Lago").
pub fn is_initial(token: &str) -> bool {
    let mut chars = token.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
}

/// Forma canônica de um cargo: o primeiro cargo do léxico contido no texto.
///
/// "Vice-Mayor" → `vice mayor`; "Mayor of Coral Gables" → `mayor`.
pub fn canonical_role(raw: &str) -> Option<&'static str> {
    let tokens = words(&normalize_text(raw));
    let refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
    (0..refs.len()).find_map(|i| match_role_at(&refs, i).map(|(phrase, _)| phrase))
}

fn match_role_at(tokens: &[&str], i: usize) -> Option<(&'static str, usize)> {
    ROLE_LEXICON.iter().find_map(|(phrase, parts)| {
        let end = i + parts.len();
        (end <= tokens.len() && tokens[i..end] == parts[..]).then_some((*phrase, parts.len()))
    })
}

/// Códigos identificadores canonizados presentes no nome, na ordem do texto.
///
/// Zeros à esquerda são ignorados, então "2024-01" e "2024-1" coincidem. O
/// primeiro código é o **principal** ("2024-1" em "Ordinance 2024-01 amending
/// Chapter 62").
pub fn legislative_codes(raw: &str) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for caps in LEGISLATIVE_CODE.captures_iter(raw) {
        let numbers: Vec<String> = caps[2]
            .split(|c| c == '-' || c == '.' || c == '/')
            .map(|group| {
                let trimmed = group.trim_start_matches('0');
                if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() }
            })
            .collect();
        let code = match caps.get(1) {
            Some(prefix) => format!("{}-{}", prefix.as_str().to_uppercase(), numbers.join("-")),
            None => numbers.join("-"),
        };
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

/// Remove o prefixo de tipo de uma letra ("R-2024-15" → "2024-15").
fn strip_type_prefix(code: &str) -> &str {
    let mut chars = code.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(letter), Some('-'), Some(digit))
            if letter.is_ascii_alphabetic() && digit.is_ascii_digit() =>
        {
            &code[2..]
        }
        _ => code,
    }
}

/// Como os códigos de duas menções legislativas se relacionam.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeRelation {
    /// Algum dos lados não tem código, ou um cita o principal do outro.
    Unknown,
    /// Mesmo código principal.
    Shared,
    /// Principais diferentes e nenhum deles aparece do outro lado.
    Conflict,
}

/// Compara os códigos de dois nomes. Com `strip_prefix` (portarias e
/// resoluções), "R-2024-15" e "2024-15" são o mesmo código; itens de pauta
/// mantêm o prefixo, que é o que distingue "E-1" de "F-1".
pub fn compare_codes(a: &[String], b: &[String], strip_prefix: bool) -> CodeRelation {
    let canon = |codes: &[String]| -> Vec<String> {
        codes
            .iter()
            .map(|c| if strip_prefix { strip_type_prefix(c) } else { c.as_str() })
            .map(str::to_string)
            .collect()
    };
    let (a, b) = (canon(a), canon(b));
    let (Some(pa), Some(pb)) = (a.first(), b.first()) else {
        return CodeRelation::Unknown;
    };
    if pa == pb {
        CodeRelation::Shared
    } else if b.contains(pa) || a.contains(pb) {
        CodeRelation::Unknown
    } else {
        CodeRelation::Conflict
    }
}

/// Decomposição de um nome de superfície.
#[derive(Debug, Clone, PartialEq)]
pub struct NameParts {
    /// Texto normalizado completo ("v lago").
    pub normalized: String,
    /// Tokens normalizados em ordem alfabética, unidos por espaço.
    pub sorted: String,
    /// Todos os tokens normalizados, na ordem original.
    pub tokens: Vec<String>,
    /// Tokens sem stop words e honoríficos, com "Sobrenome, Nome" reordenado.
    pub content: Vec<String>,
    /// `content` sem os tokens de cargo.
    pub significant: Vec<String>,
    /// Primeiro cargo reconhecido no nome.
    pub role: Option<&'static str>,
    /// Último token significativo que não é uma inicial.
    pub surname: Option<String>,
    /// Quantidade de iniciais entre os tokens significativos.
    pub initials: usize,
    /// Nome cru de uma palavra só, todo em maiúsculas ("CGPD").
    pub acronym: Option<String>,
    /// Iniciais dos tokens de `content` ("cgpd" para "Coral Gables Police Department").
    pub initialism: String,
    /// Códigos legislativos, o principal primeiro.
    pub codes: Vec<String>,
}

impl NameParts {
    pub fn parse(raw: &str) -> Self {
        let normalized = normalize_text(raw);
        let tokens = words(&normalized);

        let mut sorted_tokens = tokens.clone();
        sorted_tokens.sort();
        let sorted = sorted_tokens.join(" ");

        let ordered = reorder_comma_name(raw).unwrap_or_else(|| tokens.clone());
        let refs: Vec<&str> = ordered.iter().map(String::as_str).collect();

        let mut role = None;
        let mut is_role_token = vec![false; refs.len()];
        let mut i = 0;
        while i < refs.len() {
            match match_role_at(&refs, i) {
                Some((phrase, len)) => {
                    role.get_or_insert(phrase);
                    is_role_token[i..i + len].iter_mut().for_each(|flag| *flag = true);
                    i += len;
                }
                None => i += 1,
            }
        }

        let mut content = Vec::new();
        let mut significant = Vec::new();
        for (token, is_role) in ordered.iter().zip(&is_role_token) {
            if is_stop_word(token) || is_honorific(token) {
                continue;
            }
            content.push(token.clone());
            if !is_role {
                significant.push(token.clone());
            }
        }

        let surname = significant.iter().rev().find(|t| !is_initial(t)).cloned();
        let initials = significant.iter().filter(|t| is_initial(t)).count();
        let initialism = content
            .iter()
            .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
            .filter_map(|t| t.chars().next())
            .collect();

        Self {
            normalized,
            sorted,
            tokens,
            content,
            significant,
            role,
            surname,
            initials,
            acronym: detect_acronym(raw),
            initialism,
            codes: legislative_codes(raw),
        }
    }

    /// O nome é só um cargo ("Mayor", "The City Manager").
    pub fn is_role_only(&self) -> bool {
        self.role.is_some() && self.significant.is_empty()
    }

    /// Chave de blocagem: primeiras letras distintas dos tokens significativos.
    pub fn signature(&self) -> BTreeSet<char> {
        let source = if !self.significant.is_empty() {
            &self.significant
        } else if !self.content.is_empty() {
            &self.content
        } else {
            &self.tokens
        };
        source.iter().filter_map(|t| t.chars().next()).collect()
    }

    /// Conjunto de tokens usado pela sobreposição (Jaccard).
    pub fn token_set(&self) -> BTreeSet<&str> {
        self.significant.iter().map(String::as_str).collect()
    }
}

/// "Lago, Vince" → `[vince, lago]`. Só quando há exatamente uma vírgula e o
/// lado esquerdo é curto (um sobrenome, possivelmente composto).
fn reorder_comma_name(raw: &str) -> Option<Vec<String>> {
    let (left, right) = raw.split_once(',')?;
    if right.contains(',') {
        return None;
    }
    let left = words(&normalize_text(left));
    let right = words(&normalize_text(right));
    if left.is_empty() || left.len() > 2 || right.is_empty() {
        return None;
    }
    Some(right.into_iter().chain(left).collect())
}

fn detect_acronym(raw: &str) -> Option<String> {
    let compact: String = raw.trim().chars().filter(|c| *c != '.').collect();
    let len = compact.chars().count();
    ((2..=8).contains(&len) && compact.chars().all(|c| c.is_ascii_uppercase()))
        .then(|| compact.to_lowercase())
}
