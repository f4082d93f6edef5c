//! Extracción de categorías temáticas, entidades y términos específicos.

use std::collections::BTreeSet;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;

use crate::models::EntryMetadata;

/// Categoría → lista de palabras, en orden de declaración.
pub const KEYWORD_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "kostnad",
        &["kostnad", "pris", "budget", "økonomi", "millioner", "nok", "kroner", "estimat", "verdi", "investering"],
    ),
    (
        "tid",
        &["tid", "varighet", "år", "måneder", "tidsplan", "ferdig", "implementering", "deadline", "fremdrift"],
    ),
    (
        "personer",
        &["lars", "mortvedt", "konsulent", "ansvarlig", "prosjektleder", "team", "ansatte", "kompetanse"],
    ),
    (
        "teknologi",
        &["etcs", "rams", "tsi", "signal", "sikkerhet", "infrastruktur", "level", "system", "teknisk", "ertms"],
    ),
    (
        "prosjekt",
        &["prosjekt", "oppdrag", "kunde", "kontrakt", "flytoget", "fornebubanen", "bybanen", "jernbane"],
    ),
    (
        "bedrift",
        &["railadvice", "selskap", "firma", "ansatte", "tjenester", "kompetanse", "konsulent"],
    ),
    (
        "erfaring",
        &["erfaring", "kompetanse", "ekspertise", "kunnskap", "sertifisering", "utdanning"],
    ),
];

/// Primera categoría cuya lista contiene exactamente `word`.
pub fn category_of_word(word: &str) -> Option<&'static str> {
    KEYWORD_CATEGORIES
        .iter()
        .find(|(_, words)| words.contains(&word))
        .map(|(category, _)| *category)
}

/// Entidad nombrada: (texto, etiqueta).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub text: String,
    pub label: String,
}

/// Reconocedor de entidades opcional.
pub trait EntityRecognizer: Send + Sync {
    fn recognize(&self, text: &str) -> Vec<Entity>;
}

/// Reconocedor por reglas: siglas técnicas (`ETCS`, `EN 50126`) y nombres
/// propios de varias palabras capitalizadas (`Lars Mortvedt`).
pub struct RuleBasedRecognizer {
    acronym: Regex,
    standard: Regex,
    proper_name: Regex,
}

impl Default for RuleBasedRecognizer {
    fn default() -> Self {
        Self {
            acronym: Regex::new(r"\b[A-ZÆØÅ]{2,6}\b").expect("regex de siglas"),
            standard: Regex::new(r"\b(EN|ISO|IEC)\s?\d{3,5}\b").expect("regex de normas"),
            proper_name: Regex::new(r"\b[A-ZÆØÅ][a-zæøå]+(?:\s+[A-ZÆØÅ][a-zæøå]+)+\b")
                .expect("regex de nombres propios"),
        }
    }
}

impl EntityRecognizer for RuleBasedRecognizer {
    fn recognize(&self, text: &str) -> Vec<Entity> {
        let mut entities = Vec::new();
        let mut seen = BTreeSet::new();

        let mut push = |text: &str, label: &str| {
            if seen.insert(text.to_string()) {
                entities.push(Entity {
                    text: text.to_string(),
                    label: label.to_string(),
                });
            }
        };

        for m in self.standard.find_iter(text) {
            push(m.as_str(), "STANDARD");
        }
        for m in self.acronym.find_iter(text) {
            if m.as_str() != "EN" && m.as_str() != "ISO" && m.as_str() != "IEC" {
                push(m.as_str(), "TECH");
            }
        }
        for m in self.proper_name.find_iter(text) {
            push(m.as_str(), "NAME");
        }
        entities
    }
}

/// Resultado de la extracción sobre un texto.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
    pub categories: Vec<String>,
    pub entities: Vec<Entity>,
    pub specific_terms: Vec<String>,
}

/// Extractor de palabras clave. Función pura sobre el texto y la instantánea
/// de metadatos indexados.
#[derive(Clone, Default)]
pub struct KeywordExtractor {
    recognizer: Option<Arc<dyn EntityRecognizer>>,
}

impl KeywordExtractor {
    pub fn new(recognizer: Option<Arc<dyn EntityRecognizer>>) -> Self {
        Self { recognizer }
    }

    pub fn with_rule_based_recognizer() -> Self {
        Self::new(Some(Arc::new(RuleBasedRecognizer::default())))
    }

    pub fn extract(&self, text: &str, indexed: &[EntryMetadata]) -> Extraction {
        let lower = text.to_lowercase();

        let categories = KEYWORD_CATEGORIES
            .iter()
            .filter(|(_, words)| words.iter().any(|w| lower.contains(w)))
            .map(|(category, _)| category.to_string())
            .collect();

        let entities = self
            .recognizer
            .as_ref()
            .map(|r| r.recognize(text))
            .unwrap_or_default();

        let mut terms = BTreeSet::new();
        for meta in indexed {
            for word in meta.title.to_lowercase().split_whitespace() {
                if word.chars().count() > 3 && lower.contains(word) {
                    terms.insert(word.to_string());
                }
            }
            for tag in &meta.tags {
                let tag = tag.to_lowercase();
                if !tag.is_empty() && lower.contains(&tag) {
                    terms.insert(tag);
                }
            }
        }

        Extraction {
            categories,
            entities,
            specific_terms: terms.into_iter().collect(),
        }
    }
}
