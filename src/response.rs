//! Generación de respuestas en noruego a partir de plantillas.
//!
//! Nunca devuelve una respuesta vacía y siempre termina en `.`, `!` o `?`.

use rand::seq::SliceRandom;

use crate::classifier::IntentLabel;
use crate::models::Confidence;
use crate::retrieval::{RankedMatch, WordLookup};
use crate::sentences::{collapse_whitespace, ensure_terminal_punctuation, extract_meaningful_sentences};

const SENTENCES_PER_DOCUMENT: usize = 2;

pub const INTRO_PHRASES: &[&str] = &[
    "Basert på min kunnskapsbase",
    "Dokumentasjon viser at",
    "Angående ditt spørsmål",
    "Jeg fant følgende informasjon",
];

pub const FAREWELL: &str =
    "Takk for praten! 🚆 Ta kontakt igjen når du trenger hjelp med jernbaneprosjekter.";

pub const NO_DOCUMENTS: &str = "Jeg har ingen dokumenter å svare basert på. \
    Legg til dokumenter via dokument-API-et, så kan jeg hjelpe deg!";

pub const LOADING: &str =
    "Kunnskapsbasen lastes fortsatt inn. Prøv igjen om et øyeblikk.";

pub const PROCESSING_ERROR: &str = "Beklager, det oppstod en feil under behandling av \
    spørsmålet ditt. Prøv igjen med et annet spørsmål.";

const HELP: &str = "Her er hva jeg kan hjelpe deg med:

**Spørsmålstyper jeg forstår:**
• Tekniske spørsmål: \"Hva er ETCS?\" \"Fortell om RAMS\"
• Kostnadsspørsmål: \"Hva koster prosjektet?\"
• Tidsspørsmål: \"Hvor lang tid tar implementering?\"
• Kompetanse: \"Hvem er ekspert på signalsystemer?\"
• Prosjektinfo: \"Fortell om Flytoget-oppdraget\"

**Tips for bedre svar:**
• Vær spesifikk i spørsmålene dine
• Bruk fagtermer jeg kjenner til
• Spør oppfølgingsspørsmål for mer detaljer

Prøv å spørre om noe - jeg lærer fra dokumentene dine!";

/// Nombre legible de cada categoría de palabras clave.
fn category_name(category: &str) -> &str {
    match category {
        "teknologi" => "tekniske løsninger",
        "kostnad" => "kostnader og økonomi",
        "tid" => "tidsplaner og fremdrift",
        "personer" => "personer og kompetanse",
        "prosjekt" => "prosjekter og oppdrag",
        "bedrift" => "RailAdvice og våre tjenester",
        "erfaring" => "erfaring og ekspertise",
        other => other,
    }
}

/// Todo lo que el generador necesita para redactar una respuesta.
#[derive(Debug, Clone, Copy)]
pub struct ResponseContext<'a> {
    pub question: &'a str,
    pub intent: &'a IntentLabel,
    pub confidence: Confidence,
    pub documents: &'a [RankedMatch],
    /// Documentos en el almacén (no sólo los indexados).
    pub document_count: usize,
    pub lookup: Option<&'a WordLookup>,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseGenerator;

impl ResponseGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, ctx: &ResponseContext<'_>) -> String {
        let answer = match ctx.intent {
            IntentLabel::Greeting => self.greeting(ctx.document_count),
            IntentLabel::Identity => self.identity(ctx.document_count),
            IntentLabel::Help => HELP.to_string(),
            IntentLabel::Farewell => FAREWELL.to_string(),
            IntentLabel::SingleWord | IntentLabel::SingleKeyword(_) => {
                self.single_word(ctx.question, ctx.intent, ctx.lookup)
            }
            IntentLabel::Question | IntentLabel::Statement => match ctx.confidence {
                Confidence::Loading => LOADING.to_string(),
                Confidence::Error => PROCESSING_ERROR.to_string(),
                _ if ctx.documents.is_empty() => self.fallback(ctx.question, ctx.document_count),
                confidence => self.from_documents(ctx.documents, confidence),
            },
        };
        ensure_terminal_punctuation(answer)
    }

    pub fn greeting(&self, document_count: usize) -> String {
        if document_count == 0 {
            "Hei! Jeg er RailAdvice AI. Jeg har ingen dokumenter å jobbe med ennå - \
             legg til dokumenter så kan jeg hjelpe deg!"
                .to_string()
        } else {
            format!(
                "Hei! Jeg er RailAdvice AI med {document_count} dokumenter tilgjengelig. \
                 Hva kan jeg hjelpe deg med?"
            )
        }
    }

    pub fn identity(&self, document_count: usize) -> String {
        if document_count == 0 {
            return "Jeg er RailAdvice AI, din jernbanetekniske assistent.\n\n\
                Jeg er utviklet for å hjelpe med jernbanerelaterte spørsmål, men har ingen \
                dokumenter å jobbe med ennå. Legg til dokumenter, så kan jeg gi deg svar \
                basert på din kunnskap!"
                .to_string();
        }
        format!(
            "Jeg er RailAdvice AI, din intelligente assistent for jernbanetekniske spørsmål.\n\n\
             Jeg har tilgang til {document_count} dokumenter og kan hjelpe deg med:\n\
             • Tekniske spørsmål om jernbane (ETCS, RAMS, TSI)\n\
             • Prosjektinformasjon og kostnadsestimat\n\
             • Kompetanse og erfaring\n\
             • Generelle jernbanerelaterte emner\n\n\
             Still meg gjerne spørsmål - jeg svarer basert på dokumentasjonen din!"
        )
    }

    fn single_word(&self, question: &str, intent: &IntentLabel, lookup: Option<&WordLookup>) -> String {
        let word = question.trim();
        if let Some(hit) = lookup {
            let sentence = hit.sentence.trim_end_matches(['.', '!', '?']);
            return format!("Angående '{word}': {sentence}. Ønsker du mer informasjon?");
        }
        match intent {
            IntentLabel::SingleKeyword(category) => format!(
                "Du spør om {}. Hva spesifikt vil du vite? For eksempel: kostnader, \
                 implementering, eller tekniske detaljer?",
                category_name(category)
            ),
            _ => format!(
                "Du skrev '{word}'. Kan du utdype hva du vil vite om dette, eller still et \
                 mer spesifikt spørsmål?"
            ),
        }
    }

    /// Respuesta cuando la búsqueda no devolvió documentos.
    pub fn fallback(&self, question: &str, document_count: usize) -> String {
        if document_count == 0 {
            return NO_DOCUMENTS.to_string();
        }
        let lower = question.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if mentions(&["etcs", "ertms"]) {
            format!(
                "Jeg ser du spør om ETCS/ERTMS, men fant ikke spesifikk informasjon i de \
                 {document_count} dokumentene. Legg gjerne til mer teknisk dokumentasjon om \
                 signalsystemer."
            )
        } else if mentions(&["kostnad", "pris", "kost"]) {
            "Du spør om kostnader, men jeg fant ikke prisopplysninger i dokumentene. Har du \
             budsjett- eller kostnadsdokumenter du kan legge til?"
                .to_string()
        } else if mentions(&["rams", "sikkerhet"]) {
            format!(
                "RAMS og sikkerhet er viktige tema. Jeg har {document_count} dokumenter, men \
                 fant ikke svar på ditt spesifikke spørsmål. Prøv å være mer spesifikk eller \
                 legg til flere tekniske dokumenter."
            )
        } else {
            format!(
                "Jeg forstår spørsmålet ditt, men fant ikke svar i de {document_count} \
                 dokumentene. Prøv å omformulere spørsmålet eller legg til mer relevant \
                 dokumentasjon."
            )
        }
    }

    fn from_documents(&self, documents: &[RankedMatch], confidence: Confidence) -> String {
        let parts: Vec<String> = documents
            .iter()
            .flat_map(|doc| extract_meaningful_sentences(&doc.text, SENTENCES_PER_DOCUMENT))
            .collect();

        if parts.is_empty() {
            return "Jeg fant relevante dokumenter, men ikke klart innhold som svarer på \
                    spørsmålet ditt. Kan du være mer spesifikk?"
                .to_string();
        }

        let intro = INTRO_PHRASES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(INTRO_PHRASES[0]);

        let response = match confidence {
            Confidence::High => {
                let mut response = format!("{intro}: {}", parts.join(" "));
                if parts.len() > 1 {
                    response.push_str(" Ønsker du mer detaljert informasjon?");
                }
                response
            }
            Confidence::Medium => format!(
                "{intro}: {} Trenger du mer spesifikk informasjon?",
                parts.join(" ")
            ),
            _ => format!(
                "Jeg fant noe relevant informasjon: {} Kan du omformulere spørsmålet?",
                parts[0]
            ),
        };
        collapse_whitespace(&response)
    }
}
