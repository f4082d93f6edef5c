//! Clasificación de la entrada del usuario en una intención fija.
//!
//! Orden de evaluación (gana la primera coincidencia):
//!   1. Un único token: saludo → palabra clave de una categoría → palabra suelta.
//!   2. Despedida (si está activada), saludo, identidad, ayuda.
//!   3. Pregunta (termina en `?` o empieza por interrogativo).
//!   4. Afirmación.

use std::fmt;

use regex::Regex;

use crate::keywords::category_of_word;

const GREETING_WORDS: &[&str] = &["hei", "hi", "hallo", "hey", "hello"];

const GREETING_PATTERNS: &[&str] = &[
    r"\b(hei|hi|hallo|god\s*morgen|god\s*dag|god\s*kveld)\b",
    r"^(hey|hello|yo|halla)$",
    r"(hva\s*skjer|hvordan\s*har\s*du\s*det|hvordan\s*går\s*det)",
];

const IDENTITY_PATTERNS: &[&str] = &[
    r"\b(hvem\s*er\s*du|who\s*are\s*you|hva\s*er\s*du|what\s*are\s*you)\b",
    r"\b(kan\s*du\s*presentere\s*deg|introduce\s*yourself)\b",
    r"\b(fortell\s*om\s*deg\s*selv|tell\s*me\s*about\s*yourself)\b",
];

const HELP_PATTERNS: &[&str] = &[
    r"\b(hjelp|help|hva\s*kan\s*du|what\s*can\s*you)\b",
    r"\b(kommandoer|commands|funksjonalitet|functionality)\b",
];

const FAREWELL_PATTERNS: &[&str] = &[
    r"\b(hade|ha det|bye|farvel|snakkes|vi ses)\b",
    r"(takk for hjelpen|takk skal du ha)",
];

/// Palabras interrogativas en noruego e inglés.
const INTERROGATIVES: &[&str] = &[
    "hva", "hvem", "hvor", "når", "hvorfor", "hvordan", "kan", "vil", "what", "who", "where",
    "when", "why", "how", "can", "will",
];

/// Intención detectada para un texto.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IntentLabel {
    Greeting,
    Identity,
    Help,
    Farewell,
    SingleWord,
    /// Palabra suelta que pertenece a una categoría de palabras clave.
    SingleKeyword(String),
    Question,
    Statement,
}

impl IntentLabel {
    /// Intenciones que se responden con una plantilla fija, sin recuperación.
    pub fn is_template_only(&self) -> bool {
        matches!(self, Self::Greeting | Self::Identity | Self::Help | Self::Farewell)
    }

    pub fn is_single(&self) -> bool {
        matches!(self, Self::SingleWord | Self::SingleKeyword(_))
    }
}

impl fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Greeting => f.write_str("greeting"),
            Self::Identity => f.write_str("identity"),
            Self::Help => f.write_str("help"),
            Self::Farewell => f.write_str("farewell"),
            Self::SingleWord => f.write_str("single_word"),
            Self::SingleKeyword(category) => write!(f, "single_keyword_{category}"),
            Self::Question => f.write_str("question"),
            Self::Statement => f.write_str("statement"),
        }
    }
}

/// Clasificador por reglas. Las expresiones se compilan una vez.
#[derive(Debug, Clone)]
pub struct InputClassifier {
    greeting: Vec<Regex>,
    identity: Vec<Regex>,
    help: Vec<Regex>,
    farewell: Vec<Regex>,
    farewell_enabled: bool,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    // Los patrones son constantes del módulo; un fallo aquí es un bug.
    patterns
        .iter()
        .map(|p| Regex::new(p).unwrap_or_else(|e| panic!("patrón inválido {p}: {e}")))
        .collect()
}

impl Default for InputClassifier {
    fn default() -> Self {
        Self::new(false)
    }
}

impl InputClassifier {
    pub fn new(farewell_enabled: bool) -> Self {
        Self {
            greeting: compile(GREETING_PATTERNS),
            identity: compile(IDENTITY_PATTERNS),
            help: compile(HELP_PATTERNS),
            farewell: compile(FAREWELL_PATTERNS),
            farewell_enabled,
        }
    }

    pub fn classify(&self, text: &str) -> IntentLabel {
        let lower = text.trim().to_lowercase();
        let tokens: Vec<&str> = lower.split_whitespace().collect();

        if tokens.len() == 1 {
            let word = tokens[0].trim_matches(|c: char| !c.is_alphanumeric());
            if GREETING_WORDS.contains(&word) {
                return IntentLabel::Greeting;
            }
            if let Some(category) = category_of_word(word) {
                return IntentLabel::SingleKeyword(category.to_string());
            }
            return IntentLabel::SingleWord;
        }

        if self.farewell_enabled && any_match(&self.farewell, &lower) {
            return IntentLabel::Farewell;
        }
        if any_match(&self.greeting, &lower) {
            return IntentLabel::Greeting;
        }
        if any_match(&self.identity, &lower) {
            return IntentLabel::Identity;
        }
        if any_match(&self.help, &lower) {
            return IntentLabel::Help;
        }

        let first_word = tokens
            .first()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .unwrap_or_default();
        if lower.ends_with('?') || INTERROGATIVES.contains(&first_word) {
            return IntentLabel::Question;
        }

        IntentLabel::Statement
    }

    /// Despedida en cualquier posición del texto, incluso de una sola palabra.
    pub fn is_farewell(&self, text: &str) -> bool {
        any_match(&self.farewell, &text.trim().to_lowercase())
    }
}

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_greeting_words_are_greetings() {
        let classifier = InputClassifier::default();
        for word in GREETING_WORDS {
            assert_eq!(classifier.classify(word), IntentLabel::Greeting, "{word}");
        }
        assert_eq!(classifier.classify("  HEI! "), IntentLabel::Greeting);
    }

    #[test]
    fn single_keyword_reports_its_category() {
        let classifier = InputClassifier::default();
        assert_eq!(
            classifier.classify("etcs"),
            IntentLabel::SingleKeyword("teknologi".to_string())
        );
        assert_eq!(classifier.classify("etcs").to_string(), "single_keyword_teknologi");
        assert_eq!(classifier.classify("Østfoldbanen"), IntentLabel::SingleWord);
    }

    #[test]
    fn patterns_follow_declared_priority() {
        let classifier = InputClassifier::default();
        assert_eq!(classifier.classify("god morgen, hvem er du?"), IntentLabel::Greeting);
        assert_eq!(classifier.classify("hvem er du egentlig"), IntentLabel::Identity);
        assert_eq!(classifier.classify("hva kan du gjøre"), IntentLabel::Help);
        assert_eq!(classifier.classify("tell me about yourself"), IntentLabel::Identity);
    }

    #[test]
    fn questions_and_statements() {
        let classifier = InputClassifier::default();
        assert_eq!(classifier.classify("Hva er ETCS Level 2?"), IntentLabel::Question);
        assert_eq!(classifier.classify("Hvordan fungerer RAMS"), IntentLabel::Question);
        assert_eq!(classifier.classify("how does TSI work"), IntentLabel::Question);
        assert_eq!(classifier.classify("Prosjektet startet i 2019"), IntentLabel::Statement);
    }

    #[test]
    fn farewell_only_when_enabled() {
        let plain = InputClassifier::new(false);
        let with_farewell = InputClassifier::new(true);
        assert_eq!(with_farewell.classify("takk for hjelpen"), IntentLabel::Farewell);
        assert_eq!(plain.classify("takk for hjelpen"), IntentLabel::Statement);
        assert!(plain.is_farewell("Hade"));
        assert!(!plain.is_farewell("hadeland"));
    }

    #[test]
    fn empty_text_is_a_statement() {
        assert_eq!(InputClassifier::default().classify("   "), IntentLabel::Statement);
    }
}
