//! Limpieza de texto de documentos y selección de frases con contenido.

use std::sync::OnceLock;

use regex::Regex;

/// Longitud máxima de la frase citada en las consultas de una palabra.
pub const LOOKUP_SENTENCE_CHARS: usize = 200;

const MIN_SENTENCE_CHARS: usize = 30;
const MIN_SENTENCE_WORDS: usize = 5;

struct Patterns {
    header: Regex,
    key_value: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        header: Regex::new(r"(?i)^\s*(PROSJEKT|TEKNISK KUNNSKAP|KOMPETANSE|MARKEDSINNSATS|INNHOLD):\s*")
            .expect("regex de cabecera"),
        key_value: Regex::new(r"(?i)(Kunde|Type|Status|År|Kode|Kategori|Tittel):\s*[^ \n]+")
            .expect("regex clave-valor"),
    })
}

/// Colapsa cualquier secuencia de espacios en uno solo.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parte el texto tras `.`, `!` o `?` seguidos de espacio en blanco.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(next, n)) = chars.peek() {
                if n.is_whitespace() {
                    sentences.push(&text[start..next]);
                    start = next;
                }
            }
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

fn looks_like_metadata(sentence: &str) -> bool {
    let lower = sentence.to_lowercase();
    sentence.chars().count() < MIN_SENTENCE_CHARS
        || sentence.split_whitespace().count() < MIN_SENTENCE_WORDS
        || sentence.starts_with(['{', '[', '"'])
        || lower.contains("json")
        || lower.contains("metadata")
        || sentence.contains("ID:")
        || sentence.matches('"').count() > 2
}

/// Hasta `max` frases con contenido real, en orden de aparición.
///
/// Se eliminan las etiquetas de cabecera (`PROSJEKT:`, `INNHOLD:`...) y los
/// pares `Clave: valor` de metadatos antes de partir en frases. Las frases
/// que conservan una etiqueta `ID:` se descartan enteras.
pub fn extract_meaningful_sentences(text: &str, max: usize) -> Vec<String> {
    if text.trim().is_empty() || max == 0 {
        return Vec::new();
    }
    let p = patterns();
    let cleaned = p.header.replace(text, "");
    let cleaned = p.key_value.replace_all(&cleaned, "");

    let mut good = Vec::new();
    for raw in split_sentences(&cleaned) {
        let sentence = raw.trim();
        if looks_like_metadata(sentence) {
            continue;
        }
        let sentence = collapse_whitespace(sentence);
        if !sentence.is_empty() {
            good.push(sentence);
        }
        if good.len() >= max {
            break;
        }
    }
    good
}

/// Primera frase con contenido que menciona `word` (sin distinguir
/// mayúsculas), recortada a [`LOOKUP_SENTENCE_CHARS`] caracteres.
pub fn sentence_mentioning(text: &str, word: &str) -> Option<String> {
    let needle = word.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    let sentence = extract_meaningful_sentences(text, usize::MAX)
        .into_iter()
        .find(|s| s.to_lowercase().contains(&needle))?;

    if sentence.chars().count() > LOOKUP_SENTENCE_CHARS {
        let cut: String = sentence.chars().take(LOOKUP_SENTENCE_CHARS).collect();
        Some(format!("{}...", cut.trim_end()))
    } else {
        Some(sentence)
    }
}

/// Garantiza que el texto termina en `.`, `!` o `?`.
pub fn ensure_terminal_punctuation(mut text: String) -> String {
    let trimmed = text.trim_end().len();
    text.truncate(trimmed);
    if !text.ends_with(['.', '!', '?']) {
        text.push('.');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_short_json_and_metadata_sentences() {
        let text = "PROSJEKT: Signalanlegg Vestfold. Kunde: BaneNOR. \
            ETCS Level 2 gir kontinuerlig overvåking av togets hastighet og posisjon. \
            Kort setning. {\"id\": 1, \"navn\": \"x\"} er lagret som json her i systemet. \
            Prosjektet ble levert innenfor budsjett og til avtalt tid i 2021 (ID: 3f2a-99).";
        let sentences = extract_meaningful_sentences(text, 5);
        assert_eq!(
            sentences,
            vec!["ETCS Level 2 gir kontinuerlig overvåking av togets hastighet og posisjon."]
        );
    }

    #[test]
    fn sentences_tagged_with_an_id_are_discarded() {
        let tagged = "Prosjektet ble levert innenfor budsjett og til avtalt tid i 2021 (ID: 3f2a-99).";
        assert!(extract_meaningful_sentences(tagged, 3).is_empty());
        assert!(sentence_mentioning(tagged, "budsjett").is_none());
    }

    #[test]
    fn respects_the_sentence_limit() {
        let text = "Første setning har nok ord til å bli tatt med her. \
            Andre setning har også nok ord til å bli tatt med. \
            Tredje setning har også nok ord til å bli tatt med.";
        assert_eq!(extract_meaningful_sentences(text, 2).len(), 2);
    }

    #[test]
    fn mentioning_sentence_is_capped() {
        let long = format!("RAMS {} slutt.", "analyse ".repeat(40));
        let sentence = sentence_mentioning(&long, "rams").unwrap();
        assert!(sentence.ends_with("..."));
        assert!(sentence.chars().count() <= LOOKUP_SENTENCE_CHARS + 3);
        assert!(sentence_mentioning(&long, "etcs").is_none());
    }

    #[test]
    fn terminal_punctuation_is_added_once() {
        assert_eq!(ensure_terminal_punctuation("Hei ".to_string()), "Hei.");
        assert_eq!(ensure_terminal_punctuation("Hei?".to_string()), "Hei?");
    }
}
