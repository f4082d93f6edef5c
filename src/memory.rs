//! Memoria conversacional persistida en disco.
//!
//! [`ConversationalAssistant`] envuelve a cualquier [`Assistant`]: contesta las
//! despedidas por su cuenta, delega el resto y guarda cada intercambio.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::classifier::InputClassifier;
use crate::models::{Confidence, ConversationTurn, QueryResult};
use crate::pipeline::Assistant;
use crate::response::FAREWELL;

/// Turnos que se conservan; los más antiguos se descartan primero.
pub const MEMORY_CAPACITY: usize = 20;

#[derive(Debug)]
pub struct ConversationMemory {
    path: PathBuf,
    turns: Vec<ConversationTurn>,
}

impl ConversationMemory {
    /// Carga el historial. Un fichero ausente o corrupto equivale a un
    /// historial vacío.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let turns = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<ConversationTurn>>(&raw) {
                Ok(turns) => turns,
                Err(e) => {
                    warn!("⚠️ Historial de conversación ilegible en {}: {e}", path.display());
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("⚠️ No se pudo leer el historial {}: {e}", path.display());
                Vec::new()
            }
        };
        let mut memory = Self { path, turns };
        memory.truncate();
        memory
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    fn truncate(&mut self) {
        if self.turns.len() > MEMORY_CAPACITY {
            let excess = self.turns.len() - MEMORY_CAPACITY;
            self.turns.drain(..excess);
        }
    }

    /// Añade un turno y reescribe el fichero completo antes de volver.
    pub async fn record(&mut self, user: &str, ai: &str) {
        self.turns.push(ConversationTurn {
            user: user.to_string(),
            ai: ai.to_string(),
        });
        self.truncate();
        if let Err(e) = self.save().await {
            warn!("⚠️ No se pudo guardar el historial en {}: {e}", self.path.display());
        }
    }

    async fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.turns)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await?;
        debug!("💾 Historial guardado ({} turnos)", self.turns.len());
        Ok(())
    }
}

/// Decorador que añade despedidas y memoria a un asistente.
pub struct ConversationalAssistant<A: Assistant> {
    inner: A,
    classifier: InputClassifier,
    memory: Mutex<ConversationMemory>,
}

impl<A: Assistant> ConversationalAssistant<A> {
    pub fn new(inner: A, memory: ConversationMemory) -> Self {
        Self {
            inner,
            classifier: InputClassifier::new(true),
            memory: Mutex::new(memory),
        }
    }

    pub async fn history(&self) -> Vec<ConversationTurn> {
        self.memory.lock().await.turns().to_vec()
    }
}

#[async_trait]
impl<A: Assistant> Assistant for ConversationalAssistant<A> {
    async fn ask(&self, question: &str) -> QueryResult {
        let result = if self.classifier.is_farewell(question) {
            QueryResult::bare(
                FAREWELL.to_string(),
                Confidence::Farewell,
                "farewell",
                vec!["farewell".to_string()],
            )
        } else {
            self.inner.ask(question).await
        };

        self.memory.lock().await.record(question, &result.answer).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Assistant for Echo {
        async fn ask(&self, question: &str) -> QueryResult {
            QueryResult::bare(format!("svar på {question}."), Confidence::Low, "statement", Vec::new())
        }
    }

    #[tokio::test]
    async fn keeps_the_latest_twenty_turns_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversation_memory.json");
        let assistant = ConversationalAssistant::new(Echo, ConversationMemory::load(&path));

        for i in 0..25 {
            assistant.ask(&format!("spørsmål {i}")).await;
        }

        let raw = std::fs::read_to_string(&path).unwrap();
        let saved: Vec<ConversationTurn> = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved.len(), MEMORY_CAPACITY);
        assert_eq!(saved[0].user, "spørsmål 5");
        assert_eq!(saved[19].user, "spørsmål 24");
        assert_eq!(saved[19].ai, "svar på spørsmål 24.");

        let reloaded = ConversationMemory::load(&path);
        assert_eq!(reloaded.turns(), saved.as_slice());
    }

    #[tokio::test]
    async fn farewell_is_answered_without_delegating() {
        let dir = tempfile::tempdir().unwrap();
        let assistant = ConversationalAssistant::new(
            Echo,
            ConversationMemory::load(dir.path().join("memory.json")),
        );
        let result = assistant.ask("hade").await;
        assert_eq!(result.confidence, Confidence::Farewell);
        assert_eq!(result.answer, FAREWELL);
        assert_eq!(assistant.history().await.len(), 1);
    }

    #[test]
    fn corrupt_log_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(&path, "{ikke json").unwrap();
        assert!(ConversationMemory::load(&path).turns().is_empty());
    }
}
