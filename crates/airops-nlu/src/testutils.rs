//! Test support: a scripted language model and a canned reference
//! fixture. Compiled into the crate so integration tests can use it too.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use airops_reference::{
    Aircraft, Airline, Airport, InMemoryReference, SizeCategory, Stand, Terminal,
};

use crate::llm::{ChatRequest, LanguageModel};

enum Script {
    /// Same response for every call.
    Always(String),
    /// First entry whose needle appears anywhere in the request wins.
    Matched(Vec<(String, String)>),
    /// Every call errors.
    Erroring,
    /// Being called at all is a test failure.
    Failing,
}

/// Deterministic stand-in for a chat-completion endpoint.
pub struct ScriptedLlm {
    script: Script,
    available: bool,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn always(response: &str) -> Self {
        Self {
            script: Script::Always(response.to_string()),
            available: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Script keyed by substring of the concatenated message contents.
    /// Unmatched requests error.
    pub fn matching(pairs: &[(&str, &str)]) -> Self {
        Self {
            script: Script::Matched(
                pairs
                    .iter()
                    .map(|(needle, response)| (needle.to_string(), response.to_string()))
                    .collect(),
            ),
            available: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn erroring() -> Self {
        Self {
            script: Script::Erroring,
            available: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Panics when called; proves a code path never reached the model.
    pub fn failing() -> Self {
        Self {
            script: Script::Failing,
            available: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            script: Script::Erroring,
            available: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn chat_completion(&self, request: ChatRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match &self.script {
            Script::Always(response) => Ok(response.clone()),
            Script::Matched(pairs) => {
                let haystack = request
                    .messages
                    .iter()
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                pairs
                    .iter()
                    .find(|(needle, _)| haystack.contains(needle.as_str()))
                    .map(|(_, response)| response.clone())
                    .ok_or_else(|| anyhow!("no scripted response matches the request"))
            }
            Script::Erroring => Err(anyhow!("scripted model failure")),
            Script::Failing => panic!("language model was called but should not be"),
        }
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Heathrow-flavoured reference fixture shared across tests.
pub fn heathrow_fixture() -> InMemoryReference {
    InMemoryReference::new()
        .with_airport(Airport {
            iata: "LHR".into(),
            name: "Heathrow".into(),
            city: Some("London".into()),
            country: Some("GB".into()),
        })
        .with_airline(Airline {
            iata: "BA".into(),
            name: "British Airways".into(),
        })
        .with_aircraft(Aircraft {
            iata: "777".into(),
            name: "Boeing 777".into(),
            size: SizeCategory::E,
        })
        .with_terminal(Terminal {
            id: "T1".into(),
            name: Some("Terminal 1".into()),
        })
        .with_terminal(Terminal {
            id: "T2".into(),
            name: Some("Terminal 2".into()),
        })
        .with_stand(Stand {
            name: "A1".into(),
            terminal: Some("T1".into()),
            pier: Some("A".into()),
            max_size: Some(SizeCategory::E),
        })
        .with_stand(Stand {
            name: "B2".into(),
            terminal: Some("T1".into()),
            pier: Some("B".into()),
            max_size: Some(SizeCategory::C),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;

    #[tokio::test]
    async fn matching_script_selects_by_substring() {
        let llm = ScriptedLlm::matching(&[
            ("classify", r#"{"intent": "stand.details", "confidence": 0.9}"#),
            ("Extract entities", r#"{"stand": "A1"}"#),
        ]);
        let request = ChatRequest {
            messages: vec![ChatMessage::system("Extract entities from ...")],
            temperature: 0.2,
            max_tokens: 50,
        };
        let response = llm.chat_completion(request).await.unwrap();
        assert!(response.contains("A1"));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn erroring_script_always_fails() {
        let llm = ScriptedLlm::erroring();
        let request = ChatRequest {
            messages: vec![ChatMessage::user("anything")],
            temperature: 0.0,
            max_tokens: 1,
        };
        assert!(llm.chat_completion(request).await.is_err());
    }
}
