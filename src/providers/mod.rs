pub mod completion;
pub mod llm;
pub mod ollama;

pub use completion::{CompletionProvider, EchoCompletion, MockCompletion, PersonaCompletion};
pub use llm::{ChatMessage, HubProvider, LLMProvider};
pub use ollama::OllamaProvider;
