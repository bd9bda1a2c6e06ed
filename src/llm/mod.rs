pub mod openai;
pub mod provider;
pub mod types;


pub use openai::OpenAiCompatibleClient;
pub use provider::{bounded, ChatModel, Embedder};
