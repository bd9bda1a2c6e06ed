//! IntelliDesk retrieval-augmented question answering service.
//!
//! Uploaded documents are parsed, split into overlapping segments, embedded
//! and stored in a vector index; questions are answered by a chat model
//! grounded on the most similar segments.

pub mod core;
pub mod llm;
pub mod rag;
pub mod server;
pub mod state;
