//! Wikidex LLM - prompt formatting and model dispatch for RAG answers (§4.9).
//!
//! Exposes a single [`LlmAdapter`] trait behind which three prompt families
//! (llama/mistral/qwen, see [`prompt`]) and two transports ([`RemoteLlmAdapter`]
//! over HTTP, [`LocalLlmAdapter`] as an in-process stub) are interchangeable.
//!
//! # Example
//!
//! ```ignore
//! use wikidex_config::LlmConfig;
//! use wikidex_llm::{LlmAdapter, RemoteLlmAdapter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = RemoteLlmAdapter::new(&LlmConfig::default())?;
//!     let answer = adapter.generate("Who is the mayor of Berlin?", Some("Berlin...")).await?;
//!     Ok(())
//! }
//! ```

mod error;
mod local;
mod prompt;
mod remote;
mod traits;

pub use error::{LlmError, Result};
pub use local::LocalLlmAdapter;
pub use remote::RemoteLlmAdapter;
pub use traits::LlmAdapter;

pub use prompt::{render as render_prompt, system_prompt};
