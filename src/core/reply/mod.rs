//! Reply (language-model) collaborator interface and providers.

pub mod base;
pub mod openai;

pub use base::{BaseReplyProvider, ReplyError};
pub use openai::{OpenAiReplyProvider, ReplyConfig};
