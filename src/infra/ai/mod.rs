pub mod openai_chat_client;
pub mod openai_embedding_client;

pub use openai_chat_client::OpenAiChatClient;
pub use openai_embedding_client::OpenAiEmbeddingClient;
