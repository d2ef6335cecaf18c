pub mod db;
pub mod gemini_llm;

pub use db::DbAdapter;
pub use gemini_llm::GeminiTextAdapter;
