// Kernel - infrastructure for the content pipeline
//
// Collaborator clients (LLM, web search) are constructed once at startup and
// injected as Arc<dyn Trait>; business code never reaches for a global.

pub mod ai;
pub mod content;
pub mod stages;
pub mod tavily_client;
pub mod traits;

pub use ai::OpenAIClient;
pub use content::LlmContentService;
pub use stages::{DispatchError, Stage, StageExecutor, StageExecutorConfig, StageReservation};
pub use tavily_client::TavilyClient;
pub use traits::{BaseAI, BaseContentService, BaseSearchService, OriginalityReport, SearchResult};
