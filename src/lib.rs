pub mod cost;
pub mod enrich;
pub mod io;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod retry;
pub mod search;
pub mod stages;
pub mod store;

pub use cost::{UsageSnapshot, UsageTracker};
pub use enrich::{enrich_summaries, EnrichReport};
pub use io::{load_transcript_file, parse_source_document, SourceDocument};
pub use llm::{GeminiClient, GeminiConfig, MappingValidationConfig};
pub use models::{
    AgendaMapping, AgendaRecord, AgendaType, MappingResponse, MeetingInfo, UtteranceChunk,
    VectorRecord,
};
pub use pipeline::{BatchReport, MeetingReport, Pipeline, PipelineConfig};
pub use search::{SearchRequest, SearchResult, SearchService, EXCLUDED_AGENDA_TYPES};
pub use stages::{
    execute_stage1, execute_stage2, execute_stage3, MapAgendas, MappingOutcome, SegmenterConfig,
    Stage1Config,
};
pub use store::{
    AgendaStore, ChromaClient, EmbedText, EmbedderConfig, MetadataFilter, OpenAiEmbedder,
    VectorHit, VectorStore,
};
