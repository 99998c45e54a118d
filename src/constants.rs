pub const RETRYABLE_STATUS_CODES: &[u16] = &[429, 500, 502, 503, 504, 520];

/// Default OpenAI-compatible endpoint and model.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Name of the structured-recommendation tool advertised to the model.
pub const BETTING_ANALYSIS_TOOL: &str = "betting_analysis";

/// Replacement assistant reply when a turn cannot be completed.
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// Decimal-odds-equivalent used when a recommendation states no payout.
pub const ESTIMATED_PAYOUT_MULTIPLIER: f64 = 1.9;

/// Upper bound on SSE lines and line length accepted from one response.
pub const MAX_STREAM_LINES: usize = 100_000;
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Hosted web search context size, mirroring a low-cost search.
pub const WEB_SEARCH_CONTEXT_SIZE: &str = "low";
