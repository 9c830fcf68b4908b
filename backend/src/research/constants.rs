//! Research pipeline constants
//!
//! Centralized constants used throughout the research module.

/// SSE stream termination signal
pub const SSE_DONE_SIGNAL: &str = "[DONE]";

/// SSE error prefix
pub const SSE_ERROR_PREFIX: &str = "[ERROR]";

/// Number of clarifying questions asked before planning
pub const CLARIFYING_QUESTION_COUNT: usize = 3;

/// Default number of web searches the planner is asked for
pub const DEFAULT_SEARCH_COUNT: usize = 5;

/// Default deadline for a single search task (in seconds)
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 120;

/// Default Gemini API base URL
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default SendGrid API base URL
pub const SENDGRID_API_BASE_URL: &str = "https://api.sendgrid.com";
