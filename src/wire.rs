use serde::Deserialize;

/// Error body returned by the API: `{"errors": {"code", "message", "parameter"}}`.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub errors: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub parameter: Option<String>,
}

/// Response headers carrying list pagination state.
pub const PER_PAGE_HEADER: &str = "x-per-page";
pub const AFTER_CURSOR_HEADER: &str = "x-after-cursor";

/// Query parameter that selects the page after a cursor.
pub const AFTER_CURSOR_PARAM: &str = "after_cursor";
