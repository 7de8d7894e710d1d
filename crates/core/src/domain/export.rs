use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::FaqEntry;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Markdown,
    Html,
    Wordpress,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Wordpress => "wordpress",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ExportRequest {
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub include_metadata: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ExportMetadata {
    pub seo_title: Option<String>,
    pub meta_description: Option<String>,
    pub faq_schema: Option<Vec<FaqEntry>>,
    pub word_count: u32,
    pub version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ExportResponse {
    pub format: ExportFormat,
    pub content: String,
    pub metadata: Option<ExportMetadata>,
}
