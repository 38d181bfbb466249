//! Result types: what an extraction request produces.
//!
//! [`ExtractionResult`] is the shape the model is asked to emit and the only
//! shape [`crate::pipeline::validate`] accepts. Its serialised field names
//! are camelCase because they are also the field names in the prompt.

use crate::pipeline::recover::ParseStrategy;
use crate::provider::Provider;
use serde::{Deserialize, Serialize};

/// Sentinel for a field the model could not find in the document.
pub const NOT_FOUND: &str = "N/A";

/// One construction item (equipment, fixture, material) found in the text.
///
/// Every field is required; [`NOT_FOUND`] stands for "not in the document".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedItem {
    pub item_type: String,
    pub quantity: String,
    pub model_number: String,
    pub spec_reference: String,
    pub page_reference: String,
    pub dimensions: String,
    pub mounting_type: String,
    pub additional_notes: String,
}

impl ExtractedItem {
    /// Column headers, in field order.
    pub const COLUMNS: [&'static str; 8] = [
        "Item Type",
        "Quantity",
        "Model Number",
        "Spec Reference",
        "Page Reference",
        "Dimensions",
        "Mounting Type",
        "Additional Notes",
    ];

    /// Field values, in [`Self::COLUMNS`] order.
    pub fn fields(&self) -> [&str; 8] {
        [
            self.item_type.as_str(),
            self.quantity.as_str(),
            self.model_number.as_str(),
            self.spec_reference.as_str(),
            self.page_reference.as_str(),
            self.dimensions.as_str(),
            self.mounting_type.as_str(),
            self.additional_notes.as_str(),
        ]
    }
}

/// Structured description of a construction document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub summary: String,
    /// Always equals `extracted_items.len()` once validated.
    pub total_items_found: u64,
    pub document_type: String,
    /// Document encounter order; identical items are kept, not merged.
    pub extracted_items: Vec<ExtractedItem>,
    pub recommendations: Vec<String>,
}

impl ExtractionResult {
    /// `true` for the placeholder produced when no parse strategy worked.
    pub fn is_parse_failure(&self) -> bool {
        self.total_items_found == 0
            && self.extracted_items.is_empty()
            && self.document_type == "Unknown"
            && self.summary.starts_with("Failed to parse")
    }

    /// Render as Markdown: summary, item table, recommendations.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str("# Construction Data\n\n");
        md.push_str(&format!("**Document type:** {}\n\n", self.document_type));
        md.push_str(&format!("**Items found:** {}\n\n", self.total_items_found));
        md.push_str(&format!("{}\n\n", self.summary));

        md.push_str("## Extracted Items\n\n");
        if self.extracted_items.is_empty() {
            md.push_str("_No items extracted._\n\n");
        } else {
            md.push_str("| # | ");
            md.push_str(&ExtractedItem::COLUMNS.join(" | "));
            md.push_str(" |\n|");
            for _ in 0..=ExtractedItem::COLUMNS.len() {
                md.push_str(" --- |");
            }
            md.push('\n');
            for (i, item) in self.extracted_items.iter().enumerate() {
                md.push_str(&format!("| {} |", i + 1));
                for value in item.fields() {
                    md.push_str(&format!(" {} |", table_cell(value)));
                }
                md.push('\n');
            }
            md.push('\n');
        }

        md.push_str("## Recommendations\n\n");
        if self.recommendations.is_empty() {
            md.push_str("_None._\n");
        } else {
            for r in &self.recommendations {
                md.push_str(&format!("- {}\n", r.trim()));
            }
        }
        md
    }
}

/// Escape a value for a GFM pipe-table cell.
fn table_cell(value: &str) -> String {
    let v = value.trim();
    if v.is_empty() {
        return NOT_FOUND.to_string();
    }
    v.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// Raw text pulled out of a PDF, plus what the store needs to label it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentText {
    pub text: String,
    /// Display name (file name or last URL segment).
    pub file_name: String,
    /// Size of the PDF in bytes.
    pub file_size: u64,
    pub page_count: usize,
}

/// PDF document metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Counters describing one extraction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Characters of document text before normalisation.
    pub source_chars: usize,
    /// Characters of document text embedded in the prompt.
    pub submitted_chars: usize,
    /// Whether the text hit `max_input_chars`.
    pub truncated: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Characters in the model's raw answer.
    pub response_chars: usize,
    /// Which recovery strategy produced the JSON object.
    pub strategy: ParseStrategy,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Complete output of a successful extraction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub result: ExtractionResult,
    pub provider: Provider,
    pub model: String,
    pub stats: ExtractionStats,
}
