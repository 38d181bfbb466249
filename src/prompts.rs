//! Prompt templates for construction-data extraction.
//!
//! Both templates ask for the same JSON shape; they differ only in wording
//! and emphasis. Claude follows XML-tagged sections well, Gemini responds
//! better to a blunt numbered list of JSON formatting rules.
//!
//! Callers can override the template via
//! [`crate::config::ExtractionConfig::prompt_template`]; the constants here
//! are used only when no override is provided.

use crate::config::DOCUMENT_TEXT_PLACEHOLDER;
use crate::provider::Provider;

/// Upper bound on items the model is asked to return, so the answer fits
/// in the output token budget.
pub const MAX_ITEMS_HINT: usize = 75;

/// Template for Claude. `{document_text}` is replaced by the document text.
pub const CLAUDE_TEMPLATE: &str = r#"You are a construction data extraction specialist. I need you to analyze PDF text content and extract structured construction data.

<document_text>
{document_text}
</document_text>

<task>
Extract ALL construction items, fixtures, and equipment from the document above. This may include:
- Mechanical equipment (HVAC, pumps, boilers, etc.)
- Electrical components (conduit, fixtures, panels, etc.)
- Plumbing fixtures and piping
- Fire protection systems
- Building materials and components
- Any item with specifications, quantities, or model numbers
</task>

<output_format>
You must return ONLY a valid JSON object with no additional text, explanations, or markdown formatting. Use this exact structure:

{
  "summary": "Brief description of document type and key findings (max 200 chars)",
  "totalItemsFound": 0,
  "documentType": "Type of document (e.g. Equipment Schedule, Mechanical Plans, etc.)",
  "extractedItems": [
    {
      "itemType": "Category (e.g. HVAC Equipment, Electrical Conduit, Plumbing Fixtures)",
      "quantity": "Amount with units (e.g. 2 EA, 100 LF) or N/A",
      "modelNumber": "Model/part number or N/A",
      "specReference": "Specification section/reference or N/A",
      "pageReference": "Page/drawing reference or N/A",
      "dimensions": "Size/capacity with units or N/A",
      "mountingType": "Installation method or N/A",
      "additionalNotes": "Material, finish, special requirements or N/A"
    }
  ],
  "recommendations": [
    "Actionable recommendation for construction team",
    "Procurement or scheduling suggestion",
    "Quality control or coordination note"
  ]
}
</output_format>

<extraction_rules>
1. Use "N/A" for any missing information - never use null, empty strings, or undefined
2. Keep all text values simple and avoid special characters that could break JSON
3. Extract up to 75 most important items to prevent response truncation
4. Ensure totalItemsFound matches the length of extractedItems array
5. Look for items in tables, schedules, specifications, and annotations
6. Preserve original units for quantities (EA, LF, SF, GPM, CFM, etc.)
7. Include voltage, pressure, temperature ratings in dimensions field
8. Focus on actionable recommendations for construction professionals
9. Don't group any extracted items, provide a complete list even if they are the same model
</extraction_rules>

Return only the JSON object with no other text."#;

/// Template for Gemini. `{document_text}` is replaced by the document text.
pub const GEMINI_TEMPLATE: &str = r#"You are a construction data extraction specialist. Analyze the following PDF drawing set content which may contain technical drawings, schedules, cut sheets, specifications, or construction documents.

Extract ALL relevant construction items/fixtures/equipment mentioned in the document.

Text content:
{document_text}

CRITICAL JSON FORMATTING RULES:
1. Return ONLY valid JSON - no markdown, no extra text, no explanations
2. Use double quotes for all strings
3. Escape any quotes inside strings with \"
4. Keep all text values clean and simple
5. If you encounter special characters, replace them with simple alternatives
6. Ensure all JSON brackets and braces are properly closed
7. Do not include line breaks within string values
8. Maximum 75 items to prevent response truncation

Return the results in this EXACT JSON format:

{
  "summary": "Brief description of document type and findings (keep under 200 characters)",
  "totalItemsFound": 0,
  "documentType": "Document type (e.g. Mechanical Schedule, Electrical Plan, etc.)",
  "extractedItems": [
    {
      "itemType": "Category (e.g. Pipe & Fittings, Ductwork, Electrical Conduit, etc.)",
      "quantity": "Number with units (e.g. 12 EA, 50 LF) or N/A",
      "modelNumber": "Model/part number or N/A",
      "specReference": "Specification reference or N/A",
      "pageReference": "Page/sheet or DRAWING NUMBER reference or N/A",
      "dimensions": "Physical dimensions with units or N/A",
      "mountingType": "Installation method or N/A",
      "additionalNotes": "Other relevant details or N/A"
    }
  ],
  "recommendations": [
    "Actionable recommendation 1",
    "Actionable recommendation 2",
    "Actionable recommendation 3"
  ]
}

EXTRACTION GUIDELINES:
- Don't group any extracted items, provide a complete list of items even if they are the same model or part
- Extract EVERY identifiable construction item, fixture, or equipment
- Use "N/A" for missing information - never leave fields empty or null
- Keep string values simple and avoid special characters
- Focus on construction/building trades: mechanical, electrical, plumbing, fire protection
- Include quantities with original units (EA, LF, SF, etc.)
- Limit to 75 items if document is very large
- Ensure totalItemsFound matches extractedItems array length

Return ONLY the JSON object - no additional text or formatting."#;

/// The built-in template for `provider`.
pub fn template_for(provider: Provider) -> &'static str {
    match provider {
        Provider::Claude => CLAUDE_TEMPLATE,
        Provider::Gemini => GEMINI_TEMPLATE,
    }
}

/// Build the prompt for `provider` around already-normalised `text`.
pub fn build_prompt(provider: Provider, text: &str) -> String {
    render_template(template_for(provider), text)
}

/// Substitute `text` for the `{document_text}` placeholder.
///
/// Only the first placeholder is replaced, so document text that happens to
/// contain the placeholder string is left alone.
pub fn render_template(template: &str, text: &str) -> String {
    template.replacen(DOCUMENT_TEXT_PLACEHOLDER, text, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_contain_placeholder_once() {
        for p in Provider::ALL {
            assert_eq!(template_for(p).matches(DOCUMENT_TEXT_PLACEHOLDER).count(), 1);
        }
    }

    #[test]
    fn build_prompt_embeds_text() {
        let prompt = build_prompt(Provider::Claude, "EF-1 EXHAUST FAN 2 EA");
        assert!(prompt.contains("<document_text>\nEF-1 EXHAUST FAN 2 EA\n</document_text>"));
        assert!(!prompt.contains(DOCUMENT_TEXT_PLACEHOLDER));

        let prompt = build_prompt(Provider::Gemini, "P-1 PUMP");
        assert!(prompt.contains("Text content:\nP-1 PUMP\n"));
    }

    #[test]
    fn templates_request_the_same_fields() {
        let fields = [
            "summary",
            "totalItemsFound",
            "documentType",
            "extractedItems",
            "itemType",
            "quantity",
            "modelNumber",
            "specReference",
            "pageReference",
            "dimensions",
            "mountingType",
            "additionalNotes",
            "recommendations",
        ];
        for p in Provider::ALL {
            for f in fields {
                assert!(
                    template_for(p).contains(&format!("\"{f}\"")),
                    "{p} template is missing {f}"
                );
            }
            assert!(template_for(p).contains(&MAX_ITEMS_HINT.to_string()));
            assert!(template_for(p).contains("N/A"));
        }
    }

    #[test]
    fn placeholder_inside_document_text_is_not_expanded() {
        let prompt = render_template("A {document_text} B", "x {document_text} y");
        assert_eq!(prompt, "A x {document_text} y B");
    }
}
