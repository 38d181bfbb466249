//! Shape check: turn a recovered JSON object into an [`ExtractionResult`].
//!
//! The check is a pure function of the value. Unknown extra fields are
//! ignored; every known field must be present with the right JSON type.
//! The first violation is reported as a [`ShapeError`].

use crate::error::ShapeError;
use crate::output::{ExtractedItem, ExtractionResult};
use serde_json::{Map, Value};
use tracing::debug;

const A_STRING: &str = "a string";
const AN_ARRAY: &str = "an array";
const AN_OBJECT: &str = "a JSON object";
const A_COUNT: &str = "a non-negative integer";

/// Validate `value` and convert it to a typed result.
///
/// `totalItemsFound` must be a non-negative integral number; the returned
/// result carries `extractedItems.len()` in its place so the two always
/// agree.
pub fn validate(value: &Value) -> Result<ExtractionResult, ShapeError> {
    let root = as_object(value, "")?;

    let summary = string_field(root, "", "summary")?;
    let reported_total = count_field(root, "totalItemsFound")?;
    let document_type = string_field(root, "", "documentType")?;

    let items = array_field(root, "extractedItems")?;
    let extracted_items = items
        .iter()
        .enumerate()
        .map(|(i, v)| item(v, &format!("extractedItems[{i}]")))
        .collect::<Result<Vec<_>, _>>()?;

    let recommendations = array_field(root, "recommendations")?
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| wrong_type(format!("recommendations[{i}]"), A_STRING))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let total_items_found = extracted_items.len() as u64;
    if reported_total != total_items_found {
        debug!(
            "totalItemsFound was {} but {} items were returned; using the item count",
            reported_total, total_items_found
        );
    }

    Ok(ExtractionResult {
        summary,
        total_items_found,
        document_type,
        extracted_items,
        recommendations,
    })
}

/// `true` when `value` has the ExtractionResult shape.
pub fn is_valid(value: &Value) -> bool {
    validate(value).is_ok()
}

fn item(value: &Value, path: &str) -> Result<ExtractedItem, ShapeError> {
    let obj = as_object(value, path)?;
    Ok(ExtractedItem {
        item_type: string_field(obj, path, "itemType")?,
        quantity: string_field(obj, path, "quantity")?,
        model_number: string_field(obj, path, "modelNumber")?,
        spec_reference: string_field(obj, path, "specReference")?,
        page_reference: string_field(obj, path, "pageReference")?,
        dimensions: string_field(obj, path, "dimensions")?,
        mounting_type: string_field(obj, path, "mountingType")?,
        additional_notes: string_field(obj, path, "additionalNotes")?,
    })
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, ShapeError> {
    value
        .as_object()
        .ok_or_else(|| wrong_type(path.to_string(), AN_OBJECT))
}

fn field<'a>(
    obj: &'a Map<String, Value>,
    parent: &str,
    key: &str,
    expected: &'static str,
) -> Result<&'a Value, ShapeError> {
    obj.get(key).ok_or_else(|| ShapeError {
        path: join(parent, key),
        expected,
        missing: true,
    })
}

fn string_field(obj: &Map<String, Value>, parent: &str, key: &str) -> Result<String, ShapeError> {
    field(obj, parent, key, A_STRING)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| wrong_type(join(parent, key), A_STRING))
}

fn array_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a Vec<Value>, ShapeError> {
    field(obj, "", key, AN_ARRAY)?
        .as_array()
        .ok_or_else(|| wrong_type(key.to_string(), AN_ARRAY))
}

fn count_field(obj: &Map<String, Value>, key: &str) -> Result<u64, ShapeError> {
    let v = field(obj, "", key, A_COUNT)?;
    if let Some(n) = v.as_u64() {
        return Ok(n);
    }
    match v.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
            Ok(f as u64)
        }
        _ => Err(wrong_type(key.to_string(), A_COUNT)),
    }
}

fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn wrong_type(path: String, expected: &'static str) -> ShapeError {
    ShapeError {
        path,
        expected,
        missing: false,
    }
}
