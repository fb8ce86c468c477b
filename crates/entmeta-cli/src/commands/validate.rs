use std::path::Path;

use entmeta_core::ModelError;

use crate::build_factory;

fn error_code(err: &ModelError) -> &'static str {
    match err {
        ModelError::Definition { .. } => "definition",
        ModelError::UnsupportedAttributeType { .. } => "unsupported-type",
        ModelError::BuildAborted { .. } => "aborted",
    }
}

pub fn run_validate(input_path: &Path, format: &str) -> Result<(String, usize), String> {
    let factory = build_factory(input_path)?;
    let results = factory.build_all();

    let model_count = results.len();
    let failures: Vec<(&str, &ModelError)> = results
        .iter()
        .filter_map(|(class, outcome)| outcome.as_ref().err().map(|e| (class.as_str(), e)))
        .collect();
    let error_count = failures.len();
    let cached = factory.cache_stats().size;

    if format == "json" {
        let diagnostics: Vec<serde_json::Value> = failures
            .iter()
            .map(|(class, err)| {
                serde_json::json!({
                    "class": class,
                    "reference": err.key().reference,
                    "code": error_code(err),
                    "message": err.to_string(),
                })
            })
            .collect();
        let output = serde_json::json!({
            "diagnostics": diagnostics,
            "summary": {
                "errors": error_count,
                "models": model_count,
                "cached": cached,
            }
        });
        let json = serde_json::to_string_pretty(&output)
            .map_err(|e| format!("JSON serialization error: {e}"))?;
        return Ok((json, error_count));
    }

    // Human-readable format
    let mut lines: Vec<String> = failures
        .iter()
        .map(|(class, err)| format!("{class}: error[{}]: {err}", error_code(err)))
        .collect();

    let error_word = if error_count == 1 { "error" } else { "errors" };
    let model_word = if model_count == 1 { "model" } else { "models" };
    lines.push(format!(
        "{error_count} {error_word} in {model_count} {model_word} ({cached} cached)."
    ));

    Ok((lines.join("\n"), error_count))
}
