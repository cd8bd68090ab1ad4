use anyhow::{anyhow, Result};
use include_dir::{include_dir, Dir};
use jsonschema::JSONSchema;
use serde_json::Value;

static SCHEMAS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/schemas");

pub const ATTRIBUTION_SUMMARY_V1: &str = "attribution_summary_v1";
pub const PROVENANCE_V1: &str = "provenance_v1";
pub const INCIDENT_ATTRIBUTION_V1: &str = "incident_attribution_v1";
pub const TOOLKIT_CONFIG_V1ALPHA1: &str = "toolkit_config_v1alpha1";

/// Names of every embedded schema, without the file extension.
pub fn schema_names() -> Vec<String> {
    let mut names: Vec<String> = SCHEMAS
        .files()
        .filter_map(|f| f.path().file_stem())
        .filter_map(|s| s.to_str())
        .map(|s| s.to_string())
        .collect();
    names.sort();
    names
}

pub fn load_schema(name: &str) -> Result<Value> {
    let file_name = if name.ends_with(".jsonschema") {
        name.to_string()
    } else {
        format!("{}.jsonschema", name)
    };
    let file = SCHEMAS
        .get_file(&file_name)
        .ok_or_else(|| anyhow!("unknown schema: {}", name))?;
    let raw = file
        .contents_utf8()
        .ok_or_else(|| anyhow!("schema is not utf-8: {}", name))?;
    Ok(serde_json::from_str(raw)?)
}

pub fn compile_schema(name: &str) -> Result<JSONSchema> {
    let schema = load_schema(name)?;
    JSONSchema::compile(&schema).map_err(|e| anyhow!("schema {} failed to compile: {}", name, e))
}

/// Validates `payload` against the named schema. The error lists every
/// violation prefixed by the offending instance path.
pub fn validate_value(name: &str, payload: &Value) -> Result<()> {
    let compiled = compile_schema(name)?;
    let violations = collect_violations(&compiled, payload);
    if violations.is_empty() {
        return Ok(());
    }
    Err(anyhow!(
        "{} validation failed: {}",
        name,
        violations.join("; ")
    ))
}

fn collect_violations(compiled: &JSONSchema, payload: &Value) -> Vec<String> {
    match compiled.validate(payload) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    format!("/: {}", e)
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect(),
    }
}
