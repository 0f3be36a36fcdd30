//! Manifest schema validation.
//!
//! The only component allowed to reject a manifest as *malformed*. Input is a
//! parsed JSON value; output is empty iff every structural rule holds. All
//! downstream components assume schema-valid input. Findings carry the JSON
//! pointer of the offending field plus an expected-vs-actual description.

use crate::core::diagnostics::{Diagnostic, DiagnosticKind, Location};
use serde_json::Value as JsonValue;

const TASK_TYPES: &[&str] = &["create", "edit", "refactor", "snapshot"];
const ARTIFACT_TYPES: &[&str] = &[
    "function",
    "class",
    "method",
    "attribute",
    "interface",
    "type-alias",
    "enum",
    "namespace",
];
const STATUS_VALUES: &[&str] = &["present", "absent"];

fn violation(manifest_name: &str, pointer: &str, message: String) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::SchemaViolation,
        Location::file(manifest_name),
        format!("{}: {}", pointer, message),
    )
}

fn expect_string_array(
    manifest_name: &str,
    value: &JsonValue,
    pointer: &str,
    out: &mut Vec<Diagnostic>,
) -> Vec<String> {
    let Some(items) = value.as_array() else {
        out.push(violation(
            manifest_name,
            pointer,
            format!("expected array of strings, got {}", type_name(value)),
        ));
        return Vec::new();
    };
    let mut strings = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match item.as_str() {
            Some(s) => strings.push(s.to_string()),
            None => out.push(violation(
                manifest_name,
                &format!("{}/{}", pointer, i),
                format!("expected string, got {}", type_name(item)),
            )),
        }
    }
    strings
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn check_artifact(
    manifest_name: &str,
    artifact: &JsonValue,
    pointer: &str,
    out: &mut Vec<Diagnostic>,
) {
    let Some(obj) = artifact.as_object() else {
        out.push(violation(
            manifest_name,
            pointer,
            format!("expected artifact object, got {}", type_name(artifact)),
        ));
        return;
    };

    match obj.get("type").and_then(|v| v.as_str()) {
        Some(kind) if ARTIFACT_TYPES.contains(&kind) => {
            if matches!(kind, "method") && obj.get("class").and_then(|v| v.as_str()).is_none() {
                out.push(violation(
                    manifest_name,
                    &format!("{}/class", pointer),
                    "method artifacts require an owning class".to_string(),
                ));
            }
        }
        Some(kind) => out.push(violation(
            manifest_name,
            &format!("{}/type", pointer),
            format!("expected one of {:?}, got \"{}\"", ARTIFACT_TYPES, kind),
        )),
        None => out.push(violation(
            manifest_name,
            &format!("{}/type", pointer),
            "artifact type is required".to_string(),
        )),
    }

    match obj.get("name").and_then(|v| v.as_str()) {
        Some(name) if !name.is_empty() => {}
        _ => out.push(violation(
            manifest_name,
            &format!("{}/name", pointer),
            "artifact name is required and must be a non-empty string".to_string(),
        )),
    }

    if let Some(args) = obj.get("args") {
        let Some(items) = args.as_array() else {
            out.push(violation(
                manifest_name,
                &format!("{}/args", pointer),
                format!("expected array, got {}", type_name(args)),
            ));
            return;
        };
        for (i, arg) in items.iter().enumerate() {
            let arg_pointer = format!("{}/args/{}", pointer, i);
            match arg {
                // Legacy form: bare parameter name.
                JsonValue::String(_) => {}
                JsonValue::Object(fields) => {
                    if fields.get("name").and_then(|v| v.as_str()).is_none() {
                        out.push(violation(
                            manifest_name,
                            &format!("{}/name", arg_pointer),
                            "parameter objects require a string name".to_string(),
                        ));
                    }
                }
                other => out.push(violation(
                    manifest_name,
                    &arg_pointer,
                    format!(
                        "expected string or {{name, type}} object, got {}",
                        type_name(other)
                    ),
                )),
            }
        }
    }
}

/// Validate one manifest JSON document against the fixed schema plus
/// cross-field semantic rules. Empty result means the manifest is well formed.
pub fn validate_schema(manifest_name: &str, json: &JsonValue) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    let Some(root) = json.as_object() else {
        out.push(violation(
            manifest_name,
            "",
            format!("expected object at document root, got {}", type_name(json)),
        ));
        return out;
    };

    match root.get("goal") {
        Some(JsonValue::String(goal)) if !goal.trim().is_empty() => {}
        Some(other) => out.push(violation(
            manifest_name,
            "/goal",
            format!("expected non-empty string, got {}", type_name(other)),
        )),
        None => out.push(violation(
            manifest_name,
            "/goal",
            "goal is required".to_string(),
        )),
    }

    let task_type = root.get("taskType").and_then(|v| v.as_str());
    if let Some(value) = root.get("taskType") {
        match value.as_str() {
            Some(t) if TASK_TYPES.contains(&t) => {}
            _ => out.push(violation(
                manifest_name,
                "/taskType",
                format!("expected one of {:?}, got {}", TASK_TYPES, value),
            )),
        }
    }

    let mut creatable = Vec::new();
    let mut editable = Vec::new();
    for (field, bucket) in [
        ("creatableFiles", &mut creatable),
        ("editableFiles", &mut editable),
    ] {
        if let Some(value) = root.get(field) {
            *bucket =
                expect_string_array(manifest_name, value, &format!("/{}", field), &mut out);
        }
    }
    if let Some(value) = root.get("readonlyFiles") {
        expect_string_array(manifest_name, value, "/readonlyFiles", &mut out);
    }

    // A file may appear in at most one of creatableFiles/editableFiles.
    for file in &creatable {
        if editable.contains(file) {
            out.push(violation(
                manifest_name,
                "/editableFiles",
                format!(
                    "\"{}\" appears in both creatableFiles and editableFiles",
                    file
                ),
            ));
        }
    }

    let supersedes = match root.get("supersedes") {
        Some(value) => expect_string_array(manifest_name, value, "/supersedes", &mut out),
        None => Vec::new(),
    };

    if root.contains_key("validationCommand") && root.contains_key("validationCommands") {
        out.push(violation(
            manifest_name,
            "/validationCommands",
            "validationCommand and validationCommands are mutually exclusive".to_string(),
        ));
    }

    if let Some(expected) = root.get("expectedArtifacts") {
        let Some(obj) = expected.as_object() else {
            out.push(violation(
                manifest_name,
                "/expectedArtifacts",
                format!("expected object, got {}", type_name(expected)),
            ));
            return out;
        };

        let target_file = obj.get("file").and_then(|v| v.as_str());
        if target_file.is_none() {
            out.push(violation(
                manifest_name,
                "/expectedArtifacts/file",
                "target file is required".to_string(),
            ));
        }

        let contains_len = match obj.get("contains") {
            Some(JsonValue::Array(items)) => {
                for (i, artifact) in items.iter().enumerate() {
                    check_artifact(
                        manifest_name,
                        artifact,
                        &format!("/expectedArtifacts/contains/{}", i),
                        &mut out,
                    );
                }
                items.len()
            }
            Some(other) => {
                out.push(violation(
                    manifest_name,
                    "/expectedArtifacts/contains",
                    format!("expected array, got {}", type_name(other)),
                ));
                0
            }
            None => 0,
        };

        let status = obj.get("status").and_then(|v| v.as_str());
        if let Some(s) = status
            && !STATUS_VALUES.contains(&s)
        {
            out.push(violation(
                manifest_name,
                "/expectedArtifacts/status",
                format!("expected one of {:?}, got \"{}\"", STATUS_VALUES, s),
            ));
        }

        // Deletion-manifest invariant: absent status is only legal on a
        // refactor manifest that supersedes prior work, declares nothing, and
        // does not simultaneously create the file.
        if status == Some("absent") {
            if contains_len != 0 {
                out.push(violation(
                    manifest_name,
                    "/expectedArtifacts/contains",
                    "must be empty when status is \"absent\"".to_string(),
                ));
            }
            if task_type != Some("refactor") {
                out.push(violation(
                    manifest_name,
                    "/taskType",
                    format!(
                        "expected \"refactor\" for a deletion manifest, got {:?}",
                        task_type.unwrap_or("<missing>")
                    ),
                ));
            }
            if supersedes.is_empty() {
                out.push(violation(
                    manifest_name,
                    "/supersedes",
                    "must be non-empty when status is \"absent\"".to_string(),
                ));
            }
            if let Some(file) = target_file
                && creatable.iter().any(|c| c == file)
            {
                out.push(violation(
                    manifest_name,
                    "/creatableFiles",
                    format!("\"{}\" cannot be creatable in a deletion manifest", file),
                ));
            }
        }
    }

    out
}
