//! Intrinsic function builders.
//!
//! Intrinsics are plain JSON objects with a single `Ref` / `Fn::*` key, so they
//! are represented as `serde_json::Value` and embedded directly in typed
//! resource properties.

use std::collections::BTreeSet;

use serde_json::{json, Value};

pub const AWS_PARTITION: &str = "AWS::Partition";

const IMPORT_VALUE: &str = "Fn::ImportValue";

/// `{"Ref": logical_id}`: a resource's primary identifier or a parameter value.
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{"Fn::GetAtt": [logical_id, attribute]}`.
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{"Fn::ImportValue": export_name}`: reads another stack's export.
pub fn import_value(export_name: &str) -> Value {
    json!({ IMPORT_VALUE: export_name })
}

/// `{"Fn::Join": [separator, parts]}`.
pub fn join(separator: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [separator, parts] })
}

/// `{"Fn::Base64": value}`.
pub fn base64(value: Value) -> Value {
    json!({ "Fn::Base64": value })
}

/// ARN of an AWS managed IAM policy, partition-aware.
pub fn managed_policy_arn(policy_name: &str) -> Value {
    join(
        "",
        vec![
            Value::from("arn:"),
            reference(AWS_PARTITION),
            Value::from(format!(":iam::aws:policy/{policy_name}")),
        ],
    )
}

/// Collect every `Fn::ImportValue` name with a literal string argument.
pub fn collect_imports(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(name)) = map.get(IMPORT_VALUE) {
                    out.insert(name.clone());
                    return;
                }
            }
            for v in map.values() {
                collect_imports(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_imports(v, out);
            }
        }
        _ => {}
    }
}
