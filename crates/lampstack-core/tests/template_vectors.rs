//! Template rendering vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;

use serde::Serialize;
use serde_json::{json, Value};

use lampstack_core::template::intrinsic::{get_att, import_value, reference};
use lampstack_core::template::{Output, Resource, Template};

fn load(name: &str) -> Value {
    let s = fs::read_to_string(format!("tests/vectors/{name}")).unwrap();
    serde_json::from_str(&s).unwrap()
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct BucketProps {
    bucket_name: String,
    tags: Vec<Value>,
}

fn vector_template() -> Template {
    let mut t = Template::new(Some("vector: one bucket, one export".into()));
    let bucket = BucketProps {
        bucket_name: "vector-bucket".into(),
        tags: vec![json!({ "Key": "Name", "Value": "vector" })],
    };
    t.add_resource("Bucket", Resource::new("AWS::S3::Bucket", &bucket).unwrap())
        .unwrap();

    let policy = json!({
        "Bucket": reference("Bucket"),
        "PolicyDocument": import_value("Shared:PolicyDocument"),
    });
    t.add_resource(
        "Policy",
        Resource::new("AWS::S3::BucketPolicy", &policy)
            .unwrap()
            .depends_on("Bucket"),
    )
    .unwrap();

    t.add_output(
        "BucketArn",
        Output::new(get_att("Bucket", "Arn")).exported_as("Vector:BucketArn"),
    )
    .unwrap();
    t
}

#[test]
fn minimal_template_matches_vector() {
    let t = vector_template();
    t.validate().unwrap();
    let rendered: Value = serde_json::from_str(&t.to_json_pretty().unwrap()).unwrap();
    assert_eq!(rendered, load("minimal_template.json"));
}

#[test]
fn rendering_is_deterministic() {
    let a = vector_template().to_json_pretty().unwrap();
    let b = vector_template().to_json_pretty().unwrap();
    assert_eq!(a, b);
    assert!(a.ends_with('\n'));
}

#[test]
fn imports_and_exports_are_collected() {
    let t = vector_template();
    assert!(t.imports().contains("Shared:PolicyDocument"));
    assert!(t.exports().contains("Vector:BucketArn"));
}

#[test]
fn duplicate_logical_id_is_rejected() {
    let mut t = vector_template();
    let err = t
        .add_resource("Bucket", Resource::new("AWS::S3::Bucket", &json!({})).unwrap())
        .expect_err("duplicate must fail");
    assert_eq!(err.code().as_str(), "INVALID_TEMPLATE");
}

#[test]
fn non_alphanumeric_logical_id_is_rejected() {
    let mut t = Template::new(None);
    let err = t
        .add_resource("my-bucket", Resource::new("AWS::S3::Bucket", &json!({})).unwrap())
        .expect_err("dash must fail");
    assert_eq!(err.code().as_str(), "INVALID_TEMPLATE");
}

#[test]
fn duplicate_export_name_is_rejected() {
    let mut t = vector_template();
    let err = t
        .add_output(
            "Again",
            Output::new(reference("Bucket")).exported_as("Vector:BucketArn"),
        )
        .expect_err("duplicate export must fail");
    assert_eq!(err.code().as_str(), "INVALID_TEMPLATE");
}

#[test]
fn dangling_depends_on_fails_validation() {
    let mut t = Template::new(None);
    t.add_resource(
        "Queue",
        Resource::new("AWS::SQS::Queue", &json!({}))
            .unwrap()
            .depends_on("Missing"),
    )
    .unwrap();
    assert_eq!(t.validate().unwrap_err().code().as_str(), "INVALID_TEMPLATE");
}
