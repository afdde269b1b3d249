//! Tests for writing generated policy sets to disk
//!
//! These tests run the default sample configuration end to end and check the
//! SQL script and JSON lines written through the public output functions.

use abac_policy_generator::output::{write_policy_file, write_policy_set};
use abac_policy_generator::types::{OutputFormat, PolicyConfig};
use abac_policy_generator::{GenerationOutcome, PolicyOrchestrator};
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

fn sample_outcome() -> GenerationOutcome {
    let config = PolicyConfig { seed: Some(42), ..PolicyConfig::default() };
    PolicyOrchestrator::new(config).unwrap().generate().unwrap()
}

#[test]
fn test_sql_file_contains_schema_and_rules() {
    let outcome = sample_outcome();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("policies.sql");

    write_policy_file(&outcome.policy_set, OutputFormat::Sql, &path).unwrap();
    let sql = fs::read_to_string(&path).unwrap();

    assert!(sql.starts_with("create database if not exists peaauth;"));
    assert!(sql.contains("create table users ("));
    assert!(sql.contains("create table user_attributes ("));
    assert!(sql.contains("create table rules ("));
    assert!(sql.contains("insert into users (userid, clientid, username, password) values"));
    assert!(sql.contains("(1, 'client-alice', 'alice', 'alice-secret')"));
    assert!(sql.contains("insert into rules (topic, static, dynamic, filter, hints, action, access, priority) values"));

    // Role restrictions surface as quoted role predicates
    assert!(sql.contains("'subj.role==''intern'''"));
    assert!(sql.contains("'bldg2/#'"));

    let rule_rows = sql.lines().filter(|line| line.starts_with("('")).count();
    assert_eq!(rule_rows, outcome.policy_set.rules.len());
    assert!(sql.trim_end().ends_with(';'));
}

#[test]
fn test_first_sql_rule_has_highest_priority() {
    let outcome = sample_outcome();
    let top = outcome.policy_set.rules.iter().map(|r| r.priority).max().unwrap();
    let mut buffer = Vec::new();
    write_policy_set(&outcome.policy_set, OutputFormat::Sql, &mut buffer).unwrap();
    let sql = String::from_utf8(buffer).unwrap();

    let first_row = sql.lines().find(|line| line.starts_with("('")).unwrap();
    assert!(first_row.ends_with(&format!(", {}),", top)) || first_row.ends_with(&format!(", {});", top)));
}

#[test]
fn test_json_lines_file() {
    let outcome = sample_outcome();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("policies.jsonl");

    write_policy_file(&outcome.policy_set, OutputFormat::Json, &path).unwrap();
    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<Value> = content.lines().map(|line| serde_json::from_str(line).unwrap()).collect();

    let set = &outcome.policy_set;
    assert_eq!(lines.len(), set.rules.len() + set.users.len() + set.attributes.len());

    let rules: Vec<&Value> = lines.iter().filter(|v| v["record"] == "rule").collect();
    assert_eq!(rules.len(), set.rules.len());
    assert_eq!(rules[0]["id"], Value::String(set.rules[0].id.to_string()));
    assert_eq!(rules[0]["topic"], Value::String(set.rules[0].resource.topic.clone()));
    assert_eq!(rules[0]["effect"], Value::String(set.rules[0].effect.to_string()));

    // Rules come first, then users, then attributes
    let kinds: Vec<&str> = lines.iter().map(|v| v["record"].as_str().unwrap()).collect();
    let first_user = kinds.iter().position(|k| *k == "user").unwrap();
    let first_attribute = kinds.iter().position(|k| *k == "attribute").unwrap();
    assert!(kinds[..first_user].iter().all(|k| *k == "rule"));
    assert!(first_user < first_attribute);
}

#[test]
fn test_write_to_missing_directory_fails() {
    let outcome = sample_outcome();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing").join("policies.sql");

    assert!(write_policy_file(&outcome.policy_set, OutputFormat::Sql, &path).is_err());
}
