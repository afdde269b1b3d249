//! JSON lines emitter
//!
//! One object per line: every rule in final order, then the retained users,
//! then their attribute rows. Each object carries a `record` tag.

use crate::engine::PolicySet;
use crate::policy::PolicyRecord;
use crate::types::{Action, Effect, RuleId, UserId};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Debug, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum JsonLine<'a> {
    Rule {
        id: RuleId,
        topic: &'a str,
        #[serde(rename = "static")]
        static_expr: String,
        dynamic: &'a str,
        filter: &'a str,
        hints: String,
        effect: Effect,
        action: Action,
        priority: u32,
        restricted: bool,
        subsumed: usize,
    },
    User {
        userid: UserId,
        clientid: &'a str,
        username: &'a str,
        password: &'a str,
    },
    Attribute {
        userid: UserId,
        name: &'a str,
        val: &'a str,
    },
}

impl<'a> From<&'a PolicyRecord> for JsonLine<'a> {
    fn from(rule: &'a PolicyRecord) -> Self {
        JsonLine::Rule {
            id: rule.id,
            topic: &rule.resource.topic,
            static_expr: rule.subject.predicate(),
            dynamic: &rule.resource.dynamic,
            filter: &rule.resource.filter,
            hints: rule.hints.to_string(),
            effect: rule.effect,
            action: rule.action,
            priority: rule.priority,
            restricted: rule.restricted,
            subsumed: rule.subsumed,
        }
    }
}

fn write_line<W: Write>(line: &JsonLine<'_>, out: &mut W) -> io::Result<()> {
    serde_json::to_writer(&mut *out, line).map_err(io::Error::from)?;
    writeln!(out)
}

/// Write the policy set as JSON lines
pub fn write_json_lines<W: Write>(set: &PolicySet, out: &mut W) -> io::Result<()> {
    for rule in &set.rules {
        write_line(&JsonLine::from(rule), out)?;
    }
    for user in &set.users {
        let line = JsonLine::User {
            userid: user.userid,
            clientid: &user.clientid,
            username: &user.username,
            password: &user.password,
        };
        write_line(&line, out)?;
    }
    for attr in &set.attributes {
        let line = JsonLine::Attribute { userid: attr.userid, name: &attr.name, val: &attr.val };
        write_line(&line, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{User, UserAttribute};
    use crate::policy::{Resource, Subject};
    use crate::types::HintSet;

    #[test]
    fn test_json_lines_layout() {
        let set = PolicySet {
            rules: vec![PolicyRecord {
                id: RuleId(12),
                subject: Subject::Role("intern".to_string()),
                action: Action::All,
                resource: Resource::topic("bldg2/#"),
                effect: Effect::Deny,
                hints: HintSet::new(),
                priority: 51,
                restricted: true,
                subsumed: 1,
            }],
            users: vec![User {
                userid: UserId(1),
                clientid: "c1".to_string(),
                username: "alice".to_string(),
                password: "pw".to_string(),
            }],
            attributes: vec![UserAttribute {
                userid: UserId(1),
                name: "role".to_string(),
                val: "intern".to_string(),
            }],
        };

        let mut buffer = Vec::new();
        write_json_lines(&set, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<serde_json::Value> =
            text.lines().map(|line| serde_json::from_str(line).unwrap()).collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["record"], "rule");
        assert_eq!(lines[0]["id"], "RULE_000012");
        assert_eq!(lines[0]["static"], "subj.role=='intern'");
        assert_eq!(lines[0]["effect"], "deny");
        assert_eq!(lines[0]["priority"], 51);
        assert_eq!(lines[1]["record"], "user");
        assert_eq!(lines[1]["username"], "alice");
        assert_eq!(lines[2]["record"], "attribute");
        assert_eq!(lines[2]["val"], "intern");
    }
}
