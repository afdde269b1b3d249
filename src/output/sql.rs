//! SQL script emitter
//!
//! Writes a MySQL/MariaDB script that creates the `peaauth` database with the
//! `users`, `user_attributes` and `rules` tables and inserts the policy set.
//! Rows are written in final order so identical policy sets produce identical
//! scripts.

use crate::engine::PolicySet;
use crate::policy::PolicyRecord;
use std::io::{self, Write};

/// Quote and escape a value as an SQL string literal
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Write the full script for a policy set
pub fn write_sql<W: Write>(set: &PolicySet, out: &mut W) -> io::Result<()> {
    write_schema(out)?;
    write_users(set, out)?;
    write_attributes(set, out)?;
    write_rules_table(out)?;
    write_rules(&set.rules, out)
}

fn write_schema<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "create database if not exists peaauth;")?;
    writeln!(out, "use peaauth;")?;
    writeln!(out)?;

    writeln!(out, "create table users (")?;
    writeln!(out, "\tuserid\tint auto_increment primary key,")?;
    writeln!(out, "\tclientid \tvarchar(64),")?;
    writeln!(out, "\tusername\tvarchar(64),")?;
    writeln!(out, "\tpassword\tvarchar(64)")?;
    writeln!(out, ");")?;
    writeln!(out)?;

    writeln!(out, "create table user_attributes (")?;
    writeln!(out, "\tuserid\tint,")?;
    writeln!(out, "\tname\tvarchar(64),")?;
    writeln!(out, "\tval\tvarchar(255),")?;
    writeln!(out, "\tforeign key (userid) references users(userid) on delete cascade")?;
    writeln!(out, ");")?;
    writeln!(out)
}

fn write_users<W: Write>(set: &PolicySet, out: &mut W) -> io::Result<()> {
    writeln!(out, "-- users from settings")?;
    if set.users.is_empty() {
        writeln!(out, "-- (no users retained)")?;
        return writeln!(out);
    }
    writeln!(out, "insert into users (userid, clientid, username, password) values")?;
    let rows: Vec<String> = set
        .users
        .iter()
        .map(|user| {
            format!(
                "({}, {}, {}, {})",
                user.userid,
                sql_literal(&user.clientid),
                sql_literal(&user.username),
                sql_literal(&user.password)
            )
        })
        .collect();
    writeln!(out, "{};", rows.join(",\n"))?;
    writeln!(out)
}

fn write_attributes<W: Write>(set: &PolicySet, out: &mut W) -> io::Result<()> {
    writeln!(out, "-- user attributes from settings")?;
    if set.attributes.is_empty() {
        writeln!(out, "-- (no user attributes retained)")?;
        return writeln!(out);
    }
    writeln!(out, "insert into user_attributes (userid, name, val) values")?;
    let rows: Vec<String> = set
        .attributes
        .iter()
        .map(|attr| format!("({}, {}, {})", attr.userid, sql_literal(&attr.name), sql_literal(&attr.val)))
        .collect();
    writeln!(out, "{};", rows.join(",\n"))?;
    writeln!(out)
}

fn write_rules_table<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "create table rules (")?;
    writeln!(out, "\truleid int auto_increment primary key,")?;
    writeln!(out, "\ttopic varchar(1024),")?;
    writeln!(out, "\tstatic varchar(4096),")?;
    writeln!(out, "\tdynamic varchar(4096),")?;
    writeln!(out, "\tfilter varchar(4096),")?;
    writeln!(out, "\thints set('subj','obj','ctx','payload','json','dsubj'),")?;
    writeln!(out, "\taction enum('filter', 'grant', 'deny'),")?;
    writeln!(out, "\taccess enum('all', 'publish', 'subscribe'),")?;
    writeln!(out, "\tpriority int")?;
    writeln!(out, ");")?;
    writeln!(out)
}

fn write_rules<W: Write>(rules: &[PolicyRecord], out: &mut W) -> io::Result<()> {
    writeln!(out, "-- generated rules")?;
    if rules.is_empty() {
        return writeln!(out, "-- (no rules generated)");
    }

    let rows: Vec<String> = rules.iter().map(rule_row).collect();
    writeln!(out, "insert into rules (topic, static, dynamic, filter, hints, action, access, priority) values")?;
    writeln!(out, "{};", rows.join(",\n"))
}

fn rule_row(rule: &PolicyRecord) -> String {
    format!(
        "({}, {}, {}, {}, {}, {}, {}, {})",
        sql_literal(&rule.resource.topic),
        sql_literal(&rule.subject.predicate()),
        sql_literal(&rule.resource.dynamic),
        sql_literal(&rule.resource.filter),
        sql_literal(&rule.hints.to_string()),
        sql_literal(rule.effect.as_str()),
        sql_literal(rule.action.as_str()),
        rule.priority
    )
}
