//! Rule candidates and final policy records
//!
//! A [`RuleCandidate`] is the mutable working form of a rule while it moves
//! through deduplication and generalization. Once ranked it is frozen into a
//! [`PolicyRecord`].

use crate::policy::template::{Bindings, TopicTemplate};
use crate::types::{Action, DimensionKind, Effect, HintSet, RuleId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Who a rule applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Subject {
    /// Every subject (empty predicate)
    Any,
    /// A single user, by login name
    User(String),
    /// Members of a role
    Role(String),
    /// Holders of a capability attribute
    Attribute(String),
    /// A verbatim predicate from a base policy
    Expression(String),
}

impl Subject {
    /// Predicate stored in the `static` column
    pub fn predicate(&self) -> String {
        match self {
            Subject::Any => String::new(),
            Subject::User(name) => format!("subj.username=='{}'", name),
            Subject::Role(role) => format!("subj.role=='{}'", role),
            Subject::Attribute(attribute) => format!("subj.{} ?? false", attribute),
            Subject::Expression(expression) => expression.clone(),
        }
    }

    /// Subject for a rendered `static` expression
    pub fn from_expression(expression: String) -> Self {
        if expression.trim().is_empty() {
            Subject::Any
        } else {
            Subject::Expression(expression)
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Any => write!(f, "*"),
            other => f.write_str(&other.predicate()),
        }
    }
}

/// What a rule applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Resource {
    /// Normalized MQTT topic pattern
    pub topic: String,
    /// Dynamic condition
    pub dynamic: String,
    /// Payload filter
    pub filter: String,
}

impl Resource {
    /// Resource with only a topic
    pub fn topic(topic: impl Into<String>) -> Self {
        Self { topic: topic.into(), dynamic: String::new(), filter: String::new() }
    }
}

/// Which builder produced a rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleOrigin {
    /// Expanded from a base policy
    Template {
        /// Index in `base_policies`
        index: usize,
    },
    /// Built from a role restriction
    Restriction {
        /// Role name
        role: String,
        /// Index in the role's restrictions
        index: usize,
    },
    /// Granted by a capability attribute
    Capability {
        /// Attribute name
        attribute: String,
    },
}

/// Identity used by deduplication
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleIdentity {
    /// Subject
    pub subject: Subject,
    /// Action
    pub action: Action,
    /// Resource
    pub resource: Resource,
    /// Effect
    pub effect: Effect,
}

/// Identity used when clustering rules for a merge; effects may differ
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MergeKey {
    /// Subject
    pub subject: Subject,
    /// Action
    pub action: Action,
    /// Resource
    pub resource: Resource,
}

/// A rule being generated, deduplicated and generalized
#[derive(Debug, Clone)]
pub struct RuleCandidate {
    /// Identifier
    pub id: RuleId,
    /// Subject
    pub subject: Subject,
    /// Action
    pub action: Action,
    /// Resource
    pub resource: Resource,
    /// Effect
    pub effect: Effect,
    /// Evaluation hints
    pub hints: HintSet,
    /// Priority; higher is evaluated first
    pub priority: u32,
    /// Whether the rule came from a role restriction
    pub restricted: bool,
    /// Importance of the role the rule targets, 0 when none
    pub role_importance: u32,
    /// Number of original candidates this rule stands for
    pub subsumed: usize,
    /// Builder that produced the rule
    pub origin: RuleOrigin,
    /// Template the topic was rendered from
    pub template: Arc<TopicTemplate>,
    /// Placeholder bindings used to render the topic
    pub bindings: Bindings,
}

impl RuleCandidate {
    /// Deduplication identity
    pub fn identity(&self) -> RuleIdentity {
        RuleIdentity {
            subject: self.subject.clone(),
            action: self.action,
            resource: self.resource.clone(),
            effect: self.effect,
        }
    }

    /// Merge identity (effect excluded)
    pub fn merge_key(&self) -> MergeKey {
        MergeKey {
            subject: self.subject.clone(),
            action: self.action,
            resource: self.resource.clone(),
        }
    }

    /// Device type bound in the topic, if any
    pub fn device(&self) -> Option<&str> {
        self.bindings.value(DimensionKind::Device)
    }

    /// Copy of this rule with one dimension replaced by the wildcard
    ///
    /// Returns `None` when the dimension is not concretely bound, or the
    /// template no longer renders with the widened bindings.
    pub fn widened(&self, kind: DimensionKind) -> Option<RuleCandidate> {
        if !self.template.references(kind) {
            return None;
        }
        let mut bindings = self.bindings.clone();
        if !bindings.widen(kind) {
            return None;
        }
        let topic = self.template.render(&bindings).ok()?;
        let mut widened = self.clone();
        widened.resource.topic = topic;
        widened.bindings = bindings;
        Some(widened)
    }

    /// Fold another rule into this one
    ///
    /// Keeps the smallest id, highest priority and most restrictive effect,
    /// and accumulates hints, restriction flags and subsumed counts.
    pub fn absorb(&mut self, other: &RuleCandidate) {
        self.id = self.id.min(other.id);
        self.priority = self.priority.max(other.priority);
        self.effect = self.effect.most_restrictive(other.effect);
        self.restricted |= other.restricted;
        self.role_importance = self.role_importance.max(other.role_importance);
        self.hints = self.hints.union(&other.hints);
        self.subsumed += other.subsumed;
    }
}

/// A ranked, immutable rule ready for output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyRecord {
    /// Identifier
    pub id: RuleId,
    /// Subject
    pub subject: Subject,
    /// Access operation
    pub action: Action,
    /// Topic, dynamic condition and filter
    pub resource: Resource,
    /// Effect
    pub effect: Effect,
    /// Evaluation hints
    pub hints: HintSet,
    /// Priority
    pub priority: u32,
    /// Whether the rule came from a role restriction
    pub restricted: bool,
    /// Number of original candidates this rule stands for
    pub subsumed: usize,
}

impl From<RuleCandidate> for PolicyRecord {
    fn from(rule: RuleCandidate) -> Self {
        Self {
            id: rule.id,
            subject: rule.subject,
            action: rule.action,
            resource: rule.resource,
            effect: rule.effect,
            hints: rule.hints,
            priority: rule.priority,
            restricted: rule.restricted,
            subsumed: rule.subsumed,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Candidate on `{b}/{fl}/{r}/#` bound to the given labels
    pub(crate) fn spatial_rule(
        id: u64,
        building: &str,
        floor: &str,
        room: &str,
        effect: Effect,
        priority: u32,
    ) -> RuleCandidate {
        let template = Arc::new(TopicTemplate::parse("{b}/{fl}/{r}/#").unwrap());
        let bindings = Bindings::new()
            .with(DimensionKind::Building, building)
            .with(DimensionKind::Floor, floor)
            .with(DimensionKind::Room, room);
        let topic = template.render(&bindings).unwrap();
        RuleCandidate {
            id: RuleId(id),
            subject: Subject::Any,
            action: Action::All,
            resource: Resource::topic(topic),
            effect,
            hints: HintSet::new(),
            priority,
            restricted: false,
            role_importance: 0,
            subsumed: 1,
            origin: RuleOrigin::Template { index: 0 },
            template,
            bindings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::spatial_rule;
    use super::*;
    use crate::types::Hint;

    #[test]
    fn test_subject_predicates() {
        assert_eq!(Subject::Any.predicate(), "");
        assert_eq!(Subject::User("alice".into()).predicate(), "subj.username=='alice'");
        assert_eq!(Subject::Role("intern".into()).predicate(), "subj.role=='intern'");
        assert_eq!(Subject::Attribute("video".into()).predicate(), "subj.video ?? false");
        assert_eq!(Subject::from_expression("  ".into()), Subject::Any);
        assert_eq!(
            Subject::from_expression("subj.level > 2".into()),
            Subject::Expression("subj.level > 2".into())
        );
    }

    #[test]
    fn test_identity_includes_effect() {
        let grant = spatial_rule(1, "B1", "f1", "r1", Effect::Grant, 1);
        let deny = spatial_rule(2, "B1", "f1", "r1", Effect::Deny, 1);
        assert_ne!(grant.identity(), deny.identity());
        assert_eq!(grant.merge_key(), deny.merge_key());
    }

    #[test]
    fn test_widening() {
        let rule = spatial_rule(1, "B1", "f1", "r1", Effect::Grant, 1);
        let room = rule.widened(DimensionKind::Room).unwrap();
        assert_eq!(room.resource.topic, "B1/f1/+/#");

        let floor = room.widened(DimensionKind::Floor).unwrap();
        assert_eq!(floor.resource.topic, "B1/+/+/#");

        assert!(room.widened(DimensionKind::Room).is_none());
        assert!(rule.widened(DimensionKind::Device).is_none());
    }

    #[test]
    fn test_absorb() {
        let mut a = spatial_rule(4, "B1", "+", "+", Effect::Grant, 2);
        let mut b = spatial_rule(2, "B1", "+", "+", Effect::Deny, 7);
        a.hints.insert(Hint::Subj);
        b.hints.insert(Hint::Ctx);
        b.restricted = true;
        b.subsumed = 3;

        a.absorb(&b);
        assert_eq!(a.id, RuleId(2));
        assert_eq!(a.priority, 7);
        assert_eq!(a.effect, Effect::Deny);
        assert!(a.restricted);
        assert_eq!(a.subsumed, 4);
        assert_eq!(a.hints.to_string(), "subj,ctx");
    }

    #[test]
    fn test_policy_record_from_candidate() {
        let rule = spatial_rule(9, "B2", "f1", "r1", Effect::Filter, 3);
        let record = PolicyRecord::from(rule);
        assert_eq!(record.id, RuleId(9));
        assert_eq!(record.resource.topic, "B2/f1/r1/#");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["effect"], "filter");
        assert_eq!(json["id"], "RULE_000009");
    }
}
