//! Enumeration types for the policy generator
//!
//! This module contains the closed enumerations used throughout the generation
//! pipeline: rule effects, access actions, hints, physical dimensions, the
//! generalization strategies, and output formats.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Outcome a rule produces when it matches
///
/// Rendered into the `action` column of the generated rules table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Allow the access
    Grant,
    /// Refuse the access
    Deny,
    /// Allow the access but filter the payload
    Filter,
}

impl Effect {
    /// All effects in the order used for weighted selection
    pub const ALL: [Effect; 3] = [Effect::Grant, Effect::Deny, Effect::Filter];

    /// Restrictiveness rank used when merging rules (`deny` > `filter` > `grant`)
    pub fn restrictiveness(self) -> u8 {
        match self {
            Effect::Grant => 0,
            Effect::Filter => 1,
            Effect::Deny => 2,
        }
    }

    /// Pick the more restrictive of two effects
    pub fn most_restrictive(self, other: Effect) -> Effect {
        if other.restrictiveness() > self.restrictiveness() {
            other
        } else {
            self
        }
    }

    /// Lowercase name as used in configuration and output
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::Grant => "grant",
            Effect::Deny => "deny",
            Effect::Filter => "filter",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Effect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "grant" | "allow" => Ok(Effect::Grant),
            "deny" => Ok(Effect::Deny),
            "filter" => Ok(Effect::Filter),
            _ => Err(format!("Unknown effect: {}", s)),
        }
    }
}

/// Access operation a rule covers
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Both publishing and subscribing
    #[default]
    All,
    /// Publishing to the topic
    Publish,
    /// Subscribing to the topic
    Subscribe,
}

impl Action {
    /// Lowercase name as used in configuration and output
    pub fn as_str(self) -> &'static str {
        match self {
            Action::All => "all",
            Action::Publish => "publish",
            Action::Subscribe => "subscribe",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" | "any" => Ok(Action::All),
            "publish" | "pub" => Ok(Action::Publish),
            "subscribe" | "sub" => Ok(Action::Subscribe),
            _ => Err(format!("Unknown action: {}", s)),
        }
    }
}

/// Evaluation hint attached to a rule
///
/// Mirrors the SQL `set('subj','obj','ctx','payload','json','dsubj')` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hint {
    /// Subject attributes are needed
    Subj,
    /// Object attributes are needed
    Obj,
    /// Connection context is needed
    Ctx,
    /// The raw payload is needed
    Payload,
    /// The payload must be parsed as JSON
    Json,
    /// Dynamic subject attributes are needed
    Dsubj,
}

impl Hint {
    /// Lowercase name as used in configuration and output
    pub fn as_str(self) -> &'static str {
        match self {
            Hint::Subj => "subj",
            Hint::Obj => "obj",
            Hint::Ctx => "ctx",
            Hint::Payload => "payload",
            Hint::Json => "json",
            Hint::Dsubj => "dsubj",
        }
    }
}

impl FromStr for Hint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "subj" => Ok(Hint::Subj),
            "obj" => Ok(Hint::Obj),
            "ctx" => Ok(Hint::Ctx),
            "payload" => Ok(Hint::Payload),
            "json" => Ok(Hint::Json),
            "dsubj" => Ok(Hint::Dsubj),
            _ => Err(format!("Unknown hint: {}", s)),
        }
    }
}

/// Ordered set of hints, written as a comma separated string (`"subj,ctx"`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HintSet(BTreeSet<Hint>);

impl HintSet {
    /// Create an empty hint set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hint set holding a single hint
    pub fn single(hint: Hint) -> Self {
        let mut set = BTreeSet::new();
        set.insert(hint);
        Self(set)
    }

    /// Whether no hint is set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add a hint
    pub fn insert(&mut self, hint: Hint) {
        self.0.insert(hint);
    }

    /// Union of two hint sets
    pub fn union(&self, other: &HintSet) -> HintSet {
        Self(self.0.union(&other.0).copied().collect())
    }

    /// Iterate over the hints in canonical order
    pub fn iter(&self) -> impl Iterator<Item = Hint> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for HintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|h| h.as_str()).collect();
        f.write_str(&names.join(","))
    }
}

impl FromStr for HintSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = HintSet::new();
        for part in s.split(',').filter(|p| !p.trim().is_empty()) {
            set.insert(part.parse()?);
        }
        Ok(set)
    }
}

impl Serialize for HintSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HintSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Physical-space dimension a template can be expanded over
///
/// Declared from the broadest to the most specific level; widening walks
/// the levels in reverse (room, then floor, then building).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DimensionKind {
    /// Building (`{b}`)
    #[serde(rename = "b", alias = "building", alias = "buildings")]
    Building,
    /// Floor (`{fl}`)
    #[serde(rename = "fl", alias = "floor", alias = "floors")]
    Floor,
    /// Room (`{r}`)
    #[serde(rename = "r", alias = "room", alias = "rooms")]
    Room,
    /// Device type (`{dev}`)
    #[serde(rename = "dev", alias = "device", alias = "devices")]
    Device,
}

impl DimensionKind {
    /// All dimensions, broadest first
    pub const ALL: [DimensionKind; 4] = [
        DimensionKind::Building,
        DimensionKind::Floor,
        DimensionKind::Room,
        DimensionKind::Device,
    ];

    /// Placeholder name used inside topic templates
    pub fn placeholder(self) -> &'static str {
        match self {
            DimensionKind::Building => "b",
            DimensionKind::Floor => "fl",
            DimensionKind::Room => "r",
            DimensionKind::Device => "dev",
        }
    }

    /// Resolve a placeholder name
    pub fn from_placeholder(name: &str) -> Option<Self> {
        match name {
            "b" => Some(DimensionKind::Building),
            "fl" => Some(DimensionKind::Floor),
            "r" => Some(DimensionKind::Room),
            "dev" => Some(DimensionKind::Device),
            _ => None,
        }
    }
}

impl fmt::Display for DimensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionKind::Building => write!(f, "Building"),
            DimensionKind::Floor => write!(f, "Floor"),
            DimensionKind::Room => write!(f, "Room"),
            DimensionKind::Device => write!(f, "Device"),
        }
    }
}

/// How rules are partitioned before the slot budget is distributed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingKey {
    /// A single implicit group
    #[default]
    Static,
    /// Group by the rule's hint set
    Hints,
    /// Group by the device type bound in the resource
    Device,
}

impl fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupingKey::Static => write!(f, "static"),
            GroupingKey::Hints => write!(f, "hints"),
            GroupingKey::Device => write!(f, "device"),
        }
    }
}

impl FromStr for GroupingKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "static" => Ok(GroupingKey::Static),
            "hints" => Ok(GroupingKey::Hints),
            "device" => Ok(GroupingKey::Device),
            _ => Err(format!("Unknown grouping key: {}", s)),
        }
    }
}

/// How the slot budget is allocated across groups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStrategy {
    /// One slot at a time, cycling through the groups
    #[default]
    RoundRobin,
    /// Slots proportional to group size, largest remainders first
    Proportional,
    /// Groups ordered by their highest priority take what they need
    PriorityBuckets,
}

impl fmt::Display for DistributionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionStrategy::RoundRobin => write!(f, "round_robin"),
            DistributionStrategy::Proportional => write!(f, "proportional"),
            DistributionStrategy::PriorityBuckets => write!(f, "priority_buckets"),
        }
    }
}

impl FromStr for DistributionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "round_robin" => Ok(DistributionStrategy::RoundRobin),
            "proportional" => Ok(DistributionStrategy::Proportional),
            "priority_buckets" => Ok(DistributionStrategy::PriorityBuckets),
            _ => Err(format!("Unknown distribution strategy: {}", s)),
        }
    }
}

/// Output formats for the generated policy set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// MySQL/MariaDB schema and INSERT statements
    Sql,
    /// JSON lines
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Sql => write!(f, "sql"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sql" => Ok(OutputFormat::Sql),
            "json" | "jsonl" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}
