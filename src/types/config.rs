//! Configuration structures for the policy generator
//!
//! This module contains the generation configuration, the partial configuration
//! file structure, the command line arguments, and the validation logic that
//! rejects configuration defects before any rule is generated.

use super::{
    Action, DimensionKind, DistributionStrategy, Effect, GroupingKey, Hint, HintSet, OutputFormat,
    UserId,
};
use crate::catalog::{User, UserAttribute};
use crate::policy::template::{ConditionTemplate, TemplateError, TopicTemplate};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

/// Effect selection weights keyed by effect
pub type EffectWeights = BTreeMap<Effect, f64>;

/// Command line arguments structure
#[derive(Debug, Clone, Parser)]
#[command(
    name = "abac-policy-generator",
    version = "0.1.0",
    about = "ABAC Policy Generator - Generates bounded, prioritized ABAC rule sets",
    long_about = "Expands base policy templates across buildings, floors, rooms and device types, adds role restrictions and capability grants, deduplicates and generalizes the result to a maximum rule count, and writes it as SQL or JSON.

EXAMPLES:
    # Generate with the built-in sample configuration
    abac-policy-generator

    # Use a configuration file
    abac-policy-generator --config policy_settings.json --out policies.sql

    # Bound the rule count and fix the seed
    abac-policy-generator --config policy_settings.json --max-policies 500 --seed 42

    # Generate configuration template
    abac-policy-generator --print-config > my-config.json

    # Validate configuration without generating
    abac-policy-generator --config my-config.json --dry-run

CONFIGURATION:
    Configuration can be provided via:
    1. Command line arguments (highest priority)
    2. Configuration file (--config flag)
    3. Default values (lowest priority)

    Supported configuration file formats: JSON (.json)"
)]
pub struct CliArgs {
    /// Configuration file path (JSON format)
    #[arg(
        short,
        long,
        help = "Configuration file path (JSON format)",
        long_help = "Path to a JSON configuration file. CLI arguments will override file settings."
    )]
    pub config: Option<String>,

    /// Output file path
    #[arg(short, long, help = "Output file path")]
    pub out: Option<String>,

    /// Maximum number of rules in the generated policy set
    #[arg(
        long,
        help = "Maximum number of generated rules",
        long_help = "Upper bound on the number of rules written. When more unique rules exist they are generalized. Must be greater than 0. Default: 1000"
    )]
    pub max_policies: Option<usize>,

    /// Random seed for reproducible results
    #[arg(long, help = "Random seed for reproducible results")]
    pub seed: Option<u64>,

    /// Output format
    #[arg(long, help = "Output format (sql or json)")]
    pub format: Option<OutputFormat>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, help = "Enable debug logging")]
    pub debug: bool,

    /// Dry run mode - validate configuration without generating
    #[arg(long, help = "Validate configuration without generating policies")]
    pub dry_run: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in JSON format and exit")]
    pub print_config: bool,
}

/// Resolved dimension lists (`expansions` in the configuration file)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expansions {
    /// Building names; required
    #[serde(default)]
    pub buildings: Option<Vec<String>>,
    /// Floor labels (e.g. `f1`)
    #[serde(default)]
    pub floors: Vec<String>,
    /// Room labels
    #[serde(default)]
    pub rooms: Vec<String>,
    /// Device types
    #[serde(default)]
    pub devices: Vec<String>,
}

/// Inclusive range used to expand `{v}` / `{v_plus}` in condition templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRange {
    /// First value
    #[serde(default)]
    pub min: i64,
    /// Last value (inclusive)
    #[serde(default)]
    pub max: i64,
    /// Increment; 0 is treated as 1
    #[serde(default = "default_step")]
    pub step: u32,
}

fn default_step() -> u32 {
    1
}

impl ValueRange {
    /// Values covered by the range
    pub fn values(&self) -> impl Iterator<Item = i64> {
        let step = self.step.max(1) as usize;
        (self.min..=self.max).step_by(step)
    }
}

/// A base policy template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasePolicy {
    /// Topic pattern with `{b}`, `{fl}`, `{r}`, `{dev}` placeholders
    pub topic_template: String,
    /// Dimensions the template is expanded over
    #[serde(default)]
    pub expand_on: Vec<DimensionKind>,
    /// Device types overriding the catalog for this policy
    #[serde(default)]
    pub devices: Vec<String>,
    /// Subject predicate; may use `{v}` / `{v_plus}`
    #[serde(default, rename = "static")]
    pub static_expr: String,
    /// Dynamic condition; may use `{v}` / `{v_plus}`
    #[serde(default)]
    pub dynamic: String,
    /// Payload filter; may use `{v}` / `{v_plus}`
    #[serde(default)]
    pub filter: String,
    /// Evaluation hints
    #[serde(default)]
    pub hints: HintSet,
    /// Effect used when no probability table applies
    #[serde(default = "default_template_effect", alias = "action")]
    pub effect: Effect,
    /// Access operation covered
    #[serde(default)]
    pub access: Action,
    /// Rule priority
    #[serde(default)]
    pub priority: u32,
    /// Optional value range for condition expansion
    #[serde(default)]
    pub range: Option<ValueRange>,
    /// Policy-level effect probabilities (override the global table)
    #[serde(default)]
    pub action_probabilities: Option<EffectWeights>,
}

fn default_template_effect() -> Effect {
    Effect::Deny
}

fn default_restriction_effect() -> Effect {
    Effect::Deny
}

/// Explicit floor in a restriction: a floor number or a literal label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FloorRef {
    /// Floor number, resolved against the floor catalog
    Number(u32),
    /// Literal floor label
    Label(String),
}

/// Role-scoped restriction definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestrictionDefinition {
    /// Topic pattern; may use `{b}` and `{fl}`
    pub topic_template: String,
    /// Only buildings whose name ends with this suffix
    #[serde(default)]
    pub building_suffix: Option<String>,
    /// Explicit floor; absent means building-wide
    #[serde(default)]
    pub floor: Option<FloorRef>,
    /// Effect of the generated rules
    #[serde(default = "default_restriction_effect", alias = "action")]
    pub effect: Effect,
    /// Access operation covered
    #[serde(default)]
    pub access: Action,
    /// Base priority
    #[serde(default, alias = "base_priority")]
    pub priority: u32,
    /// Name of a numeric configuration value added to the priority
    #[serde(default)]
    pub priority_offset_config: Option<String>,
    /// Evaluation hints; defaults to `subj`
    #[serde(default)]
    pub hints: Option<HintSet>,
}

/// Role definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Importance of the role, used as a ranking tie-breaker
    #[serde(default, alias = "importance")]
    pub priority: u32,
    /// Restrictions applying to members of the role
    #[serde(default)]
    pub restrictions: Vec<RestrictionDefinition>,
}

/// Generalization settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralizationConfig {
    /// How rules are grouped
    #[serde(default)]
    pub grouping_key: GroupingKey,
    /// How the slot budget is distributed
    #[serde(default)]
    pub distribution_strategy: DistributionStrategy,
}

/// Configuration file structure (allows partial configuration)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Users
    pub users: Option<Vec<User>>,
    /// User attribute rows
    pub user_attributes: Option<Vec<UserAttribute>>,
    /// Dimension lists
    pub expansions: Option<Expansions>,
    /// Base policy templates
    pub base_policies: Option<Vec<BasePolicy>>,
    /// Role definitions
    pub roles: Option<BTreeMap<String, RoleDefinition>>,
    /// Capability attribute to device types
    pub capability_devices: Option<BTreeMap<String, Vec<String>>>,
    /// Global effect probabilities
    pub action_probabilities: Option<EffectWeights>,
    /// Maximum number of rules
    pub max_policies: Option<usize>,
    /// Generalization settings
    pub generalization: Option<GeneralizationConfig>,
    /// Random seed for reproducible results
    pub seed: Option<u64>,
    /// Output format
    pub output_format: Option<OutputFormat>,
    /// Output path
    pub output_path: Option<String>,
    /// Any other top-level value, addressable by `priority_offset_config`
    #[serde(flatten)]
    pub named_values: BTreeMap<String, serde_json::Value>,
}

/// Configuration for a policy generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Users
    pub users: Vec<User>,
    /// User attribute rows
    pub user_attributes: Vec<UserAttribute>,
    /// Dimension lists
    pub expansions: Expansions,
    /// Base policy templates
    pub base_policies: Vec<BasePolicy>,
    /// Role definitions, keyed by role name
    pub roles: BTreeMap<String, RoleDefinition>,
    /// Capability attribute to device types
    pub capability_devices: BTreeMap<String, Vec<String>>,
    /// Global effect probabilities
    pub action_probabilities: Option<EffectWeights>,
    /// Maximum number of rules
    pub max_policies: usize,
    /// Generalization settings
    pub generalization: GeneralizationConfig,
    /// Random seed for reproducible results
    pub seed: Option<u64>,
    /// Output format
    pub output_format: OutputFormat,
    /// Output path
    pub output_path: String,
    /// Any other top-level value, addressable by `priority_offset_config`
    #[serde(flatten)]
    pub named_values: BTreeMap<String, serde_json::Value>,
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Configuration file read error
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    /// JSON parsing error (including unknown strategy names)
    #[error("Failed to parse JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Unsupported configuration file format
    #[error("Unsupported configuration file format: {0} (supported: .json)")]
    UnsupportedFormat(String),
}

/// Validation errors for the generation configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    /// Maximum rule count is invalid
    #[error("max_policies must be greater than 0, got {0}")]
    InvalidMaxPolicies(usize),

    /// A required dimension is missing or empty
    #[error("Required dimension '{0}' is missing or empty")]
    MissingDimension(String),

    /// A dimension contains a blank value
    #[error("Dimension '{0}' contains a blank value")]
    BlankDimensionValue(String),

    /// A template could not be parsed
    #[error("Invalid template in {context}: {source}")]
    InvalidTemplate {
        /// Where the template was found
        context: String,
        /// Parse failure
        #[source]
        source: TemplateError,
    },

    /// A placeholder would stay unresolved after expansion
    #[error("Placeholder {{{placeholder}}} in {context} is not covered by its expansion")]
    UnresolvablePlaceholder {
        /// Where the template was found
        context: String,
        /// Placeholder name
        placeholder: String,
    },

    /// A value range is empty
    #[error("Invalid range in {context}: min ({min}) must be <= max ({max})")]
    InvalidRange {
        /// Where the range was found
        context: String,
        /// Range start
        min: i64,
        /// Range end
        max: i64,
    },

    /// A range ends at the largest integer while a condition uses `{v_plus}`
    #[error("Range in {context} ends at {max}, which has no successor for {{v_plus}}")]
    RangeOverflow {
        /// Where the range was found
        context: String,
        /// Range end
        max: i64,
    },

    /// An effect weight is negative or not finite
    #[error("Invalid probability for {effect} in {context}: {value}")]
    InvalidWeight {
        /// Where the table was found
        context: String,
        /// Effect name
        effect: Effect,
        /// The invalid weight
        value: f64,
    },

    /// Two users share an id
    #[error("Duplicate user id {0}")]
    DuplicateUserId(UserId),

    /// A role has an empty name
    #[error("Role names must not be empty")]
    EmptyRoleName,
}

fn sample_user(userid: u32, username: &str) -> User {
    User {
        userid: UserId(userid),
        clientid: format!("client-{}", username),
        username: username.to_string(),
        password: format!("{}-secret", username),
    }
}

fn sample_attribute(userid: u32, name: &str, val: &str) -> UserAttribute {
    UserAttribute { userid: UserId(userid), name: name.to_string(), val: val.to_string() }
}

fn sample_hints(hints: &[Hint]) -> HintSet {
    let mut set = HintSet::new();
    for hint in hints {
        set.insert(*hint);
    }
    set
}

fn default_capability_devices() -> BTreeMap<String, Vec<String>> {
    let mut map = BTreeMap::new();
    map.insert("video".to_string(), vec!["cam".to_string()]);
    map.insert("alarm".to_string(), vec!["proximity".to_string()]);
    map.insert("facilities".to_string(), vec!["tstat".to_string(), "thermostat".to_string()]);
    map
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let mut roles = BTreeMap::new();
        roles.insert(
            "intern".to_string(),
            RoleDefinition {
                priority: 1,
                restrictions: vec![
                    RestrictionDefinition {
                        topic_template: "{b}/#".to_string(),
                        building_suffix: Some("2".to_string()),
                        floor: None,
                        effect: Effect::Deny,
                        access: Action::All,
                        priority: 1,
                        priority_offset_config: None,
                        hints: None,
                    },
                    RestrictionDefinition {
                        topic_template: "{b}/f3/#".to_string(),
                        building_suffix: None,
                        floor: Some(FloorRef::Number(3)),
                        effect: Effect::Deny,
                        access: Action::All,
                        priority: 1,
                        priority_offset_config: Some("security_restriction_bonus".to_string()),
                        hints: None,
                    },
                ],
            },
        );
        roles.insert("staff".to_string(), RoleDefinition { priority: 5, restrictions: Vec::new() });

        let mut named_values = BTreeMap::new();
        named_values.insert("security_restriction_bonus".to_string(), serde_json::json!(50));

        Self {
            users: vec![sample_user(1, "alice"), sample_user(2, "bob"), sample_user(3, "carol")],
            user_attributes: vec![
                sample_attribute(1, "role", "intern"),
                sample_attribute(1, "video", "?true"),
                sample_attribute(2, "role", "staff"),
                sample_attribute(2, "facilities", "?true"),
                sample_attribute(3, "role", "staff"),
                sample_attribute(3, "alarm", "?false"),
            ],
            expansions: Expansions {
                buildings: Some(strings(&["bldg1", "bldg2"])),
                floors: strings(&["f1", "f2", "f3"]),
                rooms: strings(&["r1", "r2"]),
                devices: strings(&["lamp", "cam", "tstat"]),
            },
            base_policies: vec![
                BasePolicy {
                    topic_template: "{b}/{fl}/{r}/{dev}/#".to_string(),
                    expand_on: vec![
                        DimensionKind::Building,
                        DimensionKind::Floor,
                        DimensionKind::Room,
                        DimensionKind::Device,
                    ],
                    devices: Vec::new(),
                    static_expr: String::new(),
                    dynamic: String::new(),
                    filter: String::new(),
                    hints: HintSet::new(),
                    effect: Effect::Grant,
                    access: Action::Subscribe,
                    priority: 3,
                    range: None,
                    action_probabilities: None,
                },
                BasePolicy {
                    topic_template: "{b}/{fl}/{r}/tstat/#".to_string(),
                    expand_on: vec![DimensionKind::Building, DimensionKind::Floor, DimensionKind::Room],
                    devices: Vec::new(),
                    static_expr: "subj.clearance >= {v}".to_string(),
                    dynamic: String::new(),
                    filter: "payload.setpoint < {v_plus}0".to_string(),
                    hints: sample_hints(&[Hint::Subj, Hint::Json]),
                    effect: Effect::Filter,
                    access: Action::Publish,
                    priority: 2,
                    range: Some(ValueRange { min: 1, max: 2, step: 1 }),
                    action_probabilities: None,
                },
            ],
            roles,
            capability_devices: default_capability_devices(),
            action_probabilities: None,
            max_policies: 1000,
            generalization: GeneralizationConfig::default(),
            seed: None,
            output_format: OutputFormat::Sql,
            output_path: "generated_policies.sql".to_string(),
            named_values,
        }
    }
}

impl PolicyConfig {
    /// Create a new configuration from command line arguments and optional config file
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::from_cli_args(args)
    }

    /// Create configuration from parsed CLI arguments
    pub fn from_cli_args(args: CliArgs) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(config_path) = &args.config {
            config = Self::from_file(config_path)?;
        }

        // CLI takes precedence over the file
        Self::apply_cli_overrides(&mut config, args);

        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => Err(ConfigError::UnsupportedFormat("no extension".to_string())),
        }
    }

    /// Parse configuration from JSON text, merging with defaults
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config_file: ConfigFile = serde_json::from_str(content)?;
        Ok(Self::from_config_file(config_file))
    }

    /// Create configuration from a config file, merging with defaults
    fn from_config_file(config_file: ConfigFile) -> Self {
        let defaults = Self::default();

        let mut named_values = defaults.named_values;
        named_values.extend(config_file.named_values);

        Self {
            users: config_file.users.unwrap_or(defaults.users),
            user_attributes: config_file.user_attributes.unwrap_or(defaults.user_attributes),
            expansions: config_file.expansions.unwrap_or(defaults.expansions),
            base_policies: config_file.base_policies.unwrap_or(defaults.base_policies),
            roles: config_file.roles.unwrap_or(defaults.roles),
            capability_devices: config_file
                .capability_devices
                .unwrap_or(defaults.capability_devices),
            action_probabilities: config_file
                .action_probabilities
                .or(defaults.action_probabilities),
            max_policies: config_file.max_policies.unwrap_or(defaults.max_policies),
            generalization: config_file.generalization.unwrap_or(defaults.generalization),
            seed: config_file.seed.or(defaults.seed),
            output_format: config_file.output_format.unwrap_or(defaults.output_format),
            output_path: config_file.output_path.unwrap_or(defaults.output_path),
            named_values,
        }
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(config: &mut Self, args: CliArgs) {
        if let Some(value) = args.max_policies {
            config.max_policies = value;
        }
        if let Some(value) = args.seed {
            config.seed = Some(value);
        }
        if let Some(value) = args.out {
            config.output_path = value;
        }
        if let Some(value) = args.format {
            config.output_format = value;
        }
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Print configuration as JSON
    pub fn print_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Look up a named numeric configuration value used as a priority bonus
    ///
    /// Absent, negative and non-numeric values yield `None`; callers treat
    /// that as a zero bonus.
    pub fn priority_bonus(&self, key: &str) -> Option<u32> {
        let value = self.named_values.get(key)?;
        let bonus = value.as_u64().or_else(|| {
            value.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)
        })?;
        Some(bonus.min(u64::from(u32::MAX)) as u32)
    }

    /// Building names, empty when the dimension is missing
    pub fn buildings(&self) -> &[String] {
        self.expansions.buildings.as_deref().unwrap_or(&[])
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.max_policies == 0 {
            return Err(ConfigValidationError::InvalidMaxPolicies(self.max_policies));
        }

        if self.buildings().is_empty() {
            return Err(ConfigValidationError::MissingDimension("buildings".to_string()));
        }

        self.validate_dimension_values()?;

        if let Some(weights) = &self.action_probabilities {
            Self::validate_weights("action_probabilities", weights)?;
        }

        let mut seen_users = HashSet::new();
        for user in &self.users {
            if !seen_users.insert(user.userid) {
                return Err(ConfigValidationError::DuplicateUserId(user.userid));
            }
        }

        for (index, policy) in self.base_policies.iter().enumerate() {
            self.validate_base_policy(index, policy)?;
        }

        for (name, role) in &self.roles {
            if name.trim().is_empty() {
                return Err(ConfigValidationError::EmptyRoleName);
            }
            for (index, restriction) in role.restrictions.iter().enumerate() {
                let context = format!("roles.{}.restrictions[{}]", name, index);
                let template = Self::parse_template(&context, &restriction.topic_template)?;
                let allowed = [DimensionKind::Building, DimensionKind::Floor];
                Self::check_placeholders(&context, &template, &allowed)?;
            }
        }

        Ok(())
    }

    fn validate_dimension_values(&self) -> Result<(), ConfigValidationError> {
        let dimensions = [
            ("buildings", self.buildings()),
            ("floors", self.expansions.floors.as_slice()),
            ("rooms", self.expansions.rooms.as_slice()),
            ("devices", self.expansions.devices.as_slice()),
        ];
        for (name, values) in dimensions {
            if values.iter().any(|v| v.trim().is_empty()) {
                return Err(ConfigValidationError::BlankDimensionValue(name.to_string()));
            }
        }
        Ok(())
    }

    fn validate_base_policy(
        &self,
        index: usize,
        policy: &BasePolicy,
    ) -> Result<(), ConfigValidationError> {
        let context = format!("base_policies[{}]", index);
        let template = Self::parse_template(&context, &policy.topic_template)?;
        Self::check_placeholders(&context, &template, &policy.expand_on)?;

        if let Some(range) = &policy.range {
            if range.min > range.max {
                return Err(ConfigValidationError::InvalidRange {
                    context,
                    min: range.min,
                    max: range.max,
                });
            }
            let successor_used = [&policy.static_expr, &policy.dynamic, &policy.filter]
                .into_iter()
                .any(|expr| ConditionTemplate::parse(expr).uses_successor());
            if successor_used && range.max == i64::MAX {
                return Err(ConfigValidationError::RangeOverflow { context, max: range.max });
            }
        }

        if let Some(weights) = &policy.action_probabilities {
            Self::validate_weights(&context, weights)?;
        }

        Ok(())
    }

    fn parse_template(context: &str, source: &str) -> Result<TopicTemplate, ConfigValidationError> {
        TopicTemplate::parse(source).map_err(|source| ConfigValidationError::InvalidTemplate {
            context: context.to_string(),
            source,
        })
    }

    fn check_placeholders(
        context: &str,
        template: &TopicTemplate,
        allowed: &[DimensionKind],
    ) -> Result<(), ConfigValidationError> {
        match template.placeholders().into_iter().find(|kind| !allowed.contains(kind)) {
            Some(kind) => Err(ConfigValidationError::UnresolvablePlaceholder {
                context: context.to_string(),
                placeholder: kind.placeholder().to_string(),
            }),
            None => Ok(()),
        }
    }

    fn validate_weights(context: &str, weights: &EffectWeights) -> Result<(), ConfigValidationError> {
        for (effect, value) in weights {
            if !value.is_finite() || *value < 0.0 {
                return Err(ConfigValidationError::InvalidWeight {
                    context: context.to_string(),
                    effect: *effect,
                    value: *value,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn empty_args() -> CliArgs {
        CliArgs {
            config: None,
            out: None,
            max_policies: None,
            seed: None,
            format: None,
            verbose: false,
            debug: false,
            dry_run: false,
            print_config: false,
        }
    }

    #[test]
    fn test_policy_config_default() {
        let config = PolicyConfig::default();

        assert_eq!(config.max_policies, 1000);
        assert_eq!(config.buildings(), ["bldg1".to_string(), "bldg2".to_string()]);
        assert_eq!(config.generalization.grouping_key, GroupingKey::Static);
        assert_eq!(config.generalization.distribution_strategy, DistributionStrategy::RoundRobin);
        assert_eq!(config.output_format, OutputFormat::Sql);
        assert!(config.seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_loading() {
        let mut temp_file = Builder::new().suffix(".json").tempfile().unwrap();
        let config_json = r#"{
            "users": [{"userid": 1, "clientid": "c1", "username": "alice", "password": "pw"}],
            "user_attributes": [[1, "role", "intern"]],
            "expansions": {"buildings": ["B1", "B2"], "floors": ["f1", "f2"]},
            "base_policies": [
                {"topic_template": "{b}/{fl}/#", "expand_on": ["b", "fl"], "action": "grant", "priority": 2}
            ],
            "max_policies": 10,
            "generalization": {"grouping_key": "hints", "distribution_strategy": "proportional"},
            "seed": 12345,
            "security_restriction_bonus": 50
        }"#;

        temp_file.write_all(config_json.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = PolicyConfig::from_file(temp_file.path()).unwrap();

        assert_eq!(config.users.len(), 1);
        assert_eq!(config.user_attributes[0].name, "role");
        assert_eq!(config.base_policies[0].effect, Effect::Grant);
        assert_eq!(config.max_policies, 10);
        assert_eq!(config.generalization.grouping_key, GroupingKey::Hints);
        assert_eq!(config.seed, Some(12345));
        assert_eq!(config.priority_bonus("security_restriction_bonus"), Some(50));
        // Roles were not given, so the sample roles remain
        assert!(config.roles.contains_key("intern"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_strategy_is_rejected_at_load() {
        let result = PolicyConfig::from_json_str(
            r#"{"generalization": {"grouping_key": "static", "distribution_strategy": "lottery"}}"#,
        );
        assert!(matches!(result, Err(ConfigError::JsonError(_))));

        let result = PolicyConfig::from_json_str(r#"{"generalization": {"grouping_key": "zone"}}"#);
        assert!(matches!(result, Err(ConfigError::JsonError(_))));
    }

    #[test]
    fn test_missing_file_and_unsupported_format() {
        assert!(matches!(
            PolicyConfig::from_file("/definitely/not/here.json"),
            Err(ConfigError::FileNotFound(_))
        ));

        let temp_file = Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(matches!(
            PolicyConfig::from_file(temp_file.path()),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_cli_overrides() {
        let args = CliArgs {
            max_policies: Some(25),
            seed: Some(54321),
            out: Some("out.sql".to_string()),
            format: Some(OutputFormat::Json),
            ..empty_args()
        };

        let config = PolicyConfig::from_cli_args(args).unwrap();

        assert_eq!(config.max_policies, 25);
        assert_eq!(config.seed, Some(54321));
        assert_eq!(config.output_path, "out.sql");
        assert_eq!(config.output_format, OutputFormat::Json);
    }

    #[test]
    fn test_cli_seed_overrides_file_seed() {
        let mut temp_file = Builder::new().suffix(".json").tempfile().unwrap();
        temp_file.write_all(br#"{"seed": 1, "max_policies": 50}"#).unwrap();
        temp_file.flush().unwrap();

        let args = CliArgs {
            config: Some(temp_file.path().display().to_string()),
            seed: Some(99),
            ..empty_args()
        };
        let config = PolicyConfig::from_cli_args(args).unwrap();
        assert_eq!(config.seed, Some(99));
        assert_eq!(config.max_policies, 50);
    }

    #[test]
    fn test_validation_max_policies() {
        let config = PolicyConfig { max_policies: 0, ..PolicyConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigValidationError::InvalidMaxPolicies(0))));
    }

    #[test]
    fn test_validation_missing_buildings() {
        let mut config = PolicyConfig::default();
        config.expansions.buildings = None;
        assert!(matches!(config.validate(), Err(ConfigValidationError::MissingDimension(_))));

        config.expansions.buildings = Some(Vec::new());
        assert!(matches!(config.validate(), Err(ConfigValidationError::MissingDimension(_))));
    }

    #[test]
    fn test_validation_malformed_template() {
        let mut config = PolicyConfig::default();
        config.base_policies[0].topic_template = "{b}/{fl/#".to_string();
        assert!(matches!(config.validate(), Err(ConfigValidationError::InvalidTemplate { .. })));

        let mut config = PolicyConfig::default();
        config.base_policies[0].topic_template = "{b}/{zone}/#".to_string();
        assert!(matches!(config.validate(), Err(ConfigValidationError::InvalidTemplate { .. })));
    }

    #[test]
    fn test_validation_unexpanded_placeholder() {
        let mut config = PolicyConfig::default();
        config.base_policies[0].expand_on = vec![DimensionKind::Building];
        match config.validate() {
            Err(ConfigValidationError::UnresolvablePlaceholder { placeholder, .. }) => {
                assert_eq!(placeholder, "fl");
            }
            other => panic!("Expected UnresolvablePlaceholder, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_restriction_room_placeholder() {
        let mut config = PolicyConfig::default();
        if let Some(role) = config.roles.get_mut("intern") {
            role.restrictions[0].topic_template = "{b}/{r}/#".to_string();
        }
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::UnresolvablePlaceholder { .. })
        ));
    }

    #[test]
    fn test_validation_weights_and_users() {
        let mut config = PolicyConfig::default();
        let mut weights = EffectWeights::new();
        weights.insert(Effect::Grant, -1.0);
        config.action_probabilities = Some(weights);
        assert!(matches!(config.validate(), Err(ConfigValidationError::InvalidWeight { .. })));

        let mut config = PolicyConfig::default();
        let duplicate = config.users[0].clone();
        config.users.push(duplicate);
        assert!(matches!(config.validate(), Err(ConfigValidationError::DuplicateUserId(_))));
    }

    #[test]
    fn test_validation_range_without_successor() {
        let mut config = PolicyConfig::default();
        config.base_policies[0].filter = "payload.level < {v_plus}".to_string();
        config.base_policies[0].range = Some(ValueRange { min: i64::MAX - 2, max: i64::MAX, step: 1 });
        match config.validate() {
            Err(ConfigValidationError::RangeOverflow { context, max }) => {
                assert_eq!(context, "base_policies[0]");
                assert_eq!(max, i64::MAX);
            }
            other => panic!("Expected RangeOverflow, got {:?}", other),
        }

        config.base_policies[0].filter = "payload.level == {v}".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_effect_in_probabilities_is_rejected() {
        let result = PolicyConfig::from_json_str(r#"{"action_probabilities": {"grant": 1.0, "maybe": 2.0}}"#);
        assert!(matches!(result, Err(ConfigError::JsonError(_))));
    }

    #[test]
    fn test_priority_bonus_lookup() {
        let mut config = PolicyConfig::default();
        config.named_values.insert("float_bonus".to_string(), serde_json::json!(7.0));
        config.named_values.insert("text_bonus".to_string(), serde_json::json!("lots"));
        config.named_values.insert("negative_bonus".to_string(), serde_json::json!(-3));

        assert_eq!(config.priority_bonus("security_restriction_bonus"), Some(50));
        assert_eq!(config.priority_bonus("float_bonus"), Some(7));
        assert_eq!(config.priority_bonus("text_bonus"), None);
        assert_eq!(config.priority_bonus("negative_bonus"), None);
        assert_eq!(config.priority_bonus("absent"), None);
    }

    #[test]
    fn test_value_range_values() {
        let range = ValueRange { min: 1, max: 7, step: 3 };
        assert_eq!(range.values().collect::<Vec<_>>(), vec![1, 4, 7]);

        let zero_step = ValueRange { min: 0, max: 2, step: 0 };
        assert_eq!(zero_step.values().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_floor_ref_deserialization() {
        let number: FloorRef = serde_json::from_str("3").unwrap();
        assert_eq!(number, FloorRef::Number(3));
        let label: FloorRef = serde_json::from_str("\"mezzanine\"").unwrap();
        assert_eq!(label, FloorRef::Label("mezzanine".to_string()));
    }

    #[test]
    fn test_policy_config_serialization() {
        let config = PolicyConfig::default();
        let json = config.print_json().unwrap();
        assert!(json.contains("\"security_restriction_bonus\": 50"));

        let reparsed = PolicyConfig::from_json_str(&json).unwrap();
        assert_eq!(reparsed.max_policies, config.max_policies);
        assert_eq!(reparsed.base_policies, config.base_policies);
        assert_eq!(reparsed.roles, config.roles);
        assert_eq!(reparsed.priority_bonus("security_restriction_bonus"), Some(50));
    }
}
