//! Index Configuration
//!
//! Rules binding structural paths to indexed fields, grouped per collection:
//! - `rule` / `rule_set`: the declarative model
//! - `loader`: reads a collection configuration document
//! - `registry`: published rule-set snapshots per collection
//! - `resolver`: picks the rule for a query-side path

pub mod loader;
pub mod registry;
pub mod resolver;
pub mod rule;
pub mod rule_set;

pub use loader::{load_rule_set, LoadReport};
pub use registry::{is_system_collection, CollectionRegistry, SYSTEM_COLLECTION};
pub use resolver::{ConditionProbe, Resolution, RuleResolver};
pub use rule::{Condition, FieldDef, FieldType, IndexRule, Operator, TextOptions, WhitespaceTreatment};
pub use rule_set::IndexRuleSet;
