//! Eligibility predicate model.
//!
//! A predicate is one atomic criterion of a trial: a resource type, an
//! identifier (free-text field and/or terminology code), an operator and,
//! for everything except `present`/`absent`, a value. Predicates are
//! validated once at construction and immutable afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Predicate construction errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredicateError {
    #[error("Predicate must have either a field or a code")]
    MissingIdentifier,

    #[error("Operator '{0}' requires a value")]
    MissingValue(Operator),

    #[error("Predicate weight must be at least 1")]
    ZeroWeight,

    #[error("Range operator requires [low, high] numbers with low <= high")]
    InvalidRange,

    #[error("Operator '{0}' requires a list value")]
    InvalidSetValue(Operator),
}

pub type PredicateResult<T> = Result<T, PredicateError>;

/// Kind of clinical fact a predicate is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Patient,
    Condition,
    Observation,
    Medication,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Patient => "Patient",
            ResourceType::Condition => "Condition",
            ResourceType::Observation => "Observation",
            ResourceType::Medication => "Medication",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicate operator. Serialized with the symbols used in trial criteria
/// documents (`"=="`, `">="`, `"not_in"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "present")]
    Present,
    #[serde(rename = "absent")]
    Absent,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not_in")]
    NotIn,
    #[serde(rename = "range")]
    Range,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Present => "present",
            Operator::Absent => "absent",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Range => "range",
        }
    }

    /// Every operator except `present`/`absent` compares against a value.
    pub fn requires_value(&self) -> bool {
        !matches!(self, Operator::Present | Operator::Absent)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value a predicate compares against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredicateValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<PredicateValue>),
}

impl PredicateValue {
    /// Numeric view of the value. Numeric text ("18", " 2.5 ") is parsed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PredicateValue::Number(n) => Some(*n),
            PredicateValue::Text(s) => s.trim().parse().ok(),
            PredicateValue::Bool(_) | PredicateValue::List(_) => None,
        }
    }

    /// Text view of a scalar value.
    pub fn as_text(&self) -> Option<String> {
        match self {
            PredicateValue::Text(s) => Some(s.clone()),
            PredicateValue::Bool(b) => Some(b.to_string()),
            PredicateValue::Number(n) => Some(n.to_string()),
            PredicateValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PredicateValue]> {
        match self {
            PredicateValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// `[low, high]` view used by the `range` operator.
    pub fn as_range(&self) -> Option<(f64, f64)> {
        match self.as_list()? {
            [low, high] => Some((low.as_number()?, high.as_number()?)),
            _ => None,
        }
    }
}

impl fmt::Display for PredicateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateValue::Bool(b) => write!(f, "{}", b),
            PredicateValue::Number(n) => write!(f, "{}", n),
            PredicateValue::Text(s) => f.write_str(s),
            PredicateValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<f64> for PredicateValue {
    fn from(n: f64) -> Self {
        PredicateValue::Number(n)
    }
}

impl From<i32> for PredicateValue {
    fn from(n: i32) -> Self {
        PredicateValue::Number(f64::from(n))
    }
}

impl From<bool> for PredicateValue {
    fn from(b: bool) -> Self {
        PredicateValue::Bool(b)
    }
}

impl From<&str> for PredicateValue {
    fn from(s: &str) -> Self {
        PredicateValue::Text(s.to_string())
    }
}

impl From<String> for PredicateValue {
    fn from(s: String) -> Self {
        PredicateValue::Text(s)
    }
}

impl<T: Into<PredicateValue>> From<Vec<T>> for PredicateValue {
    fn from(items: Vec<T>) -> Self {
        PredicateValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// A validated, immutable eligibility criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPredicate")]
pub struct Predicate {
    #[serde(rename = "type")]
    resource_type: ResourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(rename = "op")]
    operator: Operator,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<PredicateValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    weight: u32,
    inclusion: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl Predicate {
    /// Start building a predicate.
    pub fn builder(resource_type: ResourceType, operator: Operator) -> PredicateBuilder {
        PredicateBuilder::new(resource_type, operator)
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> Option<&PredicateValue> {
        self.value.as_ref()
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn is_inclusion(&self) -> bool {
        self.inclusion
    }

    pub fn is_exclusion(&self) -> bool {
        !self.inclusion
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Field if present, otherwise the code.
    pub fn label(&self) -> &str {
        self.field
            .as_deref()
            .or(self.code.as_deref())
            .unwrap_or_default()
    }

    /// `Type.label`, as used in match reasons.
    pub fn describe(&self) -> String {
        format!("{}.{}", self.resource_type, self.label())
    }
}

/// Builder for [`Predicate`]. `build()` runs all construction checks.
#[derive(Debug, Clone)]
pub struct PredicateBuilder {
    resource_type: ResourceType,
    operator: Operator,
    field: Option<String>,
    code: Option<String>,
    value: Option<PredicateValue>,
    unit: Option<String>,
    weight: u32,
    inclusion: bool,
    reason: Option<String>,
}

impl PredicateBuilder {
    fn new(resource_type: ResourceType, operator: Operator) -> Self {
        Self {
            resource_type,
            operator,
            field: None,
            code: None,
            value: None,
            unit: None,
            weight: 1,
            inclusion: true,
            reason: None,
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn value(mut self, value: impl Into<PredicateValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Mark as an exclusion criterion.
    pub fn exclusion(mut self) -> Self {
        self.inclusion = false;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Validate and build the predicate.
    pub fn build(self) -> PredicateResult<Predicate> {
        let field = non_blank(self.field);
        let code = non_blank(self.code);

        if field.is_none() && code.is_none() {
            return Err(PredicateError::MissingIdentifier);
        }

        if self.operator.requires_value() && self.value.is_none() {
            return Err(PredicateError::MissingValue(self.operator));
        }

        if self.weight == 0 {
            return Err(PredicateError::ZeroWeight);
        }

        if let Some(value) = &self.value {
            match self.operator {
                Operator::Range => match value.as_range() {
                    Some((low, high)) if low <= high => {}
                    _ => return Err(PredicateError::InvalidRange),
                },
                Operator::In | Operator::NotIn if value.as_list().is_none() => {
                    return Err(PredicateError::InvalidSetValue(self.operator));
                }
                _ => {}
            }
        }

        Ok(Predicate {
            resource_type: self.resource_type,
            field,
            code,
            operator: self.operator,
            value: self.value,
            unit: non_blank(self.unit),
            weight: self.weight,
            inclusion: self.inclusion,
            reason: non_blank(self.reason),
        })
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

/// Wire shape of a predicate before validation.
#[derive(Debug, Deserialize)]
struct RawPredicate {
    #[serde(rename = "type")]
    resource_type: ResourceType,
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(rename = "op")]
    operator: Operator,
    #[serde(default)]
    value: Option<PredicateValue>,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default = "default_weight")]
    weight: u32,
    #[serde(default = "default_inclusion")]
    inclusion: bool,
    #[serde(default)]
    reason: Option<String>,
}

fn default_weight() -> u32 {
    1
}

fn default_inclusion() -> bool {
    true
}

impl TryFrom<RawPredicate> for Predicate {
    type Error = PredicateError;

    fn try_from(raw: RawPredicate) -> PredicateResult<Self> {
        PredicateBuilder {
            resource_type: raw.resource_type,
            operator: raw.operator,
            field: raw.field,
            code: raw.code,
            value: raw.value,
            unit: raw.unit,
            weight: raw.weight,
            inclusion: raw.inclusion,
            reason: raw.reason,
        }
        .build()
    }
}
