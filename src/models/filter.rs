use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::Value;
use std::fmt;

use crate::api::middleware::AppError;

/// Comparison operators accepted in a filter expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
    Nin,
}

impl Operator {
    /// Resolve an operator key. Both the wire form (`$gte`) and the bare form (`gte`) are accepted.
    pub fn parse(key: &str) -> Result<Self, AppError> {
        match key.strip_prefix('$').unwrap_or(key) {
            "eq" => Ok(Operator::Eq),
            "ne" => Ok(Operator::Ne),
            "gt" => Ok(Operator::Gt),
            "gte" => Ok(Operator::Gte),
            "lt" => Ok(Operator::Lt),
            "lte" => Ok(Operator::Lte),
            "like" => Ok(Operator::Like),
            "in" => Ok(Operator::In),
            "nin" => Ok(Operator::Nin),
            _ => Err(AppError::UnsupportedOperator(key.to_string())),
        }
    }

    /// Wire key of the operator
    pub fn key(&self) -> &'static str {
        match self {
            Operator::Eq => "$eq",
            Operator::Ne => "$ne",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::Like => "$like",
            Operator::In => "$in",
            Operator::Nin => "$nin",
        }
    }

    pub fn is_set_operator(&self) -> bool {
        matches!(self, Operator::In | Operator::Nin)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Eq => write!(f, "="),
            Operator::Ne => write!(f, "!="),
            Operator::Gt => write!(f, ">"),
            Operator::Gte => write!(f, ">="),
            Operator::Lt => write!(f, "<"),
            Operator::Lte => write!(f, "<="),
            Operator::Like => write!(f, "LIKE"),
            Operator::In => write!(f, "IN"),
            Operator::Nin => write!(f, "NOT IN"),
        }
    }
}

/// Condition attached to one field of a filter
#[derive(Debug, Clone, PartialEq)]
pub enum FieldCondition {
    /// A bare scalar or array, compared for equality
    Literal(Value),
    /// Operator keys with their operands, in document order.
    /// Keys stay raw until compilation so unknown operators surface there.
    Operators(Vec<(String, Value)>),
}

/// Filter expression: field name to condition, in insertion order.
///
/// Distinct fields are combined with `AND`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereFilter {
    conditions: Vec<(String, FieldCondition)>,
}

impl WhereFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `field = value`
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, FieldCondition::Literal(value.into()))
    }

    /// Add an operator condition on a field. Repeated calls for the same
    /// field accumulate operators on it.
    pub fn op(mut self, field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        let field = field.into();
        let entry = (op.key().to_string(), value.into());
        if let Some((_, FieldCondition::Operators(ops))) =
            self.conditions.iter_mut().find(|(name, _)| *name == field)
        {
            ops.push(entry);
            return self;
        }
        self.with(field, FieldCondition::Operators(vec![entry]))
    }

    /// Set a condition, replacing any existing condition on the same field
    pub fn with(mut self, field: impl Into<String>, condition: FieldCondition) -> Self {
        let field = field.into();
        match self.conditions.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => *existing = condition,
            None => self.conditions.push((field, condition)),
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldCondition)> {
        self.conditions.iter().map(|(name, cond)| (name.as_str(), cond))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }
}

impl<'de> Deserialize<'de> for FieldCondition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ConditionVisitor;

        impl<'de> Visitor<'de> for ConditionVisitor {
            type Value = FieldCondition;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a literal value or an object of operators")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(FieldCondition::Literal(Value::Bool(v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(FieldCondition::Literal(Value::from(v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(FieldCondition::Literal(Value::from(v)))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(FieldCondition::Literal(Value::from(v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(FieldCondition::Literal(Value::String(v.to_string())))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(FieldCondition::Literal(Value::String(v)))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(FieldCondition::Literal(Value::Null))
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(FieldCondition::Literal(Value::Null))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element::<Value>()? {
                    items.push(item);
                }
                Ok(FieldCondition::Literal(Value::Array(items)))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut ops = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    ops.push((key, value));
                }
                Ok(FieldCondition::Operators(ops))
            }
        }

        deserializer.deserialize_any(ConditionVisitor)
    }
}

impl<'de> Deserialize<'de> for WhereFilter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FilterVisitor;

        impl<'de> Visitor<'de> for FilterVisitor {
            type Value = WhereFilter;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping field names to conditions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut filter = WhereFilter::new();
                while let Some((field, condition)) = map.next_entry::<String, FieldCondition>()? {
                    filter = filter.with(field, condition);
                }
                Ok(filter)
            }
        }

        deserializer.deserialize_map(FilterVisitor)
    }
}
