//! Compiles filter expressions into parameterized WHERE clauses.

use serde_json::Value;

use crate::api::middleware::AppError;
use crate::models::{FieldCondition, Operator, WhereFilter};
use crate::services::database::{Dialect, Placeholders};

/// A compiled WHERE clause body (without the `WHERE` keyword) and its
/// parameters in placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    pub clause: String,
    pub params: Vec<Value>,
}

impl CompiledFilter {
    pub fn is_empty(&self) -> bool {
        self.clause.is_empty()
    }

    /// ` WHERE <clause>` or an empty string
    pub fn where_sql(&self) -> String {
        if self.clause.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clause)
        }
    }
}

/// Compile a filter for a standalone statement; numbered placeholders start at 1.
pub fn compile(filter: &WhereFilter, dialect: Dialect) -> Result<CompiledFilter, AppError> {
    let mut placeholders = dialect.placeholders();
    compile_with(filter, dialect, &mut placeholders)
}

/// Compile a filter continuing an existing placeholder sequence, for
/// statements that bind parameters before the WHERE clause (UPDATE ... SET).
pub fn compile_with(
    filter: &WhereFilter,
    dialect: Dialect,
    placeholders: &mut Placeholders,
) -> Result<CompiledFilter, AppError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    for (field, condition) in filter.iter() {
        let column = dialect.quote_ident(field)?;

        match condition {
            FieldCondition::Literal(value) => {
                push_comparison(&mut clauses, &mut params, placeholders, &column, Operator::Eq, value);
            }
            FieldCondition::Operators(ops) => {
                for (key, value) in ops {
                    let op = Operator::parse(key)?;
                    if op.is_set_operator() {
                        push_set_membership(
                            &mut clauses,
                            &mut params,
                            placeholders,
                            dialect,
                            &column,
                            op,
                            value,
                        );
                    } else {
                        push_comparison(&mut clauses, &mut params, placeholders, &column, op, value);
                    }
                }
            }
        }
    }

    Ok(CompiledFilter {
        clause: clauses.join(" AND "),
        params,
    })
}

fn push_comparison(
    clauses: &mut Vec<String>,
    params: &mut Vec<Value>,
    placeholders: &mut Placeholders,
    column: &str,
    op: Operator,
    value: &Value,
) {
    clauses.push(format!("{} {} {}", column, op, placeholders.allocate()));
    params.push(value.clone());
}

/// `IN`/`NOT IN`. An empty or non-array operand binds nothing and turns
/// into a constant predicate: false for `IN`, true for `NOT IN`.
fn push_set_membership(
    clauses: &mut Vec<String>,
    params: &mut Vec<Value>,
    placeholders: &mut Placeholders,
    dialect: Dialect,
    column: &str,
    op: Operator,
    value: &Value,
) {
    match value {
        Value::Array(items) if !items.is_empty() => {
            let marks: Vec<String> = items.iter().map(|_| placeholders.allocate()).collect();
            clauses.push(format!("{} {} ({})", column, op, marks.join(", ")));
            params.extend(items.iter().cloned());
        }
        _ => {
            let constant = if op == Operator::In {
                dialect.false_literal()
            } else {
                dialect.true_literal()
            };
            clauses.push(constant.to_string());
        }
    }
}

/// ORDER BY / LIMIT / OFFSET tail of a SELECT, with a leading space when non-empty.
///
/// Order entries are `field`, `field ASC` or `field DESC`; the field is quoted.
pub fn build_query_tail(
    dialect: Dialect,
    order_by: Option<&[String]>,
    limit: Option<u64>,
    offset: Option<u64>,
) -> Result<String, AppError> {
    let mut sql = String::new();

    if let Some(orders) = order_by.filter(|o| !o.is_empty()) {
        let terms = orders
            .iter()
            .map(|order| order_term(dialect, order))
            .collect::<Result<Vec<_>, _>>()?;
        sql.push_str(&format!(" ORDER BY {}", terms.join(", ")));
    }

    match (limit, offset) {
        (Some(limit), _) => sql.push_str(&format!(" LIMIT {}", limit)),
        (None, Some(_)) => {
            if let Some(unbounded) = dialect.unbounded_limit() {
                sql.push(' ');
                sql.push_str(unbounded);
            }
        }
        (None, None) => {}
    }

    if let Some(offset) = offset {
        sql.push_str(&format!(" OFFSET {}", offset));
    }

    Ok(sql)
}

fn order_term(dialect: Dialect, order: &str) -> Result<String, AppError> {
    let parts: Vec<&str> = order.split_whitespace().collect();
    let (field, direction) = match parts.as_slice() {
        [field] => (*field, None),
        [field, direction] => (*field, Some(direction.to_uppercase())),
        _ => {
            return Err(AppError::Validation(format!(
                "Invalid orderBy entry: {:?}",
                order
            )))
        }
    };

    let column = dialect.quote_ident(field)?;
    match direction.as_deref() {
        None => Ok(column),
        Some(dir @ ("ASC" | "DESC")) => Ok(format!("{} {}", column, dir)),
        Some(other) => Err(AppError::Validation(format!(
            "Invalid sort direction {:?} in orderBy entry {:?}",
            other, order
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter(raw: &str) -> WhereFilter {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_empty_filter_compiles_to_empty_clause() {
        let compiled = compile(&WhereFilter::new(), Dialect::Sqlite).unwrap();
        assert_eq!(compiled.clause, "");
        assert!(compiled.params.is_empty());
        assert_eq!(compiled.where_sql(), "");
    }

    #[test]
    fn test_bare_literal_means_equality() {
        let compiled = compile(&filter(r#"{"name": "alice"}"#), Dialect::Sqlite).unwrap();
        assert_eq!(compiled.clause, "\"name\" = ?");
        assert_eq!(compiled.params, vec![json!("alice")]);
        assert_eq!(compiled.where_sql(), " WHERE \"name\" = ?");
    }

    #[test]
    fn test_all_scalar_operators() {
        let compiled = compile(
            &filter(
                r#"{"a": {"$eq": 1}, "b": {"$ne": 2}, "c": {"$gt": 3}, "d": {"$gte": 4},
                    "e": {"$lt": 5}, "f": {"$lte": 6}, "g": {"$like": "%x%"}}"#,
            ),
            Dialect::MySql,
        )
        .unwrap();

        assert_eq!(
            compiled.clause,
            "`a` = ? AND `b` != ? AND `c` > ? AND `d` >= ? AND `e` < ? AND `f` <= ? AND `g` LIKE ?"
        );
        assert_eq!(
            compiled.params,
            vec![json!(1), json!(2), json!(3), json!(4), json!(5), json!(6), json!("%x%")]
        );
    }

    #[test]
    fn test_in_and_nin_expand_one_placeholder_per_element() {
        let compiled = compile(
            &filter(r#"{"id": {"$in": [1, 2, 3]}, "tag": {"$nin": ["a", "b"]}}"#),
            Dialect::Sqlite,
        )
        .unwrap();

        assert_eq!(compiled.clause, "\"id\" IN (?, ?, ?) AND \"tag\" NOT IN (?, ?)");
        assert_eq!(compiled.params.len(), 5);
    }

    #[test]
    fn test_empty_in_is_false_without_params() {
        for dialect in [Dialect::Sqlite, Dialect::MySql] {
            let compiled = compile(&filter(r#"{"id": {"$in": []}}"#), dialect).unwrap();
            assert_eq!(compiled.clause, "0");
            assert!(compiled.params.is_empty());
        }

        let compiled = compile(&filter(r#"{"id": {"$in": []}}"#), Dialect::Postgres).unwrap();
        assert_eq!(compiled.clause, "FALSE");
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn test_empty_nin_is_true_without_params() {
        let compiled = compile(&filter(r#"{"id": {"$nin": []}}"#), Dialect::Sqlite).unwrap();
        assert_eq!(compiled.clause, "1");
        assert!(compiled.params.is_empty());

        let compiled = compile(&filter(r#"{"id": {"$nin": []}}"#), Dialect::Postgres).unwrap();
        assert_eq!(compiled.clause, "TRUE");
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn test_non_array_set_operand_binds_nothing() {
        let compiled = compile(&filter(r#"{"id": {"$in": 7}}"#), Dialect::Sqlite).unwrap();
        assert_eq!(compiled.clause, "0");
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let result = compile(&filter(r#"{"name": {"$regex": "^a"}}"#), Dialect::Sqlite);
        assert!(matches!(result, Err(AppError::UnsupportedOperator(op)) if op == "$regex"));
    }

    #[test]
    fn test_numbered_placeholders_have_no_gaps() {
        let compiled = compile(
            &filter(
                r#"{"a": 1, "b": {"$in": [2, 3, 4]}, "c": {"$nin": []}, "d": {"$gte": 5, "$lt": 9}}"#,
            ),
            Dialect::Postgres,
        )
        .unwrap();

        assert_eq!(
            compiled.clause,
            "\"a\" = $1 AND \"b\" IN ($2, $3, $4) AND TRUE AND \"d\" >= $5 AND \"d\" < $6"
        );
        assert_eq!(compiled.params.len(), 6);
    }

    #[test]
    fn test_placeholder_count_matches_params() {
        let compiled = compile(
            &filter(r#"{"x": {"$in": [1, 2]}, "y": {"$ne": null}, "z": [1, 2]}"#),
            Dialect::MySql,
        )
        .unwrap();
        assert_eq!(compiled.clause.matches('?').count(), compiled.params.len());
        // A bare array is still a single equality parameter
        assert_eq!(compiled.params[3], json!([1, 2]));
    }

    #[test]
    fn test_compile_with_continues_sequence() {
        let mut placeholders = Dialect::Postgres.placeholders();
        placeholders.allocate();
        placeholders.allocate();

        let compiled = compile_with(&filter(r#"{"id": 10}"#), Dialect::Postgres, &mut placeholders).unwrap();
        assert_eq!(compiled.clause, "\"id\" = $3");
    }

    #[test]
    fn test_query_tail() {
        let orders = vec!["title DESC".to_string(), "id".to_string()];
        let tail = build_query_tail(Dialect::Postgres, Some(&orders), Some(10), Some(30)).unwrap();
        assert_eq!(tail, " ORDER BY \"title\" DESC, \"id\" LIMIT 10 OFFSET 30");

        assert_eq!(build_query_tail(Dialect::Sqlite, None, None, None).unwrap(), "");
    }

    #[test]
    fn test_offset_without_limit() {
        assert_eq!(
            build_query_tail(Dialect::Sqlite, None, None, Some(5)).unwrap(),
            " LIMIT -1 OFFSET 5"
        );
        assert_eq!(
            build_query_tail(Dialect::Postgres, None, None, Some(5)).unwrap(),
            " OFFSET 5"
        );
    }

    #[test]
    fn test_invalid_order_entries() {
        let bad_direction = vec!["title SIDEWAYS".to_string()];
        assert!(matches!(
            build_query_tail(Dialect::MySql, Some(&bad_direction), None, None),
            Err(AppError::Validation(_))
        ));

        let injection = vec!["title; DROP TABLE posts".to_string()];
        assert!(build_query_tail(Dialect::MySql, Some(&injection), None, None).is_err());
    }
}
