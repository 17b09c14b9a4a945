// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! SQL SELECT → document query translation.
//!
//! The supported grammar is the subset the catalog can answer:
//! `SELECT (col, ... | *) FROM table [WHERE expr]` with `=`, `!=`, `<`,
//! `<=`, `>`, `>=`, `LIKE`, `AND`, `OR`, `NOT` and parentheses. Anything
//! outside it is a `TranslationError`; translation itself is deterministic.

use serde_json::{json, Map, Value};
use sqlparser::ast::{
    BinaryOperator, Expr, SelectItem, SetExpr, Statement, UnaryOperator, Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::collections::BTreeMap;
use thiserror::Error;

use model::query::DocumentQuery;

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("query is not valid SQL: {0}")]
    Parse(#[from] sqlparser::parser::ParserError),

    #[error("expected a single SELECT statement")]
    NotASelect,

    #[error("unsupported SQL construct: {0}")]
    Unsupported(String),
}

fn unsupported(what: impl std::fmt::Display) -> TranslationError {
    TranslationError::Unsupported(what.to_string())
}

/// Translate one SELECT statement into a catalog filter and projection.
pub fn translate(sql: &str) -> Result<DocumentQuery, TranslationError> {
    let mut statements = Parser::parse_sql(&GenericDialect {}, sql)?;
    if statements.len() != 1 {
        return Err(TranslationError::NotASelect);
    }
    let Statement::Query(query) = statements.remove(0) else {
        return Err(TranslationError::NotASelect);
    };
    let SetExpr::Select(select) = *query.body else {
        return Err(TranslationError::NotASelect);
    };

    let projection = translate_projection(&select.projection)?;
    let filter = match &select.selection {
        Some(expr) => translate_expr(expr)?,
        None => Value::Object(Map::new()),
    };
    Ok(DocumentQuery::new(filter, projection))
}

fn translate_projection(
    items: &[SelectItem],
) -> Result<BTreeMap<String, i32>, TranslationError> {
    let mut projection = BTreeMap::new();
    for item in items {
        match item {
            // `SELECT *` is the catalog's default projection
            SelectItem::Wildcard(_) => return Ok(BTreeMap::new()),
            SelectItem::UnnamedExpr(expr) => {
                projection.insert(field_name(expr)?, 1);
            }
            other => return Err(unsupported(other)),
        }
    }
    Ok(projection)
}

fn translate_expr(expr: &Expr) -> Result<Value, TranslationError> {
    match expr {
        Expr::Nested(inner) => translate_expr(inner),
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr,
        } => Ok(json!({ "$nor": [translate_expr(expr)?] })),
        Expr::BinaryOp { left, op, right } => translate_binary(left, op, right),
        Expr::Like {
            negated,
            expr,
            pattern,
            ..
        } => {
            let leaf = like_leaf(expr, pattern)?;
            if *negated {
                Ok(json!({ "$nor": [leaf] }))
            } else {
                Ok(leaf)
            }
        }
        other => Err(unsupported(other)),
    }
}

fn translate_binary(
    left: &Expr,
    op: &BinaryOperator,
    right: &Expr,
) -> Result<Value, TranslationError> {
    match op {
        BinaryOperator::And => Ok(json!({
            "$and": [translate_expr(left)?, translate_expr(right)?]
        })),
        BinaryOperator::Or => Ok(json!({
            "$or": [translate_expr(left)?, translate_expr(right)?]
        })),
        BinaryOperator::Eq => {
            let mut leaf = Map::new();
            leaf.insert(field_name(left)?, literal(right)?);
            Ok(Value::Object(leaf))
        }
        BinaryOperator::NotEq => comparison_leaf(left, "$ne", right),
        BinaryOperator::Lt => comparison_leaf(left, "$lt", right),
        BinaryOperator::LtEq => comparison_leaf(left, "$lte", right),
        BinaryOperator::Gt => comparison_leaf(left, "$gt", right),
        BinaryOperator::GtEq => comparison_leaf(left, "$gte", right),
        other => Err(unsupported(other)),
    }
}

fn comparison_leaf(
    left: &Expr,
    op: &str,
    right: &Expr,
) -> Result<Value, TranslationError> {
    let mut leaf = Map::new();
    leaf.insert(field_name(left)?, json!({ op: literal(right)? }));
    Ok(Value::Object(leaf))
}

fn like_leaf(expr: &Expr, pattern: &Expr) -> Result<Value, TranslationError> {
    let raw = match literal(pattern)? {
        Value::String(s) => s,
        other => return Err(unsupported(format!("LIKE pattern {other}"))),
    };
    let mut leaf = Map::new();
    leaf.insert(field_name(expr)?, json!({ "$regex": like_to_regex(&raw) }));
    Ok(Value::Object(leaf))
}

/// `%` wildcards at either end are stripped; the remaining literal is
/// anchored wherever a wildcard was absent. A pattern with no wildcard
/// anchors at both ends.
fn like_to_regex(pattern: &str) -> String {
    let starts_open = pattern.starts_with('%');
    let ends_open = pattern.ends_with('%') && pattern.len() > 1;
    let core = pattern
        .trim_start_matches('%')
        .trim_end_matches('%');
    let mut regex = String::new();
    if !starts_open {
        regex.push('^');
    }
    regex.push_str(core);
    if !ends_open {
        regex.push('$');
    }
    regex
}

/// Dot-separated field name from an identifier expression.
fn field_name(expr: &Expr) -> Result<String, TranslationError> {
    match expr {
        Expr::Identifier(ident) => Ok(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => Ok(parts
            .iter()
            .map(|ident| ident.value.as_str())
            .collect::<Vec<_>>()
            .join(".")),
        other => Err(unsupported(other)),
    }
}

/// Literal leaf value. Integers stay integers; quoted strings lose their
/// quotes; bare words (which the parser reads as identifiers) become strings.
fn literal(expr: &Expr) -> Result<Value, TranslationError> {
    match expr {
        Expr::Value(SqlValue::Number(raw, _)) => match raw.parse::<i64>() {
            Ok(n) => Ok(json!(n)),
            Err(_) => raw
                .parse::<f64>()
                .map(|f| json!(f))
                .map_err(|_| unsupported(format!("numeric literal {raw}"))),
        },
        Expr::Value(SqlValue::SingleQuotedString(s))
        | Expr::Value(SqlValue::DoubleQuotedString(s)) => Ok(json!(s)),
        // bare words and double-quoted identifiers on the value side
        Expr::Identifier(ident) => Ok(json!(ident.value)),
        other => Err(unsupported(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter(sql: &str) -> Value {
        translate(sql).unwrap().filter
    }

    #[test]
    fn no_where_means_empty_filter() {
        let query = translate("SELECT * FROM collection").unwrap();
        assert_eq!(query.filter, json!({}));
        assert!(query.projection.is_empty());
    }

    #[test]
    fn columns_map_to_one() {
        let query = translate("SELECT a, b FROM t").unwrap();
        assert_eq!(
            query.projection,
            BTreeMap::from([("a".to_string(), 1), ("b".to_string(), 1)])
        );
    }

    #[test]
    fn dotted_columns_are_joined() {
        let query = translate("SELECT meta.size FROM t").unwrap();
        assert_eq!(
            query.projection,
            BTreeMap::from([("meta.size".to_string(), 1)])
        );
    }

    #[test]
    fn equality_leaf() {
        assert_eq!(filter("SELECT * FROM c WHERE id = '1'"), json!({"id": "1"}));
    }

    #[test]
    fn integers_stay_integers() {
        assert_eq!(filter("SELECT * FROM c WHERE size > 100"), json!({"size": {"$gt": 100}}));
    }

    #[test]
    fn bare_word_literal_is_a_string() {
        assert_eq!(filter("SELECT * FROM c WHERE kind = netcdf"), json!({"kind": "netcdf"}));
    }

    #[test]
    fn comparison_operators_map() {
        assert_eq!(filter("SELECT * FROM c WHERE a != 'x'"), json!({"a": {"$ne": "x"}}));
        assert_eq!(filter("SELECT * FROM c WHERE a < 3"), json!({"a": {"$lt": 3}}));
        assert_eq!(filter("SELECT * FROM c WHERE a <= 3"), json!({"a": {"$lte": 3}}));
        assert_eq!(filter("SELECT * FROM c WHERE a > 3"), json!({"a": {"$gt": 3}}));
        assert_eq!(filter("SELECT * FROM c WHERE a >= 3"), json!({"a": {"$gte": 3}}));
    }

    #[test]
    fn or_combines_two_ids() {
        assert_eq!(
            filter("SELECT * FROM c WHERE id = '1' OR id = '2'"),
            json!({"$or": [{"id": "1"}, {"id": "2"}]})
        );
    }

    #[test]
    fn like_prefix_suffix_and_contains() {
        assert_eq!(
            filter("SELECT * FROM c WHERE name LIKE 'cat%'"),
            json!({"name": {"$regex": "^cat"}})
        );
        assert_eq!(
            filter("SELECT * FROM c WHERE name LIKE '%cat'"),
            json!({"name": {"$regex": "cat$"}})
        );
        assert_eq!(
            filter("SELECT * FROM c WHERE name LIKE '%cat%'"),
            json!({"name": {"$regex": "cat"}})
        );
    }

    #[test]
    fn like_without_wildcard_anchors_both_ends() {
        assert_eq!(
            filter("SELECT * FROM c WHERE name LIKE 'cat'"),
            json!({"name": {"$regex": "^cat$"}})
        );
    }

    #[test]
    fn not_like_wraps_in_nor() {
        assert_eq!(
            filter("SELECT * FROM c WHERE name NOT LIKE 'cat%'"),
            json!({"$nor": [{"name": {"$regex": "^cat"}}]})
        );
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let lower = translate("select a from t where not x = 1 and y = 2 or z = 3").unwrap();
        let upper = translate("SELECT a FROM t WHERE NOT x = 1 AND y = 2 OR z = 3").unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn double_negation_contains_inner_once() {
        let tree = filter("SELECT * FROM c WHERE NOT (NOT a = 1)");
        assert_eq!(tree, json!({"$nor": [{"$nor": [{"a": 1}]}]}));
        let rendered = tree.to_string();
        assert_eq!(rendered.matches(r#""a":1"#).count(), 1);
    }

    #[test]
    fn complex_boolean_tree() {
        let query = translate(
            "SELECT a,b FROM t WHERE NOT (last='J' OR (first!='C' AND last!='L')) AND NOT active=1",
        )
        .unwrap();
        assert_eq!(
            query.filter,
            json!({"$and": [
                {"$nor": [{"$or": [
                    {"last": "J"},
                    {"$and": [
                        {"first": {"$ne": "C"}},
                        {"last": {"$ne": "L"}}
                    ]}
                ]}]},
                {"$nor": [{"active": 1}]}
            ]})
        );
        assert_eq!(
            query.projection,
            BTreeMap::from([("a".to_string(), 1), ("b".to_string(), 1)])
        );
    }

    #[test]
    fn translation_is_deterministic() {
        let sql = "SELECT a,b FROM t WHERE a = 1 OR b LIKE '%x%'";
        let first = serde_json::to_string(&translate(sql).unwrap()).unwrap();
        let second = serde_json::to_string(&translate(sql).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_non_select_statements() {
        let err = translate("DELETE FROM c WHERE id = 1").unwrap_err();
        assert!(matches!(err, TranslationError::NotASelect));
    }

    #[test]
    fn rejects_unsupported_constructs() {
        let err = translate("SELECT * FROM c WHERE a IN (1, 2)").unwrap_err();
        assert!(matches!(err, TranslationError::Unsupported(_)));
    }

    #[test]
    fn rejects_garbage() {
        let err = translate("SELECT WHERE FROM").unwrap_err();
        assert!(matches!(err, TranslationError::Parse(_)));
    }
}
