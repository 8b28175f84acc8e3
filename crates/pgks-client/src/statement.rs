//! SQL statement builders and LIKE-pattern escaping.
//!
//! Identifiers are always double-quoted. Values never enter SQL text;
//! they are bound as `$n` parameters, numbered in emission order.

use pgks_driver::SqlValue;

use crate::error::{Error, Result};

/// A condition on one column in an `UPDATE ... WHERE` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `"column" = $n`.
    Eq(SqlValue),
    /// `"column" IN ($n, ...)`. Must be non-empty.
    In(Vec<SqlValue>),
}

impl From<SqlValue> for Predicate {
    fn from(value: SqlValue) -> Self {
        Self::Eq(value)
    }
}

/// Quote an identifier for interpolation into SQL text.
///
/// Accepts any non-empty name without embedded double quotes or NUL
/// bytes. Everything else is rejected rather than escaped: table and
/// column names come from code, not users, and a quote in one is far
/// more likely an injection attempt than intent.
pub fn quote_ident(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(Error::InvalidIdentifier("empty identifier".to_string()));
    }
    if name.contains('"') || name.contains('\0') {
        return Err(Error::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}

/// Build an `INSERT` statement with bound parameters.
///
/// An empty column list emits `DEFAULT VALUES`. With `returning`, the
/// statement appends `RETURNING "column"` so the caller can read a
/// generated value back.
pub fn insert_statement(
    table: &str,
    columns: &[(&str, SqlValue)],
    returning: Option<&str>,
) -> Result<(String, Vec<SqlValue>)> {
    let mut sql = format!("INSERT INTO {} ", quote_ident(table)?);
    let mut params = Vec::with_capacity(columns.len());

    if columns.is_empty() {
        sql.push_str("DEFAULT VALUES");
    } else {
        sql.push('(');
        for (i, (name, _)) in columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&quote_ident(name)?);
        }
        sql.push_str(") VALUES (");
        for (i, (_, value)) in columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&format!("${}", i + 1));
            params.push(value.clone());
        }
        sql.push(')');
    }

    if let Some(column) = returning {
        sql.push_str(" RETURNING ");
        sql.push_str(&quote_ident(column)?);
    }

    Ok((sql, params))
}

/// Build an `UPDATE` statement with bound parameters.
///
/// `set` parameters are numbered before `where` parameters. The `where`
/// clause is mandatory; an unconditional update is almost always a bug,
/// so an empty condition list is rejected.
pub fn update_statement(
    table: &str,
    set: &[(&str, SqlValue)],
    conditions: &[(&str, Predicate)],
) -> Result<(String, Vec<SqlValue>)> {
    if set.is_empty() {
        return Err(Error::Query("update with no columns to set".to_string()));
    }
    if conditions.is_empty() {
        return Err(Error::Query("update with no where conditions".to_string()));
    }

    let mut sql = format!("UPDATE {} SET ", quote_ident(table)?);
    let mut params = Vec::with_capacity(set.len() + conditions.len());
    let mut placeholder = 0usize;

    for (i, (name, value)) in set.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        placeholder += 1;
        sql.push_str(&format!("{} = ${placeholder}", quote_ident(name)?));
        params.push(value.clone());
    }

    sql.push_str(" WHERE ");
    for (i, (name, predicate)) in conditions.iter().enumerate() {
        if i > 0 {
            sql.push_str(" AND ");
        }
        match predicate {
            Predicate::Eq(value) => {
                placeholder += 1;
                sql.push_str(&format!("{} = ${placeholder}", quote_ident(name)?));
                params.push(value.clone());
            }
            Predicate::In(values) => {
                if values.is_empty() {
                    return Err(Error::Query(format!(
                        "empty IN set for column {name}"
                    )));
                }
                sql.push_str(&quote_ident(name)?);
                sql.push_str(" IN (");
                for (j, value) in values.iter().enumerate() {
                    if j > 0 {
                        sql.push_str(", ");
                    }
                    placeholder += 1;
                    sql.push_str(&format!("${placeholder}"));
                    params.push(value.clone());
                }
                sql.push(')');
            }
        }
    }

    Ok((sql, params))
}

/// Escape a fragment for use inside a `LIKE` pattern and wrap it in
/// `%` wildcards.
///
/// `\`, `%` and `_` in the fragment are backslash-escaped so they match
/// literally.
#[must_use]
pub fn escape_like(fragment: &str) -> String {
    escape_like_with(fragment, "%", "%")
}

/// Escape a fragment for `LIKE` with explicit surrounding pattern text.
///
/// `prefix` and `postfix` are emitted verbatim, so wildcards placed
/// there keep their meaning.
#[must_use]
pub fn escape_like_with(fragment: &str, prefix: &str, postfix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + fragment.len() + postfix.len());
    escaped.push_str(prefix);
    for c in fragment.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push_str(postfix);
    escaped
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users").unwrap(), "\"users\"");
        assert!(matches!(
            quote_ident(""),
            Err(Error::InvalidIdentifier(_))
        ));
        assert!(matches!(
            quote_ident("x\" OR 1=1 --"),
            Err(Error::InvalidIdentifier(_))
        ));
        assert!(matches!(
            quote_ident("x\0"),
            Err(Error::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_insert_statement() {
        let (sql, params) = insert_statement(
            "item",
            &[("title", "a".into()), ("parent_id", 7i64.into())],
            Some("id"),
        )
        .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"item\" (\"title\", \"parent_id\") VALUES ($1, $2) RETURNING \"id\""
        );
        assert_eq!(params, vec![SqlValue::Text("a".into()), SqlValue::Int(7)]);
    }

    #[test]
    fn test_insert_default_values() {
        let (sql, params) = insert_statement("item", &[], None).unwrap();
        assert_eq!(sql, "INSERT INTO \"item\" DEFAULT VALUES");
        assert!(params.is_empty());
    }

    #[test]
    fn test_update_statement_numbers_set_before_where() {
        let (sql, params) = update_statement(
            "item",
            &[("parent_id", 42i64.into())],
            &[("id", Predicate::Eq(1i64.into()))],
        )
        .unwrap();
        assert_eq!(
            sql,
            "UPDATE \"item\" SET \"parent_id\" = $1 WHERE \"id\" = $2"
        );
        assert_eq!(params, vec![SqlValue::Int(42), SqlValue::Int(1)]);
    }

    #[test]
    fn test_update_statement_in_predicate() {
        let (sql, params) = update_statement(
            "item",
            &[("title", "x".into())],
            &[
                ("id", Predicate::In(vec![1i64.into(), 2i64.into()])),
                ("parent_id", Predicate::Eq(SqlValue::Null)),
            ],
        )
        .unwrap();
        assert_eq!(
            sql,
            "UPDATE \"item\" SET \"title\" = $1 WHERE \"id\" IN ($2, $3) AND \"parent_id\" = $4"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_update_statement_rejects_degenerate_input() {
        assert!(matches!(
            update_statement("item", &[], &[("id", Predicate::Eq(1i64.into()))]),
            Err(Error::Query(_))
        ));
        assert!(matches!(
            update_statement("item", &[("title", "x".into())], &[]),
            Err(Error::Query(_))
        ));
        assert!(matches!(
            update_statement(
                "item",
                &[("title", "x".into())],
                &[("id", Predicate::In(Vec::new()))]
            ),
            Err(Error::Query(_))
        ));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a%b_c\\d"), "%a\\%b\\_c\\\\d%");
        assert_eq!(
            escape_like("\\? item_percent = 42%"),
            "%\\\\? item\\_percent = 42\\%%"
        );
        assert_eq!(escape_like_with("a_b", "", "%"), "a\\_b%");
    }

    proptest! {
        // Stripping the wildcards and unescaping must give the original
        // fragment back for any input.
        #[test]
        fn test_escape_like_reversible(fragment in ".*") {
            let escaped = escape_like(&fragment);
            prop_assert!(escaped.starts_with('%') && escaped.ends_with('%'));

            let inner = &escaped[1..escaped.len() - 1];
            let mut unescaped = String::new();
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    unescaped.push(chars.next().unwrap());
                } else {
                    prop_assert!(!matches!(c, '%' | '_'));
                    unescaped.push(c);
                }
            }
            prop_assert_eq!(unescaped, fragment);
        }
    }
}
