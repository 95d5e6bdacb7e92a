//! Translating a [`ListQuery`] into PostgreSQL statements.
//!
//! Column names come from the record type's whitelist, converted to
//! snake_case; filter values are always bound as parameters.

use sea_query::{
    Asterisk, Condition, Expr, ExprTrait, Iden, Order, PostgresQueryBuilder, Query,
    SelectStatement, Values,
};

use super::{ListQuery, Listable, SortOrder};
use crate::error::ValidationErrors;

struct Ident(String);

impl Iden for Ident {
    fn unquoted(&self) -> &str {
        &self.0
    }
}

/// The page query and its matching count query.
#[derive(Debug, Clone)]
pub struct ListStatements {
    pub select: (String, Values),
    pub count: (String, Values),
}

/// `dealDate` -> `deal_date`.
pub fn column_name(field: &str) -> String {
    let mut column = String::with_capacity(field.len() + 4);
    for ch in field.chars() {
        if ch.is_ascii_uppercase() {
            column.push('_');
            column.push(ch.to_ascii_lowercase());
        } else {
            column.push(ch);
        }
    }
    column
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Build the statements for one page of `T`.
///
/// `scope` holds fixed equality conditions (already snake_case) that narrow
/// the table to one book, such as a commodity and side for deals.
pub fn list_statements<T: Listable>(
    query: &ListQuery,
    scope: &[(&str, String)],
) -> Result<ListStatements, ValidationErrors> {
    query.validate_for::<T>()?;

    let mut condition = Condition::all();
    for (column, value) in scope {
        condition = condition.add(Expr::col(Ident(column.to_string())).eq(value.clone()));
    }
    for (field, needle) in &query.filters {
        let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
        let haystack = Expr::cust(format!("LOWER(CAST(\"{}\" AS TEXT))", column_name(field)));
        condition = condition.add(haystack.like(pattern.as_str()));
    }

    let mut select = Query::select();
    select
        .column(Asterisk)
        .from(Ident(T::TABLE.to_string()))
        .cond_where(condition.clone());
    apply_order(&mut select, query);
    select.limit(query.page_size).offset(query.offset());

    let mut count = Query::select();
    count
        .expr(Expr::cust("COUNT(*)"))
        .from(Ident(T::TABLE.to_string()))
        .cond_where(condition);

    Ok(ListStatements {
        select: select.build(PostgresQueryBuilder),
        count: count.build(PostgresQueryBuilder),
    })
}

fn apply_order(select: &mut SelectStatement, query: &ListQuery) {
    if let Some(sort_by) = &query.sort_by {
        let order = match query.sort_order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        };
        select.order_by(Ident(column_name(sort_by)), order);
    }
    select
        .order_by(Ident("created_at".to_string()), Order::Asc)
        .order_by(Ident("id".to_string()), Order::Asc);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Deal, DoEntry};

    #[test]
    fn test_column_name() {
        assert_eq!(column_name("dealDate"), "deal_date");
        assert_eq!(column_name("totalWithGst"), "total_with_gst");
        assert_eq!(column_name("rate"), "rate");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("10%_a\\b"), "10\\%\\_a\\\\b");
    }

    #[test]
    fn test_select_and_count() {
        let query = ListQuery::new(20)
            .page(3)
            .filter("committeeCenter", "Ram")
            .sort("date", SortOrder::Desc);
        let statements = list_statements::<DoEntry>(&query, &[]).unwrap();

        let (sql, values) = &statements.select;
        assert!(sql.contains("FROM \"do_entries\""));
        assert!(sql.contains("LOWER(CAST(\"committee_center\" AS TEXT)) LIKE"));
        assert!(sql.contains("ORDER BY \"date\" DESC"));
        assert!(sql.contains("LIMIT"));
        assert!(sql.contains("OFFSET"));
        assert!(values
            .iter()
            .any(|v| matches!(v, sea_query::Value::String(Some(s)) if s.as_str() == "%ram%")));

        let (count_sql, _) = &statements.count;
        assert!(count_sql.contains("COUNT(*)"));
        assert!(!count_sql.contains("LIMIT"));
    }

    #[test]
    fn test_scope_conditions() {
        let scope = [("commodity", "paddy".to_string()), ("side", "purchase".to_string())];
        let statements = list_statements::<Deal>(&ListQuery::default(), &scope).unwrap();
        let (sql, values) = &statements.select;
        assert!(sql.contains("\"commodity\" ="));
        assert!(sql.contains("\"side\" ="));
        let bound_strings = values
            .iter()
            .filter(|v| matches!(v, sea_query::Value::String(Some(_))))
            .count();
        assert_eq!(bound_strings, 2);
    }

    #[test]
    fn test_unknown_filter_rejected() {
        let query = ListQuery::default().filter("password", "x");
        assert!(list_statements::<DoEntry>(&query, &[]).is_err());
    }
}
