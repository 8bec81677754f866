//! Query helpers shared by the listing endpoints.

use sea_orm::sea_query::{Condition, Expr, Func, IntoColumnRef, LikeExpr, SimpleExpr};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QuerySelect,
};
use std::collections::HashMap;

const LIKE_ESCAPE: char = '\\';

/// Case-insensitive substring match on any of `columns`. `%` and `_` in
/// `term` match themselves.
pub fn search_any<C>(term: &str, columns: &[C]) -> Condition
where
    C: IntoColumnRef + Copy,
{
    let pattern = format!("%{}%", escape_like(&term.trim().to_lowercase()));
    columns.iter().fold(Condition::any(), |cond, col| {
        cond.add(lower(*col).like(LikeExpr::new(pattern.clone()).escape(LIKE_ESCAPE)))
    })
}

/// Escape LIKE wildcards and the escape character itself.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

fn lower<C: IntoColumnRef>(col: C) -> Expr {
    Expr::expr(SimpleExpr::from(Func::lower(Expr::col(col))))
}

/// Row counts of `E` grouped by `column`, restricted to `ids`.
/// Ids with no rows are absent from the map.
pub async fn count_by<E>(
    db: &DatabaseConnection,
    column: E::Column,
    ids: &[i32],
) -> Result<HashMap<i32, u64>, DbErr>
where
    E: EntityTrait,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(Option<i32>, i64)> = E::find()
        .select_only()
        .column(column)
        .column_as(Expr::col(column).count(), "count")
        .filter(column.is_in(ids.iter().copied()))
        .group_by(column)
        .into_tuple()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, count)| id.map(|id| (id, count as u64)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("cs101"), "cs101");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("intro_to"), "intro\\_to");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
