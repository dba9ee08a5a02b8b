//! Relay-style cursor pagination over a single table.
//!
//! Rows are ordered by a sort column with ties broken by `id`. Cursors store
//! the sort value and key of a row, so `after` and `before` are applied as
//! keyset conditions instead of offsets.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use juniper::GraphQLObject;
use postgres_types::ToSql;
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

use crate::{
    api::err::{ApiResult, invalid_input},
    db::{Transaction, util::FromDb},
    model::Key,
    prelude::*,
};


/// Maximum value for `first` and `last`.
pub(crate) const MAX_PAGE_SIZE: i32 = 100;

/// SQL type the sort column is compared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SortType {
    Text,
    Int,
}

/// The table to paginate and how to order it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RowSource {
    pub(crate) table: &'static str,
    pub(crate) sort_column: &'static str,
    pub(crate) sort_type: SortType,
}

impl RowSource {
    fn sort_expr(&self) -> String {
        let cast = match self.sort_type {
            SortType::Text => "text",
            SortType::Int => "bigint",
        };
        format!("{}::{}", self.sort_column, cast)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum SortValue {
    Text(String),
    Int(i64),
}

impl SortValue {
    fn sort_type(&self) -> SortType {
        match self {
            Self::Text(_) => SortType::Text,
            Self::Int(_) => SortType::Int,
        }
    }

    fn as_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            Self::Text(s) => s,
            Self::Int(i) => i,
        }
    }

    fn from_row(row: &Row, sort_type: SortType) -> Self {
        match sort_type {
            SortType::Text => Self::Text(row.get("sort_value")),
            SortType::Int => Self::Int(row.get("sort_value")),
        }
    }
}

/// Position of a row in the ordering, encoded as opaque string for clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Cursor {
    key: Key,
    value: SortValue,
}

impl Cursor {
    pub(crate) fn encode(&self) -> String {
        // Serializing plain data with derived impls cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub(crate) fn decode(s: &str) -> ApiResult<Self> {
        URL_SAFE_NO_PAD.decode(s)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or_else(|| invalid_input!(key = "cursor.invalid", "given cursor '{}' is invalid", s))
    }
}


/// The raw pagination arguments of a connection field.
#[derive(Debug, Clone, Default)]
pub(crate) struct PageArgs {
    pub(crate) first: Option<i32>,
    pub(crate) after: Option<String>,
    pub(crate) last: Option<i32>,
    pub(crate) before: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    /// `first` was given: take rows from the start.
    Forward,
    /// `last` was given: take rows from the end.
    Backward,
}

/// Validated pagination arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PageRequest {
    pub(crate) limit: i32,
    pub(crate) direction: Direction,
    pub(crate) after: Option<Cursor>,
    pub(crate) before: Option<Cursor>,
}

impl PageArgs {
    /// Checks the arguments of the connection field `field`, which lists rows
    /// sorted by a column of type `sort_type`.
    pub(crate) fn validate(&self, field: &str, sort_type: SortType) -> ApiResult<PageRequest> {
        let (limit, direction, arg) = match (self.first, self.last) {
            (Some(first), None) => (first, Direction::Forward, "first"),
            (None, Some(last)) => (last, Direction::Backward, "last"),
            (None, None) => return Err(invalid_input!(
                key = "pagination.missing-limit",
                "You must provide a `first` or `last` value to properly paginate the `{}` connection.",
                field,
            )),
            (Some(_), Some(_)) => return Err(invalid_input!(
                key = "pagination.both-limits",
                "Passing both `first` and `last` to paginate the `{}` connection is not supported.",
                field,
            )),
        };

        if limit <= 0 {
            return Err(invalid_input!(
                key = "pagination.invalid-limit",
                "argument `{}` of `{}` has to be > 0, but is {}",
                arg,
                field,
                limit,
            ));
        }
        if limit > MAX_PAGE_SIZE {
            return Err(invalid_input!(
                key = "pagination.invalid-limit",
                "Requesting {} records on the `{}` connection exceeds the `{}` limit of {} records.",
                limit,
                field,
                arg,
                MAX_PAGE_SIZE,
            ));
        }

        let decode = |cursor: &Option<String>| -> ApiResult<Option<Cursor>> {
            let Some(raw) = cursor else { return Ok(None) };
            let cursor = Cursor::decode(raw)?;
            if cursor.value.sort_type() != sort_type {
                return Err(invalid_input!(
                    key = "cursor.invalid",
                    "given cursor '{}' does not belong to the `{}` connection with this ordering",
                    raw,
                    field,
                ));
            }
            Ok(Some(cursor))
        };

        Ok(PageRequest {
            limit,
            direction,
            after: decode(&self.after)?,
            before: decode(&self.before)?,
        })
    }
}


#[derive(Debug, Clone, PartialEq, Eq, GraphQLObject)]
pub(crate) struct PageInfo {
    pub(crate) has_next_page: bool,
    pub(crate) has_previous_page: bool,
    pub(crate) start_cursor: Option<String>,
    pub(crate) end_cursor: Option<String>,
}

/// One loaded page: the rows in ascending order with their cursors.
#[derive(Debug)]
pub(crate) struct Page<T> {
    pub(crate) items: Vec<(T, Cursor)>,
    pub(crate) page_info: PageInfo,
    pub(crate) total_count: i32,
}

impl<T> Page<T> {
    pub(crate) fn map<U>(self, mut f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(|(item, cursor)| (f(item), cursor)).collect(),
            page_info: self.page_info,
            total_count: self.total_count,
        }
    }
}

/// Builds the query for one page and returns it with its parameters.
///
/// The inner query numbers all rows of the table (in ascending order) and
/// counts them. The outer query applies the cursor conditions and the limit.
/// For `last`, the outer order is reversed so that `limit` keeps the last
/// rows; the caller has to reverse the result.
fn page_query<'a>(
    source: &RowSource,
    columns: &str,
    req: &'a PageRequest,
) -> (String, Vec<&'a (dyn ToSql + Sync)>) {
    let mut args = Vec::new();
    let mut conditions = Vec::new();
    for (cursor, op) in [(&req.after, '>'), (&req.before, '<')] {
        if let Some(cursor) = cursor {
            args.push(cursor.value.as_sql());
            args.push(&cursor.key as &(dyn ToSql + Sync));
            conditions.push(format!("(sort_value, id) {op} (${}, ${})", args.len() - 1, args.len()));
        }
    }
    let filter = if conditions.is_empty() {
        String::new()
    } else {
        format!("where {}", conditions.join(" and "))
    };

    let order = match req.direction {
        Direction::Forward => "asc",
        Direction::Backward => "desc",
    };

    let query = format!(
        "select * from (\
            select {columns}, \
                {sort_expr} as sort_value, \
                row_number() over(order by {sort_expr}, id) as row_num, \
                count(*) over() as total_count \
            from {table}\
        ) as tmp \
        {filter} \
        order by sort_value {order}, id {order} \
        limit {limit}",
        sort_expr = source.sort_expr(),
        table = source.table,
        limit = req.limit,
    );

    (query, args)
}

/// Figures out whether there are rows before and after the loaded ones.
/// `first_num` and `last_num` are the 1-based positions of the first and
/// last loaded row.
fn page_flags(
    positions: Option<(i64, i64)>,
    total_count: i64,
    req: &PageRequest,
) -> (bool, bool) {
    match positions {
        Some((first_num, last_num)) => (last_num < total_count, first_num > 1),

        // Nothing loaded: either the table is empty or the cursors excluded
        // everything.
        None if total_count == 0 => (false, false),
        None => match (&req.after, &req.before) {
            (Some(_), None) => (false, true),
            (None, Some(_)) => (true, false),
            _ => (true, true),
        },
    }
}

/// Loads one page of `T` from `source`.
pub(crate) async fn load_page<T: FromDb>(
    db: &Transaction,
    source: &RowSource,
    req: &PageRequest,
) -> ApiResult<Page<T>> {
    let (query, args) = page_query(source, T::COLUMNS, req);

    let mut total_count = None;
    let mut positions: Option<(i64, i64)> = None;
    let mut items = db.query_raw(&query, args).await?
        .map_ok(|row| {
            total_count = Some(row.get::<_, i64>("total_count"));
            let row_num = row.get::<_, i64>("row_num");
            positions = Some(match positions {
                None => (row_num, row_num),
                Some((first, last)) => (first.min(row_num), last.max(row_num)),
            });

            let cursor = Cursor {
                key: row.get("id"),
                value: SortValue::from_row(&row, source.sort_type),
            };
            (T::from_row(&row), cursor)
        })
        .try_collect::<Vec<_>>()
        .await?;

    if req.direction == Direction::Backward {
        items.reverse();
    }

    // With no rows returned we don't learn the total count from the window
    // function, so we ask separately.
    let total_count = match total_count {
        Some(count) => count,
        None => {
            let query = format!("select count(*) from {}", source.table);
            db.query_one(&query, &[]).await?.get::<_, i64>(0)
        }
    };

    let (has_next_page, has_previous_page) = page_flags(positions, total_count, req);
    Ok(Page {
        page_info: PageInfo {
            has_next_page,
            has_previous_page,
            start_cursor: items.first().map(|(_, c)| c.encode()),
            end_cursor: items.last().map(|(_, c)| c.encode()),
        },
        items,
        total_count: i32::try_from(total_count).unwrap_or(i32::MAX),
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::err::ApiErrorKind;

    const SOURCE: RowSource = RowSource {
        table: "vouchers",
        sort_column: "code",
        sort_type: SortType::Text,
    };

    fn text_cursor(key: u64, value: &str) -> Cursor {
        Cursor { key: Key(key), value: SortValue::Text(value.into()) }
    }

    fn args(first: Option<i32>, last: Option<i32>) -> PageArgs {
        PageArgs { first, last, ..PageArgs::default() }
    }

    #[test]
    fn cursor_roundtrip() {
        let cursors = [
            text_cursor(3, "SUMMER-10"),
            text_cursor(0, ""),
            Cursor { key: Key(12), value: SortValue::Int(-4) },
        ];
        for cursor in cursors {
            let encoded = cursor.encode();
            assert!(encoded.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
            assert_eq!(Cursor::decode(&encoded).unwrap(), cursor);
        }
    }

    #[test]
    fn garbage_cursors_are_rejected() {
        let not_json = URL_SAFE_NO_PAD.encode("hello");
        let wrong_shape = URL_SAFE_NO_PAD.encode(r#"{"key": "x", "value": 1}"#);
        for raw in ["", "%%%", not_json.as_str(), wrong_shape.as_str()] {
            let err = Cursor::decode(raw).unwrap_err();
            assert_eq!(err.kind, ApiErrorKind::InvalidInput);
        }
    }

    #[test]
    fn requires_exactly_one_limit() {
        let err = args(None, None).validate("translations", SortType::Text).unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::InvalidInput);
        assert_eq!(
            err.msg,
            "You must provide a `first` or `last` value to properly paginate the \
                `translations` connection.",
        );

        let err = args(Some(1), Some(1)).validate("translations", SortType::Text).unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::InvalidInput);
    }

    #[test]
    fn limit_bounds() {
        for bad in [0, -1, MAX_PAGE_SIZE + 1] {
            assert!(args(Some(bad), None).validate("translations", SortType::Int).is_err());
            assert!(args(None, Some(bad)).validate("translations", SortType::Int).is_err());
        }

        let req = args(Some(MAX_PAGE_SIZE), None).validate("translations", SortType::Int).unwrap();
        assert_eq!(req.limit, MAX_PAGE_SIZE);
        assert_eq!(req.direction, Direction::Forward);

        let req = args(None, Some(1)).validate("translations", SortType::Int).unwrap();
        assert_eq!(req.direction, Direction::Backward);
    }

    #[test]
    fn cursor_must_match_sort_type() {
        let mut page_args = args(Some(10), None);
        page_args.after = Some(text_cursor(1, "a").encode());
        assert!(page_args.validate("translations", SortType::Text).is_ok());

        let err = page_args.validate("translations", SortType::Int).unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::InvalidInput);
    }

    #[test]
    fn query_without_cursors() {
        let req = args(Some(5), None).validate("translations", SortType::Text).unwrap();
        let (query, params) = page_query(&SOURCE, "id, name", &req);
        assert!(params.is_empty());
        assert!(query.contains("select id, name, code::text as sort_value"));
        assert!(query.contains("from vouchers"));
        assert!(!query.contains("where"));
        assert!(query.ends_with("order by sort_value asc, id asc limit 5"));
    }

    #[test]
    fn query_with_cursors() {
        let req = PageRequest {
            limit: 3,
            direction: Direction::Backward,
            after: Some(text_cursor(1, "A")),
            before: Some(text_cursor(9, "Z")),
        };
        let (query, params) = page_query(&SOURCE, "id, name", &req);
        assert_eq!(params.len(), 4);
        assert!(query.contains("where (sort_value, id) > ($1, $2) and (sort_value, id) < ($3, $4)"));
        assert!(query.ends_with("order by sort_value desc, id desc limit 3"));
    }

    #[test]
    fn flags() {
        let req = args(Some(2), None).validate("t", SortType::Text).unwrap();
        assert_eq!(page_flags(Some((1, 2)), 5, &req), (true, false));
        assert_eq!(page_flags(Some((4, 5)), 5, &req), (false, true));
        assert_eq!(page_flags(Some((1, 5)), 5, &req), (false, false));
        assert_eq!(page_flags(None, 0, &req), (false, false));

        let after = PageRequest { after: Some(text_cursor(5, "z")), ..req.clone() };
        assert_eq!(page_flags(None, 5, &after), (false, true));
        let before = PageRequest { before: Some(text_cursor(1, "a")), ..req };
        assert_eq!(page_flags(None, 5, &before), (true, false));
    }
}
