use crate::errors::ServiceError;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, FromQueryResult, Iterable, Order,
    PaginatorTrait, PrimaryKeyToColumn, QueryFilter, QueryOrder, QuerySelect, Select,
};
use serde::Serialize;
use utoipa::ToSchema;

/// A whitelisted, sortable column of one listing.
///
/// `FIELDS` is the only path from request text to an ORDER BY column.
pub trait SortField: Copy + 'static {
    type Entity: EntityTrait;

    const FIELDS: &'static [(&'static str, Self)];

    fn column(self) -> <Self::Entity as EntityTrait>::Column;

    fn parse(token: &str) -> Result<Self, ServiceError> {
        let wanted = token.trim().to_ascii_lowercase();
        Self::FIELDS
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, field)| *field)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Invalid sort field; allowed: {}",
                    Self::allowed()
                ))
            })
    }

    /// Absent or blank means "use the listing's default order".
    fn parse_optional(token: Option<&str>) -> Result<Option<Self>, ServiceError> {
        match token.map(str::trim) {
            None | Some("") => Ok(None),
            Some(token) => Self::parse(token).map(Some),
        }
    }

    fn allowed() -> String {
        Self::FIELDS
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse(token: &str) -> Result<Self, ServiceError> {
        match token.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(ServiceError::ValidationError(
                "Invalid sort direction; allowed: asc, desc".to_string(),
            )),
        }
    }

    pub fn parse_or(token: Option<&str>, default: Self) -> Result<Self, ServiceError> {
        match token.map(str::trim) {
            None | Some("") => Ok(default),
            Some(token) => Self::parse(token),
        }
    }

    pub fn order(self) -> Order {
        match self {
            Self::Asc => Order::Asc,
            Self::Desc => Order::Desc,
        }
    }
}

/// Page window, always with `page >= 1` and `1 <= page_size <= max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
}

impl Pagination {
    /// Coerces raw query-string values; unparseable or non-positive values
    /// fall back to the defaults instead of failing the request.
    pub fn from_raw(
        page: Option<&str>,
        page_size: Option<&str>,
        default_page_size: u64,
        max_page_size: u64,
    ) -> Self {
        let max_page_size = max_page_size.max(1);
        let default_page_size = default_page_size.clamp(1, max_page_size);

        let page = positive(page).unwrap_or(1);
        let page_size = positive(page_size)
            .unwrap_or(default_page_size)
            .min(max_page_size);

        Self { page, page_size }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        if total == 0 {
            0
        } else {
            (total + self.page_size - 1) / self.page_size
        }
    }

    pub fn meta(&self, total: u64) -> PaginationMeta {
        PaginationMeta {
            page: self.page,
            limit: self.page_size,
            total,
            total_pages: self.total_pages(total),
        }
    }
}

fn positive(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|value| *value >= 1)
        .map(|value| value as u64)
}

/// `paginacion` block of every listing response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginationMeta {
    #[serde(rename = "pagina")]
    pub page: u64,
    #[serde(rename = "limite")]
    pub limit: u64,
    pub total: u64,
    #[serde(rename = "totalPaginas")]
    pub total_pages: u64,
}

/// Escapes LIKE wildcards so user text only ever matches literally.
pub fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn lower<C: ColumnTrait>(column: C) -> Expr {
    Expr::expr(Func::lower(Expr::col((column.entity_name(), column))))
}

/// `lower(column) LIKE '%term%'` with the term bound and escaped
pub fn contains_ci<C: ColumnTrait>(column: C, term: &str) -> SimpleExpr {
    let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
    lower(column).like(LikeExpr::new(pattern).escape('\\'))
}

/// Relevance of a row for a search term: exact key match 0, key or name
/// substring 1, anything else 2.
pub fn search_rank<C: ColumnTrait>(key: C, name: C, term: &str) -> SimpleExpr {
    let term = term.trim().to_lowercase();
    Expr::case(Condition::all().add(lower(key).eq(term.clone())), Expr::cust("0"))
        .case(
            Condition::any()
                .add(contains_ci(key, &term))
                .add(contains_ci(name, &term)),
            Expr::cust("1"),
        )
        .finally(Expr::cust("2"))
        .into()
}

/// Optional filters ANDed into one condition; every value is bound.
#[derive(Debug, Clone)]
pub struct FilterSet {
    condition: Condition,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterSet {
    pub fn new() -> Self {
        Self {
            condition: Condition::all(),
        }
    }

    /// Case-insensitive substring match on any of `columns`
    pub fn search<C: ColumnTrait>(mut self, columns: &[C], term: Option<&str>) -> Self {
        if let Some(term) = non_blank(term) {
            let any = columns
                .iter()
                .fold(Condition::any(), |acc, column| acc.add(contains_ci(*column, term)));
            self.condition = self.condition.add(any);
        }
        self
    }

    pub fn contains<C: ColumnTrait>(self, column: C, term: Option<&str>) -> Self {
        self.search(&[column], term)
    }

    pub fn eq<C, V>(mut self, column: C, value: Option<V>) -> Self
    where
        C: ColumnTrait,
        V: Into<sea_orm::Value>,
    {
        if let Some(value) = value {
            self.condition = self.condition.add(column.eq(value));
        }
        self
    }

    pub fn lte<C, V>(mut self, column: C, value: Option<V>) -> Self
    where
        C: ColumnTrait,
        V: Into<sea_orm::Value>,
    {
        if let Some(value) = value {
            self.condition = self.condition.add(column.lte(value));
        }
        self
    }

    /// `from <= column < until`, either bound optional
    pub fn date_range<C: ColumnTrait>(
        mut self,
        column: C,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Self {
        if let Some(from) = from {
            self.condition = self.condition.add(column.gte(from));
        }
        if let Some(until) = until {
            self.condition = self.condition.add(column.lt(until));
        }
        self
    }

    pub fn build(self) -> Condition {
        self.condition
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parses an optional typed filter value; blank means "no filter".
pub fn parse_filter<T: std::str::FromStr>(
    raw: Option<&str>,
    field: &str,
) -> Result<Option<T>, ServiceError> {
    non_blank(raw)
        .map(|value| {
            value.parse::<T>().map_err(|_| {
                ServiceError::ValidationError(format!("Invalid value for filter '{}'", field))
            })
        })
        .transpose()
}

/// One page of rows plus the total matching the same filters
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            pagination: self.pagination,
        }
    }

    pub fn meta(&self) -> PaginationMeta {
        self.pagination.meta(self.total)
    }
}

/// Filtered, ordered, paginated select with a count query sharing the
/// same predicates
pub struct QueryBuilder<E: EntityTrait> {
    condition: Condition,
    order: Vec<(SimpleExpr, Order)>,
    pagination: Pagination,
    _entity: std::marker::PhantomData<E>,
}

impl<E: EntityTrait> QueryBuilder<E> {
    pub fn new(filters: FilterSet, pagination: Pagination) -> Self {
        Self {
            condition: filters.build(),
            order: Vec::new(),
            pagination,
            _entity: std::marker::PhantomData,
        }
    }

    /// Add ordering by a whitelisted field
    pub fn order_by<S>(mut self, field: S, direction: SortDirection) -> Self
    where
        S: SortField<Entity = E>,
    {
        self.order
            .push((Expr::col((E::default(), field.column())).into(), direction.order()));
        self
    }

    /// Add ordering by an expression built from fixed fragments only
    pub fn order_by_expr(mut self, expr: SimpleExpr, order: Order) -> Self {
        self.order.push((expr, order));
        self
    }

    pub fn condition(&self) -> Condition {
        self.condition.clone()
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    /// Main select: filters, ORDER BY (primary key last), LIMIT, OFFSET
    pub fn select(&self) -> Select<E> {
        let mut query = E::find().filter(self.condition.clone());
        for (expr, order) in &self.order {
            query = query.order_by(expr.clone(), order.clone());
        }
        for key in E::PrimaryKey::iter() {
            query = query.order_by_asc(key.into_column());
        }
        query
            .limit(self.pagination.page_size)
            .offset(self.pagination.offset())
    }

    /// Count select: same filters, no ORDER BY / LIMIT
    pub fn count_select(&self) -> Select<E> {
        E::find().filter(self.condition.clone())
    }

    pub async fn execute<C>(self, db: &C) -> Result<Page<E::Model>, DbErr>
    where
        C: ConnectionTrait,
        E::Model: FromQueryResult + Send + Sync + 'static,
    {
        let items = self.select().all(db).await?;
        let total = self.count_select().count(db).await?;
        Ok(Page {
            items,
            total,
            pagination: self.pagination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::product;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use sea_orm::{DbBackend, QueryTrait};

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum ByName {
        Name,
        Stock,
    }

    impl SortField for ByName {
        type Entity = product::Entity;
        const FIELDS: &'static [(&'static str, Self)] =
            &[("nombre", ByName::Name), ("stock", ByName::Stock)];

        fn column(self) -> product::Column {
            match self {
                ByName::Name => product::Column::Name,
                ByName::Stock => product::Column::Stock,
            }
        }
    }

    #[rstest]
    #[case("nombre", ByName::Name)]
    #[case(" NOMBRE ", ByName::Name)]
    #[case("stock", ByName::Stock)]
    fn sort_field_lookup(#[case] token: &str, #[case] expected: ByName) {
        assert_eq!(ByName::parse(token).unwrap(), expected);
    }

    #[rstest]
    #[case("DROP TABLE x")]
    #[case("name; --")]
    #[case("precio")]
    fn sort_field_rejects_unknown(#[case] token: &str) {
        assert_matches!(ByName::parse(token), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn blank_sort_field_means_default() {
        assert_eq!(ByName::parse_optional(None).unwrap(), None);
        assert_eq!(ByName::parse_optional(Some("  ")).unwrap(), None);
    }

    #[rstest]
    #[case("asc", SortDirection::Asc)]
    #[case("DESC", SortDirection::Desc)]
    #[case(" Asc ", SortDirection::Asc)]
    fn direction_lookup(#[case] token: &str, #[case] expected: SortDirection) {
        assert_eq!(SortDirection::parse(token).unwrap(), expected);
    }

    #[test]
    fn direction_rejects_unknown() {
        assert!(SortDirection::parse("sideways").is_err());
        assert!(SortDirection::parse("asc; DROP TABLE x").is_err());
        assert_eq!(
            SortDirection::parse_or(None, SortDirection::Asc).unwrap(),
            SortDirection::Asc
        );
    }

    #[rstest]
    #[case(None, None, 1, 10)]
    #[case(Some("2"), Some("10"), 2, 10)]
    #[case(Some("0"), Some("-5"), 1, 10)]
    #[case(Some("abc"), Some("1.5"), 1, 10)]
    #[case(Some("3"), Some("5000"), 3, 100)]
    fn pagination_coercion(
        #[case] page: Option<&str>,
        #[case] size: Option<&str>,
        #[case] want_page: u64,
        #[case] want_size: u64,
    ) {
        let p = Pagination::from_raw(page, size, 10, 100);
        assert_eq!(p.page, want_page);
        assert_eq!(p.page_size, want_size);
    }

    #[test]
    fn pagination_math() {
        let p = Pagination::from_raw(Some("2"), Some("10"), 20, 100);
        assert_eq!(p.offset(), 10);
        assert_eq!(p.total_pages(25), 3);
        assert_eq!(p.total_pages(20), 2);
        assert_eq!(p.total_pages(0), 0);
    }

    #[test]
    fn escape_like_neutralises_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("pantalla"), "pantalla");
    }

    #[test]
    fn filter_values_are_bound_not_interpolated() {
        let hostile = "x' OR '1'='1";
        let filters = FilterSet::new()
            .search(&[product::Column::Name, product::Column::Sku], Some(hostile))
            .eq(product::Column::BrandId, Some(7))
            .lte(product::Column::Stock, Some(3));
        let builder = QueryBuilder::<product::Entity>::new(
            filters,
            Pagination::from_raw(Some("2"), Some("10"), 10, 100),
        )
        .order_by(ByName::Stock, SortDirection::Desc);

        let stmt = builder.select().build(DbBackend::Sqlite);
        assert!(!stmt.sql.contains("OR '1'='1"));
        assert!(stmt.sql.contains("LIMIT"));
        assert!(stmt.sql.contains("OFFSET"));
        let binds_hostile_text = |values: &[sea_orm::Value]| {
            values.iter().any(|v| {
                matches!(v, sea_orm::Value::String(Some(s)) if s.contains("x' or '1'='1"))
            })
        };
        assert!(binds_hostile_text(&stmt.values.expect("bound values").0));

        let count = builder.count_select().build(DbBackend::Sqlite);
        assert!(!count.sql.contains("ORDER BY"));
        assert!(!count.sql.contains("LIMIT"));
        assert!(count.sql.contains("WHERE"));
        assert!(binds_hostile_text(&count.values.expect("bound values").0));
    }

    #[test]
    fn primary_key_tie_break_is_last() {
        let builder = QueryBuilder::<product::Entity>::new(
            FilterSet::new(),
            Pagination::from_raw(None, None, 10, 100),
        )
        .order_by(ByName::Name, SortDirection::Asc);
        let sql = builder.select().build(DbBackend::Sqlite).sql;
        let order_clause = &sql[sql.find("ORDER BY").unwrap()..];
        let name_at = order_clause.find("\"name\"").unwrap();
        let id_at = order_clause.find("\"id\"").unwrap();
        assert!(name_at < id_at);
    }

    #[test]
    fn empty_filter_set_matches_everything() {
        let count = QueryBuilder::<product::Entity>::new(
            FilterSet::new().search(&[product::Column::Name], Some("   ")),
            Pagination::from_raw(None, None, 10, 100),
        )
        .count_select()
        .build(DbBackend::Sqlite);
        assert!(!count.sql.contains("WHERE"));
    }
}
