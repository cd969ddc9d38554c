//! Adoption grid: query-string filters and fixed-size pagination.
use crate::error::AppResult;
use crate::models::animal::{AnimalCard, AnimalStatus, CARD_SELECT, NEWEST_FIRST, Sex, Size, Species};
use crate::orm::Db;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashMap;

/// Equality predicates for the adoption grid. `None` means "any".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AnimalFilter {
    pub species: Option<Species>,
    pub sex: Option<Sex>,
    pub size: Option<Size>,
}

impl AnimalFilter {
    /// Read `species`, `sex` and `size` from a query map. Empty or unknown values are ignored.
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        AnimalFilter {
            species: query.get("species").and_then(|v| Species::parse(v)),
            sex: query.get("sex").and_then(|v| Sex::parse(v)),
            size: query.get("size").and_then(|v| Size::parse(v)),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == AnimalFilter::default()
    }

    pub fn matches(&self, card: &AnimalCard) -> bool {
        self.species.is_none_or(|s| card.species == s)
            && self.sex.is_none_or(|s| card.sex == s)
            && self.size.is_none_or(|s| card.size == Some(s))
    }

    /// Query-string pairs for the active filters, in a stable order.
    pub fn query_pairs(&self) -> Vec<(&'static str, &'static str)> {
        let mut pairs = Vec::new();
        if let Some(v) = self.species {
            pairs.push(("species", v.as_str()));
        }
        if let Some(v) = self.sex {
            pairs.push(("sex", v.as_str()));
        }
        if let Some(v) = self.size {
            pairs.push(("size", v.as_str()));
        }
        pairs
    }

    fn push_predicates(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(v) = self.species {
            qb.push(" AND a.species = ").push_bind(v);
        }
        if let Some(v) = self.sex {
            qb.push(" AND a.sex = ").push_bind(v);
        }
        if let Some(v) = self.size {
            qb.push(" AND a.size = ").push_bind(v);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32) -> Self {
        Pagination {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Read `page` from a query map; missing or malformed values mean page 1.
    pub fn from_query(query: &HashMap<String, String>, page_size: u32) -> Self {
        let page = query
            .get("page")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(1);
        Self::new(page, page_size)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn total_pages(&self, total: u64) -> u32 {
        total.div_ceil(u64::from(self.page_size)) as u32
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Build `?a=b&page=n` for a neighbour page, keeping the active filters.
pub fn page_query(filter: &AnimalFilter, page: u32) -> String {
    let mut parts: Vec<String> = filter
        .query_pairs()
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    if page > 1 {
        parts.push(format!("page={}", page));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("?{}", parts.join("&"))
    }
}

/// Adoptable animals matching `filter`, newest first, one page at a time.
pub async fn list_adoptable(
    db: &Db,
    filter: &AnimalFilter,
    pagination: Pagination,
) -> AppResult<Page<AnimalCard>> {
    let mut count_qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM animals a WHERE a.status = ");
    count_qb.push_bind(AnimalStatus::Adoptable);
    filter.push_predicates(&mut count_qb);
    let (total,): (i64,) = count_qb.build_query_as().fetch_one(db.pool()).await?;
    let total = total.max(0) as u64;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(CARD_SELECT);
    qb.push(" WHERE a.status = ").push_bind(AnimalStatus::Adoptable);
    filter.push_predicates(&mut qb);
    qb.push(NEWEST_FIRST);
    qb.push(" LIMIT ")
        .push_bind(i64::from(pagination.page_size))
        .push(" OFFSET ")
        .push_bind(pagination.offset() as i64);
    let items = qb.build_query_as::<AnimalCard>().fetch_all(db.pool()).await?;

    log::debug!(
        "Adoption grid page {} ({:?}): {} of {} rows",
        pagination.page,
        filter,
        items.len(),
        total
    );

    Ok(Page {
        items,
        page: pagination.page,
        page_size: pagination.page_size,
        total,
        total_pages: pagination.total_pages(total),
    })
}
