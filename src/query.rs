//! Query constraints and their resolution into an executable plan.

use crate::error::StoreError;
use crate::schema::EntityDescriptor;
use serde_json::Value;

pub(crate) const DEFAULT_SORT_FIELD: &str = "created_at";

/// Field constraints plus sort and pagination controls.
///
/// A scalar filter value means equality; an array value means membership
/// (`IN`). Defaults: sort by `created_at`, descending, nulls last, no
/// pagination.
#[derive(Clone, Debug, Default)]
pub struct Query {
    filters: Vec<(String, Value)>,
    sort_by: Option<String>,
    desc: Option<bool>,
    page: Option<u64>,
    num_per_page: Option<u64>,
    limit: Option<u64>,
    distinct: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain a field. Arrays become membership filters, anything else an
    /// equality filter.
    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    pub fn sort_by(mut self, field: &str) -> Self {
        self.sort_by = Some(field.to_string());
        self
    }

    pub fn desc(mut self, desc: bool) -> Self {
        self.desc = Some(desc);
        self
    }

    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn num_per_page(mut self, num_per_page: u64) -> Self {
        self.num_per_page = Some(num_per_page);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub(crate) fn has_filter(&self, field: &str) -> bool {
        self.filters.iter().any(|(name, _)| name == field)
    }

    /// The uuid when the constraint set is exactly one scalar equality on
    /// `uuid`, the only shape the object cache serves.
    pub(crate) fn sole_uuid_equality(&self) -> Option<&str> {
        match self.filters.as_slice() {
            [(field, Value::String(uuid))] if field == "uuid" => Some(uuid.as_str()),
            _ => None,
        }
    }

    /// Resolve constraints against the descriptor.
    ///
    /// Sequence-valued keys are consumed by membership filtering before
    /// equality filtering is applied, so a field duplicated in both shapes
    /// filters by membership. An unknown filter field is a query failure;
    /// an unknown sort field makes the sort a no-op.
    pub(crate) fn plan(&self, entity: &EntityDescriptor) -> Result<QueryPlan, StoreError> {
        let mut membership: Vec<(String, Vec<Value>)> = Vec::new();
        let mut equals: Vec<(String, Value)> = Vec::new();

        for (field, value) in &self.filters {
            if !entity.has_column(field) {
                return Err(StoreError::UnknownField {
                    entity: entity.name().to_string(),
                    field: field.clone(),
                });
            }
            if let Value::Array(values) = value {
                membership.push((field.clone(), values.clone()));
            } else {
                equals.push((field.clone(), value.clone()));
            }
        }
        equals.retain(|(field, _)| !membership.iter().any(|(m, _)| m == field));
        // An empty membership list constrains nothing; the key is consumed above.
        membership.retain(|(_, values)| !values.is_empty());

        let requested_sort = self.sort_by.as_deref().unwrap_or(DEFAULT_SORT_FIELD);
        let sort = entity.has_column(requested_sort).then(|| Sort {
            field: requested_sort.to_string(),
            desc: self.desc.unwrap_or(true),
        });

        let (offset, limit) = match (self.page, self.num_per_page) {
            (Some(page), Some(num_per_page)) => {
                (Some(page.saturating_sub(1) * num_per_page), Some(num_per_page))
            }
            _ => (None, self.limit),
        };

        Ok(QueryPlan {
            equals,
            membership,
            sort,
            offset,
            limit,
            distinct: self.distinct,
        })
    }
}

/// Sort order. Nulls sort last regardless of direction.
#[derive(Clone, Debug)]
pub struct Sort {
    pub field: String,
    pub desc: bool,
}

/// A resolved query, ready for a store backend to execute.
#[derive(Clone, Debug)]
pub struct QueryPlan {
    pub equals: Vec<(String, Value)>,
    pub membership: Vec<(String, Vec<Value>)>,
    pub sort: Option<Sort>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub distinct: bool,
}

impl QueryPlan {
    /// Cap the result at a single row; used by `find`.
    pub(crate) fn first_only(mut self) -> Self {
        self.limit = Some(1);
        self
    }
}
