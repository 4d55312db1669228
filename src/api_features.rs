/// Query string driven filtering, sorting, field limiting and pagination
///
/// Works against any [`Resource`]: only attributes listed in
/// `Resource::FIELDS` can be filtered or sorted on, and every value is
/// bound as a parameter.
///
/// ```text
/// GET /api/v1/tours?duration[gte]=5&difficulty=easy&sort=-price&fields=name,price&page=2&limit=3
/// ```

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use std::marker::PhantomData;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Field, FieldKind, Resource};

const RESERVED: [&str; 4] = ["page", "sort", "limit", "fields"];
const DEFAULT_SORT: &str = "-createdAt";
const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Gte,
    Gt,
    Lte,
    Lt,
}

impl Operator {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "gte" => Some(Operator::Gte),
            "gt" => Some(Operator::Gt),
            "lte" => Some(Operator::Lte),
            "lt" => Some(Operator::Lt),
            _ => None,
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gte => ">=",
            Operator::Gt => ">",
            Operator::Lte => "<=",
            Operator::Lt => "<",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Bound {
    Integer(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

impl Bound {
    fn parse(field: &Field, raw: &str) -> Result<Self, AppError> {
        let cast = || AppError::cast(field.name, raw);
        let value = raw.trim();

        match field.kind {
            FieldKind::Integer => value.parse().map(Bound::Integer).map_err(|_| cast()),
            FieldKind::Float => value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Bound::Float)
                .ok_or_else(cast),
            FieldKind::Text => Ok(Bound::Text(value.to_string())),
            FieldKind::Bool => match value {
                "true" => Ok(Bound::Bool(true)),
                "false" => Ok(Bound::Bool(false)),
                _ => Err(cast()),
            },
            FieldKind::Timestamp => parse_timestamp(value).map(Bound::Timestamp).ok_or_else(cast),
            FieldKind::Uuid => Uuid::parse_str(value).map(Bound::Uuid).map_err(|_| cast()),
        }
    }
}

/// RFC 3339 timestamp or a plain `YYYY-MM-DD` date (midnight UTC)
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[derive(Debug, Clone)]
struct Condition {
    column: &'static str,
    operator: Operator,
    value: Bound,
}

/// Which keys of each document are returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    fn parse(raw: &str) -> Result<Self, AppError> {
        let names: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            return Ok(Projection::All);
        }

        let excluded = names.iter().filter(|name| name.starts_with('-')).count();
        if excluded == names.len() {
            Ok(Projection::Exclude(
                names.iter().map(|name| name[1..].to_string()).collect(),
            ))
        } else if excluded == 0 {
            Ok(Projection::Include(names.iter().map(|name| name.to_string()).collect()))
        } else {
            Err(AppError::BadRequest(
                "Cannot mix field inclusion and exclusion".to_string(),
            ))
        }
    }

    /// Apply to one JSON document; `id` is always kept on inclusion
    pub fn apply(&self, document: Value) -> Value {
        match (self, document) {
            (Projection::Include(keep), Value::Object(map)) => Value::Object(
                map.into_iter()
                    .filter(|(key, _)| key == "id" || keep.iter().any(|k| k == key))
                    .collect(),
            ),
            (Projection::Exclude(drop), Value::Object(mut map)) => {
                for key in drop {
                    map.remove(key);
                }
                Value::Object(map)
            }
            (_, document) => document,
        }
    }
}

/// Chainable query builder over a [`Resource`]
pub struct ApiFeatures<R: Resource> {
    query: HashMap<String, String>,
    conditions: Vec<Condition>,
    order: Vec<(&'static str, bool)>,
    projection: Projection,
    page: Option<(i64, i64)>,
    _resource: PhantomData<R>,
}

impl<R: Resource> ApiFeatures<R> {
    pub fn new(query: &HashMap<String, String>) -> Self {
        Self {
            query: query.clone(),
            conditions: Vec::new(),
            order: Vec::new(),
            projection: Projection::All,
            page: None,
            _resource: PhantomData,
        }
    }

    /// Restrict to documents whose `column` equals `id`, e.g. the reviews of one tour
    pub fn scope(mut self, column: &'static str, id: Uuid) -> Self {
        self.conditions.push(Condition {
            column,
            operator: Operator::Eq,
            value: Bound::Uuid(id),
        });
        self
    }

    /// `field=value` and `field[op]=value` pairs
    pub fn filter(mut self) -> Result<Self, AppError> {
        let mut keys: Vec<&String> = self
            .query
            .keys()
            .filter(|key| !RESERVED.contains(&key.as_str()))
            .collect();
        keys.sort();

        let mut conditions = Vec::with_capacity(keys.len());
        for key in keys {
            let (name, operator) = match key.split_once('[') {
                Some((name, rest)) => {
                    let operator = rest
                        .strip_suffix(']')
                        .and_then(Operator::parse)
                        .ok_or_else(|| {
                            AppError::BadRequest(format!("Invalid filter operator: {}", key))
                        })?;
                    (name, operator)
                }
                None => (key.as_str(), Operator::Eq),
            };

            let field = R::field(name)
                .ok_or_else(|| AppError::BadRequest(format!("Invalid filter field: {}", name)))?;
            let value = Bound::parse(field, &self.query[key])?;

            conditions.push(Condition {
                column: field.column,
                operator,
                value,
            });
        }

        self.conditions.extend(conditions);
        Ok(self)
    }

    /// `sort=a,-b`, newest first by default, with an id tiebreaker
    pub fn sort(mut self) -> Result<Self, AppError> {
        let raw = self
            .query
            .get("sort")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SORT)
            .to_string();

        let mut order = Vec::new();
        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (name, descending) = match token.strip_prefix('-') {
                Some(name) => (name, true),
                None => (token, false),
            };
            let field = R::field(name)
                .ok_or_else(|| AppError::BadRequest(format!("Invalid sort field: {}", name)))?;
            order.push((field.column, descending));
        }

        if let Some(id) = R::field("id") {
            if !order.iter().any(|(column, _)| *column == id.column) {
                order.push((id.column, false));
            }
        }

        self.order = order;
        Ok(self)
    }

    /// `fields=a,b` keeps only those keys, `fields=-a,-b` drops them
    pub fn limit_fields(mut self) -> Result<Self, AppError> {
        self.projection = match self.query.get("fields") {
            Some(raw) => Projection::parse(raw)?,
            None => Projection::All,
        };
        Ok(self)
    }

    /// `page` and `limit`, 1 and 10 by default, at most 100 per page.
    /// A page whose offset does not fit an `i64` falls back to the first.
    pub fn paginate(mut self) -> Self {
        let number = |key: &str, default: i64| {
            self.query
                .get(key)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|v| *v >= 1)
                .unwrap_or(default)
        };
        let limit = number("limit", DEFAULT_LIMIT).min(MAX_LIMIT);
        let page = Some(number("page", DEFAULT_PAGE))
            .filter(|page| (page - 1).checked_mul(limit).is_some())
            .unwrap_or(DEFAULT_PAGE);

        self.page = Some((page, limit));
        self
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    fn build(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::<Postgres>::new(R::SELECT);

        let mut first = true;
        let mut clause = |builder: &mut QueryBuilder<'static, Postgres>| {
            builder.push(if first { " WHERE " } else { " AND " });
            first = false;
        };

        if let Some(filter) = R::BASE_FILTER {
            clause(&mut builder);
            builder.push(filter);
        }

        for condition in &self.conditions {
            clause(&mut builder);
            builder
                .push(condition.column)
                .push(" ")
                .push(condition.operator.sql())
                .push(" ");
            match &condition.value {
                Bound::Integer(v) => builder.push_bind(*v),
                Bound::Float(v) => builder.push_bind(*v),
                Bound::Text(v) => builder.push_bind(v.clone()),
                Bound::Bool(v) => builder.push_bind(*v),
                Bound::Timestamp(v) => builder.push_bind(*v),
                Bound::Uuid(v) => builder.push_bind(*v),
            };
        }

        if !self.order.is_empty() {
            builder.push(" ORDER BY ");
            for (i, (column, descending)) in self.order.iter().enumerate() {
                if i > 0 {
                    builder.push(", ");
                }
                builder
                    .push(*column)
                    .push(if *descending { " DESC" } else { " ASC" });
            }
        }

        if let Some((page, limit)) = self.page {
            builder.push(" LIMIT ").push_bind(limit);
            builder
                .push(" OFFSET ")
                .push_bind((page - 1).saturating_mul(limit));
        }

        builder
    }

    /// The SQL that [`fetch`](Self::fetch) runs
    pub fn to_sql(&self) -> String {
        self.build().sql().to_string()
    }

    /// Run the query and return projected JSON documents
    pub async fn fetch(&self, pool: &PgPool) -> Result<Vec<Value>, AppError> {
        let mut builder = self.build();
        let rows = builder.build_query_as::<R>().fetch_all(pool).await?;

        rows.iter()
            .map(|row| row.to_document().map(|doc| self.projection.apply(doc)))
            .collect()
    }
}
