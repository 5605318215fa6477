//! Message filter expressions, field filters and offset pagination.
//!
//! Filter strings look like
//! `create_time > "2023-04-21T11:30:00Z" AND thread.name = "spaces/A/threads/1"`.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Value};
use sim_core::{SimConfig, SimError};

/// Page size used when a list call does not specify one.
pub const DEFAULT_PAGE_SIZE: usize = 25;
/// Largest page a list call may request.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Comparison operator on `create_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Lt,
    Ge,
    Le,
}

impl CompareOp {
    /// Operators in parse order; two-character operators come first.
    const ALL: [(&'static str, CompareOp); 4] = [
        (">=", CompareOp::Ge),
        ("<=", CompareOp::Le),
        (">", CompareOp::Gt),
        ("<", CompareOp::Lt),
    ];

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        }
    }
}

/// One segment of a filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// `create_time OP "timestamp"`
    CreateTime { op: CompareOp, value: String },
    /// `thread.name = "spaces/.../threads/..."`
    ThreadName(String),
}

impl Clause {
    fn parse(segment: &str) -> Result<Self, SimError> {
        if let Some((symbol, op)) = CompareOp::ALL
            .iter()
            .find(|(symbol, _)| segment.contains(symbol))
        {
            let (lhs, rhs) = segment.split_once(symbol).unwrap_or((segment, ""));
            let field = lhs.trim().to_lowercase();
            if field != "create_time" {
                return Err(SimError::InvalidInput(format!(
                    "Unsupported filter field '{}' for operator '{}'",
                    lhs.trim(),
                    symbol
                )));
            }
            return Ok(Clause::CreateTime {
                op: *op,
                value: rhs.trim().trim_matches('"').to_string(),
            });
        }

        if let Some((lhs, rhs)) = segment.split_once('=') {
            let field = lhs.trim().to_lowercase();
            if field != "thread.name" {
                return Err(SimError::InvalidInput(format!(
                    "Unsupported filter field '{}'",
                    lhs.trim()
                )));
            }
            let value = rhs.trim().trim_matches('"').trim_matches('\'');
            return Ok(Clause::ThreadName(value.to_string()));
        }

        Err(SimError::InvalidInput(format!(
            "Invalid filter segment '{}'",
            segment
        )))
    }

    /// Tests a single message record.
    pub fn matches(&self, message: &Map<String, Value>) -> bool {
        match self {
            Clause::CreateTime { op, value } => match message.get("createTime") {
                Some(Value::String(t)) if !t.is_empty() => op.holds(t.as_str().cmp(value.as_str())),
                _ => false,
            },
            Clause::ThreadName(expected) => {
                let actual = message
                    .get("thread")
                    .and_then(Value::as_object)
                    .and_then(|t| t.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                actual == expected
            }
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::CreateTime { op, value } => write!(f, "create_time {} \"{}\"", op.symbol(), value),
            Clause::ThreadName(name) => write!(f, "thread.name = \"{}\"", name),
        }
    }
}

/// A parsed filter: every clause must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    pub clauses: Vec<Clause>,
}

impl MessageFilter {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// True when `message` is an object satisfying every clause.
    pub fn matches(&self, message: &Value) -> bool {
        match message.as_object() {
            Some(obj) => self.clauses.iter().all(|c| c.matches(obj)),
            None => false,
        }
    }
}

impl fmt::Display for MessageFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{}", clause)?;
        }
        Ok(())
    }
}

/// Parses a filter expression. Empty segments are skipped.
///
/// # Returns
/// `Err(SimError::InvalidInput)` naming the first unsupported segment.
pub fn parse_filter(filter: &str) -> Result<MessageFilter, SimError> {
    let clauses = filter
        .split("AND")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Clause::parse)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MessageFilter { clauses })
}

/// Lenient form of [`parse_filter`] + [`MessageFilter::matches`] over
/// pre-split segments.
///
/// A malformed or unknown segment makes the message not match. An empty
/// segment list matches everything.
pub fn matches_filter<S: AsRef<str>>(message: &Value, segments: &[S]) -> bool {
    let Some(obj) = message.as_object() else {
        return false;
    };
    segments
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .all(|s| Clause::parse(s).is_ok_and(|clause| clause.matches(obj)))
}

/// Looks up a dotted path such as `thread.name` or `sender.type`.
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, key| current.as_object()?.get(key))
}

/// Keeps records whose dotted-path fields equal the given values.
pub fn apply_filters<'a, I>(records: I, filters: &[(&str, Value)]) -> Vec<Value>
where
    I: IntoIterator<Item = &'a Value>,
{
    records
        .into_iter()
        .filter(|r| {
            filters
                .iter()
                .all(|(path, expected)| get_path(r, path) == Some(expected))
        })
        .cloned()
        .collect()
}

/// Sort key for list calls, e.g. `createTime desc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl Default for OrderBy {
    fn default() -> Self {
        Self {
            field: "createTime".to_string(),
            descending: true,
        }
    }
}

impl OrderBy {
    /// Parses `field [asc|desc]`. `create_time` is accepted for `createTime`.
    pub fn parse(order_by: &str) -> Result<Self, SimError> {
        let mut parts = order_by.split_whitespace();
        let field = parts
            .next()
            .ok_or_else(|| SimError::InvalidInput("orderBy must name a field".to_string()))?;
        let descending = match parts.next().map(str::to_lowercase).as_deref() {
            None | Some("asc") => false,
            Some("desc") => true,
            Some(other) => {
                return Err(SimError::InvalidInput(format!(
                    "Invalid orderBy direction '{}'. Expected 'asc' or 'desc'",
                    other
                )))
            }
        };
        if parts.next().is_some() {
            return Err(SimError::InvalidInput(format!(
                "Invalid orderBy '{}'",
                order_by
            )));
        }
        let field = match field.to_lowercase().as_str() {
            "create_time" | "createtime" => "createTime".to_string(),
            _ => field.to_string(),
        };
        Ok(Self { field, descending })
    }

    /// Sorts records in place; missing fields sort as the smallest value.
    pub fn sort(&self, records: &mut [Value]) {
        records.sort_by(|a, b| {
            let ordering = compare_values(get_path(a, &self.field), get_path(b, &self.field));
            if self.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// One page of a list call.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    /// Offset of the next page, absent on the last page
    pub next_page_token: Option<String>,
}

impl Page {
    /// Renders `{items_key: [...], "nextPageToken": "..."}`.
    pub fn into_response(self, items_key: &str) -> Value {
        let mut response = Map::new();
        response.insert(items_key.to_string(), Value::Array(self.items));
        if let Some(token) = self.next_page_token {
            response.insert("nextPageToken".to_string(), Value::String(token));
        }
        Value::Object(response)
    }
}

/// Page size bounds for list calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Size used when a call gives none (or 0)
    pub default_size: usize,
    pub max_size: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_PAGE_SIZE,
            max_size: MAX_PAGE_SIZE,
        }
    }
}

impl From<&SimConfig> for PageLimits {
    fn from(config: &SimConfig) -> Self {
        let default_size = match config.default_page_size {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };
        Self {
            default_size,
            max_size: MAX_PAGE_SIZE,
        }
    }
}

/// Sorts and slices records into a page with the built-in [`PageLimits`].
///
/// # Arguments
/// * `records` - Records after filtering
/// * `page_size` - Page size, [`DEFAULT_PAGE_SIZE`] when `None` or 0
/// * `page_token` - Offset returned by a previous call; unparseable tokens restart at 0
/// * `order_by` - Sort key, `createTime desc` when `None`
pub fn list_page(
    records: Vec<Value>,
    page_size: Option<usize>,
    page_token: Option<&str>,
    order_by: Option<&str>,
) -> Result<Page, SimError> {
    list_page_with(PageLimits::default(), records, page_size, page_token, order_by)
}

/// [`list_page`] with explicit limits, e.g. `PageLimits::from(&config)`.
pub fn list_page_with(
    limits: PageLimits,
    mut records: Vec<Value>,
    page_size: Option<usize>,
    page_token: Option<&str>,
    order_by: Option<&str>,
) -> Result<Page, SimError> {
    let page_size = match page_size {
        None | Some(0) => limits.default_size,
        Some(n) => n,
    };
    if page_size > limits.max_size {
        return Err(SimError::InvalidInput(format!(
            "pageSize cannot exceed {}",
            limits.max_size
        )));
    }
    let order = match order_by {
        Some(s) => OrderBy::parse(s)?,
        None => OrderBy::default(),
    };
    order.sort(&mut records);

    let offset = page_token
        .and_then(|t| t.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let end = offset.saturating_add(page_size);
    let total = records.len();
    let items: Vec<Value> = records
        .into_iter()
        .skip(offset)
        .take(page_size)
        .collect();
    let next_page_token = (end < total).then(|| end.to_string());
    Ok(Page {
        items,
        next_page_token,
    })
}
