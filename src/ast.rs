//! In-memory representation of a pending query.
//!
//! The builder only appends nodes here; all SQL emission happens in
//! [`crate::compile`] over the finished tree. Subqueries (EXISTS, aggregate
//! comparisons) are owned sub-trees compiled in the same walk, which keeps
//! parameters in textual order without cross-builder bookkeeping.

use std::fmt;
use std::sync::Arc;

use brook_core::ident::Direction;
use brook_core::{MySqlValue, Raw, Sql};

use crate::builder::QueryBuilder;

/// Statement kind the AST compiles into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryKind {
    #[default]
    Select,
    Insert,
    Update,
    Upsert,
    Delete,
}

/// Connective joining a predicate to the one before it in the same scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conn {
    And,
    Or,
}

/// Join flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

/// A JOIN clause. The ON expression is accepted as an uninterpreted string;
/// callers must not interpolate untrusted input into it.
#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub table: String,
    pub on: String,
    pub kind: JoinKind,
}

/// Right-hand side of a comparison: either a value bound as `?` or a raw
/// fragment interpolated verbatim. There is no third path.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(MySqlValue),
    Raw(String),
}

impl Operand {
    /// True for the NULL sentinel used with IS / IS NOT.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Operand::Value(MySqlValue::Null))
    }
}

/// Conversion into an [`Operand`].
///
/// Implemented for scalars (which bind as parameters) and [`Raw`] markers
/// (which interpolate verbatim).
pub trait IntoOperand {
    fn into_operand(self) -> Operand;
}

impl IntoOperand for Raw {
    fn into_operand(self) -> Operand {
        Operand::Raw(self.into_inner())
    }
}

impl IntoOperand for MySqlValue {
    fn into_operand(self) -> Operand {
        Operand::Value(self)
    }
}

impl IntoOperand for Operand {
    fn into_operand(self) -> Operand {
        self
    }
}

macro_rules! impl_into_operand {
    ($($ty:ty),*) => {
        $(impl IntoOperand for $ty {
            fn into_operand(self) -> Operand {
                Operand::Value(self.into())
            }
        })*
    };
}

impl_into_operand!(
    i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, &str, String
);

impl<T> IntoOperand for Option<T>
where
    T: IntoOperand,
{
    fn into_operand(self) -> Operand {
        match self {
            Some(value) => value.into_operand(),
            None => Operand::Value(MySqlValue::Null),
        }
    }
}

/// One node of the WHERE (or HAVING) tree.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// `column op value`, `column op raw`, or `column IS [NOT] NULL`
    Cmp {
        column: String,
        op: String,
        value: Operand,
        conn: Conn,
    },
    /// `column [NOT] IN (?, ...)`; empty lists degenerate per the builder
    /// rules (`1 = 0` for IN, no-op for NOT IN)
    In {
        column: String,
        values: Vec<MySqlValue>,
        negated: bool,
        conn: Conn,
    },
    /// `column [NOT] BETWEEN ? AND ?`
    Between {
        column: String,
        lo: MySqlValue,
        hi: MySqlValue,
        negated: bool,
        conn: Conn,
    },
    /// `column LIKE ?` with a pre-escaped pattern
    Like {
        column: String,
        pattern: String,
        conn: Conn,
    },
    /// Opens a parenthesized group
    GroupStart { conn: Conn },
    /// Closes the innermost group
    GroupEnd,
    /// `[NOT] EXISTS (subquery)` with a correlated sub-tree
    Exists {
        negated: bool,
        conn: Conn,
        query: Box<QueryAst>,
    },
    /// `(scalar subquery) op ?`
    AggregateCmp {
        query: Box<QueryAst>,
        op: String,
        value: MySqlValue,
        conn: Conn,
    },
    /// Pre-built fragment with embedded parameters. Internal use by the
    /// relation hydrator for composite-key tuple matches; never exposed to
    /// callers.
    Fragment { sql: Sql, conn: Conn },
}

impl Predicate {
    pub(crate) fn conn(&self) -> Conn {
        match self {
            Predicate::Cmp { conn, .. }
            | Predicate::In { conn, .. }
            | Predicate::Between { conn, .. }
            | Predicate::Like { conn, .. }
            | Predicate::GroupStart { conn }
            | Predicate::Exists { conn, .. }
            | Predicate::AggregateCmp { conn, .. }
            | Predicate::Fragment { conn, .. } => *conn,
            Predicate::GroupEnd => Conn::And,
        }
    }
}

/// One projection entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Validated column reference
    Column(String),
    /// Raw expression, trusted as-is
    Raw(String),
}

impl Projection {
    /// True when this entry selects `name`, directly or table-qualified.
    pub(crate) fn covers(&self, name: &str) -> bool {
        match self {
            Projection::Column(column) => {
                column == name
                    || column
                        .rsplit_once('.')
                        .is_some_and(|(_, bare)| bare == name)
            }
            Projection::Raw(_) => false,
        }
    }
}

/// Relation cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    HasOne,
    HasMany,
}

/// Target of a relation or aggregate registration: a table, optionally with
/// the name the result is exposed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationTarget {
    Table(String),
    Aliased { table: String, alias: String },
}

impl RelationTarget {
    pub(crate) fn table(&self) -> &str {
        match self {
            RelationTarget::Table(table) => table,
            RelationTarget::Aliased { table, .. } => table,
        }
    }

    pub(crate) fn alias(&self) -> Option<&str> {
        match self {
            RelationTarget::Table(_) => None,
            RelationTarget::Aliased { alias, .. } => Some(alias),
        }
    }
}

impl From<&str> for RelationTarget {
    fn from(table: &str) -> Self {
        RelationTarget::Table(table.to_owned())
    }
}

impl From<String> for RelationTarget {
    fn from(table: String) -> Self {
        RelationTarget::Table(table)
    }
}

impl From<(&str, &str)> for RelationTarget {
    fn from((table, alias): (&str, &str)) -> Self {
        RelationTarget::Aliased {
            table: table.to_owned(),
            alias: alias.to_owned(),
        }
    }
}

impl From<(String, String)> for RelationTarget {
    fn from((table, alias): (String, String)) -> Self {
        RelationTarget::Aliased { table, alias }
    }
}

/// One or more key columns. Single-column keys come from `&str`; composite
/// keys from arrays or vectors, paired positionally with the other side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyList(pub Vec<String>);

impl KeyList {
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for KeyList {
    fn from(key: &str) -> Self {
        KeyList(vec![key.to_owned()])
    }
}

impl From<String> for KeyList {
    fn from(key: String) -> Self {
        KeyList(vec![key])
    }
}

impl<const N: usize> From<[&str; N]> for KeyList {
    fn from(keys: [&str; N]) -> Self {
        KeyList(keys.iter().map(|key| (*key).to_owned()).collect())
    }
}

impl From<Vec<&str>> for KeyList {
    fn from(keys: Vec<&str>) -> Self {
        KeyList(keys.iter().map(|key| (*key).to_owned()).collect())
    }
}

impl From<Vec<String>> for KeyList {
    fn from(keys: Vec<String>) -> Self {
        KeyList(keys)
    }
}

/// Callback refining the sub-query a relation is loaded with. Runs against
/// the loading builder right before execution, so it may register nested
/// relations of its own.
pub type RelationFilter = Arc<dyn Fn(QueryBuilder) -> QueryBuilder + Send + Sync>;

/// An eager-load directive.
#[derive(Clone)]
pub struct RelationSpec {
    pub kind: RelationKind,
    pub table: String,
    pub name: String,
    pub foreign_key: Vec<String>,
    pub local_key: Vec<String>,
    pub filter: Option<RelationFilter>,
}

impl fmt::Debug for RelationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationSpec")
            .field("kind", &self.kind)
            .field("table", &self.table)
            .field("name", &self.name)
            .field("foreign_key", &self.foreign_key)
            .field("local_key", &self.local_key)
            .field("filter", &self.filter.as_ref().map(|_| "..."))
            .finish()
    }
}

/// Aggregate function applied by an aggregate directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateFn {
    Sum,
    Count,
    Avg,
    Max,
    Min,
    /// Caller-supplied raw expression
    Custom(String),
}

impl AggregateFn {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            AggregateFn::Sum => "sum",
            AggregateFn::Count => "count",
            AggregateFn::Avg => "avg",
            AggregateFn::Max => "max",
            AggregateFn::Min => "min",
            AggregateFn::Custom(_) => "custom",
        }
    }

    /// The SELECT expression for the scalar subquery. COUNT ignores the
    /// column and uses `*`.
    pub(crate) fn expression(&self, column: Option<&str>) -> String {
        match self {
            AggregateFn::Sum => format!("SUM({})", column.unwrap_or("*")),
            AggregateFn::Count => "COUNT(*)".to_owned(),
            AggregateFn::Avg => format!("AVG({})", column.unwrap_or("*")),
            AggregateFn::Max => format!("MAX({})", column.unwrap_or("*")),
            AggregateFn::Min => format!("MIN({})", column.unwrap_or("*")),
            AggregateFn::Custom(expr) => expr.clone(),
        }
    }
}

/// An aggregate directive, materialized as a correlated scalar subquery in
/// the SELECT projection. Its alias doubles as a filter target: a WHERE
/// comparison against the alias compiles into the same subquery.
#[derive(Debug, Clone)]
pub struct AggregateSpec {
    pub func: AggregateFn,
    pub table: String,
    pub foreign_key: Vec<String>,
    pub local_key: Vec<String>,
    pub column: Option<String>,
    pub alias: String,
    /// Extra predicates captured from the registration callback
    pub filter: Vec<Predicate>,
}

/// The whole pending query.
///
/// Initialized empty apart from the target table; terminal operations reset
/// it back to that state.
#[derive(Debug, Clone, Default)]
pub struct QueryAst {
    pub kind: QueryKind,
    pub table: String,
    pub projection: Vec<Projection>,
    pub distinct: bool,
    pub joins: Vec<JoinSpec>,
    pub wheres: Vec<Predicate>,
    pub group_by: Vec<String>,
    pub having: Vec<Predicate>,
    pub order_by: Vec<(String, Direction)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// INSERT / UPSERT payload, one entry per row
    pub insert_rows: Vec<Vec<(String, MySqlValue)>>,
    /// UPDATE SET or upsert update clause; Raw operands render literally
    pub update_set: Vec<(String, Operand)>,
    pub relations: Vec<RelationSpec>,
    pub aggregates: Vec<AggregateSpec>,
}

impl QueryAst {
    /// Fresh AST targeting `table`.
    pub fn new(table: impl Into<String>) -> Self {
        QueryAst {
            table: table.into(),
            ..QueryAst::default()
        }
    }

    /// Returns the AST to its initial state, keeping only the target table.
    pub fn reset(&mut self) {
        let table = std::mem::take(&mut self.table);
        *self = QueryAst::new(table);
    }
}
