//! A small SQL string composer (C2) plus the column-list side of the row
//! codec (C3).
//!
//! `QueryBuilder` never touches a connection; it only produces SQL text and
//! allocates `$1, $2, …` placeholders in the order the caller intends to
//! `.bind()` them. The codec half of C3 (the per-column textual/typed
//! conversions — optional wrapping, enum symbolic names, `ref(T)` unsealing)
//! is handled by `sqlx`'s own `FromRow`/`Encode` machinery on the row
//! structs in `product_store`/`tag_store`/`session_store`, per the portable
//! "hand-written codec table" option in the design notes rather than a
//! compile-time reflection facility.
//!
//! `product_store::get_products_by_name` is the one query whose WHERE
//! clause genuinely varies per call (the join plus a case-insensitive
//! substring predicate), so it composes its SQL through this builder
//! instead of a literal string; every other store query has a fixed shape
//! known ahead of time and is left as hand-written SQL.

/// Ordered, named columns for an entity, used by the `simple_*` helpers
/// below. Implemented by hand per entity rather than derived, matching the
/// "hand-written codec table" alternative to compile-time reflection.
pub trait Entity {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Like,
    ILike,
    In,
    Is,
}

impl Op {
    fn as_sql(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Like => "LIKE",
            Op::ILike => "ILIKE",
            Op::In => "IN",
            Op::Is => "IS",
        }
    }
}

#[derive(Debug, Clone)]
struct Condition {
    column: String,
    op: Op,
    placeholder: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Accumulates table, fields, joins, WHERE conditions, and ORDER BY clauses,
/// allocating positional placeholders as conditions are added. Call
/// `select`/`insert`/`update`/`delete` to emit the final SQL string.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: String,
    fields: Vec<String>,
    joins: Vec<String>,
    conditions: Vec<Condition>,
    order_by: Vec<(String, Order)>,
    next_placeholder: usize,
}

impl QueryBuilder {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
            joins: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            next_placeholder: 1,
        }
    }

    #[must_use]
    pub fn field(mut self, column: impl Into<String>) -> Self {
        self.fields.push(column.into());
        self
    }

    #[must_use]
    pub fn fields(mut self, columns: &[&str]) -> Self {
        self.fields.extend(columns.iter().map(|c| (*c).to_string()));
        self
    }

    #[must_use]
    pub fn inner_join(mut self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.joins
            .push(format!("INNER JOIN {} ON {}", table.into(), on.into()));
        self
    }

    /// Adds a WHERE condition and returns the `$n` placeholder allocated for
    /// it, so the caller binds values in the same order.
    pub fn condition(&mut self, column: impl Into<String>, op: Op) -> String {
        let placeholder = format!("${}", self.next_placeholder);
        self.next_placeholder += 1;
        self.conditions.push(Condition {
            column: column.into(),
            op,
            placeholder: placeholder.clone(),
        });
        placeholder
    }

    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = self
            .conditions
            .iter()
            .map(|c| format!("{} {} {}", c.column, c.op.as_sql(), c.placeholder))
            .collect();
        format!(" WHERE {}", parts.join(" AND "))
    }

    fn order_clause(&self) -> String {
        if self.order_by.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = self
            .order_by
            .iter()
            .map(|(col, ord)| {
                let dir = match ord {
                    Order::Asc => "ASC",
                    Order::Desc => "DESC",
                };
                format!("{col} {dir}")
            })
            .collect();
        format!(" ORDER BY {}", parts.join(", "))
    }

    #[must_use]
    pub fn select(&self) -> String {
        let fields = if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields.join(", ")
        };
        let joins = if self.joins.is_empty() {
            String::new()
        } else {
            format!(" {}", self.joins.join(" "))
        };
        format!(
            "SELECT {} FROM {}{}{}{}",
            fields,
            self.table,
            joins,
            self.where_clause(),
            self.order_clause()
        )
    }

    #[must_use]
    pub fn update(&self, set_columns: &[&str]) -> String {
        let assignments: Vec<String> = set_columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{col} = ${}", i + 1))
            .collect();
        format!(
            "UPDATE {} SET {}{}",
            self.table,
            assignments.join(", "),
            self.where_clause()
        )
    }

    #[must_use]
    pub fn delete(&self) -> String {
        format!("DELETE FROM {}{}", self.table, self.where_clause())
    }
}

/// `SELECT {columns(T)} FROM table WHERE …` using `T`'s declared column list.
#[must_use]
pub fn simple_select<T: Entity>(where_sql: &str) -> String {
    let columns = T::COLUMNS.join(", ");
    if where_sql.is_empty() {
        format!("SELECT {columns} FROM {}", T::TABLE)
    } else {
        format!("SELECT {columns} FROM {} WHERE {where_sql}", T::TABLE)
    }
}

/// `INSERT INTO table (columns(T)) VALUES ($1, $2, …)` using `T`'s column order.
#[must_use]
pub fn simple_insert<T: Entity>() -> String {
    let columns = T::COLUMNS.join(", ");
    let placeholders: Vec<String> = (1..=T::COLUMNS.len()).map(|i| format!("${i}")).collect();
    format!(
        "INSERT INTO {} ({columns}) VALUES ({})",
        T::TABLE,
        placeholders.join(", ")
    )
}

/// As [`simple_insert`], appending `RETURNING id`.
#[must_use]
pub fn simple_insert_with_id<T: Entity>() -> String {
    format!("{} RETURNING id", simple_insert::<T>())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;
    impl Entity for Widget {
        const TABLE: &'static str = "widget";
        const COLUMNS: &'static [&'static str] = &["name", "volume"];
    }

    #[test]
    fn select_without_conditions() {
        let qb = QueryBuilder::new("product").fields(&["id", "name"]);
        assert_eq!(qb.select(), "SELECT id, name FROM product");
    }

    #[test]
    fn select_with_condition_allocates_placeholder() {
        let mut qb = QueryBuilder::new("product").fields(&["id"]);
        let ph = qb.condition("identifier", Op::Eq);
        assert_eq!(ph, "$1");
        assert_eq!(qb.select(), "SELECT id FROM product WHERE identifier = $1");
    }

    #[test]
    fn select_with_ilike_condition() {
        let mut qb = QueryBuilder::new("product").fields(&["id", "name"]);
        let ph = qb.condition("name", Op::ILike);
        assert_eq!(ph, "$1");
        assert_eq!(qb.select(), "SELECT id, name FROM product WHERE name ILIKE $1");
    }

    #[test]
    fn select_with_join_and_order() {
        let mut qb = QueryBuilder::new("product")
            .fields(&["product.id", "productdetails.price"])
            .inner_join(
                "productdetails",
                "productdetails.product_id = product.id",
            )
            .order_by("product.id", Order::Asc);
        let ph = qb.condition("product.supermarket_id", Op::Eq);
        assert_eq!(ph, "$1");
        assert_eq!(
            qb.select(),
            "SELECT product.id, productdetails.price FROM product INNER JOIN productdetails ON productdetails.product_id = product.id WHERE product.supermarket_id = $1 ORDER BY product.id ASC"
        );
    }

    #[test]
    fn simple_select_uses_entity_columns() {
        assert_eq!(
            simple_select::<Widget>("name = $1"),
            "SELECT name, volume FROM widget WHERE name = $1"
        );
    }

    #[test]
    fn simple_insert_with_id_appends_returning() {
        assert_eq!(
            simple_insert_with_id::<Widget>(),
            "INSERT INTO widget (name, volume) VALUES ($1, $2) RETURNING id"
        );
    }
}
