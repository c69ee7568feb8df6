use chrono::{DateTime, Utc};
use sqlx::{Postgres, postgres::PgArguments, query::Query};

use crate::infrastructure::persistence::schema::{ColumnRef, Table};

/// Composable SELECT builder over the library item tables
#[derive(Debug, Clone)]
pub struct QueryBuilder<'a> {
    from_table: Table<'a>,
    select: Vec<ColumnRef<'a>>,
    distinct_on: Vec<ColumnRef<'a>>,
    joins: Vec<Join<'a>>,
    where_conditions: Vec<Condition<'a>>,
    order_by: Vec<OrderBy<'a>>,
    limit: Option<i64>,
    offset: Option<i64>,
    for_update: bool,
}

/// A where condition that will be AND'ed together
#[derive(Debug, Clone)]
pub enum Condition<'a> {
    /// field = value
    Equals {
        column: ColumnRef<'a>,
        value: ConditionValue,
    },

    /// field > value
    GreaterThan {
        column: ColumnRef<'a>,
        value: ConditionValue,
    },

    /// field <= value
    LessThanOrEqual {
        column: ColumnRef<'a>,
        value: ConditionValue,
    },

    /// field IS NULL
    IsNull { column: ColumnRef<'a> },

    /// Combine two conditions with OR
    Or(Box<Condition<'a>>, Box<Condition<'a>>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Text(String),
    Integer(i32),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
}

#[derive(Debug, Clone)]
pub struct OrderBy<'a> {
    pub column: ColumnRef<'a>,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// INNER JOIN target ON main_column = target_column
#[derive(Debug, Clone)]
pub struct Join<'a> {
    pub target_table: Table<'a>,
    pub main_column: ColumnRef<'a>,
    pub target_column: ColumnRef<'a>,
}

impl<'a> From<Table<'a>> for QueryBuilder<'a> {
    fn from(value: Table<'a>) -> Self {
        QueryBuilder {
            from_table: value,
            select: vec![],
            distinct_on: vec![],
            joins: vec![],
            where_conditions: vec![],
            order_by: vec![],
            limit: None,
            offset: None,
            for_update: false,
        }
    }
}

impl<'a> QueryBuilder<'a> {
    /// Select specified columns
    pub fn select(mut self, columns: Vec<ColumnRef<'a>>) -> Self {
        self.select = columns;
        self
    }

    /// Keep only the first row of every group of equal columns
    pub fn distinct_on(mut self, columns: Vec<ColumnRef<'a>>) -> Self {
        self.distinct_on = columns;
        self
    }

    pub fn join(
        mut self,
        target_table: Table<'a>,
        main_column: ColumnRef<'a>,
        target_column: ColumnRef<'a>,
    ) -> Self {
        self.joins.push(Join {
            target_table,
            main_column,
            target_column,
        });
        self
    }

    /// Add where condition
    pub fn where_condition(mut self, condition: Condition<'a>) -> Self {
        self.where_conditions.push(condition);
        self
    }

    pub fn order_by(mut self, column: ColumnRef<'a>, direction: SortDirection) -> Self {
        self.order_by.push(OrderBy { column, direction });
        self
    }

    pub fn limit(mut self, limit: Option<i64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: Option<i64>) -> Self {
        self.offset = offset;
        self
    }

    /// Lock selected rows until the end of the transaction
    pub fn for_update(mut self) -> Self {
        self.for_update = true;
        self
    }

    /// Build the SQL query string
    pub fn build(self) -> (String, Vec<SqlParameter>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        let mut param_counter = 1;

        // SELECT clause
        sql.push_str("SELECT ");
        if !self.distinct_on.is_empty() {
            let columns: Vec<String> = self.distinct_on.iter().map(|c| c.qualified()).collect();
            sql.push_str(&format!("DISTINCT ON ({}) ", columns.join(", ")));
        }
        let columns: Vec<String> = self.select.iter().map(|c| c.qualified()).collect();
        sql.push_str(&columns.join(", "));

        // FROM clause
        sql.push_str(&format!("\nFROM {}", self.from_table.qualified()));

        // JOIN clauses
        for join in &self.joins {
            sql.push_str(&format!(
                "\nINNER JOIN {} ON {} = {}",
                join.target_table.qualified(),
                join.main_column.qualified(),
                join.target_column.qualified()
            ));
        }

        // WHERE clause
        if !self.where_conditions.is_empty() {
            let where_sql: Vec<String> = self
                .where_conditions
                .iter()
                .map(|condition| {
                    let (cond_sql, cond_params) = condition.to_sql(&mut param_counter);
                    params.extend(cond_params);
                    cond_sql
                })
                .collect();
            sql.push_str("\nWHERE ");
            sql.push_str(&where_sql.join(" AND "));
        }

        // ORDER BY clause
        if !self.order_by.is_empty() {
            sql.push_str("\nORDER BY ");
            let order_clauses: Vec<String> = self
                .order_by
                .iter()
                .map(|ob| {
                    let direction = match ob.direction {
                        SortDirection::Ascending => "ASC",
                        SortDirection::Descending => "DESC",
                    };
                    format!("{} {}", ob.column.qualified(), direction)
                })
                .collect();
            sql.push_str(&order_clauses.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!("\nLIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!("\nOFFSET {}", offset));
        }

        if self.for_update {
            sql.push_str("\nFOR UPDATE");
        }

        (sql, params)
    }
}

impl Condition<'_> {
    pub fn to_sql(&self, param_counter: &mut usize) -> (String, Vec<SqlParameter>) {
        match self {
            Condition::Equals { column, value } => {
                Self::comparison(column, "=", value, param_counter)
            }
            Condition::GreaterThan { column, value } => {
                Self::comparison(column, ">", value, param_counter)
            }
            Condition::LessThanOrEqual { column, value } => {
                Self::comparison(column, "<=", value, param_counter)
            }
            Condition::IsNull { column } => (format!("{} IS NULL", column.qualified()), vec![]),
            Condition::Or(left, right) => {
                let (left_sql, mut left_params) = left.to_sql(param_counter);
                let (right_sql, right_params) = right.to_sql(param_counter);
                left_params.extend(right_params);
                (format!("({} OR {})", left_sql, right_sql), left_params)
            }
        }
    }

    fn comparison(
        column: &ColumnRef<'_>,
        operator: &str,
        value: &ConditionValue,
        param_counter: &mut usize,
    ) -> (String, Vec<SqlParameter>) {
        let sql = format!("{} {} ${}", column.qualified(), operator, param_counter);
        *param_counter += 1;
        (sql, vec![value.into()])
    }
}

impl From<&ConditionValue> for SqlParameter {
    fn from(value: &ConditionValue) -> Self {
        match value {
            ConditionValue::Text(s) => SqlParameter::Text(s.clone()),
            ConditionValue::Integer(i) => SqlParameter::Integer(*i),
            ConditionValue::Boolean(b) => SqlParameter::Boolean(*b),
            ConditionValue::Timestamp(t) => SqlParameter::Timestamp(*t),
        }
    }
}

// SQL parameter that will be bound to query
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParameter {
    Text(String),
    Integer(i32),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
}

impl SqlParameter {
    /// Bind to sqlx query
    pub fn bind_to_query<'q>(
        self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        match self {
            SqlParameter::Text(s) => query.bind(s),
            SqlParameter::Integer(i) => query.bind(i),
            SqlParameter::Boolean(b) => query.bind(b),
            SqlParameter::Timestamp(t) => query.bind(t),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use crate::infrastructure::persistence::schema::{
        END_DATE_COLUMN, ITEM_TYPE_COLUMN, START_DATE_COLUMN, UID_COLUMN, VERSION_UID_COLUMN,
    };

    use super::*;

    #[test]
    fn simple_select() {
        let (sql, params) = QueryBuilder::from(Table::roots("cmdr"))
            .select(vec![Cow::Borrowed(&UID_COLUMN)])
            .where_condition(Condition::Equals {
                column: Cow::Borrowed(&ITEM_TYPE_COLUMN),
                value: ConditionValue::Text("compound".to_string()),
            })
            .build();

        assert_eq!(
            sql,
            "SELECT \"r\".\"uid\"\nFROM \"cmdr\".\"cmdr_item_roots\" AS \"r\"\nWHERE \"r\".\"item_type\" = $1"
        );
        assert_eq!(params, vec![SqlParameter::Text("compound".to_string())]);
    }

    #[test]
    fn parameters_are_numbered_across_nested_conditions() {
        let at = Utc::now();
        let (sql, params) = QueryBuilder::from(Table::versions("cmdr"))
            .select(vec![Cow::Borrowed(&VERSION_UID_COLUMN)])
            .join(
                Table::roots("cmdr"),
                Cow::Borrowed(&VERSION_UID_COLUMN),
                Cow::Borrowed(&UID_COLUMN),
            )
            .where_condition(Condition::Equals {
                column: Cow::Borrowed(&VERSION_UID_COLUMN),
                value: ConditionValue::Text("Compound_000001".to_string()),
            })
            .where_condition(Condition::LessThanOrEqual {
                column: Cow::Borrowed(&START_DATE_COLUMN),
                value: ConditionValue::Timestamp(at),
            })
            .where_condition(Condition::Or(
                Box::new(Condition::IsNull {
                    column: Cow::Borrowed(&END_DATE_COLUMN),
                }),
                Box::new(Condition::GreaterThan {
                    column: Cow::Borrowed(&END_DATE_COLUMN),
                    value: ConditionValue::Timestamp(at),
                }),
            ))
            .build();

        assert!(sql.contains(
            "INNER JOIN \"cmdr\".\"cmdr_item_roots\" AS \"r\" ON \"v\".\"uid\" = \"r\".\"uid\""
        ));
        assert!(sql.contains(
            "WHERE \"v\".\"uid\" = $1 AND \"v\".\"start_date\" <= $2 AND (\"v\".\"end_date\" IS NULL OR \"v\".\"end_date\" > $3)"
        ));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn distinct_on_with_paging_and_lock() {
        let (sql, _) = QueryBuilder::from(Table::versions("cmdr"))
            .distinct_on(vec![Cow::Borrowed(&VERSION_UID_COLUMN)])
            .select(vec![Cow::Borrowed(&VERSION_UID_COLUMN)])
            .order_by(Cow::Borrowed(&VERSION_UID_COLUMN), SortDirection::Ascending)
            .order_by(Cow::Borrowed(&START_DATE_COLUMN), SortDirection::Descending)
            .limit(Some(10))
            .offset(Some(20))
            .build();

        assert!(sql.starts_with("SELECT DISTINCT ON (\"v\".\"uid\") \"v\".\"uid\""));
        assert!(sql.contains("ORDER BY \"v\".\"uid\" ASC, \"v\".\"start_date\" DESC"));
        assert!(sql.ends_with("LIMIT 10\nOFFSET 20"));
    }

    #[test]
    fn lock_clause_closes_the_statement() {
        let (sql, _) = QueryBuilder::from(Table::roots("cmdr"))
            .select(vec![Cow::Borrowed(&UID_COLUMN)])
            .for_update()
            .build();

        assert!(sql.ends_with("\nFOR UPDATE"));
    }
}
