use crate::sql::base::{error::DbError, query::dialect::Dialect, requests::FetchRowsRequest};
use model::{
    core::value::Value,
    pagination::position::{OffsetColumn, TablePosition},
};

pub struct QueryGenerator<'a> {
    dialect: &'a dyn Dialect,
}

impl<'a> QueryGenerator<'a> {
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self { dialect }
    }

    /// Generates the keyset SELECT for a fetch request and its parameters.
    ///
    /// `SELECT <cols> FROM <table> [WHERE <keyset>] ORDER BY <offset cols> [LIMIT n]`
    pub fn select(&self, request: &FetchRowsRequest) -> Result<(String, Vec<Value>), DbError> {
        if request.offset_columns.is_empty() {
            return Err(DbError::QueryBuildError(format!(
                "no offset columns for table {}",
                request.table
            )));
        }

        let columns = if request.columns.is_empty() {
            "*".to_string()
        } else {
            self.ident_list(request.columns.iter().map(String::as_str))
        };
        let table = format!(
            "{}.{}",
            self.dialect.quote_identifier(request.table.schema()),
            self.dialect.quote_identifier(request.table.name())
        );

        let mut sql = format!("SELECT {columns} FROM {table}");
        let mut params = Vec::new();

        if let Some(predicate) =
            self.keyset_predicate(&request.offset_columns, &request.position, &mut params)?
        {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }

        sql.push_str(" ORDER BY ");
        sql.push_str(&self.ident_list(request.offset_columns.iter().map(|c| c.name.as_str())));

        if let Some(limit) = request.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        Ok((sql, params))
    }

    /// Lexicographic "greater than position" predicate:
    /// `(c1 > v1) OR (c1 = v1 AND c2 > v2) OR ...`.
    ///
    /// A column without a lower bound ends the expansion with a disjunct of
    /// the preceding equalities only; if the first column is unbounded there
    /// is no predicate at all.
    pub fn keyset_predicate(
        &self,
        offset_columns: &[OffsetColumn],
        position: &TablePosition,
        params: &mut Vec<Value>,
    ) -> Result<Option<String>, DbError> {
        if position.columns().len() != offset_columns.len() {
            return Err(DbError::QueryBuildError(format!(
                "position has {} columns, expected {}",
                position.columns().len(),
                offset_columns.len()
            )));
        }

        let mut disjuncts = Vec::new();

        for (i, bound) in position.columns().iter().enumerate() {
            let mut terms = Vec::with_capacity(i + 1);
            for (column, prefix) in offset_columns.iter().zip(position.columns()).take(i) {
                // Earlier bounds are always present here.
                let value = prefix.value.clone().unwrap_or(Value::Null);
                terms.push(self.comparison(column, "=", value, params));
            }

            match &bound.value {
                Some(value) => {
                    terms.push(self.comparison(&offset_columns[i], ">", value.clone(), params));
                    disjuncts.push(terms.join(" AND "));
                }
                None => {
                    if i > 0 {
                        disjuncts.push(terms.join(" AND "));
                    }
                    break;
                }
            }
        }

        Ok(match disjuncts.len() {
            0 => None,
            1 => Some(disjuncts.remove(0)),
            _ => Some(
                disjuncts
                    .iter()
                    .map(|d| format!("({d})"))
                    .collect::<Vec<_>>()
                    .join(" OR "),
            ),
        })
    }

    fn comparison(
        &self,
        column: &OffsetColumn,
        op: &str,
        value: Value,
        params: &mut Vec<Value>,
    ) -> String {
        let placeholder = self.dialect.get_placeholder(params.len(), &column.data_type);
        params.push(value);
        format!(
            "{} {op} {placeholder}",
            self.dialect.quote_identifier(&column.name)
        )
    }

    fn ident_list<'s>(&self, names: impl Iterator<Item = &'s str>) -> String {
        names
            .map(|n| self.dialect.quote_identifier(n))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
