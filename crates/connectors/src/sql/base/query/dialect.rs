//! Database-specific pieces of SQL syntax used by the query generator.

use model::core::data_type::DataType;

pub trait Dialect: Send + Sync {
    /// Wraps an identifier (like a table or column name) in the correct
    /// quotation marks for the dialect.
    fn quote_identifier(&self, ident: &str) -> String;

    /// Returns the placeholder for the parameter at `index` (zero based),
    /// typed for a column of `data_type` when the dialect needs it.
    fn get_placeholder(&self, index: usize, data_type: &DataType) -> String;

    /// Returns the name of the dialect (e.g., "PostgreSQL").
    fn name(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct Postgres;

impl Dialect for Postgres {
    fn quote_identifier(&self, ident: &str) -> String {
        format!(r#""{}""#, ident.replace('"', "\"\""))
    }

    fn get_placeholder(&self, index: usize, data_type: &DataType) -> String {
        // Parameters inside DECLARE have no column context, so they are cast
        // explicitly for type inference.
        let cast = match data_type {
            DataType::Short | DataType::Int | DataType::Long => "::int8",
            DataType::Float | DataType::Double => "::float8",
            DataType::Decimal => "::numeric",
            DataType::String => "::text",
            DataType::Boolean => "::bool",
            DataType::Uuid => "::uuid",
            DataType::Bytes => "::bytea",
            DataType::Date => "::date",
            DataType::Timestamp => "::timestamp",
            DataType::TimestampTz => "::timestamptz",
            DataType::Json => "::jsonb",
            DataType::Array(_) | DataType::Custom(_) => "",
        };
        format!("${}{}", index + 1, cast)
    }

    fn name(&self) -> String {
        "PostgreSQL".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_and_casts() {
        let dialect = Postgres;
        assert_eq!(dialect.quote_identifier("p_id"), "\"p_id\"");
        assert_eq!(dialect.quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(dialect.get_placeholder(0, &DataType::Int), "$1::int8");
        assert_eq!(dialect.get_placeholder(2, &DataType::Custom("x".into())), "$3");
    }
}
