use crate::{
    error::Result,
    grammar::Grammar,
    query::{Builder, ColumnRef, Row},
};

/// MySQL: backtick quoting, `insert ignore` and `on duplicate key update`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlGrammar;

impl Grammar for MySqlGrammar {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn operators(&self) -> &[&'static str] {
        &["sounds like"]
    }

    fn compile_random(&self, seed: &str) -> String {
        format!("rand({seed})")
    }

    fn compile_ifnull(&self, expression: &str, default: &str) -> String {
        format!("ifnull({expression}, {default})")
    }

    fn compile_insert_or_ignore(&self, query: &Builder, rows: &[Row]) -> Result<String> {
        let sql = self.compile_insert(query, rows)?;
        Ok(sql.replacen("insert", "insert ignore", 1))
    }

    fn compile_upsert(&self, query: &Builder, rows: &[Row], _unique_by: &[String], update: &[String]) -> Result<String> {
        let sql = self.compile_insert(query, rows)?;
        let columns = update
            .iter()
            .map(|column| {
                let wrapped = self.wrap(&ColumnRef::from(column));
                format!("{wrapped} = values({wrapped})")
            })
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("{sql} on duplicate key update {columns}"))
    }
}
