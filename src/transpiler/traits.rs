/// Dialect-specific SQL spelling.
pub trait SqlGenerator: Send + Sync {
    /// Quote an identifier (table or column name).
    fn quote_identifier(&self, name: &str) -> String;

    /// Positional placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String;

    /// LIMIT/OFFSET suffix, with a leading space when non-empty.
    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        let mut sql = String::new();
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }
        if let Some(n) = offset {
            sql.push_str(&format!(" OFFSET {}", n));
        }
        sql
    }
}

/// Double-quote an identifier, doubling embedded quotes (ANSI).
pub fn escape_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
