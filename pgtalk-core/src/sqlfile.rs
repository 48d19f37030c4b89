//! Extract example queries from a hand-written `.sql` file for training.

use regex::Regex;
use std::path::Path;

/// Split a SQL script into individual statements.
///
/// Whole-line comments (`-- ====` banners or `-- Label` headings) start a
/// new block and trailing comments are dropped. Only fragments that contain
/// a recognisable SQL verb are kept. Each returned statement ends with `;`.
pub fn extract_sql_queries(content: &str) -> Vec<String> {
    let (Ok(marker), Ok(comment), Ok(terminator), Ok(verb)) = (
        Regex::new(r"(?m)^[ \t]*--[ \t]*(=+|\w+).*$"),
        Regex::new(r"(?m)--.*$"),
        Regex::new(r";\s*"),
        Regex::new(r"(?i)\b(SELECT|INSERT|UPDATE|DELETE|CREATE|ALTER|DROP|WITH)\b"),
    ) else {
        return Vec::new();
    };

    let mut queries = Vec::new();
    for block in marker.split(content) {
        let block = comment.replace_all(block, "");
        for fragment in terminator.split(&block) {
            let query = fragment.trim();
            if !query.is_empty() && verb.is_match(query) {
                queries.push(format!("{query};"));
            }
        }
    }
    queries
}

/// Read and split `path`. Returns `Ok(None)` when the file does not exist.
pub fn load_sql_queries(path: impl AsRef<Path>) -> std::io::Result<Option<Vec<String>>> {
    match std::fs::read_to_string(path.as_ref()) {
        Ok(content) => Ok(Some(extract_sql_queries(&content))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_statements_and_readds_semicolon() {
        let sql = "SELECT * FROM orders;\nselect count(*) from customers;";
        let queries = extract_sql_queries(sql);
        assert_eq!(
            queries,
            vec![
                "SELECT * FROM orders;".to_string(),
                "select count(*) from customers;".to_string(),
            ]
        );
    }

    #[test]
    fn test_section_markers_and_comments_are_removed() {
        let sql = "\
-- ==========
-- Top customers
SELECT name, SUM(total) AS spent
FROM orders
GROUP BY name; -- trailing note
-- Revenue by month
WITH monthly AS (SELECT date_trunc('month', created_at) m, total FROM orders)
SELECT m, SUM(total) FROM monthly GROUP BY m;
";
        let queries = extract_sql_queries(sql);
        assert_eq!(queries.len(), 2);
        assert!(queries[0].starts_with("SELECT name, SUM(total) AS spent"));
        assert!(queries[0].ends_with("GROUP BY name;"));
        assert!(!queries[0].contains("--"));
        assert!(queries[1].starts_with("WITH monthly AS"));
    }

    #[test]
    fn test_fragments_without_sql_verbs_are_dropped() {
        let sql = "just some notes;\nBEGIN;\nSELECT 1;";
        assert_eq!(extract_sql_queries(sql), vec!["SELECT 1;".to_string()]);
    }

    #[test]
    fn test_empty_input() {
        assert!(extract_sql_queries("").is_empty());
        assert!(extract_sql_queries("-- only a comment\n").is_empty());
    }

    #[test]
    fn test_load_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_sql_queries(dir.path().join("queries.sql")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_load_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queries.sql");
        std::fs::write(&path, "SELECT id FROM users;\n").unwrap();
        let result = load_sql_queries(&path).unwrap();
        assert_eq!(result, Some(vec!["SELECT id FROM users;".to_string()]));
    }
}
