//! Prompt assembly and answer parsing for the chat model.

use regex::Regex;

use crate::llm::ChatMessage;
use crate::store::TrainingEntry;

const RESPONSE_GUIDELINES: &str = "\
===Response Guidelines
1. If the provided context is sufficient, please generate a valid SQL query without any explanations for the question.
2. If the provided context is almost sufficient but requires knowledge of a specific string in a particular column, please generate an intermediate SQL query to find the distinct strings in that column. Prepend the query with a comment saying intermediate_sql
3. If the provided context is insufficient, please explain why it can't be generated.
4. Please use the most relevant table(s).
5. If the question has been asked and answered before, please repeat the answer exactly as it was given before.
";

/// Build the message log for SQL generation.
///
/// Context is appended in order (DDL, documentation, examples) while it fits
/// in `max_chars`; whatever does not fit is dropped.
pub fn sql_prompt(
    dialect: &str,
    question: &str,
    ddl: &[TrainingEntry],
    documentation: &[TrainingEntry],
    examples: &[TrainingEntry],
    max_chars: usize,
) -> Vec<ChatMessage> {
    let mut system = format!(
        "You are a {dialect} expert. Please help to generate a SQL query to answer the question. \
         Your response should ONLY be based on the given context and follow the response guidelines \
         and format instructions.\n"
    );
    let mut used = system.len() + RESPONSE_GUIDELINES.len() + question.len();

    append_section(&mut system, &mut used, max_chars, "===Tables", ddl);
    append_section(&mut system, &mut used, max_chars, "===Additional Context", documentation);
    system.push_str(RESPONSE_GUIDELINES);

    let mut messages = vec![ChatMessage::system(system)];

    for example in examples {
        let Some(q) = example.question.as_deref() else {
            continue;
        };
        let cost = q.len() + example.content.len();
        if used + cost > max_chars {
            break;
        }
        used += cost;
        messages.push(ChatMessage::user(q));
        messages.push(ChatMessage::assistant(example.content.clone()));
    }

    messages.push(ChatMessage::user(question));
    messages
}

fn append_section(
    out: &mut String,
    used: &mut usize,
    max_chars: usize,
    header: &str,
    entries: &[TrainingEntry],
) {
    let mut body = String::new();
    for entry in entries {
        let cost = entry.content.len() + 2;
        if *used + header.len() + cost > max_chars {
            break;
        }
        *used += cost;
        body.push_str(&entry.content);
        body.push_str("\n\n");
    }
    if !body.is_empty() {
        *used += header.len() + 2;
        out.push('\n');
        out.push_str(header);
        out.push('\n');
        out.push_str(&body);
    }
}

pub fn explanation_prompt(sql: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "You are a helpful SQL assistant. Explain the following SQL query in plain English without technical jargon.",
        ),
        ChatMessage::user(format!("Explain this SQL query: {sql}")),
    ]
}

pub fn question_prompt(sql: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "The user will give you SQL and you will try to guess what the business question this query is answering. \
             Return just the question without any additional explanation. Do not reference the table name in the question.",
        ),
        ChatMessage::user(sql),
    ]
}

/// Pull a SQL statement out of a model answer.
///
/// Looks for a ```sql fence, then any fence, then a `WITH … ;` or
/// `SELECT … ;` starting on its own line. Keywords in the bare fallbacks are
/// matched in upper case only, so prose such as "customers with orders" is
/// never taken for a statement. A fence holding anything other than a read
/// query ends the search: the model answered with a write, and a subquery
/// inside it must not be run on its own.
///
/// Returns `None` when the answer contains no query (the model explained why
/// it could not answer, for instance).
pub fn extract_sql(answer: &str) -> Option<String> {
    let fences = [r"(?is)```sql[ \t]*\n?(.*?)```", r"(?s)```[ \t]*\n?(.*?)```"];
    for pattern in fences {
        let Some(body) = first_capture(pattern, answer) else {
            continue;
        };
        if looks_like_sql(body) {
            return Some(body.to_string());
        }
        if !body.is_empty() {
            return None;
        }
    }

    let statements = [r"(?ms)^[ \t]*(WITH\b.*?;)", r"(?ms)^[ \t]*(SELECT\b.*?;)"];
    for pattern in statements {
        if let Some(sql) = first_capture(pattern, answer) {
            return Some(sql.to_string());
        }
    }

    let trimmed = answer.trim();
    (looks_like_sql(trimmed) && (trimmed.ends_with(';') || starts_upper(trimmed)))
        .then(|| trimmed.to_string())
}

fn first_capture<'a>(pattern: &str, text: &'a str) -> Option<&'a str> {
    let re = Regex::new(pattern).ok()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

fn first_word(text: &str) -> Option<&str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("--"))
        .flat_map(str::split_whitespace)
        .next()
}

fn looks_like_sql(text: &str) -> bool {
    matches!(
        first_word(text).map(str::to_ascii_uppercase).as_deref(),
        Some("SELECT" | "WITH" | "VALUES" | "TABLE")
    )
}

fn starts_upper(text: &str) -> bool {
    first_word(text).is_some_and(|w| !w.chars().any(|c| c.is_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use crate::store::TrainingKind;
    use chrono::Utc;
    use uuid::Uuid;

    fn entry(kind: TrainingKind, question: Option<&str>, content: &str) -> TrainingEntry {
        TrainingEntry {
            id: Uuid::new_v4(),
            kind,
            question: question.map(str::to_string),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_sql_prompt_layout() {
        let ddl = vec![entry(TrainingKind::Ddl, None, "CREATE TABLE users (\n  id integer NOT NULL\n);")];
        let docs = vec![entry(TrainingKind::Documentation, None, "Users are customers.")];
        let examples = vec![entry(TrainingKind::Sql, Some("How many users?"), "SELECT count(*) FROM users;")];

        let messages = sql_prompt("PostgreSQL", "List all users", &ddl, &docs, &examples, 10_000);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        let system = &messages[0].content;
        assert!(system.starts_with("You are a PostgreSQL expert."));
        let tables_at = system.find("===Tables").unwrap();
        let context_at = system.find("===Additional Context").unwrap();
        let guidelines_at = system.find("===Response Guidelines").unwrap();
        assert!(tables_at < context_at && context_at < guidelines_at);
        assert!(system.contains("CREATE TABLE users"));

        assert_eq!(messages[1], ChatMessage::user("How many users?"));
        assert_eq!(messages[2], ChatMessage::assistant("SELECT count(*) FROM users;"));
        assert_eq!(messages[3], ChatMessage::user("List all users"));
    }

    #[test]
    fn test_sql_prompt_drops_context_over_budget() {
        let ddl = vec![
            entry(TrainingKind::Ddl, None, "CREATE TABLE small (id integer);"),
            entry(TrainingKind::Ddl, None, &"x".repeat(5_000)),
        ];
        let examples = vec![entry(TrainingKind::Sql, Some("q"), &"SELECT 1;".repeat(500))];

        let messages = sql_prompt("PostgreSQL", "question", &ddl, &[], &examples, 2_000);

        let system = &messages[0].content;
        assert!(system.contains("CREATE TABLE small"));
        assert!(!system.contains("xxxxx"));
        assert!(!system.contains("===Additional Context"));
        assert_eq!(messages.len(), 2, "oversized example should be skipped");
    }

    #[test]
    fn test_sql_prompt_without_context() {
        let messages = sql_prompt("PostgreSQL", "question", &[], &[], &[], 10_000);
        assert_eq!(messages.len(), 2);
        assert!(!messages[0].content.contains("===Tables"));
        assert!(messages[0].content.contains("===Response Guidelines"));
    }

    #[test]
    fn test_extract_sql_from_fenced_block() {
        let answer = "Here you go:\n```sql\nSELECT name FROM users WHERE active;\n```\nThis lists users.";
        assert_eq!(
            extract_sql(answer).as_deref(),
            Some("SELECT name FROM users WHERE active;")
        );
    }

    #[test]
    fn test_extract_sql_from_plain_fence() {
        let answer = "```\nWITH t AS (SELECT 1) SELECT * FROM t;\n```";
        assert_eq!(extract_sql(answer).as_deref(), Some("WITH t AS (SELECT 1) SELECT * FROM t;"));
    }

    #[test]
    fn test_extract_sql_bare_statement() {
        let answer = "The query is:\nSELECT count(*) FROM orders;\nIt counts orders.";
        assert_eq!(extract_sql(answer).as_deref(), Some("SELECT count(*) FROM orders;"));
    }

    #[test]
    fn test_extract_sql_ignores_keywords_in_prose() {
        let answer = "Here is a query for customers with orders:\n\
                      SELECT c.name FROM customers c JOIN orders o ON o.customer_id = c.id;";
        assert_eq!(
            extract_sql(answer).as_deref(),
            Some("SELECT c.name FROM customers c JOIN orders o ON o.customer_id = c.id;")
        );

        let answer = "You can select active users with this query:\n\
                      WITH a AS (SELECT id FROM users WHERE active) SELECT count(*) FROM a;";
        assert_eq!(
            extract_sql(answer).as_deref(),
            Some("WITH a AS (SELECT id FROM users WHERE active) SELECT count(*) FROM a;")
        );
    }

    #[test]
    fn test_extract_sql_none_for_fenced_write_with_subquery() {
        let answer = "```sql\nDELETE FROM users\nWHERE id IN (\nSELECT id FROM banned);\n```";
        assert_eq!(extract_sql(answer), None);

        let answer = "```\nUPDATE users SET active = false WHERE id IN (\nSELECT id FROM banned);\n```";
        assert_eq!(extract_sql(answer), None);
    }

    #[test]
    fn test_extract_sql_none_for_prose_starting_with_keyword() {
        assert_eq!(extract_sql("With the tables available I cannot answer that."), None);
        assert_eq!(extract_sql("Select a narrower time range and ask again"), None);
    }

    #[test]
    fn test_extract_sql_whole_answer_without_semicolon() {
        assert_eq!(
            extract_sql("  SELECT id FROM users\n").as_deref(),
            Some("SELECT id FROM users")
        );
    }

    #[test]
    fn test_extract_sql_none_for_refusal() {
        let answer = "The provided context is insufficient: there is no table with shipping data.";
        assert_eq!(extract_sql(answer), None);
    }

    #[test]
    fn test_extract_sql_keeps_intermediate_comment() {
        let answer = "```sql\n-- intermediate_sql\nSELECT DISTINCT status FROM orders;\n```";
        let sql = extract_sql(answer).unwrap();
        assert!(sql.starts_with("-- intermediate_sql"));
        assert!(sql.ends_with("FROM orders;"));
    }

    #[test]
    fn test_explanation_and_question_prompts() {
        let explain = explanation_prompt("SELECT 1;");
        assert_eq!(explain[1].content, "Explain this SQL query: SELECT 1;");
        let question = question_prompt("SELECT 1;");
        assert_eq!(question[0].role, Role::System);
        assert_eq!(question[1].content, "SELECT 1;");
    }
}
