//! Artifact replay
//!
//! Splits an artifact into statements and runs them all inside one
//! transaction. The first failing statement aborts the replay and nothing
//! is committed.

use crate::error::AppError;
use deadpool_postgres::Pool;
use serde::Serialize;
use tracing::{debug, error, info};

/// Characters of a failing statement quoted back in the error
const FRAGMENT_PREVIEW: usize = 80;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub statements: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexical {
    Code,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
}

/// Split on `;` directly followed by a line break. Semicolons inside quoted
/// literals, quoted identifiers and `--` comments do not split. Fragments are
/// trimmed; empty and comment-only fragments are dropped.
pub fn split_statements(body: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut state = Lexical::Code;
    let mut start = 0;
    let mut chars = body.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        match (state, c) {
            (Lexical::Code, '\'') => state = Lexical::SingleQuoted,
            (Lexical::Code, '"') => state = Lexical::DoubleQuoted,
            (Lexical::Code, '-') if matches!(chars.peek(), Some((_, '-'))) => {
                chars.next();
                state = Lexical::LineComment;
            }
            (Lexical::Code, ';') => {
                let line_break = match chars.peek() {
                    Some((_, '\n')) => 1,
                    Some((_, '\r')) if body[idx + 1..].starts_with("\r\n") => 2,
                    _ => 0,
                };
                if line_break > 0 {
                    push_fragment(&mut statements, &body[start..idx]);
                    for _ in 0..line_break {
                        chars.next();
                    }
                    start = idx + 1 + line_break;
                }
            }
            (Lexical::SingleQuoted, '\'') | (Lexical::DoubleQuoted, '"') => state = Lexical::Code,
            (Lexical::LineComment, '\n') => state = Lexical::Code,
            _ => {}
        }
    }

    push_fragment(&mut statements, &body[start..]);
    statements
}

fn push_fragment(statements: &mut Vec<String>, fragment: &str) {
    let fragment = fragment.trim();
    let comment_only = fragment
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"));

    if !comment_only {
        statements.push(fragment.to_string());
    }
}

fn preview(statement: &str) -> String {
    statement.chars().take(FRAGMENT_PREVIEW).collect()
}

/// Replay an artifact body against the pool's database
pub async fn replay(pool: &Pool, body: &str) -> Result<ReplayReport, AppError> {
    let statements = split_statements(body);
    info!("Replaying {} statements in one transaction", statements.len());

    let mut client = pool.get().await?;
    let transaction = client.transaction().await?;

    for (i, statement) in statements.iter().enumerate() {
        debug!("Statement {}: {}", i + 1, preview(statement));

        if let Err(source) = transaction.batch_execute(statement).await {
            let fragment = preview(statement);
            error!("Replay failed at statement {} ({}...): {}", i + 1, fragment, source);
            // Dropping the transaction rolls everything back
            return Err(AppError::Replay {
                position: i + 1,
                fragment,
                source,
            });
        }
    }

    transaction.commit().await?;
    info!("Replay committed ({} statements)", statements.len());

    Ok(ReplayReport {
        statements: statements.len(),
    })
}
