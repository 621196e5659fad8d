use crate::config::Config;
use crate::db::schema::SchemaCatalog;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Why a statement was refused. Stable, safe to surface to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    TooLong,
    ContainsComment,
    MultipleStatements,
    NotSelect,
    ForbiddenKeyword,
    InjectionPattern,
    UnauthorizedTable,
    SchemaUnknownTable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub detail: String,
}

impl Rejection {
    fn new(kind: RejectionKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Statements that write, define, or escalate. Word-bounded so identifiers
/// like `created_at` never trip the scan.
static FORBIDDEN_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(insert|update|delete|drop|create|alter|truncate|replace|merge|grant|revoke|exec|execute|call|pragma|procedure|function)\b",
    )
    .unwrap()
});

/// SQL injection fingerprints.
static INJECTION_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i)\bor\s+\d+\s*=\s*\d+").unwrap(),
            "numeric tautology after OR",
        ),
        (
            Regex::new(r"(?i)\bor\s*'[^']*'\s*=\s*'[^']*'").unwrap(),
            "quoted tautology after OR",
        ),
        (
            Regex::new(r"(?i)\bunion\s+(all|select)\b").unwrap(),
            "UNION-based injection",
        ),
        (Regex::new(r"(?i)0x[0-9a-f]+").unwrap(), "hex literal"),
        (
            Regex::new(r"(?i)\b(xp|sp)_\w+").unwrap(),
            "system procedure prefix",
        ),
        (
            Regex::new(r"(?i)\b(information_schema|sqlite_master)\b").unwrap(),
            "system catalog access",
        ),
        (
            Regex::new(r"(?i);\s*(drop|delete|update)\b").unwrap(),
            "stacked statement",
        ),
        (
            Regex::new(r"(?i)\bwaitfor\s+delay\b").unwrap(),
            "time-delay probe",
        ),
        (
            Regex::new(r"(?i)\bbenchmark\s*\(").unwrap(),
            "time-delay probe",
        ),
        (Regex::new(r"(?i)\bsleep\s*\(").unwrap(), "time-delay probe"),
    ]
});

static STARTS_WITH_SELECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^select\b").unwrap());

static LIMIT_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blimit\s+(\d+)\b").unwrap());

/// Validate an arbitrary string against the read-only SELECT policy.
///
/// Returns the normalized statement (lowercased outside string literals,
/// single-spaced, no trailing semicolon, LIMIT guaranteed) or the first
/// rejection the ordered pipeline produces. Pure: no I/O, no panics, same
/// input yields the same verdict.
pub fn validate_sql(
    raw: &str,
    catalog: &SchemaCatalog,
    config: &Config,
) -> Result<String, Rejection> {
    // Cheap lexical checks run first so adversarial input is refused with
    // minimal work.
    if raw.chars().count() > config.max_query_length {
        return Err(Rejection::new(
            RejectionKind::TooLong,
            format!("query exceeds {} characters", config.max_query_length),
        ));
    }

    let normalized = normalize(raw);

    // Comments can hide semicolons, so this must precede statement splitting.
    if normalized.contains("--") || normalized.contains("/*") || normalized.contains("*/") {
        return Err(Rejection::new(
            RejectionKind::ContainsComment,
            "SQL comments are not allowed",
        ));
    }

    let stmt = normalized
        .strip_suffix(';')
        .map(str::trim_end)
        .unwrap_or(&normalized)
        .to_string();

    if stmt.contains(';') {
        return Err(Rejection::new(
            RejectionKind::MultipleStatements,
            "multiple statements are not allowed",
        ));
    }

    if !STARTS_WITH_SELECT.is_match(&stmt) {
        return Err(Rejection::new(
            RejectionKind::NotSelect,
            "only SELECT statements are allowed",
        ));
    }

    if let Some(m) = FORBIDDEN_KEYWORDS.find(&stmt) {
        return Err(Rejection::new(
            RejectionKind::ForbiddenKeyword,
            format!("forbidden keyword: {}", m.as_str().to_uppercase()),
        ));
    }

    for (pattern, what) in INJECTION_PATTERNS.iter() {
        if pattern.is_match(&stmt) {
            return Err(Rejection::new(
                RejectionKind::InjectionPattern,
                format!("injection pattern detected: {}", what),
            ));
        }
    }

    let tables = referenced_tables(&stmt);
    if tables.is_empty() {
        return Err(Rejection::new(
            RejectionKind::SchemaUnknownTable,
            "statement does not reference any known table",
        ));
    }
    for table in &tables {
        if !catalog.table_exists(table) {
            return Err(Rejection::new(
                RejectionKind::UnauthorizedTable,
                format!("table '{}' is not in the allowed set", table),
            ));
        }
    }

    // The one place the validator rewrites semantics: every accepted
    // statement carries a bounded LIMIT.
    Ok(enforce_limit(stmt, config.default_limit, config.max_limit))
}

/// Collapse whitespace runs, trim, and lowercase everything outside
/// single-quoted literals.
fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_string = false;
    let mut pending_space = false;

    for ch in raw.trim().chars() {
        if ch == '\'' {
            in_string = !in_string;
        }

        if ch.is_whitespace() && !in_string {
            pending_space = true;
            continue;
        }

        if pending_space {
            out.push(' ');
            pending_space = false;
        }

        if in_string || ch == '\'' {
            out.push(ch);
        } else {
            out.push(ch.to_ascii_lowercase());
        }
    }

    out
}

/// Keywords that end a FROM list. Anything else between a table and the
/// next comma is treated as an alias.
fn ends_table_list(token: &str) -> bool {
    matches!(
        token,
        "on" | "using"
            | "where"
            | "group"
            | "order"
            | "having"
            | "limit"
            | "offset"
            | "join"
            | "inner"
            | "left"
            | "right"
            | "full"
            | "cross"
            | "natural"
            | "for"
    )
}

/// Table names referenced after FROM or JOIN, alias-stripped and
/// lowercased. Comma-separated FROM lists are walked even when every table
/// carries an alias (`from accounts a, customers c`); derived tables
/// (subqueries) contribute through their own inner FROM.
fn referenced_tables(stmt: &str) -> Vec<String> {
    let tokens: Vec<&str> = stmt.split_whitespace().collect();
    let mut tables = Vec::new();

    let mut i = 0;
    while i < tokens.len() {
        if tokens[i] == "from" || tokens[i] == "join" {
            let mut j = i + 1;
            let mut expect_table = true;
            while let Some(&token) = tokens.get(j) {
                if token == "," {
                    expect_table = true;
                    j += 1;
                    continue;
                }

                if expect_table {
                    if let Some(name) = table_name(token) {
                        if !tables.contains(&name) {
                            tables.push(name);
                        }
                    }
                    expect_table = false;
                } else if ends_table_list(token) {
                    break;
                }
                // Otherwise the token is an alias (or `as`); only a trailing
                // comma matters for whether the list continues.

                if token.ends_with(',') {
                    expect_table = true;
                }
                j += 1;
            }
        }
        i += 1;
    }

    tables
}

fn table_name(token: &str) -> Option<String> {
    let trimmed = token.trim_matches(|c: char| matches!(c, '(' | ')' | ',' | '"' | '`' | ';'));

    // A parenthesized subquery is not a table reference.
    if trimmed.is_empty() || trimmed == "select" || token.starts_with('(') {
        return None;
    }

    // Strip a schema qualifier if present.
    let name = match trimmed.rfind('.') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    };

    if name.is_empty() {
        None
    } else {
        Some(name.to_lowercase())
    }
}

/// Blank out the contents of single-quoted literals, byte-for-byte, so a
/// lexical scan over the result cannot match inside string data while every
/// match offset stays valid in the original statement.
fn mask_string_literals(stmt: &str) -> String {
    let mut out = String::with_capacity(stmt.len());
    let mut in_string = false;

    for ch in stmt.chars() {
        if ch == '\'' {
            in_string = !in_string;
            out.push('\'');
        } else if in_string {
            for _ in 0..ch.len_utf8() {
                out.push(' ');
            }
        } else {
            out.push(ch);
        }
    }

    out
}

fn enforce_limit(stmt: String, default_limit: u64, max_limit: u64) -> String {
    // Scan the masked statement: `limit 500` inside a string literal is
    // data, not a LIMIT clause.
    let masked = mask_string_literals(&stmt);

    let (clause, count) = match LIMIT_CLAUSE
        .captures(&masked)
        .and_then(|caps| caps.get(0).zip(caps.get(1)))
    {
        None => return format!("{} limit {}", stmt, default_limit),
        Some(found) => found,
    };

    let in_bounds = count
        .as_str()
        .parse::<u64>()
        .is_ok_and(|n| n >= 1 && n <= max_limit);

    if in_bounds {
        stmt
    } else {
        // Mask offsets are statement offsets, so splice on the original.
        format!(
            "{}limit {}{}",
            &stmt[..clause.start()],
            max_limit,
            &stmt[clause.end()..]
        )
    }
}
