//! Prompt templates for the three agents.
//!
//! Templates ship compiled in, but an operator can drop an override into
//! `prompts/<name>.txt` and have it picked up on the next request without a
//! restart: every load consults the file's mtime and re-reads on change.

mod templates;

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{LazyLock, Mutex};
use std::time::SystemTime;

pub const INTENT: &str = "intent";
pub const SQL_GENERATION: &str = "sql_generation";
pub const INSIGHT: &str = "insight";

const PROMPT_DIR: &str = "prompts";

static CACHE: LazyLock<Mutex<HashMap<String, (SystemTime, String)>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn builtin(name: &str) -> &'static str {
    match name {
        INTENT => templates::INTENT,
        SQL_GENERATION => templates::SQL_GENERATION,
        INSIGHT => templates::INSIGHT,
        _ => "",
    }
}

/// Load a prompt template by name, preferring a fresh on-disk override.
pub fn load(name: &str) -> String {
    let path = Path::new(PROMPT_DIR).join(format!("{}.txt", name));

    let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) else {
        return builtin(name).to_string();
    };

    // Fast path: unchanged since the last read.
    if let Ok(cache) = CACHE.lock() {
        if let Some((cached_mtime, text)) = cache.get(name) {
            if *cached_mtime == mtime {
                return text.clone();
            }
        }
    }

    match fs::read_to_string(&path) {
        Ok(text) => {
            if let Ok(mut cache) = CACHE.lock() {
                cache.insert(name.to_string(), (mtime, text.clone()));
            }
            text
        }
        Err(_) => builtin(name).to_string(),
    }
}
