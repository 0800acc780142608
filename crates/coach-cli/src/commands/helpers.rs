//! Helper utility functions for CLI commands

use anyhow::{Context, Result};
use std::path::PathBuf;

use coach_storage::Database;

/// Safely truncate a string to a maximum number of characters (not bytes).
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

/// Open the database at `path`, or the default location
pub fn open_database(path: Option<PathBuf>) -> Result<Database> {
    Database::new(path).context("Failed to open database")
}

pub fn print_heading(title: &str) {
    println!("\n{title}");
    println!("{}", "\u{2550}".repeat(title.chars().count().max(14)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_short() {
        assert_eq!(truncate_str("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_str_exact() {
        assert_eq!(truncate_str("hello", 5), "hello");
    }

    #[test]
    fn test_truncate_str_long() {
        assert_eq!(truncate_str("take a short break", 7), "take a ...");
    }

    #[test]
    fn test_truncate_str_unicode() {
        assert_eq!(truncate_str("\u{4f11}\u{606f}\u{4e00}\u{4e0b}", 2), "\u{4f11}\u{606f}...");
    }

    #[test]
    fn test_open_database_at_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = open_database(Some(dir.path().join("nested").join("coach.db"))).unwrap();
        assert!(db.list_sessions().unwrap().is_empty());
    }
}
