//! Inspect command implementation.

use super::{emit, open_existing};
use crate::OutputFormat;
use murmur_core::{ReplicaStore, StoreCounts};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Replica inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Journal path.
    pub path: String,
    /// Journal size in bytes.
    pub journal_size: u64,
    /// Rows per table.
    pub counts: StoreCounts,
    /// Distinct post authors.
    pub authors: usize,
    /// Most popular posts, if requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popular: Option<Vec<PostSummary>>,
}

/// One line of the popular list.
#[derive(Debug, Serialize)]
pub struct PostSummary {
    /// Post id.
    pub id: String,
    /// Author public key, hex.
    pub author: String,
    /// Upvotes minus downvotes.
    pub score: i128,
    /// Comment count.
    pub comments: u64,
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    popular: Option<usize>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let mut result = inspect(&store, popular);
    result.path = path.display().to_string();
    result.journal_size = std::fs::metadata(path)?.len();
    emit(format, &result, print_text_output)
}

fn inspect(store: &ReplicaStore, popular: Option<usize>) -> InspectResult {
    let latest = store.list_latest(usize::MAX);
    let authors: BTreeSet<_> = latest.iter().map(|p| p.author_public_key).collect();

    InspectResult {
        path: String::new(),
        journal_size: 0,
        counts: store.counts(),
        authors: authors.len(),
        popular: popular.map(|limit| {
            store
                .list_popular(limit)
                .into_iter()
                .map(|p| PostSummary {
                    id: p.id.to_string(),
                    author: p.author_public_key.to_hex(),
                    score: p.score(),
                    comments: p.comment_count,
                })
                .collect()
        }),
    }
}

fn print_text_output(result: &InspectResult) {
    println!("murmur Replica Inspection");
    println!("=========================");
    println!();
    println!("Path: {}", result.path);
    println!("Journal size: {}", format_size(result.journal_size));
    println!();
    println!("Tables:");
    println!("  Posts:         {}", result.counts.posts);
    println!("  Comments:      {}", result.counts.comments);
    println!("  Votes:         {}", result.counts.votes);
    println!("  Notifications: {}", result.counts.notifications);
    println!();
    println!("Authors: {}", result.authors);

    if let Some(popular) = &result.popular {
        println!();
        println!("Popular:");
        for post in popular {
            println!(
                "  {} score {:+} comments {} by {}..",
                post.id,
                post.score,
                post.comments,
                &post.author[..16]
            );
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
