//! Filtering, sorting and pagination over a snapshot.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::types::{ProcessInfo, Snapshot};

/// Sort key. Deserializes leniently through [`SortField::parse`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum SortField {
    #[default]
    Pid,
    Name,
    Cpu,
    Memory,
}

impl SortField {
    /// Parse a sort key; anything unrecognised sorts by PID
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "name" => SortField::Name,
            "cpu" => SortField::Cpu,
            "memory" | "mem" => SortField::Memory,
            _ => SortField::Pid,
        }
    }
}

impl From<String> for SortField {
    fn from(value: String) -> Self {
        SortField::parse(&value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryOptions {
    pub search_term: String,
    pub sort_by: SortField,
    pub sort_desc: bool,
    pub show_system: bool,
    /// 0 means no limit
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub items: Vec<ProcessInfo>,
    /// Number of matches before pagination
    pub total: usize,
}

fn matches_search(info: &ProcessInfo, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }

    info.name.to_lowercase().contains(term)
        || info.exe_path.to_lowercase().contains(term)
        || info.cmdline.to_lowercase().contains(term)
        || info.pid.to_string().contains(term)
}

fn compare(a: &ProcessInfo, b: &ProcessInfo, field: SortField) -> Ordering {
    match field {
        SortField::Pid => a.pid.cmp(&b.pid),
        SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortField::Cpu => a.cpu_percent.total_cmp(&b.cpu_percent),
        SortField::Memory => a.memory_bytes.cmp(&b.memory_bytes),
    }
}

/// Run a query against `snapshot`. Never fails; an out of range offset
/// simply yields no items.
pub fn query(snapshot: &Snapshot, options: &QueryOptions) -> QueryResult {
    let term = options.search_term.trim().to_lowercase();

    let mut items: Vec<ProcessInfo> = snapshot
        .iter()
        .filter(|p| options.show_system || !p.is_system)
        .filter(|p| matches_search(p, &term))
        .cloned()
        .collect();

    items.sort_by(|a, b| {
        let primary = compare(a, b, options.sort_by);
        let primary = if options.sort_desc {
            primary.reverse()
        } else {
            primary
        };
        primary.then_with(|| a.pid.cmp(&b.pid))
    });

    let total = items.len();
    if options.offset >= total {
        return QueryResult {
            items: Vec::new(),
            total,
        };
    }

    let end = if options.limit == 0 {
        total
    } else {
        options.offset.saturating_add(options.limit).min(total)
    };

    QueryResult {
        items: items.drain(options.offset..end).collect(),
        total,
    }
}
