use crate::allowlist::AllowlistIndex;
use crate::domain_utils::DomainUtils;
use crate::store::{LogRow, Table, TableRef, TableStore};
use std::collections::HashMap;

/// Columns a destination log must carry to take part in reconciliation.
pub const REQUIRED_COLUMNS: &[&str] = &["To", "From", "Subject", "Needs Draft", "Thread ID"];

pub const THREAD_ID: &str = "Thread ID";
pub const NEEDS_DRAFT: &str = "Needs Draft";

/// Most recent row of one thread inside one destination log.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadState {
    pub thread_id: String,
    pub row: LogRow,
    pub source: String,
}

/// What the hosting surface shows for one thread.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftCandidate {
    pub subject: String,
    pub to: String,
    pub from: String,
    pub needs_draft: String,
    pub thread_id: String,
    pub source: String,
}

impl DraftCandidate {
    pub fn has_draft(&self) -> bool {
        !self.needs_draft.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogScan {
    Scanned { threads: usize, matched: usize },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub candidates: Vec<DraftCandidate>,
    /// One entry per destination reference visited, in visit order
    pub logs: Vec<(String, LogScan)>,
}

impl ReconcileReport {
    pub fn skipped(&self) -> usize {
        self.logs
            .iter()
            .filter(|(_, scan)| matches!(scan, LogScan::Skipped { .. }))
            .count()
    }
}

/// Keep only the highest-index row per thread id. Threads come back in the
/// order their ids first appear in the log; rows without an id are ignored.
pub fn latest_per_thread(table: &Table, source: &str) -> Vec<ThreadState> {
    let Some(thread_col) = table.column(THREAD_ID) else {
        return Vec::new();
    };

    let mut order: Vec<String> = Vec::new();
    let mut latest: HashMap<String, usize> = HashMap::new();

    for index in 1..table.len() {
        let thread_id = table.cell(index, thread_col).trim();
        if thread_id.is_empty() {
            continue;
        }

        match latest.get_mut(thread_id) {
            Some(current) => {
                if index > *current {
                    *current = index;
                }
            }
            None => {
                order.push(thread_id.to_string());
                latest.insert(thread_id.to_string(), index);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|thread_id| {
            let row = table.log_row(latest[&thread_id])?;
            Some(ThreadState {
                thread_id,
                row,
                source: source.to_string(),
            })
        })
        .collect()
}

/// Whether `viewer` is the sender or the recipient of the thread's latest row.
pub fn involves_viewer(state: &ThreadState, viewer: &str) -> bool {
    let from = DomainUtils::extract_email(state.row.get("From"));
    let to = state.row.get("To").trim();
    viewer == to || viewer == from
}

fn candidate(state: &ThreadState) -> DraftCandidate {
    DraftCandidate {
        subject: state.row.get("Subject").to_string(),
        to: state.row.get("To").trim().to_string(),
        from: DomainUtils::extract_email(state.row.get("From")),
        needs_draft: state.row.get(NEEDS_DRAFT).to_string(),
        thread_id: state.thread_id.clone(),
        source: state.source.clone(),
    }
}

/// Scan every destination log reachable through the allowlist and collect
/// the latest row of each thread the viewer takes part in.
///
/// A log that cannot be resolved, read, or lacks a required column is
/// skipped and recorded; it never aborts the pass.
pub async fn collect_for_viewer(
    store: &dyn TableStore,
    allowlist: &AllowlistIndex,
    destination_tab: &str,
    viewer: &str,
) -> ReconcileReport {
    let viewer = viewer.trim();
    let mut report = ReconcileReport::default();

    for reference in allowlist.destinations() {
        let scan = match scan_log(store, reference, destination_tab, viewer).await {
            Ok((mut candidates, scan)) => {
                report.candidates.append(&mut candidates);
                scan
            }
            Err(reason) => {
                log::warn!("Skipping log {}: {}", reference, reason);
                LogScan::Skipped { reason }
            }
        };
        report.logs.push((reference.to_string(), scan));
    }

    log::info!(
        "Threads matched for {}: {} ({} logs skipped)",
        viewer,
        report.candidates.len(),
        report.skipped()
    );
    report
}

async fn scan_log(
    store: &dyn TableStore,
    reference: &str,
    destination_tab: &str,
    viewer: &str,
) -> Result<(Vec<DraftCandidate>, LogScan), String> {
    let table_ref = TableRef::resolve(reference, Some(destination_tab)).map_err(|e| e.to_string())?;
    let table = store.read_all(&table_ref).await.map_err(|e| e.to_string())?;

    if table.len() <= 1 {
        return Err(format!("too few rows ({})", table.len()));
    }

    let headers = table.trimmed_headers();
    log::debug!("Headers found in {}: {}", table_ref, headers.join(" | "));
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|name| !headers.iter().any(|h| h == name))
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing columns: {}", missing.join(", ")));
    }

    let states = latest_per_thread(&table, reference);
    let threads = states.len();
    let candidates: Vec<DraftCandidate> = states
        .iter()
        .filter(|state| involves_viewer(state, viewer))
        .map(candidate)
        .collect();

    log::debug!(
        "{}: {} threads, {} for viewer",
        table_ref,
        threads,
        candidates.len()
    );
    let matched = candidates.len();
    Ok((candidates, LogScan::Scanned { threads, matched }))
}
