use client_mail_router::columns;
use client_mail_router::store::{MemoryStore, TableRef};
use client_mail_router::{collect_for_viewer, AllowlistIndex};

const ACME_LOG: &str = "1U8Z02OzmOFc6rI8zFtfVwo1vB1ZoISJIL1EvA8R7YKE";
const GLOBEX_LOG: &str = "1LtZgk5aehWblrMRa42xMzy0baOACS5ofi_tlKpn7m3I";

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .init();

    println!("🧪 Testing thread reconciliation");

    let store = MemoryStore::new();
    let header = strings(&["Thread ID", "Subject", "From", "To", "Body", "Needs Draft"]);
    let pending_header = strings(&["Date", "Thread ID", "Subject", "From", "To", "Body"]);

    for id in [ACME_LOG, GLOBEX_LOG] {
        store.insert(&TableRef::new(id, Some("Log")), vec![header.clone()]);
    }

    let messages = [
        (ACME_LOG, "t-1", "Quote", "steve@org.com", "jane@acme.com", "Here is the quote."),
        (ACME_LOG, "t-1", "Re: Quote", "Jane <jane@acme.com>", "steve@org.com", "Thanks\nJane"),
        (ACME_LOG, "t-2", "Invoice", "bob@org.com", "ap@acme.com", "Attached."),
        (GLOBEX_LOG, "t-3", "Kickoff", "Hank <hank@globex.com>", "steve@org.com", "Monday?\nHank"),
    ];
    for (log_id, thread, subject, from, to, body) in messages {
        let row = strings(&["2024-05-01", thread, subject, from, to, body]);
        let reference = format!("https://docs.google.com/spreadsheets/d/{log_id}/edit");
        columns::append_to_destination(&store, &reference, "Log", &pending_header, &row).await?;
    }
    println!("✅ Seeded {} messages into 2 logs", messages.len());

    let mut allowlist = AllowlistIndex::new();
    allowlist.insert(
        "acme.com".to_string(),
        format!("https://docs.google.com/spreadsheets/d/{ACME_LOG}/edit"),
    );
    allowlist.insert(
        "globex.com".to_string(),
        format!("https://docs.google.com/spreadsheets/d/{GLOBEX_LOG}/edit"),
    );

    for viewer in ["steve@org.com", "bob@org.com", "nobody@org.com"] {
        let report = collect_for_viewer(&store, &allowlist, "Log", viewer).await;
        println!("\n👤 {viewer}: {} threads", report.candidates.len());
        for candidate in &report.candidates {
            println!(
                "   [{}] {} | {} -> {}",
                candidate.thread_id, candidate.subject, candidate.from, candidate.to
            );
        }
        for (reference, scan) in &report.logs {
            println!("   {reference}: {scan:?}");
        }
    }

    Ok(())
}
