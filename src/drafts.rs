use crate::domain_utils::DomainUtils;
use crate::mailer::{MailFacility, OutgoingMail};
use crate::reply::{ReplyGenerator, ReplyRequest};
use crate::signature;
use crate::store::{StoreError, Table, TableRef, TableStore};
use crate::threads::{NEEDS_DRAFT, THREAD_ID};

const DRAFT_COLUMNS: &[&str] = &[THREAD_ID, "Subject", "To", "From", "Body", NEEDS_DRAFT];

#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("Invalid log reference: {0}")]
    InvalidReference(String),
    #[error("Log unavailable: {0}")]
    Store(StoreError),
    #[error("Log is missing columns: {0}")]
    MissingColumns(String),
    #[error("Thread not found: {0}")]
    ThreadNotFound(String),
}

impl From<StoreError> for DraftError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::MalformedReference(reference) => DraftError::InvalidReference(reference),
            other => DraftError::Store(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DraftOutcome {
    pub thread_id: String,
    /// Row of the destination log that received the draft
    pub row_index: usize,
    pub recipient: String,
    pub subject: String,
    pub text: String,
    pub mail_draft_created: bool,
}

/// Generates a reply for one thread and records it in the thread's log
/// and as a mail draft.
pub struct DraftOrchestrator<'a> {
    store: &'a dyn TableStore,
    generator: &'a dyn ReplyGenerator,
    mailer: &'a dyn MailFacility,
    destination_tab: String,
    viewer: String,
}

impl<'a> DraftOrchestrator<'a> {
    pub fn new(
        store: &'a dyn TableStore,
        generator: &'a dyn ReplyGenerator,
        mailer: &'a dyn MailFacility,
        destination_tab: &str,
        viewer: &str,
    ) -> Self {
        Self {
            store,
            generator,
            mailer,
            destination_tab: destination_tab.to_string(),
            viewer: viewer.trim().to_string(),
        }
    }

    pub async fn generate(&self, thread_id: &str, reference: &str) -> Result<DraftOutcome, DraftError> {
        let table_ref = TableRef::resolve(reference, Some(&self.destination_tab))?;
        let table = self.store.read_all(&table_ref).await?;

        let missing: Vec<&str> = DRAFT_COLUMNS
            .iter()
            .copied()
            .filter(|name| table.column(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(DraftError::MissingColumns(missing.join(", ")));
        }

        let index = latest_row_for_thread(&table, thread_id)
            .ok_or_else(|| DraftError::ThreadNotFound(thread_id.to_string()))?;
        let row = table
            .log_row(index)
            .ok_or_else(|| DraftError::ThreadNotFound(thread_id.to_string()))?;

        let request = ReplyRequest {
            subject: row.get("Subject").to_string(),
            body: row.get("Body").to_string(),
            sender_name: signature::sender_name_from_body(row.get("Body")),
            viewer_first_name: signature::first_name_from_identity(&self.viewer),
        };
        let text = self.generator.generate(&request).await;
        log::info!("Reply generated for thread {}", thread_id);

        let draft_col = table
            .column(NEEDS_DRAFT)
            .ok_or_else(|| DraftError::MissingColumns(NEEDS_DRAFT.to_string()))?;
        self.store
            .update_cell(&table_ref, index, draft_col, text.clone())
            .await?;

        let recipient = self.counterpart(row.get("From"), row.get("To"));
        let mail = OutgoingMail::new(&recipient, &request.subject, &text);
        let mail_draft_created = match self.mailer.create_draft(&mail).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Mail draft for thread {} not created: {}", thread_id, e);
                false
            }
        };

        Ok(DraftOutcome {
            thread_id: thread_id.to_string(),
            row_index: index,
            recipient,
            subject: request.subject,
            text,
            mail_draft_created,
        })
    }

    /// The other party of the exchange: the sender when the viewer received
    /// the message, otherwise the recipient.
    fn counterpart(&self, from: &str, to: &str) -> String {
        if !self.viewer.is_empty() && to.trim() == self.viewer {
            DomainUtils::extract_email(from)
        } else {
            to.trim().to_string()
        }
    }
}

/// Index of the most recent row carrying `thread_id`, the same row the
/// thread listing shows for that thread.
pub fn latest_row_for_thread(table: &Table, thread_id: &str) -> Option<usize> {
    let col = table.column(THREAD_ID)?;
    let wanted = thread_id.trim();
    (1..table.len())
        .rev()
        .find(|&index| table.cell(index, col).trim() == wanted && !wanted.is_empty())
}
