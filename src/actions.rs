//! Handlers behind the hosting surface's three actions. Each returns the
//! short notification the user sees; details go to the log.

use crate::allowlist::AllowlistIndex;
use crate::config::Config;
use crate::drafts::{DraftError, DraftOrchestrator};
use crate::mailer::{MailFacility, OutgoingMail};
use crate::reply::ReplyGenerator;
use crate::store::TableStore;
use crate::threads::{self, DraftCandidate, ReconcileReport};

pub const NO_DRAFTS: &str = "No drafts available yet.";
pub const DRAFT_GENERATED: &str = "✅ Draft generated.";
pub const THREAD_NOT_FOUND: &str = "❌ Thread not found.";
pub const INVALID_REFERENCE: &str = "❌ Invalid log reference.";
pub const DRAFT_SENT: &str = "✅ Draft sent!";

/// What the home view shows after a refresh.
#[derive(Debug, Clone, Default)]
pub struct HomeView {
    pub notification: String,
    pub candidates: Vec<DraftCandidate>,
    pub report: ReconcileReport,
}

pub struct Actions<'a> {
    store: &'a dyn TableStore,
    generator: &'a dyn ReplyGenerator,
    mailer: &'a dyn MailFacility,
    config: &'a Config,
}

impl<'a> Actions<'a> {
    pub fn new(
        store: &'a dyn TableStore,
        generator: &'a dyn ReplyGenerator,
        mailer: &'a dyn MailFacility,
        config: &'a Config,
    ) -> Self {
        Self {
            store,
            generator,
            mailer,
            config,
        }
    }

    /// Rebuild the viewer's thread list from every client log.
    pub async fn refresh(&self, viewer: &str) -> HomeView {
        log::info!("Refreshing drafts for {}", viewer);

        let allowlist = match self.load_allowlist().await {
            Ok(allowlist) => allowlist,
            Err(e) => {
                log::error!("Client registry unavailable: {}", e);
                return HomeView {
                    notification: "❌ Client registry unavailable.".to_string(),
                    ..Default::default()
                };
            }
        };

        let report =
            threads::collect_for_viewer(self.store, &allowlist, &self.config.destination_tab, viewer)
                .await;

        let notification = if report.candidates.is_empty() {
            NO_DRAFTS.to_string()
        } else {
            format!("{} threads", report.candidates.len())
        };

        HomeView {
            notification,
            candidates: report.candidates.clone(),
            report,
        }
    }

    pub async fn generate_draft(&self, viewer: &str, thread_id: &str, reference: &str) -> String {
        let orchestrator = DraftOrchestrator::new(
            self.store,
            self.generator,
            self.mailer,
            &self.config.destination_tab,
            viewer,
        );

        match orchestrator.generate(thread_id, reference).await {
            Ok(outcome) => {
                log::info!(
                    "Draft stored for thread {} (row {}), mail draft created: {}",
                    outcome.thread_id,
                    outcome.row_index + 1,
                    outcome.mail_draft_created
                );
                DRAFT_GENERATED.to_string()
            }
            Err(DraftError::InvalidReference(reference)) => {
                log::error!("Invalid log reference: {}", reference);
                INVALID_REFERENCE.to_string()
            }
            Err(DraftError::ThreadNotFound(thread_id)) => {
                log::error!("No matching thread {} found in log", thread_id);
                THREAD_NOT_FOUND.to_string()
            }
            Err(e) => {
                log::error!("Draft generation failed: {}", e);
                format!("❌ {}", e)
            }
        }
    }

    pub async fn send_draft(&self, to: &str, subject: &str, body: &str) -> String {
        match self.mailer.send(&OutgoingMail::new(to, subject, body)).await {
            Ok(()) => DRAFT_SENT.to_string(),
            Err(e) => {
                log::error!("Sending draft to {} failed: {}", to, e);
                format!("❌ Draft not sent: {}", e)
            }
        }
    }

    async fn load_allowlist(&self) -> anyhow::Result<AllowlistIndex> {
        let registry_table = self.config.registry_table()?;
        Ok(AllowlistIndex::load(self.store, &registry_table, &self.config.registry).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::LogMailer;
    use crate::reply::ReplyRequest;
    use crate::store::{MemoryStore, TableRef};
    use async_trait::async_trait;

    const REGISTRY: &str = "REGISTRY_SPREADSHEET_IDENTIFIER_0001";
    const LOG: &str = "1U8Z02OzmOFc6rI8zFtfVwo1vB1ZoISJIL1EvA8R7YKE";

    struct Echo;

    #[async_trait]
    impl ReplyGenerator for Echo {
        async fn generate(&self, request: &ReplyRequest) -> String {
            format!("Hi {},", request.sender_name)
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn link(id: &str) -> String {
        format!("https://docs.google.com/spreadsheets/d/{id}/edit")
    }

    fn setup() -> (MemoryStore, Config) {
        let mut config = Config::default();
        config.org_domain = "org.com".to_string();
        config.registry.reference = REGISTRY.to_string();

        let store = MemoryStore::new();
        let mut registry_row = vec![String::new(); 19];
        registry_row[17] = link(LOG);
        registry_row[18] = "client.com".to_string();
        store.insert(
            &config.registry_table().unwrap(),
            vec![strings(&["Client"]), registry_row],
        );
        store.insert(
            &TableRef::new(LOG, Some("Log")),
            vec![
                strings(&["Thread ID", "Subject", "From", "To", "Body", "Needs Draft"]),
                strings(&["t-1", "Quote", "Jane <jane@client.com>", "steve@org.com", "Thanks\nJane", ""]),
            ],
        );
        (store, config)
    }

    #[tokio::test]
    async fn test_refresh_then_generate_then_send() {
        let (store, config) = setup();
        let mailer = LogMailer::new();
        let actions = Actions::new(&store, &Echo, &mailer, &config);

        let home = actions.refresh("steve@org.com").await;
        assert_eq!(home.candidates.len(), 1);
        assert!(!home.candidates[0].has_draft());

        let candidate = &home.candidates[0];
        let notification = actions
            .generate_draft("steve@org.com", &candidate.thread_id, &candidate.source)
            .await;
        assert_eq!(notification, DRAFT_GENERATED);

        let home = actions.refresh("steve@org.com").await;
        let candidate = &home.candidates[0];
        assert_eq!(candidate.needs_draft, "Hi Jane,");

        let notification = actions
            .send_draft(&candidate.from, &candidate.subject, &candidate.needs_draft)
            .await;
        assert_eq!(notification, DRAFT_SENT);
        assert_eq!(mailer.sent()[0].to, "jane@client.com");
    }

    #[tokio::test]
    async fn test_refresh_for_stranger_is_empty() {
        let (store, config) = setup();
        let mailer = LogMailer::new();
        let home = Actions::new(&store, &Echo, &mailer, &config)
            .refresh("nobody@org.com")
            .await;
        assert_eq!(home.notification, NO_DRAFTS);
        assert!(home.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_generate_notifications() {
        let (store, config) = setup();
        let mailer = LogMailer::new();
        let actions = Actions::new(&store, &Echo, &mailer, &config);

        assert_eq!(
            actions.generate_draft("steve@org.com", "t-404", &link(LOG)).await,
            THREAD_NOT_FOUND
        );
        assert_eq!(
            actions.generate_draft("steve@org.com", "t-1", "bad").await,
            INVALID_REFERENCE
        );
    }

    #[tokio::test]
    async fn test_refresh_without_registry() {
        let (_store, config) = setup();
        let empty = MemoryStore::new();
        let mailer = LogMailer::new();
        let home = Actions::new(&empty, &Echo, &mailer, &config)
            .refresh("steve@org.com")
            .await;
        assert!(home.notification.contains("registry"));
    }
}
