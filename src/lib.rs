pub mod actions;
pub mod allowlist;
pub mod columns;
pub mod config;
pub mod domain_utils;
pub mod drafts;
pub mod google_auth;
pub mod mailer;
pub mod reply;
pub mod router;
pub mod signature;
pub mod store;
pub mod threads;

pub use actions::{Actions, HomeView};
pub use allowlist::AllowlistIndex;
pub use config::Config;
pub use drafts::{DraftError, DraftOrchestrator, DraftOutcome};
pub use mailer::{MailFacility, OutgoingMail};
pub use reply::{GeminiClient, ReplyGenerator, ReplyRequest};
pub use router::{route_pending, Router, RoutingReport, RowOutcome};
pub use store::{StoreError, Table, TableRef, TableStore};
pub use threads::{collect_for_viewer, DraftCandidate, ReconcileReport};
