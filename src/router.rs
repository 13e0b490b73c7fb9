use crate::allowlist::AllowlistIndex;
use crate::columns;
use crate::config::Config;
use crate::domain_utils::DomainUtils;
use crate::store::{StoreError, TableRef, TableStore};
use std::fmt;

/// What happened to one pending row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Forwarded {
        domain: String,
        destination: String,
    },
    /// Neither side, or both sides, belong to the organization
    NoExternalDomain,
    NotAllowlisted {
        domain: String,
    },
    ForwardFailed {
        domain: String,
        destination: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowReport {
    /// Position of the row in the pending log when the run started
    pub index: usize,
    pub outcome: RowOutcome,
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingReport {
    pub rows: Vec<RowReport>,
}

impl RoutingReport {
    pub fn forwarded(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Forwarded { .. }))
    }

    pub fn discarded(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                RowOutcome::NoExternalDomain | RowOutcome::NotAllowlisted { .. }
            )
        })
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::ForwardFailed { .. }))
    }

    pub fn undeleted(&self) -> usize {
        self.rows.iter().filter(|r| !r.deleted).count()
    }

    fn count(&self, predicate: impl Fn(&RowOutcome) -> bool) -> usize {
        self.rows.iter().filter(|r| predicate(&r.outcome)).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} rows processed: {} forwarded, {} discarded, {} failed, {} not deleted",
            self.rows.len(),
            self.forwarded(),
            self.discarded(),
            self.failed(),
            self.undeleted()
        )
    }
}

impl fmt::Display for RowOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowOutcome::Forwarded {
                domain,
                destination,
            } => write!(f, "forwarded {domain} -> {destination}"),
            RowOutcome::NoExternalDomain => write!(f, "no external domain"),
            RowOutcome::NotAllowlisted { domain } => write!(f, "domain not allowed: {domain}"),
            RowOutcome::ForwardFailed {
                domain,
                destination,
                reason,
            } => write!(f, "forwarding {domain} -> {destination} failed: {reason}"),
        }
    }
}

/// Drains the shared pending log into per-client destination logs.
pub struct Router<'a> {
    store: &'a dyn TableStore,
    org_domain: String,
    from_column: usize,
    to_column: usize,
    destination_tab: String,
}

impl<'a> Router<'a> {
    pub fn new(store: &'a dyn TableStore, config: &Config) -> Self {
        Self {
            store,
            org_domain: config.org_domain.trim().to_lowercase(),
            from_column: config.pending_log.from_column,
            to_column: config.pending_log.to_column,
            destination_tab: config.destination_tab.clone(),
        }
    }

    /// Decide where one exchange goes, without touching any store.
    pub fn classify(&self, from: &str, to: &str, allowlist: &AllowlistIndex) -> Decision {
        let from_domain = DomainUtils::domain_from_email_field(from);
        let to_domain = DomainUtils::domain_from_email_field(to);

        let Some(domain) = DomainUtils::external_domain(
            from_domain.as_deref(),
            to_domain.as_deref(),
            &self.org_domain,
        ) else {
            return Decision::Discard(RowOutcome::NoExternalDomain);
        };

        match allowlist.lookup(&domain) {
            Some(destination) => Decision::Forward {
                destination: destination.to_string(),
                domain,
            },
            None => Decision::Discard(RowOutcome::NotAllowlisted { domain }),
        }
    }

    /// Process every pending row once, newest first, deleting each after
    /// its decision. Rows are visited in strictly descending index order
    /// so a deletion never shifts a row that is still to be visited.
    pub async fn run(
        &self,
        pending: &TableRef,
        allowlist: &AllowlistIndex,
    ) -> Result<RoutingReport, StoreError> {
        log::info!("Routing run started for {}", pending);
        let snapshot = store_snapshot(self.store, pending).await?;
        let mut report = RoutingReport::default();

        if snapshot.data_len() == 0 {
            log::debug!("Pending log is empty");
            return Ok(report);
        }

        let headers = snapshot.headers().to_vec();

        for index in (1..snapshot.len()).rev() {
            let row = &snapshot.rows[index];
            let from = snapshot.cell(index, self.from_column);
            let to = snapshot.cell(index, self.to_column);

            let outcome = match self.classify(from, to, allowlist) {
                Decision::Discard(outcome) => {
                    match &outcome {
                        RowOutcome::NotAllowlisted { domain } => {
                            log::info!("Row {}: domain not allowed: {}", index + 1, domain)
                        }
                        _ => log::info!("Row {}: no external domain found", index + 1),
                    }
                    outcome
                }
                Decision::Forward {
                    domain,
                    destination,
                } => {
                    log::info!(
                        "Row {}: domain {} allowed, logging to {}",
                        index + 1,
                        domain,
                        destination
                    );
                    match columns::append_to_destination(
                        self.store,
                        &destination,
                        &self.destination_tab,
                        &headers,
                        row,
                    )
                    .await
                    {
                        Ok(_) => RowOutcome::Forwarded {
                            domain,
                            destination,
                        },
                        Err(e) => {
                            log::error!("Error appending row {} to client log: {}", index + 1, e);
                            RowOutcome::ForwardFailed {
                                domain,
                                destination,
                                reason: e.to_string(),
                            }
                        }
                    }
                }
            };

            let deleted = match self.store.delete_row(pending, index).await {
                Ok(()) => {
                    log::debug!("Deleted row {} from pending log", index + 1);
                    true
                }
                Err(e) => {
                    log::error!("Failed to delete row {} from pending log: {}", index + 1, e);
                    false
                }
            };

            report.rows.push(RowReport {
                index,
                outcome,
                deleted,
            });
        }

        log::info!("Routing run finished: {}", report.summary());
        Ok(report)
    }
}

/// Routing decision for one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Forward { domain: String, destination: String },
    Discard(RowOutcome),
}

async fn store_snapshot(
    store: &dyn TableStore,
    table: &TableRef,
) -> Result<crate::store::Table, StoreError> {
    match store.read_all(table).await {
        Ok(table) => Ok(table),
        Err(e) => {
            log::error!("Pending log {} unavailable: {}", table, e);
            Err(e)
        }
    }
}

/// One full scheduled run: rebuild the allowlist from the registry, then
/// drain the pending log.
pub async fn route_pending(store: &dyn TableStore, config: &Config) -> anyhow::Result<RoutingReport> {
    let registry_table = config.registry_table()?;
    let pending_table = config.pending_table()?;

    let allowlist = AllowlistIndex::load(store, &registry_table, &config.registry).await?;
    let router = Router::new(store, config);
    Ok(router.run(&pending_table, &allowlist).await?)
}
