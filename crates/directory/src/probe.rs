/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;
use utils::config::Config;

use crate::Directory;

/// The two service ports a domain controller answers on. Token-group
/// reads require the directory port, cross-domain object searches the
/// global catalog port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    Directory,
    GlobalCatalog,
}

impl PortKind {
    pub fn default_port(&self) -> u16 {
        match self {
            PortKind::Directory => 389,
            PortKind::GlobalCatalog => 3268,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PortKind::Directory => "ldap",
            PortKind::GlobalCatalog => "gc",
        }
    }
}

/// Working sets that survived the connectivity checks, one per port kind.
#[derive(Debug, Clone, Default)]
pub struct ReachableDomains {
    pub directory: Vec<String>,
    pub global: Vec<String>,
}

impl ReachableDomains {
    pub fn contains(&self, kind: PortKind, domain: &str) -> bool {
        let domains = match kind {
            PortKind::Directory => &self.directory,
            PortKind::GlobalCatalog => &self.global,
        };
        domains.iter().any(|item| item.eq_ignore_ascii_case(domain))
    }
}

pub struct DomainProber {
    pub max_parallel: usize,
    pub timeout: Duration,
}

impl DomainProber {
    pub fn from_config(config: &Config) -> utils::config::Result<Self> {
        Ok(DomainProber {
            max_parallel: config.property_or_static(("probe", "max-parallel"), "10")?,
            timeout: config.property_or_static(("probe", "timeout"), "5s")?,
        })
    }

    /// Checks every domain on the given port and returns the survivors in
    /// their original order. Unreachable domains are pruned with a single
    /// warning carrying the cause; a probe that overruns its timeout is
    /// left to finish in the background.
    pub async fn verify(
        &self,
        directory: &Arc<Directory>,
        domains: Vec<String>,
        kind: PortKind,
    ) -> Vec<String> {
        let total = domains.len();
        let (result_tx, mut result_rx) = mpsc::channel::<(usize, Option<String>)>(total.max(1));
        let mut failures: Vec<Option<String>> = vec![None; total];
        let mut reachable = vec![false; total];
        let mut next = 0;
        let mut in_flight = 0;
        let mut done = 0;

        while done < total {
            while in_flight < self.max_parallel.max(1) && next < total {
                let domain = domains[next].clone();
                let directory = directory.clone();
                let result_tx = result_tx.clone();
                let probe_timeout = self.timeout;
                let pos = next;
                tokio::spawn(async move {
                    let handle = {
                        let domain = domain.clone();
                        tokio::spawn(async move { directory.probe(&domain, kind).await })
                    };
                    let failure = match tokio::time::timeout(probe_timeout, handle).await {
                        Ok(Ok(Ok(()))) => None,
                        Ok(Ok(Err(err))) => Some(err.to_string()),
                        Ok(Err(_)) => Some("probe task failed".to_string()),
                        Err(_) => Some(format!(
                            "no answer within {}ms",
                            probe_timeout.as_millis()
                        )),
                    };
                    let _ = result_tx.send((pos, failure)).await;
                });
                next += 1;
                in_flight += 1;
            }

            match result_rx.recv().await {
                Some((pos, failure)) => {
                    reachable[pos] = failure.is_none();
                    failures[pos] = failure;
                    in_flight -= 1;
                    done += 1;
                }
                None => break,
            }
        }

        domains
            .into_iter()
            .enumerate()
            .filter_map(|(pos, domain)| {
                if reachable[pos] {
                    Some(domain)
                } else {
                    tracing::warn!(
                        context = "probe",
                        event = "pruned",
                        domain = %domain,
                        port = kind.as_str(),
                        reason = failures[pos].as_deref().unwrap_or("unknown"),
                        "Unreachable domain removed from the working set"
                    );
                    None
                }
            })
            .collect()
    }
}
