/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::{collections::BTreeMap, sync::Arc};

use ahash::AHashSet;
use chrono::NaiveDateTime;
use directory::{membership, probe::ReachableDomains, Directory, Identity};

use crate::{
    classify::ClassifiedPool,
    config::{EngineSettings, FlowSettings},
    context::ResolutionContext,
    pool::TemplatePool,
    render::{OutputFormat, Renderer},
    resolve::{resolve_auto_reply, resolve_signatures},
    store::ProfileWriter,
    variables::VariableProvider,
    Flow,
};

pub struct RunEnvironment {
    pub directory: Arc<Directory>,
    pub domains: ReachableDomains,
    pub variables: Box<dyn VariableProvider>,
    pub renderer: Box<dyn Renderer>,
    pub writer: Box<dyn ProfileWriter>,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub identities: usize,
    pub rendered: usize,
    pub outcomes: Vec<IdentityOutcome>,
}

#[derive(Debug)]
pub struct IdentityOutcome {
    pub address: String,
    pub directory_backed: bool,
    pub signatures: usize,
    pub auto_reply: bool,
}

/// Resolves and deploys every configured flow for the identity feed.
/// Template pools are classified once against a clock frozen at `now`;
/// identities are then processed strictly in feed order because the
/// rendering session is a single stateful resource. Directory errors in
/// the home forest abort the run, everything else degrades per identity.
pub async fn execute(
    settings: &EngineSettings,
    env: &mut RunEnvironment,
    identities: Vec<Identity>,
    now: NaiveDateTime,
) -> crate::Result<RunReport> {
    let mut ctx = ResolutionContext::new();
    let signatures =
        load_flow(Flow::Signature, settings.signatures.as_ref(), settings, env, &mut ctx, now)
            .await?;
    let auto_reply =
        load_flow(Flow::AutoReply, settings.auto_reply.as_ref(), settings, env, &mut ctx, now)
            .await?;

    let mut report = RunReport::default();
    let mut keep = AHashSet::new();

    for mut identity in identities {
        let directory_backed =
            membership::resolve(&env.directory, &env.domains, &mut identity).await?;
        let variables = env.variables.compute(&identity);
        let mut outcome = IdentityOutcome {
            address: identity.address.clone(),
            directory_backed,
            signatures: 0,
            auto_reply: false,
        };

        if let Some((classified, formats)) = &signatures {
            let resolution = resolve_signatures(classified, &identity);
            outcome.signatures = resolution.templates.len();
            deploy(
                env,
                &mut ctx,
                classified,
                &resolution.templates,
                formats,
                &variables,
                &mut keep,
                &mut report.rendered,
            )
            .await;
            let new = resolution
                .default_new
                .map(|index| classified.template(index).stem.clone());
            let reply_forward = resolution
                .default_reply_forward
                .map(|index| classified.template(index).stem.clone());
            if let Err(error) = env
                .writer
                .apply_signature_defaults(&identity, new.as_deref(), reply_forward.as_deref())
                .await
            {
                tracing::warn!(
                    context = "run",
                    event = "profile",
                    account = identity.address.as_str(),
                    reason = %error,
                    "Failed to apply signature defaults"
                );
            }
        }

        if let Some((classified, formats)) = &auto_reply {
            let selection = resolve_auto_reply(classified, &identity);
            outcome.auto_reply =
                selection.internal.is_some() || selection.external.is_some();
            let mut winners = Vec::new();
            for index in [selection.internal, selection.external]
                .into_iter()
                .flatten()
            {
                if !winners.contains(&index) {
                    winners.push(index);
                }
            }
            deploy(
                env,
                &mut ctx,
                classified,
                &winners,
                formats,
                &variables,
                &mut keep,
                &mut report.rendered,
            )
            .await;
            let internal = selection
                .internal
                .map(|index| classified.template(index).stem.clone());
            let external = selection
                .external
                .map(|index| classified.template(index).stem.clone());
            if let Err(error) = env
                .writer
                .apply_auto_reply(
                    &identity,
                    internal.as_deref(),
                    external.as_deref(),
                    selection.shared,
                )
                .await
            {
                tracing::warn!(
                    context = "run",
                    event = "profile",
                    account = identity.address.as_str(),
                    reason = %error,
                    "Failed to apply the auto-reply selection"
                );
            }
        }

        tracing::info!(
            context = "run",
            event = "resolved",
            account = identity.address.as_str(),
            signatures = outcome.signatures,
            auto_reply = outcome.auto_reply,
            "Identity resolved"
        );
        report.outcomes.push(outcome);
    }

    if signatures.is_some() || auto_reply.is_some() {
        if let Err(error) = env.writer.cleanup(&keep).await {
            tracing::warn!(
                context = "run",
                event = "cleanup",
                reason = %error,
                "Cleanup of generated files failed"
            );
        }
    }
    if let Err(error) = env.renderer.close().await {
        tracing::warn!(
            context = "run",
            event = "renderer",
            reason = %error,
            "Failed to close the rendering session"
        );
    }

    report.identities = report.outcomes.len();
    Ok(report)
}

async fn load_flow<'x>(
    flow: Flow,
    flow_settings: Option<&'x FlowSettings>,
    settings: &EngineSettings,
    env: &RunEnvironment,
    ctx: &mut ResolutionContext,
    now: NaiveDateTime,
) -> crate::Result<Option<(ClassifiedPool, &'x [OutputFormat])>> {
    match flow_settings {
        Some(flow_settings) => {
            let pool = TemplatePool::scan(flow, &flow_settings.path, &settings.extensions)?;
            tracing::debug!(
                context = "run",
                event = "scan",
                flow = flow.as_str(),
                path = %pool.source.display(),
                total = pool.templates.len(),
                "Scanned template directory"
            );
            Ok(Some((
                ClassifiedPool::classify(pool, &env.directory, &env.domains, ctx, now).await,
                flow_settings.formats.as_slice(),
            )))
        }
        None => Ok(None),
    }
}

// Renders each selected template once per run and hands the artifacts to
// the writer. Target base names always join the keep set, also when the
// source was already rendered for an earlier identity.
#[allow(clippy::too_many_arguments)]
async fn deploy(
    env: &mut RunEnvironment,
    ctx: &mut ResolutionContext,
    classified: &ClassifiedPool,
    indices: &[usize],
    formats: &[OutputFormat],
    variables: &BTreeMap<String, String>,
    keep: &mut AHashSet<String>,
    rendered: &mut usize,
) {
    for &index in indices {
        let template = classified.template(index);
        tracing::debug!(
            context = "run",
            event = "deploy",
            file = template.file_name.as_str(),
            target = template.target_name.as_str(),
            "Template accepted for deployment"
        );
        keep.insert(template.stem.clone());
        if ctx.is_rendered(&template.path) {
            continue;
        }
        match env.renderer.render(template, variables, formats).await {
            Ok(artifacts) => {
                ctx.mark_rendered(&template.path);
                *rendered += 1;
                for artifact in &artifacts {
                    if let Err(error) =
                        env.writer.store_artifact(&template.stem, artifact).await
                    {
                        tracing::warn!(
                            context = "run",
                            event = "store",
                            file = template.file_name.as_str(),
                            reason = %error,
                            "Failed to store a rendered artifact"
                        );
                    }
                }
            }
            Err(error) => {
                tracing::warn!(
                    context = "run",
                    event = "render",
                    file = template.file_name.as_str(),
                    reason = %error,
                    "Failed to render template"
                );
            }
        }
    }
}
