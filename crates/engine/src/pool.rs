/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    tag::{RoleTag, TagToken, TemplateName},
    window::TimeWindow,
    Flow,
};

#[derive(Debug, Clone)]
pub struct Template {
    pub path: PathBuf,
    pub file_name: String,
    pub stem: String,
    pub target_name: String,
    pub tokens: Vec<TagToken>,
}

/// All templates of one flow, in the order they are applied. Files whose
/// names only differ in case sort together, with the byte order of the
/// original names as tiebreak so two scans of the same directory always
/// agree.
#[derive(Debug)]
pub struct TemplatePool {
    pub flow: Flow,
    pub source: PathBuf,
    pub templates: Vec<Template>,
}

impl Template {
    pub fn has_role(&self, role: RoleTag) -> bool {
        self.tokens
            .iter()
            .any(|token| matches!(token, TagToken::Role(found) if *found == role))
    }

    pub fn mailbox_tags(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|token| match token {
            TagToken::Mailbox(address) => Some(address.as_str()),
            _ => None,
        })
    }

    pub fn group_tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tokens.iter().filter_map(|token| match token {
            TagToken::Group { domain, name } => Some((domain.as_str(), name.as_str())),
            _ => None,
        })
    }

    pub fn time_windows(&self) -> impl Iterator<Item = &TimeWindow> {
        self.tokens.iter().filter_map(|token| match token {
            TagToken::TimeRange(window) => Some(window),
            _ => None,
        })
    }
}

impl TemplatePool {
    pub fn scan(flow: Flow, source: &Path, extensions: &[String]) -> crate::Result<Self> {
        let mut templates = Vec::new();

        for entry in fs::read_dir(source)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = match entry.file_name().into_string() {
                Ok(file_name) => file_name,
                Err(file_name) => {
                    tracing::warn!(
                        context = "templates",
                        event = "skip",
                        flow = flow.as_str(),
                        file = %file_name.to_string_lossy(),
                        "Skipping template with a non-UTF-8 name"
                    );
                    continue;
                }
            };
            let name = TemplateName::parse(&file_name);
            if !extensions
                .iter()
                .any(|extension| name.extension.eq_ignore_ascii_case(extension))
            {
                continue;
            }
            for warning in &name.warnings {
                tracing::warn!(
                    context = "templates",
                    event = "tag",
                    flow = flow.as_str(),
                    file = file_name.as_str(),
                    reason = warning.as_str(),
                    "Ignoring malformed template tag"
                );
            }
            templates.push(Template {
                path: entry.path(),
                file_name,
                stem: name.stem,
                target_name: name.target_name,
                tokens: name.tokens,
            });
        }

        templates.sort_unstable_by(|a, b| {
            a.file_name
                .to_lowercase()
                .cmp(&b.file_name.to_lowercase())
                .then_with(|| a.file_name.cmp(&b.file_name))
        });

        Ok(TemplatePool {
            flow,
            source: source.to_path_buf(),
            templates,
        })
    }
}
