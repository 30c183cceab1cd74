/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::collections::BTreeMap;

use utils::config::utils::{AsKey, ParseValue};

use crate::{pool::Template, variables::substitute, Error};

/// Fixed literal stamped into rendered markup. Cleanup only ever touches
/// files that contain this exact text, so user-authored files sitting in
/// the same directory are never deleted.
pub const GENERATED_MARKER: &str = "Created by the mailsig deployment engine";

pub fn is_generated(bytes: &[u8]) -> bool {
    String::from_utf8_lossy(bytes).contains(GENERATED_MARKER)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Html,
    Rtf,
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Html => "htm",
            OutputFormat::Rtf => "rtf",
            OutputFormat::Text => "txt",
        }
    }
}

impl ParseValue for OutputFormat {
    fn parse_value(key: impl AsKey, value: &str) -> utils::config::Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "html" | "htm" => Ok(OutputFormat::Html),
            "rtf" => Ok(OutputFormat::Rtf),
            "text" | "txt" => Ok(OutputFormat::Text),
            _ => Err(format!(
                "Invalid output format {:?} for property {:?}.",
                value,
                key.as_key()
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedArtifact {
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
}

/// One document rendering session, held for the whole run and released
/// through `close`. Renders are strictly sequential because the session
/// is stateful.
#[async_trait::async_trait]
pub trait Renderer: Send {
    async fn render(
        &mut self,
        template: &Template,
        variables: &BTreeMap<String, String>,
        formats: &[OutputFormat],
    ) -> crate::Result<Vec<RenderedArtifact>>;

    async fn close(&mut self) -> crate::Result<()>;
}

/// Renders text templates by placeholder substitution. The substituted
/// text is carried into every requested encoding unchanged; only the
/// markup output receives the generated marker, as a trailing comment.
#[derive(Default)]
pub struct TextRenderer;

#[async_trait::async_trait]
impl Renderer for TextRenderer {
    async fn render(
        &mut self,
        template: &Template,
        variables: &BTreeMap<String, String>,
        formats: &[OutputFormat],
    ) -> crate::Result<Vec<RenderedArtifact>> {
        let raw = tokio::fs::read(&template.path).await?;
        let text = String::from_utf8(raw).map_err(|_| {
            Error::Render(format!(
                "template {:?} is not valid UTF-8",
                template.file_name
            ))
        })?;
        let text = substitute(&text, variables);

        Ok(formats
            .iter()
            .map(|format| RenderedArtifact {
                format: *format,
                bytes: match format {
                    OutputFormat::Html => {
                        format!("{text}\n<!-- {GENERATED_MARKER} -->\n").into_bytes()
                    }
                    OutputFormat::Rtf | OutputFormat::Text => text.clone().into_bytes(),
                },
            })
            .collect())
    }

    async fn close(&mut self) -> crate::Result<()> {
        Ok(())
    }
}
