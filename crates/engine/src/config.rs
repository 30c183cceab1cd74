/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::path::PathBuf;

use utils::config::{utils::ParseValue, Config};

use crate::render::OutputFormat;

#[derive(Debug)]
pub struct FlowSettings {
    pub path: PathBuf,
    pub formats: Vec<OutputFormat>,
}

/// Engine settings from the `[signatures]`, `[auto-reply]`, `[templates]`
/// and `[output]` sections. A flow is enabled by the presence of its
/// section and must then name a template path.
#[derive(Debug)]
pub struct EngineSettings {
    pub signatures: Option<FlowSettings>,
    pub auto_reply: Option<FlowSettings>,
    pub extensions: Vec<String>,
    pub output: PathBuf,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> utils::config::Result<Self> {
        let mut extensions = config
            .values(("templates", "extensions"))
            .map(|(_, extension)| extension.trim_start_matches('.').to_string())
            .collect::<Vec<_>>();
        if extensions.is_empty() {
            extensions.push("docx".to_string());
        }

        Ok(EngineSettings {
            signatures: parse_flow(
                config,
                "signatures",
                &[OutputFormat::Html, OutputFormat::Rtf, OutputFormat::Text],
            )?,
            auto_reply: parse_flow(
                config,
                "auto-reply",
                &[OutputFormat::Html, OutputFormat::Text],
            )?,
            extensions,
            output: config.property_or_static(("output", "path"), "out")?,
        })
    }
}

fn parse_flow(
    config: &Config,
    section: &str,
    default_formats: &[OutputFormat],
) -> utils::config::Result<Option<FlowSettings>> {
    if !config.has_prefix(section) {
        return Ok(None);
    }
    let path = PathBuf::from(config.value_require((section, "path"))?);
    let mut formats = Vec::new();
    for (key, value) in config.values((section, "formats")) {
        formats.push(OutputFormat::parse_value(key, value)?);
    }
    if formats.is_empty() {
        formats.extend_from_slice(default_formats);
    }
    Ok(Some(FlowSettings { path, formats }))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use utils::config::Config;

    use crate::render::OutputFormat;

    use super::EngineSettings;

    #[test]
    fn flows_and_defaults() {
        let settings = EngineSettings::from_config(
            &Config::new(
                r#"
[signatures]
path = "/srv/templates/signatures"
formats = ["html", "text"]

[auto-reply]
path = "/srv/templates/oof"

[templates]
extensions = [".docx", "htm"]
"#,
            )
            .unwrap(),
        )
        .unwrap();

        let signatures = settings.signatures.unwrap();
        assert_eq!(signatures.path, Path::new("/srv/templates/signatures"));
        assert_eq!(
            signatures.formats,
            [OutputFormat::Html, OutputFormat::Text]
        );
        let auto_reply = settings.auto_reply.unwrap();
        assert_eq!(
            auto_reply.formats,
            [OutputFormat::Html, OutputFormat::Text]
        );
        assert_eq!(settings.extensions, ["docx", "htm"]);
        assert_eq!(settings.output, Path::new("out"));
    }

    #[test]
    fn absent_sections_disable_flows() {
        let settings =
            EngineSettings::from_config(&Config::new("").unwrap()).unwrap();
        assert!(settings.signatures.is_none());
        assert!(settings.auto_reply.is_none());
        assert_eq!(settings.extensions, ["docx"]);
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(EngineSettings::from_config(
            &Config::new("[signatures]\npath = \"x\"\nformats = [\"pdf\"]\n").unwrap()
        )
        .is_err());
    }

    #[test]
    fn section_without_path_is_rejected() {
        assert!(EngineSettings::from_config(
            &Config::new("[auto-reply]\nformats = [\"html\"]\n").unwrap()
        )
        .is_err());
    }
}
