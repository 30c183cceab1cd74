/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use ahash::AHashSet;
use directory::Identity;

use crate::render::{is_generated, RenderedArtifact};

/// Sink for rendered artifacts and per-identity selections. Artifacts are
/// shared between identities under their target base name, so a later and
/// more specific render of the same name overwrites the earlier one.
#[async_trait::async_trait]
pub trait ProfileWriter: Send {
    async fn store_artifact(
        &mut self,
        stem: &str,
        artifact: &RenderedArtifact,
    ) -> crate::Result<()>;

    async fn apply_signature_defaults(
        &mut self,
        identity: &Identity,
        new: Option<&str>,
        reply_forward: Option<&str>,
    ) -> crate::Result<()>;

    async fn apply_auto_reply(
        &mut self,
        identity: &Identity,
        internal: Option<&str>,
        external: Option<&str>,
        shared: bool,
    ) -> crate::Result<()>;

    async fn cleanup(&mut self, keep: &AHashSet<String>) -> crate::Result<()>;
}

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub async fn open(root: impl Into<PathBuf>) -> crate::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join("profiles")).await?;
        Ok(FileStore { root })
    }

    fn profile_path(&self, identity: &Identity, kind: &str) -> PathBuf {
        let name = identity
            .address
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || matches!(ch, '@' | '.' | '_' | '-') {
                    ch
                } else {
                    '_'
                }
            })
            .collect::<String>();
        self.root.join("profiles").join(format!("{name}.{kind}"))
    }
}

#[async_trait::async_trait]
impl ProfileWriter for FileStore {
    async fn store_artifact(
        &mut self,
        stem: &str,
        artifact: &RenderedArtifact,
    ) -> crate::Result<()> {
        let path = self
            .root
            .join(format!("{stem}.{}", artifact.format.extension()));
        tokio::fs::write(&path, &artifact.bytes).await?;
        Ok(())
    }

    async fn apply_signature_defaults(
        &mut self,
        identity: &Identity,
        new: Option<&str>,
        reply_forward: Option<&str>,
    ) -> crate::Result<()> {
        if new.is_none() && reply_forward.is_none() {
            return Ok(());
        }
        let mut contents = String::new();
        if let Some(name) = new {
            contents.push_str(&format!("new = {name:?}\n"));
        }
        if let Some(name) = reply_forward {
            contents.push_str(&format!("reply-forward = {name:?}\n"));
        }
        tokio::fs::write(self.profile_path(identity, "signatures"), contents).await?;
        Ok(())
    }

    async fn apply_auto_reply(
        &mut self,
        identity: &Identity,
        internal: Option<&str>,
        external: Option<&str>,
        shared: bool,
    ) -> crate::Result<()> {
        if internal.is_none() && external.is_none() {
            return Ok(());
        }
        let mut contents = String::new();
        if let Some(name) = internal {
            contents.push_str(&format!("internal = {name:?}\n"));
        }
        if let Some(name) = external {
            contents.push_str(&format!("external = {name:?}\n"));
        }
        contents.push_str(&format!("shared = {shared}\n"));
        tokio::fs::write(self.profile_path(identity, "autoreply"), contents).await?;
        Ok(())
    }

    // Deletes generated markup files whose base name is no longer kept,
    // together with their sibling encodings. Files without the marker are
    // not ours and stay untouched.
    async fn cleanup(&mut self, keep: &AHashSet<String>) -> crate::Result<()> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path
                .extension()
                .is_some_and(|extension| extension.eq_ignore_ascii_case("htm"))
            {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if keep.contains(stem) {
                continue;
            }
            match tokio::fs::read(&path).await {
                Ok(bytes) if is_generated(&bytes) => {}
                Ok(_) => continue,
                Err(error) => {
                    tracing::warn!(
                        context = "store",
                        event = "cleanup",
                        file = %path.display(),
                        reason = %error,
                        "Failed to inspect generated file"
                    );
                    continue;
                }
            }
            for extension in ["htm", "rtf", "txt"] {
                if remove_quiet(&path.with_extension(extension)).await {
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            tracing::info!(
                context = "store",
                event = "cleanup",
                total = removed,
                "Removed stale generated files"
            );
        }
        Ok(())
    }
}

async fn remove_quiet(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(_) => {
            tracing::debug!(
                context = "store",
                event = "cleanup",
                file = %path.display(),
                "Removed stale generated file"
            );
            true
        }
        Err(error) if error.kind() == ErrorKind::NotFound => false,
        Err(error) => {
            tracing::warn!(
                context = "store",
                event = "cleanup",
                file = %path.display(),
                reason = %error,
                "Failed to remove stale file"
            );
            false
        }
    }
}
