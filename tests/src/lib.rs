/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::path::PathBuf;

#[cfg(test)]
pub mod directory;
#[cfg(test)]
pub mod engine;

/// Creates a fresh scratch directory for one test, wiping whatever a
/// previous run may have left behind.
pub fn temp_dir(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("mailsig-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&path);
    std::fs::create_dir_all(&path).unwrap();
    path
}
