/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

pub mod classify;
pub mod config;
pub mod context;
pub mod pool;
pub mod render;
pub mod resolve;
pub mod run;
pub mod store;
pub mod tag;
pub mod variables;
pub mod window;

use directory::DirectoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Signature,
    AutoReply,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Signature => "signature",
            Flow::AutoReply => "auto-reply",
        }
    }
}

#[derive(Debug)]
pub enum Error {
    Directory(DirectoryError),
    Io(std::io::Error),
    Render(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<DirectoryError> for Error {
    fn from(error: DirectoryError) -> Self {
        Error::Directory(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Directory(error) => write!(f, "directory error: {error}"),
            Error::Io(error) => write!(f, "I/O error: {error}"),
            Error::Render(reason) => write!(f, "render error: {reason}"),
        }
    }
}

impl std::error::Error for Error {}
