//! Dev-session errors.

use std::path::PathBuf;

use thiserror::Error;

use galley_graph::UrlError;
use galley_kitchen::{CookError, KitchenError};

#[derive(Debug, Error)]
pub enum DevError {
    #[error(transparent)]
    Cook(#[from] CookError),

    #[error(transparent)]
    Kitchen(#[from] KitchenError),

    #[error(transparent)]
    Url(#[from] UrlError),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("watched path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DevError>;
