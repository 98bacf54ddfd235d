use std::{io::ErrorKind, path::Path};

use tokio::fs;

use crate::{
    error::{NarratorError, Result},
    types::Paragraph,
};

/// Check that `path` names an existing regular file.
pub async fn check_input_path(path: &Path) -> Result<()> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(NarratorError::InputNotAFile {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(NarratorError::InputNotFound {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(NarratorError::InputUnreadable {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Read a UTF-8 script and split it into paragraphs.
pub async fn load_paragraphs(path: &Path) -> Result<Vec<Paragraph>> {
    check_input_path(path).await?;

    let content = fs::read_to_string(path).await.map_err(|e| match e.kind() {
        ErrorKind::InvalidData => NarratorError::InputNotUtf8 {
            path: path.to_path_buf(),
        },
        _ => NarratorError::InputUnreadable {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    Ok(split_paragraphs(&content))
}

/// Every line with non-whitespace content is a paragraph, kept as written.
pub fn split_paragraphs(content: &str) -> Vec<Paragraph> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(index, line)| Paragraph {
            number: index + 1,
            text: line.to_string(),
        })
        .collect()
}
