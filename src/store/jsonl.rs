use std::path::Path;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::store::memory::MemoryStore;
use crate::store::{DescriptionSource, DescriptionStore, OutcomeDescription, ScoredDescription};

/// Read every row of a JSON-lines file, creating parent directories as needed.
///
/// A final line without a trailing newline that fails to parse is a write
/// torn by a crash: it is logged and cut off so later appends start on a
/// clean line. A malformed line anywhere else is an error.
pub(crate) async fn load_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    if !tokio::fs::try_exists(path).await? {
        return Ok(Vec::new());
    }

    let contents = tokio::fs::read(path).await?;
    let segments: Vec<&[u8]> = contents.split_inclusive(|b| *b == b'\n').collect();
    let mut rows = Vec::new();
    let mut clean_len = 0usize;

    for (index, segment) in segments.iter().copied().enumerate() {
        let terminated = segment.ends_with(b"\n");
        let line = segment.strip_suffix(b"\n").unwrap_or(segment);

        if !line.iter().all(u8::is_ascii_whitespace) {
            match serde_json::from_slice(line) {
                Ok(row) => rows.push(row),
                Err(e) if !terminated && index + 1 == segments.len() => {
                    tracing::warn!(
                        path = %path.display(),
                        line = index + 1,
                        error = %e,
                        "Dropping partially written last line"
                    );
                    let file = OpenOptions::new().write(true).open(path).await?;
                    file.set_len(clean_len as u64).await?;
                    return Ok(rows);
                }
                Err(e) => {
                    return Err(AppError::Store(format!(
                        "{}:{}: malformed row: {e}",
                        path.display(),
                        index + 1
                    )))
                }
            }
        }

        clean_len += segment.len();
    }

    // A complete row whose newline never made it to disk
    if contents.last().is_some_and(|b| *b != b'\n') {
        let mut file = open_append(path).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
    }

    Ok(rows)
}

pub(crate) async fn open_append(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?)
}

/// Write one row and its newline.
pub(crate) async fn write_line<T: serde::Serialize>(file: &mut File, row: &T) -> Result<()> {
    let mut line = serde_json::to_vec(row)?;
    line.push(b'\n');
    file.write_all(&line).await?;
    file.flush().await?;
    Ok(())
}

/// Description store persisted as an append-only JSON-lines file.
///
/// The whole file is loaded into memory on open; every append writes one
/// line before the row becomes searchable.
pub struct JsonlStore {
    inner: MemoryStore,
    file: Mutex<File>,
}

impl JsonlStore {
    pub async fn open(path: &Path, dimensions: usize) -> Result<Self> {
        let inner = MemoryStore::new(dimensions);
        for description in load_lines::<OutcomeDescription>(path).await? {
            inner.append(description).await?;
        }

        let file = open_append(path).await?;

        tracing::info!(
            path = %path.display(),
            rows = inner.len().await?,
            "Opened description store"
        );

        Ok(Self {
            inner,
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl DescriptionStore for JsonlStore {
    async fn append(&self, description: OutcomeDescription) -> Result<()> {
        self.inner.check_dimensions(&description)?;

        // Held across the memory append so file order matches search order
        let mut file = self.file.lock().await;
        write_line(&mut file, &description).await?;
        self.inner.append(description).await
    }

    async fn search(
        &self,
        embedding: &[f32],
        company_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ScoredDescription>> {
        self.inner.search(embedding, company_id, limit).await
    }

    async fn len(&self) -> Result<usize> {
        self.inner.len().await
    }

    async fn count_by_source(&self, source: DescriptionSource) -> Result<usize> {
        self.inner.count_by_source(source).await
    }

    async fn texts_by_source(&self, source: DescriptionSource) -> Result<Vec<String>> {
        self.inner.texts_by_source(source).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}
