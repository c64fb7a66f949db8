//! 调研框架文档加载

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameworkError {
    #[error("no research framework configured")]
    NotConfigured,

    #[error("failed to read framework file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("framework file {0} is empty")]
    Empty(PathBuf),
}

/// 框架文档来源
#[async_trait]
pub trait FrameworkLoader: Send + Sync {
    async fn load(&self) -> Result<String, FrameworkError>;
}

/// 从本地Markdown/文本文件读取框架
pub struct FileFrameworkLoader {
    path: PathBuf,
}

impl FileFrameworkLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FrameworkLoader for FileFrameworkLoader {
    async fn load(&self) -> Result<String, FrameworkError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| FrameworkError::Io {
                path: self.path.clone(),
                source,
            })?;

        if text.trim().is_empty() {
            return Err(FrameworkError::Empty(self.path.clone()));
        }

        tracing::info!(path = %self.path.display(), chars = text.chars().count(), "framework loaded");
        Ok(text)
    }
}

/// 未配置框架
pub struct NoFramework;

#[async_trait]
impl FrameworkLoader for NoFramework {
    async fn load(&self) -> Result<String, FrameworkError> {
        Err(FrameworkError::NotConfigured)
    }
}
