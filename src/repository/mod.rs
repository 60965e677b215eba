//! Quiz content repository.
//!
//! The coordinator only ever reads quiz content, through [`QuizRepository`].
//! [`CatalogRepository`] serves a catalog loaded once at startup.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Quiz, QuizId, QuizSummary};

/// Failure of the backing store. "Not found" is not an error, see
/// [`QuizRepository::fetch_quiz`].
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("quiz repository unavailable: {0}")]
    Unavailable(String),
}

/// Read-only source of quiz content keyed by quiz id.
#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// Fetch a quiz. `Ok(None)` means the id is unknown.
    async fn fetch_quiz(&self, id: QuizId) -> Result<Option<Quiz>, RepositoryError>;

    /// List every quiz available to hosts.
    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, RepositoryError>;
}

/// In-memory repository over a fixed catalog.
#[derive(Debug, Default)]
pub struct CatalogRepository {
    quizzes: BTreeMap<QuizId, Quiz>,
}

impl CatalogRepository {
    /// Build the repository, normalising every slide path to a URL.
    pub fn new(quizzes: Vec<Quiz>) -> Self {
        let quizzes = quizzes
            .into_iter()
            .map(|mut quiz| {
                quiz.slides = quiz.slides.iter().map(|s| normalize_slide_url(s)).collect();
                (quiz.id, quiz)
            })
            .collect();
        Self { quizzes }
    }

    pub fn len(&self) -> usize {
        self.quizzes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quizzes.is_empty()
    }
}

#[async_trait]
impl QuizRepository for CatalogRepository {
    async fn fetch_quiz(&self, id: QuizId) -> Result<Option<Quiz>, RepositoryError> {
        Ok(self.quizzes.get(&id).cloned())
    }

    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, RepositoryError> {
        Ok(self.quizzes.values().map(Quiz::summary).collect())
    }
}

/// Turn a stored slide location into a URL path served by the asset host.
///
/// Windows separators become `/`, a filesystem prefix ending in `server/`
/// is dropped for files under `server/uploads/`, and the result always
/// starts with `/`.
pub fn normalize_slide_url(path: &str) -> String {
    let mut url = path.replace('\\', "/");
    if url.contains("server/uploads/") {
        if let Some((_, rest)) = url.split_once("server/") {
            url = rest.to_string();
        }
    }
    if url.starts_with('/') {
        url
    } else {
        format!("/{}", url)
    }
}
