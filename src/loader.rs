//! Loads a lesson into editor state.
//!
//! Two acquisition paths feed the same block mapping: a lesson payload the
//! caller already holds, or a fetch by course, module and lesson id. Each
//! load takes a generation number; a load overtaken by a newer one returns
//! [`LoadError::Superseded`] instead of its results.

use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use crate::api::{ApiError, LessonSource};
use crate::helper::normalizer_helpers::map_raw_blocks_to_edit_blocks;
use crate::models::lesson_models::{
    legacy_content_blocks, lesson_title_of, LessonContentEnvelope, LessonState, UNTITLED_LESSON,
};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Load {generation} was superseded by a newer load")]
    Superseded { generation: u64 },
}

/// Identifies the lesson to open.
#[derive(Debug, Clone, Default)]
pub struct LoadRequest {
    pub course_id: Option<String>,
    pub module_id: Option<String>,
    pub lesson_id: Option<String>,
    /// Lesson payload handed over by the caller, e.g. from navigation.
    pub prefetched: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadOutcome {
    pub state: LessonState,
    /// The load failed for lack of valid credentials.
    pub redirect_to_login: bool,
}

pub struct LessonLoader<S> {
    source: S,
    generation: AtomicU64,
}

impl<S: LessonSource> LessonLoader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            generation: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Starts a new load, invalidating any load still in flight.
    pub async fn load(&self, request: &LoadRequest) -> Result<LoadOutcome, LoadError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let lesson_id = non_blank(request.lesson_id.as_deref());

        if lesson_id.is_none() && request.prefetched.is_none() {
            log::debug!("No lesson id or lesson data; starting a new lesson.");
            return Ok(LoadOutcome {
                state: LessonState::new_lesson(),
                redirect_to_login: false,
            });
        }

        let mut state = LessonState::loading();

        let lesson = match &request.prefetched {
            Some(prefetched) => crate::api::unwrap_data(prefetched.clone()),
            None => match self.fetch_metadata(request, lesson_id, generation).await? {
                Ok(Some(lesson)) => lesson,
                Ok(None) => Value::Null,
                Err(e) => return Ok(self.primary_failure(state, e)),
            },
        };

        if !lesson.is_null() {
            state.lesson_title = lesson_title_of(&lesson);
            state.set_content_blocks(map_raw_blocks_to_edit_blocks(&legacy_content_blocks(
                &lesson,
            )));
            state.lesson_data = Some(lesson);
        }

        let mut redirect_to_login = false;
        if let Some(lesson_id) = lesson_id {
            state.fetching_content = true;
            let fetched = self.source.fetch_lesson_content(lesson_id).await;
            self.ensure_current(generation)?;
            match fetched {
                Ok(envelope) => apply_content(&mut state, envelope),
                Err(e) => {
                    log::error!(
                        "Failed to fetch content for lesson {}: {}. Keeping lesson data.",
                        lesson_id,
                        e
                    );
                    redirect_to_login = e.is_auth_failure();
                }
            }
        }

        Ok(LoadOutcome {
            state: state.settle(),
            redirect_to_login,
        })
    }

    async fn fetch_metadata(
        &self,
        request: &LoadRequest,
        lesson_id: Option<&str>,
        generation: u64,
    ) -> Result<Result<Option<Value>, ApiError>, LoadError> {
        let (Some(lesson_id), Some(course_id), Some(module_id)) = (
            lesson_id,
            non_blank(request.course_id.as_deref()),
            non_blank(request.module_id.as_deref()),
        ) else {
            log::warn!("Course or module id missing; skipping lesson metadata fetch.");
            return Ok(Ok(None));
        };

        let fetched = self
            .source
            .fetch_lesson(course_id, module_id, lesson_id)
            .await;
        self.ensure_current(generation)?;
        Ok(fetched.map(Some))
    }

    fn primary_failure(&self, mut state: LessonState, error: ApiError) -> LoadOutcome {
        log::error!("Failed to load lesson: {}", error);
        state.lesson_title = UNTITLED_LESSON.to_string();
        let redirect_to_login = error.is_auth_failure();
        if redirect_to_login {
            log::warn!("Authentication failed while loading lesson; login required.");
        }
        LoadOutcome {
            state: state.settle(),
            redirect_to_login,
        }
    }

    fn ensure_current(&self, generation: u64) -> Result<(), LoadError> {
        if self.generation.load(Ordering::SeqCst) == generation {
            Ok(())
        } else {
            log::debug!("Discarding response from superseded load {}.", generation);
            Err(LoadError::Superseded { generation })
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Content-endpoint blocks replace any legacy blocks from the lesson payload,
/// unless the endpoint has none.
fn apply_content(state: &mut LessonState, envelope: LessonContentEnvelope) {
    if !envelope.data.content.is_empty() || state.content_blocks.is_empty() {
        state.set_content_blocks(map_raw_blocks_to_edit_blocks(&envelope.data.content));
    }
    state.set_lesson_content(Some(envelope));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::lesson_models::{EMPTY_CONTENT_MESSAGE, NEW_LESSON};
    use crate::models::BlockKind;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeSource {
        lesson: Option<Value>,
        lesson_status: Option<u16>,
        content: Option<Value>,
        content_status: Option<u16>,
        calls: AtomicUsize,
    }

    fn status_error(status: u16) -> ApiError {
        ApiError::Status {
            status,
            body: String::new(),
        }
    }

    #[async_trait]
    impl LessonSource for FakeSource {
        async fn fetch_lesson(&self, _: &str, _: &str, _: &str) -> Result<Value, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.lesson_status {
                Some(status) => Err(status_error(status)),
                None => Ok(self.lesson.clone().unwrap_or(json!({}))),
            }
        }

        async fn fetch_lesson_content(
            &self,
            lesson_id: &str,
        ) -> Result<LessonContentEnvelope, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match (self.content_status, &self.content) {
                (Some(404), _) | (None, None) => Ok(LessonContentEnvelope::empty(lesson_id)),
                (Some(status), _) => Err(status_error(status)),
                (None, Some(body)) => Ok(serde_json::from_value(body.clone()).unwrap()),
            }
        }
    }

    fn by_id(lesson: &str) -> LoadRequest {
        LoadRequest {
            course_id: Some("c1".into()),
            module_id: Some("m1".into()),
            lesson_id: Some(lesson.into()),
            prefetched: None,
        }
    }

    #[tokio::test]
    async fn no_lesson_id_starts_an_empty_lesson_without_fetching() {
        let loader = LessonLoader::new(FakeSource::default());
        let outcome = loader.load(&LoadRequest::default()).await.unwrap();

        assert_eq!(outcome.state.lesson_title, NEW_LESSON);
        assert!(outcome.state.content_blocks.is_empty());
        assert!(!outcome.state.loading);
        assert_eq!(loader.source().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetch_by_id_maps_content_blocks() {
        let loader = LessonLoader::new(FakeSource {
            lesson: Some(json!({"title": "Photosynthesis"})),
            content: Some(json!({"data": {"content": [
                {"type": "divider", "order": 2, "html_css": "<hr>"},
                {"type": "quiz-unknown", "order": 1, "html_css": "<h1>T</h1><p>B</p>"}
            ]}})),
            ..FakeSource::default()
        });

        let outcome = loader.load(&by_id("l1")).await.unwrap();
        let state = outcome.state;
        assert_eq!(state.lesson_title, "Photosynthesis");
        assert_eq!(state.content_blocks.len(), 2);
        assert_eq!(state.content_blocks[0].type_name(), "text");
        assert_matches!(&state.content_blocks[1].kind, BlockKind::Divider(d) => {
            assert_eq!(d.subtype, "divider");
        });
        assert!(!outcome.redirect_to_login);
    }

    #[tokio::test]
    async fn content_not_found_yields_empty_defaults() {
        let loader = LessonLoader::new(FakeSource {
            content_status: Some(404),
            ..FakeSource::default()
        });

        let state = loader.load(&by_id("l9")).await.unwrap().state;
        let content = state.lesson_content.unwrap();
        assert!(content.data.content.is_empty());
        assert_eq!(content.message.as_deref(), Some(EMPTY_CONTENT_MESSAGE));
        assert!(!state.loading);
        assert!(!state.fetching_content);
        assert_eq!(state.lesson_title, UNTITLED_LESSON);
    }

    #[tokio::test]
    async fn unauthorized_metadata_fetch_requests_login() {
        let loader = LessonLoader::new(FakeSource {
            lesson_status: Some(401),
            ..FakeSource::default()
        });

        let outcome = loader.load(&by_id("l1")).await.unwrap();
        assert!(outcome.redirect_to_login);
        assert_eq!(outcome.state.lesson_title, UNTITLED_LESSON);
        assert!(!outcome.state.loading);
        // Content is never requested after a failed metadata fetch.
        assert_eq!(loader.source().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_error_does_not_redirect() {
        let loader = LessonLoader::new(FakeSource {
            lesson_status: Some(500),
            ..FakeSource::default()
        });
        let outcome = loader.load(&by_id("l1")).await.unwrap();
        assert!(!outcome.redirect_to_login);
    }

    #[tokio::test]
    async fn content_failure_keeps_prefetched_lesson() {
        let loader = LessonLoader::new(FakeSource {
            content_status: Some(500),
            ..FakeSource::default()
        });
        let request = LoadRequest {
            lesson_id: Some("l1".into()),
            prefetched: Some(json!({"data": {
                "title": "From navigation",
                "contentBlocks": [{"type": "quote", "content": "q"}]
            }})),
            ..LoadRequest::default()
        };

        let state = loader.load(&request).await.unwrap().state;
        assert_eq!(state.lesson_title, "From navigation");
        assert_eq!(state.content_blocks.len(), 1);
        assert_eq!(state.content_blocks[0].type_name(), "quote");
        assert!(state.lesson_content.is_none());
        assert!(state.lesson_data.is_some());
        // Only the content endpoint is called on the prefetched path.
        assert_eq!(loader.source().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_token_on_content_fetch_requests_login() {
        let prefetched = LoadRequest {
            lesson_id: Some("l1".into()),
            prefetched: Some(json!({"title": "Nav"})),
            ..LoadRequest::default()
        };
        for request in [prefetched, by_id("l1")] {
            let loader = LessonLoader::new(FakeSource {
                lesson: Some(json!({"title": "Nav"})),
                content_status: Some(401),
                ..FakeSource::default()
            });
            let outcome = loader.load(&request).await.unwrap();
            assert!(outcome.redirect_to_login);
            assert_eq!(outcome.state.lesson_title, "Nav");
            assert!(outcome.state.lesson_data.is_some());
            assert!(!outcome.state.fetching_content);
        }
    }

    #[tokio::test]
    async fn prefetched_lesson_without_id_does_not_fetch() {
        let loader = LessonLoader::new(FakeSource::default());
        let request = LoadRequest {
            prefetched: Some(json!({"lesson_title": "Draft"})),
            ..LoadRequest::default()
        };
        let state = loader.load(&request).await.unwrap().state;
        assert_eq!(state.lesson_title, "Draft");
        assert_eq!(loader.source().calls.load(Ordering::SeqCst), 0);
    }

    /// Holds the first content request until released.
    struct GatedSource {
        gate: Arc<Notify>,
        first: AtomicUsize,
    }

    #[async_trait]
    impl LessonSource for GatedSource {
        async fn fetch_lesson(&self, _: &str, _: &str, lesson_id: &str) -> Result<Value, ApiError> {
            Ok(json!({"title": lesson_id}))
        }

        async fn fetch_lesson_content(
            &self,
            lesson_id: &str,
        ) -> Result<LessonContentEnvelope, ApiError> {
            if self.first.fetch_add(1, Ordering::SeqCst) == 0 {
                self.gate.notified().await;
            }
            Ok(LessonContentEnvelope::empty(lesson_id))
        }
    }

    #[tokio::test]
    async fn stale_load_is_discarded() {
        let gate = Arc::new(Notify::new());
        let loader = Arc::new(LessonLoader::new(GatedSource {
            gate: gate.clone(),
            first: AtomicUsize::new(0),
        }));

        let slow = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.load(&by_id("old")).await })
        };
        // Let the first load reach the gate before starting the second.
        while loader.source().first.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let fresh = loader.load(&by_id("new")).await.unwrap();
        assert_eq!(fresh.state.lesson_title, "new");

        gate.notify_one();
        let stale = slow.await.unwrap();
        assert_matches!(stale, Err(LoadError::Superseded { generation: 1 }));
    }
}
