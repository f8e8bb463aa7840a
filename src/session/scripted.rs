//! Scripted page session for unit tests

use crate::session::{NavigateOptions, NavigationError, PageSession};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Serves canned documents per URL
///
/// Each URL has a queue of outcomes; the last outcome repeats once the queue
/// is down to one entry. Unknown URLs fail with a load error.
pub(crate) struct ScriptedSession {
    outcomes: HashMap<String, VecDeque<Result<String, NavigationError>>>,
    current: Option<String>,
    visits: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl ScriptedSession {
    pub(crate) fn new() -> Self {
        Self {
            outcomes: HashMap::new(),
            current: None,
            visits: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn with_page(mut self, url: &str, html: &str) -> Self {
        self.outcomes
            .entry(url.to_string())
            .or_default()
            .push_back(Ok(html.to_string()));
        self
    }

    pub(crate) fn with_failures(mut self, url: &str, count: usize) -> Self {
        let queue = self.outcomes.entry(url.to_string()).or_default();
        for _ in 0..count {
            queue.push_back(Err(NavigationError::Timeout {
                url: url.to_string(),
                timeout_ms: 60_000,
            }));
        }
        self
    }

    pub(crate) fn visit_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.visits)
    }

    pub(crate) fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

#[async_trait]
impl PageSession for ScriptedSession {
    async fn navigate(
        &mut self,
        url: &str,
        _options: &NavigateOptions,
    ) -> Result<(), NavigationError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(NavigationError::Closed);
        }

        self.visits.lock().unwrap().push(url.to_string());
        self.current = None;

        let queue = match self.outcomes.get_mut(url) {
            Some(queue) if !queue.is_empty() => queue,
            _ => {
                return Err(NavigationError::Load {
                    url: url.to_string(),
                    message: "no scripted page".to_string(),
                })
            }
        };

        let outcome = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue[0].clone()
        };

        match outcome {
            Ok(html) => {
                self.current = Some(html);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn content(&self) -> Option<&str> {
        self.current.as_deref()
    }

    async fn close(&mut self) {
        self.current = None;
        self.closed.store(true, Ordering::SeqCst);
    }
}
