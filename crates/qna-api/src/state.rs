//! Application state management
//!
//! Author: hephaex@gmail.com

use qna_core::{AppConfig, Result};
use qna_rag::QnaPipeline;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Answer pipeline, including the process-wide rate limiter
    pub pipeline: Arc<QnaPipeline>,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Questions answered successfully
    pub questions_answered: AtomicU64,
    /// Cleared once shutdown starts
    pub is_ready: AtomicBool,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: Arc<QnaPipeline>) -> Self {
        Self {
            config,
            pipeline,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            questions_answered: AtomicU64::new(0),
            is_ready: AtomicBool::new(true),
        }
    }

    /// Build the pipeline described by `config`
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let pipeline = QnaPipeline::from_config(&config)?;
        Ok(Self::new(config, Arc::new(pipeline)))
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn record_answers(&self, count: usize) {
        self.questions_answered
            .fetch_add(count as u64, Ordering::SeqCst);
    }

    pub fn get_questions_answered(&self) -> u64 {
        self.questions_answered.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }
}
