//! In-process [`JobService`] that replays scripted replies
//!
//! Used by tests and demos. Records every request, tracks how many progress
//! requests are outstanding at once, and can hold progress replies back until
//! released so that cancellation windows can be exercised.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, Semaphore, watch};

use super::traits::{JobService, Result, TransportError};
use crate::wire::{ProgressReply, SubmitReply, SubmitRequest};

pub struct ScriptedService {
    submit_replies: Mutex<VecDeque<Result<SubmitReply>>>,
    progress_replies: Mutex<VecDeque<Result<ProgressReply>>>,
    submitted: Mutex<Vec<SubmitRequest>>,
    polled: Mutex<Vec<String>>,
    submit_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    progress_calls: watch::Sender<usize>,
    gate: Option<Semaphore>,
}

impl Default for ScriptedService {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedService {
    /// Replies are returned as soon as they are requested
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Each progress reply waits for a [`release_progress`](Self::release_progress) permit
    pub fn gated() -> Self {
        Self::build(Some(Semaphore::new(0)))
    }

    fn build(gate: Option<Semaphore>) -> Self {
        let (progress_calls, _) = watch::channel(0);
        Self {
            submit_replies: Mutex::new(VecDeque::new()),
            progress_replies: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            polled: Mutex::new(Vec::new()),
            submit_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            progress_calls,
            gate,
        }
    }

    pub async fn push_submit(&self, reply: Result<SubmitReply>) {
        self.submit_replies.lock().await.push_back(reply);
    }

    pub async fn push_progress(&self, reply: Result<ProgressReply>) {
        self.progress_replies.lock().await.push_back(reply);
    }

    /// Let `n` held progress requests resolve
    pub fn release_progress(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Wait until at least `n` progress requests have been issued
    pub async fn wait_for_progress_calls(&self, n: usize) {
        let mut calls = self.progress_calls.subscribe();
        // Sender lives in self, so the channel cannot close while we wait
        let _ = calls.wait_for(|count| *count >= n).await;
    }

    pub async fn submitted(&self) -> Vec<SubmitRequest> {
        self.submitted.lock().await.clone()
    }

    pub async fn polled_ids(&self) -> Vec<String> {
        self.polled.lock().await.clone()
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn progress_calls(&self) -> usize {
        *self.progress_calls.borrow()
    }

    /// Highest number of progress requests observed outstanding at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub async fn remaining_progress(&self) -> usize {
        self.progress_replies.lock().await.len()
    }
}

/// Counts a progress request as outstanding until dropped, including when the
/// calling task is aborted mid-request.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, high_water: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        high_water.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobService for ScriptedService {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitReply> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().await.push(request.clone());
        self.submit_replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::RequestFailed("no scripted submit reply".into())))
    }

    async fn progress(&self, download_id: &str) -> Result<ProgressReply> {
        let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);
        self.polled.lock().await.push(download_id.to_string());
        self.progress_calls.send_modify(|count| *count += 1);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        self.progress_replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::RequestFailed("no scripted progress reply".into())))
    }

    fn retrieval_url(&self, filename: &str) -> Result<String> {
        Ok(format!("http://scripted.invalid/api/download/{}", filename))
    }
}
