use barrage_core::CallResult;
use serde_json::Value;
use std::sync::{Mutex, PoisonError};

/// Every result of a run, split by outcome.
///
/// The three tables are guarded independently. Read them after `wait()` or `stop()` returned
/// to get a complete picture.
#[derive(Debug, Default)]
pub struct ResponseData {
    ok_data: Mutex<Vec<Value>>,
    ok_responses: Mutex<Vec<CallResult>>,
    fail_responses: Mutex<Vec<CallResult>>,
}

impl ResponseData {
    pub(crate) fn record(&self, res: CallResult) {
        if res.is_ok() {
            lock(&self.ok_data).push(res.data.clone());
            lock(&self.ok_responses).push(res);
        } else {
            lock(&self.fail_responses).push(res);
        }
    }

    /// Payloads of successful results.
    pub fn ok_data(&self) -> Vec<Value> {
        lock(&self.ok_data).clone()
    }

    pub fn ok_responses(&self) -> Vec<CallResult> {
        lock(&self.ok_responses).clone()
    }

    pub fn fail_responses(&self) -> Vec<CallResult> {
        lock(&self.fail_responses).clone()
    }

    pub fn ok_len(&self) -> usize {
        lock(&self.ok_responses).len()
    }

    pub fn fail_len(&self) -> usize {
        lock(&self.fail_responses).len()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
