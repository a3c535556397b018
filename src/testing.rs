//! Scripted transport and recording sleeper shared by unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::executor::{ExecutorConfig, HttpResponse, PageRequest, RequestExecutor, Sleeper, Transport};
use crate::{AppError, Result};

#[derive(Default)]
pub struct ScriptedTransport {
    responses: RefCell<VecDeque<HttpResponse>>,
    requests: RefCell<Vec<PageRequest>>,
    download_failures: RefCell<HashMap<String, u32>>,
    downloads: RefCell<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<HttpResponse>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            ..Self::default()
        }
    }

    /// The next `failures` downloads of `url` fail before one succeeds.
    pub fn failing_download(self, url: &str, failures: u32) -> Self {
        self.download_failures
            .borrow_mut()
            .insert(url.to_string(), failures);
        self
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.borrow().clone()
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, request: &PageRequest) -> Result<HttpResponse> {
        self.requests.borrow_mut().push(request.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| AppError::Transport("no scripted response left".to_string()))
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.downloads.borrow_mut().push(url.to_string());
        let mut failures = self.download_failures.borrow_mut();
        if let Some(left) = failures.get_mut(url)
            && *left > 0
        {
            *left -= 1;
            return Err(AppError::Transport(format!("connection reset: {}", url)));
        }
        Ok(url.as_bytes().to_vec())
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    slept: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.slept.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
    }
}

pub fn ok_json(body: &str) -> HttpResponse {
    HttpResponse {
        status: 200,
        retry_after: None,
        body: body.to_string(),
    }
}

pub fn rate_limited(retry_after: Option<u64>) -> HttpResponse {
    HttpResponse {
        status: 429,
        retry_after,
        body: String::new(),
    }
}

pub fn scripted_executor(
    responses: Vec<HttpResponse>,
) -> RequestExecutor<ScriptedTransport, RecordingSleeper> {
    RequestExecutor::new(
        ScriptedTransport::new(responses),
        RecordingSleeper::default(),
        ExecutorConfig::default(),
    )
}
