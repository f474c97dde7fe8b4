//! Test Helper Utilities
//!
//! Shared fakes and builders for mbp-ingest integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use mbp_common::events::EventBus;
use mbp_ingest::config::IngestLimits;
use mbp_ingest::services::{
    BatchParser, CreationClient, CreationError, CreationRequest, MetadataResolver,
    ResolverConfig, UploadExecutor,
};
use mbp_ingest::workflow::Pipeline;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Nothing listens here; connections are refused immediately
pub const UNREACHABLE: &str = "http://127.0.0.1:9";

/// Creation client that replays scripted results and records every request
///
/// Once the script runs out every call succeeds with `m-{index}`.
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<CreationRequest>>,
}

impl ScriptedClient {
    pub fn new(script: Vec<Result<&str, &str>>) -> Arc<Self> {
        let script = script
            .into_iter()
            .map(|r| r.map(str::to_string).map_err(str::to_string))
            .collect();
        Arc::new(Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn always_ok() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn requests(&self) -> Vec<CreationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn submitted_indices(&self) -> Vec<usize> {
        self.requests().iter().map(|r| r.index).collect()
    }
}

#[async_trait]
impl CreationClient for ScriptedClient {
    async fn create(&self, request: &CreationRequest) -> Result<String, CreationError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(id)) => Ok(id),
            Some(Err(message)) => Err(CreationError::Rejected {
                status: 500,
                message,
            }),
            None => Ok(format!("m-{}", request.index)),
        }
    }
}

/// Resolver configuration pointing every remote at `base`
pub fn resolver_config(base: &str, api_key: Option<&str>) -> ResolverConfig {
    ResolverConfig {
        request_timeout: Duration::from_secs(2),
        folder_depth: 3,
        folder_search_timeout: Duration::from_secs(2),
        thumbnail_width: 320,
        drive_requests_per_second: 100,
        drive_api_key: api_key.map(str::to_string),
        drive_api_base: base.to_string(),
        drive_web_base: base.to_string(),
        oembed_endpoint: format!("{}/oembed", base),
        video_thumbnail_base: format!("{}/vi", base),
    }
}

/// Pipeline with offline resolvers and the given creation client
pub fn test_pipeline(client: Arc<dyn CreationClient>, limits: IngestLimits) -> Pipeline {
    let resolver = MetadataResolver::new(resolver_config(UNREACHABLE, None))
        .expect("resolver should build");
    Pipeline::new(
        BatchParser::new(limits),
        Arc::new(resolver),
        Arc::new(UploadExecutor::new(client)),
        EventBus::new(100),
    )
}

/// Write `count` small text files into `dir`
pub fn write_files(dir: &std::path::Path, count: usize) -> Vec<std::path::PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.join(format!("notes_{:02}.txt", i));
            std::fs::write(&path, format!("file {}", i)).expect("write test file");
            path
        })
        .collect()
}
