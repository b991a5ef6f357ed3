//! Client-side contract over the configuration service.
//!
//! The trait is the decorator seam: transport clients, in-process clients
//! and interposing wrappers (like the rollback orchestrator's dry-run
//! probing) all share it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::Result;
use crate::proto::{
    DryRunResponse, GetRequest, HistoryRequest, HistoryResponse, ResetRequest, SetRequest,
};
use crate::schema::ConfigMessage;
use crate::tracker::DryRunRequest;

use super::ConfigServer;

#[async_trait]
pub trait ConfigClient<T: ConfigMessage>: Send + Sync {
    async fn get(&self, request: GetRequest) -> Result<T>;

    async fn get_default(&self, request: GetRequest) -> Result<T>;

    async fn set(&self, request: SetRequest<T>) -> Result<()>;

    async fn set_default(&self, request: SetRequest<T>) -> Result<()>;

    async fn reset(&self, request: ResetRequest<T>) -> Result<()>;

    async fn reset_default(&self) -> Result<()>;

    async fn history(&self, request: HistoryRequest) -> Result<HistoryResponse<T>>;

    async fn dry_run(&self, request: DryRunRequest<T>) -> Result<DryRunResponse<T>>;
}

/// In-process client over a [`ConfigServer`].
pub struct LocalConfigClient<T: ConfigMessage> {
    server: Arc<ConfigServer<T>>,
}

impl<T: ConfigMessage> LocalConfigClient<T> {
    pub fn new(server: Arc<ConfigServer<T>>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl<T: ConfigMessage> ConfigClient<T> for LocalConfigClient<T> {
    async fn get(&self, request: GetRequest) -> Result<T> {
        self.server.get(&request).await
    }

    async fn get_default(&self, request: GetRequest) -> Result<T> {
        self.server.get_default(&request).await
    }

    async fn set(&self, request: SetRequest<T>) -> Result<()> {
        self.server.set(&request).await
    }

    async fn set_default(&self, request: SetRequest<T>) -> Result<()> {
        self.server.set_default(&request).await
    }

    async fn reset(&self, request: ResetRequest<T>) -> Result<()> {
        self.server.reset(&request).await
    }

    async fn reset_default(&self) -> Result<()> {
        self.server.reset_default().await
    }

    async fn history(&self, request: HistoryRequest) -> Result<HistoryResponse<T>> {
        self.server.history(&request).await
    }

    async fn dry_run(&self, request: DryRunRequest<T>) -> Result<DryRunResponse<T>> {
        self.server.dry_run(&request).await
    }
}
