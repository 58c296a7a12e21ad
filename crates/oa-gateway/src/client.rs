//! Auth backend client.

use async_trait::async_trait;
use oa_common::auth_v1::{
    RefreshTokenRequest, SignInRequest, SignUpRequest, TokenPair, REFRESH_TOKEN, SIGN_IN, SIGN_UP,
};
use oa_common::{RequestContext, RpcStatus};
use oa_discovery::{ServiceConnection, ServiceResolver};

/// The auth backend's methods as the edge sees them.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_in(&self, ctx: &RequestContext, request: SignInRequest) -> Result<TokenPair, RpcStatus>;

    async fn sign_up(&self, ctx: &RequestContext, request: SignUpRequest) -> Result<TokenPair, RpcStatus>;

    async fn refresh_token(
        &self,
        ctx: &RequestContext,
        request: RefreshTokenRequest,
    ) -> Result<TokenPair, RpcStatus>;
}

/// [`AuthApi`] over a discovery-backed connection.
#[derive(Clone)]
pub struct AuthServiceClient {
    connection: ServiceConnection,
}

impl AuthServiceClient {
    pub fn new(connection: ServiceConnection) -> Self {
        Self { connection }
    }

    pub async fn connect(
        resolver: &ServiceResolver,
        service_name: &str,
    ) -> oa_discovery::Result<Self> {
        Ok(Self::new(resolver.connect(service_name).await?))
    }

    pub fn connection(&self) -> &ServiceConnection {
        &self.connection
    }

    pub fn close(&self) {
        self.connection.close();
    }
}

#[async_trait]
impl AuthApi for AuthServiceClient {
    async fn sign_in(&self, ctx: &RequestContext, request: SignInRequest) -> Result<TokenPair, RpcStatus> {
        self.connection.call(ctx, SIGN_IN, &request).await
    }

    async fn sign_up(&self, ctx: &RequestContext, request: SignUpRequest) -> Result<TokenPair, RpcStatus> {
        self.connection.call(ctx, SIGN_UP, &request).await
    }

    async fn refresh_token(
        &self,
        ctx: &RequestContext,
        request: RefreshTokenRequest,
    ) -> Result<TokenPair, RpcStatus> {
        self.connection.call(ctx, REFRESH_TOKEN, &request).await
    }
}
