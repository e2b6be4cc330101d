//! API client facade
//!
//! JSON and file operations over the resilient pipeline. Every call gets
//! the pre-flight refresh, bearer attachment and 401/timeout recovery; this
//! layer only shapes requests and decodes responses.

use std::sync::Arc;
use std::time::Duration;

use ecm_core::auth::{AuthBootstrap, BootstrapError};
use ecm_core::ports::{IdentityClient, Navigator, Notifier, SessionStore, Transport};
use ecm_core::session::{RedirectFailurePolicy, SessionMarkers};
use ecm_core::ResilientPipeline;
use ecm_domain::{
    AuthConfig, Credentials, EcmConfig, FilePart, HttpMethod, HttpResponse, OperationClass,
    RequestDescriptor,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::errors::ApiError;
use crate::http::HttpTransport;
use crate::identity::BackendIdentityClient;
use crate::navigation::RecordingNavigator;
use crate::notify::TracingNotifier;
use crate::session::open_store;

/// Multipart field carrying uploaded file content
pub const UPLOAD_FIELD: &str = "file";

/// API client with session recovery
pub struct ApiClient {
    pipeline: Arc<ResilientPipeline>,
    markers: SessionMarkers,
    auth: AuthConfig,
}

impl ApiClient {
    /// Client over an assembled pipeline
    pub fn new(pipeline: Arc<ResilientPipeline>, markers: SessionMarkers, auth: AuthConfig) -> Self {
        Self { pipeline, markers, auth }
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Underlying request pipeline
    pub fn pipeline(&self) -> &Arc<ResilientPipeline> {
        &self.pipeline
    }

    /// Session markers shared with the pipeline
    pub fn markers(&self) -> &SessionMarkers {
        &self.markers
    }

    fn identity(&self) -> &Arc<dyn IdentityClient> {
        self.pipeline.coordinator().identity()
    }

    /// Restore the session at startup under the configured timeout and retries
    ///
    /// Returns whether a token is available afterwards.
    pub async fn initialize(&self) -> Result<bool, BootstrapError> {
        AuthBootstrap::new(self.markers.clone(), self.auth.clone())
            .initialize_identity(Arc::clone(self.identity()))
            .await
    }

    /// Log in and clear the markers left by an expired session
    pub async fn login(&self, credentials: &Credentials) -> Result<(), ApiError> {
        self.identity().login(credentials).await?;
        self.markers.clear_redirect_reason()?;
        self.markers.clear_login_progress()?;
        self.markers.clear_redirect_failures()?;
        Ok(())
    }

    /// End the session with the identity backend
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.identity().logout().await?;
        Ok(())
    }

    /// Send a descriptor through the pipeline and return the raw response
    ///
    /// Attach a cancellation token to the descriptor to make it cancellable.
    #[instrument(skip(self, request), fields(method = request.method.as_str(), url = %request.url))]
    pub async fn send(&self, request: RequestDescriptor) -> Result<HttpResponse, ApiError> {
        self.pipeline.execute(request).await.map_err(ApiError::from)
    }

    /// Send a descriptor and decode its JSON response
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestDescriptor,
    ) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        decode(&response)
    }

    /// GET `path` and decode the JSON body
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(RequestDescriptor::get(path)).await
    }

    /// POST a JSON body to `path`
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(json_request(HttpMethod::Post, path, body)?).await
    }

    /// PUT a JSON body to `path`
    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(json_request(HttpMethod::Put, path, body)?).await
    }

    /// PATCH a JSON body to `path`
    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(json_request(HttpMethod::Patch, path, body)?).await
    }

    /// DELETE `path`
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(RequestDescriptor::new(HttpMethod::Delete, path)).await
    }

    /// Upload one file as multipart form data under the upload budget
    ///
    /// `progress` receives a percentage: 0 when the upload starts and 100
    /// once the server accepted it.
    #[instrument(skip(self, bytes, progress), fields(size = bytes.len()))]
    pub async fn upload_file(
        &self,
        path: &str,
        file_name: &str,
        bytes: Vec<u8>,
        progress: impl Fn(u8) + Send + Sync,
    ) -> Result<Value, ApiError> {
        let request = RequestDescriptor::post(path)
            .with_operation(OperationClass::Upload)
            .with_file(FilePart {
                field: UPLOAD_FIELD.to_string(),
                file_name: file_name.to_string(),
                bytes,
            });

        progress(0);
        let value = self.execute(request).await?;
        progress(100);

        info!(path, file_name, "upload complete");
        Ok(value)
    }

    /// Fetch raw bytes under the download budget
    #[instrument(skip(self))]
    pub async fn download(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        let request = RequestDescriptor::get(path).with_operation(OperationClass::Download);
        let response = self.send(request).await?;
        debug!(path, size = response.body.len(), "download complete");
        Ok(response.body)
    }
}

/// Builder for [`ApiClient`]
///
/// Any port left unset is built from the configuration: reqwest transport,
/// file or memory session store, backend identity client, recording
/// navigator and tracing notifier.
#[derive(Default)]
pub struct ApiClientBuilder {
    config: EcmConfig,
    transport: Option<Arc<dyn Transport>>,
    identity: Option<Arc<dyn IdentityClient>>,
    store: Option<Arc<dyn SessionStore>>,
    navigator: Option<Arc<dyn Navigator>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ApiClientBuilder {
    /// Configuration; defaults apply when unset
    pub fn config(mut self, config: EcmConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the reqwest transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the backend identity client
    pub fn identity(mut self, identity: Arc<dyn IdentityClient>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Replace the configured session store
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the recording navigator
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Replace the tracing notifier
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Assemble the client, filling unset ports from configuration
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let config = self.config;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::from_config(&config.http)?),
        };
        let store = match self.store {
            Some(store) => store,
            None => open_store(&config.session)?,
        };
        let identity: Arc<dyn IdentityClient> = match self.identity {
            Some(identity) => identity,
            None => Arc::new(BackendIdentityClient::new(
                Arc::clone(&transport),
                Arc::clone(&store),
                config.auth.clone(),
            )),
        };
        let navigator: Arc<dyn Navigator> = match self.navigator {
            Some(navigator) => navigator,
            None => Arc::new(RecordingNavigator::default()),
        };
        let notifier: Arc<dyn Notifier> = match self.notifier {
            Some(notifier) => notifier,
            None => Arc::new(TracingNotifier::new()),
        };

        let redirect_policy = RedirectFailurePolicy::from_config(&config.session);
        let markers = SessionMarkers::new(Arc::clone(&store))
            .with_login_timeout(Duration::from_millis(config.session.login_in_progress_timeout_ms))
            .with_redirect_policy(redirect_policy);
        let pipeline = ResilientPipeline::builder()
            .transport(transport)
            .identity(identity)
            .session_store(store)
            .navigator(navigator)
            .notifier(notifier)
            .login_path(config.auth.login_path.clone())
            .redirect_policy(redirect_policy)
            .build()?;

        Ok(ApiClient::new(Arc::new(pipeline), markers, config.auth))
    }
}

fn json_request<B: Serialize>(
    method: HttpMethod,
    path: &str,
    body: &B,
) -> Result<RequestDescriptor, ApiError> {
    let body = serde_json::to_value(body)
        .map_err(|e| ApiError::Internal(format!("Failed to serialize body: {}", e)))?;
    Ok(RequestDescriptor::new(method, path).with_json(body))
}

/// Decode a JSON body; 204/205 and empty bodies decode from `null`
fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    if response.is_empty() {
        return serde_json::from_value(Value::Null).map_err(|_| {
            ApiError::Decode(format!(
                "No content response ({}), but response type cannot be deserialized from empty body",
                response.status
            ))
        });
    }

    response.json().map_err(|e| ApiError::Decode(format!("Failed to parse response: {}", e)))
}
