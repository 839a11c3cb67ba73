use crate::error::BoxError;
use crate::types::{JobRef, PodRef};
use async_trait::async_trait;
use futures::io::{AsyncRead, AsyncReadExt};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    Api, Client, ResourceExt,
    api::{ListParams, LogParams},
};
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// Size of the buffer log bytes are copied through.
pub const LOG_CHUNK_SIZE: usize = 32 * 1024;

/// Read-once byte source for the logs of a single pod.
///
/// A stream must be released with [`LogStream::close`] once the caller is
/// done with it, whether reading succeeded or not.
#[async_trait]
pub trait LogStream: Send {
    /// Reads the next bytes into `buf`, returning 0 at end of input.
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, BoxError>;

    /// Releases the stream. Must be called on every path; calling it again is a no-op.
    async fn close(&mut self) -> Result<(), BoxError>;
}

/// The slice of the orchestration platform the report collectors rely on.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<PodRef>, BoxError>;

    async fn list_jobs(&self, namespace: &str, selector: &str) -> Result<Vec<JobRef>, BoxError>;

    async fn stream_pod_logs(&self, pod: &PodRef) -> Result<Box<dyn LogStream>, BoxError>;
}

/// [`PlatformClient`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
    log_params: LogParams,
}

impl KubeClient {
    /// Uses the default log options: no follow, no tail limit and no
    /// container, so the server picks the pod's default container.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            log_params: LogParams::default(),
        }
    }

    /// Prefix every log line with the timestamp recorded by the kubelet.
    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.log_params.timestamps = timestamps;
        self
    }
}

/// Lists the namespaced objects of kind `T` matching `selector` and returns
/// their `(name, namespace)` pairs in listing order.
async fn list_names_generic<T>(
    client: &Client,
    namespace: &str,
    selector: &str,
) -> Result<Vec<(String, String)>, kube::Error>
where
    T: k8s_openapi::Resource<Scope = k8s_openapi::NamespaceResourceScope>
        + k8s_openapi::Metadata<Ty = k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta>
        + serde::de::DeserializeOwned
        + Clone
        + Debug
        + Send
        + Sync,
{
    let api: Api<T> = Api::namespaced(client.clone(), namespace);
    let list = api.list(&ListParams::default().labels(selector)).await?;
    Ok(list
        .into_iter()
        .map(|obj| {
            let ns = obj.namespace().unwrap_or_else(|| namespace.to_string());
            (obj.name_any(), ns)
        })
        .collect())
}

#[async_trait]
impl PlatformClient for KubeClient {
    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<PodRef>, BoxError> {
        let pods = list_names_generic::<Pod>(&self.client, namespace, selector).await?;
        debug!("Found {} pods in {} matching {}", pods.len(), namespace, selector);
        Ok(pods
            .into_iter()
            .map(|(name, ns)| PodRef::new(name, ns))
            .collect())
    }

    async fn list_jobs(&self, namespace: &str, selector: &str) -> Result<Vec<JobRef>, BoxError> {
        let jobs = list_names_generic::<Job>(&self.client, namespace, selector).await?;
        debug!("Found {} jobs in {} matching {}", jobs.len(), namespace, selector);
        Ok(jobs
            .into_iter()
            .map(|(name, ns)| JobRef::new(name, ns))
            .collect())
    }

    async fn stream_pod_logs(&self, pod: &PodRef) -> Result<Box<dyn LogStream>, BoxError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &pod.namespace);
        let name = pod.name.clone();
        let lp = self.log_params.clone();
        open_log_stream(async move { api.log_stream(&name, &lp).await }).await
    }
}

/// Awaits `open` and wraps the reader it yields into a [`LogStream`].
pub async fn open_log_stream<F, R, E>(open: F) -> Result<Box<dyn LogStream>, BoxError>
where
    F: Future<Output = Result<R, E>>,
    R: AsyncRead + Send + 'static,
    E: Into<BoxError>,
{
    let reader = match open.await {
        Ok(reader) => reader,
        Err(e) => return Err(e.into()),
    };
    Ok(Box::new(ReaderLogStream {
        reader: Some(Box::pin(reader)),
    }))
}

/// Log stream over the body of the pods/log response. Closing drops the
/// body, which releases the connection.
struct ReaderLogStream {
    reader: Option<Pin<Box<dyn AsyncRead + Send>>>,
}

#[async_trait]
impl LogStream for ReaderLogStream {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, BoxError> {
        match self.reader.as_mut() {
            Some(reader) => Ok(reader.read(buf).await?),
            None => Err("log stream already closed".into()),
        }
    }

    async fn close(&mut self) -> Result<(), BoxError> {
        self.reader.take();
        Ok(())
    }
}
