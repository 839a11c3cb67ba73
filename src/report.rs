//! Collection of pod logs into a report archive.
//!
//! Everything here runs sequentially on the caller's task: the archive is a
//! single-writer sink and entries must not interleave. Each pod's log is
//! copied chunk by chunk, so memory use does not depend on the log size.
//!
//! Layout produced for a cluster:
//!
//! ```text
//! <root>/logs/
//! <root>/logs/<pod>.jsonl
//! <root>/job-logs/
//! <root>/job-logs/<pod>.jsonl
//! ```

use crate::archive::{ArchiveWriter, dir_entry, join_path};
use crate::error::{BoxError, ReportError};
use crate::kubernetes::{LOG_CHUNK_SIZE, LogStream, PlatformClient};
use crate::types::{ClusterRef, PodRef};
use crate::utils::{
    CLUSTER_LABEL, JOB_NAME_LABEL, OPERATOR_LABEL, OPERATOR_LABEL_VALUE, matching_label,
};
use std::future::Future;
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const CLUSTER_LOGS_SECTION: &str = "logs";
pub const JOB_LOGS_SECTION: &str = "job-logs";
pub const OPERATOR_LOGS_SECTION: &str = "operator-logs";

/// How a pod's file entry is named inside its section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryName {
    /// `<pod>.jsonl`, used by the cluster sections.
    Plain,
    /// `<pod>-logs.jsonl`, used by pre-resolved pod batches.
    LogsSuffix,
}

impl EntryName {
    fn file_name(self, pod: &PodRef) -> String {
        match self {
            EntryName::Plain => format!("{}.jsonl", pod.name),
            EntryName::LogsSuffix => format!("{}-logs.jsonl", pod.name),
        }
    }
}

/// Runs `fut` unless `token` fires first.
async fn cancellable<T>(
    token: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, ReportError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ReportError::Cancelled),
        out = fut => Ok(out),
    }
}

fn ensure_active(token: &CancellationToken) -> Result<(), ReportError> {
    if token.is_cancelled() {
        return Err(ReportError::Cancelled);
    }
    Ok(())
}

fn create_entry<'a, A>(
    archive: &'a mut A,
    path: &str,
) -> Result<&'a mut (dyn Write + Send), ReportError>
where
    A: ArchiveWriter + ?Sized,
{
    archive.create_entry(path).map_err(|source| ReportError::Archive {
        path: path.to_string(),
        source,
    })
}

/// Creates the `<root>/<section>/` directory entry and returns the
/// directory path without the trailing slash.
fn create_section<A>(
    token: &CancellationToken,
    archive: &mut A,
    root_dir: &str,
    section: &str,
) -> Result<String, ReportError>
where
    A: ArchiveWriter + ?Sized,
{
    ensure_active(token)?;
    let dir = join_path(&[root_dir, section]);
    create_entry(archive, &dir_entry(&dir))?;
    Ok(dir)
}

async fn list_pods<C>(
    client: &C,
    token: &CancellationToken,
    target: String,
    namespace: &str,
    selector: &str,
) -> Result<Vec<PodRef>, ReportError>
where
    C: PlatformClient + ?Sized,
{
    cancellable(token, client.list_pods(namespace, selector))
        .await?
        .map_err(|source| ReportError::Discovery {
            target,
            namespace: namespace.to_string(),
            selector: selector.to_string(),
            source,
        })
}

/// Streams the logs of `pod` into `sink`.
///
/// The log stream is released on every exit path. A copy failure (or
/// cancellation) wins over a failure to release the stream.
pub async fn stream_pod_logs<C>(
    client: &C,
    token: &CancellationToken,
    pod: &PodRef,
    sink: &mut (dyn Write + Send),
) -> Result<(), ReportError>
where
    C: PlatformClient + ?Sized,
{
    let mut stream = cancellable(token, client.stream_pod_logs(pod))
        .await?
        .map_err(|source| ReportError::StreamOpen {
            pod: pod.name.clone(),
            source,
        })?;

    let copied = copy_log_stream(token, stream.as_mut(), pod, sink).await;
    let closed = stream.close().await;

    match (copied, closed) {
        (Err(e), _) => Err(e),
        (Ok(_), Err(source)) => Err(ReportError::StreamClose {
            pod: pod.name.clone(),
            source,
        }),
        (Ok(bytes), Ok(())) => {
            debug!(
                "Copied {} bytes of logs from pod {}/{}",
                bytes, pod.namespace, pod.name
            );
            Ok(())
        }
    }
}

async fn copy_log_stream(
    token: &CancellationToken,
    stream: &mut dyn LogStream,
    pod: &PodRef,
    sink: &mut (dyn Write + Send),
) -> Result<u64, ReportError> {
    let copy_error = |source: BoxError| ReportError::StreamCopy {
        pod: pod.name.clone(),
        source,
    };

    let mut buf = vec![0u8; LOG_CHUNK_SIZE];
    let mut copied = 0u64;
    loop {
        let read = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ReportError::Cancelled),
            read = stream.read_chunk(&mut buf) => read.map_err(copy_error)?,
        };
        if read == 0 {
            break;
        }
        sink.write_all(&buf[..read]).map_err(|e| copy_error(e.into()))?;
        copied += read as u64;
    }
    sink.flush().map_err(|e| copy_error(e.into()))?;
    Ok(copied)
}

/// Writes one file entry per pod into an existing directory, stopping at
/// the first pod that fails.
async fn write_pod_entries<C, A>(
    client: &C,
    token: &CancellationToken,
    pods: &[PodRef],
    dir: &str,
    naming: EntryName,
    archive: &mut A,
) -> Result<(), ReportError>
where
    C: PlatformClient + ?Sized,
    A: ArchiveWriter + ?Sized,
{
    for pod in pods {
        ensure_active(token)?;
        let path = join_path(&[dir, &naming.file_name(pod)]);
        let sink = create_entry(archive, &path)?;
        stream_pod_logs(client, token, pod, sink).await?;
        info!("Collected logs of pod {}/{} into {}", pod.namespace, pod.name, path);
    }
    Ok(())
}

/// Streams the logs of an already resolved list of pods into
/// `<root_dir>/<section>/<pod>-logs.jsonl`.
///
/// The section directory is created even when `pods` is empty.
pub async fn stream_pod_logs_to_zip<C, A>(
    client: &C,
    token: &CancellationToken,
    pods: &[PodRef],
    root_dir: &str,
    section: &str,
    archive: &mut A,
) -> Result<(), ReportError>
where
    C: PlatformClient + ?Sized,
    A: ArchiveWriter + ?Sized,
{
    let dir = create_section(token, archive, root_dir, section)?;
    write_pod_entries(client, token, pods, &dir, EntryName::LogsSuffix, archive).await
}

/// Streams the logs of every pod labelled with the cluster name into
/// `<root_dir>/logs/<pod>.jsonl`.
pub async fn stream_cluster_logs_to_zip<C, A>(
    client: &C,
    token: &CancellationToken,
    cluster: &ClusterRef,
    root_dir: &str,
    archive: &mut A,
) -> Result<(), ReportError>
where
    C: PlatformClient + ?Sized,
    A: ArchiveWriter + ?Sized,
{
    let dir = create_section(token, archive, root_dir, CLUSTER_LOGS_SECTION)?;

    let selector = matching_label(CLUSTER_LABEL, &cluster.name);
    let pods = list_pods(
        client,
        token,
        "cluster pods".to_string(),
        &cluster.namespace,
        &selector,
    )
    .await?;
    info!(
        "[{}] Collecting logs of {} cluster pods in namespace {}",
        cluster.name,
        pods.len(),
        cluster.namespace
    );

    write_pod_entries(client, token, &pods, &dir, EntryName::Plain, archive).await
}

/// Streams the logs of the pods spawned by the cluster's jobs into
/// `<root_dir>/job-logs/<pod>.jsonl`.
///
/// Job pods only carry the `job-name` label, so they are reached through
/// the jobs labelled with the cluster name.
pub async fn stream_cluster_job_logs_to_zip<C, A>(
    client: &C,
    token: &CancellationToken,
    cluster: &ClusterRef,
    root_dir: &str,
    archive: &mut A,
) -> Result<(), ReportError>
where
    C: PlatformClient + ?Sized,
    A: ArchiveWriter + ?Sized,
{
    let dir = create_section(token, archive, root_dir, JOB_LOGS_SECTION)?;

    let selector = matching_label(CLUSTER_LABEL, &cluster.name);
    let jobs = cancellable(token, client.list_jobs(&cluster.namespace, &selector))
        .await?
        .map_err(|source| ReportError::Discovery {
            target: "cluster jobs".to_string(),
            namespace: cluster.namespace.clone(),
            selector: selector.clone(),
            source,
        })?;
    info!(
        "[{}] Found {} jobs in namespace {}",
        cluster.name,
        jobs.len(),
        cluster.namespace
    );

    for job in &jobs {
        let job_selector = matching_label(JOB_NAME_LABEL, &job.name);
        let pods = list_pods(
            client,
            token,
            format!("pods for job '{}'", job.name),
            &job.namespace,
            &job_selector,
        )
        .await?;
        debug!("[{}] Job {} has {} pods", cluster.name, job.name, pods.len());

        write_pod_entries(client, token, &pods, &dir, EntryName::Plain, archive).await?;
    }

    Ok(())
}

/// Collects the cluster pod logs, then the job pod logs, into `archive`
/// under `root_dir`. Stops at the first error and leaves the archive as is.
pub async fn stream_cluster_report<C, A>(
    client: &C,
    token: &CancellationToken,
    cluster: &ClusterRef,
    root_dir: &str,
    archive: &mut A,
) -> Result<(), ReportError>
where
    C: PlatformClient + ?Sized,
    A: ArchiveWriter + ?Sized,
{
    stream_cluster_logs_to_zip(client, token, cluster, root_dir, archive).await?;
    stream_cluster_job_logs_to_zip(client, token, cluster, root_dir, archive).await
}

/// Collects the logs of the operator pods running in `namespace` into
/// `<root_dir>/operator-logs/<pod>-logs.jsonl`.
pub async fn stream_operator_report<C, A>(
    client: &C,
    token: &CancellationToken,
    namespace: &str,
    root_dir: &str,
    archive: &mut A,
) -> Result<(), ReportError>
where
    C: PlatformClient + ?Sized,
    A: ArchiveWriter + ?Sized,
{
    let selector = matching_label(OPERATOR_LABEL, OPERATOR_LABEL_VALUE);
    let pods = list_pods(
        client,
        token,
        "operator pods".to_string(),
        namespace,
        &selector,
    )
    .await?;
    info!(
        "Collecting logs of {} operator pods in namespace {}",
        pods.len(),
        namespace
    );

    stream_pod_logs_to_zip(client, token, &pods, root_dir, OPERATOR_LOGS_SECTION, archive).await
}
