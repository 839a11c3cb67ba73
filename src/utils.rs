use chrono::{DateTime, Utc};

/// Label carrying the name of the cluster on every object the operator owns.
pub const CLUSTER_LABEL: &str = "cnpg.io/cluster";

/// Label set by the job controller on the pods a job spawns.
pub const JOB_NAME_LABEL: &str = "job-name";

/// Label identifying the operator deployment's pods.
pub const OPERATOR_LABEL: &str = "app.kubernetes.io/name";
pub const OPERATOR_LABEL_VALUE: &str = "cloudnative-pg";

/// Selector matching a single `key=value` label.
pub fn matching_label(key: &str, value: &str) -> String {
    format!("{}={}", key, value)
}

/// Default report file name, e.g. `report_cluster_pg_20260101-120000.zip`.
pub fn default_report_file(kind: &str, name: Option<&str>, now: DateTime<Utc>) -> String {
    let stamp = now.format("%Y%m%d-%H%M%S");
    match name {
        Some(name) => format!("report_{}_{}_{}.zip", kind, name, stamp),
        None => format!("report_{}_{}.zip", kind, stamp),
    }
}

/// Name of the top-level directory inside the archive: the file name
/// without its directories and `.zip` extension.
pub fn report_root_dir(file: &str) -> String {
    let base = file.rsplit(['/', '\\']).next().unwrap_or(file);
    base.strip_suffix(".zip").unwrap_or(base).to_string()
}
