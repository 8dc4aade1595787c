//! Filesystem usage of the configured path.

use std::path::Path;

use serde::Serialize;
use sysinfo::Disks;

use crate::error::{SampleError, SampleResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskSample {
    pub mount_point: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub usage_percent: f64,
}

impl DiskSample {
    pub fn from_space(mount_point: impl Into<String>, total: u64, available: u64) -> Self {
        let free = available.min(total);
        let used = total - free;
        let usage_percent = if total > 0 { (used as f64 / total as f64) * 100.0 } else { 0.0 };
        Self {
            mount_point: mount_point.into(),
            total_bytes: total,
            used_bytes: used,
            free_bytes: free,
            usage_percent,
        }
    }
}

/// Index of the mount point that is the longest path prefix of `target`.
pub fn best_mount<'a, I>(mounts: I, target: &Path) -> Option<usize>
where
    I: IntoIterator<Item = &'a Path>,
{
    mounts
        .into_iter()
        .enumerate()
        .filter(|(_, mount)| target.starts_with(mount))
        .max_by_key(|(_, mount)| mount.components().count())
        .map(|(i, _)| i)
}

pub(crate) fn read_disk(disks: &mut Disks, path: &Path) -> SampleResult<DiskSample> {
    disks.refresh_list();

    let index = best_mount(disks.list().iter().map(|d| d.mount_point()), path).ok_or_else(|| {
        SampleError::unavailable("disk", format!("no filesystem mounted at or above {}", path.display()))
    })?;
    let disk = &disks.list()[index];

    Ok(DiskSample::from_space(
        disk.mount_point().display().to_string(),
        disk.total_space(),
        disk.available_space(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_space() {
        let sample = DiskSample::from_space("/", 1_000, 400);
        assert_eq!(sample.used_bytes, 600);
        assert_eq!(sample.free_bytes, 400);
        assert_eq!(sample.usage_percent, 60.0);

        let empty = DiskSample::from_space("/", 0, 0);
        assert_eq!(empty.usage_percent, 0.0);
    }

    #[test]
    fn test_best_mount_prefers_deepest() {
        let mounts = [Path::new("/"), Path::new("/var"), Path::new("/var/lib/data"), Path::new("/home")];
        assert_eq!(best_mount(mounts, Path::new("/var/lib/data/db")), Some(2));
        assert_eq!(best_mount(mounts, Path::new("/var/log")), Some(1));
        assert_eq!(best_mount(mounts, Path::new("/")), Some(0));
        // Component-wise, not string prefix
        assert_eq!(best_mount(mounts, Path::new("/homework")), Some(0));
    }

    #[test]
    fn test_best_mount_none() {
        let mounts = [Path::new("/data")];
        assert_eq!(best_mount(mounts, Path::new("/srv")), None);
    }
}
