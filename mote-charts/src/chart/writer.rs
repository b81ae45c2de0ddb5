use std::{fs, io::Write, path::Path};

use chrono_tz::Tz;
use tempfile::NamedTempFile;

use super::{render::render_html, style::ChartStyle};
use crate::{error::ChartError, series::DeviceSeries};

/// Replace `path` with `bytes` so readers see either the old file or the
/// complete new one. Missing parent directories are created.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ChartError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| ChartError::io(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| ChartError::io(parent, e))?;
    tmp.write_all(bytes).map_err(|e| ChartError::io(tmp.path(), e))?;
    tmp.flush().map_err(|e| ChartError::io(tmp.path(), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o644))
            .map_err(|e| ChartError::io(tmp.path(), e))?;
    }

    tmp.persist(path).map_err(|e| ChartError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Render `series` with times in `zone` and write the document to `path`.
pub fn write_chart(
    series: &DeviceSeries,
    unit: &str,
    zone: Tz,
    style: &ChartStyle,
    path: &Path,
) -> Result<usize, ChartError> {
    let html = render_html(series, unit, zone, style)?;
    write_atomic(path, html.as_bytes())?;
    tracing::debug!(path = %path.display(), bytes = html.len(), "chart written");
    Ok(html.len())
}
