use crate::stats::SampleLog;
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use std::path::{Path, PathBuf};

pub const DUMP_PREFIX: &str = "webrtc_kurento_stats_";

/// `webrtc_kurento_stats_<Y><M><D><h><m><s>.json`, unpadded, with the
/// zero-based month and the weekday number (Sunday = 0)
pub fn dump_file_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String {
    format!(
        "{DUMP_PREFIX}{}{}{}{}{}{}.json",
        now.year(),
        now.month0(),
        now.weekday().num_days_from_sunday(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

/// Writes the sample log into `dir`. Nothing is written for an empty log.
pub fn write_dump(dir: &Path, log: &SampleLog) -> std::io::Result<Option<PathBuf>> {
    write_dump_at(dir, log, &Local::now())
}

pub fn write_dump_at<Tz: TimeZone>(
    dir: &Path,
    log: &SampleLog,
    now: &DateTime<Tz>,
) -> std::io::Result<Option<PathBuf>> {
    if log.is_empty() {
        return Ok(None);
    }
    std::fs::create_dir_all(dir)?;
    let path = dir.join(dump_file_name(now));
    let json = serde_json::to_string_pretty(log.samples()).map_err(std::io::Error::other)?;
    std::fs::write(&path, json)?;
    Ok(Some(path))
}
