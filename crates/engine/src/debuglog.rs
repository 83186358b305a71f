//! Per-family debug sinks.
//!
//! Rejection reasons are appended to one log file per family under the
//! configured debug directory. Messages are formatted only when the
//! family's debug flag is set, each event is a single line-atomic write,
//! and logging failures never break the pipeline.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use tracing::debug;

use crate::config::ScanConfig;
use crate::types::{PatternFamily, PatternKind};

#[derive(Debug, Default)]
pub struct DebugLogger {
    hns: Option<PathBuf>,
    dtb: Option<PathBuf>,
    ttb: Option<PathBuf>,
}

impl DebugLogger {
    pub fn from_config(cfg: &ScanConfig) -> Self {
        let path = |enabled: bool, name: &str| {
            enabled.then(|| cfg.debug_dir.join(format!("{name}_debug.log")))
        };
        Self {
            hns: path(cfg.hns_debug, "hns"),
            dtb: path(cfg.dtb_debug, "dtb"),
            ttb: path(cfg.ttb_debug, "ttb"),
        }
    }

    /// A logger with every family disabled.
    pub fn disabled() -> Self {
        Self::default()
    }

    fn file_for(&self, family: PatternFamily) -> Option<&PathBuf> {
        match family {
            PatternFamily::Hns => self.hns.as_ref(),
            PatternFamily::Dtb => self.dtb.as_ref(),
            PatternFamily::Ttb => self.ttb.as_ref(),
        }
    }

    /// Record a candidate rejection. `detail` is only invoked when the
    /// family's debug file is enabled.
    pub fn rejection(
        &self,
        kind: PatternKind,
        rule: &str,
        detail: impl FnOnce() -> String,
    ) {
        debug!(kind = kind.label(), rule, "candidate rejected");
        let Some(path) = self.file_for(kind.family()) else {
            return;
        };
        let line = format!(
            "[{}] REJECT {} at {}: {}\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            kind.label(),
            rule,
            detail()
        );
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(mut file) = OpenOptions::new().append(true).create(true).open(path) {
            let _ = file.write_all(line.as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_logger_writes_nothing() {
        let logger = DebugLogger::disabled();
        // No panic, no file; the closure must not be required to run.
        logger.rejection(PatternKind::Dt, "valid_simetria_extremos", || {
            panic!("detail must not be formatted when disabled")
        });
    }

    #[test]
    fn test_enabled_logger_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ScanConfig {
            dtb_debug: true,
            debug_dir: dir.path().to_path_buf(),
            ..ScanConfig::default()
        };
        let logger = DebugLogger::from_config(&cfg);
        logger.rejection(PatternKind::Dt, "valid_simetria_extremos", || "tol=1 diff=2".into());
        logger.rejection(PatternKind::Db, "valid_neckline_retest_p4", || "outside".into());

        let content = std::fs::read_to_string(dir.path().join("dtb_debug.log")).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("REJECT DT at valid_simetria_extremos: tol=1 diff=2"));
        assert!(lines[1].contains("REJECT DB"));
    }
}
