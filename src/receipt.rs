//! Local fee receipts and the housekeeping of the scratch directory they are written to.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use crate::documents::Invoice;
use crate::Result;

/// Renders receipts as plain text files into a scratch directory
#[derive(Debug, Clone)]
pub struct ReceiptRenderer {
    scratch_dir: PathBuf,
    retention: Duration,
}

impl ReceiptRenderer {
    /// receipts go into `scratch_dir` and are kept for `retention`
    pub fn new(scratch_dir: impl Into<PathBuf>, retention: Duration) -> Self {
        ReceiptRenderer {
            scratch_dir: scratch_dir.into(),
            retention,
        }
    }

    /// writes the receipt for `invoice` and returns its path.
    /// Stale receipts are cleaned up afterwards.
    pub fn render(&self, invoice: &Invoice, student_name: Option<&str>) -> Result<PathBuf> {
        fs::create_dir_all(&self.scratch_dir)?;
        let path = self
            .scratch_dir
            .join(format!("receipt_{}.txt", invoice.invoice_number));

        let mut file = fs::File::create(&path)?;
        writeln!(file, "FEE RECEIPT")?;
        writeln!(file, "Invoice No : {}", invoice.invoice_number)?;
        writeln!(file, "Date       : {}", invoice.issued_at.format("%d-%m-%Y %H:%M"))?;
        writeln!(file, "Class      : {}", invoice.class_name)?;
        writeln!(file, "Student ID : {}", invoice.student_id)?;
        if let Some(name) = student_name {
            writeln!(file, "Student    : {}", name)?;
        }
        writeln!(file, "Amount Paid: {}", invoice.amount)?;
        writeln!(file, "Total Paid : {}", invoice.feespaid)?;
        writeln!(file, "Balance    : {}", invoice.feesremaining)?;
        file.flush()?;
        debug!("receipt rendered at {:?}", &path);

        match cleanup(&self.scratch_dir, self.retention) {
            Ok(removed) if removed > 0 => debug!(removed, "stale receipts removed"),
            Ok(_) => {}
            Err(e) => warn!("receipt cleanup failed: {}", e),
        }
        Ok(path)
    }
}

/// deletes every file in `dir` last modified more than `retention` ago.
/// Returns how many files were removed.
pub fn cleanup(dir: &Path, retention: Duration) -> Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;
    for entry in (fs::read_dir(dir)?).flatten() {
        if !entry.file_type()?.is_file() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        let age = now.duration_since(modified).unwrap_or_default();
        if age > retention {
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!("could not remove {:?}: {}", entry.path(), e),
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn invoice(number: u64) -> Invoice {
        Invoice {
            invoice_number: number,
            class_name: "puc1a".into(),
            student_id: "s1".into(),
            amount: 500,
            feespaid: 500,
            feesremaining: 4500,
            issued_at: Utc::now(),
            receipt: None,
        }
    }

    #[test]
    fn render_writes_a_receipt() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ReceiptRenderer::new(dir.path(), Duration::from_secs(3600));
        let path = renderer.render(&invoice(7), Some("Alice")).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("Invoice No : 7"));
        assert!(text.contains("Student    : Alice"));
    }

    #[test]
    fn cleanup_removes_only_expired_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("receipt_1.txt"), "old").unwrap();
        assert_eq!(cleanup(dir.path(), Duration::from_secs(3600)).unwrap(), 0);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(cleanup(dir.path(), Duration::from_millis(1)).unwrap(), 1);
        assert!(!dir.path().join("receipt_1.txt").exists());
    }
}
