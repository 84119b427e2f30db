use std::io::Write;

use super::{Logger, SiteId};

fn secs_since_unix_epoch() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|dur| dur.as_secs_f64())
        .unwrap_or(0.)
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct DummyLogger;

/// Buffers lines in memory and dumps them to stderr when dropped.
#[derive(Debug)]
pub struct VecLogger(SiteId, Vec<u8>);

#[derive(Debug)]
pub struct FileLogger(SiteId, std::fs::File);

impl FileLogger {
    pub fn new(site_id: SiteId, file: std::fs::File) -> Self {
        Self(site_id, file)
    }
}
impl VecLogger {
    pub fn new(site_id: SiteId) -> Self {
        Self(site_id, Default::default())
    }
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.1).into_owned()
    }
}
/////////////////
impl Logger for DummyLogger {
    fn line_writer(&mut self) -> Option<&mut dyn Write> {
        None
    }
}

impl Logger for VecLogger {
    fn line_writer(&mut self) -> Option<&mut dyn Write> {
        let _ = write!(&mut self.1, "SITE({}) at {:.6} ", self.0, secs_since_unix_epoch());
        Some(self)
    }
}
impl Logger for FileLogger {
    fn line_writer(&mut self) -> Option<&mut dyn Write> {
        let _ = write!(&mut self.1, "SITE({}) at {:.6} ", self.0, secs_since_unix_epoch());
        Some(&mut self.1)
    }
}
///////////////////
impl Drop for VecLogger {
    fn drop(&mut self) {
        if self.1.is_empty() {
            return;
        }
        let stderr = std::io::stderr();
        let mut lock = stderr.lock();
        let _ = writeln!(lock, "--- DROP LOG DUMP ---");
        let _ = lock.write_all(self.1.as_slice());
    }
}
impl Write for VecLogger {
    fn flush(&mut self) -> Result<(), std::io::Error> {
        Ok(())
    }
    fn write(&mut self, data: &[u8]) -> Result<usize, std::io::Error> {
        self.1.extend_from_slice(data);
        Ok(data.len())
    }
}
