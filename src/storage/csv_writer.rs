use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::models::StructuredProduct;

/// Timestamp identifying one run, e.g. `20241016_142233`.
pub fn new_run_id() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Writes the output table to `{output_dir}/structured_products_{run_id}.csv`.
pub struct CsvWriter {
    output_dir: PathBuf,
}

impl CsvWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write header plus one record per product. Never overwrites an existing file:
    /// a clashing run id gets `_1`, `_2`, ... appended.
    pub fn write(&self, products: &[StructuredProduct], run_id: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let (file, path) = self.create_unique(run_id)?;

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(StructuredProduct::header())?;
        for product in products {
            writer.write_record(product.to_record())?;
        }
        writer.flush()?;

        info!("Saved {} rows to {}", products.len(), path.display());
        Ok(path)
    }

    fn create_unique(&self, run_id: &str) -> Result<(File, PathBuf)> {
        let mut suffix = 0u32;
        loop {
            let id = if suffix == 0 {
                run_id.to_string()
            } else {
                format!("{}_{}", run_id, suffix)
            };
            let path = output_path(&self.output_dir, &id);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((file, path)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

pub fn output_path(output_dir: &Path, run_id: &str) -> PathBuf {
    output_dir.join(format!("structured_products_{}.csv", run_id))
}
