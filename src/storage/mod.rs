mod csv_writer;

pub use csv_writer::{new_run_id, CsvWriter};
