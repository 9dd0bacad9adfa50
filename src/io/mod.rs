use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;

pub mod dataset;
pub mod json_writer;
pub mod summary;
pub mod tsv_writer;

pub(crate) fn open_maybe_gz(path: &Path) -> std::io::Result<Box<dyn Read>> {
    let file = File::open(path)?;
    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        let decoder = GzDecoder::new(file);
        Ok(Box::new(decoder))
    } else {
        Ok(Box::new(file))
    }
}
