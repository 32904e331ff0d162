//! Cross-section file parser

use crate::block_reader::{classify, BlockReader};
use crate::builder::ModelBuilder;
use crate::header::scan_header;
use crate::options::ParseOptions;
use crate::postprocess::finalize;
use crate::reader::LineSource;
use crate::types::*;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};
use tracing::{debug, error, instrument, trace, warn};

/// Path of the cross-section file for a design basename
pub fn xsctn_path(basename: &str) -> PathBuf {
    PathBuf::from(format!("{}.{}", basename, XSCTN_EXTENSION))
}

/// Parse cross-section text from any buffered reader
pub fn parse_reader<R: BufRead>(reader: R, options: &ParseOptions) -> Result<CrossSection> {
    let mut source = LineSource::new(reader);
    let (header, first_line) = scan_header(&mut source, options)?;

    let mut builder = ModelBuilder::new();
    let mut reader = BlockReader::new(&mut source, header.units, options);
    let mut pending = Some(first_line);

    while let Some(line) = pending.take() {
        match classify(&line) {
            Some(directive) => match reader.parse_directive(directive, &line, &mut builder) {
                Ok(()) => {}
                Err(XsctnError::InvalidPrimitive { name, line: at }) => {
                    error!(
                        name = %name,
                        line = at,
                        "invalid primitive type; conductor set skipped"
                    );
                }
                Err(e) => return Err(e),
            },
            None if line.starts_with('#') || line.trim().is_empty() => {}
            None => trace!(line = reader.line_number(), "skipping line"),
        }
        pending = reader.next_line()?;
    }

    if builder.dielectrics.iter().any(|d| d.loss_tangent != 0.0) {
        warn!("lossTangent not used in this simulation");
    }
    finalize(builder, header)
}

/// Parse cross-section text held in memory
pub fn parse_str(text: &str, options: &ParseOptions) -> Result<CrossSection> {
    parse_reader(Cursor::new(text.as_bytes()), options)
}

/// Open and parse a cross-section file
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read_impl<P: AsRef<Path>>(path: P, options: &ParseOptions) -> Result<CrossSection> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| XsctnError::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("reading cross-section file");

    parse_reader(BufReader::new(file), options)
}
