//! Graph serialization and compression (`spec.md` §4.4).
//!
//! A closed `Compressor` enum stands in for the source's dynamic
//! import-by-name: adding a variant is a single match arm (`spec.md` §9,
//! "registry of variants").

use crate::error::CrawlError;
use crate::graph::Graph;
use bzip2::write::BzEncoder;
use bzip2::Compression as BzCompression;
use flate2::write::GzEncoder;
use flate2::Compression as GzCompression;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use xz2::write::XzEncoder;

/// Supported on-disk compression formats, a closed registry of variants
/// standing in for the source's dynamic import-by-name. Adding a format is
/// a single match arm in `from_id`/`extension`/`open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compressor {
    Gzip,
    Bzip2,
    Xz,
}

impl Compressor {
    /// Parses a configuration identifier such as `"gzip"`, `"bz2"`, `"lzma"`.
    ///
    /// An unrecognized identifier is `spec.md` §7 kind 5 ("Configuration …
    /// rejected at admission"), so it comes back as [`CrawlError::Config`]
    /// rather than a generic error.
    pub fn from_id(id: &str) -> Result<Self, CrawlError> {
        match id {
            "gzip" | "gz" => Ok(Compressor::Gzip),
            "bz2" | "bzip2" => Ok(Compressor::Bzip2),
            "lzma" | "xz" => Ok(Compressor::Xz),
            other => Err(CrawlError::Config(format!("unknown compressor id: {other}"))),
        }
    }

    /// File extension written alongside the host name, including the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Compressor::Gzip => ".gz",
            Compressor::Bzip2 => ".bz2",
            Compressor::Xz => ".xz",
        }
    }

    /// Opens a writable compressed stream at `path`.
    fn open(&self, path: &Path) -> io::Result<Box<dyn Write>> {
        let file = File::create(path)?;
        match self {
            Compressor::Gzip => Ok(Box::new(GzEncoder::new(file, GzCompression::default()))),
            Compressor::Bzip2 => Ok(Box::new(BzEncoder::new(file, BzCompression::default()))),
            Compressor::Xz => Ok(Box::new(XzEncoder::new(file, 6))),
        }
    }
}

/// Serializes `graph` to the fixed node-link JSON shape and writes it
/// through `compressor` to `${graph_root}/${host}${ext}`.
///
/// Skipped (returns `Ok(None)`) when `graph.node_count() <= 1`, per
/// `spec.md` §4.3: a single-node graph has nothing worth persisting.
/// Writes to a temporary sibling file and renames into place for
/// best-effort atomicity.
///
/// A graph root that can't be created or written to is `spec.md` §7 kind 6
/// ("graph root not writable … task fails, graph not persisted, logged at
/// error level"): any I/O failure here is logged via `tracing::error!` and
/// returned as [`CrawlError::Fatal`].
#[tracing::instrument(skip(graph))]
pub fn compress_graph(
    graph: &Graph,
    graph_root: &Path,
    host: &str,
    compressor: Compressor,
) -> Result<Option<PathBuf>, CrawlError> {
    if graph.node_count() <= 1 {
        tracing::debug!(%host, "graph has <= 1 node, skipping persistence");
        return Ok(None);
    }

    let fatal = |context: &str, error: io::Error| {
        tracing::error!(%host, %context, %error, "graph root not writable, task failed");
        CrawlError::Fatal(format!("{context}: {error}"))
    };

    std::fs::create_dir_all(graph_root).map_err(|e| fatal("creating graph root", e))?;

    let final_path = graph_root.join(format!("{host}{}", compressor.extension()));
    let tmp_path = graph_root.join(format!("{host}{}.tmp", compressor.extension()));

    let document = graph.to_document();
    let json = serde_json::to_vec(&document)
        .map_err(|e| CrawlError::Fatal(format!("serializing graph document: {e}")))?;

    {
        let mut stream = compressor.open(&tmp_path).map_err(|e| fatal("opening compressed stream", e))?;
        stream.write_all(&json).map_err(|e| fatal("writing compressed stream", e))?;
        stream.flush().map_err(|e| fatal("flushing compressed stream", e))?;
    }

    std::fs::rename(&tmp_path, &final_path).map_err(|e| fatal("renaming into place", e))?;
    tracing::debug!(path = %final_path.display(), "graph persisted");

    Ok(Some(final_path))
}

/// Decompresses and parses a persisted graph file back into its node-link
/// document, used by the codec's own roundtrip test and by the cleaner
/// (`watcher.rs`) to detect malformed files.
pub fn load_graph_document(path: &Path) -> anyhow::Result<crate::graph::GraphDocument> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| anyhow::anyhow!("graph file has no extension"))?;

    let bytes = match ext {
        "gz" => {
            let file = File::open(path)?;
            let mut decoder = flate2::read::GzDecoder::new(file);
            let mut buf = Vec::new();
            io::Read::read_to_end(&mut decoder, &mut buf)?;
            buf
        }
        "bz2" => {
            let file = File::open(path)?;
            let mut decoder = bzip2::read::BzDecoder::new(file);
            let mut buf = Vec::new();
            io::Read::read_to_end(&mut decoder, &mut buf)?;
            buf
        }
        "xz" => {
            let file = File::open(path)?;
            let mut decoder = xz2::read::XzDecoder::new(file);
            let mut buf = Vec::new();
            io::Read::read_to_end(&mut decoder, &mut buf)?;
            buf
        }
        other => return Err(anyhow::anyhow!("unsupported graph file extension: {other}")),
    };

    let value: serde_json::Value = serde_json::from_slice(&bytes)?;
    let nodes = value["nodes"]
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("missing nodes array"))?
        .iter()
        .filter_map(|n| n["id"].as_str().map(|s| crate::graph::NodeEntry { id: s.to_string() }))
        .collect();
    let edges = value["edges"]
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("missing edges array"))?
        .iter()
        .filter_map(|e| {
            Some(crate::graph::EdgeEntry {
                source: e["source"].as_str()?.to_string(),
                target: e["target"].as_str()?.to_string(),
            })
        })
        .collect();

    Ok(crate::graph::GraphDocument {
        directed: value["directed"].as_bool().unwrap_or(false),
        multigraph: value["multigraph"].as_bool().unwrap_or(false),
        graph: serde_json::Map::new(),
        nodes,
        edges,
    })
}
