//! Corpus discovery and loading

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kcorpus_shared::types::report::{Finding, FindingKind, Inventory};
use kcorpus_shared::types::sample::{Layout, Sample, SampleName, Variant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::CheckerConfig;
use crate::error::{CorpusError, Result};

/// Every sample found below a root, sorted by path
#[derive(Debug, Clone)]
pub struct Corpus {
    pub root: PathBuf,
    pub samples: Vec<Sample>,
    /// Problems found while scanning (unparseable names)
    pub findings: Vec<Finding>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn inventory(&self) -> Inventory {
        let mut inv = Inventory {
            total: self.samples.len(),
            ..Default::default()
        };

        let mut halves: BTreeMap<_, BTreeSet<Variant>> = BTreeMap::new();
        let mut cves = BTreeSet::new();

        for sample in &self.samples {
            let name = &sample.name;
            *inv.by_layout.entry(name.layout.label().to_string()).or_insert(0) += 1;

            let cwe = name
                .cwe
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            *inv.by_cwe.entry(cwe).or_insert(0) += 1;

            match name.variant {
                Variant::Vuln => inv.vuln += 1,
                Variant::Patch => inv.patch += 1,
            }

            halves.entry(name.pair_key()).or_default().insert(name.variant);
            cves.insert(name.cve);
        }

        inv.complete_pairs = halves.values().filter(|v| v.len() == 2).count();
        inv.distinct_cves = cves.len();
        inv
    }
}

/// Directories to walk: the layout roots that exist, or `root` itself
fn walk_roots(root: &Path) -> Vec<PathBuf> {
    let roots: Vec<PathBuf> = Layout::all()
        .iter()
        .map(|l| root.join(l.relative_root()))
        .filter(|p| p.is_dir())
        .collect();

    if roots.is_empty() {
        vec![root.to_path_buf()]
    } else {
        roots
    }
}

fn c_files(dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() || (e.path_is_symlink() && !e.path().is_dir()))
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("c"))
        .collect()
}

/// Find and load every sample below `root`. Files are read concurrently,
/// at most `max_concurrency` at a time.
pub async fn scan(root: &Path, config: &CheckerConfig) -> Result<Corpus> {
    if !root.is_dir() {
        return Err(CorpusError::MissingRoot(root.to_path_buf()));
    }

    let mut paths: Vec<PathBuf> = walk_roots(root).iter().flat_map(|d| c_files(d)).collect();
    paths.sort();
    paths.dedup();
    info!("Found {} C files under {}", paths.len(), root.display());

    let mut findings = Vec::new();
    let mut named = Vec::with_capacity(paths.len());
    for path in paths {
        match SampleName::parse(&path) {
            Ok(name) => named.push((path, name)),
            Err(e) => {
                debug!("Skipping {}: {}", path.display(), e);
                findings.push(
                    Finding::warning(FindingKind::UnparsedName, e.to_string()).at(&path),
                );
            }
        }
    }

    let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for (path, name) in named {
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            let bytes = tokio::fs::read(&path).await;
            Ok::<_, CorpusError>((path, name, bytes))
        });
    }

    let unparsed = findings.len();
    let mut samples = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (path, name, bytes) = joined??;
        match bytes {
            Ok(bytes) => {
                let source = String::from_utf8_lossy(&bytes).into_owned();
                samples.push(Sample::new(path, name, source));
            }
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                findings.push(
                    Finding::warning(
                        FindingKind::UnreadableSample,
                        format!("{} {} could not be read: {}", name.cve, name.variant, e),
                    )
                    .at(&path),
                );
            }
        }
    }
    samples.sort_by(|a, b| a.path.cmp(&b.path));
    findings.sort_by(|a, b| a.path.cmp(&b.path));

    info!(
        "Loaded {} samples ({} unparseable names, {} unreadable)",
        samples.len(),
        unparsed,
        findings.len() - unparsed
    );

    Ok(Corpus {
        root: root.to_path_buf(),
        samples,
        findings,
    })
}
