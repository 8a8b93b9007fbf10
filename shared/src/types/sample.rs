//! Sample identity types
//!
//! Every C file in the corpus is one vulnerable or patched kernel function.
//! Its identity (CVE, CWE, pair index, variant) is encoded in the file name
//! and, for two of the three layouts, in the parent directory name.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

static CVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^CVE[-_](\d{4})[-_](\d{4,})$").expect("invalid CVE regex"));

static CWE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:CWE[-_])?(\d+)$").expect("invalid CWE regex"));

static TESTSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(CVE[-_]\d{4}[-_]\d+)_(\d+)_Linux_Kernel_CWE_(\d+)_Testset_([0-9A-Za-z]+)_(p_patch|v_vuln)\.c$",
    )
    .expect("invalid testset regex")
});

static TEMP_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i:CWE[-_](\d+)_)?(CVE[-_]\d{4}[-_]\d+)_(\d+)_(vuln|patch)\.c$")
        .expect("invalid temp code regex")
});

static INSTANCE_DIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(CVE[-_]\d{4}[-_]\d+)_(\d+)$").expect("invalid instance regex"));

/// Errors raised while decoding sample identity from paths.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("invalid CVE identifier: {0}")]
    InvalidCve(String),

    #[error("invalid CWE identifier: {0}")]
    InvalidCwe(String),

    #[error("file name does not follow any known sample layout: {0}")]
    UnknownLayout(String),
}

/// A CVE identifier, e.g. `CVE-2019-10125`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CveId {
    pub year: u16,
    pub number: u32,
}

impl FromStr for CveId {
    type Err = NameError;

    /// Accepts both `CVE-2019-10125` and the underscore form used by the
    /// testset file names (`CVE_2019_10125`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = CVE_RE
            .captures(s.trim())
            .ok_or_else(|| NameError::InvalidCve(s.to_string()))?;
        let year = caps[1]
            .parse()
            .map_err(|_| NameError::InvalidCve(s.to_string()))?;
        let number = caps[2]
            .parse()
            .map_err(|_| NameError::InvalidCve(s.to_string()))?;
        Ok(Self { year, number })
    }
}

impl fmt::Display for CveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CVE-{}-{:04}", self.year, self.number)
    }
}

/// A CWE category, e.g. `CWE-416`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CweId(pub u32);

impl FromStr for CweId {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CWE_RE
            .captures(s.trim())
            .and_then(|caps| caps[1].parse().ok())
            .map(CweId)
            .ok_or_else(|| NameError::InvalidCwe(s.to_string()))
    }
}

impl fmt::Display for CweId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CWE-{}", self.0)
    }
}

/// Whether a sample is the vulnerable or the patched version of a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Vuln,
    Patch,
}

impl Variant {
    /// The other half of a vuln/patch pair
    pub fn other(self) -> Self {
        match self {
            Variant::Vuln => Variant::Patch,
            Variant::Patch => Variant::Vuln,
        }
    }

    fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "vuln" | "v_vuln" => Some(Variant::Vuln),
            "patch" | "p_patch" => Some(Variant::Patch),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Vuln => write!(f, "vuln"),
            Variant::Patch => write!(f, "patch"),
        }
    }
}

/// The three directory conventions samples are stored under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// `data/datasets/test_c_files/CWE-CSV/<CVE>_<idx>_Linux_Kernel_CWE_<n>_Testset_<hash>_{p_patch|v_vuln}.c`
    Testset,
    /// `data/tmp/instances/<CVE>_<n>/{vuln.c|patch.c}`
    Instance,
    /// `data/tmp/temp_code_files/CWE-<n>/[CWE-<n>_]<CVE>_<n>_{vuln|patch}.c`
    TempCode,
}

impl Layout {
    /// Path of the layout root relative to the repository root
    pub fn relative_root(&self) -> &'static str {
        match self {
            Layout::Testset => "data/datasets/test_c_files/CWE-CSV",
            Layout::Instance => "data/tmp/instances",
            Layout::TempCode => "data/tmp/temp_code_files",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Layout::Testset => "testset",
            Layout::Instance => "instances",
            Layout::TempCode => "temp_code_files",
        }
    }

    pub fn all() -> [Layout; 3] {
        [Layout::Testset, Layout::Instance, Layout::TempCode]
    }
}

/// Identity of one sample, decoded from its path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleName {
    pub layout: Layout,
    pub cve: CveId,
    /// Instance samples carry no CWE in their path
    pub cwe: Option<CweId>,
    pub index: u32,
    /// Short commit hash (testset layout only)
    pub hash: Option<String>,
    pub variant: Variant,
    /// CWE prefix of a temp code file name, when it differs from the
    /// directory the file sits in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_cwe: Option<CweId>,
}

/// Key shared by the vuln and patch halves of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub layout: Layout,
    pub cve: CveId,
    pub index: u32,
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} ({})", self.cve, self.index, self.layout.label())
    }
}

impl SampleName {
    /// Decode a sample's identity from its path.
    ///
    /// The testset convention is recognised from the file name alone. The
    /// other two need the parent directory: `<CVE>_<n>/` for instances and
    /// `CWE-<n>/` for temp code files.
    pub fn parse(path: &Path) -> Result<Self, NameError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| NameError::UnknownLayout(path.display().to_string()))?;
        let parent = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("");

        if let Some(caps) = TESTSET_RE.captures(file_name) {
            return Ok(Self {
                layout: Layout::Testset,
                cve: caps[1].parse()?,
                cwe: Some(caps[3].parse()?),
                index: parse_index(&caps[2], path)?,
                hash: Some(caps[4].to_string()),
                variant: variant_or_err(&caps[5], path)?,
                prefix_cwe: None,
            });
        }

        if let Some(caps) = TEMP_CODE_RE.captures(file_name) {
            let cwe_dir = parent
                .get(..4)
                .is_some_and(|p| p.eq_ignore_ascii_case("CWE-"));
            if cwe_dir {
                let cwe: CweId = parent.parse()?;
                let prefix = caps
                    .get(1)
                    .map(|m| m.as_str().parse::<CweId>())
                    .transpose()?;
                return Ok(Self {
                    layout: Layout::TempCode,
                    cve: caps[2].parse()?,
                    cwe: Some(cwe),
                    index: parse_index(&caps[3], path)?,
                    hash: None,
                    variant: variant_or_err(&caps[4], path)?,
                    prefix_cwe: prefix.filter(|p| *p != cwe),
                });
            }
        }

        if let Some(caps) = INSTANCE_DIR_RE.captures(parent) {
            let stem = file_name.strip_suffix(".c").unwrap_or("");
            if let Some(variant) = Variant::from_suffix(stem) {
                return Ok(Self {
                    layout: Layout::Instance,
                    cve: caps[1].parse()?,
                    cwe: None,
                    index: parse_index(&caps[2], path)?,
                    hash: None,
                    variant,
                    prefix_cwe: None,
                });
            }
        }

        Err(NameError::UnknownLayout(path.display().to_string()))
    }

    pub fn pair_key(&self) -> PairKey {
        PairKey {
            layout: self.layout,
            cve: self.cve,
            index: self.index,
        }
    }
}

fn parse_index(s: &str, path: &Path) -> Result<u32, NameError> {
    s.parse()
        .map_err(|_| NameError::UnknownLayout(path.display().to_string()))
}

fn variant_or_err(s: &str, path: &Path) -> Result<Variant, NameError> {
    Variant::from_suffix(s).ok_or_else(|| NameError::UnknownLayout(path.display().to_string()))
}

/// A loaded sample
#[derive(Debug, Clone)]
pub struct Sample {
    pub path: PathBuf,
    pub name: SampleName,
    pub source: String,
}

impl Sample {
    pub fn new(path: PathBuf, name: SampleName, source: String) -> Self {
        Self { path, name, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cve_forms() {
        let dash: CveId = "CVE-2019-10125".parse().unwrap();
        let underscore: CveId = "CVE_2019_10125".parse().unwrap();
        assert_eq!(dash, underscore);
        assert_eq!(dash.to_string(), "CVE-2019-10125");
        assert!("CVE-19-1".parse::<CveId>().is_err());
    }

    #[test]
    fn test_cwe_forms() {
        assert_eq!("CWE-416".parse::<CweId>().unwrap(), CweId(416));
        assert_eq!("cwe_20".parse::<CweId>().unwrap(), CweId(20));
        assert_eq!("787".parse::<CweId>().unwrap(), CweId(787));
        assert!("CWE-abc".parse::<CweId>().is_err());
    }

    #[test]
    fn test_parse_testset_name() {
        let path = Path::new(
            "data/datasets/test_c_files/CWE-CSV/CVE_2013_0871_162_Linux_Kernel_CWE_362_Testset_c5405f79_p_patch.c",
        );
        let name = SampleName::parse(path).unwrap();
        assert_eq!(name.layout, Layout::Testset);
        assert_eq!(name.cve.to_string(), "CVE-2013-0871");
        assert_eq!(name.cwe, Some(CweId(362)));
        assert_eq!(name.index, 162);
        assert_eq!(name.hash.as_deref(), Some("c5405f79"));
        assert_eq!(name.variant, Variant::Patch);
    }

    #[test]
    fn test_parse_instance_name() {
        let path = Path::new("data/tmp/instances/CVE-2019-15505_0/vuln.c");
        let name = SampleName::parse(path).unwrap();
        assert_eq!(name.layout, Layout::Instance);
        assert_eq!(name.cwe, None);
        assert_eq!(name.index, 0);
        assert_eq!(name.variant, Variant::Vuln);
    }

    #[test]
    fn test_parse_temp_code_name() {
        let path = Path::new("data/tmp/temp_code_files/CWE-416/CVE-2019-10125_6_patch.c");
        let name = SampleName::parse(path).unwrap();
        assert_eq!(name.layout, Layout::TempCode);
        assert_eq!(name.cwe, Some(CweId(416)));
        assert_eq!(name.index, 6);
        assert_eq!(name.variant, Variant::Patch);
    }

    #[test]
    fn test_parse_cwe_prefixed_temp_code_name() {
        let path = Path::new("data/tmp/temp_code_files/CWE-416/CWE-416_CVE-2020-29660_1_vuln.c");
        let name = SampleName::parse(path).unwrap();
        assert_eq!(name.layout, Layout::TempCode);
        assert_eq!(name.cve.to_string(), "CVE-2020-29660");
        assert_eq!(name.cwe, Some(CweId(416)));
        assert_eq!(name.index, 1);
        assert_eq!(name.variant, Variant::Vuln);
        assert_eq!(name.prefix_cwe, None);

        let plain = SampleName::parse(Path::new(
            "data/tmp/temp_code_files/CWE-416/CVE-2020-29660_1_patch.c",
        ))
        .unwrap();
        assert_eq!(name.pair_key(), plain.pair_key());

        let misfiled =
            SampleName::parse(Path::new("data/tmp/temp_code_files/CWE-416/CWE_787_CVE-2020-29660_1_vuln.c"))
                .unwrap();
        assert_eq!(misfiled.cwe, Some(CweId(416)));
        assert_eq!(misfiled.prefix_cwe, Some(CweId(787)));
    }

    #[test]
    fn test_unknown_layout() {
        assert!(SampleName::parse(Path::new("data/misc/foo.c")).is_err());
        // instance-style file outside a CVE directory
        assert!(SampleName::parse(Path::new("data/tmp/instances/vuln.c")).is_err());
        // temp-code-style file outside a CWE directory
        assert!(SampleName::parse(Path::new("data/CVE-2019-10125_0_vuln.c")).is_err());
    }

    #[test]
    fn test_pair_key_matches_across_variants() {
        let vuln = SampleName::parse(Path::new("x/CWE-416/CVE-2020-27786_1_vuln.c")).unwrap();
        let patch = SampleName::parse(Path::new("x/CWE-416/CVE-2020-27786_1_patch.c")).unwrap();
        assert_eq!(vuln.pair_key(), patch.pair_key());
        assert_eq!(vuln.variant.other(), patch.variant);
    }
}
