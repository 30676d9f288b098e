//! Where the suite writes its files.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Directory holding every file the sections create.
    pub work_dir: PathBuf,
    /// File name stem, `tst_h_vars` by default.
    pub test_name: String,
    /// Leave the files behind after the run.
    pub keep_files: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            test_name: "tst_h_vars".to_owned(),
            keep_files: true,
        }
    }
}

impl HarnessConfig {
    pub fn in_dir(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Self::default()
        }
    }

    /// `<work_dir>/<test_name>.h5`, shared by most sections.
    pub fn file_path(&self) -> PathBuf {
        self.work_dir.join(format!("{}.h5", self.test_name))
    }

    /// `<work_dir>/<test_name>_<desc>.h5`.
    pub fn variant_path(&self, desc: &str) -> PathBuf {
        self.work_dir.join(format!("{}_{desc}.h5", self.test_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths() {
        let config = HarnessConfig::in_dir("/scratch");
        assert_eq!(config.file_path(), PathBuf::from("/scratch/tst_h_vars.h5"));
        assert_eq!(
            config.variant_path("zlib_and_szip"),
            PathBuf::from("/scratch/tst_h_vars_zlib_and_szip.h5")
        );
        assert!(config.keep_files);
    }
}
