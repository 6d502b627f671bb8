//! Run configuration shared by every row of a run.

use crate::error::{PipelineError, Result};
use crate::quantity::Kilograms;
use std::path::{Path, PathBuf};

/// Logo formats the page configuration accepts.
pub const BRANDING_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Immutable settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Aggregate name offsets are retired under, e.g. "Acme Corp's customers".
    pub beneficiary: String,

    /// Logo applied to every customer page.
    pub branding: Option<PathBuf>,

    /// Permits running against live credentials and placing real orders.
    pub allow_live: bool,

    /// Used for rows with a blank quantity.
    pub default_quantity: Kilograms,
}

impl RunConfig {
    pub fn new<S: Into<String>>(beneficiary: S) -> Self {
        RunConfig {
            beneficiary: beneficiary.into(),
            branding: None,
            allow_live: false,
            default_quantity: Kilograms::DEFAULT,
        }
    }

    pub fn with_branding<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.branding = Some(path.into());
        self
    }

    pub fn allow_live(mut self, allow: bool) -> Self {
        self.allow_live = allow;
        self
    }

    /// Checks the settings before any row is touched.
    pub fn validate(&self) -> Result<()> {
        if self.beneficiary.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "beneficiary must not be empty".to_string(),
            ));
        }
        if let Some(path) = &self.branding {
            validate_branding(path)?;
        }
        Ok(())
    }
}

fn validate_branding(path: &Path) -> Result<()> {
    let invalid = |reason: &str| PipelineError::InvalidBranding {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| invalid("missing file extension"))?;
    if !BRANDING_EXTENSIONS.contains(&extension.as_str()) {
        return Err(invalid("expected a .jpg, .jpeg or .png file"));
    }
    if !path.is_file() {
        return Err(invalid("file does not exist"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = RunConfig::new("Acme's customers");
        assert_eq!(config.default_quantity, Kilograms::DEFAULT);
        assert!(!config.allow_live);
        assert!(config.branding.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_beneficiary_rejected() {
        assert!(RunConfig::new("  ").validate().is_err());
    }

    #[test]
    fn test_branding_extension_checked() {
        let dir = tempfile::tempdir().unwrap();
        let gif = dir.path().join("logo.gif");
        fs::write(&gif, b"GIF89a").unwrap();

        let err = RunConfig::new("Acme").with_branding(&gif).validate().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidBranding { .. }));
    }

    #[test]
    fn test_branding_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("logo.png");

        let err = RunConfig::new("Acme")
            .with_branding(&missing)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_branding_accepts_uppercase_extension() {
        let dir = tempfile::tempdir().unwrap();
        let logo = dir.path().join("logo.JPEG");
        fs::write(&logo, b"\xff\xd8\xff").unwrap();

        assert!(RunConfig::new("Acme").with_branding(&logo).validate().is_ok());
    }
}
