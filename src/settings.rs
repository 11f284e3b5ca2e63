use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::document::SpecGeneration;
use crate::validate::IssueKind;

/// Persisted codec settings used by CLI workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecSettings {
    /// Generation written on export; `None` keeps the source generation.
    pub export_generation: Option<SpecGeneration>,
    /// Warning codes dropped from reports. Errors are never suppressed.
    pub suppressed_warnings: Vec<IssueKind>,
    pub warnings_as_errors: bool,
    pub report_missing_optional_bones: bool,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            export_generation: None,
            suppressed_warnings: Vec::new(),
            warnings_as_errors: false,
            report_missing_optional_bones: true,
        }
    }
}

/// Save codec settings to a JSON file.
pub fn save_settings(path: &Path, settings: &CodecSettings) -> Result<()> {
    let content = serde_json::to_string_pretty(settings)
        .context("failed to serialize codec settings as JSON")?;
    fs::write(path, content)
        .with_context(|| format!("failed to save codec settings: {}", path.display()))?;
    Ok(())
}

/// Load codec settings from a JSON file.
pub fn load_settings(path: &Path) -> Result<CodecSettings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to load codec settings: {}", path.display()))?;
    let settings: CodecSettings =
        serde_json::from_str(&content).context("failed to parse codec settings JSON")?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    #[test]
    fn given_settings_when_saved_and_loaded_then_values_are_preserved() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("vrm_codec_settings_{unique}.json"));

        let settings = CodecSettings {
            export_generation: Some(SpecGeneration::Vrm0),
            suppressed_warnings: vec![IssueKind::MultipleExtensions],
            warnings_as_errors: true,
            report_missing_optional_bones: false,
        };

        save_settings(&path, &settings).expect("settings should save");
        let loaded = load_settings(&path).expect("settings should load");
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, settings);
        let text = serde_json::to_string(&settings).expect("serializable");
        assert!(text.contains("\"0.x\""));
        assert!(text.contains("MULTIPLE_EXTENSIONS"));
    }

    #[test]
    fn given_partial_file_when_parsing_then_missing_fields_take_defaults() {
        let settings: CodecSettings =
            serde_json::from_str(r#"{ "warnings_as_errors": true }"#).expect("partial settings");

        assert!(settings.warnings_as_errors);
        assert!(settings.report_missing_optional_bones);
        assert_eq!(settings.export_generation, None);
    }
}
