use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::OcrConfig;
use crate::paths;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

const COMMON_TESSERACT_PATHS: &[&str] = &[
    "/opt/homebrew/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/usr/bin/tesseract",
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];

const COMMON_TESSDATA_PATHS: &[&str] = &[
    "/opt/homebrew/share/tessdata",
    "/usr/local/share/tessdata",
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];

/// Returns true if `program --version` runs successfully.
pub fn probe_executable(program: &Path) -> bool {
    Command::new(program)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Finds the Tesseract executable: configured path, then PATH, then common locations.
pub fn find_tesseract_executable(config: &OcrConfig) -> Result<PathBuf> {
    if let Some(configured) = &config.tesseract_executable {
        let path = paths::expand_home(configured);
        if probe_executable(&path) {
            return Ok(path);
        }
        return Err(anyhow!(
            "Configured Tesseract executable does not run: {}",
            path.display()
        ));
    }

    let on_path = PathBuf::from("tesseract");
    if probe_executable(&on_path) {
        return Ok(on_path);
    }

    COMMON_TESSERACT_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists() && probe_executable(p))
        .ok_or_else(|| anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Splits "jpn+eng" into ["jpn", "eng"].
pub fn tesseract_languages(joined: &str) -> Vec<&str> {
    joined.split('+').map(str::trim).filter(|l| !l.is_empty()).collect()
}

fn has_all_languages(dir: &Path, languages: &[&str]) -> bool {
    languages
        .iter()
        .all(|lang| dir.join(format!("{}.traineddata", lang)).exists())
}

/// Finds a tessdata directory holding every configured language.
///
/// Returns `None` when no known directory qualifies; Tesseract then falls
/// back to its compiled-in default.
pub fn find_tessdata_dir(config: &OcrConfig) -> Option<PathBuf> {
    let languages = tesseract_languages(&config.tesseract_languages);

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(configured) = &config.tessdata_dir {
        candidates.push(paths::expand_home(configured));
    }
    candidates.push(paths::get_tessdata_download_dir());
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        candidates.push(PathBuf::from(&prefix));
        candidates.push(PathBuf::from(&prefix).join("tessdata"));
    }
    candidates.extend(COMMON_TESSDATA_PATHS.iter().map(PathBuf::from));

    candidates
        .into_iter()
        .find(|dir| has_all_languages(dir, &languages))
}

/// Verifies Tesseract and downloads any missing language data.
///
/// Language files already present in a system tessdata directory are copied
/// into the per-user directory so that a single `--tessdata-dir` covers all
/// configured languages.
pub fn ensure_tesseract(config: &OcrConfig) -> Result<PathBuf> {
    let executable = find_tesseract_executable(config)?;
    tracing::info!("Tesseract found at: {}", executable.display());

    if let Some(dir) = find_tessdata_dir(config) {
        tracing::info!("Language data complete in: {}", dir.display());
        return Ok(dir);
    }

    let target = paths::get_tessdata_download_dir();
    fs::create_dir_all(&target)
        .with_context(|| format!("Failed to create {}", target.display()))?;

    for lang in tesseract_languages(&config.tesseract_languages) {
        let file_name = format!("{}.traineddata", lang);
        let dest = target.join(&file_name);
        if dest.exists() {
            continue;
        }

        let system_copy = COMMON_TESSDATA_PATHS
            .iter()
            .map(|dir| PathBuf::from(dir).join(&file_name))
            .find(|p| p.exists());

        match system_copy {
            Some(src) => {
                tracing::info!("Copying {} from: {}", file_name, src.display());
                fs::copy(&src, &dest)
                    .with_context(|| format!("Failed to copy {}", src.display()))?;
            }
            None => download_traineddata(lang, &dest)?,
        }
    }

    tracing::info!("Tesseract language data ready at: {}", target.display());
    Ok(target)
}

/// Downloads one language file from the tessdata repository.
fn download_traineddata(lang: &str, dest: &Path) -> Result<()> {
    let url = format!("{}/{}.traineddata", TESSDATA_REPO, lang);
    tracing::info!("Downloading {}...", url);

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&url)
        .header("User-Agent", "gym-occupancy-ocr")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}.traineddata: HTTP {}",
            lang,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(dest)
        .with_context(|| format!("Failed to create {}", dest.display()))?;
    file.write_all(&bytes)?;

    tracing::info!("Downloaded {}.traineddata ({} bytes)", lang, bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tesseract_languages() {
        assert_eq!(tesseract_languages("jpn+eng"), vec!["jpn", "eng"]);
        assert_eq!(tesseract_languages("eng"), vec!["eng"]);
        assert_eq!(tesseract_languages(" jpn + "), vec!["jpn"]);
    }

    #[test]
    fn test_configured_tessdata_dir_preferred() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("jpn.traineddata"), b"x").unwrap();
        fs::write(dir.path().join("eng.traineddata"), b"x").unwrap();

        let config = OcrConfig {
            tessdata_dir: Some(dir.path().to_string_lossy().to_string()),
            ..OcrConfig::default()
        };
        assert_eq!(find_tessdata_dir(&config), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_incomplete_tessdata_dir_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("eng.traineddata"), b"x").unwrap();
        assert!(!has_all_languages(dir.path(), &["jpn", "eng"]));
        assert!(has_all_languages(dir.path(), &["eng"]));
    }

    #[test]
    fn test_probe_missing_executable() {
        assert!(!probe_executable(Path::new("/nonexistent/tesseract-binary")));
    }
}
