//! Text extraction from the top region of a screenshot.
//!
//! The tesseract engine is driven through its command-line binary: the
//! cropped region is PNG-encoded and piped over stdin, recognized text is
//! read back from stdout.

use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, ErrorKind, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

use crate::error::OcrError;

/// Characters kept by [`normalize_text`] besides word characters and whitespace.
const KEPT_PUNCTUATION: &[char] = &['.', ',', '!', '?', '-'];

pub trait TextExtractor {
    /// Return the normalized text of the image at `path`.
    fn extract(&self, path: &Path) -> Result<String, OcrError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrOptions {
    /// Tesseract executable name or path.
    pub binary: String,
    /// Recognition language(s), e.g. `eng` or `eng+deu`.
    pub lang: String,
    /// Page segmentation mode; 6 is a single uniform block of text.
    pub psm: u8,
    /// Fraction of the image height, measured from the top, that is read.
    pub crop_fraction: f64,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            lang: "eng".to_string(),
            psm: 6,
            crop_fraction: 0.5,
        }
    }
}

pub struct TesseractExtractor {
    options: OcrOptions,
    version: String,
}

impl TesseractExtractor {
    /// Probe the tesseract binary and build an extractor around it.
    pub fn new(options: OcrOptions) -> Result<Self, OcrError> {
        let version = tesseract_version(&options.binary)?;
        log::info!("Using tesseract {} ({})", version, options.binary);
        Ok(Self { options, version })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    fn recognize(&self, img: &DynamicImage) -> Result<String, OcrError> {
        let mut encoded = Vec::new();
        img.write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)?;

        let mut child = Command::new(&self.options.binary)
            .arg("stdin")
            .arg("stdout")
            .arg("-l")
            .arg(&self.options.lang)
            .arg("--psm")
            .arg(self.options.psm.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| OcrError::EngineMissing {
                binary: self.options.binary.clone(),
                source,
            })?;

        // tesseract reads all of stdin before producing output, or exits
        // without reading it on bad arguments; its exit status decides.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&encoded),
            None => Ok(()),
        };
        let output = child.wait_with_output()?;

        if !output.status.success() {
            return Err(OcrError::EngineFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if let Err(e) = written {
            if e.kind() != ErrorKind::BrokenPipe || output.stdout.is_empty() {
                return Err(e.into());
            }
            log::warn!("tesseract stopped reading its input early");
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl TextExtractor for TesseractExtractor {
    fn extract(&self, path: &Path) -> Result<String, OcrError> {
        let start = Instant::now();
        let img = image::open(path)?;
        let top = crop_top(&img, self.options.crop_fraction);
        let raw = self.recognize(&top)?;
        let text = normalize_text(&raw);
        log::debug!(
            "OCR {} in {} ms: {:?}",
            path.display(),
            start.elapsed().as_millis(),
            text
        );
        Ok(text)
    }
}

/// Crop the top `fraction` of the image height (at least one row).
pub fn crop_top(img: &DynamicImage, fraction: f64) -> DynamicImage {
    let height = ((img.height() as f64 * fraction) as u32).clamp(1, img.height().max(1));
    img.crop_imm(0, 0, img.width(), height)
}

/// Collapse whitespace, drop punctuation other than `. , ! ? -`, lowercase.
pub fn normalize_text(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .chars()
        .filter(|c| {
            c.is_alphanumeric() || *c == '_' || c.is_whitespace() || KEPT_PUNCTUATION.contains(c)
        })
        .collect::<String>()
        .to_lowercase()
}

/// Run `<binary> --version` and return the reported version string.
pub fn tesseract_version(binary: &str) -> Result<String, OcrError> {
    let output = Command::new(binary)
        .arg("--version")
        .output()
        .map_err(|source| OcrError::EngineMissing {
            binary: binary.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(OcrError::EngineFailed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    // older releases print the banner on stderr
    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(parse_version(&combined).unwrap_or_else(|| "unknown".to_string()))
}

fn parse_version(banner: &str) -> Option<String> {
    banner
        .lines()
        .find(|line| line.trim_start().starts_with("tesseract"))
        .and_then(|line| line.split_whitespace().nth(1))
        .map(|v| v.trim_start_matches('v').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn test_normalize_collapses_whitespace_and_lowercases() {
        assert_eq!(normalize_text("  Hello\n\n  World\t!  "), "hello world !");
    }

    #[test]
    fn test_normalize_strips_special_characters() {
        assert_eq!(
            normalize_text("Press [SPACE] to continue: 3/5 — ok?"),
            "press space to continue 35  ok?"
        );
        assert_eq!(normalize_text("well-done, friend."), "well-done, friend.");
        assert_eq!(normalize_text("snake_case"), "snake_case");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text(" \n\t "), "");
        assert_eq!(normalize_text("@#$%"), "");
    }

    #[test]
    fn test_crop_top_half() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(40, 31, Rgb([1, 2, 3])));
        let top = crop_top(&img, 0.5);
        assert_eq!((top.width(), top.height()), (40, 15));

        let whole = crop_top(&img, 1.0);
        assert_eq!(whole.height(), 31);

        let sliver = crop_top(&img, 0.001);
        assert_eq!(sliver.height(), 1);
    }

    #[test]
    fn test_parse_version_banner() {
        let banner = "tesseract 5.3.0\n leptonica-1.82.0\n  libgif 5.2.1\n";
        assert_eq!(parse_version(banner).as_deref(), Some("5.3.0"));
        assert_eq!(parse_version("tesseract v4.1.1\n").as_deref(), Some("4.1.1"));
        assert_eq!(parse_version("something else"), None);
    }

    #[cfg(unix)]
    fn stub_tesseract(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("tesseract");
        let script = format!(
            "#!/bin/sh\n\
             if [ \"$1\" = \"--version\" ]; then echo 'tesseract 5.3.0'; exit 0; fi\n\
             {body}\n"
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    fn extractor_with(binary: String) -> TesseractExtractor {
        TesseractExtractor::new(OcrOptions {
            binary,
            ..OcrOptions::default()
        })
        .unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_pipes_cropped_png_and_normalizes() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let dir = temp_dir.path();
        let binary = stub_tesseract(
            dir,
            r#"here=$(dirname "$0")
echo "$@" > "$here/args.txt"
cat > "$here/input.png"
printf 'Trial  3 of 10!\n  Press SPACE @ to continue\n'"#,
        );
        let extractor = extractor_with(binary);
        assert_eq!(extractor.version(), "5.3.0");

        let shot = dir.join("shot.png");
        ImageBuffer::from_pixel(200, 120, Rgb([250u8, 250, 250]))
            .save(&shot)
            .unwrap();

        let text = extractor.extract(&shot).unwrap();
        assert_eq!(text, "trial 3 of 10! press space  to continue");

        let args = std::fs::read_to_string(dir.join("args.txt")).unwrap();
        assert_eq!(args.trim(), "stdin stdout -l eng --psm 6");
        let received = image::open(dir.join("input.png")).unwrap();
        assert_eq!((received.width(), received.height()), (200, 60));
    }

    #[cfg(unix)]
    #[test]
    fn test_engine_exiting_early_reports_its_stderr() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let dir = temp_dir.path();
        let binary = stub_tesseract(
            dir,
            r#"echo "Failed loading language 'xx'" >&2
exit 1"#,
        );
        let extractor = extractor_with(binary);

        // noise compresses badly, so the PNG is far larger than a pipe buffer
        let mut seed = 0x2545_f491_u32;
        let noise = ImageBuffer::from_fn(1200, 1200, |_, _| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let [r, g, b, _] = seed.to_le_bytes();
            Rgb([r, g, b])
        });
        let shot = dir.join("noise.png");
        noise.save(&shot).unwrap();

        match extractor.extract(&shot).unwrap_err() {
            OcrError::EngineFailed { stderr, .. } => {
                assert!(stderr.contains("Failed loading language 'xx'"), "{stderr}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_binary_is_reported() {
        let err = tesseract_version("shotcull-no-such-tesseract-binary").unwrap_err();
        assert!(matches!(err, OcrError::EngineMissing { .. }));
    }
}
