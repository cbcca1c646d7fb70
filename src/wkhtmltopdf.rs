//! Rendering engine backed by the `wkhtmltopdf` executable.
//!
//! Option bundles are validated up front and turned into command-line flags.
//! Each run spawns one child process that writes into a temporary file; the
//! child is killed if the run is abandoned (for example on timeout).

use crate::converter::{Converter, RenderEngine};
use crate::error::EngineError;
use crate::options::{ColorMode, ConverterOpts, HeaderFooterOpts, ObjectOpts, Orientation};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

pub struct WkHtmlToPdf {
    binary: PathBuf,
    version: Option<String>,
}

impl WkHtmlToPdf {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            version: None,
        }
    }

    /// Version reported by the binary, once initialized.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

#[async_trait]
impl RenderEngine for WkHtmlToPdf {
    type Object = PdfObject;
    type Converter = PdfConverter;

    async fn init(&mut self) -> Result<(), EngineError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                EngineError::Init(format!("cannot execute {}: {e}", self.binary.display()))
            })?;

        if !output.status.success() {
            return Err(EngineError::Init(format!(
                "{} --version exited with {}",
                self.binary.display(),
                output.status
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!(binary = %self.binary.display(), version = %version, "Rendering engine initialized");
        self.version = Some(version);
        Ok(())
    }

    fn destroy(&mut self) {
        self.version = None;
        info!(binary = %self.binary.display(), "Rendering engine destroyed");
    }

    fn new_object(&self, opts: &ObjectOpts) -> Result<PdfObject, EngineError> {
        PdfObject::from_opts(opts)
    }

    fn new_converter(&self, opts: &ConverterOpts) -> Result<PdfConverter, EngineError> {
        Ok(PdfConverter {
            binary: self.binary.clone(),
            global_args: global_args(opts)?,
            objects: Vec::new(),
        })
    }
}

/// A page source and its page-level flags.
#[derive(Debug, Clone)]
pub struct PdfObject {
    location: String,
    args: Vec<String>,
}

impl PdfObject {
    fn from_opts(opts: &ObjectOpts) -> Result<Self, EngineError> {
        let location = opts.location.trim();
        if location.is_empty() {
            return Err(EngineError::object("location is empty"));
        }
        if !(opts.zoom.is_finite() && opts.zoom > 0.0) {
            return Err(EngineError::object(format!("invalid zoom factor {}", opts.zoom)));
        }
        if opts.default_encoding.trim().is_empty() {
            return Err(EngineError::object("default encoding is empty"));
        }

        let mut args = vec![
            "--encoding".to_string(),
            opts.default_encoding.clone(),
            "--zoom".to_string(),
            opts.zoom.to_string(),
            "--javascript-delay".to_string(),
            opts.javascript_delay_ms.to_string(),
            "--load-error-handling".to_string(),
            opts.load_error_handling.as_str().to_string(),
        ];
        args.push(if opts.load_images { "--images" } else { "--no-images" }.to_string());
        args.push(
            if opts.enable_javascript {
                "--enable-javascript"
            } else {
                "--disable-javascript"
            }
            .to_string(),
        );
        args.push(
            if opts.print_media_type {
                "--print-media-type"
            } else {
                "--no-print-media-type"
            }
            .to_string(),
        );
        section_args("header", &opts.header, &mut args)?;
        section_args("footer", &opts.footer, &mut args)?;

        Ok(Self {
            location: location.to_string(),
            args,
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

pub struct PdfConverter {
    binary: PathBuf,
    global_args: Vec<String>,
    objects: Vec<PdfObject>,
}

impl PdfConverter {
    /// Full argument list for a run writing to `output_path`.
    fn command_args(&self, output_path: &Path) -> Vec<String> {
        let mut args = vec!["--quiet".to_string()];
        args.extend(self.global_args.iter().cloned());
        for object in &self.objects {
            args.push("page".to_string());
            args.push(object.location.clone());
            args.extend(object.args.iter().cloned());
        }
        args.push(output_path.display().to_string());
        args
    }
}

#[async_trait]
impl Converter for PdfConverter {
    type Object = PdfObject;

    fn add(&mut self, object: PdfObject) {
        self.objects.push(object);
    }

    async fn run(&mut self, output: &mut Vec<u8>) -> Result<(), EngineError> {
        if self.objects.is_empty() {
            return Err(EngineError::Render("no objects to convert".to_string()));
        }

        let target = tempfile::Builder::new()
            .prefix("html2pdf-")
            .suffix(".pdf")
            .tempfile()?;
        let args = self.command_args(target.path());
        debug!(binary = %self.binary.display(), ?args, "Spawning wkhtmltopdf");

        let result = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no diagnostic output");
            return Err(EngineError::Render(format!(
                "wkhtmltopdf exited with {}: {}",
                result.status,
                reason.trim()
            )));
        }

        let pdf = tokio::fs::read(target.path()).await?;
        output.extend_from_slice(&pdf);
        Ok(())
    }

    fn destroy(self) {
        debug!(objects = self.objects.len(), "Converter released");
    }
}

fn global_args(opts: &ConverterOpts) -> Result<Vec<String>, EngineError> {
    if opts.dpi == 0 {
        return Err(EngineError::converter("dpi must be positive"));
    }
    if !(1..=100).contains(&opts.image_quality) {
        return Err(EngineError::converter(format!(
            "image quality {} is outside 1..=100",
            opts.image_quality
        )));
    }
    if opts.paper_size.trim().is_empty() {
        return Err(EngineError::converter("paper size is empty"));
    }

    let mut args = vec![
        "--page-size".to_string(),
        opts.paper_size.clone(),
        "--orientation".to_string(),
        match opts.orientation {
            Orientation::Portrait => "Portrait",
            Orientation::Landscape => "Landscape",
        }
        .to_string(),
        "--dpi".to_string(),
        opts.dpi.to_string(),
        "--image-quality".to_string(),
        opts.image_quality.to_string(),
        "--margin-top".to_string(),
        opts.margin_top.clone(),
        "--margin-bottom".to_string(),
        opts.margin_bottom.clone(),
        "--margin-left".to_string(),
        opts.margin_left.clone(),
        "--margin-right".to_string(),
        opts.margin_right.clone(),
    ];
    if let Some(title) = &opts.title {
        args.push("--title".to_string());
        args.push(title.clone());
    }
    if opts.color_mode == ColorMode::Grayscale {
        args.push("--grayscale".to_string());
    }
    args.push(if opts.outline { "--outline" } else { "--no-outline" }.to_string());
    if !opts.compress {
        args.push("--no-pdf-compression".to_string());
    }
    Ok(args)
}

fn section_args(
    section: &str,
    opts: &HeaderFooterOpts,
    args: &mut Vec<String>,
) -> Result<(), EngineError> {
    if !opts.has_content() {
        return Ok(());
    }
    if opts.font_size == 0 {
        return Err(EngineError::object(format!("{section} font size must be positive")));
    }

    for (position, text) in [
        ("left", &opts.left),
        ("center", &opts.center),
        ("right", &opts.right),
    ] {
        if let Some(text) = text {
            args.push(format!("--{section}-{position}"));
            args.push(text.clone());
        }
    }
    args.push(format!("--{section}-font-name"));
    args.push(opts.font_name.clone());
    args.push(format!("--{section}-font-size"));
    args.push(opts.font_size.to_string());
    args.push(format!("--{section}-spacing"));
    args.push(opts.spacing.to_string());
    args.push(if opts.line {
        format!("--{section}-line")
    } else {
        format!("--no-{section}-line")
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ConversionRequest;
    use pretty_assertions::assert_eq;

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn test_default_converter_args() {
        let args = global_args(&ConverterOpts::default()).unwrap();

        assert!(has_pair(&args, "--page-size", "A4"));
        assert!(has_pair(&args, "--orientation", "Portrait"));
        assert!(has_pair(&args, "--dpi", "96"));
        assert!(has_pair(&args, "--margin-top", "10mm"));
        assert!(args.contains(&"--outline".to_string()));
        assert!(!args.contains(&"--grayscale".to_string()));
        assert!(!args.contains(&"--no-pdf-compression".to_string()));
    }

    #[test]
    fn test_customized_converter_args() {
        let opts = ConverterOpts {
            title: Some("Report".to_string()),
            orientation: Orientation::Landscape,
            color_mode: ColorMode::Grayscale,
            outline: false,
            compress: false,
            ..ConverterOpts::default()
        };
        let args = global_args(&opts).unwrap();

        assert!(has_pair(&args, "--title", "Report"));
        assert!(has_pair(&args, "--orientation", "Landscape"));
        assert!(args.contains(&"--grayscale".to_string()));
        assert!(args.contains(&"--no-outline".to_string()));
        assert!(args.contains(&"--no-pdf-compression".to_string()));
    }

    #[test]
    fn test_invalid_converter_options() {
        let zero_dpi = ConverterOpts {
            dpi: 0,
            ..ConverterOpts::default()
        };
        assert!(matches!(
            global_args(&zero_dpi),
            Err(EngineError::Creation { kind: "converter", .. })
        ));

        let bad_quality = ConverterOpts {
            image_quality: 0,
            ..ConverterOpts::default()
        };
        assert!(global_args(&bad_quality).is_err());
    }

    #[test]
    fn test_object_args_include_header_and_footer() {
        let mut request = ConversionRequest::for_location("https://example.com");
        request.object_opts.header.center = Some("Title".to_string());
        request.object_opts.footer.right = Some("[page]/[topage]".to_string());
        request.object_opts.footer.line = true;

        let object = PdfObject::from_opts(&request.object_opts).unwrap();

        assert_eq!(object.location(), "https://example.com");
        assert!(has_pair(&object.args, "--header-center", "Title"));
        assert!(has_pair(&object.args, "--footer-right", "[page]/[topage]"));
        assert!(object.args.contains(&"--footer-line".to_string()));
        assert!(object.args.contains(&"--no-header-line".to_string()));
        assert!(has_pair(&object.args, "--load-error-handling", "abort"));
    }

    #[test]
    fn test_object_without_header_text_omits_header_flags() {
        let request = ConversionRequest::for_location("page.html");
        let object = PdfObject::from_opts(&request.object_opts).unwrap();

        assert!(!object.args.iter().any(|a| a.starts_with("--header")));
        assert!(!object.args.iter().any(|a| a.starts_with("--footer")));
    }

    #[test]
    fn test_invalid_object_options() {
        let mut request = ConversionRequest::for_location("page.html");
        request.object_opts.zoom = 0.0;
        assert!(matches!(
            PdfObject::from_opts(&request.object_opts),
            Err(EngineError::Creation { kind: "object", .. })
        ));

        let empty = ConversionRequest::for_location("");
        assert!(PdfObject::from_opts(&empty.object_opts).is_err());
    }

    #[test]
    fn test_command_line_layout() {
        let engine = WkHtmlToPdf::new("wkhtmltopdf");
        let mut converter = engine.new_converter(&ConverterOpts::default()).unwrap();
        let object = engine
            .new_object(&ConversionRequest::for_location("https://example.com").object_opts)
            .unwrap();
        converter.add(object);

        let args = converter.command_args(Path::new("/tmp/out.pdf"));

        assert_eq!(args.first().map(String::as_str), Some("--quiet"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.pdf"));
        assert!(has_pair(&args, "page", "https://example.com"));
        let page_at = args.iter().position(|a| a == "page").unwrap();
        let dpi_at = args.iter().position(|a| a == "--dpi").unwrap();
        assert!(dpi_at < page_at, "global flags precede the page object");
    }

    #[tokio::test]
    async fn test_missing_binary_fails_init() {
        let mut engine = WkHtmlToPdf::new("/nonexistent/wkhtmltopdf");
        let err = engine.init().await.unwrap_err();

        assert!(matches!(err, EngineError::Init(_)));
        assert!(engine.version().is_none());
    }

    #[tokio::test]
    async fn test_run_without_objects_fails() {
        let engine = WkHtmlToPdf::new("wkhtmltopdf");
        let mut converter = engine.new_converter(&ConverterOpts::default()).unwrap();
        let mut output = Vec::new();

        assert!(converter.run(&mut output).await.is_err());
        assert!(output.is_empty());
    }

    /// Installs a shell script standing in for the wkhtmltopdf executable.
    /// It answers `--version` like the real binary and runs `body` otherwise.
    #[cfg(unix)]
    fn fake_binary(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("wkhtmltopdf");
        let script = [
            "#!/bin/sh",
            "if [ \"$1\" = \"--version\" ]; then echo \"wkhtmltopdf 0.12.6 (fake)\"; exit 0; fi",
            "for last; do :; done",
            body,
            "",
        ]
        .join("\n");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        // A freshly written script can briefly be reported busy while a
        // concurrently forked test process still holds the write handle.
        for _ in 0..50 {
            match std::process::Command::new(&path).arg("--version").output() {
                Err(e) if e.raw_os_error() == Some(26) => {
                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
                _ => break,
            }
        }
        path
    }

    #[cfg(unix)]
    async fn started_engine(binary: PathBuf) -> WkHtmlToPdf {
        let mut engine = WkHtmlToPdf::new(binary);
        engine.init().await.unwrap();
        engine
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_init_records_reported_version() {
        let dir = tempfile::tempdir().unwrap();
        let engine = started_engine(fake_binary(&dir, "exit 0")).await;

        assert_eq!(engine.version(), Some("wkhtmltopdf 0.12.6 (fake)"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reads_document_back_from_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_binary(&dir, "printf '%s' '%PDF-1.4 fake' > \"$last\"");
        let mut engine = started_engine(binary).await;

        let request = ConversionRequest::for_location("page.html");
        let pdf = crate::converter::convert(&mut engine, &request, None)
            .await
            .unwrap();

        assert_eq!(pdf, b"%PDF-1.4 fake".to_vec());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_exit_reports_last_stderr_line() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_binary(
            &dir,
            "echo 'Loading pages (1/6)' >&2\necho 'Exit with code 1 due to network error: HostNotFoundError' >&2\necho '' >&2\nexit 1",
        );
        let engine = started_engine(binary).await;
        let mut converter = engine.new_converter(&ConverterOpts::default()).unwrap();
        converter.add(
            engine
                .new_object(&ConversionRequest::for_location("https://nowhere.invalid").object_opts)
                .unwrap(),
        );
        let mut output = Vec::new();

        let err = converter.run(&mut output).await.unwrap_err();

        let reason = match err {
            EngineError::Render(reason) => reason,
            other => panic!("expected a render error, got {other:?}"),
        };
        assert!(reason.ends_with("Exit with code 1 due to network error: HostNotFoundError"));
        assert!(!reason.contains("Loading pages"));
        assert!(output.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_exit_without_output_is_a_render_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = started_engine(fake_binary(&dir, "exit 0")).await;

        let request = ConversionRequest::for_location("page.html");
        let err = crate::converter::convert(&mut engine, &request, None)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Render(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_child_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = started_engine(fake_binary(&dir, "exec sleep 30")).await;

        let request = ConversionRequest::for_location("page.html");
        let limit = std::time::Duration::from_millis(50);
        let started = std::time::Instant::now();
        let err = crate::converter::convert(&mut engine, &request, Some(limit))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Timeout(d) if d == limit));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    /// Requires `wkhtmltopdf` on PATH and network access.
    #[tokio::test]
    #[ignore]
    async fn test_real_conversion() {
        let mut engine = WkHtmlToPdf::new("wkhtmltopdf");
        engine.init().await.unwrap();

        let request = ConversionRequest::for_location("https://example.com");
        let pdf = crate::converter::convert(&mut engine, &request, None)
            .await
            .unwrap();
        engine.destroy();

        assert!(pdf.starts_with(b"%PDF"));
    }
}
