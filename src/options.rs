//! Conversion request models and their documented defaults.
//!
//! A request carries two option bundles: [`ConverterOpts`] apply to the whole
//! conversion run, [`ObjectOpts`] to the single document being converted.
//! Every field has a default, so `{}` is a complete (if invalid) request.

use crate::error::RequestError;
use serde::{Deserialize, Deserializer, Serialize};

/// One HTML→PDF conversion request as received by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub converter_opts: ConverterOpts,
    #[serde(default, deserialize_with = "null_as_default")]
    pub object_opts: ObjectOpts,
}

impl ConversionRequest {
    /// Creates a request for `location` with default options.
    pub fn for_location(location: impl Into<String>) -> Self {
        Self {
            converter_opts: ConverterOpts::default(),
            object_opts: ObjectOpts {
                location: location.into(),
                ..ObjectOpts::default()
            },
        }
    }

    /// Decodes the first JSON value of a payload, merging defaults for
    /// anything absent, and rejects requests that can never be rendered.
    ///
    /// Bytes after the first complete value are ignored.
    pub fn from_json(payload: &[u8]) -> Result<Self, RequestError> {
        let mut decoder = serde_json::Deserializer::from_slice(payload);
        let request = Self::deserialize(&mut decoder)?;
        request.validate()?;
        Ok(request)
    }

    /// Checks the fields the gateway is responsible for.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.object_opts.location.trim().is_empty() {
            return Err(RequestError::MissingLocation);
        }
        Ok(())
    }

    pub fn location(&self) -> &str {
        &self.object_opts.location
    }
}

/// Process-wide rendering settings applied to an entire conversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConverterOpts {
    pub title: Option<String>,
    pub paper_size: String,
    pub orientation: Orientation,
    pub color_mode: ColorMode,
    pub dpi: u32,
    pub margin_top: String,
    pub margin_bottom: String,
    pub margin_left: String,
    pub margin_right: String,
    /// JPEG compression factor, 1..=100.
    pub image_quality: u8,
    pub outline: bool,
    pub compress: bool,
}

impl Default for ConverterOpts {
    fn default() -> Self {
        Self {
            title: None,
            paper_size: "A4".to_string(),
            orientation: Orientation::Portrait,
            color_mode: ColorMode::Color,
            dpi: 96,
            margin_top: "10mm".to_string(),
            margin_bottom: "10mm".to_string(),
            margin_left: "10mm".to_string(),
            margin_right: "10mm".to_string(),
            image_quality: 94,
            outline: true,
            compress: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorMode {
    Color,
    Grayscale,
}

/// Settings for the one document being converted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectOpts {
    /// URL or filesystem path of the HTML source.
    pub location: String,
    pub header: HeaderFooterOpts,
    pub footer: HeaderFooterOpts,
    pub default_encoding: String,
    pub load_images: bool,
    pub enable_javascript: bool,
    pub javascript_delay_ms: u32,
    pub print_media_type: bool,
    pub zoom: f64,
    pub load_error_handling: LoadErrorHandling,
}

impl Default for ObjectOpts {
    fn default() -> Self {
        Self {
            location: String::new(),
            header: HeaderFooterOpts::default(),
            footer: HeaderFooterOpts::default(),
            default_encoding: "utf-8".to_string(),
            load_images: true,
            enable_javascript: true,
            javascript_delay_ms: 200,
            print_media_type: false,
            zoom: 1.0,
            load_error_handling: LoadErrorHandling::Abort,
        }
    }
}

/// Text and styling of a page header or footer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeaderFooterOpts {
    pub left: Option<String>,
    pub center: Option<String>,
    pub right: Option<String>,
    pub font_name: String,
    pub font_size: u32,
    /// Distance from the content, in millimetres.
    pub spacing: f64,
    pub line: bool,
}

impl HeaderFooterOpts {
    /// Whether any text would be drawn.
    pub fn has_content(&self) -> bool {
        self.left.is_some() || self.center.is_some() || self.right.is_some()
    }
}

impl Default for HeaderFooterOpts {
    fn default() -> Self {
        Self {
            left: None,
            center: None,
            right: None,
            font_name: "Arial".to_string(),
            font_size: 12,
            spacing: 0.0,
            line: false,
        }
    }
}

/// What the engine does when a resource of the page fails to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadErrorHandling {
    Abort,
    Ignore,
    Skip,
}

impl LoadErrorHandling {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadErrorHandling::Abort => "abort",
            LoadErrorHandling::Ignore => "ignore",
            LoadErrorHandling::Skip => "skip",
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
