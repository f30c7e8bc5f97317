//! Form bodies: `application/x-www-form-urlencoded` and `multipart/form-data`.
//!
//! Decoded bodies become a [`FormData`]: ordered `(name, value)` pairs plus the uploaded
//! files. Multipart parsing enforces size and part-count limits; any structural problem
//! is a [`FormError`], which the binder turns into an explicit rejection.

use std::fmt;

use crate::descriptor::{Bindable, TypeInfo};

/// Largest accepted single file, in bytes.
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;
/// Largest accepted sum of all part bodies, in bytes.
pub const DEFAULT_MAX_TOTAL_SIZE: usize = 50 * 1024 * 1024;
/// Most parts accepted in one body.
pub const DEFAULT_MAX_PARTS: usize = 100;

/// One uploaded file from a multipart body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadedFile {
    /// Form field name of the part.
    pub name: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadedFile {
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Bindable for UploadedFile {
    fn type_info() -> TypeInfo {
        TypeInfo::file::<UploadedFile>()
    }
}

/// Every file uploaded with a request, in body order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadedFiles(pub Vec<UploadedFile>);

impl UploadedFiles {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, UploadedFile> {
        self.0.iter()
    }

    /// First file uploaded under `name` (ASCII case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&UploadedFile> {
        self.0.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }
}

impl Bindable for UploadedFiles {
    fn type_info() -> TypeInfo {
        TypeInfo::file_collection::<UploadedFiles>()
    }
}

/// Decoded form body.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    values: Vec<(String, String)>,
    files: Vec<UploadedFile>,
}

impl FormData {
    /// Every value for `name`, ASCII case-insensitive, in body order.
    #[must_use]
    pub fn values(&self, name: &str) -> Vec<&str> {
        self.values
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[must_use]
    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    #[must_use]
    pub fn into_files(self) -> Vec<UploadedFile> {
        self.files
    }
}

/// Structural problem with a form body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    MissingBoundary,
    FileTooLarge { size: usize, max: usize },
    TotalTooLarge { size: usize, max: usize },
    TooManyParts { max: usize },
    MissingContentDisposition,
    MissingPartName,
    InvalidPartHeaders,
    UnexpectedEnd,
    Malformed(&'static str),
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormError::MissingBoundary => write!(f, "multipart body without a boundary"),
            FormError::FileTooLarge { size, max } => {
                write!(f, "uploaded file of {size} bytes exceeds the {max} byte limit")
            }
            FormError::TotalTooLarge { size, max } => {
                write!(f, "multipart body of {size} bytes exceeds the {max} byte limit")
            }
            FormError::TooManyParts { max } => write!(f, "more than {max} multipart parts"),
            FormError::MissingContentDisposition => {
                write!(f, "multipart part without Content-Disposition")
            }
            FormError::MissingPartName => write!(f, "multipart part without a name"),
            FormError::InvalidPartHeaders => write!(f, "multipart part headers are not UTF-8"),
            FormError::UnexpectedEnd => write!(f, "multipart body ended unexpectedly"),
            FormError::Malformed(detail) => write!(f, "malformed multipart body: {detail}"),
        }
    }
}

impl std::error::Error for FormError {}

/// Limits applied while parsing multipart bodies.
#[derive(Debug, Clone, Copy)]
pub struct FormLimits {
    pub max_file_size: usize,
    pub max_total_size: usize,
    pub max_parts: usize,
}

impl Default for FormLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_total_size: DEFAULT_MAX_TOTAL_SIZE,
            max_parts: DEFAULT_MAX_PARTS,
        }
    }
}

/// Media type without parameters, lowercased.
#[must_use]
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// `application/json` or any `+json` media type.
#[must_use]
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type.map(media_type).is_some_and(|m| {
        m == "application/json" || (m.starts_with("application/") && m.ends_with("+json"))
    })
}

/// `application/x-www-form-urlencoded` or `multipart/form-data`.
#[must_use]
pub fn is_form_content_type(content_type: Option<&str>) -> bool {
    content_type.map(media_type).is_some_and(|m| {
        m == "application/x-www-form-urlencoded" || m == "multipart/form-data"
    })
}

/// Decode a form body according to its content type.
///
/// # Errors
///
/// [`FormError`] for a multipart body that is structurally invalid or over a limit.
pub fn parse_form(content_type: &str, body: &[u8], limits: FormLimits) -> Result<FormData, FormError> {
    if media_type(content_type) == "multipart/form-data" {
        let boundary = multipart_boundary(content_type).ok_or(FormError::MissingBoundary)?;
        parse_multipart(&boundary, body, limits)
    } else {
        Ok(parse_urlencoded(body))
    }
}

/// Decode `a=1&b=2` pairs; `+` is a space and percent escapes are decoded.
#[must_use]
pub fn parse_urlencoded(body: &[u8]) -> FormData {
    FormData {
        values: url::form_urlencoded::parse(body).into_owned().collect(),
        files: Vec::new(),
    }
}

fn multipart_boundary(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn parse_multipart(boundary: &str, body: &[u8], limits: FormLimits) -> Result<FormData, FormError> {
    let delimiter = format!("--{boundary}").into_bytes();
    let mut form = FormData::default();
    let mut total = 0usize;
    let mut parts = 0usize;

    let mut pos = find(body, &delimiter, 0).ok_or(FormError::UnexpectedEnd)?;
    loop {
        pos += delimiter.len();
        if body[pos..].starts_with(b"--") {
            return Ok(form);
        }
        if !body[pos..].starts_with(b"\r\n") {
            return Err(FormError::Malformed("expected CRLF after boundary"));
        }
        pos += 2;

        parts += 1;
        if parts > limits.max_parts {
            return Err(FormError::TooManyParts {
                max: limits.max_parts,
            });
        }

        let header_end = find(body, b"\r\n\r\n", pos).ok_or(FormError::UnexpectedEnd)?;
        let headers = std::str::from_utf8(&body[pos..header_end])
            .map_err(|_| FormError::InvalidPartHeaders)?;
        let mut disposition = None;
        let mut content_type = None;
        for line in headers.split("\r\n") {
            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();
                if name.eq_ignore_ascii_case("content-disposition") {
                    disposition = Some(value.trim());
                } else if name.eq_ignore_ascii_case("content-type") {
                    content_type = Some(value.trim().to_string());
                }
            }
        }
        let (name, file_name) =
            parse_disposition(disposition.ok_or(FormError::MissingContentDisposition)?)?;

        let data_start = header_end + 4;
        let next = find(body, &delimiter, data_start).ok_or(FormError::UnexpectedEnd)?;
        let data_end = if next >= data_start + 2 && &body[next - 2..next] == b"\r\n" {
            next - 2
        } else {
            next
        };
        let data = &body[data_start..data_end];

        if file_name.is_some() && data.len() > limits.max_file_size {
            return Err(FormError::FileTooLarge {
                size: data.len(),
                max: limits.max_file_size,
            });
        }
        total += data.len();
        if total > limits.max_total_size {
            return Err(FormError::TotalTooLarge {
                size: total,
                max: limits.max_total_size,
            });
        }

        match file_name {
            Some(file_name) => form.files.push(UploadedFile {
                name,
                file_name,
                content_type,
                data: data.to_vec(),
            }),
            None => form
                .values
                .push((name, String::from_utf8_lossy(data).into_owned())),
        }
        pos = next;
    }
}

/// `form-data; name="field"; filename="a.txt"` into `(name, filename)`.
fn parse_disposition(value: &str) -> Result<(String, Option<String>), FormError> {
    let mut name = None;
    let mut file_name = None;
    for param in value.split(';').skip(1) {
        let Some((key, raw)) = param.trim().split_once('=') else {
            continue;
        };
        let raw = raw.trim();
        let unquoted = raw
            .strip_prefix('"')
            .and_then(|r| r.strip_suffix('"'))
            .unwrap_or(raw)
            .to_string();
        match key.trim().to_ascii_lowercase().as_str() {
            "name" => name = Some(unquoted),
            "filename" => file_name = Some(unquoted),
            _ => {}
        }
    }
    Ok((name.ok_or(FormError::MissingPartName)?, file_name))
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}
