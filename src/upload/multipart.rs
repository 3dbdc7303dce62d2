//! `multipart/form-data` intake
//!
//! Parses a fully received form body into text fields and file parts. File
//! parts are zero-copy slices of the request body.
//!
//! A body whose closing boundary never arrives is reported as
//! [`UploadError::BodyRead`] (the upload was cut short); every other
//! structural problem is [`UploadError::InvalidForm`].

use super::UploadError;
use bytes::Bytes;
use std::collections::HashMap;

const CRLF: &[u8] = b"\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// One file part of a submitted form
#[derive(Debug, Clone)]
pub struct FilePart {
    /// Form field name (`name=` parameter)
    pub field: String,
    /// Client-supplied filename (`filename=` parameter), unsanitized
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// A parsed form submission
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<FilePart>,
}

impl MultipartForm {
    /// Remove and return the first file part submitted under `field`.
    pub fn take_file(&mut self, field: &str) -> Option<FilePart> {
        let idx = self.files.iter().position(|f| f.field == field)?;
        Some(self.files.remove(idx))
    }
}

/// Extract the boundary from a `multipart/form-data; boundary=...` content type.
pub fn extract_boundary(content_type: Option<&str>) -> Result<String, UploadError> {
    let content_type = content_type
        .ok_or_else(|| UploadError::InvalidForm("request has no Content-Type".into()))?;

    let mut params = split_params(content_type).into_iter();
    let mime = params.next().unwrap_or_default();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return Err(UploadError::InvalidForm(format!(
            "expected multipart/form-data, got {}",
            content_type
        )));
    }

    for param in params {
        if let Some((name, value)) = param.split_once('=') {
            if name.trim().eq_ignore_ascii_case("boundary") {
                let boundary = unquote(value.trim());
                if boundary.is_empty() {
                    break;
                }
                return Ok(boundary.to_string());
            }
        }
    }

    Err(UploadError::InvalidForm(
        "missing boundary in Content-Type".into(),
    ))
}

/// Parse a complete form body.
pub fn parse_form(content_type: Option<&str>, body: &Bytes) -> Result<MultipartForm, UploadError> {
    let boundary = extract_boundary(content_type)?;
    let delimiter = [b"--".as_slice(), boundary.as_bytes()].concat();
    // Every delimiter after the first is preceded by CRLF
    let inner_delimiter = [CRLF, delimiter.as_slice()].concat();

    let Some(start) = find_bytes(body, &delimiter, 0) else {
        return Err(UploadError::InvalidForm(
            "body does not contain the declared boundary".into(),
        ));
    };

    let mut form = MultipartForm::default();
    let mut cursor = start + delimiter.len();

    loop {
        let rest = &body[cursor..];
        if rest.starts_with(b"--") {
            break;
        }
        if rest.is_empty() {
            return Err(UploadError::BodyRead(
                "upload ended before the closing boundary".into(),
            ));
        }
        cursor += skip_line_end(rest);

        let Some(end) = find_bytes(body, &inner_delimiter, cursor) else {
            return Err(UploadError::BodyRead(
                "upload ended before the closing boundary".into(),
            ));
        };

        read_part(body, cursor, end, &mut form)?;
        cursor = end + inner_delimiter.len();
    }

    Ok(form)
}

/// Decode one part spanning `body[start..end]` into the form.
fn read_part(
    body: &Bytes,
    start: usize,
    end: usize,
    form: &mut MultipartForm,
) -> Result<(), UploadError> {
    let part = &body[start..end];
    let (headers, content_start) = if part.starts_with(CRLF) {
        (&part[..0], start + CRLF.len())
    } else {
        let split = find_bytes(part, HEADER_END, 0).ok_or_else(|| {
            UploadError::InvalidForm("form part is missing its header terminator".into())
        })?;
        (&part[..split], start + split + HEADER_END.len())
    };

    let headers = PartHeaders::parse(headers);
    let Some(field) = headers.name else {
        return Err(UploadError::InvalidForm(
            "form part has no Content-Disposition name".into(),
        ));
    };

    match headers.filename {
        // Browsers send an empty filename when no file was chosen
        Some(filename) if !filename.is_empty() => form.files.push(FilePart {
            field,
            filename,
            content_type: headers.content_type,
            data: body.slice(content_start..end),
        }),
        _ => {
            let value = String::from_utf8_lossy(&body[content_start..end]).into_owned();
            form.fields.insert(field, value);
        }
    }

    Ok(())
}

#[derive(Debug, Default)]
struct PartHeaders {
    name: Option<String>,
    filename: Option<String>,
    content_type: Option<String>,
}

impl PartHeaders {
    fn parse(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        let mut headers = Self::default();

        for line in text.split("\r\n") {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let name = name.trim();

            if name.eq_ignore_ascii_case("content-disposition") {
                for param in split_params(value).into_iter().skip(1) {
                    let Some((key, val)) = param.split_once('=') else {
                        continue;
                    };
                    match key.trim().to_ascii_lowercase().as_str() {
                        "name" => headers.name = Some(unquote(val.trim()).to_string()),
                        "filename" => headers.filename = Some(unquote(val.trim()).to_string()),
                        _ => {}
                    }
                }
            } else if name.eq_ignore_ascii_case("content-type") {
                headers.content_type = Some(value.trim().to_string());
            }
        }

        headers
    }
}

/// Split a header value on `;` outside of quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(value[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(value[start..].trim());
    params
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn skip_line_end(data: &[u8]) -> usize {
    if data.starts_with(CRLF) {
        CRLF.len()
    } else if data.starts_with(b"\n") {
        1
    } else {
        0
    }
}

fn find_bytes(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}
