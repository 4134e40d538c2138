use std::fs;
use std::path::PathBuf;

use reqwest::blocking::multipart::{Form, Part};

use crate::error::{Error, Result};

/// One file entry of a pin upload. `name` is the filename declared in the
/// multipart part; it defaults to the path's base name.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub path: PathBuf,
}

impl UploadFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        Self { name, path }
    }

    pub fn named(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// A fully assembled multipart body for the pin-create endpoint. The
/// boundary is generated by the form; the client derives the content-type
/// header from it when the request is sent.
#[derive(Debug)]
pub struct UploadPayload {
    form: Form,
}

impl UploadPayload {
    pub fn boundary(&self) -> &str {
        self.form.boundary()
    }

    pub(crate) fn into_form(self) -> Form {
        self.form
    }
}

/// Bundle `files` plus the service's metadata and options fields into one
/// multipart payload: a `file` part per entry, a `pinataMetadata` field
/// carrying `{"name": ...}`, and a `pinataOptions` field carrying
/// `{"cidVersion": ...}`.
pub fn encode(files: &[UploadFile], name: &str, cid_version: u8) -> Result<UploadPayload> {
    let mut form = Form::new();
    for f in files {
        let bytes = fs::read(&f.path).map_err(|e| Error::file_access(&f.path, e))?;
        let part = Part::bytes(bytes).file_name(f.name.clone());
        form = form.part("file", part);
    }

    let metadata = serde_json::to_string(&serde_json::json!({ "name": name }))
        .map_err(|e| Error::encoding(format!("pin metadata: {e}")))?;
    let options = serde_json::to_string(&serde_json::json!({ "cidVersion": cid_version }))
        .map_err(|e| Error::encoding(format!("pin options: {e}")))?;
    form = form.text("pinataMetadata", metadata);
    form = form.text("pinataOptions", options);

    Ok(UploadPayload { form })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn base_name_becomes_part_filename() {
        let f = UploadFile::from_path("/some/dir/index.html");
        assert_eq!(f.name, "index.html");
        let named = UploadFile::named("renamed.html", "/some/dir/index.html");
        assert_eq!(named.name, "renamed.html");
    }

    #[test]
    fn encode_generates_a_boundary() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("a.txt");
        fs::write(&path, "x").expect("fixture");
        let payload = encode(&[UploadFile::from_path(path)], "site", 1).expect("encode");
        assert!(!payload.boundary().is_empty());
    }

    #[test]
    fn encode_accepts_empty_file_list() {
        let payload = encode(&[], "empty", 0).expect("encode");
        assert!(!payload.boundary().is_empty());
    }

    #[test]
    fn missing_file_fails_with_its_path() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let gone = tmp.path().join("gone.bin");
        let err = encode(&[UploadFile::from_path(gone.clone())], "site", 1)
            .expect_err("must fail");
        assert!(err.to_string().contains("gone.bin"), "got: {err}");
    }
}
