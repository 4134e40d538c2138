use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::upload::UploadPayload;

pub const DEFAULT_API_ROOT: &str = "https://api.pinata.cloud";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The remote object's identity as the service reports it. Produced by
/// `create_pin`, refreshed by `fetch_pin`; authoritative once a pin exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePinIdentity {
    pub id: String,
    pub cid: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    data: FetchData,
}

#[derive(Debug, Deserialize)]
struct FetchData {
    id: String,
    name: String,
    cid: String,
}

/// Authenticated request plumbing against the pinning service. Owns no state
/// beyond the connection configuration; every call is a single attempt with
/// a fixed timeout, and retry policy belongs to callers.
#[derive(Debug)]
pub struct RemoteClient {
    http: reqwest::blocking::Client,
    root: String,
    token: String,
}

impl RemoteClient {
    pub fn new(root: Option<&str>, token: &str) -> Result<Self> {
        let root = root
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_API_ROOT);
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::msg(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            root: root.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn create_pin(&self, payload: UploadPayload) -> Result<RemotePinIdentity> {
        let url = format!("{}/pinning/pinFileToIPFS", self.root);
        tracing::debug!(url = %url, "uploading pin");
        let body = self.execute(self.http.post(url).multipart(payload.into_form()))?;
        let parsed: CreateResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::transport(format!("malformed create response: {e}")))?;
        Ok(RemotePinIdentity {
            id: parsed.id,
            cid: parsed.ipfs_hash,
            name: parsed.name,
        })
    }

    pub fn fetch_pin(&self, id: &str) -> Result<RemotePinIdentity> {
        let url = format!("{}/v3/files/public/{}", self.root, id);
        tracing::debug!(url = %url, "fetching pin");
        let body = self.execute(self.http.get(url))?;
        let parsed: FetchResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::transport(format!("malformed fetch response: {e}")))?;
        Ok(RemotePinIdentity {
            id: parsed.data.id,
            cid: parsed.data.cid,
            name: parsed.data.name,
        })
    }

    pub fn delete_pin(&self, id: &str) -> Result<()> {
        let url = format!("{}/v3/files/public/{}", self.root, id);
        tracing::debug!(url = %url, "deleting pin");
        self.execute(self.http.delete(url))?;
        Ok(())
    }

    // Shared request path: bearer header, single attempt, non-2xx statuses
    // uniformly mapped to RemoteService with the raw body preserved.
    fn execute(&self, req: reqwest::blocking::RequestBuilder) -> Result<Vec<u8>> {
        let res = req
            .bearer_auth(&self.token)
            .send()
            .map_err(Error::transport)?;
        let status = res.status();
        let body = res.bytes().map_err(Error::transport)?;
        if !status.is_success() {
            return Err(Error::remote_service(
                status.as_u16(),
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use crate::error::ErrorKind;
    use crate::upload::{self, UploadFile};

    use super::*;

    struct CapturedRequest {
        method: String,
        path: String,
        headers: String,
        body: Vec<u8>,
    }

    // Serves exactly one request and hands back what the client sent.
    // Handles both Content-Length and chunked request bodies, since the
    // multipart upload path may use either framing.
    fn serve_once(
        status_line: &'static str,
        response_body: &'static str,
    ) -> (String, thread::JoinHandle<CapturedRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut raw = Vec::<u8>::new();
            let mut buf = [0u8; 8192];

            let header_end = loop {
                let n = stream.read(&mut buf).expect("read request");
                raw.extend_from_slice(&buf[..n]);
                if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
                assert!(n > 0, "connection closed before headers completed");
            };

            let headers = String::from_utf8_lossy(&raw[..header_end]).to_string();
            let lower = headers.to_ascii_lowercase();
            let content_length = lower
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok());

            if let Some(len) = content_length {
                while raw.len() - header_end < len {
                    let n = stream.read(&mut buf).expect("read body");
                    assert!(n > 0, "connection closed mid-body");
                    raw.extend_from_slice(&buf[..n]);
                }
            } else if lower.contains("transfer-encoding: chunked") {
                while !raw.ends_with(b"0\r\n\r\n") {
                    let n = stream.read(&mut buf).expect("read chunk");
                    assert!(n > 0, "connection closed mid-chunks");
                    raw.extend_from_slice(&buf[..n]);
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                response_body.len(),
                response_body
            );
            stream.write_all(response.as_bytes()).expect("write response");

            let mut parts = headers
                .lines()
                .next()
                .unwrap_or_default()
                .split_whitespace();
            CapturedRequest {
                method: parts.next().unwrap_or_default().to_string(),
                path: parts.next().unwrap_or_default().to_string(),
                headers,
                body: raw[header_end..].to_vec(),
            }
        });
        (format!("http://{}", addr), handle)
    }

    #[test]
    fn create_pin_posts_multipart_and_parses_identity() {
        let (root, handle) = serve_once(
            "200 OK",
            r#"{"IpfsHash":"bafytest","ID":"pin-1","Name":"site"}"#,
        );
        let client = RemoteClient::new(Some(&root), "test-token").expect("client");

        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("index.html");
        fs::write(&path, "<html></html>").expect("fixture");
        let payload =
            upload::encode(&[UploadFile::from_path(path)], "site", 1).expect("encode");

        let identity = client.create_pin(payload).expect("create");
        assert_eq!(identity.id, "pin-1");
        assert_eq!(identity.cid, "bafytest");
        assert_eq!(identity.name, "site");

        let req = handle.join().expect("join");
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/pinning/pinFileToIPFS");
        assert!(req.headers.contains("Bearer test-token"), "{}", req.headers);
        assert!(
            req.headers
                .to_ascii_lowercase()
                .contains("multipart/form-data; boundary="),
            "{}",
            req.headers
        );
        let body = String::from_utf8_lossy(&req.body);
        assert!(body.contains("<html></html>"), "file bytes missing");
        assert!(body.contains("filename=\"index.html\""), "part filename missing");
        assert!(body.contains("pinataMetadata"), "metadata field missing");
        assert!(body.contains(r#"{"name":"site"}"#), "metadata body missing");
        assert!(body.contains(r#"{"cidVersion":1}"#), "options body missing");
    }

    #[test]
    fn fetch_pin_parses_wrapped_payload() {
        let (root, handle) = serve_once(
            "200 OK",
            r#"{"data":{"id":"pin-9","name":"docs","cid":"bafydocs"}}"#,
        );
        let client = RemoteClient::new(Some(&root), "tok").expect("client");
        let identity = client.fetch_pin("pin-9").expect("fetch");
        assert_eq!(
            identity,
            RemotePinIdentity {
                id: "pin-9".into(),
                cid: "bafydocs".into(),
                name: "docs".into(),
            }
        );
        let req = handle.join().expect("join");
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/v3/files/public/pin-9");
    }

    #[test]
    fn delete_pin_issues_delete() {
        let (root, handle) = serve_once("200 OK", "");
        let client = RemoteClient::new(Some(&root), "tok").expect("client");
        client.delete_pin("pin-3").expect("delete");
        let req = handle.join().expect("join");
        assert_eq!(req.method, "DELETE");
        assert_eq!(req.path, "/v3/files/public/pin-3");
    }

    #[test]
    fn non_success_status_preserves_body_verbatim() {
        let (root, handle) = serve_once("404 Not Found", "pin not found");
        let client = RemoteClient::new(Some(&root), "tok").expect("client");
        let err = client.fetch_pin("missing").expect_err("must fail");
        match err.kind() {
            ErrorKind::RemoteService { status, body } => {
                assert_eq!(*status, 404);
                assert_eq!(body, "pin not found");
            }
            other => panic!("expected RemoteService, got {other:?}"),
        }
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("status: 404"));
        handle.join().expect("join");
    }

    #[test]
    fn malformed_success_body_is_transport() {
        let (root, handle) = serve_once("200 OK", "not json");
        let client = RemoteClient::new(Some(&root), "tok").expect("client");
        let err = client.fetch_pin("pin-1").expect_err("must fail");
        assert!(err.is_transport(), "got: {err}");
        handle.join().expect("join");
    }

    #[test]
    fn connection_failure_is_transport() {
        // Bind then drop to get a port with nothing listening.
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").expect("bind");
            l.local_addr().expect("addr").port()
        };
        let root = format!("http://127.0.0.1:{port}");
        let client = RemoteClient::new(Some(&root), "tok").expect("client");
        let err = client.fetch_pin("pin-1").expect_err("must fail");
        assert!(err.is_transport(), "got: {err}");
    }

    #[test]
    fn default_root_applies_when_unset() {
        let client = RemoteClient::new(None, "tok").expect("client");
        assert_eq!(client.root(), DEFAULT_API_ROOT);
        let client = RemoteClient::new(Some("  "), "tok").expect("client");
        assert_eq!(client.root(), DEFAULT_API_ROOT);
        let client = RemoteClient::new(Some("http://localhost:1/"), "tok").expect("client");
        assert_eq!(client.root(), "http://localhost:1");
    }
}
