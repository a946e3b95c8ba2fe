//! Request handling for the browser
//!
//! Maps a request path onto the download root and answers with either a
//! directory listing or the file content. Every path that could leave the
//! root is refused before the filesystem is touched.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, ALLOW, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use tracing::{debug, error, warn};

const JSON: &str = "application/json";
const OCTET_STREAM: &str = "application/octet-stream";
const TEXT: &str = "text/plain; charset=utf-8";

/// Why a request path was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRejection {
    /// Percent-decoding did not yield valid UTF-8
    BadEncoding,
    /// The path tries to escape the root
    Forbidden,
}

/// Resolve the URI path of a request to a location under `root`.
///
/// Empty and `.` segments are dropped. A `..` segment, a NUL byte or a
/// backslash anywhere in the decoded path is refused.
pub fn resolve_request_path(root: &Path, raw_path: &str) -> Result<PathBuf, PathRejection> {
    let decoded = urlencoding::decode(raw_path).map_err(|_| PathRejection::BadEncoding)?;
    if decoded.contains('\0') || decoded.contains('\\') {
        return Err(PathRejection::Forbidden);
    }

    let mut resolved = root.to_path_buf();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(PathRejection::Forbidden),
            name => resolved.push(name),
        }
    }
    Ok(resolved)
}

/// Answer one request against `root`.
///
/// Never fails: every error becomes a status code.
pub async fn handle_request<B>(req: Request<B>, root: &Path) -> Response<Full<Bytes>> {
    let head_only = match *req.method() {
        Method::GET => false,
        Method::HEAD => true,
        _ => {
            let mut response = text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
            return response;
        }
    };

    let path = match resolve_request_path(root, req.uri().path()) {
        Ok(path) => path,
        Err(PathRejection::BadEncoding) => return text(StatusCode::BAD_REQUEST, "Bad Request"),
        Err(PathRejection::Forbidden) => {
            debug!(path = req.uri().path(), "Refusing path outside the root");
            return text(StatusCode::FORBIDDEN, "Forbidden");
        }
    };

    let meta = match tokio::fs::metadata(&path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return text(StatusCode::NOT_FOUND, "Not Found")
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to stat requested path");
            return text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };

    // A symlink inside the tree must not lead outside of it.
    match (
        tokio::fs::canonicalize(root).await,
        tokio::fs::canonicalize(&path).await,
    ) {
        (Ok(real_root), Ok(real_path)) if real_path.starts_with(&real_root) => {}
        (Ok(_), Ok(real_path)) => {
            warn!(path = %path.display(), target = %real_path.display(), "Refusing link out of the root");
            return text(StatusCode::FORBIDDEN, "Forbidden");
        }
        (Err(e), _) | (_, Err(e)) => {
            error!(path = %path.display(), error = %e, "Failed to canonicalize requested path");
            return text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    }

    if meta.is_dir() {
        serve_directory(&path, head_only).await
    } else {
        serve_file(&path, meta.len(), head_only).await
    }
}

async fn serve_directory(path: &Path, head_only: bool) -> Response<Full<Bytes>> {
    let names = match list_directory(path).await {
        Ok(names) => names,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to list directory");
            return text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };

    match serde_json::to_vec(&names) {
        Ok(body) => with_body(StatusCode::OK, JSON, body, head_only),
        Err(e) => {
            error!(error = %e, "Failed to encode directory listing");
            text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

/// Child names sorted lexically, directories suffixed with `/`.
pub async fn list_directory(path: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(path).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await?.is_dir() {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

async fn serve_file(path: &Path, len: u64, head_only: bool) -> Response<Full<Bytes>> {
    if head_only {
        let mut response = with_body(StatusCode::OK, OCTET_STREAM, Vec::new(), true);
        response
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(len));
        return response;
    }

    match tokio::fs::read(path).await {
        Ok(body) => with_body(StatusCode::OK, OCTET_STREAM, body, false),
        Err(e) if e.kind() == ErrorKind::NotFound => text(StatusCode::NOT_FOUND, "Not Found"),
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to read file");
            text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

fn with_body(
    status: StatusCode,
    content_type: &'static str,
    body: Vec<u8>,
    head_only: bool,
) -> Response<Full<Bytes>> {
    let len = body.len() as u64;
    let body = if head_only { Bytes::new() } else { Bytes::from(body) };
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    response
}

fn text(status: StatusCode, message: &'static str) -> Response<Full<Bytes>> {
    with_body(status, TEXT, message.as_bytes().to_vec(), false)
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use tempfile::TempDir;

    use super::*;

    fn request(method: Method, uri: &str) -> Request<()> {
        Request::builder().method(method).uri(uri).body(()).unwrap()
    }

    async fn body_of(response: Response<Full<Bytes>>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    fn mirror() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"alpha").unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"beta").unwrap();
        std::fs::write(dir.path().join("with space.txt"), b"spaced").unwrap();
        dir
    }

    #[test]
    fn test_resolve_drops_empty_and_dot_segments() {
        let root = Path::new("/m");
        assert_eq!(resolve_request_path(root, "/"), Ok(PathBuf::from("/m")));
        assert_eq!(
            resolve_request_path(root, "//sub/./b.txt"),
            Ok(PathBuf::from("/m/sub/b.txt"))
        );
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let root = Path::new("/m");
        assert_eq!(resolve_request_path(root, "/../etc"), Err(PathRejection::Forbidden));
        assert_eq!(resolve_request_path(root, "/sub/../../x"), Err(PathRejection::Forbidden));
        assert_eq!(resolve_request_path(root, "/%2e%2e/x"), Err(PathRejection::Forbidden));
        assert_eq!(resolve_request_path(root, "/a%5cb"), Err(PathRejection::Forbidden));
        assert_eq!(resolve_request_path(root, "/a%00b"), Err(PathRejection::Forbidden));
    }

    #[test]
    fn test_resolve_rejects_invalid_utf8() {
        assert_eq!(
            resolve_request_path(Path::new("/m"), "/%ff%fe"),
            Err(PathRejection::BadEncoding)
        );
    }

    #[tokio::test]
    async fn test_root_listing_is_sorted_json() {
        let dir = mirror();
        let response = handle_request(request(Method::GET, "/"), dir.path()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], JSON);
        let names: Vec<String> = serde_json::from_slice(&body_of(response).await).unwrap();
        assert_eq!(names, vec!["a.txt", "sub/", "with space.txt"]);
    }

    #[tokio::test]
    async fn test_file_is_served_as_bytes() {
        let dir = mirror();
        let response = handle_request(request(Method::GET, "/sub/b.txt"), dir.path()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], OCTET_STREAM);
        assert_eq!(body_of(response).await, Bytes::from_static(b"beta"));
    }

    #[tokio::test]
    async fn test_percent_encoded_name() {
        let dir = mirror();
        let response =
            handle_request(request(Method::GET, "/with%20space.txt"), dir.path()).await;
        assert_eq!(body_of(response).await, Bytes::from_static(b"spaced"));
    }

    #[tokio::test]
    async fn test_head_has_length_but_no_body() {
        let dir = mirror();
        let response = handle_request(request(Method::HEAD, "/a.txt"), dir.path()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_LENGTH], "5");
        assert!(body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_traversal_is_forbidden() {
        let dir = mirror();
        let response = handle_request(request(Method::GET, "/../.."), dir.path()).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_missing_path_is_not_found() {
        let dir = mirror();
        let response = handle_request(request(Method::GET, "/nope.txt"), dir.path()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_write_methods_are_rejected() {
        let dir = mirror();
        for method in [Method::POST, Method::PUT, Method::DELETE] {
            let response = handle_request(request(method, "/a.txt"), dir.path()).await;
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(response.headers()[ALLOW], "GET, HEAD");
        }
        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"alpha");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_out_of_root_is_forbidden() {
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret"), b"s").unwrap();
        let dir = mirror();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();

        let response =
            handle_request(request(Method::GET, "/escape/secret"), dir.path()).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
