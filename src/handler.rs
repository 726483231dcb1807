use std::any::type_name;
use std::borrow::Cow;
use std::fmt::Debug;
use std::fs::File;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use ahtml::HtmlAllocator;
use anyhow::{anyhow, bail, Context, Result};
use httpdate::{fmt_http_date, parse_http_date};
use kstring::KString;
use rouille::{extension_to_mime, Response, ResponseBody};

use crate::acontext::AContext;
use crate::aresponse::AResponse;
use crate::http_request_method::HttpRequestMethodSimple;
use crate::http_response_status_codes::HttpResponseStatusCode;
use crate::ppath::PPath;
use crate::{or_return_none, warn};

// `mtime > modsince` is ~always true because mtime carries nsec where
// modsince has 0. Hence only report newer when it is at least a
// second newer.
fn file_is_newer_than_snapshot_time(mtime: SystemTime, modsince: SystemTime) -> bool {
    match mtime.duration_since(modsince) {
        Err(_e) => {
            // file is older than snapshot time; client is cheating,
            // or file has been restored to an older version; in any
            // case, it is not newer, so say no
            false
        }
        Ok(secsnewer) => {
            secsnewer >= Duration::from_secs(1)
        }
    }
}

macro_rules! cow {
    ($a:expr, $b:expr) => {
        (Cow::from($a), Cow::from($b))
    }
}

fn canonicalize_path<'s, S>(path: &'s [S]) -> Option<Vec<&'s str>>
where S: AsRef<str> + 's
{
    let mut out = Vec::new();
    for segment in path {
        let segment = segment.as_ref();
        match segment {
            "." => (),
            ".." =>
                if out.pop().is_none() {
                    return None
                },
            // Oh, don't forget this one (multiple slashes to one):
            "" => (),
            _ => out.push(segment)
        }
    }
    Some(out)
}


pub trait Handler: Debug + Send + Sync {
    /// Returning Ok(None) means, the handler is refusing to handle
    /// the request. It is to be handled as 404 not found by the
    /// caller, unless there's another alternative handler picking up
    /// the request. Err means, the handler has accepted to handle the
    /// request but failed to; this will be handled as internal server
    /// error. In either case, the caller has to format a 404 or other
    /// error page.
    fn call<'a>(
        &self,
        request: &AContext,
        method: HttpRequestMethodSimple,
        pathrest: &PPath<KString>,
        html: &HtmlAllocator)
        -> Result<Option<AResponse>>;
}

// ------------------------------------------------------------------
/// Serve files from the local file system
#[derive(Debug)]
pub struct FileHandler {
    /// Path to base directory in local file system from which to
    /// serve the files. No ".." or "." are allowed in the surplus of
    /// the request path.
    basepath: PathBuf,
    // no cache for now
}
impl FileHandler {
    pub fn new(basepath: impl Into<PathBuf>) -> FileHandler {
        FileHandler {
            basepath: basepath.into()
        }
    }
}

impl Handler for FileHandler {
    /// Returns None if the file does not exist
    fn call<'a>(
        &self,
        request: &AContext,
        method: HttpRequestMethodSimple,
        pathrest: &PPath<KString>,
        _html: &HtmlAllocator)
        -> Result<Option<AResponse>> {
        if method.is_post() {
            bail!("can't POST to a file")
        }
        let canonpath = or_return_none!(canonicalize_path(pathrest.segments()));
        if canonpath.is_empty() {
            return Ok(None) // Since it's a directory, not a file.
        }
        let canonpathstr: String = canonpath.join("/");
        let full_path: PathBuf = self.basepath.join(&canonpathstr);

        let metadata =
            match full_path.metadata() {
                Ok(m) => m,
                Err(e) =>
                    match e.kind() {
                        ErrorKind::NotFound => return Ok(None),
                        _ => return Err(e).with_context(
                            || anyhow!("can't open file for reading: {:?}",
                                       full_path))
                    }
            };

        if metadata.is_dir() {
            Ok(None)
        } else if metadata.is_symlink() {
            warn!("is_symlink, not handling symlinks yet");
            Ok(None)
        } else if metadata.is_file() {
            let mimetype =
                if let Some(extension_os) = full_path.extension() {
                    let extension = extension_os.to_str().expect("came from String above");
                    extension_to_mime(extension)
                } else {
                    "text/plain"
                };
            match File::open(&full_path) {
                Err(e) =>
                    match e.kind() {
                        ErrorKind::NotFound => Ok(None),
                        _ => Err(e).with_context(
                            || anyhow!("can't open file for reading: {:?}",
                                       full_path))?
                    },
                Ok(fh) => {
                    let mtime: SystemTime = metadata.modified()?;
                    let headers = vec![
                        cow!("Content-type", mimetype),
                        cow!("Last-Modified", fmt_http_date(mtime)),
                    ];
                    let send_file = |headers| {
                        Ok(Some(Response {
                            status_code:
                            HttpResponseStatusCode::OK200.code(),
                            headers,
                            data: ResponseBody::from_reader_and_size(
                                fh,
                                metadata.len() as usize),
                            upgrade: None,
                        }.into()))
                    };
                    let send_notmodified = |headers| {
                        Ok(Some(Response {
                            status_code:
                            HttpResponseStatusCode::NotModified304.code(),
                            // Still send these headers, letting the
                            // client know the file might even be
                            // *older* than what it saw.
                            headers,
                            data: ResponseBody::empty(),
                            upgrade: None,
                        }.into()))
                    };
                    if let Some(modsince_str) = request.header("If-Modified-Since")
                    {
                        let modsince = parse_http_date(modsince_str).with_context(
                            || anyhow!("parsing If-Modified-Since {:?}",
                                       modsince_str))?;
                        if file_is_newer_than_snapshot_time(mtime, modsince) {
                            send_file(headers)
                        } else {
                            send_notmodified(headers)
                        }
                    } else {
                        send_file(headers)
                    }
                }
            }
        } else {
            warn!("neither file nor symlink nor dir: device file or fifo or socket?");
            Ok(None)
        }
    }
}


// ------------------------------------------------------------------
/// A Handler that allows a path surplus, passing it to the handler
/// Fn. The handler may still refuse to handle the request (404).
#[derive(Clone, Copy)]
pub struct FnHandler<F>
where F: Fn(&AContext, HttpRequestMethodSimple, &PPath<KString>, &HtmlAllocator)
           -> Result<Option<AResponse>> + Send + Sync
{
    handler: F
}

impl<F: Fn(&AContext, HttpRequestMethodSimple, &PPath<KString>, &HtmlAllocator)
          -> Result<Option<AResponse>> + Send + Sync>
    FnHandler<F>
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F: Fn(&AContext, HttpRequestMethodSimple, &PPath<KString>, &HtmlAllocator)
          -> Result<Option<AResponse>> + Send + Sync>
    Handler for FnHandler<F>
{
    fn call(
        &self,
        request: &AContext,
        method: HttpRequestMethodSimple,
        pathrest: &PPath<KString>,
        html: &HtmlAllocator) -> Result<Option<AResponse>>
    {
        (self.handler)(request, method, pathrest, html)
    }
}

impl<F: Fn(&AContext, HttpRequestMethodSimple, &PPath<KString>, &HtmlAllocator)
          -> Result<Option<AResponse>> + Send + Sync>
    Debug for FnHandler<F>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("FnHandler({})",
                                 type_name::<F>()))
    }
}

// ------------------------------------------------------------------
/// A Handler that does not allow a path surplus, passing it to the handler Fn.
#[derive(Clone, Copy)]
pub struct ExactFnHandler<F>
where F: Fn(&AContext, HttpRequestMethodSimple, &HtmlAllocator)
           -> Result<AResponse> + Send + Sync
{
    handler: F
}

impl<F: Fn(&AContext, HttpRequestMethodSimple, &HtmlAllocator)
          -> Result<AResponse> + Send + Sync>
    ExactFnHandler<F>
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F: Fn(&AContext, HttpRequestMethodSimple, &HtmlAllocator)
          -> Result<AResponse> + Send + Sync>
    Handler for ExactFnHandler<F>
{
    fn call(
        &self,
        request: &AContext,
        method: HttpRequestMethodSimple,
        pathrest: &PPath<KString>,
        html: &HtmlAllocator) -> Result<Option<AResponse>>
    {
        if pathrest.segments().is_empty() {
            Ok(Some((self.handler)(request, method, html)?))
        } else {
            // refuse to handle if there is a rest (-> 404)
            Ok(None)
        }
    }
}

impl<F: Fn(&AContext, HttpRequestMethodSimple, &HtmlAllocator)
          -> Result<AResponse> + Send + Sync>
    Debug for ExactFnHandler<F>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("ExactFnHandler({})",
                                 type_name::<F>()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_canonicalize_path() {
        assert_eq!(canonicalize_path::<&str>(&[]), Some(vec![]));
        assert_eq!(canonicalize_path(&["a", "b"]), Some(vec!["a", "b"]));
        assert_eq!(canonicalize_path(&[".", "a", ".", "b", ".", ".."]),
                   Some(vec!["a"]));
        assert_eq!(canonicalize_path(&["a", "..", "b"]),
                   Some(vec!["b"]));
        assert_eq!(canonicalize_path(&["a", "..", "b", ".."]),
                   Some(vec![]));
        assert_eq!(canonicalize_path(&["a", "..", ".", ".."]),
                   None);
        // /foo.html/. is translated to /foo.html:
        assert_eq!(canonicalize_path(&["a", "foo.html", "."]),
                   Some(vec!["a", "foo.html"]));
        // Also, /foo/ to /foo
        assert_eq!(canonicalize_path(&["foo", ""]),
                   Some(vec!["foo"]));
        assert_eq!(canonicalize_path(&["foo", "", ".", "", "", "a", ".", ""]),
                   Some(vec!["foo", "a"]));
    }
}
