use std::{io::Write, net::{IpAddr, SocketAddr}, time::SystemTime};

use anyhow::{anyhow, Result};
use kstring::KString;
use rouille::{HeadersIter, Request};

use crate::{http_request_method::HttpRequestMethod, ppath::PPath};

/// A `rouille::Request` plus the derived pieces every handler needs:
/// the parsed path, the request time, the parsed method.
pub struct AContext<'r> {
    // Fallback for host(): what this server listens on; ip:port or
    // domain:port or whatever is deemed suitable
    listen_addr: &'r str,
    path: PPath<KString>,
    path_string: String,
    now: SystemTime,
    method: HttpRequestMethod,
    request: &'r Request,
}

impl<'r> AContext<'r> {
    pub fn new(request: &'r Request, listen_addr: &'r str) -> Result<Self> {
        let path_original = request.url(); // path only
        let path: PPath<KString> = PPath::from_str(&path_original);
        let path_string = path.to_string();
        let method = HttpRequestMethod::from_str(request.method())?;

        Ok(AContext {
            listen_addr,
            path,
            path_string,
            now: SystemTime::now(),
            method,
            request,
        })
    }

    /// Like the request part in Apache style Combined Log Format
    pub fn request_line(&self) -> String {
        // `Request` does not appear to maintain the original request
        // line string, thus have to reconstruct it.
        format!("{} {}",
                self.request.method(),
                self.request.raw_url())
    }
    /// `foo` part in `?foo`
    pub fn query_string(&self) -> &str {
        self.request.raw_query_string()
    }
    pub fn user_agent(&self) -> Option<&str> {
        self.request.header("user-agent")
    }
    pub fn client_ip(&'r self) -> IpAddr {
        self.request.remote_addr().ip()
    }
    pub fn is_secure(&'r self) -> bool {
        self.request.is_secure()
    }
    pub fn method_str(&'r self) -> &'r str { self.request.method() }
    pub fn method(&self) -> HttpRequestMethod { self.method }
    pub fn is_post(&self) -> bool {
        self.method.is_post()
    }
    /// Only checks query parameters! For `POST` data, use
    /// [`rouille::input::post`].
    pub fn get_param(&self, name: &str) -> Option<String>  {
        self.request.get_param(name)
    }
    pub fn param(&self, name: &str) -> Result<String>  {
        self.get_param(name).ok_or_else(
            || anyhow!("missing param {name:?}"))
    }
    pub fn host(&self) -> Option<&str> { self.request.header("host") }
    pub fn host_or_listen_addr(&self) -> &str {
        self.request.header("host").unwrap_or(&self.listen_addr)
    }
    pub fn client_addr(&'r self) -> &'r SocketAddr { self.request.remote_addr() }
    pub fn path(&self) -> &PPath<KString> { &self.path }
    pub fn path_str(&self) -> &str { &self.path_string }
    pub fn now(&self) -> &SystemTime { &self.now }
    pub fn referer(&self) -> Option<&str> {
        self.header("referer")
    }

    pub fn header(&self, key: &str) -> Option<&str> { self.request.header(key) }
    pub fn headers(&self) -> HeadersIter { self.request.headers() }

    pub fn request(&self) -> &Request { self.request }

    pub fn writeln(&self, outp: &mut impl Write) -> Result<()> {
        writeln!(outp, "{:?}: {:?} {:?} / {:?} ({:?})",
                 self.client_addr(), self.method_str(), self.host(),
                 self.path(), self.headers())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_basic_accessors() -> Result<()> {
        let request = Request::fake_http(
            "GET", "/forms/contact?x=1",
            vec![("Host".to_owned(), "example.com".to_owned())],
            vec![]);
        let context = AContext::new(&request, "127.0.0.1:3000")?;
        assert_eq!(context.path_str(), "/forms/contact");
        assert_eq!(context.query_string(), "x=1");
        assert_eq!(context.host(), Some("example.com"));
        assert_eq!(context.host_or_listen_addr(), "example.com");
        assert!(! context.is_post());
        assert_eq!(context.request_line(), "GET /forms/contact?x=1");
        Ok(())
    }

    #[test]
    fn t_listen_addr_fallback() -> Result<()> {
        let request = Request::fake_http("GET", "/", vec![], vec![]);
        let context = AContext::new(&request, "127.0.0.1:3000")?;
        assert_eq!(context.host_or_listen_addr(), "127.0.0.1:3000");
        Ok(())
    }
}
