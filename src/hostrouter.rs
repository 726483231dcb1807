//! Per-host dispatch. Every hostname this server answers for gets its
//! own path router and its own pair of log files; requests for
//! unknown hosts can go to a catch-all.

use std::{collections::HashMap, sync::{Arc, Mutex}};

use ahtml::HtmlAllocator;
use kstring::KString;

use crate::{acontext::AContext,
            apachelog::Logs,
            aresponse::AResponse,
            handler::Handler,
            http_request_method::HttpRequestMethodSimple,
            http_response_status_codes::HttpResponseStatusCode,
            router::MultiRouter,
            warn,
            webutils::errorpage_from_status};

/// The routing setup of one host: a path router, an optional fallback
/// handler for paths no routed handler accepted, and the log files
/// that requests to this host are written to.
pub struct HostRouter {
    pub router: Option<Arc<MultiRouter<Arc<dyn Handler>>>>,
    pub fallback: Option<Arc<dyn Handler>>,
    pub logs: Arc<Mutex<Logs>>,
}

impl HostRouter {
    /// Try the routed handler chain, then the fallback. `Ok(None)`
    /// means nobody wanted the path.
    fn dispatch(
        &self,
        context: &AContext,
        method: HttpRequestMethodSimple,
        allocator: &HtmlAllocator
    ) -> anyhow::Result<Option<AResponse>>
    {
        if let Some(router) = &self.router {
            if let Some((handlers, rest)) = router.get(context.path()) {
                for handler in handlers {
                    if let Some(response) =
                        handler.call(context, method, &rest, allocator)?
                    {
                        return Ok(Some(response));
                    }
                }
            }
        }
        if let Some(fallback) = &self.fallback {
            return fallback.call(context, method, context.path(), allocator);
        }
        Ok(None)
    }

    /// Run the request against this host's handlers. Also hands out
    /// the host's logs so the caller can write the log entry for
    /// whatever came out.
    pub fn handle_request(
        &self,
        context: &AContext,
        method: HttpRequestMethodSimple,
        allocator: &HtmlAllocator
    ) -> (Arc<Mutex<Logs>>, anyhow::Result<AResponse>)
    {
        let result = self.dispatch(context, method, allocator).map(
            |opt| opt.unwrap_or_else(
                || errorpage_from_status(
                    HttpResponseStatusCode::NotFound404).into()));
        (self.logs.clone(), result)
    }
}

/// All hosts this server answers for, plus where requests without a
/// usable `Host` header go.
pub struct HostsRouter {
    /// Keyed by lowercased hostname.
    pub routers: HashMap<KString, Arc<HostRouter>>,
    pub fallback: Option<Arc<HostRouter>>,
    /// Logs for requests no `HostRouter` takes (thus no fallback
    /// configured).
    pub logs: Arc<Mutex<Logs>>,
}

impl HostsRouter {
    pub fn new(fallback: Option<Arc<HostRouter>>,
               logs: Arc<Mutex<Logs>>
    ) -> HostsRouter {
        HostsRouter {
            routers: Default::default(),
            fallback,
            logs
        }
    }

    pub fn add(&mut self,
               hostname: &str,
               hostrouter: Arc<HostRouter>
    ) -> &mut Self {
        let key = KString::from_string(hostname.to_lowercase());
        if self.routers.insert(key, hostrouter).is_some() {
            warn!("hostname {hostname:?} registered twice, \
                   keeping the later router");
        }
        self
    }

    /// The `HostRouter` in charge of `host` (matched case
    /// insensitively), falling back when the host is unknown or the
    /// request carried no `Host` header at all.
    pub fn router_for(&self, host: Option<&str>) -> Option<&Arc<HostRouter>> {
        host.and_then(
            |h| self.routers.get(&KString::from_string(h.to_lowercase())))
            .or(self.fallback.as_ref())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use rouille::{Request, Response};
    use crate::handler::ExactFnHandler;

    fn logs() -> Arc<Mutex<Logs>> {
        Arc::new(Mutex::new(Logs {
            access_log: Box::new(std::io::sink()),
            error_log: Box::new(std::io::sink()),
        }))
    }

    fn hello_hostrouter() -> Arc<HostRouter> {
        let mut router: MultiRouter<Arc<dyn Handler>> = MultiRouter::new();
        router.add("/hello", Arc::new(ExactFnHandler::new(
            |_context: &AContext, _method: HttpRequestMethodSimple,
             _html: &HtmlAllocator| -> anyhow::Result<AResponse> {
                Ok(Response::text("hi").into())
            })));
        Arc::new(HostRouter {
            router: Some(Arc::new(router)),
            fallback: None,
            logs: logs(),
        })
    }

    fn status_for(hostrouter: &HostRouter, path: &str) -> u16 {
        let request = Request::fake_http("GET", path, vec![], vec![]);
        let context = AContext::new(&request, "127.0.0.1:3000").unwrap();
        let html = HtmlAllocator::new(10000);
        let (_logs, result) = hostrouter.handle_request(
            &context, HttpRequestMethodSimple::GET, &html);
        result.unwrap().response.status_code
    }

    #[test]
    fn t_routed_and_not_found() {
        let hostrouter = hello_hostrouter();
        assert_eq!(status_for(&hostrouter, "/hello"), 200);
        assert_eq!(status_for(&hostrouter, "/missing"), 404);
    }

    #[test]
    fn t_router_for_host() {
        let main = hello_hostrouter();
        let mut hostsrouter = HostsRouter::new(None, logs());
        hostsrouter.add("forms.example.com", main.clone());

        let found = hostsrouter.router_for(Some("Forms.Example.Com")).unwrap();
        assert!(Arc::ptr_eq(found, &main));
        assert!(hostsrouter.router_for(Some("other.example.com")).is_none());
        assert!(hostsrouter.router_for(None).is_none());
    }

    #[test]
    fn t_router_for_fallback() {
        let main = hello_hostrouter();
        let hostsrouter = HostsRouter::new(Some(main.clone()), logs());
        let found = hostsrouter.router_for(Some("other.example.com")).unwrap();
        assert!(Arc::ptr_eq(found, &main));
        assert!(Arc::ptr_eq(hostsrouter.router_for(None).unwrap(), &main));
    }
}
