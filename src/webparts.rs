//! The parts tying the server together: the rouille entry point with
//! worker pool and per-host dispatch, the page layout seam, and the
//! handler serving the published forms.

use std::panic;
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use kstring::KString;
use rand::{prelude::thread_rng, Rng};
use rand_distr::Weibull;
use rouille::input::post::raw_urlencoded_post_input;
use rouille::{Request, Response};
use scoped_thread_pool::Pool;

use ahtml::{att, AId, AllocatorPool, HtmlAllocator, Node};

use crate::acontext::AContext;
use crate::apachelog::{log_combined, Logs};
use crate::aresponse::AResponse;
use crate::formdir::FormDir;
use crate::formrender::{FormRenderer, SubmitStatus};
use crate::formsubmit::{FormData, FormSubmissionService};
use crate::handler::{FnHandler, Handler};
use crate::hostrouter::HostsRouter;
use crate::http_request_method::HttpRequestMethodSimple;
use crate::http_response_status_codes::HttpResponseStatusCode;
use crate::ppath::PPath;
use crate::time_util;
use crate::webutils::{errorpage_from_status, htmlresponse};
use crate::{time_guard, warn};

/// Run `f` inside the thread pool, blocking the calling thread on the
/// result. A panic in `f` is resumed on the calling thread.
pub fn in_threadpool<F, R>(threadpool: Arc<Pool>, f: F) -> Result<R>
where F: FnOnce() -> R + Send,
      R: Send
{
    let (tx, rx) = channel();
    threadpool.scoped(move |scope| {
        scope.execute(move || {
            let result = panic::catch_unwind(panic::AssertUnwindSafe(f));
            tx.send(result).expect("receiver blocks on us until we send");
        });
        match rx.recv()? {
            Ok(v) => Ok(v),
            Err(payload) => panic::resume_unwind(payload),
        }
    })
}

/// The handler function to hand to rouille's `Server`. Work happens
/// on the given thread pool; the worker picks an allocator from the
/// pool, resolves the `Host` header against `hostsrouter` and leaves
/// the rest to the per-host routers. One access or error log line is
/// written per request.
pub fn server_handler(
    listen_addr: String,
    hostsrouter: Arc<HostsRouter>,
    allocatorpool: &'static AllocatorPool,
    threadpool: Arc<Pool>,
) -> impl Fn(&Request) -> Response + Send + Sync + 'static {
    move |request: &Request| -> Response {
        time_guard!("server_handler");
        let aresponse = in_threadpool(
            threadpool.clone(),
            || -> AResponse {
                let okhandler = |context: AContext| -> AResponse {
                    log_combined(
                        &context,
                        || -> (Arc<Mutex<Logs>>, anyhow::Result<AResponse>) {
                            let method = context.method();
                            match method.to_simple() {
                                Some(simplemethod) => {
                                    let mut guard = allocatorpool.get();
                                    let allocator = guard.allocator();
                                    if let Some(hostrouter) =
                                        hostsrouter.router_for(context.host())
                                    {
                                        return hostrouter.handle_request(
                                            &context, simplemethod, allocator);
                                    }
                                }
                                None => {
                                    warn!("method {:?} not implemented",
                                          method.as_str());
                                    return (
                                        hostsrouter.logs.clone(),
                                        Ok(errorpage_from_status(
                                            HttpResponseStatusCode::NotImplemented501)
                                           .into()));
                                }
                            }
                            (hostsrouter.logs.clone(),
                             Ok(errorpage_from_status(
                                 HttpResponseStatusCode::NotFound404)
                                .into()))
                        })
                };
                match AContext::new(request, &listen_addr) {
                    Ok(context) => okhandler(context),
                    Err(e) => {
                        // Too broken to even write a request log entry.
                        warn!("{e}");
                        errorpage_from_status(
                            HttpResponseStatusCode::InternalServerError500).into()
                    }
                }
            })
            .expect("only ever fails if thread fails outside catch_unwind");
        let AResponse { response, sleep_until } = aresponse;
        if let Some(t) = sleep_until {
            time_util::sleep_until(t);
        }
        response
    }
}

/// What a website style must provide: wrap the given main content
/// into a complete page.
pub trait LayoutInterface: Send + Sync {
    fn page(
        &self,
        context: &AContext,
        html: &HtmlAllocator,
        head_title: Option<AId<Node>>,
        title: Option<AId<Node>>,
        main: AId<Node>,
    ) -> Result<AId<Node>>;
}

/// Returns a function that makes a division with a CSS class "pair",
/// sub-divisions "pair_a" and "pair_b".
pub fn pair<'a>(html: &'a HtmlAllocator)
                -> impl Fn(AId<Node>, AId<Node>) -> Result<AId<Node>> + 'a
{
    move |a, b| {
        html.div([att("class", "pair")],
                 [
                     html.div([att("class", "pair_a")], [a])?,
                     html.div([att("class", "pair_b")], [b])?,
                 ])
    }
}

pub fn buttonrow<'a, const N: usize>(html: &'a HtmlAllocator)
                                     -> impl Fn([AId<Node>; N]) -> Result<AId<Node>> + 'a
{
    move |buttons| {
        html.div([att("class", "buttonrow")], buttons)
    }
}

/// Serve the forms published in `formdir`: the path rest below the
/// mount point selects the form by name, the empty rest gives an
/// index of all published forms. `GET` renders the form, `POST` hands
/// the submitted data to `service` and either redirects to the
/// form's configured target or re-renders the form showing the
/// outcome.
///
/// `POST` responses are released at a randomized time past the
/// request start so that response timing does not give away what the
/// submission service did.
pub fn form_handler(
    formdir: Arc<FormDir>,
    service: Arc<dyn FormSubmissionService + Send + Sync>,
    style: Arc<dyn LayoutInterface>,
) -> Arc<dyn Handler> {
    Arc::new(FnHandler::new(
        move |
        context: &AContext,
        method: HttpRequestMethodSimple,
        path_rest: &PPath<KString>,
        html: &HtmlAllocator
            | -> Result<Option<AResponse>>
        {
            let cache = formdir.cache();

            let form_page = |renderer: &FormRenderer| -> Result<Response> {
                htmlresponse(
                    html, HttpResponseStatusCode::OK200,
                    |html| {
                        let main = renderer.render(html, context.path_str())?;
                        style.page(context, html,
                                   Some(html.str(&renderer.schema().subject)?),
                                   None,
                                   main)
                    })
            };

            if method.is_post() {
                let start: Instant = Instant::now();
                let delayed = |response: Result<Option<Response>>|
                               -> Result<Option<AResponse>>
                {
                    let _micros: Weibull<f64> = Weibull::new(700000., 20.)?;
                    let micros: f64 = thread_rng().sample(_micros);
                    let target = start.checked_add(Duration::from_micros(micros as u64))
                        .expect("does not fail (overflow) because we only \
                                 add about a second");
                    response.map(|v| v.map(|r| AResponse::delayed(r, target)))
                };

                let name = match path_rest.segments() {
                    [name] => name,
                    [] => bail!("can't POST to the form index"),
                    _ => return Ok(None)
                };
                let schema = match cache.get(name) {
                    Some(schema) => schema,
                    None => return Ok(None)
                };
                let data = FormData::from_pairs(
                    raw_urlencoded_post_input(context.request())?);
                let renderer = FormRenderer::new(schema);
                if renderer.submit(&data, &*service) == SubmitStatus::Sent {
                    if let Some(target) = &schema.redirect_to {
                        return delayed(Ok(Some(
                            Response::redirect_302(target.to_string()))));
                    }
                }
                delayed(form_page(&renderer).map(Some))
            } else {
                match path_rest.segments() {
                    [] => {
                        let resp = htmlresponse(
                            html, HttpResponseStatusCode::OK200,
                            |html| {
                                let base = context.path_str();
                                let names = cache.names();
                                let main = if names.is_empty() {
                                    html.p([], [html.str(
                                        "No forms are published yet.")?])?
                                } else {
                                    let mut items = html.new_vec();
                                    for name in names {
                                        let href =
                                            if base.ends_with('/') {
                                                format!("{base}{name}")
                                            } else {
                                                format!("{base}/{name}")
                                            };
                                        items.push(html.li(
                                            [],
                                            [html.a([att("href", href)],
                                                    [html.str(name)?])?])?)?;
                                    }
                                    html.ul([], items)?
                                };
                                style.page(context, html,
                                           Some(html.str("Forms")?),
                                           Some(html.str("Forms")?),
                                           main)
                            })?;
                        Ok(Some(resp.into()))
                    }
                    [name] => {
                        match cache.get(name) {
                            Some(schema) => {
                                let renderer = FormRenderer::new(schema);
                                Ok(Some(form_page(&renderer)?.into()))
                            }
                            None => Ok(None)
                        }
                    }
                    _ => Ok(None)
                }
            }
        }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use std::path::PathBuf;

    use anyhow::anyhow;
    use lazy_static::lazy_static;

    use ahtml::Flat;

    use crate::formsubmit::SubmissionError;
    use crate::hostrouter::HostRouter;
    use crate::nav::{Nav, NavEntry};
    use crate::router::MultiRouter;
    use crate::website_layout::WebsiteLayout;
    use crate::webutils::randomidstring;

    static NAV: Nav<'static> = Nav(&[
        NavEntry { name: "Forms", path: "/forms" },
    ]);

    fn layout() -> Arc<dyn LayoutInterface> {
        Arc::new(WebsiteLayout {
            site_name: "Test Site",
            copyright_start_year: 2024,
            copyright_owner: "Test Owner",
            nav: &NAV,
            header_contents: Box::new(|html| Ok(Flat::One(html.staticstr("hdr")?))),
        })
    }

    fn tmp_form_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(
            format!("formsite-handler-{}", randomidstring().unwrap()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    const CONTACT: &str = r#"{
        "subject": "Contact request",
        "sendTo": "owner@example.com",
        "redirectTo": "/thanks",
        "spreadsheetId": "sheet-1",
        "sheetName": "Leads",
        "fields": [
            {"label": "Full Name", "type": "text", "required": true},
            {"label": "Email", "type": "email", "required": true}
        ]
    }"#;

    fn handler_with(service: Arc<dyn FormSubmissionService + Send + Sync>)
                    -> Arc<dyn Handler>
    {
        let dir = tmp_form_dir();
        fs::write(dir.join("contact.json"), CONTACT).unwrap();
        fs::write(dir.join("quote.json"),
                  r#"{"subject": "Quote", "sendTo": "owner@example.com",
                      "fields": [{"label": "Message", "type": "textarea"}]}"#)
            .unwrap();
        let formdir = FormDir::open(dir).unwrap();
        form_handler(formdir, service, layout())
    }

    fn get(handler: &Arc<dyn Handler>, url: &str, rest: &str) -> Option<AResponse> {
        let request = Request::fake_http("GET", url, vec![], vec![]);
        let context = AContext::new(&request, "127.0.0.1:3000").unwrap();
        let html = HtmlAllocator::new(100000);
        handler.call(&context, HttpRequestMethodSimple::GET,
                     &PPath::from_str(rest), &html).unwrap()
    }

    fn post(handler: &Arc<dyn Handler>, url: &str, rest: &str, body: &str)
            -> Result<Option<AResponse>>
    {
        let request = Request::fake_http(
            "POST", url,
            vec![("Content-Type".to_string(),
                  "application/x-www-form-urlencoded".to_string())],
            body.as_bytes().to_vec());
        let context = AContext::new(&request, "127.0.0.1:3000").unwrap();
        let html = HtmlAllocator::new(100000);
        handler.call(&context, HttpRequestMethodSimple::POST,
                     &PPath::from_str(rest), &html)
    }

    fn body_string(response: Response) -> String {
        let (mut reader, _len) = response.data.into_reader_and_size();
        let mut s = String::new();
        reader.read_to_string(&mut s).unwrap();
        s
    }

    fn header<'r>(response: &'r Response, name: &str) -> Option<&'r str> {
        response.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| &**v)
    }

    #[derive(Debug)]
    struct OkService;
    impl FormSubmissionService for OkService {
        fn submit(&self, _data: &FormData,
                  _spreadsheet_id: Option<&str>, _sheet_name: Option<&str>)
                  -> Result<(), SubmissionError> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct FailingService;
    impl FormSubmissionService for FailingService {
        fn submit(&self, _data: &FormData,
                  _spreadsheet_id: Option<&str>, _sheet_name: Option<&str>)
                  -> Result<(), SubmissionError> {
            Err(anyhow!("smtp relay unreachable").into())
        }
    }

    #[derive(Debug, Default)]
    struct RecordingService {
        calls: Mutex<Vec<(FormData, Option<String>, Option<String>)>>,
    }
    impl FormSubmissionService for RecordingService {
        fn submit(&self, data: &FormData,
                  spreadsheet_id: Option<&str>, sheet_name: Option<&str>)
                  -> Result<(), SubmissionError> {
            self.calls.lock().unwrap().push(
                (data.clone(),
                 spreadsheet_id.map(String::from),
                 sheet_name.map(String::from)));
            Ok(())
        }
    }

    #[test]
    fn t_index_lists_forms() {
        let handler = handler_with(Arc::new(OkService));
        let aresponse = get(&handler, "/forms", "").unwrap();
        assert_eq!(aresponse.response.status_code, 200);
        assert!(aresponse.sleep_until.is_none());
        let body = body_string(aresponse.response);
        assert!(body.contains(r#"<a href="/forms/contact">contact</a>"#),
                "got: {body}");
        assert!(body.contains(r#"<a href="/forms/quote">quote</a>"#),
                "got: {body}");
    }

    #[test]
    fn t_get_renders_idle_form() {
        let handler = handler_with(Arc::new(OkService));
        let aresponse = get(&handler, "/forms/contact", "contact").unwrap();
        assert_eq!(aresponse.response.status_code, 200);
        let body = body_string(aresponse.response);
        assert!(body.contains(
            r#"<form action="/forms/contact" method="POST">"#), "got: {body}");
        assert!(body.contains(r#"name="Full Name""#), "got: {body}");
        assert!(body.contains(">SUBMIT</button>"), "got: {body}");
        assert!(body.contains("<title>Contact request | Test Site</title>"),
                "got: {body}");
    }

    #[test]
    fn t_unknown_form_declines() {
        let handler = handler_with(Arc::new(OkService));
        assert!(get(&handler, "/forms/nosuch", "nosuch").is_none());
    }

    #[test]
    fn t_post_success_redirects_delayed() {
        let handler = handler_with(Arc::new(OkService));
        let aresponse = post(&handler, "/forms/contact", "contact",
                             "Full+Name=Jo+Doe&Email=jo%40example.com&name-honey=")
            .unwrap().unwrap();
        assert_eq!(aresponse.response.status_code, 302);
        assert_eq!(header(&aresponse.response, "Location"), Some("/thanks"));
        // Released only once the submission delay has passed.
        assert!(aresponse.sleep_until.is_some());
    }

    #[test]
    fn t_post_without_redirect_rerenders_sent() {
        let handler = handler_with(Arc::new(OkService));
        let aresponse = post(&handler, "/forms/quote", "quote", "Message=hi")
            .unwrap().unwrap();
        assert_eq!(aresponse.response.status_code, 200);
        assert!(aresponse.sleep_until.is_some());
        let body = body_string(aresponse.response);
        assert!(body.contains(">Sent</button>"), "got: {body}");
    }

    #[test]
    fn t_post_failure_rerenders_error() {
        // Even with redirectTo configured, a failed submission stays
        // on the form page.
        let handler = handler_with(Arc::new(FailingService));
        let aresponse = post(&handler, "/forms/contact", "contact",
                             "Full+Name=Jo&Email=jo%40example.com")
            .unwrap().unwrap();
        assert_eq!(aresponse.response.status_code, 200);
        assert_eq!(header(&aresponse.response, "Location"), None);
        let body = body_string(aresponse.response);
        assert!(body.contains(">Error</button>"), "got: {body}");
    }

    #[test]
    fn t_post_body_reaches_service_decoded() {
        let service = Arc::new(RecordingService::default());
        let handler = handler_with(service.clone());
        post(&handler, "/forms/contact", "contact",
             "Full+Name=Jo+Doe&Email=jo%40example.com&name-honey=")
            .unwrap().unwrap();
        let calls = service.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (data, spreadsheet_id, sheet_name) = &calls[0];
        assert_eq!(data.first("Full Name"), Some("Jo Doe"));
        assert_eq!(data.first("Email"), Some("jo@example.com"));
        assert_eq!(spreadsheet_id.as_deref(), Some("sheet-1"));
        assert_eq!(sheet_name.as_deref(), Some("Leads"));
    }

    #[test]
    fn t_post_to_index_is_an_error() {
        let handler = handler_with(Arc::new(OkService));
        let e = post(&handler, "/forms", "", "a=b")
            .err().expect("POST to the index must fail");
        assert!(e.to_string().contains("can't POST"), "got: {e}");
    }

    #[test]
    fn t_post_unknown_form_declines() {
        let handler = handler_with(Arc::new(OkService));
        assert!(post(&handler, "/forms/nosuch", "nosuch", "a=b")
                .unwrap().is_none());
    }

    #[test]
    fn t_server_handler_routes_by_host() {
        lazy_static! {
            static ref TESTPOOL: AllocatorPool = AllocatorPool::new(100000);
        }
        let logs = || Arc::new(Mutex::new(Logs {
            access_log: Box::new(std::io::sink()),
            error_log: Box::new(std::io::sink()),
        }));

        let dir = tmp_form_dir();
        fs::write(dir.join("contact.json"), CONTACT).unwrap();
        let formdir = FormDir::open(dir).unwrap();

        let mut router = MultiRouter::new();
        router.add("/forms",
                   form_handler(formdir, Arc::new(OkService), layout()));
        let hostrouter = Arc::new(HostRouter {
            router: Some(Arc::new(router)),
            fallback: None,
            logs: logs(),
        });
        let mut hostsrouter = HostsRouter::new(None, logs());
        hostsrouter.add("forms.example.com", hostrouter);

        let threadpool = Arc::new(Pool::with_thread_config(
            2, scoped_thread_pool::ThreadConfig::new().prefix("test_worker")));
        let handler = server_handler("127.0.0.1:3000".into(),
                                     Arc::new(hostsrouter),
                                     &TESTPOOL, threadpool);

        // Host matching is case insensitive.
        let ok = handler(&Request::fake_http(
            "GET", "/forms/contact",
            vec![("Host".to_string(), "Forms.Example.Com".to_string())],
            vec![]));
        assert_eq!(ok.status_code, 200);

        // No router for this host and no fallback.
        let miss = handler(&Request::fake_http(
            "GET", "/forms/contact",
            vec![("Host".to_string(), "other.example.com".to_string())],
            vec![]));
        assert_eq!(miss.status_code, 404);
    }
}
