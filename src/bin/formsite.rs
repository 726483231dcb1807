use std::sync::Arc;
use std::thread;

use anyhow::{bail, Result};
use lazy_static::lazy_static;
use rouille::{Response, Server};

use ahtml::{att, AllocatorPool, Flat, HtmlAllocator, Node};
use formsite::acontext::AContext;
use formsite::apachelog::Logs;
use formsite::aresponse::AResponse;
use formsite::formdir::FormDir;
use formsite::formsubmit::SpoolSubmissionService;
use formsite::handler::{ExactFnHandler, FileHandler, Handler};
use formsite::hostrouter::{HostRouter, HostsRouter};
use formsite::http_request_method::HttpRequestMethodSimple;
use formsite::nav::{Nav, NavEntry};
use formsite::router::MultiRouter;
use formsite::util::{getenv, getenv_or, log_basedir, my_read_to_string};
use formsite::warn;
use formsite::webparts::{form_handler, server_handler, LayoutInterface};
use formsite::website_layout::WebsiteLayout;

// -----------------------------------------------------------------------------
// Main

static NAV: Nav<'static> = Nav(&[
    NavEntry { name: "Home", path: "/" },
    NavEntry { name: "Forms", path: "/forms" },
]);

lazy_static! {
    static ref ALLOCPOOL: AllocatorPool =
        AllocatorPool::new(1000000); // XX config
}

struct Tlskeys {
    crt: Vec<u8>,
    key: Vec<u8>,
}

fn main() -> Result<()> {
    let in_datadir = {
        let base = getenv_or("DATADIR", Some("data"))?;
        move |subpath: &str| -> String {
            format!("{base}/{subpath}")
        }
    };
    let hostname = getenv_or("HOSTNAME", Some("localhost"))?;
    let tlskeysfilebase = getenv("TLSKEYSFILEBASE")?;
    let is_dev = getenv("IS_DEV")?.is_some();

    let tlskeys = tlskeysfilebase.map(
        |base| -> Result<_> {
            Ok(Tlskeys {
                crt: my_read_to_string(format!("{base}.crt"))?.into_bytes(),
                key: my_read_to_string(format!("{base}.key"))?.into_bytes()
            })
        }).transpose()?;

    let style: Arc<dyn LayoutInterface> = Arc::new(WebsiteLayout {
        site_name: "Hungry Ram Web Design",
        copyright_start_year: 2019,
        copyright_owner: "Hungry Ram Web Design",
        nav: &NAV,
        header_contents: Box::new(
            |html: &HtmlAllocator| -> Result<Flat<Node>> {
                Ok(Flat::One(
                    html.a([att("href", "/"), att("class", "sitetitle")],
                           [html.staticstr("Hungry Ram")?])?))
            }),
    });

    let formdir = FormDir::open(in_datadir("forms"))?;
    let service = Arc::new(SpoolSubmissionService::open(
        in_datadir("submissions.log"))?);

    let mut router: MultiRouter<Arc<dyn Handler>> = MultiRouter::new();
    router
        .add("/", Arc::new(ExactFnHandler::new(
            |_context: &AContext, _method: HttpRequestMethodSimple,
             _html: &HtmlAllocator| -> Result<AResponse> {
                Ok(Response::redirect_302("/forms").into())
            })))
        .add("/forms", form_handler(formdir, service, style.clone()))
        .add("/static", Arc::new(FileHandler::new(in_datadir("static"))));
    let router = Arc::new(router);
    let fallbackhandler = Arc::new(FileHandler::new(in_datadir("fallback")));

    let logbasedir = log_basedir()?;
    eprintln!("Logging to dir {logbasedir:?}");

    let new_hostsrouter = |is_https| -> Result<_> {
        let main_hostrouter = Arc::new(HostRouter {
            router: Some(router.clone()),
            fallback: Some(fallbackhandler.clone()),
            logs: Logs::open_in_basedir(
                &format!("{logbasedir}/{hostname}"), is_https)?
        });
        let mut hostsrouter = HostsRouter::new(
            if is_dev {
                // In dev, requests under any hostname reach the site.
                Some(main_hostrouter.clone())
            } else {
                None
            },
            Logs::open_in_basedir(&logbasedir, is_https)?);
        hostsrouter.add(&hostname, main_hostrouter);
        Ok(Arc::new(hostsrouter))
    };

    macro_rules! run {
        { $server_result:expr } => {
            $server_result.expect("starting server").run();
        }
    }

    // The worker thread pool is kept separate and much smaller than
    // whatever tiny_http spawns for connections; the CPU intensive
    // part should finish quickly.
    let workerthreadpool_size = 8 * thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let workerthreadpool = {
        let cfg = scoped_thread_pool::ThreadConfig::new()
            .prefix("scoped_formsite_worker");
        Arc::new(scoped_thread_pool::Pool::with_thread_config(
            workerthreadpool_size, cfg))
    };
    let http_thread = thread::Builder::new().name("formsite_http".into()).spawn({
        let addr = std::env::var("LISTEN_HTTP").unwrap_or("127.0.0.1:3000".into());
        let hostsrouter = new_hostsrouter(false)?;
        let workerthreadpool = workerthreadpool.clone();
        move || {
            run!(Server::new(
                addr.clone(),
                server_handler(
                    addr,
                    hostsrouter,
                    &ALLOCPOOL,
                    workerthreadpool,
                )));
        }
    })?;

    let https_thread = thread::Builder::new().name("formsite_https".into()).spawn({
        let addr = std::env::var("LISTEN_HTTPS").unwrap_or("127.0.0.1:3001".into());
        let hostsrouter = new_hostsrouter(true)?;
        let workerthreadpool = workerthreadpool.clone();
        move || {
            if let Some(tlskeys) = tlskeys {
                run!(Server::new_ssl(
                    addr.clone(),
                    server_handler(
                        addr,
                        hostsrouter,
                        &ALLOCPOOL,
                        workerthreadpool,
                    ),
                    tlskeys.crt,
                    tlskeys.key));
            } else {
                if is_dev {
                    // run fake service
                    run!(Server::new(
                        addr.clone(),
                        server_handler(
                            addr,
                            hostsrouter,
                            &ALLOCPOOL,
                            workerthreadpool,
                        )));
                } else {
                    warn!("don't have keys, thus not running the HTTPS service!");
                }
            }
        }
    })?;

    http_thread.join().expect("http thread should not panic");
    https_thread.join().expect("https thread should not panic");
    bail!("Server stopped.");
}
