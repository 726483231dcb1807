use anyhow::{Error, Result};
use lazy_static::lazy_static;
use rouille::input::post::raw_urlencoded_post_input;
use rouille::router;
use rouille::start_server;
use rouille::Request;
use rouille::Response;
use ahtml::{AllocatorPool, HtmlAllocator};
use formsite::formrender::FormRenderer;
use formsite::formschema::FormSchema;
use formsite::formsubmit::{FormData, FormSubmissionService, SubmissionError};
use formsite::http_response_status_codes::HttpResponseStatusCode;
use formsite::webutils::{errorpage_from_error, errorpage_from_status, htmlresponse};

/// A single form served on `/`, submissions printed to stdout. For
/// playing with the renderer without a form directory or a spool.
const DEMO_SCHEMA: &str = r#"{
    "subject": "Demo form submission",
    "sendTo": "demo@example.com",
    "buttonLabel": "Send it",
    "formDisclaimer": "Submissions end up on *stdout*, nowhere else.",
    "fields": [
        {"name": "full_name", "label": "Full Name", "type": "text",
         "required": true},
        {"name": "email", "label": "Email", "type": "email",
         "required": true},
        {"name": "color", "label": "Favorite color", "type": "radio",
         "radioValue": ["Red", "Green", "Blue"], "stacked": true},
        {"name": "message", "label": "Message", "type": "textarea"}
    ]
}"#;

lazy_static! {
    static ref ALLOCPOOL: AllocatorPool =
        AllocatorPool::new(1000000); // XX config
    static ref SCHEMA: FormSchema =
        FormSchema::from_json_str(DEMO_SCHEMA).expect("demo schema is valid");
}

struct StdoutService;

impl FormSubmissionService for StdoutService {
    fn submit(
        &self,
        data: &FormData,
        spreadsheet_id: Option<&str>,
        sheet_name: Option<&str>,
    ) -> Result<(), SubmissionError> {
        if data.honeypot_triggered() {
            println!("dropping a submission, the honeypot field was filled in");
            return Ok(());
        }
        println!("submission (spreadsheet {spreadsheet_id:?}, sheet {sheet_name:?}):");
        for (key, value) in data.pairs() {
            println!("    {key:?}: {value:?}");
        }
        Ok(())
    }
}

fn form_page(alloc: &HtmlAllocator, renderer: &FormRenderer) -> Result<Response> {
    htmlresponse(alloc, HttpResponseStatusCode::OK200, |h| {
        h.html(
            [],
            [
                h.head([], [
                    h.title([], [
                        h.staticstr("Demo form")?,
                    ])?,
                ])?,
                h.body(
                    [],
                    [
                        h.h1([], [h.staticstr("Demo form")?])?,
                        renderer.render(h, "/")?,
                    ])?,
            ])
    })
}

fn submitted(alloc: &HtmlAllocator, request: &Request) -> Result<Response> {
    let data = FormData::from_pairs(raw_urlencoded_post_input(request)?);
    let renderer = FormRenderer::new(&SCHEMA);
    renderer.submit(&data, &StdoutService);
    form_page(alloc, &renderer)
}

fn main() -> Result<()> {
    start_server(
        "127.0.0.1:3000",
        move |request: &Request| {
            let clientaddr = request.remote_addr();
            let method = request.method();
            let url = request.url();
            println!("{clientaddr:?}: {method} {url}");
            router!(
                request,
                (GET) (/) => {
                    let mut guard = ALLOCPOOL.get();
                    form_page(guard.allocator(), &FormRenderer::new(&SCHEMA))
                        .or_else(
                            |e| Ok::<Response, Error>(errorpage_from_error(e)))
                        .expect("always OK")
                },
                (POST) (/) => {
                    let mut guard = ALLOCPOOL.get();
                    submitted(guard.allocator(), request).or_else(
                        |e| Ok::<Response, Error>(errorpage_from_error(e)))
                        .expect("always OK")
                },
                _ => {
                    errorpage_from_status(HttpResponseStatusCode::NotFound404)
                }
            )
        });
}
