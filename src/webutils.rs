use std::borrow::Cow;
use std::fmt::Write;

use anyhow::{Result, Error};
use rouille::{Response, ResponseBody};

use ahtml::{Node, AId, HtmlAllocator};

use crate::http_response_status_codes::HttpResponseStatusCode;


/// Hex string over 6 random bytes, used to tag error messages so
/// that a report from a user can be correlated with the stderr log.
pub fn randomidstring() -> Result<String, getrandom::Error> {
    let mut bytes = [0u8; 6];
    getrandom::getrandom(&mut bytes)?;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(&mut s, "{b:02X}").unwrap();
    }
    Ok(s)
}

// If thunk returns an Err, put a short placeholder carrying an error
// id into the document instead, and print the full error to stderr
// where the id can be grepped for.
pub fn error_boundary<F>(html: &HtmlAllocator, thunk: F) -> AId<Node>
where F: FnOnce() -> Result<AId<Node>>
{
    match thunk() {
        Ok(v) => v,
        Err(e) => {
            let errid = randomidstring().unwrap();
            eprintln!("formsite: Error {}: {}", errid, e);
            // Don't actually know if p will be OK!!!
            (|| html.p([],
                       [html.string(format!("An Error happened here (error id {})",
                                            errid))?]))()
                .unwrap() // UH
        }
    }
}


pub fn errorpage_from_status(status: HttpResponseStatusCode) -> Response {
    // XX configure response looks and contents.
    let title = status.title();
    let explanation = status.desc();
    // title and desc are static strings from our own table, no
    // escaping needed.
    let resp = format!("<html><head><title>{title}</title></head><body><h1>{title}</h1>\
                        <p>{explanation}</p></body></html>\n");
    Response {
        status_code: status.code(),
        headers: vec![(Cow::from("Content-type"), Cow::from("text/html"))],
        data: ResponseBody::from_string(resp),
        upgrade: None,
    }
}

pub fn errorpage_from_error(err: Error) -> Response {
    // XX: make status possibly dependent on err instead!
    let status = HttpResponseStatusCode::InternalServerError500;
    eprintln!("ERROR in page (return {status:?}): {err:#}");
    errorpage_from_status(status)
}

pub fn htmlresponse(
    html: &HtmlAllocator,
    status: HttpResponseStatusCode,
    produce: impl for<'a> FnOnce(&HtmlAllocator) -> Result<AId<Node>>
) -> Result<Response>
{
    Ok(Response {
        status_code: status.code(),
        headers: vec![(Cow::from("Content-type"),
                       Cow::from("text/html; charset=utf-8"))],
        data: ResponseBody::from_string(html.to_html_string(produce(html)?, true)),
        upgrade: None,
    })
}
