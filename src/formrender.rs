//! Rendering of a `FormSchema` as an HTML form, and the submit
//! lifecycle of one rendered instance.

use std::cell::Cell;

use ahtml::{att, AId, AVec, HtmlAllocator, Node};
use anyhow::Result;
use kstring::KString;

use crate::formschema::{option_dom_id, FieldControl, FormField, FormSchema};
use crate::formsubmit::{FormData, FormSubmissionService, HONEYPOT_FIELD};
use crate::markdown::markdown_to_html;
use crate::warn;
use crate::webparts::{buttonrow, pair};
use crate::webutils::error_boundary;

/// Where a rendered form instance stands with regard to submission.
/// `Sent` and `Error` are terminal for the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    Idle,
    Sending,
    Sent,
    Error,
}

/// One rendered instance of a form. Holds the only copy of the
/// submit status; rendering reflects it, `submit` advances it.
pub struct FormRenderer<'s> {
    schema: &'s FormSchema,
    status: Cell<SubmitStatus>,
}

fn flag(name: &'static str, on: bool) -> Option<(KString, KString)> {
    if on { att(name, "") } else { None }
}

fn input_control(html: &HtmlAllocator, input_type: &'static str, dom_id: &str,
                 field: &FormField) -> Result<AId<Node>> {
    html.input([att("type", input_type),
                att("name", field.wire_key()),
                att("id", dom_id),
                flag("required", field.required)],
               [])
}

fn option_group(html: &HtmlAllocator, kind: &'static str, options: &[KString],
                field: &FormField) -> Result<AId<Node>> {
    let class = if field.stacked { "options_stacked" } else { "options_inline" };
    let mut body = html.new_vec();
    for (j, option_text) in options.iter().enumerate() {
        let oid = option_dom_id(option_text, j);
        body.push(html.div(
            [],
            [html.input([att("type", kind),
                         att("name", field.wire_key()),
                         att("id", &oid),
                         flag("required", field.required),
                         att("value", option_text)],
                        [])?,
             // The option text doubles as its label, after the input.
             html.label([att("for", &oid)], [html.str(option_text)?])?])?)?;
    }
    html.div([att("class", class)], body)
}

fn control(html: &HtmlAllocator, dom_id: &str, field: &FormField)
           -> Result<AId<Node>> {
    match &field.control {
        FieldControl::Text => input_control(html, "text", dom_id, field),
        FieldControl::File => input_control(html, "file", dom_id, field),
        FieldControl::Email => input_control(html, "email", dom_id, field),
        FieldControl::Phone => input_control(html, "tel", dom_id, field),
        FieldControl::Radio(options) =>
            option_group(html, "radio", options, field),
        FieldControl::Checkbox(options) =>
            option_group(html, "checkbox", options, field),
        FieldControl::Select(options) => {
            let mut body = html.new_vec();
            for option_text in options {
                body.push(html.option([att("value", option_text)],
                                      [html.str(option_text)?])?)?;
            }
            Ok(html.div([], [html.select([att("id", dom_id),
                                          att("name", field.wire_key()),
                                          flag("required", field.required)],
                                         body)?])?)
        }
        FieldControl::Textarea =>
            html.textarea([att("rows", "3"),
                           att("name", field.wire_key()),
                           att("id", dom_id),
                           flag("required", field.required)],
                          []),
    }
}

fn field_row(html: &HtmlAllocator, index: usize, field: &FormField)
             -> Result<AId<Node>> {
    let row = pair(html);
    let dom_id = field.dom_id(index);
    let marker = if field.required {
        html.span([att("class", "required")], [html.str("*")?])?
    } else {
        html.empty_node()?
    };
    // The `for` always points at the field id, also for option
    // groups whose inputs carry per-option ids.
    let label = html.label([att("for", &dom_id)],
                           [html.str(&field.label)?, marker])?;
    row(label, control(html, &dom_id, field)?)
}

impl<'s> FormRenderer<'s> {
    pub fn new(schema: &'s FormSchema) -> FormRenderer<'s> {
        FormRenderer {
            schema,
            status: Cell::new(SubmitStatus::Idle),
        }
    }

    pub fn schema(&self) -> &FormSchema {
        self.schema
    }

    pub fn status(&self) -> SubmitStatus {
        self.status.get()
    }

    /// The form element for the current status, posting back to
    /// `action`.
    pub fn render(&self, html: &HtmlAllocator, action: &str) -> Result<AId<Node>> {
        let mut body = html.new_vec();
        self.hidden_fields(html, &mut body)?;
        for (i, field) in self.schema.fields.iter().enumerate() {
            body.push(field_row(html, i, field)?)?;
        }
        if let Some(source) = &self.schema.form_disclaimer {
            // A broken disclaimer must not take the whole form down.
            body.push(html.div([att("class", "disclaimer")],
                               [error_boundary(html, || markdown_to_html(
                                   source, html))])?)?;
        }
        body.push(self.button_row(html)?)?;
        html.form([att("action", action), att("method", "POST")], body)
    }

    /// The honeypot pair, then the delivery metadata the submission
    /// backend reads back out of the posted data.
    fn hidden_fields<'a>(&self, html: &'a HtmlAllocator, body: &mut AVec<'a, Node>)
                         -> Result<()> {
        body.push(html.label([att("class", "hidden"),
                              att("for", HONEYPOT_FIELD)], [])?)?;
        body.push(html.input([att("class", "hidden"),
                              att("type", "text"),
                              att("name", HONEYPOT_FIELD)], [])?)?;
        let mut hidden = |name: &'static str, value: &str| -> Result<()> {
            body.push(html.input([att("type", "hidden"),
                                  att("name", name),
                                  att("value", value)], [])?)?;
            Ok(())
        };
        hidden("bcc", &self.schema.email_bcc)?;
        hidden("cc", &self.schema.email_cc)?;
        hidden("sendFrom", self.schema.send_from_or_default())?;
        hidden("sendTo", &self.schema.send_to)?;
        hidden("subject", &self.schema.subject)?;
        hidden("redirectTo", self.schema.redirect_to.as_deref().unwrap_or(""))?;
        Ok(())
    }

    fn button_row(&self, html: &HtmlAllocator) -> Result<AId<Node>> {
        // The background stays transparent even when a background
        // color is configured; only the text color is taken up.
        let style = match &self.schema.button_text_color {
            Some(color) => format!(
                "background-color: transparent; color: {}; border: 1px solid #BF8D5B",
                color.as_str()),
            None =>
                "background-color: transparent; border: 1px solid #BF8D5B".into(),
        };
        let label = match self.status.get() {
            SubmitStatus::Idle => html.str(
                self.schema.button_label.as_deref().unwrap_or("SUBMIT"))?,
            SubmitStatus::Sending => html.span([att("class", "spinner")],
                                               [html.str("\u{27F3}")?])?,
            SubmitStatus::Sent => html.str("Sent")?,
            SubmitStatus::Error => html.str("Error")?,
        };
        let row = buttonrow(html);
        row([html.button([att("type", "submit"), att("style", style)],
                         [label])?])
    }

    /// Hand the posted data to `service`, advancing the status:
    /// `Sending` while the call runs, then `Sent` or `Error`. A
    /// submit arriving while one is already running is ignored.
    /// Delivery failures are logged here and collapse to the status,
    /// they do not escape.
    pub fn submit(&self, data: &FormData, service: &dyn FormSubmissionService)
                  -> SubmitStatus {
        if self.status.get() == SubmitStatus::Sending {
            return SubmitStatus::Sending;
        }
        self.status.set(SubmitStatus::Sending);
        match service.submit(data,
                             self.schema.spreadsheet_id.as_deref(),
                             self.schema.sheet_name.as_deref()) {
            Ok(()) => self.status.set(SubmitStatus::Sent),
            Err(e) => {
                warn!("submitting form {:?}: {e}", self.schema.subject);
                self.status.set(SubmitStatus::Error);
            }
        }
        self.status.get()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use anyhow::anyhow;
    use crate::formsubmit::SubmissionError;

    struct TestService<F>(F);

    impl<F> FormSubmissionService for TestService<F>
    where F: Fn(&FormData, Option<&str>, Option<&str>) -> Result<(), SubmissionError>
    {
        fn submit(&self, data: &FormData, spreadsheet_id: Option<&str>,
                  sheet_name: Option<&str>) -> Result<(), SubmissionError> {
            (self.0)(data, spreadsheet_id, sheet_name)
        }
    }

    fn svc<F>(f: F) -> TestService<F>
    where F: Fn(&FormData, Option<&str>, Option<&str>) -> Result<(), SubmissionError>
    {
        TestService(f)
    }

    fn schema(json: &str) -> FormSchema {
        FormSchema::from_json_str(json).unwrap()
    }

    fn render_to_string(renderer: &FormRenderer) -> String {
        let html = HtmlAllocator::new(10000);
        let id = renderer.render(&html, "/forms/contact").unwrap();
        html.to_html_string(id, false)
    }

    fn no_data() -> FormData {
        FormData::from_pairs(vec![])
    }

    #[test]
    fn t_text_fields() {
        let s = schema(r#"{
            "subject": "Contact",
            "sendTo": "owner@example.com",
            "fields": [
                {"label": "Full Name", "type": "text", "required": true},
                {"label": "Email", "type": "email", "required": true},
                {"label": "Phone Number", "type": "phone"},
                {"label": "Message", "type": "textarea"}
            ]
        }"#);
        let out = render_to_string(&FormRenderer::new(&s));
        assert!(out.starts_with("<form action=\"/forms/contact\" method=\"POST\">"),
                "{out}");
        assert!(out.contains(
            "<input type=\"text\" name=\"Full Name\" id=\"FullName0\" required=\"\">"));
        assert!(out.contains(
            "<input type=\"email\" name=\"Email\" id=\"Email1\" required=\"\">"));
        assert!(out.contains(
            "<input type=\"tel\" name=\"Phone Number\" id=\"PhoneNumber2\">"));
        assert!(out.contains(
            "<textarea rows=\"3\" name=\"Message\" id=\"Message3\"></textarea>"));
        assert!(out.contains(
            "<label for=\"FullName0\">Full Name<span class=\"required\">*</span></label>"));
        assert!(out.contains("<label for=\"Message3\">Message</label>"));
    }

    #[test]
    fn t_hidden_field_order() {
        let s = schema(r#"{
            "subject": "Quote",
            "sendTo": "owner@example.com",
            "emailCc": "cc@example.com",
            "emailBcc": "bcc@example.com",
            "redirectTo": "/thanks"
        }"#);
        let out = render_to_string(&FormRenderer::new(&s));
        let pos = |needle: &str| out.find(needle).unwrap_or_else(
            || panic!("missing {needle:?} in {out}"));
        let honey_label = pos("<label class=\"hidden\" for=\"name-honey\"></label>");
        let honey_input = pos("<input class=\"hidden\" type=\"text\" name=\"name-honey\">");
        let bcc = pos("<input type=\"hidden\" name=\"bcc\" value=\"bcc@example.com\">");
        let cc = pos("<input type=\"hidden\" name=\"cc\" value=\"cc@example.com\">");
        let send_from = pos(
            "<input type=\"hidden\" name=\"sendFrom\" value=\"forms@hungryramwebdesign.com\">");
        let send_to = pos("<input type=\"hidden\" name=\"sendTo\" value=\"owner@example.com\">");
        let subject = pos("<input type=\"hidden\" name=\"subject\" value=\"Quote\">");
        let redirect = pos("<input type=\"hidden\" name=\"redirectTo\" value=\"/thanks\">");
        assert!(honey_label < honey_input);
        assert!(honey_input < bcc);
        assert!(bcc < cc && cc < send_from && send_from < send_to
                && send_to < subject && subject < redirect);
    }

    #[test]
    fn t_send_from_configured() {
        let s = schema(r#"{"sendFrom": "sales@example.com"}"#);
        let out = render_to_string(&FormRenderer::new(&s));
        assert!(out.contains(
            "<input type=\"hidden\" name=\"sendFrom\" value=\"sales@example.com\">"));
        assert!(!out.contains("forms@hungryramwebdesign.com"));
    }

    #[test]
    fn t_radio_group() {
        let s = schema(r#"{"fields": [
            {"label": "Color", "type": "radio",
             "radioValue": ["Red", "Blue"], "required": true}
        ]}"#);
        let out = render_to_string(&FormRenderer::new(&s));
        assert!(out.contains(
            "<input type=\"radio\" name=\"Color\" id=\"Red0\" required=\"\" value=\"Red\">"));
        assert!(out.contains(
            "<input type=\"radio\" name=\"Color\" id=\"Blue1\" required=\"\" value=\"Blue\">"));
        assert_eq!(out.matches("type=\"radio\"").count(), 2);
        // The option label follows its input.
        assert!(out.find("id=\"Red0\"").unwrap()
                < out.find("<label for=\"Red0\">Red</label>").unwrap());
        // The field label points at the field id, not at an option.
        assert!(out.contains(
            "<label for=\"Color0\">Color<span class=\"required\">*</span></label>"));
    }

    #[test]
    fn t_option_ids_stay_unique() {
        let s = schema(r#"{"fields": [
            {"label": "Choice", "type": "radio",
             "radioValue": ["Yes", "Yes", "???"]}
        ]}"#);
        let out = render_to_string(&FormRenderer::new(&s));
        assert!(out.contains("id=\"Yes0\""));
        assert!(out.contains("id=\"Yes1\""));
        assert!(out.contains("id=\"2\""));
    }

    #[test]
    fn t_checkbox_layout() {
        let stacked = schema(r#"{"fields": [
            {"label": "Toppings", "type": "checkbox",
             "checkBoxValue": ["Cheese"], "stacked": true}
        ]}"#);
        assert!(render_to_string(&FormRenderer::new(&stacked))
                .contains("<div class=\"options_stacked\">"));

        let inline = schema(r#"{"fields": [
            {"label": "Toppings", "type": "checkbox",
             "checkBoxValue": ["Cheese", "Olives"]}
        ]}"#);
        let out = render_to_string(&FormRenderer::new(&inline));
        assert!(out.contains("<div class=\"options_inline\">"));
        assert_eq!(out.matches("type=\"checkbox\"").count(), 2);
        assert_eq!(out.matches("name=\"Toppings\"").count(), 2);
    }

    #[test]
    fn t_select() {
        let s = schema(r#"{"fields": [
            {"label": "Topic", "type": "select",
             "selectValue": ["Sales", "Support"], "required": true}
        ]}"#);
        let out = render_to_string(&FormRenderer::new(&s));
        assert!(out.contains("<select id=\"Topic0\" name=\"Topic\" required=\"\">"));
        assert!(out.contains(
            "<option value=\"Sales\">Sales</option><option value=\"Support\">Support</option>"));
    }

    #[test]
    fn t_disclaimer_between_fields_and_button() {
        let s = schema(r#"{
            "fields": [{"label": "Email", "type": "email"}],
            "formDisclaimer": "We **never** share your address."
        }"#);
        let out = render_to_string(&FormRenderer::new(&s));
        assert!(out.contains("We <strong>never</strong> share your address."));
        let field = out.find("name=\"Email\"").unwrap();
        let disclaimer = out.find("<div class=\"disclaimer\">").unwrap();
        let button = out.find("<div class=\"buttonrow\">").unwrap();
        assert!(field < disclaimer && disclaimer < button);
    }

    #[test]
    fn t_button_style_and_label() {
        let s = schema("{}");
        let out = render_to_string(&FormRenderer::new(&s));
        assert!(out.contains(
            "<button type=\"submit\" style=\"background-color: transparent; \
             border: 1px solid #BF8D5B\">SUBMIT</button>"));

        let s2 = schema(r##"{
            "buttonLabel": "Request a quote",
            "buttonTextColor": {"hex": "#102030"},
            "buttonBackgroundColor": "#ff0000"
        }"##);
        let out2 = render_to_string(&FormRenderer::new(&s2));
        assert!(out2.contains(
            "<button type=\"submit\" style=\"background-color: transparent; \
             color: #102030; border: 1px solid #BF8D5B\">Request a quote</button>"));
    }

    #[test]
    fn t_submit_success_lifecycle() {
        let s = schema(r#"{"spreadsheetId": "sheet-1", "sheetName": "Leads"}"#);
        let renderer = FormRenderer::new(&s);
        assert_eq!(renderer.status(), SubmitStatus::Idle);

        let calls = Cell::new(0);
        let observed = Cell::new(None);
        let hints = Cell::new(None);
        let service = svc(|_, spreadsheet_id, sheet_name| {
            calls.set(calls.get() + 1);
            observed.set(Some(renderer.status()));
            hints.set(Some((spreadsheet_id.map(String::from),
                            sheet_name.map(String::from))));
            Ok(())
        });
        let st = renderer.submit(&no_data(), &service);
        assert_eq!(st, SubmitStatus::Sent);
        assert_eq!(renderer.status(), SubmitStatus::Sent);
        assert_eq!(calls.get(), 1);
        assert_eq!(observed.get(), Some(SubmitStatus::Sending));
        assert_eq!(hints.take(),
                   Some((Some("sheet-1".to_string()), Some("Leads".to_string()))));
        assert!(render_to_string(&renderer).contains(">Sent</button>"));
    }

    #[test]
    fn t_submit_failure_collapses_to_status() {
        let s = schema("{}");
        let renderer = FormRenderer::new(&s);
        let failing = svc(|_, _, _| Err(anyhow!("service down").into()));
        let st = renderer.submit(&no_data(), &failing);
        assert_eq!(st, SubmitStatus::Error);
        assert_eq!(renderer.status(), SubmitStatus::Error);
        assert!(render_to_string(&renderer).contains(">Error</button>"));
    }

    #[test]
    fn t_submit_while_sending_is_ignored() {
        let s = schema("{}");
        let renderer = FormRenderer::new(&s);
        let inner_calls = Cell::new(0);
        let inner = svc(|_, _, _| {
            inner_calls.set(inner_calls.get() + 1);
            Ok(())
        });
        let reentrant = Cell::new(None);
        let outer = svc(|data, _, _| {
            reentrant.set(Some(renderer.submit(data, &inner)));
            Ok(())
        });
        let st = renderer.submit(&no_data(), &outer);
        assert_eq!(st, SubmitStatus::Sent);
        assert_eq!(reentrant.get(), Some(SubmitStatus::Sending));
        assert_eq!(inner_calls.get(), 0);
    }

    #[test]
    fn t_sending_renders_spinner() {
        let s = schema("{}");
        let renderer = FormRenderer::new(&s);
        let sending_html = RefCell::new(String::new());
        let service = svc(|_, _, _| {
            let html = HtmlAllocator::new(10000);
            let id = renderer.render(&html, "/forms/contact").unwrap();
            *sending_html.borrow_mut() = html.to_html_string(id, false);
            Ok(())
        });
        renderer.submit(&no_data(), &service);
        assert!(sending_html.borrow().contains("<span class=\"spinner\">"));
    }
}
