use anyhow::Result;
use chrono::Utc;

use ahtml::{HtmlAllocator, AId, Node, Flat, ToASlice, att};

use crate::{webparts::LayoutInterface,
            acontext::AContext,
            nav::{Nav, ToHtml},
            time_util::LocalYear};

fn year_range(from: i32, to: i32) -> String {
    if from == to {
        from.to_string()
    } else {
        format!("{}–{}", from, to)
    }
}

pub struct WebsiteLayout {
    pub site_name: &'static str,
    pub copyright_start_year: i32,
    pub copyright_owner: &'static str,
    pub nav: &'static Nav<'static>,
    pub header_contents: Box<dyn Fn(&HtmlAllocator) -> Result<Flat<Node>> + Send + Sync>,
}

impl LayoutInterface for WebsiteLayout {
    fn page(
        &self,
        context: &AContext,
        html: &HtmlAllocator,
        head_title: Option<AId<Node>>,
        title: Option<AId<Node>>,
        main: AId<Node>,
    ) -> Result<AId<Node>>
    {
        html.html(
            [],
            [
                html.head(
                    [],
                    [
                        html.link(
                            [att("rel", "stylesheet"),
                             att("href", "/static/main.css")],
                            [])?,
                        html.title(
                            [],
                            if let Some(head_title) = head_title {
                                let head_title_string =
                                    html.to_plain_string(head_title)?;
                                Flat::Two(
                                    html.to_plain_string_aid(head_title)?,
                                    // Do not show the title if it's
                                    // also the site name
                                    if head_title_string.as_str() == self.site_name {
                                        html.empty_node()?
                                    } else {
                                        html.string(format!(" | {}",
                                                            self.site_name))?
                                    }
                                )
                            } else {
                                Flat::One(
                                    html.staticstr(self.site_name)?
                                )
                            })?,
                    ])?,
                html.body(
                    [],
                    [
                        html.div(
                            [att("class", "wrapper")],
                            [
                                // Header
                                html.div(
                                    [att("class", "header")],
                                    (self.header_contents)(html)?.to_aslice(html)?)?,
                                // Nav
                                html.div(
                                    [att("class", "navigation")],
                                    [
                                        self.nav.to_html(html, context)?,
                                    ])?,
                                // Document
                                if let Some(title) = title {
                                    html.h1(
                                        [],
                                        [title])?
                                } else {
                                    html.empty_node()?
                                },
                                html.div(
                                    [att("class", "page-content")],
                                    [main])?,
                                // Footer
                                html.div(
                                    [att("class", "footer")],
                                    [
                                        html.div(
                                            [att("class", "copyright")],
                                            [html.string(
                                                format!("Copyright © {} {}",
                                                        year_range(
                                                            self.copyright_start_year,
                                                            context.now().local_year(Utc)),
                                                        self.copyright_owner))?])?,
                                    ])?,
                            ])?,
                    ])?
            ])
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::NavEntry;
    use rouille::Request;

    #[test]
    fn t_year_range() {
        assert_eq!(year_range(2024, 2024), "2024");
        assert_eq!(year_range(2023, 2026), "2023–2026");
    }

    static NAV: Nav<'static> = Nav(&[
        NavEntry { name: "Home", path: "/" },
    ]);

    fn layout() -> WebsiteLayout {
        WebsiteLayout {
            site_name: "Test Site",
            copyright_start_year: 2024,
            copyright_owner: "Test Owner",
            nav: &NAV,
            header_contents: Box::new(|html| Ok(Flat::One(html.staticstr("hdr")?))),
        }
    }

    fn page_string(head_title: &'static str) -> String {
        let html = HtmlAllocator::new(100000);
        let request = Request::fake_http("GET", "/x", vec![], vec![]);
        let context = AContext::new(&request, "127.0.0.1:3000").unwrap();
        let main = html.p([], [html.str("body text").unwrap()]).unwrap();
        let page = layout().page(&context, &html,
                                 Some(html.str(head_title).unwrap()),
                                 Some(html.str(head_title).unwrap()),
                                 main).unwrap();
        html.to_html_string(page, false)
    }

    #[test]
    fn t_title_gets_site_name_suffix() {
        let s = page_string("Contact");
        assert!(s.contains("<title>Contact | Test Site</title>"), "got: {s}");
        assert!(s.contains("<h1>Contact</h1>"), "got: {s}");
    }

    #[test]
    fn t_site_name_not_repeated() {
        let s = page_string("Test Site");
        assert!(s.contains("<title>Test Site</title>"), "got: {s}");
    }
}
