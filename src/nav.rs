use anyhow::Result;

use ahtml::{HtmlAllocator, AId, Node, TryCollectBody, att};

use crate::acontext::AContext;

pub trait ToHtml {
    fn to_html(&self, html: &HtmlAllocator, context: &AContext) -> Result<AId<Node>>;
}


pub struct NavEntry {
    pub name: &'static str,
    pub path: &'static str,
}

impl ToHtml for NavEntry {
    fn to_html(&self, html: &HtmlAllocator, context: &AContext) -> Result<AId<Node>> {
        let name = html.staticstr(self.name)?;
        html.li(
            [],
            [
                // The entry for the page being shown is not a link.
                if context.path().same_document_as_path_str(self.path) {
                    name
                } else {
                    html.a(
                        [att("href", self.path)],
                        [name])?
                }
            ])
    }
}

pub struct Nav<'t>(pub &'t [NavEntry]);

impl<'t> ToHtml for Nav<'t> {
    fn to_html(&self, html: &HtmlAllocator, context: &AContext) -> Result<AId<Node>> {
        Ok(html.ul(
            [att("class", "nav")],
            self.0.iter().map(|naventry| naventry.to_html(html, context))
                .try_collect_body(html)?)?)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rouille::Request;

    const NAV: &[NavEntry] = &[
        NavEntry { name: "Home", path: "/" },
        NavEntry { name: "Forms", path: "/forms/" },
    ];

    fn rendered(path: &str) -> String {
        let html = HtmlAllocator::new(10000);
        let request = Request::fake_http("GET", path, vec![], vec![]);
        let context = AContext::new(&request, "127.0.0.1:3000").unwrap();
        let id = Nav(NAV).to_html(&html, &context).unwrap();
        html.to_html_string(id, false)
    }

    #[test]
    fn t_current_page_is_unlinked() {
        assert_eq!(rendered("/forms/"),
                   "<ul class=\"nav\"><li><a href=\"/\">Home</a></li>\
                    <li>Forms</li></ul>");
    }

    #[test]
    fn t_other_pages_are_links() {
        assert_eq!(rendered("/"),
                   "<ul class=\"nav\"><li>Home</li>\
                    <li><a href=\"/forms/\">Forms</a></li></ul>");
    }
}
