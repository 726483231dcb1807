//! Html dom abstraction, with runtime typing.

pub mod myfrom;
pub mod stillvec;
pub mod allocator;
pub mod flat;

use std::{cell::RefMut, io::Write};

use anyhow::Result;
use kstring::KString;

pub use allocator::{AId, ASlice, AVec, AllocatorPool, AllocatorType, Element,
                    ElementMeta, HtmlAllocator, Node, ToASlice};
pub use flat::Flat;

use crate::myfrom::MyFrom;

pub const NBSP: &str = "\u{00A0}";

// https://www.w3.org/International/questions/qa-byte-order-mark#problems
const BOM: &str = "\u{FEFF}";

const DOCTYPE: &str = "<!DOCTYPE html>\n";

pub trait Print {
    /// Print serialized HTML.
    fn print_html_fragment(&self, out: &mut impl Write, allocator: &HtmlAllocator)
                           -> Result<()>;

    /// Print the contained text, *ignoring* all markup.
    fn print_plain(&self, out: &mut String, allocator: &HtmlAllocator)
                   -> Result<()>;

    fn to_html_fragment_string(&self, allocator: &HtmlAllocator) -> Result<String> {
        let mut s = Vec::new();
        self.print_html_fragment(&mut s, allocator)?;
        // Safe: the serializer only concatenates UTF-8 string data
        // and ASCII literals.
        Ok(unsafe { String::from_utf8_unchecked(s) })
    }

    fn to_plain_string(&self, allocator: &HtmlAllocator) -> Result<String> {
        let mut s = String::new();
        self.print_plain(&mut s, allocator)?;
        Ok(s)
    }
}

impl Print for AId<Node> {
    fn print_html_fragment(&self, out: &mut impl Write, allocator: &HtmlAllocator)
                           -> Result<()> {
        let node = allocator.get_node(*self).expect("node ids always resolve");
        node.print_html_fragment(out, allocator)
    }

    fn print_plain(&self, out: &mut String, allocator: &HtmlAllocator)
                   -> Result<()> {
        let node = allocator.get_node(*self).expect("node ids always resolve");
        node.print_plain(out, allocator)
    }
}

fn ks<T>(s: T) -> KString
where KString: MyFrom<T>
{
    KString::myfrom(s)
}

pub fn att<T, U>(key: T, val: U) -> Option<(KString, KString)>
where KString: MyFrom<T> + MyFrom<U>
{
    Some((ks(key), ks(val)))
}

pub fn opt_att<T, U>(key: T, val: Option<U>) -> Option<(KString, KString)>
where KString: MyFrom<T> + MyFrom<U>
{
    val.map(|val| (ks(key), ks(val)))
}

impl<T> ToASlice<T> for ASlice<T> {
    fn to_aslice(self, _allocator: &HtmlAllocator) -> Result<ASlice<T>> {
        Ok(self)
    }
}

impl<T> ToASlice<T> for &ASlice<T> {
    fn to_aslice(self, _allocator: &HtmlAllocator) -> Result<ASlice<T>> {
        Ok(*self)
    }
}

impl<'a, T: AllocatorType> ToASlice<T> for AVec<'a, T> {
    fn to_aslice(self, _allocator: &HtmlAllocator) -> Result<ASlice<T>> {
        Ok(self.as_slice())
    }
}

impl ToASlice<Node> for AId<Node> {
    fn to_aslice(self, html: &HtmlAllocator) -> Result<ASlice<Node>> {
        let mut vec = html.new_vec();
        vec.push(self)?;
        Ok(vec.as_slice())
    }
}

// Arrays of `att`/`opt_att` results; `None` entries are skipped, which
// is what makes `opt_att` work.
impl<const N: usize> ToASlice<(KString, KString)> for [Option<(KString, KString)>; N] {
    fn to_aslice(self, allocator: &HtmlAllocator) -> Result<ASlice<(KString, KString)>> {
        let mut vec = allocator.new_vec();
        for opt_val in self {
            if let Some(val) = opt_val {
                let id = allocator.new_attribute(val)?;
                vec.push(id)?;
            }
        }
        Ok(vec.as_slice())
    }
}

impl<const N: usize> ToASlice<Node> for [AId<Node>; N] {
    fn to_aslice(self, allocator: &HtmlAllocator) -> Result<ASlice<Node>> {
        let mut vec = allocator.new_vec();
        for val in self {
            vec.push(val)?;
        }
        Ok(vec.as_slice())
    }
}

impl HtmlAllocator {
    /// `bytes` must be proper UTF-8. The returned buffer reference
    /// must be dropped before the next `html_escape` call, or there
    /// will be a panic.
    pub fn html_escape(&self, bytes: &[u8]) -> RefMut<Vec<u8>> {
        let mut bufref = self.html_escape_tmp.borrow_mut();
        let buf = &mut *bufref;
        buf.clear();
        for b in bytes {
            match b {
                b'&' => buf.extend_from_slice(b"&amp;"),
                b'<' => buf.extend_from_slice(b"&lt;"),
                b'>' => buf.extend_from_slice(b"&gt;"),
                b'"' => buf.extend_from_slice(b"&quot;"),
                b'\'' => buf.extend_from_slice(b"&#39;"),
                _ => buf.push(*b),
            }
        }
        bufref
    }

    pub fn print_html_fragment(&self, id: AId<Node>, out: &mut impl Write) -> Result<()> {
        let node = self.get_node(id).expect(
            "invalid generation/allocator_id panics in id_to_bare, hence this \
             always resolves");
        node.print_html_fragment(out, self)
    }

    pub fn print_html_document(&self, id: AId<Node>, out: &mut impl Write) -> Result<()> {
        // The byte-order mark makes sure the output is also read
        // correctly from files (e.g. by Safari).
        out.write_all(BOM.as_bytes())?;
        out.write_all(DOCTYPE.as_bytes())?;
        self.print_html_fragment(id, out)
    }

    pub fn to_html_string(&self, id: AId<Node>, want_doctype: bool) -> String {
        let mut v = Vec::new();
        if want_doctype {
            self.print_html_document(id, &mut v)
        } else {
            self.print_html_fragment(id, &mut v)
        }.expect("no I/O errors on Vec");
        // Safe: only UTF-8 string data and ASCII literals were written.
        unsafe { String::from_utf8_unchecked(v) }
    }

    pub fn print_plain(&self, id: AId<Node>, out: &mut String) -> Result<()> {
        let node = self.get_node(id).expect(
            "invalid generation/allocator_id panics in id_to_bare, hence this \
             always resolves");
        node.print_plain(out, self)
    }

    /// If the result should be an `AId` again, use
    /// `to_plain_string_aid` instead, it optimizes the pre-existing
    /// string case.
    pub fn to_plain_string(&self, id: AId<Node>) -> Result<KString> {
        let mut v = String::new();
        self.print_plain(id, &mut v)?;
        Ok(KString::from_string(v))
    }

    /// Like `to_plain_string` but returns a string node, re-using
    /// `id` if it already is one.
    pub fn to_plain_string_aid(&self, id: AId<Node>) -> Result<AId<Node>> {
        let node = self.get_node(id).expect(
            "invalid generation/allocator_id panics in id_to_bare, hence this \
             always resolves");
        match node {
            Node::Element(_) => {
                let mut v = String::new();
                self.print_plain(id, &mut v)?;
                self.string(v)
            }
            Node::String(_) => Ok(id),
            Node::None => Ok(id),
        }
    }
}

impl<T: AllocatorType> Print for ASlice<T> {
    fn print_html_fragment(&self, out: &mut impl Write, allocator: &HtmlAllocator)
                           -> Result<()> {
        for node in self.iter_node(allocator) {
            node.print_html_fragment(out, allocator)?;
        }
        Ok(())
    }

    fn print_plain(&self, out: &mut String, allocator: &HtmlAllocator)
                   -> Result<()> {
        for node in self.iter_node(allocator) {
            node.print_plain(out, allocator)?;
        }
        Ok(())
    }
}

impl Print for (KString, KString) {
    fn print_html_fragment(&self, out: &mut impl Write, allocator: &HtmlAllocator)
                           -> Result<()> {
        out.write_all(self.0.as_bytes())?;
        out.write_all(b"=\"")?;
        out.write_all(&allocator.html_escape(self.1.as_bytes()))?;
        out.write_all(b"\"")?;
        Ok(())
    }

    fn print_plain(&self, _out: &mut String, _allocator: &HtmlAllocator) -> Result<()> {
        panic!("attributes are never printed in print_plain for Node:s")
    }
}

impl Print for Node {
    fn print_html_fragment(&self, out: &mut impl Write, allocator: &HtmlAllocator)
                           -> Result<()> {
        Ok(match self {
            Node::Element(e) => e.print_html_fragment(out, allocator)?,
            Node::String(s) => out.write_all(&allocator.html_escape(s.as_bytes()))?,
            Node::None => (),
        })
    }

    fn print_plain(&self, out: &mut String, allocator: &HtmlAllocator) -> Result<()> {
        match self {
            Node::Element(e) => e.print_plain(out, allocator),
            Node::String(s) => Ok(out.push_str(s.as_str())),
            Node::None => Ok(()),
        }
    }
}

impl Print for Element {
    fn print_html_fragment(&self, out: &mut impl Write, allocator: &HtmlAllocator)
                           -> Result<()> {
        let meta = self.meta;
        out.write_all(b"<")?;
        out.write_all(meta.tag_name.as_bytes())?;
        for att in self.attr.iter_att(allocator) {
            out.write_all(b" ")?;
            att.print_html_fragment(out, allocator)?;
        }
        out.write_all(b">")?;
        self.body.print_html_fragment(out, allocator)?;
        if meta.has_closing_tag {
            out.write_all(b"</")?;
            out.write_all(meta.tag_name.as_bytes())?;
            out.write_all(b">")?;
        }
        Ok(())
    }

    fn print_plain(&self, out: &mut String, allocator: &HtmlAllocator) -> Result<()> {
        self.body.print_plain(out, allocator)
    }
}

pub trait TryCollectBody {
    fn try_collect_body(&mut self, html: &HtmlAllocator) -> Result<ASlice<Node>>;
}

impl<I: Iterator<Item = Result<AId<Node>>>> TryCollectBody for I {
    fn try_collect_body(&mut self, html: &HtmlAllocator) -> Result<ASlice<Node>> {
        let mut v = html.new_vec::<Node>();
        for item in self {
            v.push(item?)?;
        }
        Ok(v.as_slice())
    }
}

macro_rules! def_elements {
    { $($method:ident, $meta:ident, $tag:expr, $closing:expr;)* } => {
        $(
            pub static $meta: ElementMeta = ElementMeta {
                tag_name: $tag,
                has_closing_tag: $closing,
            };
        )*
        impl HtmlAllocator {
            $(
                pub fn $method(
                    &self,
                    attr: impl ToASlice<(KString, KString)>,
                    body: impl ToASlice<Node>,
                ) -> Result<AId<Node>> {
                    self.element(&$meta, attr, body)
                }
            )*
        }
    }
}

def_elements! {
    html, HTML_META, "html", true;
    head, HEAD_META, "head", true;
    title, TITLE_META, "title", true;
    link, LINK_META, "link", false;
    body, BODY_META, "body", true;
    div, DIV_META, "div", true;
    span, SPAN_META, "span", true;
    p, P_META, "p", true;
    a, A_META, "a", true;
    h1, H1_META, "h1", true;
    h2, H2_META, "h2", true;
    h3, H3_META, "h3", true;
    h4, H4_META, "h4", true;
    h5, H5_META, "h5", true;
    h6, H6_META, "h6", true;
    ul, UL_META, "ul", true;
    ol, OL_META, "ol", true;
    li, LI_META, "li", true;
    em, EM_META, "em", true;
    strong, STRONG_META, "strong", true;
    code, CODE_META, "code", true;
    pre, PRE_META, "pre", true;
    blockquote, BLOCKQUOTE_META, "blockquote", true;
    br, BR_META, "br", false;
    hr, HR_META, "hr", false;
    form, FORM_META, "form", true;
    label, LABEL_META, "label", true;
    input, INPUT_META, "input", false;
    select, SELECT_META, "select", true;
    option, OPTION_META, "option", true;
    textarea, TEXTAREA_META, "textarea", true;
    button, BUTTON_META, "button", true;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_file_encoding() {
        assert_eq!(BOM.as_bytes(), &[0xEF, 0xBB, 0xBF]);
    }

    fn html() -> HtmlAllocator {
        HtmlAllocator::new(10000)
    }

    #[test]
    fn t_element_serialization() -> Result<()> {
        let h = html();
        let id = h.div(
            [att("class", "pair")],
            [
                h.str("a & b")?,
                h.span([], [h.str("<ok>")?])?,
            ])?;
        assert_eq!(h.to_html_string(id, false),
                   "<div class=\"pair\">a &amp; b<span>&lt;ok&gt;</span></div>");
        Ok(())
    }

    #[test]
    fn t_void_element() {
        let h = html();
        let id = h.input([att("type", "text"), att("name", "a")], []).unwrap();
        assert_eq!(h.to_html_string(id, false),
                   "<input type=\"text\" name=\"a\">");
    }

    #[test]
    fn t_attribute_escaping() {
        let h = html();
        let id = h.input([att("value", "say \"hi\" & 'bye'")], []).unwrap();
        assert_eq!(h.to_html_string(id, false),
                   "<input value=\"say &quot;hi&quot; &amp; &#39;bye&#39;\">");
    }

    #[test]
    fn t_opt_att() {
        let h = html();
        let id = h.input([att("name", "a"),
                          opt_att("value", None::<String>),
                          opt_att("id", Some("x"))],
                         []).unwrap();
        assert_eq!(h.to_html_string(id, false),
                   "<input name=\"a\" id=\"x\">");
    }

    #[test]
    fn t_document_printing() -> Result<()> {
        let h = html();
        let id = h.html([], [h.body([], [])?])?;
        assert_eq!(h.to_html_string(id, true),
                   format!("{BOM}{DOCTYPE}<html><body></body></html>"));
        Ok(())
    }

    #[test]
    fn t_plain_string() -> Result<()> {
        let h = html();
        let id = h.p([att("class", "x")],
                     [h.str("Hello ")?,
                      h.em([], [h.str("world")?])?])?;
        assert_eq!(h.to_plain_string(id)?, "Hello world");
        Ok(())
    }

    #[test]
    fn t_avec_growth_keeps_order() {
        let h = html();
        let mut v = h.new_vec::<Node>();
        for i in 0..40 {
            v.push(h.string(i.to_string()).unwrap()).unwrap();
        }
        let id = h.div([], v.as_slice()).unwrap();
        let expected: String = (0..40).map(|i| i.to_string()).collect();
        assert_eq!(h.to_html_string(id, false),
                   format!("<div>{expected}</div>"));
    }

    #[test]
    fn t_try_collect_body() {
        let h = html();
        let body = (0..3).map(|i| h.li([], [h.string(i.to_string())?]))
            .try_collect_body(&h).unwrap();
        let id = h.ul([], body).unwrap();
        assert_eq!(h.to_html_string(id, false),
                   "<ul><li>0</li><li>1</li><li>2</li></ul>");
    }

    #[test]
    fn t_out_of_memory() {
        let h = HtmlAllocator::new(4);
        let mut last = Ok(());
        for _ in 0..10 {
            last = h.str("x").map(|_| ());
            if last.is_err() {
                break;
            }
        }
        assert!(last.is_err());
    }

    #[test]
    #[should_panic]
    fn t_foreign_aid_panics() {
        let h1 = html();
        let h2 = html();
        let id = h1.str("a").unwrap();
        let _ = h2.get_node(id);
    }

    #[test]
    fn t_pool_reuse() {
        let pool = AllocatorPool::new(1000);
        let regionid0 = {
            let mut guard = pool.get();
            let h = guard.allocator();
            h.str("x").unwrap();
            h.regionid()
        };
        let mut guard = pool.get();
        let h = guard.allocator();
        // same allocator, next generation, empty again
        assert_ne!(h.regionid(), regionid0);
        let id = h.div([], []).unwrap();
        assert_eq!(h.to_html_string(id, false), "<div></div>");
    }
}
