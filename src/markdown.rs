//! Convert markdown rich text (form disclaimers) to HTML.

use anyhow::{Result, anyhow, bail};
use kstring::KString;
use pulldown_cmark::{Parser, Options, Event, Tag, HeadingLevel, LinkType};

use ahtml::{AId, HtmlAllocator, Node, AVec, ElementMeta,
            P_META, H2_META, H3_META, H4_META, H5_META, H6_META,
            DIV_META, OL_META, UL_META, LI_META, PRE_META,
            BLOCKQUOTE_META, EM_META, STRONG_META};

use crate::warn;


/// The rich text ends up inside a page that already carries its own
/// `h1`, thus all heading levels are shifted down by one.
fn demoted_heading_meta(level: HeadingLevel) -> &'static ElementMeta {
    match level {
        HeadingLevel::H1 => &H2_META,
        HeadingLevel::H2 => &H3_META,
        HeadingLevel::H3 => &H4_META,
        HeadingLevel::H4 => &H5_META,
        HeadingLevel::H5 => &H6_META,
        HeadingLevel::H6 => &H6_META,
    }
}

fn assert_balanced(opened: &Tag, closing: &Tag) -> Result<()> {
    if opened == closing {
        Ok(())
    } else {
        Err(anyhow!("non-balanced markup: {opened:?} ending as {closing:?}"))
    }
}

struct ContextFrame<'a, 't> {
    tag: Tag<'t>,
    atts: AVec<'a, (KString, KString)>,
    body: AVec<'a, Node>,
}

/// Convert a markdown string to HTML, wrapped in a `div`. Only the
/// constructs that make sense in a disclaimer paragraph are mapped to
/// markup; embedded raw HTML and images are dropped (keeping their
/// text), with a warning.
pub fn markdown_to_html(
    source: &str, html: &HtmlAllocator
) -> Result<AId<Node>>
{
    let mut options = Options::empty();
    options.insert(Options::ENABLE_SMART_PUNCTUATION);

    let parser = Parser::new_ext(source, options);

    let mut context: Vec<ContextFrame> = Vec::new();
    // Base frame wrapping everything; the tag is never compared since
    // the parser closes only what it opened.
    context.push(ContextFrame {
        tag: Tag::Paragraph, // fake
        atts: AVec::new(html),
        body: AVec::new(html),
    });
    macro_rules! new_contextframe {
        ($tag:expr) => {
            ContextFrame {
                tag: $tag,
                atts: AVec::new(html),
                body: AVec::new(html),
            }
        }
    }

    // Closing a context: take the finished frame, hand back its parts
    // plus the frame it nests in.
    macro_rules! pop {
        ($tag:expr) => {{
            let frame = context.pop().expect("start before end");
            assert_balanced(&frame.tag, &$tag)?;
            let outerframe = context.last_mut()
                .expect("at least base frame");
            (frame.atts, frame.body, outerframe)
        }}
    }
    macro_rules! mdclose {
        ($tag:expr, $meta:expr) => {{
            let (atts, body, outerframe) = pop!($tag);
            outerframe.body.push(
                html.new_element($meta, atts.as_slice(), body.as_slice())?)?;
        }}
    }

    macro_rules! current_frame {
        () => {
            context.last_mut().expect(
                "at least base frame; at least bug in markdown lib?")
        }
    }

    for item in parser {
        match item {
            // Which element a frame becomes is only known at the End
            // event, so every Start pushes the same kind of frame.
            Event::Start(tag) =>
                context.push(new_contextframe!(tag)),
            Event::End(tag) =>
                match tag {
                    Tag::Paragraph =>
                        mdclose!(Tag::Paragraph, &P_META),
                    Tag::Heading(level, fragmentid, classes) =>
                        mdclose!(Tag::Heading(level, fragmentid, classes),
                                 demoted_heading_meta(level)),
                    Tag::BlockQuote =>
                        mdclose!(Tag::BlockQuote, &BLOCKQUOTE_META),
                    Tag::CodeBlock(kind) =>
                        mdclose!(Tag::CodeBlock(kind), &PRE_META),
                    Tag::List(firstitemnum) =>
                        mdclose!(
                            Tag::List(firstitemnum),
                            if firstitemnum.is_some() {
                                &OL_META
                            } else {
                                &UL_META
                            }),
                    Tag::Item =>
                        mdclose!(Tag::Item, &LI_META),
                    Tag::Emphasis =>
                        mdclose!(Tag::Emphasis, &EM_META),
                    Tag::Strong =>
                        mdclose!(Tag::Strong, &STRONG_META),
                    Tag::Link(linktype, url, title) => {
                        let (mut atts, body, outerframe) =
                            pop!(Tag::Link(linktype, url.clone(), title));
                        let href = if linktype == LinkType::Email {
                            format!("mailto:{url}")
                        } else {
                            url.into_string()
                        };
                        atts.push(html.attribute("href", href)?)?;
                        outerframe.body.push(html.a(atts, body)?)?;
                    }
                    Tag::Image(linktype, url, title) => {
                        warn!("dropping image from rich text: {:?}", &*url);
                        // Keep the alt text that was collected as the
                        // frame body.
                        let (_atts, body, outerframe) =
                            pop!(Tag::Image(linktype, url, title));
                        outerframe.body.extend_from_slice(&body.as_slice())?;
                    }
                    other => {
                        // Tables, footnotes etc. are not enabled in
                        // `options`; should one slip through anyway,
                        // keep the text and drop the markup.
                        warn!("dropping markup for {other:?}");
                        let (_atts, body, outerframe) = pop!(other);
                        outerframe.body.extend_from_slice(&body.as_slice())?;
                    }
                },
            Event::Text(s) => {
                let frame = current_frame!();
                frame.body.push(html.str(&s)?)?;
            }
            Event::Code(s) => {
                let frame = current_frame!();
                let elt = html.code(
                    [],
                    [
                        html.str(&s)?
                    ])?;
                frame.body.push(elt)?;
            }
            Event::Html(s) => {
                // No HTML passthrough for content-managed text.
                warn!("dropping embedded HTML in rich text: {:?}", &*s);
            }
            Event::FootnoteReference(label) => {
                warn!("dropping footnote reference {:?}", &*label);
            }
            Event::SoftBreak => {
                // a single \n in the input
                let frame = current_frame!();
                frame.body.push(html.str("\n")?)?;
            }
            Event::HardBreak => {
                // "  \n" in the input
                let frame = current_frame!();
                frame.body.push(html.br([], [])?)?;
            }
            Event::Rule => {
                let frame = current_frame!();
                frame.body.push(html.hr([], [])?)?;
            }
            Event::TaskListMarker(_checked) => {
                warn!("dropping task list marker");
            }
        }
    }

    match context.len() {
        0 => bail!("base frame was dropped -- should be impossible?"),
        1 => (),
        n => bail!("{} non-closed construct(s) at end of rich text: {}",
                   n - 1,
                   context[1..].iter().map(
                       |frame| format!("{:?}", frame.tag))
                   .collect::<Vec<String>>()
                   .join(", "))
    }
    let baseframe = context.pop().expect("len checked to be 1");
    html.new_element(&DIV_META,
                     baseframe.atts.as_slice(),
                     baseframe.body.as_slice())
}


#[cfg(test)]
mod tests {
    use super::*;

    fn to_html(source: &str) -> String {
        let html = HtmlAllocator::new(10000);
        let id = markdown_to_html(source, &html).unwrap();
        html.to_html_string(id, false)
    }

    #[test]
    fn t_paragraph_and_inline() {
        assert_eq!(to_html("Hello *world*, use `foo` here."),
                   "<div><p>Hello <em>world</em>, use <code>foo</code> here.</p></div>");
    }

    #[test]
    fn t_list() {
        assert_eq!(to_html("- a\n- b\n"),
                   "<div><ul><li>a</li><li>b</li></ul></div>");
    }

    #[test]
    fn t_ordered_list() {
        assert_eq!(to_html("1. a\n2. b\n"),
                   "<div><ol><li>a</li><li>b</li></ol></div>");
    }

    #[test]
    fn t_heading_demoted() {
        assert_eq!(to_html("# Terms\n\nBody text."),
                   "<div><h2>Terms</h2><p>Body text.</p></div>");
    }

    #[test]
    fn t_link() {
        assert_eq!(to_html("see [the terms](https://example.com/terms)"),
                   "<div><p>see <a href=\"https://example.com/terms\">\
                    the terms</a></p></div>");
    }

    #[test]
    fn t_email_autolink() {
        assert_eq!(to_html("write <foo@example.com>"),
                   "<div><p>write <a href=\"mailto:foo@example.com\">\
                    foo@example.com</a></p></div>");
    }

    #[test]
    fn t_raw_html_is_dropped() {
        assert_eq!(to_html("a <b>x</b> c"),
                   "<div><p>a x c</p></div>");
    }

    #[test]
    fn t_empty_input() {
        assert_eq!(to_html(""), "<div></div>");
    }
}
