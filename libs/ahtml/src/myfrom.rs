//! Local conversion trait. `From` can't be implemented here for the
//! combinations we need (foreign trait, foreign types), so attribute
//! and text constructors bound on this one instead.

use kstring::KString;

pub trait MyFrom<T> {
    fn myfrom(t: T) -> Self;
}

impl<T> MyFrom<T> for T {
    fn myfrom(t: T) -> Self {
        t
    }
}

impl MyFrom<&str> for KString {
    fn myfrom(s: &str) -> Self {
        KString::from_ref(s)
    }
}

impl MyFrom<String> for KString {
    fn myfrom(s: String) -> Self {
        KString::from_string(s)
    }
}

impl MyFrom<&String> for KString {
    fn myfrom(s: &String) -> Self {
        KString::from_ref(s)
    }
}

impl MyFrom<&KString> for KString {
    fn myfrom(s: &KString) -> Self {
        s.clone()
    }
}

impl MyFrom<std::borrow::Cow<'_, str>> for KString {
    fn myfrom(s: std::borrow::Cow<'_, str>) -> Self {
        match s {
            std::borrow::Cow::Borrowed(s) => KString::from_ref(s),
            std::borrow::Cow::Owned(s) => KString::from_string(s),
        }
    }
}
