use std::{ffi::OsStr, path::{Path, PathBuf}};


// ------------------------------------------------------------------
// Trait for conversion to paths; Into<Box<Path>> does not allow &str.

pub trait IntoBoxPath {
    fn into_box_path(self) -> Box<Path>;
}

impl IntoBoxPath for &str {
    fn into_box_path(self) -> Box<Path> {
        PathBuf::from(self).into()
    }
}
impl IntoBoxPath for String {
    fn into_box_path(self) -> Box<Path> {
        PathBuf::from(self).into()
    }
}
impl IntoBoxPath for PathBuf {
    fn into_box_path(self) -> Box<Path> {
        self.into()
    }
}
impl IntoBoxPath for &Path {
    fn into_box_path(self) -> Box<Path> {
        self.into()
    }
}
impl IntoBoxPath for Box<Path> {
    fn into_box_path(self) -> Box<Path> {
        self
    }
}

// ------------------------------------------------------------------

// Suffix handling on strings; Path can't do it without going via
// OsStr.

pub fn _base_and_suffix<T: AsRef<[u8]> + ?Sized>(
    s: &T
) -> Option<(&[u8], &str)> {
    let bs: &[u8] = s.as_ref();
    let len = bs.len();
    for (i, c) in bs.iter().rev().enumerate() {
        match c {
            b'/' => return None,
            b'.' => return Some((
                &bs[..(len - i - 1)],
                std::str::from_utf8(&bs[(len - i)..]).unwrap()
            )),
            _  =>
                if ! c.is_ascii_alphanumeric() {
                    return None;
                }
        }
    }
    None
}

pub fn base_and_suffix(s: &str) -> Option<(&str, &str)> {
    let (base, suffix) = _base_and_suffix(s)?;
    Some((std::str::from_utf8(base).unwrap(), suffix))
}

pub fn base(s: &str) -> Option<&str> {
    let (base, _suffix) = _base_and_suffix(s)?;
    Some(std::str::from_utf8(base).unwrap())
}

/// Find suffix and if present, return as a &str. Only allows \w
/// characters in suffix.
pub fn suffix<T: AsRef<[u8]> + ?Sized>(
    s: &T
) -> Option<&str> {
    _base_and_suffix(s).and_then(|(_, suffix)| Some(suffix))
}

/// Careful, this drops any empty segments, regardless whether at the
/// beginning, end or in the middle. This is useful for routing
/// lookups, but can't be used as sole information for path operations
/// (e.g. adding paths).
pub fn path_segments<'s>(s: &'s str) -> impl Iterator<Item = &'s str>
{
    s.split('/').filter(|s| !s.is_empty())
}

// Allocation-less(?) way to compare the extension for Path values
pub fn extension_eq<P: AsRef<Path> + ?Sized,
                    E: AsRef<OsStr> + ?Sized>(
    path: &P, ext: &E
) -> bool {
    let p: &Path = path.as_ref();
    let ext: &OsStr = ext.as_ref();
    p.extension() == Some(ext)
}


#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! t {
        ($e:expr, $r:expr) => {
            assert_eq!(suffix($e), $r);
        }
    }

    #[test]
    fn t_suffix() {
        t!("foo", None);
        t!("foo.md", Some("md"));
        t!("foo.", Some("")); // hmm
        t!("foo. md", None);
        t!("foo.md/bar", None);
        t!("foo.md/", None);
        t!("foo.mäd", None);
    }

    #[test]
    fn t_base_and_suffix() {
        assert_eq!(base_and_suffix("foo"), None);
        assert_eq!(base_and_suffix("contact.json"), Some(("contact", "json")));
        assert_eq!(base_and_suffix("foo.json/bar"), None);
        assert_eq!(base_and_suffix("foo.d/bar.json"), Some(("foo.d/bar", "json")));
    }

    #[test]
    fn t_path_segments() {
        let v: Vec<_> = path_segments("/forms//contact/").collect();
        assert_eq!(v, vec!["forms", "contact"]);
    }
}
